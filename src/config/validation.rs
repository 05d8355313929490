// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::collections::HashMap;
use validator::Validate;

use super::core::FuzzerConfig;
use crate::fuzzer::marker::MarkerCodec;
use crate::renderer::RendererKind;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &FuzzerConfig) -> Result<()> {
        config.validate().context("Configuration validation failed")?;

        Self::validate_fuzzing_config(config)?;
        Self::validate_browser_config(config)?;

        Ok(())
    }

    fn validate_fuzzing_config(config: &FuzzerConfig) -> Result<()> {
        let codec = MarkerCodec::new(&config.fuzzing.marker_prefix)?;

        if let Some(control) = &config.fuzzing.control_parameter {
            if control.contains(codec.prefix()) {
                return Err(anyhow::anyhow!(
                    "Control parameter '{}' contains the marker prefix '{}'",
                    control,
                    codec.prefix()
                ));
            }
        }

        if config.fuzzing.fail_on_unstable_baseline && !config.fuzzing.baseline_check {
            return Err(anyhow::anyhow!(
                "fail_on_unstable_baseline requires baseline_check to be enabled"
            ));
        }

        Ok(())
    }

    fn validate_browser_config(config: &FuzzerConfig) -> Result<()> {
        if let Some(proxy) = &config.browser.proxy {
            url::Url::parse(proxy).with_context(|| format!("Invalid proxy URL: {}", proxy))?;
        }

        for name in config.browser.headers.keys() {
            if name.trim().is_empty() {
                return Err(anyhow::anyhow!("Header names cannot be empty"));
            }
        }

        Ok(())
    }

    pub fn generate_validation_report(config: &FuzzerConfig) -> ValidationReport {
        let mut report = ValidationReport::new();

        if let Err(e) = Self::validate(config) {
            report.add_error("config", &format!("{:#}", e));
        }

        if config.fuzzing.workers > 50 {
            report.add_warning(
                "fuzzing.workers",
                "Many concurrent browser sessions may exhaust memory or trip rate limits",
            );
        }

        if config.fuzzing.stabilization.stable_threshold == 0 {
            report.add_warning(
                "fuzzing.stabilization.stable_threshold",
                "Content is sampled right after load, late client-side reflections will be missed",
            );
        }

        if config.fuzzing.control_parameter.is_none() {
            report.add_info(
                "fuzzing.control_parameter",
                "No control parameter, conflicting parameters cannot be detected in reflection mode",
            );
        }

        if config.browser.insecure {
            report.add_warning("browser.insecure", "TLS certificate validation is disabled");
        }

        if config.browser.renderer == RendererKind::Http && config.output.screenshots {
            report.add_warning(
                "output.screenshots",
                "The http renderer cannot take screenshots",
            );
        }

        if config.browser.navigation_timeout_secs.is_none() {
            report.add_info(
                "browser.navigation_timeout_secs",
                "Navigations wait indefinitely, a hung page stalls its worker",
            );
        }

        report
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: HashMap<String, Vec<String>>,
    pub warnings: HashMap<String, Vec<String>>,
    pub info: HashMap<String, Vec<String>>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn add_info(&mut self, field: &str, message: &str) {
        self.info
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
