// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::core::FuzzerConfig;
use super::validation::ConfigValidator;
use crate::renderer::RendererKind;

pub struct ConfigLoader {
    config_path: PathBuf,
    format: ConfigFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigLoader {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref().to_path_buf();
        let format = Self::detect_format(&path)?;

        Ok(Self {
            config_path: path,
            format,
        })
    }

    pub fn with_format<P: AsRef<Path>>(config_path: P, format: ConfigFormat) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            format,
        }
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file format"))?;

        match extension {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported config file format: {}", extension)),
        }
    }

    pub fn load_config(&self) -> Result<FuzzerConfig> {
        let content = std::fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file: {:?}", self.config_path))?;

        let mut config = self.parse(&content)?;
        apply_env_overrides(&mut config)?;
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    fn parse(&self, content: &str) -> Result<FuzzerConfig> {
        let config = match self.format {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).context("Failed to parse YAML config")?
            }
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML config")?,
            ConfigFormat::Json => {
                serde_json::from_str(content).context("Failed to parse JSON config")?
            }
        };
        Ok(config)
    }

    pub fn save_config(&self, config: &FuzzerConfig) -> Result<()> {
        ConfigValidator::validate(config)?;

        let content = match self.format {
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config)?,
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        };

        std::fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", self.config_path))?;

        Ok(())
    }
}

/// Apply `PARAMSWEEP_*` environment variables on top of `config`
pub fn apply_env_overrides(config: &mut FuzzerConfig) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides<F>(config: &mut FuzzerConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(workers) = var("PARAMSWEEP_WORKERS") {
        config.fuzzing.workers = workers.parse().context("Invalid PARAMSWEEP_WORKERS")?;
    }

    if let Some(max_len) = var("PARAMSWEEP_MAX_URL_LENGTH") {
        config.fuzzing.max_url_length = max_len
            .parse()
            .context("Invalid PARAMSWEEP_MAX_URL_LENGTH")?;
    }

    if let Some(proxy) = var("PARAMSWEEP_PROXY") {
        config.browser.proxy = Some(proxy).filter(|p| !p.is_empty());
    }

    if let Some(renderer) = var("PARAMSWEEP_RENDERER") {
        config.browser.renderer = match renderer.to_lowercase().as_str() {
            "chrome" => RendererKind::Chrome,
            "http" => RendererKind::Http,
            other => return Err(anyhow::anyhow!("Invalid PARAMSWEEP_RENDERER: {}", other)),
        };
    }

    if let Some(timeout) = var("PARAMSWEEP_NAVIGATION_TIMEOUT") {
        let secs: u64 = timeout
            .parse()
            .context("Invalid PARAMSWEEP_NAVIGATION_TIMEOUT")?;
        config.browser.navigation_timeout_secs = (secs > 0).then_some(secs);
    }

    if let Some(control) = var("PARAMSWEEP_CONTROL_PARAMETER") {
        config.fuzzing.control_parameter = Some(control).filter(|c| !c.is_empty());
    }

    if let Some(dir) = var("PARAMSWEEP_ARTIFACTS_DIR") {
        config.output.artifacts_dir = PathBuf::from(dir);
    }

    Ok(())
}

/// Load `path` if given, otherwise start from defaults. Environment
/// overrides apply either way.
pub fn load_config_with_overrides(path: Option<&Path>) -> Result<FuzzerConfig> {
    match path {
        Some(path) => ConfigLoader::new(path)?.load_config(),
        None => {
            let mut config = FuzzerConfig::default();
            apply_env_overrides(&mut config)?;
            ConfigValidator::validate(&config)?;
            Ok(config)
        }
    }
}
