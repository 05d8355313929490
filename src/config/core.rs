// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::fuzzer::marker::DEFAULT_MARKER_PREFIX;
use crate::renderer::{RendererKind, SessionOptions};
use crate::types::{FuzzMode, LoadCondition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct FuzzerConfig {
    #[serde(default)]
    #[validate(nested)]
    pub fuzzing: FuzzingConfig,

    #[serde(default)]
    #[validate(nested)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FuzzingConfig {
    #[validate(range(min = 1, max = 256))]
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[validate(range(min = 64, max = 65536))]
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,

    #[validate(length(min = 1, max = 64))]
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,

    /// Parameter appended to every reflection batch as a liveness check
    #[serde(default = "default_control_parameter")]
    pub control_parameter: Option<String>,

    /// Pause after every batch; mode default when unset
    #[serde(default)]
    pub cooldown_ms: Option<u64>,

    /// Open a new session for every batch instead of one per worker
    #[serde(default)]
    pub fresh_session_per_batch: bool,

    #[serde(default)]
    pub baseline_check: bool,

    #[serde(default)]
    pub fail_on_unstable_baseline: bool,

    #[serde(default)]
    #[validate(nested)]
    pub stabilization: StabilizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StabilizationConfig {
    #[validate(range(min = 1, max = 60000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[validate(range(max = 1000))]
    #[serde(default = "default_stable_threshold")]
    pub stable_threshold: u32,

    #[serde(default)]
    pub max_snapshot_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrowserConfig {
    #[serde(default)]
    pub renderer: RendererKind,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Accept invalid TLS certificates
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub stealth: bool,

    /// `None` waits for navigations indefinitely
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: Option<u64>,

    #[serde(default)]
    pub load_condition: LoadCondition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON run report (fuzzing) or line output (probing)
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    #[serde(default)]
    pub screenshots: bool,

    /// Persist rendered content of every batch
    #[serde(default)]
    pub save_responses: bool,
}

impl Default for FuzzingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_url_length: default_max_url_length(),
            marker_prefix: default_marker_prefix(),
            control_parameter: default_control_parameter(),
            cooldown_ms: None,
            fresh_session_per_batch: false,
            baseline_check: false,
            fail_on_unstable_baseline: false,
            stabilization: StabilizationConfig::default(),
        }
    }
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stable_threshold: default_stable_threshold(),
            max_snapshot_retries: None,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::default(),
            headless: true,
            proxy: None,
            user_agent: None,
            headers: HashMap::new(),
            insecure: false,
            stealth: false,
            navigation_timeout_secs: default_navigation_timeout(),
            load_condition: LoadCondition::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            artifacts_dir: default_artifacts_dir(),
            screenshots: false,
            save_responses: false,
        }
    }
}

impl FuzzingConfig {
    pub fn cooldown(&self, mode: FuzzMode) -> Duration {
        let ms = self.cooldown_ms.unwrap_or(match mode {
            FuzzMode::Reflection => 650,
            FuzzMode::Status => 750,
        });
        Duration::from_millis(ms)
    }

    /// Control parameter in effect for `mode`; status fuzzing has none
    pub fn control_for(&self, mode: FuzzMode) -> Option<String> {
        match mode {
            FuzzMode::Reflection => self
                .control_parameter
                .as_ref()
                .filter(|c| !c.is_empty())
                .cloned(),
            FuzzMode::Status => None,
        }
    }
}

impl StabilizationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Option<Duration> {
        self.navigation_timeout_secs.map(Duration::from_secs)
    }

    pub fn session_options(&self) -> SessionOptions {
        let mut options = SessionOptions {
            headless: self.headless,
            proxy: self.proxy.clone(),
            user_agent: None,
            headers: self.headers.clone(),
            insecure: self.insecure,
            default_timeout: self.navigation_timeout(),
        };

        if self.stealth {
            options = options.stealth();
        }

        // Explicit user agent wins over the stealth default
        if let Some(ua) = &self.user_agent {
            options.user_agent = Some(ua.clone());
        }

        options
    }
}

fn default_workers() -> usize {
    5
}

fn default_max_url_length() -> usize {
    2000
}

fn default_marker_prefix() -> String {
    DEFAULT_MARKER_PREFIX.to_string()
}

fn default_control_parameter() -> Option<String> {
    Some("name".to_string())
}

fn default_poll_interval_ms() -> u64 {
    750
}

fn default_stable_threshold() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_navigation_timeout() -> Option<u64> {
    Some(15)
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}
