// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod loader;
pub mod validation;

pub use core::{BrowserConfig, FuzzerConfig, FuzzingConfig, OutputConfig, StabilizationConfig};

pub use loader::{apply_env_overrides, load_config_with_overrides, ConfigFormat, ConfigLoader};

pub use validation::{ConfigValidator, ValidationReport};
