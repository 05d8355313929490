// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - ParamSweep Library
 * Batched reflected-parameter and conflict discovery for web targets
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod config;
pub mod errors;
pub mod inputs;
pub mod types;

// Batch planning, detection and localization
pub mod fuzzer;

// Rendering backends
pub mod renderer;

// URL list probing
pub mod prober;

// Reports and on-disk artifacts
pub mod reporting;

pub use errors::{FuzzError, FuzzResult, RenderError};
pub use fuzzer::{DispatchSettings, Dispatcher};
pub use types::{FuzzMode, RunReport, TargetReport};
