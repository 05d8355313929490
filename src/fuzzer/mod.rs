// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Batched reflection and conflict fuzzing.
//!
//! Parameters are packed into URL-length-bounded batches, each batch is
//! rendered once with a per-parameter marker as its value, and the rendered
//! page is searched for markers. A batch that breaks the page is bisected
//! to find the parameter responsible, which is then dropped for one
//! corrective pass.

pub mod detector;
pub mod dispatcher;
pub mod localizer;
pub mod marker;
pub mod planner;
pub mod stabilizer;

pub use detector::ReflectionDetector;
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use localizer::{
    AnomalyPredicate, AnomalyProbe, ConflictLocalizer, Localization, LocalizationReport,
    SessionProbe,
};
pub use marker::{MarkerCodec, DEFAULT_MARKER_PREFIX};
pub use planner::{BatchPlanner, DEFAULT_MAX_URL_LENGTH};
pub use stabilizer::{ContentStabilizer, Stabilized, StabilizerSettings};
