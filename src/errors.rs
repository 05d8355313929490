// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Fuzzer Error Types
 * Error classification for batch fuzzing, rendering and localization
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Failures reported by a rendering backend (browser tab or HTTP client)
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Failed to launch renderer: {reason}")]
    Launch {
        reason: String,
    },

    #[error("Renderer session error: {reason}")]
    Session {
        reason: String,
    },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation {
        url: String,
        reason: String,
    },

    #[error("Navigation to {url} timed out after {timeout:?}")]
    Timeout {
        url: String,
        timeout: Duration,
    },

    #[error("Failed to read rendered content: {reason}")]
    Content {
        reason: String,
    },

    #[error("Screenshot failed: {reason}")]
    Screenshot {
        reason: String,
    },

    #[error("Operation not supported by this renderer: {0}")]
    Unsupported(&'static str),
}

/// Main fuzzer error type
#[derive(Error, Debug)]
pub enum FuzzError {
    /// Navigation or content read failure for one batch attempt
    #[error("Render failure for {url} (batch: {batch}): {source}")]
    TransientRender {
        url: String,
        batch: String,
        #[source]
        source: RenderError,
    },

    /// Non-2xx status where 2xx was expected
    #[error("Unexpected HTTP {status} from {url}")]
    AnomalousStatus {
        url: String,
        status: u16,
    },

    /// Bisection finished without isolating a single culprit
    #[error("Could not isolate the conflicting parameter for {url} (batch: {batch})")]
    UnlocalizableConflict {
        url: String,
        batch: String,
    },

    /// Missing or invalid input, raised before any network activity
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Baseline page that must always succeed did not
    #[error("Fatal upstream failure: {url} answered HTTP {status}")]
    FatalUpstream {
        url: String,
        status: u16,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Report error: {0}")]
    Report(String),
}

impl FuzzError {
    /// Wrap a render failure with the batch context needed to reproduce it
    pub fn render(url: &str, batch: &[String], source: RenderError) -> Self {
        FuzzError::TransientRender {
            url: url.to_string(),
            batch: describe_batch(batch),
            source,
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        FuzzError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Only configuration and fatal-policy errors terminate a run.
    /// Everything else is scoped to the batch that produced it.
    pub fn is_fatal(&self) -> bool {
        match self {
            FuzzError::Configuration(_) => true,
            FuzzError::FatalUpstream { .. } => true,
            FuzzError::TransientRender { .. } => false,
            FuzzError::AnomalousStatus { .. } => false,
            FuzzError::UnlocalizableConflict { .. } => false,
            FuzzError::Io { .. } => false,
            FuzzError::Report(_) => false,
        }
    }
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout { .. })
    }
}

/// Convert reqwest errors coming out of the HTTP renderer
impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();

        if err.is_timeout() {
            RenderError::Timeout {
                url,
                timeout: Duration::from_secs(0),
            }
        } else if err.is_builder() {
            RenderError::Launch {
                reason: err.to_string(),
            }
        } else {
            RenderError::Navigation {
                url,
                reason: err.to_string(),
            }
        }
    }
}

/// Short, log-friendly rendering of batch contents
pub fn describe_batch(batch: &[String]) -> String {
    const SHOWN: usize = 8;

    if batch.len() <= SHOWN {
        batch.join(",")
    } else {
        format!(
            "{},... ({} params)",
            batch[..SHOWN].join(","),
            batch.len()
        )
    }
}

/// Result type for fuzzer operations
pub type FuzzResult<T> = Result<T, FuzzError>;
