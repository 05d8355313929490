// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Content Stabilization Poller
 * Waits for client-side rendering to settle before reflections are checked
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::errors::RenderError;
use crate::renderer::RenderSession;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(750);
pub const DEFAULT_STABLE_THRESHOLD: u32 = 10;

#[derive(Debug, Clone)]
pub struct StabilizerSettings {
    pub poll_interval: Duration,
    /// Consecutive same-length snapshots required. 0 disables polling.
    pub stable_threshold: u32,
    /// `None` retries the initial snapshot until it succeeds
    pub max_snapshot_retries: Option<u32>,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stable_threshold: DEFAULT_STABLE_THRESHOLD,
            max_snapshot_retries: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stabilized {
    pub content: String,
    /// Poll rounds performed after the initial snapshot
    pub rounds: u32,
    /// Set when the page navigated away from the test URL while polling
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ContentStabilizer {
    settings: StabilizerSettings,
}

impl ContentStabilizer {
    pub fn new(settings: StabilizerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &StabilizerSettings {
        &self.settings
    }

    /// Sample `session` until its content length stops changing or the page
    /// leaves `test_url`. On a client-side redirect the first snapshot wins,
    /// since the markers were only ever present on the original page.
    pub async fn stabilize(
        &self,
        session: &mut dyn RenderSession,
        test_url: &str,
    ) -> Result<Stabilized, RenderError> {
        let first = self.initial_snapshot(session).await?;

        if self.settings.stable_threshold == 0 {
            return Ok(Stabilized {
                content: first,
                rounds: 0,
                redirect: None,
            });
        }

        let mut content = first.clone();
        let mut last_len = content.len();
        let mut stable_count = 0u32;
        let mut rounds = 0u32;

        while stable_count < self.settings.stable_threshold {
            tokio::time::sleep(self.settings.poll_interval).await;
            rounds += 1;

            let current = session.current_url().await;
            if !same_page(&current, test_url) {
                info!("[Stabilizer] Redirect detected: {} -> {}", test_url, current);
                return Ok(Stabilized {
                    content: first,
                    rounds,
                    redirect: Some(current),
                });
            }

            match session.content().await {
                Ok(snapshot) => {
                    if snapshot.len() == last_len {
                        stable_count += 1;
                    } else {
                        stable_count = 0;
                        last_len = snapshot.len();
                    }
                    content = snapshot;
                }
                Err(e) => {
                    debug!("[Stabilizer] Snapshot failed in round {}: {}", rounds, e);
                    stable_count = 0;
                }
            }
        }

        debug!(
            "[Stabilizer] {} stable after {} rounds ({} bytes)",
            test_url,
            rounds,
            content.len()
        );

        Ok(Stabilized {
            content,
            rounds,
            redirect: None,
        })
    }

    async fn initial_snapshot(&self, session: &mut dyn RenderSession) -> Result<String, RenderError> {
        let mut attempts = 0u32;
        loop {
            match session.content().await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    attempts += 1;
                    if let Some(max) = self.settings.max_snapshot_retries {
                        if attempts > max {
                            return Err(e);
                        }
                    }
                    warn!(
                        "[Stabilizer] Initial snapshot failed (attempt {}): {}",
                        attempts, e
                    );
                    tokio::time::sleep(self.settings.poll_interval).await;
                }
            }
        }
    }
}

/// Compare URLs after parsing, so trivial serialization differences
/// (default port, host case, percent-encoding) are not mistaken for a redirect
pub fn same_page(current: &str, requested: &str) -> bool {
    match (Url::parse(current), Url::parse(requested)) {
        (Ok(a), Ok(b)) => a == b,
        _ => current == requested,
    }
}
