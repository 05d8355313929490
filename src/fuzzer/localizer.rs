// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Conflict Localizer
 * Bisects an anomalous batch down to the single parameter causing it
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use super::detector::ReflectionDetector;
use super::marker::MarkerCodec;
use super::stabilizer::ContentStabilizer;
use crate::errors::{FuzzError, FuzzResult};
use crate::renderer::{RenderSession, Renderer};
use crate::types::{is_success_status, FuzzMode, LoadCondition};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decides whether one observed page is anomalous for the current mode
#[derive(Debug, Clone)]
pub struct AnomalyPredicate {
    mode: FuzzMode,
    control: Option<String>,
    detector: ReflectionDetector,
}

impl AnomalyPredicate {
    pub fn new(mode: FuzzMode, control: Option<String>, detector: ReflectionDetector) -> Self {
        Self {
            mode,
            control,
            detector,
        }
    }

    pub fn mode(&self) -> FuzzMode {
        self.mode
    }

    /// Whether `content` is needed at all to evaluate this predicate
    pub fn needs_content(&self) -> bool {
        self.mode == FuzzMode::Reflection
    }

    pub fn evaluate(&self, status: u16, batch: &[String], content: &str) -> bool {
        match self.mode {
            FuzzMode::Status => !is_success_status(status),
            FuzzMode::Reflection => match &self.control {
                Some(control) => !self.detector.reflected(control, batch, content),
                None => false,
            },
        }
    }
}

/// Reproduces a batch with a subset of its parameters
#[async_trait]
pub trait AnomalyProbe: Send + Sync {
    async fn is_anomalous(&self, params: &[String]) -> FuzzResult<bool>;
}

/// Probes through an isolated renderer session per call
pub struct SessionProbe {
    renderer: Arc<dyn Renderer>,
    codec: MarkerCodec,
    predicate: AnomalyPredicate,
    stabilizer: Option<ContentStabilizer>,
    base_url: String,
    control: Option<String>,
    load_condition: LoadCondition,
    timeout: Option<Duration>,
}

impl SessionProbe {
    pub fn new(
        renderer: Arc<dyn Renderer>,
        codec: MarkerCodec,
        predicate: AnomalyPredicate,
        base_url: &str,
        control: Option<String>,
    ) -> Self {
        Self {
            renderer,
            codec,
            predicate,
            stabilizer: None,
            base_url: base_url.to_string(),
            control,
            load_condition: LoadCondition::default(),
            timeout: Some(Duration::from_secs(15)),
        }
    }

    /// Let probed pages settle the same way batch pages do
    pub fn with_stabilizer(mut self, stabilizer: ContentStabilizer) -> Self {
        self.stabilizer = Some(stabilizer);
        self
    }

    pub fn with_navigation(mut self, load_condition: LoadCondition, timeout: Option<Duration>) -> Self {
        self.load_condition = load_condition;
        self.timeout = timeout;
        self
    }

    async fn observe(
        &self,
        session: &mut dyn RenderSession,
        url: &str,
        params: &[String],
    ) -> FuzzResult<bool> {
        let navigation = session
            .navigate(url, self.load_condition, self.timeout)
            .await
            .map_err(|e| FuzzError::render(url, params, e))?;

        if !self.predicate.needs_content() {
            return Ok(self.predicate.evaluate(navigation.status, params, ""));
        }

        let content = match &self.stabilizer {
            Some(stabilizer) => stabilizer
                .stabilize(session, url)
                .await
                .map(|s| s.content),
            None => session.content().await,
        }
        .map_err(|e| FuzzError::render(url, params, e))?;

        Ok(self.predicate.evaluate(navigation.status, params, &content))
    }
}

#[async_trait]
impl AnomalyProbe for SessionProbe {
    async fn is_anomalous(&self, params: &[String]) -> FuzzResult<bool> {
        let url = self
            .codec
            .build_url(&self.base_url, params, self.control.as_deref());

        let mut session = self
            .renderer
            .open_session()
            .await
            .map_err(|e| FuzzError::render(&url, params, e))?;

        let result = self.observe(session.as_mut(), &url, params).await;
        session.close().await;
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Localization {
    Found(String),
    /// No single parameter reproduces the anomaly on its own
    Unlocalizable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizationReport {
    pub outcome: Localization,
    pub probes: usize,
}

/// Upper bound on probes for one deterministic culprit in a batch of `n`
pub fn max_probes(n: usize) -> usize {
    if n <= 1 {
        return n;
    }
    let ceil_log2 = (usize::BITS - (n - 1).leading_zeros()) as usize;
    ceil_log2 + 1
}

/// One pending range of the batch
#[derive(Debug, Clone, Copy)]
struct Frame {
    start: usize,
    end: usize,
    /// Known anomalous without probing: the root, or a right half whose
    /// left sibling came back clean
    inferred: bool,
    is_left: bool,
}

impl Frame {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

pub struct ConflictLocalizer<P> {
    probe: P,
}

impl<P: AnomalyProbe> ConflictLocalizer<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    /// Find the parameter of `batch` responsible for its anomaly.
    ///
    /// The batch itself is already known to be anomalous and is not probed
    /// again. Left halves are probed before right halves; a clean left half
    /// lets the right half be descended into without probing it.
    pub async fn localize(&self, batch: &[String]) -> FuzzResult<LocalizationReport> {
        let mut probes = 0usize;

        let mut stack = Vec::new();
        if !batch.is_empty() {
            stack.push(Frame {
                start: 0,
                end: batch.len(),
                inferred: true,
                is_left: false,
            });
        }

        while let Some(frame) = stack.pop() {
            let range = &batch[frame.start..frame.end];

            let anomalous = if frame.len() == 1 || !frame.inferred {
                probes += 1;
                self.probe.is_anomalous(range).await?
            } else {
                true
            };

            if !anomalous {
                if frame.is_left {
                    if let Some(sibling) = stack.last_mut() {
                        sibling.inferred = true;
                    }
                }
                continue;
            }

            if frame.len() == 1 {
                let culprit = range[0].clone();
                info!(
                    "[Localizer] Conflicting parameter '{}' isolated in {} probes",
                    culprit, probes
                );
                return Ok(LocalizationReport {
                    outcome: Localization::Found(culprit),
                    probes,
                });
            }

            let mid = frame.start + frame.len().div_ceil(2);
            debug!(
                "[Localizer] Splitting [{}..{}) at {}",
                frame.start, frame.end, mid
            );
            stack.push(Frame {
                start: mid,
                end: frame.end,
                inferred: false,
                is_left: false,
            });
            stack.push(Frame {
                start: frame.start,
                end: mid,
                inferred: false,
                is_left: true,
            });
        }

        warn!(
            "[Localizer] No single parameter reproduces the anomaly ({} params, {} probes)",
            batch.len(),
            probes
        );
        Ok(LocalizationReport {
            outcome: Localization::Unlocalizable,
            probes,
        })
    }
}
