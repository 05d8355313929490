// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Batch Dispatcher
 * Runs planned batches against each target on a bounded pool of renderer
 * sessions, localizes conflicting parameters and re-runs once without them
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use super::detector::ReflectionDetector;
use super::localizer::{AnomalyPredicate, ConflictLocalizer, Localization, SessionProbe};
use super::marker::MarkerCodec;
use super::planner::BatchPlanner;
use super::stabilizer::{ContentStabilizer, StabilizerSettings};
use crate::config::FuzzerConfig;
use crate::errors::{describe_batch, FuzzError, FuzzResult};
use crate::renderer::{RenderSession, Renderer};
use crate::reporting::artifacts::ArtifactStore;
use crate::types::{
    is_success_status, Batch, FuzzMode, LoadCondition, RunReport, ScreenshotHit, TargetReport,
    TestOutcome,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Everything a run needs besides the renderer
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub mode: FuzzMode,
    pub workers: usize,
    pub max_url_length: usize,
    pub codec: MarkerCodec,
    pub control: Option<String>,
    pub cooldown: Duration,
    pub stabilizer: StabilizerSettings,
    pub load_condition: LoadCondition,
    pub navigation_timeout: Option<Duration>,
    pub fresh_session_per_batch: bool,
    pub baseline_check: bool,
    pub fail_on_unstable_baseline: bool,
    pub screenshots: bool,
    pub save_responses: bool,
}

impl DispatchSettings {
    pub fn from_config(config: &FuzzerConfig, mode: FuzzMode) -> FuzzResult<Self> {
        let fuzzing = &config.fuzzing;
        let stabilization = &fuzzing.stabilization;

        Ok(Self {
            mode,
            workers: fuzzing.workers.max(1),
            max_url_length: fuzzing.max_url_length,
            codec: MarkerCodec::new(&fuzzing.marker_prefix)?,
            control: fuzzing.control_for(mode),
            cooldown: fuzzing.cooldown(mode),
            stabilizer: StabilizerSettings {
                poll_interval: stabilization.poll_interval(),
                stable_threshold: stabilization.stable_threshold,
                max_snapshot_retries: stabilization.max_snapshot_retries,
            },
            load_condition: config.browser.load_condition,
            navigation_timeout: config.browser.navigation_timeout(),
            fresh_session_per_batch: fuzzing.fresh_session_per_batch,
            baseline_check: fuzzing.baseline_check,
            fail_on_unstable_baseline: fuzzing.fail_on_unstable_baseline,
            screenshots: config.output.screenshots,
            save_responses: config.output.save_responses,
        })
    }
}

/// Facts accumulated by all workers of one target
#[derive(Debug, Default)]
struct TargetState {
    reflected: BTreeSet<String>,
    bad: BTreeSet<String>,
    redirect: Option<String>,
    screenshots: Vec<ScreenshotHit>,
    tested: usize,
    failed: usize,
    unlocalized: usize,
}

pub struct Dispatcher {
    renderer: Arc<dyn Renderer>,
    settings: Arc<DispatchSettings>,
    artifacts: Option<Arc<ArtifactStore>>,
}

impl Dispatcher {
    pub fn new(renderer: Arc<dyn Renderer>, settings: DispatchSettings) -> Self {
        Self {
            renderer,
            settings: Arc::new(settings),
            artifacts: None,
        }
    }

    pub fn with_artifacts(mut self, store: ArtifactStore) -> Self {
        self.artifacts = Some(Arc::new(store));
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    fn planner(&self) -> BatchPlanner {
        BatchPlanner::new(
            self.settings.codec.clone(),
            self.settings.max_url_length,
            self.settings.control.clone(),
        )
    }

    /// Fuzz every target in order. Only fatal errors end the run early.
    pub async fn run(&self, targets: &[String], parameters: &[String]) -> FuzzResult<RunReport> {
        self.settings.codec.validate_parameters(parameters)?;

        let started_at = chrono::Utc::now().to_rfc3339();
        info!(
            "[Dispatcher] {} mode: {} targets, {} parameters, {} workers via {}",
            self.settings.mode,
            targets.len(),
            parameters.len(),
            self.settings.workers,
            self.renderer.name()
        );

        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            reports.push(self.run_target(target, parameters).await?);
        }

        Ok(RunReport {
            mode: self.settings.mode,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            parameters_loaded: parameters.len(),
            targets: reports,
        })
    }

    /// Fuzz one target starting from the full parameter list
    pub async fn run_target(&self, target: &str, parameters: &[String]) -> FuzzResult<TargetReport> {
        info!("[Dispatcher] Testing {}", target);

        if self.settings.baseline_check {
            self.check_baseline(target).await?;
        }

        let run = Arc::new(TargetRun {
            target: target.to_string(),
            renderer: Arc::clone(&self.renderer),
            settings: Arc::clone(&self.settings),
            detector: ReflectionDetector::new(self.settings.codec.clone()),
            predicate: AnomalyPredicate::new(
                self.settings.mode,
                self.settings.control.clone(),
                ReflectionDetector::new(self.settings.codec.clone()),
            ),
            stabilizer: ContentStabilizer::new(self.settings.stabilizer.clone()),
            artifacts: self.artifacts.clone(),
            state: Mutex::new(TargetState::default()),
        });

        let planner = self.planner();
        let mut live: Vec<String> = parameters.to_vec();

        let batches = planner.plan(&live, target);
        let mut planned = batches.len();
        info!(
            "[Dispatcher] Fuzzing {} params in {} batches",
            live.len(),
            batches.len()
        );
        run_pass(&run, batches, 1).await?;

        let conflicts = run.state.lock().bad.clone();
        let retried = !conflicts.is_empty();
        if retried {
            live.retain(|p| !conflicts.contains(p));
            let batches = planner.plan(&live, target);
            planned += batches.len();
            info!(
                "[Dispatcher] Retrying without {} conflicting params ({} batches)",
                conflicts.len(),
                batches.len()
            );
            run_pass(&run, batches, 2).await?;
        }

        let state = std::mem::take(&mut *run.state.lock());
        let report = TargetReport {
            target: target.to_string(),
            reflected: state.reflected,
            redirect: state.redirect,
            bad_parameters: state.bad,
            batches_planned: planned,
            batches_tested: state.tested,
            batches_failed: state.failed,
            unlocalized_anomalies: state.unlocalized,
            retried,
            screenshots: state.screenshots,
        };

        info!(
            "[Dispatcher] {} done: {} reflected, {} conflicting, {}/{} batches tested",
            target,
            report.reflected.len(),
            report.bad_parameters.len(),
            report.batches_tested,
            report.batches_planned
        );
        Ok(report)
    }

    async fn check_baseline(&self, target: &str) -> FuzzResult<()> {
        let mut session = self
            .renderer
            .open_session()
            .await
            .map_err(|e| FuzzError::render(target, &[], e))?;
        let navigation = session
            .navigate(
                target,
                self.settings.load_condition,
                self.settings.navigation_timeout,
            )
            .await;
        session.close().await;

        match navigation {
            Ok(nav) if is_success_status(nav.status) => {
                debug!("[Dispatcher] Baseline {} answered {}", target, nav.status);
                Ok(())
            }
            Ok(nav) => {
                let err = FuzzError::FatalUpstream {
                    url: target.to_string(),
                    status: nav.status,
                };
                if self.settings.fail_on_unstable_baseline {
                    Err(err)
                } else {
                    warn!("[Dispatcher] Unstable baseline: {}", err);
                    Ok(())
                }
            }
            Err(e) => {
                warn!("[Dispatcher] Baseline request failed: {}", e);
                Ok(())
            }
        }
    }
}

/// Split `batches` round-robin over the worker pool and wait for all workers
async fn run_pass(run: &Arc<TargetRun>, batches: Vec<Batch>, pass: u8) -> FuzzResult<()> {
    let workers = run.settings.workers.min(batches.len());
    if workers == 0 {
        return Ok(());
    }

    let mut groups: Vec<Vec<Batch>> = vec![Vec::new(); workers];
    for (i, batch) in batches.into_iter().enumerate() {
        groups[i % workers].push(batch);
    }

    let mut join_set = JoinSet::new();
    for (worker_id, group) in groups.into_iter().enumerate() {
        let run = Arc::clone(run);
        join_set.spawn(async move { run.run_worker(worker_id, group, pass).await });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_fatal() => {
                error!("[Dispatcher] Aborting remaining workers: {}", e);
                join_set.abort_all();
                return Err(e);
            }
            Ok(Err(e)) => warn!("[Dispatcher] Worker finished with error: {}", e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("[Dispatcher] Worker task panicked: {}", e),
        }
    }

    Ok(())
}

struct TargetRun {
    target: String,
    renderer: Arc<dyn Renderer>,
    settings: Arc<DispatchSettings>,
    detector: ReflectionDetector,
    predicate: AnomalyPredicate,
    stabilizer: ContentStabilizer,
    artifacts: Option<Arc<ArtifactStore>>,
    state: Mutex<TargetState>,
}

impl TargetRun {
    async fn run_worker(&self, worker_id: usize, batches: Vec<Batch>, pass: u8) -> FuzzResult<()> {
        debug!("[Worker {}] {} batches", worker_id, batches.len());
        let mut session: Option<Box<dyn RenderSession>> = None;

        for batch in batches {
            if session.is_none() {
                match self.renderer.open_session().await {
                    Ok(s) => session = Some(s),
                    Err(e) => {
                        let err = FuzzError::render(&self.target, batch.params(), e);
                        warn!("[Worker {}] {}", worker_id, err);
                        self.state.lock().failed += 1;
                        tokio::time::sleep(self.settings.cooldown).await;
                        continue;
                    }
                }
            }
            let Some(active) = session.as_mut() else {
                continue;
            };

            let mut discard_session = self.settings.fresh_session_per_batch;
            match self.test_batch(active.as_mut(), &batch).await {
                Ok(outcome) => {
                    if let Err(e) = self.record(active.as_mut(), &batch, outcome, pass).await {
                        if e.is_fatal() {
                            active.close().await;
                            return Err(e);
                        }
                        warn!("[Worker {}] {}", worker_id, e);
                    }
                }
                Err(e) => {
                    warn!("[Worker {}] Batch {} skipped: {}", worker_id, batch.index(), e);
                    self.state.lock().failed += 1;
                    // The page may be wedged; start the next batch on a clean session
                    discard_session = true;
                }
            }

            if discard_session {
                if let Some(mut s) = session.take() {
                    s.close().await;
                }
            }

            tokio::time::sleep(self.settings.cooldown).await;
        }

        if let Some(mut s) = session.take() {
            s.close().await;
        }
        Ok(())
    }

    /// Load one batch and classify the result
    async fn test_batch(&self, session: &mut dyn RenderSession, batch: &Batch) -> FuzzResult<TestOutcome> {
        let settings = &self.settings;
        let test_url = settings
            .codec
            .build_url(&self.target, batch.params(), settings.control.as_deref());

        let navigation = session
            .navigate(&test_url, settings.load_condition, settings.navigation_timeout)
            .await
            .map_err(|e| FuzzError::render(&test_url, batch.params(), e))?;

        let (content, rounds, redirect) = match settings.mode {
            FuzzMode::Reflection => {
                let stable = self
                    .stabilizer
                    .stabilize(session, &test_url)
                    .await
                    .map_err(|e| FuzzError::render(&test_url, batch.params(), e))?;
                (stable.content, stable.rounds, stable.redirect)
            }
            FuzzMode::Status if settings.save_responses => {
                let content = session
                    .content()
                    .await
                    .map_err(|e| FuzzError::render(&test_url, batch.params(), e))?;
                (content, 0, None)
            }
            FuzzMode::Status => (String::new(), 0, None),
        };

        let mut reflected = match settings.mode {
            FuzzMode::Reflection => self.detector.reflected_parameters_with(
                batch.params(),
                settings.control.as_deref(),
                &content,
            ),
            FuzzMode::Status => Vec::new(),
        };
        let anomalous = self
            .predicate
            .evaluate(navigation.status, batch.params(), &content);

        if settings.mode == FuzzMode::Reflection && !anomalous {
            if let Some(control) = &settings.control {
                reflected.push(control.clone());
            }
        }

        Ok(TestOutcome {
            target: self.target.clone(),
            batch_index: batch.index(),
            test_url,
            final_url: navigation.final_url,
            status: navigation.status,
            content,
            stabilization_rounds: rounds,
            redirect,
            reflected,
            anomalous,
        })
    }

    async fn record(
        &self,
        session: &mut dyn RenderSession,
        batch: &Batch,
        outcome: TestOutcome,
        pass: u8,
    ) -> FuzzResult<()> {
        let hits: Vec<String> = outcome
            .reflected
            .iter()
            .filter(|p| self.settings.control.as_ref() != Some(*p))
            .cloned()
            .collect();

        {
            let mut state = self.state.lock();
            state.tested += 1;
            state.reflected.extend(outcome.reflected.iter().cloned());
            if let Some(redirect) = &outcome.redirect {
                if state.redirect.is_none() {
                    state.redirect = Some(redirect.clone());
                }
            }
        }

        if !hits.is_empty() {
            info!(
                "[Dispatcher] Batch {}: reflected {}",
                outcome.batch_index,
                hits.join(", ")
            );
        } else {
            debug!(
                "[Dispatcher] Batch {}: HTTP {}, {} stabilization rounds, nothing reflected",
                outcome.batch_index, outcome.status, outcome.stabilization_rounds
            );
        }

        let seed = format!("{}_batch{}_pass{}", self.target, outcome.batch_index, pass);
        if let Some(store) = &self.artifacts {
            if self.settings.save_responses {
                if let Err(e) = store.save_response(&seed, &outcome.content).await {
                    warn!("[Artifacts] {}", e);
                }
            }

            if self.settings.screenshots
                && self.settings.mode == FuzzMode::Reflection
                && !hits.is_empty()
            {
                let path = store.screenshot_path(&seed);
                match session.screenshot(&path, true).await {
                    Ok(()) => {
                        let image = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        self.state.lock().screenshots.push(ScreenshotHit {
                            parameters: hits.clone(),
                            url: outcome.test_url.clone(),
                            image,
                        });
                    }
                    Err(e) => warn!("[Artifacts] Screenshot of batch {} failed: {}", batch.index(), e),
                }
            }
        }

        if outcome.anomalous {
            self.localize(batch, &outcome).await;
        }

        Ok(())
    }

    async fn localize(&self, batch: &Batch, outcome: &TestOutcome) {
        match self.settings.mode {
            FuzzMode::Status => {
                let anomaly = FuzzError::AnomalousStatus {
                    url: outcome.test_url.clone(),
                    status: outcome.status,
                };
                warn!("[Dispatcher] {}, checking batch {} for conflicts", anomaly, batch.index());
            }
            FuzzMode::Reflection => warn!(
                "[Dispatcher] Control parameter not reflected in batch {}, checking for conflicts",
                batch.index()
            ),
        }

        let settings = &self.settings;
        let mut probe = SessionProbe::new(
            Arc::clone(&self.renderer),
            settings.codec.clone(),
            self.predicate.clone(),
            &self.target,
            settings.control.clone(),
        )
        .with_navigation(settings.load_condition, settings.navigation_timeout);
        if settings.mode == FuzzMode::Reflection {
            probe = probe.with_stabilizer(self.stabilizer.clone());
        }

        match ConflictLocalizer::new(probe).localize(batch.params()).await {
            Ok(report) => match report.outcome {
                Localization::Found(culprit) => {
                    warn!("[Dispatcher] Conflict found: {}", culprit);
                    self.state.lock().bad.insert(culprit);
                }
                Localization::Unlocalizable => {
                    let err = FuzzError::UnlocalizableConflict {
                        url: outcome.test_url.clone(),
                        batch: describe_batch(batch.params()),
                    };
                    warn!("[Dispatcher] {}", err);
                    self.state.lock().unlocalized += 1;
                }
            },
            Err(e) => {
                warn!("[Localizer] Aborted for batch {}: {}", batch.index(), e);
                self.state.lock().failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{ScriptedPage, ScriptedRenderer};

    fn settings(mode: FuzzMode) -> DispatchSettings {
        let mut config = FuzzerConfig::default();
        config.fuzzing.workers = 3;
        config.fuzzing.cooldown_ms = Some(0);
        config.fuzzing.stabilization.poll_interval_ms = 1;
        config.fuzzing.stabilization.stable_threshold = 2;
        DispatchSettings::from_config(&config, mode).unwrap()
    }

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Echoes the query string back, like a search page would
    fn echo_page(url: &str) -> ScriptedPage {
        ScriptedPage::ok(format!("<html>{}</html>", url))
    }

    #[test]
    fn test_settings_from_config() {
        let s = settings(FuzzMode::Status);
        assert_eq!(s.control, None);
        assert_eq!(s.workers, 3);
        assert_eq!(s.cooldown, Duration::ZERO);

        let r = settings(FuzzMode::Reflection);
        assert_eq!(r.control.as_deref(), Some("name"));
    }

    #[tokio::test]
    async fn test_reflections_collected_across_workers() {
        let renderer = ScriptedRenderer::new(|url| {
            // Only `q` and `lang` make it into the page, plus the control
            let mut body = String::from("<html>");
            for p in ["q", "lang", "name"] {
                if url.contains(&format!("{}=XSSFOUND123{}", p, p)) {
                    body.push_str(&format!("XSSFOUND123{} ", p));
                }
            }
            ScriptedPage::ok(body)
        });
        let stats = renderer.stats();

        let mut s = settings(FuzzMode::Reflection);
        s.max_url_length = 120;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s);

        let names: Vec<String> = (0..40)
            .map(|i| format!("p{}", i))
            .chain(params(&["q", "lang"]))
            .collect();
        let report = dispatcher.run_target("http://t/search", &names).await.unwrap();

        assert!(report.batches_planned > 3);
        assert_eq!(report.batches_tested, report.batches_planned);
        assert!(report.reflected.contains("q"));
        assert!(report.reflected.contains("lang"));
        assert!(report.reflected.contains("name"));
        assert_eq!(report.reflected.len(), 3);
        assert!(report.bad_parameters.is_empty());
        assert!(!report.retried);
        assert_eq!(stats.open_sessions(), 0);
        assert!(stats.sessions_opened.load(std::sync::atomic::Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_conflict_is_removed_and_retried_once() {
        // `debug` breaks the page so nothing is reflected
        let renderer = ScriptedRenderer::new(|url| {
            if url.contains("debug=") {
                ScriptedPage::with_status(500, "error")
            } else {
                echo_page(url)
            }
        });

        let mut s = settings(FuzzMode::Reflection);
        s.workers = 2;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s);

        let names = params(&["x", "b", "debug", "c"]);
        let report = dispatcher.run_target("http://t/", &names).await.unwrap();

        assert!(report.retried);
        assert_eq!(report.bad_parameters.iter().collect::<Vec<_>>(), vec!["debug"]);
        for p in ["x", "b", "c", "name"] {
            assert!(report.reflected.contains(p), "{} missing", p);
        }
        assert!(!report.reflected.contains("debug"));
    }

    #[tokio::test]
    async fn test_status_mode_localizes_bad_parameter() {
        let renderer = ScriptedRenderer::new(|url| {
            if url.contains("cmd=") {
                ScriptedPage::with_status(403, "forbidden")
            } else {
                ScriptedPage::ok("fine")
            }
        });

        let dispatcher = Dispatcher::new(Arc::new(renderer), settings(FuzzMode::Status));
        let names: Vec<String> = (0..30).map(|i| format!("p{}", i)).chain(params(&["cmd"])).collect();
        let report = dispatcher.run_target("http://t/", &names).await.unwrap();

        assert!(report.bad_parameters.contains("cmd"));
        assert_eq!(report.bad_parameters.len(), 1);
        assert!(report.reflected.is_empty());
        assert!(report.retried);
    }

    #[tokio::test]
    async fn test_redirect_recorded() {
        let renderer = ScriptedRenderer::new(|url| {
            ScriptedPage::ok(url.to_string()).redirect_to("http://t/login", 0)
        });

        let dispatcher = Dispatcher::new(Arc::new(renderer), settings(FuzzMode::Reflection));
        let report = dispatcher
            .run_target("http://t/app", &params(&["q"]))
            .await
            .unwrap();

        assert_eq!(report.redirect.as_deref(), Some("http://t/login"));
        // First snapshot still had the markers
        assert!(report.reflected.contains("q"));
    }

    #[tokio::test]
    async fn test_render_failures_skip_only_that_batch() {
        let renderer = ScriptedRenderer::new(|url| {
            if url.contains("p0=") {
                ScriptedPage::failing("net::ERR_CONNECTION_RESET")
            } else {
                echo_page(url)
            }
        });
        let stats = renderer.stats();

        let mut s = settings(FuzzMode::Reflection);
        s.max_url_length = 60;
        s.workers = 1;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s);

        let names: Vec<String> = (0..6).map(|i| format!("p{}", i)).collect();
        let report = dispatcher.run_target("http://t/", &names).await.unwrap();

        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.batches_tested, report.batches_planned - 1);
        assert!(report.reflected.contains("p5"));
        assert_eq!(stats.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_fatal_baseline_aborts() {
        let renderer = ScriptedRenderer::new(|_| ScriptedPage::with_status(503, "down"));
        let stats = renderer.stats();

        let mut s = settings(FuzzMode::Reflection);
        s.baseline_check = true;
        s.fail_on_unstable_baseline = true;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s);

        let err = dispatcher
            .run(&params(&["http://t/"]), &params(&["q"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FuzzError::FatalUpstream { status: 503, .. }));
        assert_eq!(stats.navigations(), 1);
    }

    #[tokio::test]
    async fn test_unstable_baseline_only_warns() {
        let renderer = ScriptedRenderer::new(|url| {
            if url.contains('?') {
                echo_page(url)
            } else {
                ScriptedPage::with_status(404, "not found")
            }
        });

        let mut s = settings(FuzzMode::Reflection);
        s.baseline_check = true;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s);
        let report = dispatcher.run_target("http://t/", &params(&["q"])).await.unwrap();
        assert!(report.reflected.contains("q"));
    }

    #[tokio::test]
    async fn test_parameter_containing_prefix_is_rejected_before_navigation() {
        let renderer = ScriptedRenderer::new(echo_page);
        let stats = renderer.stats();
        let dispatcher = Dispatcher::new(Arc::new(renderer), settings(FuzzMode::Reflection));

        let err = dispatcher
            .run(&params(&["http://t/"]), &params(&["XSSFOUND123x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FuzzError::Configuration(_)));
        assert_eq!(stats.navigations(), 0);
    }

    #[tokio::test]
    async fn test_each_target_starts_from_full_list() {
        let renderer = ScriptedRenderer::new(|url| {
            if url.starts_with("http://a/") && url.contains("debug=") {
                ScriptedPage::with_status(500, "")
            } else {
                echo_page(url)
            }
        });

        let dispatcher = Dispatcher::new(Arc::new(renderer), settings(FuzzMode::Reflection));
        let report = dispatcher
            .run(&params(&["http://a/", "http://b/"]), &params(&["q", "debug"]))
            .await
            .unwrap();

        assert!(report.targets[0].bad_parameters.contains("debug"));
        assert!(report.targets[1].bad_parameters.is_empty());
        assert!(report.targets[1].reflected.contains("debug"));
        assert_eq!(report.parameters_loaded, 2);
    }

    #[tokio::test]
    async fn test_screenshots_and_responses_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.prepare(true, true).await.unwrap();

        let renderer = ScriptedRenderer::new(echo_page);
        let mut s = settings(FuzzMode::Reflection);
        s.screenshots = true;
        s.save_responses = true;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s).with_artifacts(store.clone());

        let report = dispatcher.run_target("http://t/", &params(&["q"])).await.unwrap();

        assert_eq!(report.screenshots.len(), 1);
        assert_eq!(report.screenshots[0].parameters, vec!["q".to_string()]);
        assert!(store.screenshots_dir().join(&report.screenshots[0].image).exists());
        assert_eq!(std::fs::read_dir(store.responses_dir()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_long_target_batches_get_their_own_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.prepare(true, true).await.unwrap();

        let target = format!("http://t/{}", "x".repeat(200));
        let renderer = ScriptedRenderer::new(echo_page);
        let mut s = settings(FuzzMode::Reflection);
        s.screenshots = true;
        s.save_responses = true;
        // One parameter per batch
        s.max_url_length = target.len() + 50;
        let dispatcher = Dispatcher::new(Arc::new(renderer), s).with_artifacts(store.clone());

        let report = dispatcher
            .run_target(&target, &params(&["alpha", "bravo"]))
            .await
            .unwrap();

        assert_eq!(report.batches_planned, 2);
        assert_eq!(report.screenshots.len(), 2);
        assert_ne!(report.screenshots[0].image, report.screenshots[1].image);
        assert_eq!(std::fs::read_dir(store.responses_dir()).unwrap().count(), 2);
        let images = std::fs::read_dir(store.screenshots_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
            .count();
        assert_eq!(images, 2);
    }
}
