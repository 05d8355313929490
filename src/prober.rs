// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - URL Prober
 * Visits a URL list with a pool of renderer sessions and records status,
 * size, title and fingerprinting headers, optionally with screenshots
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::errors::{FuzzError, FuzzResult};
use crate::renderer::{Navigation, RenderSession, Renderer};
use crate::reporting::artifacts::ArtifactStore;
use crate::reporting::formats::html::{HtmlReportGenerator, ScreenshotRow};
use crate::types::LoadCondition;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub workers: usize,
    pub show_status: bool,
    pub show_length: bool,
    pub screenshots: bool,
    pub load_condition: LoadCondition,
    pub navigation_timeout: Option<Duration>,
    /// Line output, truncated at start and appended as results arrive
    pub output: Option<PathBuf>,
    /// Echo result lines to stdout
    pub print: bool,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            show_status: false,
            show_length: false,
            screenshots: false,
            load_condition: LoadCondition::NetworkIdle,
            navigation_timeout: Some(Duration::from_secs(20)),
            output: None,
            print: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProbeRecord {
    pub url: String,
    pub status: Option<u16>,
    pub length: Option<usize>,
    pub title: Option<String>,
    pub server: Option<String>,
    pub powered_by: Option<String>,
    pub screenshot: Option<String>,
    pub error: Option<String>,
}

impl ProbeRecord {
    fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// `url [status] [length]`, or `url [ERROR: message]`
    pub fn line(&self, show_status: bool, show_length: bool) -> String {
        if let Some(err) = &self.error {
            return format!("{} [ERROR: {}]", self.url, err);
        }

        let mut parts = vec![self.url.clone()];
        if show_status {
            if let Some(status) = self.status {
                parts.push(format!("[{}]", status));
            }
        }
        if show_length {
            if let Some(length) = self.length {
                parts.push(format!("[{}]", length));
            }
        }
        parts.join(" ")
    }

    pub fn screenshot_row(&self) -> Option<ScreenshotRow> {
        let image = self.screenshot.clone()?;

        let mut fields = vec![
            ("URL".to_string(), self.url.clone()),
            ("Title".to_string(), self.title.clone().unwrap_or_default()),
            (
                "Status".to_string(),
                self.status.map(|s| s.to_string()).unwrap_or_default(),
            ),
            (
                "Length".to_string(),
                self.length.map(|l| l.to_string()).unwrap_or_default(),
            ),
        ];
        if let Some(server) = &self.server {
            fields.push(("Server".to_string(), server.clone()));
        }
        if let Some(powered_by) = &self.powered_by {
            fields.push(("X-Powered-By".to_string(), powered_by.clone()));
        }

        Some(ScreenshotRow { fields, image })
    }
}

/// First `<title>` in the document, whitespace collapsed
pub fn extract_title(html: &str) -> Option<String> {
    TITLE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| WHITESPACE_RE.replace_all(m.as_str().trim(), " ").into_owned())
}

pub struct UrlProber {
    renderer: Arc<dyn Renderer>,
    settings: Arc<ProbeSettings>,
    artifacts: Option<Arc<ArtifactStore>>,
}

impl UrlProber {
    pub fn new(renderer: Arc<dyn Renderer>, settings: ProbeSettings) -> Self {
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

    /// Visit every URL once. Records come back in completion order.
    pub async fn probe(&self, urls: &[String]) -> FuzzResult<Vec<ProbeRecord>> {
        let mut output = match &self.settings.output {
            Some(path) => Some(
                tokio::fs::File::create(path)
                    .await
                    .map_err(|e| FuzzError::io(path, e))?,
            ),
            None => None,
        };

        let urls: Arc<[String]> = urls.to_vec().into();
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.settings.workers.max(1).min(urls.len());
        let (tx, mut rx) = mpsc::unbounded_channel();

        info!("[Prober] Visiting {} URLs with {} workers", urls.len(), workers);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let worker = ProbeWorker {
                id: worker_id,
                renderer: Arc::clone(&self.renderer),
                settings: Arc::clone(&self.settings),
                artifacts: self.artifacts.clone(),
                urls: Arc::clone(&urls),
                cursor: Arc::clone(&cursor),
                tx: tx.clone(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(tx);

        let mut records = Vec::with_capacity(urls.len());
        while let Some(record) = rx.recv().await {
            let line = record.line(self.settings.show_status, self.settings.show_length);
            if self.settings.print {
                println!("{}", line);
            }
            if let (Some(file), Some(path)) = (output.as_mut(), &self.settings.output) {
                file.write_all(format!("{}\n", line).as_bytes())
                    .await
                    .map_err(|e| FuzzError::io(path, e))?;
            }
            records.push(record);
        }

        for joined in futures::future::join_all(handles).await {
            if let Err(e) = joined {
                warn!("[Prober] Worker task failed: {}", e);
            }
        }

        if let (Some(file), Some(path)) = (output.as_mut(), &self.settings.output) {
            file.flush().await.map_err(|e| FuzzError::io(path, e))?;
        }

        if self.settings.screenshots {
            self.write_index(&records).await?;
        }

        Ok(records)
    }

    async fn write_index(&self, records: &[ProbeRecord]) -> FuzzResult<()> {
        let Some(store) = &self.artifacts else {
            return Ok(());
        };

        let rows: Vec<ScreenshotRow> = records.iter().filter_map(|r| r.screenshot_row()).collect();
        let html = HtmlReportGenerator::new().generate("Screenshot Report", &rows);
        let path = store.write_screenshot_index(&html).await?;
        info!("[Prober] Screenshot report written to {}", path.display());
        Ok(())
    }
}

struct ProbeWorker {
    id: usize,
    renderer: Arc<dyn Renderer>,
    settings: Arc<ProbeSettings>,
    artifacts: Option<Arc<ArtifactStore>>,
    urls: Arc<[String]>,
    cursor: Arc<AtomicUsize>,
    tx: mpsc::UnboundedSender<ProbeRecord>,
}

impl ProbeWorker {
    async fn run(self) {
        let mut session: Option<Box<dyn RenderSession>> = None;

        loop {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(url) = self.urls.get(index) else {
                break;
            };

            if session.is_none() {
                match self.renderer.open_session().await {
                    Ok(s) => session = Some(s),
                    Err(e) => {
                        let _ = self.tx.send(ProbeRecord::failed(url, e));
                        continue;
                    }
                }
            }

            if let Some(active) = session.as_mut() {
                let record = self.visit(active.as_mut(), url).await;
                if record.error.is_some() {
                    // Start over on a clean page after a failure
                    active.close().await;
                    session = None;
                }
                if self.tx.send(record).is_err() {
                    break;
                }
            }
        }

        if let Some(mut s) = session {
            s.close().await;
        }
        debug!("[Prober] Worker {} done", self.id);
    }

    async fn visit(&self, session: &mut dyn RenderSession, url: &str) -> ProbeRecord {
        let navigation = match session
            .navigate(url, self.settings.load_condition, self.settings.navigation_timeout)
            .await
        {
            Ok(nav) => nav,
            Err(e) => return ProbeRecord::failed(url, e),
        };

        let content = match session.content().await {
            Ok(c) => c,
            Err(e) => return ProbeRecord::failed(url, e),
        };

        let mut record = self.describe(url, &navigation, &content);

        if self.settings.screenshots {
            if let Some(store) = &self.artifacts {
                let path = store.screenshot_path(url);
                match session.screenshot(&path, true).await {
                    Ok(()) => {
                        record.screenshot = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned());
                    }
                    Err(e) => warn!("[Prober] Screenshot of {} failed: {}", url, e),
                }
            }
        }

        record
    }

    fn describe(&self, url: &str, navigation: &Navigation, content: &str) -> ProbeRecord {
        ProbeRecord {
            url: url.to_string(),
            status: Some(navigation.status),
            length: Some(content.len()),
            title: extract_title(content),
            server: navigation.header("server").map(str::to_string),
            powered_by: navigation.header("x-powered-by").map(str::to_string),
            screenshot: None,
            error: None,
        }
    }
}
