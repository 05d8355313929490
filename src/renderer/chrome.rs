// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Headless Chrome backend.
//! headless_chrome is synchronous, so every call runs on the blocking pool.

use super::{Navigation, RenderSession, Renderer, SessionOptions};
use crate::errors::RenderError;
use crate::types::LoadCondition;
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network::events::ResponseReceivedEventParams;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Effectively "no timeout" for navigations the caller chose not to bound
const UNBOUNDED_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Browser keeps running while sessions exist; this only bounds idle time
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// No new response for this long counts as network idle
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Upper bound on the idle wait when navigations are unbounded
const NETWORK_IDLE_MAX_WAIT: Duration = Duration::from_secs(30);

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(100);

const READY_STATE_JS: &str = "document.readyState";

const STATUS_PROBE_JS: &str = r#"
    (function() {
        const nav = performance.getEntriesByType('navigation')[0];
        return nav && nav.responseStatus ? nav.responseStatus : 0;
    })()
"#;

const PAGE_SIZE_JS: &str = r#"
    (function() {
        const el = document.documentElement;
        return JSON.stringify([el.scrollWidth, el.scrollHeight]);
    })()
"#;

/// Document responses seen by a tab: (url, status, headers)
type ResponseLog = Arc<Mutex<Vec<(String, u16, HashMap<String, String>)>>>;

pub struct ChromeRenderer {
    browser: Browser,
    options: SessionOptions,
}

impl ChromeRenderer {
    /// Launch one browser process shared by all sessions
    pub async fn launch(options: SessionOptions) -> Result<Self, RenderError> {
        info!(
            "[Chrome] Launching browser (headless={}, proxy={})",
            options.headless,
            options.proxy.as_deref().unwrap_or("none")
        );

        let launch_opts = options.clone();
        let browser = tokio::task::spawn_blocking(move || Self::launch_sync(&launch_opts))
            .await
            .map_err(|e| RenderError::Launch {
                reason: format!("browser launch task panicked: {}", e),
            })??;

        info!("[Chrome] Browser launched");
        Ok(Self { browser, options })
    }

    fn launch_sync(options: &SessionOptions) -> Result<Browser, RenderError> {
        let launch_options = LaunchOptions::default_builder()
            .headless(options.headless)
            .sandbox(false)
            .ignore_certificate_errors(options.insecure)
            .proxy_server(options.proxy.as_deref())
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| RenderError::Launch {
                reason: format!("launch options error: {}", e),
            })?;

        Browser::new(launch_options).map_err(|e| RenderError::Launch {
            reason: format!("failed to launch Chrome/Chromium: {}", e),
        })
    }

    fn open_tab_sync(
        browser: &Browser,
        options: &SessionOptions,
        responses: ResponseLog,
    ) -> Result<Arc<Tab>, RenderError> {
        let session_err = |e: anyhow::Error| RenderError::Session {
            reason: e.to_string(),
        };

        let tab = browser.new_tab().map_err(session_err)?;
        tab.set_default_timeout(options.default_timeout.unwrap_or(UNBOUNDED_TIMEOUT));

        if let Some(ua) = &options.user_agent {
            let accept_language = options
                .headers
                .get("Accept-Language")
                .map(|s| s.as_str());
            tab.set_user_agent(ua, accept_language, None)
                .map_err(session_err)?;
        }

        if !options.headers.is_empty() {
            let headers: HashMap<&str, &str> = options
                .headers
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            tab.set_extra_http_headers(headers).map_err(session_err)?;
        }

        tab.register_response_handling(
            "paramsweep-responses",
            Box::new(move |params: ResponseReceivedEventParams, _body| {
                let headers = header_map(&params);
                responses.lock().push((
                    params.response.url.clone(),
                    params.response.status as u16,
                    headers,
                ));
            }),
        )
        .map_err(session_err)?;

        Ok(tab)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let browser = self.browser.clone();
        let options = self.options.clone();
        let responses: ResponseLog = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&responses);

        let tab = tokio::task::spawn_blocking(move || Self::open_tab_sync(&browser, &options, log))
            .await
            .map_err(|e| RenderError::Session {
                reason: format!("tab creation task panicked: {}", e),
            })??;

        debug!("[Chrome] Opened tab {}", tab.get_target_id());
        Ok(Box::new(ChromeSession {
            tab,
            responses,
            default_timeout: self.options.default_timeout,
            closed: false,
        }))
    }
}

/// One browser tab. Closed explicitly via `close`, or on drop as a fallback.
pub struct ChromeSession {
    tab: Arc<Tab>,
    responses: ResponseLog,
    default_timeout: Option<Duration>,
    closed: bool,
}

impl ChromeSession {
    async fn blocking<T, F>(&self, op: F) -> Result<T, RenderError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<Tab>) -> Result<T, RenderError> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || op(tab))
            .await
            .map_err(|e| RenderError::Session {
                reason: format!("browser task panicked: {}", e),
            })?
    }

    /// Pick the document response matching where the tab ended up
    fn document_response(&self, final_url: &str) -> Option<(u16, HashMap<String, String>)> {
        let responses = self.responses.lock();
        responses
            .iter()
            .rev()
            .find(|(url, _, _)| url == final_url)
            .or_else(|| responses.first())
            .map(|(_, status, headers)| (*status, headers.clone()))
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait: LoadCondition,
        timeout: Option<Duration>,
    ) -> Result<Navigation, RenderError> {
        self.responses.lock().clear();

        let target = url.to_string();
        let effective = timeout.or(self.default_timeout);
        let log = Arc::clone(&self.responses);
        let final_url = self
            .blocking(move |tab| {
                tab.set_default_timeout(effective.unwrap_or(UNBOUNDED_TIMEOUT));
                let nav_err = |e: anyhow::Error| {
                    let reason = e.to_string();
                    match effective {
                        Some(t) if reason.to_lowercase().contains("timeout") => RenderError::Timeout {
                            url: target.clone(),
                            timeout: t,
                        },
                        _ => RenderError::Navigation {
                            url: target.clone(),
                            reason,
                        },
                    }
                };
                let started = Instant::now();
                tab.navigate_to(&target).map_err(nav_err)?;
                tab.wait_until_navigated().map_err(nav_err)?;
                wait_for_condition(&tab, wait, &log, started, effective).map_err(|reason| {
                    match effective {
                        Some(t) => RenderError::Timeout {
                            url: target.clone(),
                            timeout: t,
                        },
                        None => RenderError::Navigation {
                            url: target.clone(),
                            reason,
                        },
                    }
                })?;
                Ok(tab.get_url())
            })
            .await?;

        let (status, headers) = match self.document_response(&final_url) {
            Some(found) => found,
            None => {
                // Network events can be missed; fall back to the Navigation Timing entry
                let status = self
                    .blocking(|tab| {
                        let result = tab.evaluate(STATUS_PROBE_JS, false).map_err(|e| {
                            RenderError::Content {
                                reason: e.to_string(),
                            }
                        })?;
                        Ok(result
                            .value
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0) as u16)
                    })
                    .await?;
                (status, HashMap::new())
            }
        };

        debug!("[Chrome] {} -> {} ({})", url, final_url, status);
        Ok(Navigation {
            status,
            final_url,
            headers,
        })
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.blocking(|tab| {
            tab.get_content().map_err(|e| RenderError::Content {
                reason: e.to_string(),
            })
        })
        .await
    }

    async fn current_url(&mut self) -> String {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || tab.get_url())
            .await
            .unwrap_or_default()
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<(), RenderError> {
        let shot_err = |e: anyhow::Error| RenderError::Screenshot {
            reason: e.to_string(),
        };

        let png = self
            .blocking(move |tab| {
                let clip = if full_page {
                    let size = tab.evaluate(PAGE_SIZE_JS, false).map_err(shot_err)?;
                    size.value
                        .as_ref()
                        .and_then(|v| v.as_str())
                        .and_then(|s| serde_json::from_str::<(f64, f64)>(s).ok())
                        .map(|(width, height)| Page::Viewport {
                            x: 0.0,
                            y: 0.0,
                            width,
                            height,
                            scale: 1.0,
                        })
                } else {
                    None
                };

                tab.capture_screenshot(
                    Page::CaptureScreenshotFormatOption::Png,
                    None,
                    clip,
                    true,
                )
                .map_err(shot_err)
            })
            .await?;

        tokio::fs::write(path, png)
            .await
            .map_err(|e| RenderError::Screenshot {
                reason: format!("{}: {}", path.display(), e),
            })
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let tab = Arc::clone(&self.tab);
        let closed = tokio::task::spawn_blocking(move || tab.close(false)).await;
        if let Ok(Err(e)) = closed {
            warn!("[Chrome] Failed to close tab: {}", e);
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.tab.close(false);
        }
    }
}

/// Block until the page reaches `wait`. Errors only when the document never
/// reaches the required ready state before the deadline.
fn wait_for_condition(
    tab: &Tab,
    wait: LoadCondition,
    responses: &ResponseLog,
    started: Instant,
    timeout: Option<Duration>,
) -> Result<(), String> {
    let deadline = timeout.map(|t| started + t);
    let expired = |now: Instant| deadline.is_some_and(|d| now >= d);

    loop {
        let state = tab
            .evaluate(READY_STATE_JS, false)
            .ok()
            .and_then(|r| r.value)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        if ready_state_reached(wait, &state) {
            break;
        }
        if expired(Instant::now()) {
            return Err(format!("document stuck in readyState '{}'", state));
        }
        std::thread::sleep(LOAD_POLL_INTERVAL);
    }

    if wait != LoadCondition::NetworkIdle {
        return Ok(());
    }

    let idle_deadline = deadline.unwrap_or_else(|| Instant::now() + NETWORK_IDLE_MAX_WAIT);
    let mut tracker = IdleTracker::new(NETWORK_IDLE_WINDOW, responses.lock().len(), Instant::now());
    loop {
        std::thread::sleep(LOAD_POLL_INTERVAL);
        let now = Instant::now();
        if tracker.observe(responses.lock().len(), now) {
            return Ok(());
        }
        if now >= idle_deadline {
            debug!("[Chrome] Network never went idle, sampling anyway");
            return Ok(());
        }
    }
}

/// Whether `document.readyState` satisfies `wait`
fn ready_state_reached(wait: LoadCondition, state: &str) -> bool {
    match wait {
        LoadCondition::DomContentLoaded => state == "interactive" || state == "complete",
        LoadCondition::Load | LoadCondition::NetworkIdle => state == "complete",
    }
}

/// Watches the response count until nothing new arrives for `window`
struct IdleTracker {
    window: Duration,
    last_count: usize,
    last_change: Instant,
}

impl IdleTracker {
    fn new(window: Duration, count: usize, now: Instant) -> Self {
        Self {
            window,
            last_count: count,
            last_change: now,
        }
    }

    fn observe(&mut self, count: usize, now: Instant) -> bool {
        if count != self.last_count {
            self.last_count = count;
            self.last_change = now;
            return false;
        }
        now.duration_since(self.last_change) >= self.window
    }
}

fn header_map(params: &ResponseReceivedEventParams) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(&params.response.headers) {
        for (name, value) in map {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            headers.insert(name.to_ascii_lowercase(), value);
        }
    }
    headers
}
