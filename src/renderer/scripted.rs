// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! In-memory renderer driven by a closure. Used for offline replays of
//! captured pages and for exercising the engine without a browser.

use super::{Navigation, RenderSession, Renderer};
use crate::errors::RenderError;
use crate::types::LoadCondition;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Client-side navigation that happens after the page has loaded
#[derive(Debug, Clone)]
pub struct ScriptedRedirect {
    /// Number of `current_url` checks that still report the original URL
    pub after_checks: usize,
    pub to: String,
}

/// How one URL renders
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    pub status: u16,
    /// Successive `content` snapshots; the last one repeats forever
    pub frames: Vec<String>,
    pub redirect: Option<ScriptedRedirect>,
    pub headers: HashMap<String, String>,
    /// Fail the navigation instead of rendering
    pub fail: Option<String>,
}

impl ScriptedPage {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            frames: vec![body.into()],
            redirect: None,
            headers: HashMap::new(),
            fail: None,
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail: Some(reason.into()),
            ..Self::ok("")
        }
    }

    pub fn frames(mut self, frames: Vec<String>) -> Self {
        self.frames = frames;
        self
    }

    pub fn redirect_to(mut self, to: impl Into<String>, after_checks: usize) -> Self {
        self.redirect = Some(ScriptedRedirect {
            after_checks,
            to: to.into(),
        });
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

type PageFn = dyn Fn(&str) -> ScriptedPage + Send + Sync;

/// Counters shared by every session of one renderer
#[derive(Debug, Default)]
pub struct ScriptedStats {
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub navigations: AtomicUsize,
    visited: Mutex<Vec<String>>,
}

impl ScriptedStats {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst) - self.sessions_closed.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct ScriptedRenderer {
    pages: Arc<PageFn>,
    stats: Arc<ScriptedStats>,
}

impl ScriptedRenderer {
    pub fn new<F>(pages: F) -> Self
    where
        F: Fn(&str) -> ScriptedPage + Send + Sync + 'static,
    {
        Self {
            pages: Arc::new(pages),
            stats: Arc::new(ScriptedStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ScriptedStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        self.stats.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            pages: Arc::clone(&self.pages),
            stats: Arc::clone(&self.stats),
            page: None,
            requested_url: String::from("about:blank"),
            frame: 0,
            url_checks: 0,
            closed: false,
        }))
    }
}

pub struct ScriptedSession {
    pages: Arc<PageFn>,
    stats: Arc<ScriptedStats>,
    page: Option<ScriptedPage>,
    requested_url: String,
    frame: usize,
    url_checks: usize,
    closed: bool,
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: LoadCondition,
        _timeout: Option<Duration>,
    ) -> Result<Navigation, RenderError> {
        self.stats.navigations.fetch_add(1, Ordering::SeqCst);
        self.stats.visited.lock().push(url.to_string());

        let page = (self.pages)(url);
        if let Some(reason) = &page.fail {
            self.page = None;
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        self.requested_url = url.to_string();
        self.frame = 0;
        self.url_checks = 0;

        let navigation = Navigation {
            status: page.status,
            final_url: url.to_string(),
            headers: page.headers.clone(),
        };
        self.page = Some(page);
        Ok(navigation)
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        let page = self.page.as_ref().ok_or_else(|| RenderError::Content {
            reason: "no page loaded".to_string(),
        })?;

        let snapshot = match page.frames.len() {
            0 => String::new(),
            n => page.frames[self.frame.min(n - 1)].clone(),
        };
        self.frame += 1;
        Ok(snapshot)
    }

    async fn current_url(&mut self) -> String {
        self.url_checks += 1;
        match self.page.as_ref().and_then(|p| p.redirect.as_ref()) {
            Some(redirect) if self.url_checks > redirect.after_checks => redirect.to.clone(),
            _ => self.requested_url.clone(),
        }
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> Result<(), RenderError> {
        tokio::fs::write(path, b"\x89PNG\r\n\x1a\n")
            .await
            .map_err(|e| RenderError::Screenshot {
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_advance_and_last_repeats() {
        let renderer = ScriptedRenderer::new(|_| {
            ScriptedPage::ok("").frames(vec!["a".into(), "ab".into()])
        });
        let mut session = renderer.open_session().await.unwrap();
        session
            .navigate("http://t/", LoadCondition::Load, None)
            .await
            .unwrap();

        assert_eq!(session.content().await.unwrap(), "a");
        assert_eq!(session.content().await.unwrap(), "ab");
        assert_eq!(session.content().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn test_redirect_after_checks() {
        let renderer = ScriptedRenderer::new(|_| {
            ScriptedPage::ok("x").redirect_to("http://t/login", 1)
        });
        let mut session = renderer.open_session().await.unwrap();
        session
            .navigate("http://t/", LoadCondition::Load, None)
            .await
            .unwrap();

        assert_eq!(session.current_url().await, "http://t/");
        assert_eq!(session.current_url().await, "http://t/login");
    }

    #[tokio::test]
    async fn test_session_accounting() {
        let renderer = ScriptedRenderer::new(|_| ScriptedPage::ok(""));
        let stats = renderer.stats();
        let mut session = renderer.open_session().await.unwrap();
        assert_eq!(stats.open_sessions(), 1);
        session.close().await;
        session.close().await;
        assert_eq!(stats.open_sessions(), 0);
    }
}
