// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Rendering collaborators.
//!
//! The fuzzing engine never talks to a browser or HTTP client directly. It
//! opens a [`RenderSession`] from a [`Renderer`] and drives it through
//! navigate / content / current_url. Backends:
//! - [`chrome::ChromeRenderer`]: headless Chrome, runs client-side script
//! - [`http::HttpRenderer`]: raw HTTP via reqwest, no script execution
//! - [`scripted::ScriptedRenderer`]: in-memory pages for offline runs and tests

pub mod chrome;
pub mod http;
pub mod scripted;

use crate::errors::RenderError;
use crate::types::LoadCondition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub use chrome::ChromeRenderer;
pub use http::HttpRenderer;
pub use scripted::{ScriptedPage, ScriptedRenderer};

/// Desktop Chrome UA used by stealth sessions
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Result of a top-level navigation
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    pub status: u16,
    pub final_url: String,
    /// Response headers, names lowercased. May be empty if the backend cannot see them.
    pub headers: HashMap<String, String>,
}

impl Navigation {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }
}

/// Settings applied once when a session is created
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub headless: bool,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub headers: HashMap<String, String>,
    pub insecure: bool,
    pub default_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            user_agent: None,
            headers: HashMap::new(),
            insecure: false,
            default_timeout: Some(Duration::from_secs(15)),
        }
    }
}

impl SessionOptions {
    /// Realistic browser fingerprint for targets with bot detection
    pub fn stealth(mut self) -> Self {
        self.user_agent = Some(STEALTH_USER_AGENT.to_string());
        self.headers
            .insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());
        self
    }
}

/// One exclusively-owned page/tab/connection
#[async_trait]
pub trait RenderSession: Send {
    /// Load `url` and wait for `wait`. `timeout` of `None` waits indefinitely.
    async fn navigate(
        &mut self,
        url: &str,
        wait: LoadCondition,
        timeout: Option<Duration>,
    ) -> Result<Navigation, RenderError>;

    /// Current rendered markup. Idempotent, does not re-navigate.
    async fn content(&mut self) -> Result<String, RenderError>;

    /// URL the session is currently showing
    async fn current_url(&mut self) -> String;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<(), RenderError> {
        let _ = (path, full_page);
        Err(RenderError::Unsupported("screenshot"))
    }

    /// Release the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Factory for sessions sharing one backend (browser process, HTTP pool)
#[async_trait]
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    Chrome,
    Http,
}

impl Default for RendererKind {
    fn default() -> Self {
        RendererKind::Chrome
    }
}

/// Build the configured backend
pub async fn build_renderer(
    kind: RendererKind,
    options: SessionOptions,
) -> Result<Arc<dyn Renderer>, RenderError> {
    match kind {
        RendererKind::Chrome => Ok(Arc::new(ChromeRenderer::launch(options).await?)),
        RendererKind::Http => Ok(Arc::new(HttpRenderer::new(options)?)),
    }
}
