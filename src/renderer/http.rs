// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Raw HTTP backend. No script execution: reflections are only seen if the
//! server itself echoes the marker.

use super::{Navigation, RenderSession, Renderer, SessionOptions};
use crate::errors::RenderError;
use crate::types::LoadCondition;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum response body size (10MB) to prevent memory exhaustion
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const MAX_REDIRECTS: usize = 10;

#[derive(Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(options: SessionOptions) -> Result<Self, RenderError> {
        if options.insecure {
            warn!("[Http] TLS certificate validation is DISABLED for this run");
        }

        let mut default_headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| RenderError::Launch {
                reason: format!("invalid header name '{}': {}", name, e),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| RenderError::Launch {
                reason: format!("invalid header value for '{}': {}", name, e),
            })?;
            default_headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .danger_accept_invalid_certs(options.insecure)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .default_headers(default_headers)
            .tcp_nodelay(true);

        if let Some(ua) = &options.user_agent {
            builder = builder.user_agent(ua.clone());
        }

        if let Some(proxy) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| RenderError::Launch {
                reason: format!("invalid proxy '{}': {}", proxy, e),
            })?;
            builder = builder.proxy(proxy);
        }

        if let Some(timeout) = options.default_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            current_url: String::from("about:blank"),
            body: String::new(),
        }))
    }
}

/// Holds the last response so `content` can be read repeatedly
pub struct HttpSession {
    client: Client,
    current_url: String,
    body: String,
}

#[async_trait]
impl RenderSession for HttpSession {
    async fn navigate(
        &mut self,
        url: &str,
        _wait: LoadCondition,
        timeout: Option<Duration>,
    ) -> Result<Navigation, RenderError> {
        let mut request = self.client.get(url);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout {
                    url: url.to_string(),
                    timeout: timeout.unwrap_or_default(),
                }
            } else {
                RenderError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let bytes = read_capped(response, MAX_BODY_SIZE)
            .await
            .map_err(|e| RenderError::Content {
                reason: e.to_string(),
            })?;
        self.body = String::from_utf8_lossy(&bytes).into_owned();
        self.current_url = final_url.clone();

        debug!("[Http] {} -> {} ({}, {} bytes)", url, final_url, status, bytes.len());
        Ok(Navigation {
            status,
            final_url,
            headers,
        })
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        Ok(self.body.clone())
    }

    async fn current_url(&mut self) -> String {
        self.current_url.clone()
    }

    async fn close(&mut self) {
        self.body.clear();
    }
}

/// Read at most `limit` body bytes. The rest of the stream is dropped
/// unread.
async fn read_capped(mut response: Response, limit: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_navigate_reads_status_body_and_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Server", "nginx")
                    .set_body_string("<title>Search</title>hello"),
            )
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(SessionOptions::default()).unwrap();
        let mut session = renderer.open_session().await.unwrap();
        let url = format!("{}/search?q=1", mock_server.uri());
        let nav = session
            .navigate(&url, LoadCondition::Load, None)
            .await
            .unwrap();

        assert_eq!(nav.status, 200);
        assert_eq!(nav.header("server"), Some("nginx"));
        assert_eq!(session.current_url().await, url);
        assert_eq!(session.content().await.unwrap(), "<title>Search</title>hello");
        session.close().await;
    }

    #[tokio::test]
    async fn test_session_headers_are_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            // The matcher splits on commas
            .and(headers("accept-language", vec!["en-US", "en;q=0.9"]))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(SessionOptions::default().stealth()).unwrap();
        let mut session = renderer.open_session().await.unwrap();
        let nav = session
            .navigate(&format!("{}/", mock_server.uri()), LoadCondition::Load, None)
            .await
            .unwrap();
        assert_eq!(nav.status, 204);
    }

    #[tokio::test]
    async fn test_body_read_stops_at_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'a'; 64 * 1024]))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(mock_server.uri()).await.unwrap();
        let body = read_capped(response, 1000).await.unwrap();
        assert_eq!(body.len(), 1000);

        let response = reqwest::get(mock_server.uri()).await.unwrap();
        let body = read_capped(response, MAX_BODY_SIZE).await.unwrap();
        assert_eq!(body.len(), 64 * 1024);
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(SessionOptions::default()).unwrap();
        let mut session = renderer.open_session().await.unwrap();
        let nav = session
            .navigate(&mock_server.uri(), LoadCondition::Load, None)
            .await
            .unwrap();
        assert_eq!(nav.status, 500);
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let options = SessionOptions {
            proxy: Some("not a proxy url".to_string()),
            ..Default::default()
        };
        assert!(HttpRenderer::new(options).is_err());
    }
}
