// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - HTTP Renderer Integration Tests
 * Fuzzing and probing against a local mock server
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use paramsweep::config::FuzzerConfig;
use paramsweep::fuzzer::{DispatchSettings, Dispatcher};
use paramsweep::prober::{ProbeSettings, UrlProber};
use paramsweep::renderer::{HttpRenderer, SessionOptions};
use paramsweep::types::FuzzMode;
use paramsweep::FuzzError;
use std::sync::Arc;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, Request, ResponseTemplate,
};

/// Parameters the mock search page prints back
const ECHOED: [&str; 3] = ["q", "search", "name"];

/// Echoes selected query values; any request carrying `crash` fails
fn search_page(request: &Request) -> ResponseTemplate {
    let pairs: Vec<(String, String)> = request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if pairs.iter().any(|(k, _)| k == "crash") {
        return ResponseTemplate::new(500).set_body_string("<html>internal error</html>");
    }

    let mut body = String::from("<html><body>");
    for (key, value) in &pairs {
        if ECHOED.contains(&key.as_str()) {
            body.push_str(&format!("<p>{}</p>", value));
        }
    }
    body.push_str("</body></html>");
    ResponseTemplate::new(200).set_body_string(body)
}

async fn search_server() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(search_page)
        .mount(&mock_server)
        .await;
    mock_server
}

fn settings(mode: FuzzMode) -> DispatchSettings {
    let mut config = FuzzerConfig::default();
    config.fuzzing.workers = 2;
    config.fuzzing.max_url_length = 300;
    config.fuzzing.cooldown_ms = Some(0);
    config.fuzzing.stabilization.poll_interval_ms = 1;
    config.fuzzing.stabilization.stable_threshold = 2;
    config.browser.navigation_timeout_secs = Some(5);
    DispatchSettings::from_config(&config, mode).unwrap()
}

fn candidate_params() -> Vec<String> {
    (0..30)
        .map(|i| format!("noise{}", i))
        .chain(["q", "search", "crash"].iter().map(|s| s.to_string()))
        .collect()
}

#[tokio::test]
async fn test_reflection_run_over_http() {
    let mock_server = search_server().await;
    let target = format!("{}/search", mock_server.uri());

    let renderer = HttpRenderer::new(SessionOptions::default()).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(renderer), settings(FuzzMode::Reflection));
    let report = dispatcher
        .run(&[target.clone()], &candidate_params())
        .await
        .unwrap();

    assert_eq!(report.mode, FuzzMode::Reflection);
    assert_eq!(report.parameters_loaded, 33);

    let target_report = &report.targets[0];
    assert_eq!(target_report.target, target);
    let reflected: Vec<&str> = target_report.reflected.iter().map(|s| s.as_str()).collect();
    assert_eq!(reflected, vec!["name", "q", "search"]);
    let bad: Vec<&str> = target_report
        .bad_parameters
        .iter()
        .map(|s| s.as_str())
        .collect();
    assert_eq!(bad, vec!["crash"]);
    assert!(target_report.retried);
    assert!(target_report.batches_planned > 2);
    assert_eq!(target_report.batches_failed, 0);
    assert_eq!(target_report.redirect, None);
}

#[tokio::test]
async fn test_status_run_over_http() {
    let mock_server = search_server().await;
    let target = format!("{}/search", mock_server.uri());

    let renderer = HttpRenderer::new(SessionOptions::default()).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(renderer), settings(FuzzMode::Status));
    let report = dispatcher.run(&[target], &candidate_params()).await.unwrap();

    let target_report = &report.targets[0];
    assert_eq!(
        target_report.bad_parameters.iter().collect::<Vec<_>>(),
        vec!["crash"]
    );
    assert_eq!(target_report.unlocalized_anomalies, 0);
}

#[tokio::test]
async fn test_fatal_baseline_stops_run() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let mut s = settings(FuzzMode::Reflection);
    s.baseline_check = true;
    s.fail_on_unstable_baseline = true;

    let renderer = HttpRenderer::new(SessionOptions::default()).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(renderer), s);
    let err = dispatcher
        .run(&[format!("{}/", mock_server.uri())], &candidate_params())
        .await
        .unwrap_err();

    assert!(matches!(err, FuzzError::FatalUpstream { status: 502, .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_probe_reports_status_length_and_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Server", "nginx")
                .insert_header("X-Powered-By", "PHP/8.2")
                .set_body_string("<html><title>\n Home  Page \n</title></html>"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("probe.txt");

    let renderer = HttpRenderer::new(SessionOptions::default()).unwrap();
    let settings = ProbeSettings {
        workers: 2,
        show_status: true,
        show_length: true,
        output: Some(output.clone()),
        print: false,
        ..Default::default()
    };

    let home = format!("{}/", mock_server.uri());
    let missing = format!("{}/missing", mock_server.uri());
    // Nothing listens on the discard port
    let dead = "http://127.0.0.1:9/".to_string();

    let records = UrlProber::new(Arc::new(renderer), settings)
        .probe(&[home.clone(), missing.clone(), dead.clone()])
        .await
        .unwrap();
    assert_eq!(records.len(), 3);

    let home_record = records.iter().find(|r| r.url == home).unwrap();
    assert_eq!(home_record.status, Some(200));
    assert_eq!(home_record.title.as_deref(), Some("Home Page"));
    assert_eq!(home_record.server.as_deref(), Some("nginx"));
    assert_eq!(home_record.powered_by.as_deref(), Some("PHP/8.2"));

    let missing_record = records.iter().find(|r| r.url == missing).unwrap();
    assert_eq!(missing_record.line(true, true), format!("{} [404] [4]", missing));

    let dead_record = records.iter().find(|r| r.url == dead).unwrap();
    assert!(dead_record.error.is_some());
    assert!(dead_record.line(true, true).contains("[ERROR: "));

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().count(), 3);
    assert!(written.contains(&format!("{} [404] [4]", missing)));
}
