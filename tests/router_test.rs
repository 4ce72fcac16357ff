//! In-process tests for the routed application: authentication, signing,
//! error bodies and per-request settings.

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use codelens_http::config::ServerConfig;
use codelens_http::engine::LexicalEngine;
use codelens_http::security::{RequestSigner, Secret, HMAC_HEADER};
use codelens_http::Server;

const SECRET: &str = "secret";

fn server(secret: Option<&str>) -> Server {
    let config = ServerConfig {
        secret: secret.map(Secret::new),
        ..ServerConfig::default()
    };
    Server::new(config, LexicalEngine::new())
}

fn request(host: &str, path: &str, body: &str, signed_with: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(HOST, host)
        .header(CONTENT_TYPE, "application/json");
    if let Some(secret) = signed_with {
        let signature = RequestSigner::new(&Secret::new(secret)).sign("POST", path, body.as_bytes());
        builder = builder.header(HMAC_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn local(path: &str, body: &str) -> Request<Body> {
    request("127.0.0.1:8123", path, body, Some(SECRET))
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn is_signed_by(&self, secret: &str) -> bool {
        RequestSigner::new(&Secret::new(secret)).is_response_authenticated(&self.headers, &self.body)
    }
}

async fn send(app: Router, request: Request<Body>) -> Reply {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    Reply {
        status: parts.status,
        headers: parts.headers,
        body: to_bytes(body, usize::MAX).await.unwrap().to_vec(),
    }
}

// === Authentication and signing ===

#[tokio::test]
async fn signed_ready_request_gets_signed_true() {
    let reply = send(server(Some(SECRET)).router(), local("/ready", "")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!(true));
    assert!(reply.is_signed_by(SECRET));
    assert!(!reply.is_signed_by("wrong"));
}

#[tokio::test]
async fn wrong_secret_is_unauthorized_but_reply_is_signed() {
    let reply = send(
        server(Some(SECRET)).router(),
        request("127.0.0.1", "/ready", "", Some("wrong")),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["exception"], "Unauthorized");
    assert_eq!(reply.json()["message"], "Unauthorized, received bad HMAC.");
    assert!(reply.is_signed_by(SECRET));
}

#[tokio::test]
async fn missing_signature_is_unauthorized() {
    let reply = send(
        server(Some(SECRET)).router(),
        request("localhost", "/healthy", "", None),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["message"], "Unauthorized, missing HMAC.");
}

#[tokio::test]
async fn non_local_host_rejected_even_with_valid_signature() {
    let reply = send(
        server(Some(SECRET)).router(),
        request("example.com", "/ready", "", Some(SECRET)),
    )
    .await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        reply.json()["message"],
        "Unauthorized, received request from non-local Host."
    );
    assert!(reply.is_signed_by(SECRET));
}

#[tokio::test]
async fn signature_covers_path() {
    let signature = RequestSigner::new(&Secret::new(SECRET)).sign("POST", "/healthy", b"");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/ready")
        .header(HOST, "127.0.0.1")
        .header(HMAC_HEADER, signature)
        .body(Body::empty())
        .unwrap();

    let reply = send(server(Some(SECRET)).router(), request).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn without_secret_nothing_is_checked_or_signed() {
    let reply = send(server(None).router(), request("example.com", "/ready", "", None)).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers.get(HMAC_HEADER).is_none());
}

// === Error bodies ===

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let reply = send(server(Some(SECRET)).router(), local("/completions", "{not json")).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["exception"], "BadRequest");
    assert!(reply.is_signed_by(SECRET));
}

#[tokio::test]
async fn engine_error_is_internal_error_with_traceback() {
    let body = json!({"source": "x = 1\n", "line": 9, "col": 0}).to_string();
    let reply = send(server(Some(SECRET)).router(), local("/completions", &body)).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = reply.json();
    assert_eq!(error["exception"], "InvalidPosition");
    assert!(error["traceback"].as_str().unwrap().starts_with("InvalidPosition"));
    assert!(reply.is_signed_by(SECRET));
}

#[tokio::test]
async fn unknown_route_is_signed_not_found() {
    let reply = send(server(Some(SECRET)).router(), local("/nope", "")).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["exception"], "NotFound");
    assert!(reply.is_signed_by(SECRET));
}

#[tokio::test]
async fn oversized_body_is_rejected_and_signed() {
    let config = ServerConfig {
        secret: Some(Secret::new(SECRET)),
        max_body_bytes: 4096,
        ..ServerConfig::default()
    };
    let app = Server::new(config, LexicalEngine::new()).router();
    let body = format!("{{\"source\": \"{}\", \"line\": 1, \"col\": 0}}", "x".repeat(5000));

    let reply = send(app, local("/completions", &body)).await;

    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(reply.json()["exception"], "PayloadTooLarge");
    assert!(reply.is_signed_by(SECRET));
}

#[tokio::test]
async fn non_local_host_rejected_before_body_is_read() {
    let config = ServerConfig {
        secret: Some(Secret::new(SECRET)),
        max_body_bytes: 4096,
        ..ServerConfig::default()
    };
    let app = Server::new(config, LexicalEngine::new()).router();
    let body = "x".repeat(5000);

    let reply = send(app, request("example.com", "/ready", &body, Some(SECRET))).await;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["exception"], "Unauthorized");
    assert_eq!(
        reply.json()["message"],
        "Unauthorized, received request from non-local Host."
    );
    assert!(reply.is_signed_by(SECRET));
}

// === Engine routes ===

#[tokio::test]
async fn completions_route_returns_records() {
    let source = "def foo(a):\n    \"\"\"Frob.\"\"\"\n    return a\nfood = 1\nfo";
    let body = json!({"source": source, "line": 5, "col": 2, "source_path": "/project/example.py"});

    let reply = send(server(Some(SECRET)).router(), local("/completions", &body.to_string())).await;

    assert_eq!(reply.status, StatusCode::OK);
    let completions = reply.json()["completions"].as_array().unwrap().clone();
    let names: Vec<_> = completions.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["foo", "food", "for"]);
    assert_eq!(completions[0]["type"], "function");
    assert_eq!(completions[0]["docstring"], "foo(a)\n\nFrob.");
}

#[tokio::test]
async fn gotoassignment_honours_follow_imports() {
    let source = "import os.path as p\ny = p\n";
    let app = server(Some(SECRET)).router();

    let plain = json!({"source": source, "line": 2, "col": 4});
    let reply = send(app.clone(), local("/gotoassignment", &plain.to_string())).await;
    assert_eq!(reply.json()["definitions"][0]["name"], "p");

    let followed = json!({"source": source, "line": 2, "col": 4, "follow_imports": true});
    let reply = send(app, local("/gotoassignment", &followed.to_string())).await;
    assert_eq!(reply.json()["definitions"][0]["full_name"], "os.path");
}

#[tokio::test]
async fn names_route_uses_defaults() {
    let body = json!({"source": "def f(a):\n    inner = a\nouter = f\n"});
    let reply = send(server(Some(SECRET)).router(), local("/names", &body.to_string())).await;

    let names: Vec<_> = reply.json()["definitions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["f", "outer"]);
}

#[tokio::test]
async fn preload_module_returns_true() {
    let body = json!({"modules": ["os", "json"]});
    let reply = send(server(Some(SECRET)).router(), local("/preload_module", &body.to_string())).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json(), json!(true));
}

// === Per-request settings ===

#[tokio::test]
async fn settings_override_applies_to_one_request_only() {
    let server = server(Some(SECRET));
    let app = server.router();
    let source = "Foo = 1\nfoo = 2\nfo";

    let overridden = json!({
        "source": source, "line": 3, "col": 2,
        "settings": {"case_insensitive_completion": false}
    });
    let reply = send(app.clone(), local("/completions", &overridden.to_string())).await;
    let names: Vec<_> = reply.json()["completions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert!(!names.contains(&"Foo".to_string()));

    let plain = json!({"source": source, "line": 3, "col": 2});
    let reply = send(app, local("/completions", &plain.to_string())).await;
    assert!(reply.json()["completions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["name"] == "Foo"));

    let gate = &server.state().gate;
    assert_eq!(gate.current_settings(), *gate.baseline());
}

#[tokio::test]
async fn unknown_setting_fails_and_leaves_baseline() {
    let server = server(Some(SECRET));
    let body = json!({
        "source": "x", "line": 1, "col": 1,
        "settings": {"fast_parser": false, "no_such_setting": 1}
    });

    let reply = send(server.router(), local("/completions", &body.to_string())).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["exception"], "UnknownSetting");
    let gate = &server.state().gate;
    assert_eq!(gate.current_settings(), *gate.baseline());
}

// === Activity ===

#[tokio::test(start_paused = true)]
async fn only_authenticated_requests_count_as_activity() {
    let server = server(Some(SECRET));
    let activity = server.state().activity.clone();

    tokio::time::advance(std::time::Duration::from_secs(30)).await;
    send(server.router(), request("127.0.0.1", "/ready", "", Some("wrong"))).await;
    assert!(activity.idle_for() >= std::time::Duration::from_secs(30));

    send(server.router(), local("/ready", "")).await;
    assert_eq!(activity.idle_for(), std::time::Duration::ZERO);
}
