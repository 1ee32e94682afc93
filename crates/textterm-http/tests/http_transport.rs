use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use textterm_core::{
    Action, FailureKind, InputKind, InputRequest, SessionId, Transport, TransportError,
};
use textterm_http::{HttpTransport, HttpTransportConfig};
use tokio::net::TcpListener;
use url::Url;

#[derive(Debug, Clone, Default)]
struct Seen {
    method: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: String,
}

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<Seen>>>,
    data_status: Arc<Mutex<Option<StatusCode>>>,
    data_body: Arc<Mutex<Option<String>>>,
}

impl ServerState {
    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, method: &str, headers: &HeaderMap, query: HashMap<String, String>, body: String) {
        let headers = headers
            .iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect();
        self.seen.lock().unwrap().push(Seen {
            method: method.to_string(),
            headers,
            query,
            body,
        });
    }
}

async fn data(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.record("GET", &headers, query, String::new());
    let status = state.data_status.lock().unwrap().unwrap_or(StatusCode::OK);
    let body = state.data_body.lock().unwrap().clone().unwrap_or_else(|| {
        json!({
            "messageGroups": [{"messages": ["hi "], "settings": []}],
            "action": "READ",
            "handlerKeys": null,
            "bookmark": "top"
        })
        .to_string()
    });
    (status, body)
}

async fn init(State(state): State<ServerState>, headers: HeaderMap, Json(payload): Json<Value>) -> Json<Value> {
    state.record("POST init", &headers, HashMap::new(), payload.to_string());
    Json(json!({"resetRequired": true, "action": "READ_MASKED"}))
}

async fn input(State(state): State<ServerState>, headers: HeaderMap, body: String) -> StatusCode {
    state.record("POST input", &headers, HashMap::new(), body);
    StatusCode::OK
}

async fn serve(state: ServerState) -> SocketAddr {
    let router = Router::new()
        .route("/textTerminalData", get(data))
        .route("/textTerminalInit", post(init))
        .route("/textTerminalInput", post(input))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

fn transport_for(addr: SocketAddr) -> HttpTransport {
    let base = Url::parse(&format!("http://{addr}")).unwrap();
    HttpTransport::new(HttpTransportConfig::new(base)).expect("transport")
}

#[tokio::test]
async fn poll_sends_session_header_and_nonce() {
    let state = ServerState::default();
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);
    let session = SessionId::generate();

    let response = transport.poll(&session, "nonce-1").await.expect("poll");
    assert_eq!(response.action, Action::Read);
    assert_eq!(response.message_groups[0].messages, vec!["hi ".to_string()]);
    assert!(response.handler_keys.is_empty());
    assert_eq!(response.bookmark.as_deref(), Some("top"));

    let seen = state.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].headers.get("uuid"), Some(&session.to_string()));
    assert_eq!(seen[0].query.get("rnd").map(String::as_str), Some("nonce-1"));
}

#[tokio::test]
async fn init_posts_payload_as_json() {
    let state = ServerState::default();
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);
    let session = SessionId::generate();

    let response = transport
        .init(&session, &json!({"user": "ada"}))
        .await
        .expect("init");
    assert!(response.reset_required);
    assert_eq!(response.action, Action::ReadMasked);

    let seen = state.seen();
    assert_eq!(seen[0].method, "POST init");
    assert_eq!(seen[0].body, r#"{"user":"ada"}"#);
    assert_eq!(
        seen[0].headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(seen[0].headers.get("uuid"), Some(&session.to_string()));
}

#[tokio::test]
async fn input_marks_interrupts_and_handlers() {
    let state = ServerState::default();
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);
    let session = SessionId::generate();

    for (text, kind) in [
        ("ls -l", InputKind::Line),
        ("partial", InputKind::Interrupt),
        ("", InputKind::Handler("help".into())),
    ] {
        transport
            .send_input(&session, &InputRequest { text: text.into(), kind })
            .await
            .expect("input");
    }

    let seen = state.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].body, "ls -l");
    assert_eq!(seen[0].headers.get("content-type").map(String::as_str), Some("text/plain"));
    assert!(!seen[0].headers.contains_key("textio-user-interrupt"));
    assert!(!seen[0].headers.contains_key("textio-handler-id"));

    assert_eq!(seen[1].body, "partial");
    assert_eq!(seen[1].headers.get("textio-user-interrupt").map(String::as_str), Some("true"));

    assert_eq!(seen[2].headers.get("textio-handler-id").map(String::as_str), Some("help"));
    assert!(!seen[2].headers.contains_key("textio-user-interrupt"));
}

#[tokio::test]
async fn forbidden_maps_to_session_expired() {
    let state = ServerState::default();
    *state.data_status.lock().unwrap() = Some(StatusCode::FORBIDDEN);
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);

    let err = transport.poll(&SessionId::generate(), "n").await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.failure_kind(), FailureKind::SessionExpired);
}

#[tokio::test]
async fn non_200_success_codes_are_retried() {
    let state = ServerState::default();
    *state.data_status.lock().unwrap() = Some(StatusCode::CREATED);
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);

    let err = transport.poll(&SessionId::generate(), "n").await.unwrap_err();
    assert_eq!(err.status(), Some(201));
    assert_eq!(err.failure_kind(), FailureKind::Transient);
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let state = ServerState::default();
    *state.data_body.lock().unwrap() = Some("{not json".into());
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);

    let err = transport.poll(&SessionId::generate(), "n").await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
    assert_eq!(err.failure_kind(), FailureKind::Transient);
}

#[tokio::test]
async fn empty_body_is_an_empty_response() {
    let state = ServerState::default();
    *state.data_body.lock().unwrap() = Some(String::new());
    let addr = serve(state.clone()).await;
    let transport = transport_for(addr);

    let response = transport.poll(&SessionId::generate(), "n").await.expect("poll");
    assert_eq!(response.action, Action::None);
    assert!(response.message_groups.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("listener bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let transport = transport_for(addr);

    let err = transport.poll(&SessionId::generate(), "n").await.unwrap_err();
    assert!(matches!(err, TransportError::Request(_)));
    assert_eq!(err.status(), None);
    assert_eq!(err.failure_kind(), FailureKind::Transient);
}
