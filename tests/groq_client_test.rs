use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::{ header, HeaderMap, StatusCode },
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use futures::{ stream, StreamExt };
use serde_json::Value;
use std::convert::Infallible;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use ticket_relay::config::{ GenerationParams, RelayConfig };
use ticket_relay::llm::chat::groq::GroqChatClient;
use ticket_relay::llm::chat::ChatClient;
use ticket_relay::llm::LlmError;
use ticket_relay::models::chat::{ Message, StreamEvent };
use ticket_relay::relay::{ Relay, RelayFrame };

#[derive(Clone, Debug)]
struct CapturedRequest {
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct MockUpstream {
    status: StatusCode,
    body: &'static str,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

async fn completions(
    State(mock): State<MockUpstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    mock.captured.lock().unwrap().push(CapturedRequest { authorization, body });

    (mock.status, [(header::CONTENT_TYPE, "text/event-stream")], mock.body)
}

/// Serves `body` from a local completions endpoint; returns its base URL.
async fn start_mock(
    status: StatusCode,
    body: &'static str,
) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let mock = MockUpstream { status, body, captured: captured.clone() };
    let app = Router::new()
        .route("/openai/v1/chat/completions", post(completions))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/openai/v1", addr), captured)
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Sends one fragment, then holds the response open without another byte.
async fn stalled_completions(State(released): State<Arc<AtomicBool>>) -> impl IntoResponse {
    let guard = DropFlag(released);
    let first = Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n");
    let body = stream::once(async move { Ok::<_, Infallible>(first) })
        .chain(stream::pending())
        .map(move |item| {
            let _alive = &guard;
            item
        });

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body))
}

/// Starts an upstream that stalls mid-stream; the flag is raised once the
/// server drops the response body.
async fn start_stalled_mock() -> (String, Arc<AtomicBool>) {
    let released = Arc::new(AtomicBool::new(false));
    let app = Router::new()
        .route("/openai/v1/chat/completions", post(stalled_completions))
        .with_state(released.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/openai/v1", addr), released)
}

fn client_for(base_url: String) -> GroqChatClient {
    GroqChatClient::new(Some("gsk_test_key".into()), None, Some(base_url)).unwrap()
}

const HAPPY_BODY: &str = concat!(
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Sure\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\", \"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"I can help.\"},\"finish_reason\":null}]}\n\n",
    "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}],\"x_groq\":{\"usage\":{}}}\n\n",
    "data: [DONE]\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"after done\"}}]}\n\n"
);

#[tokio::test]
async fn test_streams_content_deltas_until_done() {
    let (base_url, captured) = start_mock(StatusCode::OK, HAPPY_BODY).await;
    let client = client_for(base_url);

    let messages = vec![Message::system("sys"), Message::user("hi")];
    let stream = client.stream_chat(&messages, &GenerationParams::default()).await.ok().unwrap();
    let fragments: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

    assert_eq!(fragments, vec!["Sure", ", ", "I can help."]);

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].authorization.as_deref(), Some("Bearer gsk_test_key"));

    let body = &captured[0].body;
    assert_eq!(body["model"], "llama-3.3-70b-versatile");
    assert_eq!(body["stream"], true);
    assert_eq!(body["max_tokens"], 1024);
    assert_eq!(body["top_p"], 1.0);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hi");
}

#[tokio::test]
async fn test_error_status_fails_stream_setup() {
    let (base_url, _) = start_mock(
        StatusCode::UNAUTHORIZED,
        r#"{"error":{"message":"Invalid API Key"}}"#,
    ).await;
    let client = client_for(base_url);

    let err = client
        .stream_chat(&[Message::user("hi")], &GenerationParams::default()).await
        .err()
        .unwrap();

    match err {
        LlmError::Status { status, body, .. } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains("Invalid API Key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_ends_stream_with_error() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\": oops\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n"
    );
    let (base_url, _) = start_mock(StatusCode::OK, body).await;
    let client = client_for(base_url);

    let stream = client.stream_chat(&[Message::user("hi")], &GenerationParams::default()).await.ok().unwrap();
    let items: Vec<Result<String, LlmError>> = stream.collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "Hel");
    assert!(matches!(items[1], Err(LlmError::Malformed { .. })));
}

#[tokio::test]
async fn test_relay_surfaces_provider_rejection_in_band() {
    let (base_url, _) = start_mock(StatusCode::TOO_MANY_REQUESTS, "rate limited").await;
    let config = RelayConfig { fragment_delay: Duration::ZERO, ..RelayConfig::default() };
    let relay = Relay::new(Arc::new(client_for(base_url)), Arc::new(config));

    let frames: Vec<RelayFrame> = relay.stream(vec![Message::user("hi")]).collect().await;

    assert_eq!(frames.len(), 2);
    match &frames[0] {
        RelayFrame::Event(StreamEvent::Error(value)) => {
            assert!(value.starts_with("Error generating response: "));
            assert!(value.contains("429"));
            assert!(value.contains("rate limited"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(frames[1], RelayFrame::Done);
}

#[tokio::test]
async fn test_unreachable_provider_is_reported_in_band() {
    // nothing listens on the discard port
    let relay = Relay::new(
        Arc::new(client_for("http://127.0.0.1:9/openai/v1".into())),
        Arc::new(RelayConfig { fragment_delay: Duration::ZERO, ..RelayConfig::default() }),
    );

    let frames: Vec<RelayFrame> = relay.stream(vec![Message::user("hi")]).collect().await;

    assert_eq!(frames.len(), 2);
    assert!(matches!(&frames[0], RelayFrame::Event(StreamEvent::Error(v)) if v.contains("request to Groq failed")));
    assert_eq!(frames[1], RelayFrame::Done);
}

#[tokio::test]
async fn test_relay_timeout_releases_stalled_upstream() {
    let (base_url, released) = start_stalled_mock().await;
    let config = RelayConfig {
        upstream_timeout: Duration::from_millis(300),
        fragment_delay: Duration::ZERO,
        ..RelayConfig::default()
    };
    let relay = Relay::new(Arc::new(client_for(base_url)), Arc::new(config));

    let frames: Vec<RelayFrame> = relay.stream(vec![Message::user("hi")]).collect().await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], RelayFrame::Event(StreamEvent::Text("Hel".into())));
    assert!(matches!(&frames[1], RelayFrame::Event(StreamEvent::Error(v)) if v.contains("no response from upstream")));
    assert_eq!(frames[2], RelayFrame::Done);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !released.load(Ordering::SeqCst) {
        assert!(tokio::time::Instant::now() < deadline, "upstream response was never closed");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
