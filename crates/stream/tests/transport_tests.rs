//! Integration tests for the progress stream transport against a mock
//! backend.

use std::time::Duration;

use analyst_stream::client::StreamClient;
use analyst_stream::config::StreamConfig;
use analyst_stream::reconnect::ReconnectConfig;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SESSION: &str = "sess-42";
const PROGRESS_PATH: &str = "/research/progress/sess-42";
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn client(base_url: &str, max_attempts: u32) -> StreamClient {
    let mut config = StreamConfig::new(base_url);
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        max_attempts,
        ..Default::default()
    };
    StreamClient::new(&config)
}

fn event_stream(frames: &[&str]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(frames.concat(), "text/event-stream")
}

fn data(value: Value) -> String {
    format!("data: {value}\n\n")
}

/// Open the stream and return a channel of everything it forwards. The
/// channel closes when the transport drops its callback.
fn collect(
    client: &StreamClient,
    credential: Option<&str>,
) -> (
    analyst_stream::transport::StreamHandle,
    mpsc::UnboundedReceiver<Value>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = client.open(SESSION, credential, move |event| {
        let _ = tx.send(event);
    });
    (handle, rx)
}

async fn recv_all(rx: &mut mpsc::UnboundedReceiver<Value>) -> Vec<Value> {
    let mut out = Vec::new();
    loop {
        match tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await {
            Ok(Some(event)) => out.push(event),
            Ok(None) => return out,
            Err(_) => panic!("transport did not finish; got {out:?}"),
        }
    }
}

fn connection_lost() -> Value {
    json!({"type": "error", "error": "Connection lost"})
}

// ---------------------------------------------------------------------------
// Forwarding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forwards_messages_and_closes_after_complete() {
    let server = MockServer::start().await;
    let connected = data(json!({"type": "connected"}));
    let step = data(json!({"type": "progress", "agent": "Financial Analyst", "message": "Financial Analyst started"}));
    let complete = data(json!({"type": "complete", "report": "done"}));
    let late = data(json!({"type": "progress", "message": "after the end"}));

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .and(header("accept", "text/event-stream"))
        .respond_with(event_stream(&[
            ": keep-alive\n\n",
            &connected,
            &step,
            "data: {not json\n\n",
            "event: ping\ndata: {}\n\n",
            &complete,
            &late,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let (handle, mut rx) = collect(&client(&server.uri(), 3), None);
    let events = recv_all(&mut rx).await;

    assert_eq!(
        events,
        vec![
            json!({"type": "connected"}),
            json!({"type": "progress", "agent": "Financial Analyst", "message": "Financial Analyst started"}),
            json!({"type": "complete", "report": "done"}),
        ]
    );
    assert!(handle.is_closed());

    // Closing after the stream ended on its own is a no-op.
    handle.close();
    handle.close();
    assert!(handle.is_closed());
}

#[tokio::test]
async fn backend_error_is_forwarded_once_without_synthesis() {
    let server = MockServer::start().await;
    let error = data(json!({"type": "error", "error": "Rate limited"}));

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&[&error]))
        .expect(1)
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 3), None);
    assert_eq!(
        recv_all(&mut rx).await,
        vec![json!({"type": "error", "error": "Rate limited"})]
    );
}

#[tokio::test]
async fn credential_travels_as_query_parameter() {
    let server = MockServer::start().await;
    let complete = data(json!({"type": "complete"}));

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .and(query_param("token", "secret-token"))
        .respond_with(event_stream(&[&complete]))
        .expect(1)
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 0), Some("secret-token"));
    assert_eq!(recv_all(&mut rx).await, vec![json!({"type": "complete"})]);
}

#[tokio::test]
async fn multi_line_data_is_joined() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&[
            "data: {\"type\":\"complete\",\r\ndata: \"report\":\"ok\"}\r\n\r\n",
        ]))
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 0), None);
    assert_eq!(
        recv_all(&mut rx).await,
        vec![json!({"type": "complete", "report": "ok"})]
    );
}

// ---------------------------------------------------------------------------
// Terminal failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn http_error_synthesizes_single_connection_lost() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (handle, mut rx) = collect(&client(&server.uri(), 3), None);
    assert_eq!(recv_all(&mut rx).await, vec![connection_lost()]);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn wrong_content_type_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 3), None);
    assert_eq!(recv_all(&mut rx).await, vec![connection_lost()]);
}

#[tokio::test]
async fn unreachable_backend_gives_up_after_max_attempts() {
    // Grab a free port, then release it so connecting is refused.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let (_handle, mut rx) = collect(&client(&format!("http://127.0.0.1:{port}"), 2), None);
    assert_eq!(recv_all(&mut rx).await, vec![connection_lost()]);
}

#[tokio::test]
async fn invalid_base_url_is_terminal() {
    let (_handle, mut rx) = collect(&client("not a url", 3), None);
    assert_eq!(recv_all(&mut rx).await, vec![connection_lost()]);
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_stream_reconnects_with_last_event_id() {
    let server = MockServer::start().await;
    let connected = data(json!({"type": "connected"}));
    let complete = data(json!({"type": "complete"}));

    // Mounted first so it wins once the header is present.
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .and(header("last-event-id", "7"))
        .respond_with(event_stream(&[&complete]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&["id: 7\n", &connected]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 3), None);
    assert_eq!(
        recv_all(&mut rx).await,
        vec![json!({"type": "connected"}), json!({"type": "complete"})]
    );
}

#[tokio::test]
async fn server_retry_hint_is_capped_by_max_delay() {
    let server = MockServer::start().await;
    let connected = data(json!({"type": "connected"}));
    let complete = data(json!({"type": "complete"}));

    // Ten minutes, far beyond the 50ms ceiling of the test client.
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&["retry: 600000\n", &connected]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&[&complete]))
        .expect(1)
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 3), None);
    assert_eq!(
        recv_all(&mut rx).await,
        vec![json!({"type": "connected"}), json!({"type": "complete"})]
    );
}

#[tokio::test]
async fn failed_reconnect_synthesizes_once() {
    let server = MockServer::start().await;
    let connected = data(json!({"type": "connected"}));

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&[&connected]))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let (_handle, mut rx) = collect(&client(&server.uri(), 3), None);
    assert_eq!(
        recv_all(&mut rx).await,
        vec![json!({"type": "connected"}), connection_lost()]
    );
}

// ---------------------------------------------------------------------------
// Close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn close_before_open_forwards_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(
            event_stream(&["data: {\"type\":\"connected\"}\n\n"]).set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let (handle, mut rx) = collect(&client(&server.uri(), 3), None);
    handle.close();
    handle.close();

    assert!(recv_all(&mut rx).await.is_empty());
    assert!(handle.is_closed());
}

#[tokio::test]
async fn dropping_the_handle_closes_the_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(event_stream(&[]).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let (handle, mut rx) = collect(&client(&server.uri(), 3), None);
    drop(handle);

    assert!(recv_all(&mut rx).await.is_empty());
}
