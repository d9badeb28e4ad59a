mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use chatai_bridge::models::ConversationKey;
use chatai_bridge::{
    ChatAiHandler, ChatInteraction, HandlerConfig, InteractionStore, OllamaHandler,
    response_queue,
};
use common::*;

const PARTIAL_LINE: &str =
    "{\"message\":{\"role\":\"assistant\",\"content\":\"partial\"},\"done\":false}\n";

// Reads the whole request so closing the socket later is a clean FIN
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}

/// Backend that answers with one chunked NDJSON line and never finishes the
/// body: it either closes the connection or keeps it open without writing.
async fn one_chunk_backend(stall: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            PARTIAL_LINE.len(),
            PARTIAL_LINE
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        if stall {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    format!("http://{addr}")
}

fn shape(events: &[chatai_bridge::ResponseEvent]) -> Vec<(Option<&str>, bool)> {
    events
        .iter()
        .map(|e| (e.answer.as_deref(), e.ended))
        .collect()
}

#[tokio::test]
async fn connection_dropped_mid_stream_still_terminates() {
    let mut h = harness(HandlerConfig::new(one_chunk_backend(false).await));
    h.handler.connect();
    h.handler
        .dispatch_prompt("mistral", "q", ids("r1"), options(action("mistral")))
        .unwrap();

    let events = until_terminal(&mut h.events).await;
    assert_eq!(shape(&events), vec![(Some("partial"), false), (None, true)]);
    assert_eq!(events[1].identifiers, ids("r1"));

    assert_quiet(&mut h.events, Duration::from_millis(200)).await;
    h.handler.disconnect().await;
}

#[tokio::test]
async fn stalled_stream_hits_stream_deadline() {
    let mut config = HandlerConfig::new(one_chunk_backend(true).await);
    config.stream_timeout = Duration::from_millis(300);
    let mut h = harness(config);
    h.handler.connect();
    h.handler
        .dispatch_prompt("mistral", "q", ids("r1"), options(action("mistral")))
        .unwrap();

    let events = until_terminal(&mut h.events).await;
    assert_eq!(shape(&events), vec![(Some("partial"), false), (None, true)]);

    assert_quiet(&mut h.events, Duration::from_millis(200)).await;
    h.handler.disconnect().await;
}

struct PanickingStore;

#[async_trait::async_trait]
impl InteractionStore for PanickingStore {
    async fn last_interactions(
        &self,
        _key: &ConversationKey,
        _window: usize,
    ) -> chatai_bridge::Result<Vec<ChatInteraction>> {
        panic!("store exploded");
    }
}

#[tokio::test]
async fn panicking_job_still_ends_its_request() {
    let mut config = HandlerConfig::new("http://127.0.0.1:1");
    config.pool_size = 1;
    let (tx, mut events) = response_queue();
    let handler = OllamaHandler::new(Arc::new(config), Arc::new(PanickingStore), Arc::new(tx));
    handler.connect();

    // the single worker survives the first panic and serves the second job
    for request in ["r1", "r2"] {
        handler
            .dispatch_prompt("mistral", "q", ids(request), options(action("mistral")))
            .unwrap();
    }

    for request in ["r1", "r2"] {
        let closed = until_terminal(&mut events).await;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].identifiers, ids(request));
        assert_eq!(closed[0].model_key.as_deref(), Some("mistral"));
    }

    assert_quiet(&mut events, Duration::from_millis(200)).await;
    handler.disconnect().await;
}
