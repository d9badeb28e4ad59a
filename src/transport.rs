//! Streaming HTTP client for the Ollama chat and tags endpoints.

use futures_util::{Stream, StreamExt, TryStreamExt};
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::{debug, trace, warn};

use crate::error::{BridgeError, Result};
use crate::models::{ChatRequest, ChatStreamChunk, TagsResponse};

pub const CHAT_PATH: &str = "/api/chat";
pub const TAGS_PATH: &str = "/api/tags";

/// Content deltas of one streamed answer, in backend order.
///
/// An `Err` item means the stream broke after the call was issued; nothing
/// follows it.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// What a single NDJSON line means for the stream
#[derive(Debug, PartialEq)]
pub enum LineEvent {
    Delta(String),
    Done,
    Skip,
}

pub fn parse_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() {
        return LineEvent::Skip;
    }

    let chunk: ChatStreamChunk = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!(error = %e, "skipping undecodable stream line");
            return LineEvent::Skip;
        }
    };

    if chunk.done {
        debug!("stream marked as done");
        return LineEvent::Done;
    }

    let message = chunk.message.unwrap_or_default();
    let content = message.content.unwrap_or_default();
    trace!(role = message.role.as_deref().unwrap_or("unknown"), %content, "stream line");

    if content.is_empty() {
        LineEvent::Skip
    } else {
        LineEvent::Delta(content)
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[derive(Clone)]
pub struct ChatTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ChatTransport {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Issues the streamed chat call.
    ///
    /// Returns once response headers arrived with a 2xx status; every
    /// failure up to that point (deadline, refused connection, error status)
    /// is an issuance failure.
    pub async fn open_chat(&self, base_url: &str, request: &ChatRequest) -> Result<DeltaStream> {
        let url = endpoint(base_url, CHAT_PATH);
        debug!(%url, model = %request.model, messages = request.messages.len(), "issuing chat call");

        let send = self.client.post(&url).json(request).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| BridgeError::Timeout(self.timeout))??;

        let response = check_status(response).await?;
        Ok(delta_stream(response))
    }

    /// Names of the models installed on the backend.
    pub async fn list_models(&self, base_url: &str) -> Result<Vec<String>> {
        let url = endpoint(base_url, TAGS_PATH);

        let fetch = async {
            let response = check_status(self.client.get(&url).send().await?).await?;
            let body = response.bytes().await?;
            let tags: TagsResponse = serde_json::from_slice(&body)?;
            Ok::<_, BridgeError>(tags)
        };
        let tags = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| BridgeError::Timeout(self.timeout))??;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BridgeError::Status {
        status: status.as_u16(),
        body,
    })
}

// NDJSON body -> lines -> deltas. `LinesCodec` buffers partial lines across
// network chunks and hands over the unterminated tail at end of body.
fn delta_stream(response: reqwest::Response) -> DeltaStream {
    let bytes = response.bytes_stream().map_err(io::Error::other);
    let lines = FramedRead::new(StreamReader::new(bytes), LinesCodec::new());

    Box::pin(async_stream::stream! {
        tokio::pin!(lines);

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    yield Err(BridgeError::from(e));
                    return;
                }
            };
            match parse_line(&line) {
                LineEvent::Delta(content) => yield Ok(content),
                LineEvent::Done => return,
                LineEvent::Skip => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_line_is_a_delta() {
        assert_eq!(
            parse_line(r#"{"message":{"role":"assistant","content":"4"},"done":false}"#),
            LineEvent::Delta("4".to_string())
        );
    }

    #[test]
    fn done_line_stops_even_with_content() {
        assert_eq!(
            parse_line(r#"{"message":{"content":"late"},"done":true}"#),
            LineEvent::Done
        );
    }

    #[test]
    fn empty_and_broken_lines_are_skipped() {
        assert_eq!(parse_line("   "), LineEvent::Skip);
        assert_eq!(parse_line("{not json"), LineEvent::Skip);
        assert_eq!(parse_line(r#"{"message":{"content":""}}"#), LineEvent::Skip);
        assert_eq!(parse_line(r#"{"done":false}"#), LineEvent::Skip);
    }

    #[test]
    fn endpoint_avoids_double_slash() {
        assert_eq!(endpoint("http://x:1/", CHAT_PATH), "http://x:1/api/chat");
    }
}
