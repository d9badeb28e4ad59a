#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use chatai_bridge::models::ConversationKey;
use chatai_bridge::{
    AskAction, HandlerConfig, InMemoryStore, OllamaHandler, PromptOptions, RequestIdentifiers,
    ResponseEvent, response_queue,
};

pub struct Harness {
    pub handler: OllamaHandler,
    pub config: Arc<HandlerConfig>,
    pub store: Arc<InMemoryStore>,
    pub events: mpsc::UnboundedReceiver<ResponseEvent>,
}

pub fn harness(config: HandlerConfig) -> Harness {
    let config = Arc::new(config);
    let store = Arc::new(InMemoryStore::new());
    let (tx, events) = response_queue();
    let handler = OllamaHandler::new(Arc::clone(&config), store.clone(), Arc::new(tx));
    Harness {
        handler,
        config,
        store,
        events,
    }
}

pub fn action(model_key: &str) -> AskAction {
    AskAction {
        student_username: "alice".to_string(),
        exam_id: "exam-42".to_string(),
        question_idx: 1,
        chat_id: "chat-7".to_string(),
        model_key: model_key.to_string(),
        image: None,
    }
}

pub fn key() -> ConversationKey {
    action("mistral").conversation_key()
}

pub fn ids(request: &str) -> RequestIdentifiers {
    RequestIdentifiers::new()
        .with("sid", "socket-1")
        .with("request", request)
}

pub fn options(action: AskAction) -> PromptOptions {
    PromptOptions {
        action: Some(action),
        ..Default::default()
    }
}

// NDJSON body as Ollama streams it
pub fn ndjson(contents: &[&str]) -> String {
    let mut body = String::new();
    for content in contents {
        body.push_str(
            &serde_json::json!({
                "model": "mistral",
                "message": {"role": "assistant", "content": content},
                "done": false
            })
            .to_string(),
        );
        body.push('\n');
    }
    body.push_str(r#"{"model":"mistral","message":{"role":"assistant","content":""},"done":true}"#);
    body.push('\n');
    body
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ResponseEvent>) -> ResponseEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within 5s")
        .expect("response queue open")
}

pub async fn until_terminal(rx: &mut mpsc::UnboundedReceiver<ResponseEvent>) -> Vec<ResponseEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let ended = event.ended;
        events.push(event);
        if ended {
            return events;
        }
    }
}

// Nothing more shows up within `wait`
pub async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<ResponseEvent>, wait: Duration) {
    if let Ok(Some(event)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected event: {event:?}");
    }
}
