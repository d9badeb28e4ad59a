use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// One stored turn of a conversation (read-only here)
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct ChatInteraction {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub achieved: bool,
}

impl ChatInteraction {
    // Turn still waiting for its answer
    pub fn pending(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn completed(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            hidden_prompt: None,
            answer: Some(answer.into()),
            achieved: true,
        }
    }

    pub fn with_hidden_prompt(mut self, hidden: impl Into<String>) -> Self {
        self.hidden_prompt = Some(hidden.into());
        self
    }

    /// Text actually sent to the model for this turn.
    pub fn model_prompt(&self) -> &str {
        match self.hidden_prompt.as_deref() {
            Some(hidden) if !hidden.is_empty() => hidden,
            _ => &self.prompt,
        }
    }
}

// Identifies a conversation thread in the interaction store
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub student_username: String,
    pub exam_id: String,
    pub question_idx: u32,
    pub chat_id: String,
}

// Unit of work handed over by the caller
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AskAction {
    pub student_username: String,
    pub exam_id: String,
    pub question_idx: u32,
    pub chat_id: String,
    pub model_key: String,
    // base64 encoded image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl AskAction {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey {
            student_username: self.student_username.clone(),
            exam_id: self.exam_id.clone(),
            question_idx: self.question_idx,
            chat_id: self.chat_id.clone(),
        }
    }
}

/// Opaque correlation data supplied by the caller.
///
/// Copied verbatim into every [`ResponseEvent`] so the consumer draining the
/// response queue can route the event back to the request it belongs to.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct RequestIdentifiers(pub Map<String, Value>);

impl RequestIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// The only artifact published by the bridge.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ResponseEvent {
    #[serde(flatten)]
    pub identifiers: RequestIdentifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub ended: bool,
    pub chat_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_key: Option<String>,
}

impl ResponseEvent {
    pub fn delta(
        identifiers: &RequestIdentifiers,
        chat_key: &str,
        model_key: &str,
        answer: String,
    ) -> Self {
        Self {
            identifiers: identifiers.clone(),
            answer: Some(answer),
            ended: false,
            chat_key: chat_key.to_string(),
            model_key: Some(model_key.to_string()),
        }
    }

    pub fn terminal(identifiers: &RequestIdentifiers, chat_key: &str, model_key: &str) -> Self {
        Self {
            identifiers: identifiers.clone(),
            answer: None,
            ended: true,
            chat_key: chat_key.to_string(),
            model_key: Some(model_key.to_string()),
        }
    }

    // One listed model; carries no model_key
    pub fn model_listing(identifiers: &RequestIdentifiers, chat_key: &str, name: String) -> Self {
        Self {
            identifiers: identifiers.clone(),
            answer: Some(name),
            ended: true,
            chat_key: chat_key.to_string(),
            model_key: None,
        }
    }
}

// Role-tagged message of a chat request
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// Ollama /api/chat request format
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub stream: bool,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

// One NDJSON line of a streamed /api/chat response
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub message: Option<ChatStreamMessage>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ChatStreamMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

// Ollama /api/tags response format
#[derive(Deserialize, Clone, Debug)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<TagModel>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TagModel {
    pub name: String,
}

/// Optional knobs a caller may pass along with a prompt.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct PromptOptions {
    #[serde(default)]
    pub action: Option<AskAction>,
    #[serde(default)]
    pub custom_init_prompt: Option<String>,
    #[serde(default)]
    pub custom_temperature: Option<f64>,
}

// Extras actually honoured by the request builder
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PromptExtras {
    pub custom_init_prompt: Option<String>,
    pub custom_temperature: Option<f64>,
}

impl PromptExtras {
    // Keeps only the extras that were provided and are non-empty
    pub fn from_options(options: &PromptOptions) -> Self {
        Self {
            custom_init_prompt: options
                .custom_init_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
            // zero counts as not provided, the default temperature applies
            custom_temperature: options
                .custom_temperature
                .filter(|t| t.is_finite() && *t != 0.0),
        }
    }
}
