use crate::config::HandlerConfig;
use crate::models::{AskAction, ChatMessage, ChatRequest, PromptExtras};

// Ollama models that accept image attachments
pub const VISION_MODELS: &[&str] = &[
    "llava",
    "llava-llama3",
    "llava-phi3",
    "bakllava",
    "llama3.2-vision",
    "minicpm-v",
    "moondream",
];

// "llava:13b" is vision-capable because "llava" is
pub fn is_vision_model(model_key: &str) -> bool {
    let base = model_key.split(':').next().unwrap_or(model_key);
    VISION_MODELS.contains(&base)
}

/// Builds the streamed `/api/chat` payload for one prompt.
pub fn build_chat_request<I>(
    config: &HandlerConfig,
    action: &AskAction,
    history: I,
    extras: &PromptExtras,
) -> ChatRequest
where
    I: IntoIterator<Item = ChatMessage>,
{
    let init_prompt = extras
        .custom_init_prompt
        .as_deref()
        .unwrap_or(&config.system_prompt);

    let mut messages = vec![ChatMessage::system(init_prompt)];
    messages.extend(history);

    // backend rejects images sent to a text-only model
    let images = match &action.image {
        Some(image) if is_vision_model(&action.model_key) => Some(vec![image.clone()]),
        Some(_) => {
            tracing::debug!(model = %action.model_key, "dropping image for non-vision model");
            None
        }
        None => None,
    };

    ChatRequest {
        model: action.model_key.clone(),
        messages,
        temperature: extras.custom_temperature.unwrap_or(config.temperature),
        stream: true,
        user: action.student_username.clone(),
        images,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(model_key: &str, image: Option<&str>) -> AskAction {
        AskAction {
            student_username: "alice".to_string(),
            exam_id: "exam-1".to_string(),
            question_idx: 0,
            chat_id: "chat-1".to_string(),
            model_key: model_key.to_string(),
            image: image.map(str::to_string),
        }
    }

    #[test]
    fn defaults_fill_system_prompt_and_temperature() {
        let config = HandlerConfig::default();
        let request = build_chat_request(
            &config,
            &action("mistral", None),
            vec![ChatMessage::user("2+2?")],
            &PromptExtras::default(),
        );

        assert_eq!(request.messages[0], ChatMessage::system(config.system_prompt.clone()));
        assert_eq!(request.messages[1], ChatMessage::user("2+2?"));
        assert_eq!(request.temperature, config.temperature);
        assert_eq!(request.model, "mistral");
        assert_eq!(request.user, "alice");
        assert!(request.stream);
    }

    #[test]
    fn extras_override_defaults() {
        let extras = PromptExtras {
            custom_init_prompt: Some("Answer like Socrates.".to_string()),
            custom_temperature: Some(0.1),
        };
        let request = build_chat_request(
            &HandlerConfig::default(),
            &action("mistral", None),
            Vec::new(),
            &extras,
        );

        assert_eq!(request.messages, vec![ChatMessage::system("Answer like Socrates.")]);
        assert_eq!(request.temperature, 0.1);
    }

    #[test]
    fn image_dropped_for_text_model() {
        let request = build_chat_request(
            &HandlerConfig::default(),
            &action("mistral", Some("aGVsbG8=")),
            Vec::new(),
            &PromptExtras::default(),
        );
        assert!(request.images.is_none());

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("images").is_none());
    }

    #[test]
    fn image_attached_for_vision_model() {
        let request = build_chat_request(
            &HandlerConfig::default(),
            &action("llava:13b", Some("aGVsbG8=")),
            Vec::new(),
            &PromptExtras::default(),
        );
        assert_eq!(request.images, Some(vec!["aGVsbG8=".to_string()]));
    }

    #[test]
    fn vision_match_ignores_tag_only() {
        assert!(is_vision_model("llava"));
        assert!(is_vision_model("moondream:latest"));
        assert!(!is_vision_model("llava2"));
        assert!(!is_vision_model("mistral"));
    }
}
