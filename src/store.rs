use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;
use crate::models::{ChatInteraction, ConversationKey};

/// Read access to the stored history of a conversation.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// At most `window` most recent interactions for `key`, oldest first.
    async fn last_interactions(
        &self,
        key: &ConversationKey,
        window: usize,
    ) -> Result<Vec<ChatInteraction>>;
}

// Process-local store, no durability
#[derive(Default)]
pub struct InMemoryStore {
    conversations: DashMap<ConversationKey, Vec<ChatInteraction>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: ConversationKey, interaction: ChatInteraction) {
        self.conversations.entry(key).or_default().push(interaction);
    }

    // Attach an answer to the newest pending turn and mark it achieved
    pub fn complete_pending(&self, key: &ConversationKey, answer: String) -> bool {
        let Some(mut turns) = self.conversations.get_mut(key) else {
            return false;
        };
        match turns.iter_mut().rev().find(|turn| !turn.achieved) {
            Some(turn) => {
                turn.answer = Some(answer);
                turn.achieved = true;
                true
            }
            None => false,
        }
    }

    // Drop the newest pending turn, used when its prompt was never dispatched
    pub fn discard_pending(&self, key: &ConversationKey) -> bool {
        let Some(mut turns) = self.conversations.get_mut(key) else {
            return false;
        };
        match turns.iter().rposition(|turn| !turn.achieved) {
            Some(pos) => {
                turns.remove(pos);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl InteractionStore for InMemoryStore {
    async fn last_interactions(
        &self,
        key: &ConversationKey,
        window: usize,
    ) -> Result<Vec<ChatInteraction>> {
        let history = match self.conversations.get(key) {
            Some(turns) => {
                let skip = turns.len().saturating_sub(window);
                turns[skip..].to_vec()
            }
            None => Vec::new(),
        };
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(chat_id: &str) -> ConversationKey {
        ConversationKey {
            student_username: "alice".to_string(),
            exam_id: "exam-1".to_string(),
            question_idx: 2,
            chat_id: chat_id.to_string(),
        }
    }

    #[tokio::test]
    async fn window_keeps_most_recent_oldest_first() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.record(key("c"), ChatInteraction::completed(format!("q{i}"), "a"));
        }

        let history = store.last_interactions(&key("c"), 2).await.unwrap();
        let prompts: Vec<_> = history.iter().map(|h| h.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["q3", "q4"]);
    }

    #[tokio::test]
    async fn conversations_are_scoped_by_key() {
        let store = InMemoryStore::new();
        store.record(key("c1"), ChatInteraction::pending("hello"));

        assert!(store.last_interactions(&key("c2"), 10).await.unwrap().is_empty());
        assert_eq!(store.last_interactions(&key("c1"), 10).await.unwrap().len(), 1);
    }

    #[test]
    fn complete_pending_marks_newest_pending_turn() {
        let store = InMemoryStore::new();
        store.record(key("c"), ChatInteraction::pending("q"));

        assert!(store.complete_pending(&key("c"), "a".to_string()));
        assert!(!store.complete_pending(&key("c"), "again".to_string()));
    }

    #[tokio::test]
    async fn discarded_turn_is_not_replayed() {
        let store = InMemoryStore::new();
        store.record(key("c"), ChatInteraction::completed("q0", "a0"));
        store.record(key("c"), ChatInteraction::pending("q1"));

        assert!(store.discard_pending(&key("c")));
        let history = store.last_interactions(&key("c"), 10).await.unwrap();
        let prompts: Vec<_> = history.iter().map(|h| h.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["q0"]);

        // answered turns are never discarded
        assert!(!store.discard_pending(&key("c")));
        assert!(!store.discard_pending(&key("other")));
    }
}
