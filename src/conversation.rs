//! Rebuilds the chat transcript replayed to the model from stored interactions.

use crate::models::{ChatInteraction, ChatMessage};

/// Turns stored interactions (oldest first) into role-tagged messages.
///
/// Every interaction yields a `user` message. Completed interactions are
/// followed by the matching `assistant` message; pending ones never are.
pub fn reconstruct<'a, I>(interactions: I) -> impl Iterator<Item = ChatMessage> + 'a
where
    I: IntoIterator<Item = &'a ChatInteraction>,
    I::IntoIter: 'a,
{
    interactions.into_iter().flat_map(|interaction| {
        let user = ChatMessage::user(interaction.model_prompt());
        let assistant = interaction
            .achieved
            .then(|| ChatMessage::assistant(interaction.answer.as_deref().unwrap_or_default()));
        std::iter::once(user).chain(assistant)
    })
}

/// Full transcript for a new prompt.
///
/// The store usually already holds the turn being asked as a pending
/// interaction. When it does not (empty history, or the newest turn is
/// already answered), the prompt is appended as the final user message.
pub fn transcript(history: &[ChatInteraction], prompt: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = reconstruct(history).collect();
    let pending_is_stored = history.last().is_some_and(|last| !last.achieved);
    if !pending_is_stored && !prompt.is_empty() {
        messages.push(ChatMessage::user(prompt));
    }
    messages
}
