//! Short-term conversation memory
//!
//! Keeps the last few user/assistant exchanges so follow-up questions have
//! context, and forgets them after a period of inactivity.

use std::time::{Duration, Instant};

use crate::provider::{ChatMessage, Role};

/// Bounded history of completed exchanges
#[derive(Debug, Clone)]
pub struct ConversationBuffer {
    max_turns: usize,
    reset_timeout: Option<Duration>,
    turns: Vec<ChatMessage>,
    last_activity: Option<Instant>,
}

impl ConversationBuffer {
    #[must_use]
    pub const fn new(max_turns: usize, reset_timeout: Option<Duration>) -> Self {
        Self {
            max_turns,
            reset_timeout,
            turns: Vec::new(),
            last_activity: None,
        }
    }

    /// Record a completed exchange, evicting the oldest beyond `max_turns`
    pub fn add_turn(&mut self, user: &str, assistant: &str, now: Instant) {
        self.turns.push(ChatMessage::new(Role::User, user));
        self.turns.push(ChatMessage::new(Role::Assistant, assistant));

        let max_messages = self.max_turns * 2;
        if self.turns.len() > max_messages {
            let excess = self.turns.len() - max_messages;
            self.turns.drain(..excess);
        }
        self.last_activity = Some(now);
    }

    /// Clear history if idle for at least the reset timeout
    ///
    /// The first call only records a baseline. Returns whether a reset happened.
    pub fn maybe_reset_for_inactivity(&mut self, now: Instant) -> bool {
        let Some(timeout) = self.reset_timeout else {
            return false;
        };

        let Some(last) = self.last_activity else {
            self.last_activity = Some(now);
            return false;
        };

        if now.saturating_duration_since(last) >= timeout {
            tracing::info!(idle_secs = timeout.as_secs_f64(), "conversation reset after inactivity");
            self.reset(now);
            return true;
        }

        false
    }

    /// Messages for a chat request: system prompt, history, then the new input
    #[must_use]
    pub fn build_messages(&self, system_prompt: &str, latest_user: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() + 2);
        messages.push(ChatMessage::new(Role::System, system_prompt));
        messages.extend(self.turns.iter().cloned());
        messages.push(ChatMessage::new(Role::User, latest_user));
        messages
    }

    /// Forget all history
    pub fn reset(&mut self, now: Instant) {
        self.turns.clear();
        self.last_activity = Some(now);
    }

    #[must_use]
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
