//! Turn history of the live conversation.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,

    /// Text actually submitted for this turn when it differs from `content`,
    /// e.g. a user message with the template block folded in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<String>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            sent: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            sent: None,
        }
    }

    /// Record the submitted text. Identical text is not stored twice.
    pub fn with_sent(mut self, sent: impl Into<String>) -> Self {
        let sent = sent.into();
        self.sent = if sent == self.content { None } else { Some(sent) };
        self
    }

    /// Text to replay for this turn in later requests.
    pub fn replay_text(&self) -> &str {
        self.sent.as_deref().unwrap_or(&self.content)
    }
}

/// Durable shape of a [`ConversationLog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub turns: Vec<ConversationTurn>,
}

/// Append-only turn history. Only [`ConversationLog::clear`] removes turns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(record: ConversationRecord) -> Self {
        Self {
            turns: record.turns,
        }
    }

    pub fn to_record(&self) -> ConversationRecord {
        ConversationRecord {
            turns: self.turns.clone(),
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ConversationTurn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ConversationTurn::assistant(content));
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// The final turn if it is a user turn that has not been submitted yet.
    pub fn pending_user(&self) -> Option<&ConversationTurn> {
        self.turns
            .last()
            .filter(|turn| turn.role == TurnRole::User && turn.sent.is_none())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
