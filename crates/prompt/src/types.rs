//! Composition style and composed-prompt types.

use serde::{Deserialize, Serialize};

/// Texts used to frame the demonstration block, and the example label format.
///
/// The framing pairs stand in for a system channel: a scripted user/model
/// exchange announces the demonstrations, and a second one closes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionStyle {
    /// User message opening the demonstration block
    pub intro_user: String,

    /// Scripted model acknowledgment of the intro
    pub intro_model: String,

    /// User message announcing the live conversation
    pub transition_user: String,

    /// Scripted model acknowledgment of the transition
    pub transition_model: String,

    /// Handlebars template for one example message.
    ///
    /// Receives `index` (1-based within the active examples), `label`
    /// (upper-cased field label) and `text`.
    pub example_label: String,
}

impl Default for CompositionStyle {
    fn default() -> Self {
        Self {
            intro_user: "I am going to show you some examples of the responses I expect. \
                         Study the pattern they follow."
                .to_string(),
            intro_model: "Understood. Show me the examples and I will follow their pattern."
                .to_string(),
            transition_user: "Those were the examples. The real conversation starts now; \
                              answer my next messages following the same pattern."
                .to_string(),
            transition_model: "Got it. I'm ready.".to_string(),
            example_label: "EXAMPLE {{index}} - {{label}}:\n{{text}}".to_string(),
        }
    }
}

/// Role of a composed message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Model,
}

/// One message of a composed prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Model,
            text: text.into(),
        }
    }
}

/// The ordered message list ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedPrompt {
    pub messages: Vec<PromptMessage>,
    pub metadata: ComposedPromptMetadata,
}

/// What went into a composed prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedPromptMetadata {
    /// Number of active examples emitted
    pub example_count: usize,

    /// Templates whose text was folded in, in order
    pub template_ids: Vec<String>,

    /// Whether the template block went into the last user turn (as opposed
    /// to a standalone message)
    pub template_folded: bool,

    /// Conversation turns appended
    pub turn_count: usize,
}
