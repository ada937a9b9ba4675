//! Prompt composition for fewshot.
//!
//! This crate owns the session's editable state and the algorithm that
//! serializes it:
//! - Example sets (few-shot demonstration pairs and their activation)
//! - Template sets (ordered static/variable fragments)
//! - The conversation log
//! - Load-time migration of stored records
//! - The compositor producing the ordered message list

pub mod compositor;
pub mod conversation;
pub mod example;
pub mod loader;
pub mod migrate;
pub mod template;
pub mod types;

// Re-export main types
pub use compositor::{template_block, Compositor};
pub use conversation::{ConversationLog, ConversationRecord, ConversationTurn, TurnRole};
pub use example::{Example, ExampleField, ExampleRecord, ExampleSet, ExampleType};
pub use loader::{load_style, write_default_style};
pub use migrate::{migrate_conversation, migrate_examples, migrate_templates};
pub use template::{FragmentKind, Template, TemplateFragment, TemplateRecord, TemplateSet};
pub use types::{ComposedPrompt, ComposedPromptMetadata, CompositionStyle, PromptMessage, PromptRole};
