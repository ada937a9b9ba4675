//! Compose command handler.
//!
//! Previews the exact message list the next send would submit.

use super::{open_session, print_json, ModelAccess};
use clap::Args;
use fewshot_core::{config::AppConfig, AppResult};
use fewshot_prompt::{ComposedPrompt, PromptRole};

/// Preview the composed message list
#[derive(Args, Debug)]
pub struct ComposeCommand {
    /// Draft message to append as the next user turn
    pub message: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ComposeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing compose command");
        tracing::debug!("Compose options: {:?}", self);

        let session = open_session(config, ModelAccess::Offline)?;
        let composed = session.compose_preview(self.message.as_deref())?;

        if self.json {
            print_json(&serde_json::to_value(&composed)?)
        } else {
            print_composed(&composed);
            Ok(())
        }
    }
}

/// Print a composed prompt as a readable transcript.
pub fn print_composed(composed: &ComposedPrompt) {
    if composed.messages.is_empty() {
        println!("(nothing to send)");
        return;
    }

    for (index, message) in composed.messages.iter().enumerate() {
        let role = match message.role {
            PromptRole::User => "user",
            PromptRole::Model => "model",
        };
        println!("--- {} [{}] ---", index + 1, role);
        println!("{}", message.text);
    }

    let metadata = &composed.metadata;
    println!("---");
    println!(
        "{} messages: {} examples, {} turns, {} template(s){}",
        composed.messages.len(),
        metadata.example_count,
        metadata.turn_count,
        metadata.template_ids.len(),
        if metadata.template_folded {
            " folded into the last user turn"
        } else {
            ""
        }
    );
}
