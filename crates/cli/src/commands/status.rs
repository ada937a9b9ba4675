//! Status command handler.

use super::{open_session, print_json, ModelAccess};
use clap::Args;
use fewshot_core::{config::AppConfig, AppResult, KeyValueStore};
use fewshot_prompt::loader::style_path;

/// Show collection counts and storage details
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let session = open_session(config, ModelAccess::Offline)?;
        let examples = session.examples();
        let templates = session.templates();
        let conversation = session.conversation();
        let keys = session.store().keys().unwrap_or_else(|e| {
            tracing::warn!("Could not list stored records: {}", e);
            Vec::new()
        });
        let style = style_path(&config.workspace);

        if self.json {
            return print_json(&serde_json::json!({
                "workspace": config.workspace,
                "provider": config.provider,
                "model": config.model,
                "examples": {
                    "total": examples.len(),
                    "active": examples.active_count(),
                },
                "templates": {
                    "total": templates.len(),
                    "currentId": templates.current_id(),
                    "policy": config.session.template_policy,
                },
                "conversation": {
                    "turns": conversation.len(),
                    "persisted": config.session.persist_conversation,
                },
                "store": {
                    "backend": session.store().name(),
                    "keys": keys,
                },
                "style": style.exists().then_some(style),
            }));
        }

        println!("Workspace:     {}", config.workspace.display());
        println!("Provider:      {} ({})", config.provider, config.model);
        println!(
            "Examples:      {} ({} active)",
            examples.len(),
            examples.active_count()
        );
        println!(
            "Templates:     {} (current: {})",
            templates.len(),
            templates.current_id().unwrap_or("none")
        );
        println!(
            "Conversation:  {} turns ({})",
            conversation.len(),
            if config.session.persist_conversation {
                "persisted"
            } else {
                "in memory only"
            }
        );
        println!("Store:         {}", session.store().name());
        for key in &keys {
            println!("               - {}", key);
        }
        if style.exists() {
            println!("Style:         {}", style.display());
        } else {
            println!("Style:         built-in defaults");
        }

        Ok(())
    }
}
