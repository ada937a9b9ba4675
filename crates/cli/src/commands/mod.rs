//! Command handlers for the fewshot CLI.
//!
//! Each subcommand lives in its own module; shared session setup and id
//! resolution live here.

pub mod ask;
pub mod chat;
pub mod compose;
pub mod examples;
pub mod init;
pub mod status;
pub mod templates;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use compose::ComposeCommand;
pub use examples::ExamplesCommand;
pub use init::InitCommand;
pub use status::StatusCommand;
pub use templates::TemplatesCommand;

use fewshot_core::{config::AppConfig, AppError, AppResult};
use fewshot_llm::{create_client, LlmClient, ScriptedClient};
use fewshot_prompt::{load_style, Compositor};
use fewshot_session::{open_store, Session, SessionOptions};
use std::sync::Arc;

/// Whether a command talks to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAccess {
    Required,
    Offline,
}

/// Open the workspace session for a command.
pub fn open_session(config: &AppConfig, access: ModelAccess) -> AppResult<Session> {
    open_session_with(config, access, SessionOptions::from_config(config))
}

/// Open the workspace session with explicit session options.
pub fn open_session_with(
    config: &AppConfig,
    access: ModelAccess,
    options: SessionOptions,
) -> AppResult<Session> {
    let store = open_store(config)?;
    let style = load_style(&config.workspace)?;
    let compositor = Compositor::new(style)?;

    let client: Arc<dyn LlmClient> = match access {
        ModelAccess::Required => {
            config.validate()?;
            let provider = config.provider.as_str();
            let api_key = config.resolve_api_key(provider);
            create_client(
                provider,
                config.provider_endpoint(provider),
                api_key.as_deref(),
                config.provider_timeout(provider),
            )
            .map_err(AppError::Config)?
        }
        // Never called: offline commands only edit and inspect state
        ModelAccess::Offline => Arc::new(ScriptedClient::new()),
    };

    Ok(Session::open(store, client, compositor, options))
}

/// Resolve a user-supplied id or unique id prefix against `ids`.
pub fn resolve_id<'a, I>(what: &str, query: &str, ids: I) -> AppResult<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matches = Vec::new();
    for id in ids {
        if id == query {
            return Ok(id.to_string());
        }
        if id.starts_with(query) {
            matches.push(id);
        }
    }

    match matches.as_slice() {
        [id] => Ok((*id).to_string()),
        [] => Err(AppError::Other(format!("No {} matches '{}'", what, query))),
        _ => Err(AppError::Other(format!(
            "'{}' is ambiguous: {} {}s match",
            query,
            matches.len(),
            what
        ))),
    }
}

/// Convert a 1-based position from the command line.
pub fn position(value: usize) -> AppResult<usize> {
    value
        .checked_sub(1)
        .ok_or_else(|| AppError::Other("Positions start at 1".to_string()))
}

/// Shorten an id for display.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
