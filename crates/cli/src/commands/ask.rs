//! Ask command handler.
//!
//! Sends one message through the session and prints the reply.

use super::{open_session_with, print_json, ModelAccess};
use clap::Args;
use fewshot_core::{config::AppConfig, AppResult};
use fewshot_session::{SendOutcome, SessionOptions};

/// Send one message and print the reply
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The message to send
    pub message: String,

    /// Maximum tokens in response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut options = SessionOptions::from_config(config);
        options.max_tokens = self.max_tokens;
        options.temperature = self.temperature;
        let session = open_session_with(config, ModelAccess::Required, options)?;

        let outcome = session.send(self.message.as_str()).await?;

        if self.json {
            let (answer, error) = match &outcome {
                SendOutcome::Replied(turn) => (turn.content.as_str(), None),
                SendOutcome::Failed { turn, reason } => (turn.content.as_str(), Some(reason)),
            };
            print_json(&serde_json::json!({
                "answer": answer,
                "ok": outcome.is_success(),
                "error": error,
                "model": config.model,
                "provider": config.provider,
                "turns": session.conversation().len(),
            }))?;
        } else {
            println!("{}", outcome.turn().content);
            if let SendOutcome::Failed { reason, .. } = &outcome {
                tracing::error!("Request failed: {}", reason);
            }
        }

        session.flush();
        Ok(())
    }
}
