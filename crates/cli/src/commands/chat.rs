//! Chat command handler.
//!
//! Interactive loop over stdin. Lines starting with `/` are commands.

use super::compose::print_composed;
use super::{open_session, ModelAccess};
use clap::Args;
use fewshot_core::{config::AppConfig, AppResult};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /clear (forget the conversation), /preview (show the next prompt), /quit";

/// Chat interactively with the model
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Start from an empty conversation
    #[arg(long)]
    pub fresh: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let session = open_session(config, ModelAccess::Required)?;
        if self.fresh {
            session.clear_conversation();
        }

        let examples = session.examples();
        println!(
            "Chatting with {} ({} of {} examples active). {}",
            config.model,
            examples.active_count(),
            examples.len(),
            HELP
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("you> ");
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };

            match line.trim() {
                "" => continue,
                "/quit" | "/exit" => break,
                "/clear" => {
                    session.clear_conversation();
                    println!("(conversation cleared)");
                    continue;
                }
                "/preview" => {
                    print_composed(&session.compose_preview(None)?);
                    continue;
                }
                "/help" => {
                    println!("{}", HELP);
                    continue;
                }
                _ => {}
            }

            match session.send(line).await {
                Ok(outcome) => println!("model> {}", outcome.turn().content),
                Err(e) => eprintln!("{}", e),
            }
        }

        session.flush();
        Ok(())
    }
}
