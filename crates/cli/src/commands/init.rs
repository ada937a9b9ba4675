//! Init command handler.
//!
//! Creates `.fewshot/` and writes an editable copy of the default
//! composition style.

use clap::Args;
use fewshot_core::{config::AppConfig, AppResult};
use fewshot_prompt::{loader::style_path, write_default_style};

/// Prepare the workspace and write the default style file
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing style file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing init command");

        config.ensure_fewshot_dir()?;

        let path = style_path(&config.workspace);
        if path.exists() && !self.force {
            println!("{} already exists (use --force to overwrite)", path.display());
            return Ok(());
        }

        let written = write_default_style(&config.workspace)?;
        println!("Wrote {}", written.display());
        Ok(())
    }
}
