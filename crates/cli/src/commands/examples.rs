//! Examples command handler.
//!
//! Lists and edits the demonstration pairs. Positions on the command line
//! are 1-based; ids may be abbreviated to any unique prefix.

use super::{open_session, position, print_json, resolve_id, short_id, ModelAccess};
use clap::{Args, Subcommand};
use fewshot_core::{config::AppConfig, AppResult};
use fewshot_prompt::{ExampleField, ExampleType};
use fewshot_session::Session;

fn parse_example_type(s: &str) -> Result<ExampleType, String> {
    ExampleType::parse(s).ok_or_else(|| {
        format!(
            "unknown example type '{}' (expected input-output or name-content)",
            s
        )
    })
}

fn parse_field(s: &str) -> Result<ExampleField, String> {
    match s {
        "first" | "1" => Ok(ExampleField::First),
        "second" | "2" => Ok(ExampleField::Second),
        _ => Err(format!("unknown field '{}' (expected first or second)", s)),
    }
}

/// Manage few-shot examples
#[derive(Args, Debug)]
pub struct ExamplesCommand {
    #[command(subcommand)]
    pub action: ExamplesAction,
}

#[derive(Subcommand, Debug)]
pub enum ExamplesAction {
    /// List examples in order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an example (active by default)
    Add {
        /// Example type (input-output, name-content)
        #[arg(short = 't', long = "type", default_value = "input-output", value_parser = parse_example_type)]
        example_type: ExampleType,

        /// Text of the first field (input or name)
        #[arg(long)]
        first: Option<String>,

        /// Text of the second field (output or content)
        #[arg(long)]
        second: Option<String>,
    },
    /// Set the text of one field
    Set {
        id: String,
        /// Field to set (first, second)
        #[arg(value_parser = parse_field)]
        field: ExampleField,
        value: String,
    },
    /// Change the type of an example, keeping its text
    Retype {
        id: String,
        #[arg(value_parser = parse_example_type)]
        example_type: ExampleType,
    },
    /// Remove an example
    Remove { id: String },
    /// Flip whether an example is active
    Toggle { id: String },
    /// Move the example at FROM to position TO
    Move { from: usize, to: usize },
    /// Activate every example
    SelectAll,
    /// Deactivate every example
    SelectNone,
}

impl ExamplesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing examples command");
        tracing::debug!("Examples options: {:?}", self);

        let session = open_session(config, ModelAccess::Offline)?;

        match &self.action {
            ExamplesAction::List { json } => list(&session, *json)?,
            ExamplesAction::Add {
                example_type,
                first,
                second,
            } => {
                let id = session.add_example(*example_type);
                if let Some(first) = first {
                    session.update_example(&id, ExampleField::First, first.as_str());
                }
                if let Some(second) = second {
                    session.update_example(&id, ExampleField::Second, second.as_str());
                }
                println!("{}", id);
            }
            ExamplesAction::Set { id, field, value } => {
                let id = find(&session, id)?;
                report(session.update_example(&id, *field, value.as_str()));
            }
            ExamplesAction::Retype { id, example_type } => {
                let id = find(&session, id)?;
                report(session.change_example_type(&id, *example_type));
            }
            ExamplesAction::Remove { id } => {
                let id = find(&session, id)?;
                report(session.remove_example(&id));
            }
            ExamplesAction::Toggle { id } => {
                let id = find(&session, id)?;
                report(session.toggle_example(&id));
                let state = if session.examples().is_active(&id) {
                    "active"
                } else {
                    "inactive"
                };
                println!("{} is now {}", short_id(&id), state);
            }
            ExamplesAction::Move { from, to } => {
                report(session.move_example(position(*from)?, position(*to)?));
            }
            ExamplesAction::SelectAll => report(session.select_all_examples()),
            ExamplesAction::SelectNone => report(session.select_no_examples()),
        }

        session.flush();
        Ok(())
    }
}

fn find(session: &Session, query: &str) -> AppResult<String> {
    let examples = session.examples();
    resolve_id(
        "example",
        query,
        examples.examples().iter().map(|e| e.id.as_str()),
    )
}

fn report(changed: bool) {
    if !changed {
        println!("Nothing changed");
    }
}

fn list(session: &Session, json: bool) -> AppResult<()> {
    let examples = session.examples();

    if json {
        let items: Vec<serde_json::Value> = examples
            .examples()
            .iter()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "type": e.example_type.as_str(),
                    "firstField": e.first_field,
                    "secondField": e.second_field,
                    "active": examples.is_active(&e.id),
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "examples": items }));
    }

    if examples.is_empty() {
        println!("No examples yet. Add one with `fewshot examples add`.");
        return Ok(());
    }

    for (index, example) in examples.examples().iter().enumerate() {
        let marker = if examples.is_active(&example.id) { "*" } else { " " };
        let (first_label, second_label) = example.example_type.labels();
        println!(
            "{} {:>2}. [{}] {}",
            marker,
            index + 1,
            short_id(&example.id),
            example.example_type.as_str()
        );
        println!("       {}: {}", first_label, example.first_field);
        println!("       {}: {}", second_label, example.second_field);
    }
    println!(
        "{} of {} active",
        examples.active_count(),
        examples.len()
    );

    Ok(())
}
