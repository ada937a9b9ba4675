//! Templates command handler.
//!
//! Fragment commands act on the current template unless `--template` names
//! another one.

use super::{open_session, position, print_json, resolve_id, short_id, ModelAccess};
use clap::{Args, Subcommand};
use fewshot_core::{config::AppConfig, AppError, AppResult};
use fewshot_prompt::FragmentKind;
use fewshot_session::Session;

fn parse_fragment_kind(s: &str) -> Result<FragmentKind, String> {
    FragmentKind::parse(s)
        .ok_or_else(|| format!("unknown fragment kind '{}' (expected static-text or variable)", s))
}

/// Manage prompt templates
#[derive(Args, Debug)]
pub struct TemplatesCommand {
    #[command(subcommand)]
    pub action: TemplatesAction,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesAction {
    /// List templates and their fragments
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a template with one empty text fragment
    New,
    /// Delete a template
    Delete { template: String },
    /// Make a template the current one
    Use { template: String },
    /// Append a fragment
    AddFragment {
        /// Fragment kind (static-text, variable)
        #[arg(short, long, default_value = "static-text", value_parser = parse_fragment_kind)]
        kind: FragmentKind,

        /// Initial content
        #[arg(long)]
        content: Option<String>,

        /// Template to edit (default: current)
        #[arg(long)]
        template: Option<String>,
    },
    /// Replace the content of a fragment
    SetFragment {
        fragment: String,
        content: String,

        /// Template to edit (default: current)
        #[arg(long)]
        template: Option<String>,
    },
    /// Remove a fragment
    RemoveFragment {
        fragment: String,

        /// Template to edit (default: current)
        #[arg(long)]
        template: Option<String>,
    },
    /// Move the fragment at FROM to position TO
    MoveFragment {
        from: usize,
        to: usize,

        /// Template to edit (default: current)
        #[arg(long)]
        template: Option<String>,
    },
}

impl TemplatesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing templates command");
        tracing::debug!("Templates options: {:?}", self);

        let session = open_session(config, ModelAccess::Offline)?;

        match &self.action {
            TemplatesAction::List { json } => list(&session, *json)?,
            TemplatesAction::New => {
                println!("{}", session.create_template());
            }
            TemplatesAction::Delete { template } => {
                let id = find_template(&session, template)?;
                report(session.remove_template(&id));
            }
            TemplatesAction::Use { template } => {
                let id = find_template(&session, template)?;
                session.set_current_template(&id);
                println!("Current template: {}", short_id(&id));
            }
            TemplatesAction::AddFragment {
                kind,
                content,
                template,
            } => {
                let template_id = target_template(&session, template.as_deref())?;
                let fragment_id = session
                    .add_fragment(&template_id, *kind)
                    .ok_or_else(|| AppError::Other("Template disappeared".to_string()))?;
                if let Some(content) = content {
                    session.update_fragment(&template_id, &fragment_id, content.as_str());
                }
                println!("{}", fragment_id);
            }
            TemplatesAction::SetFragment {
                fragment,
                content,
                template,
            } => {
                let template_id = target_template(&session, template.as_deref())?;
                let fragment_id = find_fragment(&session, &template_id, fragment)?;
                report(session.update_fragment(&template_id, &fragment_id, content.as_str()));
            }
            TemplatesAction::RemoveFragment { fragment, template } => {
                let template_id = target_template(&session, template.as_deref())?;
                let fragment_id = find_fragment(&session, &template_id, fragment)?;
                report(session.remove_fragment(&template_id, &fragment_id));
            }
            TemplatesAction::MoveFragment { from, to, template } => {
                let template_id = target_template(&session, template.as_deref())?;
                report(session.move_fragment(&template_id, position(*from)?, position(*to)?));
            }
        }

        // Template writes are debounced; make them durable before exiting
        session.flush();
        Ok(())
    }
}

fn report(changed: bool) {
    if !changed {
        println!("Nothing changed");
    }
}

fn find_template(session: &Session, query: &str) -> AppResult<String> {
    let templates = session.templates();
    resolve_id(
        "template",
        query,
        templates.templates().iter().map(|t| t.id.as_str()),
    )
}

fn target_template(session: &Session, query: Option<&str>) -> AppResult<String> {
    match query {
        Some(query) => find_template(session, query),
        None => session
            .templates()
            .current_id()
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Other(
                    "No current template. Create one with `fewshot templates new`.".to_string(),
                )
            }),
    }
}

fn find_fragment(session: &Session, template_id: &str, query: &str) -> AppResult<String> {
    let templates = session.templates();
    let template = templates
        .get(template_id)
        .ok_or_else(|| AppError::Other(format!("No template matches '{}'", template_id)))?;
    resolve_id(
        "fragment",
        query,
        template.fragments.iter().map(|f| f.id.as_str()),
    )
}

fn list(session: &Session, json: bool) -> AppResult<()> {
    let templates = session.templates();
    let current = templates.current_id();

    if json {
        let items: Vec<serde_json::Value> = templates
            .templates()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "current": Some(t.id.as_str()) == current,
                    "rendered": t.render(),
                    "fragments": t.fragments.iter().map(|f| serde_json::json!({
                        "id": f.id,
                        "kind": f.kind.as_str(),
                        "content": f.content,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "currentId": current,
            "policy": session.options().template_policy,
            "templates": items,
        }));
    }

    if templates.is_empty() {
        println!("No templates yet. Create one with `fewshot templates new`.");
        return Ok(());
    }

    for template in templates.templates() {
        let marker = if Some(template.id.as_str()) == current {
            "*"
        } else {
            " "
        };
        println!("{} [{}]", marker, short_id(&template.id));
        for (index, fragment) in template.fragments.iter().enumerate() {
            println!(
                "    {:>2}. [{}] {:<11} {}",
                index + 1,
                short_id(&fragment.id),
                fragment.kind.as_str(),
                fragment.content
            );
        }
    }

    Ok(())
}
