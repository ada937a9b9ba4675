//! Load-time migration of stored records.
//!
//! Each function maps a raw JSON value, as found in the store, to the
//! current record shape. Older revisions wrote bare arrays, omitted the
//! `type`/`kind` tags or used `input`/`output` field names; those are
//! patched here once, at load. Anything that cannot be understood yields
//! `None` and is treated as absent by the caller.

use crate::conversation::{ConversationRecord, ConversationTurn, TurnRole};
use crate::example::{Example, ExampleRecord, ExampleType};
use crate::template::{FragmentKind, Template, TemplateFragment, TemplateRecord};
use fewshot_core::new_id;
use serde_json::{Map, Value};

/// Migrate a stored example collection.
pub fn migrate_examples(raw: Value) -> Option<ExampleRecord> {
    match raw {
        Value::Object(obj) => {
            let examples = obj
                .get("examples")?
                .as_array()?
                .iter()
                .map(migrate_example)
                .collect::<Option<Vec<_>>>()?;

            let active_ids = match obj.get("activeIds") {
                Some(Value::Array(ids)) => ids
                    .iter()
                    .map(|id| id.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()?,
                // Revisions without persisted activation treated every example as active
                Some(Value::Null) | None => examples.iter().map(|e| e.id.clone()).collect(),
                Some(_) => return None,
            };

            Some(ExampleRecord {
                examples,
                active_ids,
            })
        }
        Value::Array(items) => {
            let examples = items
                .iter()
                .map(migrate_example)
                .collect::<Option<Vec<_>>>()?;
            let active_ids = examples.iter().map(|e| e.id.clone()).collect();
            Some(ExampleRecord {
                examples,
                active_ids,
            })
        }
        _ => None,
    }
}

fn migrate_example(raw: &Value) -> Option<Example> {
    let obj = raw.as_object()?;
    let id = string_field(obj, &["id"])?.unwrap_or_else(new_id);

    let legacy_name_content = obj.contains_key("name") || obj.contains_key("content");
    let example_type = match string_field(obj, &["type"])? {
        Some(tag) => ExampleType::parse(&tag)?,
        None if legacy_name_content => ExampleType::NameContent,
        None => ExampleType::InputOutput,
    };

    let first_field = string_field(obj, &["firstField", "input", "name"])?.unwrap_or_default();
    let second_field =
        string_field(obj, &["secondField", "output", "content"])?.unwrap_or_default();

    Some(Example {
        id,
        example_type,
        first_field,
        second_field,
    })
}

/// Migrate a stored template collection.
pub fn migrate_templates(raw: Value) -> Option<TemplateRecord> {
    match raw {
        Value::Object(obj) if obj.contains_key("templates") => {
            let templates = obj
                .get("templates")?
                .as_array()?
                .iter()
                .map(migrate_template)
                .collect::<Option<Vec<_>>>()?;

            let current_id = match obj.get("currentId") {
                None | Some(Value::Null) => None,
                Some(Value::String(id)) => Some(id.clone()),
                Some(_) => return None,
            };

            Some(TemplateRecord {
                templates,
                current_id,
            })
        }
        // A single template object
        Value::Object(_) => {
            let template = migrate_template(&raw)?;
            Some(TemplateRecord {
                templates: vec![template],
                current_id: None,
            })
        }
        Value::Array(items) => {
            let looks_like_templates = items
                .iter()
                .all(|item| item.get("fragments").is_some());

            let templates = if looks_like_templates {
                items
                    .iter()
                    .map(migrate_template)
                    .collect::<Option<Vec<_>>>()?
            } else {
                // The single-template revision stored its fragments directly
                let fragments = items
                    .iter()
                    .map(migrate_fragment)
                    .collect::<Option<Vec<_>>>()?;
                vec![Template {
                    id: new_id(),
                    fragments,
                }]
            };

            Some(TemplateRecord {
                templates,
                current_id: None,
            })
        }
        _ => None,
    }
}

fn migrate_template(raw: &Value) -> Option<Template> {
    let obj = raw.as_object()?;
    let id = string_field(obj, &["id"])?.unwrap_or_else(new_id);
    let fragments = obj
        .get("fragments")?
        .as_array()?
        .iter()
        .map(migrate_fragment)
        .collect::<Option<Vec<_>>>()?;

    Some(Template { id, fragments })
}

fn migrate_fragment(raw: &Value) -> Option<TemplateFragment> {
    let obj = raw.as_object()?;
    let id = string_field(obj, &["id"])?.unwrap_or_else(new_id);
    let kind = match string_field(obj, &["kind", "type"])? {
        Some(tag) => FragmentKind::parse(&tag)?,
        None => FragmentKind::StaticText,
    };
    let content = string_field(obj, &["content", "value", "text"])?.unwrap_or_default();

    Some(TemplateFragment { id, kind, content })
}

/// Migrate a stored conversation.
pub fn migrate_conversation(raw: Value) -> Option<ConversationRecord> {
    let items = match raw {
        Value::Object(ref obj) => obj.get("turns")?.as_array()?.clone(),
        Value::Array(items) => items,
        _ => return None,
    };

    let turns = items
        .iter()
        .map(migrate_turn)
        .collect::<Option<Vec<_>>>()?;

    Some(ConversationRecord { turns })
}

fn migrate_turn(raw: &Value) -> Option<ConversationTurn> {
    let obj = raw.as_object()?;
    let role = match string_field(obj, &["role"])?.as_deref() {
        Some("user") => TurnRole::User,
        Some("assistant") | Some("model") => TurnRole::Assistant,
        _ => return None,
    };
    let content = string_field(obj, &["content", "text"])?.unwrap_or_default();
    let sent = string_field(obj, &["sent"])?;

    Some(ConversationTurn {
        role,
        content,
        sent,
    })
}

/// First present key among `keys`.
///
/// `None` when the key holds a non-string (shape mismatch), `Some(None)`
/// when no key is present.
fn string_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<Option<String>> {
    for key in keys {
        match obj.get(*key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => return Some(Some(s.clone())),
            Some(_) => return None,
        }
    }
    Some(None)
}
