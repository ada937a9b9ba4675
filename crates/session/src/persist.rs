//! Durable record keys and load/save helpers for the session collections.
//!
//! Loading runs every raw record through migration; a record that cannot be
//! migrated is treated as absent and left untouched in the store.

use fewshot_core::store::{self, KeyValueStore};
use fewshot_prompt::{
    migrate_conversation, migrate_examples, migrate_templates, ConversationLog, ExampleSet,
    TemplateSet,
};
use serde_json::Value;

pub const EXAMPLES_KEY: &str = "fewshot.examples";
pub const TEMPLATES_KEY: &str = "fewshot.templates";
pub const CONVERSATION_KEY: &str = "fewshot.conversation";

fn load_migrated<T>(
    store: &dyn KeyValueStore,
    key: &str,
    migrate: impl FnOnce(Value) -> Option<T>,
) -> Option<T> {
    let raw = store::load_value(store, key)?;
    let record = migrate(raw);
    if record.is_none() {
        tracing::warn!(
            "Stored record '{}' has an unrecognized shape; starting from an empty collection",
            key
        );
    }
    record
}

pub fn load_examples(store: &dyn KeyValueStore) -> ExampleSet {
    load_migrated(store, EXAMPLES_KEY, migrate_examples)
        .map(ExampleSet::from_record)
        .unwrap_or_default()
}

pub fn load_templates(store: &dyn KeyValueStore) -> TemplateSet {
    load_migrated(store, TEMPLATES_KEY, migrate_templates)
        .map(TemplateSet::from_record)
        .unwrap_or_default()
}

pub fn load_conversation(store: &dyn KeyValueStore) -> ConversationLog {
    load_migrated(store, CONVERSATION_KEY, migrate_conversation)
        .map(ConversationLog::from_record)
        .unwrap_or_default()
}

pub fn save_examples(store: &dyn KeyValueStore, examples: &ExampleSet) -> bool {
    store::save(store, EXAMPLES_KEY, &examples.to_record())
}

pub fn save_templates(store: &dyn KeyValueStore, templates: &TemplateSet) -> bool {
    store::save(store, TEMPLATES_KEY, &templates.to_record())
}

pub fn save_conversation(store: &dyn KeyValueStore, conversation: &ConversationLog) -> bool {
    store::save(store, CONVERSATION_KEY, &conversation.to_record())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fewshot_core::MemoryStore;
    use fewshot_prompt::{ExampleField, ExampleType, FragmentKind};

    #[test]
    fn test_absent_records_load_empty() {
        let store = MemoryStore::new();
        assert!(load_examples(&store).is_empty());
        assert!(load_templates(&store).is_empty());
        assert!(load_conversation(&store).is_empty());
    }

    #[test]
    fn test_examples_reload_equal() {
        let store = MemoryStore::new();
        let mut examples = ExampleSet::new();
        let a = examples.add(ExampleType::InputOutput);
        let b = examples.add(ExampleType::NameContent);
        examples.update(&a, ExampleField::First, "2+2");
        examples.update(&a, ExampleField::Second, "4");
        examples.toggle_active(&b);

        assert!(save_examples(&store, &examples));
        let reloaded = load_examples(&store);
        assert_eq!(reloaded.to_record(), examples.to_record());
        assert!(!reloaded.is_active(&b));
    }

    #[test]
    fn test_templates_reload_equal() {
        let store = MemoryStore::new();
        let mut templates = TemplateSet::new();
        let id = templates.create_template();
        let fragment = templates.add_fragment(&id, FragmentKind::Variable).unwrap();
        templates.update_fragment(&id, &fragment, "Be brief.");

        assert!(save_templates(&store, &templates));
        assert_eq!(load_templates(&store).to_record(), templates.to_record());
    }

    #[test]
    fn test_corrupt_record_is_absent_and_kept() {
        let store = MemoryStore::new();
        store.put(EXAMPLES_KEY, "{not json").unwrap();
        store.put(TEMPLATES_KEY, "42").unwrap();

        assert!(load_examples(&store).is_empty());
        assert!(load_templates(&store).is_empty());
        assert_eq!(store.get(EXAMPLES_KEY).unwrap().as_deref(), Some("{not json"));
        assert_eq!(store.get(TEMPLATES_KEY).unwrap().as_deref(), Some("42"));
    }

    #[test]
    fn test_legacy_example_array_loads() {
        let store = MemoryStore::new();
        store
            .put(
                EXAMPLES_KEY,
                r#"[{"input": "hi", "output": "hello"}, {"name": "Ada", "content": "math"}]"#,
            )
            .unwrap();

        let examples = load_examples(&store);
        assert_eq!(examples.len(), 2);
        assert_eq!(examples.active_count(), 2);
        assert_eq!(examples.examples()[1].example_type, ExampleType::NameContent);
    }
}
