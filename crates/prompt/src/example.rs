//! Few-shot demonstration pairs and their activation state.

use fewshot_core::{move_item, new_id};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Labeling scheme of an example's two fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExampleType {
    #[default]
    InputOutput,
    NameContent,
}

impl ExampleType {
    /// Labels attached to the first and second field.
    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            Self::InputOutput => ("Input", "Output"),
            Self::NameContent => ("Name", "Content"),
        }
    }

    /// Parse a type name as written in records or on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "input-output" | "inputoutput" | "io" => Some(Self::InputOutput),
            "name-content" | "namecontent" | "nc" => Some(Self::NameContent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputOutput => "input-output",
            Self::NameContent => "name-content",
        }
    }
}

/// Which of an example's two text fields to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleField {
    First,
    Second,
}

/// A demonstration pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    /// Stable identity, assigned at creation
    pub id: String,

    /// Labeling scheme
    #[serde(rename = "type")]
    pub example_type: ExampleType,

    pub first_field: String,

    pub second_field: String,
}

impl Example {
    /// A fresh, empty example.
    pub fn new(example_type: ExampleType) -> Self {
        Self {
            id: new_id(),
            example_type,
            first_field: String::new(),
            second_field: String::new(),
        }
    }
}

/// Durable shape of an [`ExampleSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleRecord {
    pub examples: Vec<Example>,

    /// Active ids, in example order
    #[serde(default)]
    pub active_ids: Vec<String>,
}

/// Ordered examples plus the subset that is active.
///
/// Every id in the active set names an example in the list once an
/// operation returns. Operations on unknown ids are silent no-ops; the
/// returned `bool` tells whether anything changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleSet {
    examples: Vec<Example>,
    active: HashSet<String>,
}

impl ExampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from its durable record.
    ///
    /// Duplicate example ids keep their first occurrence; active ids that
    /// name no example are dropped.
    pub fn from_record(record: ExampleRecord) -> Self {
        let mut seen = HashSet::new();
        let mut examples = Vec::with_capacity(record.examples.len());
        for example in record.examples {
            if seen.insert(example.id.clone()) {
                examples.push(example);
            } else {
                tracing::warn!("Dropping duplicate example id {}", example.id);
            }
        }

        let mut set = Self {
            examples,
            active: record.active_ids.into_iter().collect(),
        };
        set.prune_stale();
        set
    }

    /// Durable record with active ids listed in example order.
    pub fn to_record(&self) -> ExampleRecord {
        ExampleRecord {
            examples: self.examples.clone(),
            active_ids: self
                .examples
                .iter()
                .filter(|e| self.active.contains(&e.id))
                .map(|e| e.id.clone())
                .collect(),
        }
    }

    /// Append an empty example, active by default, and return its id.
    pub fn add(&mut self, example_type: ExampleType) -> String {
        let example = Example::new(example_type);
        let id = example.id.clone();
        self.active.insert(id.clone());
        self.examples.push(example);
        tracing::debug!("Added example {}", id);
        id
    }

    /// Delete an example and its activation.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.examples.len();
        self.examples.retain(|e| e.id != id);
        let removed = self.examples.len() != before;
        self.prune_stale();
        removed
    }

    /// Replace one field's text.
    pub fn update(&mut self, id: &str, field: ExampleField, value: impl Into<String>) -> bool {
        let Some(example) = self.get_mut(id) else {
            return false;
        };

        let slot = match field {
            ExampleField::First => &mut example.first_field,
            ExampleField::Second => &mut example.second_field,
        };
        *slot = value.into();
        true
    }

    /// Retag an example; its field contents are untouched.
    pub fn change_type(&mut self, id: &str, example_type: ExampleType) -> bool {
        match self.get_mut(id) {
            Some(example) => {
                example.example_type = example_type;
                true
            }
            None => false,
        }
    }

    /// Flip an example's membership in the active set.
    pub fn toggle_active(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }

        if !self.active.remove(id) {
            self.active.insert(id.to_string());
        }
        true
    }

    /// Activate every example.
    pub fn select_all(&mut self) -> bool {
        let all: HashSet<String> = self.examples.iter().map(|e| e.id.clone()).collect();
        let changed = all != self.active;
        self.active = all;
        changed
    }

    /// Deactivate every example.
    pub fn select_none(&mut self) -> bool {
        let changed = !self.active.is_empty();
        self.active.clear();
        changed
    }

    /// Reorder: the example at `from` ends up at `to`.
    pub fn move_example(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.examples, from, to) && from != to
    }

    pub fn get(&self, id: &str) -> Option<&Example> {
        self.examples.iter().find(|e| e.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Example> {
        self.examples.iter_mut().find(|e| e.id == id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    /// All examples in list order.
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Active examples in list order (not activation order).
    pub fn active_examples(&self) -> Vec<&Example> {
        self.examples
            .iter()
            .filter(|e| self.active.contains(&e.id))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    fn prune_stale(&mut self) {
        let existing: HashSet<&str> = self.examples.iter().map(|e| e.id.as_str()).collect();
        let before = self.active.len();
        self.active.retain(|id| existing.contains(id.as_str()));
        if self.active.len() != before {
            tracing::debug!("Pruned {} stale active ids", before - self.active.len());
        }
    }
}
