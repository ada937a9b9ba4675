//! Reusable prompt templates made of ordered fragments.

use fewshot_core::{move_item, new_id, TemplatePolicy};
use serde::{Deserialize, Serialize};

/// What a fragment holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
    /// A user-fillable slot
    Variable,
    /// Literal text
    #[default]
    StaticText,
}

impl FragmentKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "variable" | "var" => Some(Self::Variable),
            "static-text" | "static" | "text" => Some(Self::StaticText),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::StaticText => "static-text",
        }
    }
}

/// An atomic piece of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFragment {
    pub id: String,
    pub kind: FragmentKind,
    pub content: String,
}

impl TemplateFragment {
    pub fn new(kind: FragmentKind) -> Self {
        Self {
            id: new_id(),
            kind,
            content: String::new(),
        }
    }
}

/// An ordered list of fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub fragments: Vec<TemplateFragment>,
}

impl Template {
    /// A new template holding one empty static-text fragment.
    pub fn new() -> Self {
        Self {
            id: new_id(),
            fragments: vec![TemplateFragment::new(FragmentKind::StaticText)],
        }
    }

    /// Plain concatenation of every fragment's content, in order.
    ///
    /// Static text and variable values contribute verbatim; fragment
    /// boundaries leave no mark.
    pub fn render(&self) -> String {
        self.fragments.iter().map(|f| f.content.as_str()).collect()
    }

    fn fragment_mut(&mut self, fragment_id: &str) -> Option<&mut TemplateFragment> {
        self.fragments.iter_mut().find(|f| f.id == fragment_id)
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable shape of a [`TemplateSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub templates: Vec<Template>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_id: Option<String>,
}

/// All templates plus which one is current.
///
/// The current id, when set, always names a template in the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateSet {
    templates: Vec<Template>,
    current: Option<String>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from its durable record.
    pub fn from_record(record: TemplateRecord) -> Self {
        let mut set = Self {
            templates: record.templates,
            current: record.current_id,
        };
        set.repair_current();
        set
    }

    pub fn to_record(&self) -> TemplateRecord {
        TemplateRecord {
            templates: self.templates.clone(),
            current_id: self.current.clone(),
        }
    }

    /// Create a template with one empty static fragment and return its id.
    ///
    /// The first template created becomes current.
    pub fn create_template(&mut self) -> String {
        let template = Template::new();
        let id = template.id.clone();
        self.templates.push(template);
        if self.current.is_none() {
            self.current = Some(id.clone());
        }
        tracing::debug!("Created template {}", id);
        id
    }

    /// Delete a template. If it was current, the first remaining one takes over.
    pub fn remove_template(&mut self, template_id: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != template_id);
        let removed = self.templates.len() != before;
        self.repair_current();
        removed
    }

    /// Make `template_id` the current template.
    pub fn set_current(&mut self, template_id: &str) -> bool {
        if self.get(template_id).is_none() || self.current.as_deref() == Some(template_id) {
            return false;
        }
        self.current = Some(template_id.to_string());
        true
    }

    /// Append an empty fragment and return its id.
    pub fn add_fragment(&mut self, template_id: &str, kind: FragmentKind) -> Option<String> {
        let template = self.get_mut(template_id)?;
        let fragment = TemplateFragment::new(kind);
        let id = fragment.id.clone();
        template.fragments.push(fragment);
        Some(id)
    }

    pub fn remove_fragment(&mut self, template_id: &str, fragment_id: &str) -> bool {
        let Some(template) = self.get_mut(template_id) else {
            return false;
        };
        let before = template.fragments.len();
        template.fragments.retain(|f| f.id != fragment_id);
        template.fragments.len() != before
    }

    pub fn update_fragment(
        &mut self,
        template_id: &str,
        fragment_id: &str,
        content: impl Into<String>,
    ) -> bool {
        match self
            .get_mut(template_id)
            .and_then(|t| t.fragment_mut(fragment_id))
        {
            Some(fragment) => {
                fragment.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Reorder fragments: the one at `from` ends up at `to`.
    pub fn move_fragment(&mut self, template_id: &str, from: usize, to: usize) -> bool {
        match self.get_mut(template_id) {
            Some(template) => move_item(&mut template.fragments, from, to) && from != to,
            None => false,
        }
    }

    pub fn get(&self, template_id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    fn get_mut(&mut self, template_id: &str) -> Option<&mut Template> {
        self.templates.iter_mut().find(|t| t.id == template_id)
    }

    pub fn current(&self) -> Option<&Template> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Templates that feed composition under `policy`.
    pub fn selected(&self, policy: TemplatePolicy) -> Vec<&Template> {
        match policy {
            TemplatePolicy::Current => self.current().into_iter().collect(),
            TemplatePolicy::All => self.templates.iter().collect(),
        }
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn repair_current(&mut self) {
        let valid = self
            .current
            .as_deref()
            .map(|id| self.templates.iter().any(|t| t.id == id))
            .unwrap_or(false);

        if !valid {
            self.current = self.templates.first().map(|t| t.id.clone());
        }
    }
}
