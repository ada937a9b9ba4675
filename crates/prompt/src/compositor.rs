//! Prompt compositor: turns examples, templates and history into the exact
//! ordered message list submitted to the model.
//!
//! Layout of a composed prompt:
//! 1. intro framing pair (only when at least one example is active)
//! 2. one user/model pair per active example, numbered 1..N in list order
//! 3. transition framing pair (only when examples were emitted)
//! 4. the conversation, turn by turn, replaying what each turn sent, with
//!    the template block folded into the pending user turn
//!
//! Without a pending user turn the template block is left out.

use crate::conversation::{ConversationLog, TurnRole};
use crate::example::ExampleSet;
use crate::template::Template;
use crate::types::{ComposedPrompt, ComposedPromptMetadata, CompositionStyle, PromptMessage, PromptRole};
use fewshot_core::{AppError, AppResult};
use handlebars::Handlebars;

const EXAMPLE_TEMPLATE: &str = "example";

/// Separator between the texts of several templates.
pub const TEMPLATE_SEPARATOR: &str = "\n\n";

/// Separator between the template block and the user's own message.
pub const FOLD_SEPARATOR: &str = "\n\n";

/// Builds message lists according to a [`CompositionStyle`].
pub struct Compositor {
    style: CompositionStyle,
    handlebars: Handlebars<'static>,
}

impl Compositor {
    /// Create a compositor, compiling the style's example label template.
    pub fn new(style: CompositionStyle) -> AppResult<Self> {
        let mut handlebars = Handlebars::new();

        // Example text is plain text, never HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars
            .register_template_string(EXAMPLE_TEMPLATE, &style.example_label)
            .map_err(|e| AppError::Prompt(format!("Invalid example label template: {}", e)))?;

        let compositor = Self { style, handlebars };
        // Unknown helpers and similar mistakes only show up at render time
        compositor
            .render_example(1, "input", "")
            .map_err(|e| AppError::Prompt(format!("Invalid example label template: {}", e)))?;

        Ok(compositor)
    }

    pub fn style(&self) -> &CompositionStyle {
        &self.style
    }

    /// Compose the message list for the current state.
    ///
    /// `templates` are the templates selected by the session's template
    /// policy, in order; pass an empty slice for none.
    pub fn compose(
        &self,
        examples: &ExampleSet,
        templates: &[&Template],
        conversation: &ConversationLog,
    ) -> AppResult<ComposedPrompt> {
        let active = examples.active_examples();
        let turns = conversation.turns();
        let mut messages = Vec::with_capacity(active.len() * 2 + turns.len() + 5);

        if !active.is_empty() {
            messages.push(PromptMessage::user(&self.style.intro_user));
            messages.push(PromptMessage::model(&self.style.intro_model));

            for (position, example) in active.iter().enumerate() {
                let index = position + 1;
                let (first_label, second_label) = example.example_type.labels();
                messages.push(PromptMessage::user(self.render_example(
                    index,
                    first_label,
                    &example.first_field,
                )?));
                messages.push(PromptMessage::model(self.render_example(
                    index,
                    second_label,
                    &example.second_field,
                )?));
            }

            messages.push(PromptMessage::user(&self.style.transition_user));
            messages.push(PromptMessage::model(&self.style.transition_model));
        }

        let block = template_block(templates);
        let fold_at = match conversation.pending_user() {
            Some(_) if !block.is_empty() => Some(turns.len() - 1),
            _ => None,
        };

        for (position, turn) in turns.iter().enumerate() {
            let role = match turn.role {
                TurnRole::User => PromptRole::User,
                TurnRole::Assistant => PromptRole::Model,
            };
            let text = if fold_at == Some(position) {
                fold(&block, &turn.content)
            } else {
                turn.replay_text().to_string()
            };
            messages.push(PromptMessage { role, text });
        }

        let metadata = ComposedPromptMetadata {
            example_count: active.len(),
            template_ids: templates
                .iter()
                .filter(|t| !t.render().is_empty())
                .map(|t| t.id.clone())
                .collect(),
            template_folded: fold_at.is_some(),
            turn_count: turns.len(),
        };

        tracing::debug!(
            "Composed {} messages ({} examples, {} turns, template: {} chars)",
            messages.len(),
            metadata.example_count,
            metadata.turn_count,
            block.len()
        );

        Ok(ComposedPrompt { messages, metadata })
    }

    fn render_example(&self, index: usize, label: &str, text: &str) -> AppResult<String> {
        let data = serde_json::json!({
            "index": index,
            "label": label.to_uppercase(),
            "text": text,
        });

        self.handlebars
            .render(EXAMPLE_TEMPLATE, &data)
            .map_err(|e| AppError::Prompt(format!("Failed to render example {}: {}", index, e)))
    }
}

/// Text contributed by `templates`: each template's fragments joined with no
/// separator, non-empty templates joined with [`TEMPLATE_SEPARATOR`].
pub fn template_block(templates: &[&Template]) -> String {
    templates
        .iter()
        .map(|t| t.render())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(TEMPLATE_SEPARATOR)
}

fn fold(block: &str, message: &str) -> String {
    if message.is_empty() {
        block.to_string()
    } else {
        format!("{}{}{}", block, FOLD_SEPARATOR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationTurn;
    use crate::example::{ExampleField, ExampleType};
    use crate::template::{FragmentKind, TemplateSet};

    fn compositor() -> Compositor {
        Compositor::new(CompositionStyle::default()).unwrap()
    }

    fn arithmetic_examples() -> (ExampleSet, String, String) {
        let mut set = ExampleSet::new();
        let a = set.add(ExampleType::InputOutput);
        set.update(&a, ExampleField::First, "2+2");
        set.update(&a, ExampleField::Second, "4");
        let b = set.add(ExampleType::InputOutput);
        set.update(&b, ExampleField::First, "3+3");
        set.update(&b, ExampleField::Second, "6");
        (set, a, b)
    }

    fn texts(prompt: &ComposedPrompt) -> Vec<&str> {
        prompt.messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_two_examples_scenario() {
        let (examples, _, _) = arithmetic_examples();
        let mut conversation = ConversationLog::new();
        conversation.push_user("5+5");
        let style = CompositionStyle::default();

        let prompt = compositor().compose(&examples, &[], &conversation).unwrap();

        assert_eq!(prompt.messages.len(), 9);
        assert_eq!(
            texts(&prompt),
            vec![
                style.intro_user.as_str(),
                style.intro_model.as_str(),
                "EXAMPLE 1 - INPUT:\n2+2",
                "EXAMPLE 1 - OUTPUT:\n4",
                "EXAMPLE 2 - INPUT:\n3+3",
                "EXAMPLE 2 - OUTPUT:\n6",
                style.transition_user.as_str(),
                style.transition_model.as_str(),
                "5+5",
            ]
        );

        let roles: Vec<PromptRole> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                PromptRole::User,
                PromptRole::Model,
                PromptRole::User,
                PromptRole::Model,
                PromptRole::User,
                PromptRole::Model,
                PromptRole::User,
                PromptRole::Model,
                PromptRole::User,
            ]
        );
        assert_eq!(prompt.metadata.example_count, 2);
    }

    #[test]
    fn test_deactivated_example_renumbers() {
        let (mut examples, a, _) = arithmetic_examples();
        examples.toggle_active(&a);
        let mut conversation = ConversationLog::new();
        conversation.push_user("5+5");

        let prompt = compositor().compose(&examples, &[], &conversation).unwrap();

        assert_eq!(prompt.messages.len(), 7);
        assert_eq!(prompt.messages[2].text, "EXAMPLE 1 - INPUT:\n3+3");
        assert_eq!(prompt.messages[3].text, "EXAMPLE 1 - OUTPUT:\n6");
        assert!(!texts(&prompt).iter().any(|t| t.starts_with("EXAMPLE 2")));
    }

    #[test]
    fn test_no_active_examples_skips_framing() {
        let (mut examples, _, _) = arithmetic_examples();
        examples.select_none();
        let mut conversation = ConversationLog::new();
        conversation.push_user("5+5");

        let prompt = compositor().compose(&examples, &[], &conversation).unwrap();
        assert_eq!(texts(&prompt), vec!["5+5"]);
        assert_eq!(prompt.metadata.example_count, 0);
    }

    #[test]
    fn test_message_count_for_n_examples() {
        let conversation = ConversationLog::new();
        for n in 0..6 {
            let mut examples = ExampleSet::new();
            // Interleave inactive examples
            for i in 0..(n * 2) {
                let id = examples.add(ExampleType::InputOutput);
                if i % 2 == 1 {
                    examples.toggle_active(&id);
                }
            }

            let prompt = compositor().compose(&examples, &[], &conversation).unwrap();
            let expected = if n == 0 { 0 } else { 4 + 2 * n };
            assert_eq!(prompt.messages.len(), expected);

            for k in 1..=n {
                let prefix = format!("EXAMPLE {} - INPUT:", k);
                assert_eq!(
                    prompt.messages.iter().filter(|m| m.text.starts_with(&prefix)).count(),
                    1
                );
            }
        }
    }

    #[test]
    fn test_name_content_labels() {
        let mut examples = ExampleSet::new();
        let id = examples.add(ExampleType::NameContent);
        examples.update(&id, ExampleField::First, "Ada <Lovelace> & co");
        examples.update(&id, ExampleField::Second, "First programmer");

        let prompt = compositor()
            .compose(&examples, &[], &ConversationLog::new())
            .unwrap();
        assert_eq!(prompt.messages[2].text, "EXAMPLE 1 - NAME:\nAda <Lovelace> & co");
        assert_eq!(prompt.messages[3].text, "EXAMPLE 1 - CONTENT:\nFirst programmer");
    }

    #[test]
    fn test_template_folds_into_last_user_turn() {
        let mut templates = TemplateSet::new();
        let tid = templates.create_template();
        let first = templates.get(&tid).unwrap().fragments[0].id.clone();
        let var = templates.add_fragment(&tid, FragmentKind::Variable).unwrap();
        templates.update_fragment(&tid, &first, "Tone: ");
        templates.update_fragment(&tid, &var, "formal");

        let mut conversation = ConversationLog::new();
        conversation.push_user("hello");
        conversation.push_assistant("hi");
        conversation.push_user("how are you?");

        let selected = templates.selected(fewshot_core::TemplatePolicy::Current);
        let prompt = compositor()
            .compose(&ExampleSet::new(), &selected, &conversation)
            .unwrap();

        assert_eq!(
            texts(&prompt),
            vec!["hello", "hi", "Tone: formal\n\nhow are you?"]
        );
        assert_eq!(prompt.messages[1].role, PromptRole::Model);
        assert!(prompt.metadata.template_folded);
        assert_eq!(prompt.metadata.template_ids, vec![tid]);
        // The log itself is untouched
        assert_eq!(conversation.turns()[2].content, "how are you?");
    }

    fn single_template(text: &str) -> TemplateSet {
        let mut templates = TemplateSet::new();
        let tid = templates.create_template();
        let first = templates.get(&tid).unwrap().fragments[0].id.clone();
        templates.update_fragment(&tid, &first, text);
        templates
    }

    #[test]
    fn test_template_without_pending_user_turn() {
        let templates = single_template("Be brief.");
        let selected = templates.selected(fewshot_core::TemplatePolicy::Current);

        let prompt = compositor()
            .compose(&ExampleSet::new(), &selected, &ConversationLog::new())
            .unwrap();
        assert!(prompt.messages.is_empty());
        assert!(!prompt.metadata.template_folded);

        // After a completed exchange there is nothing to fold into either
        let mut conversation = ConversationLog::new();
        conversation.push(ConversationTurn::user("hello").with_sent("Be brief.\n\nhello"));
        conversation.push_assistant("hi");
        let prompt = compositor()
            .compose(&ExampleSet::new(), &selected, &conversation)
            .unwrap();
        assert_eq!(texts(&prompt), vec!["Be brief.\n\nhello", "hi"]);
        assert_eq!(prompt.messages.last().map(|m| m.role), Some(PromptRole::Model));
    }

    #[test]
    fn test_earlier_turns_replay_sent_text() {
        let templates = single_template("Translate to French:");
        let selected = templates.selected(fewshot_core::TemplatePolicy::Current);

        let mut conversation = ConversationLog::new();
        conversation.push(
            ConversationTurn::user("hello").with_sent("Translate to French:\n\nhello"),
        );
        conversation.push_assistant("bonjour");
        conversation.push_user("goodbye");

        let prompt = compositor()
            .compose(&ExampleSet::new(), &selected, &conversation)
            .unwrap();
        assert_eq!(
            texts(&prompt),
            vec![
                "Translate to French:\n\nhello",
                "bonjour",
                "Translate to French:\n\ngoodbye",
            ]
        );
        assert!(prompt.metadata.template_folded);
    }

    #[test]
    fn test_empty_template_is_ignored() {
        let mut templates = TemplateSet::new();
        templates.create_template();
        let selected = templates.selected(fewshot_core::TemplatePolicy::All);
        let mut conversation = ConversationLog::new();
        conversation.push_user("q");

        let prompt = compositor()
            .compose(&ExampleSet::new(), &selected, &conversation)
            .unwrap();
        assert_eq!(texts(&prompt), vec!["q"]);
        assert!(prompt.metadata.template_ids.is_empty());
    }

    #[test]
    fn test_template_block_joins_templates() {
        let mut templates = TemplateSet::new();
        for text in ["A", "", "B"] {
            let tid = templates.create_template();
            let fid = templates.get(&tid).unwrap().fragments[0].id.clone();
            templates.update_fragment(&tid, &fid, text);
        }

        let all = templates.selected(fewshot_core::TemplatePolicy::All);
        assert_eq!(template_block(&all), "A\n\nB");
        let current = templates.selected(fewshot_core::TemplatePolicy::Current);
        assert_eq!(template_block(&current), "A");
    }

    #[test]
    fn test_custom_label_template() {
        let style = CompositionStyle {
            example_label: "[{{index}}] {{label}} => {{text}}".to_string(),
            ..CompositionStyle::default()
        };
        let (examples, _, _) = arithmetic_examples();
        let prompt = Compositor::new(style)
            .unwrap()
            .compose(&examples, &[], &ConversationLog::new())
            .unwrap();
        assert_eq!(prompt.messages[4].text, "[2] INPUT => 3+3");
    }

    #[test]
    fn test_invalid_label_template() {
        let style = CompositionStyle {
            example_label: "{{#if index}}unclosed".to_string(),
            ..CompositionStyle::default()
        };
        assert!(matches!(Compositor::new(style), Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_label_with_unknown_helper_is_rejected() {
        let style = CompositionStyle {
            example_label: "EXAMPLE {{index}} - {{upper label}}:\n{{text}}".to_string(),
            ..CompositionStyle::default()
        };
        assert!(matches!(Compositor::new(style), Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let (examples, _, _) = arithmetic_examples();
        let mut conversation = ConversationLog::new();
        conversation.push_user("5+5");
        let compositor = compositor();

        let first = compositor.compose(&examples, &[], &conversation).unwrap();
        let second = compositor.compose(&examples, &[], &conversation).unwrap();
        assert_eq!(first, second);
    }
}
