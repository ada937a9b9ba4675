//! Session controller.
//!
//! Owns the three collections and routes every mutation through one place so
//! that persistence always follows the in-memory change. Example edits are
//! written immediately, template edits through a debouncer, and conversation
//! turns per turn when enabled.

use crate::debounce::Debouncer;
use crate::persist;
use fewshot_core::{AppConfig, AppError, AppResult, KeyValueStore, TemplatePolicy};
use fewshot_llm::{ChatMessage, LlmClient, LlmRequest};
use fewshot_prompt::{
    template_block, ComposedPrompt, Compositor, ConversationLog, ConversationTurn, ExampleField,
    ExampleSet, ExampleType, FragmentKind, PromptMessage, PromptRole, TemplateSet,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Assistant turn recorded when the model call fails.
pub const GENERIC_ERROR_REPLY: &str =
    "Sorry, something went wrong while contacting the model. Please try sending your message again.";

/// Stand-in for the next user message in previews.
pub const DRAFT_PLACEHOLDER: &str = "<your next message>";

/// Session behavior.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Model identifier passed with every request
    pub model: String,

    pub template_policy: TemplatePolicy,

    /// Load and write the conversation log
    pub persist_conversation: bool,

    /// Quiet period before template edits are written
    pub template_debounce: Duration,

    pub temperature: Option<f32>,

    pub max_tokens: Option<u32>,
}

impl SessionOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            template_policy: TemplatePolicy::default(),
            persist_conversation: false,
            template_debounce: Duration::from_millis(800),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            template_policy: config.session.template_policy,
            persist_conversation: config.session.persist_conversation,
            template_debounce: Duration::from_millis(config.session.template_debounce_ms),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Whether a send is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending,
}

/// How a completed send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The model replied; `turn` is the appended assistant turn
    Replied(ConversationTurn),
    /// The model call failed; `turn` is the generic error turn
    Failed {
        turn: ConversationTurn,
        reason: String,
    },
}

impl SendOutcome {
    /// The assistant turn appended by this send.
    pub fn turn(&self) -> &ConversationTurn {
        match self {
            SendOutcome::Replied(turn) => turn,
            SendOutcome::Failed { turn, .. } => turn,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Replied(_))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    examples: ExampleSet,
    templates: TemplateSet,
    conversation: ConversationLog,
}

type SharedState = Arc<Mutex<SessionState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag when the send finishes or is dropped.
struct SendGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SendGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> AppResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// A few-shot chat session over a durable store and a model client.
pub struct Session {
    state: SharedState,
    store: Arc<dyn KeyValueStore>,
    client: Arc<dyn LlmClient>,
    compositor: Compositor,
    options: SessionOptions,
    template_writer: Debouncer,
    sending: AtomicBool,
}

impl Session {
    /// Load the durable collections from `store` and start a session.
    pub fn open(
        store: Arc<dyn KeyValueStore>,
        client: Arc<dyn LlmClient>,
        compositor: Compositor,
        options: SessionOptions,
    ) -> Self {
        let examples = persist::load_examples(store.as_ref());
        let templates = persist::load_templates(store.as_ref());
        let conversation = if options.persist_conversation {
            persist::load_conversation(store.as_ref())
        } else {
            ConversationLog::new()
        };

        tracing::info!(
            "Opened session on '{}' store: {} examples ({} active), {} templates, {} turns",
            store.name(),
            examples.len(),
            examples.active_count(),
            templates.len(),
            conversation.len()
        );

        Self {
            state: Arc::new(Mutex::new(SessionState {
                examples,
                templates,
                conversation,
            })),
            store,
            client,
            compositor,
            template_writer: Debouncer::new(options.template_debounce),
            options,
            sending: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    pub fn examples(&self) -> ExampleSet {
        lock(&self.state).examples.clone()
    }

    pub fn templates(&self) -> TemplateSet {
        lock(&self.state).templates.clone()
    }

    pub fn conversation(&self) -> ConversationLog {
        lock(&self.state).conversation.clone()
    }

    pub fn send_state(&self) -> SendState {
        if self.sending.load(Ordering::Acquire) {
            SendState::Sending
        } else {
            SendState::Idle
        }
    }

    // Examples

    pub fn add_example(&self, example_type: ExampleType) -> String {
        self.edit_examples(|examples| {
            let id = examples.add(example_type);
            (true, id)
        })
    }

    pub fn remove_example(&self, id: &str) -> bool {
        self.edit_examples(|examples| {
            let changed = examples.remove(id);
            (changed, changed)
        })
    }

    pub fn update_example(&self, id: &str, field: ExampleField, value: impl Into<String>) -> bool {
        let value = value.into();
        self.edit_examples(|examples| {
            let changed = examples.update(id, field, value);
            (changed, changed)
        })
    }

    pub fn change_example_type(&self, id: &str, example_type: ExampleType) -> bool {
        self.edit_examples(|examples| {
            let changed = examples.change_type(id, example_type);
            (changed, changed)
        })
    }

    pub fn toggle_example(&self, id: &str) -> bool {
        self.edit_examples(|examples| {
            let changed = examples.toggle_active(id);
            (changed, changed)
        })
    }

    pub fn select_all_examples(&self) -> bool {
        self.edit_examples(|examples| {
            let changed = examples.select_all();
            (changed, changed)
        })
    }

    pub fn select_no_examples(&self) -> bool {
        self.edit_examples(|examples| {
            let changed = examples.select_none();
            (changed, changed)
        })
    }

    pub fn move_example(&self, from: usize, to: usize) -> bool {
        self.edit_examples(|examples| {
            let changed = examples.move_example(from, to);
            (changed, changed)
        })
    }

    // Templates

    pub fn create_template(&self) -> String {
        self.edit_templates(|templates| {
            let id = templates.create_template();
            (true, id)
        })
    }

    pub fn remove_template(&self, template_id: &str) -> bool {
        self.edit_templates(|templates| {
            let changed = templates.remove_template(template_id);
            (changed, changed)
        })
    }

    pub fn set_current_template(&self, template_id: &str) -> bool {
        self.edit_templates(|templates| {
            let changed = templates.set_current(template_id);
            (changed, changed)
        })
    }

    pub fn add_fragment(&self, template_id: &str, kind: FragmentKind) -> Option<String> {
        self.edit_templates(|templates| {
            let id = templates.add_fragment(template_id, kind);
            (id.is_some(), id)
        })
    }

    pub fn remove_fragment(&self, template_id: &str, fragment_id: &str) -> bool {
        self.edit_templates(|templates| {
            let changed = templates.remove_fragment(template_id, fragment_id);
            (changed, changed)
        })
    }

    pub fn update_fragment(
        &self,
        template_id: &str,
        fragment_id: &str,
        content: impl Into<String>,
    ) -> bool {
        let content = content.into();
        self.edit_templates(|templates| {
            let changed = templates.update_fragment(template_id, fragment_id, content);
            (changed, changed)
        })
    }

    pub fn move_fragment(&self, template_id: &str, from: usize, to: usize) -> bool {
        self.edit_templates(|templates| {
            let changed = templates.move_fragment(template_id, from, to);
            (changed, changed)
        })
    }

    // Conversation

    pub fn clear_conversation(&self) {
        let mut state = lock(&self.state);
        if state.conversation.is_empty() {
            return;
        }
        state.conversation.clear();
        self.conversation_changed(&state.conversation);
        tracing::debug!("Conversation cleared");
    }

    /// The message list a send of `draft` would submit right now.
    ///
    /// Nothing is recorded. Without a draft, and with nothing pending in the
    /// log, the template block is shown folded into [`DRAFT_PLACEHOLDER`] so
    /// the preview has the shape of a real send.
    pub fn compose_preview(&self, draft: Option<&str>) -> AppResult<ComposedPrompt> {
        let state = lock(&self.state);
        let selected = state.templates.selected(self.options.template_policy);

        let draft = match draft.filter(|d| !d.trim().is_empty()) {
            Some(draft) => Some(draft),
            None if state.conversation.pending_user().is_none()
                && !template_block(&selected).is_empty() =>
            {
                Some(DRAFT_PLACEHOLDER)
            }
            None => None,
        };

        match draft {
            Some(draft) => {
                let mut conversation = state.conversation.clone();
                conversation.push_user(draft);
                self.compositor
                    .compose(&state.examples, &selected, &conversation)
            }
            None => self
                .compositor
                .compose(&state.examples, &selected, &state.conversation),
        }
    }

    /// Send `text` as the next user turn and record the model's answer.
    ///
    /// Returns `AppError::Busy` if another send is in flight. The prompt is
    /// composed before anything is recorded, so a composition error leaves
    /// the log untouched. Once composed, the user turn is recorded together
    /// with the text it was sent as. Transport failures do not surface as
    /// errors: they become a generic assistant turn and a
    /// `SendOutcome::Failed`. The user turn is never rolled back.
    pub async fn send(&self, text: impl Into<String>) -> AppResult<SendOutcome> {
        let _guard = SendGuard::acquire(&self.sending)?;
        let text = text.into();

        let request = {
            let mut state = lock(&self.state);

            let selected = state.templates.selected(self.options.template_policy);
            if text.trim().is_empty() && template_block(&selected).is_empty() {
                return Err(AppError::Prompt(
                    "Nothing to send: the message and the template are both empty".to_string(),
                ));
            }

            let mut draft = state.conversation.clone();
            draft.push_user(text.as_str());
            let composed = self.compositor.compose(&state.examples, &selected, &draft)?;

            let mut turn = ConversationTurn::user(text);
            if composed.metadata.template_folded {
                if let Some(last) = composed.messages.last() {
                    turn = turn.with_sent(last.text.as_str());
                }
            }
            state.conversation.push(turn);
            self.conversation_changed(&state.conversation);

            tracing::debug!(
                "Composed {} messages ({} examples, {} turns, templates folded: {})",
                composed.messages.len(),
                composed.metadata.example_count,
                composed.metadata.turn_count,
                composed.metadata.template_folded
            );
            self.build_request(&composed)
        };

        let outcome = match self.client.complete(&request).await {
            Ok(response) => {
                tracing::info!(
                    "Model '{}' replied ({} tokens)",
                    response.model,
                    response.usage.total_tokens
                );
                SendOutcome::Replied(ConversationTurn::assistant(response.content))
            }
            Err(e) => {
                tracing::warn!("Model call via '{}' failed: {}", self.client.provider_name(), e);
                SendOutcome::Failed {
                    turn: ConversationTurn::assistant(GENERIC_ERROR_REPLY),
                    reason: e.to_string(),
                }
            }
        };

        let mut state = lock(&self.state);
        state.conversation.push(outcome.turn().clone());
        self.conversation_changed(&state.conversation);

        Ok(outcome)
    }

    /// Write any pending template edits now.
    pub fn flush(&self) {
        if self.template_writer.flush() {
            tracing::debug!("Flushed pending template write");
        }
    }

    fn build_request(&self, composed: &ComposedPrompt) -> LlmRequest {
        let messages = composed.messages.iter().map(to_chat_message).collect();
        let mut request = LlmRequest::new(&self.options.model, messages);
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    fn edit_examples<R>(&self, edit: impl FnOnce(&mut ExampleSet) -> (bool, R)) -> R {
        let mut state = lock(&self.state);
        let (changed, result) = edit(&mut state.examples);
        if changed {
            persist::save_examples(self.store.as_ref(), &state.examples);
        }
        result
    }

    fn edit_templates<R>(&self, edit: impl FnOnce(&mut TemplateSet) -> (bool, R)) -> R {
        let (changed, result) = {
            let mut state = lock(&self.state);
            edit(&mut state.templates)
        };
        // Scheduled outside the lock: the write may run inline.
        if changed {
            let state = Arc::clone(&self.state);
            let store = Arc::clone(&self.store);
            self.template_writer.schedule(move || {
                let guard = lock(&state);
                persist::save_templates(store.as_ref(), &guard.templates);
            });
        }
        result
    }

    fn conversation_changed(&self, conversation: &ConversationLog) {
        if self.options.persist_conversation {
            persist::save_conversation(self.store.as_ref(), conversation);
        }
    }
}

fn to_chat_message(message: &PromptMessage) -> ChatMessage {
    match message.role {
        PromptRole::User => ChatMessage::user(&message.text),
        PromptRole::Model => ChatMessage::model(&message.text),
    }
}
