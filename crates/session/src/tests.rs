use crate::persist::{CONVERSATION_KEY, EXAMPLES_KEY, TEMPLATES_KEY};
use crate::{
    SendOutcome, SendState, Session, SessionOptions, DRAFT_PLACEHOLDER, GENERIC_ERROR_REPLY,
};
use fewshot_core::{AppError, AppResult, FileStore, KeyValueStore, MemoryStore, TemplatePolicy};
use fewshot_llm::{ChatRole, ScriptedClient, ScriptedReply};
use fewshot_prompt::{
    CompositionStyle, Compositor, ExampleField, ExampleType, FragmentKind, PromptRole, TurnRole,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Memory store that records which keys were written.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<String>>,
}

impl CountingStore {
    fn writes_to(&self, key: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.as_str() == key)
            .count()
    }
}

impl KeyValueStore for CountingStore {
    fn name(&self) -> &str {
        "counting"
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> AppResult<()> {
        self.writes.lock().unwrap().push(key.to_string());
        self.inner.put(key, value)
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        self.inner.keys()
    }
}

fn compositor() -> Compositor {
    Compositor::new(CompositionStyle::default()).unwrap()
}

fn open_with(
    store: Arc<dyn KeyValueStore>,
    client: Arc<ScriptedClient>,
    options: SessionOptions,
) -> Session {
    Session::open(store, client, compositor(), options)
}

fn options() -> SessionOptions {
    SessionOptions::new("test-model")
}

/// Create a template whose single fragment holds `text`.
fn template_with_text(session: &Session, text: &str) -> String {
    let template_id = session.create_template();
    let fragment_id = session
        .templates()
        .get(&template_id)
        .unwrap()
        .fragments[0]
        .id
        .clone();
    assert!(session.update_fragment(&template_id, &fragment_id, text));
    template_id
}

#[test]
fn test_example_edits_write_immediately() {
    let store = Arc::new(CountingStore::default());
    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());

    let id = session.add_example(ExampleType::InputOutput);
    assert_eq!(store.writes_to(EXAMPLES_KEY), 1);

    session.update_example(&id, ExampleField::First, "2+2");
    session.toggle_example(&id);
    assert_eq!(store.writes_to(EXAMPLES_KEY), 3);

    let stored: serde_json::Value =
        serde_json::from_str(&store.get(EXAMPLES_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["examples"][0]["firstField"], "2+2");
    assert_eq!(stored["activeIds"].as_array().unwrap().len(), 0);
}

#[test]
fn test_noop_operations_do_not_write() {
    let store = Arc::new(CountingStore::default());
    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());

    assert!(!session.remove_example("missing"));
    assert!(!session.toggle_example("missing"));
    assert!(!session.update_example("missing", ExampleField::Second, "x"));
    assert!(!session.move_example(0, 3));
    assert!(!session.select_all_examples());
    assert!(!session.remove_template("missing"));
    assert!(session.add_fragment("missing", FragmentKind::Variable).is_none());

    assert_eq!(store.writes_to(EXAMPLES_KEY), 0);
    assert_eq!(store.writes_to(TEMPLATES_KEY), 0);
}

#[tokio::test(start_paused = true)]
async fn test_template_edits_are_debounced() {
    let store = Arc::new(CountingStore::default());
    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());

    let template_id = template_with_text(&session, "Answer in French.");
    session.add_fragment(&template_id, FragmentKind::Variable);
    assert_eq!(store.writes_to(TEMPLATES_KEY), 0);

    // The in-memory state is never delayed
    assert_eq!(session.templates().get(&template_id).unwrap().fragments.len(), 2);

    tokio::time::sleep(Duration::from_millis(900)).await;
    tokio::task::yield_now().await;
    assert_eq!(store.writes_to(TEMPLATES_KEY), 1);

    let stored: serde_json::Value =
        serde_json::from_str(&store.get(TEMPLATES_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["currentId"], template_id.as_str());
    assert_eq!(stored["templates"][0]["fragments"].as_array().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_template_debounce_resets_on_each_edit() {
    let store = Arc::new(CountingStore::default());
    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());

    let template_id = session.create_template();
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.add_fragment(&template_id, FragmentKind::StaticText);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.writes_to(TEMPLATES_KEY), 0);

    tokio::time::sleep(Duration::from_millis(400)).await;
    tokio::task::yield_now().await;
    assert_eq!(store.writes_to(TEMPLATES_KEY), 1);
}

#[tokio::test(start_paused = true)]
async fn test_flush_writes_pending_templates() {
    let store = Arc::new(CountingStore::default());
    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());

    session.create_template();
    session.flush();
    assert_eq!(store.writes_to(TEMPLATES_KEY), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(store.writes_to(TEMPLATES_KEY), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reopen_restores_collections() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));

    let (examples, templates) = {
        let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());
        let a = session.add_example(ExampleType::InputOutput);
        let b = session.add_example(ExampleType::NameContent);
        session.update_example(&b, ExampleField::Second, "Mathematician");
        session.move_example(1, 0);
        session.toggle_example(&a);
        template_with_text(&session, "Be terse.");
        session.send("hello").await.unwrap();
        session.flush();
        (session.examples().to_record(), session.templates().to_record())
    };

    let reopened = open_with(store, Arc::new(ScriptedClient::new()), options());
    assert_eq!(reopened.examples().to_record(), examples);
    assert_eq!(reopened.templates().to_record(), templates);
    assert!(reopened.conversation().is_empty());
}

#[tokio::test]
async fn test_conversation_persisted_when_enabled() {
    let store = Arc::new(CountingStore::default());
    let mut opts = options();
    opts.persist_conversation = true;

    {
        let session = open_with(
            store.clone(),
            Arc::new(ScriptedClient::with_replies(["Bonjour"])),
            opts.clone(),
        );
        session.send("Hello").await.unwrap();
        // One write for the user turn, one for the reply
        assert_eq!(store.writes_to(CONVERSATION_KEY), 2);
    }

    let reopened = open_with(store, Arc::new(ScriptedClient::new()), opts);
    let conversation = reopened.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[1].content, "Bonjour");

    reopened.clear_conversation();
    assert!(reopened.conversation().is_empty());
}

#[test]
fn test_corrupt_records_start_empty_and_are_kept() {
    let store = Arc::new(MemoryStore::new());
    store.put(EXAMPLES_KEY, "not json at all").unwrap();
    store.put(TEMPLATES_KEY, r#"{"unexpected": true}"#).unwrap();

    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());
    assert!(session.examples().is_empty());
    assert!(session.templates().is_empty());
    assert_eq!(
        store.get(EXAMPLES_KEY).unwrap().as_deref(),
        Some("not json at all")
    );
}

#[test]
fn test_quota_exceeded_keeps_memory_state() {
    let store = Arc::new(MemoryStore::with_quota(16));
    let session = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());

    let id = session.add_example(ExampleType::InputOutput);
    assert!(session.update_example(&id, ExampleField::First, "a long enough value"));

    assert_eq!(session.examples().len(), 1);
    assert_eq!(session.examples().get(&id).unwrap().first_field, "a long enough value");
    assert!(store.get(EXAMPLES_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_send_submits_composed_prompt() {
    let client = Arc::new(ScriptedClient::with_replies(["6"]));
    let session = open_with(Arc::new(MemoryStore::new()), client.clone(), options());

    let id = session.add_example(ExampleType::InputOutput);
    session.update_example(&id, ExampleField::First, "2+2");
    session.update_example(&id, ExampleField::Second, "4");
    template_with_text(&session, "Reply with a number only.");

    let preview = session.compose_preview(Some("What is 3+3?")).unwrap();
    let outcome = session.send("What is 3+3?").await.unwrap();
    assert_eq!(outcome, SendOutcome::Replied(fewshot_prompt::ConversationTurn::assistant("6")));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.model, "test-model");
    assert_eq!(request.response_mime_type, "text/plain");

    // intro pair, one example pair, transition pair, user turn
    assert_eq!(request.messages.len(), 7);
    assert_eq!(request.messages.len(), preview.messages.len());
    for (sent, previewed) in request.messages.iter().zip(&preview.messages) {
        let role = match previewed.role {
            PromptRole::User => ChatRole::User,
            PromptRole::Model => ChatRole::Model,
        };
        assert_eq!(sent.role, role);
        assert_eq!(sent.text(), previewed.text);
    }
    assert_eq!(
        request.messages[6].text(),
        "Reply with a number only.\n\nWhat is 3+3?"
    );

    // The log keeps the literal user text beside what was sent
    let conversation = session.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[0].content, "What is 3+3?");
    assert_eq!(
        conversation.turns()[0].sent.as_deref(),
        Some("Reply with a number only.\n\nWhat is 3+3?")
    );
    assert_eq!(conversation.turns()[1].role, TurnRole::Assistant);
    assert_eq!(session.send_state(), SendState::Idle);
}

#[tokio::test]
async fn test_later_sends_replay_template_prefix() {
    let client = Arc::new(ScriptedClient::with_replies(["bonjour", "au revoir"]));
    let mut opts = options();
    opts.persist_conversation = true;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let session = open_with(store.clone(), client.clone(), opts.clone());
    template_with_text(&session, "Translate to French:");

    session.send("hello").await.unwrap();
    session.send("goodbye").await.unwrap();

    let requests = client.requests();
    let history: Vec<String> = requests[1].messages.iter().map(|m| m.text()).collect();
    assert_eq!(
        history,
        vec![
            "Translate to French:\n\nhello",
            "bonjour",
            "Translate to French:\n\ngoodbye",
        ]
    );

    // The submitted text survives a reload
    drop(session);
    let reopened = open_with(store, Arc::new(ScriptedClient::new()), opts);
    let conversation = reopened.conversation();
    assert_eq!(conversation.turns()[0].content, "hello");
    assert_eq!(
        conversation.turns()[0].replay_text(),
        "Translate to French:\n\nhello"
    );
}

#[tokio::test]
async fn test_compose_failure_records_nothing() {
    // Renders fine for an empty example text, fails once there is text
    let style = CompositionStyle {
        example_label: "{{#if text}}{{shout text}}{{/if}}{{text}}".to_string(),
        ..CompositionStyle::default()
    };
    let store = Arc::new(CountingStore::default());
    let client = Arc::new(ScriptedClient::with_replies(["unused"]));
    let mut opts = options();
    opts.persist_conversation = true;
    let session = Session::open(
        store.clone(),
        client.clone(),
        Compositor::new(style).unwrap(),
        opts,
    );

    let id = session.add_example(ExampleType::InputOutput);
    session.update_example(&id, ExampleField::First, "2+2");

    let result = session.send("hello").await;
    assert!(matches!(result, Err(AppError::Prompt(_))));
    assert!(session.conversation().is_empty());
    assert_eq!(store.writes_to(CONVERSATION_KEY), 0);
    assert!(client.requests().is_empty());
    assert_eq!(session.send_state(), SendState::Idle);
}

#[tokio::test]
async fn test_preview_after_exchange_shows_placeholder_draft() {
    let client = Arc::new(ScriptedClient::with_replies(["bonjour"]));
    let session = open_with(Arc::new(MemoryStore::new()), client, options());
    template_with_text(&session, "Translate to French:");
    session.send("hello").await.unwrap();

    let preview = session.compose_preview(None).unwrap();
    let texts: Vec<&str> = preview.messages.iter().map(|m| m.text.as_str()).collect();
    let placeholder = format!("Translate to French:\n\n{}", DRAFT_PLACEHOLDER);
    assert_eq!(
        texts,
        vec!["Translate to French:\n\nhello", "bonjour", placeholder.as_str()]
    );
    assert!(preview.metadata.template_folded);
    // Previews record nothing
    assert_eq!(session.conversation().len(), 2);

    // Without a template there is nothing to preview beyond the history
    let plain = open_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedClient::new()),
        options(),
    );
    assert!(plain.compose_preview(None).unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_send_failure_records_generic_turn() {
    let client = Arc::new(ScriptedClient::new());
    client.push(ScriptedReply::Failure("connection reset".to_string()));
    let session = open_with(Arc::new(MemoryStore::new()), client.clone(), options());

    let outcome = session.send("Hello?").await.unwrap();
    assert!(!outcome.is_success());
    match &outcome {
        SendOutcome::Failed { turn, reason } => {
            assert_eq!(turn.content, GENERIC_ERROR_REPLY);
            assert!(reason.contains("connection reset"));
        }
        other => panic!("Expected failure, got {:?}", other),
    }

    let conversation = session.conversation();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[0].role, TurnRole::User);
    assert_eq!(conversation.turns()[0].content, "Hello?");

    // Resending works and keeps the failed exchange in the history
    client.push(ScriptedReply::Text("Hi!".to_string()));
    let retry = session.send("Hello?").await.unwrap();
    assert!(retry.is_success());
    assert_eq!(session.conversation().len(), 4);
    assert_eq!(client.requests()[1].messages.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_send_is_rejected() {
    let client = Arc::new(
        ScriptedClient::with_replies(["first"]).with_delay(Duration::from_secs(1)),
    );
    let session = open_with(Arc::new(MemoryStore::new()), client, options());

    let (a, b) = tokio::join!(session.send("one"), session.send("two"));
    let results = [a, b];
    let replied = results.iter().filter(|r| r.is_ok()).count();
    let busy = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::Busy)))
        .count();
    assert_eq!(replied, 1);
    assert_eq!(busy, 1);

    assert_eq!(session.conversation().len(), 2);
    assert_eq!(session.send_state(), SendState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_send_returns_to_idle() {
    let client = Arc::new(ScriptedClient::new().with_delay(Duration::from_secs(5)));
    let session = open_with(Arc::new(MemoryStore::new()), client.clone(), options());

    let result = tokio::time::timeout(Duration::from_millis(10), session.send("slow")).await;
    assert!(result.is_err());
    assert_eq!(session.send_state(), SendState::Idle);

    // The user turn stays; no reply was recorded
    let conversation = session.conversation();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.turns()[0].content, "slow");

    client.push(ScriptedReply::Text("done".to_string()));
    let outcome = session.send("again").await.unwrap();
    assert_eq!(outcome.turn().content, "done");
}

#[tokio::test]
async fn test_empty_send_is_rejected() {
    let session = open_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedClient::new()),
        options(),
    );

    let result = session.send("   ").await;
    assert!(matches!(result, Err(AppError::Prompt(_))));
    assert!(session.conversation().is_empty());
    assert_eq!(session.send_state(), SendState::Idle);
}

#[tokio::test]
async fn test_template_only_send() {
    let client = Arc::new(ScriptedClient::with_replies(["ok"]));
    let session = open_with(Arc::new(MemoryStore::new()), client.clone(), options());
    template_with_text(&session, "Summarize the plot of Hamlet.");

    session.send("").await.unwrap();

    let request = &client.requests()[0];
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].text(), "Summarize the plot of Hamlet.");
    let conversation = session.conversation();
    let turn = &conversation.turns()[0];
    assert_eq!(turn.content, "");
    assert_eq!(turn.replay_text(), "Summarize the plot of Hamlet.");
}

#[test]
fn test_template_policy_selects_templates() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let current_only = open_with(store.clone(), Arc::new(ScriptedClient::new()), options());
    template_with_text(&current_only, "First.");
    let second = template_with_text(&current_only, "Second.");
    current_only.set_current_template(&second);

    let preview = current_only.compose_preview(Some("Go")).unwrap();
    assert_eq!(preview.messages.last().unwrap().text, "Second.\n\nGo");

    // Outside a runtime template writes are not delayed, so a second
    // session sees both templates
    let mut opts = options();
    opts.template_policy = TemplatePolicy::All;
    let all = open_with(store, Arc::new(ScriptedClient::new()), opts);
    assert_eq!(all.templates().len(), 2);

    let preview = all.compose_preview(Some("Go")).unwrap();
    assert_eq!(preview.messages.last().unwrap().text, "First.\n\nSecond.\n\nGo");
}
