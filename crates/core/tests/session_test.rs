// Integration tests for ChatSession and SessionRegistry
//
// These tests run turns end to end with in-memory agents, including an agent
// that adapts a callback-style SDK through the event channel.
//
// Run with: cargo test -p agentchat-core --test session_test

use std::sync::Arc;
use std::time::Duration;

use agentchat_core::{
    event_channel, AgentInvoker, ChatError, ChatSession, CompositeTranscriptListener, EventStream,
    InMemoryToolLog, MessageStatus, RecordingListener, ScriptedAgent, SessionRegistry, StreamEvent,
    ToolCallLogListener, UserInput,
};
use async_trait::async_trait;
use serde_json::json;

/// Agent whose "SDK" reports progress through a synchronous callback
struct CallbackAgent;

impl CallbackAgent {
    /// Stand-in for a vendor SDK run loop invoking a handler per message
    fn run_sdk(on_message: impl Fn(StreamEvent)) {
        on_message(StreamEvent::text_delta("run1", "Checking"));
        on_message(StreamEvent::anonymous_tool_start(
            "file_search",
            Some(json!({"query": "pricing"})),
        ));
        on_message(StreamEvent::anonymous_tool_result("file_search", None));
        on_message(StreamEvent::text_delta("run1", "Plans start at $10【4:0†pricing.md】"));
        on_message(StreamEvent::annotation("run1", "pricing.md", "https://docs/pricing"));
    }
}

#[async_trait]
impl AgentInvoker for CallbackAgent {
    async fn invoke(&self, _thread_id: &str, _input: &UserInput) -> agentchat_core::Result<EventStream> {
        let (tx, rx) = event_channel(16);
        tokio::task::spawn_blocking(move || {
            CallbackAgent::run_sdk(|event| {
                let _ = tx.try_send(event);
            });
        });
        Ok(rx.into_stream())
    }

    async fn create_thread(&self) -> agentchat_core::Result<String> {
        Ok("thread_callback".to_string())
    }

    fn name(&self) -> &str {
        "callback"
    }
}

#[tokio::test]
async fn test_callback_sdk_through_event_channel() {
    let mut session = ChatSession::open(Arc::new(CallbackAgent)).await.unwrap();
    session
        .send(UserInput::new("How much does it cost?"))
        .await
        .unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[1].text(), Some("Checking"));
    assert_eq!(messages[2].text(), Some("searching docs..."));
    assert_eq!(messages[2].status, MessageStatus::Done);
    assert_eq!(
        messages[3].text(),
        Some("Plans start at $10【[pricing.md](https://docs/pricing)】")
    );
}

#[tokio::test]
async fn test_tool_log_and_renderer_listeners() {
    let agent = Arc::new(ScriptedAgent::new());
    agent
        .push_turn(vec![
            StreamEvent::tool_start("call1", "fetch_stock_price", Some(json!("MSFT"))),
            StreamEvent::tool_result("call1", Some(json!(420.5))),
            StreamEvent::text_delta("c1", "MSFT trades at 420.5"),
        ])
        .await;

    let log = Arc::new(InMemoryToolLog::new());
    let recorder = Arc::new(RecordingListener::new());
    let listeners = CompositeTranscriptListener::new(vec![
        Arc::new(ToolCallLogListener::new(log.clone())),
        recorder.clone(),
    ]);

    let mut session = ChatSession::open(agent)
        .await
        .unwrap()
        .with_listener(Arc::new(listeners));
    session.send(UserInput::new("MSFT price?")).await.unwrap();

    let records = log.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].summary(),
        "🔧 Tool Call fetch_stock_price with MSFT = 420.5"
    );

    // user append, bubble append, bubble done, text append
    assert_eq!(recorder.changes().await.len(), 4);
}

#[tokio::test]
async fn test_invoke_failure_before_stream() {
    struct Offline;

    #[async_trait]
    impl AgentInvoker for Offline {
        async fn invoke(&self, _: &str, _: &UserInput) -> agentchat_core::Result<EventStream> {
            Err(ChatError::invocation("service unavailable"))
        }

        async fn create_thread(&self) -> agentchat_core::Result<String> {
            Ok("thread_offline".to_string())
        }
    }

    let mut session = ChatSession::open(Arc::new(Offline)).await.unwrap();
    let err = session.send(UserInput::new("hello?")).await.unwrap_err();

    assert!(err.to_string().contains("service unavailable"));
    assert_eq!(session.messages().len(), 1);
    assert!(!session.is_turn_open());
}

#[tokio::test]
async fn test_attachments_become_user_messages() {
    let agent = Arc::new(ScriptedAgent::new());
    let mut session = ChatSession::open(agent.clone()).await.unwrap();

    session
        .send(UserInput::new("what is in this picture?").with_attachment("/tmp/cat.png"))
        .await
        .unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].content.is_file());
    assert_eq!(messages[1].text(), Some("what is in this picture?"));

    let inputs = agent.inputs().await;
    assert_eq!(inputs[0].0, session.thread_id());
    assert_eq!(inputs[0].1.attachments, vec!["/tmp/cat.png".to_string()]);
}

#[tokio::test]
async fn test_registry_serializes_turns_per_session() {
    let registry = Arc::new(SessionRegistry::new());
    let agent = Arc::new(ScriptedAgent::new());
    for i in 0..4 {
        agent
            .push_turn(vec![StreamEvent::text_delta(format!("c{i}"), format!("reply {i}"))])
            .await;
    }

    let mut tasks = Vec::new();
    for i in 0..4 {
        let registry = registry.clone();
        let agent = agent.clone();
        tasks.push(tokio::spawn(async move {
            let handle = registry
                .get_or_create("shared", || ChatSession::open(agent))
                .await
                .unwrap();
            let mut session = handle.lock().await;
            session.send(UserInput::new(format!("msg {i}"))).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let handle = registry.get("shared").await.unwrap();
    let session = handle.lock().await;
    assert_eq!(registry.len().await, 1);
    assert_eq!(session.turns(), 4);
    assert_eq!(session.messages().len(), 8);
    assert!(session.messages().iter().all(|m| m.sealed));
    assert_eq!(agent.threads_created(), 1);
}

#[tokio::test]
async fn test_registry_idle_eviction_keeps_active_sessions() {
    let registry = SessionRegistry::new();
    let agent = Arc::new(ScriptedAgent::new());
    registry
        .get_or_create("stale", || ChatSession::open(agent.clone()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    registry
        .get_or_create("fresh", || ChatSession::open(agent.clone()))
        .await
        .unwrap();

    let evicted = registry.evict_idle(Duration::from_millis(40)).await;
    assert_eq!(evicted, vec!["stale".to_string()]);
    assert!(registry.contains("fresh").await);
}
