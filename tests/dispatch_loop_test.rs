//! 分发 + 编排主循环集成测试（Mock 模型端点，临时目录作为用户根目录）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deskhand::actions::{
    ActionDispatcher, ActionFailure, ActionHandler, ActionPayload, ActionRegistry, ActionSpec, Launcher,
    ParamSpec, ValidatedArgs,
};
use deskhand::config::AppConfig;
use deskhand::llm::{MockLlmClient, ModelResponse};
use deskhand::memory::TurnRole;
use deskhand::react::{ConversationSession, Orchestrator};
use deskhand::AgentBuilder;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingEcho {
    calls: AtomicUsize,
}

#[async_trait]
impl ActionHandler for CountingEcho {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = args.str("text").unwrap_or_default().to_string();
        Ok(ActionPayload::message(format!("echoed {text}")).with_field("text", text))
    }
}

#[derive(Default)]
struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
}

#[async_trait]
impl Launcher for RecordingLauncher {
    async fn open(&self, url: &str) -> Result<(), ActionFailure> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

fn echo_orchestrator(mock: Arc<MockLlmClient>, echo: Arc<CountingEcho>, max_chain: usize) -> Orchestrator {
    let mut reg = ActionRegistry::new();
    reg.register(
        ActionSpec::new("echo", "Echo text back").param(ParamSpec::string("text", "text to echo").required()),
        echo,
    )
    .unwrap();
    let reg = Arc::new(reg);
    let session = ConversationSession::new(mock, reg.clone(), "test", Duration::from_secs(5));
    let dispatcher = Arc::new(ActionDispatcher::new(reg, Duration::from_secs(5)));
    Orchestrator::new(session, dispatcher).with_max_chain(max_chain)
}

fn desktop_config(tmp: &TempDir) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.actions.user_root = Some(tmp.path().to_path_buf());
    cfg.actions.websites_dir = Some(tmp.path().join("Websites"));
    cfg
}

#[tokio::test]
async fn test_plain_text_reply_is_single_round_trip() {
    let mock = Arc::new(MockLlmClient::scripted([ModelResponse::text("Hi there, how can I help?")]));
    let echo = Arc::new(CountingEcho::default());
    let mut orch = echo_orchestrator(mock.clone(), echo.clone(), 4);

    let reply = orch.run_turn("hello").await;
    assert_eq!(reply.text, "Hi there, how can I help?");
    assert_eq!(mock.calls(), 1);
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_action_reply_dispatches_once_and_feeds_result_back() {
    let mock = Arc::new(MockLlmClient::scripted([
        ModelResponse::call("echo", json!({"text": "ping"})),
        ModelResponse::text("I echoed ping for you."),
    ]));
    let echo = Arc::new(CountingEcho::default());
    let mut orch = echo_orchestrator(mock.clone(), echo.clone(), 4);

    let reply = orch.run_turn("echo ping").await;
    assert_eq!(reply.text, "I echoed ping for you.");
    assert_eq!(mock.calls(), 2);
    assert_eq!(echo.calls.load(Ordering::SeqCst), 1);

    let follow_up = mock.requests()[1].last_text().unwrap();
    assert!(follow_up.contains("\"outcome\":\"success\""));
    assert!(follow_up.contains("echoed ping"));
    assert!(follow_up.ends_with("So, draft a small confirming message."));

    let roles: Vec<_> = orch.session().history().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![TurnRole::User, TurnRole::ActionCall, TurnRole::ActionResult, TurnRole::Assistant]
    );
}

#[tokio::test]
async fn test_unknown_action_is_reported_to_model_not_user() {
    let mock = Arc::new(MockLlmClient::scripted([
        ModelResponse::call("launch_rocket", json!({})),
        ModelResponse::text("Sorry, I can't do that."),
    ]));
    let echo = Arc::new(CountingEcho::default());
    let mut orch = echo_orchestrator(mock.clone(), echo.clone(), 4);

    let reply = orch.run_turn("launch a rocket").await;
    assert_eq!(reply.text, "Sorry, I can't do that.");
    let follow_up = mock.requests()[1].last_text().unwrap();
    assert!(follow_up.contains("unsupported"));
    assert!(follow_up.contains("unknown action launch_rocket"));
    assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chain_length_is_bounded() {
    let mock = Arc::new(MockLlmClient::always(ModelResponse::call("echo", json!({"text": "again"}))));
    let echo = Arc::new(CountingEcho::default());
    let mut orch = echo_orchestrator(mock.clone(), echo.clone(), 3);

    let reply = tokio::time::timeout(Duration::from_secs(5), orch.run_turn("loop forever"))
        .await
        .expect("run_turn must terminate");
    assert!(reply.text.contains("too many chained actions"));
    assert_eq!(echo.calls.load(Ordering::SeqCst), 3);
    // 首次 submit + 每次动作后的 follow-up
    assert_eq!(mock.calls(), 4);
}

#[tokio::test]
async fn test_create_folder_scenario() {
    let tmp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::scripted([
        ModelResponse::call(
            "create_folder",
            json!({"location": "Desktop", "folder_names": ["Foo", "Bar"]}),
        ),
        ModelResponse::text("Done! I created Foo and Bar on your Desktop."),
    ]));
    let mut orch = AgentBuilder::new(desktop_config(&tmp))
        .with_llm(mock.clone())
        .build()
        .unwrap();

    let reply = orch.run_turn("make folders Foo and Bar on my desktop").await;
    assert!(reply.text.contains("Foo"));
    assert!(reply.text.contains("Bar"));
    assert!(tmp.path().join("Desktop").join("Foo").is_dir());
    assert!(tmp.path().join("Desktop").join("Bar").is_dir());

    let follow_up = mock.requests()[1].last_text().unwrap();
    assert!(follow_up.contains("\"created\""));
    assert!(follow_up.contains("Foo"));
}

#[tokio::test]
async fn test_delete_missing_folder_is_item_level_not_found() {
    let tmp = TempDir::new().unwrap();
    let mock = Arc::new(MockLlmClient::scripted([
        ModelResponse::call(
            "delete_folders",
            json!({"folders_to_delete": [{"folder_name": "Missing", "location": "Desktop"}]}),
        ),
        ModelResponse::text("I couldn't find a folder named Missing on your Desktop."),
    ]));
    let mut orch = AgentBuilder::new(desktop_config(&tmp))
        .with_llm(mock.clone())
        .build()
        .unwrap();

    orch.run_turn("delete the Missing folder").await;
    let follow_up = mock.requests()[1].last_text().unwrap();
    assert!(follow_up.contains("\"outcome\":\"success\""));
    assert!(follow_up.contains("not_found"));
}

#[tokio::test]
async fn test_website_offer_can_be_accepted() {
    let tmp = TempDir::new().unwrap();
    let launcher = Arc::new(RecordingLauncher::default());
    let mock = Arc::new(MockLlmClient::scripted([
        ModelResponse::call("create_website", json!({"website_name": "portfolio"})),
        ModelResponse::text("Your portfolio site is ready."),
        ModelResponse::text("Opened it in your browser."),
    ]));
    let mut orch = AgentBuilder::new(desktop_config(&tmp))
        .with_llm(mock.clone())
        .with_launcher(launcher.clone())
        .build()
        .unwrap();

    let reply = orch.run_turn("build me a portfolio website").await;
    assert_eq!(reply.text, "Your portfolio site is ready.");
    let offer = reply.offer.expect("create_website offers to open the site");
    assert_eq!(offer.action, "open_website");
    assert!(launcher.opened.lock().unwrap().is_empty());

    let reply = orch.run_offer(&offer, CancellationToken::new()).await;
    assert_eq!(reply.text, "Opened it in your browser.");
    let opened = launcher.opened.lock().unwrap();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].ends_with("portfolio/index.html"));
}
