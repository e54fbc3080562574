//! 动作分发器
//!
//! dispatch(request)：注册表查找 -> 参数校验 -> 带超时执行处理器 -> 统一为 ActionResult。
//! 任何失败（未知动作、参数错误、处理器 panic、超时）都以 Failure 返回，绝不向上抛出；
//! 每次调用输出一条结构化审计日志（JSON）。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;

use crate::actions::{ActionErrorKind, ActionRegistry, ActionResult, ActionSpec};

/// 模型给出的动作请求：参数为未经校验的原始 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// 分发器：持有只读注册表与单次动作超时
pub struct ActionDispatcher {
    registry: Arc<ActionRegistry>,
    timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<ActionRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn specs(&self) -> &[ActionSpec] {
        self.registry.all_specs()
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, request: &ActionRequest) -> ActionResult {
        let start = Instant::now();
        let result = self.dispatch_inner(request).await;

        let outcome = match &result {
            ActionResult::Success { .. } => "ok".to_string(),
            ActionResult::Failure { kind, .. } => kind.to_string(),
        };
        let audit = serde_json::json!({
            "event": "action_audit",
            "action": request.name,
            "ok": result.is_success(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&request.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "action");

        result
    }

    async fn dispatch_inner(&self, request: &ActionRequest) -> ActionResult {
        let (spec, handler) = match self.registry.resolve(&request.name) {
            Ok(found) => found,
            Err(_) => {
                return ActionResult::failure(
                    ActionErrorKind::Unsupported,
                    format!("unknown action {}", request.name),
                )
            }
        };

        let args = match spec.validate(&request.arguments) {
            Ok(args) => args,
            Err(diagnostic) => {
                return ActionResult::failure(ActionErrorKind::InvalidArguments, diagnostic)
            }
        };

        let call = AssertUnwindSafe(handler.execute(args)).catch_unwind();
        match timeout(self.timeout, call).await {
            Ok(Ok(outcome)) => outcome.into(),
            Ok(Err(panic)) => ActionResult::failure(
                ActionErrorKind::Internal,
                format!("action `{}` failed unexpectedly: {}", request.name, panic_message(&*panic)),
            ),
            Err(_) => ActionResult::failure(ActionErrorKind::NetworkFailure, "timed out"),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::actions::{ActionFailure, ActionHandler, ActionPayload, ParamSpec, ValidatedArgs};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ActionHandler for Counting {
        async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = args.str("name").unwrap_or_default().to_string();
            Ok(ActionPayload::message(format!("hello {name}")))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ActionHandler for Panicking {
        async fn execute(&self, _args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
            panic!("disk on fire");
        }
    }

    struct Slow;

    #[async_trait]
    impl ActionHandler for Slow {
        async fn execute(&self, _args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ActionPayload::message("late"))
        }
    }

    fn dispatcher(counter: Arc<Counting>) -> ActionDispatcher {
        let mut reg = ActionRegistry::new();
        reg.register(
            ActionSpec::new("greet", "say hello").param(ParamSpec::string("name", "who").required()),
            counter,
        )
        .unwrap();
        reg.register(ActionSpec::new("explode", "panics"), Arc::new(Panicking)).unwrap();
        reg.register(ActionSpec::new("slow", "sleeps"), Arc::new(Slow)).unwrap();
        ActionDispatcher::new(Arc::new(reg), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_unknown_action_is_unsupported() {
        let counter = Arc::new(Counting::default());
        let d = dispatcher(counter.clone());
        let r = d.dispatch(&ActionRequest::new("launch_rocket", json!({}))).await;
        assert_eq!(r.failure_kind(), Some(ActionErrorKind::Unsupported));
        assert!(r.message().contains("launch_rocket"));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_argument_never_reaches_handler() {
        let counter = Arc::new(Counting::default());
        let d = dispatcher(counter.clone());
        let r = d.dispatch(&ActionRequest::new("greet", json!({}))).await;
        assert_eq!(r.failure_kind(), Some(ActionErrorKind::InvalidArguments));
        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);

        let r = d.dispatch(&ActionRequest::new("greet", json!({"name": "Ada"}))).await;
        assert!(r.is_success());
        assert_eq!(r.message(), "hello Ada");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_internal() {
        let d = dispatcher(Arc::new(Counting::default()));
        let r = d.dispatch(&ActionRequest::new("explode", Value::Null)).await;
        assert_eq!(r.failure_kind(), Some(ActionErrorKind::Internal));
        assert!(r.message().contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let d = dispatcher(Arc::new(Counting::default()));
        let r = d.dispatch(&ActionRequest::new("slow", json!({}))).await;
        assert_eq!(r.failure_kind(), Some(ActionErrorKind::NetworkFailure));
        assert_eq!(r.message(), "timed out");
    }
}
