//! 动作注册表
//!
//! 启动阶段按模块注册 (ActionSpec, ActionHandler)；重名注册直接报错。
//! 启动完成后注册表放进 Arc 只读共享，Dispatcher 与任意多个 Session 无需加锁。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::actions::{ActionFailure, ActionPayload, ActionSpec, ValidatedArgs};

/// 动作处理器：只接收已校验参数；副作用（文件系统、网络、浏览器）全部在处理器内部
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure>;
}

/// 自带描述的处理器，可直接 register_action
pub trait Action: ActionHandler {
    fn spec(&self) -> ActionSpec;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate action: {0}")]
    DuplicateAction(String),

    #[error("Unknown action: {0}")]
    NotFound(String),
}

/// 注册表：保持注册顺序（用于向模型声明工具集），按名索引
#[derive(Default)]
pub struct ActionRegistry {
    specs: Vec<ActionSpec>,
    handlers: Vec<Arc<dyn ActionHandler>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        spec: ActionSpec,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateAction(spec.name));
        }
        tracing::debug!(action = %spec.name, "register action");
        self.index.insert(spec.name.clone(), self.specs.len());
        self.specs.push(spec);
        self.handlers.push(handler);
        Ok(())
    }

    pub fn register_action(&mut self, action: impl Action + 'static) -> Result<(), RegistryError> {
        let spec = action.spec();
        self.register(spec, Arc::new(action))
    }

    pub fn resolve(&self, name: &str) -> Result<(&ActionSpec, Arc<dyn ActionHandler>), RegistryError> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok((&self.specs[i], self.handlers[i].clone()))
    }

    /// 全部动作描述，按注册顺序
    pub fn all_specs(&self) -> &[ActionSpec] {
        &self.specs
    }

    pub fn action_names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
