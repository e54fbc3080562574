//! Agent 构建器：配置 -> 模型端点、动作注册表、会话、编排器
//!
//! 所有前端共享同一套动作；注册顺序即向模型声明的顺序。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::{
    ActionDispatcher, ActionRegistry, CreateFolderAction, CreatePythonFileAction, CreateWebsiteAction,
    DeleteFoldersAction, Launcher, MoveFoldersAction, OpenWebsiteAction, OpenYoutubeTrendingAction,
    RenameFoldersAction, ScrapeWebsiteAction, SystemLauncher, UserDirs,
};
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{create_deepseek_client, create_gemini_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::react::{ConversationSession, Orchestrator};

const DEFAULT_SYSTEM_PROMPT: &str = "You are Deskhand, a helpful desktop assistant. \
When the user asks for something one of your actions can do, call that action. \
Otherwise answer briefly in plain text.";

fn has_key(var: &str) -> bool {
    std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false)
}

fn key_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    }
}

/// 根据配置与环境变量选择模型端点（Gemini / OpenAI / DeepSeek / Mock）
///
/// 配置的 provider 有密钥时直接使用；否则按 gemini、openai、deepseek 顺序找第一个有密钥的；都没有则用 Mock。
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let configured = cfg.llm.provider.to_lowercase();
    if configured == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient::new());
    }

    let provider = match key_var(&configured) {
        Some(var) if has_key(var) => Some(configured.clone()),
        _ => ["gemini", "openai", "deepseek"]
            .into_iter()
            .find(|p| key_var(p).map(has_key).unwrap_or(false))
            .map(String::from),
    };

    let model = cfg.llm.model.as_deref();
    let mode = cfg.llm.calling_mode;
    match provider.as_deref() {
        Some("gemini") => {
            let client = create_gemini_client(model, mode);
            tracing::info!(model = %client.model(), ?mode, "Using Gemini LLM");
            Arc::new(client)
        }
        Some("openai") => {
            let model = model.unwrap_or("gpt-4o-mini");
            tracing::info!(model = %model, ?mode, "Using OpenAI LLM");
            Arc::new(
                OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    model,
                    std::env::var("OPENAI_API_KEY").ok().as_deref(),
                )
                .with_mode(mode),
            )
        }
        Some("deepseek") => {
            let client = create_deepseek_client(model, mode);
            tracing::info!(model = %client.model(), ?mode, "Using DeepSeek LLM");
            Arc::new(client)
        }
        _ => {
            tracing::warn!(provider = %configured, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}

pub struct AgentBuilder {
    config: AppConfig,
    system_prompt: Option<String>,
    llm: Option<Arc<dyn LlmClient>>,
    launcher: Arc<dyn Launcher>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            system_prompt: None,
            llm: None,
            launcher: Arc::new(SystemLauncher),
        }
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Some(prompt.to_string());
        self
    }

    /// 覆盖模型端点（测试或嵌入方自带客户端）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 系统提示词：显式设置 > [app].system_prompt_file > config/prompts/system.md > 内置默认
    fn system_prompt(&self) -> String {
        if let Some(p) = &self.system_prompt {
            return p.clone();
        }
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = &self.config.app.system_prompt_file {
            candidates.push(p.clone());
        }
        candidates.push(PathBuf::from("config/prompts/system.md"));
        candidates.push(PathBuf::from("../config/prompts/system.md"));
        candidates
            .into_iter()
            .find_map(|p| std::fs::read_to_string(p).ok())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// 构建统一的动作注册表
    pub fn build_registry(&self, llm: Arc<dyn LlmClient>) -> Result<ActionRegistry, AgentError> {
        let actions = &self.config.actions;
        let dirs = UserDirs::new(actions.user_root(), actions.valid_locations.clone());

        let mut registry = ActionRegistry::new();
        registry.register_action(CreateFolderAction::new(dirs.clone()))?;
        registry.register_action(DeleteFoldersAction::new(dirs.clone()))?;
        registry.register_action(MoveFoldersAction::new(dirs.clone()))?;
        registry.register_action(RenameFoldersAction::new(dirs.clone()))?;
        registry.register_action(CreatePythonFileAction::new(dirs, llm))?;
        registry.register_action(CreateWebsiteAction::new(actions.websites_dir()))?;
        registry.register_action(OpenWebsiteAction::new(self.launcher.clone()))?;
        registry.register_action(ScrapeWebsiteAction::new(
            actions.scrape.allowed_domains.clone(),
            actions.scrape.timeout_secs,
            actions.scrape.max_chars,
        ))?;
        registry.register_action(OpenYoutubeTrendingAction::new(self.launcher.clone()))?;

        tracing::info!(actions = ?registry.action_names(), "action registry ready");
        Ok(registry)
    }

    /// 组装编排器：注册表在此之后只读共享
    pub fn build(self) -> Result<Orchestrator, AgentError> {
        let llm = match &self.llm {
            Some(llm) => llm.clone(),
            None => create_llm_from_config(&self.config),
        };
        let registry = Arc::new(self.build_registry(llm.clone())?);

        let orch = &self.config.orchestrator;
        let dispatcher = Arc::new(ActionDispatcher::new(
            registry.clone(),
            Duration::from_secs(orch.action_timeout_secs),
        ));
        let session = ConversationSession::new(
            llm,
            registry,
            self.system_prompt(),
            Duration::from_secs(self.config.llm.request_timeout_secs),
        );
        tracing::info!(session = %session.id(), "session created");

        Ok(Orchestrator::new(session, dispatcher).with_max_chain(orch.max_chain_length))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn config(tmp: &TempDir) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.actions.user_root = Some(tmp.path().to_path_buf());
        cfg
    }

    #[test]
    fn test_registry_advertises_every_action_in_order() {
        let tmp = TempDir::new().unwrap();
        let builder = AgentBuilder::new(config(&tmp));
        let registry = builder.build_registry(Arc::new(MockLlmClient::new())).unwrap();
        assert_eq!(
            registry.action_names(),
            vec![
                "create_folder",
                "delete_folders",
                "move_folders",
                "rename_folders",
                "create_python_file",
                "create_website",
                "open_website",
                "scrape_website_content",
                "open_youtube_trending",
            ]
        );
        for spec in registry.all_specs() {
            let (resolved, _) = registry.resolve(&spec.name).unwrap();
            assert_eq!(resolved, spec);
        }
    }

    #[test]
    fn test_mock_provider_from_config() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        let llm = create_llm_from_config(&cfg);
        assert_eq!(llm.token_usage(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_build_uses_explicit_prompt_and_chain_limit() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(&tmp);
        cfg.orchestrator.max_chain_length = 2;
        let mock = Arc::new(MockLlmClient::new());
        let mut orch = AgentBuilder::new(cfg)
            .with_system_prompt("be brief")
            .with_llm(mock.clone())
            .build()
            .unwrap();
        assert_eq!(orch.max_chain(), 2);

        orch.run_turn("hello").await;
        let sent = &mock.requests()[0];
        assert_eq!(sent.system_prompt, "be brief");
        assert_eq!(sent.actions.len(), 9);
    }
}
