//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `DESKHAND__*` 覆盖（双下划线表示嵌套，如 `DESKHAND__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::CallingMode;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub orchestrator: OrchestratorSection,
    pub actions: ActionsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 系统提示词文件；未设置时按 config/prompts/system.md 查找
    pub system_prompt_file: Option<PathBuf>,
}

/// [llm] 段：后端选择与调用方式
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// gemini / openai / deepseek / mock；对应 API Key 缺失时回退到 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub calling_mode: CallingMode,
    /// 单次模型调用超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            calling_mode: CallingMode::default(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// [orchestrator] 段
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSection {
    /// 单个用户回合内最多连续执行的动作数
    #[serde(default = "default_max_chain_length")]
    pub max_chain_length: usize,
    /// 单次动作处理器超时（秒）
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_chain_length: default_max_chain_length(),
            action_timeout_secs: default_action_timeout_secs(),
        }
    }
}

fn default_max_chain_length() -> usize {
    4
}

fn default_action_timeout_secs() -> u64 {
    30
}

/// [actions] 段：用户目录、允许的位置、网站目录
#[derive(Debug, Clone, Deserialize)]
pub struct ActionsSection {
    /// 用户根目录，未设置时用 home 目录
    pub user_root: Option<PathBuf>,
    #[serde(default = "default_valid_locations")]
    pub valid_locations: Vec<String>,
    /// 网站根目录，未设置时用 <home>/Websites
    pub websites_dir: Option<PathBuf>,
    #[serde(default)]
    pub scrape: ScrapeSection,
}

impl Default for ActionsSection {
    fn default() -> Self {
        Self {
            user_root: None,
            valid_locations: default_valid_locations(),
            websites_dir: None,
            scrape: ScrapeSection::default(),
        }
    }
}

fn default_valid_locations() -> Vec<String> {
    vec![
        "Desktop".into(),
        "Documents".into(),
        "Downloads".into(),
        "Pictures".into(),
    ]
}

impl ActionsSection {
    pub fn user_root(&self) -> PathBuf {
        self.user_root
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn websites_dir(&self) -> PathBuf {
        self.websites_dir
            .clone()
            .unwrap_or_else(|| self.user_root().join("Websites"))
    }
}

/// [actions.scrape] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSection {
    #[serde(default = "default_scrape_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// 为空表示不限制域名
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_scrape_timeout_secs(),
            max_chars: default_max_chars(),
            allowed_domains: Vec::new(),
        }
    }
}

fn default_scrape_timeout_secs() -> u64 {
    10
}

fn default_max_chars() -> usize {
    10_000
}

/// 从 config 目录加载配置，环境变量 DESKHAND__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 DESKHAND__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DESKHAND")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
