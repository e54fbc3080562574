//! 网站动作：create_website / open_website
//!
//! create_website 只负责写出 `<websites_dir>/<name>/index.html`，
//! 是否立即打开由 payload 中的 FollowUpOffer 交给前端询问用户。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::actions::browser::Launcher;
use crate::actions::folder::{check_name, exists};
use crate::actions::{
    Action, ActionFailure, ActionHandler, ActionPayload, ActionSpec, FollowUpOffer, ParamSpec, ValidatedArgs,
};

pub const OPEN_WEBSITE_PROMPT: &str = "Website created successfully. Do you want to open it now?";

/// "my_new_blog" -> "My New Blog"
fn display_title(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn default_page(name: &str) -> String {
    let title = display_title(name);
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <script src="https://cdn.tailwindcss.com"></script>
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;700&display=swap" rel="stylesheet">
    <style>
        body {{ font-family: 'Inter', sans-serif; }}
    </style>
</head>
<body class="bg-gradient-to-r from-blue-500 to-purple-600 min-h-screen flex items-center justify-center text-white p-4">
    <div class="bg-white bg-opacity-20 backdrop-blur-lg rounded-xl shadow-2xl p-8 md:p-12 text-center max-w-2xl w-full">
        <h1 class="text-4xl md:text-5xl font-extrabold mb-4">
            Welcome to <span class="text-yellow-300">{title}</span>!
        </h1>
        <p class="text-lg md:text-xl mb-6">This is a simple website created by your desktop assistant.</p>
        <div class="flex flex-wrap justify-center gap-4">
            <a href="#" class="bg-yellow-400 text-gray-900 font-bold py-3 px-6 rounded-lg shadow-lg">Learn More</a>
            <a href="#" class="bg-green-400 text-gray-900 font-bold py-3 px-6 rounded-lg shadow-lg">Get Started</a>
        </div>
        <p class="mt-8 text-sm opacity-80">&copy; {title}</p>
    </div>
</body>
</html>
"##
    )
}

/// 本地文件路径转 file:/// URL
fn file_url(path: &Path) -> String {
    let s = path.display().to_string().replace('\\', "/");
    format!("file:///{}", s.trim_start_matches('/'))
}

// ---------------------------------------------------------------------------

pub struct CreateWebsiteAction {
    websites_dir: PathBuf,
}

impl CreateWebsiteAction {
    pub fn new(websites_dir: impl Into<PathBuf>) -> Self {
        Self {
            websites_dir: websites_dir.into(),
        }
    }
}

#[derive(Deserialize)]
struct CreateWebsiteArgs {
    website_name: String,
    content: Option<String>,
}

impl Action for CreateWebsiteAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "create_website",
            "Creates a new folder with an index.html file for a website in the 'Websites' folder of the user directory.",
        )
        .param(
            ParamSpec::string(
                "website_name",
                "The desired name for the website folder (e.g., 'my_new_blog').",
            )
            .required(),
        )
        .param(ParamSpec::string(
            "content",
            "Optional HTML content for index.html. A default template is used when omitted.",
        ))
    }
}

#[async_trait]
impl ActionHandler for CreateWebsiteAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let args: CreateWebsiteArgs = args.parse()?;
        let name = args.website_name.trim();
        check_name(name)?;

        let dir = self.websites_dir.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to create {}", dir.display()), &e))?;

        let index = dir.join("index.html");
        let content = match args.content {
            Some(c) if !c.trim().is_empty() => c,
            _ => default_page(name),
        };
        tokio::fs::write(&index, content)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to write {}", index.display()), &e))?;

        let path = index.display().to_string();
        tracing::info!(path = %path, "website created");
        Ok(ActionPayload::message(format!(
            "Website '{name}' created successfully at {}",
            dir.display()
        ))
        .with_field("path", path.clone())
        .with_offer(FollowUpOffer {
            prompt: OPEN_WEBSITE_PROMPT.to_string(),
            action: "open_website".to_string(),
            arguments: json!({ "index_html_path": path }),
        }))
    }
}

// ---------------------------------------------------------------------------

pub struct OpenWebsiteAction {
    launcher: Arc<dyn Launcher>,
}

impl OpenWebsiteAction {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }
}

impl Action for OpenWebsiteAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "open_website",
            "Opens the specified index.html file in the default web browser.",
        )
        .param(
            ParamSpec::string(
                "index_html_path",
                "The absolute path to the index.html file to open.",
            )
            .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for OpenWebsiteAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let raw = args.str("index_html_path").unwrap_or_default().trim();
        let path = Path::new(raw);
        if raw.is_empty() || !exists(path).await {
            return Err(ActionFailure::not_found(format!(
                "File '{raw}' does not exist."
            )));
        }

        self.launcher.open(&file_url(path)).await?;
        Ok(ActionPayload::message(format!(
            "Website opened successfully in your default browser: {raw}"
        ))
        .with_field("path", raw))
    }
}
