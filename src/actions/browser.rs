//! 系统浏览器启动器与 open_youtube_trending
//!
//! Launcher 抽象出「用系统默认程序打开 URL」，测试中替换为记录型实现。

use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{Action, ActionFailure, ActionHandler, ActionPayload, ActionSpec, ValidatedArgs};

pub const YOUTUBE_TRENDING_URL: &str = "https://www.youtube.com/feed/trending";

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), ActionFailure>;
}

/// 调用平台命令打开 URL：Linux xdg-open，macOS open，Windows cmd /C start
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

#[async_trait]
impl Launcher for SystemLauncher {
    async fn open(&self, url: &str) -> Result<(), ActionFailure> {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = tokio::process::Command::new("cmd");
            c.args(["/C", "start", "", url]);
            c
        } else if cfg!(target_os = "macos") {
            let mut c = tokio::process::Command::new("open");
            c.arg(url);
            c
        } else {
            let mut c = tokio::process::Command::new("xdg-open");
            c.arg(url);
            c
        };

        let status = cmd
            .status()
            .await
            .map_err(|e| ActionFailure::io("Failed to launch browser", &e))?;
        if !status.success() {
            return Err(ActionFailure::internal(format!(
                "Browser launcher exited with {status}"
            )));
        }
        tracing::info!(url = %url, "opened in browser");
        Ok(())
    }
}

pub struct OpenYoutubeTrendingAction {
    launcher: Arc<dyn Launcher>,
}

impl OpenYoutubeTrendingAction {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self { launcher }
    }
}

impl Action for OpenYoutubeTrendingAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "open_youtube_trending",
            "Opens the YouTube trending page in the default web browser.",
        )
    }
}

#[async_trait]
impl ActionHandler for OpenYoutubeTrendingAction {
    async fn execute(&self, _args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        self.launcher.open(YOUTUBE_TRENDING_URL).await?;
        Ok(ActionPayload::message("Opened YouTube trending in the browser.")
            .with_field("url", YOUTUBE_TRENDING_URL))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// 只记录 URL，不真正打开
    #[derive(Default)]
    pub struct RecordingLauncher {
        pub opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Launcher for RecordingLauncher {
        async fn open(&self, url: &str) -> Result<(), ActionFailure> {
            self.opened.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingLauncher;
    use super::*;

    #[tokio::test]
    async fn test_opens_trending_feed() {
        let launcher = Arc::new(RecordingLauncher::default());
        let action = OpenYoutubeTrendingAction::new(launcher.clone());
        let args = action.spec().validate(&serde_json::Value::Null).unwrap();
        let payload = action.execute(args).await.unwrap();
        assert_eq!(payload.field("url").and_then(|v| v.as_str()), Some(YOUTUBE_TRENDING_URL));
        assert_eq!(launcher.opened.lock().unwrap().as_slice(), [YOUTUBE_TRENDING_URL]);
    }
}
