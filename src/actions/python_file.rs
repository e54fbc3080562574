//! create_python_file：让模型生成 Python 代码并写入用户目录

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::actions::folder::UserDirs;
use crate::actions::{
    Action, ActionErrorKind, ActionFailure, ActionHandler, ActionPayload, ActionSpec, ParamSpec, ValidatedArgs,
};
use crate::llm::{complete_text, LlmClient};

const CODE_ONLY_SUFFIX: &str =
    " JUST GIVE PYTHON CODE WITH MAIN FUNCTION AND WRITE EVERYTHING EXTRA IN COMMENTS";

pub struct CreatePythonFileAction {
    dirs: UserDirs,
    llm: Arc<dyn LlmClient>,
}

#[derive(Deserialize)]
struct CreatePythonFileArgs {
    filename: String,
    code_prompt: String,
    location: String,
}

/// 去掉 Markdown 代码围栏（```python / ```）与首尾空行
pub(crate) fn strip_code_fences(code: &str) -> Result<String, ActionFailure> {
    let open = Regex::new(r"(?m)^\s*```(?:python|py)?\s*$\n?")
        .map_err(|e| ActionFailure::internal(e.to_string()))?;
    let close = Regex::new(r"(?m)^\s*```\s*$")
        .map_err(|e| ActionFailure::internal(e.to_string()))?;
    let stripped = open.replace_all(code, "");
    let stripped = close.replace_all(&stripped, "");
    Ok(stripped.trim().to_string())
}

impl CreatePythonFileAction {
    pub fn new(dirs: UserDirs, llm: Arc<dyn LlmClient>) -> Self {
        Self { dirs, llm }
    }
}

impl Action for CreatePythonFileAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "create_python_file",
            "Generates Python code based on a prompt and creates a Python file with the generated code.",
        )
        .param(
            ParamSpec::string("filename", "Name of the Python file to create (without the .py extension).")
                .required(),
        )
        .param(ParamSpec::string("code_prompt", "The prompt describing the Python code to generate.").required())
        .param(
            ParamSpec::string(
                "location",
                "Location where the file should be created (e.g., 'Desktop', 'Documents').",
            )
            .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for CreatePythonFileAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let args: CreatePythonFileArgs = args.parse()?;
        let mut filename = args.filename.trim().to_string();
        if !filename.ends_with(".py") {
            filename.push_str(".py");
        }
        let path = self.dirs.entry(&args.location, &filename)?;

        let prompt = format!("{}{}", args.code_prompt.trim(), CODE_ONLY_SUFFIX);
        let generated = complete_text(self.llm.as_ref(), &prompt)
            .await
            .map_err(|e| ActionFailure::new(ActionErrorKind::NetworkFailure, format!("Code generation failed: {e}")))?;
        let code = strip_code_fences(&generated)?;
        if code.is_empty() {
            return Err(ActionFailure::internal("No code generated."));
        }

        tokio::fs::write(&path, &code)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to write {}", path.display()), &e))?;

        tracing::info!(path = %path.display(), bytes = code.len(), "python file created");
        Ok(ActionPayload::message(format!(
            "Python file '{filename}' created at {} with generated code.",
            args.location
        ))
        .with_field("path", path.display().to_string()))
    }
}
