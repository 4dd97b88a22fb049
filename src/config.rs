use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_GATEWAY_URL: &str = "https://ai.gateway.lovable.dev/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_CODE_SNIPPET_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub gateway_url: String,
    /// Bearer token. Only required once a model call is made.
    pub api_key: Option<String>,
    pub model: String,
    /// Characters of the current code sent as context.
    pub code_snippet_limit: usize,
    pub submission_id: Option<String>,
    pub current_task: Option<String>,
    /// Project file the student is editing; its content goes out as a snippet.
    pub current_file: Option<String>,
    /// Where the JSON-file stores and exports live.
    pub data_dir: PathBuf,
    /// Send full file contents to the model.
    pub allow_file_access: bool,
    /// Send progress entries to the model.
    pub allow_progress_access: bool,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            code_snippet_limit: DEFAULT_CODE_SNIPPET_LIMIT,
            submission_id: None,
            current_task: None,
            current_file: None,
            data_dir: PathBuf::from(".tutor"),
            allow_file_access: false,
            allow_progress_access: false,
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

impl TutorConfig {
    /// Reads `TUTOR_*` variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("TUTOR_GATEWAY_URL") {
            config.gateway_url = url;
        }
        config.api_key = non_empty("TUTOR_API_KEY");
        if let Some(model) = non_empty("TUTOR_MODEL") {
            config.model = model;
        }
        if let Some(limit) = non_empty("TUTOR_CODE_SNIPPET_LIMIT") {
            config.code_snippet_limit = limit.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TUTOR_CODE_SNIPPET_LIMIT".to_string(),
                value: limit.clone(),
            })?;
        }
        config.submission_id = non_empty("TUTOR_SUBMISSION_ID");
        config.current_task = non_empty("TUTOR_TASK");
        config.current_file = non_empty("TUTOR_CURRENT_FILE");
        if let Some(dir) = non_empty("TUTOR_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("TUTOR_ALLOW_FILE_ACCESS") {
            config.allow_file_access = parse_flag("TUTOR_ALLOW_FILE_ACCESS", &v)?;
        }
        if let Some(v) = lookup("TUTOR_ALLOW_PROGRESS_ACCESS") {
            config.allow_progress_access = parse_flag("TUTOR_ALLOW_PROGRESS_ACCESS", &v)?;
        }

        Ok(config)
    }

    pub fn current_code_path(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("TUTOR_API_KEY".to_string()))
    }
}
