//! Configuration files
//!
//! Two files drive a run:
//! - the agent file (JSON): tool schema and the static rules prepended to
//!   every model call
//! - the settings file (TOML): model, limits, directories and prompts
//!
//! The agent file is required. A missing settings file falls back to
//! defaults. `${VAR}` references in the settings text are expanded from the
//! environment before parsing.

use fincraft_error::{Error, ErrorKind, Result};
use fincraft_llm::{ChatMessage, ToolDefinition};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

// ============================================================================
// Agent file (JSON)
// ============================================================================

/// Contents of the agent JSON file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFile {
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub agent_rules: Vec<ChatMessage>,
}

/// One entry of the `tools` array, in OpenAI function format
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: ToolDefinition,
}

fn function_type() -> String {
    "function".into()
}

impl AgentFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            let kind = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorKind::FileNotFound
            } else {
                ErrorKind::IoFailed
            };
            Error::new(kind, format!("failed to load {}: {}", path.display(), e))
                .with_operation("config::load_agent_file")
                .with_context("path", path.display().to_string())
                .set_source(e)
        })?;
        Self::parse(&text).map_err(|e| e.with_context("path", path.display().to_string()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::config_invalid(format!("invalid agent file: {}", e))
                .with_operation("config::load_agent_file")
                .set_source(e)
        })
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|spec| spec.function.clone()).collect()
    }
}

// ============================================================================
// Settings (TOML)
// ============================================================================

/// Contents of the settings TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub agent: AgentSettings,
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// `provider/model`, e.g. `openai/gpt-4o`
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            model: "openai/gpt-4o".into(),
            temperature: None,
            max_tokens: 1024,
            api_key: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

/// Prompts for the analyze workflow
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub system_prompt: String,
    pub user_prompt1: String,
    pub user_prompt2: String,
    pub user_prompt3: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are an expert Python developer helping financial analysts. \
                Write clear, well-documented code."
                .into(),
            user_prompt1: "Include type hints and a docstring. Return only the code in a \
                ```python block."
                .into(),
            user_prompt2: "Write a short README.md section explaining what the function does, \
                its inputs and its outputs."
                .into(),
            user_prompt3: "Write pytest unit tests for the function. Return only the code in a \
                ```python block."
                .into(),
        }
    }
}

impl Settings {
    /// Load from `path`, using defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::from(e)
                .with_operation("config::load_settings")
                .with_context("path", path.display().to_string())
        })?;
        Self::parse(&text).map_err(|e| e.with_context("path", path.display().to_string()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let expanded = expand_env_vars(text);
        toml::from_str(&expanded).map_err(|e| {
            Error::config_invalid(format!("invalid settings: {}", e))
                .with_operation("config::load_settings")
                .set_source(e)
        })
    }
}

/// Expand `${VAR}` from the environment. Unknown variables become empty.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

// ============================================================================
// Agent configuration
// ============================================================================

/// Everything the agent loop needs besides the provider and tools
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model name sent with each request
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: usize,
    /// Upper bound on model calls per run
    pub max_iterations: usize,
    /// Prepended to every request, never stored in memory
    pub rules: Vec<ChatMessage>,
    /// Tool schema sent to the model; empty means the registry's own
    pub tools: Vec<ToolDefinition>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            temperature: None,
            max_tokens: 1024,
            max_iterations: 10,
            rules: Vec::new(),
            tools: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Combine the two configuration files. `model` is the bare model name
    /// the provider expects.
    pub fn from_files(
        agent_file: &AgentFile,
        settings: &Settings,
        model: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            temperature: settings.general.temperature,
            max_tokens: settings.general.max_tokens,
            max_iterations: settings.agent.max_iterations,
            rules: agent_file.agent_rules.clone(),
            tools: agent_file.tool_definitions(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_rules(mut self, rules: Vec<ChatMessage>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::config_invalid("max_iterations must be at least 1")
                .with_operation("config::validate"));
        }
        if self.max_tokens == 0 {
            return Err(Error::config_invalid("max_tokens must be at least 1")
                .with_operation("config::validate"));
        }
        Ok(())
    }
}
