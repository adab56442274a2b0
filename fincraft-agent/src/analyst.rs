//! Analyze workflow
//!
//! Three chained model calls over one growing message list: a Python
//! function for the analyst's request, a README section for it, and unit
//! tests for it.

use crate::config::PromptSettings;
use fincraft_error::{Error, ErrorKind, Result};
use fincraft_llm::{ChatMessage, CompletionRequest, LlmProvider};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Generated artifacts
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub function: String,
    pub readme: String,
    pub tests: String,
}

/// Where [`Analysis::save`] wrote its files
#[derive(Debug, Clone, PartialEq)]
pub struct SavedAnalysis {
    pub code: PathBuf,
    pub readme: PathBuf,
}

pub struct Analyst<'a, P> {
    provider: &'a P,
    prompts: PromptSettings,
    model: Option<String>,
    temperature: f32,
    max_tokens: usize,
}

impl<'a, P: LlmProvider> Analyst<'a, P> {
    pub fn new(provider: &'a P, prompts: PromptSettings) -> Self {
        Self {
            provider,
            prompts,
            model: None,
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn analyze(&self, description: &str) -> Result<Analysis> {
        let mut messages = vec![
            ChatMessage::system(self.prompts.system_prompt.clone()),
            ChatMessage::user(format!(
                "Please write a clean Python function that {}.\n{}",
                description, self.prompts.user_prompt1
            )),
        ];

        let response = self.generate(&messages, "function").await?;
        let function = extract_code_block(&response);
        info!(chars = function.len(), "generated function");

        messages.push(ChatMessage::assistant(function.clone()));
        messages.push(ChatMessage::user(self.prompts.user_prompt2.clone()));
        let response = self.generate(&messages, "readme").await?;
        let readme = match extract_code_block(&response) {
            block if block.is_empty() => response,
            block => block,
        };
        info!(chars = readme.len(), "generated README section");

        messages.push(ChatMessage::assistant(readme.clone()));
        messages.push(ChatMessage::user(self.prompts.user_prompt3.clone()));
        let response = self.generate(&messages, "tests").await?;
        let tests = extract_code_block(&response);
        info!(chars = tests.len(), "generated unit tests");

        Ok(Analysis {
            function,
            readme,
            tests,
        })
    }

    async fn generate(&self, messages: &[ChatMessage], step: &'static str) -> Result<String> {
        let mut request = CompletionRequest::new(messages.to_vec())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        debug!(step, messages = messages.len(), "analyst request");
        let response = self.provider.complete(request).await.map_err(|e| {
            Error::new(e.kind(), e.to_string())
                .with_operation("analyst::generate")
                .with_context("step", step)
                .set_source(e)
        })?;

        response
            .content
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                Error::new(ErrorKind::EmptyResponse, "model returned no content")
                    .with_operation("analyst::generate")
                    .with_context("step", step)
            })
    }
}

/// Body of the first ```` ```python ```` block, else of the first fenced
/// block, else the trimmed text
pub fn extract_code_block(text: &str) -> String {
    fenced(text, "```python")
        .or_else(|| fenced(text, "```"))
        .unwrap_or(text)
        .trim()
        .to_string()
}

fn fenced<'t>(text: &'t str, open: &str) -> Option<&'t str> {
    let (_, rest) = text.split_once(open)?;
    rest.split_once("```").map(|(body, _)| body)
}

/// File stem derived from a task description
pub fn base_name(description: &str) -> String {
    description
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .map(|c| if c == ' ' { '_' } else { c })
        .take(30)
        .collect()
}

impl Analysis {
    /// Write `<base>.py` (function then tests) and `README_<base>.md` into
    /// `dir`, or `output` and its `.md` sibling when given.
    pub fn save(
        &self,
        description: &str,
        output: Option<&Path>,
        dir: &Path,
    ) -> Result<SavedAnalysis> {
        let (code, readme) = match output {
            Some(path) => (path.to_path_buf(), path.with_extension("md")),
            None => {
                let base = base_name(description);
                (
                    dir.join(format!("{}.py", base)),
                    dir.join(format!("README_{}.md", base)),
                )
            }
        };

        write(&code, &format!("{}\n\n{}", self.function, self.tests))?;
        write(&readme, &self.readme)?;

        Ok(SavedAnalysis { code, readme })
    }
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| {
        Error::from(e)
            .with_operation("analyst::save")
            .with_context("path", path.display().to_string())
    })
}
