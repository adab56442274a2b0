//! Agent implementation - drives the model <-> tool loop

use crate::config::AgentConfig;
use crate::memory::Conversation;
use crate::sink::{RunEvent, RunSink};
use fincraft_error::{Error, ErrorKind};
use fincraft_llm::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, ToolCall, ToolDefinition,
    UsageTracker,
};
use fincraft_tools::{Arguments, Tool, ToolError, ToolRegistry, ToolResult};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// The model answered in plain text
    Completed { content: String },
    /// The model called `terminate`
    Terminated { message: String },
    /// The iteration budget ran out
    Exhausted,
    /// The completion gateway failed
    Failed { error: Error },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. } | RunOutcome::Terminated { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Completed { .. } => "completed",
            RunOutcome::Terminated { .. } => "terminated",
            RunOutcome::Exhausted => "exhausted",
            RunOutcome::Failed { .. } => "failed",
        }
    }
}

/// Result from one run
#[derive(Debug)]
pub struct AgentRun {
    pub outcome: RunOutcome,
    /// Gateway calls made
    pub iterations: usize,
    pub memory: Conversation,
    pub usage: UsageTracker,
}

/// The agent orchestrator - owns the loop for one task at a time.
///
/// Each iteration sends the static rules followed by the conversation to the
/// model. Only the first tool call of a response is executed; any others are
/// dropped. A tool failure is fed back to the model and the loop goes on; a
/// gateway failure ends the run.
pub struct Agent<P, S> {
    provider: P,
    registry: ToolRegistry,
    config: AgentConfig,
    sink: S,
}

impl<P: LlmProvider, S: RunSink> Agent<P, S> {
    pub fn new(provider: P, registry: ToolRegistry, config: AgentConfig, sink: S) -> Self {
        Self {
            provider,
            registry,
            config,
            sink,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run a task until the model answers, terminates, or the budget ends
    pub async fn run(&mut self, task: &str) -> AgentRun {
        let max_iterations = self.config.max_iterations;
        self.sink.init(task, max_iterations);
        self.sink.record(RunEvent::Started {
            task: task.to_string(),
            max_iterations,
        });

        let tools = self.tool_schema();
        let mut memory = Conversation::new(task);
        let mut usage = UsageTracker::new();
        let mut iterations = 0;

        let outcome = loop {
            if iterations >= max_iterations {
                info!(max_iterations, "iteration budget exhausted");
                break RunOutcome::Exhausted;
            }
            iterations += 1;
            self.sink.record(RunEvent::IterationStarted { iteration: iterations });

            let response = match self.complete(&memory, &tools).await {
                Ok(response) => response,
                Err(err) => {
                    if matches!(err, ProviderError::EmptyResponse) {
                        error!(iteration = iterations, "No choices returned from completion.");
                    } else {
                        error!(iteration = iterations, error = %err, "completion failed");
                    }
                    let error = self.gateway_error(err, iterations);
                    self.sink.record(RunEvent::GatewayFailed {
                        iteration: iterations,
                        error: error.to_string(),
                    });
                    break RunOutcome::Failed { error };
                }
            };

            let model = if response.model.is_empty() {
                self.config.model.as_str()
            } else {
                response.model.as_str()
            };
            usage.track(model, &response.usage);

            let Some(call) = response.tool_calls.first() else {
                let content = response.content.unwrap_or_default();
                info!(iteration = iterations, "Model response: {}", content);
                break RunOutcome::Completed { content };
            };

            if response.tool_calls.len() > 1 {
                debug!(
                    iteration = iterations,
                    dropped = response.tool_calls.len() - 1,
                    "only the first tool call is executed"
                );
            }

            if let Some(message) = self.dispatch(call, iterations, &mut memory) {
                break RunOutcome::Terminated { message };
            }
        };

        info!(
            outcome = outcome.label(),
            iterations,
            memory = memory.len(),
            tokens = usage.total_tokens(),
            "run finished"
        );
        self.sink.record(RunEvent::Finished {
            outcome: outcome.label(),
            iterations,
        });
        self.sink.flush();

        AgentRun {
            outcome,
            iterations,
            memory,
            usage,
        }
    }

    fn tool_schema(&self) -> Vec<ToolDefinition> {
        if self.config.tools.is_empty() {
            self.registry.definitions()
        } else {
            self.config.tools.clone()
        }
    }

    async fn complete(
        &self,
        memory: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<CompletionResponse, ProviderError> {
        let mut request = CompletionRequest::new(memory.compose(&self.config.rules))
            .with_model(self.config.model.clone())
            .with_max_tokens(self.config.max_tokens)
            .with_tools(tools.to_vec());
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        self.provider.complete(request).await
    }

    /// Execute one tool call. Returns the closing message when the call was
    /// `terminate`; otherwise the exchange is appended to memory.
    fn dispatch(
        &mut self,
        call: &ToolCall,
        iteration: usize,
        memory: &mut Conversation,
    ) -> Option<String> {
        let parsed = parse_arguments(&call.arguments);

        // terminate ends the run whether or not the registry carries it
        if call.name == Tool::Terminate.name() {
            let message = closing_message(parsed);
            self.registry.toolbox().terminate(&message);
            self.sink.record(RunEvent::Terminated {
                iteration,
                message: message.clone(),
            });
            return Some(message);
        }

        let tool = self.registry.resolve(&call.name);
        let (args, result) = match parsed {
            Ok(args) => {
                let result = self.registry.invoke(&tool, &args);
                (Value::Object(args), result)
            }
            Err(reason) => {
                let result = ToolResult::Error(ToolError::new(
                    tool.name(),
                    ErrorKind::InvalidArgument,
                    reason,
                ));
                (Value::String(call.arguments.clone()), result)
            }
        };

        memory.record_tool_exchange(tool.name(), &args, &result);
        self.sink.record(RunEvent::ToolDispatched {
            iteration,
            tool: tool.name().to_string(),
            arguments: args,
            summary: result.summary(),
            is_error: result.is_error(),
        });
        None
    }

    fn gateway_error(&self, err: ProviderError, iteration: usize) -> Error {
        Error::new(err.kind(), err.to_string())
            .with_operation("agent::complete")
            .with_context("iteration", iteration.to_string())
            .with_context("model", self.config.model.clone())
            .set_source(err)
    }
}

/// The `message` of a terminate call. Unreadable payloads end the run with
/// an empty message.
fn closing_message(parsed: Result<Arguments, String>) -> String {
    let args = match parsed {
        Ok(args) => args,
        Err(reason) => {
            warn!(reason = %reason, "ignoring terminate arguments");
            return String::new();
        }
    };
    match args.get("message") {
        None => String::new(),
        Some(Value::String(message)) => message.clone(),
        Some(other) => {
            warn!(value = %other, "terminate message is not a string");
            String::new()
        }
    }
}

/// Parse tool-call arguments. Empty text and `null` are an empty map.
pub fn parse_arguments(raw: &str) -> Result<Arguments, String> {
    if raw.trim().is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Arguments::new()),
        Ok(other) => Err(format!("tool arguments must be a JSON object, got: {}", other)),
        Err(e) => Err(format!("malformed tool arguments: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arguments() {
        assert!(parse_arguments("").unwrap().is_empty());
        assert!(parse_arguments("  null ").unwrap().is_empty());
        assert_eq!(
            parse_arguments(r#"{"file_name": "aapl.json"}"#).unwrap()["file_name"],
            "aapl.json"
        );
        assert!(parse_arguments("[1, 2]").unwrap_err().contains("JSON object"));
        assert!(parse_arguments("{oops").unwrap_err().starts_with("malformed tool arguments"));
    }

    #[test]
    fn test_closing_message() {
        let closing = |raw: &str| closing_message(parse_arguments(raw));
        assert_eq!(closing(r#"{"message": "done"}"#), "done");
        assert_eq!(closing("{}"), "");
        assert_eq!(closing(r#"{"message": 5}"#), "");
        assert_eq!(closing("{oops"), "");
    }

    #[test]
    fn test_outcome_labels() {
        assert!(RunOutcome::Completed { content: String::new() }.is_success());
        assert!(RunOutcome::Terminated { message: "done".into() }.is_success());
        assert!(!RunOutcome::Exhausted.is_success());
        assert_eq!(RunOutcome::Exhausted.label(), "exhausted");
        let failed = RunOutcome::Failed {
            error: Error::new(ErrorKind::NetworkFailed, "reset"),
        };
        assert!(!failed.is_success());
    }
}
