//! Tool registry
//!
//! The model names tools by string. Names resolve to the closed [`Tool`] set
//! through an explicit map, and a name that is not registered resolves to
//! [`Tool::Unrecognized`] instead of failing.

use crate::fs::Toolbox;
use fincraft_error::{Error, ErrorKind};
use fincraft_llm::ToolDefinition;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Keyword arguments of a tool call
pub type Arguments = Map<String, Value>;

// ============================================================================
// Tools
// ============================================================================

/// A host-side function the model may request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tool {
    ListFiles,
    ReadStructuredFile,
    ReadTextFile,
    Terminate,
    /// A name the registry does not know
    Unrecognized(String),
}

impl Tool {
    /// Every built-in tool, in schema order
    pub const BUILTIN: [Tool; 4] = [
        Tool::ListFiles,
        Tool::ReadStructuredFile,
        Tool::ReadTextFile,
        Tool::Terminate,
    ];

    pub fn name(&self) -> &str {
        match self {
            Tool::ListFiles => "list_files",
            Tool::ReadStructuredFile => "read_structured_file",
            Tool::ReadTextFile => "read_text_file",
            Tool::Terminate => "terminate",
            Tool::Unrecognized(name) => name,
        }
    }

    /// Schema entry sent to the model; `None` for unrecognized names
    pub fn definition(&self) -> Option<ToolDefinition> {
        let file_name = |what: &str| {
            json!({
                "type": "object",
                "properties": {
                    "file_name": { "type": "string", "description": what }
                },
                "required": ["file_name"]
            })
        };

        let def = match self {
            Tool::ListFiles => ToolDefinition::new(
                "list_files",
                "List the financial data files available in the data directory.",
            ),
            Tool::ReadStructuredFile => ToolDefinition::new(
                "read_structured_file",
                "Read a JSON or CSV file from the data directory and return its parsed content.",
            )
            .with_parameters(file_name(
                "Name of a .json or .csv file, e.g. aapl_balance_sheet.json",
            )),
            Tool::ReadTextFile => ToolDefinition::new(
                "read_text_file",
                "Read a .txt or .md file from the data directory.",
            )
            .with_parameters(file_name("Name of a .txt or .md file")),
            Tool::Terminate => ToolDefinition::new(
                "terminate",
                "End the task and report a final summary to the user.",
            )
            .with_parameters(json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string", "description": "Summary for the user" }
                },
                "required": ["message"]
            })),
            Tool::Unrecognized(_) => return None,
        };
        Some(def)
    }
}

// ============================================================================
// Results
// ============================================================================

/// A recoverable failure reported back to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolError {
    pub tool: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(tool: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(tool: impl Into<String>, err: &Error) -> Self {
        Self::new(tool, err.kind(), err.message())
    }
}

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Ok(Value),
    Error(ToolError),
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// Shape stored in conversation memory
    pub fn to_value(&self) -> Value {
        match self {
            ToolResult::Ok(value) => json!({ "result": value }),
            ToolResult::Error(err) => json!({
                "error": err.message,
                "kind": err.kind.as_str(),
                "tool": err.tool,
            }),
        }
    }

    /// JSON text of [`ToolResult::to_value`]
    pub fn to_message(&self) -> String {
        self.to_value().to_string()
    }

    /// Short form for logs
    pub fn summary(&self) -> String {
        match self {
            ToolResult::Ok(Value::Array(items)) => format!("ok ({} items)", items.len()),
            ToolResult::Ok(Value::String(text)) => format!("ok ({} chars)", text.chars().count()),
            ToolResult::Ok(Value::Null) => "ok".to_string(),
            ToolResult::Ok(_) => "ok (object)".to_string(),
            ToolResult::Error(err) => format!("error [{}]: {}", err.kind, err.message),
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileParams {
    file_name: String,
}

#[derive(Debug, Deserialize)]
struct TerminateParams {
    #[serde(default)]
    message: String,
}

fn params<P: DeserializeOwned>(tool: &Tool, args: &Arguments) -> fincraft_error::Result<P> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|e| {
        Error::invalid_argument(format!("invalid arguments for {}: {}", tool.name(), e))
            .with_operation("tools::invoke")
            .with_context("tool", tool.name())
    })
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable name-to-tool map plus the toolbox that runs them
pub struct ToolRegistry {
    toolbox: Toolbox,
    tools: Vec<Tool>,
    by_name: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Register every built-in tool
    pub fn new(toolbox: Toolbox) -> Self {
        Self::with_tools(toolbox, Tool::BUILTIN)
    }

    /// Register a subset; unrecognized entries are ignored
    pub fn with_tools(toolbox: Toolbox, tools: impl IntoIterator<Item = Tool>) -> Self {
        let mut registered = Vec::new();
        let mut by_name = HashMap::new();
        for tool in tools {
            if matches!(tool, Tool::Unrecognized(_)) || by_name.contains_key(tool.name()) {
                continue;
            }
            by_name.insert(tool.name().to_string(), tool.clone());
            registered.push(tool);
        }
        Self {
            toolbox,
            tools: registered,
            by_name,
        }
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.by_name.get(name).cloned()
    }

    /// Like [`ToolRegistry::get`], falling back to [`Tool::Unrecognized`]
    pub fn resolve(&self, name: &str) -> Tool {
        self.get(name)
            .unwrap_or_else(|| Tool::Unrecognized(name.to_string()))
    }

    /// Schema of the registered tools
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().filter_map(Tool::definition).collect()
    }

    /// Run a tool. Errors and panics inside the tool come back as
    /// [`ToolResult::Error`]; nothing propagates.
    pub fn invoke(&self, tool: &Tool, args: &Arguments) -> ToolResult {
        if !self.tools.contains(tool) {
            let err = Error::unknown_tool(tool.name());
            return ToolResult::Error(ToolError::from_error(tool.name(), &err));
        }

        guarded(tool, || self.dispatch(tool, args))
    }

    fn dispatch(&self, tool: &Tool, args: &Arguments) -> fincraft_error::Result<Value> {
        match tool {
            Tool::ListFiles => {
                params::<NoParams>(tool, args)?;
                Ok(json!(self.toolbox.list_files()?))
            }
            Tool::ReadStructuredFile => {
                let p: FileParams = params(tool, args)?;
                self.toolbox.read_structured_file(&p.file_name)
            }
            Tool::ReadTextFile => {
                let p: FileParams = params(tool, args)?;
                Ok(Value::String(self.toolbox.read_text_file(&p.file_name)?))
            }
            Tool::Terminate => {
                let p: TerminateParams = params(tool, args)?;
                self.toolbox.terminate(&p.message);
                Ok(Value::Null)
            }
            Tool::Unrecognized(name) => Err(Error::unknown_tool(name.as_str())),
        }
    }
}

/// Run `f` on behalf of `tool`, turning errors and panics into
/// [`ToolResult::Error`].
fn guarded(tool: &Tool, f: impl FnOnce() -> fincraft_error::Result<Value>) -> ToolResult {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => ToolResult::Ok(value),
        Ok(Err(err)) => {
            warn!(tool = tool.name(), error = %err, "tool failed");
            ToolResult::Error(ToolError::from_error(tool.name(), &err))
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            warn!(tool = tool.name(), reason = %reason, "tool panicked");
            let err = Error::tool_failed(
                tool.name(),
                format!("tool {} panicked: {}", tool.name(), reason),
            );
            ToolResult::Error(ToolError::from_error(tool.name(), &err))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
