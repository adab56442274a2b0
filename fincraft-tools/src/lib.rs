//! # fincraft-tools
//!
//! Host-side tools the model may call while answering a task:
//!
//! - `list_files` lists the data directory
//! - `read_structured_file` parses `.json` and `.csv` files
//! - `read_text_file` reads `.txt` and `.md` files
//! - `terminate` closes the run with a summary
//!
//! Calls go through [`ToolRegistry::invoke`], which turns every failure
//! into a [`ToolResult::Error`] the model can read.

pub mod csv;
pub mod fs;
pub mod registry;

pub use fs::Toolbox;
pub use registry::{Arguments, Tool, ToolError, ToolRegistry, ToolResult};
