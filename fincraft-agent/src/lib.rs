//! # fincraft Agent
//!
//! The agent answers one task by looping over the model:
//! 1. The user's task seeds the conversation memory
//! 2. Static rules + memory go to the model together with the tool schema
//! 3. A tool call is executed and the request/result pair is remembered
//! 4. Plain text, a `terminate` call, or the iteration budget ends the run
//!
//! Tool failures go back to the model; gateway failures end the run.

mod agent;
pub mod analyst;
pub mod config;
mod memory;
pub mod sink;

pub use agent::{parse_arguments, Agent, AgentRun, RunOutcome};
pub use analyst::{Analysis, Analyst};
pub use config::{AgentConfig, AgentFile, Settings};
pub use memory::Conversation;
pub use sink::{RecordingSink, RunEvent, RunSink, TracingSink};
