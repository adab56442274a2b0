//! Run sinks
//!
//! The agent reports what happens during a run to a [`RunSink`] it is
//! given at construction. A sink is initialized once when the run starts,
//! receives every [`RunEvent`] in order, and is flushed once when the run
//! ends.

use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn, Dispatch};

/// Something observable that happened during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        task: String,
        max_iterations: usize,
    },
    IterationStarted {
        iteration: usize,
    },
    ToolDispatched {
        iteration: usize,
        tool: String,
        arguments: Value,
        summary: String,
        is_error: bool,
    },
    Terminated {
        iteration: usize,
        message: String,
    },
    GatewayFailed {
        iteration: usize,
        error: String,
    },
    Finished {
        outcome: &'static str,
        iterations: usize,
    },
}

/// Receiver of a run's events
pub trait RunSink {
    fn init(&mut self, task: &str, max_iterations: usize);

    fn record(&mut self, event: RunEvent);

    fn flush(&mut self);
}

// ============================================================================
// Tracing sink
// ============================================================================

/// Number of `agent_*.log` files kept in a log directory
pub const KEEP_LOGS: usize = 5;

/// Emits events through `tracing`, and optionally into a per-run log file.
///
/// The file subscriber is scoped to the sink; nothing global is installed.
#[derive(Default)]
pub struct TracingSink {
    log_dir: Option<PathBuf>,
    file: Option<Arc<File>>,
    path: Option<PathBuf>,
    dispatch: Option<Dispatch>,
}

impl TracingSink {
    /// Events go to the current subscriber only
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write each run to `agent_<timestamp>.log` under `log_dir`
    pub fn to_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: Some(log_dir.into()),
            ..Self::default()
        }
    }

    /// Path of the current run's log file
    pub fn log_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn open_log(&mut self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = dir.join(format!("agent_{}.log", stamp));
        let file = Arc::new(File::create(&path)?);

        let subscriber = tracing_subscriber::fmt()
            .with_writer(Arc::clone(&file))
            .with_ansi(false)
            .with_target(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        self.dispatch = Some(Dispatch::new(subscriber));
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    fn emit(&self, event: &RunEvent) {
        emit(event);
        if let Some(dispatch) = &self.dispatch {
            tracing::dispatcher::with_default(dispatch, || emit(event));
        }
    }
}

impl RunSink for TracingSink {
    fn init(&mut self, _task: &str, _max_iterations: usize) {
        let Some(dir) = self.log_dir.clone() else {
            return;
        };
        if let Err(e) = self.open_log(&dir) {
            warn!(dir = %dir.display(), error = %e, "failed to open run log");
            return;
        }
        if let Some(path) = &self.path {
            info!("Logging initialized -> {}", path.display());
        }
        match prune_logs(&dir, KEEP_LOGS) {
            Ok(removed) if removed > 0 => debug!(removed, "pruned old run logs"),
            Ok(_) => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to prune run logs"),
        }
    }

    fn record(&mut self, event: RunEvent) {
        self.emit(&event);
    }

    fn flush(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                warn!(error = %e, "failed to sync run log");
            }
        }
        self.dispatch = None;
    }
}

fn emit(event: &RunEvent) {
    match event {
        RunEvent::Started { task, max_iterations } => {
            info!(max_iterations, "Agent initialized. Starting main loop...");
            info!("Task: {}", task);
        }
        RunEvent::IterationStarted { iteration } => {
            info!("--- Iteration {} ---", iteration);
        }
        RunEvent::ToolDispatched {
            iteration,
            tool,
            arguments,
            summary,
            is_error,
        } => {
            info!(iteration, "Executing tool: {} with args: {}", tool, arguments);
            if *is_error {
                warn!(iteration, tool = %tool, "Result: {}", summary);
            } else {
                info!(iteration, tool = %tool, "Result: {}", summary);
            }
        }
        RunEvent::Terminated { iteration, message } => {
            info!(iteration, "Termination message: {}", message);
        }
        RunEvent::GatewayFailed { iteration, error } => {
            error!(iteration, "Completion error: {}", error);
        }
        RunEvent::Finished { outcome, iterations } => {
            info!(outcome, iterations, "Agent finished execution.");
        }
    }
}

/// Keep the `keep` newest `agent_*.log` files in `dir`; returns how many
/// were removed.
pub fn prune_logs(dir: &Path, keep: usize) -> std::io::Result<usize> {
    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with("agent_") && name.ends_with(".log")) {
            continue;
        }
        let modified = entry.metadata()?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        logs.push((modified, entry.path()));
    }

    logs.sort_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

// ============================================================================
// Recording sink
// ============================================================================

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RunEvent>,
    pub inits: usize,
    pub flushes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunSink for RecordingSink {
    fn init(&mut self, _task: &str, _max_iterations: usize) {
        self.inits += 1;
    }

    fn record(&mut self, event: RunEvent) {
        self.events.push(event);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
