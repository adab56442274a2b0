//! # fincraft CLI
//!
//! Command-line interface for the fincraft agent.
//!
//! Usage:
//!   fincraft run [--task <TASK>] [--max-iterations N] [--data-dir DIR]
//!   fincraft analyze [TASK] [-o FILE] [--model M] [--temperature T]
//!   fincraft tools
//!
//! Examples:
//!   fincraft run --task "Which files are available and what does aapl_balance_sheet.json say?"
//!   fincraft analyze "compute the debt-to-equity ratio from a balance sheet"
//!   fincraft -v run --max-iterations 3

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fincraft_agent::{
    Agent, AgentConfig, AgentFile, Analyst, RunOutcome, Settings, TracingSink,
};
use fincraft_error::Error;
use fincraft_llm::{parse_model, Gateway};
use fincraft_tools::{ToolRegistry, Toolbox};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code of a run that used up its iteration budget
const EXIT_EXHAUSTED: u8 = 2;

#[derive(Parser)]
#[command(name = "fincraft")]
#[command(author, version, about = "fincraft - a tool-using assistant for financial data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Agent file with the tool schema and rules
    #[arg(long, global = true, default_value = "config/agent.json")]
    agent_config: PathBuf,

    /// Settings file (model, limits, prompts)
    #[arg(long, global = true, default_value = "config/fincraft.toml")]
    settings: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a task with the tool-using agent
    Run {
        /// The task description (prompted for when omitted)
        #[arg(long)]
        task: Option<String>,

        /// Maximum reasoning iterations [default: 10, or [agent].max_iterations]
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_iterations: Option<u64>,

        /// Directory the tools read from [default: [agent].data_dir]
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Generate a Python function, README section and unit tests
    Analyze {
        /// What the function should do (prompted for when omitted)
        task: Option<String>,

        /// Output file for the code; the README goes next to it as .md
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Model to use, as provider/model
        #[arg(long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Print the built-in tool schema
    Tools,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,fincraft=debug" } else { "warn,fincraft=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Print `question` and read one line from stdin
fn prompt(question: &str) -> Result<String> {
    print!("{}: ", question);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;

    let answer = line.trim().to_string();
    if answer.is_empty() {
        bail!("no input given");
    }
    Ok(answer)
}

fn gateway(settings: &Settings, model: &str) -> Result<Gateway> {
    Gateway::from_model(
        model,
        settings.general.api_key.clone(),
        settings.general.base_url.clone(),
    )
    .with_context(|| format!("failed to set up model '{}'", model))
}

async fn run_task(
    cli: &Cli,
    task: Option<String>,
    max_iterations: Option<u64>,
    data_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let agent_file = AgentFile::load(&cli.agent_config)
        .with_context(|| format!("failed to load {}", cli.agent_config.display()))?;
    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("failed to load {}", cli.settings.display()))?;

    let (_, model) = parse_model(&settings.general.model)
        .with_context(|| format!("invalid model '{}'", settings.general.model))?;
    let mut config = AgentConfig::from_files(&agent_file, &settings, model);
    if let Some(n) = max_iterations {
        config = config.with_max_iterations(usize::try_from(n)?);
    }
    config.validate()?;

    let task = match task {
        Some(task) => task,
        None => prompt("What would you like me to do?")?,
    };

    let data_dir = data_dir.unwrap_or_else(|| settings.agent.data_dir.clone());
    let provider = gateway(&settings, &settings.general.model)?;
    let registry = ToolRegistry::new(Toolbox::new(data_dir));
    let sink = TracingSink::to_dir(&settings.agent.log_dir);

    let mut agent = Agent::new(provider, registry, config, sink);
    let run = agent.run(&task).await;

    if let Some(path) = agent.sink().log_path() {
        eprintln!("Log: {}", path.display());
    }

    match run.outcome {
        RunOutcome::Completed { content } => {
            println!("{}", content);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Terminated { message } => {
            println!("{}", message);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Exhausted => {
            eprintln!(
                "Stopped after {} iterations without a final answer.",
                run.iterations
            );
            Ok(ExitCode::from(EXIT_EXHAUSTED))
        }
        RunOutcome::Failed { error } => {
            eprintln!("{}", failure_report(&error));
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Text printed for a failed run; temporary gateway errors get a retry hint
fn failure_report(error: &Error) -> String {
    if error.is_retryable() {
        format!("Error: {}
The failure looks temporary; running again may succeed.", error)
    } else {
        format!("Error: {}", error)
    }
}

async fn analyze(
    cli: &Cli,
    task: Option<String>,
    output: Option<PathBuf>,
    model: Option<String>,
    temperature: Option<f32>,
) -> Result<ExitCode> {
    let settings = Settings::load(&cli.settings)
        .with_context(|| format!("failed to load {}", cli.settings.display()))?;

    let description = match task {
        Some(task) => task,
        None => prompt(
            "Please describe the function you want to create \
             (e.g., 'analyze the income statement for profitability ratios')",
        )?,
    };

    let model = model.unwrap_or_else(|| settings.general.model.clone());
    let (_, bare_model) =
        parse_model(&model).with_context(|| format!("invalid model '{}'", model))?;
    let provider = gateway(&settings, &model)?;

    let analyst = Analyst::new(&provider, settings.prompt.clone())
        .with_model(bare_model)
        .with_temperature(temperature.or(settings.general.temperature).unwrap_or(0.0))
        .with_max_tokens(settings.general.max_tokens);

    println!("\n=== Building your request to the model ===\n");
    let analysis = analyst.analyze(&description).await?;

    println!("\n=== Generated Function ===\n");
    println!("{}", analysis.function);
    println!("\n=== README Summary ===\n");
    println!("{}", analysis.readme);
    println!("\n=== Unit Tests ===\n");
    println!("{}", analysis.tests);

    let saved = analysis.save(&description, output.as_deref(), Path::new("."))?;
    println!("\nCode saved to: {}", saved.code.display());
    println!("Documentation saved to: {}", saved.readme.display());
    Ok(ExitCode::SUCCESS)
}

fn show_tools(cli: &Cli) -> Result<ExitCode> {
    let settings = Settings::load(&cli.settings)?;
    let registry = ToolRegistry::new(Toolbox::new(&settings.agent.data_dir));

    let tools: Vec<serde_json::Value> = registry
        .definitions()
        .into_iter()
        .map(|def| serde_json::json!({ "type": "function", "function": def }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "tools": tools }))?);
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Run {
            task,
            max_iterations,
            data_dir,
        } => run_task(&cli, task.clone(), *max_iterations, data_dir.clone()).await,
        Commands::Analyze {
            task,
            output,
            model,
            temperature,
        } => analyze(&cli, task.clone(), output.clone(), model.clone(), *temperature).await,
        Commands::Tools => show_tools(&cli),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fincraft_error::ErrorKind;

    #[test]
    fn test_failure_report_hints_at_retry() {
        let network = Error::new(ErrorKind::NetworkFailed, "connection reset")
            .with_operation("agent::complete");
        let report = failure_report(&network);
        assert!(report.starts_with("Error: NetworkFailed"));
        assert!(report.ends_with("running again may succeed."));

        let auth = Error::new(ErrorKind::AuthenticationFailed, "bad key");
        assert!(!failure_report(&auth).contains("running again"));
    }
}
