//! CLI command definitions for devloop.
//!
//! One subcommand: `run`, which drives a full code-generation loop for an
//! objective and renders the step events as they stream out of the engine.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use tracing::info;

use crate::llm::{GenClient, API_KEY_ENV, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::sandbox::ToolCommand;
use crate::workflow::{
    RunStatus, WorkflowConfig, WorkflowEngine, WorkflowState, DEFAULT_MAX_ITERATIONS,
};

/// Autonomous code-generation loop for LLM-written, test-verified code.
#[derive(Parser)]
#[command(name = "devloop")]
#[command(about = "Drive an LLM through a design-code-scan-test loop until the code passes")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the loop for an objective until tests pass or the retry budget
    /// is exhausted.
    Run(RunArgs),
}

/// Arguments for `devloop run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Natural-language objective for the generated code.
    pub objective: String,

    /// Existing source file to seed the loop with.
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Workspace directory for the generated artifacts.
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Model identifier for generation requests.
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the OpenAI-compatible backend.
    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Backend API key. When absent the run still starts and surfaces the
    /// missing credential through the workflow log.
    #[arg(long, env = API_KEY_ENV)]
    pub api_key: Option<String>,

    /// Cap on Developer retry cycles.
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: u32,

    /// Per-tool timeout in seconds.
    #[arg(long, default_value = "10")]
    pub timeout: u64,

    /// Test-runner command (target test file appended).
    #[arg(long, default_value = "pytest")]
    pub test_command: String,

    /// Vulnerability-scanner command (target source file appended).
    #[arg(long, default_value = "bandit -r -f txt")]
    pub scan_command: String,

    /// Run both tools inside this container via `docker exec` instead of on
    /// the host.
    #[arg(long)]
    pub container: Option<String>,

    /// Print step events as JSON lines instead of rendered logs.
    #[arg(long)]
    pub json: bool,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Dispatches a parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_workflow(args).await,
    }
}

async fn run_workflow(args: RunArgs) -> anyhow::Result<()> {
    let existing_code = match &args.source {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read source file {}", path.display()))?,
        ),
        None => None,
    };

    let mut test_command = ToolCommand::parse(&args.test_command)
        .context("Empty --test-command")?;
    let mut scan_command = ToolCommand::parse(&args.scan_command)
        .context("Empty --scan-command")?;
    if let Some(container) = &args.container {
        test_command = test_command.in_container(container);
        scan_command = scan_command.in_container(container);
    }

    let config = WorkflowConfig::new()
        .with_model(args.model)
        .with_max_iterations(args.max_iterations)
        .with_tool_timeout(Duration::from_secs(args.timeout))
        .with_workspace(&args.workspace)
        .with_test_command(test_command)
        .with_scan_command(scan_command);

    let client = GenClient::new(args.api_base, args.api_key, config.model.clone());
    let engine = WorkflowEngine::new(config, Arc::new(client));
    info!(run_id = %engine.run_id(), "Starting run");

    let initial = WorkflowState::new(args.objective, existing_code);
    let mut view = initial.clone();

    {
        let stream = engine.run(initial);
        futures::pin_mut!(stream);

        while let Some(event) = stream.next().await {
            let event = event.map_err(|e| {
                // The run is aborted; the log lines already streamed say why
                // the steps up to this point behaved as they did.
                anyhow::anyhow!("run aborted in node: {e}")
            })?;

            if args.json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                for line in &event.delta.logs {
                    println!("{line}");
                }
            }

            // Mirror the engine's merge so the final summary reflects the
            // cumulative state.
            view.apply(&event.delta);
        }
    }

    if !args.json {
        print_summary(&view);
    }

    Ok(())
}

fn print_summary(state: &WorkflowState) {
    println!();
    println!("=== Run summary ===");
    println!("status:     {}", status_label(state.status));
    println!("iterations: {}", state.iterations);
    println!("security:   {:?}", state.security_scan);
    if !state.security_report.is_empty() {
        println!();
        println!("{}", state.security_report);
    }
    if state.status != RunStatus::Success && !state.test_output.is_empty() {
        println!();
        println!("--- last test output ---");
        println!("{}", state.test_output);
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
        RunStatus::Error => "error",
    }
}
