//! `flowgraph` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check a workflow JSON file and print its execution order.
//! - `run`     : execute a workflow with the built-in node catalog.
//! - `nodes`   : list the built-in node types.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use engine::{ExecutorConfig, TracingObserver, Workflow, WorkflowExecutor};
use nodes::NodeRegistry;

#[derive(Parser)]
#[command(
    name = "flowgraph",
    about = "Run visual-editor workflow graphs from the command line",
    version
)]
struct Cli {
    #[command(flatten)]
    tuning: Tuning,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Tuning {
    /// Retries for nodes that fail with a retryable error.
    #[arg(long, global = true, env = "FLOWGRAPH_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Artificial delay before each node, in milliseconds.
    #[arg(long, global = true, env = "FLOWGRAPH_LATENCY_MS", default_value_t = 0)]
    latency_ms: u64,
}

impl Tuning {
    fn config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_retries: self.max_retries,
            simulated_latency: Duration::from_millis(self.latency_ms),
            ..ExecutorConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow and print the result as JSON.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// List the built-in node types.
    Nodes,
}

fn load_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    Workflow::from_json(&content).with_context(|| format!("invalid workflow JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let workflow = load_workflow(&path)?;
            match engine::validate_dag(&workflow) {
                Ok(order) => {
                    println!("✅ Workflow is valid. Execution order: {order:?}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Run { path } => {
            let workflow = load_workflow(&path)?;
            info!("Running workflow '{}' ({} nodes)", workflow.name, workflow.nodes.len());

            let executor = WorkflowExecutor::new(Arc::new(NodeRegistry::builtin()), cli.tuning.config())
                .with_observer(Arc::new(TracingObserver));

            match executor.execute_workflow(&workflow).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    error!("workflow failed: {e}");
                    eprintln!("❌ Execution failed: {e}");
                    eprintln!("{}", serde_json::to_string_pretty(&executor.logs())?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Nodes => {
            for descriptor in NodeRegistry::builtin().iter() {
                println!(
                    "{:<16} {:<14} in={:<5} out={}",
                    descriptor.type_tag, descriptor.category, descriptor.has_input, descriptor.has_output
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
