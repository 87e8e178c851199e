//! Veriflow CLI - verify, project, simulate and run workflow nets

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;

use veriflow::error::{FixSuggestion, VeriflowError};
use veriflow::net::simulate;
use veriflow::plugin::http::HttpCallPlugin;
use veriflow::plugin::ScriptedPlugin;
use veriflow::{
    CheckKind, Dag, EngineConfig, ExecutionContext, Executor, IntentSpec, MetricsCollector, Net,
    NodeStatus, PluginRegistry, TraceLog, Verifier, VerifierConfig,
};

#[derive(Parser)]
#[command(name = "veriflow")]
#[command(about = "Veriflow - Petri-net verified workflow execution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a net (or an intent spec compiled to a net)
    Validate {
        /// Path to a .json/.yaml net or intent document
        file: PathBuf,

        /// State bound for the exploration
        #[arg(short, long, default_value_t = 200)]
        k_bound: u64,

        /// Wall-clock deadline in milliseconds
        #[arg(short, long, default_value_t = 30_000)]
        max_time_ms: u64,

        /// Write the full report as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Project a net onto its executable DAG
    Project {
        /// Path to a .json/.yaml net or intent document
        file: PathBuf,

        /// Write the DAG as JSON to this path (stdout otherwise)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fire the net deterministically and print the trace
    Simulate {
        /// Path to a .json/.yaml net or intent document
        file: PathBuf,

        /// Step limit
        #[arg(short, long, default_value_t = 1000)]
        max_steps: usize,

        /// Write the trace as ND-JSON to this path
        #[arg(short, long)]
        trace: Option<PathBuf>,
    },

    /// Verify, project and execute with the built-in plugins
    Run {
        /// Path to a net, intent or DAG document
        file: PathBuf,

        /// Skip verification (DAG documents are never verified)
        #[arg(long)]
        skip_verify: bool,

        /// Deadline for the whole run in milliseconds (0 = none)
        #[arg(long, default_value_t = 0)]
        execution_timeout_ms: u64,

        /// Write the trace as ND-JSON to this path
        #[arg(short, long)]
        trace: Option<PathBuf>,

        /// Print the metrics snapshot after the run
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate {
            file,
            k_bound,
            max_time_ms,
            output,
        } => validate(&file, k_bound, max_time_ms, output.as_deref()),
        Commands::Project { file, output } => project_cmd(&file, output.as_deref()),
        Commands::Simulate {
            file,
            max_steps,
            trace,
        } => simulate_cmd(&file, max_steps, trace.as_deref()),
        Commands::Run {
            file,
            skip_verify,
            execution_timeout_ms,
            trace,
            metrics,
        } => run(&file, skip_verify, execution_timeout_ms, trace.as_deref(), metrics).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

/// What kind of document a file holds
enum Document {
    Net(Net),
    Intent(IntentSpec),
    Dag(Dag),
}

/// Sniff the document kind from its top-level keys
fn load_document(path: &Path) -> Result<Document, VeriflowError> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
        _ => serde_json::from_str(&raw)?,
    };
    let object = value.as_object();
    if object.map(|o| o.contains_key("steps")).unwrap_or(false) {
        Ok(Document::Intent(serde_json::from_value(value)?))
    } else if object.map(|o| o.contains_key("nodes")).unwrap_or(false) {
        Ok(Document::Dag(serde_json::from_value(value)?))
    } else {
        // The net loader re-checks against the schema
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Net::from_yaml_str(&raw),
            _ => Net::from_json_str(&raw),
        }
        .map(Document::Net)
    }
}

/// Load as a net, compiling intent documents on the way
fn load_net(path: &Path) -> Result<Net, VeriflowError> {
    match load_document(path)? {
        Document::Net(net) => Ok(net),
        Document::Intent(spec) => Ok(spec.build_net()?),
        Document::Dag(_) => Err(VeriflowError::other(
            "this command needs a net or intent document, not a DAG",
        )),
    }
}

fn validate(
    file: &Path,
    k_bound: u64,
    max_time_ms: u64,
    output: Option<&Path>,
) -> Result<(), VeriflowError> {
    let net = load_net(file)?;
    let config = VerifierConfig::new(k_bound, max_time_ms, CheckKind::all())?;
    let report = Verifier::new(config).verify(&net);

    if report.passed() {
        println!("{} {}", "✓".green(), report.render());
    } else {
        println!("{} {}", "✗".red(), report.render());
    }
    if let Some(path) = output {
        std::fs::write(path, report.to_json()?)?;
        println!("  report written to {}", path.display());
    }
    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn project_cmd(file: &Path, output: Option<&Path>) -> Result<(), VeriflowError> {
    let net = load_net(file)?;
    let dag = veriflow::project(&net)?;
    println!(
        "{} projected {} transitions into DAG '{}' (root: {})",
        "✓".green(),
        net.transitions.len(),
        dag.id.cyan(),
        dag.root_node.as_deref().unwrap_or("-")
    );
    let json = dag.to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!("  DAG written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn simulate_cmd(file: &Path, max_steps: usize, trace_out: Option<&Path>) -> Result<(), VeriflowError> {
    let net = load_net(file)?;
    let trace = TraceLog::new();
    let outcome = simulate(&net, max_steps, None, &trace);

    let verdict = if outcome.reached_terminal {
        "reached a terminal marking".green()
    } else if outcome.step_limit_hit {
        "hit the step limit".yellow()
    } else {
        "stuck with no enabled transition".red()
    };
    println!(
        "{} fired {} transition(s), {}",
        "→".cyan(),
        outcome.fired.len(),
        verdict
    );
    println!("  final marking: {}", outcome.final_marking);
    match trace_out {
        Some(path) => {
            std::fs::write(path, trace.to_ndjson())?;
            println!("  trace written to {}", path.display());
        }
        None => print!("{}", trace.to_ndjson()),
    }
    Ok(())
}

async fn run(
    file: &Path,
    skip_verify: bool,
    execution_timeout_ms: u64,
    trace_out: Option<&Path>,
    show_metrics: bool,
) -> Result<(), VeriflowError> {
    let dag = match load_document(file)? {
        Document::Dag(dag) => dag,
        Document::Net(net) => {
            if !skip_verify {
                verify_or_bail(&net)?;
            }
            veriflow::project(&net)?
        }
        Document::Intent(spec) => {
            let net = spec.build_net()?;
            if !skip_verify {
                verify_or_bail(&net)?;
            }
            veriflow::project(&net)?
        }
    };

    // Built-in plugins: real HTTP for http_call, echo for everything else
    let registry = Arc::new(PluginRegistry::new());
    registry
        .register(Arc::new(HttpCallPlugin::new()))
        .map_err(VeriflowError::from)?;
    let mut actions: Vec<String> = dag
        .nodes
        .iter()
        .flat_map(|n| {
            [
                Some(n.action.clone()),
                n.before_hook.clone(),
                n.after_hook.clone(),
            ]
        })
        .flatten()
        .filter(|a| a != "http_call")
        .collect();
    actions.sort_unstable();
    actions.dedup();
    registry
        .register(Arc::new(ScriptedPlugin::succeeding("pl_echo", actions)))
        .map_err(VeriflowError::from)?;

    let config = EngineConfig {
        execution_timeout_ms,
        ..Default::default()
    };
    let metrics = Arc::new(MetricsCollector::new());
    let executor = Executor::new(config, registry, Arc::clone(&metrics))?;
    let ctx = ExecutionContext::new();
    let trace = TraceLog::new();

    let summary = executor.execute(&dag, &ctx, &trace).await?;

    println!(
        "{} execution {}: {} succeeded, {} failed, {} skipped in {} ms",
        if summary.all_succeeded() {
            "✓".green()
        } else {
            "✗".red()
        },
        summary.execution_id.cyan(),
        summary.nodes_succeeded,
        summary.nodes_failed,
        summary.nodes_skipped,
        summary.duration_ms
    );
    for result in &summary.results {
        let mark = match result.status {
            NodeStatus::Success => "ok ".green(),
            NodeStatus::Failure => "err".red(),
            NodeStatus::Skipped => "skp".yellow(),
        };
        println!("  [{}] {} ({})", mark, result.node_id, result.result.message);
    }

    if let Some(path) = trace_out {
        std::fs::write(path, trace.to_ndjson())?;
        println!("  trace written to {}", path.display());
    }
    if show_metrics {
        println!(
            "{}",
            serde_json::to_string_pretty(&metrics.get_metrics_snapshot())?
        );
    }
    Ok(())
}

fn verify_or_bail(net: &Net) -> Result<(), VeriflowError> {
    let report = Verifier::default().verify(net);
    if !report.passed() {
        eprintln!("{}", report.render());
        return Err(VeriflowError::other(format!(
            "net '{}' failed verification; use --skip-verify to run anyway",
            net.net_id
        )));
    }
    Ok(())
}
