//! BiasLens CLI: run bias probe evaluations against AI systems, track them
//! against baselines, and print remediation guidance.

mod commands;

use biaslens_core::{BiasType, RecommendationMode};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use uuid::Uuid;

/// BiasLens: cognitive-bias diagnostics for AI systems
#[derive(Parser, Debug)]
#[command(name = "biaslens", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Data directory for evaluations and baselines (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Create and run an evaluation against a target system
    Evaluate {
        /// Name of the AI system under test
        #[arg(short, long)]
        target: String,
        /// Bias types to probe (comma separated). Defaults to the configured set.
        #[arg(long, value_delimiter = ',')]
        types: Vec<BiasType>,
        /// Trials per bias type (10-100)
        #[arg(short, long)]
        iterations: Option<u32>,
        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
        /// Stored baseline to classify against
        #[arg(short, long)]
        baseline: Option<String>,
    },
    /// Run several evaluations of one target concurrently
    Batch {
        #[arg(short, long)]
        target: String,
        /// Number of evaluations to run
        #[arg(short, long, default_value_t = 3)]
        count: u32,
        /// Base seed; evaluation `n` uses `seed + n`
        #[arg(long)]
        seed: Option<u64>,
        #[arg(short, long)]
        baseline: Option<String>,
    },
    /// Print ranked recommendations for a completed evaluation
    Recommend {
        id: Uuid,
        /// technical, simplified or both
        #[arg(short, long)]
        mode: Option<RecommendationMode>,
    },
    /// Manage baselines
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },
    /// Show the score trend and drift alerts for a target
    Trends {
        #[arg(short, long)]
        target: String,
        #[arg(short, long)]
        baseline: Option<String>,
        /// z-score above which a point is flagged as drift
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Print a report for a completed evaluation
    Report {
        id: Uuid,
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Summary)]
        format: ReportFormat,
    },
    /// Write an evaluation with its findings and recommendations to a file
    Export {
        id: Uuid,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long)]
        mode: Option<RecommendationMode>,
    },
    /// Load an exported evaluation into the data directory
    Import { file: PathBuf },
    /// List stored evaluations, newest first
    List {
        /// Only evaluations of this target
        #[arg(short, long)]
        target: Option<String>,
        /// Page size (1-100)
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Evaluations to skip
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
    },
    /// Show the findings of an evaluation
    Findings {
        id: Uuid,
        /// Only the finding for this bias type
        #[arg(short = 'T', long = "type")]
        bias_type: Option<BiasType>,
    },
    /// Delete an evaluation and its findings
    Delete { id: Uuid },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum BaselineAction {
    /// Build a baseline from completed evaluations
    Create {
        name: String,
        /// Evaluation ids to aggregate
        #[arg(required = true, num_args = 1..)]
        evaluations: Vec<Uuid>,
        #[arg(long)]
        green_max: Option<f64>,
        #[arg(long)]
        yellow_max: Option<f64>,
    },
    /// Show one baseline
    Show { name: String },
    /// List stored baselines
    List,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .biaslens/config.toml into the workspace
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Json,
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "biaslens", "biaslens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "biaslens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.data_dir).await
}
