use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quizbench", about = "LLM quiz quality benchmark", version)]
pub struct Cli {
    /// Emit debug-level logs
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a benchmark configuration
    Run(RunArgs),
    /// Load and validate a configuration without calling any evaluator
    Validate(ValidateArgs),
    /// List the registered metrics
    ListMetrics,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "benchmark.yaml")]
    pub config: PathBuf,

    /// Attempts per evaluator call (retries only transient/protocol failures)
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Concurrent in-flight calls per evaluator; 1 keeps execution sequential
    #[arg(long, default_value_t = 1)]
    pub parallel: usize,

    /// Skip aggregation and the summary report
    #[arg(long)]
    pub no_aggregate: bool,

    /// Resolve configuration and load quizzes, then stop
    #[arg(long)]
    pub dry_run: bool,

    /// Override the results directory from the config
    #[arg(long)]
    pub results_dir: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "benchmark.yaml")]
    pub config: PathBuf,
}
