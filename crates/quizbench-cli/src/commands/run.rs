use crate::args::RunArgs;
use crate::exit_codes;
use chrono::Utc;
use quizbench_core::analysis::reporter;
use quizbench_core::config::{load_config, resolve};
use quizbench_core::engine::{RunPolicy, Runner};
use quizbench_core::errors::ConfigError;
use quizbench_core::loader::{load_all_quizzes, load_source_texts};
use quizbench_core::report::{json, ExecutionStatus};
use std::path::{Path, PathBuf};

pub async fn execute(args: RunArgs) -> anyhow::Result<i32> {
    let registry = quizbench_metrics::builtin_registry();

    let prepared = match prepare(&args, &registry) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let (runner, results_dir, config_name) = prepared;

    if args.dry_run {
        println!("configuration OK: {} (dry run, no evaluations)", config_name);
        return Ok(exit_codes::OK);
    }

    // Ctrl-C stops un-started evaluations; committed results are still
    // written and aggregated below.
    let cancel = runner.cancellation_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, finishing committed work...");
            cancel.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let artifacts = match runner.run().await {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    std::fs::create_dir_all(&results_dir)?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let results_path = results_dir.join(format!("results_{}.json", stamp));
    json::write_results(&artifacts, &results_path)?;
    tracing::info!(path = %results_path.display(), "wrote result log");

    if !args.no_aggregate {
        let report = quizbench_core::analysis::aggregate(&artifacts, &config_name);
        let aggregate_path = results_dir.join(format!("aggregated_{}.json", stamp));
        json::write_aggregate(&report, &aggregate_path)?;
        tracing::info!(path = %aggregate_path.display(), "wrote aggregate report");
        println!("{}", reporter::generate_summary(&report));
    }

    match &artifacts.status {
        ExecutionStatus::Completed => Ok(exit_codes::OK),
        ExecutionStatus::Aborted {
            reason,
            completed_runs,
        } => {
            eprintln!(
                "execution aborted after {} completed run(s): {}",
                completed_runs, reason
            );
            Ok(exit_codes::ABORTED)
        }
    }
}

fn prepare(
    args: &RunArgs,
    registry: &quizbench_core::registry::MetricRegistry,
) -> Result<(Runner, PathBuf, String), ConfigError> {
    let cfg = load_config(&args.config)?;
    let resolved = resolve(&cfg, registry)?;

    let quizzes = load_all_quizzes(Path::new(&cfg.input_output.quiz_directory))
        .map_err(|e| ConfigError(e.to_string()))?;
    let sources = load_source_texts(Path::new(&cfg.input_output.source_directory), &quizzes);

    let results_dir = args
        .results_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.input_output.results_directory));

    let policy = RunPolicy {
        max_attempts: args.max_attempts.max(1),
        parallel: args.parallel.max(1),
        ..Default::default()
    };
    let name = cfg.name.clone();
    Ok((Runner::new(resolved, quizzes, sources, policy), results_dir, name))
}
