use crate::analysis::AggregateReport;
use std::collections::BTreeSet;
use std::fmt::Write as _;

const RULE: &str = "======================================================================";
const THIN: &str = "----------------------------------------------------------------------";

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "—".into())
}

/// Human-readable summary of one execution's aggregated statistics.
pub fn generate_summary(report: &AggregateReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "BENCHMARK RESULTS SUMMARY");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Configuration: {}", report.config_name);
    let _ = writeln!(out, "Config hash:   {}", report.config_hash);
    let _ = writeln!(out, "Total Runs:    {}", report.total_runs);
    let _ = writeln!(out, "Quizzes:       {}", report.quiz_ids.len());
    if report.skip_count > 0 {
        let _ = writeln!(out, "Skipped calls: {}", report.skip_count);
    }

    let metrics: BTreeSet<&str> = report.groups.iter().map(|g| g.metric_name.as_str()).collect();
    for metric in metrics {
        let _ = writeln!(out, "\n{}", metric.to_uppercase());
        let _ = writeln!(out, "{}", THIN);
        for g in report.groups.iter().filter(|g| g.metric_name == metric) {
            let _ = writeln!(out, "\n  Evaluator: {}", g.evaluator_id);
            if g.n == 0 {
                let _ = writeln!(out, "    No data (all evaluations skipped)");
                continue;
            }
            let _ = writeln!(out, "    Mean:    {}", fmt_opt(g.mean));
            let _ = writeln!(out, "    Median:  {}", fmt_opt(g.median));
            let _ = writeln!(out, "    Std Dev: {}", fmt_opt(g.std_dev));
            let _ = writeln!(out, "    Min:     {}", fmt_opt(g.min));
            let _ = writeln!(out, "    Max:     {}", fmt_opt(g.max));
            let _ = writeln!(out, "    N:       {}", g.n);
        }
    }

    let _ = writeln!(out, "\n{}", RULE);
    out
}

/// Side-by-side evaluator comparison for one metric.
pub fn generate_comparison(report: &AggregateReport, metric_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Evaluator comparison for '{}'", metric_name);
    let _ = writeln!(out, "{}", THIN);
    let _ = writeln!(
        out,
        "{:<20} {:>8} {:>8} {:>8} {:>8} {:>8} {:>6}",
        "Evaluator", "Mean", "Median", "StdDev", "Min", "Max", "N"
    );
    for g in report.groups.iter().filter(|g| g.metric_name == metric_name) {
        let _ = writeln!(
            out,
            "{:<20} {:>8} {:>8} {:>8} {:>8} {:>8} {:>6}",
            g.evaluator_id,
            fmt_opt(g.mean),
            fmt_opt(g.median),
            fmt_opt(g.std_dev),
            fmt_opt(g.min),
            fmt_opt(g.max),
            g.n
        );
    }
    out
}
