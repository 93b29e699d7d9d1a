use crate::analysis::stats;
use crate::report::RunArtifacts;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Statistics for one (metric, evaluator) group, or the finer per-question
/// split when `quiz_id`/`question_id` are set. A group whose every call was
/// skipped keeps `n = 0` and null statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStatistic {
    pub metric_name: String,
    pub evaluator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub n: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub scores: Vec<f64>,
}

impl AggregatedStatistic {
    fn from_scores(
        metric_name: String,
        evaluator_id: String,
        quiz_id: Option<String>,
        question_id: Option<String>,
        scores: Vec<f64>,
    ) -> Self {
        let min = scores.iter().copied().fold(None, |acc: Option<f64>, x| {
            Some(acc.map_or(x, |a| a.min(x)))
        });
        let max = scores.iter().copied().fold(None, |acc: Option<f64>, x| {
            Some(acc.map_or(x, |a| a.max(x)))
        });
        Self {
            metric_name,
            evaluator_id,
            quiz_id,
            question_id,
            n: scores.len(),
            mean: stats::mean(&scores),
            median: stats::median(&scores),
            std_dev: stats::population_std_dev(&scores),
            min,
            max,
            scores,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub config_name: String,
    pub config_hash: String,
    pub total_runs: u32,
    pub quiz_ids: Vec<String>,
    /// Coarse grouping by (metric_name, evaluator_id).
    pub groups: Vec<AggregatedStatistic>,
    /// Finer grouping by (metric_name, evaluator_id, quiz_id, question_id)
    /// for question-level metrics.
    pub per_question: Vec<AggregatedStatistic>,
    pub skip_count: usize,
}

impl AggregateReport {
    pub fn group(&self, metric_name: &str, evaluator_id: &str) -> Option<&AggregatedStatistic> {
        self.groups
            .iter()
            .find(|g| g.metric_name == metric_name && g.evaluator_id == evaluator_id)
    }
}

/// Pure, deterministic aggregation of one execution's result log. The log is
/// flattened and sorted by its stable keys (run_number, quiz_id, metric_name,
/// question_id, evaluator_id) before reducing, so append order never affects
/// the output. Groups seen only in the skip log are reported with n = 0.
pub fn aggregate(artifacts: &RunArtifacts, config_name: &str) -> AggregateReport {
    // (run, quiz, metric, question, evaluator) -> score
    let mut flat: Vec<(u32, &str, &str, Option<&str>, &str, f64)> = artifacts
        .runs
        .iter()
        .flat_map(|run| {
            run.results.iter().map(move |r| {
                (
                    run.run_number,
                    r.quiz_id.as_str(),
                    r.metric_name.as_str(),
                    r.question_id.as_deref(),
                    r.evaluator_id.as_str(),
                    r.score,
                )
            })
        })
        .collect();
    flat.sort_by(|a, b| (a.0, a.1, a.2, a.3, a.4).cmp(&(b.0, b.1, b.2, b.3, b.4)));

    let mut coarse: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    let mut fine: BTreeMap<(String, String, String, String), Vec<f64>> = BTreeMap::new();
    let mut quiz_ids: BTreeSet<String> = BTreeSet::new();

    for (_run, quiz_id, metric, question_id, evaluator, score) in &flat {
        quiz_ids.insert(quiz_id.to_string());
        coarse
            .entry((metric.to_string(), evaluator.to_string()))
            .or_default()
            .push(*score);
        if let Some(qid) = question_id {
            fine.entry((
                metric.to_string(),
                evaluator.to_string(),
                quiz_id.to_string(),
                qid.to_string(),
            ))
            .or_default()
            .push(*score);
        }
    }

    // Combinations that only ever skipped still get a group, with n = 0.
    for skip in &artifacts.skips {
        quiz_ids.insert(skip.quiz_id.clone());
        coarse
            .entry((skip.metric_name.clone(), skip.evaluator_id.clone()))
            .or_default();
        if let Some(qid) = &skip.question_id {
            fine.entry((
                skip.metric_name.clone(),
                skip.evaluator_id.clone(),
                skip.quiz_id.clone(),
                qid.clone(),
            ))
            .or_default();
        }
    }

    let groups = coarse
        .into_iter()
        .map(|((metric, evaluator), scores)| {
            AggregatedStatistic::from_scores(metric, evaluator, None, None, scores)
        })
        .collect();

    let per_question = fine
        .into_iter()
        .map(|((metric, evaluator, quiz, question), scores)| {
            AggregatedStatistic::from_scores(metric, evaluator, Some(quiz), Some(question), scores)
        })
        .collect();

    AggregateReport {
        config_name: config_name.to_string(),
        config_hash: artifacts.config_hash.clone(),
        total_runs: artifacts.runs.len() as u32,
        quiz_ids: quiz_ids.into_iter().collect(),
        groups,
        per_question,
        skip_count: artifacts.skips.len(),
    }
}
