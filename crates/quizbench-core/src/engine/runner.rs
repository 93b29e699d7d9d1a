use super::retry::generate_with_retry;
use crate::analysis::{aggregate, AggregateReport};
use crate::config::ResolvedConfig;
use crate::errors::{ConfigError, EvaluatorError};
use crate::metrics_api::{Metric, MetricScope, PromptContext};
use crate::model::{EvaluationResult, Params, Quiz, RunRecord, SkipReason, SkipRecord};
use crate::providers::llm::{Evaluator, GenerateOptions};
use crate::report::{ExecutionStatus, RunArtifacts};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct RunPolicy {
    /// Attempts per evaluator call, counting the first one.
    pub max_attempts: u32,
    /// Base of the exponential backoff between attempts.
    pub backoff_base_ms: u64,
    /// Concurrent in-flight calls per evaluator. 1 keeps the whole execution
    /// a single sequential stream.
    pub parallel: usize,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 250,
            parallel: 1,
        }
    }
}

/// One (run, quiz, metric, evaluator[, question]) combination, owning every
/// handle a spawned task needs. `seq` is the declared-order position within
/// the run; results collected out of order are re-sorted by it.
struct Job {
    seq: usize,
    run_number: u32,
    quiz_idx: usize,
    question_idx: Option<usize>,
    metric: Arc<dyn Metric>,
    parameters: Params,
    evaluator_idx: usize,
    client: Arc<dyn Evaluator>,
    evaluator_id: String,
    options: GenerateOptions,
    quizzes: Arc<Vec<Quiz>>,
    sources: Arc<BTreeMap<String, String>>,
    max_attempts: u32,
    backoff_base_ms: u64,
}

enum Outcome {
    Scored(EvaluationResult),
    Skipped(SkipRecord),
    /// Auth failure: terminates the whole execution.
    Fatal(String),
}

/// Drives one benchmark execution over a resolved configuration.
///
/// Iteration order is the declared configuration order (runs, then quizzes,
/// then metrics, then questions, then evaluators); with `parallel = 1` and a
/// deterministic evaluator, two executions of the same configuration produce
/// identical result logs except for timestamps.
pub struct Runner {
    config: Arc<ResolvedConfig>,
    quizzes: Arc<Vec<Quiz>>,
    sources: Arc<BTreeMap<String, String>>,
    cancel: Arc<AtomicBool>,
    pub policy: RunPolicy,
}

impl Runner {
    pub fn new(
        config: ResolvedConfig,
        quizzes: Vec<Quiz>,
        sources: BTreeMap<String, String>,
        policy: RunPolicy,
    ) -> Self {
        Self {
            config: Arc::new(config),
            quizzes: Arc::new(quizzes),
            sources: Arc::new(sources),
            cancel: Arc::new(AtomicBool::new(false)),
            policy,
        }
    }

    /// Handle for whole-execution cancellation (e.g. wired to SIGINT).
    /// Setting it stops un-started combinations; everything already committed
    /// stays in the artifacts and the execution reports an abort.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run all repetitions and return the accumulated artifacts. Individual
    /// call failures degrade to skip records; an auth failure aborts the
    /// execution with everything committed so far preserved.
    pub async fn run(&self) -> Result<RunArtifacts, ConfigError> {
        if self.quizzes.is_empty() {
            return Err(ConfigError("no quizzes to evaluate".into()));
        }
        tracing::debug!(state = "running", config = %self.config.name, hash = %self.config.config_hash, "execution started");

        let mut runs = Vec::with_capacity(self.config.runs as usize);
        let mut skips = Vec::new();
        let mut abort: Option<String> = None;

        for run_number in 1..=self.config.runs {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!(run_number, "cancelled by operator");
                return Ok(self.artifacts(
                    ExecutionStatus::Aborted {
                        reason: "cancelled by operator".into(),
                        completed_runs: run_number - 1,
                    },
                    runs,
                    skips,
                ));
            }
            tracing::info!(run_number, total = self.config.runs, "starting run");
            let started_at = Utc::now();
            let jobs = self.enumerate_jobs(run_number);

            let outcomes = if self.policy.parallel <= 1 {
                execute_sequential(jobs, &self.cancel, &mut abort).await
            } else {
                execute_parallel(
                    &self.config,
                    self.policy.parallel,
                    jobs,
                    &self.cancel,
                    &mut abort,
                )
                .await
            };

            let mut results = Vec::new();
            for outcome in outcomes {
                match outcome {
                    Outcome::Scored(r) => results.push(r),
                    Outcome::Skipped(s) => skips.push(s),
                    Outcome::Fatal(_) => unreachable!("fatal outcomes drain into abort"),
                }
            }

            let record = RunRecord {
                run_number,
                started_at,
                completed_at: Utc::now(),
                results,
            };

            if let Some(reason) = &abort {
                tracing::error!(run_number, "execution aborted: {}", reason);
                if !record.results.is_empty() {
                    runs.push(record);
                }
                let completed_runs = run_number - 1;
                return Ok(self.artifacts(
                    ExecutionStatus::Aborted {
                        reason: reason.clone(),
                        completed_runs,
                    },
                    runs,
                    skips,
                ));
            }
            runs.push(record);
        }

        tracing::debug!(state = "completed", "execution finished");
        Ok(self.artifacts(ExecutionStatus::Completed, runs, skips))
    }

    /// Run plus aggregation in one step.
    pub async fn execute(&self) -> Result<(RunArtifacts, AggregateReport), ConfigError> {
        let artifacts = self.run().await?;
        tracing::debug!(state = "aggregating", "computing statistics");
        let report = aggregate(&artifacts, &self.config.name);
        Ok((artifacts, report))
    }

    fn artifacts(
        &self,
        status: ExecutionStatus,
        runs: Vec<RunRecord>,
        skips: Vec<SkipRecord>,
    ) -> RunArtifacts {
        RunArtifacts {
            benchmark_id: uuid::Uuid::new_v4().to_string(),
            config_name: self.config.name.clone(),
            config_hash: self.config.config_hash.clone(),
            status,
            runs,
            skips,
        }
    }

    fn enumerate_jobs(&self, run_number: u32) -> Vec<Job> {
        let mut jobs = Vec::new();
        let mut seq = 0;
        for (quiz_idx, quiz) in self.quizzes.iter().enumerate() {
            for rm in &self.config.metrics {
                let question_slots: Vec<Option<usize>> = match rm.instance.scope() {
                    MetricScope::QuestionLevel => (0..quiz.questions.len()).map(Some).collect(),
                    MetricScope::QuizLevel => vec![None],
                };
                for question_idx in question_slots {
                    for ev_id in &rm.config.evaluators {
                        let (evaluator_idx, resolved) = self
                            .config
                            .evaluators
                            .iter()
                            .enumerate()
                            .find(|(_, e)| e.config.id == *ev_id)
                            .expect("evaluator ids are checked at resolution");
                        jobs.push(Job {
                            seq,
                            run_number,
                            quiz_idx,
                            question_idx,
                            metric: rm.instance.clone(),
                            parameters: rm.config.parameters.clone(),
                            evaluator_idx,
                            client: resolved.client.clone(),
                            evaluator_id: resolved.config.id.clone(),
                            options: resolved.options.clone(),
                            quizzes: self.quizzes.clone(),
                            sources: self.sources.clone(),
                            max_attempts: self.policy.max_attempts,
                            backoff_base_ms: self.policy.backoff_base_ms,
                        });
                        seq += 1;
                    }
                }
            }
        }
        jobs
    }
}

async fn execute_sequential(
    jobs: Vec<Job>,
    cancel: &AtomicBool,
    abort: &mut Option<String>,
) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        if cancel.load(Ordering::SeqCst) {
            *abort = Some("cancelled by operator".into());
            break;
        }
        match evaluate_job(job).await {
            Outcome::Fatal(reason) => {
                *abort = Some(reason);
                break;
            }
            outcome => outcomes.push(outcome),
        }
    }
    outcomes
}

/// Concurrent execution of one run's combinations, bounded per evaluator.
/// The collector loop below is the single writer; submission order is
/// restored by sorting on `seq` before returning.
async fn execute_parallel(
    config: &ResolvedConfig,
    parallel: usize,
    jobs: Vec<Job>,
    cancel: &Arc<AtomicBool>,
    abort: &mut Option<String>,
) -> Vec<Outcome> {
    let semaphores: Vec<Arc<Semaphore>> = config
        .evaluators
        .iter()
        .map(|_| Arc::new(Semaphore::new(parallel)))
        .collect();
    let abort_flag = Arc::new(AtomicBool::new(false));

    let mut join_set = JoinSet::new();
    for job in jobs {
        let sem = semaphores[job.evaluator_idx].clone();
        let abort_flag = abort_flag.clone();
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let Ok(_permit) = sem.acquire_owned().await else {
                return None;
            };
            if abort_flag.load(Ordering::SeqCst) || cancel.load(Ordering::SeqCst) {
                return None;
            }
            let seq = job.seq;
            let outcome = evaluate_job(job).await;
            if matches!(outcome, Outcome::Fatal(_)) {
                abort_flag.store(true, Ordering::SeqCst);
            }
            Some((seq, outcome))
        });
    }

    let mut collected = Vec::new();
    while let Some(res) = join_set.join_next().await {
        match res {
            Ok(Some((_seq, Outcome::Fatal(reason)))) => {
                if abort.is_none() {
                    *abort = Some(reason);
                }
            }
            Ok(Some(entry)) => collected.push(entry),
            Ok(None) => {}
            Err(e) => tracing::error!("evaluation task panicked: {}", e),
        }
    }

    collected.sort_by_key(|(seq, _)| *seq);
    collected.into_iter().map(|(_, o)| o).collect()
}

async fn evaluate_job(job: Job) -> Outcome {
    let quiz = &job.quizzes[job.quiz_idx];
    let question = job.question_idx.map(|i| &quiz.questions[i]);
    let question_id = question.map(|q| q.question_id.clone());
    let source_text = job.sources.get(&quiz.quiz_id).map(String::as_str);

    let skip = |reason: SkipReason, raw: Option<String>| {
        Outcome::Skipped(SkipRecord {
            run_number: job.run_number,
            quiz_id: quiz.quiz_id.clone(),
            metric_name: job.metric.name().to_string(),
            evaluator_id: job.evaluator_id.clone(),
            question_id: question_id.clone(),
            reason,
            raw_response: raw,
        })
    };

    let ctx = PromptContext {
        question,
        quiz: Some(quiz),
        source_text,
        params: &job.parameters,
    };
    let prompt = match job.metric.build_prompt(&ctx) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(
                metric = job.metric.name(),
                quiz = %quiz.quiz_id,
                "cannot build prompt: {}", e
            );
            return skip(
                SkipReason::PromptFailure {
                    detail: e.to_string(),
                },
                None,
            );
        }
    };

    let raw = match generate_with_retry(
        job.client.as_ref(),
        &prompt,
        &job.options,
        job.max_attempts,
        job.backoff_base_ms,
    )
    .await
    {
        Ok((raw, _attempts)) => raw,
        Err((EvaluatorError::Auth(detail), _)) => {
            return Outcome::Fatal(format!("evaluator '{}': {}", job.evaluator_id, detail));
        }
        Err((e, attempts)) => {
            tracing::warn!(
                metric = job.metric.name(),
                evaluator = %job.evaluator_id,
                quiz = %quiz.quiz_id,
                attempts,
                "retries exhausted: {}", e
            );
            return skip(
                SkipReason::RetriesExhausted {
                    attempts,
                    last_error: e.to_string(),
                },
                None,
            );
        }
    };

    match job.metric.parse_score(&raw) {
        Ok(score) => Outcome::Scored(EvaluationResult {
            metric_name: job.metric.name().to_string(),
            metric_version: job.metric.version().to_string(),
            evaluator_id: job.evaluator_id.clone(),
            quiz_id: quiz.quiz_id.clone(),
            question_id,
            score,
            parameters: job.parameters.clone(),
            raw_response: raw,
            evaluated_at: Utc::now(),
        }),
        Err(e) => {
            let e = e.with_context(&quiz.quiz_id, question_id.as_deref());
            tracing::warn!(evaluator = %job.evaluator_id, "score parse failed: {}", e);
            skip(
                SkipReason::ParseFailure {
                    detail: e.to_string(),
                },
                Some(raw),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluatorConfig, MetricConfig, ResolvedEvaluator, ResolvedMetric};
    use crate::errors::{MetricError, ParseError};
    use crate::model::{CorrectAnswer, QuestionType, QuizQuestion};
    use crate::providers::llm::fake::FakeEvaluator;

    struct PlainScoreMetric {
        scope: MetricScope,
    }

    impl Metric for PlainScoreMetric {
        fn name(&self) -> &'static str {
            "plain_score"
        }
        fn version(&self) -> &'static str {
            "1.0"
        }
        fn scope(&self) -> MetricScope {
            self.scope
        }
        fn build_prompt(&self, ctx: &PromptContext<'_>) -> Result<String, MetricError> {
            match self.scope {
                MetricScope::QuestionLevel => {
                    let q = ctx
                        .question
                        .ok_or_else(|| MetricError::MissingQuestion(self.name().into()))?;
                    Ok(format!("Rate the question: {}", q.question_text))
                }
                MetricScope::QuizLevel => {
                    let quiz = ctx
                        .quiz
                        .ok_or_else(|| MetricError::MissingQuiz(self.name().into()))?;
                    Ok(format!("Rate the quiz: {}", quiz.title))
                }
            }
        }
        fn parse_score(&self, raw: &str) -> Result<f64, ParseError> {
            raw.trim()
                .parse::<f64>()
                .map(|s| s.clamp(0.0, 100.0))
                .map_err(|_| ParseError::new(self.name(), raw))
        }
    }

    fn sample_quiz() -> Quiz {
        Quiz {
            quiz_id: "bio-01".into(),
            title: "Photosynthesis".into(),
            source_material: "photosynthesis.md".into(),
            questions: vec![
                QuizQuestion {
                    question_id: "q1".into(),
                    question_type: QuestionType::SingleChoice,
                    question_text: "Where does the Calvin cycle occur?".into(),
                    options: vec!["Stroma".into(), "Thylakoid".into()],
                    correct_answer: CorrectAnswer::Single("Stroma".into()),
                    source_reference: None,
                    metadata: Params::new(),
                },
                QuizQuestion {
                    question_id: "q2".into(),
                    question_type: QuestionType::TrueFalse,
                    question_text: "Chlorophyll absorbs green light most strongly.".into(),
                    options: vec!["True".into(), "False".into()],
                    correct_answer: CorrectAnswer::Single("False".into()),
                    source_reference: None,
                    metadata: Params::new(),
                },
            ],
            metadata: Params::new(),
            created_at: Utc::now(),
        }
    }

    fn resolved(client: Arc<dyn Evaluator>, scope: MetricScope, runs: u32) -> ResolvedConfig {
        ResolvedConfig {
            name: "contract".into(),
            runs,
            config_hash: "0123456789abcdef".into(),
            evaluators: vec![ResolvedEvaluator {
                config: EvaluatorConfig {
                    id: "mock".into(),
                    provider: "fake".into(),
                    model: "fake-model".into(),
                    ..Default::default()
                },
                client,
                options: GenerateOptions::default(),
            }],
            metrics: vec![ResolvedMetric {
                config: MetricConfig {
                    name: "plain_score".into(),
                    version: "1.0".into(),
                    evaluators: vec!["mock".into()],
                    parameters: Params::new(),
                    enabled: true,
                },
                instance: Arc::new(PlainScoreMetric { scope }),
            }],
        }
    }

    fn runner(client: Arc<dyn Evaluator>, scope: MetricScope, runs: u32) -> Runner {
        Runner::new(
            resolved(client, scope, runs),
            vec![sample_quiz()],
            BTreeMap::new(),
            RunPolicy {
                backoff_base_ms: 0,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn three_runs_two_questions_yield_six_results() {
        let fake = Arc::new(FakeEvaluator::new("mock").with_response("75"));
        let r = runner(fake.clone(), MetricScope::QuestionLevel, 3);

        let artifacts = r.run().await.unwrap();
        assert!(artifacts.status.is_completed());
        assert_eq!(artifacts.runs.len(), 3);
        assert_eq!(artifacts.total_results(), 6);
        assert!(artifacts.skips.is_empty());
        for run in &artifacts.runs {
            assert_eq!(run.results.len(), 2);
            for res in &run.results {
                assert_eq!(res.score, 75.0);
                assert_eq!(res.evaluator_id, "mock");
                assert_eq!(res.raw_response, "75");
            }
        }
        // declared order: q1 before q2 in every run
        let first = &artifacts.runs[0].results;
        assert_eq!(first[0].question_id.as_deref(), Some("q1"));
        assert_eq!(first[1].question_id.as_deref(), Some("q2"));
        assert_eq!(fake.calls(), 6);
    }

    #[tokio::test]
    async fn quiz_level_metric_runs_once_per_quiz() {
        let fake = Arc::new(FakeEvaluator::new("mock").with_response("60"));
        let r = runner(fake.clone(), MetricScope::QuizLevel, 2);

        let artifacts = r.run().await.unwrap();
        assert_eq!(artifacts.total_results(), 2);
        for run in &artifacts.runs {
            assert_eq!(run.results.len(), 1);
            assert!(run.results[0].question_id.is_none());
        }
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_become_skips_not_zero_scores() {
        let fake = Arc::new(
            FakeEvaluator::new("mock")
                .failing_with(EvaluatorError::Transient("rate limited".into())),
        );
        let r = runner(fake.clone(), MetricScope::QuestionLevel, 3);

        let artifacts = r.run().await.unwrap();
        assert!(artifacts.status.is_completed());
        assert_eq!(artifacts.total_results(), 0);
        assert_eq!(artifacts.skips.len(), 6);
        for s in &artifacts.skips {
            assert!(matches!(
                s.reason,
                SkipReason::RetriesExhausted { attempts: 3, .. }
            ));
        }
        // 6 combinations x 3 attempts each
        assert_eq!(fake.calls(), 18);
    }

    #[tokio::test]
    async fn auth_failure_aborts_after_completed_runs() {
        // first run (2 calls) succeeds, run 2 fails on its first call
        let fake = Arc::new(FakeEvaluator::new("mock").auth_failing_after(2, "75"));
        let r = runner(fake, MetricScope::QuestionLevel, 3);

        let artifacts = r.run().await.unwrap();
        assert_eq!(
            artifacts.status,
            ExecutionStatus::Aborted {
                reason: "evaluator 'mock': scripted auth failure".into(),
                completed_runs: 1,
            }
        );
        assert_eq!(artifacts.runs.len(), 1);
        assert_eq!(artifacts.runs[0].run_number, 1);
        assert_eq!(artifacts.total_results(), 2);
    }

    #[tokio::test]
    async fn parse_failure_is_recorded_with_raw_response() {
        let fake = Arc::new(FakeEvaluator::new("mock").with_response("I cannot rate this."));
        let r = runner(fake, MetricScope::QuestionLevel, 1);

        let artifacts = r.run().await.unwrap();
        assert_eq!(artifacts.total_results(), 0);
        assert_eq!(artifacts.skips.len(), 2);
        let skip = &artifacts.skips[0];
        assert!(matches!(skip.reason, SkipReason::ParseFailure { .. }));
        assert_eq!(skip.raw_response.as_deref(), Some("I cannot rate this."));
    }

    #[tokio::test]
    async fn identical_configs_produce_identical_logs_modulo_timestamps() {
        let log = |artifacts: &RunArtifacts| -> Vec<(u32, String, String, Option<String>, String, String, String)> {
            artifacts
                .runs
                .iter()
                .flat_map(|run| {
                    run.results.iter().map(move |r| {
                        (
                            run.run_number,
                            r.quiz_id.clone(),
                            r.metric_name.clone(),
                            r.question_id.clone(),
                            r.evaluator_id.clone(),
                            format!("{}", r.score),
                            r.raw_response.clone(),
                        )
                    })
                })
                .collect()
        };

        let a = runner(
            Arc::new(FakeEvaluator::new("mock").with_response("42")),
            MetricScope::QuestionLevel,
            2,
        )
        .run()
        .await
        .unwrap();
        let b = runner(
            Arc::new(FakeEvaluator::new("mock").with_response("42")),
            MetricScope::QuestionLevel,
            2,
        )
        .run()
        .await
        .unwrap();

        assert_eq!(log(&a), log(&b));
        assert_eq!(a.config_hash, b.config_hash);

        let agg_a = crate::analysis::aggregate(&a, "contract");
        let agg_b = crate::analysis::aggregate(&b, "contract");
        assert_eq!(agg_a.groups, agg_b.groups);
        assert_eq!(agg_a.per_question, agg_b.per_question);
    }

    #[tokio::test]
    async fn cancellation_preserves_committed_results() {
        let fake = Arc::new(FakeEvaluator::new("mock").with_response("75"));
        let r = runner(fake, MetricScope::QuestionLevel, 3);
        r.cancellation_handle().store(true, Ordering::SeqCst);

        let artifacts = r.run().await.unwrap();
        assert_eq!(
            artifacts.status,
            ExecutionStatus::Aborted {
                reason: "cancelled by operator".into(),
                completed_runs: 0,
            }
        );
        assert!(artifacts.runs.is_empty());
    }

    #[tokio::test]
    async fn parallel_collection_restores_declared_order() {
        let fake = Arc::new(FakeEvaluator::new("mock").with_response("75"));
        let mut r = runner(fake, MetricScope::QuestionLevel, 2);
        r.policy.parallel = 4;

        let artifacts = r.run().await.unwrap();
        assert_eq!(artifacts.total_results(), 4);
        for run in &artifacts.runs {
            assert_eq!(run.results[0].question_id.as_deref(), Some("q1"));
            assert_eq!(run.results[1].question_id.as_deref(), Some("q2"));
        }
    }

    #[tokio::test]
    async fn empty_quiz_set_fails_before_running() {
        let fake: Arc<dyn Evaluator> = Arc::new(FakeEvaluator::new("mock"));
        let r = Runner::new(
            resolved(fake, MetricScope::QuestionLevel, 1),
            vec![],
            BTreeMap::new(),
            RunPolicy::default(),
        );
        let err = r.run().await.unwrap_err();
        assert!(err.0.contains("no quizzes"));
    }
}
