use super::{Evaluator, EvaluatorIdentity, GenerateOptions};
use crate::errors::EvaluatorError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

enum Script {
    Fixed(String),
    /// Responses consumed in order; the last one repeats once exhausted.
    Sequence(Mutex<Vec<String>>, String),
    Failing(EvaluatorError),
    /// Succeed for the first `n` calls, then fail with `Auth` forever.
    AuthAfter { n: u32, response: String },
}

/// Deterministic in-process evaluator for tests and dry runs.
pub struct FakeEvaluator {
    evaluator_id: String,
    model: String,
    script: Script,
    calls: AtomicU32,
}

impl FakeEvaluator {
    pub fn new(evaluator_id: &str) -> Self {
        Self {
            evaluator_id: evaluator_id.to_string(),
            model: "fake-model".to_string(),
            script: Script::Fixed("{\"score\": 75}".to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.script = Script::Fixed(response.to_string());
        self
    }

    pub fn with_responses(mut self, responses: Vec<String>) -> Self {
        let last = responses.last().cloned().unwrap_or_default();
        let mut queue = responses;
        queue.reverse();
        self.script = Script::Sequence(Mutex::new(queue), last);
        self
    }

    pub fn failing_with(mut self, err: EvaluatorError) -> Self {
        self.script = Script::Failing(err);
        self
    }

    pub fn auth_failing_after(mut self, n: u32, response: &str) -> Self {
        self.script = Script::AuthAfter {
            n,
            response: response.to_string(),
        };
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for FakeEvaluator {
    async fn generate(
        &self,
        _prompt: &str,
        _opts: &GenerateOptions,
    ) -> Result<String, EvaluatorError> {
        let call_no = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Fixed(text) => Ok(text.clone()),
            Script::Sequence(queue, last) => {
                let mut q = queue.lock().expect("fake evaluator script lock");
                Ok(q.pop().unwrap_or_else(|| last.clone()))
            }
            Script::Failing(err) => Err(err.clone()),
            Script::AuthAfter { n, response } => {
                if call_no < *n {
                    Ok(response.clone())
                } else {
                    Err(EvaluatorError::Auth("scripted auth failure".into()))
                }
            }
        }
    }

    fn identity(&self) -> EvaluatorIdentity {
        EvaluatorIdentity {
            evaluator_id: self.evaluator_id.clone(),
            model: self.model.clone(),
        }
    }
}
