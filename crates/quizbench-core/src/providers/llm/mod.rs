pub mod anthropic;
pub mod fake;
pub mod ollama;
pub mod openai;

use crate::errors::EvaluatorError;
use crate::model::Params;
use async_trait::async_trait;

/// Sampling configuration for one generate call. Defaults come from the
/// evaluator's configuration; `extra` is passed through verbatim to the
/// backend where the wire format has a place for it.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub extra: Params,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 500,
            extra: Params::new(),
        }
    }
}

/// Identity used to tag every result produced through this evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorIdentity {
    pub evaluator_id: String,
    pub model: String,
}

/// Uniform text-generation contract over one LLM backend.
///
/// Deterministic behavior is expected at temperature 0 but not guaranteed;
/// the orchestration and aggregation layers are what make reported
/// statistics robust to the residual non-determinism.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn generate(&self, prompt: &str, opts: &GenerateOptions)
        -> Result<String, EvaluatorError>;

    fn identity(&self) -> EvaluatorIdentity;
}
