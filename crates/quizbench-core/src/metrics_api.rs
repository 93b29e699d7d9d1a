use crate::errors::{ConfigError, MetricError, ParseError};
use crate::model::{Params, Quiz, QuizQuestion};

/// Scope at which a metric operates: once per question, or once per quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricScope {
    QuestionLevel,
    QuizLevel,
}

/// A configurable parameter a metric accepts. The default's JSON type doubles
/// as the expected type for validation.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub default: serde_json::Value,
    pub description: &'static str,
}

/// Inputs handed to `Metric::build_prompt`. Question is always present for
/// question-level metrics, quiz for quiz-level ones; source text may be
/// absent when the loader could not resolve the quiz's source material.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub question: Option<&'a QuizQuestion>,
    pub quiz: Option<&'a Quiz>,
    pub source_text: Option<&'a str>,
    pub params: &'a Params,
}

pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn scope(&self) -> MetricScope;

    fn parameters(&self) -> Vec<ParameterSpec> {
        Vec::new()
    }

    /// Build the evaluation prompt. Must be a pure function of the context.
    fn build_prompt(&self, ctx: &PromptContext<'_>) -> Result<String, MetricError>;

    /// Recover a numeric score in [0, 100] from the raw model reply.
    /// Out-of-range numbers are clamped, not rejected; text with no numeric
    /// token is a `ParseError`.
    fn parse_score(&self, raw: &str) -> Result<f64, ParseError>;

    /// Validate configured parameters against `parameters()`. Called once at
    /// configuration-resolution time, before any model call. The default
    /// rejects unknown keys and values whose JSON type differs from the
    /// declared default's; metrics with richer constraints override it.
    fn validate_params(&self, params: &Params) -> Result<(), ConfigError> {
        let specs = self.parameters();
        for (key, value) in params {
            let Some(spec) = specs.iter().find(|s| s.name == key) else {
                let expected: Vec<&str> = specs.iter().map(|s| s.name).collect();
                return Err(ConfigError(format!(
                    "unknown parameter '{}' for metric '{}' (expected: {})",
                    key,
                    self.name(),
                    expected.join(", ")
                )));
            };
            if json_type(value) != json_type(&spec.default) {
                return Err(ConfigError(format!(
                    "parameter '{}' for metric '{}' should be {}, got {}",
                    key,
                    self.name(),
                    json_type(&spec.default),
                    json_type(value)
                )));
            }
        }
        Ok(())
    }
}

fn json_type(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Configured value for `name`, else the declared default (Null when the
/// metric declares no such parameter).
pub fn param_value(specs: &[ParameterSpec], params: &Params, name: &str) -> serde_json::Value {
    if let Some(v) = params.get(name) {
        return v.clone();
    }
    specs
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.default.clone())
        .unwrap_or(serde_json::Value::Null)
}

pub fn param_str(specs: &[ParameterSpec], params: &Params, name: &str) -> String {
    param_value(specs, params, name)
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn param_bool(specs: &[ParameterSpec], params: &Params, name: &str) -> bool {
    param_value(specs, params, name).as_bool().unwrap_or(false)
}
