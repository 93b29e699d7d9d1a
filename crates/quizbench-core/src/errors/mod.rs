use std::fmt::{Display, Formatter};

/// Configuration fault detected before orchestration starts. Always fatal.
#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigError: {}", self.0)
    }
}
impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn unknown_metric(name: &str, version: &str, available: &[String]) -> Self {
        Self(format!(
            "unknown metric {}@{} (available: {})",
            name,
            version,
            available.join(", ")
        ))
    }

    pub fn unknown_provider(provider: &str, available: &[&str]) -> Self {
        Self(format!(
            "unknown provider type: {} (available: {})",
            provider,
            available.join(", ")
        ))
    }
}

/// Failure modes an evaluator backend signals to the engine.
///
/// The retry policy keys off these variants: `Transient` and `Protocol` are
/// retried up to the configured bound, `Auth` terminates the whole execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvaluatorError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("authentication failure: {0}")]
    Auth(String),
    #[error("protocol failure: {0}")]
    Protocol(String),
}

impl EvaluatorError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Protocol(_))
    }

    /// Map an HTTP status to the taxonomy. 2xx never lands here.
    pub fn from_status(status: u16, provider: &str, body: &str) -> Self {
        let detail = format!("{} returned {}: {}", provider, status, truncate(body, 200));
        match status {
            401 | 403 => Self::Auth(detail),
            408 | 429 => Self::Transient(detail),
            s if s >= 500 => Self::Transient(detail),
            _ => Self::Protocol(detail),
        }
    }
}

/// A metric could not recover a numeric score from the raw model reply.
///
/// Carries the metric identity and the offending text; the engine attaches
/// the quiz/question context before logging.
#[derive(Debug, Clone, thiserror::Error)]
#[error("metric '{metric}' could not parse a score from response: {snippet}")]
pub struct ParseError {
    pub metric: String,
    pub snippet: String,
    pub quiz_id: Option<String>,
    pub question_id: Option<String>,
}

impl ParseError {
    pub fn new(metric: &str, raw: &str) -> Self {
        Self {
            metric: metric.to_string(),
            snippet: truncate(raw, 200),
            quiz_id: None,
            question_id: None,
        }
    }

    pub fn with_context(mut self, quiz_id: &str, question_id: Option<&str>) -> Self {
        self.quiz_id = Some(quiz_id.to_string());
        self.question_id = question_id.map(String::from);
        self
    }
}

/// A metric was invoked with inputs its scope requires but did not receive.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricError {
    #[error("metric '{0}' requires a question")]
    MissingQuestion(String),
    #[error("metric '{0}' requires a quiz")]
    MissingQuiz(String),
    #[error("metric '{0}' requires source text")]
    MissingSource(String),
}

/// Quiz/question structural invariant violation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("quiz '{quiz_id}': duplicate question id '{question_id}'")]
    DuplicateQuestionId { quiz_id: String, question_id: String },
    #[error("question '{question_id}': correct answer '{answer}' is not among the options")]
    AnswerNotInOptions { question_id: String, answer: String },
    #[error("question '{question_id}': true/false questions must have options [\"True\", \"False\"]")]
    BadTrueFalseOptions { question_id: String },
    #[error("question '{question_id}': multiple choice requires a list of correct answers")]
    ExpectedAnswerList { question_id: String },
    #[error("question '{question_id}': {question_type} requires a single correct answer")]
    ExpectedSingleAnswer {
        question_id: String,
        question_type: String,
    },
}

/// Quiz or source material could not be read from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse quiz {path}: {detail}")]
    Parse { path: String, detail: String },
    #[error("invalid quiz {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: ModelError,
    },
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
