use crate::errors::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Params = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
        }
    }
}

/// Single value for single_choice/true_false, a set of values for
/// multiple_choice. The untagged serde form matches the quiz JSON files,
/// where the field is either a string or a list of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    Single(String),
    Multiple(Vec<String>),
}

impl CorrectAnswer {
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question_id: String,
    pub question_type: QuestionType,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: CorrectAnswer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
    #[serde(default)]
    pub metadata: Params,
}

impl QuizQuestion {
    /// Structural invariants: answer shape matches the question type,
    /// answers are a subset of the options, true/false options are the
    /// literal pair.
    pub fn validate(&self) -> Result<(), ModelError> {
        match (self.question_type, &self.correct_answer) {
            (QuestionType::MultipleChoice, CorrectAnswer::Single(_)) => {
                return Err(ModelError::ExpectedAnswerList {
                    question_id: self.question_id.clone(),
                })
            }
            (QuestionType::SingleChoice | QuestionType::TrueFalse, CorrectAnswer::Multiple(_)) => {
                return Err(ModelError::ExpectedSingleAnswer {
                    question_id: self.question_id.clone(),
                    question_type: self.question_type.as_str().to_string(),
                })
            }
            _ => {}
        }

        if self.question_type == QuestionType::TrueFalse && self.options != ["True", "False"] {
            return Err(ModelError::BadTrueFalseOptions {
                question_id: self.question_id.clone(),
            });
        }

        for answer in self.correct_answer.values() {
            if !self.options.iter().any(|o| o == answer) {
                return Err(ModelError::AnswerNotInOptions {
                    question_id: self.question_id.clone(),
                    answer: answer.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub title: String,
    pub source_material: String,
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub metadata: Params,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = std::collections::HashSet::new();
        for q in &self.questions {
            if !seen.insert(q.question_id.as_str()) {
                return Err(ModelError::DuplicateQuestionId {
                    quiz_id: self.quiz_id.clone(),
                    question_id: q.question_id.clone(),
                });
            }
            q.validate()?;
        }
        Ok(())
    }

    pub fn question_by_id(&self, question_id: &str) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.question_id == question_id)
    }

    pub fn num_questions(&self) -> usize {
        self.questions.len()
    }
}

/// One scalar judgment. Created exactly once per successful
/// (run, quiz, metric, evaluator[, question]) combination, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metric_name: String,
    pub metric_version: String,
    pub evaluator_id: String,
    pub quiz_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub parameters: Params,
    pub raw_response: String,
    pub evaluated_at: DateTime<Utc>,
}

/// Why a combination produced no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    RetriesExhausted { attempts: u32, last_error: String },
    ParseFailure { detail: String },
    PromptFailure { detail: String },
}

/// A combination that failed after exhausting retries. Excluded from
/// aggregated scores, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRecord {
    pub run_number: u32,
    pub quiz_id: String,
    pub metric_name: String,
    pub evaluator_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// One full sweep of quizzes x metrics x evaluators at a repetition index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_number: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub results: Vec<EvaluationResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(qtype: QuestionType, answer: CorrectAnswer, options: &[&str]) -> QuizQuestion {
        QuizQuestion {
            question_id: "q1".into(),
            question_type: qtype,
            question_text: "What is photosynthesis?".into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: answer,
            source_reference: None,
            metadata: Params::new(),
        }
    }

    #[test]
    fn single_choice_answer_must_be_an_option() {
        let q = question(
            QuestionType::SingleChoice,
            CorrectAnswer::Single("Delta".into()),
            &["Alpha", "Beta", "Gamma"],
        );
        assert!(matches!(
            q.validate(),
            Err(ModelError::AnswerNotInOptions { .. })
        ));
    }

    #[test]
    fn multiple_choice_requires_answer_list() {
        let q = question(
            QuestionType::MultipleChoice,
            CorrectAnswer::Single("Alpha".into()),
            &["Alpha", "Beta"],
        );
        assert!(matches!(
            q.validate(),
            Err(ModelError::ExpectedAnswerList { .. })
        ));
    }

    #[test]
    fn multiple_choice_answers_subset_of_options() {
        let ok = question(
            QuestionType::MultipleChoice,
            CorrectAnswer::Multiple(vec!["Alpha".into(), "Beta".into()]),
            &["Alpha", "Beta", "Gamma"],
        );
        assert!(ok.validate().is_ok());

        let bad = question(
            QuestionType::MultipleChoice,
            CorrectAnswer::Multiple(vec!["Alpha".into(), "Omega".into()]),
            &["Alpha", "Beta"],
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn true_false_options_are_literal_pair() {
        let ok = question(
            QuestionType::TrueFalse,
            CorrectAnswer::Single("True".into()),
            &["True", "False"],
        );
        assert!(ok.validate().is_ok());

        let bad = question(
            QuestionType::TrueFalse,
            CorrectAnswer::Single("Yes".into()),
            &["Yes", "No"],
        );
        assert!(matches!(
            bad.validate(),
            Err(ModelError::BadTrueFalseOptions { .. })
        ));
    }

    #[test]
    fn quiz_rejects_duplicate_question_ids() {
        let q = question(
            QuestionType::SingleChoice,
            CorrectAnswer::Single("Alpha".into()),
            &["Alpha", "Beta"],
        );
        let quiz = Quiz {
            quiz_id: "quiz-1".into(),
            title: "Biology".into(),
            source_material: "bio.md".into(),
            questions: vec![q.clone(), q],
            metadata: Params::new(),
            created_at: Utc::now(),
        };
        assert!(matches!(
            quiz.validate(),
            Err(ModelError::DuplicateQuestionId { .. })
        ));
    }

    #[test]
    fn question_type_deserializes_snake_case() {
        let qt: QuestionType = serde_json::from_str("\"multiple_choice\"").unwrap();
        assert_eq!(qt, QuestionType::MultipleChoice);
    }

    #[test]
    fn correct_answer_accepts_string_or_list() {
        let single: CorrectAnswer = serde_json::from_str("\"Alpha\"").unwrap();
        assert_eq!(single, CorrectAnswer::Single("Alpha".into()));
        let multi: CorrectAnswer = serde_json::from_str("[\"Alpha\", \"Beta\"]").unwrap();
        assert_eq!(
            multi,
            CorrectAnswer::Multiple(vec!["Alpha".into(), "Beta".into()])
        );
    }
}
