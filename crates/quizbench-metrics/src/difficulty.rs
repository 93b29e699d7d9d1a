use crate::score_parse::parse_score_response;
use quizbench_core::errors::{MetricError, ParseError};
use quizbench_core::metrics_api::{param_str, Metric, MetricScope, ParameterSpec, PromptContext};
use serde_json::json;

const BLOOM_RUBRIC: &str = "\
Bloom's Taxonomy Levels:
1. Remember (0-20): Recall facts, terms, basic concepts
2. Understand (21-40): Explain ideas, construct meaning
3. Apply (41-60): Use information in new situations
4. Analyze (61-75): Draw connections, distinguish between parts
5. Evaluate (76-90): Justify decisions, critique
6. Create (91-100): Produce new work, design solutions";

const WEBB_RUBRIC: &str = "\
Webb's Depth of Knowledge:
1. Recall (0-25): Recall facts, definitions, simple procedures
2. Skill/Concept (26-50): Use information, make decisions
3. Strategic Thinking (51-75): Reasoning, planning, evidence
4. Extended Thinking (76-100): Complex reasoning, multiple steps";

/// Scores the cognitive difficulty of a single question for a target
/// audience, against a configurable rubric.
pub struct DifficultyMetric;

impl Metric for DifficultyMetric {
    fn name(&self) -> &'static str {
        "difficulty"
    }

    fn version(&self) -> &'static str {
        "1.0"
    }

    fn scope(&self) -> MetricScope {
        MetricScope::QuestionLevel
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec {
                name: "rubric",
                default: json!("bloom_taxonomy"),
                description: "Difficulty rubric to use (bloom_taxonomy, webb_dok, custom)",
            },
            ParameterSpec {
                name: "target_audience",
                default: json!("undergraduate"),
                description: "Target audience level (high_school, undergraduate, graduate)",
            },
        ]
    }

    fn build_prompt(&self, ctx: &PromptContext<'_>) -> Result<String, MetricError> {
        let question = ctx
            .question
            .ok_or_else(|| MetricError::MissingQuestion(self.name().into()))?;

        let specs = self.parameters();
        let rubric = param_str(&specs, ctx.params, "rubric");
        let target_audience = param_str(&specs, ctx.params, "target_audience");

        let rubric_description = match rubric.as_str() {
            "bloom_taxonomy" => BLOOM_RUBRIC,
            "webb_dok" => WEBB_RUBRIC,
            _ => "Evaluate difficulty on a scale from 0-100.",
        };

        let mut options = String::new();
        for (i, option) in question.options.iter().enumerate() {
            options.push_str(&format!("{}. {}\n", i + 1, option));
        }

        let answers = question.correct_answer.values().join(", ");

        Ok(format!(
            "Evaluate the difficulty of the following quiz question for a {audience} audience.\n\
             \n\
             {rubric}\n\
             \n\
             Question Type: {qtype}\n\
             Question: {text}\n\
             \n\
             Options:\n\
             {options}\n\
             Correct Answer: {answers}\n\
             \n\
             Provide a difficulty score from 0 to 100, where:\n\
             - 0-20: Very Easy\n\
             - 21-40: Easy\n\
             - 41-60: Moderate\n\
             - 61-80: Difficult\n\
             - 81-100: Very Difficult\n\
             \n\
             Consider:\n\
             1. Cognitive level required (based on the rubric above)\n\
             2. Complexity of the concept\n\
             3. Number of steps needed to solve\n\
             4. Potential for confusion\n\
             \n\
             Respond with ONLY a JSON object in this format:\n\
             {{\"score\": <number between 0 and 100>}}\n",
            audience = target_audience,
            rubric = rubric_description,
            qtype = question.question_type.as_str(),
            text = question.question_text,
            options = options,
            answers = answers,
        ))
    }

    fn parse_score(&self, raw: &str) -> Result<f64, ParseError> {
        parse_score_response(self.name(), raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbench_core::model::{CorrectAnswer, Params, QuestionType, QuizQuestion};
    use serde_json::json;

    fn question() -> QuizQuestion {
        QuizQuestion {
            question_id: "q1".into(),
            question_type: QuestionType::SingleChoice,
            question_text: "Which organelle hosts the Calvin cycle?".into(),
            options: vec!["Stroma".into(), "Thylakoid".into(), "Nucleus".into()],
            correct_answer: CorrectAnswer::Single("Stroma".into()),
            source_reference: None,
            metadata: Params::new(),
        }
    }

    #[test]
    fn prompt_is_pure() {
        let q = question();
        let params = Params::new();
        let ctx = PromptContext {
            question: Some(&q),
            quiz: None,
            source_text: None,
            params: &params,
        };
        let a = DifficultyMetric.build_prompt(&ctx).unwrap();
        let b = DifficultyMetric.build_prompt(&ctx).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_reflects_rubric_parameter() {
        let q = question();
        let mut params = Params::new();
        params.insert("rubric".into(), json!("webb_dok"));
        let ctx = PromptContext {
            question: Some(&q),
            quiz: None,
            source_text: None,
            params: &params,
        };
        let prompt = DifficultyMetric.build_prompt(&ctx).unwrap();
        assert!(prompt.contains("Webb's Depth of Knowledge"));
        assert!(!prompt.contains("Bloom's Taxonomy"));
        assert!(prompt.contains("undergraduate audience"));
        assert!(prompt.contains("Correct Answer: Stroma"));
    }

    #[test]
    fn missing_question_is_rejected() {
        let params = Params::new();
        let ctx = PromptContext {
            question: None,
            quiz: None,
            source_text: None,
            params: &params,
        };
        assert!(matches!(
            DifficultyMetric.build_prompt(&ctx),
            Err(MetricError::MissingQuestion(_))
        ));
    }

    #[test]
    fn unknown_parameter_fails_validation() {
        let mut params = Params::new();
        params.insert("audienc".into(), json!("graduate"));
        assert!(DifficultyMetric.validate_params(&params).is_err());
    }

    #[test]
    fn score_parsing_uses_shared_extraction() {
        assert_eq!(
            DifficultyMetric.parse_score(r#"{"score": 67}"#).unwrap(),
            67.0
        );
        assert!(DifficultyMetric.parse_score("hard to say").is_err());
    }
}
