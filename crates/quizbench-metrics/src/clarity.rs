use crate::score_parse::parse_score_response;
use quizbench_core::errors::{MetricError, ParseError};
use quizbench_core::metrics_api::{Metric, MetricScope, PromptContext};

/// Scores how clear, unambiguous and well-written a question and its answer
/// options are.
pub struct ClarityMetric;

impl Metric for ClarityMetric {
    fn name(&self) -> &'static str {
        "clarity"
    }

    fn version(&self) -> &'static str {
        "1.1"
    }

    fn scope(&self) -> MetricScope {
        MetricScope::QuestionLevel
    }

    fn build_prompt(&self, ctx: &PromptContext<'_>) -> Result<String, MetricError> {
        let question = ctx
            .question
            .ok_or_else(|| MetricError::MissingQuestion(self.name().into()))?;

        let options_text = question
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| format!("{}. {}", i + 1, option))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!(
            "Evaluate the clarity of the following quiz question.\n\
             \n\
             Question Type: {qtype}\n\
             Question: {text}\n\
             \n\
             Options:\n\
             {options}\n\
             \n\
             Provide a clarity score from 0 to 100, where:\n\
             - 0-20: Very Unclear (ambiguous, confusing, poorly written)\n\
             - 21-40: Unclear (some confusion, vague wording)\n\
             - 41-60: Moderately Clear (understandable but could improve)\n\
             - 61-80: Clear (well-written, minimal ambiguity)\n\
             - 81-100: Very Clear (precise, unambiguous, excellent)\n\
             \n\
             Consider:\n\
             1. Question Clarity:\n\
             \x20  - Is the question easy to understand?\n\
             \x20  - Is the wording precise and unambiguous?\n\
             \x20  - Is it free from grammatical errors?\n\
             \n\
             2. Answer Options:\n\
             \x20  - Are options clearly distinct?\n\
             \x20  - Is there no overlap or ambiguity between options?\n\
             \x20  - Are options of similar length and complexity?\n\
             \x20  - Are there no \"trick\" wordings?\n\
             \n\
             3. Overall Quality:\n\
             \x20  - Is the question professionally written?\n\
             \x20  - Would a student clearly understand what's being asked?\n\
             \x20  - Is there a single, clearly correct answer?\n\
             \n\
             Respond with ONLY a JSON object in this format:\n\
             {{\"score\": <number between 0 and 100>}}",
            qtype = question.question_type.as_str(),
            text = question.question_text,
            options = options_text,
        ))
    }

    fn parse_score(&self, raw: &str) -> Result<f64, ParseError> {
        parse_score_response(self.name(), raw)
    }
}
