use crate::score_parse::parse_score_response;
use quizbench_core::errors::{ConfigError, MetricError, ParseError};
use quizbench_core::metrics_api::{
    param_bool, param_str, Metric, MetricScope, ParameterSpec, PromptContext,
};
use quizbench_core::model::Params;
use serde_json::json;

const GRANULARITIES: &[&str] = &["detailed", "balanced", "broad"];

struct Weights {
    breadth: u32,
    depth: u32,
    balance: u32,
    critical: u32,
}

fn weights_for(granularity: &str) -> Weights {
    match granularity {
        "broad" => Weights {
            breadth: 40,
            depth: 20,
            balance: 20,
            critical: 20,
        },
        "detailed" => Weights {
            breadth: 20,
            depth: 40,
            balance: 20,
            critical: 20,
        },
        _ => Weights {
            breadth: 30,
            depth: 30,
            balance: 20,
            critical: 20,
        },
    }
}

fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn suffix_chars(s: &str, n: usize) -> &str {
    let len = s.chars().count();
    if len <= n {
        return s;
    }
    match s.char_indices().nth(len - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Deterministic representative sample of the source text: whole text when
/// short, otherwise fixed-size slices from the beginning, center and end.
/// The center slice is always taken from the midpoint so repeated runs see
/// the same sample.
fn sample_source_text(source_text: &str, total_chars: usize) -> String {
    let len = source_text.chars().count();
    if len <= total_chars {
        return source_text.to_string();
    }

    let intro = prefix_chars(source_text, 1200);
    let mid_start = (len - 1200) / 2;
    let mid: String = source_text.chars().skip(mid_start).take(1200).collect();
    let outro = suffix_chars(source_text, 1100);

    format!(
        "[BEGINNING OF SOURCE]\n{}\n\n[MIDDLE SECTION]\n{}\n\n[END OF SOURCE]\n{}",
        intro, mid, outro
    )
}

const EXAMPLE_BLOCK: &str = "\
--- EXAMPLE ---
**Source (excerpt)**: covers photosynthesis stages, limiting factors and pigments.
**Quiz**: 3 questions, all about the two reaction stages; nothing on limiting
factors or pigments.
**Scores**: breadth low (one topic cluster of three), depth good for the covered
cluster, balance poor, critical-concept coverage partial.
--- END EXAMPLE ---
";

/// Quiz-level metric: how well the quiz covers its source material, scored
/// as weighted breadth/depth/balance/critical sub-scores.
pub struct CoverageMetric;

impl Metric for CoverageMetric {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn version(&self) -> &'static str {
        "1.1"
    }

    fn scope(&self) -> MetricScope {
        MetricScope::QuizLevel
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec {
                name: "granularity",
                default: json!("balanced"),
                description: "Coverage granularity (detailed, balanced, broad)",
            },
            ParameterSpec {
                name: "use_example",
                default: json!(true),
                description: "Include an example in the prompt",
            },
        ]
    }

    fn validate_params(&self, params: &Params) -> Result<(), ConfigError> {
        // default type/unknown-key validation first
        let specs = self.parameters();
        for (key, value) in params {
            let Some(spec) = specs.iter().find(|s| s.name == key) else {
                return Err(ConfigError(format!(
                    "unknown parameter '{}' for metric '{}'",
                    key,
                    self.name()
                )));
            };
            let same_type = matches!(
                (value, &spec.default),
                (serde_json::Value::String(_), serde_json::Value::String(_))
                    | (serde_json::Value::Bool(_), serde_json::Value::Bool(_))
            );
            if !same_type {
                return Err(ConfigError(format!(
                    "parameter '{}' for metric '{}' has the wrong type",
                    key,
                    self.name()
                )));
            }
        }
        if let Some(g) = params.get("granularity").and_then(|v| v.as_str()) {
            if !GRANULARITIES.contains(&g) {
                return Err(ConfigError(format!(
                    "granularity must be one of {:?}, got '{}'",
                    GRANULARITIES, g
                )));
            }
        }
        Ok(())
    }

    fn build_prompt(&self, ctx: &PromptContext<'_>) -> Result<String, MetricError> {
        let quiz = ctx
            .quiz
            .ok_or_else(|| MetricError::MissingQuiz(self.name().into()))?;
        let source_text = ctx
            .source_text
            .ok_or_else(|| MetricError::MissingSource(self.name().into()))?;

        let specs = self.parameters();
        let granularity = param_str(&specs, ctx.params, "granularity");
        let use_example = param_bool(&specs, ctx.params, "use_example");
        let weights = weights_for(&granularity);

        let source_sample = sample_source_text(source_text, 3500);

        let mut quiz_summary = format!(
            "Title: {}\nTotal Questions: {}\n\n",
            quiz.title,
            quiz.num_questions()
        );
        for (i, q) in quiz.questions.iter().enumerate() {
            let mut text = prefix_chars(&q.question_text, 150).to_string();
            if q.question_text.chars().count() > 150 {
                text.push_str("...");
            }
            quiz_summary.push_str(&format!(
                "{}. [{}] {}\n",
                i + 1,
                q.question_type.as_str(),
                text
            ));
        }

        let example_block = if use_example { EXAMPLE_BLOCK } else { "" };

        Ok(format!(
            "Evaluate how well the following quiz covers its source material.\n\
             \n\
             SOURCE MATERIAL (sampled):\n\
             {source}\n\
             \n\
             QUIZ:\n\
             {quiz}\n\
             {example}\
             Score four aspects of coverage:\n\
             - breadth (0-{breadth}): how many of the source's topics the quiz touches\n\
             - depth (0-{depth}): how thoroughly the covered topics are examined\n\
             - balance (0-{balance}): whether attention is distributed like the source's\n\
             - critical (0-{critical}): whether the source's key concepts are tested\n\
             \n\
             **Required JSON Format**:\n\
             {{\n\
             \x20 \"topics_source\": [\"topic1\", \"topic2\", ...],\n\
             \x20 \"topics_covered\": [\"topic1\", ...],\n\
             \x20 \"reasoning\": \"Step-by-step explanation of scores\",\n\
             \x20 \"sub_scores\": {{\n\
             \x20   \"breadth\": <0-{breadth}>,\n\
             \x20   \"depth\": <0-{depth}>,\n\
             \x20   \"balance\": <0-{balance}>,\n\
             \x20   \"critical\": <0-{critical}>\n\
             \x20 }},\n\
             \x20 \"final_score\": <sum of sub_scores>\n\
             }}\n\
             \n\
             Respond with ONLY the JSON object, no other text.\n",
            source = source_sample,
            quiz = quiz_summary,
            example = example_block,
            breadth = weights.breadth,
            depth = weights.depth,
            balance = weights.balance,
            critical = weights.critical,
        ))
    }

    /// Prefers `final_score`, reconstructs it from `sub_scores` when absent,
    /// then falls back to the shared extraction.
    fn parse_score(&self, raw: &str) -> Result<f64, ParseError> {
        let text = raw.trim();
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if end > start {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[start..=end]) {
                    if let Some(score) = value.get("final_score").and_then(|v| v.as_f64()) {
                        return Ok(score.clamp(0.0, 100.0));
                    }
                    if let Some(subs) = value.get("sub_scores").and_then(|v| v.as_object()) {
                        let total: f64 = ["breadth", "depth", "balance", "critical"]
                            .iter()
                            .filter_map(|k| subs.get(*k).and_then(|v| v.as_f64()))
                            .sum();
                        if total > 0.0 {
                            return Ok(total.clamp(0.0, 100.0));
                        }
                    }
                }
            }
        }
        parse_score_response(self.name(), raw)
    }
}
