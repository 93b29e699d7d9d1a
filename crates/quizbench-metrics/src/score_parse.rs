use quizbench_core::errors::ParseError;
use regex::Regex;
use std::sync::OnceLock;

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("static regex"))
}

fn fraction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*/\s*100").expect("static regex"))
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Strip markdown code fences so JSON extraction sees the payload.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end_matches('`').trim()
}

fn json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn score_from_json(value: &serde_json::Value) -> Option<f64> {
    for key in ["score", "final_score"] {
        if let Some(s) = value.get(key).and_then(|v| v.as_f64()) {
            return Some(s);
        }
    }
    None
}

/// Shared score extraction for the builtin metrics.
///
/// Tries, in order: a JSON object carrying "score"/"final_score", an
/// explicit `<n>/100` fraction, the first numeric token anywhere in the
/// text. Whatever is found is clamped into [0, 100]; text with no numeric
/// token at all is a `ParseError`.
pub(crate) fn parse_score_response(metric: &str, raw: &str) -> Result<f64, ParseError> {
    let text = strip_fences(raw);

    if let Some(slice) = json_slice(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(slice) {
            if let Some(score) = score_from_json(&value) {
                return Ok(clamp(score));
            }
        }
    }

    if let Some(cap) = fraction_re().captures(text) {
        if let Ok(score) = cap[1].parse::<f64>() {
            return Ok(clamp(score));
        }
    }

    if let Some(m) = number_re().find(text) {
        if let Ok(score) = m.as_str().parse::<f64>() {
            return Ok(clamp(score));
        }
    }

    Err(ParseError::new(metric, raw))
}
