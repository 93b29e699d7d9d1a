use super::{Evaluator, EvaluatorIdentity, GenerateOptions};
use crate::errors::EvaluatorError;
use async_trait::async_trait;
use serde_json::json;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicEvaluator {
    pub evaluator_id: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicEvaluator {
    pub fn new(evaluator_id: String, model: String, api_key: String) -> Self {
        Self {
            evaluator_id,
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Evaluator for AnthropicEvaluator {
    async fn generate(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, EvaluatorError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": opts.max_tokens,
            "temperature": opts.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });
        for (k, v) in &opts.extra {
            body[k.as_str()] = v.clone();
        }

        let resp = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluatorError::Transient(format!("anthropic request failed: {}", e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            return Err(EvaluatorError::from_status(status, "anthropic", &text));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EvaluatorError::Protocol(format!("anthropic response not JSON: {}", e)))?;

        json.pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                EvaluatorError::Protocol("anthropic response missing content[0].text".into())
            })
    }

    fn identity(&self) -> EvaluatorIdentity {
        EvaluatorIdentity {
            evaluator_id: self.evaluator_id.clone(),
            model: self.model.clone(),
        }
    }
}
