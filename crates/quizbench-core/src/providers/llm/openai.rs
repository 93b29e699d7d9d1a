use super::{Evaluator, EvaluatorIdentity, GenerateOptions};
use crate::errors::EvaluatorError;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client. With a custom `base_url` this also covers
/// OpenAI-compatible servers (Azure-style gateways, LM Studio, vLLM).
pub struct OpenAiEvaluator {
    pub evaluator_id: String,
    pub model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiEvaluator {
    pub fn new(evaluator_id: String, model: String, api_key: String) -> Self {
        Self {
            evaluator_id,
            model,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Evaluator for OpenAiEvaluator {
    async fn generate(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, EvaluatorError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": opts.temperature,
            "max_tokens": opts.max_tokens,
        });
        for (k, v) in &opts.extra {
            body[k.as_str()] = v.clone();
        }

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluatorError::Transient(format!("openai request failed: {}", e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            return Err(EvaluatorError::from_status(status, "openai", &text));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EvaluatorError::Protocol(format!("openai response not JSON: {}", e)))?;

        json.pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| {
                EvaluatorError::Protocol("openai response missing choices[0].message.content".into())
            })
    }

    fn identity(&self) -> EvaluatorIdentity {
        EvaluatorIdentity {
            evaluator_id: self.evaluator_id.clone(),
            model: self.model.clone(),
        }
    }
}
