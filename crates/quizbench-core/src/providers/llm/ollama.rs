use super::{Evaluator, EvaluatorIdentity, GenerateOptions};
use crate::errors::EvaluatorError;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local Ollama server. No auth; connection failures are transient (the
/// server may simply not be up yet).
pub struct OllamaEvaluator {
    pub evaluator_id: String,
    pub model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaEvaluator {
    pub fn new(evaluator_id: String, model: String) -> Self {
        Self {
            evaluator_id,
            model,
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
impl Evaluator for OllamaEvaluator {
    async fn generate(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, EvaluatorError> {
        let url = format!("{}/api/generate", self.base_url);

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": opts.temperature,
                "num_predict": opts.max_tokens,
            },
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EvaluatorError::Transient(format!("ollama request failed: {}", e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let text = resp.text().await.unwrap_or_default();
            return Err(EvaluatorError::from_status(status, "ollama", &text));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EvaluatorError::Protocol(format!("ollama response not JSON: {}", e)))?;

        json.get("response")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| EvaluatorError::Protocol("ollama response missing 'response'".into()))
    }

    fn identity(&self) -> EvaluatorIdentity {
        EvaluatorIdentity {
            evaluator_id: self.evaluator_id.clone(),
            model: self.model.clone(),
        }
    }
}
