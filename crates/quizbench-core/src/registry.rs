use crate::config::EvaluatorConfig;
use crate::errors::ConfigError;
use crate::metrics_api::Metric;
use crate::providers::llm::anthropic::AnthropicEvaluator;
use crate::providers::llm::fake::FakeEvaluator;
use crate::providers::llm::ollama::OllamaEvaluator;
use crate::providers::llm::openai::OpenAiEvaluator;
use crate::providers::llm::Evaluator;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type MetricCtor = fn() -> Arc<dyn Metric>;

/// Maps (name, version) to a metric constructor. Built once at process start
/// (see `quizbench-metrics::install_builtins`), read-only afterwards.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<(String, String), MetricCtor>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ctor: MetricCtor) {
        let instance = ctor();
        let key = (instance.name().to_string(), instance.version().to_string());
        self.metrics.insert(key, ctor);
    }

    pub fn get(&self, name: &str, version: &str) -> Option<MetricCtor> {
        self.metrics
            .get(&(name.to_string(), version.to_string()))
            .copied()
    }

    pub fn create(&self, name: &str, version: &str) -> Result<Arc<dyn Metric>, ConfigError> {
        self.get(name, version)
            .map(|ctor| ctor())
            .ok_or_else(|| ConfigError::unknown_metric(name, version, &self.names()))
    }

    /// Registered metrics as "name@version", sorted.
    pub fn names(&self) -> Vec<String> {
        self.metrics
            .keys()
            .map(|(n, v)| format!("{}@{}", n, v))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

const PROVIDERS: &[&str] = &["openai", "openai_compatible", "anthropic", "ollama", "fake"];

fn api_key_for(cfg: &EvaluatorConfig, default_env: &str) -> Result<String, ConfigError> {
    let var = cfg.api_key_env.as_deref().unwrap_or(default_env);
    std::env::var(var).map_err(|_| {
        ConfigError(format!(
            "evaluator '{}': environment variable {} must be set",
            cfg.id, var
        ))
    })
}

/// Construct the concrete client for one evaluator definition. All failures
/// here (unknown provider, missing key/base URL) happen at resolution time,
/// before any model call.
pub fn build_evaluator(cfg: &EvaluatorConfig) -> Result<Arc<dyn Evaluator>, ConfigError> {
    match cfg.provider.as_str() {
        "openai" => {
            let key = api_key_for(cfg, "OPENAI_API_KEY")?;
            let mut client = OpenAiEvaluator::new(cfg.id.clone(), cfg.model.clone(), key);
            if let Some(url) = &cfg.base_url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(client))
        }
        "openai_compatible" => {
            let url = cfg.base_url.clone().ok_or_else(|| {
                ConfigError(format!(
                    "evaluator '{}': openai_compatible requires base_url",
                    cfg.id
                ))
            })?;
            // Compatible servers often run without auth; empty key is fine.
            let key = cfg
                .api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
                .unwrap_or_default();
            Ok(Arc::new(
                OpenAiEvaluator::new(cfg.id.clone(), cfg.model.clone(), key).with_base_url(url),
            ))
        }
        "anthropic" => {
            let key = api_key_for(cfg, "ANTHROPIC_API_KEY")?;
            Ok(Arc::new(AnthropicEvaluator::new(
                cfg.id.clone(),
                cfg.model.clone(),
                key,
            )))
        }
        "ollama" => {
            let mut client = OllamaEvaluator::new(cfg.id.clone(), cfg.model.clone());
            if let Some(url) = &cfg.base_url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(client))
        }
        "fake" => Ok(Arc::new(FakeEvaluator::new(&cfg.id))),
        other => Err(ConfigError::unknown_provider(other, PROVIDERS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{MetricError, ParseError};
    use crate::metrics_api::{MetricScope, PromptContext};

    struct NullMetric;

    impl Metric for NullMetric {
        fn name(&self) -> &'static str {
            "null"
        }
        fn version(&self) -> &'static str {
            "1.0"
        }
        fn scope(&self) -> MetricScope {
            MetricScope::QuizLevel
        }
        fn build_prompt(&self, _ctx: &PromptContext<'_>) -> Result<String, MetricError> {
            Ok(String::new())
        }
        fn parse_score(&self, _raw: &str) -> Result<f64, ParseError> {
            Ok(0.0)
        }
    }

    fn null_metric() -> Arc<dyn Metric> {
        Arc::new(NullMetric)
    }

    #[test]
    fn lookup_is_keyed_by_name_and_version() {
        let mut reg = MetricRegistry::new();
        reg.register(null_metric);
        assert!(reg.create("null", "1.0").is_ok());
        assert!(reg.create("null", "2.0").is_err());
        assert!(reg.create("missing", "1.0").is_err());
    }

    #[test]
    fn unknown_metric_error_lists_available() {
        let mut reg = MetricRegistry::new();
        reg.register(null_metric);
        let err = reg.create("missing", "1.0").err().unwrap();
        assert!(err.0.contains("null@1.0"), "got: {}", err.0);
    }

    #[test]
    fn unknown_provider_is_config_error() {
        let cfg = EvaluatorConfig {
            id: "e1".into(),
            provider: "watson".into(),
            model: "m".into(),
            ..Default::default()
        };
        let err = build_evaluator(&cfg).err().unwrap();
        assert!(err.0.contains("unknown provider"));
    }

    #[test]
    fn fake_provider_needs_no_environment() {
        let cfg = EvaluatorConfig {
            id: "mock".into(),
            provider: "fake".into(),
            model: "fake-model".into(),
            ..Default::default()
        };
        let client = build_evaluator(&cfg).unwrap();
        assert_eq!(client.identity().evaluator_id, "mock");
    }
}
