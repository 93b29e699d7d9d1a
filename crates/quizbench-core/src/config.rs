use crate::errors::ConfigError;
use crate::fingerprint::sha256_hex;
use crate::metrics_api::Metric;
use crate::model::Params;
use crate::providers::llm::{Evaluator, GenerateOptions};
use crate::registry::{build_evaluator, MetricRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    500
}
fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub id: String,
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Environment variable holding the API key; provider-specific default
    /// when absent (OPENAI_API_KEY, ANTHROPIC_API_KEY).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub extra: Params,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            provider: String::new(),
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: None,
            base_url: None,
            extra: Params::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    pub version: String,
    /// Evaluator ids, in the order this metric should run them.
    pub evaluators: Vec<String>,
    #[serde(default)]
    pub parameters: Params,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputOutputConfig {
    pub quiz_directory: String,
    pub source_directory: String,
    pub results_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub name: String,
    pub version: u32,
    pub runs: u32,
    pub evaluators: Vec<EvaluatorConfig>,
    pub metrics: Vec<MetricConfig>,
    pub input_output: InputOutputConfig,
}

impl BenchmarkConfig {
    pub fn enabled_metrics(&self) -> impl Iterator<Item = &MetricConfig> {
        self.metrics.iter().filter(|m| m.enabled)
    }

    pub fn evaluator(&self, id: &str) -> Option<&EvaluatorConfig> {
        self.evaluators.iter().find(|e| e.id == id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs < 1 {
            return Err(ConfigError(format!(
                "number of runs must be at least 1, got {}",
                self.runs
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for ev in &self.evaluators {
            if !seen.insert(ev.id.as_str()) {
                return Err(ConfigError(format!("duplicate evaluator id '{}'", ev.id)));
            }
        }

        if self.enabled_metrics().next().is_none() {
            return Err(ConfigError("config has no enabled metrics".into()));
        }

        for metric in self.enabled_metrics() {
            if metric.evaluators.is_empty() {
                return Err(ConfigError(format!(
                    "metric '{}' lists no evaluators",
                    metric.name
                )));
            }
            for id in &metric.evaluators {
                if self.evaluator(id).is_none() {
                    return Err(ConfigError(format!(
                        "metric '{}' references unknown evaluator '{}'",
                        metric.name, id
                    )));
                }
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<BenchmarkConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    let cfg: BenchmarkConfig = serde_yaml::from_str(&raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Deterministic fingerprint of the resolved configuration, used to detect
/// drift between comparable executions. Sampling parameters are excluded on
/// purpose: two executions differing only in temperature still compare the
/// same metric/evaluator matrix.
pub fn config_hash(cfg: &BenchmarkConfig) -> String {
    let mut evaluator_ids: Vec<&str> = cfg.evaluators.iter().map(|e| e.id.as_str()).collect();
    evaluator_ids.sort_unstable();

    let metrics: Vec<String> = cfg
        .metrics
        .iter()
        .map(|m| format!("({},{},[{}])", m.name, m.version, m.evaluators.join(",")))
        .collect();

    let raw = format!(
        "{}|{}|{}|[{}]|[{}]",
        cfg.name,
        cfg.version,
        cfg.runs,
        evaluator_ids.join(","),
        metrics.join(",")
    );
    sha256_hex(&raw)[..16].to_string()
}

pub struct ResolvedEvaluator {
    pub config: EvaluatorConfig,
    pub client: Arc<dyn Evaluator>,
    pub options: GenerateOptions,
}

pub struct ResolvedMetric {
    pub config: MetricConfig,
    pub instance: Arc<dyn Metric>,
}

/// The in-memory form the engine consumes: metric and evaluator instances in
/// declared order, parameters validated, hash computed. Quizzes and source
/// texts are supplied separately by the loader.
pub struct ResolvedConfig {
    pub name: String,
    pub runs: u32,
    pub config_hash: String,
    pub evaluators: Vec<ResolvedEvaluator>,
    pub metrics: Vec<ResolvedMetric>,
}

impl ResolvedConfig {
    pub fn evaluator(&self, id: &str) -> Option<&ResolvedEvaluator> {
        self.evaluators.iter().find(|e| e.config.id == id)
    }
}

/// Fail-fast resolution: registry lookups, parameter validation and client
/// construction all happen here, before orchestration starts.
pub fn resolve(
    cfg: &BenchmarkConfig,
    registry: &MetricRegistry,
) -> Result<ResolvedConfig, ConfigError> {
    cfg.validate()?;

    let mut evaluators = Vec::with_capacity(cfg.evaluators.len());
    for ev_cfg in &cfg.evaluators {
        let client = build_evaluator(ev_cfg)?;
        tracing::info!(evaluator = %ev_cfg.id, model = %ev_cfg.model, "initialized evaluator");
        evaluators.push(ResolvedEvaluator {
            config: ev_cfg.clone(),
            client,
            options: GenerateOptions {
                temperature: ev_cfg.temperature,
                max_tokens: ev_cfg.max_tokens,
                extra: ev_cfg.extra.clone(),
            },
        });
    }

    let mut metrics = Vec::new();
    for m_cfg in cfg.enabled_metrics() {
        let instance = registry.create(&m_cfg.name, &m_cfg.version)?;
        instance.validate_params(&m_cfg.parameters)?;
        tracing::info!(metric = %m_cfg.name, version = %m_cfg.version, "initialized metric");
        metrics.push(ResolvedMetric {
            config: m_cfg.clone(),
            instance,
        });
    }

    Ok(ResolvedConfig {
        name: cfg.name.clone(),
        runs: cfg.runs,
        config_hash: config_hash(cfg),
        evaluators,
        metrics,
    })
}
