use quizbench_core::metrics_api::Metric;
use quizbench_core::registry::MetricRegistry;
use std::sync::Arc;

mod clarity;
mod coverage;
mod difficulty;
mod score_parse;

pub use clarity::ClarityMetric;
pub use coverage::CoverageMetric;
pub use difficulty::DifficultyMetric;

fn difficulty() -> Arc<dyn Metric> {
    Arc::new(DifficultyMetric)
}
fn clarity() -> Arc<dyn Metric> {
    Arc::new(ClarityMetric)
}
fn coverage() -> Arc<dyn Metric> {
    Arc::new(CoverageMetric)
}

/// Register the builtin metrics. Call once at startup; the registry is
/// read-only afterwards.
pub fn install_builtins(registry: &mut MetricRegistry) {
    registry.register(difficulty);
    registry.register(clarity);
    registry.register(coverage);
}

pub fn builtin_registry() -> MetricRegistry {
    let mut registry = MetricRegistry::new();
    install_builtins(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_by_name_and_version() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 3);
        assert!(registry.create("difficulty", "1.0").is_ok());
        assert!(registry.create("clarity", "1.1").is_ok());
        assert!(registry.create("coverage", "1.1").is_ok());
        assert!(registry.create("alignment", "1.0").is_err());
    }
}
