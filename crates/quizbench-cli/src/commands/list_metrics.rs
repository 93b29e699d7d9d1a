use crate::exit_codes;

pub fn execute() -> anyhow::Result<i32> {
    let registry = quizbench_metrics::builtin_registry();
    for name in registry.names() {
        println!("{}", name);
    }
    Ok(exit_codes::OK)
}
