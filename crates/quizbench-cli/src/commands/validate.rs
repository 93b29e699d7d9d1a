use crate::args::ValidateArgs;
use crate::exit_codes;
use quizbench_core::config::{self, load_config};

pub fn execute(args: &ValidateArgs) -> anyhow::Result<i32> {
    let registry = quizbench_metrics::builtin_registry();
    let cfg = match load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    if let Err(e) = config::resolve(&cfg, &registry) {
        eprintln!("{}", e);
        return Ok(exit_codes::CONFIG_ERROR);
    }
    println!(
        "configuration OK: {} (hash {})",
        cfg.name,
        config::config_hash(&cfg)
    );
    Ok(exit_codes::OK)
}
