mod list_metrics;
mod run;
mod validate;

use crate::args::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Validate(args) => validate::execute(&args),
        Commands::ListMetrics => list_metrics::execute(),
    }
}
