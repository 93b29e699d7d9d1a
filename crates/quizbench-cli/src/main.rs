use clap::Parser;

mod args;
mod commands;
mod exit_codes;

use args::Cli;
use commands::dispatch;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", if cli.debug { "debug" } else { "info" });
    }
    env_logger::init();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
