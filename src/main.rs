use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tmux_driver::actions::Cli;
use tmux_driver::app::App;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only pane output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::from_cli(&cli);

    match app.handle_action(cli.action).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}
