use clap::Parser;
use env_logger::Env;
use html_snapshot::cli::Cli;
use html_snapshot::{Snapshot, render};
use std::path::PathBuf;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(path) => {
            println!("Saved screenshot to {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<PathBuf> {
    let mut snapshot = Snapshot::new(&cli.html_path)?.with_options(cli.capture_options());
    if let Some(output) = &cli.output {
        snapshot = snapshot.with_output(output)?;
    }
    render(&snapshot, &cli.runtime_options()).await
}
