mod cli;
mod config;
mod notify;
mod run;
mod storage;
mod tasks;

use clap::Parser;
use color_eyre::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

/// Entry point wiring the CLI to the scheduler and task commands.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run::run(&config).await?,
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Task(cmd) => tasks::handle(cmd, &config).await?,
        Command::Reconcile => tasks::reconcile(&config).await?,
        Command::Report { days } => tasks::report(days, &config).await?,
        Command::Prefs(cmd) => tasks::prefs(cmd, &config).await?,
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so command output stays pipeable.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("cadence {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
