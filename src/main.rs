//! phishnet - main entry point

use clap::Parser;
use phishnet::cli::{cmd_predict, cmd_push, cmd_run, Cli, Commands, RunOverrides};
use phishnet::pipeline::PipelineSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log to stderr and to `logs/<timestamp>.log`
fn init_logging() -> WorkerGuard {
    let file_name = format!("{}.log", chrono::Local::now().format("%m_%d_%Y_%H_%M_%S"));
    let appender = tracing_appender::rolling::never("logs", file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "phishnet=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}

fn main() -> anyhow::Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let _guard = init_logging();

    let cli = Cli::parse();
    let settings = PipelineSettings::from_env()?;

    match cli.command {
        Commands::Run { source_url, artifact_root, schema, target, split_ratio, cv_folds } => {
            let overrides = RunOverrides { source_url, artifact_root, schema, target, split_ratio, cv_folds };
            cmd_run(overrides.apply(settings)?)?;
        }
        Commands::Push { csv, source_url, database, collection } => {
            cmd_push(
                &csv,
                source_url.as_deref().unwrap_or(settings.source_url.as_path()),
                database.as_deref().unwrap_or(settings.database.as_str()),
                collection.as_deref().unwrap_or(settings.collection.as_str()),
            )?;
        }
        Commands::Predict { model, data, output, target } => {
            cmd_predict(&model, &data, output.as_deref(), &target)?;
        }
    }

    Ok(())
}
