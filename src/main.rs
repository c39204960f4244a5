//! Vintner - Main Entry Point
//!
//! Training, serving and one-off predictions for the wine quality classifier.

use clap::Parser;
use vintner::cli::{cmd_info, cmd_predict, cmd_serve, cmd_train, resolve_training_config, Cli, Commands, TrainOverrides};
use vintner::server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vintner=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            data_dir,
            models_dir,
            cv_folds,
            n_iter,
            random_state,
            n_jobs,
            skip_tuning,
        } => {
            let config = resolve_training_config(
                config.as_deref(),
                TrainOverrides {
                    data_dir,
                    models_dir,
                    cv_folds,
                    n_iter,
                    random_state,
                    n_jobs,
                    skip_tuning,
                },
            )?;
            // Training is CPU bound; keep it off the async workers
            tokio::task::spawn_blocking(move || cmd_train(config)).await??;
        }
        Commands::Serve { host, port, models_dir } => {
            cmd_serve(ServerConfig { host, port, models_dir }).await?;
        }
        Commands::Predict { input, models_dir, output } => {
            cmd_predict(&input, &models_dir, output.as_deref())?;
        }
        Commands::Info { models_dir } => {
            cmd_info(&models_dir)?;
        }
    }

    Ok(())
}
