mod cli;
mod commands;
mod output;

use anyhow::Context;
use cdrtool_client::RepositoryClient;
use cdrtool_core::Settings;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("cdrtool v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.settings.as_deref()).context("loading settings")?;

    let client = RepositoryClient::new(settings);
    match &cli.command {
        Command::ListFiles(args) => {
            let auth = cli.credentials();
            commands::list_files(&client, args, auth.as_ref()).await
        }
        Command::CloneCdrtest(args) => {
            commands::clone_cdrtest(&client, args, &cli.require_credentials()?).await
        }
        Command::DeleteEnvelopes(args) => {
            commands::delete_from_file(&client, args, &cli.require_credentials()?).await
        }
        Command::BatchDeleteEnvelopes(args) => {
            commands::batch_delete(&client, args, &cli.require_credentials()?).await
        }
        Command::EnvelopeQa(args) => {
            let auth = cli.credentials();
            commands::envelope_qa(&client, args, auth.as_ref()).await
        }
        Command::ActivateQa(args) => {
            commands::activate(&client, args, &cli.require_credentials()?).await
        }
        Command::DiffIds(args) => commands::diff_ids(client.settings(), args),
    }
}
