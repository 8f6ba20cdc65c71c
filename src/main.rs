use std::process::ExitCode;

use clap::Parser as _;
use tokio::sync::broadcast;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

use catalog_contract::cli::{self, Cli, Commands, RunArgs};
use catalog_contract::error::HarnessError;
use catalog_contract::stub;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "catalog_contract=debug"
    } else {
        "catalog_contract=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Run(args) => handle_run(cli.config.as_deref(), &args).await,
        Commands::List => cli::list_groups(&mut std::io::stdout())
            .map(|()| 0)
            .map_err(HarnessError::from),
        Commands::Stub { bind } => stub::serve(&bind).await.map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn handle_run(
    config_path: Option<&std::path::Path>,
    args: &RunArgs,
) -> Result<u8, HarnessError> {
    let (cancel_tx, cancel_rx) = broadcast::channel(1);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling remaining scenarios");
            let _ = cancel_tx.send(());
        }
    });

    let result = cli::execute_run(config_path, args, cancel_rx, &mut std::io::stdout()).await;
    ctrl_c.abort();
    result
}
