//! vaultsync - secret synchronization between Vault and Bitwarden
//!
//! Loads the configuration, opens both stores and runs one sync.

mod args;
mod run;
mod serve;

use std::process::ExitCode;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaultsync_core::{CancellationToken, EnvSecrets};

use args::{parse_args, CliCommand, USAGE};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultsync=info,vaultsync_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match parse_args(std::env::args()) {
        Ok(CliCommand::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Ok(CliCommand::Version) => {
            println!("vaultsync {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Ok(CliCommand::Sync(args)) => args,
        Err(err) => {
            eprintln!("error: {}\n\n{}", err, USAGE);
            return ExitCode::from(run::EXIT_USAGE);
        }
    };

    let config = match run::load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::from(run::EXIT_USAGE);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing in-flight requests");
                cancel.cancel();
            }
        }
    });

    match run::run(&args, &config, &EnvSecrets::from_env(), cancel).await {
        Ok(report) => {
            info!(%report, "sync complete");
            println!("{}", report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(run::exit_code(&err))
        }
    }
}
