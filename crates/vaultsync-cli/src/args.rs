//! Command-line argument parsing.

use std::path::PathBuf;

use thiserror::Error;

pub const USAGE: &str = "\
Usage: vaultsync [--config PATH] [--concurrency N] <SOURCE_ID> <DEST_ID>

Synchronize login secrets from the SOURCE_ID repository to DEST_ID.

Options:
  -c, --config PATH      Config file (default: $VAULTSYNC_CONFIG, ./config.json,
                         then the user config directory)
  -j, --concurrency N    Paths synced in parallel (default from config, 1)
  -h, --help             Show this help
  -V, --version          Show version information

Environment:
  VAULT_TOKEN            Pre-issued Vault token; disables token renewal
  VAULT_USER             Vault userpass login
  VAULT_PASSWORD         Vault userpass password
  BW_PASSWORD            Bitwarden master password
  RUST_LOG               Log filter (default: vaultsync=info)";

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Help,
    Version,
    Sync(SyncArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    pub config: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub source: String,
    pub destination: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgsError {
    #[error("option {0} needs a value")]
    MissingValue(String),

    #[error("invalid concurrency '{0}': expected a positive number")]
    InvalidConcurrency(String),

    #[error("unknown option {0}")]
    UnknownOption(String),

    #[error("expected <SOURCE_ID> <DEST_ID>")]
    MissingRepo,

    #[error("unexpected argument '{0}'")]
    Unexpected(String),
}

/// Parse command-line arguments, program name first.
///
/// # Examples
///
/// ```ignore
/// let args = vec!["vaultsync".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), Ok(CliCommand::Version));
/// ```
pub fn parse_args<I>(args: I) -> Result<CliCommand, ArgsError>
where
    I: Iterator<Item = String>,
{
    let mut config = None;
    let mut concurrency = None;
    let mut positional = Vec::new();

    // Skip the program name
    let mut args = args.skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(CliCommand::Help),
            "--version" | "-V" => return Ok(CliCommand::Version),
            "--config" | "-c" => {
                let value = args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                config = Some(PathBuf::from(value));
            }
            "--concurrency" | "-j" => {
                let value = args.next().ok_or_else(|| ArgsError::MissingValue(arg.clone()))?;
                concurrency = Some(parse_concurrency(&value)?);
            }
            _ => {
                if let Some(value) = arg.strip_prefix("--config=") {
                    config = Some(PathBuf::from(value));
                } else if let Some(value) = arg.strip_prefix("--concurrency=") {
                    concurrency = Some(parse_concurrency(value)?);
                } else if arg.starts_with('-') && arg.len() > 1 {
                    return Err(ArgsError::UnknownOption(arg));
                } else {
                    positional.push(arg);
                }
            }
        }
    }

    let mut positional = positional.into_iter();
    let (Some(source), Some(destination)) = (positional.next(), positional.next()) else {
        return Err(ArgsError::MissingRepo);
    };
    if let Some(extra) = positional.next() {
        return Err(ArgsError::Unexpected(extra));
    }

    Ok(CliCommand::Sync(SyncArgs {
        config,
        concurrency,
        source,
        destination,
    }))
}

fn parse_concurrency(value: &str) -> Result<usize, ArgsError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ArgsError::InvalidConcurrency(value.to_string())),
    }
}
