//! Wiring of one sync invocation

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use vaultsync_core::auth::{AuthError, LifecycleHandle};
use vaultsync_core::config::{
    resolve_config_path, ConfigError, ConfigFile, RepoDescriptor, BW_PASSWORD_VAR, CONFIG_ENV_VAR,
};
use vaultsync_core::sync::SyncDirection;
use vaultsync_core::transport::ApiClient;
use vaultsync_core::{
    CancellationToken, CredentialLifecycleManager, EnvSecrets, ItemSecretStore, KvSecretStore,
    LifecycleConfig, Mapper, SecretStore, SharedLogger, SyncEngine, SyncError, SyncReport,
    SyncRequest, TokenSource, TracingLogger, UserpassAuth,
};

use crate::args::{ArgsError, SyncArgs};
use crate::serve::BwServe;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_USAGE: u8 = 2;
pub const EXIT_AUTH: u8 = 10;

const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Process exit code for a fatal error
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ArgsError>().is_some() || err.downcast_ref::<ConfigError>().is_some() {
        return EXIT_USAGE;
    }
    if err.downcast_ref::<AuthError>().is_some() {
        return EXIT_AUTH;
    }
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::Config(_)) => EXIT_USAGE,
        Some(e) if e.is_auth() => EXIT_AUTH,
        _ => EXIT_FAILURE,
    }
}

/// Load the config file named by the flag, the env var or the default locations
pub fn load_config(args: &SyncArgs) -> Result<ConfigFile, ConfigError> {
    let env_value = std::env::var(CONFIG_ENV_VAR).ok();
    let path = resolve_config_path(args.config.as_deref(), env_value.as_deref())?;
    let config = ConfigFile::load(&path)?;
    info!(path = %path.display(), repos = config.repos.len(), "loaded configuration");
    Ok(config)
}

/// Selected repositories, in both roles
struct Plan<'a> {
    source: &'a RepoDescriptor,
    destination: &'a RepoDescriptor,
    direction: SyncDirection,
}

impl<'a> Plan<'a> {
    fn new(config: &'a ConfigFile, args: &SyncArgs) -> Result<Self, ConfigError> {
        let source = config.find_repo(&args.source)?;
        let destination = config.find_repo(&args.destination)?;
        if source.paths.is_empty() {
            return Err(ConfigError::invalid_repo(&source.id, "no paths configured"));
        }
        let direction = SyncDirection::from_kinds(source.store_type, destination.store_type)?;
        Ok(Self {
            source,
            destination,
            direction,
        })
    }

    fn structured(&self) -> &'a RepoDescriptor {
        match self.direction {
            SyncDirection::StructuredToItem => self.source,
            SyncDirection::ItemToStructured => self.destination,
        }
    }

    fn item(&self) -> &'a RepoDescriptor {
        match self.direction {
            SyncDirection::StructuredToItem => self.destination,
            SyncDirection::ItemToStructured => self.source,
        }
    }
}

/// Run one sync from `args.source` to `args.destination`.
///
/// Errors returned here are fatal: bad configuration or a failed initial
/// login/unlock. Per-path failures are in the report.
pub async fn run(
    args: &SyncArgs,
    config: &ConfigFile,
    env: &EnvSecrets,
    cancel: CancellationToken,
) -> anyhow::Result<SyncReport> {
    let plan = Plan::new(config, args)?;
    info!(
        source = %plan.source.id,
        destination = %plan.destination.id,
        direction = %plan.direction,
        "starting sync"
    );

    let mut helper = if config.bitwarden.local {
        Some(BwServe::spawn(&config.bitwarden)?)
    } else {
        None
    };

    let result = sync_stores(args, config, &plan, env, &mut helper, &cancel).await;

    if let Some(helper) = helper {
        helper.shutdown().await;
    }
    result
}

async fn sync_stores(
    args: &SyncArgs,
    config: &ConfigFile,
    plan: &Plan<'_>,
    env: &EnvSecrets,
    helper: &mut Option<BwServe>,
    cancel: &CancellationToken,
) -> anyhow::Result<SyncReport> {
    let logger: SharedLogger = Arc::new(TracingLogger::default());
    let mapper = Mapper::new(plan.structured().field_names());

    let vault_client = ApiClient::new(plan.structured().base_url(), logger.clone())
        .map_err(SyncError::from)?;
    let (tokens, lifecycle) = vault_tokens(config, plan, env, vault_client.clone(), logger.clone(), cancel).await?;
    let vault = KvSecretStore::from_repo(plan.structured(), vault_client, tokens, logger.clone());

    let item_client = ApiClient::new(plan.item().base_url(), logger.clone()).map_err(SyncError::from)?;
    let items = ItemSecretStore::from_repo(plan.item(), item_client, mapper.clone(), logger.clone());

    let result = async {
        if let Some(helper) = helper.as_mut() {
            helper.wait_ready(&items, READY_TIMEOUT, cancel).await?;
        }
        let password = env
            .bw_password
            .as_deref()
            .ok_or(AuthError::MissingSecret(BW_PASSWORD_VAR))?;
        items
            .unlock(password)
            .await
            .with_context(|| format!("failed to unlock bitwarden at {}", plan.item().addr))?;

        let (source, destination): (&dyn SecretStore, &dyn SecretStore) = match plan.direction {
            SyncDirection::StructuredToItem => (&vault, &items),
            SyncDirection::ItemToStructured => (&items, &vault),
        };
        let engine = SyncEngine::new(mapper, logger.clone())
            .with_concurrency(args.concurrency.unwrap_or(config.sync.concurrency))
            .with_cancellation(cancel.clone());
        let report = engine
            .sync(&SyncRequest {
                source,
                destination,
                direction: plan.direction,
                paths: &plan.source.paths,
                prefix: &plan.destination.prefix,
            })
            .await;
        Ok::<_, anyhow::Error>(report)
    }
    .await;

    // Lock even when the sync itself failed.
    let locked = items.close().await;
    if let Some(handle) = lifecycle {
        handle.shutdown().await;
    }

    let report = result?;
    locked.context("failed to lock bitwarden")?;
    Ok(report)
}

/// Token source for the Vault side: a fixed `VAULT_TOKEN`, or a running lifecycle
async fn vault_tokens(
    config: &ConfigFile,
    plan: &Plan<'_>,
    env: &EnvSecrets,
    client: ApiClient,
    logger: SharedLogger,
    cancel: &CancellationToken,
) -> anyhow::Result<(TokenSource, Option<LifecycleHandle>)> {
    if let Some(token) = &env.vault_token {
        warn!("VAULT_TOKEN is set, token renewal disabled");
        return Ok((TokenSource::fixed(token.clone()), None));
    }

    let backend = UserpassAuth::from_env(client, env)?;
    let handle = CredentialLifecycleManager::new(
        Arc::new(backend),
        LifecycleConfig::from(&config.token),
        cancel.clone(),
        logger,
    )
    .start()
    .await
    .with_context(|| format!("failed to log in to vault at {}", plan.structured().addr))?;
    Ok((handle.tokens(), Some(handle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const CONFIG: &str = r#"{
        "repos": [
            {"id": "vault", "type": "vault", "addr": "http://127.0.0.1:8200", "paths": ["services/x"]},
            {"id": "vault2", "type": "vault", "addr": "http://127.0.0.1:8201"},
            {"id": "bw", "type": "bitwarden", "addr": "http://127.0.0.1:8087", "prefix": "imported/", "paths": ["db"]}
        ]
    }"#;

    fn args(source: &str, destination: &str) -> SyncArgs {
        SyncArgs {
            config: None,
            concurrency: None,
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    fn config() -> ConfigFile {
        ConfigFile::parse(CONFIG, vaultsync_core::config::ConfigFormat::Json).unwrap()
    }

    #[test]
    fn test_plan_roles() {
        let config = config();
        let plan = Plan::new(&config, &args("bw", "vault")).unwrap();
        assert_eq!(plan.direction, SyncDirection::ItemToStructured);
        assert_eq!(plan.structured().id, "vault");
        assert_eq!(plan.item().id, "bw");
    }

    #[test]
    fn test_plan_rejects_same_type() {
        let config = config();
        let err = Plan::new(&config, &args("vault", "vault2")).err().unwrap();
        assert!(matches!(err, ConfigError::UnsupportedDirection { .. }));
    }

    #[test]
    fn test_plan_rejects_source_without_paths() {
        let config = config();
        let err = Plan::new(&config, &args("vault2", "bw")).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidRepo { id, .. } if id == "vault2"));
    }

    #[tokio::test]
    async fn test_unknown_repo_exits_with_usage_code() {
        let err = run(&args("vault", "nope"), &config(), &EnvSecrets::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_USAGE);
    }

    #[tokio::test]
    async fn test_missing_vault_credentials_is_auth_failure() {
        let err = run(&args("vault", "bw"), &config(), &EnvSecrets::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_AUTH);
    }

    #[test]
    fn test_load_config_from_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vaultsync.json");
        fs::write(&path, CONFIG).unwrap();

        let mut a = args("vault", "bw");
        a.config = Some(path);
        assert_eq!(load_config(&a).unwrap().repos.len(), 3);

        a.config = Some(dir.path().join("missing.json"));
        let err = anyhow::Error::from(load_config(&a).unwrap_err());
        assert_eq!(exit_code(&err), EXIT_USAGE);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&anyhow::Error::from(ArgsError::MissingRepo)), EXIT_USAGE);
        assert_eq!(
            exit_code(&anyhow::Error::from(AuthError::Rejected("no".to_string()))),
            EXIT_AUTH
        );
        let wrapped = anyhow::Error::from(AuthError::Cancelled).context("failed to log in");
        assert_eq!(exit_code(&wrapped), EXIT_AUTH);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), EXIT_FAILURE);
    }
}
