use guardface_config::{ResolvedConfig, ENV_REFERENCE_DIR};
use guardface_core::faces::{
    bootstrap_references, reference_key, validate_guard_id, BootstrapConfig, BootstrapReport,
    KeyValueService, ReferenceStore,
};
use serde::Serialize;
use tracing::info;

use crate::cli::{BootstrapArgs, GuardArgs};
use crate::config::load_settings;
use crate::errors::{AppError, AppResult};
use crate::runtime::connect_store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceStatus {
    #[serde(rename = "guardId")]
    pub guard_id: String,
    pub key: String,
    pub enrolled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceRemoval {
    #[serde(rename = "guardId")]
    pub guard_id: String,
    pub key: String,
    pub removed: bool,
}

pub fn run_bootstrap(args: &BootstrapArgs) -> AppResult<BootstrapReport> {
    let settings = load_settings(&args.config)?.resolved;
    let config = bootstrap_config(args, &settings)?;
    let store = connect_store(&settings)?;
    bootstrap_references(&config, &store)
}

pub fn bootstrap_config(
    args: &BootstrapArgs,
    settings: &ResolvedConfig,
) -> AppResult<BootstrapConfig> {
    let dir = args
        .dir
        .clone()
        .or_else(|| settings.reference_dir.clone())
        .ok_or(AppError::MissingSetting {
            setting: "reference directory",
            flag: "--dir",
            env: ENV_REFERENCE_DIR,
        })?;
    Ok(BootstrapConfig {
        dir,
        ttl: settings.reference_ttl,
        overwrite: args.overwrite,
    })
}

pub fn run_status(args: &GuardArgs) -> AppResult<ReferenceStatus> {
    validate_guard_id(&args.guard_id)?;
    let settings = load_settings(&args.config)?.resolved;
    status_with(&connect_store(&settings)?, &args.guard_id)
}

pub fn status_with<K: KeyValueService>(
    store: &ReferenceStore<K>,
    guard_id: &str,
) -> AppResult<ReferenceStatus> {
    let enrolled = store.exists(guard_id)?;
    let ttl_secs = if enrolled {
        store.remaining_ttl(guard_id)?.map(|ttl| ttl.as_secs())
    } else {
        None
    };
    Ok(ReferenceStatus {
        guard_id: guard_id.to_string(),
        key: reference_key(guard_id),
        enrolled,
        ttl_secs,
    })
}

pub fn run_remove(args: &GuardArgs) -> AppResult<ReferenceRemoval> {
    validate_guard_id(&args.guard_id)?;
    let settings = load_settings(&args.config)?.resolved;
    remove_with(&connect_store(&settings)?, &args.guard_id)
}

pub fn remove_with<K: KeyValueService>(
    store: &ReferenceStore<K>,
    guard_id: &str,
) -> AppResult<ReferenceRemoval> {
    let removed = store.remove(guard_id)?;
    info!(guard_id, removed, "reference removal requested");
    Ok(ReferenceRemoval {
        guard_id: guard_id.to_string(),
        key: reference_key(guard_id),
        removed,
    })
}
