use std::fs;
use std::path::{Path, PathBuf};

use guardface_config::{self, ConfigError, ResolvedConfig, ResolvedConfigWithSource};
use guardface_core::faces::{KeyValueService, RedisKeyValue};
use serde::Serialize;

use crate::cli::DoctorArgs;
use crate::errors::AppResult;
use crate::runtime::redis_endpoint;

const CHECK_CONFIG: &str = "config";
const CHECK_LANDMARK_MODEL: &str = "landmark_model";
const CHECK_ENCODER_MODEL: &str = "encoder_model";
const CHECK_REFERENCE_DIR: &str = "reference_dir";
const CHECK_FACE_BACKEND: &str = "face_backend";
const CHECK_REFERENCE_STORE: &str = "reference_store";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            path: None,
        }
    }

    fn at(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }
}

/// Warnings are informational; only failures make the outcome unhealthy.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorOutcome {
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

pub trait StorePing {
    fn ping(&self, settings: &ResolvedConfig) -> AppResult<()>;
}

#[derive(Clone, Copy)]
pub struct RedisPing;

impl StorePing for RedisPing {
    fn ping(&self, settings: &ResolvedConfig) -> AppResult<()> {
        RedisKeyValue::connect(&redis_endpoint(settings))?.ping()
    }
}

pub struct DoctorContext<S> {
    pub config_paths: Vec<PathBuf>,
    /// Set when the operator named a file with `--config`; a missing file then fails.
    pub require_config: bool,
    pub store_ping: S,
    pub env: fn(&str) -> Option<String>,
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl DoctorContext<RedisPing> {
    pub fn from_args(args: &DoctorArgs) -> Self {
        let config_paths = match &args.config.config_file {
            Some(path) => vec![path.clone()],
            None => guardface_config::default_config_paths(),
        };
        Self {
            config_paths,
            require_config: args.config.config_file.is_some(),
            store_ping: RedisPing,
            env: process_env,
        }
    }
}

pub fn run_doctor(args: &DoctorArgs) -> AppResult<DoctorOutcome> {
    run_doctor_with(&DoctorContext::from_args(args))
}

pub fn run_doctor_with<S: StorePing>(ctx: &DoctorContext<S>) -> AppResult<DoctorOutcome> {
    let (config_check, settings) = check_config(ctx);
    let resolved = &settings.resolved;

    let checks = vec![
        config_check,
        check_model(CHECK_LANDMARK_MODEL, resolved.landmark_model.as_deref()),
        check_model(CHECK_ENCODER_MODEL, resolved.encoder_model.as_deref()),
        check_reference_dir(resolved.reference_dir.as_deref()),
        check_face_backend(),
        check_store(&ctx.store_ping, resolved),
    ];
    let ok = checks.iter().all(|c| c.status != CheckStatus::Fail);

    Ok(DoctorOutcome { ok, checks })
}

fn check_config<S>(ctx: &DoctorContext<S>) -> (DoctorCheck, ResolvedConfigWithSource) {
    let fallback = || ResolvedConfigWithSource {
        resolved: ResolvedConfig::default(),
        source: None,
    };

    match guardface_config::load_resolved_with_env(&ctx.config_paths, ctx.env) {
        Ok(settings) => {
            let check = match &settings.source {
                Some(source) => DoctorCheck::new(
                    CHECK_CONFIG,
                    CheckStatus::Pass,
                    format!("Loaded config from {}", source.display()),
                )
                .at(source),
                None if ctx.require_config => DoctorCheck::new(
                    CHECK_CONFIG,
                    CheckStatus::Fail,
                    format!(
                        "Config file {} not found",
                        display_paths(&ctx.config_paths)
                    ),
                ),
                None => DoctorCheck::new(
                    CHECK_CONFIG,
                    CheckStatus::Warn,
                    format!(
                        "No config file found (tried {}); using defaults and environment",
                        display_paths(&ctx.config_paths)
                    ),
                ),
            };
            (check, settings)
        }
        Err(ConfigError::Parse { path, message }) => (
            DoctorCheck::new(
                CHECK_CONFIG,
                CheckStatus::Fail,
                format!("Failed to parse {}: {}", path.display(), message),
            )
            .at(&path),
            fallback(),
        ),
        Err(ConfigError::Read { path, source }) => (
            DoctorCheck::new(
                CHECK_CONFIG,
                CheckStatus::Fail,
                format!("Failed to read {}: {}", path.display(), source),
            )
            .at(&path),
            fallback(),
        ),
        Err(err @ ConfigError::Env { .. }) => (
            DoctorCheck::new(CHECK_CONFIG, CheckStatus::Fail, err.to_string()),
            fallback(),
        ),
    }
}

fn check_model(name: &str, path: Option<&Path>) -> DoctorCheck {
    match path {
        None => DoctorCheck::new(
            name,
            CheckStatus::Fail,
            "Model path not configured; set config or env",
        ),
        Some(p) => match fs::File::open(p) {
            Ok(_) => DoctorCheck::new(
                name,
                CheckStatus::Pass,
                format!("Found model at {}", p.display()),
            )
            .at(p),
            Err(err) => DoctorCheck::new(
                name,
                CheckStatus::Fail,
                format!("Cannot read model {}: {}", p.display(), err),
            )
            .at(p),
        },
    }
}

fn check_reference_dir(path: Option<&Path>) -> DoctorCheck {
    let Some(path) = path else {
        return DoctorCheck::new(
            CHECK_REFERENCE_DIR,
            CheckStatus::Warn,
            "Reference directory not configured; bootstrap requires --dir",
        );
    };
    match fs::read_dir(path) {
        Ok(entries) => DoctorCheck::new(
            CHECK_REFERENCE_DIR,
            CheckStatus::Pass,
            format!(
                "Reference directory {} holds {} entries",
                path.display(),
                entries.count()
            ),
        )
        .at(path),
        Err(err) => DoctorCheck::new(
            CHECK_REFERENCE_DIR,
            CheckStatus::Fail,
            format!("Cannot read reference directory {}: {}", path.display(), err),
        )
        .at(path),
    }
}

fn check_face_backend() -> DoctorCheck {
    if cfg!(feature = "dlib") {
        DoctorCheck::new(
            CHECK_FACE_BACKEND,
            CheckStatus::Pass,
            "dlib face backend compiled in",
        )
    } else {
        DoctorCheck::new(
            CHECK_FACE_BACKEND,
            CheckStatus::Warn,
            "Built without the dlib feature; recognize will fail",
        )
    }
}

fn check_store<S: StorePing>(pinger: &S, settings: &ResolvedConfig) -> DoctorCheck {
    let endpoint = redis_endpoint(settings).url();
    match pinger.ping(settings) {
        Ok(()) => DoctorCheck::new(
            CHECK_REFERENCE_STORE,
            CheckStatus::Pass,
            format!("Reference store {endpoint} answered PING"),
        ),
        Err(err) => DoctorCheck::new(
            CHECK_REFERENCE_STORE,
            CheckStatus::Fail,
            format!("Reference store {endpoint} unreachable: {}", err.human_message()),
        ),
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
