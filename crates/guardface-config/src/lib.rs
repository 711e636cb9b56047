use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use guardface_core::faces::DEFAULT_REFERENCE_TTL;
use serde::Deserialize;
use thiserror::Error;

pub use guardface_core::faces::{DEFAULT_EMBEDDING_DIM, DEFAULT_SIMILARITY_THRESHOLD};

pub const PRIMARY_CONFIG_PATH: &str = "/etc/guardface/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/guardface/config.toml";
pub const DEFAULT_REFERENCE_TTL_SECS: u64 = DEFAULT_REFERENCE_TTL.as_secs();
pub const DEFAULT_REDIS_HOST: &str = "localhost";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_DB: i64 = 0;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_JITTERS: u32 = 1;

pub const ENV_THRESHOLD: &str = "EMBEDDING_THRESHOLD";
pub const ENV_REFERENCE_TTL: &str = "REFERENCE_TTL_SECS";
pub const ENV_REDIS_HOST: &str = "REDIS_HOST";
pub const ENV_REDIS_PORT: &str = "REDIS_PORT";
pub const ENV_REDIS_DB: &str = "REDIS_DB";
pub const ENV_CONNECT_TIMEOUT: &str = "REDIS_CONNECT_TIMEOUT_SECS";
pub const ENV_EMBEDDING_DIM: &str = "EMBEDDING_DIM";
pub const ENV_ENCODER_MODEL: &str = "MODEL_PATH";
pub const ENV_LANDMARK_MODEL: &str = "LANDMARK_MODEL_PATH";
pub const ENV_REFERENCE_DIR: &str = "REFERENCE_DIR";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub similarity_threshold: Option<f32>,
    pub reference_ttl_secs: Option<u64>,
    pub redis_host: Option<String>,
    pub redis_port: Option<u16>,
    pub redis_db: Option<i64>,
    pub store_connect_timeout_secs: Option<u64>,
    pub embedding_dim: Option<usize>,
    pub jitters: Option<u32>,
    pub encoder_model: Option<PathBuf>,
    pub landmark_model: Option<PathBuf>,
    pub reference_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub similarity_threshold: f32,
    pub reference_ttl: Duration,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,
    pub store_connect_timeout: Duration,
    pub embedding_dim: usize,
    pub jitters: u32,
    pub encoder_model: Option<PathBuf>,
    pub landmark_model: Option<PathBuf>,
    pub reference_dir: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            similarity_threshold: raw
                .similarity_threshold
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            reference_ttl: Duration::from_secs(
                raw.reference_ttl_secs
                    .unwrap_or(DEFAULT_REFERENCE_TTL_SECS)
                    .max(1),
            ),
            redis_host: raw
                .redis_host
                .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string()),
            redis_port: raw.redis_port.unwrap_or(DEFAULT_REDIS_PORT),
            redis_db: raw.redis_db.unwrap_or(DEFAULT_REDIS_DB),
            store_connect_timeout: Duration::from_secs(
                raw.store_connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
                    .max(1),
            ),
            embedding_dim: raw.embedding_dim.unwrap_or(DEFAULT_EMBEDDING_DIM),
            jitters: raw.jitters.unwrap_or(DEFAULT_JITTERS).max(1),
            encoder_model: raw.encoder_model,
            landmark_model: raw.landmark_model,
            reference_dir: raw.reference_dir,
        }
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value {value:?} for ${name}: {message}")]
    Env {
        name: &'static str,
        value: String,
        message: String,
    },
}

pub fn default_config_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

/// File settings (first existing path wins) overlaid with `lookup`'s environment.
pub fn load_resolved_with_env<F>(
    paths: &[PathBuf],
    lookup: F,
) -> Result<ResolvedConfigWithSource, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (contents, source) = match load_from_paths(paths)? {
        Some(entry) => (entry.contents, Some(entry.source)),
        None => (ConfigFile::default(), None),
    };
    let merged = apply_env_overrides(contents, lookup)?;
    Ok(ResolvedConfigWithSource {
        resolved: ResolvedConfig::from_raw(merged),
        source,
    })
}

/// Environment variables take precedence over file values.
pub fn apply_env_overrides<F>(mut raw: ConfigFile, lookup: F) -> Result<ConfigFile, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &'static str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| (name, value))
    };

    if let Some((name, value)) = get(ENV_THRESHOLD) {
        raw.similarity_threshold = Some(parse_env(name, &value)?);
    }
    if let Some((name, value)) = get(ENV_REFERENCE_TTL) {
        raw.reference_ttl_secs = Some(parse_env(name, &value)?);
    }
    if let Some((_, value)) = get(ENV_REDIS_HOST) {
        raw.redis_host = Some(value);
    }
    if let Some((name, value)) = get(ENV_REDIS_PORT) {
        raw.redis_port = Some(parse_env(name, &value)?);
    }
    if let Some((name, value)) = get(ENV_REDIS_DB) {
        raw.redis_db = Some(parse_env(name, &value)?);
    }
    if let Some((name, value)) = get(ENV_CONNECT_TIMEOUT) {
        raw.store_connect_timeout_secs = Some(parse_env(name, &value)?);
    }
    if let Some((name, value)) = get(ENV_EMBEDDING_DIM) {
        raw.embedding_dim = Some(parse_env(name, &value)?);
    }
    if let Some((_, value)) = get(ENV_ENCODER_MODEL) {
        raw.encoder_model = Some(PathBuf::from(value));
    }
    if let Some((_, value)) = get(ENV_LANDMARK_MODEL) {
        raw.landmark_model = Some(PathBuf::from(value));
    }
    if let Some((_, value)) = get(ENV_REFERENCE_DIR) {
        raw.reference_dir = Some(PathBuf::from(value));
    }

    Ok(raw)
}

fn parse_env<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| ConfigError::Env {
        name,
        value: value.to_string(),
        message: err.to_string(),
    })
}
