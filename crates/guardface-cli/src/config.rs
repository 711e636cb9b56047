use std::io;
use std::path::PathBuf;

use guardface_config::{self, ResolvedConfigWithSource};
use tracing::debug;

use crate::cli::ConfigArgs;
use crate::errors::{config_error, AppError, AppResult};

/// Resolves settings from `--config` (or the default locations) plus the
/// process environment.
pub fn load_settings(args: &ConfigArgs) -> AppResult<ResolvedConfigWithSource> {
    load_settings_with(args, &guardface_config::default_config_paths(), |name| {
        std::env::var(name).ok()
    })
}

pub fn load_settings_with<F>(
    args: &ConfigArgs,
    default_paths: &[PathBuf],
    lookup: F,
) -> AppResult<ResolvedConfigWithSource>
where
    F: Fn(&str) -> Option<String>,
{
    let paths = match &args.config_file {
        Some(path) => {
            if !path.is_file() {
                return Err(AppError::ConfigRead {
                    path: path.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
                });
            }
            vec![path.clone()]
        }
        None => default_paths.to_vec(),
    };

    let settings =
        guardface_config::load_resolved_with_env(&paths, lookup).map_err(config_error)?;
    match &settings.source {
        Some(source) => debug!(config = %source.display(), "loaded configuration"),
        None => debug!("no configuration file found; using defaults and environment"),
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_name: &str) -> Option<String> {
        None
    }

    #[test]
    fn explicit_config_file_is_used() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("guardface.toml");
        fs::write(&path, "similarity_threshold = 0.9\nredis_port = 6400\n").unwrap();

        let args = ConfigArgs {
            config_file: Some(path.clone()),
        };
        let settings = load_settings_with(&args, &[], no_env).unwrap();
        assert_eq!(settings.source, Some(path));
        assert!((settings.resolved.similarity_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(settings.resolved.redis_port, 6400);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let args = ConfigArgs {
            config_file: Some(tmp.path().join("absent.toml")),
        };
        let err = load_settings_with(&args, &[], no_env).unwrap_err();
        assert!(matches!(err, AppError::ConfigRead { .. }));
    }

    #[test]
    fn defaults_apply_without_any_file() {
        let tmp = TempDir::new().unwrap();
        let settings = load_settings_with(
            &ConfigArgs::default(),
            &[tmp.path().join("missing.toml")],
            |name: &str| (name == "REDIS_HOST").then(|| "cache.internal".to_string()),
        )
        .unwrap();
        assert_eq!(settings.source, None);
        assert_eq!(settings.resolved.redis_host, "cache.internal");
        assert_eq!(settings.resolved.embedding_dim, 128);
    }
}
