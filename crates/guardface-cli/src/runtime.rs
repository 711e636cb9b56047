//! Builds core services from resolved settings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use guardface_config::ResolvedConfig;
use guardface_core::faces::{
    DlibBackend, FaceModelPaths, MatchConfig, RecognitionConfig, RedisEndpoint, RedisKeyValue,
    ReferenceStore,
};

use crate::errors::{AppError, AppResult};

pub fn redis_endpoint(settings: &ResolvedConfig) -> RedisEndpoint {
    RedisEndpoint {
        host: settings.redis_host.clone(),
        port: settings.redis_port,
        db: settings.redis_db,
        connect_timeout: settings.store_connect_timeout,
    }
}

pub fn connect_store(settings: &ResolvedConfig) -> AppResult<ReferenceStore<RedisKeyValue>> {
    let kv = RedisKeyValue::connect(&redis_endpoint(settings))?;
    Ok(ReferenceStore::new(kv, settings.embedding_dim))
}

pub fn recognition_config(
    settings: &ResolvedConfig,
    threshold_override: Option<f32>,
) -> AppResult<RecognitionConfig> {
    let threshold = threshold_override.unwrap_or(settings.similarity_threshold);
    if !threshold.is_finite() {
        return Err(AppError::ConfigParse {
            origin: "--threshold".into(),
            message: format!("threshold must be a finite number, got {threshold}"),
        });
    }
    Ok(RecognitionConfig {
        matching: MatchConfig { threshold },
        reference_ttl: settings.reference_ttl,
    })
}

/// CLI flags win over configured model paths.
pub fn model_paths(
    settings: &ResolvedConfig,
    landmark: Option<PathBuf>,
    encoder: Option<PathBuf>,
) -> AppResult<FaceModelPaths> {
    FaceModelPaths::resolve(
        landmark.or_else(|| settings.landmark_model.clone()),
        encoder.or_else(|| settings.encoder_model.clone()),
    )
}

pub fn load_backend(models: &FaceModelPaths, settings: &ResolvedConfig) -> AppResult<DlibBackend> {
    DlibBackend::new(models, settings.jitters)
}

pub fn read_image(path: &Path) -> AppResult<Vec<u8>> {
    fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => AppError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => AppError::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn threshold_override_wins_over_settings() {
        let settings = ResolvedConfig {
            similarity_threshold: 0.7,
            reference_ttl: Duration::from_secs(30),
            ..ResolvedConfig::default()
        };
        let config = recognition_config(&settings, None).unwrap();
        assert!((config.matching.threshold - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.reference_ttl, Duration::from_secs(30));

        let config = recognition_config(&settings, Some(0.95)).unwrap();
        assert!((config.matching.threshold - 0.95).abs() < f32::EPSILON);
        assert!(recognition_config(&settings, Some(f32::NAN)).is_err());
    }

    #[test]
    fn model_flags_override_configured_paths() {
        let settings = ResolvedConfig {
            landmark_model: Some(PathBuf::from("/etc/landmarks.dat")),
            encoder_model: Some(PathBuf::from("/etc/encoder.dat")),
            ..ResolvedConfig::default()
        };
        let paths = model_paths(&settings, None, Some(PathBuf::from("/tmp/encoder.dat"))).unwrap();
        assert_eq!(paths.landmark, PathBuf::from("/etc/landmarks.dat"));
        assert_eq!(paths.encoder, PathBuf::from("/tmp/encoder.dat"));

        let err = model_paths(&ResolvedConfig::default(), None, None).unwrap_err();
        assert!(matches!(err, AppError::MissingModel { .. }));
    }

    #[test]
    fn endpoint_uses_configured_redis_settings() {
        let settings = ResolvedConfig {
            redis_host: "cache.internal".into(),
            redis_port: 6380,
            redis_db: 2,
            ..ResolvedConfig::default()
        };
        let endpoint = redis_endpoint(&settings);
        assert_eq!(endpoint.url(), "redis://cache.internal:6380/2");
    }

    #[test]
    fn missing_image_is_a_client_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_image(&tmp.path().join("absent.jpg")).unwrap_err();
        assert!(err.is_client_error());
    }
}
