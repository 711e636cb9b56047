use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use image::ImageError;
use thiserror::Error;

use crate::faces::codec::CodecError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input file not found or unreadable: {path}")]
    MissingInput { path: PathBuf },

    #[error("failed to decode image: {source}")]
    ImageDecode {
        #[source]
        source: ImageError,
    },

    #[error("invalid guard id '{guard_id}': {message}")]
    InvalidGuardId { guard_id: String, message: String },

    #[error("embedding has zero magnitude and cannot be normalized")]
    DegenerateEmbedding,

    #[error("{context} embedding has {found} values but the model produces {expected}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("no reference stored for guard {guard_id}")]
    ReferenceNotFound { guard_id: String },

    #[error("reference {key} is corrupt: {source}")]
    CorruptData {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("reference store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("missing {kind} model; provide {flag} or set ${env}")]
    MissingModel {
        kind: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("missing {setting}; provide {flag} or set ${env}")]
    MissingSetting {
        setting: &'static str,
        flag: &'static str,
        env: &'static str,
    },

    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("face embedding backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("failed to read reference file {path}: {source}")]
    BootstrapRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {origin}: {message}")]
    ConfigParse { origin: String, message: String },
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::MissingInput { .. } => ExitCode::from(2),
            AppError::ImageDecode { .. } => ExitCode::from(2),
            AppError::InvalidGuardId { .. } => ExitCode::from(2),
            AppError::MissingModel { .. } => ExitCode::from(2),
            AppError::MissingSetting { .. } => ExitCode::from(2),
            AppError::ModelLoad { .. } => ExitCode::from(2),
            AppError::BackendUnavailable(_) => ExitCode::from(2),
            AppError::BootstrapRead { .. } => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::CorruptData { .. } => ExitCode::from(3),
            AppError::DimensionMismatch { .. } => ExitCode::from(3),
            AppError::DegenerateEmbedding => ExitCode::from(3),
            AppError::StoreUnavailable { .. } => ExitCode::from(4),
            AppError::ReferenceNotFound { .. } => ExitCode::from(4),
            _ => ExitCode::from(1),
        }
    }

    /// Errors caused by the caller's input rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingInput { .. }
                | AppError::ImageDecode { .. }
                | AppError::InvalidGuardId { .. }
        )
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_integrity_failures_are_server_errors() {
        let corrupt = AppError::CorruptData {
            key: "guard:g1".into(),
            source: CodecError::Misaligned { len: 7 },
        };
        let unavailable = AppError::StoreUnavailable {
            message: "connection refused".into(),
        };
        assert!(!corrupt.is_client_error());
        assert!(!unavailable.is_client_error());
        assert_eq!(corrupt.exit_code(), ExitCode::from(3));
        assert_eq!(unavailable.exit_code(), ExitCode::from(4));
    }

    #[test]
    fn invalid_guard_id_is_a_client_error() {
        let err = AppError::InvalidGuardId {
            guard_id: String::new(),
            message: "must not be empty".into(),
        };
        assert!(err.is_client_error());
        assert_eq!(err.exit_code(), ExitCode::from(2));
    }
}
