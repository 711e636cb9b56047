use guardface_config::ConfigError;

pub use guardface_core::errors::{AppError, AppResult};

pub fn config_error(err: ConfigError) -> AppError {
    match err {
        ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
        ConfigError::Parse { path, message } => AppError::ConfigParse {
            origin: path.display().to_string(),
            message,
        },
        ConfigError::Env {
            name,
            value,
            message,
        } => AppError::ConfigParse {
            origin: format!("${name}"),
            message: format!("{value:?}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_errors_name_the_variable() {
        let err = config_error(ConfigError::Env {
            name: "REDIS_PORT",
            value: "abc".into(),
            message: "invalid digit found in string".into(),
        });
        match err {
            AppError::ConfigParse { origin, message } => {
                assert_eq!(origin, "$REDIS_PORT");
                assert!(message.contains("abc"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
