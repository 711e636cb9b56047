use std::error::Error;
use std::io::{self, Write};

use guardface_core::faces::{BootstrapReport, RecognitionResult};
use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputMode;
use crate::doctor::{CheckStatus, DoctorOutcome};
use crate::errors::{AppError, AppResult};
use crate::references::{ReferenceRemoval, ReferenceStatus};

fn write_json<T: Serialize>(value: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(value)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_recognition(result: &RecognitionResult, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            let verdict = if result.success { "ACCEPT" } else { "REJECT" };
            match result.similarity {
                Some(score) => println!("{verdict}: {} (similarity {score:.4})", result.message),
                None => println!("{verdict}: {}", result.message),
            }
            if let Some(guard_id) = &result.guard_id {
                println!("guard: {guard_id}");
            }
        }
        OutputMode::Json => write_json(result)?,
    }
    Ok(())
}

pub fn render_bootstrap(report: &BootstrapReport, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            println!(
                "Bootstrap complete: {} loaded, {} skipped from {}",
                report.loaded.len(),
                report.skipped.len(),
                report.dir
            );
            for guard_id in &report.skipped {
                println!("skipped {guard_id}: reference already present");
            }
        }
        OutputMode::Json => write_json(report)?,
    }
    Ok(())
}

pub fn render_status(status: &ReferenceStatus, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => match (status.enrolled, status.ttl_secs) {
            (false, _) => println!("{}: no reference stored", status.guard_id),
            (true, Some(secs)) => println!(
                "{}: reference stored at {} (expires in {secs}s)",
                status.guard_id, status.key
            ),
            (true, None) => println!(
                "{}: reference stored at {} (no expiry)",
                status.guard_id, status.key
            ),
        },
        OutputMode::Json => write_json(status)?,
    }
    Ok(())
}

pub fn render_remove(removal: &ReferenceRemoval, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if removal.removed {
                println!("Removed reference {}", removal.key);
            } else {
                println!("No reference stored for {}", removal.guard_id);
            }
        }
        OutputMode::Json => write_json(removal)?,
    }
    Ok(())
}

pub fn render_doctor(outcome: &DoctorOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            for check in &outcome.checks {
                let label = match check.status {
                    CheckStatus::Pass => "PASS",
                    CheckStatus::Warn => "WARN",
                    CheckStatus::Fail => "FAIL",
                };
                println!("[{label}] {}: {}", check.name, check.message);
            }
            println!(
                "{}",
                if outcome.ok {
                    "All checks passed"
                } else {
                    "Some checks failed"
                }
            );
        }
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            if let Ok(json) = serde_json::to_string(&error_payload(err)) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}

/// `kind` is `client` for bad input and `server` for everything else.
fn error_payload(err: &AppError) -> Value {
    json!({
        "success": false,
        "kind": if err.is_client_error() { "client" } else { "server" },
        "error": err.human_message(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_separates_client_and_server_faults() {
        let client = error_payload(&AppError::InvalidGuardId {
            guard_id: String::new(),
            message: "guard id cannot be empty".into(),
        });
        assert_eq!(client["success"], false);
        assert_eq!(client["kind"], "client");

        let server = error_payload(&AppError::StoreUnavailable {
            message: "connection refused".into(),
        });
        assert_eq!(server["kind"], "server");
        assert!(server["error"].as_str().unwrap().contains("connection refused"));
    }
}
