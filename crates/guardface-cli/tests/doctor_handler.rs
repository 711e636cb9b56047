use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use guardface_cli::cli::{DoctorArgs, OutputMode};
use guardface_cli::commands::{CommandHandler, DoctorHandler};
use guardface_cli::doctor::{CheckStatus, DoctorCheck, DoctorOutcome};
use guardface_cli::errors::AppError;

fn sample_outcome(ok: bool) -> DoctorOutcome {
    DoctorOutcome {
        ok,
        checks: vec![DoctorCheck {
            name: "check".into(),
            status: if ok {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            message: "msg".into(),
            path: None,
        }],
    }
}

#[test]
fn doctor_handler_uses_render_and_exit_code() {
    let renders = Arc::new(Mutex::new(0));
    let handler = DoctorHandler::with_dependencies(
        DoctorArgs::default(),
        |_args| Ok(sample_outcome(false)),
        {
            let renders = Arc::clone(&renders);
            move |_outcome, _mode| {
                *renders.lock().unwrap() += 1;
                Ok(())
            }
        },
    );

    let code = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(code, ExitCode::from(1));
    assert_eq!(*renders.lock().unwrap(), 1);
}

#[test]
fn doctor_handler_succeeds_when_checks_pass() {
    let handler = DoctorHandler::with_dependencies(
        DoctorArgs::default(),
        |_args| Ok(sample_outcome(true)),
        |_outcome, _mode| Ok(()),
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
}

#[test]
fn doctor_handler_propagates_errors() {
    let handler = DoctorHandler::with_dependencies(
        DoctorArgs::default(),
        |_args| {
            Err(AppError::BackendUnavailable(
                "dlib backend disabled at compile time".into(),
            ))
        },
        |_outcome, _mode| Ok(()),
    );

    let err = handler.execute(OutputMode::Json, false).unwrap_err();
    match err {
        AppError::BackendUnavailable(message) => assert!(message.contains("dlib")),
        other => panic!("unexpected error: {other}"),
    }
}
