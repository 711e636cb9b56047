use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use guardface_cli::cli::{ConfigArgs, OutputMode, RecognizeArgs};
use guardface_cli::commands::{CommandHandler, RecognizeHandler};
use guardface_cli::errors::AppError;
use guardface_core::faces::RecognitionResult;

fn args() -> RecognizeArgs {
    RecognizeArgs {
        guard_id: "g1".into(),
        image: PathBuf::from("photo.jpg"),
        threshold: Some(0.85),
        landmark_model: None,
        encoder_model: None,
        config: ConfigArgs::default(),
    }
}

fn handler_returning(
    result: RecognitionResult,
    rendered: Arc<Mutex<Vec<RecognitionResult>>>,
) -> RecognizeHandler {
    RecognizeHandler::with_dependencies(
        args(),
        move |args| {
            assert_eq!(args.guard_id, "g1");
            assert_eq!(args.threshold, Some(0.85));
            Ok(result.clone())
        },
        move |result, _mode| {
            rendered.lock().unwrap().push(result.clone());
            Ok(())
        },
    )
}

#[test]
fn accepted_guard_exits_zero() {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let handler = handler_returning(
        RecognitionResult {
            success: true,
            guard_id: Some("g1".into()),
            similarity: Some(0.92),
            message: "recognition succeeded".into(),
        },
        Arc::clone(&rendered),
    );

    let code = handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(rendered.lock().unwrap().len(), 1);
}

#[test]
fn rejected_guard_exits_one_after_rendering() {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let handler = handler_returning(
        RecognitionResult {
            success: false,
            guard_id: None,
            similarity: Some(0.31),
            message: "face does not match".into(),
        },
        Arc::clone(&rendered),
    );

    let code = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(code, ExitCode::from(1));
    let rendered = rendered.lock().unwrap();
    assert_eq!(rendered[0].similarity, Some(0.31));
}

#[test]
fn store_errors_skip_rendering() {
    let handler = RecognizeHandler::with_dependencies(
        args(),
        |_args| {
            Err(AppError::StoreUnavailable {
                message: "connection refused".into(),
            })
        },
        |_result, _mode| panic!("render should not run"),
    );

    let err = handler.execute(OutputMode::Json, false).unwrap_err();
    assert!(matches!(err, AppError::StoreUnavailable { .. }));
    assert_eq!(err.exit_code(), ExitCode::from(4));
}
