use std::any::Any;
use std::process::ExitCode;

use guardface_core::faces::RecognitionResult;

use crate::cli::{OutputMode, RecognizeArgs};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_recognition;
use crate::recognize;

/// Exit status 0 means the guard was accepted; a rejected face (mismatch or
/// no face) exits 1 so callers can branch on the status alone.
pub struct RecognizeHandler {
    args: RecognizeArgs,
    recognize: Box<dyn Fn(&RecognizeArgs) -> AppResult<RecognitionResult> + Send + Sync>,
    render: Box<dyn Fn(&RecognitionResult, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl RecognizeHandler {
    pub fn new(args: RecognizeArgs) -> Self {
        Self::with_dependencies(args, recognize::run_recognize, render_recognition)
    }

    pub fn with_dependencies(
        args: RecognizeArgs,
        recognize: impl Fn(&RecognizeArgs) -> AppResult<RecognitionResult> + Send + Sync + 'static,
        render: impl Fn(&RecognitionResult, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            args,
            recognize: Box::new(recognize),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for RecognizeHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        let result = (self.recognize)(&self.args)?;
        (self.render)(&result, mode)?;
        Ok(if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
