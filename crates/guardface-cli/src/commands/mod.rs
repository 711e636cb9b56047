use std::any::Any;
use std::process::ExitCode;

use crate::cli::{Commands, OutputMode};
use crate::errors::AppResult;

pub trait CommandHandler: Send + Sync {
    fn execute(&self, mode: OutputMode, verbose: bool) -> AppResult<ExitCode>;
    fn as_any(&self) -> &dyn Any;
}

mod doctor;
mod recognize;
mod references;

pub use doctor::DoctorHandler;
pub use recognize::RecognizeHandler;
pub use references::{ReferencesHandler, ReferencesHandlerDeps};

impl From<Commands> for Box<dyn CommandHandler> {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Recognize(args) => Box::new(RecognizeHandler::new(args)),
            Commands::References(cmd) => Box::new(ReferencesHandler::new(cmd)),
            Commands::Doctor(args) => Box::new(DoctorHandler::new(args)),
        }
    }
}
