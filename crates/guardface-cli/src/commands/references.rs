use std::any::Any;
use std::process::ExitCode;

use guardface_core::faces::BootstrapReport;

use crate::cli::{BootstrapArgs, GuardArgs, OutputMode, ReferencesCommands};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::{render_bootstrap, render_remove, render_status};
use crate::references::{self, ReferenceRemoval, ReferenceStatus};

pub struct ReferencesHandler {
    command: ReferencesCommands,
    deps: ReferencesHandlerDeps,
}

pub struct ReferencesHandlerDeps {
    pub bootstrap: Box<dyn Fn(&BootstrapArgs) -> AppResult<BootstrapReport> + Send + Sync>,
    pub status: Box<dyn Fn(&GuardArgs) -> AppResult<ReferenceStatus> + Send + Sync>,
    pub remove: Box<dyn Fn(&GuardArgs) -> AppResult<ReferenceRemoval> + Send + Sync>,
    pub render_bootstrap:
        Box<dyn Fn(&BootstrapReport, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_status: Box<dyn Fn(&ReferenceStatus, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_remove: Box<dyn Fn(&ReferenceRemoval, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl ReferencesHandlerDeps {
    pub fn new(
        bootstrap: impl Fn(&BootstrapArgs) -> AppResult<BootstrapReport> + Send + Sync + 'static,
        status: impl Fn(&GuardArgs) -> AppResult<ReferenceStatus> + Send + Sync + 'static,
        remove: impl Fn(&GuardArgs) -> AppResult<ReferenceRemoval> + Send + Sync + 'static,
        render_bootstrap: impl Fn(&BootstrapReport, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_status: impl Fn(&ReferenceStatus, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_remove: impl Fn(&ReferenceRemoval, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            bootstrap: Box::new(bootstrap),
            status: Box::new(status),
            remove: Box::new(remove),
            render_bootstrap: Box::new(render_bootstrap),
            render_status: Box::new(render_status),
            render_remove: Box::new(render_remove),
        }
    }
}

impl Default for ReferencesHandlerDeps {
    fn default() -> Self {
        Self::new(
            references::run_bootstrap,
            references::run_status,
            references::run_remove,
            render_bootstrap,
            render_status,
            render_remove,
        )
    }
}

impl ReferencesHandler {
    pub fn new(command: ReferencesCommands) -> Self {
        Self {
            command,
            deps: ReferencesHandlerDeps::default(),
        }
    }

    pub fn with_dependencies(command: ReferencesCommands, deps: ReferencesHandlerDeps) -> Self {
        Self { command, deps }
    }
}

impl CommandHandler for ReferencesHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            ReferencesCommands::Bootstrap(args) => {
                let report = (self.deps.bootstrap)(args)?;
                (self.deps.render_bootstrap)(&report, mode)?;
            }
            ReferencesCommands::Status(args) => {
                let status = (self.deps.status)(args)?;
                (self.deps.render_status)(&status, mode)?;
            }
            ReferencesCommands::Remove(args) => {
                let removal = (self.deps.remove)(args)?;
                (self.deps.render_remove)(&removal, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
