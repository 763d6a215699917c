use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::model::{Command, Model, Outcome, SolveOptions};
use crate::reporter::Reporter;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The model is malformed; carries the engine's diagnostic.
    #[error("{0}")]
    Parse(String),
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start engine `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("engine fault: {0}")]
    Fault(String),
}

/// The external model finder, seen through the calls the orchestrator makes.
pub trait Engine {
    /// Parse and validate the model at `path`.
    ///
    /// Warnings go to `reporter`; a malformed model is `EngineError::Parse`.
    fn parse(&mut self, path: &Path, reporter: &mut dyn Reporter) -> Result<Model, EngineError>;

    /// Solve one command of a model previously returned by `parse`.
    ///
    /// Returns `EngineError::Timeout` when `options.timeout` elapses.
    fn solve(
        &mut self,
        model: &Model,
        command: &Command,
        options: &SolveOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Outcome, EngineError>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn parse(&mut self, path: &Path, reporter: &mut dyn Reporter) -> Result<Model, EngineError> {
        (**self).parse(path, reporter)
    }

    fn solve(
        &mut self,
        model: &Model,
        command: &Command,
        options: &SolveOptions,
        reporter: &mut dyn Reporter,
    ) -> Result<Outcome, EngineError> {
        (**self).solve(model, command, options, reporter)
    }
}
