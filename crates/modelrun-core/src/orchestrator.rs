//! The run loop: parse once, then solve, classify, persist and report each
//! command in declaration order.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use modelrun_engine::{Command, Engine, EngineError, Model, Reporter, SolveOptions};

use crate::artifacts::{artifact_path, remove_stale};
use crate::classify::{classify, Classification};
use crate::report::{ReportEntry, ReportSink};

/// What to do when the engine fails on one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record a `COMMAND_ERROR` entry and continue with the next command.
    ///
    /// Covers engine faults and an engine process that dies mid-solve. An
    /// engine that cannot be started or written to still ends the run.
    #[default]
    Isolate,
    /// Record the `COMMAND_ERROR` entry and stop the run.
    Abort,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub solve: SolveOptions,
    /// Write XML artifacts for violations and instances.
    pub persist: bool,
    pub out_dir: PathBuf,
    pub failure_policy: FailurePolicy,
    /// Restrict the run to commands with this label.
    pub only: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            solve: SolveOptions::default(),
            persist: true,
            out_dir: PathBuf::from("."),
            failure_policy: FailurePolicy::default(),
            only: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every selected command was processed, whatever its verdict.
    Completed,
    /// Stopped after the command with this ordinal failed.
    Aborted { ordinal: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: RunStatus,
    pub entries: Vec<ReportEntry>,
}

impl RunResult {
    /// Violations do not fail the process; only an aborted run does.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Completed => 0,
            RunStatus::Aborted { .. } => 1,
        }
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.entries
            .iter()
            .filter(|e| e.classification == classification)
            .count()
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to parse {}: {diagnostic}", .path.display())]
    Parse { path: PathBuf, diagnostic: String },

    #[error("unexpected engine failure during {stage}")]
    UnexpectedFault {
        stage: String,
        #[source]
        source: EngineError,
    },

    #[error("failed to write report: {0}")]
    Report(#[from] io::Error),
}

impl RunError {
    /// Whether this failure warrants a crash record rather than a plain
    /// error line.
    pub fn is_crash(&self) -> bool {
        matches!(self, RunError::UnexpectedFault { .. } | RunError::Report(_))
    }
}

pub struct Orchestrator<E: Engine> {
    engine: E,
    config: RunConfig,
}

impl<E: Engine> Orchestrator<E> {
    pub fn new(engine: E, config: RunConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Run every selected command of the model at `path`.
    ///
    /// Entries reach `sink` as soon as each command finishes. A parse
    /// diagnostic ends the run before any entry is emitted.
    pub fn run(
        &mut self,
        path: &Path,
        sink: &mut dyn ReportSink,
        reporter: &mut dyn Reporter,
    ) -> Result<RunResult, RunError> {
        if path.as_os_str().is_empty() {
            return Err(RunError::InvalidInput("no model path given".into()));
        }
        if !path.is_file() {
            return Err(RunError::InvalidInput(format!(
                "model `{}` does not exist or is not a file",
                path.display()
            )));
        }

        info!(model = %path.display(), "parsing model");
        let model = self.engine.parse(path, reporter).map_err(|err| match err {
            EngineError::Parse(diagnostic) => RunError::Parse {
                path: path.to_path_buf(),
                diagnostic,
            },
            other => RunError::UnexpectedFault {
                stage: format!("parse of {}", path.display()),
                source: other,
            },
        })?;

        let selected = self.select(&model)?;
        info!(
            declared = model.commands().len(),
            selected = selected.len(),
            "model parsed"
        );

        let mut entries = Vec::with_capacity(selected.len());
        let mut status = RunStatus::Completed;
        for command in selected {
            let entry = self.execute(&model, command, reporter)?;
            sink.emit(&entry)?;
            let failed = entry.classification == Classification::CommandError;
            entries.push(entry);
            if failed && self.config.failure_policy == FailurePolicy::Abort {
                warn!(command = %command.label, "stopping run after command error");
                status = RunStatus::Aborted {
                    ordinal: command.ordinal,
                };
                break;
            }
        }

        let result = RunResult { status, entries };
        sink.finish(&result)?;
        info!(
            entries = result.entries.len(),
            violations = result.count(Classification::Violation),
            "run finished"
        );
        Ok(result)
    }

    fn select<'m>(&self, model: &'m Model) -> Result<Vec<&'m Command>, RunError> {
        let Some(label) = self.config.only.as_deref() else {
            return Ok(model.commands().iter().collect());
        };
        let selected: Vec<&Command> = model
            .commands()
            .iter()
            .filter(|c| c.label == label)
            .collect();
        if selected.is_empty() {
            return Err(RunError::InvalidInput(format!(
                "model declares no command named `{label}`"
            )));
        }
        Ok(selected)
    }

    fn execute(
        &mut self,
        model: &Model,
        command: &Command,
        reporter: &mut dyn Reporter,
    ) -> Result<ReportEntry, RunError> {
        let artifact = self
            .config
            .persist
            .then(|| artifact_path(&self.config.out_dir, model, command));
        if let Some(path) = &artifact {
            remove_stale(path);
        }

        let started = Instant::now();
        let solved = self
            .engine
            .solve(model, command, &self.config.solve, reporter);
        debug!(
            command = %command.label,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solve returned"
        );

        let outcome = match solved {
            Ok(outcome) => outcome,
            Err(EngineError::Timeout(limit)) => {
                warn!(command = %command.label, "solve timed out after {limit:?}");
                let mut entry = ReportEntry::new(command, Classification::Cancelled);
                entry.error = Some(format!("timed out after {limit:?}"));
                return Ok(entry);
            }
            Err(EngineError::Fault(message)) => {
                warn!(command = %command.label, "solve failed: {message}");
                let mut entry = ReportEntry::new(command, Classification::CommandError);
                entry.error = Some(message);
                return Ok(entry);
            }
            // The engine process died on this command; the backend starts a
            // fresh one for the next.
            Err(err @ EngineError::Protocol(_)) => {
                warn!(command = %command.label, "engine lost during solve: {err}");
                let mut entry = ReportEntry::new(command, Classification::CommandError);
                entry.error = Some(err.to_string());
                return Ok(entry);
            }
            Err(other) => {
                return Err(RunError::UnexpectedFault {
                    stage: format!("solve of `{}`", command.label),
                    source: other,
                })
            }
        };

        let classification = classify(command.kind, outcome.satisfiable());
        let mut entry = ReportEntry::new(command, classification);
        if classification.has_instance() {
            if let Some(path) = artifact {
                match outcome.serialize_to(&path, model.path()) {
                    Ok(()) => entry.artifact = Some(path),
                    Err(err) => {
                        warn!(
                            command = %command.label,
                            path = %path.display(),
                            "could not write artifact: {err}"
                        );
                        entry.warning = Some(err.to_string());
                    }
                }
            }
        }
        Ok(entry)
    }
}
