use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifact::{self, ArtifactError};

/// Default solver selection forwarded to the engine.
pub const DEFAULT_SOLVER: &str = "sat4j";

/// What a verification command asks of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Assert that a property has no counterexample.
    Check,
    /// Ask for an instance satisfying the constraints.
    Run,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Check => "check",
            CommandKind::Run => "run",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "check" => Some(CommandKind::Check),
            "run" => Some(CommandKind::Run),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verification unit declared inside a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    /// 1-based declaration position.
    pub ordinal: usize,
    pub label: String,
    pub kind: CommandKind,
    /// Bound description as the engine prints it (e.g. `for 3`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Command {
    pub fn new(label: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            ordinal: 0,
            label: label.into(),
            kind,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// A parsed model: its source path and commands in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    path: PathBuf,
    commands: Vec<Command>,
}

impl Model {
    /// Build a model; command ordinals are assigned from list position.
    pub fn new(path: impl Into<PathBuf>, commands: Vec<Command>) -> Self {
        let commands = commands
            .into_iter()
            .enumerate()
            .map(|(idx, mut command)| {
                command.ordinal = idx + 1;
                command
            })
            .collect();
        Self {
            path: path.into(),
            commands,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// File stem of the model path, used to name artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string())
    }
}

/// A signature of the solved instance and the atoms it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sig {
    pub label: String,
    #[serde(default)]
    pub atoms: Vec<String>,
}

/// A relation of the solved instance as a list of atom tuples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub label: String,
    #[serde(default)]
    pub tuples: Vec<Vec<String>>,
}

/// Concrete assignment found by the engine (instance or counterexample).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub sigs: Vec<Sig>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Instance {
    pub fn field(&self, label: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty() && self.fields.is_empty()
    }
}

/// Result of solving one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub ordinal: usize,
    pub label: String,
    pub kind: CommandKind,
    satisfiable: bool,
    instance: Option<Instance>,
}

impl Outcome {
    pub fn sat(command: &Command, instance: Instance) -> Self {
        Self {
            ordinal: command.ordinal,
            label: command.label.clone(),
            kind: command.kind,
            satisfiable: true,
            instance: Some(instance),
        }
    }

    pub fn unsat(command: &Command) -> Self {
        Self {
            ordinal: command.ordinal,
            label: command.label.clone(),
            kind: command.kind,
            satisfiable: false,
            instance: None,
        }
    }

    pub fn satisfiable(&self) -> bool {
        self.satisfiable
    }

    /// Present iff the outcome is satisfiable.
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    /// Write this outcome as an XML artifact at `path`.
    pub fn serialize_to(&self, path: &Path, source: &Path) -> Result<(), ArtifactError> {
        artifact::write_outcome(path, self, source)
    }
}

/// Options forwarded to `Engine::solve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOptions {
    /// Opaque solver selection passed through to the engine unchanged.
    pub solver: String,
    /// Wall-clock bound for one solve; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SolveOptions {
    /// `0` disables the per-command bound.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout = if timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(timeout_secs))
        };
        self
    }
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            solver: DEFAULT_SOLVER.to_string(),
            timeout: None,
        }
    }
}
