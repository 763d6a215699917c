use std::fmt;

use serde::Serialize;

use modelrun_engine::CommandKind;

/// Interpretation of one command's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    /// Check command with a counterexample: the property does not hold.
    #[serde(rename = "VIOLATION_FOUND")]
    Violation,
    /// Check command without a counterexample within the search bound.
    #[serde(rename = "NO_VIOLATION")]
    NoViolation,
    /// Run command with a witnessing instance.
    #[serde(rename = "INSTANCE_FOUND")]
    InstanceFound,
    /// Run command without an instance within the search bound.
    #[serde(rename = "NO_INSTANCE")]
    NoInstance,
    /// The solve exceeded its time bound and was abandoned.
    #[serde(rename = "CANCELLED")]
    Cancelled,
    /// The engine failed while solving this command.
    #[serde(rename = "COMMAND_ERROR")]
    CommandError,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Violation => "VIOLATION_FOUND",
            Classification::NoViolation => "NO_VIOLATION",
            Classification::InstanceFound => "INSTANCE_FOUND",
            Classification::NoInstance => "NO_INSTANCE",
            Classification::Cancelled => "CANCELLED",
            Classification::CommandError => "COMMAND_ERROR",
        }
    }

    /// Whether the outcome carries an instance worth persisting.
    pub fn has_instance(self) -> bool {
        matches!(
            self,
            Classification::Violation | Classification::InstanceFound
        )
    }

    /// Whether the command produced a verdict at all.
    pub fn is_conclusive(self) -> bool {
        !matches!(
            self,
            Classification::Cancelled | Classification::CommandError
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a command kind and the engine's satisfiability answer to a verdict.
pub fn classify(kind: CommandKind, satisfiable: bool) -> Classification {
    match (kind, satisfiable) {
        (CommandKind::Check, true) => Classification::Violation,
        (CommandKind::Check, false) => Classification::NoViolation,
        (CommandKind::Run, true) => Classification::InstanceFound,
        (CommandKind::Run, false) => Classification::NoInstance,
    }
}
