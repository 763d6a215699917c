//! Bridge protocol messages.
//!
//! Every request and response is a single JSON object on its own line.
//! A request is answered by any number of `warning` lines followed by
//! exactly one terminal response (`parsed`, `solved` or `error`).

use serde::{Deserialize, Serialize};

use crate::model::{Command, CommandKind, Instance};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request<'a> {
    Parse { path: &'a str },
    Solve { command: usize, solver: &'a str },
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Warning {
        message: String,
    },
    Parsed {
        #[serde(default)]
        commands: Vec<WireCommand>,
    },
    Solved {
        satisfiable: bool,
        #[serde(default)]
        instance: Option<Instance>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::Warning { .. } => "warning",
            Response::Parsed { .. } => "parsed",
            Response::Solved { .. } => "solved",
            Response::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WireCommand {
    pub label: String,
    pub check: bool,
    #[serde(default)]
    pub scope: Option<String>,
}

impl From<WireCommand> for Command {
    fn from(wire: WireCommand) -> Self {
        let kind = if wire.check {
            CommandKind::Check
        } else {
            CommandKind::Run
        };
        let command = Command::new(wire.label, kind);
        match wire.scope {
            Some(scope) => command.with_scope(scope),
            None => command,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Fault,
}

pub fn encode_request(request: &Request<'_>) -> Result<String, serde_json::Error> {
    serde_json::to_string(request)
}

pub fn decode_response(line: &str) -> Result<Response, serde_json::Error> {
    serde_json::from_str(line)
}
