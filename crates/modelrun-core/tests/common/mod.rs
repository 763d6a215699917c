//! Scripted in-process engine shared by the orchestrator tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use modelrun_engine::{
    Command, CommandKind, Engine, EngineError, Field, Instance, Model, Outcome, Reporter, Sig,
    SolveOptions,
};

/// Scripted answer for one command label.
#[derive(Debug, Clone)]
pub enum Answer {
    Sat,
    Unsat,
    Timeout,
    Fault(&'static str),
    Crash(&'static str),
    Unstartable,
}

/// How `parse` behaves.
#[derive(Debug, Clone)]
pub enum ParseScript {
    Commands(Vec<(&'static str, CommandKind)>),
    Diagnostic(&'static str),
    Crash(&'static str),
}

pub struct MockEngine {
    parse: ParseScript,
    answers: HashMap<&'static str, Answer>,
    pub warnings: Vec<&'static str>,
    pub solved: Vec<usize>,
    pub parses: usize,
}

impl MockEngine {
    pub fn new(commands: Vec<(&'static str, CommandKind)>) -> Self {
        Self {
            parse: ParseScript::Commands(commands),
            answers: HashMap::new(),
            warnings: Vec::new(),
            solved: Vec::new(),
            parses: 0,
        }
    }

    pub fn failing_parse(script: ParseScript) -> Self {
        let mut engine = Self::new(Vec::new());
        engine.parse = script;
        engine
    }

    pub fn answer(mut self, label: &'static str, answer: Answer) -> Self {
        self.answers.insert(label, answer);
        self
    }

    pub fn warn(mut self, message: &'static str) -> Self {
        self.warnings.push(message);
        self
    }
}

pub fn threat_instance() -> Instance {
    Instance {
        sigs: vec![
            Sig {
                label: "this/Flow".into(),
                atoms: vec!["Flow$0".into()],
            },
            Sig {
                label: "this/Threat".into(),
                atoms: vec!["Threat$0".into()],
            },
        ],
        fields: vec![Field {
            label: "has_threat".into(),
            tuples: vec![vec!["Flow$0".into(), "Threat$0".into()]],
        }],
    }
}

impl Engine for MockEngine {
    fn parse(&mut self, path: &Path, reporter: &mut dyn Reporter) -> Result<Model, EngineError> {
        self.parses += 1;
        for warning in &self.warnings {
            reporter.on_warning(warning);
        }
        match &self.parse {
            ParseScript::Commands(commands) => Ok(Model::new(
                path,
                commands
                    .iter()
                    .map(|(label, kind)| Command::new(*label, *kind))
                    .collect(),
            )),
            ParseScript::Diagnostic(message) => Err(EngineError::Parse((*message).into())),
            ParseScript::Crash(message) => Err(EngineError::Protocol((*message).into())),
        }
    }

    fn solve(
        &mut self,
        _model: &Model,
        command: &Command,
        _options: &SolveOptions,
        _reporter: &mut dyn Reporter,
    ) -> Result<Outcome, EngineError> {
        self.solved.push(command.ordinal);
        match self
            .answers
            .get(command.label.as_str())
            .cloned()
            .unwrap_or(Answer::Unsat)
        {
            Answer::Sat => Ok(Outcome::sat(command, threat_instance())),
            Answer::Unsat => Ok(Outcome::unsat(command)),
            Answer::Timeout => Err(EngineError::Timeout(Duration::from_secs(600))),
            Answer::Fault(message) => Err(EngineError::Fault(message.into())),
            Answer::Crash(message) => Err(EngineError::Protocol(message.into())),
            Answer::Unstartable => Err(EngineError::Spawn {
                program: "modelrun-alloy-bridge".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not on PATH"),
            }),
        }
    }
}

/// Write a placeholder model file; the mock engine never reads it.
pub fn model_file(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "module threats\n").expect("write model");
    path
}
