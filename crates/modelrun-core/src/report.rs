//! Report entries and the sinks they are streamed to.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;

use modelrun_engine::{Command, CommandKind};

use crate::classify::Classification;
use crate::orchestrator::RunResult;

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub ordinal: usize,
    pub label: String,
    pub kind: CommandKind,
    pub classification: Classification,
    /// Where the solved instance was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    /// Persistence warning: the instance could not be written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Why the command produced no verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEntry {
    pub fn new(command: &Command, classification: Classification) -> Self {
        Self {
            ordinal: command.ordinal,
            label: command.label.clone(),
            kind: command.kind,
            classification,
            artifact: None,
            warning: None,
            error: None,
        }
    }

    /// Console form: `VIOLATION_FOUND: NoThreat -> out/threats.1-nothreat.xml`.
    pub fn render_text(&self) -> String {
        let mut line = format!("{}: {}", self.classification, self.label);
        if let Some(path) = &self.artifact {
            let _ = write!(line, " -> {}", path.display());
        }
        if let Some(warning) = &self.warning {
            let _ = write!(line, " (XML_WRITE_FAILED: {warning})");
        }
        if let Some(error) = &self.error {
            let _ = write!(line, " ({error})");
        }
        line
    }
}

/// Destination for report entries, fed as each command finishes.
pub trait ReportSink {
    fn emit(&mut self, entry: &ReportEntry) -> io::Result<()>;

    /// Called once after the last entry of a run that was not aborted by an
    /// error.
    fn finish(&mut self, _result: &RunResult) -> io::Result<()> {
        Ok(())
    }
}

/// Human-readable lines, flushed per entry.
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn emit(&mut self, entry: &ReportEntry) -> io::Result<()> {
        writeln!(self.out, "{}", entry.render_text())?;
        self.out.flush()
    }
}

/// One compact JSON object per entry, then a summary object.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, entry: &ReportEntry) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, entry)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn finish(&mut self, result: &RunResult) -> io::Result<()> {
        let mut summary = serde_json::to_value(result.status)?;
        if let Some(obj) = summary.as_object_mut() {
            obj.insert("entries".into(), json!(result.entries.len()));
            obj.insert(
                "violations".into(),
                json!(result.count(Classification::Violation)),
            );
        }
        serde_json::to_writer(&mut self.out, &summary)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Keeps entries in memory; for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub entries: Vec<ReportEntry>,
    pub finished: bool,
}

impl ReportSink for MemorySink {
    fn emit(&mut self, entry: &ReportEntry) -> io::Result<()> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn finish(&mut self, _result: &RunResult) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }
}
