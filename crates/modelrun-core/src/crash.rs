//! Crash records: the last-resort diagnostic written when a run dies.

use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// File name used when the caller does not pick one.
pub const DEFAULT_CRASH_LOG: &str = "crash.log";

/// Marker prefixed to the one-line crash summary on stderr.
pub const CRASH_DUMP_MARKER: &str = "CRASH_DUMP:";

#[derive(Debug)]
pub struct CrashRecord {
    pub message: String,
    /// Source chain, outermost cause first (excluding `message` itself).
    pub causes: Vec<String>,
    pub context: Vec<(String, String)>,
    pub timestamp: u64,
    pub backtrace: String,
}

impl CrashRecord {
    fn new(message: String, causes: Vec<String>) -> Self {
        Self {
            message,
            causes,
            context: Vec::new(),
            timestamp: unix_now(),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self::new(err.to_string(), causes)
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(format!("panic: {message}"), Vec::new())
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Single line for stderr.
    pub fn summary(&self) -> String {
        format!("{CRASH_DUMP_MARKER} {}", self.message)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.summary());
        let _ = writeln!(out, "timestamp: {}", self.timestamp);
        for (key, value) in &self.context {
            let _ = writeln!(out, "{key}: {value}");
        }
        for cause in &self.causes {
            let _ = writeln!(out, "caused by: {cause}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "backtrace:");
        out.push_str(&self.backtrace);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Overwrites any previous record at `path`.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.render())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
