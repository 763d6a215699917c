//! Artifact naming and housekeeping.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use modelrun_engine::{Command, Model};

/// Reduce free text to a filesystem-safe, lowercase path component.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch.to_ascii_lowercase());
        } else if ch == '.' || ch == '/' || ch == '\\' || ch.is_whitespace() {
            out.push('_');
        }
    }
    let compact = out.trim_matches('_');
    if compact.is_empty() {
        "command".to_string()
    } else {
        compact.to_string()
    }
}

/// `<out_dir>/<model-stem>.<ordinal>-<label>.xml`
///
/// The ordinal keeps two commands apart even when their labels sanitize to
/// the same text.
pub fn artifact_path(out_dir: &Path, model: &Model, command: &Command) -> PathBuf {
    out_dir.join(format!(
        "{}.{}-{}.xml",
        sanitize_component(&model.stem()),
        command.ordinal,
        sanitize_component(&command.label)
    ))
}

/// Delete a leftover artifact from an earlier run. Missing files are fine;
/// anything else is logged and left for the write to report.
pub fn remove_stale(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale artifact"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), "could not remove stale artifact: {err}"),
    }
}
