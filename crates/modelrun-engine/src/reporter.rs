//! Warning channel handed to the engine for each parse and solve call.

/// Receives non-fatal diagnostics from the engine.
pub trait Reporter {
    fn on_warning(&mut self, message: &str);
}

/// Forwards engine warnings to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn on_warning(&mut self, message: &str) {
        tracing::warn!("relevance warning: {}", message.trim());
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingReporter {
    pub warnings: Vec<String>,
}

impl Reporter for CollectingReporter {
    fn on_warning(&mut self, message: &str) {
        self.warnings.push(message.trim().to_string());
    }
}

/// Drops every warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_warning(&mut self, _message: &str) {}
}
