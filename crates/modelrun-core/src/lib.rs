#![doc = include_str!("../README.md")]

//! Verification run orchestrator.
//!
//! Drives one model through the engine: parse, enumerate commands, solve
//! each one in declaration order, classify the outcome, stream a report
//! entry, and persist solved instances. Failures outside a single solve are
//! surfaced as [`RunError`] for the caller to turn into a crash record.

pub mod artifacts;
pub mod classify;
pub mod crash;
pub mod orchestrator;
pub mod report;

pub use classify::{classify, Classification};
pub use crash::{CrashRecord, DEFAULT_CRASH_LOG};
pub use orchestrator::{FailurePolicy, Orchestrator, RunConfig, RunError, RunResult, RunStatus};
pub use report::{JsonLinesSink, MemorySink, ReportEntry, ReportSink, TextSink};
