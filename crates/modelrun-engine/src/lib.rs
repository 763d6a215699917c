#![doc = include_str!("../README.md")]

//! Boundary to the external model verification engine.
//!
//! This crate defines the narrow interface the orchestrator consumes
//! (parse a model, enumerate its commands, solve one command), the data it
//! exchanges across that boundary, a process-backed engine that speaks a
//! line-delimited JSON bridge protocol, and the XML codec used to persist
//! solved instances.

pub mod artifact;
pub mod backends;
pub mod engine;
pub mod model;
pub mod reporter;

pub use artifact::{clean_label, read_artifact, ArtifactDocument, ArtifactError};
pub use backends::bridge::{BridgeConfig, BridgeEngine, DEFAULT_BRIDGE_PROGRAM};
pub use engine::{Engine, EngineError};
pub use model::{
    Command, CommandKind, Field, Instance, Model, Outcome, Sig, SolveOptions, DEFAULT_SOLVER,
};
pub use reporter::{CollectingReporter, NullReporter, Reporter, TracingReporter};
