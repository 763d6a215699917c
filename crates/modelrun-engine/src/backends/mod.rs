//! Engine backends.
//!
//! `bridge` drives the model finder as a child process over the
//! line-delimited JSON protocol described in `wire`.

pub mod bridge;
pub mod wire;
