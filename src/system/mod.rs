//! System module: host detection and per-invocation environment composition.
//!
//! Nothing here mutates process-global state. The ambient environment is snapshotted once
//! and every invocation gets its own composed copy.

pub mod env;
pub mod host;

pub use env::{ambient_environment, compose_environment, Environment};
pub use host::detect_host;
