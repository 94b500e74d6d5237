//! ONNX Runtime Extensions build driver
//!
//! Turns a set of operator options into a validated `BuildPlan`, derives the per-platform
//! toolchain arguments from a single rule table, schedules the Update → Clean → Build → Test
//! phases and drives the external configure/build/test tools one process at a time.
//!
//! The system is organized into functional modules:
//! - **error**: Error hierarchy (configuration vs. build failures)
//! - **models**: Core data structures (`BuildPlan`, targets, variants, invocations)
//! - **config**: Option bag, validation and plan resolution
//! - **policy**: Platform/toolchain matrix
//! - **system**: Host detection and environment composition
//! - **orchestrator**: Phase scheduling, process execution, xcframework packaging
//! - **cli**: Command-line surface and `@file` expansion
//! - **log_collector**: Console and session-file logging

// Core foundational modules
pub mod error;
pub mod models;

// Option bag and the resolver producing the BuildPlan
pub mod config;

// Host x target rule table
pub mod policy;

// Host detection, environment snapshots
pub mod system;

// Phase scheduling and process execution
pub mod orchestrator;

// Command-line surface
pub mod cli;

// Console + session file logging
pub mod log_collector;

// Re-export the log crate for macro usage
pub use log;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use error::{AppError, BuildError, ConfigError, Result};

pub use models::{
    AndroidAbi, BuildPlan, BuildVariant, Define, EnvOverride, ExecutionResult, Generator, HostInfo, HostOs,
    Parallelism, TargetPlatform, ToolInvocation,
};

pub use config::{resolve_build_plan, BuildOptions};

pub use policy::{derive_toolchain_policy, BuildBackend, ToolchainPolicy};

pub use orchestrator::{
    run_pipeline, schedule_phases, Orchestrator, Phase, PhaseRequest, PhaseSchedule, ProcessRunner,
    RecordingRunner, RunReport, SystemRunner,
};

pub use log_collector::{init_logging, LogCollector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
