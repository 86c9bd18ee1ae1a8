//! Postflight Engine - phase-driven validation execution
//!
//! Provides the moving parts on top of the core domain model:
//! - Executes single checks with timeout, retry and backoff
//! - Sequences phases and fans checks out over a bounded worker pool
//! - Builds the builtin phase plan for each validation depth
//! - Ships in-memory fake probes for tests

pub mod catalog;
pub mod executor;
pub mod fakes;
pub mod orchestrator;

// Re-export key types
pub use catalog::plan_for;
pub use executor::{execute, ExecMode};
pub use orchestrator::Orchestrator;
