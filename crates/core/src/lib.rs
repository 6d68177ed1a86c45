//! # Restitch Core
//!
//! Domain types, traits, and error definitions for the restitch
//! continuation-and-merge engine. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! The transport (how a generation request actually reaches an LLM) is
//! defined as a trait here; implementations live outside this workspace.
//! This enables:
//! - Swapping transports via configuration
//! - Easy testing with mock/stub transports
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod format;
pub mod fragment;
pub mod result;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use error::{ConfigError, Error, MergeError, Result, TransportError};
pub use format::{FormatDetection, FormatPreference, OutputFormat};
pub use fragment::{CompletionReason, ContinuationRun, Fragment, RunId, Usage};
pub use result::{FallbackLevel, MergeResult, MergedContent};
pub use transport::{ContinuationCue, Transport, TransportRequest};
