//! # Restitch Engine
//!
//! The continuation controller: drives the bounded request/accumulate loop
//! against a [`restitch_core::Transport`], decides when generation is
//! finished or exhausted, and hands the collected fragments to the merge
//! layer's fallback chain. One controller run corresponds to one logical
//! caller request; independent runs share no mutable state.

pub mod controller;

pub use controller::{ContinuationController, ContinuationOutcome, RunState};
