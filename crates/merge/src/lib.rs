//! Format-aware fragment merging for the restitch continuation engine.
//!
//! When a generation run is split across several truncated responses, plain
//! string concatenation corrupts structure: rows split mid-field, arrays
//! split mid-element, code blocks left unfenced. This crate reassembles
//! fragment sequences per format:
//!
//! - [`FormatDetector`] classifies a fragment as tabular, markup, or
//!   structured data.
//! - [`Merger`] is the shared contract; [`TabularMerger`], [`MarkupMerger`]
//!   and [`StructuredDataMerger`] implement it.
//! - [`MergerFactory`] maps a format (explicit or detected) to its merger.
//! - [`FallbackChain`] wraps a merge with degrading recovery levels so the
//!   caller always gets *something* back.
//!
//! Mergers and the detector are pure and stateless; a single instance is
//! safe to share across concurrent runs.

pub mod contract;
pub mod detector;
pub mod factory;
pub mod fallback;
pub mod markup;
pub mod structured;
pub mod tabular;

pub use contract::Merger;
pub use detector::FormatDetector;
pub use factory::MergerFactory;
pub use fallback::{FallbackChain, FallbackOutcome};
pub use markup::MarkupMerger;
pub use structured::StructuredDataMerger;
pub use tabular::TabularMerger;
