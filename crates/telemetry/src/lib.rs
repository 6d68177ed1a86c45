//! # Restitch Telemetry
//!
//! Record-keeping for continuation runs: the append-only
//! [`MetadataAccumulator`] the controller populates during the loop, the
//! finalized [`ContinuationMetadata`] record handed to observability and
//! persistence collaborators, and the [`PricingTable`] used to estimate run
//! cost from token usage.

pub mod metadata;
pub mod pricing;

pub use metadata::{ContinuationMetadata, MetadataAccumulator};
pub use pricing::{ModelPricing, PricingTable};
