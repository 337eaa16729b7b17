//! Per-candidate quality scoring and pairwise compatibility
//!
//! Both are pure functions of candidate metadata and configured weights.

mod compatibility;
mod quality;

pub use compatibility::CompatibilityAnalyzer;
pub use quality::{resolution_factor, QualityScorer, REFERENCE_RESOLUTION_FACTOR};
