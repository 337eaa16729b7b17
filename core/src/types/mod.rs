//! Core type definitions for series selection
//!
//! This module provides the fundamental types used throughout the neurosel library:
//! - [`Modality`]: Contrast a series is acquired for (T1, T2, FLAIR, DWI, SWI)
//! - [`Provenance`]: ORIGINAL / DERIVED / UNKNOWN acquisition provenance
//! - [`SelectionMode`]: Policies for ranking candidates within a modality
//! - [`ScanCandidate`]: One acquired volume with its typed metadata
//! - [`QualityScore`] and [`CompatibilityScore`]: Scoring outputs
//! - [`Degradation`]: Recovered, non-fatal fallbacks
//! - [`SelectionConfig`]: Validated engine configuration

mod candidate;
mod config;
mod degradation;
mod enums;
mod geometry;
mod image_type;
mod score;

pub use candidate::{MetadataSource, ScanCandidate, ScannerInfo, ISOTROPIC_SEQUENCE_HINTS};
pub use config::{parse_flat_lines, ReferenceThresholds, ScoringWeights, SelectionConfig};
pub use degradation::Degradation;
pub use enums::{Confidence, Modality, Provenance, ReferenceRationale, SelectionMode};
pub use geometry::{VoxelDims, VoxelSpacing};
pub use image_type::ImageType;
pub use score::{CompatibilityScore, QualityScore};
