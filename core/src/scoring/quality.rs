use log::debug;

use crate::types::{QualityScore, ScanCandidate, ScoringWeights, SelectionConfig, VoxelDims, VoxelSpacing};

/// Resolution factor of a 256x256x176 grid at 1 mm isotropic
///
/// Used to normalize [`resolution_factor`] so a typical 1 mm structural
/// scan earns exactly `RESOLUTION_WEIGHT` points.
pub const REFERENCE_RESOLUTION_FACTOR: f64 = 256.0 * 256.0 * 176.0;

/// Raw resolution factor favoring fine in-plane spacing and penalizing anisotropy
///
/// `voxelCount / (inplane^2 * through * sqrt(through / inplane))`
///
/// Returns 0 for non-positive or non-finite spacing.
pub fn resolution_factor(dims: &VoxelDims, spacing: &VoxelSpacing) -> f64 {
    if !spacing.is_valid() {
        return 0.0;
    }
    let inplane = spacing.inplane();
    let through = spacing.through_plane();
    let anisotropy = (through / inplane).sqrt();
    dims.voxel_count() as f64 / (inplane * inplane * through * anisotropy)
}

/// Weighted per-candidate quality scorer
///
/// `total = provenance + isotropy + resolution + quality + modality_fit`
///
/// # Example
///
/// ```
/// use neurosel_core::{ImageType, Modality, QualityScorer, ScanCandidate, ScoringWeights, VoxelDims, VoxelSpacing};
///
/// let scorer = QualityScorer::new(ScoringWeights::default());
/// let t1 = ScanCandidate::new(
///     "T1_MPRAGE.nii.gz",
///     Modality::T1,
///     VoxelDims::new(256, 256, 176),
///     VoxelSpacing::uniform(1.0),
/// )
/// .with_image_type(ImageType::from_values(["ORIGINAL", "PRIMARY"]))
/// .with_series_description("t1_mprage_sag")
/// .with_quality(80.0);
///
/// let score = scorer.score(&t1);
/// assert_eq!(score.provenance, 1000.0);
/// assert_eq!(score.isotropy, 300.0);
/// assert_eq!(score.resolution, 200.0);
/// assert_eq!(score.quality, 120.0);
/// assert_eq!(score.modality_fit, 100.0);
/// assert_eq!(score.total, 1720.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScorer {
    weights: ScoringWeights,
}

impl QualityScorer {
    /// Creates a scorer with the given weights
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Creates a scorer from the engine configuration
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(config.weights)
    }

    /// Weights in use
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores one candidate
    pub fn score(&self, candidate: &ScanCandidate) -> QualityScore {
        let score = QualityScore::from_components(
            self.provenance_component(candidate),
            self.isotropy_component(candidate),
            self.resolution_component(candidate),
            self.quality_component(candidate),
            self.modality_component(candidate),
        );
        debug!("Scored {}: {}", candidate.file_name(), score);
        score
    }

    /// Bonus for ORIGINAL acquisitions; DERIVED and UNKNOWN earn nothing
    fn provenance_component(&self, candidate: &ScanCandidate) -> f64 {
        if candidate.provenance.is_original() {
            self.weights.original_bonus
        } else {
            0.0
        }
    }

    fn isotropy_component(&self, candidate: &ScanCandidate) -> f64 {
        if candidate.is_3d_isotropic(self.weights.isotropy_tolerance) {
            self.weights.dimensionality
        } else {
            0.0
        }
    }

    fn resolution_component(&self, candidate: &ScanCandidate) -> f64 {
        let factor = resolution_factor(&candidate.dims, &candidate.spacing);
        self.weights.resolution * factor / REFERENCE_RESOLUTION_FACTOR
    }

    fn quality_component(&self, candidate: &ScanCandidate) -> f64 {
        candidate
            .quality
            .map(|q| self.weights.quality * q.clamp(0.0, 100.0) / 100.0)
            .unwrap_or(0.0)
    }

    fn modality_component(&self, candidate: &ScanCandidate) -> f64 {
        if candidate.matches_modality_role() {
            self.weights.modality
        } else {
            0.0
        }
    }
}
