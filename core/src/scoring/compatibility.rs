use crate::types::{CompatibilityScore, ScanCandidate};

/// Pairwise cross-candidate compatibility
///
/// Predicts how well two volumes will register by comparing their voxel
/// aspect ratios and grids.
pub struct CompatibilityAnalyzer;

impl CompatibilityAnalyzer {
    /// Similarity of voxel-spacing ratios in (0, 100]
    ///
    /// Each spacing vector is normalized by its own smallest component and
    /// the Euclidean distance `d` between the normalized vectors mapped to
    /// `100 / (1 + 10d)`. Symmetric; identical ratios give 100.
    pub fn aspect_ratio_similarity(a: &ScanCandidate, b: &ScanCandidate) -> f64 {
        let na = a.spacing.normalized();
        let nb = b.spacing.normalized();
        let d = na
            .iter()
            .zip(nb.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt();
        100.0 / (1.0 + 10.0 * d)
    }

    /// True iff (nx, ny, nz) are identical
    pub fn dimension_match(a: &ScanCandidate, b: &ScanCandidate) -> bool {
        a.dims == b.dims
    }

    /// Both metrics of `candidate` relative to `reference`
    pub fn compare(candidate: &ScanCandidate, reference: &ScanCandidate) -> CompatibilityScore {
        CompatibilityScore {
            aspect_ratio_similarity: Self::aspect_ratio_similarity(candidate, reference),
            dimension_match: Self::dimension_match(candidate, reference),
        }
    }
}
