use std::fmt;

/// Weighted per-candidate quality score
///
/// `total` is always the sum of the five components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct QualityScore {
    pub provenance: f64,
    pub isotropy: f64,
    pub resolution: f64,
    pub quality: f64,
    pub modality_fit: f64,
    pub total: f64,
}

impl QualityScore {
    /// Builds a score from its components, computing the total
    pub fn from_components(
        provenance: f64,
        isotropy: f64,
        resolution: f64,
        quality: f64,
        modality_fit: f64,
    ) -> Self {
        Self {
            provenance,
            isotropy,
            resolution,
            quality,
            modality_fit,
            total: provenance + isotropy + resolution + quality + modality_fit,
        }
    }

    /// Resolution plus isotropy terms
    pub fn geometric(&self) -> f64 {
        self.resolution + self.isotropy
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} (provenance {:.0}, isotropy {:.0}, resolution {:.1}, quality {:.1}, modality {:.0})",
            self.total, self.provenance, self.isotropy, self.resolution, self.quality, self.modality_fit
        )
    }
}

/// Compatibility of a candidate with a stated reference candidate
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct CompatibilityScore {
    /// In (0, 100]; 100 means identical voxel aspect ratios
    pub aspect_ratio_similarity: f64,
    /// Identical (nx, ny, nz)
    pub dimension_match: bool,
}
