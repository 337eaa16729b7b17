use std::fmt;
use std::path::{Path, PathBuf};

use super::{ImageType, Modality, Provenance, VoxelDims, VoxelSpacing};

/// Sequence-name fragments that identify 3D isotropic acquisitions
pub const ISOTROPIC_SEQUENCE_HINTS: [&str; 6] = ["MPRAGE", "SPACE", "CUBE", "VISTA", "BRAVO", "3D"];

/// Where a candidate's acquisition metadata came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum MetadataSource {
    /// JSON sidecar next to the volume
    Sidecar,
    /// DICOM header of the volume itself
    DicomHeader,
    /// Volume header only; provenance is unknown
    HeaderOnly,
}

impl MetadataSource {
    /// Returns whether acquisition metadata had to be guessed
    pub fn is_degraded(&self) -> bool {
        matches!(self, MetadataSource::HeaderOnly)
    }
}

/// Scanner identification carried along for reporting
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ScannerInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    /// Field strength in tesla
    pub field_strength: Option<f64>,
}

impl ScannerInfo {
    /// Normalizes vendor names (SIEMENS, PHILIPS, GE, otherwise upper-cased)
    pub fn normalize_manufacturer(raw: &str) -> String {
        let lower = raw.trim().to_lowercase();
        if lower.contains("siemens") {
            "SIEMENS".to_string()
        } else if lower.contains("philips") {
            "PHILIPS".to_string()
        } else if lower.starts_with("ge") || lower.contains("general electric") {
            "GE".to_string()
        } else {
            raw.trim().to_uppercase()
        }
    }

    /// Field strength rendered as e.g. "3.0T"
    pub fn field_strength_label(&self) -> Option<String> {
        self.field_strength.map(|t| format!("{:.1}T", t))
    }
}

impl fmt::Display for ScannerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.manufacturer.as_deref().unwrap_or("unknown"),
            self.model.as_deref().unwrap_or("unknown")
        )?;
        if let Some(label) = self.field_strength_label() {
            write!(f, " ({})", label)?;
        }
        Ok(())
    }
}

/// One acquired volume that could serve as a modality's input
///
/// Created once per catalog build and never mutated by scoring or
/// ranking.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ScanCandidate {
    /// Path to the volume file
    pub path: PathBuf,

    /// Modality the filename matched
    pub modality: Modality,

    /// Voxel grid dimensions
    pub dims: VoxelDims,

    /// Voxel spacing in mm
    pub spacing: VoxelSpacing,

    /// ORIGINAL / DERIVED / UNKNOWN
    pub provenance: Provenance,

    /// Raw ImageType, when known
    pub image_type: Option<ImageType>,

    /// Series description / sequence name
    pub series_description: String,

    /// File size in bytes
    pub file_size: u64,

    /// Externally supplied intensity-quality figure (0-100)
    pub quality: Option<f64>,

    /// Scanner identification
    pub scanner: ScannerInfo,

    /// Origin of acquisition metadata
    pub metadata_source: MetadataSource,
}

impl ScanCandidate {
    /// Creates a header-only candidate; use the `with_*` builders to add metadata
    pub fn new(
        path: impl Into<PathBuf>,
        modality: Modality,
        dims: VoxelDims,
        spacing: VoxelSpacing,
    ) -> Self {
        Self {
            path: path.into(),
            modality,
            dims,
            spacing,
            provenance: Provenance::Unknown,
            image_type: None,
            series_description: String::new(),
            file_size: 0,
            quality: None,
            scanner: ScannerInfo::default(),
            metadata_source: MetadataSource::HeaderOnly,
        }
    }

    /// Builder: set provenance directly
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Builder: set ImageType and the provenance it implies
    pub fn with_image_type(mut self, image_type: ImageType) -> Self {
        self.provenance = image_type.provenance();
        self.image_type = Some(image_type);
        self
    }

    /// Builder: set series description
    pub fn with_series_description(mut self, description: impl Into<String>) -> Self {
        self.series_description = description.into();
        self
    }

    /// Builder: set quality figure (clamped to 0-100)
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = Some(quality.clamp(0.0, 100.0));
        self
    }

    /// Builder: set file size
    pub fn with_file_size(mut self, bytes: u64) -> Self {
        self.file_size = bytes;
        self
    }

    /// Builder: set scanner info
    pub fn with_scanner(mut self, scanner: ScannerInfo) -> Self {
        self.scanner = scanner;
        self
    }

    /// Builder: set metadata source
    pub fn with_metadata_source(mut self, source: MetadataSource) -> Self {
        self.metadata_source = source;
        self
    }

    /// File name for display
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Series name contains a known 3D sequence fragment
    pub fn has_isotropic_hint(&self) -> bool {
        let name = self.series_description.to_uppercase();
        ISOTROPIC_SEQUENCE_HINTS.iter().any(|hint| name.contains(hint))
    }

    /// 3D-isotropic by sequence hint or by spacing within `tolerance`
    pub fn is_3d_isotropic(&self, tolerance: f64) -> bool {
        self.has_isotropic_hint() || self.spacing.is_isotropic(tolerance)
    }

    /// Series name matches the contrast role expected for its modality
    pub fn matches_modality_role(&self) -> bool {
        let name = self.series_description.to_uppercase();
        if name.is_empty() {
            return false;
        }
        self.modality.role_hints().iter().any(|hint| name.contains(hint))
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
