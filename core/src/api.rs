use std::path::Path;

use crate::catalog::{detect_modality, read_candidate, AutoHeaderReader, HeaderReader};
use crate::error::{NeuroselError, Result};
use crate::scoring::QualityScorer;
use crate::types::{Modality, QualityScore, ScanCandidate, SelectionConfig};

/// One volume read and scored on its own
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct VolumeInspection {
    pub candidate: ScanCandidate,
    pub score: QualityScore,
    /// Whether the volume counts as 3D isotropic under the configured tolerance
    pub is_3d_isotropic: bool,
}

/// Single-volume entry point
///
/// Reads one volume the way the catalog does (header, then sidecar or
/// embedded DICOM metadata) and scores it with the configured weights.
///
/// # Example
///
/// ```
/// use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
/// use dicom_object::InMemDicomObject;
/// use neurosel_core::catalog::{DicomHeaderReader, HeaderReader, VolumeHeader};
/// use neurosel_core::{Modality, Provenance, Result, SelectionConfig, VolumeInspector};
/// use std::path::Path;
///
/// // Serves a header already held in memory
/// struct InMemory(InMemDicomObject);
///
/// impl HeaderReader for InMemory {
///     fn read_header(&self, path: &Path) -> Result<VolumeHeader> {
///         DicomHeaderReader::from_object(path, &self.0)
///     }
/// }
///
/// let mut dcm = InMemDicomObject::new_empty();
/// dcm.put(DataElement::new(
///     Tag(0x0008, 0x0008), // ImageType
///     VR::CS,
///     PrimitiveValue::Strs(vec!["ORIGINAL".to_string(), "PRIMARY".to_string()].into()),
/// ));
/// dcm.put(DataElement::new(
///     Tag(0x0008, 0x103E), // SeriesDescription
///     VR::LO,
///     PrimitiveValue::from("t1_mprage_sag"),
/// ));
/// dcm.put(DataElement::new(Tag(0x0028, 0x0010), VR::US, PrimitiveValue::from(256_u16))); // Rows
/// dcm.put(DataElement::new(Tag(0x0028, 0x0011), VR::US, PrimitiveValue::from(256_u16))); // Columns
/// dcm.put(DataElement::new(Tag(0x0028, 0x0008), VR::IS, PrimitiveValue::from("176"))); // NumberOfFrames
/// dcm.put(DataElement::new(Tag(0x0028, 0x0030), VR::DS, PrimitiveValue::from("1.0\\1.0"))); // PixelSpacing
/// dcm.put(DataElement::new(Tag(0x0018, 0x0050), VR::DS, PrimitiveValue::from("1.0"))); // SliceThickness
///
/// let inspector = VolumeInspector::new(SelectionConfig::default()).unwrap();
/// let inspection = inspector
///     .inspect_with_reader(Path::new("T1_MPRAGE.dcm"), Some(Modality::T1), &InMemory(dcm))
///     .unwrap();
///
/// assert_eq!(inspection.candidate.provenance, Provenance::Original);
/// assert!(inspection.is_3d_isotropic);
/// assert_eq!(inspection.score.total, 1600.0);
/// ```
pub struct VolumeInspector {
    config: SelectionConfig,
    scorer: QualityScorer,
}

impl VolumeInspector {
    /// Creates an inspector with the given configuration
    ///
    /// # Errors
    ///
    /// `NeuroselError::Config` when the configuration fails validation.
    pub fn new(config: SelectionConfig) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            scorer: QualityScorer::from_config(&config),
            config,
        })
    }

    /// Reads and scores a volume, dispatching on its extension
    pub fn inspect(&self, path: &Path, modality: Option<Modality>) -> Result<VolumeInspection> {
        self.inspect_with_reader(path, modality, &AutoHeaderReader)
    }

    /// Reads and scores a volume with a caller-supplied header reader
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No modality was given and the file name matches no pattern
    /// - The header cannot be read
    pub fn inspect_with_reader(
        &self,
        path: &Path,
        modality: Option<Modality>,
        reader: &dyn HeaderReader,
    ) -> Result<VolumeInspection> {
        let modality = match modality {
            Some(m) => m,
            None => detect_modality(path, &self.config)?.ok_or_else(|| {
                NeuroselError::SelectionError(format!(
                    "cannot infer modality of {}; pass it explicitly",
                    path.display()
                ))
            })?,
        };

        let candidate = read_candidate(path, modality, reader)?;
        Ok(VolumeInspection {
            score: self.scorer.score(&candidate),
            is_3d_isotropic: candidate.is_3d_isotropic(self.config.weights.isotropy_tolerance),
            candidate,
        })
    }
}
