use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::header::{AcquisitionMetadata, VolumeFormat};
use crate::error::{NeuroselError, Result};
use crate::types::{ImageType, ScannerInfo, VoxelSpacing};

/// Per-volume JSON sidecar written by the DICOM converter
///
/// Only the fields the selection engine consumes are declared; anything
/// else in the file is ignored. `QualityScore` is not a converter field:
/// an upstream quality stage may add it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Sidecar {
    #[serde(default)]
    pub image_type: Option<Vec<String>>,
    #[serde(default)]
    pub pixel_spacing: Option<Vec<f64>>,
    #[serde(default)]
    pub slice_thickness: Option<f64>,
    #[serde(default)]
    pub series_description: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub manufacturers_model_name: Option<String>,
    #[serde(default)]
    pub manufacturer_model_name: Option<String>,
    #[serde(default)]
    pub magnetic_field_strength: Option<f64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
}

impl Sidecar {
    /// Path of the sidecar belonging to a volume: `<stem>.json` alongside it
    pub fn path_for(volume: &Path) -> Option<PathBuf> {
        let format = VolumeFormat::detect(volume)?;
        let name = volume.file_name()?.to_string_lossy().into_owned();
        Some(volume.with_file_name(format!("{}.json", format.stem(&name))))
    }

    /// Parses sidecar JSON text
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| NeuroselError::Sidecar {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Loads the sidecar for `volume`
    ///
    /// Returns `Ok(None)` when no sidecar file exists.
    pub fn load_for(volume: &Path) -> Result<Option<Self>> {
        let Some(path) = Self::path_for(volume) else {
            return Ok(None);
        };
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&path, &content).map(Some)
    }

    /// Spacing stated by PixelSpacing + SliceThickness, if both are present and valid
    pub fn spacing(&self) -> Option<VoxelSpacing> {
        match (self.pixel_spacing.as_deref(), self.slice_thickness) {
            (Some([row, col, ..]), Some(thickness)) => {
                let spacing = VoxelSpacing::new(*row, *col, thickness);
                spacing.is_valid().then_some(spacing)
            }
            _ => None,
        }
    }

    /// Converts to the format-independent acquisition metadata
    pub fn into_acquisition(self) -> AcquisitionMetadata {
        let spacing = self.spacing();
        AcquisitionMetadata {
            image_type: self.image_type.map(ImageType::from_values),
            series_description: self.series_description.filter(|s| !s.trim().is_empty()),
            spacing,
            scanner: ScannerInfo {
                manufacturer: self
                    .manufacturer
                    .as_deref()
                    .map(ScannerInfo::normalize_manufacturer),
                model: self.manufacturers_model_name.or(self.manufacturer_model_name),
                field_strength: self.magnetic_field_strength,
            },
            quality: self.quality_score.map(|q| q.clamp(0.0, 100.0)),
        }
    }
}
