use dicom_dictionary_std::tags::PIXEL_DATA;
use dicom_object::{InMemDicomObject, OpenFileOptions};
use std::path::Path;

use super::tags::{
    get_f64_value, get_int_value, get_multi_string_value, get_string_value, COLUMNS, IMAGE_TYPE,
    MAGNETIC_FIELD_STRENGTH, MANUFACTURER, MANUFACTURER_MODEL_NAME, MODALITY, NUMBER_OF_FRAMES,
    PIXEL_SPACING, PROTOCOL_NAME, ROWS, SEQUENCE_NAME, SERIES_DESCRIPTION, SLICE_THICKNESS,
    SPACING_BETWEEN_SLICES,
};
use crate::error::{NeuroselError, Result};
use crate::types::{ImageType, ScannerInfo, VoxelDims, VoxelSpacing};

/// On-disk volume formats the catalog recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Nifti,
    Dicom,
}

impl VolumeFormat {
    /// Detects the format from a file name (case-insensitive)
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Some(VolumeFormat::Nifti)
        } else if name.ends_with(".dcm") || name.ends_with(".dicom") {
            Some(VolumeFormat::Dicom)
        } else {
            None
        }
    }

    /// File name without the volume extension
    pub fn stem<'a>(&self, file_name: &'a str) -> &'a str {
        let lower = file_name.to_lowercase();
        let ext_len = [".nii.gz", ".nii", ".dicom", ".dcm"]
            .iter()
            .find(|ext| lower.ends_with(*ext))
            .map(|ext| ext.len())
            .unwrap_or(0);
        &file_name[..file_name.len() - ext_len]
    }
}

/// Acquisition metadata: the sidecar fields, wherever they were read from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AcquisitionMetadata {
    pub image_type: Option<ImageType>,
    pub series_description: Option<String>,
    /// In-plane spacing + slice thickness, when stated
    pub spacing: Option<VoxelSpacing>,
    pub scanner: ScannerInfo,
    pub quality: Option<f64>,
}

/// Geometry read from a volume header
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHeader {
    pub dims: VoxelDims,
    pub spacing: VoxelSpacing,
    /// Present when the header itself carries acquisition metadata (DICOM)
    pub acquisition: Option<AcquisitionMetadata>,
}

/// External header reader seam
///
/// Implementations must be thread-safe: the catalog reads each candidate
/// on its own worker thread so a hung read can be abandoned.
pub trait HeaderReader: Send + Sync {
    /// Reads dimensions and spacing (and any embedded acquisition metadata)
    fn read_header(&self, path: &Path) -> Result<VolumeHeader>;
}

/// NIfTI-1/2 header reader (`.nii`, `.nii.gz`)
#[derive(Debug, Default, Clone, Copy)]
pub struct NiftiHeaderReader;

impl HeaderReader for NiftiHeaderReader {
    fn read_header(&self, path: &Path) -> Result<VolumeHeader> {
        let header = nifti::NiftiHeader::from_file(path).map_err(|e| header_error(path, e))?;

        let ndim = header.dim[0];
        let axis = |i: usize| -> u32 {
            if (i as u16) <= ndim {
                u32::from(header.dim[i].max(1))
            } else {
                1
            }
        };
        let dims = VoxelDims::new(axis(1), axis(2), axis(3));
        let spacing = VoxelSpacing::new(
            f64::from(header.pixdim[1]),
            f64::from(header.pixdim[2]),
            if ndim >= 3 {
                f64::from(header.pixdim[3])
            } else {
                1.0
            },
        );

        validate_geometry(path, dims, spacing)?;
        Ok(VolumeHeader {
            dims,
            spacing,
            acquisition: None,
        })
    }
}

/// DICOM header reader; stops before pixel data
#[derive(Debug, Default, Clone, Copy)]
pub struct DicomHeaderReader;

impl DicomHeaderReader {
    /// Extracts geometry and acquisition metadata from a parsed header
    ///
    /// `path` is only used for error context.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The object declares a modality other than MR
    /// - Rows, Columns or PixelSpacing are missing or unparsable
    pub fn from_object(path: &Path, obj: &InMemDicomObject) -> Result<VolumeHeader> {
        if let Some(modality) = get_string_value(obj, MODALITY) {
            if !modality.eq_ignore_ascii_case("MR") {
                return Err(header_error(path, format!("not an MR series (modality {})", modality)));
            }
        }

        let rows = get_int_value(obj, ROWS).ok_or_else(|| header_error(path, "missing Rows"))?;
        let columns =
            get_int_value(obj, COLUMNS).ok_or_else(|| header_error(path, "missing Columns"))?;
        let frames = get_int_value(obj, NUMBER_OF_FRAMES).unwrap_or(1);
        let dims = VoxelDims::new(
            columns.max(1) as u32,
            rows.max(1) as u32,
            frames.max(1) as u32,
        );

        let thickness = get_f64_value(obj, SLICE_THICKNESS)
            .or_else(|| get_f64_value(obj, SPACING_BETWEEN_SLICES))
            .unwrap_or(1.0);
        let pixel_spacing = get_string_value(obj, PIXEL_SPACING)
            .ok_or_else(|| header_error(path, "missing PixelSpacing"))?;
        let spacing = VoxelSpacing::from_pixel_spacing(&pixel_spacing, thickness)
            .map_err(|e| header_error(path, e))?;

        validate_geometry(path, dims, spacing)?;

        let acquisition = AcquisitionMetadata {
            image_type: get_multi_string_value(obj, IMAGE_TYPE).map(ImageType::from_values),
            series_description: get_string_value(obj, SERIES_DESCRIPTION)
                .or_else(|| get_string_value(obj, PROTOCOL_NAME))
                .or_else(|| get_string_value(obj, SEQUENCE_NAME)),
            spacing: Some(spacing),
            scanner: ScannerInfo {
                manufacturer: get_string_value(obj, MANUFACTURER)
                    .map(|m| ScannerInfo::normalize_manufacturer(&m)),
                model: get_string_value(obj, MANUFACTURER_MODEL_NAME),
                field_strength: get_f64_value(obj, MAGNETIC_FIELD_STRENGTH),
            },
            quality: None,
        };

        Ok(VolumeHeader {
            dims,
            spacing,
            acquisition: Some(acquisition),
        })
    }
}

impl HeaderReader for DicomHeaderReader {
    fn read_header(&self, path: &Path) -> Result<VolumeHeader> {
        let obj = OpenFileOptions::new()
            .read_until(PIXEL_DATA)
            .open_file(path)
            .map_err(|e| header_error(path, e))?;
        Self::from_object(path, &obj)
    }
}

/// Dispatches to the NIfTI or DICOM reader by file extension
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoHeaderReader;

impl HeaderReader for AutoHeaderReader {
    fn read_header(&self, path: &Path) -> Result<VolumeHeader> {
        match VolumeFormat::detect(path) {
            Some(VolumeFormat::Nifti) => NiftiHeaderReader.read_header(path),
            Some(VolumeFormat::Dicom) => DicomHeaderReader.read_header(path),
            None => Err(header_error(path, "unrecognized volume format")),
        }
    }
}

fn validate_geometry(path: &Path, dims: VoxelDims, spacing: VoxelSpacing) -> Result<()> {
    if dims.voxel_count() == 0 {
        return Err(header_error(path, format!("empty voxel grid {}", dims)));
    }
    if !spacing.is_valid() {
        return Err(header_error(path, format!("invalid voxel spacing {}", spacing)));
    }
    Ok(())
}

fn header_error(path: &Path, reason: impl ToString) -> NeuroselError {
    NeuroselError::Header {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
