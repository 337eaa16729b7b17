//! Candidate catalog construction
//!
//! Turns a directory of converted volumes (plus optional JSON sidecars)
//! into typed [`ScanCandidate`] records. Each candidate read is bounded by
//! the configured timeout; unreadable or slow candidates are dropped with
//! a warning and never retried.

pub mod header;
pub mod sidecar;
pub mod tags;

pub use header::{
    AcquisitionMetadata, AutoHeaderReader, DicomHeaderReader, HeaderReader, NiftiHeaderReader,
    VolumeFormat, VolumeHeader,
};
pub use sidecar::Sidecar;

use log::{debug, info, warn};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{NeuroselError, Result};
use crate::types::{
    Degradation, MetadataSource, Modality, ScanCandidate, SelectionConfig,
};

/// A matching file that did not become a candidate
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct DroppedCandidate {
    pub path: PathBuf,
    pub modality: Modality,
    pub reason: String,
}

/// All candidates found for one subject
#[derive(Debug, Clone)]
pub struct MetadataCatalog {
    /// Directory the catalog was built from
    pub dir: PathBuf,

    /// Readable candidates, sorted by path
    pub candidates: Vec<ScanCandidate>,

    /// Matching files that could not be read in time
    pub dropped: Vec<DroppedCandidate>,

    /// Recovered metadata gaps (missing sidecars)
    pub degradations: Vec<Degradation>,
}

impl MetadataCatalog {
    /// Builds the catalog with the extension-dispatching header reader
    pub fn build(dir: &Path, config: &SelectionConfig) -> Result<Self> {
        Self::build_with_reader(dir, config, Arc::new(AutoHeaderReader))
    }

    /// Builds the catalog with a caller-supplied header reader
    ///
    /// # Errors
    ///
    /// `NeuroselError::Catalog` when the directory cannot be listed, when no
    /// file matches a modality pattern, or when every match was dropped.
    pub fn build_with_reader(
        dir: &Path,
        config: &SelectionConfig,
        reader: Arc<dyn HeaderReader>,
    ) -> Result<Self> {
        let patterns = compile_patterns(config)?;
        let matches = collect_volume_files(dir, &patterns)?;

        if matches.is_empty() {
            return Err(catalog_error(
                dir,
                "no volume file matches an expected modality pattern",
            ));
        }
        info!("Found {} candidate volumes in {}", matches.len(), dir.display());

        let mut catalog = MetadataCatalog {
            dir: dir.to_path_buf(),
            candidates: Vec::new(),
            dropped: Vec::new(),
            degradations: Vec::new(),
        };

        for (path, modality) in matches {
            match read_with_timeout(&path, modality, &reader, config.candidate_timeout) {
                Ok(candidate) => {
                    if candidate.metadata_source.is_degraded() {
                        warn!(
                            "No sidecar for {}; provenance defaults to UNKNOWN",
                            path.display()
                        );
                        catalog
                            .degradations
                            .push(Degradation::MissingMetadata { path: path.clone() });
                    }
                    debug!("Cataloged {} as {}", path.display(), modality);
                    catalog.candidates.push(candidate);
                }
                Err(reason) => {
                    warn!("Dropping {} candidate {}: {}", modality, path.display(), reason);
                    catalog.dropped.push(DroppedCandidate {
                        path,
                        modality,
                        reason,
                    });
                }
            }
        }

        if catalog.candidates.is_empty() {
            return Err(catalog_error(
                dir,
                format!("all {} matching volumes were unreadable", catalog.dropped.len()),
            ));
        }
        Ok(catalog)
    }

    /// Candidates for one modality, in catalog order
    pub fn for_modality(&self, modality: Modality) -> Vec<ScanCandidate> {
        self.candidates
            .iter()
            .filter(|c| c.modality == modality)
            .cloned()
            .collect()
    }

    /// Modalities with at least one candidate, in `Modality` order
    pub fn modalities(&self) -> Vec<Modality> {
        let mut found: Vec<_> = self.candidates.iter().map(|c| c.modality).collect();
        found.sort();
        found.dedup();
        found
    }
}

/// Reads one candidate: header geometry, then sidecar or embedded metadata
///
/// A malformed sidecar is treated like a missing one.
pub fn read_candidate(
    path: &Path,
    modality: Modality,
    reader: &dyn HeaderReader,
) -> Result<ScanCandidate> {
    let header = reader.read_header(path)?;
    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let (acquisition, source) = match header.acquisition {
        Some(embedded) => (Some(embedded), MetadataSource::DicomHeader),
        None => match Sidecar::load_for(path) {
            Ok(Some(sidecar)) => (Some(sidecar.into_acquisition()), MetadataSource::Sidecar),
            Ok(None) => (None, MetadataSource::HeaderOnly),
            Err(e) => {
                warn!("Ignoring unusable sidecar: {}", e);
                (None, MetadataSource::HeaderOnly)
            }
        },
    };

    let mut candidate = ScanCandidate::new(path, modality, header.dims, header.spacing)
        .with_file_size(file_size)
        .with_metadata_source(source);

    if let Some(acq) = acquisition {
        if let Some(spacing) = acq.spacing {
            candidate.spacing = spacing;
        }
        if let Some(image_type) = acq.image_type {
            candidate = candidate.with_image_type(image_type);
        }
        if let Some(description) = acq.series_description {
            candidate = candidate.with_series_description(description);
        }
        if let Some(quality) = acq.quality {
            candidate = candidate.with_quality(quality);
        }
        candidate = candidate.with_scanner(acq.scanner);
    }

    Ok(candidate)
}

fn read_with_timeout(
    path: &Path,
    modality: Modality,
    reader: &Arc<dyn HeaderReader>,
    timeout: Duration,
) -> std::result::Result<ScanCandidate, String> {
    let (tx, rx) = mpsc::channel();
    let reader = Arc::clone(reader);
    let worker_path = path.to_path_buf();

    thread::Builder::new()
        .name("neurosel-catalog".to_string())
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(read_candidate(&worker_path, modality, reader.as_ref()));
        })
        .map_err(|e| format!("failed to spawn reader: {}", e))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(candidate)) => Ok(candidate),
        Ok(Err(e)) => Err(e.to_string()),
        Err(RecvTimeoutError::Timeout) => {
            Err(format!("read timed out after {:.1}s", timeout.as_secs_f64()))
        }
        Err(RecvTimeoutError::Disconnected) => Err("reader thread panicked".to_string()),
    }
}

fn compile_patterns(config: &SelectionConfig) -> Result<Vec<(Modality, Regex)>> {
    Modality::DETECTION_ORDER
        .iter()
        .map(|&modality| {
            let pattern = config.filename_pattern(modality);
            Regex::new(pattern)
                .map(|re| (modality, re))
                .map_err(|e| NeuroselError::Config {
                    key: format!("{}_FILENAME_PATTERN", modality),
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Lists volume files and assigns each to the first matching modality
fn collect_volume_files(
    dir: &Path,
    patterns: &[(Modality, Regex)],
) -> Result<Vec<(PathBuf, Modality)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| catalog_error(dir, e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| catalog_error(dir, e.to_string()))?.path();
        if !path.is_file() {
            continue;
        }
        if VolumeFormat::detect(&path).is_none() {
            continue;
        }
        match match_modality(&path, patterns) {
            Some(modality) => files.push((path, modality)),
            None => debug!("Ignoring {}: no modality pattern matches", path.display()),
        }
    }

    files.sort();
    Ok(files)
}

/// Modality a volume file name maps to under the configured patterns
///
/// Returns `Ok(None)` for non-volume files and names matching no pattern.
pub fn detect_modality(path: &Path, config: &SelectionConfig) -> Result<Option<Modality>> {
    if VolumeFormat::detect(path).is_none() {
        return Ok(None);
    }
    Ok(match_modality(path, &compile_patterns(config)?))
}

fn match_modality(path: &Path, patterns: &[(Modality, Regex)]) -> Option<Modality> {
    let format = VolumeFormat::detect(path)?;
    let name = path.file_name()?.to_string_lossy();
    let stem = format.stem(&name);
    patterns
        .iter()
        .find(|(_, re)| re.is_match(stem))
        .map(|(modality, _)| *modality)
}

fn catalog_error(dir: &Path, reason: impl Into<String>) -> NeuroselError {
    NeuroselError::Catalog {
        dir: dir.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Provenance, VoxelDims, VoxelSpacing};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Header reader returning canned geometry keyed by file name
    struct StubReader {
        headers: HashMap<String, VolumeHeader>,
        stall: Option<String>,
    }

    impl StubReader {
        fn new() -> Self {
            Self {
                headers: HashMap::new(),
                stall: None,
            }
        }

        fn with(mut self, name: &str, dims: VoxelDims, spacing: VoxelSpacing) -> Self {
            self.headers.insert(
                name.to_string(),
                VolumeHeader {
                    dims,
                    spacing,
                    acquisition: None,
                },
            );
            self
        }

        fn stalling_on(mut self, name: &str) -> Self {
            self.stall = Some(name.to_string());
            self
        }
    }

    impl HeaderReader for StubReader {
        fn read_header(&self, path: &Path) -> Result<VolumeHeader> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if self.stall.as_deref() == Some(name.as_str()) {
                thread::sleep(Duration::from_secs(2));
            }
            self.headers
                .get(&name)
                .cloned()
                .ok_or_else(|| NeuroselError::Header {
                    path: path.to_path_buf(),
                    reason: "stub has no header".to_string(),
                })
        }
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"volume").unwrap();
    }

    fn fast_config() -> SelectionConfig {
        SelectionConfig::default().with_candidate_timeout(Duration::from_millis(300))
    }

    #[test]
    fn test_unreadable_directory() {
        let err = MetadataCatalog::build(Path::new("/nonexistent/neurosel"), &fast_config())
            .unwrap_err();
        assert!(matches!(err, NeuroselError::Catalog { .. }));
    }

    #[test]
    fn test_zero_matching_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "localizer_1.nii.gz");
        touch(&dir, "T1_MPRAGE.txt");

        let err = MetadataCatalog::build_with_reader(
            dir.path(),
            &fast_config(),
            Arc::new(StubReader::new()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no volume file matches"));
    }

    #[test]
    fn test_modality_assignment_and_sidecar() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "T1_MPRAGE_SAG_12.nii.gz");
        touch(&dir, "T2_SPACE_FLAIR_SAG_17.nii.gz");
        std::fs::write(
            dir.path().join("T1_MPRAGE_SAG_12.json"),
            r#"{"ImageType": ["ORIGINAL", "PRIMARY"], "SeriesDescription": "t1_mprage_sag", "QualityScore": 85}"#,
        )
        .unwrap();

        let reader = StubReader::new()
            .with(
                "T1_MPRAGE_SAG_12.nii.gz",
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(1.0),
            )
            .with(
                "T2_SPACE_FLAIR_SAG_17.nii.gz",
                VoxelDims::new(320, 320, 240),
                VoxelSpacing::uniform(0.7),
            );

        let catalog =
            MetadataCatalog::build_with_reader(dir.path(), &fast_config(), Arc::new(reader))
                .unwrap();

        assert_eq!(catalog.candidates.len(), 2);
        assert_eq!(catalog.modalities(), vec![Modality::T1, Modality::Flair]);

        let t1 = &catalog.for_modality(Modality::T1)[0];
        assert_eq!(t1.provenance, Provenance::Original);
        assert_eq!(t1.metadata_source, MetadataSource::Sidecar);
        assert_eq!(t1.quality, Some(85.0));
        assert_eq!(t1.file_size, 6);

        let flair = &catalog.for_modality(Modality::Flair)[0];
        assert_eq!(flair.provenance, Provenance::Unknown);
        assert_eq!(flair.metadata_source, MetadataSource::HeaderOnly);
        assert_eq!(catalog.degradations.len(), 1);
    }

    #[test]
    fn test_unreadable_candidate_is_dropped() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "T1_MPRAGE_12.nii.gz");
        touch(&dir, "T1_MPRAGE_13.nii.gz");

        let reader = StubReader::new().with(
            "T1_MPRAGE_12.nii.gz",
            VoxelDims::new(256, 256, 176),
            VoxelSpacing::uniform(1.0),
        );

        let catalog =
            MetadataCatalog::build_with_reader(dir.path(), &fast_config(), Arc::new(reader))
                .unwrap();
        assert_eq!(catalog.candidates.len(), 1);
        assert_eq!(catalog.dropped.len(), 1);
        assert!(catalog.dropped[0].path.ends_with("T1_MPRAGE_13.nii.gz"));
    }

    #[test]
    fn test_slow_candidate_is_dropped() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "T1_MPRAGE_12.nii.gz");
        touch(&dir, "FLAIR_3D_5.nii.gz");

        let reader = StubReader::new()
            .with(
                "T1_MPRAGE_12.nii.gz",
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(1.0),
            )
            .with(
                "FLAIR_3D_5.nii.gz",
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(1.0),
            )
            .stalling_on("FLAIR_3D_5.nii.gz");

        let catalog =
            MetadataCatalog::build_with_reader(dir.path(), &fast_config(), Arc::new(reader))
                .unwrap();
        assert_eq!(catalog.modalities(), vec![Modality::T1]);
        assert!(catalog.dropped[0].reason.contains("timed out"));
    }

    #[test]
    fn test_all_dropped_is_catalog_error() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "T1_MPRAGE_12.nii.gz");

        let err = MetadataCatalog::build_with_reader(
            dir.path(),
            &fast_config(),
            Arc::new(StubReader::new()),
        )
        .unwrap_err();
        assert!(matches!(err, NeuroselError::Catalog { .. }));
    }

    #[rstest::rstest]
    #[case("T2_SPACE_FLAIR_SAG_17.nii.gz", Some(Modality::Flair))]
    #[case("T1_MPRAGE_SAG_12.nii", Some(Modality::T1))]
    #[case("ep2d_diff_b1000.nii.gz", Some(Modality::Dwi))]
    #[case("localizer_1.nii.gz", None)]
    #[case("T1_MPRAGE_SAG_12.json", None)]
    fn test_detect_modality(#[case] name: &str, #[case] expected: Option<Modality>) {
        let found = detect_modality(Path::new(name), &SelectionConfig::default()).unwrap();
        assert_eq!(found, expected);
    }
}
