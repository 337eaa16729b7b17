use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use super::{Modality, SelectionMode};
use crate::error::{NeuroselError, Result};

/// Weights of the five quality-score components
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ScoringWeights {
    /// `ORIGINAL_ACQUISITION_BONUS`
    pub original_bonus: f64,
    /// `DIMENSIONALITY_WEIGHT`, awarded to 3D-isotropic candidates
    pub dimensionality: f64,
    /// `RESOLUTION_WEIGHT`
    pub resolution: f64,
    /// `QUALITY_WEIGHT`
    pub quality: f64,
    /// `MODALITY_WEIGHT`
    pub modality: f64,
    /// `ISOTROPY_TOLERANCE`, fraction of the largest spacing
    pub isotropy_tolerance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            original_bonus: 1000.0,
            dimensionality: 300.0,
            resolution: 200.0,
            quality: 150.0,
            modality: 100.0,
            isotropy_tolerance: 0.15,
        }
    }
}

/// Hard thresholds and confidence bands for the reference-space decision
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ReferenceThresholds {
    /// `FLAIR_MIN_RESOLUTION`: coarsest FLAIR voxel edge allowed, in mm
    pub flair_min_resolution: f64,
    /// `FLAIR_REQUIRE_3D`
    pub flair_require_3d: bool,
    /// `FLAIR_MIN_QUALITY_SCORE`
    pub flair_min_quality: f64,
    /// `T1_MIN_ACCEPTABLE_QUALITY`
    pub t1_min_acceptable_quality: f64,
    /// `CONFIDENCE_HIGH_THRESHOLD`
    pub confidence_high: f64,
    /// `CONFIDENCE_LOW_THRESHOLD`
    pub confidence_low: f64,
}

impl Default for ReferenceThresholds {
    fn default() -> Self {
        Self {
            flair_min_resolution: 0.8,
            flair_require_3d: true,
            flair_min_quality: 60.0,
            t1_min_acceptable_quality: 40.0,
            confidence_high: 100.0,
            confidence_low: 30.0,
        }
    }
}

/// Immutable engine configuration
///
/// Built from defaults, builders or flat `KEY=value` pairs, validated
/// once, then handed to each component at construction.
///
/// # Example
///
/// ```
/// use neurosel_core::{Modality, SelectionConfig, SelectionMode};
///
/// let config = SelectionConfig::from_pairs([
///     ("FLAIR_SELECTION_MODE", "registration_optimized"),
///     ("RESOLUTION_WEIGHT", "250"),
/// ])
/// .unwrap();
///
/// assert_eq!(config.mode_for(Modality::T1), SelectionMode::Original);
/// assert_eq!(config.mode_for(Modality::Flair), SelectionMode::RegistrationOptimized);
/// assert_eq!(config.weights.resolution, 250.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SelectionConfig {
    /// Per-modality selection mode; absent modalities use `original`
    pub modes: BTreeMap<Modality, SelectionMode>,

    /// Filename pattern overrides; absent modalities use the built-in pattern
    pub filename_patterns: BTreeMap<Modality, String>,

    /// Scoring weights
    pub weights: ScoringWeights,

    /// Reference-space thresholds
    pub thresholds: ReferenceThresholds,

    /// Upper bound on reading one candidate's header and sidecar
    pub candidate_timeout: Duration,

    /// Use FLAIR as reference when no T1 survives instead of failing
    pub allow_flair_only_reference: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            modes: BTreeMap::new(),
            filename_patterns: BTreeMap::new(),
            weights: ScoringWeights::default(),
            thresholds: ReferenceThresholds::default(),
            candidate_timeout: Duration::from_secs(30),
            allow_flair_only_reference: false,
        }
    }
}

const MODE_SUFFIX: &str = "_SELECTION_MODE";
const PATTERN_SUFFIX: &str = "_FILENAME_PATTERN";

const SCALAR_KEYS: [&str; 14] = [
    "ORIGINAL_ACQUISITION_BONUS",
    "DIMENSIONALITY_WEIGHT",
    "RESOLUTION_WEIGHT",
    "QUALITY_WEIGHT",
    "MODALITY_WEIGHT",
    "ISOTROPY_TOLERANCE",
    "FLAIR_MIN_RESOLUTION",
    "FLAIR_REQUIRE_3D",
    "FLAIR_MIN_QUALITY_SCORE",
    "T1_MIN_ACCEPTABLE_QUALITY",
    "CONFIDENCE_HIGH_THRESHOLD",
    "CONFIDENCE_LOW_THRESHOLD",
    "CANDIDATE_TIMEOUT_SECS",
    "ALLOW_FLAIR_ONLY_REFERENCE",
];

impl SelectionConfig {
    /// Selection mode configured for a modality
    pub fn mode_for(&self, modality: Modality) -> SelectionMode {
        self.modes.get(&modality).copied().unwrap_or_default()
    }

    /// Filename pattern used to assign files to a modality
    pub fn filename_pattern(&self, modality: Modality) -> &str {
        self.filename_patterns
            .get(&modality)
            .map(String::as_str)
            .unwrap_or_else(|| modality.default_filename_pattern())
    }

    /// Builder: set one modality's selection mode
    pub fn with_mode(mut self, modality: Modality, mode: SelectionMode) -> Self {
        self.modes.insert(modality, mode);
        self
    }

    /// Builder: replace scoring weights
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Builder: replace reference thresholds
    pub fn with_thresholds(mut self, thresholds: ReferenceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Builder: per-candidate read timeout
    pub fn with_candidate_timeout(mut self, timeout: Duration) -> Self {
        self.candidate_timeout = timeout;
        self
    }

    /// Builder: allow FLAIR-only reference space
    pub fn allow_flair_only_reference(mut self, allow: bool) -> Self {
        self.allow_flair_only_reference = allow;
        self
    }

    /// Returns true if `key` is a recognized flat configuration key
    pub fn is_known_key(key: &str) -> bool {
        if SCALAR_KEYS.contains(&key) {
            return true;
        }
        [MODE_SUFFIX, PATTERN_SUFFIX].iter().any(|suffix| {
            key.strip_suffix(suffix)
                .and_then(Modality::parse)
                .is_some()
        })
    }

    /// Builds a validated configuration from flat key/value pairs
    ///
    /// Keys not listed in the documented set are ignored.
    ///
    /// # Errors
    ///
    /// Returns `NeuroselError::Config` naming the first offending key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.apply(key.as_ref().trim(), value.as_ref().trim())?;
        }
        config.validate()
    }

    /// Parses a shell-style flat file (`KEY=value`, `export KEY="value"`)
    pub fn from_flat_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_pairs(parse_flat_lines(&content))
    }

    /// Reads the documented keys from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_pairs(std::env::vars().filter(|(k, _)| Self::is_known_key(k)))
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        if let Some(modality) = key.strip_suffix(MODE_SUFFIX).and_then(Modality::parse) {
            let mode = SelectionMode::parse(value)
                .ok_or_else(|| config_error(key, format!("unknown selection mode '{}'", value)))?;
            self.modes.insert(modality, mode);
            return Ok(());
        }
        if let Some(modality) = key.strip_suffix(PATTERN_SUFFIX).and_then(Modality::parse) {
            Regex::new(value).map_err(|e| config_error(key, e.to_string()))?;
            self.filename_patterns.insert(modality, value.to_string());
            return Ok(());
        }

        match key {
            "ORIGINAL_ACQUISITION_BONUS" => self.weights.original_bonus = parse_f64(key, value)?,
            "DIMENSIONALITY_WEIGHT" => self.weights.dimensionality = parse_f64(key, value)?,
            "RESOLUTION_WEIGHT" => self.weights.resolution = parse_f64(key, value)?,
            "QUALITY_WEIGHT" => self.weights.quality = parse_f64(key, value)?,
            "MODALITY_WEIGHT" => self.weights.modality = parse_f64(key, value)?,
            "ISOTROPY_TOLERANCE" => self.weights.isotropy_tolerance = parse_f64(key, value)?,
            "FLAIR_MIN_RESOLUTION" => {
                self.thresholds.flair_min_resolution = parse_f64(key, value)?
            }
            "FLAIR_REQUIRE_3D" => self.thresholds.flair_require_3d = parse_bool(key, value)?,
            "FLAIR_MIN_QUALITY_SCORE" => {
                self.thresholds.flair_min_quality = parse_f64(key, value)?
            }
            "T1_MIN_ACCEPTABLE_QUALITY" => {
                self.thresholds.t1_min_acceptable_quality = parse_f64(key, value)?
            }
            "CONFIDENCE_HIGH_THRESHOLD" => {
                self.thresholds.confidence_high = parse_f64(key, value)?
            }
            "CONFIDENCE_LOW_THRESHOLD" => self.thresholds.confidence_low = parse_f64(key, value)?,
            "CANDIDATE_TIMEOUT_SECS" => {
                self.candidate_timeout = Duration::from_secs_f64(parse_positive(key, value)?)
            }
            "ALLOW_FLAIR_ONLY_REFERENCE" => {
                self.allow_flair_only_reference = parse_bool(key, value)?
            }
            _ => debug!("Ignoring unknown config key {}", key),
        }
        Ok(())
    }

    /// Checks ranges and returns the configuration unchanged
    ///
    /// Weights must be finite and non-negative so the total stays monotone
    /// in every component.
    pub fn validate(self) -> Result<Self> {
        let w = &self.weights;
        for (key, value) in [
            ("ORIGINAL_ACQUISITION_BONUS", w.original_bonus),
            ("DIMENSIONALITY_WEIGHT", w.dimensionality),
            ("RESOLUTION_WEIGHT", w.resolution),
            ("QUALITY_WEIGHT", w.quality),
            ("MODALITY_WEIGHT", w.modality),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(config_error(key, "must be a finite, non-negative weight"));
            }
        }
        if !(0.0..=1.0).contains(&w.isotropy_tolerance) {
            return Err(config_error("ISOTROPY_TOLERANCE", "must lie in 0..=1"));
        }

        let t = &self.thresholds;
        if !t.flair_min_resolution.is_finite() || t.flair_min_resolution <= 0.0 {
            return Err(config_error("FLAIR_MIN_RESOLUTION", "must be positive"));
        }
        for (key, value) in [
            ("FLAIR_MIN_QUALITY_SCORE", t.flair_min_quality),
            ("T1_MIN_ACCEPTABLE_QUALITY", t.t1_min_acceptable_quality),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(config_error(key, "must lie in 0..=100"));
            }
        }
        if t.confidence_low < 0.0 || t.confidence_low > t.confidence_high {
            return Err(config_error(
                "CONFIDENCE_LOW_THRESHOLD",
                "must be non-negative and not exceed CONFIDENCE_HIGH_THRESHOLD",
            ));
        }
        if self.candidate_timeout.is_zero() {
            return Err(config_error("CANDIDATE_TIMEOUT_SECS", "must be positive"));
        }
        Ok(self)
    }
}

/// Splits shell-style configuration text into key/value pairs
///
/// Blank lines and `#` comments are skipped; surrounding quotes and
/// trailing comments on unquoted values are removed.
pub fn parse_flat_lines(content: &str) -> Vec<(String, String)> {
    static LINE: OnceLock<Regex> = OnceLock::new();
    let re = LINE.get_or_init(|| {
        Regex::new(r#"^\s*(?:export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^#]*?))\s*(?:#.*)?$"#)
            .expect("Failed to compile regex")
    });

    content
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            Some((caps[1].to_string(), value))
        })
        .collect()
}

fn config_error(key: &str, reason: impl Into<String>) -> NeuroselError {
    NeuroselError::Config {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|e| config_error(key, format!("'{}' is not a number: {}", value, e)))
}

fn parse_positive(key: &str, value: &str) -> Result<f64> {
    let v = parse_f64(key, value)?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(config_error(key, "must be positive"))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(config_error(key, format!("'{}' is not a boolean", value))),
    }
}
