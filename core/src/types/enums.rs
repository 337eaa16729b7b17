use std::fmt;

/// Imaging modality a candidate series is acquired for
///
/// Only T1 and FLAIR can anchor the reference space; the remaining
/// modalities are ranked and registered into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Modality {
    T1,
    T2,
    Flair,
    Dwi,
    Swi,
}

impl Modality {
    /// Order in which filename patterns are tried.
    ///
    /// FLAIR comes first so that names like `T2_SPACE_FLAIR` are not
    /// claimed by the T2 pattern.
    pub const DETECTION_ORDER: [Modality; 5] = [
        Modality::Flair,
        Modality::T1,
        Modality::T2,
        Modality::Dwi,
        Modality::Swi,
    ];

    /// Returns simple name for display and record keys
    pub fn simple_name(&self) -> &'static str {
        match self {
            Modality::T1 => "T1",
            Modality::T2 => "T2",
            Modality::Flair => "FLAIR",
            Modality::Dwi => "DWI",
            Modality::Swi => "SWI",
        }
    }

    /// Returns whether this modality may anchor the reference space
    pub fn is_reference_anchor(&self) -> bool {
        matches!(self, Modality::T1 | Modality::Flair)
    }

    /// Default case-insensitive filename pattern for catalog matching
    pub fn default_filename_pattern(&self) -> &'static str {
        match self {
            Modality::T1 => r"(?i)(t1|mprage|spgr|bravo|tfl3d)",
            Modality::T2 => r"(?i)(t2|tse)",
            Modality::Flair => r"(?i)(flair|darkfluid|tirm)",
            Modality::Dwi => r"(?i)(dwi|diff|dti|ep2d)",
            Modality::Swi => r"(?i)(swi|swan|susc)",
        }
    }

    /// Series-name keywords matching the expected contrast role
    ///
    /// T1 is the structural contrast, FLAIR the CSF-suppressed pathology
    /// contrast. Keywords are compared against the upper-cased name.
    pub fn role_hints(&self) -> &'static [&'static str] {
        match self {
            Modality::T1 => &["T1", "MPRAGE", "MP-RAGE", "SPGR", "BRAVO", "TFL"],
            Modality::T2 => &["T2", "TSE", "FSE"],
            Modality::Flair => &["FLAIR", "DARK-FLUID", "DARKFLUID", "TIRM"],
            Modality::Dwi => &["DWI", "DIFF", "DTI", "EP2D", "TRACE"],
            Modality::Swi => &["SWI", "SWAN", "SUSC"],
        }
    }

    /// Parses modality from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "T1" | "T1W" => Some(Modality::T1),
            "T2" | "T2W" => Some(Modality::T2),
            "FLAIR" => Some(Modality::Flair),
            "DWI" => Some(Modality::Dwi),
            "SWI" => Some(Modality::Swi),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Acquisition provenance of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "UPPERCASE"))]
pub enum Provenance {
    Original,
    Derived,
    Unknown,
}

impl Provenance {
    /// Returns whether this is a scanner-native reconstruction
    pub fn is_original(&self) -> bool {
        matches!(self, Provenance::Original)
    }

    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            Provenance::Original => "ORIGINAL",
            Provenance::Derived => "DERIVED",
            Provenance::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Policy used to rank candidates within one modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum SelectionMode {
    /// ORIGINAL acquisitions only, ranked by total score
    #[default]
    Original,
    /// Finest effective resolution first
    HighestResolution,
    /// Closest voxel aspect ratio to the reference candidate first
    RegistrationOptimized,
    /// Identical voxel grid to the reference candidate first
    MatchedDimensions,
    /// All rankings are shown and the operator picks
    Interactive,
}

impl SelectionMode {
    /// Modes that produce an automatic winner, in presentation order
    pub const AUTOMATIC: [SelectionMode; 4] = [
        SelectionMode::Original,
        SelectionMode::HighestResolution,
        SelectionMode::RegistrationOptimized,
        SelectionMode::MatchedDimensions,
    ];

    /// Returns whether ranking depends on a candidate of another modality
    pub fn is_cross_modal(&self) -> bool {
        matches!(
            self,
            SelectionMode::RegistrationOptimized | SelectionMode::MatchedDimensions
        )
    }

    /// Returns simple name for display and configuration
    pub fn simple_name(&self) -> &'static str {
        match self {
            SelectionMode::Original => "original",
            SelectionMode::HighestResolution => "highest_resolution",
            SelectionMode::RegistrationOptimized => "registration_optimized",
            SelectionMode::MatchedDimensions => "matched_dimensions",
            SelectionMode::Interactive => "interactive",
        }
    }

    /// Parses a mode name; dashes and underscores are interchangeable
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "original" => Some(SelectionMode::Original),
            "highest_resolution" => Some(SelectionMode::HighestResolution),
            "registration_optimized" => Some(SelectionMode::RegistrationOptimized),
            "matched_dimensions" => Some(SelectionMode::MatchedDimensions),
            "interactive" => Some(SelectionMode::Interactive),
            _ => None,
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Confidence attached to a reference-space decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "UPPERCASE"))]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Classifies an absolute score difference
    pub fn from_score_diff(diff: f64, high_threshold: f64, low_threshold: f64) -> Self {
        let magnitude = diff.abs();
        if magnitude > high_threshold {
            Confidence::High
        } else if magnitude > low_threshold {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Returns the lower of the two confidences
    pub fn capped_at(self, max: Confidence) -> Self {
        self.min(max)
    }

    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        }
    }

    /// Parses a confidence label
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(Confidence::Low),
            "MEDIUM" => Some(Confidence::Medium),
            "HIGH" => Some(Confidence::High),
            _ => None,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Why a modality was chosen to anchor the reference space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum ReferenceRationale {
    /// FLAIR absent or disqualified by a hard threshold
    QualityFallback,
    /// FLAIR wins mostly through resolution and isotropy terms
    HighResolutionAdvantage,
    /// FLAIR wins mostly through the remaining terms
    QualityAdvantage,
    /// T1 scored at least as high as FLAIR
    DefaultGoldStandard,
    /// No T1 survived and a FLAIR-only reference is allowed
    T1Unavailable,
    /// The operator overrode the recommendation
    UserOverride,
}

impl ReferenceRationale {
    /// Returns the tag written to decision records
    pub fn tag(&self) -> &'static str {
        match self {
            ReferenceRationale::QualityFallback => "quality_fallback",
            ReferenceRationale::HighResolutionAdvantage => "high_resolution_advantage",
            ReferenceRationale::QualityAdvantage => "quality_advantage",
            ReferenceRationale::DefaultGoldStandard => "default_gold_standard",
            ReferenceRationale::T1Unavailable => "t1_unavailable",
            ReferenceRationale::UserOverride => "user_override",
        }
    }

    /// Parses a record tag
    pub fn from_tag(s: &str) -> Option<Self> {
        match s.trim() {
            "quality_fallback" => Some(ReferenceRationale::QualityFallback),
            "high_resolution_advantage" => Some(ReferenceRationale::HighResolutionAdvantage),
            "quality_advantage" => Some(ReferenceRationale::QualityAdvantage),
            "default_gold_standard" => Some(ReferenceRationale::DefaultGoldStandard),
            "t1_unavailable" => Some(ReferenceRationale::T1Unavailable),
            "user_override" => Some(ReferenceRationale::UserOverride),
            _ => None,
        }
    }
}

impl fmt::Display for ReferenceRationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("original", SelectionMode::Original)]
    #[case("HIGHEST_RESOLUTION", SelectionMode::HighestResolution)]
    #[case("registration-optimized", SelectionMode::RegistrationOptimized)]
    #[case(" matched_dimensions ", SelectionMode::MatchedDimensions)]
    #[case("interactive", SelectionMode::Interactive)]
    fn test_selection_mode_parse(#[case] input: &str, #[case] expected: SelectionMode) {
        assert_eq!(SelectionMode::parse(input), Some(expected));
    }

    #[test]
    fn test_selection_mode_parse_unknown() {
        assert_eq!(SelectionMode::parse("best"), None);
    }

    #[test]
    fn test_cross_modal_modes() {
        assert!(SelectionMode::RegistrationOptimized.is_cross_modal());
        assert!(SelectionMode::MatchedDimensions.is_cross_modal());
        assert!(!SelectionMode::Original.is_cross_modal());
        assert!(!SelectionMode::HighestResolution.is_cross_modal());
    }

    #[test]
    fn test_confidence_classification() {
        assert_eq!(Confidence::from_score_diff(150.0, 100.0, 30.0), Confidence::High);
        assert_eq!(Confidence::from_score_diff(-150.0, 100.0, 30.0), Confidence::High);
        assert_eq!(Confidence::from_score_diff(100.0, 100.0, 30.0), Confidence::Medium);
        assert_eq!(Confidence::from_score_diff(30.0, 100.0, 30.0), Confidence::Low);
        assert_eq!(Confidence::from_score_diff(0.0, 100.0, 30.0), Confidence::Low);
    }

    #[test]
    fn test_confidence_cap() {
        assert_eq!(Confidence::High.capped_at(Confidence::Low), Confidence::Low);
        assert_eq!(Confidence::Low.capped_at(Confidence::High), Confidence::Low);
    }

    #[test]
    fn test_rationale_tag_roundtrip() {
        for rationale in [
            ReferenceRationale::QualityFallback,
            ReferenceRationale::HighResolutionAdvantage,
            ReferenceRationale::QualityAdvantage,
            ReferenceRationale::DefaultGoldStandard,
            ReferenceRationale::T1Unavailable,
            ReferenceRationale::UserOverride,
        ] {
            assert_eq!(ReferenceRationale::from_tag(rationale.tag()), Some(rationale));
        }
    }

    #[test]
    fn test_modality_anchor() {
        assert!(Modality::T1.is_reference_anchor());
        assert!(Modality::Flair.is_reference_anchor());
        assert!(!Modality::Dwi.is_reference_anchor());
        assert_eq!(Modality::parse("flair"), Some(Modality::Flair));
        assert_eq!(Modality::Flair.to_string(), "FLAIR");
    }
}
