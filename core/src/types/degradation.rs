use std::fmt;
use std::path::PathBuf;

use super::{Modality, SelectionMode};

/// A recovered, non-fatal deviation from the normal selection path
///
/// Degradations never abort a run; they are carried on rankings and
/// decisions so the fallback stays visible in the rationale.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Degradation {
    /// No sidecar; scored from the volume header with UNKNOWN provenance
    MissingMetadata { path: PathBuf },
    /// FLAIR disqualified by a hard threshold, T1 chosen
    ThresholdFallback { reason: String },
    /// T1 and FLAIR scored exactly equal; resolved to T1
    AmbiguousTie,
    /// `original` mode found no ORIGINAL candidate
    NoOriginalCandidate { modality: Modality },
    /// A cross-modal mode ran without a reference candidate
    MissingReference {
        modality: Modality,
        mode: SelectionMode,
    },
    /// T1 chosen although its quality figure is below the acceptable minimum
    LowT1Quality { quality: f64, minimum: f64 },
    /// The modality had no surviving candidate
    ModalityUnavailable { modality: Modality },
}

impl Degradation {
    /// Short key used in decision records
    pub fn tag(&self) -> &'static str {
        match self {
            Degradation::MissingMetadata { .. } => "missing_metadata",
            Degradation::ThresholdFallback { .. } => "threshold_fallback",
            Degradation::AmbiguousTie => "ambiguous_tie",
            Degradation::NoOriginalCandidate { .. } => "no_original_candidate",
            Degradation::MissingReference { .. } => "missing_reference",
            Degradation::LowT1Quality { .. } => "low_t1_quality",
            Degradation::ModalityUnavailable { .. } => "modality_unavailable",
        }
    }

    /// Tag with its context, as written to the decision record notes
    ///
    /// Never contains `;`, `|` or a line break.
    pub fn record_note(&self) -> String {
        let detail = match self {
            Degradation::MissingMetadata { .. } | Degradation::AmbiguousTie => None,
            Degradation::ThresholdFallback { reason } => {
                Some(reason.replace([';', '|', '\n'], ","))
            }
            Degradation::NoOriginalCandidate { modality }
            | Degradation::ModalityUnavailable { modality } => Some(modality.to_string()),
            Degradation::MissingReference { modality, mode } => {
                Some(format!("{},{}", modality, mode))
            }
            Degradation::LowT1Quality { quality, minimum } => {
                Some(format!("{:.0}<{:.0}", quality, minimum))
            }
        };
        match detail {
            Some(detail) => format!("{}({})", self.tag(), detail),
            None => self.tag().to_string(),
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::MissingMetadata { path } => write!(
                f,
                "no sidecar metadata for {}; scored from header with UNKNOWN provenance",
                path.display()
            ),
            Degradation::ThresholdFallback { reason } => {
                write!(f, "FLAIR disqualified ({}); T1 used as reference", reason)
            }
            Degradation::AmbiguousTie => {
                write!(f, "T1 and FLAIR scored equal; T1 kept as reference")
            }
            Degradation::NoOriginalCandidate { modality } => write!(
                f,
                "no ORIGINAL {} acquisition; ranked all candidates by total score",
                modality
            ),
            Degradation::MissingReference { modality, mode } => write!(
                f,
                "{} mode for {} had no reference candidate; ranked by total score",
                mode, modality
            ),
            Degradation::LowT1Quality { quality, minimum } => write!(
                f,
                "T1 quality {:.0} below acceptable minimum {:.0}",
                quality, minimum
            ),
            Degradation::ModalityUnavailable { modality } => {
                write!(f, "no surviving {} candidate", modality)
            }
        }
    }
}
