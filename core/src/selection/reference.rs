use log::{info, warn};
use std::fmt;

use super::ranker::RankedCandidate;
use crate::error::{NeuroselError, Result};
use crate::types::{
    Confidence, Degradation, Modality, QualityScore, ReferenceRationale, ReferenceThresholds,
    SelectionConfig,
};

/// Score breakdown of one anchor candidate, as carried on a decision
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct AnchorSummary {
    pub path: std::path::PathBuf,
    pub score: QualityScore,
}

impl AnchorSummary {
    fn of(ranked: &RankedCandidate) -> Self {
        Self {
            path: ranked.candidate.path.clone(),
            score: ranked.score,
        }
    }
}

/// Which modality's chosen volume anchors the common reference space
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ReferenceSpaceDecision {
    /// T1 or FLAIR
    pub modality: Modality,
    pub confidence: Confidence,
    /// FLAIR total minus T1 total; positive favors FLAIR
    pub score_diff: f64,
    pub rationale: ReferenceRationale,
    pub t1: Option<AnchorSummary>,
    pub flair: Option<AnchorSummary>,
    pub degradations: Vec<Degradation>,
}

impl ReferenceSpaceDecision {
    /// Path of the volume that anchors the reference space
    pub fn reference_path(&self) -> Option<&std::path::Path> {
        let anchor = match self.modality {
            Modality::Flair => self.flair.as_ref(),
            _ => self.t1.as_ref(),
        };
        anchor.map(|a| a.path.as_path())
    }

    /// The other anchor modality, when a candidate for it exists
    pub fn alternative(&self) -> Option<Modality> {
        match self.modality {
            Modality::Flair if self.t1.is_some() => Some(Modality::T1),
            Modality::T1 if self.flair.is_some() => Some(Modality::Flair),
            _ => None,
        }
    }

    /// Switches to the alternative anchor on operator request
    ///
    /// Returns `None` when there is nothing to switch to. Confidence and
    /// score difference are kept so the record shows what was overridden.
    pub fn overridden(&self) -> Option<Self> {
        let modality = self.alternative()?;
        Some(Self {
            modality,
            rationale: ReferenceRationale::UserOverride,
            ..self.clone()
        })
    }

    /// Whether the decision carries any degradation
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

impl fmt::Display for ReferenceSpaceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, confidence {}, score diff {:+.1})",
            self.modality, self.rationale, self.confidence, self.score_diff
        )
    }
}

/// Decides between the selected T1 and FLAIR as reference space
///
/// Pure: the same two ranked candidates and configuration always give the
/// same decision.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSpaceDecider {
    thresholds: ReferenceThresholds,
    isotropy_tolerance: f64,
    allow_flair_only: bool,
}

impl ReferenceSpaceDecider {
    /// Creates a decider from the engine configuration
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            thresholds: config.thresholds,
            isotropy_tolerance: config.weights.isotropy_tolerance,
            allow_flair_only: config.allow_flair_only_reference,
        }
    }

    /// Thresholds in use
    pub fn thresholds(&self) -> &ReferenceThresholds {
        &self.thresholds
    }

    /// Decides the reference space from the selected T1 and FLAIR
    ///
    /// # Errors
    ///
    /// `NeuroselError::NoCandidate` when no T1 is available, unless a
    /// FLAIR-only reference is allowed and a FLAIR exists.
    pub fn decide(
        &self,
        subject: &str,
        t1: Option<&RankedCandidate>,
        flair: Option<&RankedCandidate>,
    ) -> Result<ReferenceSpaceDecision> {
        let decision = match (t1, flair) {
            (Some(t1), Some(flair)) => self.decide_between(t1, flair),
            (Some(t1), None) => self.finish_t1(
                t1,
                None,
                -t1.score.total,
                ReferenceRationale::QualityFallback,
                vec![Degradation::ModalityUnavailable {
                    modality: Modality::Flair,
                }],
            ),
            (None, Some(flair)) if self.allow_flair_only => {
                warn!("{}: no T1 candidate, using FLAIR as reference", subject);
                ReferenceSpaceDecision {
                    modality: Modality::Flair,
                    confidence: Confidence::Low,
                    score_diff: flair.score.total,
                    rationale: ReferenceRationale::T1Unavailable,
                    t1: None,
                    flair: Some(AnchorSummary::of(flair)),
                    degradations: vec![Degradation::ModalityUnavailable {
                        modality: Modality::T1,
                    }],
                }
            }
            (None, flair) => {
                let reason = if flair.is_some() {
                    "no T1 candidate and FLAIR-only reference is not allowed"
                } else {
                    "neither T1 nor FLAIR is available"
                };
                return Err(NeuroselError::NoCandidate {
                    subject: subject.to_string(),
                    modality: Modality::T1,
                    reason: reason.to_string(),
                });
            }
        };

        info!("{}: reference space {}", subject, decision);
        Ok(decision)
    }

    fn decide_between(
        &self,
        t1: &RankedCandidate,
        flair: &RankedCandidate,
    ) -> ReferenceSpaceDecision {
        let score_diff = flair.score.total - t1.score.total;

        let disqualifications = self.flair_disqualifications(flair);
        if !disqualifications.is_empty() {
            let reason = disqualifications.join(", ");
            warn!("FLAIR {} disqualified: {}", flair.candidate.file_name(), reason);
            return self.finish_t1(
                t1,
                Some(flair),
                score_diff,
                ReferenceRationale::QualityFallback,
                vec![Degradation::ThresholdFallback { reason }],
            );
        }

        if score_diff > 0.0 {
            let geometric_diff = flair.score.geometric() - t1.score.geometric();
            let rationale = if geometric_diff > 0.0 && geometric_diff >= score_diff - geometric_diff
            {
                ReferenceRationale::HighResolutionAdvantage
            } else {
                ReferenceRationale::QualityAdvantage
            };
            return ReferenceSpaceDecision {
                modality: Modality::Flair,
                confidence: self.confidence(score_diff),
                score_diff,
                rationale,
                t1: Some(AnchorSummary::of(t1)),
                flair: Some(AnchorSummary::of(flair)),
                degradations: Vec::new(),
            };
        }

        let mut degradations = Vec::new();
        if score_diff == 0.0 {
            warn!("T1 and FLAIR scored equal ({:.1}); keeping T1", t1.score.total);
            degradations.push(Degradation::AmbiguousTie);
        }
        self.finish_t1(
            t1,
            Some(flair),
            score_diff,
            ReferenceRationale::DefaultGoldStandard,
            degradations,
        )
    }

    /// Hard-threshold failures of a FLAIR candidate, empty when it qualifies
    ///
    /// A missing quality figure does not disqualify.
    fn flair_disqualifications(&self, flair: &RankedCandidate) -> Vec<String> {
        let candidate = &flair.candidate;
        let mut reasons = Vec::new();

        let coarsest = candidate.spacing.max();
        if coarsest > self.thresholds.flair_min_resolution {
            reasons.push(format!(
                "resolution {:.2}mm coarser than {:.2}mm",
                coarsest, self.thresholds.flair_min_resolution
            ));
        }
        if self.thresholds.flair_require_3d && !candidate.is_3d_isotropic(self.isotropy_tolerance) {
            reasons.push("not a 3D isotropic acquisition".to_string());
        }
        if let Some(quality) = candidate.quality {
            if quality < self.thresholds.flair_min_quality {
                reasons.push(format!(
                    "quality {:.0} below {:.0}",
                    quality, self.thresholds.flair_min_quality
                ));
            }
        }
        reasons
    }

    fn finish_t1(
        &self,
        t1: &RankedCandidate,
        flair: Option<&RankedCandidate>,
        score_diff: f64,
        rationale: ReferenceRationale,
        mut degradations: Vec<Degradation>,
    ) -> ReferenceSpaceDecision {
        let mut confidence = self.confidence(score_diff);
        if let Some(quality) = t1.candidate.quality {
            let minimum = self.thresholds.t1_min_acceptable_quality;
            if quality < minimum {
                warn!(
                    "T1 {} quality {:.0} below acceptable minimum {:.0}",
                    t1.candidate.file_name(),
                    quality,
                    minimum
                );
                degradations.push(Degradation::LowT1Quality { quality, minimum });
                confidence = confidence.capped_at(Confidence::Low);
            }
        }
        ReferenceSpaceDecision {
            modality: Modality::T1,
            confidence,
            score_diff,
            rationale,
            t1: Some(AnchorSummary::of(t1)),
            flair: flair.map(AnchorSummary::of),
            degradations,
        }
    }

    fn confidence(&self, score_diff: f64) -> Confidence {
        Confidence::from_score_diff(
            score_diff,
            self.thresholds.confidence_high,
            self.thresholds.confidence_low,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::QualityScorer;
    use crate::types::{ImageType, Provenance, ScanCandidate, VoxelDims, VoxelSpacing};
    use rstest::rstest;

    fn ranked(candidate: ScanCandidate) -> RankedCandidate {
        let scorer = QualityScorer::new(Default::default());
        RankedCandidate {
            score: scorer.score(&candidate),
            candidate,
            compatibility: None,
        }
    }

    fn t1(quality: f64) -> RankedCandidate {
        ranked(
            ScanCandidate::new(
                "T1_MPRAGE.nii.gz",
                Modality::T1,
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(1.0),
            )
            .with_image_type(ImageType::from_values(["ORIGINAL", "PRIMARY"]))
            .with_series_description("t1_mprage_sag")
            .with_quality(quality),
        )
    }

    fn flair_3d(spacing: f64, quality: f64) -> RankedCandidate {
        ranked(
            ScanCandidate::new(
                "FLAIR_3D.nii.gz",
                Modality::Flair,
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(spacing),
            )
            .with_image_type(ImageType::from_values(["ORIGINAL", "PRIMARY"]))
            .with_series_description("t2_space_flair_sag")
            .with_quality(quality),
        )
    }

    fn flair_2d_derived() -> RankedCandidate {
        ranked(
            ScanCandidate::new(
                "FLAIR_AX.nii.gz",
                Modality::Flair,
                VoxelDims::new(256, 256, 30),
                VoxelSpacing::new(0.9, 0.9, 5.0),
            )
            .with_image_type(ImageType::from_values(["DERIVED", "SECONDARY"]))
            .with_series_description("flair_ax")
            .with_quality(45.0),
        )
    }

    fn flair(spacing: VoxelSpacing, series: &str, quality: f64) -> RankedCandidate {
        ranked(
            ScanCandidate::new("FLAIR.nii.gz", Modality::Flair, VoxelDims::new(256, 256, 176), spacing)
                .with_image_type(ImageType::from_values(["ORIGINAL", "PRIMARY"]))
                .with_series_description(series)
                .with_quality(quality),
        )
    }

    fn decider() -> ReferenceSpaceDecider {
        ReferenceSpaceDecider::new(&SelectionConfig::default())
    }

    #[test]
    fn test_high_resolution_flair_wins() {
        let t1 = t1(85.0);
        let flair = flair_3d(0.7, 92.0);
        let decision = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();

        assert_eq!(decision.modality, Modality::Flair);
        assert_eq!(decision.rationale, ReferenceRationale::HighResolutionAdvantage);
        assert_eq!(decision.confidence, Confidence::High);
        assert!(decision.score_diff > 0.0);
        assert!(decision.degradations.is_empty());
        assert_eq!(
            decision.reference_path(),
            Some(std::path::Path::new("FLAIR_3D.nii.gz"))
        );
    }

    #[test]
    fn test_weak_flair_falls_back_to_t1() {
        let t1 = t1(80.0);
        let flair = flair_2d_derived();
        let decision = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();

        assert_eq!(decision.modality, Modality::T1);
        assert_eq!(decision.rationale, ReferenceRationale::QualityFallback);
        assert!(decision.confidence >= Confidence::Medium);
        assert!(matches!(
            decision.degradations[0],
            Degradation::ThresholdFallback { .. }
        ));
    }

    #[test]
    fn test_missing_flair_is_quality_fallback() {
        let t1 = t1(80.0);
        let decision = decider().decide("sub-01", Some(&t1), None).unwrap();
        assert_eq!(decision.modality, Modality::T1);
        assert_eq!(decision.rationale, ReferenceRationale::QualityFallback);
        assert!(decision.flair.is_none());
        assert_eq!(decision.alternative(), None);
    }

    #[test]
    fn test_t1_wins_when_flair_qualifies_but_scores_lower() {
        let t1 = t1(90.0);
        // Passes every threshold but loses the provenance bonus
        let flair = ranked(
            flair_3d(0.8, 61.0)
                .candidate
                .with_provenance(Provenance::Derived),
        );
        assert!(decider().flair_disqualifications(&flair).is_empty());
        let decision = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();
        assert_eq!(decision.modality, Modality::T1);
        assert_eq!(decision.rationale, ReferenceRationale::DefaultGoldStandard);
    }

    #[test]
    fn test_tie_resolves_to_t1_with_low_confidence() {
        let t1 = t1(80.0);
        let mut flair = flair_3d(0.7, 80.0);
        flair.score = t1.score;
        let decision = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();

        assert_eq!(decision.modality, Modality::T1);
        assert_eq!(decision.score_diff, 0.0);
        assert_eq!(decision.confidence, Confidence::Low);
        assert_eq!(decision.degradations, vec![Degradation::AmbiguousTie]);
    }

    #[test]
    fn test_low_t1_quality_caps_confidence() {
        let t1 = t1(20.0);
        let flair = flair_2d_derived();
        let decision = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();

        assert_eq!(decision.modality, Modality::T1);
        assert_eq!(decision.confidence, Confidence::Low);
        assert!(decision
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::LowT1Quality { .. })));
    }

    #[rstest]
    #[case::coarse_3d(
        flair(VoxelSpacing::uniform(1.0), "t2_space_flair_sag", 90.0),
        true,
        vec!["resolution 1.00mm coarser than 0.80mm"]
    )]
    #[case::thin_2d(
        flair(VoxelSpacing::new(0.45, 0.45, 0.7), "flair_ax", 90.0),
        true,
        vec!["not a 3D isotropic acquisition"]
    )]
    #[case::thin_2d_allowed(
        flair(VoxelSpacing::new(0.45, 0.45, 0.7), "flair_ax", 90.0),
        false,
        vec![]
    )]
    #[case::low_quality_3d(
        flair(VoxelSpacing::uniform(0.7), "t2_space_flair_sag", 55.0),
        true,
        vec!["quality 55 below 60"]
    )]
    fn test_each_flair_threshold(
        #[case] flair: RankedCandidate,
        #[case] require_3d: bool,
        #[case] expected: Vec<&str>,
    ) {
        let thresholds = ReferenceThresholds {
            flair_require_3d: require_3d,
            ..ReferenceThresholds::default()
        };
        let config = SelectionConfig::default().with_thresholds(thresholds);
        let decider = ReferenceSpaceDecider::new(&config);

        assert_eq!(decider.flair_disqualifications(&flair), expected);

        let decision = decider.decide("sub-01", Some(&t1(85.0)), Some(&flair)).unwrap();
        let fallback = decision
            .degradations
            .iter()
            .find(|d| matches!(d, Degradation::ThresholdFallback { .. }));
        if expected.is_empty() {
            assert!(fallback.is_none());
        } else {
            assert_eq!(decision.modality, Modality::T1);
            assert_eq!(decision.rationale, ReferenceRationale::QualityFallback);
            assert_eq!(
                fallback,
                Some(&Degradation::ThresholdFallback {
                    reason: expected.join(", ")
                })
            );
        }
    }

    #[test]
    fn test_all_failed_thresholds_are_reported() {
        let reasons = decider().flair_disqualifications(&flair_2d_derived());
        assert_eq!(
            reasons,
            vec![
                "resolution 5.00mm coarser than 0.80mm",
                "not a 3D isotropic acquisition",
                "quality 45 below 60",
            ]
        );
    }

    #[test]
    fn test_missing_quality_does_not_disqualify() {
        let mut flair = flair_3d(0.7, 0.0);
        flair.candidate.quality = None;
        let reasons = decider().flair_disqualifications(&flair);
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_no_t1_is_fatal_by_default() {
        let flair = flair_3d(0.7, 90.0);
        let err = decider().decide("sub-01", None, Some(&flair)).unwrap_err();
        assert!(err.is_fatal_to_subject());
        assert!(matches!(
            err,
            NeuroselError::NoCandidate { modality: Modality::T1, .. }
        ));
    }

    #[test]
    fn test_flair_only_reference_when_allowed() {
        let config = SelectionConfig::default().allow_flair_only_reference(true);
        let flair = flair_3d(0.7, 90.0);
        let decision = ReferenceSpaceDecider::new(&config)
            .decide("sub-01", None, Some(&flair))
            .unwrap();
        assert_eq!(decision.modality, Modality::Flair);
        assert_eq!(decision.rationale, ReferenceRationale::T1Unavailable);
        assert_eq!(decision.confidence, Confidence::Low);
    }

    #[test]
    fn test_decision_is_idempotent() {
        let t1 = t1(85.0);
        let flair = flair_3d(0.7, 92.0);
        let first = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();
        let second = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_override_switches_anchor() {
        let t1 = t1(85.0);
        let flair = flair_3d(0.7, 92.0);
        let decision = decider().decide("sub-01", Some(&t1), Some(&flair)).unwrap();
        let overridden = decision.overridden().unwrap();
        assert_eq!(overridden.modality, Modality::T1);
        assert_eq!(overridden.rationale, ReferenceRationale::UserOverride);
        assert_eq!(overridden.score_diff, decision.score_diff);
    }
}
