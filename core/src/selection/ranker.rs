use log::{debug, warn};
use std::cmp::Ordering;

use crate::error::{NeuroselError, Result};
use crate::scoring::{CompatibilityAnalyzer, QualityScorer};
use crate::types::{
    CompatibilityScore, Degradation, Modality, QualityScore, ScanCandidate, SelectionConfig,
    SelectionMode,
};

/// A candidate with its score and, when a reference was given, its compatibility
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RankedCandidate {
    pub candidate: ScanCandidate,
    pub score: QualityScore,
    pub compatibility: Option<CompatibilityScore>,
}

/// Candidates of one modality ordered under one selection mode
///
/// Never empty; index 0 is the provisional selection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Ranking {
    pub modality: Modality,
    pub mode: SelectionMode,
    pub entries: Vec<RankedCandidate>,
    /// Candidates removed by a hard filter (non-ORIGINAL under `original`)
    pub excluded: Vec<RankedCandidate>,
    pub degradations: Vec<Degradation>,
}

impl Ranking {
    /// Provisional selection
    pub fn top(&self) -> &RankedCandidate {
        &self.entries[0]
    }

    /// Entry at `index`, if any
    pub fn get(&self, index: usize) -> Option<&RankedCandidate> {
        self.entries.get(index)
    }
}

/// Result of ranking one modality
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum RankOutcome {
    /// A single ranking with an automatic winner
    Automatic(Ranking),
    /// One ranking per automatic mode; the caller supplies the final choice
    Interactive(Vec<Ranking>),
}

impl RankOutcome {
    /// Rankings available for presentation
    pub fn views(&self) -> &[Ranking] {
        match self {
            RankOutcome::Automatic(ranking) => std::slice::from_ref(ranking),
            RankOutcome::Interactive(views) => views,
        }
    }

    /// View ranked under `mode`, if offered
    pub fn view(&self, mode: SelectionMode) -> Option<&Ranking> {
        self.views().iter().find(|v| v.mode == mode)
    }

    /// Top of the first view
    pub fn provisional(&self) -> &RankedCandidate {
        self.views()[0].top()
    }

    /// Whether the final choice must come from the caller
    pub fn needs_choice(&self) -> bool {
        matches!(self, RankOutcome::Interactive(_))
    }
}

/// Orders candidates within a modality under a [`SelectionMode`]
///
/// Ties at every level fall back to total score, then file path, so the
/// order is fully deterministic.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRanker {
    scorer: QualityScorer,
}

impl CompositeRanker {
    /// Creates a ranker around a scorer
    pub fn new(scorer: QualityScorer) -> Self {
        Self { scorer }
    }

    /// Creates a ranker from the engine configuration
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self::new(QualityScorer::from_config(config))
    }

    /// Scorer in use
    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Ranks one modality's candidates
    ///
    /// `reference` is only consulted by the cross-modal modes.
    ///
    /// # Errors
    ///
    /// `NeuroselError::NoCandidate` when `candidates` is empty.
    pub fn rank(
        &self,
        subject: &str,
        modality: Modality,
        candidates: &[ScanCandidate],
        mode: SelectionMode,
        reference: Option<&ScanCandidate>,
    ) -> Result<RankOutcome> {
        if candidates.is_empty() {
            return Err(NeuroselError::NoCandidate {
                subject: subject.to_string(),
                modality,
                reason: "empty candidate set".to_string(),
            });
        }

        let outcome = match mode {
            SelectionMode::Interactive => RankOutcome::Interactive(
                SelectionMode::AUTOMATIC
                    .iter()
                    .map(|&m| self.rank_automatic(modality, candidates, m, reference))
                    .collect(),
            ),
            automatic => {
                RankOutcome::Automatic(self.rank_automatic(modality, candidates, automatic, reference))
            }
        };

        let top = outcome.provisional();
        debug!(
            "{} {}: provisional {} (total {:.1})",
            subject,
            modality,
            top.candidate.file_name(),
            top.score.total
        );
        Ok(outcome)
    }

    fn rank_automatic(
        &self,
        modality: Modality,
        candidates: &[ScanCandidate],
        mode: SelectionMode,
        reference: Option<&ScanCandidate>,
    ) -> Ranking {
        let scored: Vec<RankedCandidate> = candidates
            .iter()
            .map(|c| RankedCandidate {
                candidate: c.clone(),
                score: self.scorer.score(c),
                compatibility: reference.map(|r| CompatibilityAnalyzer::compare(c, r)),
            })
            .collect();

        let mut degradations = Vec::new();
        let mut excluded = Vec::new();

        let mut entries = match mode {
            SelectionMode::Original => {
                let (original, other): (Vec<_>, Vec<_>) = scored
                    .into_iter()
                    .partition(|r| r.candidate.provenance.is_original());
                if original.is_empty() {
                    warn!("No ORIGINAL {} candidate; ranking all by total", modality);
                    degradations.push(Degradation::NoOriginalCandidate { modality });
                    other
                } else {
                    excluded = other;
                    original
                }
            }
            m if m.is_cross_modal() && reference.is_none() => {
                warn!("{} ranking for {} has no reference candidate", m, modality);
                degradations.push(Degradation::MissingReference { modality, mode: m });
                scored
            }
            _ => scored,
        };

        let has_reference = reference.is_some();
        entries.sort_by(|a, b| match mode {
            SelectionMode::HighestResolution => desc(a.score.resolution, b.score.resolution)
                .then_with(|| by_total_then_path(a, b)),
            SelectionMode::RegistrationOptimized if has_reference => {
                desc(similarity(a), similarity(b)).then_with(|| by_total_then_path(a, b))
            }
            SelectionMode::MatchedDimensions if has_reference => {
                dimension_match(b)
                    .cmp(&dimension_match(a))
                    .then_with(|| by_total_then_path(a, b))
            }
            _ => by_total_then_path(a, b),
        });
        excluded.sort_by(by_total_then_path);

        Ranking {
            modality,
            mode,
            entries,
            excluded,
            degradations,
        }
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

fn by_total_then_path(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    desc(a.score.total, b.score.total).then_with(|| a.candidate.path.cmp(&b.candidate.path))
}

fn similarity(r: &RankedCandidate) -> f64 {
    r.compatibility
        .map(|c| c.aspect_ratio_similarity)
        .unwrap_or(0.0)
}

fn dimension_match(r: &RankedCandidate) -> bool {
    r.compatibility.map(|c| c.dimension_match).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ImageType, Provenance, ScoringWeights, VoxelDims, VoxelSpacing};

    fn ranker() -> CompositeRanker {
        CompositeRanker::new(QualityScorer::new(ScoringWeights::default()))
    }

    fn scan(
        name: &str,
        provenance: &str,
        dims: VoxelDims,
        spacing: VoxelSpacing,
    ) -> ScanCandidate {
        ScanCandidate::new(name, Modality::T1, dims, spacing)
            .with_image_type(ImageType::from_values([provenance, "PRIMARY"]))
            .with_series_description("t1_mprage_sag")
    }

    /// Scenario C: ORIGINAL 1 mm vs DERIVED 0.5 mm
    fn scenario_c() -> Vec<ScanCandidate> {
        vec![
            scan(
                "T1_MPRAGE_DERIVED_0p5.nii.gz",
                "DERIVED",
                VoxelDims::new(512, 512, 512),
                VoxelSpacing::uniform(0.5),
            ),
            scan(
                "T1_MPRAGE_ORIG_1mm.nii.gz",
                "ORIGINAL",
                VoxelDims::new(256, 256, 256),
                VoxelSpacing::uniform(1.0),
            ),
        ]
    }

    fn automatic(outcome: RankOutcome) -> Ranking {
        match outcome {
            RankOutcome::Automatic(r) => r,
            RankOutcome::Interactive(_) => panic!("expected automatic ranking"),
        }
    }

    #[test]
    fn test_empty_input_is_no_candidate() {
        let err = ranker()
            .rank("sub-01", Modality::Flair, &[], SelectionMode::Original, None)
            .unwrap_err();
        assert!(matches!(
            err,
            NeuroselError::NoCandidate { modality: Modality::Flair, .. }
        ));
    }

    #[test]
    fn test_original_mode_selects_original() {
        let ranking = automatic(
            ranker()
                .rank("sub-01", Modality::T1, &scenario_c(), SelectionMode::Original, None)
                .unwrap(),
        );
        assert_eq!(ranking.top().candidate.provenance, Provenance::Original);
        assert_eq!(ranking.top().candidate.spacing, VoxelSpacing::uniform(1.0));
        assert_eq!(ranking.entries.len(), 1);
        assert_eq!(ranking.excluded.len(), 1);
        assert!(ranking.degradations.is_empty());
    }

    #[test]
    fn test_original_mode_is_hard_filter_even_with_huge_derived_score() {
        // Derived candidate outscores the original on total
        let candidates = scenario_c();
        let scorer = QualityScorer::new(ScoringWeights::default());
        assert!(scorer.score(&candidates[0]).total > scorer.score(&candidates[1]).total);

        let ranking = automatic(
            ranker()
                .rank("sub-01", Modality::T1, &candidates, SelectionMode::Original, None)
                .unwrap(),
        );
        assert!(ranking
            .entries
            .iter()
            .all(|r| r.candidate.provenance.is_original()));
    }

    #[test]
    fn test_highest_resolution_selects_derived() {
        let ranking = automatic(
            ranker()
                .rank(
                    "sub-01",
                    Modality::T1,
                    &scenario_c(),
                    SelectionMode::HighestResolution,
                    None,
                )
                .unwrap(),
        );
        assert_eq!(ranking.top().candidate.provenance, Provenance::Derived);
        assert_eq!(ranking.top().candidate.spacing, VoxelSpacing::uniform(0.5));
        assert_eq!(ranking.entries.len(), 2);
    }

    #[test]
    fn test_original_mode_without_original_degrades() {
        let candidates = vec![scan(
            "T1_derived.nii.gz",
            "DERIVED",
            VoxelDims::new(256, 256, 176),
            VoxelSpacing::uniform(1.0),
        )];
        let ranking = automatic(
            ranker()
                .rank("sub-01", Modality::T1, &candidates, SelectionMode::Original, None)
                .unwrap(),
        );
        assert_eq!(ranking.entries.len(), 1);
        assert_eq!(
            ranking.degradations,
            vec![Degradation::NoOriginalCandidate { modality: Modality::T1 }]
        );
    }

    #[test]
    fn test_registration_optimized_prefers_matching_aspect_ratio() {
        let reference = scan(
            "T1_ref.nii.gz",
            "ORIGINAL",
            VoxelDims::new(256, 256, 176),
            VoxelSpacing::uniform(1.0),
        );
        let candidates = vec![
            // Higher total but anisotropic
            scan(
                "FLAIR_2d.nii.gz",
                "ORIGINAL",
                VoxelDims::new(512, 512, 40),
                VoxelSpacing::new(0.45, 0.45, 3.0),
            ),
            scan(
                "FLAIR_3d.nii.gz",
                "DERIVED",
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(1.0),
            ),
        ];

        let ranking = automatic(
            ranker()
                .rank(
                    "sub-01",
                    Modality::Flair,
                    &candidates,
                    SelectionMode::RegistrationOptimized,
                    Some(&reference),
                )
                .unwrap(),
        );
        assert!(ranking.top().candidate.path.ends_with("FLAIR_3d.nii.gz"));
        assert_eq!(
            ranking.top().compatibility.unwrap().aspect_ratio_similarity,
            100.0
        );
    }

    #[test]
    fn test_matched_dimensions_puts_matches_first() {
        let reference = scan(
            "T1_ref.nii.gz",
            "ORIGINAL",
            VoxelDims::new(256, 256, 176),
            VoxelSpacing::uniform(1.0),
        );
        let candidates = vec![
            scan(
                "FLAIR_a.nii.gz",
                "ORIGINAL",
                VoxelDims::new(320, 320, 240),
                VoxelSpacing::uniform(0.7),
            ),
            scan(
                "FLAIR_b.nii.gz",
                "ORIGINAL",
                VoxelDims::new(256, 256, 176),
                VoxelSpacing::uniform(1.0),
            ),
        ];

        let ranking = automatic(
            ranker()
                .rank(
                    "sub-01",
                    Modality::Flair,
                    &candidates,
                    SelectionMode::MatchedDimensions,
                    Some(&reference),
                )
                .unwrap(),
        );
        assert!(ranking.top().candidate.path.ends_with("FLAIR_b.nii.gz"));
        assert!(ranking.top().compatibility.unwrap().dimension_match);
    }

    #[test]
    fn test_cross_modal_without_reference_falls_back_to_total() {
        let ranking = automatic(
            ranker()
                .rank(
                    "sub-01",
                    Modality::T1,
                    &scenario_c(),
                    SelectionMode::MatchedDimensions,
                    None,
                )
                .unwrap(),
        );
        assert!(matches!(
            ranking.degradations[0],
            Degradation::MissingReference { .. }
        ));
        assert!(ranking.top().score.total >= ranking.entries[1].score.total);
    }

    #[test]
    fn test_interactive_returns_all_views() {
        let outcome = ranker()
            .rank(
                "sub-01",
                Modality::T1,
                &scenario_c(),
                SelectionMode::Interactive,
                None,
            )
            .unwrap();
        assert!(outcome.needs_choice());
        let modes: Vec<_> = outcome.views().iter().map(|v| v.mode).collect();
        assert_eq!(modes, SelectionMode::AUTOMATIC.to_vec());
        assert_eq!(outcome.provisional().candidate.provenance, Provenance::Original);
    }

    #[test]
    fn test_ties_break_by_path() {
        let a = scan(
            "b_T1.nii.gz",
            "ORIGINAL",
            VoxelDims::new(256, 256, 176),
            VoxelSpacing::uniform(1.0),
        );
        let b = scan(
            "a_T1.nii.gz",
            "ORIGINAL",
            VoxelDims::new(256, 256, 176),
            VoxelSpacing::uniform(1.0),
        );
        let ranking = automatic(
            ranker()
                .rank("sub-01", Modality::T1, &[a, b], SelectionMode::Original, None)
                .unwrap(),
        );
        assert!(ranking.top().candidate.path.ends_with("a_T1.nii.gz"));
    }
}
