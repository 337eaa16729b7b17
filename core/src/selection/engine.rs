use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ranker::{CompositeRanker, RankOutcome, RankedCandidate, Ranking};
use super::record::DecisionRecord;
use super::reference::{ReferenceSpaceDecider, ReferenceSpaceDecision};
use super::store::DecisionStore;
use crate::catalog::{AutoHeaderReader, DroppedCandidate, HeaderReader, MetadataCatalog};
use crate::cli::presenter::{CandidateChoice, ReviewOutcome, SelectionPresenter};
use crate::error::{NeuroselError, Result};
use crate::types::{
    Degradation, MetadataSource, Modality, ScanCandidate, SelectionConfig, SelectionMode,
};

/// The volume chosen for one modality and why
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Decision {
    pub modality: Modality,
    /// Mode the modality was configured with
    pub mode: SelectionMode,
    /// Mode of the ranking the choice was taken from
    pub view: SelectionMode,
    pub chosen: RankedCandidate,
    /// Zero-based position of the chosen entry in its ranking
    pub rank: usize,
    /// Size of the ranking the choice was made from
    pub ranked: usize,
    pub degradations: Vec<Degradation>,
}

impl Decision {
    /// Takes entry `index` of `ranking`
    ///
    /// # Errors
    ///
    /// `NeuroselError::InvalidSelection` when `index` is out of range.
    pub fn from_ranking(ranking: &Ranking, mode: SelectionMode, index: usize) -> Result<Self> {
        let chosen = ranking
            .get(index)
            .cloned()
            .ok_or_else(|| NeuroselError::InvalidSelection {
                modality: ranking.modality,
                reason: format!(
                    "index {} out of range for {} candidates",
                    index,
                    ranking.entries.len()
                ),
            })?;

        let mut degradations = ranking.degradations.clone();
        if chosen.candidate.metadata_source == MetadataSource::HeaderOnly {
            degradations.push(Degradation::MissingMetadata {
                path: chosen.candidate.path.clone(),
            });
        }

        Ok(Self {
            modality: ranking.modality,
            mode,
            view: ranking.mode,
            chosen,
            rank: index,
            ranked: ranking.entries.len(),
            degradations,
        })
    }

    /// Path of the chosen volume
    pub fn path(&self) -> &Path {
        &self.chosen.candidate.path
    }

    /// Configured mode, with the ranking it was picked from when they differ
    pub fn mode_label(&self) -> String {
        if self.mode == self.view {
            self.mode.to_string()
        } else {
            format!("{}({})", self.mode, self.view)
        }
    }

    /// Compact single-line rationale, safe for the decision record
    ///
    /// `<mode>:rank<n>/<m>:total=<score>` followed by `;<tag>` for each
    /// degradation. An interactive pick shows its ranking as
    /// `interactive(<view>)`.
    pub fn rationale(&self) -> String {
        let mut rationale = format!(
            "{}:rank{}/{}:total={:.1}",
            self.mode_label(),
            self.rank + 1,
            self.ranked,
            self.chosen.score.total
        );
        for degradation in &self.degradations {
            rationale.push(';');
            rationale.push_str(degradation.tag());
        }
        rationale
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} mode, rank {}/{}, total {:.1})",
            self.modality,
            self.chosen.candidate.file_name(),
            self.mode_label(),
            self.rank + 1,
            self.ranked,
            self.chosen.score.total
        )?;
        for degradation in &self.degradations {
            write!(f, "; {}", degradation)?;
        }
        Ok(())
    }
}

/// Ranking and final choice for one modality
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ModalitySelection {
    pub outcome: RankOutcome,
    pub decision: Decision,
}

impl ModalitySelection {
    /// Ranking the decision was taken from
    pub fn ranking(&self) -> &Ranking {
        self.outcome
            .view(self.decision.view)
            .unwrap_or_else(|| &self.outcome.views()[0])
    }
}

/// Everything decided for one subject in one run
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct SubjectSelection {
    pub subject: String,
    /// Per-modality selections in `Modality` order
    pub selections: Vec<ModalitySelection>,
    pub reference: ReferenceSpaceDecision,
    /// Catalog entries that could not be read
    pub dropped: Vec<DroppedCandidate>,
    /// Subject-level degradations (missing modalities)
    pub degradations: Vec<Degradation>,
}

impl SubjectSelection {
    /// Decision for a modality, if one was made
    pub fn decision(&self, modality: Modality) -> Option<&Decision> {
        self.selections
            .iter()
            .map(|s| &s.decision)
            .find(|d| d.modality == modality)
    }

    /// All decisions in `Modality` order
    pub fn decisions(&self) -> impl Iterator<Item = &Decision> {
        self.selections.iter().map(|s| &s.decision)
    }
}

/// Result of a persisted run
#[derive(Debug, Clone)]
pub struct SubjectRun {
    pub selection: SubjectSelection,
    pub record: DecisionRecord,
    pub record_path: PathBuf,
}

/// Per-subject selection pipeline
///
/// catalog -> score -> rank (T1, FLAIR, then the rest) -> reference
/// decision -> review -> persisted record. The presenter is the only
/// part that differs between batch and interactive runs.
pub struct SelectionEngine {
    config: SelectionConfig,
    ranker: CompositeRanker,
    decider: ReferenceSpaceDecider,
    reader: Arc<dyn HeaderReader>,
}

impl SelectionEngine {
    /// Creates an engine reading headers by file extension
    ///
    /// # Errors
    ///
    /// `NeuroselError::Config` when the configuration fails validation.
    pub fn new(config: SelectionConfig) -> Result<Self> {
        Self::with_reader(config, Arc::new(AutoHeaderReader))
    }

    /// Creates an engine with a caller-supplied header reader
    pub fn with_reader(config: SelectionConfig, reader: Arc<dyn HeaderReader>) -> Result<Self> {
        let config = config.validate()?;
        Ok(Self {
            ranker: CompositeRanker::from_config(&config),
            decider: ReferenceSpaceDecider::new(&config),
            reader,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Builds the candidate catalog for a subject directory
    pub fn catalog(&self, dir: &Path) -> Result<MetadataCatalog> {
        MetadataCatalog::build_with_reader(dir, &self.config, Arc::clone(&self.reader))
    }

    /// Runs the full pipeline for one subject and persists the record
    pub fn run(
        &self,
        subject: &str,
        dir: &Path,
        presenter: &mut dyn SelectionPresenter,
        store: &mut DecisionStore,
    ) -> Result<SubjectRun> {
        info!("Selecting series for {} from {}", subject, dir.display());
        let catalog = self.catalog(dir)?;
        self.run_with_catalog(subject, &catalog, presenter, store)
    }

    /// Runs selection over an existing catalog and persists the record
    pub fn run_with_catalog(
        &self,
        subject: &str,
        catalog: &MetadataCatalog,
        presenter: &mut dyn SelectionPresenter,
        store: &mut DecisionStore,
    ) -> Result<SubjectRun> {
        let selection = self.evaluate(subject, catalog, presenter)?;
        let record = DecisionRecord::from_selection(&selection)?;
        let record_path = store.persist(&record)?;
        Ok(SubjectRun {
            selection,
            record,
            record_path,
        })
    }

    /// Ranks every modality, decides the reference space and lets the
    /// presenter review it; nothing is persisted
    ///
    /// # Errors
    ///
    /// `NeuroselError::NoCandidate` when no usable T1 exists and a
    /// FLAIR-only reference is not allowed. A missing FLAIR is recovered.
    pub fn evaluate(
        &self,
        subject: &str,
        catalog: &MetadataCatalog,
        presenter: &mut dyn SelectionPresenter,
    ) -> Result<SubjectSelection> {
        let mut degradations = Vec::new();

        let flair_candidates = catalog.for_modality(Modality::Flair);
        let flair_anchor = self.flair_anchor(subject, &flair_candidates);

        let t1 = self.select_anchor(
            subject,
            Modality::T1,
            &catalog.for_modality(Modality::T1),
            flair_anchor.as_ref(),
            presenter,
            &mut degradations,
        )?;
        let t1_choice = t1.as_ref().map(|s| s.decision.chosen.candidate.clone());

        let flair = self.select_anchor(
            subject,
            Modality::Flair,
            &flair_candidates,
            t1_choice.as_ref(),
            presenter,
            &mut degradations,
        )?;

        let reference = self.decider.decide(
            subject,
            t1.as_ref().map(|s| &s.decision.chosen),
            flair.as_ref().map(|s| &s.decision.chosen),
        )?;

        // Remaining modalities register to T1, or FLAIR when T1 is absent
        let anchor = t1_choice.or_else(|| flair.as_ref().map(|s| s.decision.chosen.candidate.clone()));
        let mut selections: Vec<ModalitySelection> = t1.into_iter().chain(flair).collect();
        for modality in catalog.modalities() {
            if modality.is_reference_anchor() {
                continue;
            }
            let candidates = catalog.for_modality(modality);
            selections.push(self.select(subject, modality, &candidates, anchor.as_ref(), presenter)?);
        }
        selections.sort_by_key(|s| s.decision.modality);

        let mut selection = SubjectSelection {
            subject: subject.to_string(),
            selections,
            reference,
            dropped: catalog.dropped.clone(),
            degradations,
        };

        if presenter.review_reference(&selection)? == ReviewOutcome::Override {
            match selection.reference.overridden() {
                Some(overridden) => {
                    info!("{}: reference overridden to {}", subject, overridden.modality);
                    selection.reference = overridden;
                }
                None => warn!(
                    "{}: override requested but no alternative to {} exists",
                    subject, selection.reference.modality
                ),
            }
        }

        Ok(selection)
    }

    /// FLAIR top candidate used as the cross-modal reference for T1
    fn flair_anchor(&self, subject: &str, candidates: &[ScanCandidate]) -> Option<ScanCandidate> {
        let configured = self.config.mode_for(Modality::Flair);
        let mode = if configured.is_cross_modal() || configured == SelectionMode::Interactive {
            SelectionMode::Original
        } else {
            configured
        };
        self.ranker
            .rank(subject, Modality::Flair, candidates, mode, None)
            .ok()
            .map(|outcome| outcome.provisional().candidate.clone())
    }

    /// Selects T1 or FLAIR, recovering from an empty candidate set
    fn select_anchor(
        &self,
        subject: &str,
        modality: Modality,
        candidates: &[ScanCandidate],
        reference: Option<&ScanCandidate>,
        presenter: &mut dyn SelectionPresenter,
        degradations: &mut Vec<Degradation>,
    ) -> Result<Option<ModalitySelection>> {
        match self.select(subject, modality, candidates, reference, presenter) {
            Ok(selection) => Ok(Some(selection)),
            Err(NeuroselError::NoCandidate { reason, .. }) => {
                warn!("{}: no {} candidate ({})", subject, modality, reason);
                degradations.push(Degradation::ModalityUnavailable { modality });
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn select(
        &self,
        subject: &str,
        modality: Modality,
        candidates: &[ScanCandidate],
        reference: Option<&ScanCandidate>,
        presenter: &mut dyn SelectionPresenter,
    ) -> Result<ModalitySelection> {
        let mode = self.config.mode_for(modality);
        let outcome = self
            .ranker
            .rank(subject, modality, candidates, mode, reference)?;

        let choice = if outcome.needs_choice() {
            presenter.choose_candidate(modality, outcome.views())?
        } else {
            CandidateChoice::default()
        };
        let view = outcome
            .views()
            .get(choice.view)
            .ok_or_else(|| NeuroselError::InvalidSelection {
                modality,
                reason: format!(
                    "view {} out of range for {} rankings",
                    choice.view,
                    outcome.views().len()
                ),
            })?;
        let decision = Decision::from_ranking(view, mode, choice.entry)?;

        info!("{}: {}", subject, decision);
        debug!("{}: {} rationale {}", subject, modality, decision.rationale());
        Ok(ModalitySelection { outcome, decision })
    }
}
