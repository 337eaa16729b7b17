use log::debug;
use std::io::{self, BufRead, Write};

use super::report::{RankingTable, ReferenceSummary, ScoreDetail, TextReport};
use crate::error::Result;
use crate::selection::{Ranking, SubjectSelection};
use crate::types::Modality;

/// Operator verdict on the reference-space recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Accept,
    /// Switch the reference to the other anchor modality
    Override,
}

/// Entry of one ranking view picked by the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateChoice {
    /// Index into the offered views
    pub view: usize,
    /// Index into that view's entries
    pub entry: usize,
}

impl CandidateChoice {
    pub fn new(view: usize, entry: usize) -> Self {
        Self { view, entry }
    }

    /// Parses `rank` (first view) or `view.rank`, both one-based
    fn parse(answer: &str, views: &[Ranking]) -> Option<Self> {
        let (view, rank): (usize, usize) = match answer.split_once('.') {
            Some((view, rank)) => (view.trim().parse().ok()?, rank.trim().parse().ok()?),
            None => (1, answer.parse().ok()?),
        };
        let ranking = views.get(view.checked_sub(1)?)?;
        if (1..=ranking.entries.len()).contains(&rank) {
            Some(Self::new(view - 1, rank - 1))
        } else {
            None
        }
    }
}

/// Presentation port of the selection engine
///
/// The engine asks the presenter for a candidate only when a modality is
/// configured `interactive`, and always asks it to review the reference
/// decision. Ranking and deciding never depend on which presenter is used.
pub trait SelectionPresenter {
    /// Picks an entry from any of the offered `views`
    fn choose_candidate(
        &mut self,
        modality: Modality,
        views: &[Ranking],
    ) -> Result<CandidateChoice>;

    /// Accept or override the recommended reference space
    fn review_reference(&mut self, selection: &SubjectSelection) -> Result<ReviewOutcome>;
}

/// Non-blocking presenter that accepts every recommendation
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPresenter;

impl SelectionPresenter for BatchPresenter {
    fn choose_candidate(
        &mut self,
        modality: Modality,
        _views: &[Ranking],
    ) -> Result<CandidateChoice> {
        debug!("Batch mode: taking top {} candidate", modality);
        Ok(CandidateChoice::default())
    }

    fn review_reference(&mut self, _selection: &SubjectSelection) -> Result<ReviewOutcome> {
        Ok(ReviewOutcome::Accept)
    }
}

/// Terminal presenter prompting on `output` and reading answers from `input`
///
/// Invalid answers re-prompt; end of input accepts the recommendation.
pub struct InteractivePresenter<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl InteractivePresenter<io::StdinLock<'static>, io::Stdout> {
    /// Presenter on the process terminal
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> InteractivePresenter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consumes the presenter, returning the output sink
    pub fn into_output(self) -> W {
        self.output
    }

    /// Prompts and reads one trimmed line; `None` at end of input
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> SelectionPresenter for InteractivePresenter<R, W> {
    fn choose_candidate(
        &mut self,
        modality: Modality,
        views: &[Ranking],
    ) -> Result<CandidateChoice> {
        for (number, view) in views.iter().enumerate() {
            writeln!(
                self.output,
                "[{}] {} candidates ranked by {}:",
                number + 1,
                modality,
                view.mode
            )?;
            write!(self.output, "{}", RankingTable::new(view))?;
            writeln!(self.output)?;
        }

        let prompt = format!(
            "Select {} candidate as rank or view.rank [Enter=1.1]: ",
            modality
        );
        loop {
            let Some(answer) = self.ask(&prompt)? else {
                return Ok(CandidateChoice::default());
            };
            if answer.is_empty() {
                return Ok(CandidateChoice::default());
            }
            match CandidateChoice::parse(&answer, views) {
                Some(choice) => return Ok(choice),
                None => writeln!(self.output, "Invalid choice '{}'", answer)?,
            }
        }
    }

    fn review_reference(&mut self, selection: &SubjectSelection) -> Result<ReviewOutcome> {
        write!(self.output, "{}", TextReport::new(selection))?;
        loop {
            let Some(answer) = self.ask("[a]ccept / [o]verride / [d]etail: ")? else {
                return Ok(ReviewOutcome::Accept);
            };
            match answer.to_lowercase().as_str() {
                "" | "a" | "accept" => return Ok(ReviewOutcome::Accept),
                "o" | "override" => match selection.reference.alternative() {
                    Some(other) => {
                        writeln!(self.output, "Using {} as reference", other)?;
                        return Ok(ReviewOutcome::Override);
                    }
                    None => writeln!(
                        self.output,
                        "No alternative to {} is available",
                        selection.reference.modality
                    )?,
                },
                "d" | "detail" => {
                    write!(self.output, "{}", ScoreDetail::new(&selection.reference))?;
                    write!(self.output, "{}", ReferenceSummary::new(&selection.reference))?;
                }
                other => writeln!(self.output, "Invalid choice '{}'", other)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MetadataCatalog;
    use crate::selection::{CompositeRanker, SelectionEngine};
    use crate::types::{
        ImageType, MetadataSource, ReferenceRationale, ScanCandidate, SelectionConfig,
        SelectionMode, VoxelDims, VoxelSpacing,
    };
    use rstest::rstest;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn candidate(path: &str, modality: Modality, provenance: &str, mm: f64, series: &str) -> ScanCandidate {
        ScanCandidate::new(path, modality, VoxelDims::new(256, 256, 176), VoxelSpacing::uniform(mm))
            .with_image_type(ImageType::from_values([provenance, "PRIMARY"]))
            .with_series_description(series)
            .with_quality(85.0)
            .with_metadata_source(MetadataSource::Sidecar)
    }

    fn catalog() -> MetadataCatalog {
        MetadataCatalog {
            dir: PathBuf::from("/data/sub-01"),
            candidates: vec![
                candidate("/data/sub-01/T1_a.nii.gz", Modality::T1, "ORIGINAL", 1.0, "t1_mprage"),
                candidate("/data/sub-01/T1_b.nii.gz", Modality::T1, "ORIGINAL", 1.2, "t1_mprage"),
                candidate("/data/sub-01/FLAIR.nii.gz", Modality::Flair, "ORIGINAL", 0.7, "space_flair"),
            ],
            dropped: Vec::new(),
            degradations: Vec::new(),
        }
    }

    fn run(config: SelectionConfig, answers: &str) -> (SubjectSelection, String) {
        run_on(&catalog(), config, answers)
    }

    fn run_on(
        catalog: &MetadataCatalog,
        config: SelectionConfig,
        answers: &str,
    ) -> (SubjectSelection, String) {
        let mut presenter = InteractivePresenter::new(Cursor::new(answers.to_string()), Vec::new());
        let selection = SelectionEngine::new(config)
            .unwrap()
            .evaluate("sub-01", catalog, &mut presenter)
            .unwrap();
        let output = String::from_utf8(presenter.into_output()).unwrap();
        (selection, output)
    }

    #[test]
    fn test_batch_never_overrides() {
        let selection = SelectionEngine::new(SelectionConfig::default())
            .unwrap()
            .evaluate("sub-01", &catalog(), &mut BatchPresenter)
            .unwrap();
        assert_eq!(selection.reference.modality, Modality::Flair);
        assert_ne!(selection.reference.rationale, ReferenceRationale::UserOverride);
    }

    #[rstest]
    #[case("a\n")]
    #[case("\n")]
    #[case("")]
    fn test_accept_keeps_recommendation(#[case] answers: &str) {
        let (selection, _) = run(SelectionConfig::default(), answers);
        assert_eq!(selection.reference.modality, Modality::Flair);
    }

    #[test]
    fn test_override_switches_reference() {
        let (selection, output) = run(SelectionConfig::default(), "x\nd\no\n");
        assert_eq!(selection.reference.modality, Modality::T1);
        assert_eq!(selection.reference.rationale, ReferenceRationale::UserOverride);
        assert!(output.contains("Invalid choice 'x'"));
        assert!(output.contains("FLAIR  /data/sub-01/FLAIR.nii.gz"));
        assert_eq!(output.matches("[a]ccept / [o]verride / [d]etail").count(), 3);
    }

    #[test]
    fn test_interactive_candidate_choice() {
        let config = SelectionConfig::default().with_mode(Modality::T1, SelectionMode::Interactive);
        let (selection, output) = run(config, "7\n2\na\n");

        let t1 = selection.decision(Modality::T1).unwrap();
        assert_eq!(t1.rank, 1);
        assert!(t1.path().ends_with("T1_b.nii.gz"));
        assert_eq!(t1.view, SelectionMode::Original);
        assert!(t1.rationale().starts_with("interactive(original):rank2/2"));
        assert!(output.contains("[2] T1 candidates ranked by highest_resolution:"));
        assert!(output.contains("Invalid choice '7'"));
    }

    #[test]
    fn test_interactive_choice_from_other_view() {
        let catalog = MetadataCatalog {
            dir: PathBuf::from("/data/sub-01"),
            candidates: vec![
                candidate("/data/sub-01/T1_orig.nii.gz", Modality::T1, "ORIGINAL", 1.0, "t1_mprage"),
                candidate("/data/sub-01/T1_derived.nii.gz", Modality::T1, "DERIVED", 0.5, "t1_mprage"),
                candidate("/data/sub-01/FLAIR.nii.gz", Modality::Flair, "ORIGINAL", 0.7, "space_flair"),
            ],
            dropped: Vec::new(),
            degradations: Vec::new(),
        };
        let config = SelectionConfig::default().with_mode(Modality::T1, SelectionMode::Interactive);

        // The DERIVED volume has no rank in the original view
        let (selection, output) = run_on(&catalog, config, "2\n2.1\na\n");

        let t1 = selection.decision(Modality::T1).unwrap();
        assert!(t1.path().ends_with("T1_derived.nii.gz"));
        assert_eq!(t1.view, SelectionMode::HighestResolution);
        assert_eq!(t1.rank, 0);
        assert!(t1
            .rationale()
            .starts_with("interactive(highest_resolution):rank1/2"));
        assert!(output.contains("Invalid choice '2'"));

        let report = TextReport::new(&selection).to_string();
        assert!(report.contains("T1 (interactive(highest_resolution) mode)"));
    }

    #[rstest]
    #[case("1", Some(CandidateChoice::new(0, 0)))]
    #[case("2", Some(CandidateChoice::new(0, 1)))]
    #[case("4.2", Some(CandidateChoice::new(3, 1)))]
    #[case("5.1", None)]
    #[case("0.1", None)]
    #[case("2.3", None)]
    #[case("x", None)]
    fn test_choice_parsing(#[case] answer: &str, #[case] expected: Option<CandidateChoice>) {
        let outcome = CompositeRanker::from_config(&SelectionConfig::default())
            .rank(
                "sub-01",
                Modality::T1,
                &catalog().for_modality(Modality::T1),
                SelectionMode::Interactive,
                None,
            )
            .unwrap();
        assert_eq!(CandidateChoice::parse(answer, outcome.views()), expected);
    }
}
