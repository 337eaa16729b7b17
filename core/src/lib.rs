pub mod api;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod scoring;
pub mod selection;
pub mod types;

pub use api::{VolumeInspection, VolumeInspector};
pub use catalog::{DroppedCandidate, MetadataCatalog};
pub use cli::presenter::{
    BatchPresenter, CandidateChoice, InteractivePresenter, ReviewOutcome, SelectionPresenter,
};
pub use cli::report::TextReport;
pub use error::{NeuroselError, Result};
pub use scoring::{CompatibilityAnalyzer, QualityScorer};
pub use selection::{
    CompositeRanker, Decision, DecisionRecord, DecisionStore, RankOutcome, RankedCandidate,
    Ranking, ReferenceSpaceDecider, ReferenceSpaceDecision, SelectionEngine, SubjectSelection,
};
pub use types::*;
