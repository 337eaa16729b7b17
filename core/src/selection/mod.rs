//! Series selection and reference-space decision
//!
//! Ranks each modality's candidates under its configured mode, decides
//! whether T1 or FLAIR anchors the reference space, and persists the
//! per-subject decision record.

mod engine;
mod ranker;
mod record;
mod reference;
mod store;

pub use engine::{Decision, ModalitySelection, SelectionEngine, SubjectRun, SubjectSelection};
pub use ranker::{CompositeRanker, RankOutcome, RankedCandidate, Ranking};
pub use record::{DecisionRecord, RecordEntry, ReferenceBlock, RegistrationStep};
pub use reference::{AnchorSummary, ReferenceSpaceDecider, ReferenceSpaceDecision};
pub use store::{DecisionStore, RECORD_FILE_NAME};
