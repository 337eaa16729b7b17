use std::fmt;
use std::path::{Path, PathBuf};

use super::engine::SubjectSelection;
use super::reference::AnchorSummary;
use crate::error::{NeuroselError, Result};
use crate::types::{Confidence, Degradation, Modality, QualityScore, ReferenceRationale};

const HEADER: &str = "# neurosel decision record";
const REFERENCE_SECTION: &str = "[reference]";

/// One `modality|file_path|rationale` line
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RecordEntry {
    pub modality: Modality,
    pub path: PathBuf,
    pub rationale: String,
}

/// The `[reference]` block
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ReferenceBlock {
    pub modality: Modality,
    pub confidence: Confidence,
    pub score_diff: f64,
    pub rationale: ReferenceRationale,
    pub t1: Option<AnchorSummary>,
    pub flair: Option<AnchorSummary>,
    /// Fallbacks behind the decision, as [`Degradation::record_note`]
    pub notes: Vec<String>,
}

/// A volume to register onto the reference space
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct RegistrationStep {
    pub modality: Modality,
    pub moving: PathBuf,
    pub fixed: PathBuf,
}

/// Persisted per-subject decision, consumed by registration and segmentation
///
/// Line-oriented text; [`DecisionRecord::parse`] reads back what
/// `Display` writes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct DecisionRecord {
    pub subject: String,
    pub entries: Vec<RecordEntry>,
    pub reference: ReferenceBlock,
}

impl DecisionRecord {
    /// Builds the record for a finished selection
    ///
    /// # Errors
    ///
    /// `NeuroselError::InvalidSelection` when a chosen path cannot be
    /// written on a single record line.
    pub fn from_selection(selection: &SubjectSelection) -> Result<Self> {
        let entries = selection
            .decisions()
            .map(|decision| {
                let path = decision.path().to_path_buf();
                check_path(decision.modality, &path)?;
                Ok(RecordEntry {
                    modality: decision.modality,
                    path,
                    rationale: decision.rationale(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let reference = &selection.reference;
        Ok(Self {
            subject: selection.subject.clone(),
            entries,
            reference: ReferenceBlock {
                modality: reference.modality,
                confidence: reference.confidence,
                score_diff: round_tenth(reference.score_diff),
                rationale: reference.rationale,
                t1: reference.t1.clone(),
                flair: reference.flair.clone(),
                notes: notes(reference.degradations.iter().chain(&selection.degradations)),
            },
        })
    }

    /// Chosen path for a modality
    pub fn path_for(&self, modality: Modality) -> Option<&Path> {
        self.entries
            .iter()
            .find(|e| e.modality == modality)
            .map(|e| e.path.as_path())
    }

    /// Volume anchoring the reference space
    pub fn reference_path(&self) -> Option<&Path> {
        self.path_for(self.reference.modality)
    }

    /// Moving/fixed pairs for every non-reference modality
    pub fn registration_plan(&self) -> Vec<RegistrationStep> {
        let Some(fixed) = self.reference_path() else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|e| e.modality != self.reference.modality)
            .map(|e| RegistrationStep {
                modality: e.modality,
                moving: e.path.clone(),
                fixed: fixed.to_path_buf(),
            })
            .collect()
    }

    /// Parses a record written by `Display`
    pub fn parse(content: &str) -> Result<Self> {
        let mut subject = None;
        let mut entries = Vec::new();
        let mut in_reference = false;
        let mut modality = None;
        let mut confidence = None;
        let mut score_diff = None;
        let mut rationale = None;
        let mut t1 = None;
        let mut flair = None;
        let mut notes = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            let line_no = index + 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == REFERENCE_SECTION {
                in_reference = true;
                continue;
            }

            if !in_reference {
                if let Some(id) = line.strip_prefix("subject=") {
                    subject = Some(id.to_string());
                    continue;
                }
                let mut parts = line.splitn(3, '|');
                let (Some(m), Some(path), Some(why)) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(parse_error(line_no, "expected modality|path|rationale"));
                };
                let m = Modality::parse(m)
                    .ok_or_else(|| parse_error(line_no, format!("unknown modality '{}'", m)))?;
                entries.push(RecordEntry {
                    modality: m,
                    path: PathBuf::from(path),
                    rationale: why.to_string(),
                });
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| parse_error(line_no, "expected key=value"))?;
            match key {
                "modality" => {
                    modality = Some(Modality::parse(value).ok_or_else(|| {
                        parse_error(line_no, format!("unknown modality '{}'", value))
                    })?)
                }
                "confidence" => {
                    confidence = Some(Confidence::parse(value).ok_or_else(|| {
                        parse_error(line_no, format!("unknown confidence '{}'", value))
                    })?)
                }
                "score_diff" => {
                    score_diff = Some(value.parse::<f64>().map_err(|e| {
                        parse_error(line_no, format!("bad score_diff: {}", e))
                    })?)
                }
                "rationale" => {
                    rationale = Some(ReferenceRationale::from_tag(value).ok_or_else(|| {
                        parse_error(line_no, format!("unknown rationale '{}'", value))
                    })?)
                }
                "t1" => t1 = parse_anchor(value).map_err(|r| parse_error(line_no, r))?,
                "flair" => flair = parse_anchor(value).map_err(|r| parse_error(line_no, r))?,
                "notes" if value != "none" => {
                    notes = value
                        .split(';')
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                "notes" => notes.clear(),
                other => {
                    return Err(parse_error(line_no, format!("unknown key '{}'", other)));
                }
            }
        }

        let missing = |field: &str| parse_error(0, format!("missing {}", field));
        Ok(Self {
            subject: subject.ok_or_else(|| missing("subject"))?,
            entries,
            reference: ReferenceBlock {
                modality: modality.ok_or_else(|| missing("reference modality"))?,
                confidence: confidence.ok_or_else(|| missing("confidence"))?,
                score_diff: score_diff.ok_or_else(|| missing("score_diff"))?,
                rationale: rationale.ok_or_else(|| missing("rationale"))?,
                t1,
                flair,
                notes,
            },
        })
    }

    /// Reads a record file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

impl fmt::Display for DecisionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", HEADER)?;
        writeln!(f, "subject={}", self.subject)?;
        for entry in &self.entries {
            writeln!(
                f,
                "{}|{}|{}",
                entry.modality,
                entry.path.display(),
                entry.rationale
            )?;
        }
        writeln!(f, "{}", REFERENCE_SECTION)?;
        writeln!(f, "modality={}", self.reference.modality)?;
        writeln!(f, "confidence={}", self.reference.confidence)?;
        writeln!(f, "score_diff={:.1}", self.reference.score_diff)?;
        writeln!(f, "rationale={}", self.reference.rationale)?;
        writeln!(f, "t1={}", AnchorLine(self.reference.t1.as_ref()))?;
        writeln!(f, "flair={}", AnchorLine(self.reference.flair.as_ref()))?;
        if self.reference.notes.is_empty() {
            writeln!(f, "notes=none")
        } else {
            writeln!(f, "notes={}", self.reference.notes.join(";"))
        }
    }
}

struct AnchorLine<'a>(Option<&'a AnchorSummary>);

impl fmt::Display for AnchorLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => write!(f, "none"),
            Some(anchor) => {
                let s = &anchor.score;
                write!(
                    f,
                    "{}|{}|{}|{}|{}|{}|{}",
                    anchor.path.display(),
                    s.total,
                    s.provenance,
                    s.isotropy,
                    s.resolution,
                    s.quality,
                    s.modality_fit
                )
            }
        }
    }
}

fn parse_anchor(value: &str) -> std::result::Result<Option<AnchorSummary>, String> {
    if value == "none" {
        return Ok(None);
    }
    let parts: Vec<&str> = value.split('|').collect();
    if parts.len() != 7 {
        return Err(format!("expected 7 anchor fields, found {}", parts.len()));
    }
    let numbers = parts[1..]
        .iter()
        .map(|p| p.parse::<f64>().map_err(|e| format!("bad score '{}': {}", p, e)))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let score =
        QualityScore::from_components(numbers[1], numbers[2], numbers[3], numbers[4], numbers[5]);
    if (score.total - numbers[0]).abs() > 1e-6 {
        return Err(format!(
            "total {} does not match component sum {}",
            numbers[0], score.total
        ));
    }
    Ok(Some(AnchorSummary {
        path: PathBuf::from(parts[0]),
        score,
    }))
}

/// Distinct record notes, in order of first appearance
fn notes<'a>(degradations: impl Iterator<Item = &'a Degradation>) -> Vec<String> {
    let mut notes: Vec<String> = Vec::new();
    for note in degradations.map(Degradation::record_note) {
        if !notes.contains(&note) {
            notes.push(note);
        }
    }
    notes
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn check_path(modality: Modality, path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    if text.contains('|') || text.contains('\n') {
        return Err(NeuroselError::InvalidSelection {
            modality,
            reason: format!("path '{}' cannot be stored in a decision record", text),
        });
    }
    Ok(())
}

fn parse_error(line: usize, reason: impl Into<String>) -> NeuroselError {
    let reason = reason.into();
    if line == 0 {
        NeuroselError::SelectionError(format!("decision record: {}", reason))
    } else {
        NeuroselError::SelectionError(format!("decision record line {}: {}", line, reason))
    }
}
