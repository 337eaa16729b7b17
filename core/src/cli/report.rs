use crate::selection::{Decision, Ranking, ReferenceSpaceDecision, SubjectSelection};
use std::fmt;

/// Text report of a subject's selection
///
/// One comparison table per modality followed by the reference-space
/// recommendation.
pub struct TextReport<'a> {
    selection: &'a SubjectSelection,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(selection: &'a SubjectSelection) -> Self {
        Self { selection }
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("Series Selection: {}", self.selection.subject);
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(f)?;

        for selection in &self.selection.selections {
            let decision = &selection.decision;
            writeln!(f, "{} ({} mode)", decision.modality, decision.mode_label())?;
            write!(
                f,
                "{}",
                RankingTable::new(selection.ranking()).marking(decision)
            )?;
            writeln!(f, "  Rationale: {}", decision.rationale())?;
            writeln!(f)?;
        }

        for dropped in &self.selection.dropped {
            writeln!(
                f,
                "Dropped {} {}: {}",
                dropped.modality,
                dropped.path.display(),
                dropped.reason
            )?;
        }
        for degradation in &self.selection.degradations {
            writeln!(f, "Note: {}", degradation)?;
        }
        if !self.selection.dropped.is_empty() || !self.selection.degradations.is_empty() {
            writeln!(f)?;
        }

        write!(f, "{}", ReferenceSummary::new(&self.selection.reference))
    }
}

/// Comparison table for one ranking
pub struct RankingTable<'a> {
    ranking: &'a Ranking,
    chosen: Option<usize>,
}

impl<'a> RankingTable<'a> {
    /// Creates a table for a ranking
    pub fn new(ranking: &'a Ranking) -> Self {
        Self {
            ranking,
            chosen: None,
        }
    }

    /// Marks the decided row
    pub fn marking(mut self, decision: &Decision) -> Self {
        self.chosen = Some(decision.rank);
        self
    }
}

impl<'a> fmt::Display for RankingTable<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "    {:>2}  {:<40} {:>20} {:>13} {:>10} {:>7} {:>9}",
            "#", "File", "Resolution (mm)", "Dimensions", "Provenance", "Quality", "Total"
        )?;
        for (index, entry) in self.ranking.entries.iter().enumerate() {
            let marker = if self.chosen == Some(index) { "*" } else { " " };
            let c = &entry.candidate;
            writeln!(
                f,
                "  {} {:>2}  {:<40} {:>20} {:>13} {:>10} {:>7} {:>9.1}",
                marker,
                index + 1,
                c.file_name(),
                c.spacing.to_string(),
                c.dims.to_string(),
                c.provenance.simple_name(),
                c.quality
                    .map(|q| format!("{:.0}", q))
                    .unwrap_or_else(|| "-".to_string()),
                entry.score.total
            )?;
        }
        for entry in &self.ranking.excluded {
            writeln!(
                f,
                "    --  {:<40} excluded ({} under {} mode)",
                entry.candidate.file_name(),
                entry.candidate.provenance.simple_name(),
                self.ranking.mode
            )?;
        }
        for degradation in &self.ranking.degradations {
            writeln!(f, "    Note: {}", degradation)?;
        }
        Ok(())
    }
}

/// Reference-space recommendation block
pub struct ReferenceSummary<'a> {
    decision: &'a ReferenceSpaceDecision,
}

impl<'a> ReferenceSummary<'a> {
    pub fn new(decision: &'a ReferenceSpaceDecision) -> Self {
        Self { decision }
    }
}

impl<'a> fmt::Display for ReferenceSummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.decision;
        writeln!(f, "Reference Space")?;
        writeln!(f, "---------------")?;
        writeln!(f, "Recommended:  {}", d.modality)?;
        writeln!(f, "Rationale:    {}", d.rationale)?;
        writeln!(f, "Confidence:   {}", d.confidence)?;
        writeln!(f, "Score diff:   {:+.1} (FLAIR - T1)", d.score_diff)?;
        if let Some(path) = d.reference_path() {
            writeln!(f, "Volume:       {}", path.display())?;
        }
        for degradation in &d.degradations {
            writeln!(f, "Note:         {}", degradation)?;
        }
        Ok(())
    }
}

/// Full score breakdown of both anchors
pub struct ScoreDetail<'a> {
    decision: &'a ReferenceSpaceDecision,
}

impl<'a> ScoreDetail<'a> {
    pub fn new(decision: &'a ReferenceSpaceDecision) -> Self {
        Self { decision }
    }
}

impl<'a> fmt::Display for ScoreDetail<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, anchor) in [("T1", &self.decision.t1), ("FLAIR", &self.decision.flair)] {
            match anchor {
                Some(a) => {
                    writeln!(f, "{:<6} {}", label, a.path.display())?;
                    writeln!(f, "       {}", a.score)?;
                }
                None => writeln!(f, "{:<6} not available", label)?,
            }
        }
        Ok(())
    }
}
