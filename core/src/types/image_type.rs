use std::fmt;

use super::Provenance;

/// DICOM ImageType value decomposed into its components
///
/// - `pixels`: first value, "ORIGINAL" or "DERIVED"
/// - `exam`: second value, e.g. "PRIMARY", "SECONDARY"
/// - `extras`: everything after, e.g. "M", "ND", "NORM", "MPR"
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct ImageType {
    pub pixels: String,
    pub exam: String,
    pub extras: Vec<String>,
}

impl ImageType {
    /// Builds an ImageType from the raw multi-valued field
    ///
    /// Values are trimmed and upper-cased; empty entries are dropped.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parts = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_uppercase())
            .filter(|v| !v.is_empty());

        Self {
            pixels: parts.next().unwrap_or_default(),
            exam: parts.next().unwrap_or_default(),
            extras: parts.collect(),
        }
    }

    /// Parses a backslash-separated DICOM string, e.g. `ORIGINAL\PRIMARY\M\ND`
    pub fn parse(s: &str) -> Self {
        Self::from_values(s.split('\\'))
    }

    /// Acquisition provenance implied by the first value
    ///
    /// Any other value (or an empty field) is reported as unknown.
    pub fn provenance(&self) -> Provenance {
        match self.pixels.as_str() {
            "ORIGINAL" => Provenance::Original,
            "DERIVED" => Provenance::Derived,
            _ if self.contains("DERIVED") => Provenance::Derived,
            _ => Provenance::Unknown,
        }
    }

    /// Checks if any component equals the given value
    pub fn contains(&self, val: &str) -> bool {
        self.pixels == val || self.exam == val || self.extras.iter().any(|x| x == val)
    }

    /// Returns true if the field carried any value at all
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty() && self.exam.is_empty() && self.extras.is_empty()
    }

    /// Pipe-joined representation, e.g. "ORIGINAL|PRIMARY|M|ND"
    pub fn simple_repr(&self) -> String {
        let mut parts = vec![self.pixels.as_str(), self.exam.as_str()];
        parts.extend(self.extras.iter().map(String::as_str));
        parts.retain(|p| !p.is_empty());
        parts.join("|")
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_repr())
    }
}
