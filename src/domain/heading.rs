//! Heading model and heading-ladder validation

use serde::{Deserialize, Serialize};

/// One structural heading (`<h1>`..`<h6>`) in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading rank, 1 through 6
    pub level: u8,

    /// Visible text with markup removed
    pub text: String,

    /// Anchor identifier, `None` until assigned (or read from an `id` attribute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_id: Option<String>,
}

impl Heading {
    pub fn new(level: u8, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            anchor_id: None,
        }
    }

    /// Sets the anchor identifier (builder style)
    pub fn with_anchor(mut self, anchor_id: impl Into<String>) -> Self {
        self.anchor_id = Some(anchor_id.into());
        self
    }

    /// Returns the anchor identifier if one is set and non-empty
    pub fn anchor(&self) -> Option<&str> {
        self.anchor_id.as_deref().filter(|a| !a.is_empty())
    }
}

/// A heading whose level skips ahead of its predecessor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderViolation {
    /// Zero-based position of the offending heading in document order
    pub position: usize,

    /// Level of the offending heading
    pub level: u8,

    /// Level of the heading immediately before it
    pub previous_level: u8,

    /// Human-readable description
    pub description: String,
}

/// Scans heading levels in document order and flags every heading that is
/// more than one level deeper than its predecessor (e.g. `h2` followed by `h4`).
///
/// The first heading sets the baseline and is never flagged. Going back up
/// any number of levels is always allowed.
pub fn validate_heading_ladder(headings: &[Heading]) -> Vec<LadderViolation> {
    let mut violations = Vec::new();
    let mut previous: Option<&Heading> = None;

    for (position, heading) in headings.iter().enumerate() {
        if let Some(prev) = previous {
            if heading.level > prev.level + 1 {
                violations.push(LadderViolation {
                    position,
                    level: heading.level,
                    previous_level: prev.level,
                    description: format!(
                        "h{} '{}' jumps from h{} (expected h{} or shallower)",
                        heading.level,
                        heading.text,
                        prev.level,
                        prev.level + 1
                    ),
                });
            }
        }
        previous = Some(heading);
    }

    violations
}
