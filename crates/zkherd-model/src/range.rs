//! Closed integer intervals with `a,b-c` parse and format.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A closed integer interval `[start, end]`, endpoints inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    /// Create a range. Fails when `start` exceeds `end`.
    pub fn new(start: u64, end: u64) -> ModelResult<Self> {
        if start > end {
            return Err(ModelError::InvalidRange(format!("{start}-{end}")));
        }
        Ok(Self { start, end })
    }

    /// A single-point range `[value, value]`.
    pub fn point(value: u64) -> Self {
        Self { start: value, end: value }
    }

    /// Intersection with another range, or `None` when they are disjoint.
    pub fn overlap(self, other: Range) -> Option<Range> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Range { start, end })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Parse a comma-separated list of `a` or `a-b` tokens.
///
/// An empty string yields an empty list; a malformed token fails with an
/// error naming that token.
pub fn parse_ranges(s: &str) -> ModelResult<Vec<Range>> {
    let mut ranges = Vec::new();
    for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        ranges.push(parse_token(token)?);
    }
    Ok(ranges)
}

fn parse_token(token: &str) -> ModelResult<Range> {
    let bad = || ModelError::InvalidRange(token.to_string());
    match token.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse().map_err(|_| bad())?;
            let end = end.trim().parse().map_err(|_| bad())?;
            Range::new(start, end).map_err(|_| bad())
        }
        None => Ok(Range::point(token.parse().map_err(|_| bad())?)),
    }
}

/// Format ranges back into the `a,b-c` syntax accepted by [`parse_ranges`].
pub fn format_ranges(ranges: &[Range]) -> String {
    ranges
        .iter()
        .map(Range::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
