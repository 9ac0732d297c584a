//! Placement constraints.
//!
//! A constraint is a predicate over a single node attribute, judged against
//! the values peer servers have already bound to that attribute. The
//! scheduler evaluates all constraints of a candidate server before
//! accepting an offer.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::error::{ModelError, ModelResult};

/// A placement predicate over one node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// The value must not appear in the peer history.
    Unique,
    /// With a literal: the value must equal it; peer history is never
    /// consulted. Without: pin to whichever value the first placement
    /// landed on (empty history always matches).
    Cluster(Option<String>),
    /// The value must fully match the pattern.
    Like(Pattern),
    /// The value must not fully match the pattern.
    Unlike(Pattern),
    /// Spread values across groups, keeping group sizes balanced. With an
    /// explicit group count, values may repeat once that many groups
    /// exist; without one the target grows with each distinct value seen,
    /// so every placement must start a new group.
    GroupBy(Option<usize>),
}

/// A full-string regex: the expression is anchored on both ends when
/// compiled, so `like:a.c` matches `abc` but not `xabc`.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    fn compile(source: &str) -> ModelResult<Self> {
        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|_| ModelError::InvalidConstraint(source.to_string()))?;
        Ok(Self { source: source.to_string(), regex })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Constraint {
    /// Parse a single constraint expression: `unique`, `cluster[:value]`,
    /// `like:<regex>`, `unlike:<regex>`, or `groupBy[:<n>]`.
    pub fn parse_expr(expr: &str) -> ModelResult<Self> {
        let (kind, arg) = match expr.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (expr, None),
        };
        match (kind, arg) {
            ("unique", None) => Ok(Self::Unique),
            ("cluster", arg) => Ok(Self::Cluster(arg.map(str::to_string))),
            ("like", Some(re)) => Ok(Self::Like(Pattern::compile(re)?)),
            ("unlike", Some(re)) => Ok(Self::Unlike(Pattern::compile(re)?)),
            ("groupBy", None) => Ok(Self::GroupBy(None)),
            ("groupBy", Some(n)) => n
                .parse()
                .map(|n| Self::GroupBy(Some(n)))
                .map_err(|_| ModelError::InvalidConstraint(expr.to_string())),
            _ => Err(ModelError::InvalidConstraint(expr.to_string())),
        }
    }

    /// Parse a comma-separated `attr=expr,attr=expr` spec into per-attribute
    /// constraint lists. The same attribute may appear more than once; an
    /// empty spec yields the empty map.
    pub fn parse(spec: &str) -> ModelResult<BTreeMap<String, Vec<Constraint>>> {
        let mut constraints: BTreeMap<String, Vec<Constraint>> = BTreeMap::new();
        for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (attr, expr) = token
                .split_once('=')
                .ok_or_else(|| ModelError::InvalidConstraint(token.to_string()))?;
            constraints
                .entry(attr.to_string())
                .or_default()
                .push(Self::parse_expr(expr)?);
        }
        Ok(constraints)
    }

    /// Judge `value` against the history of values peer servers have bound
    /// to the same attribute. Pure and deterministic.
    pub fn matches(&self, value: &str, history: &[String]) -> bool {
        match self {
            Self::Unique => !history.iter().any(|v| v == value),
            Self::Cluster(Some(pin)) => value == pin,
            Self::Cluster(None) => history.first().map_or(true, |first| first == value),
            Self::Like(pattern) => pattern.is_match(value),
            Self::Unlike(pattern) => !pattern.is_match(value),
            Self::GroupBy(groups) => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for v in history {
                    *counts.entry(v.as_str()).or_insert(0) += 1;
                }
                // Without an explicit count the target tracks one past the
                // distinct values seen, so repeats are never balanced.
                let target = groups.unwrap_or(counts.len() + 1);
                if counts.len() < target {
                    // Still short of the target group count: the value must
                    // start a new group.
                    !counts.contains_key(value)
                } else {
                    let min = counts.values().copied().min().unwrap_or(0);
                    counts.get(value).copied().unwrap_or(0) == min
                }
            }
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique => write!(f, "unique"),
            Self::Cluster(None) => write!(f, "cluster"),
            Self::Cluster(Some(pin)) => write!(f, "cluster:{pin}"),
            Self::Like(pattern) => write!(f, "like:{}", pattern.source()),
            Self::Unlike(pattern) => write!(f, "unlike:{}", pattern.source()),
            Self::GroupBy(None) => write!(f, "groupBy"),
            Self::GroupBy(Some(n)) => write!(f, "groupBy:{n}"),
        }
    }
}

/// Canonical string form of a constraint map, as accepted by
/// [`Constraint::parse`].
pub fn format_constraints(constraints: &BTreeMap<String, Vec<Constraint>>) -> String {
    let mut parts = Vec::new();
    for (attr, list) in constraints {
        for constraint in list {
            parts.push(format!("{attr}={constraint}"));
        }
    }
    parts.join(",")
}
