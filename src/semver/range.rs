// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Range expressions.
//!
//! A range is an OR (`||`) of branches; a branch is an AND of whitespace
//! separated clauses. Hyphen, tilde, caret and x-range clauses are rewritten
//! into plain comparators before evaluation:
//!
//! | clause        | comparators                 |
//! |---------------|-----------------------------|
//! | `1.2.x`       | `>=1.2.0 <1.3.0-0`          |
//! | `~1.2.3`      | `>=1.2.3 <1.3.0-0`          |
//! | `^0.2.3`      | `>=0.2.3 <0.3.0-0`          |
//! | `1.2 - 2`     | `>=1.2.0 <3.0.0-0`          |
//!
//! The `-0` upper bounds keep prereleases of the next release out of range.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;

use super::version::{parse_prerelease, Identifier, ParsedVersion};
use crate::error::VersionError;

static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(<=|>=|==|~>|<|>|=|~|\^)?v?(x|X|\*|0|[1-9]\d*)(?:\.(x|X|\*|0|[1-9]\d*))?(?:\.(x|X|\*|0|[1-9]\d*))?(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .unwrap()
});

/// Whitespace between an operator and its version (`>= 1.2.3`).
static OPERATOR_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(<=|>=|==|~>|<|>|=|~|\^)\s+").unwrap());

/// `A - B`, surrounded by whitespace on both sides of the dash.
static HYPHEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S+)\s+-\s+(\S+)").unwrap());

/// Operator of one written clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    /// `=`, `==` or no operator at all.
    Eq,
    /// `~` or `~>`
    Tilde,
    Caret,
}

impl Operator {
    fn from_symbol(symbol: Option<&str>) -> Self {
        match symbol {
            Some("<") => Self::Lt,
            Some("<=") => Self::Le,
            Some(">") => Self::Gt,
            Some(">=") => Self::Ge,
            Some("~") | Some("~>") => Self::Tilde,
            Some("^") => Self::Caret,
            _ => Self::Eq,
        }
    }
}

/// One clause of a range as written, before normalization. `None` segments
/// are wildcards (`x`, `X`, `*` or omitted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRange {
    /// The clause as written, operator included.
    pub raw: String,
    pub operator: Operator,
    pub segments: [Option<u64>; 3],
    pub prerelease: Vec<Identifier>,
}

/// A primitive comparison against a concrete version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub operator: Operator,
    pub version: ParsedVersion,
}

impl Comparator {
    fn new(operator: Operator, version: ParsedVersion) -> Self {
        Self { operator, version }
    }

    /// Matches nothing: no version sorts below `0.0.0-0`.
    fn nothing() -> Self {
        Self::new(Operator::Lt, ParsedVersion::floor_of(0, 0, 0))
    }

    /// Test a version against this comparator.
    pub fn test(&self, version: &ParsedVersion) -> bool {
        let ord = version.compare(&self.version);
        match self.operator {
            Operator::Lt => ord == Ordering::Less,
            Operator::Le => ord != Ordering::Greater,
            Operator::Gt => ord == Ordering::Greater,
            Operator::Ge => ord != Ordering::Less,
            Operator::Eq | Operator::Tilde | Operator::Caret => ord == Ordering::Equal,
        }
    }
}

fn bump(n: u64, clause: &str) -> Result<u64, VersionError> {
    n.checked_add(1)
        .ok_or_else(|| VersionError::Overflow(clause.to_string()))
}

impl ParsedRange {
    /// Parse a single clause such as `^1.2.3`, `>=2`, `1.x` or `*`.
    pub fn parse(clause: &str) -> Result<Self, VersionError> {
        let caps = CLAUSE_RE
            .captures(clause)
            .ok_or_else(|| VersionError::InvalidRange(clause.to_string()))?;

        let mut segments = [None; 3];
        let mut wildcard_seen = false;
        for (i, slot) in segments.iter_mut().enumerate() {
            let Some(raw) = caps.get(i + 2).map(|m| m.as_str()) else {
                wildcard_seen = true;
                continue;
            };
            if wildcard_seen || matches!(raw, "x" | "X" | "*") {
                // Anything after a wildcard is itself a wildcard (`1.x.3` == `1.x`).
                wildcard_seen = true;
                continue;
            }
            *slot = Some(
                raw.parse()
                    .map_err(|_| VersionError::Overflow(clause.to_string()))?,
            );
        }

        let prerelease = caps
            .get(5)
            .map(|m| parse_prerelease(m.as_str()))
            .unwrap_or_default();
        if !prerelease.is_empty() && segments[2].is_none() {
            return Err(VersionError::InvalidRange(clause.to_string()));
        }

        Ok(Self {
            raw: clause.to_string(),
            operator: Operator::from_symbol(caps.get(1).map(|m| m.as_str())),
            segments,
            prerelease,
        })
    }

    /// The full `[major, minor, patch]` tuple, if no segment is a wildcard.
    pub fn exact_tuple(&self) -> Option<[u64; 3]> {
        match self.segments {
            [Some(major), Some(minor), Some(patch)] => Some([major, minor, patch]),
            _ => None,
        }
    }

    fn full_version(&self, major: u64, minor: u64, patch: u64) -> ParsedVersion {
        ParsedVersion {
            segments: [major, minor, patch],
            prerelease: self.prerelease.clone(),
            build: None,
        }
    }

    /// Rewrite this clause into primitive comparators. An empty result means
    /// the clause is unconstrained.
    pub fn comparators(&self) -> Result<Vec<Comparator>, VersionError> {
        use Operator::*;

        let raw = self.raw.as_str();
        let [major, minor, patch] = self.segments;

        let Some(major) = major else {
            return Ok(match self.operator {
                Lt | Gt => vec![Comparator::nothing()],
                _ => Vec::new(),
            });
        };

        let comparators = match (self.operator, minor, patch) {
            // x-ranges and exact matches
            (Eq, None, _) => vec![
                Comparator::new(Ge, ParsedVersion::new(major, 0, 0)),
                Comparator::new(Lt, ParsedVersion::floor_of(bump(major, raw)?, 0, 0)),
            ],
            (Eq, Some(minor), None) => vec![
                Comparator::new(Ge, ParsedVersion::new(major, minor, 0)),
                Comparator::new(Lt, ParsedVersion::floor_of(major, bump(minor, raw)?, 0)),
            ],
            (Eq, Some(minor), Some(patch)) => {
                vec![Comparator::new(Eq, self.full_version(major, minor, patch))]
            }

            (Gt, None, _) => vec![Comparator::new(Ge, ParsedVersion::new(bump(major, raw)?, 0, 0))],
            (Gt, Some(minor), None) => {
                vec![Comparator::new(Ge, ParsedVersion::new(major, bump(minor, raw)?, 0))]
            }
            (Gt, Some(minor), Some(patch)) => {
                vec![Comparator::new(Gt, self.full_version(major, minor, patch))]
            }

            (Ge, minor, None) => {
                vec![Comparator::new(Ge, ParsedVersion::new(major, minor.unwrap_or(0), 0))]
            }
            (Ge, Some(minor), Some(patch)) => {
                vec![Comparator::new(Ge, self.full_version(major, minor, patch))]
            }

            (Lt, minor, None) => {
                vec![Comparator::new(Lt, ParsedVersion::floor_of(major, minor.unwrap_or(0), 0))]
            }
            (Lt, Some(minor), Some(patch)) => {
                vec![Comparator::new(Lt, self.full_version(major, minor, patch))]
            }

            (Le, None, _) => vec![Comparator::new(Lt, ParsedVersion::floor_of(bump(major, raw)?, 0, 0))],
            (Le, Some(minor), None) => {
                vec![Comparator::new(Lt, ParsedVersion::floor_of(major, bump(minor, raw)?, 0))]
            }
            (Le, Some(minor), Some(patch)) => {
                vec![Comparator::new(Le, self.full_version(major, minor, patch))]
            }

            (Tilde, None, _) | (Caret, None, _) => vec![
                Comparator::new(Ge, ParsedVersion::new(major, 0, 0)),
                Comparator::new(Lt, ParsedVersion::floor_of(bump(major, raw)?, 0, 0)),
            ],
            (Tilde, Some(minor), patch) => vec![
                Comparator::new(Ge, self.full_version(major, minor, patch.unwrap_or(0))),
                Comparator::new(Lt, ParsedVersion::floor_of(major, bump(minor, raw)?, 0)),
            ],

            (Caret, Some(minor), patch) => {
                let upper = if major > 0 {
                    ParsedVersion::floor_of(bump(major, raw)?, 0, 0)
                } else if minor > 0 || patch.is_none() {
                    ParsedVersion::floor_of(0, bump(minor, raw)?, 0)
                } else {
                    ParsedVersion::floor_of(0, 0, bump(patch.unwrap_or(0), raw)?)
                };
                vec![
                    Comparator::new(Ge, self.full_version(major, minor, patch.unwrap_or(0))),
                    Comparator::new(Lt, upper),
                ]
            }

            // parse() never yields a patch without a minor
            (_, None, Some(_)) => return Err(VersionError::InvalidRange(self.raw.clone())),
        };

        Ok(comparators)
    }
}

/// One AND-group of a range.
#[derive(Debug, Clone)]
enum Branch {
    /// No constraint at all (`*`, `x`, `>=*`, an empty branch).
    Any,
    Clauses {
        clauses: Vec<ParsedRange>,
        comparators: Vec<Comparator>,
    },
    /// At least one clause failed to parse; never satisfied.
    Invalid(VersionError),
}

impl Branch {
    fn parse(input: &str) -> Self {
        let expanded = HYPHEN_RE.replace_all(input.trim(), ">=$1 <=$2");
        let compact = OPERATOR_SPACE_RE.replace_all(&expanded, "$1");

        let mut clauses = Vec::new();
        let mut comparators = Vec::new();
        for raw in compact.split_whitespace() {
            let parsed = match ParsedRange::parse(raw) {
                Ok(parsed) => parsed,
                Err(err) => return Self::Invalid(err),
            };
            match parsed.comparators() {
                Ok(mut list) => comparators.append(&mut list),
                Err(err) => return Self::Invalid(err),
            }
            clauses.push(parsed);
        }

        if comparators.is_empty() {
            Self::Any
        } else {
            Self::Clauses {
                clauses,
                comparators,
            }
        }
    }

    fn test(&self, version: &ParsedVersion, include_prerelease: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Invalid(_) => false,
            Self::Clauses {
                clauses,
                comparators,
            } => {
                if !comparators.iter().all(|c| c.test(version)) {
                    return false;
                }
                if include_prerelease || !version.is_prerelease() {
                    return true;
                }
                // A prerelease only matches when a clause opts into
                // prereleases on the very same release tuple.
                clauses.iter().any(|clause| {
                    !clause.prerelease.is_empty() && clause.exact_tuple() == Some(version.segments)
                })
            }
        }
    }
}

/// A parsed range expression, reusable across many versions.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    branches: Vec<Branch>,
}

impl VersionRange {
    /// Parse a range. Never fails: malformed OR-branches are kept as
    /// never-matching entries so the remaining branches still count.
    pub fn parse(range: &str) -> Self {
        let branches = range.split("||").map(Branch::parse).collect();
        Self {
            raw: range.to_string(),
            branches,
        }
    }

    /// The range as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether every branch parsed.
    pub fn is_valid(&self) -> bool {
        !self.branches.iter().any(|b| matches!(b, Branch::Invalid(_)))
    }

    /// Parse errors of malformed branches.
    pub fn errors(&self) -> Vec<&VersionError> {
        self.branches
            .iter()
            .filter_map(|b| match b {
                Branch::Invalid(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    /// Whether `version` satisfies any branch.
    pub fn test(&self, version: &ParsedVersion, include_prerelease: bool) -> bool {
        self.branches
            .iter()
            .any(|branch| branch.test(version, include_prerelease))
    }
}
