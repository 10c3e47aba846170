// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Strict `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]` versions.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::VersionError;

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^v?(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .unwrap()
});

/// One dot-separated prerelease identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Identifier {
    /// Classify a raw identifier. Digit-only identifiers that fit in a `u64`
    /// compare numerically, everything else lexically.
    pub fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<u64>() {
                return Self::Numeric(n);
            }
        }
        Self::Alpha(raw.to_string())
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

/// Split a prerelease tag (`rc.1`) into identifiers.
pub(crate) fn parse_prerelease(tag: &str) -> Vec<Identifier> {
    tag.split('.').map(Identifier::parse).collect()
}

/// Order two prerelease lists. An empty list is a release and sorts after
/// every prerelease; otherwise identifiers compare pairwise and a strict
/// prefix sorts first.
pub fn compare_prerelease(a: &[Identifier], b: &[Identifier]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// A fully parsed, immutable version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    /// `[major, minor, patch]`
    pub segments: [u64; 3],

    /// Prerelease identifiers, empty for a release.
    pub prerelease: Vec<Identifier>,

    /// Build metadata, ignored for precedence.
    pub build: Option<String>,
}

impl ParsedVersion {
    /// Create a release version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            segments: [major, minor, patch],
            prerelease: Vec::new(),
            build: None,
        }
    }

    /// The lowest possible version on a tuple (`M.m.p-0`). Used as an
    /// exclusive upper bound so prereleases of the next release stay out.
    pub(crate) fn floor_of(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            segments: [major, minor, patch],
            prerelease: vec![Identifier::Numeric(0)],
            build: None,
        }
    }

    /// Parse a strict semver string. A single leading `v` is tolerated.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let input = input.trim();
        let caps = VERSION_RE
            .captures(input)
            .ok_or_else(|| VersionError::InvalidVersion(input.to_string()))?;

        let mut segments = [0u64; 3];
        for (i, slot) in segments.iter_mut().enumerate() {
            let raw = &caps[i + 1];
            *slot = raw
                .parse()
                .map_err(|_| VersionError::Overflow(input.to_string()))?;
        }

        Ok(Self {
            segments,
            prerelease: caps
                .get(4)
                .map(|m| parse_prerelease(m.as_str()))
                .unwrap_or_default(),
            build: caps.get(5).map(|m| m.as_str().to_string()),
        })
    }

    /// Check whether a string is a valid version.
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    pub fn major(&self) -> u64 {
        self.segments[0]
    }

    pub fn minor(&self) -> u64 {
        self.segments[1]
    }

    pub fn patch(&self) -> u64 {
        self.segments[2]
    }

    /// Whether this version carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Precedence comparison. Build metadata does not participate, so two
    /// versions can compare `Equal` without being `==`.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.segments
            .cmp(&other.segments)
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [major, minor, patch] = self.segments;
        write!(f, "{}.{}.{}", major, minor, patch)?;
        if !self.prerelease.is_empty() {
            let tag: Vec<String> = self.prerelease.iter().map(ToString::to_string).collect();
            write!(f, "-{}", tag.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}
