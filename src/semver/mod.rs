// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Semantic version matching.
//!
//! A small, dependency-light evaluator for `satisfies(version, range)` in the
//! dialect package ecosystems use for `supportedVersions` lists:
//!
//! - comparators: `<`, `<=`, `>`, `>=`, `=`
//! - caret (`^1.2.3`), tilde (`~1.2.3`, `~>1.2`), x-ranges (`1.x`, `*`)
//! - hyphen ranges (`1.2.3 - 2.3`)
//! - `||` alternatives and whitespace-separated intersections
//!
//! Evaluation never panics and never returns an error: malformed input is
//! logged (or handed to a caller-supplied reporter) and treated as "does not
//! satisfy".
//!
//! # Example
//!
//! ```rust
//! use modpatch::semver::{satisfies, SatisfiesOptions};
//!
//! assert!(satisfies("1.2.3", "^1.2.0", SatisfiesOptions::default()));
//! assert!(!satisfies("2.0.0", "^1.2.0", SatisfiesOptions::default()));
//! ```

mod range;
mod version;

use crate::error::VersionError;

pub use range::{Comparator, Operator, ParsedRange, VersionRange};
pub use version::{compare_prerelease, Identifier, ParsedVersion};

/// Options for [`satisfies`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatisfiesOptions {
    /// Let prerelease versions match ranges that do not mention a prerelease
    /// on the same `major.minor.patch`.
    pub include_prerelease: bool,
}

impl SatisfiesOptions {
    /// Options with prerelease matching turned on.
    pub fn with_prerelease() -> Self {
        Self {
            include_prerelease: true,
        }
    }
}

/// Check whether `version` satisfies `range`.
///
/// An invalid version never satisfies anything. An empty range or a bare
/// wildcard is satisfied by every valid version, prereleases included.
pub fn satisfies(version: &str, range: &str, options: SatisfiesOptions) -> bool {
    satisfies_reporting(version, range, options, |err| {
        tracing::error!(version = %version, range = %range, "{}", err)
    })
}

/// [`satisfies`], handing every parse problem to `report` instead of
/// `tracing`.
pub fn satisfies_reporting<F>(version: &str, range: &str, options: SatisfiesOptions, mut report: F) -> bool
where
    F: FnMut(&VersionError),
{
    let parsed = match ParsedVersion::parse(version) {
        Ok(parsed) => parsed,
        Err(err) => {
            report(&err);
            return false;
        }
    };

    if range.trim().is_empty() {
        return true;
    }

    let range = VersionRange::parse(range);
    for err in range.errors() {
        report(err);
    }
    range.test(&parsed, options.include_prerelease)
}

/// Check a possibly unknown version against a list of supported ranges.
///
/// An unknown version only passes when the list contains a literal `"*"`;
/// it never satisfies a concrete range.
pub fn is_supported(version: Option<&str>, supported: &[String], include_prerelease: bool) -> bool {
    is_supported_reporting(version, supported, include_prerelease, |err| {
        tracing::error!(version = ?version, "{}", err)
    })
}

/// [`is_supported`], handing every parse problem to `report`.
pub fn is_supported_reporting<F>(
    version: Option<&str>,
    supported: &[String],
    include_prerelease: bool,
    mut report: F,
) -> bool
where
    F: FnMut(&VersionError),
{
    match version {
        None => supported.iter().any(|range| range.trim() == "*"),
        Some(version) => {
            let options = SatisfiesOptions { include_prerelease };
            supported
                .iter()
                .any(|range| satisfies_reporting(version, range, options, &mut report))
        }
    }
}

/// Check whether a string is a strict semver version.
pub fn valid(version: &str) -> bool {
    ParsedVersion::is_valid(version)
}
