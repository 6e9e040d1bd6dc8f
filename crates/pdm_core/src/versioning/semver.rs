//! Semantic-version parsing, ordering and increments.
//!
//! # Invariants
//! - Accepted shapes: `MAJOR`, `MAJOR.MINOR`, `MAJOR.MINOR.PATCH`, each with an
//!   optional `-prerelease` and `+build` suffix.
//! - Increments keep the component count of the input version.
//! - Unparseable input and overflowing increments are errors, never a silent
//!   default.

use crate::model::definition::ReleaseField;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure to increment a version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionIncrementError {
    pub version: String,
    pub field: ReleaseField,
}

impl Display for VersionIncrementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "could not increment {} version on `{}`",
            self.field, self.version
        )
    }
}

impl Error for VersionIncrementError {}

/// Computes the next version of a lineage.
pub trait VersionIncrementer {
    fn increment(&self, current: &str, field: ReleaseField)
        -> Result<String, VersionIncrementError>;
}

/// Default incrementer using semantic-version arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverIncrementer;

impl VersionIncrementer for SemverIncrementer {
    fn increment(
        &self,
        current: &str,
        field: ReleaseField,
    ) -> Result<String, VersionIncrementError> {
        let parsed = ParsedVersion::parse(current).ok_or_else(|| VersionIncrementError {
            version: current.to_string(),
            field,
        })?;
        parsed
            .increment(field)
            .map(|next| next.render())
            .ok_or_else(|| VersionIncrementError {
                version: current.to_string(),
                field,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedVersion {
    numbers: [u64; 3],
    components: usize,
    prerelease: Option<String>,
}

impl ParsedVersion {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let value = value.strip_prefix('v').unwrap_or(value);
        let without_build = match value.split_once('+') {
            Some((head, build)) => {
                if !is_valid_dot_separated(build) {
                    return None;
                }
                head
            }
            None => value,
        };
        let (core, prerelease) = match without_build.split_once('-') {
            Some((core, pre)) => {
                if !is_valid_dot_separated(pre) {
                    return None;
                }
                (core, Some(pre.to_string()))
            }
            None => (without_build, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }

        let mut numbers = [0_u64; 3];
        for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
            *slot = parse_numeric_identifier(part)?;
        }

        Some(Self {
            numbers,
            components: parts.len(),
            prerelease,
        })
    }

    /// Returns `None` when the bumped component would overflow.
    fn increment(&self, field: ReleaseField) -> Option<Self> {
        let [major, minor, patch] = self.numbers;
        let releases_prerelease = self.prerelease.is_some()
            && match field {
                ReleaseField::Major => minor == 0 && patch == 0,
                ReleaseField::Minor => patch == 0,
            };

        let numbers = if releases_prerelease {
            self.numbers
        } else {
            match field {
                ReleaseField::Major => [major.checked_add(1)?, 0, 0],
                ReleaseField::Minor => [major, minor.checked_add(1)?, 0],
            }
        };
        let components = match field {
            ReleaseField::Major => self.components,
            ReleaseField::Minor => self.components.max(2),
        };

        Some(Self {
            numbers,
            components,
            prerelease: None,
        })
    }

    fn render(&self) -> String {
        let mut rendered = self.numbers[..self.components]
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        if let Some(pre) = &self.prerelease {
            rendered.push('-');
            rendered.push_str(pre);
        }
        rendered
    }

    fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.numbers
            .cmp(&other.numbers)
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(left), Some(right)) => cmp_prerelease(left, right),
            })
    }
}

/// Orders two version strings by semantic-version precedence.
///
/// Strings that do not parse sort below any that do, and compare lexically
/// among themselves.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    match (ParsedVersion::parse(left), ParsedVersion::parse(right)) {
        (Some(left), Some(right)) => left.cmp_precedence(&right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => left.cmp(right),
    }
}

fn parse_numeric_identifier(part: &str) -> Option<u64> {
    if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

fn is_valid_dot_separated(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|identifier| {
            !identifier.is_empty()
                && identifier
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
        })
}

fn cmp_prerelease(left: &str, right: &str) -> Ordering {
    let mut left_ids = left.split('.');
    let mut right_ids = right.split('.');
    loop {
        match (left_ids.next(), right_ids.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_versions, SemverIncrementer, VersionIncrementer};
    use crate::model::definition::ReleaseField;
    use std::cmp::Ordering;

    fn inc(version: &str, field: ReleaseField) -> String {
        SemverIncrementer.increment(version, field).unwrap()
    }

    #[test]
    fn major_increment_keeps_component_count() {
        assert_eq!(inc("1", ReleaseField::Major), "2");
        assert_eq!(inc("1.2", ReleaseField::Major), "2.0");
        assert_eq!(inc("1.2.0", ReleaseField::Major), "2.0.0");
        assert_eq!(inc("1.2.3", ReleaseField::Major), "2.0.0");
    }

    #[test]
    fn minor_increment_resets_patch() {
        assert_eq!(inc("1.0.0", ReleaseField::Minor), "1.1.0");
        assert_eq!(inc("1.2.3", ReleaseField::Minor), "1.3.0");
        assert_eq!(inc("1", ReleaseField::Minor), "1.1");
    }

    #[test]
    fn increment_releases_pending_prerelease() {
        assert_eq!(inc("2.0.0-rc.1", ReleaseField::Major), "2.0.0");
        assert_eq!(inc("1.2.3-beta", ReleaseField::Major), "2.0.0");
        assert_eq!(inc("1.3.0-beta+build.5", ReleaseField::Minor), "1.3.0");
    }

    #[test]
    fn invalid_versions_fail_instead_of_defaulting() {
        for bad in ["", "latest", "1.2.3.4", "01.0.0", "1..2", "1.0.0-", "v"] {
            let err = SemverIncrementer
                .increment(bad, ReleaseField::Major)
                .unwrap_err();
            assert_eq!(err.version, bad);
            assert_eq!(err.field, ReleaseField::Major);
        }
    }

    #[test]
    fn overflowing_increment_fails_instead_of_wrapping() {
        let max = u64::MAX.to_string();
        let err = SemverIncrementer
            .increment(&max, ReleaseField::Major)
            .unwrap_err();
        assert_eq!(err.version, max);
        assert_eq!(err.field, ReleaseField::Major);

        let minor_max = format!("3.{max}.0");
        let err = SemverIncrementer
            .increment(&minor_max, ReleaseField::Minor)
            .unwrap_err();
        assert_eq!(err.version, minor_max);
        assert_eq!(err.field, ReleaseField::Minor);

        assert_eq!(inc(&max, ReleaseField::Minor), format!("{max}.1"));
        assert_eq!(inc(&format!("3.{max}.0"), ReleaseField::Major), "4.0.0");
    }

    #[test]
    fn compare_versions_uses_numeric_precedence() {
        assert_eq!(compare_versions("10", "9"), Ordering::Greater);
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare_versions("1", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0-rc.1", "1.0.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0.0-rc.2", "1.0.0-rc.10"), Ordering::Less);
        assert_eq!(compare_versions("draft", "1"), Ordering::Less);
        assert_eq!(compare_versions("alpha", "beta"), Ordering::Less);
    }
}
