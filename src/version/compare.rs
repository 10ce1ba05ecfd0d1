//! Dotted-integer version comparison.
//!
//! Not semver precedence: pre-release and build suffixes are dropped and each
//! component contributes only its leading digits.

use std::cmp::Ordering;

/// Numeric components of `version`. Missing or non-numeric components are 0.
pub fn version_components(version: &str) -> Vec<u64> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core = trimmed.split(['-', '+']).next().unwrap_or_default();
    core.split('.')
        .map(|component| {
            let digits: String = component
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a = version_components(a);
    let b = version_components(b);
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0);
            let right = b.get(i).copied().unwrap_or(0);
            left.cmp(&right)
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// True when `candidate` is strictly newer than `current`.
pub fn is_version_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}
