//! Shared event synthesis helpers
//!
//! Small generators for ids, versions, releases and weighted choices used by
//! the session, transaction and metric-bucket payload builders.

use chrono::{DateTime, Utc};
use rand::Rng;

/// A fresh event id: UUIDv4 as 32 hex chars without dashes.
pub fn event_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A fresh span id: the first 16 hex chars of a UUIDv4.
pub fn span_id() -> String {
    let mut id = event_id();
    id.truncate(16);
    id
}

/// Uniform choice; empty input yields the empty string.
pub fn simple_random_choice<S: AsRef<str>>(choices: &[S]) -> String {
    if choices.is_empty() {
        return String::new();
    }
    choices[rand::thread_rng().gen_range(0..choices.len())]
        .as_ref()
        .to_string()
}

/// Weighted choice over `(value, weight)` pairs.
///
/// Zero-weight entries are never picked; returns `None` when no entry
/// carries weight.
pub fn weighted_choice<'a>(choices: &[(&'a str, u64)]) -> Option<&'a str> {
    let total: u64 = choices.iter().map(|(_, weight)| weight).sum();
    if total == 0 {
        return None;
    }
    let mut drawn = rand::thread_rng().gen_range(0..total);
    for (value, weight) in choices {
        if drawn < *weight {
            return Some(value);
        }
        drawn -= weight;
    }
    None
}

/// A dotted version string with `segments` components in `[0, max_value)`.
pub fn version(segments: usize, max_value: u64) -> String {
    let mut rng = rand::thread_rng();
    (0..segments)
        .map(|_| rng.gen_range(0..max_value.max(1)).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// A release name drawn from a pool of `num_releases`; empty when the pool
/// is empty.
pub fn release(num_releases: u64) -> String {
    if num_releases == 0 {
        return String::new();
    }
    format!("release{}", rand::thread_rng().gen_range(0..num_releases))
}

/// Coin flip.
pub fn flip() -> bool {
    rand::thread_rng().gen_bool(0.5)
}

/// Seconds since the epoch with sub-second precision.
pub fn unix_timestamp(at: DateTime<Utc>) -> f64 {
    at.timestamp_nanos_opt().unwrap_or_default() as f64 / 1_000_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_is_32_hex_chars() {
        let id = event_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn span_id_is_16_hex_chars() {
        assert_eq!(span_id().len(), 16);
    }

    #[test]
    fn weighted_choice_skips_zero_weights() {
        for _ in 0..100 {
            assert_eq!(weighted_choice(&[("a", 0), ("b", 1)]), Some("b"));
        }
        assert_eq!(weighted_choice(&[("a", 0)]), None);
        assert_eq!(weighted_choice(&[]), None);
    }

    #[test]
    fn version_has_requested_segments() {
        let v = version(3, 10);
        assert_eq!(v.split('.').count(), 3);
    }

    #[test]
    fn release_pool() {
        assert_eq!(release(0), "");
        assert!(release(1).starts_with("release"));
    }
}
