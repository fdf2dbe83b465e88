//! Freshness of the cached permission map.
//!
//! Staleness is never stored. It is derived at call time from the last
//! network fetch and the configured TTL; a stale map keeps serving until a
//! load replaces it.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Observable state of a permission cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Nothing loaded and nothing in flight. Every query denies.
    Empty,
    /// A load was issued and has not settled. The load only progresses while
    /// some caller polls it, so a load whose callers were all dropped stays
    /// here until another caller joins it or a forced load or
    /// `clear_cache` replaces it. Queries answer from whatever is already
    /// loaded.
    Loading,
    /// Loaded from the network within the TTL.
    Fresh,
    /// Loaded, but the TTL has elapsed or the map came from the session
    /// fallback. Still served until the next load replaces it.
    Stale,
}

impl CacheStatus {
    /// Returns true if queries answer from a loaded map.
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Fresh | Self::Stale)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
        };
        f.write_str(label)
    }
}

/// Returns true if `now - then < ttl`.
///
/// A `then` in the future (clock skew) counts as within the TTL.
pub fn within_ttl(then: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match now.signed_duration_since(then).to_std() {
        Ok(age) => age < ttl,
        Err(_) => true,
    }
}

/// Age of `then` as seen from `now`, clamped at zero.
pub fn age(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(then)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_within_ttl_is_strict() {
        let ttl = Duration::from_secs(300);
        let just_before = t0() + chrono::Duration::milliseconds(299_999);
        let exactly = t0() + chrono::Duration::seconds(300);

        assert!(within_ttl(t0(), t0(), ttl));
        assert!(within_ttl(t0(), just_before, ttl));
        assert!(!within_ttl(t0(), exactly, ttl));
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let future = t0() + chrono::Duration::seconds(30);
        assert!(within_ttl(future, t0(), Duration::from_secs(1)));
        assert_eq!(age(future, t0()), Duration::ZERO);
    }

    #[test]
    fn test_age() {
        let later = t0() + chrono::Duration::seconds(42);
        assert_eq!(age(t0(), later), Duration::from_secs(42));
    }

    #[test]
    fn test_status_serving() {
        assert!(!CacheStatus::Empty.is_serving());
        assert!(!CacheStatus::Loading.is_serving());
        assert!(CacheStatus::Fresh.is_serving());
        assert!(CacheStatus::Stale.is_serving());
        assert_eq!(CacheStatus::Stale.to_string(), "stale");
    }
}
