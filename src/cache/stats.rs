use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub entry_count: usize,
    pub memory_usage_bytes: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0.0 without lookups
    pub hit_rate: f64,
}

pub(crate) fn hit_rate(hits: u64, misses: u64) -> f64 {
    let lookups = hits + misses;
    if lookups == 0 {
        0.0
    } else {
        hits as f64 / lookups as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(hit_rate(0, 0), 0.0);
        assert_eq!(hit_rate(3, 1), 0.75);
        assert_eq!(hit_rate(0, 5), 0.0);
    }
}
