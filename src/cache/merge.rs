use serde::Serialize;

use super::entry::CacheEntry;
use crate::timeline::Timeline;

/// Outcome of a recency-wins merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Ids not present locally
    pub added: usize,
    /// Local entries replaced by a later incoming version
    pub replaced: usize,
    /// Incoming entries ignored because the local one is as recent or newer
    pub kept_local: usize,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.added + self.replaced > 0
    }
}

impl std::fmt::Display for MergeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} replaced, {} kept local",
            self.added, self.replaced, self.kept_local
        )
    }
}

/// Merge `incoming` into `entries` keeping the later `created_at` per id.
///
/// Ties keep the local entry. Replaced entries keep their position; new ids
/// are inserted at the front in incoming order. Does not apply the size cap.
pub(crate) fn merge_into(entries: &mut Vec<CacheEntry>, incoming: Vec<Timeline>) -> MergeReport {
    let mut report = MergeReport::default();
    let mut fresh: Vec<CacheEntry> = Vec::new();

    for timeline in incoming {
        if let Some(local) = entries.iter_mut().find(|e| e.timeline.id == timeline.id) {
            if timeline.created_at > local.timeline.created_at {
                *local = CacheEntry::new(timeline);
                report.replaced += 1;
            } else {
                report.kept_local += 1;
            }
        } else if let Some(pending) = fresh.iter_mut().find(|e| e.timeline.id == timeline.id) {
            if timeline.created_at > pending.timeline.created_at {
                *pending = CacheEntry::new(timeline);
            }
        } else {
            fresh.push(CacheEntry::new(timeline));
        }
    }

    report.added = fresh.len();
    entries.splice(0..0, fresh);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::fixtures;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap() + TimeDelta::hours(hours)
    }

    fn entries(items: &[(&str, i64)]) -> Vec<CacheEntry> {
        items
            .iter()
            .map(|(id, h)| CacheEntry::new(fixtures::timeline(id, id, at(*h))))
            .collect()
    }

    fn ids(entries: &[CacheEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.timeline.id.as_str()).collect()
    }

    #[test]
    fn test_later_incoming_replaces_in_place() {
        let mut local = entries(&[("a", 1), ("b", 1)]);
        let mut newer = fixtures::timeline("b", "b v2", at(5));
        newer.decision_text = "updated".to_string();

        let report = merge_into(&mut local, vec![newer]);

        assert_eq!(report.replaced, 1);
        assert_eq!(ids(&local), vec!["a", "b"]);
        assert_eq!(local[1].timeline.title, "b v2");
    }

    #[test]
    fn test_older_or_equal_incoming_keeps_local() {
        let mut local = entries(&[("a", 3)]);
        let older = fixtures::timeline("a", "old", at(1));
        let tie = fixtures::timeline("a", "tie", at(3));

        let report = merge_into(&mut local, vec![older, tie]);

        assert_eq!(report.kept_local, 2);
        assert!(!report.changed());
        assert_eq!(local[0].timeline.title, "a");
    }

    #[test]
    fn test_new_ids_prepended_in_incoming_order() {
        let mut local = entries(&[("a", 1)]);
        let incoming = vec![
            fixtures::timeline("x", "x", at(2)),
            fixtures::timeline("y", "y", at(1)),
        ];

        let report = merge_into(&mut local, incoming);

        assert_eq!(report.added, 2);
        assert_eq!(ids(&local), vec!["x", "y", "a"]);
    }

    #[test]
    fn test_duplicate_incoming_ids_collapse_to_latest() {
        let mut local = Vec::new();
        let incoming = vec![
            fixtures::timeline("x", "first", at(1)),
            fixtures::timeline("x", "second", at(4)),
        ];

        let report = merge_into(&mut local, incoming);

        assert_eq!(report.added, 1);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].timeline.title, "second");
    }
}
