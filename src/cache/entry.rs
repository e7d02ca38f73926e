use crate::timeline::Timeline;

/// Fixed overhead charged per cached timeline.
pub const ENTRY_OVERHEAD_BYTES: u64 = 1024;

/// Fixed overhead charged per decision path.
pub const PATH_OVERHEAD_BYTES: u64 = 256;

/// A cached timeline with its estimated memory footprint.
///
/// The estimate is derived on insert and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub timeline: Timeline,
    pub memory_size: u64,
}

impl CacheEntry {
    pub fn new(timeline: Timeline) -> Self {
        let memory_size = estimate_memory(&timeline);
        Self {
            timeline,
            memory_size,
        }
    }
}

/// Text bytes plus fixed per-entry and per-path overheads.
pub fn estimate_memory(timeline: &Timeline) -> u64 {
    let mut bytes = timeline.id.len()
        + timeline.title.len()
        + timeline.decision_text.len()
        + timeline.video_ref.as_ref().map_or(0, String::len);

    for path in &timeline.paths {
        bytes += path.id.len() + path.title.len() + path.outcome.len();
        bytes += path
            .key_moments
            .iter()
            .map(|m| m.title.len() + m.description.len())
            .sum::<usize>();
    }

    bytes as u64 + ENTRY_OVERHEAD_BYTES + PATH_OVERHEAD_BYTES * timeline.paths.len() as u64
}
