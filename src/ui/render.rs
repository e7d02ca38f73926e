//! Plain-text rendering of timelines and cache statistics for the CLI.

use chrono::{DateTime, Utc};
use console::{Term, style};

use crate::cache::{CacheStatistics, MergeReport};
use crate::timeline::Timeline;
use crate::ui::icons::{CACHE, MOMENT, PATH, SYNC, VIDEO};

/// Width used when the terminal size is unknown.
pub const DEFAULT_WIDTH: usize = 80;

/// Columns of the attached terminal, or [`DEFAULT_WIDTH`].
pub fn terminal_width() -> usize {
    Term::stdout()
        .size_checked()
        .map(|(_, cols)| cols as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

/// `id  created  style  title`, one line per timeline.
pub fn timeline_row(timeline: &Timeline) -> String {
    format!(
        "{}  {}  {:<11}  {}",
        style(&timeline.id).dim(),
        format_time(timeline.created_at),
        timeline.style.as_str(),
        timeline.title
    )
}

/// Multi-line view of a timeline with wrapped outcomes.
pub fn timeline_detail(timeline: &Timeline, width: usize) -> String {
    let width = width.max(40);
    let body = textwrap::Options::new(width)
        .initial_indent("      ")
        .subsequent_indent("      ");

    let mut out = String::new();
    out.push_str(&format!("{}\n", style(&timeline.title).bold()));
    out.push_str(&format!("  id:       {}\n", timeline.id));
    out.push_str(&format!("  style:    {}\n", timeline.style));
    out.push_str(&format!("  created:  {}\n", format_time(timeline.created_at)));
    out.push_str(&format!("  duration: {}s\n", timeline.duration.as_secs()));
    if let Some(video) = &timeline.video_ref {
        out.push_str(&format!("  {}{}\n", VIDEO, video));
    }
    out.push('\n');
    out.push_str(&textwrap::fill(&timeline.decision_text, width));
    out.push('\n');

    for path in &timeline.paths {
        out.push('\n');
        out.push_str(&format!(
            "  {}{} {} {}\n",
            PATH,
            style(&path.title).cyan(),
            style(format!("{:.0}%", path.probability * 100.0)).bold(),
            style(format!("[{}]", path.emotional_indicator)).dim()
        ));
        out.push_str(&textwrap::fill(&path.outcome, &body));
        out.push('\n');
        for moment in &path.key_moments {
            out.push_str(&format!(
                "      {}{:>3}s {}\n",
                MOMENT,
                moment.offset.as_secs(),
                moment.title
            ));
        }
    }
    out
}

pub fn statistics_table(stats: &CacheStatistics) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}Timeline cache\n", CACHE));
    out.push_str(&format!("  entries:      {}\n", stats.entry_count));
    out.push_str(&format!(
        "  memory:       {}\n",
        format_bytes(stats.memory_usage_bytes)
    ));
    out.push_str(&format!("  oldest:       {}\n", format_optional_time(stats.oldest_entry)));
    out.push_str(&format!("  newest:       {}\n", format_optional_time(stats.newest_entry)));
    out.push_str(&format!("  last updated: {}\n", format_optional_time(stats.last_updated)));
    out.push_str(&format!(
        "  lookups:      {} hits, {} misses ({:.1}% hit rate)\n",
        stats.hits,
        stats.misses,
        stats.hit_rate * 100.0
    ));
    out
}

pub fn merge_summary(action: &str, report: &MergeReport) -> String {
    format!("{}{}: {}", SYNC, action, report)
}

/// Human-readable byte count in binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn format_optional_time(at: Option<DateTime<Utc>>) -> String {
    at.map(format_time).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::fixtures;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(100 * 1024 * 1024), "100.0 MiB");
    }

    #[test]
    fn test_timeline_row_contains_id_and_title() {
        let row = timeline_row(&fixtures::timeline("t-1", "Move abroad", created()));
        assert!(row.contains("t-1"));
        assert!(row.contains("2026-03-14 09:30"));
        assert!(row.ends_with("Move abroad"));
    }

    #[test]
    fn test_timeline_detail_wraps_to_width() {
        let mut timeline = fixtures::timeline("t-2", "Long", created());
        timeline.paths[0].outcome = "word ".repeat(40);

        let detail = timeline_detail(&timeline, 40);

        assert!(detail.contains("Decision behind Long"));
        assert!(detail.contains("50%"));
        for line in detail.lines().filter(|l| l.trim_start().starts_with("word")) {
            assert!(line.chars().count() <= 40, "line too long: {:?}", line);
        }
    }

    #[test]
    fn test_statistics_table_without_entries() {
        let stats = CacheStatistics {
            entry_count: 0,
            memory_usage_bytes: 0,
            oldest_entry: None,
            newest_entry: None,
            last_updated: None,
            hits: 3,
            misses: 1,
            hit_rate: 0.75,
        };

        let table = statistics_table(&stats);

        assert!(table.contains("entries:      0"));
        assert!(table.contains("oldest:       -"));
        assert!(table.contains("75.0% hit rate"));
    }
}
