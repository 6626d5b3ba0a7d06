//! Terminal rendering of results and history entries.

use chrono::Local;

use tubedigest_core::types::CacheRecord;
use tubedigest_pipeline::Resolution;

/// Full block for a submission result.
pub fn resolution(res: &Resolution) -> String {
    let origin = match res {
        Resolution::Cached(_) => "cached",
        Resolution::Stored(_) => "new",
        Resolution::Unsaved(_) => "new, not saved",
        Resolution::Superseded(_) => "superseded, not saved",
    };
    format!(
        "{} ({})\nChannel: {}\nVideo id: {}\n\n{}\n",
        res.title(),
        origin,
        res.channel(),
        res.video_id(),
        res.summary()
    )
}

/// One history line plus a short preview of the summary.
pub fn history_entry(position: usize, record: &CacheRecord) -> String {
    format!(
        "{:>3}. [{}] {} - {}\n     {}\n     {}",
        position,
        record
            .created_at
            .to_datetime()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M"),
        record.title,
        record.channel,
        record.url,
        preview(&record.summary, 100)
    )
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}
