/// Format a playback position as `m:ss`
pub fn format_time(millis: u64) -> String {
    let total_seconds = millis / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Position as a fraction of duration, clamped to `[0, 1]`. Zero when the duration is unknown.
pub fn progress_ratio(position_millis: u64, duration_millis: u64) -> f64 {
    if duration_millis == 0 {
        return 0.0;
    }
    (position_millis as f64 / duration_millis as f64).clamp(0.0, 1.0)
}

/// Format a countdown as `Xh Ym`, `Xm Ys` or `Xs`
pub fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Text progress bar for terminal output
pub fn progress_bar(ratio: f64, width: usize) -> String {
    let filled = ((ratio.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
