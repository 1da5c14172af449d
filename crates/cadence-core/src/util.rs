//! Shared utility functions used across multiple modules.

use regex::Regex;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Format seconds as `MM:SS`.
///
/// Minutes are not wrapped into hours, so 3700 seconds renders as `61:40`.
pub fn format_clock(seconds: u32) -> String {
    let minutes = seconds / 60;
    let secs = seconds % 60;
    format!("{minutes:02}:{secs:02}")
}

/// Format seconds as `HH:MM:SS`, falling back to `MM:SS` under one hour.
pub fn format_clock_with_hours(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Parse `MM:SS` or `HH:MM:SS` into seconds.
///
/// Any other shape (or a non-numeric part) yields 0.
pub fn parse_clock(value: &str) -> u64 {
    let parts = value
        .trim()
        .split(':')
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>();

    match parts.as_deref() {
        Ok([minutes, seconds]) => minutes.saturating_mul(60).saturating_add(*seconds),
        Ok([hours, minutes, seconds]) => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(*seconds),
        _ => 0,
    }
}

/// Parse a human duration such as `25m`, `1h30m`, `90s` or a bare `300`
/// (seconds). Clock notation (`25:00`) is accepted too.
///
/// Returns `None` for malformed or zero-length input.
pub fn parse_duration(value: &str) -> Option<u32> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }

    if value.contains(':') {
        return u32::try_from(parse_clock(&value)).ok().filter(|secs| *secs > 0);
    }

    if let Ok(seconds) = value.parse::<u32>() {
        return (seconds > 0).then_some(seconds);
    }

    let re = Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("Invalid regex");
    let caps = re.captures(&value)?;
    let component = |index: usize, scale: u64| -> Option<u64> {
        caps.get(index).map_or(Some(0), |m| {
            m.as_str().parse::<u64>().ok().map(|n| n.saturating_mul(scale))
        })
    };

    let total = component(1, 3600)?
        .saturating_add(component(2, 60)?)
        .saturating_add(component(3, 1)?);
    u32::try_from(total).ok().filter(|secs| *secs > 0)
}
