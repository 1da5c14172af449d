use std::io::{self, IsTerminal, Read};

use cadence_core::models::TimerPatch;
use cadence_core::util::{format_clock, format_clock_with_hours, parse_duration};
use cadence_core::{EntityId, Note, Segment, SegmentKind, Timer};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct TimerListItem {
    pub id: String,
    pub name: String,
    pub status: String,
    pub segment: Option<String>,
    pub remaining: String,
    pub remaining_time: u32,
    pub current_repeat: u32,
    pub repeat_count: u32,
    pub progress: f64,
    pub total_elapsed: String,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relative_time: String,
}

/// Resolve a full id or a unique id prefix against `ids`
pub fn resolve_id<'a>(
    query: &str,
    kind: &'static str,
    ids: impl IntoIterator<Item = &'a EntityId>,
) -> Result<EntityId, CliError> {
    let query = normalize_identifier(query, kind)?;

    let mut matches = Vec::new();
    for id in ids {
        if id.as_str() == query {
            return Ok(id.clone());
        }
        if id.as_str().starts_with(&query) {
            matches.push(id.clone());
        }
    }

    match matches.len() {
        0 => Err(CliError::NotFound { kind, query }),
        1 => Ok(matches.swap_remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|id| id.short(SHORT_ID_LEN))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_identifier(id: &str, kind: &'static str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId(kind))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse `KIND:DURATION[:LABEL]`, e.g. `focus:25m` or `break:5m:Stretch`
pub fn parse_segment(spec: &str) -> Result<Segment, CliError> {
    let invalid = || CliError::InvalidSegment(spec.to_string());

    let mut parts = spec.splitn(3, ':');
    let kind = parts
        .next()
        .and_then(|kind| kind.parse::<SegmentKind>().ok())
        .ok_or_else(invalid)?;
    let duration = parts.next().and_then(parse_duration).ok_or_else(invalid)?;
    let label = parts
        .next()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or(kind.default_label());

    Ok(Segment::new(kind, duration, label))
}

pub fn parse_segments(specs: &[String]) -> Result<Vec<Segment>, CliError> {
    specs.iter().map(|spec| parse_segment(spec)).collect()
}

/// Definition edits from `timer edit` flags
pub fn definition_patch(
    name: Option<String>,
    description: Option<String>,
    segments: &[String],
    repeat: Option<u32>,
) -> Result<TimerPatch, CliError> {
    let patch = TimerPatch {
        name,
        description: description.map(Some),
        segments: if segments.is_empty() {
            None
        } else {
            Some(parse_segments(segments)?)
        },
        repeat_count: repeat,
        ..TimerPatch::default()
    };

    if patch.touches_definition() {
        Ok(patch)
    } else {
        Err(CliError::NothingToChange)
    }
}

pub fn format_timer_lines(timers: &[Timer]) -> Vec<String> {
    timers
        .iter()
        .map(|timer| {
            let short_id = timer.id.short(SHORT_ID_LEN);
            let segment = timer
                .current_segment()
                .map_or("-", |segment| segment.label.as_str());
            format!(
                "{short_id:<13}  {:<9}  {:<24}  {:<14}  {}  round {}/{}",
                timer.status.to_string(),
                truncate(&timer.name, 24),
                truncate(segment, 14),
                format_clock(timer.remaining_time),
                timer.current_repeat,
                timer.repeat_count
            )
        })
        .collect()
}

pub fn format_timer_details(timer: &Timer) -> Vec<String> {
    let mut lines = vec![
        format!("{}  {}", timer.id, timer.name),
        format!("Status:   {}", timer.status),
    ];
    if let Some(description) = &timer.description {
        lines.push(format!("About:    {description}"));
    }
    lines.push(format!(
        "Round:    {}/{}",
        timer.current_repeat, timer.repeat_count
    ));
    lines.push(format!(
        "Elapsed:  {}",
        format_clock_with_hours(timer.total_elapsed_time)
    ));
    for (index, segment) in timer.segments.iter().enumerate() {
        let marker = if index == timer.current_segment_index {
            ">"
        } else {
            " "
        };
        let remaining = if index == timer.current_segment_index {
            format!("  ({} left)", format_clock(timer.remaining_time))
        } else {
            String::new()
        };
        lines.push(format!(
            "{marker} {:<12} {:<20} {}{remaining}",
            segment.kind.to_string(),
            segment.label,
            format_clock(segment.duration_seconds)
        ));
    }
    lines
}

pub fn timer_to_list_item(timer: &Timer) -> TimerListItem {
    TimerListItem {
        id: timer.id.to_string(),
        name: timer.name.clone(),
        status: timer.status.to_string(),
        segment: timer.current_segment().map(|segment| segment.label.clone()),
        remaining: format_clock(timer.remaining_time),
        remaining_time: timer.remaining_time,
        current_repeat: timer.current_repeat,
        repeat_count: timer.repeat_count,
        progress: timer.segment_progress(),
        total_elapsed: format_clock_with_hours(timer.total_elapsed_time),
        updated_at: timer.updated_at,
        relative_time: format_relative_time(timer.updated_at, Utc::now()),
    }
}

/// One-line status for `timer run`
pub fn format_progress_line(timer: &Timer) -> String {
    let segment = timer
        .current_segment()
        .map_or("-", |segment| segment.label.as_str());
    format!(
        "{}  {}  {}  round {}/{}  [{:>3.0}%]",
        timer.name,
        segment,
        format_clock(timer.remaining_time),
        timer.current_repeat,
        timer.repeat_count,
        timer.segment_progress()
    )
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now = Utc::now();
    notes
        .iter()
        .map(|note| {
            let short_id = note.id.short(SHORT_ID_LEN);
            let check = if note.completed { "[x]" } else { "[ ]" };
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.updated_at, now);
            format!("{short_id:<13}  {check}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        preview: note_preview(note, 80),
        content: note.content.clone(),
        completed: note.completed,
        created_at: note.created_at,
        updated_at: note.updated_at,
        relative_time: format_relative_time(note.updated_at, Utc::now()),
    }
}

/// Title when present, otherwise the first content line, collapsed and
/// truncated with an ellipsis
pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let source = if note.title.is_empty() {
        note.content.lines().next().unwrap_or("")
    } else {
        note.title.as_str()
    };
    truncate(source, max_chars)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(timestamp).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}
