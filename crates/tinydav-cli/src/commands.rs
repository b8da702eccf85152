//! Subcommand implementations.
//!
//! Each command runs one session operation and writes its result to the
//! given writer, either as plain text or as JSON.

use std::io::Write;

use chrono::{DateTime, Duration, Utc};
use tinydav_caldav::{CalDavClient, Calendar, CalendarList, Event, EventList};
use tinydav_core::{EventTime, TimeRange};
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Span queried when `--to` is not given.
pub const DEFAULT_SPAN_DAYS: i64 = 7;

/// Checks that the server answers.
pub fn test(client: &CalDavClient, out: &mut impl Write) -> CliResult<()> {
    client.test_connection()?;
    writeln!(out, "Connection OK: {}", client.base_url())?;
    Ok(())
}

/// Lists calendars.
pub fn calendars(client: &CalDavClient, json: bool, out: &mut impl Write) -> CliResult<()> {
    let list = client.list_calendars()?;
    debug!(count = list.len(), "Calendars discovered");
    if json {
        serde_json::to_writer_pretty(&mut *out, &list)?;
        writeln!(out)?;
    } else {
        write_calendars(&list, out)?;
    }
    Ok(())
}

/// Finds one calendar by name.
pub fn find(client: &CalDavClient, name: &str, json: bool, out: &mut impl Write) -> CliResult<()> {
    let calendar = client.find_calendar(name)?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &calendar)?;
        writeln!(out)?;
    } else {
        write_calendar(&calendar, out)?;
    }
    Ok(())
}

/// Lists events between `from` and `to`.
pub fn events(
    client: &CalDavClient,
    calendar: Option<&str>,
    range: &TimeRange,
    json: bool,
    out: &mut impl Write,
) -> CliResult<()> {
    let list = client.list_events(calendar, range)?;
    debug!(count = list.len(), "Events extracted");
    if json {
        serde_json::to_writer_pretty(&mut *out, &list)?;
        writeln!(out)?;
    } else {
        write_events(&list, out)?;
    }
    Ok(())
}

/// Fetches one event.
pub fn get_event(
    client: &CalDavClient,
    path: &str,
    json: bool,
    out: &mut impl Write,
) -> CliResult<()> {
    let event = client.get_event(path)?;
    if json {
        serde_json::to_writer_pretty(&mut *out, &event)?;
        writeln!(out)?;
    } else {
        write_event_details(&event, out)?;
    }
    Ok(())
}

/// Resolves `--from` / `--to` into a range.
///
/// The start defaults to `now`, the end to [`DEFAULT_SPAN_DAYS`] after the
/// start.
pub fn resolve_range(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> CliResult<TimeRange> {
    let start = match from {
        Some(raw) => parse_instant(raw)?,
        None => now,
    };
    let end = match to {
        Some(raw) => parse_instant(raw)?,
        None => start + Duration::days(DEFAULT_SPAN_DAYS),
    };
    Ok(TimeRange::new(start, end)?)
}

fn parse_instant(raw: &str) -> CliResult<DateTime<Utc>> {
    EventTime::parse(raw)
        .map(|t| t.to_utc_datetime())
        .ok_or_else(|| CliError::Config(format!("cannot parse time '{raw}'")))
}

fn write_calendars(list: &CalendarList, out: &mut impl Write) -> std::io::Result<()> {
    if list.is_empty() {
        return writeln!(out, "No calendars found.");
    }
    for calendar in list {
        writeln!(
            out,
            "{}\t{}",
            calendar.label().unwrap_or("-"),
            calendar.path.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn write_calendar(calendar: &Calendar, out: &mut impl Write) -> std::io::Result<()> {
    let decoded = calendar.decoded_name();
    let rows = [
        ("name", decoded.as_deref()),
        ("path", calendar.path.as_deref()),
        ("display name", calendar.display_name.as_deref()),
        ("description", calendar.description.as_deref()),
        ("color", calendar.color.as_deref()),
        ("ctag", calendar.ctag.as_deref()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            writeln!(out, "{label:>12}: {value}")?;
        }
    }
    Ok(())
}

fn write_events(list: &EventList, out: &mut impl Write) -> std::io::Result<()> {
    if list.is_empty() {
        return writeln!(out, "No events.");
    }
    for event in list.sorted_by_start() {
        let when = event
            .start()
            .map(|t| format_time(&t))
            .or_else(|| event.start_time.clone())
            .unwrap_or_else(|| "-".to_string());
        write!(out, "{when}  {}", event.summary.as_deref().unwrap_or("(no title)"))?;
        if let Some(ref location) = event.location {
            write!(out, " @ {location}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_event_details(event: &Event, out: &mut impl Write) -> std::io::Result<()> {
    let start = event.start().map(|t| format_time(&t));
    let end = event.end().map(|t| format_time(&t));
    let rows = [
        ("summary", event.summary.as_deref()),
        ("start", start.as_deref().or(event.start_time.as_deref())),
        ("end", end.as_deref().or(event.end_time.as_deref())),
        ("location", event.location.as_deref()),
        ("description", event.description.as_deref()),
        ("uid", event.uid.as_deref()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            writeln!(out, "{label:>11}: {value}")?;
        }
    }
    Ok(())
}

fn format_time(time: &EventTime) -> String {
    match time {
        EventTime::DateTime(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        EventTime::Floating(naive) => naive.format("%Y-%m-%d %H:%M").to_string(),
        EventTime::AllDay(date) => format!("{} (all day)", date.format("%Y-%m-%d")),
    }
}
