//! VEVENT extraction from a calendar-query or GET body.
//!
//! The body is never parsed as iCalendar. Each `BEGIN:VEVENT`..`END:VEVENT`
//! span is cut out and a fixed set of single-line fields is read from it.
//! Folded lines, recurrence and time zones are left alone.

use tracing::{debug, info, warn};

use crate::error::{CalDavError, CalDavResult};
use crate::extract::extract_ical_field;
use crate::memory::{Ledger, MemoryBudget};
use crate::model::{Event, EventList};

const BEGIN_MARKER: &str = "BEGIN:VEVENT";
const END_MARKER: &str = "END:VEVENT";

/// Extracts events with no memory limit.
pub fn extract_events(body: &str) -> CalDavResult<EventList> {
    extract_events_with_budget(body, &MemoryBudget::unbounded())
}

/// Extracts every complete VEVENT in `body`, in order.
///
/// A `BEGIN:VEVENT` without a matching `END:VEVENT` ends the scan; the events
/// before it are still returned.
///
/// # Errors
///
/// `OutOfMemory` if `budget` runs out. Events parsed up to that point are
/// dropped and their charges returned.
pub fn extract_events_with_budget(body: &str, budget: &MemoryBudget) -> CalDavResult<EventList> {
    let count = count_events(body);
    debug!(count, "Counted VEVENT blocks");
    if count == 0 {
        return Ok(EventList::new());
    }

    let mut ledger = Ledger::new(budget);
    ledger.charge(count.saturating_mul(std::mem::size_of::<Event>()))?;

    let mut events = Vec::new();
    events
        .try_reserve_exact(count)
        .map_err(|e| CalDavError::out_of_memory("failed to allocate event list").with_source(e))?;

    for block in VeventBlocks::new(body) {
        let event = event_from_block(block);
        ledger.charge(event.heap_size())?;
        debug!(
            index = events.len(),
            uid = event.uid.as_deref().unwrap_or_default(),
            summary = event.summary.as_deref().unwrap_or_default(),
            "Parsed event"
        );
        events.push(event);
    }

    if events.len() < count {
        warn!(
            parsed = events.len(),
            announced = count,
            "Truncated VEVENT stream, returning partial result"
        );
    }
    info!(count = events.len(), "Extracted events");

    ledger.commit();
    Ok(EventList::from(events))
}

/// Returns the first VEVENT in `body`.
///
/// # Errors
///
/// `NotFound` if the body has no complete VEVENT.
pub fn first_event(body: &str) -> CalDavResult<Event> {
    VeventBlocks::new(body)
        .next()
        .map(event_from_block)
        .ok_or_else(|| CalDavError::not_found("no VEVENT in response"))
}

/// Number of `BEGIN:VEVENT` markers in `body`.
pub fn count_events(body: &str) -> usize {
    body.matches(BEGIN_MARKER).count()
}

fn event_from_block(block: &str) -> Event {
    let field = |name: &str| {
        extract_ical_field(block, name)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    Event {
        uid: field("UID:"),
        summary: field("SUMMARY:"),
        description: field("DESCRIPTION:"),
        start_time: field("DTSTART"),
        end_time: field("DTEND"),
        location: field("LOCATION:"),
    }
}

/// Iterator over complete VEVENT spans, both markers included.
struct VeventBlocks<'a> {
    body: &'a str,
    pos: usize,
}

impl<'a> VeventBlocks<'a> {
    fn new(body: &'a str) -> Self {
        Self { body, pos: 0 }
    }
}

impl<'a> Iterator for VeventBlocks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.body.get(self.pos..)?;
        let start = self.pos + rest.find(BEGIN_MARKER)?;
        let Some(end) = self.body[start..].find(END_MARKER) else {
            self.pos = self.body.len();
            return None;
        };
        let end = start + end + END_MARKER.len();
        self.pos = end;
        Some(&self.body[start..end])
    }
}
