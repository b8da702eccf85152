//! Calendar and event records.
//!
//! Every field is optional; servers omit properties freely and an absent
//! value is a normal outcome.

use std::borrow::Cow;

use serde::Serialize;
use tinydav_core::EventTime;

use crate::error::{CalDavError, CalDavResult};

/// A calendar collection found by discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Calendar {
    /// Last non-empty segment of the href.
    pub name: Option<String>,
    /// Server-relative href.
    pub path: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Collection tag, changes whenever the calendar does.
    pub ctag: Option<String>,
}

impl Calendar {
    /// The name with `%XX` escapes decoded.
    ///
    /// Falls back to the raw name when the escapes do not decode to UTF-8.
    pub fn decoded_name(&self) -> Option<Cow<'_, str>> {
        let name = self.name.as_deref()?;
        Some(urlencoding::decode(name).unwrap_or(Cow::Borrowed(name)))
    }

    /// Display name if the server gave one, otherwise the name.
    pub fn label(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.name.as_deref())
    }
}

/// The calendars found in one discovery call, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CalendarList {
    calendars: Vec<Calendar>,
}

impl CalendarList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calendars actually populated.
    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Calendar> {
        self.calendars.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Calendar> {
        self.calendars.get(index)
    }

    pub fn as_slice(&self) -> &[Calendar] {
        &self.calendars
    }

    /// Finds a calendar by exact, case-sensitive match on its name, then on
    /// its display name. The first match in list order wins.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty `name`, `NotFound` if nothing matches.
    pub fn find_by_name(&self, name: &str) -> CalDavResult<&Calendar> {
        if name.is_empty() {
            return Err(CalDavError::invalid_argument("calendar name is empty"));
        }
        self.calendars
            .iter()
            .find(|c| c.name.as_deref() == Some(name) || c.display_name.as_deref() == Some(name))
            .ok_or_else(|| CalDavError::not_found(format!("no calendar named '{name}'")))
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.calendars.shrink_to_fit();
    }
}

impl From<Vec<Calendar>> for CalendarList {
    fn from(calendars: Vec<Calendar>) -> Self {
        Self { calendars }
    }
}

impl IntoIterator for CalendarList {
    type Item = Calendar;
    type IntoIter = std::vec::IntoIter<Calendar>;

    fn into_iter(self) -> Self::IntoIter {
        self.calendars.into_iter()
    }
}

impl<'a> IntoIterator for &'a CalendarList {
    type Item = &'a Calendar;
    type IntoIter = std::slice::Iter<'a, Calendar>;

    fn into_iter(self) -> Self::IntoIter {
        self.calendars.iter()
    }
}

/// One VEVENT, as raw field text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Event {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Raw `DTSTART` value.
    pub start_time: Option<String>,
    /// Raw `DTEND` value.
    pub end_time: Option<String>,
    pub location: Option<String>,
}

impl Event {
    /// `DTSTART` interpreted as an [`EventTime`].
    pub fn start(&self) -> Option<EventTime> {
        self.start_time.as_deref().and_then(EventTime::parse)
    }

    /// `DTEND` interpreted as an [`EventTime`].
    pub fn end(&self) -> Option<EventTime> {
        self.end_time.as_deref().and_then(EventTime::parse)
    }

    /// Bytes held by the string fields.
    pub(crate) fn heap_size(&self) -> usize {
        [
            &self.uid,
            &self.summary,
            &self.description,
            &self.start_time,
            &self.end_time,
            &self.location,
        ]
        .iter()
        .map(|f| f.as_ref().map_or(0, String::len))
        .sum()
    }
}

/// The events returned by one query, in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EventList {
    events: Vec<Event>,
}

impl EventList {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    /// Returns the events ordered by start time. Events without a parseable
    /// start keep their relative order at the end.
    pub fn sorted_by_start(&self) -> Vec<&Event> {
        let mut sorted: Vec<&Event> = self.events.iter().collect();
        sorted.sort_by_key(|e| (e.start().is_none(), e.start()));
        sorted
    }
}

impl From<Vec<Event>> for EventList {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl IntoIterator for EventList {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventList {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
