//! Calendar discovery over a PROPFIND multistatus body.
//!
//! The body is walked one `<response>` block at a time. Each block is
//! classified by the markers inside its `<resourcetype>`:
//!
//! - a `calendar` element makes it a calendar collection
//! - a `principal` element makes it a fallback candidate
//! - anything else is a plain collection and is skipped
//!
//! Element names are compared on their local part only, so `<d:response>`,
//! `<D:response>` and `<response>` are all the same block.

use tracing::{debug, error, info};

use crate::error::{CalDavError, CalDavResult};
use crate::extract::{extract_xml_tag, tags, tags_from};
use crate::memory::{Ledger, MemoryBudget};
use crate::model::{Calendar, CalendarList};

/// Result of discovering calendars in one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Calendar collections, in response order.
    pub calendars: CalendarList,
    /// Href of the first principal resource seen.
    pub principal_href: Option<String>,
}

impl Discovery {
    /// Returns the principal href only if no calendar was found, which is
    /// when the caller should look there instead.
    pub fn fallback_target(&self) -> Option<&str> {
        if self.calendars.is_empty() {
            self.principal_href.as_deref()
        } else {
            None
        }
    }
}

/// What a `<response>` block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Calendar,
    Principal,
    Collection,
}

/// Discovers calendars with no memory limit.
pub fn discover_calendars(body: &str) -> CalDavResult<Discovery> {
    discover_calendars_with_budget(body, &MemoryBudget::unbounded())
}

/// Discovers calendars, charging every record to `budget`.
///
/// # Errors
///
/// `HttpError` if the body is an HTML page, `OutOfMemory` if the budget runs
/// out. On failure nothing stays charged.
pub fn discover_calendars_with_budget(
    body: &str,
    budget: &MemoryBudget,
) -> CalDavResult<Discovery> {
    if is_html(body) {
        error!("Server returned an HTML page instead of a multistatus body");
        return Err(CalDavError::http("response is HTML, not XML"));
    }

    let upper_bound = count_calendar_tags(body);
    debug!(upper_bound, "Counted calendar tag sites");

    let mut ledger = Ledger::new(budget);
    ledger.charge(upper_bound.saturating_mul(std::mem::size_of::<Calendar>()))?;

    let mut calendars = Vec::new();
    calendars
        .try_reserve_exact(upper_bound)
        .map_err(|e| CalDavError::out_of_memory("failed to allocate calendar list").with_source(e))?;
    let mut principal_href: Option<String> = None;

    for block in ResponseBlocks::new(body) {
        let href = extract_xml_tag(block, "href")
            .map(str::trim)
            .filter(|h| !h.is_empty());

        match classify(block) {
            ResourceKind::Calendar => {
                // Unprefixed markers escape the tag count.
                if calendars.len() == calendars.capacity() {
                    ledger.charge(std::mem::size_of::<Calendar>())?;
                    calendars.try_reserve_exact(1).map_err(|e| {
                        CalDavError::out_of_memory("failed to grow calendar list").with_source(e)
                    })?;
                }
                let calendar = calendar_from_block(block, href);
                ledger.charge_str(calendar.name.as_deref())?;
                ledger.charge_str(calendar.path.as_deref())?;
                ledger.charge_str(calendar.display_name.as_deref())?;
                ledger.charge_str(calendar.description.as_deref())?;
                ledger.charge_str(calendar.color.as_deref())?;
                ledger.charge_str(calendar.ctag.as_deref())?;

                debug!(
                    path = calendar.path.as_deref().unwrap_or_default(),
                    name = calendar.name.as_deref().unwrap_or_default(),
                    display_name = calendar.display_name.as_deref().unwrap_or_default(),
                    "Found calendar"
                );
                calendars.push(calendar);
            }
            ResourceKind::Principal => {
                if principal_href.is_none()
                    && let Some(href) = href
                {
                    debug!(href, "Found principal resource");
                    principal_href = Some(href.to_string());
                }
            }
            ResourceKind::Collection => {
                debug!(href = href.unwrap_or_default(), "Skipping plain collection");
            }
        }
    }

    let mut calendars = CalendarList::from(calendars);
    calendars.shrink_to_fit();
    info!(count = calendars.len(), "Discovered calendars");

    ledger.commit();
    Ok(Discovery {
        calendars,
        principal_href,
    })
}

/// Returns true if the body looks like an HTML document: a doctype or an
/// `<html` element, in any letter case.
pub fn is_html(body: &str) -> bool {
    let bytes = body.as_bytes();
    let at = |i: usize, marker: &[u8]| {
        bytes
            .get(i..i + marker.len())
            .is_some_and(|w| w.eq_ignore_ascii_case(marker))
    };

    (0..bytes.len()).filter(|&i| bytes[i] == b'<').any(|i| {
        at(i, b"<!doctype html")
            || (at(i, b"<html")
                && bytes
                    .get(i + 5)
                    .is_none_or(|&b| b == b'>' || b == b'/' || b.is_ascii_whitespace()))
    })
}

/// Counts `:calendar` sites that sit inside a tag, such as `<C:calendar/>`,
/// `</cal:calendar-description>` or `<C:calendar-home-set>`.
///
/// This is an upper bound for the number of calendar collections.
pub fn count_calendar_tags(body: &str) -> usize {
    const MARKER: &str = ":calendar";
    let bytes = body.as_bytes();
    let mut count = 0;
    let mut from = 0;

    while let Some(rel) = body[from..].find(MARKER) {
        let hit = from + rel;
        let opener = bytes[..hit]
            .iter()
            .rposition(|&b| b == b'<' || b == b' ')
            .map(|i| bytes[i]);
        if opener == Some(b'<') {
            count += 1;
        }
        from = hit + MARKER.len();
    }
    count
}

/// Classifies one `<response>` block by its `<resourcetype>` content.
pub fn classify(block: &str) -> ResourceKind {
    let Some(resourcetype) = element_content(block, "resourcetype") else {
        return ResourceKind::Collection;
    };

    if contains_element(resourcetype, "calendar") {
        ResourceKind::Calendar
    } else if contains_element(resourcetype, "principal") {
        ResourceKind::Principal
    } else {
        ResourceKind::Collection
    }
}

fn calendar_from_block(block: &str, href: Option<&str>) -> Calendar {
    let owned = |tag: &str| {
        extract_xml_tag(block, tag)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    Calendar {
        name: href.and_then(name_from_href).map(str::to_string),
        path: href.map(str::to_string),
        display_name: owned("displayname"),
        description: owned("calendar-description"),
        color: owned("calendar-color"),
        ctag: owned("getctag"),
    }
}

/// Last non-empty segment of an href, ignoring trailing slashes.
pub fn name_from_href(href: &str) -> Option<&str> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Content between the first `<x:local>` and the next `</y:local>`.
///
/// A self-closing element has empty content.
fn element_content<'a>(text: &'a str, local: &str) -> Option<&'a str> {
    let open = tags(text).find(|t| t.local == local && !t.closing)?;
    if open.self_closing {
        return Some("");
    }
    let close = tags_from(text, open.end).find(|t| t.local == local && t.closing)?;
    Some(&text[open.end..close.start])
}

/// Returns true if `text` opens an element with the given local name.
fn contains_element(text: &str, local: &str) -> bool {
    tags(text).any(|t| t.local == local && !t.closing)
}

/// Iterator over `<response>...</response>` blocks, outer tags included.
struct ResponseBlocks<'a> {
    body: &'a str,
    pos: usize,
}

impl<'a> ResponseBlocks<'a> {
    fn new(body: &'a str) -> Self {
        Self { body, pos: 0 }
    }
}

impl<'a> Iterator for ResponseBlocks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let open = tags_from(self.body, self.pos)
            .find(|t| t.local == "response" && !t.closing && !t.self_closing)?;
        let close = tags_from(self.body, open.end).find(|t| t.local == "response" && t.closing);

        match close {
            Some(close) => {
                self.pos = close.end;
                Some(&self.body[open.start..close.end])
            }
            None => {
                debug!("Unterminated response block, stopping");
                self.pos = self.body.len();
                None
            }
        }
    }
}
