//! Request construction: XML bodies, headers and target URLs.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use tinydav_core::TimeRange;
use url::Url;

use crate::error::{CalDavError, CalDavResult};

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
/// CalendarServer namespace (ctag)
pub const CS_NS: &str = "http://calendarserver.org/ns/";
/// Apple iCal namespace (calendar-color)
pub const ICAL_NS: &str = "http://apple.com/ns/ical/";

/// Content type sent with every XML body.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// Header used to tunnel REPORT through POST.
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Builds the PROPFIND body used to discover calendars.
///
/// Asks for `resourcetype`, `displayname`, `calendar-description`, `getctag`
/// and `calendar-color`.
pub fn propfind_body() -> CalDavResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut propfind = BytesStart::new("d:propfind");
    propfind.push_attribute(("xmlns:d", DAV_NS));
    propfind.push_attribute(("xmlns:c", CALDAV_NS));
    propfind.push_attribute(("xmlns:cs", CS_NS));
    propfind.push_attribute(("xmlns:ic", ICAL_NS));
    write(&mut writer, Event::Start(propfind))?;
    write(&mut writer, Event::Start(BytesStart::new("d:prop")))?;

    for name in [
        "d:resourcetype",
        "d:displayname",
        "c:calendar-description",
        "cs:getctag",
        "ic:calendar-color",
    ] {
        write(&mut writer, Event::Empty(BytesStart::new(name)))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("d:prop")))?;
    write(&mut writer, Event::End(BytesEnd::new("d:propfind")))?;

    finish(writer)
}

/// Builds the calendar-query REPORT body for VEVENTs overlapping `range`.
pub fn calendar_query_body(range: &TimeRange) -> CalDavResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut query = BytesStart::new("c:calendar-query");
    query.push_attribute(("xmlns:d", DAV_NS));
    query.push_attribute(("xmlns:c", CALDAV_NS));
    write(&mut writer, Event::Start(query))?;

    write(&mut writer, Event::Start(BytesStart::new("d:prop")))?;
    write(&mut writer, Event::Empty(BytesStart::new("d:getetag")))?;
    write(&mut writer, Event::Empty(BytesStart::new("c:calendar-data")))?;
    write(&mut writer, Event::End(BytesEnd::new("d:prop")))?;

    write(&mut writer, Event::Start(BytesStart::new("c:filter")))?;

    let mut vcalendar = BytesStart::new("c:comp-filter");
    vcalendar.push_attribute(("name", "VCALENDAR"));
    write(&mut writer, Event::Start(vcalendar))?;

    let mut vevent = BytesStart::new("c:comp-filter");
    vevent.push_attribute(("name", "VEVENT"));
    write(&mut writer, Event::Start(vevent))?;

    let start = range.start_basic();
    let end = range.end_basic();
    let mut time_range = BytesStart::new("c:time-range");
    time_range.push_attribute(("start", start.as_str()));
    time_range.push_attribute(("end", end.as_str()));
    write(&mut writer, Event::Empty(time_range))?;

    write(&mut writer, Event::End(BytesEnd::new("c:comp-filter")))?;
    write(&mut writer, Event::End(BytesEnd::new("c:comp-filter")))?;
    write(&mut writer, Event::End(BytesEnd::new("c:filter")))?;
    write(&mut writer, Event::End(BytesEnd::new("c:calendar-query")))?;

    finish(writer)
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> CalDavResult<()> {
    writer
        .write_event(event)
        .map_err(|e| CalDavError::general(format!("failed to write XML body: {e}")))
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> CalDavResult<String> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| CalDavError::general("XML body is not UTF-8").with_source(e))
}

/// Headers for a PROPFIND at the given depth.
pub fn propfind_headers(depth: u8) -> Vec<(String, String)> {
    vec![
        ("Depth".to_string(), depth.to_string()),
        ("Content-Type".to_string(), XML_CONTENT_TYPE.to_string()),
    ]
}

/// Headers for a calendar-query sent as POST.
pub fn report_headers() -> Vec<(String, String)> {
    vec![
        ("Depth".to_string(), "1".to_string()),
        ("Content-Type".to_string(), XML_CONTENT_TYPE.to_string()),
        (METHOD_OVERRIDE_HEADER.to_string(), "REPORT".to_string()),
    ]
}

/// Combines the server URL with a collection or resource path.
///
/// An absolute path (leading `/`) replaces everything after scheme and host.
/// A relative path is appended to the server URL with exactly one `/` between
/// them.
///
/// # Errors
///
/// Returns `InvalidArgument` for an empty path or one that does not produce a
/// valid URL.
pub fn resolve_path(server: &Url, path: &str) -> CalDavResult<Url> {
    let path = path.trim();
    if path.is_empty() {
        return Err(CalDavError::invalid_argument("empty calendar path"));
    }

    // Some servers hand back full URLs in href elements.
    if path.starts_with("http://") || path.starts_with("https://") {
        return Url::parse(path).map_err(|e| {
            CalDavError::invalid_argument(format!("invalid URL '{path}'")).with_source(e)
        });
    }

    let joined = if path.starts_with('/') {
        format!("{}{}", origin(server), path)
    } else {
        format!("{}/{}", server.as_str().trim_end_matches('/'), path)
    };

    Url::parse(&joined).map_err(|e| {
        CalDavError::invalid_argument(format!("invalid calendar path '{path}'")).with_source(e)
    })
}

/// `scheme://host[:port]` of a URL.
pub fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}
