//! Scan-based value extraction from iCalendar and WebDAV text.
//!
//! Neither function parses. Both search for literal markers and slice the
//! text between them, which keeps them tolerant of the namespace prefixes and
//! loose formatting real servers produce. There is no nesting awareness.

/// Extracts the value of an iCalendar field line.
///
/// `field` is searched case-sensitively. A key that carries its own colon
/// (`"UID:"`) yields everything after it, colons included. A bare key
/// (`"DTSTART"`) yields the text after the first `:` on the same line, so
/// parameterised lines like `DTSTART;TZID=Europe/Paris:20250205T100000` give
/// the bare value. The value ends at the first `\n` or `\r`, or at the end of
/// `body`.
pub fn extract_ical_field<'a>(body: &'a str, field: &str) -> Option<&'a str> {
    if field.is_empty() {
        return None;
    }
    let mut start = body.find(field)? + field.len();
    let rest = &body[start..];
    let line_end = rest.find(['\n', '\r']).unwrap_or(rest.len());

    if !field.ends_with(':')
        && let Some(colon) = rest[..line_end].find(':')
    {
        start += colon + 1;
    }

    let rest = &body[start..];
    let end = rest.find(['\n', '\r']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Extracts the text content of an XML element, ignoring its namespace prefix.
///
/// An unprefixed `<tag>` is preferred, then any `<prefix:tag>`. Attributes on
/// the opening tag are skipped. Content runs to the first closing tag for the
/// same local name, `</tag>` or `</x:tag>`. The closing prefix is not checked
/// against the opening one, and a self-closing element has empty content.
pub fn extract_xml_tag<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    if tag.is_empty() {
        return None;
    }

    let open = find_open_tag(body, tag)?;
    if open.self_closing {
        return Some("");
    }
    let content = &body[open.end..];
    let end = find_close_tag(content, tag)?;
    Some(&content[..end])
}

fn find_open_tag<'a>(body: &'a str, tag: &str) -> Option<Tag<'a>> {
    let opens = || tags(body).filter(|t| t.local == tag && !t.closing);
    opens()
        .find(|t| !t.prefixed)
        .or_else(|| opens().find(|t| t.prefixed))
}

/// Returns the offset of the `<` starting the first closing tag for `tag`.
fn find_close_tag(content: &str, tag: &str) -> Option<usize> {
    let plain = content.find(&format!("</{tag}>"));
    let prefixed = find_prefixed_close(content, tag);

    match (plain, prefixed) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Finds `</prefix:tag>` by locating `:tag>` and walking back to its `</`.
fn find_prefixed_close(content: &str, tag: &str) -> Option<usize> {
    let marker = format!(":{tag}>");
    let bytes = content.as_bytes();
    let mut from = 0;

    while let Some(rel) = content[from..].find(&marker) {
        let hit = from + rel;
        let lt = bytes[..hit].iter().rposition(|&b| b == b'<');
        if let Some(lt) = lt
            && bytes.get(lt + 1) == Some(&b'/')
            && !bytes[lt..hit].contains(&b'>')
        {
            return Some(lt);
        }
        from = hit + marker.len();
    }
    None
}

/// A tag found by [`next_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tag<'a> {
    /// Offset of the `<`.
    pub start: usize,
    /// Offset just past the `>`.
    pub end: usize,
    /// Name without prefix.
    pub local: &'a str,
    pub prefixed: bool,
    pub closing: bool,
    pub self_closing: bool,
}

/// Finds the next element tag at or after `from`. Comments, processing
/// instructions and declarations are skipped.
pub(crate) fn next_tag(text: &str, mut from: usize) -> Option<Tag<'_>> {
    loop {
        let start = from + text.get(from..)?.find('<')?;
        let end = start + text[start..].find('>')? + 1;
        let inner = &text[start + 1..end - 1];

        if inner.starts_with('!') || inner.starts_with('?') {
            from = end;
            continue;
        }

        let closing = inner.starts_with('/');
        let self_closing = !closing && inner.ends_with('/');
        let name = inner
            .trim_start_matches('/')
            .split(|c: char| c.is_ascii_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        let (prefixed, local) = match name.rsplit_once(':') {
            Some((_, local)) => (true, local),
            None => (false, name),
        };

        return Some(Tag {
            start,
            end,
            local,
            prefixed,
            closing,
            self_closing,
        });
    }
}

pub(crate) fn tags(text: &str) -> impl Iterator<Item = Tag<'_>> {
    tags_from(text, 0)
}

pub(crate) fn tags_from(text: &str, from: usize) -> impl Iterator<Item = Tag<'_>> {
    let mut pos = from;
    std::iter::from_fn(move || {
        let tag = next_tag(text, pos)?;
        pos = tag.end;
        Some(tag)
    })
}
