//! The CalDAV session.
//!
//! [`CalDavClient`] owns the configuration and a [`Transport`]. Each operation
//! is one blocking round trip (two for the principal fallback) that is fully
//! parsed before the call returns. Operations on one session never overlap:
//! an internal lock serialises them, so the client can be shared behind an
//! `Arc`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tinydav_core::TimeRange;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::buffer::ResponseBuffer;
use crate::config::CalDavConfig;
use crate::discovery::{Discovery, discover_calendars_with_budget};
use crate::error::{CalDavError, CalDavResult};
use crate::events::{extract_events_with_budget, first_event};
use crate::memory::MemoryBudget;
use crate::model::{Calendar, CalendarList, Event, EventList};
use crate::request::{
    calendar_query_body, propfind_body, propfind_headers, report_headers, resolve_path,
};
use crate::status::{self, Operation};
use crate::transport::{DavMethod, DavRequest, Transport};

/// A CalDAV session.
pub struct CalDavClient {
    config: CalDavConfig,
    transport: Box<dyn Transport>,
    initialized: bool,
    lock: Mutex<()>,
}

impl CalDavClient {
    /// Opens a session over the default HTTP transport.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the configuration is incomplete.
    #[cfg(feature = "http")]
    pub fn new(config: CalDavConfig) -> CalDavResult<Self> {
        config.validate()?;
        let transport = crate::transport::HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }

    /// Opens a session over a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the configuration is incomplete.
    pub fn with_transport(
        config: CalDavConfig,
        transport: impl Transport + 'static,
    ) -> CalDavResult<Self> {
        config.validate()?;
        info!(url = %config.url, "CalDAV client initialized");
        Ok(Self {
            config,
            transport: Box::new(transport),
            initialized: true,
            lock: Mutex::new(()),
        })
    }

    /// Closes the session and forgets the credentials.
    ///
    /// Every later operation fails.
    pub fn deinit(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        self.config.username = None;
        self.config.password = None;
        debug!(url = %self.config.url, "CalDAV client deinitialized");
    }

    /// Returns true until [`deinit`](Self::deinit) is called.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CalDavConfig {
        &self.config
    }

    /// Returns the server URL.
    pub fn base_url(&self) -> &str {
        self.config.url_str()
    }

    /// Checks that the server answers a Depth 0 PROPFIND.
    ///
    /// # Errors
    ///
    /// `NotInitialized` on a closed session, `ConnectionError` or `Timeout`
    /// when the server cannot be reached, `HttpError` for a status other than
    /// 200, 204 or 207.
    pub fn test_connection(&self) -> CalDavResult<()> {
        if !self.initialized {
            return Err(CalDavError::not_initialized("session is not initialized"));
        }
        let _guard = self.serialize();

        let request = self.request(
            DavMethod::Propfind,
            self.config.url.clone(),
            propfind_headers(0),
            Some(propfind_body()?),
        );
        let op = Operation::TestConnection;
        trace!(method = %request.method, url = %request.url, "Sending request");
        let response = self
            .transport
            .send(&request)
            .map_err(|e| status::transport_failure(op, e))?;
        status::check_status(op, response.status)?;

        info!(status = response.status, "CalDAV connection successful");
        Ok(())
    }

    /// Lists the calendar collections under the server URL.
    ///
    /// When the listing holds no calendar but names a principal resource,
    /// the principal is queried once and its calendars are returned instead.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a closed session, `HttpError` for a status other
    /// than 200 or 207 or for an HTML body, `OutOfMemory` if the memory cap is
    /// hit, transport errors as for [`test_connection`](Self::test_connection).
    pub fn list_calendars(&self) -> CalDavResult<CalendarList> {
        self.ensure_open()?;
        let _guard = self.serialize();

        let found = self.discover(self.config.url.clone())?;
        let Some(principal) = found.fallback_target().map(str::to_string) else {
            return Ok(found.calendars);
        };

        let url = principal_url(&self.config.url, &principal)?;
        info!(url = %url, "No calendars at server URL, trying principal");
        let fallback = self.discover(url)?;
        if fallback.principal_href.is_some() && fallback.calendars.is_empty() {
            warn!("Principal listing holds no calendars either, not following further");
        }
        Ok(fallback.calendars)
    }

    /// Lists the calendars and returns the first one matching `name`.
    ///
    /// See [`CalendarList::find_by_name`].
    pub fn find_calendar(&self, name: &str) -> CalDavResult<Calendar> {
        self.list_calendars()?.find_by_name(name).cloned()
    }

    /// Lists the events of a calendar that overlap `range`.
    ///
    /// `calendar_path` defaults to the configured calendar. An absolute path
    /// replaces the path of the server URL, a relative one is appended to it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a closed session or without any calendar path,
    /// `HttpError` for any status but 207, `OutOfMemory` if the memory cap is
    /// hit, transport errors as for [`test_connection`](Self::test_connection).
    pub fn list_events(
        &self,
        calendar_path: Option<&str>,
        range: &TimeRange,
    ) -> CalDavResult<EventList> {
        self.ensure_open()?;
        let path = calendar_path
            .or(self.config.calendar_path.as_deref())
            .ok_or_else(|| CalDavError::invalid_argument("no calendar path given or configured"))?;
        let url = resolve_path(&self.config.url, path)?;
        let _guard = self.serialize();

        info!(
            url = %url,
            start = %range.start_basic(),
            end = %range.end_basic(),
            "Querying events"
        );

        let request = self.request(
            DavMethod::Post,
            url,
            report_headers(),
            Some(calendar_query_body(range)?),
        );
        let budget = self.budget();
        let buffer = self.execute(Operation::ListEvents, &request, &budget)?;
        extract_events_with_budget(&buffer.text(), &budget)
    }

    /// Fetches one event resource with GET and returns its first VEVENT.
    ///
    /// A relative `event_path` is resolved against the configured calendar
    /// when there is one, otherwise against the server URL.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a closed session or an empty path, `HttpError`
    /// for any status but 200, `NotFound` if the body holds no VEVENT.
    pub fn get_event(&self, event_path: &str) -> CalDavResult<Event> {
        self.ensure_open()?;
        let url = self.event_url(event_path)?;
        let _guard = self.serialize();

        debug!(url = %url, "Fetching event");
        let request = self.request(DavMethod::Get, url, Vec::new(), None);
        let budget = self.budget();
        let buffer = self.execute(Operation::GetEvent, &request, &budget)?;
        first_event(&buffer.text())
    }

    fn ensure_open(&self) -> CalDavResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(CalDavError::invalid_argument("session is not initialized"))
        }
    }

    fn serialize(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn budget(&self) -> MemoryBudget {
        MemoryBudget::new(self.config.max_response_bytes)
    }

    fn request(
        &self,
        method: DavMethod,
        url: Url,
        headers: Vec<(String, String)>,
        body: Option<String>,
    ) -> DavRequest {
        DavRequest {
            method,
            url,
            headers,
            body,
            timeout: self.config.timeout,
        }
    }

    /// One PROPFIND round trip plus discovery over its body.
    fn discover(&self, url: Url) -> CalDavResult<Discovery> {
        let request = self.request(
            DavMethod::Propfind,
            url,
            propfind_headers(1),
            Some(propfind_body()?),
        );
        let budget = self.budget();
        let buffer = self.execute(Operation::ListCalendars, &request, &budget)?;
        discover_calendars_with_budget(&buffer.text(), &budget)
    }

    /// Sends `request`, checks the status and reads the whole body.
    fn execute<'b>(
        &self,
        op: Operation,
        request: &DavRequest,
        budget: &'b MemoryBudget,
    ) -> CalDavResult<ResponseBuffer<'b>> {
        trace!(method = %request.method, url = %request.url, "Sending request");
        let mut response = self
            .transport
            .send(request)
            .map_err(|e| status::transport_failure(op, e))?;
        status::check_status(op, response.status)?;

        let mut buffer = ResponseBuffer::new(budget);
        let read = buffer.read_from(response.body.as_mut())?;
        debug!(operation = op.as_str(), bytes = read, "Received response body");
        Ok(buffer)
    }

    fn event_url(&self, event_path: &str) -> CalDavResult<Url> {
        let event_path = event_path.trim();
        if event_path.is_empty() {
            return Err(CalDavError::invalid_argument("empty event path"));
        }
        let relative = !event_path.starts_with('/') && !event_path.contains("://");
        match self.config.calendar_path.as_deref() {
            Some(calendar) if relative => {
                let calendar_url = resolve_path(&self.config.url, calendar)?;
                resolve_path(&calendar_url, event_path)
            }
            _ => resolve_path(&self.config.url, event_path),
        }
    }
}

impl std::fmt::Debug for CalDavClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalDavClient")
            .field("config", &self.config)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// URL of a principal: the server's scheme and host plus the principal path.
///
/// A full URL href contributes only its path, so the fallback never leaves
/// the configured server.
fn principal_url(server: &Url, href: &str) -> CalDavResult<Url> {
    let path = match Url::parse(href) {
        Ok(absolute) if absolute.has_host() => {
            if absolute.host_str() != server.host_str() {
                warn!(href, "Principal href names another host, using its path only");
            }
            absolute.path().to_string()
        }
        _ => href.to_string(),
    };
    resolve_path(server, &format!("/{}", path.trim_start_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use crate::mock::MockTransport;
    use crate::transport::TransportError;
    use std::sync::Arc;

    const SERVER: &str = "https://dav.example.com/remote.php/dav/calendars/alice/";

    const CALENDARS: &str = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
 <d:response>
  <d:href>/remote.php/dav/calendars/alice/</d:href>
  <d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
 </d:response>
 <d:response>
  <d:href>/remote.php/dav/calendars/alice/work/</d:href>
  <d:propstat><d:prop><d:resourcetype><d:collection/><cal:calendar/></d:resourcetype><d:displayname>Work</d:displayname></d:prop></d:propstat>
 </d:response>
</d:multistatus>"#;

    const PRINCIPAL: &str = r#"<D:multistatus xmlns:D="DAV:">
 <D:response>
  <D:href>/remote.php/dav/calendars/alice/</D:href>
  <D:propstat><D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop></D:propstat>
 </D:response>
 <D:response>
  <D:href>/principals/users/alice/</D:href>
  <D:propstat><D:prop><D:resourcetype><D:principal/></D:resourcetype></D:prop></D:propstat>
 </D:response>
</D:multistatus>"#;

    const EVENTS: &str = "<d:multistatus xmlns:d=\"DAV:\" xmlns:cal=\"urn:ietf:params:xml:ns:caldav\"><d:response><d:href>/cal/a.ics</d:href><d:propstat><d:prop><cal:calendar-data>BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nSUMMARY:Standup\r\nDTSTART:20250205T090000Z\r\nDTEND:20250205T091500Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n</cal:calendar-data></d:prop></d:propstat></d:response><d:response><d:href>/cal/b.ics</d:href><d:propstat><d:prop><cal:calendar-data>BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:b\r\nSUMMARY:Retro\r\nLOCATION:Room 1\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n</cal:calendar-data></d:prop></d:propstat></d:response></d:multistatus>";

    fn config() -> CalDavConfig {
        CalDavConfig::new(SERVER)
            .unwrap()
            .with_credentials("alice", "secret")
    }

    fn client(config: CalDavConfig) -> (CalDavClient, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new().with_chunk_size(17));
        let client = CalDavClient::with_transport(config, Arc::clone(&mock)).unwrap();
        (client, mock)
    }

    fn range() -> TimeRange {
        TimeRange::parse_basic("20250201T000000Z", "20250301T000000Z").unwrap()
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CalDavClient>();
    }

    #[test]
    fn init_rejects_missing_credentials() {
        let config = CalDavConfig::new(SERVER).unwrap();
        let err = CalDavClient::with_transport(config, MockTransport::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    mod test_connection {
        use super::*;

        #[test]
        fn accepted_statuses() {
            for status in [200, 204, 207] {
                let (client, mock) = client(config());
                mock.push_response(status, "");
                client.test_connection().unwrap();

                let sent = &mock.requests()[0];
                assert_eq!(sent.method, DavMethod::Propfind);
                assert_eq!(sent.url.as_str(), SERVER);
                assert_eq!(sent.header("Depth"), Some("0"));
            }
        }

        #[test]
        fn unauthorized() {
            let (client, mock) = client(config());
            mock.push_response(401, "Unauthorized");
            let err = client.test_connection().unwrap_err();
            assert_eq!(err.code(), ErrorCode::HttpError);
            assert_eq!(err.http_status(), Some(401));
        }

        #[test]
        fn transport_failure() {
            let (client, mock) = client(config());
            mock.push_error(TransportError::Connection("refused".into()));
            assert_eq!(
                client.test_connection().unwrap_err().code(),
                ErrorCode::ConnectionError
            );

            mock.push_error(TransportError::Timeout);
            assert_eq!(client.test_connection().unwrap_err().code(), ErrorCode::Timeout);
        }

        #[test]
        fn after_deinit() {
            let (mut client, mock) = client(config());
            client.deinit();
            assert!(!client.is_initialized());
            assert!(client.config().password.is_none());
            assert_eq!(
                client.test_connection().unwrap_err().code(),
                ErrorCode::NotInitialized
            );
            assert!(mock.requests().is_empty());
        }
    }

    mod list_calendars {
        use super::*;

        #[test]
        fn lists_calendars() {
            let (client, mock) = client(config());
            mock.push_response(207, CALENDARS);

            let calendars = client.list_calendars().unwrap();
            assert_eq!(calendars.len(), 1);
            assert_eq!(calendars.as_slice()[0].name.as_deref(), Some("work"));

            let sent = mock.requests();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].header("Depth"), Some("1"));
            assert_eq!(
                sent[0].header("Content-Type"),
                Some("application/xml; charset=utf-8")
            );
            assert!(sent[0].body.as_deref().unwrap().contains("resourcetype"));
        }

        #[test]
        fn status_gate() {
            for (status, ok) in [(200, true), (207, true), (204, false), (404, false), (500, false)] {
                let (client, mock) = client(config());
                mock.push_response(status, CALENDARS);
                let result = client.list_calendars();
                assert_eq!(result.is_ok(), ok, "status {status}");
                if let Err(err) = result {
                    assert_eq!(err.code(), ErrorCode::HttpError);
                }
            }
        }

        #[test]
        fn html_login_page() {
            let (client, mock) = client(config());
            mock.push_response(200, "<!DOCTYPE html><html><body>Sign in</body></html>");
            assert_eq!(client.list_calendars().unwrap_err().code(), ErrorCode::HttpError);
        }

        #[test]
        fn principal_fallback_is_one_hop() {
            let (client, mock) = client(config());
            mock.push_response(207, PRINCIPAL);
            mock.push_response(207, CALENDARS);

            let calendars = client.list_calendars().unwrap();
            assert_eq!(calendars.len(), 1);

            let sent = mock.requests();
            assert_eq!(sent.len(), 2);
            assert_eq!(
                sent[1].url.as_str(),
                "https://dav.example.com/principals/users/alice/"
            );
            assert_eq!(sent[1].method, DavMethod::Propfind);
        }

        #[test]
        fn absolute_principal_href_stays_on_server() {
            let (client, mock) = client(config());
            mock.push_response(
                207,
                PRINCIPAL.replace(
                    "<D:href>/principals/users/alice/</D:href>",
                    "<D:href>http://other.example.org/principals/users/alice/</D:href>",
                ),
            );
            mock.push_response(207, CALENDARS);

            assert_eq!(client.list_calendars().unwrap().len(), 1);
            assert_eq!(
                mock.requests()[1].url.as_str(),
                "https://dav.example.com/principals/users/alice/"
            );
        }

        #[test]
        fn principal_pointing_to_itself_stops() {
            let (client, mock) = client(config());
            mock.push_response(207, PRINCIPAL);
            mock.push_response(207, PRINCIPAL);
            mock.push_response(207, CALENDARS);

            assert!(client.list_calendars().unwrap().is_empty());
            assert_eq!(mock.requests().len(), 2);
            assert_eq!(mock.pending(), 1);
        }

        #[test]
        fn empty_listing_without_principal() {
            let (client, mock) = client(config());
            mock.push_response(207, r#"<d:multistatus xmlns:d="DAV:"/>"#);
            assert!(client.list_calendars().unwrap().is_empty());
            assert_eq!(mock.requests().len(), 1);
        }

        #[test]
        fn memory_cap() {
            let (client, mock) = client(config().with_max_response_bytes(1024));
            mock.push_response(207, CALENDARS);
            assert_eq!(client.list_calendars().unwrap_err().code(), ErrorCode::OutOfMemory);
        }

        #[test]
        fn after_deinit() {
            let (mut client, _mock) = client(config());
            client.deinit();
            assert_eq!(
                client.list_calendars().unwrap_err().code(),
                ErrorCode::InvalidArgument
            );
        }

        #[test]
        fn find_calendar() {
            let (client, mock) = client(config());
            mock.push_response(207, CALENDARS);
            assert_eq!(client.find_calendar("Work").unwrap().name.as_deref(), Some("work"));

            mock.push_response(207, CALENDARS);
            assert_eq!(client.find_calendar("home").unwrap_err().code(), ErrorCode::NotFound);
        }
    }

    mod list_events {
        use super::*;

        #[test]
        fn lists_events_in_order() {
            let (client, mock) = client(config());
            mock.push_response(207, EVENTS);

            let events = client
                .list_events(Some("/remote.php/dav/calendars/alice/work/"), &range())
                .unwrap();
            assert_eq!(events.len(), 2);
            assert_eq!(events.as_slice()[0].summary.as_deref(), Some("Standup"));
            assert_eq!(events.as_slice()[1].location.as_deref(), Some("Room 1"));

            let sent = &mock.requests()[0];
            assert_eq!(sent.method, DavMethod::Post);
            assert_eq!(
                sent.url.as_str(),
                "https://dav.example.com/remote.php/dav/calendars/alice/work/"
            );
            assert_eq!(sent.header("X-HTTP-Method-Override"), Some("REPORT"));
            let body = sent.body.as_deref().unwrap();
            assert!(body.contains(r#"start="20250201T000000Z""#));
            assert!(body.contains(r#"end="20250301T000000Z""#));
        }

        #[test]
        fn relative_path_is_appended() {
            let (client, mock) = client(config());
            mock.push_response(207, "");
            client.list_events(Some("work/"), &range()).unwrap();
            assert_eq!(
                mock.requests()[0].url.as_str(),
                "https://dav.example.com/remote.php/dav/calendars/alice/work/"
            );
        }

        #[test]
        fn configured_calendar_is_default() {
            let (client, mock) = client(config().with_calendar_path("/cal/home/"));
            mock.push_response(207, EVENTS);
            client.list_events(None, &range()).unwrap();
            assert_eq!(
                mock.requests()[0].url.as_str(),
                "https://dav.example.com/cal/home/"
            );
        }

        #[test]
        fn no_calendar_path() {
            let (client, mock) = client(config());
            let err = client.list_events(None, &range()).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidArgument);
            assert!(mock.requests().is_empty());
        }

        #[test]
        fn only_multistatus_is_accepted() {
            for status in [200, 204, 404] {
                let (client, mock) = client(config());
                mock.push_response(status, EVENTS);
                let err = client.list_events(Some("/cal/"), &range()).unwrap_err();
                assert_eq!(err.code(), ErrorCode::HttpError);
            }
        }

        #[test]
        fn empty_result() {
            let (client, mock) = client(config());
            mock.push_response(207, r#"<d:multistatus xmlns:d="DAV:"/>"#);
            assert!(client.list_events(Some("/cal/"), &range()).unwrap().is_empty());
        }

        #[test]
        fn after_deinit() {
            let (mut client, _mock) = client(config());
            client.deinit();
            assert_eq!(
                client.list_events(Some("/cal/"), &range()).unwrap_err().code(),
                ErrorCode::InvalidArgument
            );
        }
    }

    mod get_event {
        use super::*;

        const ICS: &str = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:one\r\nSUMMARY:Dentist\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        #[test]
        fn fetches_relative_to_calendar() {
            let (client, mock) = client(config().with_calendar_path("/cal/home/"));
            mock.push_response(200, ICS);

            let event = client.get_event("one.ics").unwrap();
            assert_eq!(event.summary.as_deref(), Some("Dentist"));

            let sent = &mock.requests()[0];
            assert_eq!(sent.method, DavMethod::Get);
            assert_eq!(sent.url.as_str(), "https://dav.example.com/cal/home/one.ics");
            assert!(sent.body.is_none());
        }

        #[test]
        fn absolute_path() {
            let (client, mock) = client(config().with_calendar_path("/cal/home/"));
            mock.push_response(200, ICS);
            client.get_event("/other/two.ics").unwrap();
            assert_eq!(
                mock.requests()[0].url.as_str(),
                "https://dav.example.com/other/two.ics"
            );
        }

        #[test]
        fn missing_event() {
            let (client, mock) = client(config());
            mock.push_response(404, "");
            assert_eq!(client.get_event("/x.ics").unwrap_err().code(), ErrorCode::HttpError);

            mock.push_response(200, "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n");
            assert_eq!(client.get_event("/x.ics").unwrap_err().code(), ErrorCode::NotFound);
        }

        #[test]
        fn empty_path() {
            let (client, _mock) = client(config());
            assert_eq!(client.get_event(" ").unwrap_err().code(), ErrorCode::InvalidArgument);
        }
    }

    #[test]
    fn principal_urls() {
        let server = Url::parse(SERVER).unwrap();
        assert_eq!(
            principal_url(&server, "/principals/users/alice/").unwrap().as_str(),
            "https://dav.example.com/principals/users/alice/"
        );
        assert_eq!(
            principal_url(&server, "principals/bob/").unwrap().as_str(),
            "https://dav.example.com/principals/bob/"
        );
        assert_eq!(
            principal_url(&server, "https://evil.example.net:8443/principals/carol/")
                .unwrap()
                .as_str(),
            "https://dav.example.com/principals/carol/"
        );
    }
}
