//! CalDAV calendar discovery and event listing for constrained clients.
//!
//! The crate is a small pipeline:
//!
//! ```text
//! request ──▶ Transport ──▶ ResponseBuffer ──▶ discovery / events ──▶ records
//!    │                           │
//! XML bodies               status check gates parsing
//! ```
//!
//! Responses are read with plain text scanning rather than a validating
//! parser, so any namespace prefix a server picks is accepted. Only flat,
//! single-line iCalendar fields are extracted.
//!
//! # Example
//!
//! ```ignore
//! use tinydav_caldav::{CalDavClient, CalDavConfig};
//! use tinydav_core::TimeRange;
//!
//! let config = CalDavConfig::new("https://dav.example.com/calendars/alice/")?
//!     .with_credentials("alice", "secret");
//! let client = CalDavClient::new(config)?;
//!
//! for calendar in &client.list_calendars()? {
//!     println!("{:?}", calendar.label());
//! }
//! let events = client.list_events(Some("/calendars/alice/work/"), &range)?;
//! ```

#[cfg(feature = "http")]
mod auth;
pub mod buffer;
mod client;
mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod extract;
pub mod memory;
pub mod mock;
mod model;
pub mod request;
pub mod status;
pub mod transport;

pub use buffer::ResponseBuffer;
pub use client::CalDavClient;
pub use config::CalDavConfig;
pub use discovery::{Discovery, discover_calendars};
pub use error::{CalDavError, CalDavResult, ErrorCode};
pub use events::extract_events;
pub use extract::{extract_ical_field, extract_xml_tag};
pub use memory::MemoryBudget;
pub use model::{Calendar, CalendarList, Event, EventList};
pub use transport::{DavMethod, DavRequest, DavResponse, Transport, TransportError};

#[cfg(feature = "http")]
pub use auth::basic_auth;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
