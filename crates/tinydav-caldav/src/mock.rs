//! A scripted in-memory [`Transport`].
//!
//! Responses are replayed in the order they were queued and every request is
//! recorded. Bodies are delivered in small chunks so the accumulator sees
//! realistic fragmentation.
//!
//! ```ignore
//! let mock = Arc::new(MockTransport::new());
//! mock.push_response(207, MULTISTATUS);
//! let client = CalDavClient::with_transport(config, Arc::clone(&mock))?;
//! client.list_calendars()?;
//! assert_eq!(mock.requests().len(), 1);
//! ```

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::transport::{DavRequest, DavResponse, Transport, TransportError};

const DEFAULT_CHUNK: usize = 64;

/// Replays queued responses and records requests.
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<(u16, Vec<u8>), TransportError>>>,
    requests: Mutex<Vec<DavRequest>>,
    chunk_size: usize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chunk_size: DEFAULT_CHUNK,
        }
    }

    /// Sets how many bytes each body read returns at most.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Queues a response.
    pub fn push_response(&self, status: u16, body: impl Into<Vec<u8>>) {
        lock(&self.script).push_back(Ok((status, body.into())));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: TransportError) {
        lock(&self.script).push_back(Err(error));
    }

    /// Requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<DavRequest> {
        lock(&self.requests).clone()
    }

    /// Number of queued responses not yet consumed.
    pub fn pending(&self) -> usize {
        lock(&self.script).len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &DavRequest) -> Result<DavResponse, TransportError> {
        lock(&self.requests).push(request.clone());
        let (status, body) = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connection("no scripted response".into())))?;

        Ok(DavResponse {
            status,
            body: Box::new(ChunkedBody {
                data: body,
                pos: 0,
                chunk_size: self.chunk_size,
            }),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ChunkedBody {
    data: Vec<u8>,
    pos: usize,
    chunk_size: usize,
}

impl Read for ChunkedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self
            .chunk_size
            .min(buf.len())
            .min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
