//! Response accumulation.
//!
//! The transport hands over the body in chunks of whatever size it likes.
//! [`ResponseBuffer`] collects them into one contiguous allocation that starts
//! at [`INITIAL_CAPACITY`] bytes and doubles until the next chunk fits. The
//! stored bytes are always followed by a single NUL.

use std::borrow::Cow;
use std::io::{self, Read};

use tracing::trace;

use crate::error::{CalDavError, CalDavResult};
use crate::memory::MemoryBudget;

/// Capacity allocated on the first append.
pub const INITIAL_CAPACITY: usize = 4096;

/// Size of the scratch chunk used by [`ResponseBuffer::read_from`].
const READ_CHUNK: usize = 1024;

/// A growable, NUL-terminated byte buffer for one response body.
#[derive(Debug)]
pub struct ResponseBuffer<'a> {
    /// Body bytes followed by the terminator, empty until the first append.
    data: Vec<u8>,
    capacity: usize,
    budget: &'a MemoryBudget,
}

impl<'a> ResponseBuffer<'a> {
    /// Creates an empty buffer charging its allocations to `budget`.
    pub fn new(budget: &'a MemoryBudget) -> Self {
        Self {
            data: Vec::new(),
            capacity: 0,
            budget,
        }
    }

    /// Appends one chunk.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if growing the buffer fails, either because the
    /// allocator refused or because the budget is exhausted. The buffer keeps
    /// its previous contents.
    pub fn append(&mut self, chunk: &[u8]) -> CalDavResult<()> {
        let needed = self
            .len()
            .checked_add(chunk.len())
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| CalDavError::out_of_memory("response too large"))?;

        if needed > self.capacity {
            self.grow(needed)?;
        }

        self.data.pop();
        self.data.extend_from_slice(chunk);
        self.data.push(0);
        Ok(())
    }

    fn grow(&mut self, needed: usize) -> CalDavResult<()> {
        let mut new_capacity = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity
        };
        while new_capacity < needed {
            new_capacity = new_capacity
                .checked_mul(2)
                .ok_or_else(|| CalDavError::out_of_memory("response too large"))?;
        }

        let delta = new_capacity - self.capacity;
        self.budget.charge(delta)?;
        if let Err(e) = self.data.try_reserve_exact(new_capacity - self.data.len()) {
            self.budget.release(delta);
            return Err(CalDavError::out_of_memory(format!(
                "failed to grow response buffer to {new_capacity} bytes"
            ))
            .with_source(e));
        }

        trace!(from = self.capacity, to = new_capacity, "Grew response buffer");
        self.capacity = new_capacity;
        Ok(())
    }

    /// Drains `reader` into the buffer, chunk by chunk.
    ///
    /// Returns the number of bytes read.
    ///
    /// # Errors
    ///
    /// `Timeout` for timed-out reads, `ConnectionError` for other I/O
    /// failures, `OutOfMemory` if the buffer cannot grow.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> CalDavResult<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(read_error(e)),
            };
            self.append(&chunk[..n])?;
            total += n;
        }
    }

    /// Number of body bytes, excluding the terminator.
    pub fn len(&self) -> usize {
        self.data.len().saturating_sub(1)
    }

    /// Returns true if no bytes have been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated capacity, terminator included. Zero before the first append.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The body bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// The body bytes followed by the NUL terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        &self.data
    }

    /// The body as text. Invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl Drop for ResponseBuffer<'_> {
    fn drop(&mut self) {
        self.budget.release(self.capacity);
    }
}

/// Maps a body read failure onto the error taxonomy.
pub(crate) fn read_error(e: io::Error) -> CalDavError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            CalDavError::timeout("timed out reading response body").with_source(e)
        }
        _ => CalDavError::connection(format!("failed to read response body: {e}")).with_source(e),
    }
}
