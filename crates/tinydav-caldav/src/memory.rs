//! Byte accounting for one operation.
//!
//! A [`MemoryBudget`] tracks the bytes held by a response buffer and the
//! records parsed out of it. With a limit set, a charge that would exceed it
//! fails with [`ErrorCode::OutOfMemory`](crate::ErrorCode::OutOfMemory), which
//! is how a device caps what a single response may cost.

use std::cell::Cell;

use crate::error::{CalDavError, CalDavResult};

/// Per-operation byte counter with an optional ceiling.
#[derive(Debug, Default)]
pub struct MemoryBudget {
    limit: Option<usize>,
    in_use: Cell<usize>,
    peak: Cell<usize>,
}

impl MemoryBudget {
    /// A budget without a ceiling.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// A budget that refuses to go above `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// A budget from an optional limit.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Reserves `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the charge would pass the limit. Nothing is
    /// charged in that case.
    pub fn charge(&self, bytes: usize) -> CalDavResult<()> {
        let next = self
            .in_use
            .get()
            .checked_add(bytes)
            .ok_or_else(|| CalDavError::out_of_memory("allocation size overflow"))?;

        if let Some(limit) = self.limit
            && next > limit
        {
            return Err(CalDavError::out_of_memory(format!(
                "memory budget exhausted: {next} bytes requested, limit is {limit}"
            )));
        }

        self.in_use.set(next);
        self.peak.set(self.peak.get().max(next));
        Ok(())
    }

    /// Returns `bytes` to the budget.
    pub fn release(&self, bytes: usize) {
        self.in_use.set(self.in_use.get().saturating_sub(bytes));
    }

    /// Bytes currently charged.
    pub fn in_use(&self) -> usize {
        self.in_use.get()
    }

    /// Highest value `in_use` has reached.
    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    /// The configured ceiling.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Charges made on behalf of records under construction.
///
/// Everything charged through a ledger goes back to the budget when the ledger
/// is dropped, unless [`commit`](Self::commit) was called first. Parsers use it
/// so a failure halfway through a body leaves the budget where it started.
pub(crate) struct Ledger<'a> {
    budget: &'a MemoryBudget,
    charged: usize,
}

impl<'a> Ledger<'a> {
    pub(crate) fn new(budget: &'a MemoryBudget) -> Self {
        Self { budget, charged: 0 }
    }

    pub(crate) fn charge(&mut self, bytes: usize) -> CalDavResult<()> {
        self.budget.charge(bytes)?;
        self.charged += bytes;
        Ok(())
    }

    /// Charges the heap bytes of an optional string field.
    pub(crate) fn charge_str(&mut self, value: Option<&str>) -> CalDavResult<()> {
        match value {
            Some(s) => self.charge(s.len()),
            None => Ok(()),
        }
    }

    /// Keeps the charges in the budget.
    pub(crate) fn commit(mut self) {
        self.charged = 0;
    }
}

impl Drop for Ledger<'_> {
    fn drop(&mut self) {
        self.budget.release(self.charged);
    }
}
