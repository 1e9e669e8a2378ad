// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    device::CompletionRef,
    fail::Fail,
    types::LATEST_SEQUENCE,
};
use ::std::time::Duration;

//======================================================================================================================
// Structures
//======================================================================================================================

/// A fixed-size ring of the most recent completion handles of an entity, indexed by submission sequence number.
///
/// Slot `seq & mask` holds the handle of submission `seq` until submission `seq + depth` takes it over. Taking a
/// slot over is only allowed once the handle it holds has signaled, which bounds in-flight work to `depth` jobs.
pub struct CompletionLedger {
    slots: Box<[Option<CompletionRef>]>,
    // Pre-computed capacity mask for the slots.
    mask: usize,
    // Sequence number of the next submission.
    sequence: u64,
    // Busy time of handles that were evicted.
    retired: Duration,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl CompletionLedger {
    /// Creates a ledger that tracks `depth` handles.
    pub fn new(depth: usize) -> Result<Self, Fail> {
        if !depth.is_power_of_two() {
            let cause: String = format!("ledger depth must be a power of two (depth={:?})", depth);
            error!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }

        Ok(Self {
            slots: vec![None; depth].into_boxed_slice(),
            mask: depth - 1,
            sequence: 1,
            retired: Duration::ZERO,
        })
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Sequence number that the next submission will get.
    pub fn next_sequence(&self) -> u64 {
        self.sequence
    }

    /// Records the handle of a new submission and returns the sequence number assigned to it.
    pub fn record(&mut self, handle: CompletionRef) -> Result<u64, Fail> {
        let idx: usize = self.index(self.sequence);
        if let Some(prev) = self.slots[idx].as_ref() {
            if !prev.is_signaled() {
                let cause: String = format!(
                    "slot still holds an in-flight submission (sequence={:?}, depth={:?})",
                    self.sequence,
                    self.depth()
                );
                error!("record(): {}", cause);
                return Err(Fail::new(libc::EBUSY, &cause));
            }
            self.retired += prev.busy_time();
        }

        self.slots[idx] = Some(handle);
        let seq: u64 = self.sequence;
        self.sequence += 1;
        Ok(seq)
    }

    /// Looks up the handle of submission `seq`. [LATEST_SEQUENCE] designates the most recent submission. Returns
    /// `None` for submissions that were already evicted: those are known to be complete.
    pub fn get(&self, seq: u64) -> Result<Option<CompletionRef>, Fail> {
        let seq: u64 = if seq == LATEST_SEQUENCE { self.sequence - 1 } else { seq };

        if seq >= self.sequence {
            let cause: String = format!(
                "sequence number was not submitted yet (sequence={:?}, next={:?})",
                seq, self.sequence
            );
            error!("get(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }

        if seq + (self.depth() as u64) < self.sequence {
            return Ok(None);
        }

        Ok(self.slots[self.index(seq)].clone())
    }

    /// Handle that the next submission would evict.
    pub fn pending(&self) -> Option<CompletionRef> {
        self.slots[self.index(self.sequence)].clone()
    }

    /// Busy time of every submission recorded so far.
    pub fn busy_time(&self) -> Duration {
        self.slots
            .iter()
            .flatten()
            .fold(self.retired, |total, handle| total + handle.busy_time())
    }

    /// Drops every handle and returns the busy time of every submission recorded so far.
    pub fn drain(&mut self) -> Duration {
        let total: Duration = self.busy_time();
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.retired = total;
        total
    }

    fn index(&self, seq: u64) -> usize {
        (seq as usize) & self.mask
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
