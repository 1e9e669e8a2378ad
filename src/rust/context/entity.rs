// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    context::ledger::CompletionLedger,
    runtime::{
        device::{
            topology::SchedulerId,
            BackendEntity,
            CompletionRef,
            Device,
            Job,
        },
        fail::Fail,
        types::{
            EngineType,
            Priority,
        },
    },
};
use ::parking_lot::Mutex;
use ::std::{
    sync::{
        atomic::AtomicBool,
        Arc,
    },
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Logical submission queue of a context for one engine instance.
pub struct SchedulingEntity {
    engine: EngineType,
    ring: usize,
    /// Back ends that jobs may be dispatched to.
    schedulers: Mutex<Vec<SchedulerId>>,
    backend: Box<dyn BackendEntity>,
    /// Sequence counter and in-flight handles. Never held across a wait.
    ledger: Mutex<CompletionLedger>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SchedulingEntity {
    /// Creates the entity for ring `ring` of `engine`, bound to `schedulers`.
    pub fn new(
        device: &Device,
        engine: EngineType,
        ring: usize,
        schedulers: Vec<SchedulerId>,
        priority: Priority,
        guilty: Arc<AtomicBool>,
    ) -> Result<Self, Fail> {
        let ledger: CompletionLedger = CompletionLedger::new(device.options().job_queue_depth)?;
        let backend: Box<dyn BackendEntity> = match device.backend().entity_init(&schedulers, priority, guilty) {
            Ok(backend) => backend,
            Err(e) => {
                error!(
                    "new(): failed to create back end entity (engine={}, ring={:?}, error={:?})",
                    engine, ring, e
                );
                return Err(e);
            },
        };

        trace!(
            "new(): engine={}, ring={:?}, schedulers={:?}, priority={:?}",
            engine,
            ring,
            schedulers,
            priority
        );
        Ok(Self {
            engine,
            ring,
            schedulers: Mutex::new(schedulers),
            backend,
            ledger: Mutex::new(ledger),
        })
    }

    pub fn engine(&self) -> EngineType {
        self.engine
    }

    pub fn ring(&self) -> usize {
        self.ring
    }

    /// Back ends this entity is currently bound to.
    pub fn schedulers(&self) -> Vec<SchedulerId> {
        self.schedulers.lock().clone()
    }

    pub fn depth(&self) -> usize {
        self.ledger.lock().depth()
    }

    /// Sequence number that the next submission will get.
    pub fn next_sequence(&self) -> u64 {
        self.ledger.lock().next_sequence()
    }

    /// Hands a job to the back end.
    pub fn push_job(&self, job: Job) -> Result<CompletionRef, Fail> {
        self.backend.push_job(job)
    }

    /// Records the completion handle of a submission and returns its sequence number.
    pub fn record_submission(&self, handle: CompletionRef) -> Result<u64, Fail> {
        self.ledger.lock().record(handle)
    }

    /// Looks up the completion handle of submission `seq`.
    pub fn completion(&self, seq: u64) -> Result<Option<CompletionRef>, Fail> {
        self.ledger.lock().get(seq)
    }

    /// Waits until the slot that the next submission takes over is free.
    pub fn wait_prev_fence(&self) -> Result<(), Fail> {
        let pending: Option<CompletionRef> = self.ledger.lock().pending();
        match pending {
            Some(handle) if !handle.is_signaled() => handle.wait(true, None),
            _ => Ok(()),
        }
    }

    /// Pushes a new priority to the back end. When `schedulers` is given, the entity moves to those back ends.
    pub fn set_priority(&self, priority: Priority, schedulers: Option<Vec<SchedulerId>>) {
        self.backend.set_priority(priority);
        if let Some(schedulers) = schedulers {
            self.backend.modify_schedulers(&schedulers);
            *self.schedulers.lock() = schedulers;
        }
    }

    /// Waits for outstanding work for at most `timeout` and returns what is left of it.
    pub fn flush(&self, timeout: Duration) -> Duration {
        self.backend.flush(timeout)
    }

    /// Busy time of every submission of this entity.
    pub fn busy_time(&self) -> Duration {
        self.ledger.lock().busy_time()
    }

    /// Releases the ledger, tears down the back end entity and returns the busy time of every submission.
    pub fn destroy(self) -> Duration {
        let busy: Duration = self.ledger.into_inner().drain();
        self.backend.destroy();
        trace!("destroy(): engine={}, ring={:?}, busy={:?}", self.engine, self.ring, busy);
        busy
    }
}
