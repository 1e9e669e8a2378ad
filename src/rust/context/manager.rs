// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    context::{
        admission::{
            AdmissionPolicy,
            Requester,
        },
        ExecutionContext,
    },
    runtime::{
        device::{
            CompletionRef,
            Device,
            Job,
        },
        fail::Fail,
        limits::MAX_CONTEXTS,
        logging,
        types::{
            ContextId,
            ContextStateFlags,
            EngineUsage,
            Priority,
            ResetStatus,
            StablePowerState,
        },
    },
};
use ::parking_lot::Mutex;
use ::slab::Slab;
use ::std::{
    sync::{
        atomic::{
            AtomicU64,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Entry of the context table.
enum Slot {
    /// Identifier handed out to a context that is still being built, along with the ticket of that allocation.
    Reserved(u64),
    Live(Arc<ExecutionContext>),
}

/// Context Manager
///
/// Per-connection table from context identifiers to contexts. The table lock is only held to insert, remove or
/// look up and take a reference; contexts are used and torn down without it.
pub struct ContextManager {
    device: Arc<Device>,
    admission: AdmissionPolicy,
    table: Mutex<Slab<Slot>>,
    /// Source of reservation tickets.
    tickets: AtomicU64,
    /// Busy time of entities that were destroyed.
    usage: Arc<Mutex<EngineUsage>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ContextManager {
    /// Creates a context manager for a connection to `device`.
    pub fn new(device: Arc<Device>) -> Self {
        logging::initialize();
        let admission: AdmissionPolicy = AdmissionPolicy::new(device.options().trusted_group);
        Self {
            device,
            admission,
            table: Mutex::new(Slab::new()),
            tickets: AtomicU64::new(0),
            usage: Arc::new(Mutex::new(EngineUsage::default())),
        }
    }

    /// Creates a context at `priority` on behalf of `requester`.
    pub fn allocate(&self, priority: i32, requester: &Requester) -> Result<ContextId, Fail> {
        let priority: Priority = Priority::try_from(priority)?;
        if !priority.is_set() {
            let cause: &str = "cannot create a context without priority";
            error!("allocate(): {}", cause);
            return Err(Fail::new(libc::EINVAL, cause));
        }
        self.admission.check(priority, requester)?;

        let (id, ticket): (ContextId, u64) = self.reserve()?;
        match ExecutionContext::new(id, self.device.clone(), priority, self.usage.clone()) {
            Ok(ctx) => {
                let mut table = self.table.lock();
                if let Some(entry) = Self::reserved(&mut table, id, ticket) {
                    *entry = Slot::Live(Arc::new(ctx));
                    trace!("allocate(): id={:?}, priority={:?}", id, priority);
                    return Ok(id);
                }
                drop(table);

                // The table was emptied while the context was being built.
                let cause: String = format!("context manager was finalized during allocation (id={:?})", id);
                error!("allocate(): {}", cause);
                if let Err(e) = ctx.destroy() {
                    warn!("allocate(): teardown incomplete (id={:?}, error={:?})", id, e);
                }
                Err(Fail::new(libc::ECANCELED, &cause))
            },
            Err(e) => {
                self.release(id, ticket);
                Err(e)
            },
        }
    }

    /// Removes context `id` and drops the reference of this manager. The context is torn down right away if nobody
    /// else holds it, or when the last holder lets it go otherwise.
    pub fn free(&self, id: ContextId) -> Result<(), Fail> {
        let ctx: Arc<ExecutionContext> = match Self::take(&mut self.table.lock(), id) {
            Some(ctx) => ctx,
            None => {
                let cause: String = format!("no such context (id={:?})", id);
                error!("free(): {}", cause);
                return Err(Fail::new(libc::ENOENT, &cause));
            },
        };

        match Arc::into_inner(ctx) {
            Some(ctx) => ctx.destroy(),
            None => {
                debug!("free(): context still referenced, deferring teardown (id={:?})", id);
                Ok(())
            },
        }
    }

    /// Looks up context `id` and takes a reference to it. Dropping the reference releases it.
    pub fn get(&self, id: ContextId) -> Option<Arc<ExecutionContext>> {
        let table = self.table.lock();
        match table.get(id.slot()?) {
            Some(Slot::Live(ctx)) => Some(ctx.clone()),
            _ => None,
        }
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports whether a reset happened since the last query on context `id`.
    pub fn query_state(&self, id: ContextId) -> Result<ResetStatus, Fail> {
        Ok(self.lookup(id)?.query_state())
    }

    /// Reports the reset, VRAM, guilt and RAS state of context `id`.
    pub fn query_state2(&self, id: ContextId) -> Result<ContextStateFlags, Fail> {
        Ok(self.lookup(id)?.query_state2())
    }

    pub fn get_stable_power_state(&self, id: ContextId) -> Result<StablePowerState, Fail> {
        Ok(self.lookup(id)?.get_stable_power_state())
    }

    pub fn set_stable_power_state(&self, id: ContextId, state: StablePowerState) -> Result<(), Fail> {
        self.lookup(id)?.set_stable_power_state(state)
    }

    /// Overrides the priority of context `id`.
    pub fn override_priority(&self, id: ContextId, priority: i32) -> Result<(), Fail> {
        let priority: Priority = Priority::try_from(priority)?;
        self.lookup(id)?.set_priority_override(priority);
        Ok(())
    }

    /// Overrides the priority of every context of this connection.
    pub fn override_all(&self, priority: i32) -> Result<(), Fail> {
        let priority: Priority = Priority::try_from(priority)?;
        for ctx in self.live() {
            ctx.set_priority_override(priority);
        }
        Ok(())
    }

    /// Submits `job` on context `id` and returns its sequence number.
    pub fn submit_job(&self, id: ContextId, engine: u32, instance: u32, ring: u32, job: Job) -> Result<u64, Fail> {
        self.lookup(id)?.submit(engine, instance, ring, job)
    }

    /// Looks up the completion handle of submission `seq` on context `id`.
    pub fn completion(
        &self,
        id: ContextId,
        engine: u32,
        instance: u32,
        ring: u32,
        seq: u64,
    ) -> Result<Option<CompletionRef>, Fail> {
        let ctx: Arc<ExecutionContext> = self.lookup(id)?;
        let handle: Option<CompletionRef> = ctx.get_completion_handle(ctx.resolve_entity(engine, instance, ring)?, seq)?;
        Ok(handle)
    }

    /// Waits for submission `seq` on context `id`.
    pub fn wait_on_sequence(
        &self,
        id: ContextId,
        engine: u32,
        instance: u32,
        ring: u32,
        seq: u64,
        timeout: Option<Duration>,
    ) -> Result<(), Fail> {
        self.lookup(id)?.wait_on_sequence(engine, instance, ring, seq, timeout)
    }

    /// Flushes every entity of every live context. The budget is shared: time spent on one context is not
    /// available to the next ones. Returns what is left of it.
    pub fn flush_all(&self, timeout: Duration) -> Duration {
        self.live().iter().fold(timeout, |remaining, ctx| ctx.flush(remaining))
    }

    /// Empties the table and tears down every context nobody else holds. Contexts that are still referenced
    /// elsewhere are leaks: they are reported and left to their last holder. Returns the number of leaks.
    pub fn fini_all(&self) -> usize {
        let contexts: Vec<Arc<ExecutionContext>> = {
            let mut table = self.table.lock();
            table
                .drain()
                .filter_map(|slot| match slot {
                    Slot::Live(ctx) => Some(ctx),
                    Slot::Reserved(_) => None,
                })
                .collect()
        };

        let mut leaked: usize = 0;
        for ctx in contexts {
            let id: ContextId = ctx.id();
            let refcount: usize = Arc::strong_count(&ctx);
            match Arc::into_inner(ctx) {
                Some(ctx) => {
                    if let Err(e) = ctx.destroy() {
                        warn!("fini_all(): teardown incomplete (id={:?}, error={:?})", id, e);
                    }
                },
                None => {
                    error!("fini_all(): context is still alive (id={:?}, refcount={:?})", id, refcount);
                    leaked += 1;
                },
            }
        }
        leaked
    }

    /// Busy time per engine type, for destroyed and live contexts of this connection.
    pub fn usage(&self) -> EngineUsage {
        let mut usage: EngineUsage = *self.usage.lock();
        for ctx in self.live() {
            usage.merge(&ctx.usage());
        }
        usage
    }

    fn reserve(&self) -> Result<(ContextId, u64), Fail> {
        let mut table = self.table.lock();
        if table.len() + 1 >= MAX_CONTEXTS {
            let cause: String = format!("too many contexts (max={:?})", MAX_CONTEXTS - 1);
            error!("reserve(): {}", cause);
            return Err(Fail::new(libc::ENOMEM, &cause));
        }
        let ticket: u64 = self.tickets.fetch_add(1, Ordering::Relaxed);
        Ok((ContextId::from_slot(table.insert(Slot::Reserved(ticket))), ticket))
    }

    fn release(&self, id: ContextId, ticket: u64) {
        let mut table = self.table.lock();
        if Self::reserved(&mut table, id, ticket).is_some() {
            if let Some(slot) = id.slot() {
                table.remove(slot);
            }
        }
    }

    /// Entry of `id` if it is still reserved under `ticket`.
    fn reserved(table: &mut Slab<Slot>, id: ContextId, ticket: u64) -> Option<&mut Slot> {
        let entry: &mut Slot = table.get_mut(id.slot()?)?;
        if matches!(entry, Slot::Reserved(t) if *t == ticket) {
            Some(entry)
        } else {
            None
        }
    }

    fn lookup(&self, id: ContextId) -> Result<Arc<ExecutionContext>, Fail> {
        match self.get(id) {
            Some(ctx) => Ok(ctx),
            None => {
                let cause: String = format!("no such context (id={:?})", id);
                error!("lookup(): {}", cause);
                Err(Fail::new(libc::ENOENT, &cause))
            },
        }
    }

    /// Takes a reference to every live context.
    fn live(&self) -> Vec<Arc<ExecutionContext>> {
        self.table
            .lock()
            .iter()
            .filter_map(|(_, slot)| match slot {
                Slot::Live(ctx) => Some(ctx.clone()),
                Slot::Reserved(_) => None,
            })
            .collect()
    }

    fn take(table: &mut Slab<Slot>, id: ContextId) -> Option<Arc<ExecutionContext>> {
        let slot: usize = id.slot()?;
        if !matches!(table.get(slot), Some(Slot::Live(_))) {
            return None;
        }
        match table.remove(slot) {
            Slot::Live(ctx) => Some(ctx),
            Slot::Reserved(_) => None,
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for ContextManager {
    fn drop(&mut self) {
        let leaked: usize = self.fini_all();
        if leaked > 0 {
            warn!("drop(): contexts outlive their manager (count={:?})", leaked);
        }
    }
}
