// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Execution contexts: a client's logical session on the device, with one scheduling entity per engine instance.

pub mod admission;
pub mod entity;
pub mod ledger;
pub mod manager;
pub mod policy;
pub mod pstate;

//======================================================================================================================
// Imports
//======================================================================================================================

use self::entity::SchedulingEntity;
use crate::runtime::{
    device::{
        CompletionRef,
        Device,
        DeviceTelemetry,
        Job,
        RasCounts,
    },
    fail::Fail,
    limits::MAX_ENTITIES_PER_ENGINE,
    types::{
        ContextId,
        ContextStateFlags,
        EngineType,
        EngineUsage,
        Priority,
        ResetStatus,
        StablePowerState,
        ENGINE_TYPE_COUNT,
    },
};
use ::arrayvec::ArrayVec;
use ::parking_lot::Mutex;
use ::std::{
    sync::{
        atomic::{
            AtomicBool,
            AtomicU32,
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

/// Entity slots of a context, indexed by engine type and then by ring.
type EntityTable = [ArrayVec<Option<SchedulingEntity>, MAX_ENTITIES_PER_ENGINE>; ENGINE_TYPE_COUNT];

/// Execution Context
pub struct ExecutionContext {
    id: ContextId,
    /// Process-unique identity. Context identifiers are only unique within one manager.
    serial: u64,
    device: Arc<Device>,
    init_priority: Priority,
    /// Held while a priority change is pushed to the entities.
    override_priority: Mutex<Priority>,
    entities: EntityTable,
    /// Raised by the back end when a job of this context is found responsible for a hang.
    guilty: Arc<AtomicBool>,
    /// Reset counter when the context was created.
    reset_counter: u32,
    /// Reset counter at the last [ExecutionContext::query_state].
    reset_counter_query: AtomicU32,
    /// VRAM-lost counter when the context was created.
    vram_lost_counter: u32,
    /// RAS counters at the last [ExecutionContext::query_state2].
    ras_counters: Mutex<RasCounts>,
    /// Serializes submissions: fence wait, push and record happen as one step.
    submit_lock: Mutex<()>,
    /// Busy time of destroyed entities, shared with the owning manager.
    usage: Arc<Mutex<EngineUsage>>,
    torn_down: bool,
}

//======================================================================================================================
// Static Variables
//======================================================================================================================

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ExecutionContext {
    /// Creates a context and one entity per populated engine instance. Either every entity is created or none is.
    pub fn new(
        id: ContextId,
        device: Arc<Device>,
        priority: Priority,
        usage: Arc<Mutex<EngineUsage>>,
    ) -> Result<Self, Fail> {
        if !priority.is_set() {
            let cause: String = format!("context priority must be set (id={:?})", id);
            error!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }

        let guilty: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let mut entities: EntityTable = Default::default();
        for engine in EngineType::ALL {
            for ring in 0..engine.num_entities() {
                let slot: Option<SchedulingEntity> = match policy::bind(engine, ring, priority, device.topology()) {
                    Some(schedulers) => {
                        match SchedulingEntity::new(&device, engine, ring, schedulers, priority, guilty.clone()) {
                            Ok(entity) => Some(entity),
                            Err(e) => {
                                error!("new(): failed to create entity (id={:?}, error={:?})", id, e);
                                Self::destroy_entities(&mut entities);
                                return Err(e);
                            },
                        }
                    },
                    None => {
                        debug!("new(): engine instance not populated (engine={}, ring={:?})", engine, ring);
                        None
                    },
                };
                entities[engine.index()].push(slot);
            }
        }

        let telemetry: &dyn DeviceTelemetry = device.telemetry();
        let reset_counter: u32 = telemetry.gpu_reset_counter();
        let vram_lost_counter: u32 = telemetry.vram_lost_counter();
        let ras_counters: RasCounts = telemetry.ras_error_counts().unwrap_or_default();

        let serial: u64 = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        debug!("new(): id={:?}, serial={:?}, priority={:?}", id, serial, priority);
        Ok(Self {
            id,
            serial,
            device,
            init_priority: priority,
            override_priority: Mutex::new(Priority::Unset),
            entities,
            guilty,
            reset_counter,
            reset_counter_query: AtomicU32::new(reset_counter),
            vram_lost_counter,
            ras_counters: Mutex::new(ras_counters),
            submit_lock: Mutex::new(()),
            usage,
            torn_down: false,
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn init_priority(&self) -> Priority {
        self.init_priority
    }

    /// Priority the entities currently run at: the override if there is one, the creation priority otherwise.
    pub fn effective_priority(&self) -> Priority {
        Self::effective(self.init_priority, *self.override_priority.lock())
    }

    pub fn is_guilty(&self) -> bool {
        self.guilty.load(Ordering::Acquire)
    }

    /// Entity in slot `ring` of `engine`, without any routing.
    pub fn entity(&self, engine: EngineType, ring: usize) -> Option<&SchedulingEntity> {
        self.entities[engine.index()].get(ring)?.as_ref()
    }

    /// Every entity of this context.
    pub fn entities(&self) -> impl Iterator<Item = &SchedulingEntity> {
        self.entities.iter().flatten().flatten()
    }

    /// Resolves the entity that a submission to (`engine`, `instance`, `ring`) goes to.
    pub fn resolve_entity(&self, engine: u32, instance: u32, ring: u32) -> Result<&SchedulingEntity, Fail> {
        let engine: EngineType = EngineType::try_from(engine)?;
        if instance != 0 {
            let cause: String = format!("invalid engine instance (engine={}, instance={:?})", engine, instance);
            error!("resolve_entity(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }

        let mut ring: usize = ring as usize;
        // The hardware scheduler picks the physical queue.
        if policy::routes_to_ring_zero(engine, self.device.topology()) {
            ring = 0;
        }
        if let Some(reserved) = policy::reserved_ring(engine, self.device.topology()) {
            if ring == reserved && self.init_priority != Priority::HighHw {
                trace!("resolve_entity(): redirecting off the reserved ring (id={:?})", self.id);
                ring = 0;
            }
        }

        match self.entities[engine.index()].get(ring) {
            Some(Some(entity)) => Ok(entity),
            Some(None) => {
                let cause: String = format!("engine instance is not populated (engine={}, ring={:?})", engine, ring);
                error!("resolve_entity(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
            None => {
                let cause: String = format!("ring out of range (engine={}, ring={:?})", engine, ring);
                error!("resolve_entity(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }

    /// Records the completion handle of a submission to `entity` and returns its sequence number. The caller must
    /// have waited for the slot with [ExecutionContext::wait_prev_fence].
    pub fn record_submission(&self, entity: &SchedulingEntity, handle: CompletionRef) -> Result<u64, Fail> {
        entity.record_submission(handle)
    }

    /// Looks up the completion handle of submission `seq` of `entity`.
    pub fn get_completion_handle(&self, entity: &SchedulingEntity, seq: u64) -> Result<Option<CompletionRef>, Fail> {
        entity.completion(seq)
    }

    /// Blocks until `entity` can take one more submission.
    pub fn wait_prev_fence(&self, entity: &SchedulingEntity) -> Result<(), Fail> {
        if let Err(e) = entity.wait_prev_fence() {
            warn!(
                "wait_prev_fence(): wait failed (id={:?}, engine={}, ring={:?}, error={:?})",
                self.id,
                entity.engine(),
                entity.ring(),
                e
            );
            return Err(e);
        }
        Ok(())
    }

    /// Submits `job` to (`engine`, `instance`, `ring`) and returns its sequence number.
    pub fn submit(&self, engine: u32, instance: u32, ring: u32, job: Job) -> Result<u64, Fail> {
        let entity: &SchedulingEntity = self.resolve_entity(engine, instance, ring)?;
        let _guard = self.submit_lock.lock();
        self.wait_prev_fence(entity)?;
        let handle: CompletionRef = entity.push_job(job)?;
        self.record_submission(entity, handle)
    }

    /// Waits for submission `seq` of (`engine`, `instance`, `ring`). Evicted submissions are complete.
    pub fn wait_on_sequence(
        &self,
        engine: u32,
        instance: u32,
        ring: u32,
        seq: u64,
        timeout: Option<Duration>,
    ) -> Result<(), Fail> {
        let entity: &SchedulingEntity = self.resolve_entity(engine, instance, ring)?;
        match self.get_completion_handle(entity, seq)? {
            Some(handle) => handle.wait(true, timeout),
            None => Ok(()),
        }
    }

    /// Overrides the priority of this context. [Priority::Unset] goes back to the creation priority.
    pub fn set_priority_override(&self, priority: Priority) {
        let mut override_priority = self.override_priority.lock();
        *override_priority = priority;
        let effective: Priority = Self::effective(self.init_priority, priority);

        for entity in self.entities() {
            let schedulers = if policy::reselects_on_priority(entity.engine(), self.device.topology()) {
                policy::bind(entity.engine(), entity.ring(), effective, self.device.topology())
            } else {
                None
            };
            entity.set_priority(effective, schedulers);
        }
        debug!("set_priority_override(): id={:?}, effective={:?}", self.id, effective);
    }

    /// Reports whether a reset happened since the previous call. Each reset is reported once.
    pub fn query_state(&self) -> ResetStatus {
        let current: u32 = self.device.telemetry().gpu_reset_counter();
        let previous: u32 = self.reset_counter_query.swap(current, Ordering::AcqRel);
        if previous == current {
            ResetStatus::NoReset
        } else {
            ResetStatus::UnknownReset
        }
    }

    /// Reports the state of the context. Reset and VRAM loss are reported for as long as they happened after the
    /// context was created. RAS flags are raised once per counter change.
    pub fn query_state2(&self) -> ContextStateFlags {
        let telemetry: &dyn DeviceTelemetry = self.device.telemetry();
        let mut flags: ContextStateFlags = ContextStateFlags::empty();

        if self.reset_counter != telemetry.gpu_reset_counter() {
            flags |= ContextStateFlags::RESET;
        }
        if self.vram_lost_counter != telemetry.vram_lost_counter() {
            flags |= ContextStateFlags::VRAM_LOST;
        }
        if self.is_guilty() {
            flags |= ContextStateFlags::GUILTY;
        }
        if let Some(counts) = telemetry.ras_error_counts() {
            let mut snapshot = self.ras_counters.lock();
            if counts.ue != snapshot.ue {
                flags |= ContextStateFlags::RAS_UE;
                snapshot.ue = counts.ue;
            }
            if counts.ce != snapshot.ce {
                flags |= ContextStateFlags::RAS_CE;
                snapshot.ce = counts.ce;
            }
        }
        if telemetry.in_reset() {
            flags |= ContextStateFlags::RESET_IN_PROGRESS;
        }
        flags
    }

    pub fn get_stable_power_state(&self) -> StablePowerState {
        self.device.pstate().get()
    }

    pub fn set_stable_power_state(&self, state: StablePowerState) -> Result<(), Fail> {
        self.device.pstate().set(self.serial, state)
    }

    /// Flushes every entity, sharing `timeout` among them, and returns what is left of it.
    pub fn flush(&self, timeout: Duration) -> Duration {
        self.entities().fold(timeout, |remaining, entity| entity.flush(remaining))
    }

    /// Busy time of the entities of this context.
    pub fn usage(&self) -> EngineUsage {
        let mut usage: EngineUsage = EngineUsage::default();
        for entity in self.entities() {
            usage.add(entity.engine(), entity.busy_time());
        }
        usage
    }

    /// Tears down the context. Resources are released even if draining times out, in which case `ETIMEDOUT` is
    /// returned.
    pub fn destroy(mut self) -> Result<(), Fail> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), Fail> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let timeout: Duration = self.device.options().flush_timeout;
        let remaining: Duration = self.flush(timeout);
        let mut usage: EngineUsage = EngineUsage::default();
        for table in self.entities.iter_mut() {
            for entity in table.drain(..).flatten() {
                let engine: EngineType = entity.engine();
                usage.add(engine, entity.destroy());
            }
        }
        self.usage.lock().merge(&usage);

        let released: Result<(), Fail> = self.device.pstate().release_if_owner(self.serial);
        debug!("teardown(): id={:?}, serial={:?}", self.id, self.serial);

        // A zero budget asks for no drain at all.
        if !timeout.is_zero() && remaining.is_zero() {
            if let Err(e) = released {
                error!("teardown(): failed to release stable power state (id={:?}, error={:?})", self.id, e);
            }
            let cause: String = format!("timed out draining entities (id={:?}, timeout={:?})", self.id, timeout);
            warn!("teardown(): {}", cause);
            return Err(Fail::new(libc::ETIMEDOUT, &cause));
        }
        released
    }

    fn destroy_entities(entities: &mut EntityTable) {
        for table in entities.iter_mut() {
            for entity in table.drain(..).flatten() {
                entity.destroy();
            }
        }
    }

    fn effective(init_priority: Priority, override_priority: Priority) -> Priority {
        if override_priority.is_set() {
            override_priority
        } else {
            init_priority
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        match self.teardown() {
            Ok(()) => (),
            Err(e) if e.is_timeout() => warn!("drop(): entities were not drained (id={:?})", self.id),
            Err(e) => error!("drop(): teardown failed (id={:?}, error={:?})", self.id, e),
        }
    }
}
