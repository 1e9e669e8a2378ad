// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::accelctx::{
    BackendEntity,
    CompletionHandle,
    CompletionRef,
    DeviceTelemetry,
    Fail,
    Job,
    PerformanceLevel,
    PowerControl,
    Priority,
    RasCounts,
    SchedulerBackend,
    SchedulerId,
};
use ::parking_lot::{
    Condvar,
    Mutex,
};
use ::std::{
    sync::{
        atomic::{
            AtomicBool,
            AtomicU32,
            AtomicU64,
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Pending,
    Signaled,
    Faulted,
}

/// Software Fence
pub struct SoftFence {
    state: Mutex<FenceState>,
    cond: Condvar,
    busy: Duration,
}

/// State of a logical queue created by [SoftBackend], visible to tests.
pub struct SoftEntityState {
    pub schedulers: Mutex<Vec<SchedulerId>>,
    pub priority: Mutex<Priority>,
    pub guilty: Arc<AtomicBool>,
    pub destroyed: AtomicBool,
}

struct SoftEntity {
    state: Arc<SoftEntityState>,
    backend: Arc<SoftBackendState>,
}

#[derive(Default)]
struct SoftBackendState {
    entities: Mutex<Vec<Arc<SoftEntityState>>>,
    fences: Mutex<Vec<Arc<SoftFence>>>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    fail_at: Mutex<Option<usize>>,
    hang: AtomicBool,
    flush_cost: Mutex<Duration>,
    on_create: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// Software Scheduler Back End
///
/// Jobs never complete on their own: tests signal fences explicitly, or flush the entity.
#[derive(Default)]
pub struct SoftBackend(Arc<SoftBackendState>);

/// Software Telemetry
#[derive(Default)]
pub struct SoftTelemetry {
    resets: AtomicU32,
    vram_lost: AtomicU32,
    ras_ue: AtomicU64,
    ras_ce: AtomicU64,
    no_ras: AtomicBool,
    in_reset: AtomicBool,
}

/// Software Power Management
#[derive(Default)]
pub struct SoftPower {
    level: Mutex<PerformanceLevel>,
    forced: AtomicUsize,
    broken: AtomicBool,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SoftFence {
    pub fn new(busy: Duration) -> Self {
        Self {
            state: Mutex::new(FenceState::Pending),
            cond: Condvar::new(),
            busy,
        }
    }

    pub fn signal(&self) {
        self.complete(FenceState::Signaled);
    }

    /// Completes the fence with a device error.
    pub fn fault(&self) {
        self.complete(FenceState::Faulted);
    }

    fn complete(&self, state: FenceState) {
        let mut current = self.state.lock();
        if *current == FenceState::Pending {
            *current = state;
        }
        self.cond.notify_all();
    }
}

impl SoftBackend {
    /// Makes entity creation number `nth` (counting from zero, across the lifetime of the back end) fail.
    pub fn fail_at(&self, nth: Option<usize>) {
        *self.0.fail_at.lock() = nth;
    }

    /// Makes flushes use up their whole budget.
    pub fn hang(&self, hang: bool) {
        self.0.hang.store(hang, Ordering::Release);
    }

    /// Makes every entity flush use up `cost` of its budget.
    pub fn flush_cost(&self, cost: Duration) {
        *self.0.flush_cost.lock() = cost;
    }

    /// Runs `hook` once, when the next entity is about to be created.
    pub fn on_create(&self, hook: Box<dyn FnOnce() + Send>) {
        *self.0.on_create.lock() = Some(hook);
    }

    /// Every entity created so far, in creation order.
    pub fn entities(&self) -> Vec<Arc<SoftEntityState>> {
        self.0.entities.lock().clone()
    }

    /// Every fence handed out so far, in submission order.
    pub fn fences(&self) -> Vec<Arc<SoftFence>> {
        self.0.fences.lock().clone()
    }

    pub fn signal_all(&self) {
        for fence in self.fences() {
            fence.signal();
        }
    }

    pub fn created(&self) -> usize {
        self.0.created.load(Ordering::Acquire)
    }

    pub fn destroyed(&self) -> usize {
        self.0.destroyed.load(Ordering::Acquire)
    }

    /// Number of entities that were created and not destroyed yet.
    pub fn live(&self) -> usize {
        self.created() - self.destroyed()
    }
}

impl SoftTelemetry {
    pub fn reset(&self) {
        self.resets.fetch_add(1, Ordering::AcqRel);
    }

    pub fn lose_vram(&self) {
        self.vram_lost.fetch_add(1, Ordering::AcqRel);
    }

    pub fn ras_error(&self, ue: u64, ce: u64) {
        self.ras_ue.fetch_add(ue, Ordering::AcqRel);
        self.ras_ce.fetch_add(ce, Ordering::AcqRel);
    }

    pub fn disable_ras(&self) {
        self.no_ras.store(true, Ordering::Release);
    }

    pub fn set_in_reset(&self, in_reset: bool) {
        self.in_reset.store(in_reset, Ordering::Release);
    }
}

impl SoftPower {
    /// Number of times the performance level was forced.
    pub fn forced(&self) -> usize {
        self.forced.load(Ordering::Acquire)
    }

    /// Makes forcing a performance level fail.
    pub fn break_down(&self, broken: bool) {
        self.broken.store(broken, Ordering::Release);
    }

    /// Changes the performance level behind the back of the context manager.
    pub fn set_level(&self, level: PerformanceLevel) {
        *self.level.lock() = level;
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl CompletionHandle for SoftFence {
    fn is_signaled(&self) -> bool {
        *self.state.lock() != FenceState::Pending
    }

    fn wait(&self, _interruptible: bool, timeout: Option<Duration>) -> Result<(), Fail> {
        let deadline: Option<Instant> = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.state.lock();
        while *state == FenceState::Pending {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() && *state == FenceState::Pending {
                        return Err(Fail::new(libc::ETIMEDOUT, "fence wait timed out"));
                    }
                },
                None => self.cond.wait(&mut state),
            }
        }
        match *state {
            FenceState::Faulted => Err(Fail::new(libc::EIO, "job failed on the device")),
            _ => Ok(()),
        }
    }

    fn busy_time(&self) -> Duration {
        self.busy
    }
}

impl BackendEntity for SoftEntity {
    /// A job that carries a [Duration] reports it as its busy time.
    fn push_job(&self, job: Job) -> Result<CompletionRef, Fail> {
        let busy: Duration = match job.downcast::<Duration>() {
            Ok(busy) => *busy,
            Err(_) => Duration::ZERO,
        };
        let fence: Arc<SoftFence> = Arc::new(SoftFence::new(busy));
        self.backend.fences.lock().push(fence.clone());
        Ok(fence)
    }

    fn set_priority(&self, priority: Priority) {
        *self.state.priority.lock() = priority;
    }

    fn modify_schedulers(&self, schedulers: &[SchedulerId]) {
        *self.state.schedulers.lock() = schedulers.to_vec();
    }

    fn flush(&self, timeout: Duration) -> Duration {
        if self.backend.hang.load(Ordering::Acquire) {
            return Duration::ZERO;
        }
        for fence in self.backend.fences.lock().iter() {
            fence.signal();
        }
        timeout.saturating_sub(*self.backend.flush_cost.lock())
    }

    fn destroy(self: Box<Self>) {
        self.state.destroyed.store(true, Ordering::Release);
        self.backend.destroyed.fetch_add(1, Ordering::AcqRel);
    }
}

impl SchedulerBackend for SoftBackend {
    fn entity_init(
        &self,
        schedulers: &[SchedulerId],
        priority: Priority,
        guilty: Arc<AtomicBool>,
    ) -> Result<Box<dyn BackendEntity>, Fail> {
        let hook: Option<Box<dyn FnOnce() + Send>> = self.0.on_create.lock().take();
        if let Some(hook) = hook {
            hook();
        }

        let nth: usize = self.0.created.load(Ordering::Acquire);
        if *self.0.fail_at.lock() == Some(nth) {
            *self.0.fail_at.lock() = None;
            return Err(Fail::new(libc::ENOMEM, "out of entities"));
        }
        self.0.created.fetch_add(1, Ordering::AcqRel);

        let state: Arc<SoftEntityState> = Arc::new(SoftEntityState {
            schedulers: Mutex::new(schedulers.to_vec()),
            priority: Mutex::new(priority),
            guilty,
            destroyed: AtomicBool::new(false),
        });
        self.0.entities.lock().push(state.clone());
        Ok(Box::new(SoftEntity {
            state,
            backend: self.0.clone(),
        }))
    }
}

impl DeviceTelemetry for SoftTelemetry {
    fn gpu_reset_counter(&self) -> u32 {
        self.resets.load(Ordering::Acquire)
    }

    fn vram_lost_counter(&self) -> u32 {
        self.vram_lost.load(Ordering::Acquire)
    }

    fn ras_error_counts(&self) -> Option<RasCounts> {
        if self.no_ras.load(Ordering::Acquire) {
            return None;
        }
        Some(RasCounts {
            ue: self.ras_ue.load(Ordering::Acquire),
            ce: self.ras_ce.load(Ordering::Acquire),
        })
    }

    fn in_reset(&self) -> bool {
        self.in_reset.load(Ordering::Acquire)
    }
}

impl PowerControl for SoftPower {
    fn performance_level(&self) -> PerformanceLevel {
        *self.level.lock()
    }

    fn force_performance_level(&self, level: PerformanceLevel) -> Result<(), Fail> {
        if self.broken.load(Ordering::Acquire) {
            return Err(Fail::new(libc::EIO, "power management is unavailable"));
        }
        self.forced.fetch_add(1, Ordering::AcqRel);
        *self.level.lock() = level;
        Ok(())
    }
}
