// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Device description and the collaborators that the context manager consumes: the hardware scheduler back end,
//! reset and error telemetry, and power management.

pub mod topology;

//======================================================================================================================
// Imports
//======================================================================================================================

use self::topology::{
    EngineTopology,
    SchedulerId,
};
use crate::{
    context::pstate::PowerStateArbiter,
    runtime::{
        fail::Fail,
        limits::{
            DEFAULT_FLUSH_TIMEOUT,
            DEFAULT_JOB_QUEUE_DEPTH,
        },
        types::{
            PerformanceLevel,
            Priority,
        },
    },
};
use ::std::{
    any::Any,
    sync::{
        atomic::AtomicBool,
        Arc,
    },
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Opaque unit of device work. Its contents are only understood by the scheduler back end.
pub type Job = Box<dyn Any + Send>;

/// Shared reference to a completion handle. The ledger and the back end both hold one.
pub type CompletionRef = Arc<dyn CompletionHandle>;

/// Snapshot of the device-wide RAS error counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RasCounts {
    /// Uncorrectable errors.
    pub ue: u64,
    /// Correctable errors.
    pub ce: u64,
}

/// Tunables that apply to every context of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Number of in-flight jobs tracked per entity. Power of two.
    pub job_queue_depth: usize,
    /// Budget for draining the entities of a context on teardown.
    pub flush_timeout: Duration,
    /// Group whose members may create contexts above the default priority.
    pub trusted_group: Option<u32>,
}

/// A device as seen by the context manager.
pub struct Device {
    options: DeviceOptions,
    topology: EngineTopology,
    backend: Arc<dyn SchedulerBackend>,
    telemetry: Arc<dyn DeviceTelemetry>,
    pstate: PowerStateArbiter,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Pending unit of device work that can be polled or waited on.
pub trait CompletionHandle: Send + Sync {
    /// Has the work completed?
    fn is_signaled(&self) -> bool;

    /// Blocks until the work completes. Fails with `ETIMEDOUT` when `timeout` elapses first, `EINTR` when an
    /// interruptible wait is interrupted and `EIO` when the device reported an error for this work.
    fn wait(&self, interruptible: bool, timeout: Option<Duration>) -> Result<(), Fail>;

    /// Time the work spent executing on the device so far.
    fn busy_time(&self) -> Duration {
        Duration::ZERO
    }
}

/// Logical queue created by the scheduler back end on behalf of an entity.
pub trait BackendEntity: Send + Sync {
    /// Queues a job and returns the handle that signals its completion.
    fn push_job(&self, job: Job) -> Result<CompletionRef, Fail>;

    /// Changes the priority at which the queued jobs are arbitrated.
    fn set_priority(&self, priority: Priority);

    /// Replaces the set of back ends that jobs may be dispatched to.
    fn modify_schedulers(&self, schedulers: &[SchedulerId]);

    /// Waits for outstanding work for at most `timeout` and returns the unused part of the budget.
    fn flush(&self, timeout: Duration) -> Duration;

    /// Tears the queue down, dropping any work still queued.
    fn destroy(self: Box<Self>);
}

/// Hardware scheduler back end.
pub trait SchedulerBackend: Send + Sync {
    /// Creates a logical queue dispatching to `schedulers` at `priority`. The back end raises `guilty` when a job of
    /// this queue is found responsible for a hang.
    fn entity_init(
        &self,
        schedulers: &[SchedulerId],
        priority: Priority,
        guilty: Arc<AtomicBool>,
    ) -> Result<Box<dyn BackendEntity>, Fail>;
}

/// Device-wide counters maintained by the recovery logic. Read only.
pub trait DeviceTelemetry: Send + Sync {
    /// Number of resets the device went through.
    fn gpu_reset_counter(&self) -> u32;

    /// Number of times device memory contents were lost.
    fn vram_lost_counter(&self) -> u32;

    /// RAS error counters, if the device supports RAS.
    fn ras_error_counts(&self) -> Option<RasCounts>;

    /// Is a reset running right now?
    fn in_reset(&self) -> bool {
        false
    }
}

/// Device power management.
pub trait PowerControl: Send + Sync {
    /// Currently forced performance level.
    fn performance_level(&self) -> PerformanceLevel;

    /// Forces a performance level.
    fn force_performance_level(&self, level: PerformanceLevel) -> Result<(), Fail>;
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Device {
    /// Creates a device.
    pub fn new(
        options: DeviceOptions,
        topology: EngineTopology,
        backend: Arc<dyn SchedulerBackend>,
        telemetry: Arc<dyn DeviceTelemetry>,
        power: Arc<dyn PowerControl>,
    ) -> Result<Self, Fail> {
        if !options.job_queue_depth.is_power_of_two() {
            let cause: String = format!(
                "job queue depth must be a power of two (depth={:?})",
                options.job_queue_depth
            );
            error!("new(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }

        Ok(Self {
            options,
            topology,
            backend,
            telemetry,
            pstate: PowerStateArbiter::new(power),
        })
    }

    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    pub fn topology(&self) -> &EngineTopology {
        &self.topology
    }

    pub fn backend(&self) -> &dyn SchedulerBackend {
        self.backend.as_ref()
    }

    pub fn telemetry(&self) -> &dyn DeviceTelemetry {
        self.telemetry.as_ref()
    }

    /// Stable power state lock shared by every context of this device.
    pub fn pstate(&self) -> &PowerStateArbiter {
        &self.pstate
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            job_queue_depth: DEFAULT_JOB_QUEUE_DEPTH,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            trusted_group: None,
        }
    }
}
