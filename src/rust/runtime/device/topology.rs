// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    types::{
        EngineType,
        HwPriority,
        ENGINE_TYPE_COUNT,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Identifies one hardware scheduler back end (a physical queue) of the device.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct SchedulerId(u32);

/// Description of a physical queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingDesc {
    /// Back end that drives this queue.
    pub id: SchedulerId,
    /// Name of the queue, for logging.
    pub name: String,
    /// Priority bucket the queue serves when mid-command-buffer preemption regroups queues.
    pub hw_prio: HwPriority,
    /// Is the queue populated and usable?
    pub ready: bool,
}

/// Physical queues of a device, grouped by engine type, along with the device-wide routing switches.
#[derive(Debug, Clone, Default)]
pub struct EngineTopology {
    rings: [Vec<RingDesc>; ENGINE_TYPE_COUNT],
    /// Mid-command-buffer preemption.
    mcbp: bool,
    /// Is the last compute queue reserved for the ACE tunnel?
    ace_tunnel: bool,
    next_id: u32,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl EngineTopology {
    /// Appends a physical queue to `engine` and returns the identifier of its back end.
    pub fn add_ring(&mut self, engine: EngineType, name: &str, hw_prio: HwPriority, ready: bool) -> SchedulerId {
        let id: SchedulerId = SchedulerId(self.next_id);
        self.next_id += 1;
        self.rings[engine.index()].push(RingDesc {
            id,
            name: name.to_string(),
            hw_prio,
            ready,
        });
        id
    }

    /// Enables or disables mid-command-buffer preemption.
    pub fn set_mcbp(&mut self, enabled: bool) {
        self.mcbp = enabled;
    }

    /// Enables or disables the ACE tunnel. The tunnel takes the last compute queue away from the shared pool, so
    /// at least two compute queues must be present.
    pub fn set_ace_tunnel(&mut self, enabled: bool) -> Result<(), Fail> {
        if enabled && self.rings(EngineType::Compute).len() < 2 {
            let cause: String = format!(
                "ace tunnel requires at least two compute queues (found={:?})",
                self.rings(EngineType::Compute).len()
            );
            error!("set_ace_tunnel(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        self.ace_tunnel = enabled;
        Ok(())
    }

    /// Physical queues of `engine`.
    pub fn rings(&self, engine: EngineType) -> &[RingDesc] {
        &self.rings[engine.index()]
    }

    /// Is mid-command-buffer preemption enabled?
    pub fn mcbp(&self) -> bool {
        self.mcbp
    }

    /// Compute queue that is dedicated to the ACE tunnel, if any.
    pub fn ace_tunnel(&self) -> Option<&RingDesc> {
        if self.ace_tunnel {
            self.rings(EngineType::Compute).last()
        } else {
            None
        }
    }

    /// Looks up a physical queue by back end identifier.
    pub fn ring(&self, id: SchedulerId) -> Option<&RingDesc> {
        self.rings.iter().flatten().find(|ring| ring.id == id)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<SchedulerId> for u32 {
    fn from(val: SchedulerId) -> Self {
        val.0
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
