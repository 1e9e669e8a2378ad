// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    device::PowerControl,
    fail::Fail,
    types::{
        PerformanceLevel,
        StablePowerState,
    },
};
use ::parking_lot::Mutex;
use ::std::sync::Arc;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Device-wide lock over the stable power state. At most one context at a time may hold a request other than
/// [StablePowerState::None]. Owners are identified by the process-unique serial of their context.
pub struct PowerStateArbiter {
    power: Arc<dyn PowerControl>,
    /// Serial of the context holding the request. Guards the device call as well.
    owner: Mutex<Option<u64>>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl PowerStateArbiter {
    pub fn new(power: Arc<dyn PowerControl>) -> Self {
        Self {
            power,
            owner: Mutex::new(None),
        }
    }

    /// Requests `state` on behalf of `owner`.
    pub fn set(&self, owner: u64, state: StablePowerState) -> Result<(), Fail> {
        let mut current_owner = self.owner.lock();

        if let Some(holder) = *current_owner {
            if holder != owner {
                let cause: String = format!("stable power state is held by another context (holder={:?})", holder);
                error!("set(): {}", cause);
                return Err(Fail::new(libc::EBUSY, &cause));
            }
        }

        // The device is left alone when it already runs at the requested level, but ownership is still updated.
        let level: PerformanceLevel = state.into();
        if self.get() != state {
            if let Err(e) = self.power.force_performance_level(level) {
                error!("set(): failed to force performance level (level={:?}, error={:?})", level, e);
                return Err(e);
            }
        }

        *current_owner = match state {
            StablePowerState::None => None,
            _ => Some(owner),
        };
        debug!("set(): owner={:?}, state={:?}", *current_owner, state);
        Ok(())
    }

    /// Returns the stable power state that the device currently runs at. Ownership is not required.
    pub fn get(&self) -> StablePowerState {
        self.power.performance_level().into()
    }

    /// Drops the request held by `owner`, if it holds one.
    pub fn release_if_owner(&self, owner: u64) -> Result<(), Fail> {
        if self.owner() != Some(owner) {
            return Ok(());
        }
        self.set(owner, StablePowerState::None)
    }

    /// Serial of the context holding the request, if any.
    pub fn owner(&self) -> Option<u64> {
        *self.owner.lock()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
