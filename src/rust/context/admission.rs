// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    types::Priority,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Principal on whose behalf a context is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    /// Groups the principal belongs to.
    pub groups: Vec<u32>,
    /// Does the connection hold exclusive control of the device?
    pub is_master: bool,
}

/// Decides which requesters may create contexts above the default priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionPolicy {
    trusted_group: Option<u32>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Requester {
    /// Unprivileged requester that belongs to `groups`.
    pub fn new(groups: &[u32]) -> Self {
        Self {
            groups: groups.to_vec(),
            is_master: false,
        }
    }

    /// Requester that holds exclusive control of the device.
    pub fn master() -> Self {
        Self {
            groups: Vec::new(),
            is_master: true,
        }
    }
}

impl AdmissionPolicy {
    pub fn new(trusted_group: Option<u32>) -> Self {
        Self { trusted_group }
    }

    /// Checks whether `requester` may create a context at `priority`.
    pub fn check(&self, priority: Priority, requester: &Requester) -> Result<(), Fail> {
        if !priority.is_elevated() {
            return Ok(());
        }

        let trusted: bool = match self.trusted_group {
            Some(group) => requester.groups.contains(&group),
            None => false,
        };
        if trusted || requester.is_master {
            return Ok(());
        }

        let cause: String = format!("priority requires a trusted or master requester (priority={:?})", priority);
        error!("check(): {}", cause);
        Err(Fail::new(libc::EACCES, &cause))
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
