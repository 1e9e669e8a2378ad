// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::fail::Fail;

//==============================================================================
// Structures
//==============================================================================

/// Context Priority
///
/// Variants are declared in ascending order. [Priority::Unset] is only meaningful as an override value and means
/// "fall back to the priority the context was created with".
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub enum Priority {
    Unset,
    Low,
    Normal,
    High,
    HighHw,
}

/// Hardware Queue Priority Bucket
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Default)]
pub enum HwPriority {
    #[default]
    Normal,
    High,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Priority {
    /// Priority that every unprivileged requester is allowed to use.
    pub const DEFAULT: Priority = Priority::Normal;

    /// Checks whether this priority requires elevated permissions.
    pub fn is_elevated(self) -> bool {
        self > Self::DEFAULT
    }

    /// Checks whether this is a real priority level, as opposed to the override marker.
    pub fn is_set(self) -> bool {
        self != Priority::Unset
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<Priority> for i32 {
    fn from(value: Priority) -> Self {
        match value {
            Priority::Unset => -2048,
            Priority::Low => -512,
            Priority::Normal => 0,
            Priority::High => 512,
            Priority::HighHw => 1023,
        }
    }
}

impl TryFrom<i32> for Priority {
    type Error = Fail;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -2048 => Ok(Priority::Unset),
            -512 => Ok(Priority::Low),
            0 => Ok(Priority::Normal),
            512 => Ok(Priority::High),
            1023 => Ok(Priority::HighHw),
            _ => {
                let cause: String = format!("invalid priority (priority={:?})", value);
                error!("try_from(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }
}

impl From<Priority> for HwPriority {
    /// Maps a context priority to the hardware queue bucket it is served from.
    fn from(value: Priority) -> Self {
        if value.is_elevated() {
            HwPriority::High
        } else {
            HwPriority::Normal
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
