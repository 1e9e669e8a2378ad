// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::fail::Fail;

//==============================================================================
// Structures
//==============================================================================

/// Stable Power State that a context may request.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Default)]
pub enum StablePowerState {
    /// No request: the device manages its own performance level.
    #[default]
    None,
    Standard,
    MinSclk,
    MinMclk,
    Peak,
}

/// Forced performance level, as reported and accepted by the device power management.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Default)]
pub enum PerformanceLevel {
    #[default]
    Auto,
    Low,
    High,
    Manual,
    ProfileStandard,
    ProfileMinSclk,
    ProfileMinMclk,
    ProfilePeak,
    ProfileExit,
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<StablePowerState> for u32 {
    fn from(value: StablePowerState) -> Self {
        match value {
            StablePowerState::None => 0,
            StablePowerState::Standard => 1,
            StablePowerState::MinSclk => 2,
            StablePowerState::MinMclk => 3,
            StablePowerState::Peak => 4,
        }
    }
}

impl TryFrom<u32> for StablePowerState {
    type Error = Fail;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StablePowerState::None),
            1 => Ok(StablePowerState::Standard),
            2 => Ok(StablePowerState::MinSclk),
            3 => Ok(StablePowerState::MinMclk),
            4 => Ok(StablePowerState::Peak),
            _ => {
                let cause: String = format!("invalid stable power state (state={:?})", value);
                error!("try_from(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }
}

impl From<StablePowerState> for PerformanceLevel {
    fn from(value: StablePowerState) -> Self {
        match value {
            StablePowerState::None => PerformanceLevel::Auto,
            StablePowerState::Standard => PerformanceLevel::ProfileStandard,
            StablePowerState::MinSclk => PerformanceLevel::ProfileMinSclk,
            StablePowerState::MinMclk => PerformanceLevel::ProfileMinMclk,
            StablePowerState::Peak => PerformanceLevel::ProfilePeak,
        }
    }
}

impl From<PerformanceLevel> for StablePowerState {
    /// Levels that are not profiling levels were not set through a stable power state request.
    fn from(value: PerformanceLevel) -> Self {
        match value {
            PerformanceLevel::ProfileStandard => StablePowerState::Standard,
            PerformanceLevel::ProfileMinSclk => StablePowerState::MinSclk,
            PerformanceLevel::ProfileMinMclk => StablePowerState::MinMclk,
            PerformanceLevel::ProfilePeak => StablePowerState::Peak,
            _ => StablePowerState::None,
        }
    }
}
