// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::bitflags::bitflags;

//==============================================================================
// Structures
//==============================================================================

/// Answer to "did a reset happen since the last time I asked".
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ResetStatus {
    NoReset,
    UnknownReset,
}

bitflags! {
    /// Context state reported by the second query entry point.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextStateFlags: u32 {
        /// A reset happened since the context was created.
        const RESET = 1 << 0;
        /// Device memory was lost since the context was created.
        const VRAM_LOST = 1 << 1;
        /// The context was found responsible for a hang.
        const GUILTY = 1 << 2;
        /// New correctable errors since the last query.
        const RAS_CE = 1 << 3;
        /// New uncorrectable errors since the last query.
        const RAS_UE = 1 << 4;
        /// The device is being reset right now.
        const RESET_IN_PROGRESS = 1 << 5;
    }
}
