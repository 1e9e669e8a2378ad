// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Structures
//==============================================================================

/// Execution Context Identifier
///
/// Identifiers are small positive integers, unique within one context manager while the context is live. Zero is
/// never handed out.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct ContextId(u32);

//==============================================================================
// Associate Functions
//==============================================================================

impl ContextId {
    /// Builds the identifier that corresponds to a slot of the context table.
    pub(crate) fn from_slot(slot: usize) -> Self {
        ContextId((slot + 1) as u32)
    }

    /// Returns the slot of the context table that backs this identifier, if any.
    pub(crate) fn slot(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<ContextId> for u32 {
    /// Converts a [ContextId] to a [u32].
    fn from(val: ContextId) -> Self {
        val.0
    }
}

impl From<u32> for ContextId {
    /// Converts a [u32] to a [ContextId].
    fn from(val: u32) -> Self {
        ContextId(val)
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
