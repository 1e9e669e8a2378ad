// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod ctxid;
mod engine;
mod priority;
mod pstate;
mod query;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    ctxid::ContextId,
    engine::{
        EngineType,
        EngineUsage,
        ENGINE_TYPE_COUNT,
    },
    priority::{
        HwPriority,
        Priority,
    },
    pstate::{
        PerformanceLevel,
        StablePowerState,
    },
    query::{
        ContextStateFlags,
        ResetStatus,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Sequence number that designates the most recent submission of an entity.
pub const LATEST_SEQUENCE: u64 = u64::MAX;
