// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod config;
pub mod context;
pub mod runtime;

pub use self::{
    config::Config,
    context::{
        admission::{
            AdmissionPolicy,
            Requester,
        },
        manager::ContextManager,
        pstate::PowerStateArbiter,
        ExecutionContext,
    },
    runtime::{
        device::{
            topology::{
                EngineTopology,
                RingDesc,
                SchedulerId,
            },
            BackendEntity,
            CompletionHandle,
            CompletionRef,
            Device,
            DeviceOptions,
            DeviceTelemetry,
            Job,
            PowerControl,
            RasCounts,
            SchedulerBackend,
        },
        fail::Fail,
        types::{
            ContextId,
            ContextStateFlags,
            EngineType,
            EngineUsage,
            HwPriority,
            PerformanceLevel,
            Priority,
            ResetStatus,
            StablePowerState,
            LATEST_SEQUENCE,
        },
    },
};
