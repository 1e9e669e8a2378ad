// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Rules that pick the scheduler back ends an entity binds to, and the ring routing that goes with them.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    device::topology::{
        EngineTopology,
        RingDesc,
        SchedulerId,
    },
    types::{
        EngineType,
        HwPriority,
        Priority,
        ENGINE_TYPE_COUNT,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// How the entities of an engine type are bound to physical queues.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum BindMode {
    /// One queue per entity, unless mid-command-buffer preemption regroups the queues in priority buckets.
    Preemptible,
    /// Entities spread over a pool of equivalent queues, minus the ACE tunnel queue when it is reserved.
    FanOut,
    /// One queue per entity.
    Dedicated,
}

//======================================================================================================================
// Constants
//======================================================================================================================

/// Binding mode of each engine type, indexed by [EngineType::index].
const POLICY: [BindMode; ENGINE_TYPE_COUNT] = [
    BindMode::Preemptible, // gfx
    BindMode::FanOut,      // compute
    BindMode::Dedicated,   // dma
    BindMode::Dedicated,   // uvd
    BindMode::Dedicated,   // vce
    BindMode::Dedicated,   // uvd_enc
    BindMode::Dedicated,   // vcn_dec
    BindMode::Dedicated,   // vcn_enc
    BindMode::Dedicated,   // vcn_jpeg
    BindMode::Dedicated,   // vpe
];

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

pub fn mode(engine: EngineType) -> BindMode {
    POLICY[engine.index()]
}

/// Chooses the back ends that entity `ring` of `engine` binds to. `None` means the engine instance is not populated
/// and the entity slot stays empty. An empty list is a valid binding: the entity exists but cannot be scheduled
/// until its priority bucket gets queues.
pub fn bind(engine: EngineType, ring: usize, priority: Priority, topology: &EngineTopology) -> Option<Vec<SchedulerId>> {
    match mode(engine) {
        BindMode::Preemptible if topology.mcbp() => Some(bucket(engine, HwPriority::from(priority), topology)),
        BindMode::FanOut => fan_out(engine, ring, topology),
        _ => dedicated(engine, ring, topology),
    }
}

/// Checks whether entities of `engine` ignore the requested ring and always resolve to ring 0.
pub fn routes_to_ring_zero(engine: EngineType, topology: &EngineTopology) -> bool {
    mode(engine) == BindMode::Preemptible && topology.mcbp()
}

/// Checks whether a priority change must move the entities of `engine` to another set of queues.
pub fn reselects_on_priority(engine: EngineType, topology: &EngineTopology) -> bool {
    routes_to_ring_zero(engine, topology)
}

/// Entity index that is reserved for the ACE tunnel on `engine`, if any.
pub fn reserved_ring(engine: EngineType, topology: &EngineTopology) -> Option<usize> {
    if mode(engine) == BindMode::FanOut && topology.ace_tunnel().is_some() {
        Some(engine.num_entities() - 1)
    } else {
        None
    }
}

/// Every ready queue of `engine` serving the `hw_prio` bucket.
fn bucket(engine: EngineType, hw_prio: HwPriority, topology: &EngineTopology) -> Vec<SchedulerId> {
    topology
        .rings(engine)
        .iter()
        .filter(|ring| ring.ready && ring.hw_prio == hw_prio)
        .map(|ring| ring.id)
        .collect()
}

fn fan_out(engine: EngineType, ring: usize, topology: &EngineTopology) -> Option<Vec<SchedulerId>> {
    if topology.rings(engine).is_empty() {
        return None;
    }

    let tunnel: Option<&RingDesc> = topology.ace_tunnel();
    if let Some(ace) = tunnel {
        if Some(ring) == reserved_ring(engine, topology) {
            return if ace.ready { Some(vec![ace.id]) } else { None };
        }
    }

    Some(
        topology
            .rings(engine)
            .iter()
            .filter(|desc| desc.ready && Some(desc.id) != tunnel.map(|ace| ace.id))
            .map(|desc| desc.id)
            .collect(),
    )
}

fn dedicated(engine: EngineType, ring: usize, topology: &EngineTopology) -> Option<Vec<SchedulerId>> {
    topology
        .rings(engine)
        .get(ring)
        .filter(|desc| desc.ready)
        .map(|desc| vec![desc.id])
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
