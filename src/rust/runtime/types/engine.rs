// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::fail::Fail;
use ::std::{
    fmt,
    ops::Index,
    str::FromStr,
    time::Duration,
};

//==============================================================================
// Constants
//==============================================================================

/// Number of hardware engine types.
pub const ENGINE_TYPE_COUNT: usize = 10;

//==============================================================================
// Structures
//==============================================================================

/// Hardware Engine Types
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
#[repr(u32)]
pub enum EngineType {
    Gfx = 0,
    Compute = 1,
    Dma = 2,
    Uvd = 3,
    Vce = 4,
    UvdEnc = 5,
    VcnDec = 6,
    VcnEnc = 7,
    VcnJpeg = 8,
    Vpe = 9,
}

/// Busy time accumulated per engine type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineUsage([Duration; ENGINE_TYPE_COUNT]);

//==============================================================================
// Associate Functions
//==============================================================================

impl EngineType {
    /// All engine types, in identifier order.
    pub const ALL: [EngineType; ENGINE_TYPE_COUNT] = [
        EngineType::Gfx,
        EngineType::Compute,
        EngineType::Dma,
        EngineType::Uvd,
        EngineType::Vce,
        EngineType::UvdEnc,
        EngineType::VcnDec,
        EngineType::VcnEnc,
        EngineType::VcnJpeg,
        EngineType::Vpe,
    ];

    /// Number of entities that a context exposes for this engine type.
    pub const fn num_entities(self) -> usize {
        match self {
            EngineType::Compute => 4,
            EngineType::Dma => 2,
            _ => 1,
        }
    }

    /// Position of this engine type in per-engine tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Name used for this engine type in configuration files and logs.
    pub const fn name(self) -> &'static str {
        match self {
            EngineType::Gfx => "gfx",
            EngineType::Compute => "compute",
            EngineType::Dma => "dma",
            EngineType::Uvd => "uvd",
            EngineType::Vce => "vce",
            EngineType::UvdEnc => "uvd_enc",
            EngineType::VcnDec => "vcn_dec",
            EngineType::VcnEnc => "vcn_enc",
            EngineType::VcnJpeg => "vcn_jpeg",
            EngineType::Vpe => "vpe",
        }
    }
}

impl EngineUsage {
    /// Accounts `elapsed` busy time to `engine`.
    pub fn add(&mut self, engine: EngineType, elapsed: Duration) {
        self.0[engine.index()] += elapsed;
    }

    /// Folds another usage record into this one.
    pub fn merge(&mut self, other: &EngineUsage) {
        for engine in EngineType::ALL {
            self.add(engine, other[engine]);
        }
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<EngineType> for u32 {
    fn from(value: EngineType) -> Self {
        value as u32
    }
}

impl TryFrom<u32> for EngineType {
    type Error = Fail;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match EngineType::ALL.get(value as usize) {
            Some(engine) => Ok(*engine),
            None => {
                let cause: String = format!("unknown engine type (engine={:?})", value);
                error!("try_from(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }
}

impl FromStr for EngineType {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match EngineType::ALL.iter().find(|engine| engine.name() == s) {
            Some(engine) => Ok(*engine),
            None => {
                let cause: String = format!("unknown engine name (name={:?})", s);
                error!("from_str(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Index<EngineType> for EngineUsage {
    type Output = Duration;

    fn index(&self, engine: EngineType) -> &Duration {
        &self.0[engine.index()]
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
