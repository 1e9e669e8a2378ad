// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::std::time::Duration;

/// Upper bound (exclusive) for context identifiers. Identifiers are drawn from `[1, MAX_CONTEXTS)`.
pub const MAX_CONTEXTS: usize = 4096;

/// Largest number of entities that a single engine type exposes to a context.
pub const MAX_ENTITIES_PER_ENGINE: usize = 4;

/// Default number of in-flight jobs tracked per entity. Must be a power of two.
pub const DEFAULT_JOB_QUEUE_DEPTH: usize = 32;

/// Default budget for draining the entities of a context that is being destroyed.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_millis(1000);
