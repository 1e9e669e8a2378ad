// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::{
    FlexiLoggerError,
    Logger,
    LoggerHandle,
};
use ::std::{
    mem,
    sync::Once,
};

//==============================================================================
// Constants
//==============================================================================

/// Log specification used when `RUST_LOG` is not set.
const DEFAULT_LOG_SPEC: &str = "info";

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features. The log specification is read from the `RUST_LOG` environment variable.
pub fn initialize() {
    INIT_LOG.call_once(|| match start_logger() {
        // The logger stops when its handle is dropped.
        Ok(handle) => mem::forget(handle),
        Err(e) => eprintln!("initialize(): failed to start logger ({:?})", e),
    });
}

fn start_logger() -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_env_or_str(DEFAULT_LOG_SPEC)?.start()
}
