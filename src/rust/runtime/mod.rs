// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod device;
pub mod fail;
pub mod limits;
pub mod logging;
pub mod types;
