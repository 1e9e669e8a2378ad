// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::accelctx::Config;
use ::anyhow::Result;

//==============================================================================
// Constants
//==============================================================================

/// Group whose members may create elevated contexts on the test device.
pub const TRUSTED_GROUP: u32 = 27;

//==============================================================================
// Test
//==============================================================================

/// Configuration of the test device.
///
/// - gfx: one queue per hardware priority bucket.
/// - compute: four queues, the last one reserved for the ACE tunnel when enabled.
/// - dma: two queues, the second one not ready.
pub struct TestConfig(pub Config);

impl TestConfig {
    pub fn new(job_queue_depth: usize, mcbp: bool, ace_tunnel: bool) -> Result<Self> {
        Self::with_flush_timeout(job_queue_depth, mcbp, ace_tunnel, 100)
    }

    pub fn with_flush_timeout(
        job_queue_depth: usize,
        mcbp: bool,
        ace_tunnel: bool,
        flush_timeout_ms: u64,
    ) -> Result<Self> {
        let config_s: String = format!(
            r#"
accelctx:
  job_queue_depth: {}
  flush_timeout_ms: {}
  trusted_group: {}
device:
  mcbp: {}
  ace_tunnel: {}
  rings:
    gfx:
      - name: gfx_0.0.0
        hw_prio: normal
      - name: gfx_0.1.0
        hw_prio: high
    compute:
      - name: comp_1.0.0
      - name: comp_1.1.0
      - name: comp_1.2.0
      - name: comp_1.3.0
    dma:
      - name: sdma0
      - name: sdma1
        ready: false
"#,
            job_queue_depth, flush_timeout_ms, TRUSTED_GROUP, mcbp, ace_tunnel
        );
        match config_s.parse::<Config>() {
            Ok(config) => Ok(Self(config)),
            Err(e) => anyhow::bail!("failed to parse test configuration: {:?}", e),
        }
    }
}
