//! Wait and retry parameters used by the strategies

use std::time::Duration;

/// Timing knobs for health gating and settling.
///
/// Defaults are the production values; tests shrink them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Simple strategy: wait after reload before probing
    pub startup_grace: Duration,
    /// Attempts of the multi-retry probe
    pub probe_retries: u32,
    /// Sleep between failed attempts of the multi-retry probe
    pub probe_delay: Duration,
    /// Per-request timeout for health probes
    pub probe_timeout: Duration,
    /// Blue-green: wait after starting the target slot
    pub slot_grace: Duration,
    /// Blue-green: number of single-shot probes that must all pass
    pub slot_probe_count: u32,
    /// Blue-green: spacing between single-shot probes
    pub slot_probe_spacing: Duration,
    /// Per-request timeout for HTTP smoke tests
    pub smoke_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(10),
            probe_retries: 3,
            probe_delay: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(10),
            slot_grace: Duration::from_secs(10),
            slot_probe_count: 5,
            slot_probe_spacing: Duration::from_secs(2),
            smoke_timeout: Duration::from_secs(10),
        }
    }
}

impl Timings {
    /// All waits zeroed, for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            startup_grace: Duration::ZERO,
            probe_delay: Duration::ZERO,
            slot_grace: Duration::ZERO,
            slot_probe_spacing: Duration::ZERO,
            ..Self::default()
        }
    }
}
