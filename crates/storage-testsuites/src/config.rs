use anyhow::{Context, Result};
use std::time::Duration;

const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

/// File size used by the concurrent read scenario in short mode.
const SHORT_CONCURRENT_READ_SIZE: u64 = 10 * MIB;
/// Number of parallel writers in short mode.
const SHORT_CONCURRENT_WRITERS: usize = 8;

/// Knobs for the conformance suite.
///
/// Defaults match what a remote backend needs. Every field can be overridden with an environment
/// variable prefixed with `DRIVER_SUITE_`, for example `DRIVER_SUITE_SHORT=true`.
#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Skips the long running scenarios and shrinks the concurrent ones.
    pub short: bool,
    /// Seed for generated paths and content, random when unset.
    pub seed: Option<u64>,
    pub large_stream_size: u64,
    pub concurrent_read_size: u64,
    pub concurrent_readers: usize,
    /// Each writer writes this many MiB, as well.
    pub concurrent_writers: usize,
    pub eventual_consistency_iterations: usize,
    pub scenario_timeout_secs: u64,
    /// Wait before overwriting a file to check that its modification time moves forward.
    pub stat_modtime_delay_ms: u64,
    /// Wait for changes to propagate on eventually consistent backends.
    pub propagation_delay_ms: u64,
}

impl Default for SuiteConfig {
    fn default() -> SuiteConfig {
        SuiteConfig {
            short: false,
            seed: None,
            large_stream_size: 5 * GIB,
            concurrent_read_size: 128 * MIB,
            concurrent_readers: 10,
            concurrent_writers: 32,
            eventual_consistency_iterations: 1024,
            scenario_timeout_secs: 30 * 60,
            stat_modtime_delay_ms: 10_000,
            propagation_delay_ms: 5_000,
        }
    }
}

impl SuiteConfig {
    /// Reads the config from `DRIVER_SUITE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<SuiteConfig> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("DRIVER_SUITE"))
            .build()
            .context("reading suite config")?;

        config
            .try_deserialize()
            .context("deserializing suite config")
    }

    pub fn concurrent_read_size(&self) -> u64 {
        if self.short {
            self.concurrent_read_size.min(SHORT_CONCURRENT_READ_SIZE)
        } else {
            self.concurrent_read_size
        }
    }

    pub fn concurrent_writers(&self) -> usize {
        if self.short {
            self.concurrent_writers.min(SHORT_CONCURRENT_WRITERS)
        } else {
            self.concurrent_writers
        }
    }

    /// Size of the file written by each concurrent writer.
    pub fn concurrent_write_size(&self) -> u64 {
        self.concurrent_writers() as u64 * MIB
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }

    pub fn stat_modtime_delay(&self) -> Duration {
        Duration::from_millis(self.stat_modtime_delay_ms)
    }

    pub fn propagation_delay(&self) -> Duration {
        Duration::from_millis(self.propagation_delay_ms)
    }
}
