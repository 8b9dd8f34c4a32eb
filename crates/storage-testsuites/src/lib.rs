//! Conformance and benchmark suites for [`storage_driver`] implementations.
//!
//! A driver crate registers the suite from one of its integration tests:
//!
//! ```ignore
//! storage_testsuites::driver_suite!(
//!     conformance,
//!     storage_testsuites::DriverSuite::new(|| async { Ok(my_driver::new()) })
//! );
//! ```
//!
//! which creates a `conformance` test running every scenario in turn.

pub mod bench;
pub mod config;
pub mod scenarios;
pub mod suite;
pub mod util;

pub use bench::{Benchmark, BenchmarkKind, BenchmarkReport};
pub use config::SuiteConfig;
pub use scenarios::Scenario;
pub use suite::{
    never_skip, DriverConstructor, DriverSuite, DriverTeardown, LeakedState, Outcome,
    ScenarioReport, SkipCheck, SuiteReport,
};

#[doc(hidden)]
pub use anyhow;

/// Installs a tracing subscriber writing to the test output.
///
/// Respects `RUST_LOG` and can be called any number of times.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Generates a test running every conformance scenario against one driver instance.
///
/// `$suite` must produce a [`DriverSuite`]. Scenarios run one after another, since instances of
/// most backends share a namespace and every scenario expects to find the root empty. The driver is
/// torn down once, after the last scenario, and the test fails listing every failed scenario. The
/// calling crate needs `tokio` with the `macros` and `rt-multi-thread` features.
///
/// Use [`DriverSuite::run`] to run a single scenario on its own.
#[macro_export]
macro_rules! driver_suite {
    ($name:ident, $suite:expr) => {
        #[::tokio::test(flavor = "multi_thread")]
        async fn $name() -> $crate::anyhow::Result<()> {
            $crate::init_tracing();

            let suite: $crate::DriverSuite = $suite;
            suite.run_all().await?.ensure_success()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scenario_is_named_once() {
        let mut names = Scenario::ALL
            .iter()
            .map(|scenario| scenario.name())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();

        assert_eq!(names.len(), Scenario::ALL.len());
    }

    #[test]
    fn long_scenarios() {
        let long = Scenario::ALL
            .iter()
            .filter(|scenario| scenario.is_long())
            .collect::<Vec<_>>();

        assert_eq!(
            long,
            [&Scenario::WriteReadLargeStreams, &Scenario::EventualConsistency]
        );
    }
}
