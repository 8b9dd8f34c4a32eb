use anyhow::{ensure, Context};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    OnceLock,
};

use storage_driver::{path, Driver};
use storage_testsuites::{driver_suite, DriverSuite, Outcome, Scenario, SuiteConfig};

const MIB: u64 = 1 << 20;

fn config() -> SuiteConfig {
    SuiteConfig {
        seed: Some(0x5eed),
        large_stream_size: 64 * MIB,
        concurrent_read_size: 16 * MIB,
        concurrent_writers: 8,
        eventual_consistency_iterations: 256,
        scenario_timeout_secs: 120,
        stat_modtime_delay_ms: 10,
        propagation_delay_ms: 0,
        ..SuiteConfig::default()
    }
}

fn suite() -> DriverSuite {
    DriverSuite::new(|| async { Ok::<_, anyhow::Error>(inmemory_driver::new()) }).config(config())
}

driver_suite!(conformance, suite());

/// Every constructed instance sees the same files, like a bucket behind a remote backend.
static SHARED_STORE: OnceLock<Driver> = OnceLock::new();
static SHARED_TEARDOWNS: AtomicUsize = AtomicUsize::new(0);

fn shared_suite() -> DriverSuite {
    DriverSuite::new(|| async {
        Ok::<_, anyhow::Error>(SHARED_STORE.get_or_init(inmemory_driver::new).clone())
    })
    .teardown(|| async {
        let teardowns = SHARED_TEARDOWNS.fetch_add(1, Ordering::SeqCst);
        ensure!(teardowns == 0, "shared store torn down {} times", teardowns + 1);

        let store = SHARED_STORE.get().context("shared store was never built")?;
        let files = store.list(path::ROOT).await?;
        ensure!(files.is_empty(), "shared store left with {:?}", files);

        Ok(())
    })
    .config(config())
}

driver_suite!(shared_store, shared_suite());

#[tokio::test(flavor = "multi_thread")]
async fn run_all_on_one_instance() -> anyhow::Result<()> {
    storage_testsuites::init_tracing();

    let report = suite().run_all().await?;
    report.ensure_success()?;

    assert_eq!(report.seed, Some(0x5eed));
    assert_eq!(report.scenarios.len(), Scenario::ALL.len());
    assert!(matches!(
        report.outcome(Scenario::Move),
        Some(Ok(Outcome::Passed))
    ));
    assert!(matches!(
        report.outcome(Scenario::UrlFor),
        Some(Ok(Outcome::NotApplicable(_)))
    ));

    Ok(())
}

#[tokio::test]
async fn short_mode_skips_long_scenarios() -> anyhow::Result<()> {
    let suite = suite().config(SuiteConfig {
        short: true,
        ..config()
    });

    let outcome = suite.run(Scenario::WriteReadLargeStreams).await?;
    assert!(matches!(outcome, Outcome::Skipped(_)));

    let outcome = suite.run(Scenario::WriteRead1).await?;
    assert_eq!(outcome, Outcome::Passed);

    Ok(())
}

#[tokio::test]
async fn skip_check_skips_the_whole_suite() -> anyhow::Result<()> {
    let suite = suite().skip_check(|| "no credentials configured".to_owned());

    let report = suite.run_all().await?;
    assert!(report.seed.is_none());
    assert!(report.is_success());
    assert!(report.scenarios.iter().all(|report| matches!(
        &report.result,
        Ok(Outcome::Skipped(reason)) if reason == "no credentials configured"
    )));

    let outcome = suite.run(Scenario::List).await?;
    assert!(matches!(outcome, Outcome::Skipped(_)));

    Ok(())
}

#[tokio::test]
async fn teardown_runs_after_the_driver_is_done() -> anyhow::Result<()> {
    static TEARDOWNS: AtomicUsize = AtomicUsize::new(0);

    let suite = suite().teardown(|| async {
        TEARDOWNS.fetch_add(1, Ordering::SeqCst);
        Ok::<_, anyhow::Error>(())
    });

    suite.run(Scenario::RootExists).await?;
    assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 1);

    suite.run(Scenario::Delete).await?;
    assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 2);

    Ok(())
}
