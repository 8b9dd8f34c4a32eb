//! Drivers breaking the contract on purpose, to check that the suite notices.

use std::sync::Arc;
use tokio::io::AsyncRead;

use storage_driver::{path, ContentReader, Driver, FileInfo, Result, StorageDriver};
use storage_testsuites::{DriverSuite, LeakedState, Scenario, SuiteConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fault {
    /// Deletes succeed without removing anything.
    IgnoreDeletes,
    /// Reports a name the errors of the wrapped driver don't mention.
    Renamed,
    /// Reads never complete.
    HangingReads,
}

#[derive(Debug)]
struct Faulty {
    inner: Driver,
    fault: Fault,
}

#[async_trait::async_trait]
impl StorageDriver for Faulty {
    fn name(&self) -> &str {
        match self.fault {
            Fault::Renamed => "renamed",
            _ => self.inner.name(),
        }
    }

    async fn get_content(&self, path: &str) -> Result<Vec<u8>> {
        if self.fault == Fault::HangingReads {
            return std::future::pending().await;
        }

        self.inner.get_content(path).await
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> Result<()> {
        self.inner.put_content(path, content).await
    }

    async fn read_stream(&self, path: &str, offset: i64) -> Result<ContentReader> {
        if self.fault == Fault::HangingReads {
            return std::future::pending().await;
        }

        self.inner.read_stream(path, offset).await
    }

    async fn write_stream(
        &self,
        path: &str,
        offset: i64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<i64> {
        self.inner.write_stream(path, offset, reader).await
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        self.inner.stat(path).await
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        self.inner.list(path).await
    }

    async fn move_path(&self, source: &str, dest: &str) -> Result<()> {
        self.inner.move_path(source, dest).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.fault == Fault::IgnoreDeletes {
            return Ok(());
        }

        self.inner.delete(path).await
    }
}

fn config() -> SuiteConfig {
    SuiteConfig {
        short: true,
        concurrent_read_size: 1 << 20,
        concurrent_writers: 4,
        scenario_timeout_secs: 60,
        stat_modtime_delay_ms: 10,
        propagation_delay_ms: 0,
        ..SuiteConfig::default()
    }
}

/// Builds a suite whose instances wrap `store` with `fault`.
fn suite_on(store: Driver, fault: Fault) -> DriverSuite {
    DriverSuite::new(move || {
        let inner = store.clone();
        async move {
            let driver: Driver = Arc::new(Faulty { inner, fault });
            Ok::<_, anyhow::Error>(driver)
        }
    })
    .config(config())
}

fn suite(fault: Fault) -> DriverSuite {
    suite_on(inmemory_driver::new(), fault)
}

#[tokio::test]
async fn leaked_files_fail_the_scenario() {
    storage_testsuites::init_tracing();

    let err = suite(Fault::IgnoreDeletes)
        .run(Scenario::WriteRead1)
        .await
        .unwrap_err();

    let leaked = err.downcast_ref::<LeakedState>().unwrap();
    assert_eq!(leaked.files.len(), 1);
}

#[tokio::test]
async fn leaked_files_abort_the_run() {
    storage_testsuites::init_tracing();

    let err = suite(Fault::IgnoreDeletes).run_all().await.unwrap_err();

    let leaked = err.downcast_ref::<LeakedState>().unwrap();
    assert!(leaked.files.contains(&"/docker".to_owned()));
    assert!(format!("{:#}", err).contains("aborted after valid_paths"));
}

#[tokio::test]
async fn errors_must_name_the_driver() {
    storage_testsuites::init_tracing();

    let err = suite(Fault::Renamed)
        .run(Scenario::ReadNonexistent)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("does not mention driver"));
    assert!(err.downcast_ref::<LeakedState>().is_none());
}

#[tokio::test]
async fn failures_are_collected() -> anyhow::Result<()> {
    storage_testsuites::init_tracing();

    let report = suite(Fault::Renamed).run_all().await?;

    assert!(!report.is_success());
    assert!(report
        .failures()
        .any(|(scenario, _)| scenario == Scenario::DeleteNonexistent));
    assert!(matches!(report.outcome(Scenario::RootExists), Some(Ok(_))));
    assert!(report.ensure_success().is_err());

    Ok(())
}

#[tokio::test]
async fn leaks_keep_the_scenario_failure() {
    storage_testsuites::init_tracing();

    let err = suite(Fault::IgnoreDeletes)
        .run(Scenario::Delete)
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<LeakedState>().is_some());
    assert!(format!("{:#}", err).contains("delete failed"));
    assert!(format!("{:#}", err).contains("expected PathNotFound"));
}

#[tokio::test]
async fn hanging_drivers_time_out() -> anyhow::Result<()> {
    storage_testsuites::init_tracing();

    let store = inmemory_driver::new();
    let suite = suite_on(store.clone(), Fault::HangingReads).config(SuiteConfig {
        scenario_timeout_secs: 1,
        ..config()
    });

    let err = suite.run(Scenario::WriteRead1).await.unwrap_err();

    assert!(format!("{:#}", err).contains("write_read_1 timed out"));
    assert!(err.downcast_ref::<LeakedState>().is_none());
    assert!(store.list(path::ROOT).await?.is_empty());

    Ok(())
}
