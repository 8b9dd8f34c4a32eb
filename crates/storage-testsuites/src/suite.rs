//! Runs the conformance scenarios against drivers built by a caller supplied constructor.

use anyhow::{anyhow, bail, Context, Result};
use futures::{future::BoxFuture, FutureExt};
use std::{fmt, future::Future, sync::Arc, time::Instant};

use storage_driver::{path, Driver};

use crate::{
    config::SuiteConfig,
    scenarios::{Scenario, ScenarioContext},
    util::Generator,
};

/// Builds a fresh driver instance.
pub type DriverConstructor = Arc<dyn Fn() -> BoxFuture<'static, Result<Driver>> + Send + Sync>;

/// Releases whatever a driver instance left behind outside of its namespace.
pub type DriverTeardown = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Returns a reason to skip the whole suite, or an empty string to run it.
pub type SkipCheck = fn() -> String;

pub fn never_skip() -> String {
    String::new()
}

/// How a scenario ended, when it didn't fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Skipped(String),
    /// The driver lacks an optional capability the scenario needs.
    NotApplicable(String),
}

/// The root of the driver was not empty after a scenario cleaned up.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("storage driver did not clean up properly, offending files: {files:?}")]
pub struct LeakedState {
    pub files: Vec<String>,
}

#[derive(Clone)]
pub struct DriverSuite {
    constructor: DriverConstructor,
    teardown: Option<DriverTeardown>,
    skip_check: SkipCheck,
    config: SuiteConfig,
}

impl DriverSuite {
    pub fn new<F, Fut>(constructor: F) -> DriverSuite
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Driver>> + Send + 'static,
    {
        DriverSuite {
            constructor: Arc::new(move || constructor().boxed()),
            teardown: None,
            skip_check: never_skip,
            config: SuiteConfig::default(),
        }
    }

    /// Called once every driver instance built by the suite has been dropped.
    pub fn teardown<F, Fut>(mut self, teardown: F) -> DriverSuite
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.teardown = Some(Arc::new(move || teardown().boxed()));
        self
    }

    pub fn skip_check(mut self, skip_check: SkipCheck) -> DriverSuite {
        self.skip_check = skip_check;
        self
    }

    pub fn config(mut self, config: SuiteConfig) -> DriverSuite {
        self.config = config;
        self
    }

    /// Runs a single scenario on a fresh driver instance.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, scenario: Scenario) -> Result<Outcome> {
        if let Some(reason) = self.skip_reason() {
            return Ok(Outcome::Skipped(reason));
        }

        let driver = (self.constructor)().await.context("constructing driver")?;
        let (generator, seed) = Generator::seeded(self.config.seed);
        tracing::info!(seed, driver = driver.name(), "running {}", scenario);

        let result = self.run_on(&driver, scenario, generator).await;
        drop(driver);

        let teardown = self.tear_down().await;
        let outcome = result?;
        teardown?;

        Ok(outcome)
    }

    /// Runs every scenario on one driver instance.
    ///
    /// Failing scenarios are collected in the report. A driver leaking files between scenarios
    /// aborts the run, since later scenarios couldn't trust the root listing anymore.
    #[tracing::instrument(skip(self))]
    pub async fn run_all(&self) -> Result<SuiteReport> {
        if let Some(reason) = self.skip_reason() {
            let scenarios = Scenario::ALL
                .iter()
                .map(|&scenario| ScenarioReport {
                    scenario,
                    result: Ok(Outcome::Skipped(reason.clone())),
                })
                .collect();

            return Ok(SuiteReport {
                seed: None,
                scenarios,
            });
        }

        let driver = (self.constructor)().await.context("constructing driver")?;
        let (mut generator, seed) = Generator::seeded(self.config.seed);
        tracing::info!(seed, driver = driver.name(), "running conformance suite");

        let mut scenarios = Vec::with_capacity(Scenario::ALL.len());
        let mut leaked = None;

        for &scenario in Scenario::ALL {
            let result = self.run_on(&driver, scenario, generator.fork()).await;

            match result {
                Err(err) if err.is::<LeakedState>() => {
                    leaked = Some(err.context(format!("aborted after {}", scenario)));
                    break;
                }
                result => scenarios.push(ScenarioReport { scenario, result }),
            }
        }

        drop(driver);
        let teardown = self.tear_down().await;

        if let Some(err) = leaked {
            return Err(err);
        }
        teardown?;

        Ok(SuiteReport {
            seed: Some(seed),
            scenarios,
        })
    }

    async fn run_on(
        &self,
        driver: &Driver,
        scenario: Scenario,
        generator: Generator,
    ) -> Result<Outcome> {
        if self.config.short && scenario.is_long() {
            tracing::info!("skipping {} in short mode", scenario);
            return Ok(Outcome::Skipped("long running scenario in short mode".to_owned()));
        }

        let mut cx = ScenarioContext::new(driver.clone(), self.config.clone(), generator);
        let timeout = self.config.scenario_timeout();
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, scenario.exercise(&mut cx)).await {
            Ok(result) => result.with_context(|| format!("{} failed", scenario)),
            Err(_) => Err(anyhow!("{} timed out after {:?}", scenario, timeout)),
        };

        if tokio::time::timeout(timeout, cx.cleanup()).await.is_err() {
            tracing::warn!("cleanup after {} timed out after {:?}", scenario, timeout);
        }

        match &result {
            Ok(outcome) => tracing::info!(
                elapsed = ?started.elapsed(),
                "{} finished: {:?}",
                scenario,
                outcome
            ),
            Err(err) => tracing::error!(elapsed = ?started.elapsed(), "{:#}", err),
        }

        if let Err(leaked) = check_root(driver).await {
            return Err(match result {
                Err(err) => leaked.context(format!("{:#}", err)),
                Ok(_) => leaked,
            });
        }

        result
    }

    fn skip_reason(&self) -> Option<String> {
        let reason = (self.skip_check)();
        if reason.is_empty() {
            None
        } else {
            tracing::info!("skipping driver suite: {}", reason);
            Some(reason)
        }
    }

    async fn tear_down(&self) -> Result<()> {
        match &self.teardown {
            Some(teardown) => teardown().await.context("tearing down driver"),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for DriverSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverSuite")
            .field("teardown", &self.teardown.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Fails with [`LeakedState`] if anything is left in the root of the driver.
async fn check_root(driver: &Driver) -> Result<()> {
    let files = match driver.list(path::ROOT).await {
        Ok(files) => files,
        Err(err) => {
            tracing::debug!("listing root after scenario: {}", err);
            Vec::new()
        }
    };

    if files.is_empty() {
        Ok(())
    } else {
        Err(LeakedState { files }.into())
    }
}

#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub result: Result<Outcome>,
}

#[derive(Debug)]
pub struct SuiteReport {
    /// Seed the generators were derived from, `None` when the suite was skipped.
    pub seed: Option<u64>,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn failures(&self) -> impl Iterator<Item = (Scenario, &anyhow::Error)> {
        self.scenarios
            .iter()
            .filter_map(|report| match &report.result {
                Ok(_) => None,
                Err(err) => Some((report.scenario, err)),
            })
    }

    pub fn outcome(&self, scenario: Scenario) -> Option<&Result<Outcome>> {
        self.scenarios
            .iter()
            .find(|report| report.scenario == scenario)
            .map(|report| &report.result)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Turns the report into an error listing every failed scenario.
    pub fn ensure_success(&self) -> Result<()> {
        let failures = self
            .failures()
            .map(|(scenario, err)| format!("{}: {:#}", scenario, err))
            .collect::<Vec<_>>();

        if failures.is_empty() {
            Ok(())
        } else {
            bail!(
                "{} scenarios failed (seed {:?}):\n{}",
                failures.len(),
                self.seed,
                failures.join("\n")
            )
        }
    }
}
