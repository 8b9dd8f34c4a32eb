//! Conformance scenarios.
//!
//! Every scenario drives a driver through a scripted sequence of operations and checks the
//! observed results against the contract. Scenarios register whatever they create with
//! [`ScenarioContext::track`] and leave the actual cleanup to the suite.

use anyhow::{bail, ensure, Result};
use std::fmt;

use storage_driver::{Driver, ErrorKind};

use crate::{config::SuiteConfig, suite::Outcome, util::Generator};

mod concurrency;
mod io;
mod paths;
mod tree;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    RootExists,
    ValidPaths,
    InvalidPaths,
    WriteRead1,
    WriteRead2,
    WriteRead3,
    WriteRead4,
    WriteReadNonUtf8,
    Truncate,
    ReadNonexistent,
    WriteReadStreams1,
    WriteReadStreams2,
    WriteReadStreams3,
    WriteReadStreams4,
    WriteReadStreamsNonUtf8,
    WriteReadLargeStreams,
    ReadStreamWithOffset,
    ContinueStreamAppendLarge,
    ContinueStreamAppendSmall,
    ReadNonexistentStream,
    List,
    Move,
    MoveOverwrite,
    MoveNonexistent,
    MoveInvalid,
    Delete,
    UrlFor,
    DeleteNonexistent,
    DeleteFolder,
    StatCall,
    PutContentMultipleTimes,
    ConcurrentStreamReads,
    ConcurrentFileStreams,
    EventualConsistency,
}

impl Scenario {
    pub const ALL: &'static [Scenario] = &[
        Scenario::RootExists,
        Scenario::ValidPaths,
        Scenario::InvalidPaths,
        Scenario::WriteRead1,
        Scenario::WriteRead2,
        Scenario::WriteRead3,
        Scenario::WriteRead4,
        Scenario::WriteReadNonUtf8,
        Scenario::Truncate,
        Scenario::ReadNonexistent,
        Scenario::WriteReadStreams1,
        Scenario::WriteReadStreams2,
        Scenario::WriteReadStreams3,
        Scenario::WriteReadStreams4,
        Scenario::WriteReadStreamsNonUtf8,
        Scenario::WriteReadLargeStreams,
        Scenario::ReadStreamWithOffset,
        Scenario::ContinueStreamAppendLarge,
        Scenario::ContinueStreamAppendSmall,
        Scenario::ReadNonexistentStream,
        Scenario::List,
        Scenario::Move,
        Scenario::MoveOverwrite,
        Scenario::MoveNonexistent,
        Scenario::MoveInvalid,
        Scenario::Delete,
        Scenario::UrlFor,
        Scenario::DeleteNonexistent,
        Scenario::DeleteFolder,
        Scenario::StatCall,
        Scenario::PutContentMultipleTimes,
        Scenario::ConcurrentStreamReads,
        Scenario::ConcurrentFileStreams,
        Scenario::EventualConsistency,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::RootExists => "root_exists",
            Scenario::ValidPaths => "valid_paths",
            Scenario::InvalidPaths => "invalid_paths",
            Scenario::WriteRead1 => "write_read_1",
            Scenario::WriteRead2 => "write_read_2",
            Scenario::WriteRead3 => "write_read_3",
            Scenario::WriteRead4 => "write_read_4",
            Scenario::WriteReadNonUtf8 => "write_read_non_utf8",
            Scenario::Truncate => "truncate",
            Scenario::ReadNonexistent => "read_nonexistent",
            Scenario::WriteReadStreams1 => "write_read_streams_1",
            Scenario::WriteReadStreams2 => "write_read_streams_2",
            Scenario::WriteReadStreams3 => "write_read_streams_3",
            Scenario::WriteReadStreams4 => "write_read_streams_4",
            Scenario::WriteReadStreamsNonUtf8 => "write_read_streams_non_utf8",
            Scenario::WriteReadLargeStreams => "write_read_large_streams",
            Scenario::ReadStreamWithOffset => "read_stream_with_offset",
            Scenario::ContinueStreamAppendLarge => "continue_stream_append_large",
            Scenario::ContinueStreamAppendSmall => "continue_stream_append_small",
            Scenario::ReadNonexistentStream => "read_nonexistent_stream",
            Scenario::List => "list",
            Scenario::Move => "move",
            Scenario::MoveOverwrite => "move_overwrite",
            Scenario::MoveNonexistent => "move_nonexistent",
            Scenario::MoveInvalid => "move_invalid",
            Scenario::Delete => "delete",
            Scenario::UrlFor => "url_for",
            Scenario::DeleteNonexistent => "delete_nonexistent",
            Scenario::DeleteFolder => "delete_folder",
            Scenario::StatCall => "stat_call",
            Scenario::PutContentMultipleTimes => "put_content_multiple_times",
            Scenario::ConcurrentStreamReads => "concurrent_stream_reads",
            Scenario::ConcurrentFileStreams => "concurrent_file_streams",
            Scenario::EventualConsistency => "eventual_consistency",
        }
    }

    /// Long scenarios are skipped in short mode.
    pub fn is_long(self) -> bool {
        matches!(
            self,
            Scenario::WriteReadLargeStreams | Scenario::EventualConsistency
        )
    }

    pub(crate) async fn exercise(self, cx: &mut ScenarioContext) -> Result<Outcome> {
        match self {
            Scenario::RootExists => paths::root_exists(cx).await,
            Scenario::ValidPaths => paths::valid_paths(cx).await,
            Scenario::InvalidPaths => paths::invalid_paths(cx).await,
            Scenario::WriteRead1 => io::write_read_compare(cx, b"a").await,
            Scenario::WriteRead2 => io::write_read_compare(cx, b"\xc3\x9f").await,
            Scenario::WriteRead3 => {
                let contents = cx.generator.contents(32);
                io::write_read_compare(cx, &contents).await
            }
            Scenario::WriteRead4 => {
                let contents = cx.generator.contents(1 << 20);
                io::write_read_compare(cx, &contents).await
            }
            Scenario::WriteReadNonUtf8 => {
                io::write_read_compare(cx, &[0x80, 0x80, 0x80, 0x80]).await
            }
            Scenario::Truncate => io::truncate(cx).await,
            Scenario::ReadNonexistent => io::read_nonexistent(cx).await,
            Scenario::WriteReadStreams1 => io::write_read_compare_streams(cx, b"a").await,
            Scenario::WriteReadStreams2 => io::write_read_compare_streams(cx, b"\xc3\x9f").await,
            Scenario::WriteReadStreams3 => {
                let contents = cx.generator.contents(32);
                io::write_read_compare_streams(cx, &contents).await
            }
            Scenario::WriteReadStreams4 => {
                let contents = cx.generator.contents(1 << 20);
                io::write_read_compare_streams(cx, &contents).await
            }
            Scenario::WriteReadStreamsNonUtf8 => {
                io::write_read_compare_streams(cx, &[0x80, 0x80, 0x80, 0x80]).await
            }
            Scenario::WriteReadLargeStreams => io::write_read_large_streams(cx).await,
            Scenario::ReadStreamWithOffset => io::read_stream_with_offset(cx).await,
            Scenario::ContinueStreamAppendLarge => {
                io::continue_stream_append(cx, 10 << 20).await
            }
            Scenario::ContinueStreamAppendSmall => io::continue_stream_append(cx, 32).await,
            Scenario::ReadNonexistentStream => io::read_nonexistent_stream(cx).await,
            Scenario::List => tree::list(cx).await,
            Scenario::Move => tree::move_path(cx).await,
            Scenario::MoveOverwrite => tree::move_overwrite(cx).await,
            Scenario::MoveNonexistent => tree::move_nonexistent(cx).await,
            Scenario::MoveInvalid => tree::move_invalid(cx).await,
            Scenario::Delete => tree::delete(cx).await,
            Scenario::UrlFor => tree::url_for(cx).await,
            Scenario::DeleteNonexistent => tree::delete_nonexistent(cx).await,
            Scenario::DeleteFolder => tree::delete_folder(cx).await,
            Scenario::StatCall => tree::stat_call(cx).await,
            Scenario::PutContentMultipleTimes => io::put_content_multiple_times(cx).await,
            Scenario::ConcurrentStreamReads => concurrency::concurrent_stream_reads(cx).await,
            Scenario::ConcurrentFileStreams => concurrency::concurrent_file_streams(cx).await,
            Scenario::EventualConsistency => io::eventual_consistency(cx).await,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State handed to a running scenario.
pub(crate) struct ScenarioContext {
    pub(crate) driver: Driver,
    pub(crate) config: SuiteConfig,
    pub(crate) generator: Generator,
    tracked: Vec<String>,
}

impl ScenarioContext {
    pub(crate) fn new(driver: Driver, config: SuiteConfig, generator: Generator) -> ScenarioContext {
        ScenarioContext {
            driver,
            config,
            generator,
            tracked: Vec::new(),
        }
    }

    pub(crate) fn driver_name(&self) -> String {
        self.driver.name().to_owned()
    }

    /// Registers the top level segment of `path` for deletion once the scenario is done.
    pub(crate) fn track(&mut self, path: &str) {
        let first_part = crate::util::first_part(path);
        if !self.tracked.contains(&first_part) {
            self.tracked.push(first_part);
        }
    }

    /// Generates a random path of `len` characters and tracks it.
    pub(crate) fn random_path(&mut self, len: usize) -> String {
        let path = self.generator.path(len);
        self.track(&path);
        path
    }

    /// Deletes everything tracked so far, ignoring paths that are already gone.
    pub(crate) async fn cleanup(&mut self) {
        for path in self.tracked.drain(..) {
            match self.driver.delete(&path).await {
                Ok(()) => tracing::trace!(%path, "cleaned up"),
                Err(err) if err.is_path_not_found() => (),
                Err(err) => tracing::warn!(%path, "cleanup failed: {}", err),
            }
        }
    }
}

/// Checks that `result` failed with an error of the given kind mentioning the driver name.
pub(crate) fn expect_error<T>(
    result: storage_driver::Result<T>,
    kind: ErrorKind,
    driver: &str,
) -> Result<storage_driver::Error> {
    let err = match result {
        Ok(_) => bail!("expected {:?} error, but the operation succeeded", kind),
        Err(err) => err,
    };

    ensure!(
        err.kind() == kind,
        "expected {:?} error, got {:?}: {}",
        kind,
        err.kind(),
        err
    );
    ensure!(
        err.to_string().contains(driver),
        "error does not mention driver {:?}: {}",
        driver,
        err
    );

    Ok(err)
}
