//! Throughput benchmarks shared by every driver.
//!
//! The benchmarks only measure, they don't depend on a benchmarking framework. Drivers wire
//! them into one, the in-memory driver does so with criterion.

use anyhow::{ensure, Context, Result};
use std::{
    fmt,
    time::{Duration, Instant},
};

use storage_driver::{path, Driver};

use crate::util::{first_part, read_all, Generator};

const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BenchmarkKind {
    /// Puts and gets back a file of the given size.
    PutGet(u64),
    /// Streams in and reads back a file of the given size.
    Stream(u64),
    /// Lists a directory holding the given number of files.
    List(usize),
    /// Deletes a directory holding the given number of files.
    Delete(usize),
}

impl BenchmarkKind {
    pub const ALL: &'static [BenchmarkKind] = &[
        BenchmarkKind::PutGet(0),
        BenchmarkKind::PutGet(KIB),
        BenchmarkKind::PutGet(MIB),
        BenchmarkKind::PutGet(GIB),
        BenchmarkKind::Stream(0),
        BenchmarkKind::Stream(KIB),
        BenchmarkKind::Stream(MIB),
        BenchmarkKind::Stream(GIB),
        BenchmarkKind::List(5),
        BenchmarkKind::List(50),
        BenchmarkKind::Delete(5),
        BenchmarkKind::Delete(50),
    ];

    pub fn name(self) -> String {
        match self {
            BenchmarkKind::PutGet(size) => format!("put_get_{}", size_name(size)),
            BenchmarkKind::Stream(size) => format!("stream_{}", size_name(size)),
            BenchmarkKind::List(files) => format!("list_{}_files", files),
            BenchmarkKind::Delete(files) => format!("delete_{}_files", files),
        }
    }

    /// Bytes moved by one iteration, zero for metadata benchmarks.
    pub fn bytes_per_iteration(self) -> u64 {
        match self {
            BenchmarkKind::PutGet(size) | BenchmarkKind::Stream(size) => size,
            BenchmarkKind::List(_) | BenchmarkKind::Delete(_) => 0,
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn size_name(size: u64) -> String {
    match size {
        0 => "empty".to_owned(),
        size if size >= GIB && size % GIB == 0 => format!("{}GiB", size / GIB),
        size if size >= MIB && size % MIB == 0 => format!("{}MiB", size / MIB),
        size if size >= KIB && size % KIB == 0 => format!("{}KiB", size / KIB),
        size => format!("{}B", size),
    }
}

#[derive(Clone, Debug)]
pub struct BenchmarkReport {
    pub kind: BenchmarkKind,
    pub iterations: u64,
    pub bytes: u64,
    /// Time spent in the measured operations, set-up excluded.
    pub elapsed: Duration,
}

impl BenchmarkReport {
    /// Bytes per second, zero for metadata benchmarks.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct Benchmark {
    driver: Driver,
    kind: BenchmarkKind,
    generator: Generator,
}

impl Benchmark {
    pub fn new(driver: Driver, kind: BenchmarkKind) -> Benchmark {
        let (generator, _) = Generator::seeded(None);

        Benchmark {
            driver,
            kind,
            generator,
        }
    }

    pub fn with_generator(mut self, generator: Generator) -> Benchmark {
        self.generator = generator;
        self
    }

    /// Runs `iterations` rounds of the benchmark and removes everything it created.
    #[tracing::instrument(skip(self), fields(kind = %self.kind))]
    pub async fn run(&mut self, iterations: u64) -> Result<BenchmarkReport> {
        let parent_dir = self.generator.path(8);

        let result = match self.kind {
            BenchmarkKind::PutGet(size) => self.put_get(&parent_dir, size, iterations).await,
            BenchmarkKind::Stream(size) => self.stream(&parent_dir, size, iterations).await,
            BenchmarkKind::List(files) => self.list(&parent_dir, files, iterations).await,
            BenchmarkKind::Delete(files) => self.delete(&parent_dir, files, iterations).await,
        };

        let first_part = first_part(&parent_dir);
        match self.driver.delete(&first_part).await {
            Ok(()) => (),
            Err(err) if err.is_path_not_found() => (),
            Err(err) => tracing::warn!(path = %first_part, "cleanup failed: {}", err),
        }

        let report = BenchmarkReport {
            kind: self.kind,
            iterations,
            bytes: self.kind.bytes_per_iteration() * iterations,
            elapsed: result?,
        };

        tracing::info!(
            iterations,
            bytes = report.bytes,
            elapsed = ?report.elapsed,
            throughput = report.throughput(),
            "benchmark finished"
        );

        Ok(report)
    }

    async fn put_get(&mut self, parent_dir: &str, size: u64, iterations: u64) -> Result<Duration> {
        let contents = self.generator.contents(size as usize);
        let mut elapsed = Duration::ZERO;

        for _ in 0..iterations {
            let filename = path::join(parent_dir, &self.generator.path(32));

            let started = Instant::now();
            self.driver
                .put_content(&filename, &contents)
                .await
                .context("putting content")?;
            let received = self
                .driver
                .get_content(&filename)
                .await
                .context("getting content")?;
            elapsed += started.elapsed();

            ensure!(
                received.len() == contents.len(),
                "got {} bytes back, expected {}",
                received.len(),
                contents.len()
            );
        }

        Ok(elapsed)
    }

    async fn stream(&mut self, parent_dir: &str, size: u64, iterations: u64) -> Result<Duration> {
        let contents = self.generator.contents(size as usize);
        let mut elapsed = Duration::ZERO;

        for _ in 0..iterations {
            let filename = path::join(parent_dir, &self.generator.path(32));
            let mut reader = &contents[..];

            let started = Instant::now();
            let written = self
                .driver
                .write_stream(&filename, 0, &mut reader)
                .await
                .context("writing stream")?;
            let stream = self
                .driver
                .read_stream(&filename, 0)
                .await
                .context("opening stream")?;
            let received = read_all(stream).await.context("reading stream")?;
            elapsed += started.elapsed();

            ensure!(written == size as i64, "wrote {} bytes, expected {}", written, size);
            ensure!(
                received.len() == contents.len(),
                "read {} bytes back, expected {}",
                received.len(),
                contents.len()
            );
        }

        Ok(elapsed)
    }

    async fn list(&mut self, parent_dir: &str, files: usize, iterations: u64) -> Result<Duration> {
        self.populate(parent_dir, files).await?;
        let mut elapsed = Duration::ZERO;

        for _ in 0..iterations {
            let started = Instant::now();
            let listed = self
                .driver
                .list(parent_dir)
                .await
                .context("listing files")?;
            elapsed += started.elapsed();

            ensure!(listed.len() == files, "listed {} files, expected {}", listed.len(), files);
        }

        Ok(elapsed)
    }

    async fn delete(
        &mut self,
        parent_dir: &str,
        files: usize,
        iterations: u64,
    ) -> Result<Duration> {
        let mut elapsed = Duration::ZERO;

        for _ in 0..iterations {
            let dir = path::join(parent_dir, &self.generator.path(8));
            self.populate(&dir, files).await?;

            let started = Instant::now();
            self.driver
                .delete(&dir)
                .await
                .context("deleting directory")?;
            elapsed += started.elapsed();
        }

        Ok(elapsed)
    }

    /// Fills `dir` with empty files, outside of the measured time.
    async fn populate(&mut self, dir: &str, files: usize) -> Result<()> {
        for _ in 0..files {
            let filename = path::join(dir, &self.generator.path(32));
            self.driver
                .put_content(&filename, &[])
                .await
                .with_context(|| format!("putting {}", filename))?;
        }

        Ok(())
    }
}
