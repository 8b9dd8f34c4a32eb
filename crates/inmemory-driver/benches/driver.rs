use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use storage_testsuites::{Benchmark, BenchmarkKind, SuiteConfig};

const GIB: u64 = 1 << 30;

fn driver_benchmarks(c: &mut Criterion) {
    storage_testsuites::init_tracing();

    let config = SuiteConfig::from_env().expect("reading suite config");
    let runtime = tokio::runtime::Runtime::new().expect("building runtime");

    let mut group = c.benchmark_group(inmemory_driver::DRIVER_NAME);
    group.sample_size(10);

    for &kind in BenchmarkKind::ALL {
        let bytes = kind.bytes_per_iteration();
        if config.short && bytes >= GIB {
            continue;
        }

        match kind {
            BenchmarkKind::List(files) | BenchmarkKind::Delete(files) => {
                group.throughput(Throughput::Elements(files as u64))
            }
            BenchmarkKind::PutGet(_) | BenchmarkKind::Stream(_) => {
                group.throughput(Throughput::Bytes(bytes))
            }
        };

        group.bench_function(kind.name(), |b| {
            b.to_async(&runtime).iter_custom(|iterations| async move {
                let mut benchmark = Benchmark::new(inmemory_driver::new(), kind);
                let report = benchmark.run(iterations).await.expect("running benchmark");

                report.elapsed
            })
        });
    }

    group.finish();
}

criterion_group!(benches, driver_benchmarks);
criterion_main!(benches);
