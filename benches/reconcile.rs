//! Benchmarks for rendering and reading back generated records.
//!
//! Run with: cargo bench
//!
//! Results are saved to `target/criterion/` with HTML reports.
#![allow(
    clippy::expect_used,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use xlgrid::{CellGrid, Reader, Renderer, SchemaTree, Workbook};

xlgrid::record! {
    #[derive(Debug, Default, Clone)]
    pub struct Point {
        #[grid("col:x")]
        pub x: i64,
        #[grid("col:y")]
        pub y: i64,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone)]
    pub struct Segment {
        #[grid("col:Start")]
        pub start: Point,
        #[grid("col:End")]
        pub end: Point,
        #[grid("col:Weight")]
        pub weight: f64,
    }
}

xlgrid::record! {
    #[derive(Debug, Default, Clone)]
    pub struct Route {
        #[grid("col:Id")]
        pub id: u32,
        #[grid("col:Name")]
        pub name: String,
        #[grid("col:First")]
        pub first: Segment,
        #[grid("col:Second")]
        pub second: Segment,
    }
}

fn routes(count: usize) -> Vec<Route> {
    (0..count)
        .map(|i| {
            let n = i as i64;
            let point = |k: i64| Point { x: n * k, y: -n * k };
            let segment = |k: i64| Segment {
                start: point(k),
                end: point(k + 1),
                weight: n as f64 / 7.0,
            };
            Route {
                id: i as u32,
                name: format!("route {i}"),
                first: segment(1),
                second: segment(3),
            }
        })
        .collect()
}

/// Schema construction plus the memoized layout pass.
fn bench_layout(c: &mut Criterion) {
    c.bench_function("schema_and_layout", |b| {
        b.iter(|| {
            let tree = SchemaTree::build::<Route>().expect("schema");
            black_box(tree.metas().len())
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for count in [100, 1000] {
        let data = routes(count);
        let renderer = Renderer::<Route>::new("Routes").expect("renderer");
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &data, |b, data| {
            b.iter(|| {
                let mut workbook = Workbook::new();
                renderer
                    .render(&mut workbook, black_box(data))
                    .expect("render");
                workbook
            })
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    for count in [100, 1000] {
        let mut workbook = Workbook::new();
        Renderer::<Route>::new("Routes")
            .expect("renderer")
            .render(&mut workbook, &routes(count))
            .expect("render");
        let reader = Reader::<Route>::new().expect("reader");

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("grid_load", count),
            &workbook,
            |b, workbook| b.iter(|| CellGrid::load(black_box(workbook), "Routes").expect("load")),
        );
        group.bench_with_input(
            BenchmarkId::new("reconcile_and_bind", count),
            &workbook,
            |b, workbook| b.iter(|| reader.read(black_box(workbook), "Routes").expect("read")),
        );
    }
    group.finish();
}

/// Full XLSX cycle: encode, decode, read.
fn bench_xlsx(c: &mut Criterion) {
    let data = routes(500);
    let bytes = xlgrid::write_xlsx("Routes", &data).expect("write");

    let mut group = c.benchmark_group("xlsx");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("write_500", |b| {
        b.iter(|| xlgrid::write_xlsx("Routes", black_box(&data)).expect("write"))
    });
    group.bench_function("read_500", |b| {
        b.iter(|| xlgrid::read_xlsx::<Route>(black_box(&bytes), "Routes").expect("read"))
    });
    group.finish();
}

criterion_group!(benches, bench_layout, bench_render, bench_read, bench_xlsx);
criterion_main!(benches);
