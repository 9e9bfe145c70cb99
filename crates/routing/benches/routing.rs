//! Benchmarks for topology construction and routing sweeps

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rivulet_core::Raster;
use rivulet_parallel::{Executor, ProcessingMode};
use rivulet_routing::overland::{KinematicOverland, OverlandInputs, OverlandWater};
use rivulet_routing::topology::{build_flow_indices, build_routing_layers, FlowIndexParams, LayerOrigin};

/// Rows drain east into the last column, which drains south to one outlet
fn create_comb(size: usize) -> Raster<i32> {
    let mut codes = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            let code = match (col + 1 < size, row + 1 < size) {
                (true, _) => 1,
                (false, true) => 7,
                (false, false) => 0,
            };
            codes.push(code);
        }
    }
    Raster::from_vec(codes, size, size).unwrap().with_cell_size(30.0)
}

fn bench_routing_layers(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology/routing_layers");
    for size in [128, 256, 512] {
        let grid = create_comb(size);
        let topo = build_flow_indices(&grid, &FlowIndexParams::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| build_routing_layers(black_box(&topo.index), LayerOrigin::FromSource).unwrap())
        });
    }
    group.finish();
}

fn bench_overland_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("overland/kinematic_step");
    group.sample_size(20);
    let exec = Executor::new(ProcessingMode::Parallel).unwrap();
    for size in [128, 256] {
        let grid = create_comb(size);
        let topo = build_flow_indices(&grid, &FlowIndexParams::default()).unwrap();
        let layers = build_routing_layers(&topo.index, LayerOrigin::FromSource).unwrap();
        let n = topo.index.n_nodes();
        let stream_link: Vec<i64> = (0..n)
            .map(|id| match topo.layout.position(id) {
                Some((_, col)) if col + 1 == size => 1,
                _ => 0,
            })
            .collect();
        let channel_width: Vec<f64> = stream_link.iter().map(|&l| if l > 0 { 5.0 } else { 0.0 }).collect();
        let inputs = OverlandInputs {
            slope: &vec![0.05; n],
            manning: &vec![0.1; n],
            stream_link: &stream_link,
            channel_width: &channel_width,
            subbasin: &vec![1; n],
        };
        let mut router = KinematicOverland::new(&topo, layers, &inputs, 60.0).unwrap();
        let mut infiltration = vec![0.0; n];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut runoff = vec![2.0; n];
                let mut water = OverlandWater {
                    surface_runoff: &mut runoff,
                    infiltration_surplus: None,
                    infiltration: &mut infiltration,
                    accumulated_infiltration: None,
                };
                router.step(&exec, &mut water).unwrap();
                black_box(router.to_channel().total())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_routing_layers, bench_overland_sweep);
criterion_main!(benches);
