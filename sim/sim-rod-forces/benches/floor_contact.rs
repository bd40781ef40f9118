//! Benchmarks for the floor contact and damping models.
//!
//! Run with: cargo bench -p sim-rod-forces
//!
//! The robot is a fan of limbs lying on a flat floor with every node in
//! contact and sliding, which is the most expensive path through the model.

#![allow(missing_docs, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::Vector3;

use sim_rod_forces::{
    DampingForce, DampingParams, DenseAccumulator, FloorContactForce, FloorContactParams,
    ForceModel, RodLimb, SoftRobot,
};

const NODES_PER_LIMB: usize = 20;
const ROD_RADIUS: f64 = 0.001;

/// Build a robot with `limbs` straight limbs, every node 2 mm above the floor
/// and displaced sideways by a sliding-speed amount during the step.
fn sliding_robot(limbs: usize) -> SoftRobot {
    (0..limbs)
        .map(|l| {
            let angle = l as f64 * std::f64::consts::TAU / limbs as f64;
            let direction = Vector3::new(angle.cos(), angle.sin(), 0.0);
            let nodes: Vec<_> = (0..NODES_PER_LIMB)
                .map(|i| direction * (0.01 * i as f64) + Vector3::new(0.0, 0.0, 0.003))
                .collect();

            let mut limb = RodLimb::new(&nodes, ROD_RADIUS, 0.3).unwrap();
            for (i, node) in nodes.iter().enumerate() {
                limb.set_vertex(i, node + Vector3::new(2e-5, -1e-5, 0.0))
                    .unwrap();
            }
            limb
        })
        .collect()
}

fn bench_floor_contact(c: &mut Criterion) {
    let mut group = c.benchmark_group("floor_contact");
    let model = FloorContactForce::new(
        FloorContactParams::flat_floor(0.01, 0.01, 0.0).with_floor_mu(0.5),
    )
    .unwrap();

    for limbs in [1, 4, 16] {
        let robot = sliding_robot(limbs);
        let mut sink = DenseAccumulator::for_robot(&robot);
        group.throughput(Throughput::Elements(robot.num_vertices() as u64));

        group.bench_with_input(BenchmarkId::new("force", limbs), &robot, |b, robot| {
            b.iter(|| {
                sink.clear();
                black_box(model.compute_force(black_box(robot), 1e-3, &mut sink))
            });
        });

        group.bench_with_input(
            BenchmarkId::new("force_and_jacobian", limbs),
            &robot,
            |b, robot| {
                b.iter(|| {
                    sink.clear();
                    black_box(model.compute_force_and_jacobian(black_box(robot), 1e-3, &mut sink))
                });
            },
        );
    }

    group.finish();
}

fn bench_damping(c: &mut Criterion) {
    let model = DampingForce::new(DampingParams::default()).unwrap();
    let robot = sliding_robot(16);
    let mut sink = DenseAccumulator::for_robot(&robot);

    c.bench_function("damping_force_and_jacobian", |b| {
        b.iter(|| {
            sink.clear();
            black_box(model.compute_force_and_jacobian(black_box(&robot), 1e-3, &mut sink))
        });
    });
}

criterion_group!(benches, bench_floor_contact, bench_damping);
criterion_main!(benches);
