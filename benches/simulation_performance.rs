use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stadium_traffic::{
    compute::{ComputeBackend, IntegrationBackend},
    config::{IntegrationMode, SimulationConfig},
    simulation::{ControlOutput, Simulation, Track, VehicleStates},
};

fn config(count: u32, vectorized: bool, scheduler: bool) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.population.count = count;
    config.track.length = (count as f64 * 20.0).max(1200.0);
    config.options.vectorized_engine_enabled = vectorized;
    config.options.event_scheduler_enabled = scheduler;
    config
}

fn warmed_up(config: SimulationConfig) -> Simulation {
    let mut sim = Simulation::new(config).expect("valid benchmark configuration");
    // Let traffic settle into car-following before measuring
    for _ in 0..300 {
        sim.step(1.0 / 60.0);
    }
    sim
}

fn benchmark_simulation_step(c: &mut Criterion) {
    let mut sim = warmed_up(config(50, true, true));
    let dt = sim.dt();

    c.bench_function("simulation_substep", |b| {
        b.iter(|| {
            black_box(sim.step(black_box(dt)));
        })
    });
}

fn benchmark_simulation_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_scaling");

    for car_count in [10, 50, 100, 200].iter() {
        for (label, scheduler) in [("scheduler", true), ("exhaustive", false)] {
            let mut sim = warmed_up(config(*car_count, true, scheduler));
            let dt = sim.dt();
            group.bench_with_input(BenchmarkId::new(label, car_count), car_count, |b, _| {
                b.iter(|| {
                    black_box(sim.step(dt));
                })
            });
        }
    }

    group.finish();
}

fn benchmark_integration_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("integration");
    let track = Track::from_parts(4000.0, 0.4);
    let count = 1000;
    let mut states = VehicleStates::with_capacity(count);
    for i in 0..count {
        states.push(&track, i as f64 * 4.0, 20.0);
    }
    let commands = vec![
        ControlOutput {
            accel: 0.5,
            jerk: 0.0,
            commanded: 0.5,
        };
        count
    ];

    for mode in [IntegrationMode::ArcLength, IntegrationMode::Planar] {
        let mut backends = vec![ComputeBackend::new_scalar(mode)];
        if let Ok(batched) = ComputeBackend::new_batched(mode) {
            backends.push(batched);
        }
        for mut backend in backends {
            let mut working = states.clone();
            let id = format!("{}/{:?}", backend.get_name(), mode);
            group.bench_function(id, |b| {
                b.iter(|| black_box(backend.integrate(&mut working, &commands, &track, 0.02)))
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_simulation_step,
    benchmark_simulation_scaling,
    benchmark_integration_backends
);
criterion_main!(benches);
