use log::{debug, info, warn};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use super::{
    driver_rng, CollisionDetector, CollisionRecord, CollisionStrategy, Contact, ContactResponse, ControlInput,
    ControlOutput, Controller, DriverGenerator, DriverParams, Perception, PerceptionResult, PopulationView,
    RngPurpose, SchedulerStats, SpeedingState, Track, Vehicle, VehicleId, VehicleStates,
};
use crate::compute::{ComputeBackend, IntegrationBackend};
use crate::config::{SimulationConfig, Validate};
use crate::error::ConfigError;

/// A vehicle entering the disabled state after a collision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisableRecord {
    pub vehicle: VehicleId,
    pub until: f64,
}

/// Everything that happened during one `step` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Physics sub-steps run by this call.
    pub substeps: u32,
    pub time: f64,
    pub tick: u64,
    pub collisions: Vec<CollisionRecord>,
    pub disabled: Vec<DisableRecord>,
    pub reenabled: Vec<VehicleId>,
    pub max_speed: f64,
    /// Simulated time discarded because the sub-step budget ran out.
    pub dropped_time: f64,
}

/// Read-only per-vehicle view for renderers and analytics.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub class: usize,
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub v: f64,
    pub a: f64,
    pub lateral: f64,
    pub disabled: bool,
    pub speeding: bool,
    pub leader: Option<VehicleId>,
    pub occluded: bool,
    pub required_gap: f64,
}

pub struct Simulation {
    track: Track,
    vehicles: Vec<Vehicle>,
    states: VehicleStates,
    speeding: Vec<SpeedingState>,
    perception: Perception,
    controller: Controller,
    backend: ComputeBackend,
    detector: CollisionStrategy,
    response: ContactResponse,

    order: Vec<usize>,
    rank: Vec<usize>,
    perceptions: Vec<PerceptionResult>,
    commands: Vec<ControlOutput>,
    contacts: Vec<Contact>,
    event_log: Vec<CollisionRecord>,

    dt: f64,
    speed_multiplier: f64,
    substep_budget: u32,
    speed_limit: f64,
    accumulator: f64,
    time: f64,
    tick: u64,
    max_speed: f64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let track = Track::new(&config.track);
        let count = config.population.count as usize;
        let generator = DriverGenerator::new(&config.drivers)?;
        let drivers = generator.generate(config.seed, count);

        let weights = WeightedIndex::new(config.vehicle_classes.iter().map(|spec| spec.weight))
            .map_err(|e| ConfigError::invalid("vehicle_classes", e.to_string()))?;
        let [low, high] = config.population.initial_speed_range;
        let jitter = config.population.lateral_jitter;

        let spacing = track.length() / count as f64;
        let mut vehicles = Vec::with_capacity(count);
        let mut states = VehicleStates::with_capacity(count);
        let mut speeding = Vec::with_capacity(count);
        for (i, driver) in drivers.into_iter().enumerate() {
            let mut rng = driver_rng(config.seed, i, RngPurpose::Spawn);
            let class = weights.sample(&mut rng);
            let fraction = if high > low { rng.gen_range(low..=high) } else { low };

            let vehicle = Vehicle::new(VehicleId(i as u32), class, &config.vehicle_classes[class], driver);
            let speed = (driver.desired_speed * fraction).min(vehicle.top_speed);
            states.push(&track, i as f64 * spacing, speed);
            if jitter > 0.0 {
                states.lateral[i] = rng.gen_range(-jitter..=jitter);
                states.sync_world(&track, i);
            }
            speeding.push(SpeedingState::new(&config.speeding, &vehicle.driver, config.seed, i));
            vehicles.push(vehicle);
        }

        let dt = config.physics.dt;
        let perception = Perception::new(&config.perception, config.options.occlusion_enabled);
        let controller = Controller::new(&config.controller, perception.standstill_gap(), dt);
        let backend = ComputeBackend::resolve(&config.options, config.physics.integration_mode);
        let detector = CollisionStrategy::resolve(&config.options, count, dt, &config.collision);

        let substep_budget = if config.options.adaptive_timestep_enabled {
            // Float to int casts saturate; the product must too
            let scale = config.physics.speed_multiplier.ceil().max(1.0) as u32;
            config.physics.max_substeps_per_frame.saturating_mul(scale)
        } else {
            config.physics.max_substeps_per_frame
        };

        info!(
            "Simulation ready: {} vehicles on {:.0} m track (r = {:.1} m), seed {}",
            count,
            track.length(),
            track.radius(),
            config.seed
        );
        info!(
            "Integration: {} ({:?}), collisions: {}, dt = {:.3}s, budget {} sub-steps/frame",
            backend.get_name(),
            config.physics.integration_mode,
            detector.name(),
            dt,
            substep_budget
        );

        let mut simulation = Self {
            track,
            vehicles,
            states,
            speeding,
            perception,
            controller,
            backend,
            detector,
            response: ContactResponse::new(&config.collision),
            order: (0..count).collect(),
            rank: vec![0; count],
            perceptions: vec![PerceptionResult::default(); count],
            commands: vec![ControlOutput::default(); count],
            contacts: Vec::new(),
            event_log: Vec::new(),
            dt,
            speed_multiplier: config.physics.speed_multiplier,
            substep_budget,
            speed_limit: config.track.speed_limit,
            accumulator: 0.0,
            time: 0.0,
            tick: 0,
            max_speed: 0.0,
        };
        simulation.sort_population();
        simulation.max_speed = simulation.states.v.iter().copied().fold(0.0, f64::max);
        Ok(simulation)
    }

    /// Advances by `frame_time` wall-clock seconds scaled by the speed
    /// multiplier, running as many fixed sub-steps as fit in the accumulator.
    pub fn step(&mut self, frame_time: f64) -> TickReport {
        let frame_time = if frame_time.is_finite() && frame_time >= 0.0 {
            frame_time
        } else {
            warn!("Ignoring invalid frame time {}", frame_time);
            0.0
        };

        self.accumulator += frame_time * self.speed_multiplier;
        let mut report = TickReport::default();

        while self.accumulator >= self.dt {
            if report.substeps >= self.substep_budget {
                let kept = self.accumulator % self.dt;
                report.dropped_time = self.accumulator - kept;
                debug!(
                    "Sub-step budget of {} exhausted, dropping {:.4}s of simulated time",
                    self.substep_budget, report.dropped_time
                );
                self.accumulator = kept;
                break;
            }
            self.physics_tick(&mut report);
            self.accumulator -= self.dt;
            report.substeps += 1;
        }

        report.time = self.time;
        report.tick = self.tick;
        report.max_speed = self.max_speed;
        report
    }

    fn sort_population(&mut self) {
        let s = &self.states.s;
        self.order.sort_by(|&a, &b| s[a].total_cmp(&s[b]).then(a.cmp(&b)));
        for (position, &i) in self.order.iter().enumerate() {
            self.rank[i] = position;
        }
    }

    fn physics_tick(&mut self, report: &mut TickReport) {
        let dt = self.dt;
        self.sort_population();

        {
            let view = PopulationView {
                order: &self.order,
                rank: &self.rank,
                states: &self.states,
                vehicles: &self.vehicles,
            };
            for (i, result) in self.perceptions.iter_mut().enumerate() {
                *result = self.perception.perceive(i, &view, &self.track);
            }
        }

        for machine in &mut self.speeding {
            machine.update(dt);
        }

        let curve_share = self.controller.curve_friction_share();
        for (i, vehicle) in self.vehicles.iter().enumerate() {
            let speed = self.states.v[i];
            let preferred = self.speeding[i].desired_speed(vehicle.driver.desired_speed, self.speed_limit);
            // Slow down for the bend reachable within a comfortable stop
            let look_ahead = self.states.s[i] + speed * speed / (2.0 * vehicle.driver.comfort_decel);
            let curve_speed = self
                .track
                .safe_speed(look_ahead, vehicle.tire_friction * curve_share);

            self.commands[i] = self.controller.command(&ControlInput {
                speed,
                prev_accel: self.states.a[i],
                desired_speed: preferred.min(curve_speed),
                perception: &self.perceptions[i],
                vehicle,
                disabled: self.states.is_disabled(i, self.time),
            });
        }

        self.max_speed = self
            .backend
            .integrate(&mut self.states, &self.commands, &self.track, dt);

        let previous_time = self.time;
        self.time += dt;
        self.tick += 1;

        self.sort_population();
        {
            let view = PopulationView {
                order: &self.order,
                rank: &self.rank,
                states: &self.states,
                vehicles: &self.vehicles,
            };
            self.detector
                .detect(&view, &self.track, self.tick, &mut self.contacts);
        }

        let first = self.event_log.len();
        let touched = self.response.apply(
            &mut self.contacts,
            &mut self.states,
            &self.vehicles,
            &self.track,
            self.tick,
            self.time,
            dt,
            &mut self.event_log,
        );
        for i in touched {
            self.detector.invalidate(i);
        }

        let mut disabled = Vec::new();
        for record in &self.event_log[first..] {
            debug!(
                "Collision at t={:.2}s: vehicle {} into {} at s={:.1} m, closing {:.2} m/s",
                record.time, record.follower.0, record.leader.0, record.location, record.relative_speed
            );
            report.collisions.push(record.clone());
            disabled.push(record.follower.index());
            disabled.push(record.leader.index());
        }
        disabled.sort_unstable();
        disabled.dedup();
        for i in disabled {
            report.disabled.push(DisableRecord {
                vehicle: self.vehicles[i].id,
                until: self.states.disabled_until[i],
            });
        }

        for (i, &until) in self.states.disabled_until.iter().enumerate() {
            if previous_time < until && until <= self.time {
                report.reenabled.push(self.vehicles[i].id);
            }
        }
    }

    pub fn vehicle_snapshots(&self) -> Vec<VehicleSnapshot> {
        self.vehicles
            .iter()
            .enumerate()
            .map(|(i, vehicle)| {
                let perception = &self.perceptions[i];
                VehicleSnapshot {
                    id: vehicle.id,
                    class: vehicle.class,
                    s: self.states.s[i],
                    x: self.states.x[i],
                    y: self.states.y[i],
                    heading: self.states.heading[i],
                    v: self.states.v[i],
                    a: self.states.a[i],
                    lateral: self.states.lateral[i],
                    disabled: self.states.is_disabled(i, self.time),
                    speeding: self.speeding[i].is_speeding(),
                    leader: perception.leader.map(|leader| leader.id),
                    occluded: perception.occluded,
                    required_gap: perception.required_gap,
                }
            })
            .collect()
    }

    /// Collision records in the order they happened.
    pub fn event_log(&self) -> &[CollisionRecord] {
        &self.event_log
    }

    pub fn drain_event_log(&mut self) -> Vec<CollisionRecord> {
        std::mem::take(&mut self.event_log)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn states(&self) -> &VehicleStates {
        &self.states
    }

    pub fn driver_params(&self) -> Vec<DriverParams> {
        self.vehicles.iter().map(|v| v.driver).collect()
    }

    pub fn speeding_states(&self) -> &[SpeedingState] {
        &self.speeding
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.detector.stats()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.get_name()
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationMode, SimulationConfig};

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.population.count = 12;
        config
    }

    #[test]
    fn vehicles_spawn_evenly_spaced() {
        let sim = Simulation::new(small_config()).unwrap();
        let spacing = sim.track().length() / 12.0;
        for (i, s) in sim.states().s.iter().enumerate() {
            assert!((s - i as f64 * spacing).abs() < 1e-9);
        }
        assert_eq!(sim.tick(), 0);
    }

    #[test]
    fn accumulator_runs_whole_substeps() {
        let mut sim = Simulation::new(small_config()).unwrap();
        let report = sim.step(0.05);
        assert_eq!(report.substeps, 2);
        assert_eq!(sim.tick(), 2);

        // The 0.01 s remainder completes a sub-step next frame
        let report = sim.step(0.01);
        assert_eq!(report.substeps, 1);
    }

    #[test]
    fn fixed_budget_drops_excess_time() {
        let mut config = small_config();
        config.physics.max_substeps_per_frame = 4;
        let mut sim = Simulation::new(config).unwrap();
        let report = sim.step(1.0);
        assert_eq!(report.substeps, 4);
        assert!(report.dropped_time > 0.9);
        assert_eq!(sim.step(0.0).substeps, 0);
    }

    #[test]
    fn adaptive_budget_scales_with_multiplier() {
        let mut config = small_config();
        config.physics.max_substeps_per_frame = 4;
        config.physics.speed_multiplier = 2.5;
        config.options.adaptive_timestep_enabled = true;
        let mut sim = Simulation::new(config).unwrap();
        let report = sim.step(1.0);
        assert_eq!(report.substeps, 12);
        assert_eq!(sim.dt(), 0.02);
    }

    #[test]
    fn huge_multiplier_saturates_the_budget() {
        let mut config = small_config();
        config.physics.speed_multiplier = 1e10;
        config.options.adaptive_timestep_enabled = true;
        let sim = Simulation::new(config).unwrap();
        assert_eq!(sim.substep_budget, u32::MAX);
    }

    #[test]
    fn invalid_frame_time_is_ignored() {
        let mut sim = Simulation::new(small_config()).unwrap();
        let before = sim.vehicle_snapshots();
        for frame in [f64::NAN, -1.0, f64::INFINITY] {
            let report = sim.step(frame);
            assert_eq!(report.substeps, 0);
        }
        assert_eq!(before, sim.vehicle_snapshots());
    }

    #[test]
    fn planar_mode_keeps_vehicles_on_track() {
        let mut config = small_config();
        config.physics.integration_mode = IntegrationMode::Planar;
        let mut sim = Simulation::new(config).unwrap();
        for _ in 0..300 {
            sim.step(1.0 / 60.0);
        }
        for snapshot in sim.vehicle_snapshots() {
            let expected = sim.track().world_point(snapshot.s, snapshot.lateral);
            assert!((snapshot.x - expected.x).abs() < 1e-9);
            assert!((snapshot.y - expected.y).abs() < 1e-9);
            assert!(snapshot.v >= 0.0);
        }
    }

    #[test]
    fn lateral_jitter_spreads_spawn_offsets() {
        let mut config = small_config();
        config.population.lateral_jitter = 1.5;
        let sim = Simulation::new(config.clone()).unwrap();
        let offsets: Vec<f64> = sim.vehicle_snapshots().iter().map(|v| v.lateral).collect();
        assert!(offsets.iter().all(|o| o.abs() <= 1.5));
        assert!(offsets.iter().any(|o| *o != 0.0));
        for snapshot in sim.vehicle_snapshots() {
            let expected = sim.track().world_point(snapshot.s, snapshot.lateral);
            assert!((snapshot.x - expected.x).abs() < 1e-9);
        }

        let again = Simulation::new(config).unwrap();
        assert_eq!(sim.vehicle_snapshots(), again.vehicle_snapshots());

        let single_lane = Simulation::new(small_config()).unwrap();
        assert!(single_lane.vehicle_snapshots().iter().all(|v| v.lateral == 0.0));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = small_config();
        config.track.length = -5.0;
        let err = Simulation::new(config).err().unwrap();
        assert_eq!(err.field(), Some("track.length"));
    }
}
