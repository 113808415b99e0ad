use nalgebra::{Point2, Vector2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub mod collision;
pub mod drivers;
pub mod engine;
pub mod idm;
pub mod metrics;
pub mod perception;
pub mod speeding;
pub mod stats;
pub mod track;

pub use collision::*;
pub use drivers::*;
pub use engine::*;
pub use idm::*;
pub use metrics::*;
pub use perception::*;
pub use speeding::*;
pub use track::*;

use crate::config::VehicleSpec;

pub type Vec2 = Vector2<f64>;
pub type Point = Point2<f64>;

/// Arena index of a vehicle in the simulation's state arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VehicleId(pub u32);

impl VehicleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-vehicle constants fixed at spawn.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub class: usize,
    pub length: f64,
    pub width: f64,
    pub mass: f64,
    pub tire_friction: f64,
    /// Acceleration cap of this vehicle/driver pairing.
    pub max_accel: f64,
    /// Physical braking limit, negative.
    pub braking_floor: f64,
    pub top_speed: f64,
    pub driver: DriverParams,
}

impl Vehicle {
    pub fn new(id: VehicleId, class: usize, spec: &VehicleSpec, mut driver: DriverParams) -> Self {
        // Driver braking preferences cannot exceed what the class is rated for
        driver.comfort_decel = driver.comfort_decel.min(spec.comfort_decel_cap);
        driver.max_decel = driver.max_decel.min(spec.max_decel_cap).max(driver.comfort_decel);

        Self {
            id,
            class,
            length: spec.length,
            width: spec.width,
            mass: spec.mass,
            tire_friction: spec.tire_friction,
            max_accel: spec.max_acceleration() * (0.75 + 0.5 * driver.aggression),
            braking_floor: spec.braking_floor(),
            top_speed: spec.top_speed(),
            driver,
        }
    }

    /// Hardest braking this vehicle can produce, as a positive magnitude.
    pub fn max_braking(&self) -> f64 {
        -self.braking_floor
    }
}

/// Integrated quantities of one vehicle, read from and written back to [`VehicleStates`] by the scalar integrator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    pub s: f64,
    pub v: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub lateral: f64,
    pub heading: f64,
}

/// Kinematic state of the whole population, stored as parallel arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleStates {
    pub s: Vec<f64>,
    pub v: Vec<f64>,
    pub a: Vec<f64>,
    pub jerk: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub lateral: Vec<f64>,
    pub heading: Vec<f64>,
    pub disabled_until: Vec<f64>,
}

impl VehicleStates {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            s: Vec::with_capacity(n),
            v: Vec::with_capacity(n),
            a: Vec::with_capacity(n),
            jerk: Vec::with_capacity(n),
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            vx: Vec::with_capacity(n),
            vy: Vec::with_capacity(n),
            lateral: Vec::with_capacity(n),
            heading: Vec::with_capacity(n),
            disabled_until: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    /// Appends a vehicle on the centerline at arc-length `s` moving at `v`.
    pub fn push(&mut self, track: &Track, s: f64, v: f64) {
        let pose = track.pose(s);
        self.s.push(track.wrap(s));
        self.v.push(v);
        self.a.push(0.0);
        self.jerk.push(0.0);
        self.x.push(pose.point.x);
        self.y.push(pose.point.y);
        self.vx.push(v * pose.heading.cos());
        self.vy.push(v * pose.heading.sin());
        self.lateral.push(0.0);
        self.heading.push(pose.heading);
        self.disabled_until.push(f64::NEG_INFINITY);
    }

    pub fn is_disabled(&self, index: usize, time: f64) -> bool {
        self.disabled_until[index] > time
    }

    pub fn kinematics(&self, index: usize) -> Kinematics {
        Kinematics {
            s: self.s[index],
            v: self.v[index],
            x: self.x[index],
            y: self.y[index],
            vx: self.vx[index],
            vy: self.vy[index],
            lateral: self.lateral[index],
            heading: self.heading[index],
        }
    }

    pub fn store(&mut self, index: usize, k: Kinematics) {
        self.s[index] = k.s;
        self.v[index] = k.v;
        self.x[index] = k.x;
        self.y[index] = k.y;
        self.vx[index] = k.vx;
        self.vy[index] = k.vy;
        self.lateral[index] = k.lateral;
        self.heading[index] = k.heading;
    }

    /// Recomputes world position, heading and planar velocity from `s`, `lateral` and `v`.
    pub fn sync_world(&mut self, track: &Track, index: usize) {
        let pose = track.pose(self.s[index]);
        let point = track.world_point(self.s[index], self.lateral[index]);
        self.x[index] = point.x;
        self.y[index] = point.y;
        self.heading[index] = pose.heading;
        self.vx[index] = self.v[index] * pose.heading.cos();
        self.vy[index] = self.v[index] * pose.heading.sin();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RngPurpose {
    Params = 0,
    Speeding = 1,
    Spawn = 2,
}

/// Independent random stream for one driver, derived only from the master seed.
pub(crate) fn driver_rng(seed: u64, index: usize, purpose: RngPurpose) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(3 * index as u64 + purpose as u64);
    rng
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn driver_streams_are_independent_of_each_other() {
        let mut a = driver_rng(1, 0, RngPurpose::Params);
        let mut b = driver_rng(1, 0, RngPurpose::Speeding);
        let mut c = driver_rng(1, 0, RngPurpose::Params);
        let first = a.next_u64();
        assert_ne!(first, b.next_u64());
        assert_eq!(first, c.next_u64());
    }

    #[test]
    fn sync_world_places_vehicle_on_track() {
        let track = Track::from_parts(1000.0, 0.4);
        let mut states = VehicleStates::with_capacity(1);
        states.push(&track, 250.0, 10.0);
        states.lateral[0] = 0.5;
        states.sync_world(&track, 0);
        let expected = track.world_point(250.0, 0.5);
        assert!((states.x[0] - expected.x).abs() < 1e-12);
        assert!((states.y[0] - expected.y).abs() < 1e-12);
    }
}
