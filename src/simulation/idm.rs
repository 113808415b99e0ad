use super::{PerceptionResult, Vehicle};
use crate::config::ControllerConfig;

/// Everything the controller needs for one vehicle on one tick.
#[derive(Debug, Clone, Copy)]
pub struct ControlInput<'a> {
    pub speed: f64,
    /// Applied acceleration from the previous tick.
    pub prev_accel: f64,
    /// Desired speed after speeding and curve adjustments.
    pub desired_speed: f64,
    pub perception: &'a PerceptionResult,
    pub vehicle: &'a Vehicle,
    pub disabled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlOutput {
    /// Acceleration after jerk limiting, actuation lag and the physical floor.
    pub accel: f64,
    pub jerk: f64,
    /// Raw command before the actuation stages.
    pub commanded: f64,
}

/// Intelligent Driver Model with jerk limiting and first-order actuation lag.
#[derive(Debug, Clone)]
pub struct Controller {
    delta: f64,
    gap_epsilon: f64,
    standstill_gap: f64,
    curve_friction_share: f64,
    dt: f64,
}

impl Controller {
    pub fn new(config: &ControllerConfig, standstill_gap: f64, dt: f64) -> Self {
        Self {
            delta: config.delta,
            gap_epsilon: config.gap_epsilon,
            standstill_gap,
            curve_friction_share: config.curve_friction_share,
            dt,
        }
    }

    /// Share of tire friction drivers are willing to use for cornering.
    pub fn curve_friction_share(&self) -> f64 {
        self.curve_friction_share
    }

    /// Raw IDM acceleration. `leader` is `(gap, approach_rate)`.
    pub fn idm(
        &self,
        speed: f64,
        desired_speed: f64,
        max_accel: f64,
        comfort_decel: f64,
        time_headway: f64,
        leader: Option<(f64, f64)>,
    ) -> f64 {
        let free = if desired_speed > f64::EPSILON {
            1.0 - (speed / desired_speed).powf(self.delta)
        } else if speed > 0.0 {
            -1.0
        } else {
            0.0
        };

        let interaction = match leader {
            Some((gap, approach)) => {
                let gap = gap.max(self.gap_epsilon);
                let dynamic = speed * time_headway
                    + speed * approach / (2.0 * (max_accel * comfort_decel).sqrt());
                let desired_gap = self.standstill_gap + dynamic.max(0.0);
                (desired_gap / gap).powi(2)
            }
            None => 0.0,
        };

        max_accel * (free - interaction)
    }

    pub fn command(&self, input: &ControlInput<'_>) -> ControlOutput {
        let vehicle = input.vehicle;
        let driver = &vehicle.driver;
        let max_accel = vehicle.max_accel;
        let speed = input.speed;

        let desired = input.desired_speed.min(vehicle.top_speed);
        let leader = input.perception.leader.map(|l| (l.gap, speed - l.speed));
        let mut following = self.idm(
            speed,
            desired,
            max_accel,
            driver.comfort_decel,
            driver.time_headway,
            leader,
        );

        // Inside the stopping-sight gap and closing: brake at least kinematically
        if let Some(l) = input.perception.leader {
            let closing = speed - l.speed;
            if l.gap < input.perception.required_gap && closing > 0.0 {
                let room = (l.gap - self.standstill_gap).max(self.gap_epsilon);
                following = following.min(-closing * closing / (2.0 * room));
            }
        }

        let commanded = if input.disabled {
            // Roll to rest, still braking harder when the vehicle ahead demands it
            let to_rest = if speed > 0.0 { -driver.comfort_decel } else { 0.0 };
            to_rest.min(following)
        } else {
            following
        };
        let commanded = commanded.clamp(-driver.max_decel, max_accel);

        let prev = input.prev_accel;
        let max_step = driver.jerk_limit * self.dt;
        let limited = commanded.clamp(prev - max_step, prev + max_step);

        let tau = if limited > prev {
            driver.throttle_tau
        } else {
            driver.brake_tau
        };
        let alpha = 1.0 - (-self.dt / tau).exp();
        let lagged = prev + (limited - prev) * alpha;

        let accel = lagged.max(vehicle.braking_floor);
        debug_assert!(accel.is_finite(), "non-finite acceleration {}", accel);

        ControlOutput {
            accel,
            jerk: (accel - prev) / self.dt,
            commanded,
        }
    }
}
