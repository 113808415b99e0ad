#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{kernel, max_speed, IntegrationBackend};
use crate::config::IntegrationMode;
use crate::simulation::{ControlOutput, Point, Track, Vec2, VehicleStates};

/// Vehicles integrated per lane block.
pub const LANES: usize = 8;

/// Integrator that works on the state arrays in place, one lane block at a time.
///
/// The first pass advances `s` and `v` for every vehicle, the second rebuilds
/// world position, heading and planar velocity from the new `s`. With the
/// `parallel` feature the blocks of each pass are spread over the rayon
/// thread pool. Every vehicle only touches its own slots, so the result does
/// not depend on scheduling.
pub struct BatchedBackend {
    mode: IntegrationMode,
}

impl BatchedBackend {
    pub fn new(mode: IntegrationMode) -> Self {
        Self { mode }
    }
}

fn advance_arc(states: &mut VehicleStates, track: &Track, dt: f64) {
    let VehicleStates { s, v, a, .. } = states;

    #[cfg(not(feature = "parallel"))]
    let blocks = s.chunks_mut(LANES).zip(v.chunks_mut(LANES)).zip(a.chunks(LANES));
    #[cfg(feature = "parallel")]
    let blocks = s
        .par_chunks_mut(LANES)
        .zip(v.par_chunks_mut(LANES))
        .zip(a.par_chunks(LANES));

    blocks.for_each(|((s, v), a)| {
        for lane in 0..s.len() {
            let (next_s, next_v) = kernel::arc_motion(s[lane], v[lane], a[lane], dt);
            s[lane] = track.wrap(next_s);
            v[lane] = next_v;
        }
    });
}

fn advance_planar(states: &mut VehicleStates, track: &Track, dt: f64) {
    let VehicleStates {
        s,
        v,
        a,
        x,
        y,
        vx,
        vy,
        lateral,
        ..
    } = states;
    let (a, x, y, vx, vy, lateral) = (&*a, &*x, &*y, &*vx, &*vy, &*lateral);

    #[cfg(not(feature = "parallel"))]
    let blocks = s.chunks_mut(LANES).zip(v.chunks_mut(LANES)).enumerate();
    #[cfg(feature = "parallel")]
    let blocks = s.par_chunks_mut(LANES).zip(v.par_chunks_mut(LANES)).enumerate();

    blocks.for_each(|(block, (s, v))| {
        let base = block * LANES;
        for lane in 0..s.len() {
            let i = base + lane;
            let (next_s, next_v) = kernel::planar_motion(
                track,
                s[lane],
                v[lane],
                lateral[i],
                Point::new(x[i], y[i]),
                Vec2::new(vx[i], vy[i]),
                a[i],
                dt,
            );
            s[lane] = next_s;
            v[lane] = next_v;
        }
    });
}

fn place_all(states: &mut VehicleStates, track: &Track) {
    let VehicleStates {
        s,
        v,
        x,
        y,
        vx,
        vy,
        lateral,
        heading,
        ..
    } = states;
    let (s, v, lateral) = (&*s, &*v, &*lateral);

    #[cfg(not(feature = "parallel"))]
    let blocks = x
        .chunks_mut(LANES)
        .zip(y.chunks_mut(LANES))
        .zip(heading.chunks_mut(LANES))
        .zip(vx.chunks_mut(LANES))
        .zip(vy.chunks_mut(LANES))
        .enumerate();
    #[cfg(feature = "parallel")]
    let blocks = x
        .par_chunks_mut(LANES)
        .zip(y.par_chunks_mut(LANES))
        .zip(heading.par_chunks_mut(LANES))
        .zip(vx.par_chunks_mut(LANES))
        .zip(vy.par_chunks_mut(LANES))
        .enumerate();

    blocks.for_each(|(block, ((((x, y), heading), vx), vy))| {
        let base = block * LANES;
        for lane in 0..x.len() {
            let i = base + lane;
            let pose = kernel::world_pose(track, s[i], lateral[i], v[i]);
            x[lane] = pose.x;
            y[lane] = pose.y;
            heading[lane] = pose.heading;
            vx[lane] = pose.vx;
            vy[lane] = pose.vy;
        }
    });
}

impl IntegrationBackend for BatchedBackend {
    fn integrate(&mut self, states: &mut VehicleStates, commands: &[ControlOutput], track: &Track, dt: f64) -> f64 {
        for ((a, jerk), command) in states.a.iter_mut().zip(states.jerk.iter_mut()).zip(commands) {
            *a = command.accel;
            *jerk = command.jerk;
        }

        match self.mode {
            IntegrationMode::ArcLength => advance_arc(states, track, dt),
            IntegrationMode::Planar => advance_planar(states, track, dt),
        }
        place_all(states, track);
        max_speed(states)
    }

    fn get_name(&self) -> &'static str {
        if cfg!(feature = "parallel") {
            "batched-parallel"
        } else {
            "batched"
        }
    }

    fn is_batched(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ScalarBackend;

    #[test]
    fn matches_scalar_bit_for_bit() {
        let track = Track::from_parts(800.0, 0.3);
        let mut states = VehicleStates::with_capacity(37);
        for i in 0..37 {
            states.push(&track, i as f64 * 21.0, 5.0 + i as f64 * 0.7);
        }
        let commands: Vec<ControlOutput> = (0..37)
            .map(|i| ControlOutput {
                accel: (i as f64 * 0.37).sin() * 3.0,
                jerk: 0.0,
                commanded: 0.0,
            })
            .collect();

        for mode in [IntegrationMode::ArcLength, IntegrationMode::Planar] {
            let mut scalar_states = states.clone();
            let mut batched_states = states.clone();
            let mut scalar = ScalarBackend::new(mode);
            let mut batched = BatchedBackend::new(mode);
            for _ in 0..200 {
                let a = scalar.integrate(&mut scalar_states, &commands, &track, 0.02);
                let b = batched.integrate(&mut batched_states, &commands, &track, 0.02);
                assert_eq!(a, b);
            }
            assert_eq!(scalar_states, batched_states);
        }
    }

    #[test]
    fn lanes_are_updated_independently() {
        let track = Track::from_parts(800.0, 0.3);
        let mut states = VehicleStates::with_capacity(LANES + 3);
        for i in 0..LANES + 3 {
            states.push(&track, i as f64 * 30.0, 10.0);
        }
        // Odd vehicles brake through zero, even ones cruise
        let commands: Vec<ControlOutput> = (0..LANES + 3)
            .map(|i| ControlOutput {
                accel: if i % 2 == 1 { -600.0 } else { 0.0 },
                jerk: 0.0,
                commanded: 0.0,
            })
            .collect();

        let top = BatchedBackend::new(IntegrationMode::ArcLength).integrate(&mut states, &commands, &track, 0.02);
        assert_eq!(top, 10.0);
        for i in 0..LANES + 3 {
            if i % 2 == 1 {
                assert_eq!(states.v[i], 0.0);
                assert_eq!(states.vx[i], 0.0);
            } else {
                assert_eq!(states.v[i], 10.0);
                assert!((states.s[i] - (i as f64 * 30.0 + 0.2)).abs() < 1e-12);
            }
            let pose = track.world_point(states.s[i], 0.0);
            assert_eq!((states.x[i], states.y[i]), (pose.x, pose.y));
        }
    }
}
