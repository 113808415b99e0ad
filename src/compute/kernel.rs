use crate::config::IntegrationMode;
use crate::simulation::{Kinematics, Point, Track, Vec2};

/// Advances one vehicle by `dt` under constant acceleration `accel`.
///
/// The scalar backend calls this per vehicle. The batched backend runs the
/// same [`arc_motion`], [`planar_motion`] and [`world_pose`] over whole
/// arrays, so both agree to the last bit.
#[inline]
pub fn advance(track: &Track, mut k: Kinematics, accel: f64, dt: f64, mode: IntegrationMode) -> Kinematics {
    let (s, v) = match mode {
        IntegrationMode::ArcLength => {
            let (s, v) = arc_motion(k.s, k.v, accel, dt);
            (track.wrap(s), v)
        }
        IntegrationMode::Planar => planar_motion(
            track,
            k.s,
            k.v,
            k.lateral,
            Point::new(k.x, k.y),
            Vec2::new(k.vx, k.vy),
            accel,
            dt,
        ),
    };
    k.s = s;
    k.v = v;

    let pose = world_pose(track, k.s, k.lateral, k.v);
    k.x = pose.x;
    k.y = pose.y;
    k.heading = pose.heading;
    k.vx = pose.vx;
    k.vy = pose.vy;
    k
}

/// Exact constant-acceleration update of arc-length and speed. `s` is not wrapped.
#[inline]
pub fn arc_motion(s: f64, v: f64, accel: f64, dt: f64) -> (f64, f64) {
    if v + accel * dt < 0.0 {
        // A vehicle that would reverse within the step stops instead
        let travel = if accel < 0.0 { v * v / (2.0 * -accel) } else { 0.0 };
        (s + travel, 0.0)
    } else {
        (s + v * dt + 0.5 * accel * dt * dt, v + accel * dt)
    }
}

/// Planar update: tangential `accel` plus the centripetal pull of the lane,
/// integrated in x/y and projected back onto the track. Returns wrapped `s` and `v`.
#[allow(clippy::too_many_arguments)]
#[inline]
pub fn planar_motion(
    track: &Track,
    s: f64,
    v: f64,
    lateral: f64,
    position: Point,
    velocity: Vec2,
    accel: f64,
    dt: f64,
) -> (f64, f64) {
    if v + accel * dt < 0.0 {
        let (s, v) = arc_motion(s, v, accel, dt);
        return (track.wrap(s), v);
    }

    let tangent = track.tangent(s);
    let normal = track.normal(s);
    // The lane is a parallel curve, tighter on the inside of a bend
    let curvature = match track.curvature(s) {
        c if c > 0.0 => 1.0 / (1.0 / c - lateral),
        _ => 0.0,
    };
    let centripetal = v * v * curvature;
    let acceleration: Vec2 = tangent * accel + normal * centripetal;

    let position = position + velocity * dt + acceleration * (0.5 * dt * dt);
    let velocity = velocity + acceleration * dt;

    // Snap back onto the vehicle's lane offset; only the along-track part survives
    let (s, _) = track.project(position);
    (s, velocity.dot(&track.tangent(s)).max(0.0))
}

/// World-frame placement derived from arc-length, lane offset and speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub vx: f64,
    pub vy: f64,
}

#[inline]
pub fn world_pose(track: &Track, s: f64, lateral: f64, v: f64) -> WorldPose {
    let heading = track.pose(s).heading;
    let point = track.world_point(s, lateral);
    let (sin, cos) = heading.sin_cos();
    WorldPose {
        x: point.x,
        y: point.y,
        heading,
        vx: v * cos,
        vy: v * sin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn at(track: &Track, s: f64, v: f64) -> Kinematics {
        let pose = world_pose(track, s, 0.0, v);
        Kinematics {
            s,
            v,
            x: pose.x,
            y: pose.y,
            vx: pose.vx,
            vy: pose.vy,
            lateral: 0.0,
            heading: pose.heading,
        }
    }

    #[test]
    fn arc_step_is_exact_under_constant_acceleration() {
        let track = Track::from_parts(1000.0, 0.4);
        let k = advance(&track, at(&track, 10.0, 20.0), 1.5, 0.1, IntegrationMode::ArcLength);
        assert_abs_diff_eq!(k.s, 10.0 + 2.0 + 0.0075, epsilon = 1e-12);
        assert_abs_diff_eq!(k.v, 20.15, epsilon = 1e-12);
    }

    #[test]
    fn braking_through_zero_stops_at_rest() {
        let track = Track::from_parts(1000.0, 0.4);
        let k = advance(&track, at(&track, 100.0, 0.3), -6.0, 0.1, IntegrationMode::ArcLength);
        assert_eq!(k.v, 0.0);
        assert_abs_diff_eq!(k.s, 100.0 + 0.09 / 12.0, epsilon = 1e-12);

        let still = advance(&track, at(&track, 100.0, 0.0), -6.0, 0.1, IntegrationMode::Planar);
        assert_eq!(still.v, 0.0);
        assert_eq!(still.s, 100.0);
    }

    #[test]
    fn arc_step_wraps_past_the_origin() {
        let track = Track::from_parts(1000.0, 0.4);
        let k = advance(&track, at(&track, 999.0, 20.0), 0.0, 0.1, IntegrationMode::ArcLength);
        assert_abs_diff_eq!(k.s, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn arc_motion_is_unwrapped() {
        assert_eq!(arc_motion(999.0, 20.0, 0.0, 0.1), (1001.0, 20.0));
        let (s, v) = arc_motion(5.0, 0.0, 1.0, 0.1);
        assert_abs_diff_eq!(s, 5.005, epsilon = 1e-12);
        assert_abs_diff_eq!(v, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn planar_step_follows_the_bend() {
        let track = Track::from_parts(1000.0, 0.4);
        let start = track.straight_length() + 50.0;
        let mut k = at(&track, start, 20.0);
        let mut arc = k;
        for _ in 0..50 {
            k = advance(&track, k, 0.0, 0.02, IntegrationMode::Planar);
            arc = advance(&track, arc, 0.0, 0.02, IntegrationMode::ArcLength);
        }
        assert_abs_diff_eq!(k.s, arc.s, epsilon = 2e-2);
        assert_abs_diff_eq!(k.v, 20.0, epsilon = 2e-2);
    }
}
