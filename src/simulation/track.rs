use super::{Point, Vec2};
use crate::config::{TrackConfig, GRAVITY};
use std::f64::consts::PI;

/// Stadium-shaped closed track: two straights joined by two semicircles.
///
/// Arc-length zero is the left end of the bottom straight and vehicles travel
/// counter-clockwise, so the inside of the track is always on the left.
#[derive(Debug, Clone)]
pub struct Track {
    length: f64,
    radius: f64,
    straight_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub point: Point,
    pub heading: f64,
}

impl Track {
    pub fn new(config: &TrackConfig) -> Self {
        Self::from_parts(config.length, config.straight_fraction)
    }

    pub fn from_parts(length: f64, straight_fraction: f64) -> Self {
        let straight_length = straight_fraction * length / 2.0;
        let radius = (1.0 - straight_fraction) * length / (2.0 * PI);
        Self {
            length,
            radius,
            straight_length,
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn straight_length(&self) -> f64 {
        self.straight_length
    }

    pub fn wrap(&self, s: f64) -> f64 {
        let wrapped = s.rem_euclid(self.length);
        // rem_euclid rounds tiny negatives up to the modulus itself
        if wrapped >= self.length {
            0.0
        } else {
            wrapped
        }
    }

    /// Distance travelled going forward from `from` to reach `to`, in [0, length).
    pub fn forward_distance(&self, from: f64, to: f64) -> f64 {
        self.wrap(to - from)
    }

    // Segment boundaries along the centerline
    fn bounds(&self) -> (f64, f64, f64) {
        let arc = PI * self.radius;
        let first = self.straight_length;
        (first, first + arc, 2.0 * first + arc)
    }

    pub fn pose(&self, s: f64) -> Pose {
        let s = self.wrap(s);
        let half = self.straight_length / 2.0;
        let r = self.radius;
        let (b0, b1, b2) = self.bounds();

        if s < b0 {
            Pose {
                point: Point::new(-half + s, -r),
                heading: 0.0,
            }
        } else if s < b1 {
            let theta = (s - b0) / r;
            let phi = -PI / 2.0 + theta;
            Pose {
                point: Point::new(half + r * phi.cos(), r * phi.sin()),
                heading: theta,
            }
        } else if s < b2 {
            Pose {
                point: Point::new(half - (s - b1), r),
                heading: PI,
            }
        } else {
            let theta = (s - b2) / r;
            let phi = PI / 2.0 + theta;
            Pose {
                point: Point::new(-half + r * phi.cos(), r * phi.sin()),
                heading: PI + theta,
            }
        }
    }

    /// World position of a point `lateral` metres left of the centerline at `s`.
    pub fn world_point(&self, s: f64, lateral: f64) -> Point {
        let pose = self.pose(s);
        pose.point + normal_of(pose.heading) * lateral
    }

    pub fn tangent(&self, s: f64) -> Vec2 {
        let heading = self.pose(s).heading;
        Vec2::new(heading.cos(), heading.sin())
    }

    /// Unit normal pointing to the left of travel, i.e. toward the inside.
    pub fn normal(&self, s: f64) -> Vec2 {
        normal_of(self.pose(s).heading)
    }

    pub fn curvature(&self, s: f64) -> f64 {
        let s = self.wrap(s);
        let (b0, b1, b2) = self.bounds();
        if (b0..b1).contains(&s) || s >= b2 {
            1.0 / self.radius
        } else {
            0.0
        }
    }

    /// Highest speed at which the lateral acceleration stays within `friction`.
    pub fn safe_speed(&self, s: f64, friction: f64) -> f64 {
        let curvature = self.curvature(s);
        if curvature > 0.0 {
            (friction * GRAVITY / curvature).sqrt()
        } else {
            f64::INFINITY
        }
    }

    /// Nearest centerline arc-length and signed lateral offset for a world point.
    pub fn project(&self, point: Point) -> (f64, f64) {
        let half = self.straight_length / 2.0;
        let r = self.radius;
        let (b0, b1, b2) = self.bounds();

        if point.x > half {
            let offset = Vec2::new(point.x - half, point.y);
            let phi = offset.y.atan2(offset.x);
            (self.wrap(b0 + (phi + PI / 2.0) * r), r - offset.norm())
        } else if point.x < -half {
            let offset = Vec2::new(point.x + half, point.y);
            let phi = offset.y.atan2(offset.x).rem_euclid(2.0 * PI);
            (self.wrap(b2 + (phi - PI / 2.0) * r), r - offset.norm())
        } else if point.y < 0.0 {
            (self.wrap(point.x + half), point.y + r)
        } else {
            (self.wrap(b1 + (half - point.x)), r - point.y)
        }
    }
}

fn normal_of(heading: f64) -> Vec2 {
    Vec2::new(-heading.sin(), heading.cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track() -> Track {
        Track::from_parts(1000.0, 0.4)
    }

    #[test]
    fn geometry_adds_up() {
        let t = track();
        assert_relative_eq!(t.straight_length(), 200.0);
        assert_relative_eq!(2.0 * t.straight_length() + 2.0 * PI * t.radius(), 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn pose_is_continuous_across_segments() {
        let t = track();
        let (b0, b1, b2) = t.bounds();
        for boundary in [b0, b1, b2, t.length()] {
            let before = t.pose(boundary - 1e-7).point;
            let after = t.pose(boundary + 1e-7).point;
            assert!((before - after).norm() < 1e-5, "jump at s = {}", boundary);
        }
    }

    #[test]
    fn curvature_and_safe_speed() {
        let t = track();
        assert_eq!(t.curvature(10.0), 0.0);
        assert_relative_eq!(t.curvature(250.0), 1.0 / t.radius());
        assert!(t.safe_speed(10.0, 0.9).is_infinite());
        assert_relative_eq!(t.safe_speed(250.0, 0.9), (0.9 * GRAVITY * t.radius()).sqrt());
    }

    #[test]
    fn normal_points_inward() {
        let t = track();
        for s in [50.0, 300.0, 550.0, 900.0] {
            let inside = t.world_point(s, 1.0);
            let centerline = t.pose(s).point;
            assert!(inside.coords.norm() < centerline.coords.norm());
        }
    }

    #[test]
    fn projection_recovers_offset_points() {
        let t = track();
        for s in [5.0, 180.0, 330.0, 480.0, 700.0, 995.0] {
            let (ps, lateral) = t.project(t.world_point(s, 0.75));
            assert_relative_eq!(ps, s, epsilon = 1e-6);
            assert_relative_eq!(lateral, 0.75, epsilon = 1e-6);
        }
    }

    #[test]
    fn forward_distance_wraps() {
        let t = track();
        assert_relative_eq!(t.forward_distance(990.0, 10.0), 20.0, epsilon = 1e-9);
        assert_relative_eq!(t.forward_distance(10.0, 990.0), 980.0, epsilon = 1e-9);
        assert_eq!(t.wrap(-1e-18), 0.0);
    }
}
