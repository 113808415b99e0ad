use super::{Point, Track, Vec2, Vehicle, VehicleId, VehicleStates};
use crate::config::PerceptionConfig;

/// Read-only view of the population sorted by arc-length.
#[derive(Clone, Copy)]
pub struct PopulationView<'a> {
    /// Vehicle indices in increasing arc-length order.
    pub order: &'a [usize],
    /// `rank[i]` is the position of vehicle `i` in `order`.
    pub rank: &'a [usize],
    pub states: &'a VehicleStates,
    pub vehicles: &'a [Vehicle],
}

impl<'a> PopulationView<'a> {
    /// The vehicle `step` places ahead of `subject` in arc-length order.
    pub fn ahead(&self, subject: usize, step: usize) -> usize {
        let n = self.order.len();
        self.order[(self.rank[subject] + step) % n]
    }

    /// True when the two footprints overlap laterally, i.e. one can run into the other.
    pub fn shares_corridor(&self, a: usize, b: usize) -> bool {
        let offset = (self.states.lateral[a] - self.states.lateral[b]).abs();
        offset < (self.vehicles[a].width + self.vehicles[b].width) / 2.0
    }

    /// Bumper-to-bumper gap from `follower` forward to `leader`.
    pub fn gap(&self, track: &Track, follower: usize, leader: usize) -> f64 {
        let distance = track.forward_distance(self.states.s[follower], self.states.s[leader]);
        distance - (self.vehicles[follower].length + self.vehicles[leader].length) / 2.0
    }

    /// Nearest vehicle ahead that shares `subject`'s corridor, ignoring sight lines.
    pub fn physical_leader(&self, subject: usize) -> Option<usize> {
        (1..self.order.len())
            .map(|step| self.ahead(subject, step))
            .find(|&other| self.shares_corridor(subject, other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeaderInfo {
    pub id: VehicleId,
    /// Bumper-to-bumper distance, negative when overlapping.
    pub gap: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerceptionResult {
    pub leader: Option<LeaderInfo>,
    /// At least one vehicle in the subject's corridor was hidden from view.
    pub occluded: bool,
    pub required_gap: f64,
    pub candidates_scanned: u32,
}

impl Default for PerceptionResult {
    fn default() -> Self {
        Self {
            leader: None,
            occluded: false,
            required_gap: 0.0,
            candidates_scanned: 0,
        }
    }
}

/// Dynamic stopping-sight gap.
///
/// `leader` carries the leader's speed and its expected braking; `None` treats
/// the edge of visibility as a stationary obstacle.
pub fn required_gap(
    standstill: f64,
    follower_speed: f64,
    reaction_time: f64,
    follower_decel: f64,
    leader: Option<(f64, f64)>,
) -> f64 {
    let reaction_distance = follower_speed * reaction_time;
    let follower_braking = follower_speed * follower_speed / (2.0 * follower_decel);
    let leader_braking = match leader {
        Some((speed, decel)) => speed * speed / (2.0 * decel),
        None => 0.0,
    };
    standstill.max(reaction_distance + follower_braking - leader_braking)
}

pub struct Perception {
    visual_range: f64,
    standstill_gap: f64,
    occlusion_enabled: bool,
}

impl Perception {
    pub fn new(config: &PerceptionConfig, occlusion_enabled: bool) -> Self {
        Self {
            visual_range: config.visual_range,
            standstill_gap: config.standstill_gap,
            occlusion_enabled,
        }
    }

    pub fn standstill_gap(&self) -> f64 {
        self.standstill_gap
    }

    /// Finds the first unobstructed vehicle ahead of `subject` within visual range.
    ///
    /// The scan walks forward in arc-length order and stops at the first
    /// visible vehicle in the subject's corridor or at the edge of the range.
    pub fn perceive(&self, subject: usize, view: &PopulationView<'_>, track: &Track) -> PerceptionResult {
        let states = view.states;
        let me = &view.vehicles[subject];
        let speed = states.v[subject];
        let mut occluded = false;
        let mut scanned = 0;

        for step in 1..view.order.len() {
            let other = view.ahead(subject, step);
            let distance = track.forward_distance(states.s[subject], states.s[other]);
            if distance > self.visual_range {
                break;
            }
            scanned += 1;

            if !view.shares_corridor(subject, other) {
                continue;
            }

            // Everything scanned so far lies between the two vehicles
            if self.occlusion_enabled && step > 1 && self.is_hidden(subject, other, step, view, track) {
                occluded = true;
                continue;
            }

            let leader = &view.vehicles[other];
            let leader_speed = states.v[other];
            let required = required_gap(
                self.standstill_gap,
                speed,
                me.driver.reaction_time,
                me.driver.comfort_decel,
                Some((leader_speed, leader.driver.max_decel)),
            );

            return PerceptionResult {
                leader: Some(LeaderInfo {
                    id: leader.id,
                    gap: view.gap(track, subject, other),
                    speed: leader_speed,
                }),
                occluded,
                required_gap: required,
                candidates_scanned: scanned,
            };
        }

        PerceptionResult {
            leader: None,
            occluded,
            required_gap: required_gap(
                self.standstill_gap,
                speed,
                me.driver.reaction_time,
                me.driver.comfort_decel,
                None,
            ),
            candidates_scanned: scanned,
        }
    }

    // Both sight lines to the candidate's rear corners pass through intervening vehicles
    fn is_hidden(
        &self,
        subject: usize,
        candidate: usize,
        step: usize,
        view: &PopulationView<'_>,
        track: &Track,
    ) -> bool {
        let states = view.states;
        let me = &view.vehicles[subject];
        let target = &view.vehicles[candidate];

        let eye = track.world_point(states.s[subject] + me.length / 2.0, states.lateral[subject]);
        let rear = states.s[candidate] - target.length / 2.0;
        let corners = [
            track.world_point(rear, states.lateral[candidate] + target.width / 2.0),
            track.world_point(rear, states.lateral[candidate] - target.width / 2.0),
        ];

        corners.iter().all(|&corner| {
            (1..step).any(|between| {
                let blocker = view.ahead(subject, between);
                let body = Footprint::of(blocker, view, track);
                body.intersects_segment(eye, corner)
            })
        })
    }
}

/// Oriented bounding rectangle of a vehicle in world coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Footprint {
    pub center: Point,
    pub heading: f64,
    pub half_length: f64,
    pub half_width: f64,
}

impl Footprint {
    pub fn of(index: usize, view: &PopulationView<'_>, track: &Track) -> Self {
        let vehicle = &view.vehicles[index];
        let s = view.states.s[index];
        Self {
            center: track.world_point(s, view.states.lateral[index]),
            heading: track.pose(s).heading,
            half_length: vehicle.length / 2.0,
            half_width: vehicle.width / 2.0,
        }
    }

    fn to_local(&self, point: Point) -> Vec2 {
        let d = point - self.center;
        let (sin, cos) = self.heading.sin_cos();
        Vec2::new(d.x * cos + d.y * sin, -d.x * sin + d.y * cos)
    }

    /// Liang-Barsky clip of the segment `a`-`b` against the rectangle.
    pub fn intersects_segment(&self, a: Point, b: Point) -> bool {
        let p0 = self.to_local(a);
        let p1 = self.to_local(b);
        let d = p1 - p0;

        let mut t_enter: f64 = 0.0;
        let mut t_exit: f64 = 1.0;
        let slabs = [
            (-d.x, p0.x + self.half_length),
            (d.x, self.half_length - p0.x),
            (-d.y, p0.y + self.half_width),
            (d.y, self.half_width - p0.y),
        ];

        for (p, q) in slabs {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                t_enter = t_enter.max(t);
            } else {
                t_exit = t_exit.min(t);
            }
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}
