use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{PopulationView, Track, Vehicle, VehicleId, VehicleStates};
use crate::config::{CollisionConfig, EngineOptions};

/// Heap entry: re-examine `follower` at `due_tick` unless its version moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollisionEvent {
    pub due_tick: u64,
    pub follower: VehicleId,
    pub version: u64,
}

/// A confirmed overlap between a follower and the vehicle directly ahead of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub follower: usize,
    pub leader: usize,
}

/// Entry of the collision event log.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionRecord {
    pub tick: u64,
    pub time: f64,
    pub follower: VehicleId,
    pub leader: VehicleId,
    /// Arc-length of the point of contact.
    pub location: f64,
    /// Closing speed just before the impulse.
    pub relative_speed: f64,
    /// Time into the impacting sub-step at which contact began.
    pub ttc_at_impact: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub pushed: u64,
    pub stale_discarded: u64,
    pub exact_checks: u64,
    pub contacts: u64,
}

/// Earliest time the follower could close `gap` down to `guard`.
///
/// Worst case: the follower accelerates at `follower_accel` while the leader
/// brakes at `leader_braking` until it stops. The result is a lower bound on
/// the true contact time for any behaviour within those limits.
pub fn predict_contact(
    gap: f64,
    follower_speed: f64,
    leader_speed: f64,
    follower_accel: f64,
    leader_braking: f64,
    guard: f64,
) -> f64 {
    let room = gap - guard;
    if room <= 0.0 {
        return 0.0;
    }

    let a = follower_accel.max(1e-9);
    let b = leader_braking.max(1e-9);
    let vf = follower_speed.max(0.0);
    let vl = leader_speed.max(0.0);

    // Leader still braking: room + (vl - vf)t - (a + b)t^2/2 = 0
    let approach = vl - vf;
    let t_braking = (approach + (approach * approach + 2.0 * (a + b) * room).sqrt()) / (a + b);
    if t_braking <= vl / b {
        return t_braking;
    }

    // Leader at rest after covering vl^2/2b: room' - vf t - a t^2/2 = 0
    let room = room + vl * vl / (2.0 * b);
    2.0 * room / (vf + (vf * vf + 2.0 * a * room).sqrt())
}

/// Overlap depth between `follower` and the vehicle ahead of it, if any.
pub fn exact_overlap(view: &PopulationView<'_>, track: &Track, follower: usize, leader: usize) -> Option<f64> {
    if !view.shares_corridor(follower, leader) {
        return None;
    }
    let overlap = -view.gap(track, follower, leader);
    (overlap > 0.0).then_some(overlap)
}

pub trait CollisionDetector {
    /// Appends every contact present after the integration of `tick`.
    fn detect(&mut self, view: &PopulationView<'_>, track: &Track, tick: u64, contacts: &mut Vec<Contact>);

    /// Marks a vehicle whose state jumped outside the predicted envelope.
    fn invalidate(&mut self, vehicle: usize);

    fn stats(&self) -> SchedulerStats;

    fn name(&self) -> &'static str;
}

/// Predictive collision scheduler with version-stamped lazy invalidation.
pub struct CollisionScheduler {
    heap: BinaryHeap<Reverse<CollisionEvent>>,
    versions: Vec<u64>,
    leaders: Vec<Option<usize>>,
    pending: Vec<usize>,
    dt: f64,
    horizon_ticks: u64,
    guard_band: f64,
    stats: SchedulerStats,
}

impl CollisionScheduler {
    pub fn new(population: usize, dt: f64, config: &CollisionConfig) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(population * 2),
            versions: vec![0; population],
            leaders: vec![None; population],
            pending: Vec::new(),
            dt,
            horizon_ticks: ((config.horizon / dt).floor() as u64).max(1),
            guard_band: config.guard_band,
            stats: SchedulerStats::default(),
        }
    }

    pub fn pending_events(&self) -> usize {
        self.heap.len()
    }

    fn push(&mut self, follower: usize, due_tick: u64) {
        self.versions[follower] += 1;
        if self.leaders[follower].is_none() {
            return;
        }
        self.heap.push(Reverse(CollisionEvent {
            due_tick,
            follower: VehicleId(follower as u32),
            version: self.versions[follower],
        }));
        self.stats.pushed += 1;
    }

    fn reschedule(&mut self, follower: usize, view: &PopulationView<'_>, track: &Track, tick: u64) {
        let Some(leader) = self.leaders[follower] else {
            self.versions[follower] += 1;
            return;
        };

        let ttc = predict_contact(
            view.gap(track, follower, leader),
            view.states.v[follower],
            view.states.v[leader],
            view.vehicles[follower].max_accel,
            view.vehicles[leader].max_braking(),
            self.guard_band,
        );
        let ticks = (ttc / self.dt).floor();
        let ticks = if ticks.is_finite() {
            (ticks as u64).clamp(1, self.horizon_ticks)
        } else {
            self.horizon_ticks
        };
        self.push(follower, tick + ticks);
    }
}

impl CollisionDetector for CollisionScheduler {
    fn detect(&mut self, view: &PopulationView<'_>, track: &Track, tick: u64, contacts: &mut Vec<Contact>) {
        // A new vehicle ahead invalidates the old prediction; check right away
        for follower in 0..self.leaders.len() {
            let leader = view.physical_leader(follower);
            if leader != self.leaders[follower] {
                self.leaders[follower] = leader;
                self.push(follower, tick);
            }
        }

        // Discontinuous changes affect the vehicle itself and whoever follows it
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_unstable();
        pending.dedup();
        for &vehicle in &pending {
            self.push(vehicle, tick);
            for follower in 0..self.leaders.len() {
                if self.leaders[follower] == Some(vehicle) && follower != vehicle {
                    self.push(follower, tick);
                }
            }
        }
        pending.clear();
        self.pending = pending;

        while let Some(&Reverse(event)) = self.heap.peek() {
            if event.due_tick > tick {
                break;
            }
            self.heap.pop();

            let follower = event.follower.index();
            if event.version != self.versions[follower] {
                self.stats.stale_discarded += 1;
                continue;
            }
            let Some(leader) = self.leaders[follower] else {
                continue;
            };

            self.stats.exact_checks += 1;
            if exact_overlap(view, track, follower, leader).is_some() {
                self.stats.contacts += 1;
                contacts.push(Contact { follower, leader });
            }
            self.reschedule(follower, view, track, tick);
        }

        log::trace!(
            "tick {}: {} pending collision events, {} contacts",
            tick,
            self.heap.len(),
            contacts.len()
        );
    }

    fn invalidate(&mut self, vehicle: usize) {
        self.pending.push(vehicle);
    }

    fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn name(&self) -> &'static str {
        "event-scheduler"
    }
}

/// Reference detector: exact overlap test on every pair, every tick.
#[derive(Default)]
pub struct ExhaustiveChecker {
    stats: SchedulerStats,
}

impl CollisionDetector for ExhaustiveChecker {
    fn detect(&mut self, view: &PopulationView<'_>, track: &Track, _tick: u64, contacts: &mut Vec<Contact>) {
        let n = view.states.len();
        for a in 0..n {
            for b in (a + 1)..n {
                self.stats.exact_checks += 1;
                let ahead = track.forward_distance(view.states.s[a], view.states.s[b]);
                let behind = track.forward_distance(view.states.s[b], view.states.s[a]);
                let (follower, leader) = if ahead <= behind { (a, b) } else { (b, a) };
                if exact_overlap(view, track, follower, leader).is_some() {
                    self.stats.contacts += 1;
                    contacts.push(Contact { follower, leader });
                }
            }
        }
    }

    fn invalidate(&mut self, _vehicle: usize) {}

    fn stats(&self) -> SchedulerStats {
        self.stats
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}

pub enum CollisionStrategy {
    Scheduled(CollisionScheduler),
    Exhaustive(ExhaustiveChecker),
}

impl CollisionStrategy {
    pub fn resolve(options: &EngineOptions, population: usize, dt: f64, config: &CollisionConfig) -> Self {
        if options.event_scheduler_enabled {
            CollisionStrategy::Scheduled(CollisionScheduler::new(population, dt, config))
        } else {
            CollisionStrategy::Exhaustive(ExhaustiveChecker::default())
        }
    }
}

impl CollisionDetector for CollisionStrategy {
    fn detect(&mut self, view: &PopulationView<'_>, track: &Track, tick: u64, contacts: &mut Vec<Contact>) {
        match self {
            CollisionStrategy::Scheduled(detector) => detector.detect(view, track, tick, contacts),
            CollisionStrategy::Exhaustive(detector) => detector.detect(view, track, tick, contacts),
        }
    }

    fn invalidate(&mut self, vehicle: usize) {
        match self {
            CollisionStrategy::Scheduled(detector) => detector.invalidate(vehicle),
            CollisionStrategy::Exhaustive(detector) => detector.invalidate(vehicle),
        }
    }

    fn stats(&self) -> SchedulerStats {
        match self {
            CollisionStrategy::Scheduled(detector) => detector.stats(),
            CollisionStrategy::Exhaustive(detector) => detector.stats(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CollisionStrategy::Scheduled(detector) => detector.name(),
            CollisionStrategy::Exhaustive(detector) => detector.name(),
        }
    }
}

/// Restitution impulse, separation and disable penalty for confirmed contacts.
pub struct ContactResponse {
    restitution: f64,
    disable_duration: f64,
    guard_band: f64,
    /// Pairs resolved on the previous tick, sorted.
    in_contact: Vec<(usize, usize)>,
}

impl ContactResponse {
    pub fn new(config: &CollisionConfig) -> Self {
        Self {
            restitution: config.restitution,
            disable_duration: config.disable_duration,
            guard_band: config.guard_band,
            in_contact: Vec::new(),
        }
    }

    /// Resolves contacts in follower order and returns the vehicles whose state jumped.
    ///
    /// Every overlapping pair is pushed apart to `guard_band`. Only impacts
    /// are recorded and disable their vehicles: the pair was closing, or it
    /// was not already touching on the previous tick. Must be called every
    /// tick, with an empty list when nothing overlaps.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &mut self,
        contacts: &mut Vec<Contact>,
        states: &mut VehicleStates,
        vehicles: &[Vehicle],
        track: &Track,
        tick: u64,
        time: f64,
        dt: f64,
        records: &mut Vec<CollisionRecord>,
    ) -> Vec<usize> {
        contacts.sort_by_key(|c| (c.follower, c.leader));
        contacts.dedup();
        let previous = std::mem::take(&mut self.in_contact);

        let mut touched = Vec::with_capacity(contacts.len() * 2);
        for contact in contacts.drain(..) {
            let (f, l) = (contact.follower, contact.leader);
            let half_lengths = (vehicles[f].length + vehicles[l].length) / 2.0;
            let overlap = half_lengths - track.forward_distance(states.s[f], states.s[l]);
            // An earlier response this tick may already have separated the pair
            if overlap <= 0.0 {
                continue;
            }
            self.in_contact.push((f, l));

            let (mf, ml) = (vehicles[f].mass, vehicles[l].mass);
            let (vf, vl) = (states.v[f], states.v[l]);
            let closing = vf - vl;
            if closing > 0.0 {
                let momentum = mf * vf + ml * vl;
                let total = mf + ml;
                states.v[f] = ((momentum - ml * self.restitution * closing) / total).max(0.0);
                states.v[l] = ((momentum + mf * self.restitution * closing) / total).max(0.0);
            }

            states.s[f] = track.wrap(states.s[f] - overlap - self.guard_band);
            states.sync_world(track, f);
            states.sync_world(track, l);
            touched.push(f);
            touched.push(l);

            let resting = closing <= 0.0 && previous.binary_search(&(f, l)).is_ok();
            if resting {
                continue;
            }

            let until = time + self.disable_duration;
            states.disabled_until[f] = states.disabled_until[f].max(until);
            states.disabled_until[l] = states.disabled_until[l].max(until);

            let ttc_at_impact = if closing > 0.0 {
                (dt - overlap / closing).max(0.0)
            } else {
                0.0
            };
            records.push(CollisionRecord {
                tick,
                time,
                follower: vehicles[f].id,
                leader: vehicles[l].id,
                location: track.wrap(states.s[l] - vehicles[l].length / 2.0),
                relative_speed: closing,
                ttc_at_impact,
            });
        }
        touched
    }
}
