use std::collections::HashSet;

use stadium_traffic::{config::SimulationConfig, simulation::Simulation};

fn sample_config() -> SimulationConfig {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/sim.toml");
    SimulationConfig::load_from_file(path).unwrap()
}

#[test]
fn sample_configuration_does_not_pile_up() {
    let config = sample_config();
    let count = config.population.count as usize;
    let mut sim = Simulation::new(config).unwrap();

    // One simulated minute at 60 frames per second
    for _ in 0..3_600 {
        sim.step(1.0 / 60.0);
    }
    assert!(sim.time() >= 59.9);

    let log = sim.event_log();
    println!("{} collisions in {:.0}s", log.len(), sim.time());
    assert!(log.len() < 2 * count, "{} collisions in one minute", log.len());

    // A resolved pair is separated, so it cannot be logged again on the next tick
    let ticks: HashSet<(u64, u32, u32)> = log.iter().map(|r| (r.tick, r.follower.0, r.leader.0)).collect();
    for record in log {
        assert!(
            !ticks.contains(&(record.tick + 1, record.follower.0, record.leader.0)),
            "pair {}->{} logged on consecutive ticks at {}",
            record.follower.0,
            record.leader.0,
            record.tick
        );
    }

    let disabled = sim.vehicle_snapshots().iter().filter(|v| v.disabled).count();
    assert!(disabled < count / 2, "{} of {} vehicles disabled", disabled, count);
}

#[test]
fn every_logged_impact_disables_both_vehicles() {
    let mut sim = Simulation::new(sample_config()).unwrap();
    let duration = 8.0;

    for _ in 0..1_800 {
        let report = sim.step(1.0 / 60.0);
        for record in &report.collisions {
            for id in [record.follower, record.leader] {
                let entry = report.disabled.iter().find(|d| d.vehicle == id);
                assert!(entry.is_some(), "vehicle {} not disabled", id.0);
                assert!(entry.map_or(false, |d| d.until >= record.time + duration - 1e-9));
            }
        }
    }
}
