use stadium_traffic::{
    config::{IntegrationMode, SimulationConfig, Validate, LATENT_COUNT},
    error::ConfigError,
    simulation::Simulation,
};

#[test]
fn sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/sim.toml");
    let config = SimulationConfig::load_from_file(path).unwrap();
    assert_eq!(config.physics.integration_mode, IntegrationMode::ArcLength);
    assert!(config.vehicle_classes.len() >= 3);
    Simulation::new(config).unwrap();
}

#[test]
fn missing_file_is_an_io_error() {
    let err = SimulationConfig::load_from_file("/nonexistent/sim.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn non_positive_definite_correlation_is_rejected() {
    let mut matrix = vec![vec![0.0; LATENT_COUNT]; LATENT_COUNT];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    // Three variables that cannot all be this strongly anti-correlated
    for (a, b) in [(0, 1), (0, 2), (1, 2)] {
        matrix[a][b] = -0.9;
        matrix[b][a] = -0.9;
    }

    let mut config = SimulationConfig::default();
    config.drivers.correlation = Some(matrix);
    let err = Simulation::new(config).err().unwrap();
    assert!(matches!(err, ConfigError::Correlation { .. }));
    assert_eq!(err.field(), Some("drivers.correlation"));
}

#[test]
fn out_of_range_probability_is_rejected() {
    let err = SimulationConfig::from_toml_str("[speeding]\ntarget_fraction = 1.2\n").unwrap_err();
    assert_eq!(err.field(), Some("speeding.target_fraction"));

    let err = SimulationConfig::from_toml_str("[collision]\nrestitution = -0.1\n").unwrap_err();
    assert_eq!(err.field(), Some("collision.restitution"));

    let err = SimulationConfig::from_toml_str("[population]\nlateral_jitter = -0.5\n").unwrap_err();
    assert_eq!(err.field(), Some("population.lateral_jitter"));
}

#[test]
fn invalid_values_are_reported_not_clamped() {
    let mut config = SimulationConfig::default();
    config.vehicle_classes[0].mass = 0.0;
    let err = config.validate().unwrap_err();
    assert_eq!(err.field(), Some("vehicle_classes.sedan.mass"));
    assert!(err.to_string().contains("must be positive"));
}
