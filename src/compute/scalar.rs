use super::{kernel, max_speed, IntegrationBackend};
use crate::config::IntegrationMode;
use crate::simulation::{ControlOutput, Track, VehicleStates};

/// Reference integrator: one vehicle at a time, in index order.
pub struct ScalarBackend {
    mode: IntegrationMode,
}

impl ScalarBackend {
    pub fn new(mode: IntegrationMode) -> Self {
        Self { mode }
    }
}

impl IntegrationBackend for ScalarBackend {
    fn integrate(&mut self, states: &mut VehicleStates, commands: &[ControlOutput], track: &Track, dt: f64) -> f64 {
        for (i, command) in commands.iter().enumerate() {
            states.a[i] = command.accel;
            states.jerk[i] = command.jerk;
            let next = kernel::advance(track, states.kinematics(i), command.accel, dt, self.mode);
            states.store(i, next);
        }
        max_speed(states)
    }

    fn get_name(&self) -> &'static str {
        "scalar"
    }

    fn is_batched(&self) -> bool {
        false
    }
}
