//! Capture tools. Each one implements [`Tool`] over a shared
//! [`CaptureSession`] and differs only in how it reads its input and what it
//! puts in the session bundle.

pub mod barometer;
pub mod capture;
pub mod magnetometer;
pub mod ruler;

use std::sync::Arc;

pub use barometer::{Barometer, PressureBand, PRESSURE_KEY};
pub use capture::{CaptureSession, CaptureState, SensorBinding};
pub use magnetometer::{FieldVector, Magnetometer};
pub use ruler::{Ruler, LENGTH_KEY};

use crate::db::models::ToolKind;
use crate::navigation::Tool;
use crate::sensing::SensorSubsystem;
use crate::settings::Settings;

/// Builds a fresh tool of `kind`, subscribing at the rate configured in
/// `settings`.
pub fn create_tool(
    kind: ToolKind,
    sensors: Arc<dyn SensorSubsystem>,
    settings: &Settings,
) -> Box<dyn Tool> {
    let rate = settings.rate_for(kind).unwrap_or_default();
    match kind {
        ToolKind::Barometer => Box::new(Barometer::new(sensors, rate)),
        ToolKind::Magnetometer => Box::new(Magnetometer::new(sensors, rate)),
        ToolKind::Ruler => Box::new(Ruler::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Localizer;
    use crate::sensing::{SamplingRate, SensorKind, SimulatedSensors};

    struct KeyEcho;

    impl Localizer for KeyEcho {
        fn resolve(&self, key: &str) -> String {
            key.to_string()
        }
    }

    #[test]
    fn factory_builds_every_kind() {
        let sensors: Arc<dyn SensorSubsystem> = Arc::new(SimulatedSensors::new());
        let settings = Settings::default();

        for kind in ToolKind::ALL {
            let tool = create_tool(kind, Arc::clone(&sensors), &settings);
            assert_eq!(tool.kind(), kind);
            assert_eq!(tool.capture_state(), CaptureState::Idle);
            assert_eq!(tool.toolbar_label(&KeyEcho), kind.label_key());
        }
    }

    #[test]
    fn factory_uses_configured_rate() {
        let sensors = Arc::new(SimulatedSensors::new());
        let mut settings = Settings::default();
        settings.sampling.magnetometer = SamplingRate::Ui;

        let mut tool = create_tool(ToolKind::Magnetometer, sensors.clone(), &settings);
        tool.on_resume().unwrap();

        assert_eq!(sensors.subscriber_count(SensorKind::MagneticField), 1);
        let id = crate::sensing::SubscriptionId(1);
        assert_eq!(sensors.requested_rate(id), Some(SamplingRate::Ui));
    }
}
