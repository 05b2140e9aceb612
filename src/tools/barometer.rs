use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::db::models::ToolKind;
use crate::error::CaptureError;
use crate::navigation::{HookResult, HostHandle, LayoutId, Localizer, Navigator, SavedState, Tool};
use crate::sensing::{SamplingRate, SensorKind, SensorSubsystem};

use super::capture::{CaptureSession, CaptureState, SensorBinding};

/// Bundle key of the captured pressure, in hPa.
pub const PRESSURE_KEY: &str = "pressure";

pub const GAUGE_MIN_HPA: f32 = 900.0;
pub const GAUGE_MAX_HPA: f32 = 1100.0;
const LOW_BAND_LIMIT_HPA: f32 = 950.0;
const HIGH_BAND_LIMIT_HPA: f32 = 1050.0;

const LAYOUT: LayoutId = LayoutId("fragment_barometer");

/// Coloured band of the pressure gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureBand {
    Low,
    Normal,
    High,
}

impl PressureBand {
    pub fn classify(hpa: f32) -> Self {
        if hpa < LOW_BAND_LIMIT_HPA {
            PressureBand::Low
        } else if hpa > HIGH_BAND_LIMIT_HPA {
            PressureBand::High
        } else {
            PressureBand::Normal
        }
    }
}

/// Position of `hpa` on the gauge, clamped to `0.0..=1.0`.
pub fn gauge_fraction(hpa: f32) -> f32 {
    ((hpa - GAUGE_MIN_HPA) / (GAUGE_MAX_HPA - GAUGE_MIN_HPA)).clamp(0.0, 1.0)
}

pub struct Barometer {
    session: CaptureSession<f32>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl Barometer {
    pub fn new(sensors: Arc<dyn SensorSubsystem>, rate: SamplingRate) -> Self {
        let binding = SensorBinding {
            sensors,
            kind: SensorKind::Pressure,
            rate,
        };
        Self {
            session: CaptureSession::new(ToolKind::Barometer, Some(binding)),
            navigator: None,
        }
    }

    pub fn pressure(&self) -> Option<f32> {
        self.session.latest()
    }

    pub fn band(&self) -> Option<PressureBand> {
        self.pressure().map(PressureBand::classify)
    }

    pub fn watch(&self) -> watch::Receiver<Option<f32>> {
        self.session.watch()
    }
}

fn interpret(values: &[f32]) -> Option<f32> {
    values.first().copied().filter(|hpa| hpa.is_finite())
}

impl Tool for Barometer {
    fn kind(&self) -> ToolKind {
        ToolKind::Barometer
    }

    fn layout_id(&self) -> LayoutId {
        LAYOUT
    }

    fn toolbar_label(&self, locale: &dyn Localizer) -> String {
        locale.resolve(ToolKind::Barometer.label_key())
    }

    fn on_host_ready(&mut self, host: &HostHandle, _saved_state: Option<&SavedState>) -> HookResult {
        self.session.ensure_available()?;
        self.navigator = Some(host.navigator());
        Ok(())
    }

    fn on_resume(&mut self) -> HookResult {
        self.session.resume(interpret)
    }

    fn on_pause(&mut self) -> HookResult {
        self.session.pause();
        Ok(())
    }

    fn on_detach(&mut self) -> HookResult {
        self.session.pause();
        self.navigator = None;
        Ok(())
    }

    fn save(&mut self) -> Result<(), CaptureError> {
        self.session
            .hand_off(self.navigator.as_ref(), |hpa, bundle| {
                bundle.put_float(PRESSURE_KEY, f64::from(hpa));
            })
    }

    fn capture_state(&self) -> CaptureState {
        self.session.state()
    }
}
