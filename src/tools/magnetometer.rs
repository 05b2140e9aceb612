use std::sync::Arc;

use tokio::sync::watch;

use crate::db::models::ToolKind;
use crate::error::CaptureError;
use crate::navigation::{HookResult, HostHandle, LayoutId, Localizer, Navigator, SavedState, Tool};
use crate::sensing::{SamplingRate, SensorKind, SensorSubsystem};

use super::capture::{CaptureSession, CaptureState, SensorBinding};

pub const X_KEY: &str = "magnetometer_x";
pub const Y_KEY: &str = "magnetometer_y";
pub const Z_KEY: &str = "magnetometer_z";

const LAYOUT: LayoutId = LayoutId("fragment_magnetometer");

/// Magnetic field components in µT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl FieldVector {
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

pub struct Magnetometer {
    session: CaptureSession<FieldVector>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl Magnetometer {
    pub fn new(sensors: Arc<dyn SensorSubsystem>, rate: SamplingRate) -> Self {
        let binding = SensorBinding {
            sensors,
            kind: SensorKind::MagneticField,
            rate,
        };
        Self {
            session: CaptureSession::new(ToolKind::Magnetometer, Some(binding)),
            navigator: None,
        }
    }

    pub fn field(&self) -> Option<FieldVector> {
        self.session.latest()
    }

    pub fn magnitude(&self) -> Option<f32> {
        self.field().map(|field| field.magnitude())
    }

    pub fn watch(&self) -> watch::Receiver<Option<FieldVector>> {
        self.session.watch()
    }
}

fn interpret(values: &[f32]) -> Option<FieldVector> {
    match values {
        [x, y, z, ..] if x.is_finite() && y.is_finite() && z.is_finite() => Some(FieldVector {
            x: *x,
            y: *y,
            z: *z,
        }),
        _ => None,
    }
}

impl Tool for Magnetometer {
    fn kind(&self) -> ToolKind {
        ToolKind::Magnetometer
    }

    fn layout_id(&self) -> LayoutId {
        LAYOUT
    }

    fn toolbar_label(&self, locale: &dyn Localizer) -> String {
        locale.resolve(ToolKind::Magnetometer.label_key())
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
            .hand_off(self.navigator.as_ref(), |field, bundle| {
                bundle
                    .put_float(X_KEY, f64::from(field.x))
                    .put_float(Y_KEY, f64::from(field.y))
                    .put_float(Z_KEY, f64::from(field.z));
            })
    }

    fn capture_state(&self) -> CaptureState {
        self.session.state()
    }
}
