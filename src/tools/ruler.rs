use std::sync::Arc;

use tokio::sync::watch;

use crate::db::models::ToolKind;
use crate::error::CaptureError;
use crate::navigation::{HookResult, HostHandle, LayoutId, Localizer, Navigator, SavedState, Tool};

use super::capture::{CaptureSession, CaptureState};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Bundle key of the measured length, in centimetres.
pub const LENGTH_KEY: &str = "length";

const LAYOUT: LayoutId = LayoutId("fragment_ruler");

/// Manual length entry. No sensor is involved; the user submits values while
/// the tool is listening.
pub struct Ruler {
    session: CaptureSession<f32>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl Ruler {
    pub fn new() -> Self {
        Self {
            session: CaptureSession::new(ToolKind::Ruler, None),
            navigator: None,
        }
    }

    /// Negative or non-finite lengths are rejected and leave the buffered
    /// length untouched.
    pub fn submit_length(&self, cm: f32) -> Result<(), CaptureError> {
        if !cm.is_finite() || cm < 0.0 {
            log_warn!("Rejecting invalid length {cm}");
            return Err(CaptureError::InvalidInput {
                tool: ToolKind::Ruler,
                reason: format!("length must be a finite, non-negative number of cm, got {cm}"),
            });
        }
        self.session.publish(cm)
    }

    pub fn length(&self) -> Option<f32> {
        self.session.latest()
    }

    pub fn watch(&self) -> watch::Receiver<Option<f32>> {
        self.session.watch()
    }
}

impl Default for Ruler {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for Ruler {
    fn kind(&self) -> ToolKind {
        ToolKind::Ruler
    }

    fn layout_id(&self) -> LayoutId {
        LAYOUT
    }

    fn toolbar_label(&self, locale: &dyn Localizer) -> String {
        locale.resolve(ToolKind::Ruler.label_key())
    }

    fn on_host_ready(&mut self, host: &HostHandle, _saved_state: Option<&SavedState>) -> HookResult {
        self.navigator = Some(host.navigator());
        Ok(())
    }

    fn on_resume(&mut self) -> HookResult {
        self.session.resume(|_| None)
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

    fn submit_value(&mut self, value: f32) -> Result<(), CaptureError> {
        self.submit_length(value)
    }

    fn save(&mut self) -> Result<(), CaptureError> {
        self.session
            .hand_off(self.navigator.as_ref(), |cm, bundle| {
                bundle.put_float(LENGTH_KEY, f64::from(cm));
            })
    }

    fn capture_state(&self) -> CaptureState {
        self.session.state()
    }
}
