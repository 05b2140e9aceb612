use crate::db::models::ToolKind;
use crate::error::{CaptureError, ToolError};
use crate::tools::CaptureState;

use super::host::{HostContext, HostHandle, LayoutId, Localizer, RenderContext, SavedState};

pub type HookResult = Result<(), ToolError>;

/// The operations a host can call on any measurement tool.
///
/// Hooks arrive one at a time, in lifecycle order, from the delegate that owns
/// the tool. Every hook defaults to a no-op. An `Err` from a hook ends the
/// attachment: the delegate drops the tool and reports the failure.
pub trait Tool: Send {
    fn kind(&self) -> ToolKind;

    /// Constant per tool.
    fn layout_id(&self) -> LayoutId;

    fn toolbar_label(&self, locale: &dyn Localizer) -> String;

    fn on_attach(&mut self, _context: &HostContext) -> HookResult {
        Ok(())
    }

    fn on_create(&mut self, _saved_state: Option<&SavedState>) -> HookResult {
        Ok(())
    }

    fn on_view_created(
        &mut self,
        _context: &RenderContext,
        _saved_state: Option<&SavedState>,
    ) -> HookResult {
        Ok(())
    }

    fn on_host_ready(&mut self, _host: &HostHandle, _saved_state: Option<&SavedState>) -> HookResult {
        Ok(())
    }

    fn on_start(&mut self) -> HookResult {
        Ok(())
    }

    fn on_resume(&mut self) -> HookResult {
        Ok(())
    }

    fn on_pause(&mut self) -> HookResult {
        Ok(())
    }

    fn on_stop(&mut self) -> HookResult {
        Ok(())
    }

    fn on_view_destroyed(&mut self) -> HookResult {
        Ok(())
    }

    fn on_destroy(&mut self) -> HookResult {
        Ok(())
    }

    fn on_detach(&mut self) -> HookResult {
        Ok(())
    }

    /// A value typed in by the user. Sensor-driven tools refuse it.
    fn submit_value(&mut self, _value: f32) -> Result<(), CaptureError> {
        Err(CaptureError::ManualInputUnsupported { tool: self.kind() })
    }

    /// User confirmed the capture: package the current reading and hand it to
    /// the navigator.
    fn save(&mut self) -> Result<(), CaptureError>;

    fn capture_state(&self) -> CaptureState;
}
