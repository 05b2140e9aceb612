use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::error::LifecycleError;

use super::host::{HostContext, HostHandle, LayoutId, Localizer, RenderContext, SavedState, ToolView};
use super::tool::{HookResult, Tool};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Attach,
    Create,
    ViewCreated,
    HostReady,
    Start,
    Resume,
    Pause,
    Stop,
    ViewDestroyed,
    Destroy,
    Detach,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 11] = [
        LifecycleEvent::Attach,
        LifecycleEvent::Create,
        LifecycleEvent::ViewCreated,
        LifecycleEvent::HostReady,
        LifecycleEvent::Start,
        LifecycleEvent::Resume,
        LifecycleEvent::Pause,
        LifecycleEvent::Stop,
        LifecycleEvent::ViewDestroyed,
        LifecycleEvent::Destroy,
        LifecycleEvent::Detach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Attach => "on_attach",
            LifecycleEvent::Create => "on_create",
            LifecycleEvent::ViewCreated => "on_view_created",
            LifecycleEvent::HostReady => "on_host_ready",
            LifecycleEvent::Start => "on_start",
            LifecycleEvent::Resume => "on_resume",
            LifecycleEvent::Pause => "on_pause",
            LifecycleEvent::Stop => "on_stop",
            LifecycleEvent::ViewDestroyed => "on_view_destroyed",
            LifecycleEvent::Destroy => "on_destroy",
            LifecycleEvent::Detach => "on_detach",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an attachment stands in the host lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Detached,
    Attached,
    Created,
    ViewCreated,
    HostReady,
    Started,
    Resumed,
    Paused,
    Stopped,
    ViewDestroyed,
    Destroyed,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Detached => "detached",
            LifecyclePhase::Attached => "attached",
            LifecyclePhase::Created => "created",
            LifecyclePhase::ViewCreated => "view_created",
            LifecyclePhase::HostReady => "host_ready",
            LifecyclePhase::Started => "started",
            LifecyclePhase::Resumed => "resumed",
            LifecyclePhase::Paused => "paused",
            LifecyclePhase::Stopped => "stopped",
            LifecyclePhase::ViewDestroyed => "view_destroyed",
            LifecyclePhase::Destroyed => "destroyed",
        }
    }

    /// The phase reached by delivering `event`, or `None` if the host may not
    /// send it now.
    pub fn next(self, event: LifecycleEvent) -> Option<Self> {
        use LifecycleEvent as E;
        use LifecyclePhase as P;

        let next = match (self, event) {
            (P::Detached, E::Attach) => P::Attached,
            (P::Attached, E::Create) => P::Created,
            (P::Created, E::ViewCreated) | (P::ViewDestroyed, E::ViewCreated) => P::ViewCreated,
            (P::Created, E::Destroy) | (P::ViewDestroyed, E::Destroy) => P::Destroyed,
            (P::ViewCreated, E::HostReady) => P::HostReady,
            (P::HostReady, E::Start) | (P::Stopped, E::Start) => P::Started,
            (P::Started, E::Resume) | (P::Paused, E::Resume) => P::Resumed,
            (P::Resumed, E::Pause) => P::Paused,
            (P::Started, E::Stop) | (P::Paused, E::Stop) => P::Stopped,
            (P::HostReady, E::ViewDestroyed) | (P::Stopped, E::ViewDestroyed) => P::ViewDestroyed,
            (P::Destroyed, E::Detach) => P::Detached,
            _ => return None,
        };
        Some(next)
    }
}

type ToolFactory = Box<dyn FnMut() -> Box<dyn Tool> + Send>;

/// Relays host lifecycle events to the attached tool.
///
/// The delegate holds no measurement logic. It creates one tool per
/// attachment, forwards each event unchanged and in order, and drops the tool
/// on detach or when a hook fails.
pub struct LifecycleDelegate {
    factory: ToolFactory,
    tool: Option<Box<dyn Tool>>,
    phase: LifecyclePhase,
    render_context: Option<RenderContext>,
    attachment: Option<CancellationToken>,
}

impl LifecycleDelegate {
    pub fn new<F>(factory: F) -> Self
    where
        F: FnMut() -> Box<dyn Tool> + Send + 'static,
    {
        Self {
            factory: Box::new(factory),
            tool: None,
            phase: LifecyclePhase::Detached,
            render_context: None,
            attachment: None,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn tool(&self) -> Option<&(dyn Tool + 'static)> {
        self.tool.as_deref()
    }

    pub fn tool_mut(&mut self) -> Option<&mut (dyn Tool + 'static)> {
        self.tool.as_deref_mut()
    }

    /// Cancelled when the current attachment ends. Work that outlives a hook
    /// checks it before applying results to the tool.
    pub fn attachment_token(&self) -> Option<CancellationToken> {
        self.attachment.clone()
    }

    pub fn layout_id(&self) -> Option<LayoutId> {
        self.tool.as_ref().map(|tool| tool.layout_id())
    }

    pub fn toolbar_label(&self, locale: &dyn Localizer) -> Option<String> {
        self.tool.as_ref().map(|tool| tool.toolbar_label(locale))
    }

    /// The tool's view, bound to the context received in `on_view_created`.
    ///
    /// # Panics
    ///
    /// Asking for the view before a rendering context exists is a host
    /// configuration error and panics.
    pub fn view(&self) -> ToolView {
        let Some(layout) = self.layout_id() else {
            panic!("configuration error: view requested with no tool attached");
        };
        let Some(context) = self.render_context else {
            panic!("configuration error: view requested before on_view_created supplied a rendering context");
        };
        ToolView { layout, context }
    }

    pub fn on_attach(&mut self, context: &HostContext) -> Result<(), LifecycleError> {
        if self.phase != LifecyclePhase::Detached {
            return Err(self.out_of_order(LifecycleEvent::Attach));
        }

        self.tool = Some((self.factory)());
        self.attachment = Some(CancellationToken::new());
        self.relay(LifecycleEvent::Attach, |tool| tool.on_attach(context))?;

        if let Some(tool) = self.tool.as_ref() {
            log_info!("Attached {} tool", tool.kind());
        }
        Ok(())
    }

    pub fn on_create(&mut self, saved_state: Option<&SavedState>) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Create, |tool| tool.on_create(saved_state))
    }

    /// # Panics
    ///
    /// A missing rendering context is a host configuration error and panics.
    pub fn on_view_created(
        &mut self,
        context: Option<RenderContext>,
        saved_state: Option<&SavedState>,
    ) -> Result<(), LifecycleError> {
        let Some(context) = context else {
            panic!("configuration error: on_view_created requires a rendering context");
        };
        self.relay(LifecycleEvent::ViewCreated, |tool| {
            tool.on_view_created(&context, saved_state)
        })?;
        self.render_context = Some(context);
        Ok(())
    }

    pub fn on_host_ready(
        &mut self,
        host: &HostHandle,
        saved_state: Option<&SavedState>,
    ) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::HostReady, |tool| {
            tool.on_host_ready(host, saved_state)
        })
    }

    pub fn on_start(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Start, |tool| tool.on_start())
    }

    pub fn on_resume(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Resume, |tool| tool.on_resume())
    }

    pub fn on_pause(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Pause, |tool| tool.on_pause())
    }

    pub fn on_stop(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Stop, |tool| tool.on_stop())
    }

    pub fn on_view_destroyed(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::ViewDestroyed, |tool| tool.on_view_destroyed())?;
        self.render_context = None;
        Ok(())
    }

    pub fn on_destroy(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Destroy, |tool| tool.on_destroy())
    }

    pub fn on_detach(&mut self) -> Result<(), LifecycleError> {
        self.relay(LifecycleEvent::Detach, |tool| tool.on_detach())?;
        self.teardown();
        Ok(())
    }

    fn relay<F>(&mut self, event: LifecycleEvent, hook: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(&mut (dyn Tool + 'static)) -> HookResult,
    {
        let Some(tool) = self.tool.as_deref_mut() else {
            return Err(LifecycleError::NotAttached);
        };
        let Some(next) = self.phase.next(event) else {
            return Err(self.out_of_order(event));
        };

        log_debug!("{} <- {}", tool.kind(), event);
        match hook(tool) {
            Ok(()) => {
                self.phase = next;
                Ok(())
            }
            Err(source) => {
                log_error!("Tool failed during {event}: {source}; dropping attachment");
                self.teardown();
                Err(LifecycleError::ToolFailed { event, source })
            }
        }
    }

    fn out_of_order(&self, event: LifecycleEvent) -> LifecycleError {
        LifecycleError::OutOfOrder {
            event,
            phase: self.phase.as_str(),
        }
    }

    fn teardown(&mut self) {
        if let Some(token) = self.attachment.take() {
            token.cancel();
        }
        self.tool = None;
        self.render_context = None;
        self.phase = LifecyclePhase::Detached;
    }
}

impl Drop for LifecycleDelegate {
    fn drop(&mut self) {
        if let Some(token) = self.attachment.take() {
            token.cancel();
        }
    }
}
