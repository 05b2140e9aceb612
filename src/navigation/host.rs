//! Narrow interfaces to the collaborators around the core: the host shell,
//! navigation and localization.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::bundle::NavigationRequest;

/// Opaque identifier of the view a tool renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutId(pub &'static str);

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Resolves display strings. Implemented by the host.
pub trait Localizer {
    fn resolve(&self, key: &str) -> String;
}

/// Accepts a named action plus its bundle and moves to the next view.
pub trait Navigator: Send + Sync {
    fn navigate(&self, request: NavigationRequest);
}

/// Handed to a tool when it is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct HostContext {
    pub locale: String,
}

impl HostContext {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }
}

/// Surface a tool's view is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContext {
    pub surface_id: u64,
}

/// State the host preserved across a teardown, keyed by tool-specific names.
pub type SavedState = BTreeMap<String, String>;

/// Capabilities the host offers once it is ready.
#[derive(Clone)]
pub struct HostHandle {
    navigator: Arc<dyn Navigator>,
}

impl HostHandle {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator }
    }

    pub fn navigator(&self) -> Arc<dyn Navigator> {
        Arc::clone(&self.navigator)
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandle").finish_non_exhaustive()
    }
}

/// What the delegate hands back when the host asks for the tool's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolView {
    pub layout: LayoutId,
    pub context: RenderContext,
}
