//! The pluggable tool boundary: the capability contract every tool
//! implements, the delegate that drives it, and the handoff to the finalize
//! step.

pub mod bundle;
pub mod delegate;
pub mod host;
pub mod tool;

pub use bundle::{BundleValue, NavigationRequest, SessionBundle, CAPTURED_AT_KEY};
pub use delegate::{LifecycleDelegate, LifecycleEvent, LifecyclePhase};
pub use host::{
    HostContext, HostHandle, LayoutId, Localizer, Navigator, RenderContext, SavedState, ToolView,
};
pub use tool::{HookResult, Tool};
