use thiserror::Error;

use crate::db::models::ToolKind;
use crate::navigation::LifecycleEvent;
use crate::sensing::SensorKind;

/// Failures reported by the measurement store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("measure {measure_id} does not exist")]
    ForeignKey { measure_id: i64 },

    #[error("conflicting record: {0}")]
    Conflict(String),

    #[error("invalid reading: {0}")]
    InvalidReading(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// User-facing capture failures. The tool keeps listening after any of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("no {tool} reading available yet")]
    NoReadingAvailable { tool: ToolKind },

    #[error("{tool} is not listening")]
    NotListening { tool: ToolKind },

    #[error("host is not ready to navigate")]
    HostNotReady,

    #[error("{tool} does not take manual input")]
    ManualInputUnsupported { tool: ToolKind },

    #[error("invalid {tool} input: {reason}")]
    InvalidInput { tool: ToolKind, reason: String },
}

/// Failures raised by a tool from inside a lifecycle hook.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("no {0} sensor on this device")]
    SensorUnavailable(SensorKind),

    #[error("configuration error: {0}")]
    Configuration(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("{event} is not valid in phase {phase}")]
    OutOfOrder {
        event: LifecycleEvent,
        phase: &'static str,
    },

    #[error("tool failed during {event}: {source}")]
    ToolFailed {
        event: LifecycleEvent,
        #[source]
        source: ToolError,
    },

    #[error("no tool is attached")]
    NotAttached,
}

#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("a title is required")]
    MissingTitle,

    #[error("bundle is missing value '{0}'")]
    MissingBundleValue(String),

    #[error("unknown navigation action '{0}'")]
    UnknownAction(String),

    #[error("measure already committed")]
    AlreadyCommitted,

    #[error("failed to store measure: {0}")]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
