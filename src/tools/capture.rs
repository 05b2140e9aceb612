use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::db::models::ToolKind;
use crate::error::{CaptureError, ToolError};
use crate::navigation::{NavigationRequest, Navigator, SessionBundle};
use crate::sensing::{
    ReadingSlot, SampleCallback, SamplingRate, SensorKind, SensorSubsystem, SubscriptionId,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Listening,
    Saving,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::Listening => "listening",
            CaptureState::Saving => "saving",
        }
    }
}

/// The sensor a capture session subscribes to while listening.
#[derive(Clone)]
pub struct SensorBinding {
    pub sensors: Arc<dyn SensorSubsystem>,
    pub kind: SensorKind,
    pub rate: SamplingRate,
}

/// Per-attachment capture state shared by every tool.
///
/// Holds the single buffered reading, the sensor subscription and the live
/// channel the gauge watches. Sensor callbacks write from their own thread;
/// everything else runs on the lifecycle owner.
pub struct CaptureSession<T>
where
    T: Copy + Send + Sync + 'static,
{
    tool: ToolKind,
    binding: Option<SensorBinding>,
    slot: Arc<ReadingSlot<T>>,
    live: Arc<watch::Sender<Option<T>>>,
    subscription: Option<SubscriptionId>,
    state: CaptureState,
}

impl<T> CaptureSession<T>
where
    T: Copy + Send + Sync + 'static,
{
    pub fn new(tool: ToolKind, binding: Option<SensorBinding>) -> Self {
        let (live, _) = watch::channel(None);
        Self {
            tool,
            binding,
            slot: Arc::new(ReadingSlot::new()),
            live: Arc::new(live),
            subscription: None,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn latest(&self) -> Option<T> {
        self.slot.latest()
    }

    /// Live readings for a display; `None` until the first sample of the
    /// current listening session.
    pub fn watch(&self) -> watch::Receiver<Option<T>> {
        self.live.subscribe()
    }

    /// Fails if the bound sensor does not exist on this device.
    pub fn ensure_available(&self) -> Result<(), ToolError> {
        match &self.binding {
            Some(binding) if !binding.sensors.has_sensor(binding.kind) => {
                Err(ToolError::SensorUnavailable(binding.kind))
            }
            _ => Ok(()),
        }
    }

    /// Starts listening from a clean state. `interpret` turns a raw sample
    /// into a reading; samples it rejects are dropped.
    pub fn resume<F>(&mut self, interpret: F) -> Result<(), ToolError>
    where
        F: Fn(&[f32]) -> Option<T> + Send + Sync + 'static,
    {
        self.unsubscribe();
        let live = Arc::clone(&self.live);
        let epoch = self.slot.begin_epoch_with(|| {
            live.send_replace(None);
        });

        if let Some(binding) = &self.binding {
            let slot = Arc::clone(&self.slot);
            let callback: SampleCallback = Arc::new(move |values: &[f32]| {
                if slot.current_epoch() != epoch {
                    return;
                }
                if let Some(value) = interpret(values) {
                    // A sample that lost the race with a newer epoch is dropped.
                    slot.publish_with(epoch, value, |value| {
                        live.send_replace(Some(value));
                    });
                }
            });

            let Some(id) = binding
                .sensors
                .subscribe(binding.kind, binding.rate, callback)
            else {
                return Err(ToolError::SensorUnavailable(binding.kind));
            };
            log_debug!("{} listening to {} at {:?}", self.tool, binding.kind, binding.rate);
            self.subscription = Some(id);
        }

        self.state = CaptureState::Listening;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.unsubscribe();
        self.state = CaptureState::Idle;
    }

    /// Manual input. Only accepted while listening.
    pub fn publish(&self, value: T) -> Result<(), CaptureError> {
        if self.state != CaptureState::Listening {
            return Err(CaptureError::NotListening { tool: self.tool });
        }
        self.slot
            .publish_with(self.slot.current_epoch(), value, |value| {
                self.live.send_replace(Some(value));
            });
        Ok(())
    }

    /// Freezes the buffered reading for packaging. Rejects the save if no
    /// sample has arrived in this listening session.
    pub fn freeze(&mut self) -> Result<T, CaptureError> {
        if self.state != CaptureState::Listening {
            return Err(CaptureError::NotListening { tool: self.tool });
        }
        let Some(value) = self.slot.latest() else {
            log_warn!("{} save rejected: no reading yet", self.tool);
            return Err(CaptureError::NoReadingAvailable { tool: self.tool });
        };
        self.state = CaptureState::Saving;
        Ok(value)
    }

    /// Back to listening after a save was handed off.
    pub fn release(&mut self) {
        if self.state == CaptureState::Saving {
            self.state = CaptureState::Listening;
        }
    }

    /// The save flow: freeze the reading, package it and navigate to the
    /// finalize step. The subscription stays active.
    pub fn hand_off<P>(
        &mut self,
        navigator: Option<&Arc<dyn Navigator>>,
        package: P,
    ) -> Result<(), CaptureError>
    where
        P: FnOnce(T, &mut SessionBundle),
    {
        let Some(navigator) = navigator else {
            return Err(CaptureError::HostNotReady);
        };
        let value = self.freeze()?;

        let mut bundle = SessionBundle::new();
        bundle.set_captured_at(Utc::now());
        package(value, &mut bundle);
        log_info!("{} handing off bundle {}", self.tool, bundle.id());
        navigator.navigate(NavigationRequest::new(self.tool.save_action(), bundle));

        self.release();
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let (Some(id), Some(binding)) = (self.subscription.take(), &self.binding) {
            binding.sensors.unsubscribe(id);
        }
    }
}

impl<T> Drop for CaptureSession<T>
where
    T: Copy + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
