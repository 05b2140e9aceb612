use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Pressure,
    MagneticField,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Pressure => "pressure",
            SensorKind::MagneticField => "magnetic field",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a subscriber wants samples delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplingRate {
    Fastest,
    Game,
    Ui,
    #[default]
    Normal,
}

impl SamplingRate {
    pub fn period(&self) -> Duration {
        match self {
            SamplingRate::Fastest => Duration::ZERO,
            SamplingRate::Game => Duration::from_micros(20_000),
            SamplingRate::Ui => Duration::from_micros(60_000),
            SamplingRate::Normal => Duration::from_micros(200_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Invoked from the sensor subsystem's own thread for every sample.
pub type SampleCallback = Arc<dyn Fn(&[f32]) + Send + Sync>;

/// Device sensors as seen by the capture tools.
///
/// Registration is fire-and-forget: `subscribe` returns before the first
/// sample. Samples are raw vectors that each tool interprets itself.
pub trait SensorSubsystem: Send + Sync {
    fn has_sensor(&self, kind: SensorKind) -> bool;

    /// `None` if the device has no sensor of this kind.
    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SamplingRate,
        callback: SampleCallback,
    ) -> Option<SubscriptionId>;

    /// Idempotent; unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
