pub mod controller;
pub mod loop_worker;
pub mod simulated;
pub mod slot;
pub mod subsystem;

pub use controller::FeedController;
pub use loop_worker::FeedScript;
pub use simulated::SimulatedSensors;
pub use slot::ReadingSlot;
pub use subsystem::{SampleCallback, SamplingRate, SensorKind, SensorSubsystem, SubscriptionId};
