use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::subsystem::{SampleCallback, SamplingRate, SensorKind, SensorSubsystem, SubscriptionId};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

struct Subscriber {
    kind: SensorKind,
    rate: SamplingRate,
    callback: SampleCallback,
}

/// In-process sensor subsystem. Samples are pushed with [`emit`] from any
/// thread, or from a replay feed.
///
/// [`emit`]: SimulatedSensors::emit
pub struct SimulatedSensors {
    available: HashSet<SensorKind>,
    subscribers: Mutex<BTreeMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
}

impl SimulatedSensors {
    /// A device with every sensor kind.
    pub fn new() -> Self {
        Self::with_sensors([SensorKind::Pressure, SensorKind::MagneticField])
    }

    pub fn with_sensors(kinds: impl IntoIterator<Item = SensorKind>) -> Self {
        Self {
            available: kinds.into_iter().collect(),
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Delivers one sample to every subscriber of `kind`; returns how many
    /// received it.
    pub fn emit(&self, kind: SensorKind, values: &[f32]) -> usize {
        // Callbacks run outside the lock so they may unsubscribe.
        let callbacks: Vec<SampleCallback> = self
            .lock()
            .values()
            .filter(|subscriber| subscriber.kind == kind)
            .map(|subscriber| subscriber.callback.clone())
            .collect();

        for callback in &callbacks {
            callback(values);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, kind: SensorKind) -> usize {
        self.lock()
            .values()
            .filter(|subscriber| subscriber.kind == kind)
            .count()
    }

    /// Sampling rate requested by the subscription, if it is still active.
    pub fn requested_rate(&self, id: SubscriptionId) -> Option<SamplingRate> {
        self.lock().get(&id).map(|subscriber| subscriber.rate)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<SubscriptionId, Subscriber>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSubsystem for SimulatedSensors {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        self.available.contains(&kind)
    }

    fn subscribe(
        &self,
        kind: SensorKind,
        rate: SamplingRate,
        callback: SampleCallback,
    ) -> Option<SubscriptionId> {
        if !self.has_sensor(kind) {
            log_warn!("Subscription to missing {kind} sensor refused");
            return None;
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock().insert(
            id,
            Subscriber {
                kind,
                rate,
                callback,
            },
        );
        log_debug!("Subscribed {id:?} to {kind} at {rate:?}");
        Some(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.lock().remove(&id).is_some() {
            log_debug!("Unsubscribed {id:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn samples_reach_only_matching_subscribers() {
        let sensors = SimulatedSensors::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        sensors
            .subscribe(
                SensorKind::Pressure,
                SamplingRate::Fastest,
                Arc::new(move |_values: &[f32]| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(sensors.emit(SensorKind::Pressure, &[1000.0]), 1);
        assert_eq!(sensors.emit(SensorKind::MagneticField, &[1.0, 2.0, 3.0]), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_tolerates_unknown_ids() {
        let sensors = SimulatedSensors::new();
        let id = sensors
            .subscribe(SensorKind::Pressure, SamplingRate::Ui, Arc::new(|_values: &[f32]| {}))
            .unwrap();
        assert_eq!(sensors.requested_rate(id), Some(SamplingRate::Ui));

        sensors.unsubscribe(id);
        sensors.unsubscribe(id);
        sensors.unsubscribe(SubscriptionId(999));

        assert_eq!(sensors.subscriber_count(SensorKind::Pressure), 0);
    }

    #[test]
    fn missing_hardware_refuses_subscriptions() {
        let sensors = SimulatedSensors::with_sensors([SensorKind::MagneticField]);

        assert!(!sensors.has_sensor(SensorKind::Pressure));
        assert!(sensors
            .subscribe(SensorKind::Pressure, SamplingRate::Normal, Arc::new(|_values: &[f32]| {}))
            .is_none());
    }
}
