use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use super::loop_worker::{feed_loop, FeedScript};
use super::simulated::SimulatedSensors;
use super::subsystem::SensorKind;

/// Runs one background feed into the simulated sensors at a time.
pub struct FeedController {
    sensors: Arc<SimulatedSensors>,
    handle: Option<JoinHandle<usize>>,
    cancel_token: Option<CancellationToken>,
}

impl FeedController {
    pub fn new(sensors: Arc<SimulatedSensors>) -> Self {
        Self {
            sensors,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start_feed(
        &mut self,
        kind: SensorKind,
        script: FeedScript,
        interval: Duration,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("feed already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(feed_loop(
            Arc::clone(&self.sensors),
            kind,
            script,
            interval,
            cancel_token.clone(),
        ));

        info!("Started {kind} feed every {}ms", interval.as_millis());
        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Waits for a finite feed to play out; returns the samples delivered.
    pub async fn wait(&mut self) -> Result<usize> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle.await.context("feed task failed to join"),
            None => Ok(0),
        }
    }

    /// Cancels the running feed; returns the samples delivered.
    pub async fn stop_feed(&mut self) -> Result<usize> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::sensing::{SamplingRate, SensorSubsystem};

    #[tokio::test]
    async fn replay_feed_delivers_every_sample() {
        let sensors = Arc::new(SimulatedSensors::new());
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        sensors.subscribe(
            SensorKind::Pressure,
            SamplingRate::Fastest,
            Arc::new(move |_values: &[f32]| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let mut feed = FeedController::new(Arc::clone(&sensors));
        let script = FeedScript::Replay(vec![vec![1000.0], vec![1001.0], vec![1002.0]]);
        feed.start_feed(SensorKind::Pressure, script, Duration::from_millis(1))
            .unwrap();

        assert_eq!(feed.wait().await.unwrap(), 3);
        assert_eq!(received.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stop_cancels_an_endless_feed() {
        let sensors = Arc::new(SimulatedSensors::new());
        let mut feed = FeedController::new(sensors);
        let script = FeedScript::Noisy {
            baseline: vec![0.0, 0.0, 40.0],
            jitter: 0.5,
            seed: Some(3),
        };

        feed.start_feed(SensorKind::MagneticField, script.clone(), Duration::from_millis(1))
            .unwrap();
        assert!(feed
            .start_feed(SensorKind::MagneticField, script, Duration::from_millis(1))
            .is_err());

        tokio::time::sleep(Duration::from_millis(10)).await;
        feed.stop_feed().await.unwrap();
        assert_eq!(feed.stop_feed().await.unwrap(), 0);
    }
}
