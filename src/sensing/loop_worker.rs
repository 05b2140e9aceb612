use std::sync::Arc;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::simulated::SimulatedSensors;
use super::subsystem::SensorKind;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const MIN_FEED_INTERVAL_MS: u64 = 1;

/// What a feed plays into the simulated sensors.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedScript {
    /// Each sample once, in order, then stop.
    Replay(Vec<Vec<f32>>),
    /// Baseline plus uniform noise in `[-jitter, jitter]` on every component,
    /// until cancelled.
    Noisy {
        baseline: Vec<f32>,
        jitter: f32,
        seed: Option<u64>,
    },
}

pub async fn feed_loop(
    sensors: Arc<SimulatedSensors>,
    kind: SensorKind,
    script: FeedScript,
    interval: Duration,
    cancel_token: CancellationToken,
) -> usize {
    let interval = interval.max(Duration::from_millis(MIN_FEED_INTERVAL_MS));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut source = SampleSource::new(script);
    let mut delivered = 0usize;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(sample) = source.next_sample() else {
                    log_debug!("{kind} feed exhausted after {delivered} samples");
                    break;
                };
                sensors.emit(kind, &sample);
                delivered += 1;
            }
            _ = cancel_token.cancelled() => {
                log_info!("{kind} feed shutting down after {delivered} samples");
                break;
            }
        }
    }

    delivered
}

struct SampleSource {
    script: FeedScript,
    cursor: usize,
    rng: StdRng,
}

impl SampleSource {
    fn new(script: FeedScript) -> Self {
        let rng = match &script {
            FeedScript::Noisy { seed: Some(seed), .. } => StdRng::seed_from_u64(*seed),
            _ => StdRng::from_entropy(),
        };
        Self {
            script,
            cursor: 0,
            rng,
        }
    }

    fn next_sample(&mut self) -> Option<Vec<f32>> {
        match &self.script {
            FeedScript::Replay(samples) => {
                let sample = samples.get(self.cursor).cloned();
                self.cursor += 1;
                sample
            }
            FeedScript::Noisy { baseline, jitter, .. } => {
                let jitter = jitter.abs();
                let rng = &mut self.rng;
                Some(
                    baseline
                        .iter()
                        .map(|value| {
                            if jitter > 0.0 {
                                value + rng.gen_range(-jitter..=jitter)
                            } else {
                                *value
                            }
                        })
                        .collect(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_ends_after_last_sample() {
        let mut source = SampleSource::new(FeedScript::Replay(vec![vec![1.0], vec![2.0]]));

        assert_eq!(source.next_sample(), Some(vec![1.0]));
        assert_eq!(source.next_sample(), Some(vec![2.0]));
        assert_eq!(source.next_sample(), None);
    }

    #[test]
    fn noise_stays_within_jitter() {
        let mut source = SampleSource::new(FeedScript::Noisy {
            baseline: vec![1013.0, 0.0],
            jitter: 2.0,
            seed: Some(11),
        });

        for _ in 0..500 {
            let sample = source.next_sample().unwrap();
            assert_eq!(sample.len(), 2);
            assert!((sample[0] - 1013.0).abs() <= 2.0);
            assert!(sample[1].abs() <= 2.0);
        }
    }
}
