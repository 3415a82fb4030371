//! Simulated biometric source
//!
//! Stands in for a real sensor adapter when no hardware is attached. Each
//! reading independently randomizes every metric within [`ReadingRanges`].
//!
//! [`SampleGenerator::start`] runs the timer on a worker thread: one reading
//! is emitted immediately, then one per interval until the returned
//! [`StopHandle`] is stopped or dropped. Stopping sets a liveness flag and
//! wakes the worker, so no callback runs once `stop` has returned.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{GeneratorConfig, Range, ReadingRanges};
use crate::error::CalmError;
use crate::types::{BiometricReading, BrainwaveBands};

/// Produces randomized readings on demand
#[derive(Debug)]
pub struct ReadingSource {
    rng: StdRng,
    ranges: ReadingRanges,
}

impl ReadingSource {
    pub fn new(ranges: ReadingRanges) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            ranges,
        }
    }

    /// Reproducible source for tests and demos
    pub fn with_seed(ranges: ReadingRanges, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ranges,
        }
    }

    pub fn next_reading(&mut self, timestamp: DateTime<Utc>) -> BiometricReading {
        let r = &self.ranges;
        let rng = &mut self.rng;
        BiometricReading {
            timestamp,
            heart_rate: Some(sample(rng, r.heart_rate)),
            hrv: Some(sample(rng, r.hrv)),
            breath_rate: Some(sample(rng, r.breath_rate)),
            stress_level: Some(sample(rng, r.stress_level)),
            focus_score: Some(sample(rng, r.focus_score)),
            brainwaves: Some(BrainwaveBands {
                delta: sample(rng, r.delta),
                theta: sample(rng, r.theta),
                alpha: sample(rng, r.alpha),
                beta: sample(rng, r.beta),
                gamma: sample(rng, r.gamma),
            }),
        }
    }
}

/// Uniform draw rounded to one decimal place
fn sample(rng: &mut StdRng, range: Range) -> f64 {
    let value = rng.gen_range(range.min..=range.max);
    ((value * 10.0).round() / 10.0).clamp(range.min, range.max)
}

/// Timer-driven simulator
#[derive(Debug, Clone, Default)]
pub struct SampleGenerator {
    config: GeneratorConfig,
    seed: Option<u64>,
}

impl SampleGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config, seed: None }
    }

    pub fn with_seed(config: GeneratorConfig, seed: u64) -> Self {
        Self {
            config,
            seed: Some(seed),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.config.interval_ms)
    }

    /// Start emitting readings to `on_sample`.
    ///
    /// Each call starts an independent worker; the generator itself can be
    /// started and stopped any number of times. Fails with
    /// [`CalmError::InvalidConfig`] before spawning anything when the interval
    /// is zero or a reading range is empty.
    pub fn start<F>(&self, mut on_sample: F) -> Result<StopHandle, CalmError>
    where
        F: FnMut(BiometricReading) + Send + 'static,
    {
        self.config.validate()?;

        let mut source = match self.seed {
            Some(seed) => ReadingSource::with_seed(self.config.ranges.clone(), seed),
            None => ReadingSource::new(self.config.ranges.clone()),
        };
        let interval = self.interval();
        let stopped = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = mpsc::channel::<()>();

        let worker_stopped = Arc::clone(&stopped);
        let worker = thread::Builder::new()
            .name("calm-sample-generator".to_string())
            .spawn(move || {
                let mut ticks: u64 = 0;
                loop {
                    // A tick that raced with stop() must not reach the callback
                    if worker_stopped.load(Ordering::Acquire) {
                        break;
                    }
                    on_sample(source.next_reading(Utc::now()));
                    ticks += 1;

                    match wake_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(ticks, "Sample generator worker exited");
            })
            .map_err(|e| CalmError::Generator(format!("failed to spawn generator thread: {e}")))?;

        info!(interval_ms = self.config.interval_ms, "Sample generator started");

        Ok(StopHandle {
            stopped,
            wake: Some(wake_tx),
            worker: Some(worker),
        })
    }
}

/// Cancels a running generator. Dropping the handle also stops it.
#[derive(Debug)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl StopHandle {
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stop the generator. Safe to call repeatedly.
    ///
    /// When called from outside the callback this waits for the worker to
    /// exit, so no reading is delivered after it returns.
    pub fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(wake) = self.wake.take() {
            // The worker may already be gone; nothing to wake then
            let _ = wake.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                // Called from inside the callback: the loop exits on its own
                return;
            }
            if worker.join().is_err() {
                warn!("Sample generator callback panicked");
            }
        }
        info!("Sample generator stopped");
    }
}

impl Drop for StopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Instant;

    fn fast_config() -> GeneratorConfig {
        GeneratorConfig {
            interval_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut a = ReadingSource::with_seed(ReadingRanges::default(), 7);
        let mut b = ReadingSource::with_seed(ReadingRanges::default(), 7);

        for _ in 0..20 {
            assert_eq!(a.next_reading(ts), b.next_reading(ts));
        }
    }

    #[test]
    fn test_readings_stay_in_range() {
        let ranges = ReadingRanges::default();
        let mut source = ReadingSource::with_seed(ranges.clone(), 42);

        for _ in 0..500 {
            let reading = source.next_reading(Utc::now());
            assert!(ranges.heart_rate.contains(reading.heart_rate.unwrap()));
            assert!(ranges.hrv.contains(reading.hrv.unwrap()));
            assert!(ranges.breath_rate.contains(reading.breath_rate.unwrap()));
            assert!(ranges.stress_level.contains(reading.stress_level.unwrap()));
            assert!(ranges.focus_score.contains(reading.focus_score.unwrap()));
            let waves = reading.brainwaves.unwrap();
            assert!(ranges.alpha.contains(waves.alpha));
            assert!(ranges.gamma.contains(waves.gamma));
        }
    }

    #[test]
    fn test_start_rejects_inverted_range() {
        let mut config = fast_config();
        config.ranges.heart_rate = Range::new(90.0, 60.0);
        let count = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&count);

        let result = SampleGenerator::new(config).start(move |_| {
            *counter.lock().unwrap() += 1;
        });

        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(*count.lock().unwrap(), 0);
    }

    #[test]
    fn test_start_rejects_zero_interval() {
        let config = GeneratorConfig {
            interval_ms: 0,
            ..Default::default()
        };
        let result = SampleGenerator::with_seed(config, 3).start(|_| {});
        assert!(matches!(result, Err(CalmError::InvalidConfig(_))));
    }

    #[test]
    fn test_emits_immediately_then_on_interval() {
        let (tx, rx) = mpsc::channel();
        let mut handle = SampleGenerator::with_seed(fast_config(), 1)
            .start(move |reading| {
                let _ = tx.send(reading);
            })
            .unwrap();

        for _ in 0..3 {
            let reading = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(reading.heart_rate.is_some());
        }
        handle.stop();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_no_callbacks_after_stop() {
        let count = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&count);
        let mut handle = SampleGenerator::new(fast_config())
            .start(move |_| {
                *counter.lock().unwrap() += 1;
            })
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        handle.stop();
        let after_stop = *count.lock().unwrap();
        assert!(after_stop >= 1);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(*count.lock().unwrap(), after_stop);

        // Second stop is a no-op
        handle.stop();
        assert_eq!(*count.lock().unwrap(), after_stop);
    }

    #[test]
    fn test_stop_does_not_wait_for_interval() {
        let config = GeneratorConfig {
            interval_ms: 60_000,
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();
        let mut handle = SampleGenerator::new(config)
            .start(move |_| {
                let _ = tx.send(());
            })
            .unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_drop_stops_generator() {
        let count = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&count);
        {
            let _handle = SampleGenerator::new(fast_config())
                .start(move |_| {
                    *counter.lock().unwrap() += 1;
                })
                .unwrap();
            thread::sleep(Duration::from_millis(30));
        }
        let after_drop = *count.lock().unwrap();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(*count.lock().unwrap(), after_drop);
    }

    #[test]
    fn test_stop_from_inside_callback() {
        let slot: Arc<Mutex<Option<StopHandle>>> = Arc::new(Mutex::new(None));
        let callback_slot = Arc::clone(&slot);
        let (tx, rx) = mpsc::channel();

        let handle = SampleGenerator::new(fast_config())
            .start(move |_| {
                let _ = tx.send(());
                if let Some(mut handle) = callback_slot.lock().unwrap().take() {
                    handle.stop();
                }
            })
            .unwrap();
        *slot.lock().unwrap() = Some(handle);

        // Eventually a callback takes the handle and stops its own worker
        let deadline = Instant::now() + Duration::from_secs(2);
        while slot.lock().unwrap().is_some() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(slot.lock().unwrap().is_none());

        thread::sleep(Duration::from_millis(30));
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(40));
        assert!(rx.try_recv().is_err());
    }
}
