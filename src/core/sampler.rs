//! Periodic measurement loop.
//!
//! The `Sampler` drives acquisition: each cycle reads both channels through
//! the [`SensorReader`], renders a fresh snapshot, and installs it in the
//! [`MetricsStore`]. It observes a cancellation token cooperatively — at
//! the top of each cycle, before any hardware I/O begins, and during the
//! inter-cycle sleep — so shutdown latency is bounded by one read cycle
//! plus the sleep granularity, never the full interval.
//!
//! A failed read does not terminate the loop: the cycle is reported and
//! skipped, and the last good snapshot stays published.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    sensor::{Channel, Reading, SensorReader, SensorResult},
    snapshot::{render, MetricsStore},
};
use crate::config::site::SiteConfig;

/// Lifecycle state of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Running,
    Stopped,
}

/// Periodically samples both channels and publishes snapshots.
pub struct Sampler {
    reader: SensorReader,
    site: Arc<SiteConfig>,
    store: MetricsStore,
    interval: Duration,
    cancel: CancellationToken,
    state_tx: watch::Sender<SamplerState>,
    state_rx: watch::Receiver<SamplerState>,
}

impl Sampler {
    pub fn new(
        reader: SensorReader,
        site: Arc<SiteConfig>,
        store: MetricsStore,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SamplerState::Running);
        Sampler {
            reader,
            site,
            store,
            interval,
            cancel,
            state_tx,
            state_rx,
        }
    }

    /// Returns a receiver that observes the `Running -> Stopped` transition.
    pub fn state(&self) -> watch::Receiver<SamplerState> {
        self.state_rx.clone()
    }

    /// Runs the sampling loop until the cancellation token is raised.
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "sampling loop started"
        );

        loop {
            // No new hardware access begins once shutdown has been requested.
            if self.cancel.is_cancelled() {
                break;
            }

            match self.cycle().await {
                Ok((r0, r1)) => {
                    debug!(amps0 = r0.amps, amps1 = r1.amps, "snapshot published");
                }
                Err(e) => {
                    warn!("sampling cycle failed, retaining last snapshot: {e}");
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        let _ = self.state_tx.send(SamplerState::Stopped);
        info!("sampling loop stopped");
    }

    /// One sampling cycle: channel 0 then channel 1, then publish.
    ///
    /// The order is fixed so rendered output is deterministic for a given
    /// pair of readings.
    async fn cycle(&self) -> SensorResult<(Reading, Reading)> {
        let r0 = self.reader.read(Channel::System0).await?;
        let r1 = self.reader.read(Channel::System1).await?;

        self.store
            .replace(render(&self.site, r0.amps, r1.amps));
        Ok((r0, r1))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use tokio::time::timeout;
    use tracing_test::traced_test;

    use super::*;
    use crate::core::sensor::{Calibration, SampleSource, SensorError};

    fn lab_site() -> Arc<SiteConfig> {
        Arc::new(SiteConfig {
            point: "lab".to_string(),
            system0: "solar".to_string(),
            system1: "grid".to_string(),
        })
    }

    /// Source that counts acquisitions and replays a per-call script.
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Mutex<Vec<SensorResult<f64>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<SensorResult<f64>>) -> Self {
            ScriptedSource {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SampleSource for ScriptedSource {
        async fn sample(&self, channel: Channel, count: usize) -> SensorResult<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Err(SensorError::EmptySamples { channel });
            }
            script.remove(0).map(|mv| vec![mv; count])
        }
    }

    fn sampler_with(
        source: Arc<dyn SampleSource>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Sampler, MetricsStore) {
        let site = lab_site();
        let store = MetricsStore::zeroed(&site);
        let reader = SensorReader::new(source, 8, Calibration::default());
        let sampler = Sampler::new(reader, site, store.clone(), interval, cancel);
        (sampler, store)
    }

    #[tokio::test]
    async fn first_cycle_publishes_a_snapshot() {
        let cancel = CancellationToken::new();
        // 61.5 mV -> 1.23 A, 228.0 mV -> 4.56 A on both cycles
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(61.5),
            Ok(228.0),
            Ok(61.5),
            Ok(228.0),
        ]));
        let (sampler, store) = sampler_with(source, Duration::from_secs(30), cancel.clone());
        let mut updates = store.subscribe();

        let handle = tokio::spawn(sampler.run());

        timeout(Duration::from_secs(1), updates.changed())
            .await
            .expect("cycle should publish within a second")
            .unwrap();
        let text = store.read();
        assert!(text.contains("ampere_value{system=\"solar\", point=\"lab\"} 1.23"));
        assert!(text.contains("ampere_value{system=\"grid\", point=\"lab\"} 4.56"));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn read_failure_retains_last_snapshot_and_loop_continues() {
        let cancel = CancellationToken::new();
        let source = Arc::new(ScriptedSource::new(vec![
            // cycle 1 succeeds
            Ok(61.5),
            Ok(228.0),
            // cycle 2: channel 0 read fails
            Err(SensorError::SampleRead {
                channel: Channel::System0,
                source: std::io::Error::new(std::io::ErrorKind::Other, "bus glitch"),
            }),
            // cycle 3 succeeds with new values: 50 mV -> 1.00 A
            Ok(50.0),
            Ok(50.0),
        ]));
        let (sampler, store) =
            sampler_with(source.clone(), Duration::from_millis(20), cancel.clone());
        let mut updates = store.subscribe();

        let handle = tokio::spawn(sampler.run());

        // first publish
        timeout(Duration::from_secs(1), updates.changed())
            .await
            .unwrap()
            .unwrap();
        let after_first = store.read();
        assert!(after_first.contains("1.23"));

        // second publish only happens on cycle 3; the failed cycle in
        // between must not have touched the store
        timeout(Duration::from_secs(1), updates.changed())
            .await
            .expect("loop should survive the failed cycle")
            .unwrap();
        let after_third = store.read();
        assert!(after_third.contains("} 1.00"));

        cancel.cancel();
        handle.await.unwrap();

        assert!(logs_contain("sampling cycle failed"));
        // cycle 2 stopped at the failed channel 0 read
        assert!(source.calls() >= 5);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_sleep() {
        let cancel = CancellationToken::new();
        let source = Arc::new(ScriptedSource::new(vec![Ok(61.5), Ok(228.0)]));
        let (sampler, _store) = sampler_with(source, Duration::from_secs(60), cancel.clone());
        let mut state = sampler.state();

        let handle = tokio::spawn(sampler.run());

        // let the first cycle complete and enter the long sleep
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        // stop latency is bounded by the cycle, not the 60 s interval
        timeout(Duration::from_millis(500), handle)
            .await
            .expect("sampler should stop promptly after cancellation")
            .unwrap();
        assert_eq!(*state.borrow_and_update(), SamplerState::Stopped);
    }

    #[tokio::test]
    async fn no_hardware_access_after_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let source = Arc::new(ScriptedSource::new(vec![Ok(61.5), Ok(228.0)]));
        let (sampler, _store) = sampler_with(source.clone(), Duration::from_millis(10), cancel);

        sampler.run().await;
        assert_eq!(source.calls(), 0);
    }
}
