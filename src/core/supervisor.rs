//! Startup ordering, signal handling, and coordinated teardown.
//!
//! The `Supervisor` owns the pipeline lifecycle: it seeds the store with a
//! zero snapshot, starts the sampler and the export server, and blocks
//! until a termination signal arrives (or the server fails on its own).
//! Teardown is strictly ordered: cancel, confirm the sampler has stopped,
//! then give the server its bounded shutdown window. A missed deadline is
//! reported but never blocks process exit.

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{
    sampler::{Sampler, SamplerState},
    sensor::{Calibration, SampleSource, SensorReader},
    server::{ExportServer, ServerError},
    snapshot::MetricsStore,
};
use crate::config::{site::SiteConfig, Settings};

/// Extra slack granted to the sampler on top of its interval before its
/// shutdown wait is reported as stuck.
const SAMPLER_GRACE: Duration = Duration::from_secs(5);

/// Errors that terminate the supervisor with a failure.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The export server failed outside of an ordered shutdown.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Owns and coordinates the sampling/export pipeline.
pub struct Supervisor {
    settings: Arc<Settings>,
    site: Arc<SiteConfig>,
    source: Arc<dyn SampleSource>,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(settings: Settings, site: SiteConfig, source: Arc<dyn SampleSource>) -> Self {
        Supervisor {
            settings: Arc::new(settings),
            site: Arc::new(site),
            source,
            cancel: CancellationToken::new(),
        }
    }

    /// Token observed by every long-running component. Cancelling it from
    /// outside (tests, embedding) is equivalent to receiving a termination
    /// signal.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the pipeline until a termination signal, then tears it down.
    ///
    /// # Errors
    ///
    /// Returns an error when the export server failed before shutdown was
    /// requested (e.g. the listener could not bind).
    pub async fn run(self) -> Result<(), SupervisorError> {
        let sampling = &self.settings.sampling;
        let interval = Duration::from_secs(sampling.interval_secs);
        let shutdown_window = Duration::from_secs(self.settings.server.shutdown_timeout_secs);

        // The endpoint is well-formed before the first cycle completes.
        let store = MetricsStore::zeroed(&self.site);

        let reader = SensorReader::new(
            self.source.clone(),
            sampling.sample_count,
            Calibration::new(sampling.calibration_scale),
        );
        let sampler = Sampler::new(
            reader,
            self.site.clone(),
            store.clone(),
            interval,
            self.cancel.clone(),
        );
        let mut sampler_state = sampler.state();
        let sampler_handle = tokio::spawn(sampler.run());

        let server = ExportServer::new(
            self.settings.server.listen,
            store.clone(),
            self.cancel.clone(),
        );
        let mut server_handle = tokio::spawn(server.serve());

        let mut server_result: Option<Result<(), ServerError>> = None;
        tokio::select! {
            _ = shutdown_signal() => {
                info!("termination signal received, shutting down");
            }
            _ = self.cancel.cancelled() => {
                info!("shutdown requested, shutting down");
            }
            joined = &mut server_handle => {
                // An early server exit is an internal fatal condition:
                // escalate to an ordered shutdown of the sampler.
                let result = flatten_join(joined);
                if let Err(e) = &result {
                    error!("export server failed: {e}");
                }
                server_result = Some(result);
            }
        }

        self.cancel.cancel();

        // Sampling must be confirmed stopped before the server teardown
        // wait begins.
        match timeout(interval + SAMPLER_GRACE, sampler_handle).await {
            Ok(Ok(())) => {
                debug_assert_eq!(*sampler_state.borrow_and_update(), SamplerState::Stopped);
                info!("sampling loop confirmed stopped");
            }
            Ok(Err(e)) => error!("sampling task panicked: {e}"),
            Err(_) => warn!("sampling loop did not stop within its grace period"),
        }

        let server_result = match server_result {
            Some(result) => result,
            None => match timeout(shutdown_window, &mut server_handle).await {
                Ok(Ok(result)) => {
                    if result.is_ok() {
                        info!("http server shut down gracefully");
                    }
                    result
                }
                Ok(Err(e)) => {
                    error!("server task panicked: {e}");
                    Ok(())
                }
                Err(_) => {
                    // Anomalous for a read-only fast path, but it must not
                    // hold up process exit.
                    warn!(
                        timeout_secs = shutdown_window.as_secs(),
                        "http shutdown deadline elapsed, forcing close"
                    );
                    server_handle.abort();
                    Ok(())
                }
            },
        };

        server_result.map_err(SupervisorError::from)
    }
}

fn flatten_join(
    joined: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            error!("server task panicked: {e}");
            Ok(())
        }
    }
}

/// Completes on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                return ctrl_c.await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
