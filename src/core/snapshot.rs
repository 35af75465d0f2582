//! Snapshot rendering and the atomically-replaced metrics store.
//!
//! A snapshot is the complete exposition text for both systems' latest
//! readings, treated as one unit: it is rendered in full, installed in
//! full, and a reader can never observe anything in between. The store is a
//! watch channel holding `Arc<str>`, so `replace` is an atomic pointer
//! handoff and `read` never waits behind a writer.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::config::site::SiteConfig;

/// Renders the exposition text for the two current readings.
///
/// Pure function of its inputs: identical arguments always produce
/// byte-identical output, with amperage formatted to exactly two decimal
/// places. The line layout is a stable contract with scrapers.
pub fn render(site: &SiteConfig, amps0: f64, amps1: f64) -> String {
    format!(
        "# HELP system_value Fixed system value\n\
         # TYPE ampere_value gauge\n\
         ampere_value{{system=\"{}\", point=\"{}\"}} {:.2}\n\
         ampere_value{{system=\"{}\", point=\"{}\"}} {:.2}\n",
        site.system0, site.point, amps0, site.system1, site.point, amps1,
    )
}

/// Holds the most recently rendered snapshot.
///
/// Cloning the store clones the handle, not the data; all clones observe
/// the same snapshot. The writer side is the sampling loop, the readers are
/// HTTP request handlers.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    tx: watch::Sender<Arc<str>>,
    rx: watch::Receiver<Arc<str>>,
}

impl MetricsStore {
    /// Creates a store seeded with the given snapshot text.
    pub fn new(initial: String) -> Self {
        let (tx, rx) = watch::channel(Arc::from(initial));
        MetricsStore { tx, rx }
    }

    /// Creates a store seeded with a zero-valued snapshot, so the endpoint
    /// is well-formed before the first sampling cycle completes.
    pub fn zeroed(site: &SiteConfig) -> Self {
        MetricsStore::new(render(site, 0.0, 0.0))
    }

    /// Atomically installs new snapshot text, visible to all subsequent
    /// `read` calls.
    pub fn replace(&self, snapshot: String) {
        // Only fails when every receiver is gone, which cannot outlive the
        // store's own handle; reachable solely during teardown races.
        if self.tx.send(Arc::from(snapshot)).is_err() {
            debug!("metrics store replaced after all readers were dropped");
        }
    }

    /// Returns the current snapshot text.
    pub fn read(&self) -> Arc<str> {
        self.rx.borrow().clone()
    }

    /// Subscribes to snapshot replacements. Used by tests to await cycles.
    pub fn subscribe(&self) -> watch::Receiver<Arc<str>> {
        self.rx.clone()
    }
}
