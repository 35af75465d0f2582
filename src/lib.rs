//! ampwatch — RMS current sampling daemon with an HTTP metrics endpoint
//!
//! This crate periodically samples two current-sensing channels on an ADC,
//! reduces each sample set to a calibrated RMS current value, and serves
//! the result as a line-oriented metrics snapshot on `GET /metrics`. It is
//! designed for unattended long-running operation on small embedded hosts,
//! with cooperative cancellation and bounded-wait graceful shutdown.
//!
//! ## Modules
//!
//! * `config` — Settings loading and validation (optional TOML file), plus
//!   the site properties collaborator that supplies the deployment labels.
//!
//! * `core` — Core runtime components:
//!   - Sensor reading (RMS + calibration over a pluggable sample source)
//!   - Atomically-replaced snapshot store
//!   - Periodic sampling loop
//!   - HTTP exposition server
//!   - Supervisor (startup ordering, signals, coordinated teardown)
//!
//! * `logger` — Centralized logging initialization using `tracing`, with
//!   console output and optional systemd journald integration.
//!
//! ## Features
//!
//! * `hardware` — Enables the ADS1115 sample source over Linux i2c-dev.
//!   Without it the binary runs against a deterministic simulated source.

pub mod config;
pub mod core;
pub mod logger;
