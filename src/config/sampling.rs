//! Configuration for the measurement loop and the HTTP export surface.
//!
//! The sampling section controls how often the two current channels are
//! read, how many raw samples go into one RMS computation, and the linear
//! calibration applied to the result. The server section controls where the
//! exposition endpoint binds and how long graceful shutdown may take.

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Configuration for the periodic sampling loop.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SamplingConfig {
    /// Seconds between sampling cycles.
    ///
    /// Must be at least 1 second.
    #[validate(range(min = 1, message = "Sampling interval must be at least 1 second"))]
    pub interval_secs: u64,

    /// Number of raw voltage samples per RMS computation.
    #[validate(range(min = 1, message = "At least one raw sample per reading is required"))]
    pub sample_count: usize,

    /// Linear calibration factor applied to the RMS millivolt value.
    ///
    /// The value is hardware-specific. Do not change it without verifying
    /// against the deployed shunt/transformer setup.
    #[validate(custom(function = "validate_calibration_scale"))]
    pub calibration_scale: f64,

    /// Path of the site properties file holding the three labels.
    pub properties_path: PathBuf,

    /// I2C character device the ADC sits on (used with the `hardware`
    /// feature).
    pub i2c_device: PathBuf,

    /// I2C address of the ADC.
    pub i2c_address: u16,
}

/// Validates that the calibration factor is strictly positive and finite.
fn validate_calibration_scale(scale: f64) -> Result<(), ValidationError> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_calibration_scale");
        err.message = Some(format!("Calibration scale must be positive, got {}", scale).into());
        Err(err)
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            interval_secs: 5,
            sample_count: 500,
            calibration_scale: 2.0,
            properties_path: PathBuf::from("ampwatch.properties"),
            i2c_device: PathBuf::from("/dev/i2c-1"),
            i2c_address: 0x48,
        }
    }
}

/// Configuration for the metrics exposition server.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address of the HTTP listener.
    pub listen: SocketAddr,

    /// Seconds granted to in-flight requests during graceful shutdown.
    ///
    /// Expiry is reported but never blocks process exit.
    #[validate(range(min = 1, max = 300, message = "Shutdown timeout must be 1..=300 seconds"))]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000)),
            shutdown_timeout_secs: 5,
        }
    }
}
