//! Current sensing on top of a pluggable ADC sample source.
//!
//! The physical driver sits behind the [`SampleSource`] trait: one
//! operation, "read N raw voltage samples from channel C". Everything above
//! that boundary — RMS computation and linear calibration — lives in
//! [`SensorReader`] and is hardware-independent.

use std::{fmt, sync::Arc};

use thiserror::Error;

pub mod sim;

#[cfg(feature = "hardware")]
pub mod ads1115;

/// Result alias for sensor operations.
pub type SensorResult<T> = std::result::Result<T, SensorError>;

/// Errors raised by sample acquisition or reading computation.
///
/// All of these are recoverable at the sampling-cycle level: the loop
/// reports them and retains the last good snapshot instead of terminating.
#[derive(Error, Debug)]
pub enum SensorError {
    /// Failed to open the underlying bus device.
    #[error("Failed to open I2C bus {path}")]
    BusOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to address or configure the ADC on the bus.
    #[error("Failed to initialize ADC at {path} address {address:#04x}")]
    DeviceInit {
        path: String,
        address: u16,
        #[source]
        source: std::io::Error,
    },

    /// A raw sample read from the addressed channel failed.
    #[error("Failed to read sample from channel {channel}")]
    SampleRead {
        channel: Channel,
        #[source]
        source: std::io::Error,
    },

    /// The source returned an empty sample set; RMS is undefined.
    #[error("Sample source returned no samples for channel {channel}")]
    EmptySamples { channel: Channel },

    /// The source is not usable at all (missing hardware, dead task).
    #[error("Sample source unavailable: {0}")]
    Unavailable(String),
}

/// The two measured channels, in their fixed acquisition order.
///
/// On the reference ADC these map to the differential pairs AIN0/AIN1 and
/// AIN2/AIN3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    System0,
    System1,
}

impl Channel {
    /// Both channels in acquisition order.
    pub const ALL: [Channel; 2] = [Channel::System0, Channel::System1];

    /// Index of the channel, 0 or 1.
    pub fn index(self) -> usize {
        match self {
            Channel::System0 => 0,
            Channel::System1 => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::System0 => write!(f, "system0"),
            Channel::System1 => write!(f, "system1"),
        }
    }
}

/// The physical-driver boundary.
///
/// Implementations return raw voltage samples in millivolts for the
/// addressed channel. They may block on hardware I/O internally; the
/// contract is one bus acquisition per call, released before returning.
#[async_trait::async_trait]
pub trait SampleSource: Send + Sync + 'static {
    /// Reads `count` raw voltage samples (millivolts) from `channel`.
    async fn sample(&self, channel: Channel, count: usize) -> SensorResult<Vec<f64>>;
}

/// One RMS current value for one channel, produced by a sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Channel the value was measured on.
    pub channel: Channel,
    /// Calibrated RMS current in amperes, two decimal places.
    pub amps: f64,
}

/// Linear calibration from RMS millivolts to amperes.
///
/// The scale factor is hardware-specific (shunt/transformer dependent);
/// the division by 100 folds the millivolt-to-ampere conversion in and
/// pins the result to exactly two decimal places.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub scale: f64,
}

impl Calibration {
    pub fn new(scale: f64) -> Self {
        Calibration { scale }
    }

    /// Applies the calibration to an RMS millivolt value.
    pub fn apply(&self, rms_mv: f64) -> f64 {
        (rms_mv * self.scale).round() / 100.0
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration { scale: 2.0 }
    }
}

/// Computes one calibrated RMS current reading per call.
#[derive(Clone)]
pub struct SensorReader {
    source: Arc<dyn SampleSource>,
    sample_count: usize,
    calibration: Calibration,
}

impl SensorReader {
    pub fn new(source: Arc<dyn SampleSource>, sample_count: usize, calibration: Calibration) -> Self {
        SensorReader {
            source,
            sample_count,
            calibration,
        }
    }

    /// Acquires one sample set from `channel` and reduces it to a calibrated
    /// RMS current reading.
    ///
    /// # Errors
    ///
    /// Propagates acquisition failures from the source and rejects empty
    /// sample sets.
    pub async fn read(&self, channel: Channel) -> SensorResult<Reading> {
        let samples = self.source.sample(channel, self.sample_count).await?;
        if samples.is_empty() {
            return Err(SensorError::EmptySamples { channel });
        }

        let mean_square = samples.iter().map(|v| v * v).sum::<f64>() / samples.len() as f64;
        let rms_mv = mean_square.sqrt();

        Ok(Reading {
            channel,
            amps: self.calibration.apply(rms_mv),
        })
    }
}
