//! Deterministic simulated sample source.
//!
//! Stands in for the ADC when the `hardware` feature is disabled and in
//! tests and demos. The waveform is a plain sine per channel, so the RMS of
//! a full period is `amplitude / sqrt(2)` and runs are reproducible.

use super::{Channel, SampleSource, SensorResult};

/// Synthesizes raw millivolt samples without touching any hardware.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    /// Peak amplitude in millivolts, per channel.
    amplitude_mv: [f64; 2],
    /// When set, every sample is the amplitude itself (a DC signal), which
    /// makes expected RMS values exact in tests.
    constant: bool,
}

impl SimulatedSource {
    /// Sine waveform with the given per-channel peak amplitudes.
    pub fn new(amplitude_mv: [f64; 2]) -> Self {
        SimulatedSource {
            amplitude_mv,
            constant: false,
        }
    }

    /// DC signal: every sample equals the given millivolt level. RMS is the
    /// level itself, so calibrated output is exactly `round(level * scale) / 100`.
    pub fn constant(level_mv: [f64; 2]) -> Self {
        SimulatedSource {
            amplitude_mv: level_mv,
            constant: true,
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        // Arbitrary but distinct per channel so the two gauges visibly differ.
        SimulatedSource::new([320.0, 95.0])
    }
}

#[async_trait::async_trait]
impl SampleSource for SimulatedSource {
    async fn sample(&self, channel: Channel, count: usize) -> SensorResult<Vec<f64>> {
        let amplitude = self.amplitude_mv[channel.index()];
        if self.constant {
            return Ok(vec![amplitude; count]);
        }

        // One full 50 Hz-style period spread across the sample set.
        let samples = (0..count)
            .map(|i| {
                let phase = 2.0 * std::f64::consts::PI * i as f64 / count as f64;
                amplitude * phase.sin()
            })
            .collect();
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sine_rms_approaches_amplitude_over_sqrt2() {
        let source = SimulatedSource::new([100.0, 100.0]);
        let samples = source.sample(Channel::System0, 500).await.unwrap();

        let rms = (samples.iter().map(|v| v * v).sum::<f64>() / samples.len() as f64).sqrt();
        let expected = 100.0 / 2.0_f64.sqrt();
        assert!((rms - expected).abs() < 0.5, "rms {rms} vs {expected}");
    }

    #[tokio::test]
    async fn output_is_deterministic() {
        let source = SimulatedSource::default();
        let a = source.sample(Channel::System1, 64).await.unwrap();
        let b = source.sample(Channel::System1, 64).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn constant_mode_yields_flat_samples() {
        let source = SimulatedSource::constant([61.5, 228.0]);
        let samples = source.sample(Channel::System0, 10).await.unwrap();
        assert_eq!(samples, vec![61.5; 10]);
    }
}
