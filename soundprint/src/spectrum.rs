use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::num_traits::Zero;

use crate::config::{Configuration, SpectrumScale, WindowFunction};
use crate::error::Error;
use crate::framer::AudioWindow;

/// Band magnitudes of a single analysis window.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralFrame {
    index: usize,
    bands: Box<[f64]>,
    energy: f64,
}

impl SpectralFrame {
    pub fn new(index: usize, bands: impl Into<Box<[f64]>>, energy: f64) -> Self {
        Self { index, bands: bands.into(), energy }
    }

    /// Index of the window this frame was computed from.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bands(&self) -> &[f64] {
        &self.bands
    }

    /// Mean-square of the time-domain samples.
    pub fn energy(&self) -> f64 {
        self.energy
    }
}

/// Computes band magnitudes of audio windows.
///
/// The FFT comes from the scalar planner, so the order of floating-point
/// operations does not depend on the SIMD features of the host CPU.
pub struct SpectralTransformer {
    frame_size: usize,
    fft_plan: Arc<dyn rustfft::Fft<f64>>,
    window: Box<[f64]>,
    edges: Box<[usize]>,
    scale: SpectrumScale,
}

impl SpectralTransformer {
    pub fn new(config: &Configuration) -> Result<Self, Error> {
        config.validate()?;
        let edges = band_edges(config).ok_or_else(|| Error::invalid("bands do not fit into the spectrum"))?;
        let frame_size = config.frame_size();

        Ok(Self {
            frame_size,
            fft_plan: rustfft::FftPlannerScalar::new().plan_fft_forward(frame_size),
            window: make_window(config.window(), frame_size),
            edges,
            scale: config.scale(),
        })
    }

    pub fn bands(&self) -> usize {
        self.edges.len() - 1
    }

    /// FFT bin boundaries of every band; band `i` spans `edges[i]..edges[i + 1]`.
    pub fn band_edges(&self) -> &[usize] {
        &self.edges
    }

    /// # Panics
    ///
    /// Panics if the window does not have the configured frame size, as happens
    /// with windows of a differently configured [Framer](crate::Framer).
    pub fn transform(&self, window: &AudioWindow<'_>) -> SpectralFrame {
        let samples = window.samples();
        assert_eq!(samples.len(), self.frame_size, "window of {} samples, expected {}", samples.len(), self.frame_size);

        let mut buffer = samples
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &coefficient)| Complex64::new(sample * coefficient, 0.0))
            .collect::<Vec<_>>();
        let mut scratch = vec![Complex64::zero(); self.fft_plan.get_inplace_scratch_len()];
        self.fft_plan.process_with_scratch(&mut buffer, &mut scratch);

        let bands = self
            .edges
            .windows(2)
            .map(|edge| {
                // sqrt of norm_sqr instead of hypot: sqrt is correctly rounded everywhere
                let magnitude = buffer[edge[0]..edge[1]]
                    .iter()
                    .fold(0.0, |acc, bin| acc + bin.norm_sqr().sqrt());
                match self.scale {
                    SpectrumScale::Linear => magnitude,
                    SpectrumScale::Log => magnitude.ln_1p(),
                }
            })
            .collect::<Box<[f64]>>();

        let energy = samples.iter().fold(0.0, |acc, &x| acc + x * x) / samples.len() as f64;
        SpectralFrame::new(window.index(), bands, energy)
    }
}

/// Logarithmically spaced band boundaries, as FFT bin indices.
///
/// Returns `None` when the bands cannot all be at least one bin wide.
pub(crate) fn band_edges(config: &Configuration) -> Option<Box<[usize]>> {
    let frame_size = config.frame_size();
    let sample_rate = config.sample_rate();
    let bands = config.bands();
    let min_freq = f64::from(config.min_freq());
    let max_freq = f64::from(config.max_freq());
    let min_index = freq_to_index(min_freq, frame_size, sample_rate).max(1);
    let max_index = freq_to_index(max_freq, frame_size, sample_rate).min(frame_size / 2);

    let mut edges = Vec::with_capacity(bands + 1);
    edges.push(min_index);
    for band in 1..=bands {
        let freq = min_freq * (max_freq / min_freq).powf(band as f64 / bands as f64);
        let previous = edges[band - 1];
        edges.push(freq_to_index(freq, frame_size, sample_rate).max(previous + 1));
    }

    match edges.last() {
        Some(&last) if last <= max_index => Some(edges.into_boxed_slice()),
        _ => None,
    }
}

fn freq_to_index(freq: f64, frame_size: usize, sample_rate: u32) -> usize {
    (frame_size as f64 * freq / f64::from(sample_rate)).round() as usize
}

fn make_window(function: WindowFunction, size: usize) -> Box<[f64]> {
    let denominator = (size as f64 - 1.0).max(1.0);
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * (i as f64) / denominator;
            match function {
                WindowFunction::Hann => 0.5 - 0.5 * f64::cos(phase),
                WindowFunction::Hamming => 0.54 - 0.46 * f64::cos(phase),
            }
        })
        .collect()
}
