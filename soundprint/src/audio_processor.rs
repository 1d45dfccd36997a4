use rubato::{
    Resampler, ResampleError, ResamplerConstructionError, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use thiserror::Error;

use crate::error::Error as SoundprintError;

const MIN_SAMPLE_RATE: u32 = 1000;
const MAX_BUFFER_SIZE: usize = 1024 * 32;

/// Downmixes interleaved 16-bit audio to mono and converts it to the target sample rate.
pub struct AudioProcessor {
    target_sample_rate: u32,
    channels: usize,
    ratio: f64,
    input: Vec<f64>,
    output: Vec<f64>,
    consumed_frames: usize,
    pending_delay: usize,
    resampler: Option<SincFixedIn<f64>>,
}

impl AudioProcessor {
    pub(crate) fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate,
            channels: 0,
            ratio: 1.0,
            input: Vec::new(),
            output: Vec::new(),
            consumed_frames: 0,
            pending_delay: 0,
            resampler: None,
        }
    }

    pub(crate) fn reset(&mut self, sample_rate: u32, channels: u32) -> Result<(), ProcessorError> {
        if channels == 0 {
            return Err(ProcessorError::NoChannels);
        }

        if sample_rate <= MIN_SAMPLE_RATE {
            return Err(ProcessorError::SampleRateTooLow);
        }

        self.channels = channels as usize;
        self.input.clear();
        self.output.clear();
        self.consumed_frames = 0;
        self.pending_delay = 0;
        self.resampler = None;
        self.ratio = f64::from(self.target_sample_rate) / f64::from(sample_rate);

        if self.target_sample_rate != sample_rate {
            let resampler = SincFixedIn::new(
                self.ratio,
                1.0,
                SincInterpolationParameters {
                    sinc_len: 16,
                    f_cutoff: 0.8,
                    oversampling_factor: 128,
                    interpolation: SincInterpolationType::Nearest,
                    window: WindowFunction::Blackman,
                },
                MAX_BUFFER_SIZE,
                1,
            )?;
            self.pending_delay = resampler.output_delay();
            self.resampler = Some(resampler);
        }

        Ok(())
    }

    /// Adds interleaved samples. Trailing samples that do not form a whole frame are ignored.
    pub(crate) fn consume(&mut self, data: &[i16]) -> Result<(), ProcessorError> {
        debug_assert!(self.channels > 0, "consume called before reset");
        debug_assert_eq!(data.len() % self.channels, 0);

        let before = self.input.len();
        match self.channels {
            1 => self.input.extend(data.iter().map(|&sample| to_f64(sample))),
            2 => self.input.extend(
                data.chunks_exact(2)
                    .map(|frame| to_f64(((i32::from(frame[0]) + i32::from(frame[1])) / 2) as i16)),
            ),
            channels => self.input.extend(data.chunks_exact(channels).map(|frame| {
                let sum: i32 = frame.iter().copied().map(i32::from).sum();
                to_f64((sum / channels as i32) as i16)
            })),
        }
        self.consumed_frames += self.input.len() - before;

        self.resample(false)
    }

    /// Pushes everything still buffered through the resampler.
    pub(crate) fn flush(&mut self) -> Result<(), ProcessorError> {
        self.resample(true)
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &[f64] {
        &self.output
    }

    pub(crate) fn take_output(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.output)
    }

    fn resample(&mut self, flush: bool) -> Result<(), ProcessorError> {
        let Some(resampler) = self.resampler.as_mut() else {
            self.output.append(&mut self.input);
            return Ok(());
        };

        let mut offset = 0;
        while self.input.len() - offset >= resampler.input_frames_next() {
            let required = resampler.input_frames_next();
            let wave: [&[f64]; 1] = [&self.input[offset..offset + required]];
            let chunk = resampler.process(&wave[..], None)?;
            offset += required;
            push_delayed(&mut self.output, &mut self.pending_delay, &chunk[0]);
        }
        self.input.drain(..offset);

        if flush {
            if !self.input.is_empty() {
                let wave: [&[f64]; 1] = [&self.input];
                let chunk = resampler.process_partial(Some(&wave[..]), None)?;
                self.input.clear();
                push_delayed(&mut self.output, &mut self.pending_delay, &chunk[0]);
            }

            // Zero input drains the samples held back by the filter delay.
            let expected = (self.consumed_frames as f64 * self.ratio).round() as usize;
            while self.output.len() < expected {
                let chunk = resampler.process_partial::<&[f64]>(None, None)?;
                if chunk[0].is_empty() {
                    break;
                }
                push_delayed(&mut self.output, &mut self.pending_delay, &chunk[0]);
            }
            self.output.truncate(expected);
        }

        Ok(())
    }
}

fn push_delayed(output: &mut Vec<f64>, pending_delay: &mut usize, chunk: &[f64]) {
    let skipped = (*pending_delay).min(chunk.len());
    *pending_delay -= skipped;
    output.extend_from_slice(&chunk[skipped..]);
}

#[inline]
fn to_f64(sample: i16) -> f64 {
    f64::from(sample) / f64::from(i16::MAX)
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("sample rate is too low, required min. {MIN_SAMPLE_RATE}")]
    SampleRateTooLow,
    #[error("at least one channel is required")]
    NoChannels,
    #[error("cannot resample: {0}")]
    CannotResample(#[from] ResamplerConstructionError),
    #[error("resampling failed: {0}")]
    Resample(#[from] ResampleError),
}

impl From<ProcessorError> for SoundprintError {
    fn from(e: ProcessorError) -> Self {
        SoundprintError::source_unavailable_with("cannot convert the decoded audio", e)
    }
}
