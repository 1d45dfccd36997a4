use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::error::Error;

/// Portion of the audio to fingerprint, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    start: f64,
    duration: Option<f64>,
}

impl TimeRange {
    /// The whole audio.
    pub fn full() -> Self {
        Self::default()
    }

    /// `duration` seconds of audio beginning at `start`.
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration: Some(duration) }
    }

    /// Everything from `start` to the end of the audio.
    pub fn starting_at(start: f64) -> Self {
        Self { start, duration: None }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// End of the range in seconds, if bounded.
    pub fn end(&self) -> Option<f64> {
        self.duration.map(|duration| self.start + duration)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(Error::invalid(format!("invalid start offset {}", self.start)));
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(Error::invalid(format!("invalid duration {duration}")));
            }
        }
        Ok(())
    }

    /// Sample indices covered by the range, truncated to `available` samples.
    pub(crate) fn to_samples(self, sample_rate: u32, available: usize) -> Range<usize> {
        let rate = f64::from(sample_rate);
        let start = ((self.start * rate).round() as usize).min(available);
        let end = match self.duration {
            Some(duration) => start.saturating_add((duration * rate).round() as usize).min(available),
            None => available,
        };
        start..end
    }
}

/// A single analysis window, borrowed from the framed samples.
#[derive(Debug, Clone, Copy)]
pub struct AudioWindow<'a> {
    index: usize,
    start: usize,
    samples: &'a [f64],
}

impl<'a> AudioWindow<'a> {
    /// Position of the window in the frame sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset of the first sample, relative to the beginning of the audio.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Duration in samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &'a [f64] {
        self.samples
    }
}

/// Slices mono audio into overlapping windows of a fixed size.
#[derive(Debug, Clone)]
pub struct Framer<'a> {
    samples: &'a [f64],
    offset: usize,
    frame_size: usize,
    hop: usize,
    sample_rate: u32,
    count: usize,
}

impl<'a> Framer<'a> {
    pub fn new(samples: &'a [f64], config: &Configuration, range: TimeRange) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::InsufficientAudio);
        }
        if config.frame_size() == 0 || config.hop() == 0 {
            return Err(Error::invalid("frame size and hop must be greater than zero"));
        }
        range.validate()?;

        let region = range.to_samples(config.sample_rate(), samples.len());
        let offset = region.start;
        let samples = &samples[region];
        let count = if samples.len() >= config.frame_size() {
            (samples.len() - config.frame_size()) / config.hop() + 1
        } else {
            0
        };

        Ok(Self {
            samples,
            offset,
            frame_size: config.frame_size(),
            hop: config.hop(),
            sample_rate: config.sample_rate(),
            count,
        })
    }

    /// Number of windows.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sample offset of the first window.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Time of the first window in seconds.
    pub fn start_seconds(&self) -> f64 {
        self.offset as f64 / f64::from(self.sample_rate)
    }

    pub fn window(&self, index: usize) -> Option<AudioWindow<'a>> {
        if index >= self.count {
            return None;
        }
        let begin = index * self.hop;
        Some(AudioWindow {
            index,
            start: self.offset + begin,
            samples: &self.samples[begin..begin + self.frame_size],
        })
    }

    /// Iterates over all windows. Can be called any number of times.
    pub fn iter(&self) -> Windows<'a> {
        Windows { framer: self.clone(), next: 0 }
    }
}

impl<'a> IntoIterator for &Framer<'a> {
    type Item = AudioWindow<'a>;
    type IntoIter = Windows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct Windows<'a> {
    framer: Framer<'a>,
    next: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = AudioWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.framer.window(self.next)?;
        self.next += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.framer.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}
