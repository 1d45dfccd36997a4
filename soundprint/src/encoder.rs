use crate::config::{Configuration, EncoderScheme};
use crate::error::Error;
use crate::signature::Signature;
use crate::spectrum::SpectralFrame;

/// Turns a sequence of spectral frames into signatures.
///
/// Every frame contributes `bits_per_frame` bits; a signature concatenates the
/// bits of `frames_per_signature` consecutive frames and a new signature starts
/// at every frame.
pub struct SignatureEncoder {
    scheme: EncoderScheme,
    bands: usize,
    bits_per_frame: usize,
    frames_per_signature: usize,
    silence_threshold: f64,
    seconds_per_frame: f64,
}

impl SignatureEncoder {
    pub fn new(config: &Configuration) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            scheme: config.scheme().clone(),
            bands: config.bands(),
            bits_per_frame: config.bits_per_frame(),
            frames_per_signature: config.frames_per_signature(),
            silence_threshold: config.silence_threshold(),
            seconds_per_frame: config.hop() as f64 / f64::from(config.sample_rate()),
        })
    }

    pub fn hash_bits(&self) -> usize {
        self.bits_per_frame * self.frames_per_signature
    }

    /// Encodes `frames`, stamping signatures relative to `start_seconds`.
    ///
    /// # Panics
    ///
    /// Panics if a frame has fewer bands than the configuration the encoder was
    /// built with, as happens with frames of a differently configured
    /// [SpectralTransformer](crate::SpectralTransformer).
    pub fn encode(&self, frames: &[SpectralFrame], start_seconds: f64) -> Vec<Signature> {
        assert!(
            frames.iter().all(|frame| frame.bands().len() >= self.bands),
            "spectral frame with fewer than {} bands",
            self.bands
        );
        let bit_frames = self.bit_frames(frames);
        if bit_frames.len() < self.frames_per_signature {
            return Vec::new();
        }

        bit_frames
            .windows(self.frames_per_signature)
            .enumerate()
            .map(|(index, group)| {
                let first_frame = frames[index].index();
                Signature::from_bits(group.iter().flatten().copied(), index)
                    .with_timestamp(start_seconds + first_frame as f64 * self.seconds_per_frame)
            })
            .collect()
    }

    fn bit_frames(&self, frames: &[SpectralFrame]) -> Vec<Vec<bool>> {
        match &self.scheme {
            EncoderScheme::EnergyGradient => frames
                .windows(2)
                .map(|pair| {
                    if self.is_silent(&pair[0]) || self.is_silent(&pair[1]) {
                        return vec![false; self.bits_per_frame];
                    }
                    let previous = &pair[0].bands()[..self.bands];
                    let current = &pair[1].bands()[..self.bands];
                    (0..self.bands - 1)
                        .map(|m| {
                            let now = current[m] - current[m + 1];
                            let before = previous[m] - previous[m + 1];
                            now - before > 0.0
                        })
                        .collect()
                })
                .collect(),
            EncoderScheme::BandPairs { pairs } => frames
                .iter()
                .map(|frame| {
                    if self.is_silent(frame) {
                        return vec![false; self.bits_per_frame];
                    }
                    let bands = frame.bands();
                    pairs
                        .iter()
                        .map(|&(a, b)| bands[usize::from(a)] > bands[usize::from(b)])
                        .collect()
                })
                .collect(),
        }
    }

    fn is_silent(&self, frame: &SpectralFrame) -> bool {
        frame.energy() < self.silence_threshold
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Configuration, EncoderScheme, SpectrumScale};
    use crate::encoder::SignatureEncoder;
    use crate::framer::{Framer, TimeRange};
    use crate::spectrum::{SpectralFrame, SpectralTransformer};
    use crate::utils::synthetic_music;

    fn frames(config: &Configuration, samples: &[f64]) -> Vec<SpectralFrame> {
        let transformer = SpectralTransformer::new(config).unwrap();
        let framer = Framer::new(samples, config, TimeRange::full()).unwrap();
        framer.iter().map(|window| transformer.transform(&window)).collect()
    }

    #[test]
    fn energy_gradient_bits() {
        let config = Configuration::default()
            .with_bands(3)
            .with_frames_per_signature(1)
            .with_silence_threshold(0.0);
        let encoder = SignatureEncoder::new(&config).unwrap();
        let frames = [
            SpectralFrame::new(0, vec![1.0, 2.0, 3.0], 1.0),
            SpectralFrame::new(1, vec![3.0, 2.0, 3.0], 1.0),
            SpectralFrame::new(2, vec![1.0, 1.0, 0.0], 1.0),
        ];

        let signatures = encoder.encode(&frames, 0.0);
        assert_eq!(2, signatures.len());
        // (3-2)-(1-2) > 0, (2-3)-(2-3) = 0
        assert_eq!(vec![true, false], (0..2).map(|i| signatures[0].bit(i)).collect::<Vec<_>>());
        // (1-1)-(3-2) < 0, (1-0)-(2-3) > 0
        assert_eq!(vec![false, true], (0..2).map(|i| signatures[1].bit(i)).collect::<Vec<_>>());
    }

    #[test]
    fn band_pairs_bits() {
        let config = Configuration::default()
            .with_bands(3)
            .with_scheme(EncoderScheme::BandPairs { pairs: vec![(0, 1), (2, 1), (0, 2)] })
            .with_frames_per_signature(2)
            .with_silence_threshold(0.0);
        let encoder = SignatureEncoder::new(&config).unwrap();
        let frames = [
            SpectralFrame::new(0, vec![5.0, 1.0, 3.0], 1.0),
            SpectralFrame::new(1, vec![0.0, 1.0, 3.0], 1.0),
        ];

        let signatures = encoder.encode(&frames, 0.0);
        assert_eq!(1, signatures.len());
        assert_eq!(6, signatures[0].len());
        let bits = (0..6).map(|i| signatures[0].bit(i)).collect::<Vec<_>>();
        assert_eq!(vec![true, true, true, false, true, false], bits);
    }

    #[test]
    fn signatures_slide_one_frame_at_a_time() {
        let config = Configuration::default();
        let samples = synthetic_music(1, 3.0, config.sample_rate());
        let frames = frames(&config, &samples);
        let encoder = SignatureEncoder::new(&config).unwrap();
        let signatures = encoder.encode(&frames, 1.5);

        assert_eq!(frames.len() - 1 - config.frames_per_signature() + 1, signatures.len());
        let step = config.hop() as f64 / f64::from(config.sample_rate());
        for (i, signature) in signatures.iter().enumerate() {
            assert_eq!(i, signature.index());
            assert_eq!(128, signature.len());
            let expected = 1.5 + i as f64 * step;
            assert!((signature.timestamp().unwrap() - expected).abs() < 1e-9);
        }

        // Signature i + 1 starts with the second frame of signature i.
        let bits = config.bits_per_frame();
        for pair in signatures.windows(2) {
            for bit in 0..bits * (config.frames_per_signature() - 1) {
                assert_eq!(pair[0].bit(bit + bits), pair[1].bit(bit));
            }
        }
    }

    #[test]
    fn silence_encodes_to_zero_bits() {
        let config = Configuration::default();
        let samples = vec![0.0; config.sample_rate() as usize * 2];
        let encoder = SignatureEncoder::new(&config).unwrap();
        let signatures = encoder.encode(&frames(&config, &samples), 0.0);
        assert!(!signatures.is_empty());
        assert!(signatures.iter().all(|s| s.count_ones() == 0));

        let near_silence = samples.iter().enumerate().map(|(i, _)| if i % 2 == 0 { 1e-5 } else { -1e-5 }).collect::<Vec<_>>();
        let signatures = encoder.encode(&frames(&config, &near_silence), 0.0);
        assert!(signatures.iter().all(|s| s.count_ones() == 0));
    }

    #[test]
    fn amplitude_scaling_does_not_change_bits() {
        let config = Configuration::default().with_scale(SpectrumScale::Linear);
        let samples = synthetic_music(2, 3.0, config.sample_rate());
        let quieter = samples.iter().map(|x| x * 0.5).collect::<Vec<_>>();
        let encoder = SignatureEncoder::new(&config).unwrap();

        let a = encoder.encode(&frames(&config, &samples), 0.0);
        let b = encoder.encode(&frames(&config, &quieter), 0.0);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "spectral frame with fewer than 33 bands")]
    fn frames_with_too_few_bands_panic() {
        let encoder = SignatureEncoder::new(&Configuration::default()).unwrap();
        let frames = vec![SpectralFrame::new(0, vec![1.0; 12], 1.0); 5];
        encoder.encode(&frames, 0.0);
    }

    #[test]
    fn too_few_frames_give_no_signatures() {
        let config = Configuration::default();
        let encoder = SignatureEncoder::new(&config).unwrap();
        let frames = vec![SpectralFrame::new(0, vec![1.0; 33], 1.0); 4];
        assert!(encoder.encode(&frames, 0.0).is_empty());
        assert!(encoder.encode(&[], 0.0).is_empty());
    }
}
