use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::spectrum::band_edges;

/// Version of the bit-selection rules implemented by [EncoderScheme].
///
/// Bumped whenever a change would make signatures produced by an older build
/// incomparable with new ones.
///
/// Known limitation: the version pins the rules, not the arithmetic. Window
/// coefficients, band edges and log scaling use the platform `cos`, `powf` and
/// `ln_1p`, which may differ by one ulp between platforms, and so may the FFT
/// twiddles. An [EncoderScheme::EnergyGradient] bit whose gradient lands within
/// that error of zero can then come out differently. Signatures are
/// bit-identical across runs and across machines sharing a libm.
pub const SCHEME_VERSION: u16 = 1;

const MIN_SAMPLE_RATE: u32 = 1000;
const MAX_HASH_BITS: usize = 4096;

/// Window applied to every frame before the FFT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    #[default]
    Hann,
    Hamming,
}

/// Scaling applied to band magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumScale {
    Linear,
    /// `ln(1 + magnitude)`
    #[default]
    Log,
}

/// Rule that turns band energies into bits.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EncoderScheme {
    /// Sign of the band energy difference, differentiated along time.
    /// Produces `bands - 1` bits per frame.
    #[default]
    EnergyGradient,
    /// One bit per pair `(a, b)`: set when band `a` is stronger than band `b`.
    BandPairs { pairs: Vec<(u16, u16)> },
}

impl EncoderScheme {
    /// Number of bits contributed by a single spectral frame.
    pub fn bits_per_frame(&self, bands: usize) -> usize {
        match self {
            EncoderScheme::EnergyGradient => bands.saturating_sub(1),
            EncoderScheme::BandPairs { pairs } => pairs.len(),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            EncoderScheme::EnergyGradient => 0,
            EncoderScheme::BandPairs { .. } => 1,
        }
    }
}

/// Structure containing configuration for a [Fingerprinter](crate::Fingerprinter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    sample_rate: u32,
    frame_size: usize,
    hop: usize,
    window: WindowFunction,
    min_freq: u32,
    max_freq: u32,
    bands: usize,
    scale: SpectrumScale,
    scheme: EncoderScheme,
    frames_per_signature: usize,
    silence_threshold: f64,
}

impl Configuration {
    /// Sets the sample rate the audio is converted to before analysis.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets number of samples in a single frame for FFT.
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Sets number of samples between the starts of two consecutive frames.
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop;
        self
    }

    pub fn with_window(mut self, window: WindowFunction) -> Self {
        self.window = window;
        self
    }

    /// Restricts the analysed spectrum to `min_freq..max_freq` Hz.
    pub fn with_frequency_range(mut self, min_freq: u32, max_freq: u32) -> Self {
        self.min_freq = min_freq;
        self.max_freq = max_freq;
        self
    }

    /// Sets number of logarithmically spaced bands the spectrum is reduced to.
    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_scale(mut self, scale: SpectrumScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_scheme(mut self, scheme: EncoderScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets number of consecutive frames concatenated into one signature.
    pub fn with_frames_per_signature(mut self, frames: usize) -> Self {
        self.frames_per_signature = frames;
        self
    }

    /// Frames whose mean-square energy is below this value encode as silence.
    pub fn with_silence_threshold(mut self, threshold: f64) -> Self {
        self.silence_threshold = threshold;
        self
    }

    /// Defaults tuned for music identification: 128-bit signatures every ~46ms.
    pub fn preset_default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            hop: DEFAULT_HOP,
            window: WindowFunction::Hann,
            min_freq: MIN_FREQ,
            max_freq: MAX_FREQ,
            bands: DEFAULT_BANDS,
            scale: SpectrumScale::Log,
            scheme: EncoderScheme::EnergyGradient,
            frames_per_signature: 4,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
        }
    }

    /// Half-sized FFT and 64-bit signatures.
    pub fn preset_fast() -> Self {
        Self::preset_default()
            .with_frame_size(DEFAULT_FRAME_SIZE / 2)
            .with_frames_per_signature(2)
    }

    /// Compares the level of neighbouring bands within a single frame.
    pub fn preset_band_pairs() -> Self {
        let pairs = (0..DEFAULT_BANDS as u16 - 1).map(|band| (band, band + 1)).collect();
        Self::preset_default().with_scheme(EncoderScheme::BandPairs { pairs })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn window(&self) -> WindowFunction {
        self.window
    }

    pub fn min_freq(&self) -> u32 {
        self.min_freq
    }

    pub fn max_freq(&self) -> u32 {
        self.max_freq
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn scale(&self) -> SpectrumScale {
        self.scale
    }

    pub fn scheme(&self) -> &EncoderScheme {
        &self.scheme
    }

    pub fn frames_per_signature(&self) -> usize {
        self.frames_per_signature
    }

    pub fn silence_threshold(&self) -> f64 {
        self.silence_threshold
    }

    pub fn bits_per_frame(&self) -> usize {
        self.scheme.bits_per_frame(self.bands)
    }

    /// Length in bits of every signature produced with this configuration.
    pub fn hash_bits(&self) -> usize {
        self.bits_per_frame() * self.frames_per_signature
    }

    /// A duration of a single item from the fingerprint.
    pub fn item_duration_in_seconds(&self) -> f32 {
        self.hop as f32 / self.sample_rate as f32
    }

    /// Stable identifier of the fingerprinting scheme.
    ///
    /// Signatures are comparable only when produced by configurations with the same id.
    pub fn id(&self) -> u32 {
        let mut hash = Fnv1a::new();
        hash.write(&SCHEME_VERSION.to_le_bytes());
        hash.write(&self.sample_rate.to_le_bytes());
        hash.write(&(self.frame_size as u64).to_le_bytes());
        hash.write(&(self.hop as u64).to_le_bytes());
        hash.write(&[self.window as u8, self.scale as u8, self.scheme.tag()]);
        hash.write(&self.min_freq.to_le_bytes());
        hash.write(&self.max_freq.to_le_bytes());
        hash.write(&(self.bands as u64).to_le_bytes());
        if let EncoderScheme::BandPairs { pairs } = &self.scheme {
            for (a, b) in pairs {
                hash.write(&a.to_le_bytes());
                hash.write(&b.to_le_bytes());
            }
        }
        hash.write(&(self.frames_per_signature as u64).to_le_bytes());
        hash.write(&self.silence_threshold.to_bits().to_le_bytes());
        hash.finish()
    }

    /// Checks that the parameters describe a usable pipeline.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate < MIN_SAMPLE_RATE {
            return Err(Error::invalid(format!(
                "sample rate {} is too low, required min. {MIN_SAMPLE_RATE}",
                self.sample_rate
            )));
        }
        if self.frame_size < 2 {
            return Err(Error::invalid(format!("frame size must be at least 2, got {}", self.frame_size)));
        }
        if self.hop == 0 {
            return Err(Error::invalid("hop must be greater than zero"));
        }
        if self.min_freq == 0 || self.min_freq >= self.max_freq {
            return Err(Error::invalid(format!(
                "invalid frequency range {}..{} Hz",
                self.min_freq, self.max_freq
            )));
        }
        if self.max_freq > self.sample_rate / 2 {
            return Err(Error::invalid(format!(
                "max frequency {} Hz is above the Nyquist frequency of {} Hz",
                self.max_freq,
                self.sample_rate / 2
            )));
        }
        if self.bands < 2 {
            return Err(Error::invalid(format!("at least 2 bands are required, got {}", self.bands)));
        }
        if band_edges(self).is_none() {
            return Err(Error::invalid(format!(
                "{} bands do not fit into {}..{} Hz with a frame size of {}",
                self.bands, self.min_freq, self.max_freq, self.frame_size
            )));
        }
        if let EncoderScheme::BandPairs { pairs } = &self.scheme {
            if let Some((a, b)) = pairs
                .iter()
                .find(|(a, b)| a == b || usize::from(*a) >= self.bands || usize::from(*b) >= self.bands)
            {
                return Err(Error::invalid(format!("band pair ({a}, {b}) is not valid for {} bands", self.bands)));
            }
        }
        if self.frames_per_signature == 0 {
            return Err(Error::invalid("frames per signature must be greater than zero"));
        }
        let hash_bits = self.hash_bits();
        if hash_bits == 0 || hash_bits > MAX_HASH_BITS {
            return Err(Error::invalid(format!(
                "signature width must be within 1..={MAX_HASH_BITS} bits, got {hash_bits}"
            )));
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(Error::invalid(format!("invalid silence threshold {}", self.silence_threshold)));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::preset_default()
    }
}

const MIN_FREQ: u32 = 318;
const MAX_FREQ: u32 = 2000;

const DEFAULT_SAMPLE_RATE: u32 = 5512;
const DEFAULT_FRAME_SIZE: usize = 2048;
const DEFAULT_HOP: usize = 256;
const DEFAULT_BANDS: usize = 33;
const DEFAULT_SILENCE_THRESHOLD: f64 = 1e-7;

/// Parameters of the query index and of the matching stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfiguration {
    sub_bands: usize,
    hamming_threshold: u32,
    min_votes: usize,
    min_alignment_ratio: f64,
    offset_tolerance: u32,
}

impl QueryConfiguration {
    /// Sets number of equal sub-bands a signature is split into for indexing.
    ///
    /// A reference signature differing from the query in fewer bits than there
    /// are sub-bands always shares a sub-band with it. Keep the Hamming
    /// threshold below this count for lookups to find every candidate within it.
    pub fn with_sub_bands(mut self, sub_bands: usize) -> Self {
        self.sub_bands = sub_bands;
        self
    }

    /// Candidates further than this many bits from a query signature are discarded.
    pub fn with_hamming_threshold(mut self, threshold: u32) -> Self {
        self.hamming_threshold = threshold;
        self
    }

    /// Minimum number of matching query signatures for a track to be reported.
    pub fn with_min_votes(mut self, min_votes: usize) -> Self {
        self.min_votes = min_votes;
        self
    }

    /// Minimum share of votes that must agree on the dominant time alignment.
    pub fn with_min_alignment_ratio(mut self, ratio: f64) -> Self {
        self.min_alignment_ratio = ratio;
        self
    }

    /// Alignment offsets this close to the dominant one still count as aligned.
    pub fn with_offset_tolerance(mut self, tolerance: u32) -> Self {
        self.offset_tolerance = tolerance;
        self
    }

    pub fn sub_bands(&self) -> usize {
        self.sub_bands
    }

    pub fn hamming_threshold(&self) -> u32 {
        self.hamming_threshold
    }

    pub fn min_votes(&self) -> usize {
        self.min_votes
    }

    pub fn min_alignment_ratio(&self) -> f64 {
        self.min_alignment_ratio
    }

    pub fn offset_tolerance(&self) -> u32 {
        self.offset_tolerance
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.sub_bands == 0 {
            return Err(Error::invalid("at least one index sub-band is required"));
        }
        if !(0.0..=1.0).contains(&self.min_alignment_ratio) {
            return Err(Error::invalid(format!(
                "alignment ratio must be within 0..=1, got {}",
                self.min_alignment_ratio
            )));
        }
        Ok(())
    }

    /// Checks that signatures of `hash_bits` bits can be split into the configured sub-bands.
    pub fn validate_for(&self, hash_bits: usize) -> Result<(), Error> {
        self.validate()?;
        if hash_bits == 0 || hash_bits % self.sub_bands != 0 {
            return Err(Error::invalid(format!(
                "{hash_bits}-bit signatures cannot be split into {} equal sub-bands",
                self.sub_bands
            )));
        }
        if hash_bits / self.sub_bands > 64 {
            return Err(Error::invalid(format!(
                "sub-bands of {} bits are wider than 64 bits",
                hash_bits / self.sub_bands
            )));
        }
        Ok(())
    }
}

impl Default for QueryConfiguration {
    fn default() -> Self {
        Self {
            sub_bands: 16,
            hamming_threshold: 15,
            min_votes: 5,
            min_alignment_ratio: 0.25,
            offset_tolerance: 1,
        }
    }
}

/// Both configurations, as loaded from a settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fingerprint: Configuration,
    pub query: QueryConfiguration,
}

struct Fnv1a(u32);

impl Fnv1a {
    fn new() -> Self {
        Self(0x811c_9dc5)
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u32::from(byte);
            self.0 = self.0.wrapping_mul(0x0100_0193);
        }
    }

    fn finish(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Configuration, EncoderScheme, QueryConfiguration, Settings};
    use crate::error::Error;

    #[test]
    fn presets_are_valid() {
        for config in [
            Configuration::preset_default(),
            Configuration::preset_fast(),
            Configuration::preset_band_pairs(),
        ] {
            config.validate().unwrap();
        }
    }

    #[test]
    fn hash_width() {
        assert_eq!(128, Configuration::preset_default().hash_bits());
        assert_eq!(64, Configuration::preset_fast().hash_bits());
        assert_eq!(128, Configuration::preset_band_pairs().hash_bits());
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let config = Configuration::default().with_frame_size(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn frequency_above_nyquist_is_rejected() {
        let config = Configuration::default().with_frequency_range(318, 4000);
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn too_many_bands_are_rejected() {
        let config = Configuration::default().with_frame_size(64).with_bands(200);
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn band_pairs_out_of_range_are_rejected() {
        let config = Configuration::default().with_scheme(EncoderScheme::BandPairs { pairs: vec![(0, 40)] });
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn id_depends_on_bit_affecting_parameters() {
        let a = Configuration::preset_default();
        assert_eq!(a.id(), Configuration::preset_default().id());
        assert_ne!(a.id(), a.clone().with_hop(512).id());
        assert_ne!(a.id(), Configuration::preset_band_pairs().id());
    }

    #[test]
    fn sub_bands_must_divide_width() {
        let config = QueryConfiguration::default().with_sub_bands(3);
        assert!(config.validate_for(128).is_err());
        assert!(QueryConfiguration::default().validate_for(128).is_ok());
        assert!(QueryConfiguration::default().with_sub_bands(1).validate_for(128).is_err());
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"query": {"hamming_threshold": 20}}"#).unwrap();
        assert_eq!(settings.fingerprint, Configuration::default());
        assert_eq!(20, settings.query.hamming_threshold());
        assert_eq!(16, settings.query.sub_bands());
    }

    #[test]
    fn default_threshold_is_below_sub_bands() {
        let config = QueryConfiguration::default();
        assert!((config.hamming_threshold() as usize) < config.sub_bands());
        assert!(config.validate_for(Configuration::default().hash_bits()).is_ok());
    }

    #[test]
    fn band_pairs_scheme_deserializes() {
        let config: Configuration =
            serde_json::from_str(r#"{"scheme": {"kind": "band_pairs", "pairs": [[0, 1], [4, 2]]}}"#).unwrap();
        assert_eq!(&EncoderScheme::BandPairs { pairs: vec![(0, 1), (4, 2)] }, config.scheme());
        assert_eq!(8, config.hash_bits());
    }
}
