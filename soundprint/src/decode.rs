use std::fmt::{Debug, Formatter};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::audio_processor::AudioProcessor;
use crate::error::Error;

const PCM_CHUNK_FRAMES: usize = 4096;

/// Where the audio to fingerprint comes from.
pub enum AudioSource {
    /// Any file format symphonia can probe.
    File(PathBuf),
    /// An encoded stream; `extension` helps to guess the container format.
    Stream {
        reader: Box<dyn MediaSource>,
        extension: Option<String>,
    },
    /// Raw interleaved samples.
    Pcm(PcmBuffer),
}

impl AudioSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        AudioSource::File(path.into())
    }

    /// Wraps a non-seekable reader of encoded audio.
    pub fn stream<R>(reader: R, extension: Option<&str>) -> Self
    where
        R: Read + Send + Sync + 'static,
    {
        AudioSource::Stream {
            reader: Box::new(ReadOnlySource::new(reader)),
            extension: extension.map(str::to_owned),
        }
    }

    pub fn pcm(buffer: PcmBuffer) -> Self {
        AudioSource::Pcm(buffer)
    }

    /// Short human readable description, used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            AudioSource::File(path) => path.display().to_string(),
            AudioSource::Stream { extension: Some(ext), .. } => format!("<{ext} stream>"),
            AudioSource::Stream { extension: None, .. } => "<stream>".to_owned(),
            AudioSource::Pcm(pcm) => format!("<pcm {} Hz, {} ch>", pcm.sample_rate, pcm.channels),
        }
    }
}

impl Debug for AudioSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioSource::File(path) => f.debug_tuple("File").field(path).finish(),
            AudioSource::Stream { extension, .. } => {
                f.debug_struct("Stream").field("extension", extension).finish_non_exhaustive()
            }
            AudioSource::Pcm(pcm) => f.debug_tuple("Pcm").field(pcm).finish(),
        }
    }
}

impl From<PcmBuffer> for AudioSource {
    fn from(buffer: PcmBuffer) -> Self {
        AudioSource::Pcm(buffer)
    }
}

/// Interleaved signed 16-bit samples.
#[derive(Clone)]
pub struct PcmBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u32,
}

impl PcmBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u32) -> Self {
        Self { samples, sample_rate, channels }
    }

    /// Quantizes mono samples in `-1.0..=1.0`.
    pub fn from_mono_f64(samples: &[f64], sample_rate: u32) -> Self {
        let samples = samples
            .iter()
            .map(|x| (x.clamp(-1.0, 1.0) * f64::from(i16::MAX)).round() as i16)
            .collect();
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (self.samples.len() / self.channels as usize) as f64 / f64::from(self.sample_rate)
    }
}

impl Debug for PcmBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmBuffer")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Decodes `source` into mono samples at `target_sample_rate`.
///
/// Reading stops once `end` seconds have been decoded.
pub(crate) fn load(
    source: AudioSource,
    target_sample_rate: u32,
    end: Option<f64>,
    cancellation: &CancellationToken,
) -> Result<Vec<f64>, Error> {
    let description = source.describe();
    let samples = match source {
        AudioSource::File(path) => {
            let file = std::fs::File::open(&path)
                .map_err(|e| Error::source_unavailable_with(format!("cannot open {}", path.display()), e))?;
            let mss = MediaSourceStream::new(Box::new(file), Default::default());
            decode(mss, hint_for(&path), target_sample_rate, end, cancellation)?
        }
        AudioSource::Stream { reader, extension } => {
            let mss = MediaSourceStream::new(reader, Default::default());
            let mut hint = Hint::new();
            if let Some(ext) = &extension {
                hint.with_extension(ext);
            }
            decode(mss, hint, target_sample_rate, end, cancellation)?
        }
        AudioSource::Pcm(pcm) => convert_pcm(&pcm, target_sample_rate, end, cancellation)?,
    };

    if samples.is_empty() {
        return Err(Error::InsufficientAudio);
    }
    debug!(source = %description, samples = samples.len(), "decoded audio");
    Ok(samples)
}

fn hint_for(path: &Path) -> Hint {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    hint
}

fn decode(
    mss: MediaSourceStream,
    hint: Hint,
    target_sample_rate: u32,
    end: Option<f64>,
    cancellation: &CancellationToken,
) -> Result<Vec<f64>, Error> {
    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| Error::source_unavailable_with("unsupported format", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::source_unavailable("no supported audio tracks"))?;

    let dec_opts: DecoderOptions = Default::default();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| Error::source_unavailable_with("unsupported codec", e))?;

    let track_id = track.id;

    let mut processor = AudioProcessor::new(target_sample_rate);
    let mut stream_spec: Option<SignalSpec> = None;
    let mut sample_buf: Option<(SampleBuffer<i16>, u64)> = None;
    let mut max_frames = None;
    let mut decoded_frames = 0u64;

    loop {
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                debug!("stream parameters changed, stopping");
                break;
            }
            Err(e) => return Err(Error::source_unavailable_with("cannot read the next packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(SymphoniaError::DecodeError(reason)) => {
                warn!(reason, "skipping a corrupt packet");
                continue;
            }
            Err(e) => return Err(Error::source_unavailable_with("decoding failed", e)),
        };

        let spec = *audio_buf.spec();
        match stream_spec {
            None => {
                processor.reset(spec.rate, spec.channels.count() as u32)?;
                max_frames = end.map(|end| (end * f64::from(spec.rate)).ceil() as u64);
                stream_spec = Some(spec);
            }
            Some(first) if first != spec => {
                debug!("stream parameters changed, stopping");
                break;
            }
            Some(_) => {}
        }
        let channels = spec.channels.count();

        let capacity = audio_buf.capacity() as u64;
        if sample_buf.as_ref().map_or(true, |(_, frames)| *frames < capacity) {
            sample_buf = Some((SampleBuffer::<i16>::new(capacity, spec), capacity));
        }
        let Some((buf, _)) = sample_buf.as_mut() else {
            continue;
        };

        buf.copy_interleaved_ref(audio_buf);
        let mut samples = buf.samples();
        if let Some(max_frames) = max_frames {
            let remaining = max_frames.saturating_sub(decoded_frames) as usize;
            samples = &samples[..samples.len().min(remaining * channels)];
        }

        processor.consume(samples)?;
        decoded_frames += (samples.len() / channels) as u64;

        if max_frames.is_some_and(|max_frames| decoded_frames >= max_frames) {
            break;
        }
    }

    if stream_spec.is_none() {
        return Err(Error::InsufficientAudio);
    }

    processor.flush()?;
    Ok(processor.take_output())
}

fn convert_pcm(
    pcm: &PcmBuffer,
    target_sample_rate: u32,
    end: Option<f64>,
    cancellation: &CancellationToken,
) -> Result<Vec<f64>, Error> {
    let mut processor = AudioProcessor::new(target_sample_rate);
    processor.reset(pcm.sample_rate, pcm.channels)?;

    let channels = pcm.channels as usize;
    let mut frames = pcm.samples.len() / channels;
    if let Some(end) = end {
        frames = frames.min((end * f64::from(pcm.sample_rate)).ceil() as usize);
    }

    for chunk in pcm.samples[..frames * channels].chunks(PCM_CHUNK_FRAMES * channels) {
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        processor.consume(chunk)?;
    }

    processor.flush()?;
    Ok(processor.take_output())
}
