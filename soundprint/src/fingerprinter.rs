use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Configuration;
use crate::encoder::SignatureEncoder;
use crate::error::Error;
use crate::framer::{Framer, TimeRange};
use crate::signature::Signature;
use crate::spectrum::SpectralTransformer;

/// Calculates signatures of mono audio that is already at the configured sample rate.
pub struct Fingerprinter {
    config: Configuration,
    transformer: SpectralTransformer,
    encoder: SignatureEncoder,
}

impl Fingerprinter {
    /// Creates a new [Fingerprinter] with the given [Configuration].
    pub fn new(config: &Configuration) -> Result<Self, Error> {
        Ok(Self {
            config: config.clone(),
            transformer: SpectralTransformer::new(config)?,
            encoder: SignatureEncoder::new(config)?,
        })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Fingerprints `range` of `samples`.
    pub fn fingerprint(&self, samples: &[f64], range: TimeRange) -> Result<Vec<Signature>, Error> {
        self.fingerprint_with_cancellation(samples, range, &CancellationToken::new())
    }

    /// Same as [Fingerprinter::fingerprint], but gives up with [Error::Cancelled]
    /// as soon as `cancellation` fires.
    pub fn fingerprint_with_cancellation(
        &self,
        samples: &[f64],
        range: TimeRange,
        cancellation: &CancellationToken,
    ) -> Result<Vec<Signature>, Error> {
        let framer = Framer::new(samples, &self.config, range)?;

        let frames = (0..framer.len())
            .into_par_iter()
            .filter_map(|index| framer.window(index))
            .map(|window| {
                if cancellation.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                Ok(self.transformer.transform(&window))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let signatures = self.encoder.encode(&frames, framer.start_seconds());
        debug!(
            windows = frames.len(),
            signatures = signatures.len(),
            start = framer.start_seconds(),
            "fingerprinted audio"
        );
        Ok(signatures)
    }
}
