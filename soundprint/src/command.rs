use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Configuration;
use crate::decode::{self, AudioSource};
use crate::error::Error;
use crate::fingerprinter::Fingerprinter;
use crate::framer::TimeRange;
use crate::signature::Signature;

/// A pending fingerprint calculation of a single audio source.
///
/// Decoding and the spectral analysis run on the blocking thread pool of the
/// current tokio runtime; awaiting the command never blocks the executor.
/// Dropping the future returned by [FingerprintCommand::run] stops the work
/// in the background at the next packet or window boundary.
#[derive(Debug)]
pub struct FingerprintCommand {
    source: AudioSource,
    config: Configuration,
    range: TimeRange,
}

impl FingerprintCommand {
    pub fn new(source: AudioSource, config: Configuration) -> Self {
        Self { source, config, range: TimeRange::full() }
    }

    /// Restricts the calculation to `range` of the source.
    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    pub async fn run(self) -> Result<Vec<Signature>, Error> {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// Runs the command until it finishes or `cancellation` fires, whichever comes first.
    pub async fn run_with_cancellation(self, cancellation: CancellationToken) -> Result<Vec<Signature>, Error> {
        self.run_with_token(cancellation.child_token()).await
    }

    /// Cancels `token` when the returned future is dropped before the work is done.
    async fn run_with_token(self, token: CancellationToken) -> Result<Vec<Signature>, Error> {
        let Self { source, config, range } = self;
        range.validate()?;
        let fingerprinter = Fingerprinter::new(&config)?;

        let guard = token.clone().drop_guard();
        let description = source.describe();

        let task = tokio::task::spawn_blocking(move || {
            let samples = decode::load(source, config.sample_rate(), range.end(), &token)?;
            fingerprinter.fingerprint_with_cancellation(&samples, range, &token)
        });

        let result = task.await;
        guard.disarm();

        match result {
            Ok(Ok(signatures)) => {
                debug!(source = %description, signatures = signatures.len(), "fingerprint ready");
                Ok(signatures)
            }
            Ok(Err(e)) => Err(e),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}
