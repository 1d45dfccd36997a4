#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::Rng;
use rusty_soundprint::Signature;

mod music;

pub use music::synthetic_music;

pub fn random_signatures(rng: &mut StdRng, count: usize, bits: usize) -> Vec<Signature> {
    (0..count)
        .map(|i| Signature::from_bits((0..bits).map(|_| rng.gen::<bool>()), i))
        .collect()
}

/// Copies `signatures`, numbering them from zero.
pub fn reindex(signatures: &[Signature]) -> Vec<Signature> {
    signatures
        .iter()
        .enumerate()
        .map(|(i, s)| Signature::from_words(s.words().to_vec(), s.len(), i))
        .collect()
}

/// Flips `count` distinct random bits.
pub fn flip_bits(rng: &mut StdRng, signature: &Signature, count: usize) -> Signature {
    let mut words = signature.words().to_vec();
    for bit in sample(rng, signature.len(), count) {
        words[bit / 64] ^= 1 << (bit % 64);
    }
    Signature::from_words(words, signature.len(), signature.index())
}

/// Mono 16-bit PCM WAV file contents.
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
