use serde::{Deserialize, Serialize};

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-length bit vector describing a short stretch of audio.
///
/// Bit `i` is stored in word `i / 64` at position `i % 64`. Bits past the
/// length are always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    index: usize,
    timestamp: Option<f64>,
    bits: usize,
    words: Box<[u64]>,
}

impl Signature {
    pub fn from_bits(bits: impl IntoIterator<Item = bool>, index: usize) -> Self {
        let mut words = Vec::new();
        let mut len = 0;
        for bit in bits {
            if len % WORD_BITS == 0 {
                words.push(0);
            }
            if bit {
                words[len / WORD_BITS] |= 1 << (len % WORD_BITS);
            }
            len += 1;
        }
        Self { index, timestamp: None, bits: len, words: words.into_boxed_slice() }
    }

    /// Creates a signature of `bits` bits from packed words, clearing anything past the length.
    pub fn from_words(words: impl Into<Vec<u64>>, bits: usize, index: usize) -> Self {
        let mut words = words.into();
        words.resize(words_for(bits), 0);
        if bits % WORD_BITS != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1 << (bits % WORD_BITS)) - 1;
            }
        }
        Self { index, timestamp: None, bits, words: words.into_boxed_slice() }
    }

    pub fn with_timestamp(mut self, seconds: f64) -> Self {
        self.timestamp = Some(seconds);
        self
    }

    /// Position within the signature sequence of its source.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Start of the covered audio in seconds, when known.
    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// # Panics
    ///
    /// Panics if `i` is not below [len](Self::len).
    pub fn bit(&self, i: usize) -> bool {
        assert!(i < self.bits, "bit {i} out of range for {} bits", self.bits);
        (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Number of differing bits.
    ///
    /// # Panics
    ///
    /// Panics if the signatures are not equally wide.
    pub fn hamming_distance(&self, other: &Signature) -> u32 {
        assert_eq!(self.bits, other.bits, "signatures of different length");
        hamming_distance(&self.words, &other.words)
    }

    /// Value of the `band`-th group of `width` consecutive bits.
    ///
    /// # Panics
    ///
    /// Panics if the group ends past the last bit or `width` is not in `1..=64`.
    pub fn sub_band(&self, band: usize, width: usize) -> u64 {
        assert!((1..=WORD_BITS).contains(&width), "sub-band width {width} out of range");
        assert!((band + 1) * width <= self.bits, "sub-band {band} out of range");
        extract_bits(&self.words, band * width, width)
    }

    /// Little-endian bytes of the bit vector, `ceil(len / 8)` long.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.words.iter().flat_map(|w| w.to_le_bytes()).collect::<Vec<_>>();
        bytes.truncate((self.bits + 7) / 8);
        bytes
    }
}

pub(crate) fn words_for(bits: usize) -> usize {
    (bits + WORD_BITS - 1) / WORD_BITS
}

pub fn hamming_distance(a: &[u64], b: &[u64]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Reads `width` (at most 64) bits starting at bit `start`.
pub(crate) fn extract_bits(words: &[u64], start: usize, width: usize) -> u64 {
    debug_assert!(width > 0 && width <= WORD_BITS);
    let word = start / WORD_BITS;
    let shift = start % WORD_BITS;
    let mut value = words[word] >> shift;
    if shift + width > WORD_BITS {
        value |= words[word + 1] << (WORD_BITS - shift);
    }
    if width < WORD_BITS {
        value &= (1 << width) - 1;
    }
    value
}
