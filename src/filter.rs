//! Read path for persisted scalable bloom filters.
//!
//! The pipeline never builds or persists filters — it deserializes
//! artifacts written by the indexing side and probes them. A scalable
//! filter is a sequence of fixed-size bloom slices appended as the writer
//! grew; membership holds iff any single slice reports every probe bit
//! set. One-sided error: false positives are possible, false negatives
//! are not (for items the writer actually inserted).
//!
//! Wire layout (little-endian): `SBF1` magic, `u32` slice count, then per
//! slice `u64` bit count, `u32` probe count, and `ceil(m/8)` bit bytes.
//!
//! [`ScalableBloomFilter::insert`] and [`ScalableBloomFilter::encode`]
//! exist so tests and benches can produce artifacts; production code only
//! decodes and probes.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::{Error, Result};

const MAGIC: &[u8; 4] = b"SBF1";

/// Seeds for the two base hashes of the double-hashing probe schedule.
const SEED_LO: u64 = 0x51ed_2701;
const SEED_HI: u64 = 0xb492_b66f_be98_f273;

fn hash_with_seed(key: &[u8], seed: u64) -> u64 {
    let mut hasher = FxHasher::default();
    seed.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// One fixed-size bloom slice within a scalable filter.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BloomSlice {
    /// Number of addressable bits.
    m: u64,
    /// Probes per key.
    k: u32,
    bits: Vec<u8>,
}

impl BloomSlice {
    fn new(m: u64, k: u32) -> Self {
        let bytes = usize::try_from(m.div_ceil(8)).expect("slice bit count fits in memory");
        Self {
            m,
            k,
            bits: vec![0; bytes],
        }
    }

    /// Probe positions via double hashing: `h1 + i * h2 (mod m)`.
    fn positions(&self, key: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let h1 = hash_with_seed(key, SEED_LO);
        // Forcing h2 odd keeps the schedule a full cycle for power-of-two m.
        let h2 = hash_with_seed(key, SEED_HI) | 1;
        let m = self.m;
        (0..u64::from(self.k)).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % m)
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.positions(key)
            .all(|bit| self.bits[(bit / 8) as usize] & (1 << (bit % 8)) != 0)
    }

    fn set(&mut self, key: &[u8]) {
        let positions: Vec<u64> = self.positions(key).collect();
        for bit in positions {
            self.bits[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }
}

/// In-memory view of a persisted scalable bloom filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalableBloomFilter {
    slices: Vec<BloomSlice>,
}

impl ScalableBloomFilter {
    /// Deserialize a persisted artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterDecode`] on truncation, a bad magic, or a
    /// degenerate slice header (zero bits or zero probes).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.take(4)?;
        if magic != MAGIC {
            return Err(Error::FilterDecode(format!(
                "bad magic {magic:?}, expected {MAGIC:?}"
            )));
        }
        let slice_count = cursor.read_u32()?;
        // The header is untrusted; never reserve more than the remaining
        // bytes could encode (a slice is at least 13 bytes: m, k, one bit
        // byte). Truncation past that fails below, per slice.
        let plausible = cursor.remaining() / 13;
        let mut slices = Vec::with_capacity((slice_count as usize).min(plausible));
        for _ in 0..slice_count {
            let m = cursor.read_u64()?;
            let k = cursor.read_u32()?;
            if m == 0 || k == 0 {
                return Err(Error::FilterDecode(format!(
                    "degenerate slice header: m={m} k={k}"
                )));
            }
            let byte_len = usize::try_from(m.div_ceil(8))
                .map_err(|_| Error::FilterDecode(format!("slice too large: m={m}")))?;
            let bits = cursor.take(byte_len)?.to_vec();
            slices.push(BloomSlice { m, k, bits });
        }
        Ok(Self { slices })
    }

    /// Serialize to the persisted layout. Fixture/bench support.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&u32::try_from(self.slices.len()).unwrap_or(u32::MAX).to_le_bytes());
        for slice in &self.slices {
            out.extend_from_slice(&slice.m.to_le_bytes());
            out.extend_from_slice(&slice.k.to_le_bytes());
            out.extend_from_slice(&slice.bits);
        }
        out
    }

    /// Single-slice filter for fixtures.
    ///
    /// # Panics
    ///
    /// Panics if `m` or `k` is zero.
    #[must_use]
    pub fn with_slice(m: u64, k: u32) -> Self {
        assert!(m > 0 && k > 0, "filter dimensions must be positive");
        Self {
            slices: vec![BloomSlice::new(m, k)],
        }
    }

    /// Insert a key into the newest slice. Fixture/bench support.
    pub fn insert(&mut self, key: &[u8]) {
        if let Some(slice) = self.slices.last_mut() {
            slice.set(key);
        }
    }

    /// Probe for membership: positive iff some slice has all probe bits set.
    #[must_use]
    pub fn test(&self, key: &[u8]) -> bool {
        self.slices.iter().any(|slice| slice.contains(key))
    }

    /// Number of slices the writer accumulated.
    #[must_use]
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }
}

/// Persisted filter encoding named by an experiment.
///
/// A closed set of tagged variants so experiments with different artifact
/// layouts can coexist in one registry without runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCodec {
    /// Scalable bloom filter in the `SBF1` layout.
    Scalable,
}

impl FilterCodec {
    /// Decode artifact bytes into a probeable filter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FilterDecode`] when the bytes do not match the
    /// codec's layout.
    pub fn decode(&self, bytes: &[u8]) -> Result<ScalableBloomFilter> {
        match self {
            Self::Scalable => ScalableBloomFilter::decode(bytes),
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or_else(|| {
            Error::FilterDecode("length overflow in filter header".to_string())
        })?;
        if end > self.bytes.len() {
            return Err(Error::FilterDecode(format!(
                "truncated filter: wanted {len} bytes at offset {}, have {}",
                self.offset,
                self.bytes.len() - self.offset
            )));
        }
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes(raw.try_into().expect("4 bytes")))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let raw = self.take(8)?;
        Ok(u64::from_le_bytes(raw.try_into().expect("8 bytes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut filter = ScalableBloomFilter::with_slice(1 << 14, 4);
        let keys: Vec<Vec<u8>> = (0..200).map(|i| format!("key-{i}").into_bytes()).collect();
        for key in &keys {
            filter.insert(key);
        }
        for key in &keys {
            assert!(filter.test(key), "inserted key reported absent");
        }
    }

    #[test]
    fn test_absent_keys_mostly_negative() {
        let mut filter = ScalableBloomFilter::with_slice(1 << 16, 5);
        for i in 0..100 {
            filter.insert(format!("present-{i}").as_bytes());
        }
        let false_positives = (0..1000)
            .filter(|i| filter.test(format!("absent-{i}").as_bytes()))
            .count();
        // Sized for a sub-1% rate; 50/1000 is far beyond chance.
        assert!(false_positives < 50, "{false_positives} false positives");
    }

    #[test]
    fn test_roundtrip_preserves_membership() {
        let mut filter = ScalableBloomFilter::with_slice(1 << 12, 4);
        filter.insert(b"alpha");
        filter.insert(b"beta");

        let decoded = ScalableBloomFilter::decode(&filter.encode()).unwrap();
        assert_eq!(decoded, filter);
        assert!(decoded.test(b"alpha"));
        assert!(decoded.test(b"beta"));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = ScalableBloomFilter::with_slice(64, 2).encode();
        bytes[0] = b'X';
        assert!(matches!(
            ScalableBloomFilter::decode(&bytes),
            Err(Error::FilterDecode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = ScalableBloomFilter::with_slice(256, 3).encode();
        for cut in [0, 3, 8, bytes.len() - 1] {
            assert!(
                ScalableBloomFilter::decode(&bytes[..cut]).is_err(),
                "accepted truncation at {cut}"
            );
        }
    }

    #[test]
    fn test_decode_contains_absurd_slice_count() {
        // A corrupt header alone must fail cleanly, not reserve memory
        // sized by the untrusted count.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            ScalableBloomFilter::decode(&bytes),
            Err(Error::FilterDecode(_))
        ));

        // Same with a little trailing garbage after the count.
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(ScalableBloomFilter::decode(&bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_degenerate_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes()); // m = 0
        bytes.extend_from_slice(&3u32.to_le_bytes());
        assert!(ScalableBloomFilter::decode(&bytes).is_err());
    }

    #[test]
    fn test_multi_slice_membership() {
        let mut older = ScalableBloomFilter::with_slice(1 << 10, 3);
        older.insert(b"old-key");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&2u32.to_le_bytes());
        // Same slice twice is enough to exercise the any-slice rule.
        let slice_bytes = &older.encode()[8..];
        bytes.extend_from_slice(slice_bytes);
        bytes.extend_from_slice(slice_bytes);

        let filter = ScalableBloomFilter::decode(&bytes).unwrap();
        assert_eq!(filter.slice_count(), 2);
        assert!(filter.test(b"old-key"));
    }

    #[test]
    fn test_codec_dispatch() {
        let mut filter = ScalableBloomFilter::with_slice(128, 2);
        filter.insert(b"x");
        let decoded = FilterCodec::Scalable.decode(&filter.encode()).unwrap();
        assert!(decoded.test(b"x"));
    }
}
