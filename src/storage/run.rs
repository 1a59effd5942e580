use anyhow::{anyhow, Result};
use bloom::{BloomFilter, ASMS};

use crate::storage::policy::num_hashes;

/// A Bloom filter built for a run, along with the bits-per-key it was
/// sized for.
pub struct RunFilter {
    /// The bits-per-key the filter was built with.
    pub bits_per_key: u64,

    /// The filter itself. `None` when the run was given no bits, in which
    /// case every lookup has to search the run.
    pub bloom: Option<BloomFilter>,
}

/// An immutable sorted run of keys.
pub struct Run {
    /// The run's keys, sorted and deduplicated.
    keys: Vec<Vec<u8>>,

    /// The run's filter, if one has been built.
    filter: Option<RunFilter>,
}

impl Run {
    /// Creates a new run from a set of keys.
    ///
    /// The keys are sorted and duplicates are removed. No filter is built.
    pub fn new(mut keys: Vec<Vec<u8>>) -> Self {
        keys.sort();
        keys.dedup();
        Run { keys, filter: None }
    }

    /// The number of entries in the run.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The total size of the run's keys, in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.keys.iter().map(|k| k.len() as u64).sum()
    }

    /// The bits-per-key of the current filter, if the run has one.
    pub fn filter_bits_per_key(&self) -> Option<u64> {
        self.filter.as_ref().map(|f| f.bits_per_key)
    }

    /// The number of bits the current filter actually occupies.
    pub fn filter_bits(&self) -> usize {
        self.filter
            .as_ref()
            .and_then(|f| f.bloom.as_ref())
            .map_or(0, |b| b.num_bits())
    }

    /// Returns true if the run has no filter or one sized differently
    /// from `bits_per_key`.
    pub fn needs_filter(&self, bits_per_key: u64) -> bool {
        self.filter_bits_per_key() != Some(bits_per_key)
    }

    /// (Re)builds the run's filter with `bits_per_key` bits per key.
    pub fn build_filter(&mut self, bits_per_key: u64) -> Result<()> {
        let num_bits = (self.keys.len() as u64)
            .checked_mul(bits_per_key)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or(anyhow!("Filter of {} bits per key is too large", bits_per_key))?;

        let bloom = if num_bits == 0 {
            None
        } else {
            let mut bf = BloomFilter::with_size(num_bits, num_hashes(bits_per_key));
            for key in self.keys.iter() {
                bf.insert(&key.as_slice());
            }
            Some(bf)
        };
        self.filter = Some(RunFilter {
            bits_per_key,
            bloom,
        });
        Ok(())
    }

    /// Returns false only if the filter rules the key out.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        match self.filter.as_ref().and_then(|f| f.bloom.as_ref()) {
            Some(bf) => bf.contains(&key),
            None => true,
        }
    }

    /// Searches the run for `key`.
    ///
    /// This uses a binary search, which relies on the keys being sorted.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys
            .binary_search_by(|k| k.as_slice().cmp(key))
            .is_ok()
    }
}
