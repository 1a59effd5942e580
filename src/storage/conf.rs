
/// The maximum number of levels in the LSM Tree.
///
/// Note: This matches the fixed level count of the engines this store
/// stands in for. Statistics always report this many levels, with the
/// unused ones empty.
pub const MAX_LEVELS: usize = 7;

/// The bits-per-key used before any filter policy has been installed.
///
/// This is also the flat per-level value of the uniform (non-Monkey)
/// baseline policy.
pub const DEFAULT_BITS_PER_KEY: u64 = 10;

/// The upper bound on hash functions per Bloom filter.
///
/// Past this point extra probes cost more than the false positives they
/// would save.
pub const MAX_FILTER_HASHES: u32 = 30;
