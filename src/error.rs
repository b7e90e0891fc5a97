use thiserror::Error;

/// A configuration bound that was violated. Raised eagerly, before any scan work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("k-mer size {value} is outside the supported range {min}..={max}")]
    KmerSizeOutOfRange { value: usize, min: usize, max: usize },

    #[error("max mismatches {value} is outside the supported range 0..={max}")]
    MaxMismatchesOutOfRange { value: usize, max: usize },

    #[error("k-mer size {kmer_size} must be at least max mismatches + 1 ({required})")]
    SeedingGuaranteeBroken { kmer_size: usize, required: usize },

    #[error("window size must be > 0")]
    ZeroWindow,

    #[error("step size must be > 0")]
    ZeroStep,

    #[error("step size {step_size} exceeds window size {window_size}; windows would leave gaps")]
    StepExceedsWindow { step_size: usize, window_size: usize },

    #[error("k-mer size {kmer_size} exceeds window size {window_size}")]
    KmerExceedsWindow { kmer_size: usize, window_size: usize },

    #[error("significance threshold must be finite and > 0 (got {0})")]
    InvalidSignificanceThreshold(f64),

    #[error("chunk size must be at least one window")]
    ZeroChunkWindows,

    #[error("hotspot minimum width must be > 0")]
    ZeroHotspotWidth,

    #[error("hotspot threshold multiplier must be finite and > 0 (got {0})")]
    InvalidHotspotMultiplier(f64),

    #[error("vulnerable-region minimum width must be > 0")]
    ZeroVulnerableWidth,

    #[error("near-zero density cutoff must be finite and >= 0 (got {0})")]
    InvalidNearZero(f64),

    #[error("scan k-mer size {config} does not match the index k-mer size {index}")]
    IndexKmerMismatch { index: usize, config: usize },

    #[error("fragment collection is empty")]
    EmptyFragmentCollection,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("target sequence is empty")]
    EmptyTarget,

    #[error("no fragment could be indexed ({skipped} skipped)")]
    NoIndexableFragments { skipped: usize },

    #[error("index allocation failed: {0}")]
    IndexAllocation(#[from] std::collections::TryReserveError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
