use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MIN_KMER_SIZE: usize = 8;
pub const MAX_KMER_SIZE: usize = 14;
pub const MAX_MISMATCHES: usize = 5;

pub const DEFAULT_KMER_SIZE: usize = 11;
pub const DEFAULT_MAX_MISMATCHES: usize = 3;
pub const DEFAULT_WINDOW_SIZE: usize = 40;
pub const DEFAULT_STEP_SIZE: usize = 10;
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 0.01;
pub const DEFAULT_CHUNK_WINDOWS: usize = 256;

pub const DEFAULT_HOTSPOT_MIN_WIDTH: usize = 50;
pub const DEFAULT_HOTSPOT_MULTIPLIER: f64 = 3.0;
pub const DEFAULT_VULNERABLE_MIN_WIDTH: usize = 200;

/// Options that shape candidate generation and verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub kmer_size: usize,
    pub max_mismatches: usize,
    pub window_size: usize,
    pub step_size: usize,
    /// Heuristic cutoff on the background E-value approximation, not a calibrated p-value.
    pub significance_threshold: f64,
    /// Windows per parallel work unit; cancellation is polled at this granularity.
    pub chunk_windows: usize,
    /// Stop scheduling chunks once this many matches were accepted.
    pub max_matches: Option<usize>,
    pub scan_reverse_complement: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            kmer_size: DEFAULT_KMER_SIZE,
            max_mismatches: DEFAULT_MAX_MISMATCHES,
            window_size: DEFAULT_WINDOW_SIZE,
            step_size: DEFAULT_STEP_SIZE,
            significance_threshold: DEFAULT_SIGNIFICANCE_THRESHOLD,
            chunk_windows: DEFAULT_CHUNK_WINDOWS,
            max_matches: None,
            scan_reverse_complement: false,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_kmer_size(self.kmer_size)?;
        if self.max_mismatches > MAX_MISMATCHES {
            return Err(ConfigError::MaxMismatchesOutOfRange {
                value: self.max_mismatches,
                max: MAX_MISMATCHES,
            });
        }
        if self.kmer_size < self.max_mismatches + 1 {
            return Err(ConfigError::SeedingGuaranteeBroken {
                kmer_size: self.kmer_size,
                required: self.max_mismatches + 1,
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.step_size == 0 {
            return Err(ConfigError::ZeroStep);
        }
        if self.step_size > self.window_size {
            return Err(ConfigError::StepExceedsWindow {
                step_size: self.step_size,
                window_size: self.window_size,
            });
        }
        if self.kmer_size > self.window_size {
            return Err(ConfigError::KmerExceedsWindow {
                kmer_size: self.kmer_size,
                window_size: self.window_size,
            });
        }
        if !(self.significance_threshold.is_finite() && self.significance_threshold > 0.0) {
            return Err(ConfigError::InvalidSignificanceThreshold(
                self.significance_threshold,
            ));
        }
        if self.chunk_windows == 0 {
            return Err(ConfigError::ZeroChunkWindows);
        }
        Ok(())
    }

    /// Minimum number of shared k-mers a true window-length match must still
    /// have. Same as `min_hit_threshold_for(window_size)`.
    pub fn min_hit_threshold(&self) -> usize {
        self.min_hit_threshold_for(self.window_size)
    }

    /// Minimum number of shared k-mers for a fragment of `fragment_len` bases.
    ///
    /// A stretch of L bases holds L-k+1 k-mers and each mismatch can spoil at
    /// most k of them, so at least `(L-k+1) - m*k` survive. Seeding sees at
    /// most `window_size` bases of a hit, hence `L = min(fragment_len, W)`.
    /// Clamped to 1.
    pub fn min_hit_threshold_for(&self, fragment_len: usize) -> usize {
        let seeded = fragment_len.min(self.window_size);
        (seeded + 1)
            .saturating_sub(self.kmer_size)
            .saturating_sub(self.max_mismatches * self.kmer_size)
            .max(1)
    }

    /// True when `m` substitutions can never spoil every k-mer of a window,
    /// i.e. some unmutated stretch of at least `k` bases always survives.
    /// Below this the clamped threshold of 1 cannot rescue a match.
    pub fn lossless_seeding(&self) -> bool {
        let m = self.max_mismatches;
        self.window_size.saturating_sub(m) / (m + 1) >= self.kmer_size
    }
}

pub(crate) fn validate_kmer_size(kmer_size: usize) -> Result<(), ConfigError> {
    if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&kmer_size) {
        return Err(ConfigError::KmerSizeOutOfRange {
            value: kmer_size,
            min: MIN_KMER_SIZE,
            max: MAX_KMER_SIZE,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandscapeConfig {
    pub hotspot_min_width: usize,
    /// Hotspot cutoff as a multiple of the profile's global mean density.
    pub hotspot_threshold_multiplier: f64,
    pub vulnerable_min_width: usize,
    /// Densities at or below this value count as untouched.
    pub vulnerable_near_zero: f64,
    pub weight_by_significance: bool,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            hotspot_min_width: DEFAULT_HOTSPOT_MIN_WIDTH,
            hotspot_threshold_multiplier: DEFAULT_HOTSPOT_MULTIPLIER,
            vulnerable_min_width: DEFAULT_VULNERABLE_MIN_WIDTH,
            vulnerable_near_zero: 0.0,
            weight_by_significance: false,
        }
    }
}

impl LandscapeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hotspot_min_width == 0 {
            return Err(ConfigError::ZeroHotspotWidth);
        }
        if !(self.hotspot_threshold_multiplier.is_finite()
            && self.hotspot_threshold_multiplier > 0.0)
        {
            return Err(ConfigError::InvalidHotspotMultiplier(
                self.hotspot_threshold_multiplier,
            ));
        }
        if self.vulnerable_min_width == 0 {
            return Err(ConfigError::ZeroVulnerableWidth);
        }
        if !(self.vulnerable_near_zero.is_finite() && self.vulnerable_near_zero >= 0.0) {
            return Err(ConfigError::InvalidNearZero(self.vulnerable_near_zero));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub scan: ScanConfig,
    pub landscape: LandscapeConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scan.validate()?;
        self.landscape.validate()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
