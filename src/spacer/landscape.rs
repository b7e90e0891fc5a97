use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use tracing::debug;

use crate::config::LandscapeConfig;
use crate::error::ConfigError;
use crate::spacer::chunks::{ScanOutcome, StopReason};
use crate::spacer::data::Match;
use crate::spacer::density::{DensityProfile, DensityWeighting};

/// A local density maximum, `[start, end)` in target coordinates.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hotspot {
    pub start: usize,
    pub end: usize,
    /// Peak density inside the interval.
    pub score: f64,
    /// Peak height above the density just outside the interval.
    pub prominence: f64,
    /// Centre of the highest plateau.
    pub peak_position: usize,
    pub mean_density: f64,
    pub gc_content: Option<f64>,
    pub annotations: Vec<String>,
}

/// An extended run of (near-)zero density, `[start, end)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VulnerableRegion {
    pub start: usize,
    pub end: usize,
    /// Mean density over the run; 0.0 for untouched stretches.
    pub score: f64,
    pub gc_content: Option<f64>,
    pub annotations: Vec<String>,
}

impl Hotspot {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl VulnerableRegion {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SourceDistribution {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

impl SourceDistribution {
    pub fn from_matches(matches: &[Match]) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for hit in matches {
            *counts.entry(hit.source_label.to_string()).or_insert(0) += 1;
        }
        Self {
            counts,
            total: matches.len(),
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn fraction(&self, label: &str) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(label) as f64 / self.total as f64
        }
    }

    pub fn fractions(&self) -> BTreeMap<String, f64> {
        self.counts
            .keys()
            .map(|label| (label.clone(), self.fraction(label)))
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LandscapeStats {
    pub total_matches: usize,
    /// Index = mismatch count.
    pub mismatch_histogram: Vec<usize>,
    pub covered_bases: usize,
    pub coverage_fraction: f64,
    pub mean_density: f64,
    pub max_density: f64,
}

impl LandscapeStats {
    fn compute(matches: &[Match], density: &DensityProfile) -> Self {
        let mut mismatch_histogram = Vec::new();
        for hit in matches {
            if mismatch_histogram.len() <= hit.mismatch_count {
                mismatch_histogram.resize(hit.mismatch_count + 1, 0);
            }
            mismatch_histogram[hit.mismatch_count] += 1;
        }
        let covered_bases = density.covered_bases();
        Self {
            total_matches: matches.len(),
            mismatch_histogram,
            covered_bases,
            coverage_fraction: if density.is_empty() {
                0.0
            } else {
                covered_bases as f64 / density.len() as f64
            },
            mean_density: density.mean(),
            max_density: density.max(),
        }
    }
}

/// Aggregated view of one analysis run.
#[derive(Clone, Debug)]
pub struct Landscape {
    pub matches: Vec<Match>,
    pub density: DensityProfile,
    pub hotspots: Vec<Hotspot>,
    pub vulnerable_regions: Vec<VulnerableRegion>,
    pub source_distribution: SourceDistribution,
    pub stats: LandscapeStats,
    pub complete: bool,
    pub stop_reason: Option<StopReason>,
}

#[derive(Clone, Debug)]
pub struct LandscapeAggregator {
    config: LandscapeConfig,
}

impl LandscapeAggregator {
    pub fn new(config: LandscapeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &LandscapeConfig {
        &self.config
    }

    pub fn weighting(&self) -> DensityWeighting {
        DensityWeighting::from_flag(self.config.weight_by_significance)
    }

    /// Builds the density profile from scratch and summarizes it.
    pub fn aggregate(
        &self,
        matches: &[Match],
        target_len: usize,
        window_size: usize,
    ) -> Landscape {
        let weighting = self.weighting();
        let mut density = DensityProfile::new(target_len);
        for hit in matches {
            density.record(hit, window_size, weighting);
        }
        self.summarize(matches.to_vec(), density, true, None)
    }

    /// Summarizes a scan whose chunk accumulators were already merged.
    pub fn from_scan(&self, outcome: ScanOutcome) -> Landscape {
        let ScanOutcome {
            matches,
            density,
            complete,
            stop_reason,
            ..
        } = outcome;
        self.summarize(matches, density, complete, stop_reason)
    }

    fn summarize(
        &self,
        matches: Vec<Match>,
        density: DensityProfile,
        complete: bool,
        stop_reason: Option<StopReason>,
    ) -> Landscape {
        let hotspots = self.find_hotspots(&density);
        let vulnerable_regions = self.find_vulnerable_regions(&density);
        let source_distribution = SourceDistribution::from_matches(&matches);
        let stats = LandscapeStats::compute(&matches, &density);
        debug!(
            hotspots = hotspots.len(),
            vulnerable = vulnerable_regions.len(),
            sources = source_distribution.counts.len(),
            "landscape summarized"
        );
        Landscape {
            matches,
            density,
            hotspots,
            vulnerable_regions,
            source_distribution,
            stats,
            complete,
            stop_reason,
        }
    }

    /// Sliding-window peak finder. A window of `hotspot_min_width` bases
    /// qualifies when its mean density reaches `multiplier * global mean`;
    /// overlapping qualifying windows fuse, and a fused span holding several
    /// above-threshold runs is cut at the valleys between them. Spans whose
    /// peak does not rise above their boundary densities are dropped.
    pub fn find_hotspots(&self, density: &DensityProfile) -> Vec<Hotspot> {
        let width = self.config.hotspot_min_width;
        let values = density.values();
        let global_mean = density.mean();
        if global_mean <= 0.0 || values.len() < width {
            return Vec::new();
        }
        let threshold = self.config.hotspot_threshold_multiplier * global_mean;
        let sums = density.prefix_sums();

        let mut spans: Vec<(usize, usize)> = Vec::new();
        for start in 0..=values.len() - width {
            let window_mean = (sums[start + width] - sums[start]) / width as f64;
            if window_mean < threshold {
                continue;
            }
            let end = start + width;
            match spans.last_mut() {
                Some(last) if start <= last.1 => last.1 = end,
                _ => spans.push((start, end)),
            }
        }

        let mut hotspots = Vec::new();
        for (start, end) in spans {
            let left = start.checked_sub(1).map_or(0.0, |i| values[i]);
            let right = values.get(end).copied().unwrap_or(0.0);
            for segment in split_at_valleys(values, start..end, threshold, width, left, right) {
                let slice = &values[segment.start..segment.end];
                let score = slice.iter().copied().fold(f64::MIN, f64::max);
                let prominence = score - segment.floor;
                if prominence <= 0.0 {
                    continue;
                }
                let first = slice.iter().position(|&v| v == score).unwrap_or(0);
                let plateau = slice[first..].iter().take_while(|&&v| v == score).count();
                hotspots.push(Hotspot {
                    start: segment.start,
                    end: segment.end,
                    score,
                    prominence,
                    peak_position: segment.start + first + plateau.saturating_sub(1) / 2,
                    mean_density: (sums[segment.end] - sums[segment.start])
                        / segment.len() as f64,
                    gc_content: None,
                    annotations: Vec::new(),
                });
            }
        }
        hotspots
    }

    /// Maximal runs with density `<= vulnerable_near_zero` that are at least
    /// `vulnerable_min_width` long.
    pub fn find_vulnerable_regions(&self, density: &DensityProfile) -> Vec<VulnerableRegion> {
        let cutoff = self.config.vulnerable_near_zero;
        let min_width = self.config.vulnerable_min_width;
        let values = density.values();
        let sums = density.prefix_sums();
        let mut regions = Vec::new();
        let mut run_start: Option<usize> = None;

        for position in 0..=values.len() {
            let quiet = values.get(position).is_some_and(|&v| v <= cutoff);
            match (quiet, run_start) {
                (true, None) => run_start = Some(position),
                (false, Some(start)) => {
                    if position - start >= min_width {
                        regions.push(VulnerableRegion {
                            start,
                            end: position,
                            score: (sums[position] - sums[start]) / (position - start) as f64,
                            gc_content: None,
                            annotations: Vec::new(),
                        });
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        regions
    }
}

struct PeakSegment {
    start: usize,
    end: usize,
    /// Higher of the two densities bounding the segment.
    floor: f64,
}

impl PeakSegment {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Cuts a fused span at the lowest base between consecutive runs that reach
/// `threshold`, as long as both sides keep `min_width` bases. Two bumps joined
/// by overlapping windows come out as two peaks.
fn split_at_valleys(
    values: &[f64],
    span: Range<usize>,
    threshold: f64,
    min_width: usize,
    left_floor: f64,
    right_floor: f64,
) -> Vec<PeakSegment> {
    let mut valleys = Vec::new();
    let mut previous_core_end: Option<usize> = None;
    let mut position = span.start;
    while position < span.end {
        if values[position] < threshold {
            position += 1;
            continue;
        }
        let core_start = position;
        while position < span.end && values[position] >= threshold {
            position += 1;
        }
        if let Some(gap_start) = previous_core_end
            && let Some(valley) =
                (gap_start..core_start).min_by(|&a, &b| values[a].total_cmp(&values[b]))
        {
            valleys.push(valley);
        }
        previous_core_end = Some(position);
    }

    let mut segments = Vec::new();
    let (mut start, mut floor) = (span.start, left_floor);
    for valley in valleys {
        if valley - start >= min_width && span.end - valley >= min_width {
            segments.push(PeakSegment {
                start,
                end: valley,
                floor: floor.max(values[valley]),
            });
            start = valley;
            floor = values[valley];
        }
    }
    segments.push(PeakSegment {
        start,
        end: span.end,
        floor: floor.max(right_floor),
    });
    segments
}
