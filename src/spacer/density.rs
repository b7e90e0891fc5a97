use serde::{Deserialize, Serialize};

use crate::spacer::data::Match;

/// Ceiling on a single match's weight. E-values underflow to zero for long
/// windows; summing uncapped reciprocals would overflow to infinity.
pub const MAX_MATCH_WEIGHT: f64 = 1e100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DensityWeighting {
    #[default]
    Unweighted,
    /// Each match contributes `1 / significance`, capped at `MAX_MATCH_WEIGHT`.
    InverseSignificance,
}

impl DensityWeighting {
    pub fn from_flag(weight_by_significance: bool) -> Self {
        if weight_by_significance {
            DensityWeighting::InverseSignificance
        } else {
            DensityWeighting::Unweighted
        }
    }

    pub fn weight(self, hit: &Match) -> f64 {
        match self {
            DensityWeighting::Unweighted => 1.0,
            DensityWeighting::InverseSignificance if hit.significance > 0.0 => {
                (1.0 / hit.significance).min(MAX_MATCH_WEIGHT)
            }
            DensityWeighting::InverseSignificance => MAX_MATCH_WEIGHT,
        }
    }
}

/// Per-base coverage of accepted matches, possibly over a sub-span of the
/// target (`offset..offset + len`) when used as a chunk-local accumulator.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityProfile {
    offset: usize,
    values: Vec<f64>,
}

impl DensityProfile {
    pub fn new(len: usize) -> Self {
        Self::local(0, len)
    }

    pub fn local(offset: usize, len: usize) -> Self {
        Self {
            offset,
            values: vec![0.0; len],
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, position: usize) -> f64 {
        position
            .checked_sub(self.offset)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Adds `weight` over `[start, end)` in target coordinates, clipped to the
    /// span this profile covers.
    pub fn add_interval(&mut self, start: usize, end: usize, weight: f64) {
        let lo = start.max(self.offset) - self.offset;
        let hi = end.min(self.offset + self.values.len()).saturating_sub(self.offset);
        if lo >= hi {
            return;
        }
        for value in &mut self.values[lo..hi] {
            *value += weight;
        }
    }

    pub fn record(&mut self, hit: &Match, window_size: usize, weighting: DensityWeighting) {
        self.add_interval(hit.position, hit.position + window_size, weighting.weight(hit));
    }

    /// Elementwise addition of a (usually chunk-local) accumulator.
    pub fn merge(&mut self, other: &DensityProfile) {
        let shift = other.offset.saturating_sub(self.offset);
        for (i, &value) in other.values.iter().enumerate() {
            if value == 0.0 {
                continue;
            }
            if let Some(slot) = self.values.get_mut(shift + i) {
                *slot += value;
            }
        }
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn covered_bases(&self) -> usize {
        self.values.iter().filter(|&&v| v > 0.0).count()
    }

    /// Prefix sums with a leading zero, for O(1) range means.
    pub(crate) fn prefix_sums(&self) -> Vec<f64> {
        let mut sums = Vec::with_capacity(self.values.len() + 1);
        let mut running = 0.0;
        sums.push(running);
        for &value in &self.values {
            running += value;
            sums.push(running);
        }
        sums
    }
}
