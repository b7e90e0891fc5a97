use std::ops::Range;

use ahash::AHashMap;

use crate::config::ScanConfig;
use crate::spacer::data::{Candidate, FragmentId, Match, Strand};
use crate::spacer::index::{FragmentIndex, KmerCodes};
use crate::spacer::matcher::BoundedMatcher;
use crate::spacer::motif::MotifValidator;

// Invariants for the window layer:
// 1. Coordinates handed in and out are relative to the sequence being scanned
//    (the forward target or its reverse complement). Mapping back to forward
//    coordinates is the chunk scheduler's job.
// 2. Every emitted match has `mismatch_count <= max_mismatches`, a motif score
//    above zero and a significance below the configured threshold.
// 3. Candidates and matches within one window come out in ascending fragment
//    id order so repeated scans are bit-identical.

/// Background E-value approximation: `db * L * (1/4)^(L - m)`.
///
/// Ignores target composition; treat the threshold it is compared against as
/// a tunable heuristic rather than a calibrated significance level.
pub fn background_evalue(database_size: usize, window_size: usize, max_mismatches: usize) -> f64 {
    let informative = window_size.saturating_sub(max_mismatches) as i32;
    database_size as f64 * window_size as f64 * 0.25f64.powi(informative)
}

/// Number of windows for a sequence of `len` bases.
pub fn window_count(len: usize, window_size: usize, step_size: usize) -> usize {
    if len < window_size || step_size == 0 {
        0
    } else {
        (len - window_size) / step_size + 1
    }
}

pub(crate) struct WindowSearch<'a> {
    index: &'a FragmentIndex,
    sequence: &'a [u8],
    strand: Strand,
    config: &'a ScanConfig,
    windows: usize,
    significance: f64,
    accept: bool,
    matcher: BoundedMatcher,
    motifs: MotifValidator,
    hit_counts: AHashMap<FragmentId, usize>,
    candidates: Vec<Candidate>,
}

impl<'a> WindowSearch<'a> {
    pub(crate) fn new(
        index: &'a FragmentIndex,
        sequence: &'a [u8],
        strand: Strand,
        config: &'a ScanConfig,
    ) -> Self {
        let significance =
            background_evalue(index.len(), config.window_size, config.max_mismatches);
        Self {
            index,
            sequence,
            strand,
            config,
            windows: window_count(sequence.len(), config.window_size, config.step_size),
            significance,
            accept: significance < config.significance_threshold,
            matcher: BoundedMatcher,
            motifs: MotifValidator,
            hit_counts: AHashMap::new(),
            candidates: Vec::new(),
        }
    }

    /// Scans windows `range` (window ordinals, not bases) and appends accepted
    /// matches to `out`.
    pub(crate) fn scan_windows(&mut self, range: Range<usize>, out: &mut Vec<Match>) {
        for ordinal in range {
            let owned = self.owned_positions(ordinal);
            let span = self.seed_span(ordinal);
            self.collect_candidates(span);
            self.verify_candidates(owned, out);
        }
    }

    /// Match start positions verified by window `ordinal`. Window `i` owns
    /// `[i * step, (i + 1) * step)` and the last window also owns the tail, so
    /// the windows partition the sequence and each hit is reported once.
    pub(crate) fn owned_positions(&self, ordinal: usize) -> Range<usize> {
        let start = ordinal * self.config.step_size;
        if ordinal + 1 >= self.windows {
            start..self.sequence.len()
        } else {
            start..start + self.config.step_size
        }
    }

    /// Bases whose k-mers seed window `ordinal`: the owned positions plus one
    /// window length after the last of them. A hit starting at an owned
    /// position then has `min(len, window_size)` of its bases inside the span.
    pub(crate) fn seed_span(&self, ordinal: usize) -> Range<usize> {
        let owned = self.owned_positions(ordinal);
        owned.start..(owned.end - 1 + self.config.window_size).min(self.sequence.len())
    }

    /// Phase 1: count shared k-mers per fragment over `span` and keep those
    /// that reach their pigeonhole threshold.
    pub(crate) fn collect_candidates(&mut self, span: Range<usize>) -> &[Candidate] {
        self.hit_counts.clear();
        self.candidates.clear();
        let start = span.start;
        let window = &self.sequence[span];
        for (_, code) in KmerCodes::new(window, self.index.kmer_size()) {
            for &id in self.index.query_code(code) {
                *self.hit_counts.entry(id).or_insert(0) += 1;
            }
        }
        let index = self.index;
        let config = self.config;
        self.candidates.extend(
            self.hit_counts
                .iter()
                .filter(|&(&id, &count)| {
                    index
                        .fragment(id)
                        .is_some_and(|f| count >= config.min_hit_threshold_for(f.len()))
                })
                .map(|(&fragment_id, &kmer_hit_count)| Candidate {
                    fragment_id,
                    position: start,
                    kmer_hit_count,
                }),
        );
        self.candidates.sort_unstable_by_key(|c| c.fragment_id);
        &self.candidates
    }

    /// Phase 2: bounded verification at every owned position, motif scoring
    /// and the significance gate.
    fn verify_candidates(&mut self, owned: Range<usize>, out: &mut Vec<Match>) {
        if !self.accept {
            return;
        }
        let max_mismatches = self.config.max_mismatches;
        for candidate in &self.candidates {
            let Some(fragment) = self.index.fragment(candidate.fragment_id) else {
                continue;
            };
            for position in owned.clone() {
                let end = position + fragment.len();
                if end > self.sequence.len() {
                    break;
                }
                let slice = &self.sequence[position..end];
                let Some(mismatch_count) =
                    self.matcher
                        .match_bounded(fragment.sequence(), slice, max_mismatches)
                else {
                    continue;
                };
                let motif = self.motifs.validate(
                    self.sequence,
                    position,
                    fragment.len(),
                    fragment.system_type(),
                );
                if motif.score <= 0.0 {
                    continue;
                }
                out.push(Match {
                    fragment_id: fragment.id(),
                    position,
                    length: slice.len(),
                    strand: self.strand,
                    mismatch_count,
                    motif_score: motif.score,
                    significance: self.significance,
                    source_label: fragment.source_label.clone(),
                });
            }
        }
    }
}
