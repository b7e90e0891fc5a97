use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::config::ScanConfig;
use crate::error::{ConfigError, ScanError};
use crate::spacer::data::{Match, Strand, reverse_complement, sort_matches};
use crate::spacer::density::{DensityProfile, DensityWeighting};
use crate::spacer::index::FragmentIndex;
use crate::spacer::search::{WindowSearch, background_evalue, window_count};

/// Cooperative cancellation flag, shared between the caller and the workers.
/// Workers poll it once per chunk, never per window.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    MatchCeiling,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkProgress {
    pub chunk_index: usize,
    pub strand: Strand,
    pub windows: Range<usize>,
    pub matches: usize,
}

/// Everything one scan produced. `complete == false` means some chunks were
/// never started; `matches` and `density` then cover the finished ones only.
#[derive(Clone, Debug)]
pub struct ScanOutcome {
    pub matches: Vec<Match>,
    pub density: DensityProfile,
    pub target_len: usize,
    pub window_size: usize,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub complete: bool,
    pub stop_reason: Option<StopReason>,
}

#[derive(Clone, Debug)]
struct ChunkPlan {
    index: usize,
    strand: Strand,
    windows: Range<usize>,
}

struct ChunkResult {
    matches: Vec<Match>,
    density: DensityProfile,
}

/// Slides windows over a target and reports verified spacer hits.
///
/// Holds the index by shared reference only; any number of scanners may use
/// one index concurrently.
#[derive(Debug)]
pub struct GenomeScanner<'a> {
    index: &'a FragmentIndex,
    config: ScanConfig,
}

impl<'a> GenomeScanner<'a> {
    pub fn new(index: &'a FragmentIndex, config: ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.kmer_size != index.kmer_size() {
            return Err(ConfigError::IndexKmerMismatch {
                index: index.kmer_size(),
                config: config.kmer_size,
            });
        }
        Ok(Self { index, config })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn index(&self) -> &FragmentIndex {
        self.index
    }

    pub fn scan(&self, target: &[u8]) -> Result<ScanOutcome, ScanError> {
        self.scan_with(
            target,
            DensityWeighting::Unweighted,
            &CancellationToken::new(),
            |_| {},
        )
    }

    #[instrument(skip_all, fields(target_len = target.len()))]
    pub fn scan_with<F>(
        &self,
        target: &[u8],
        weighting: DensityWeighting,
        cancel: &CancellationToken,
        on_chunk: F,
    ) -> Result<ScanOutcome, ScanError>
    where
        F: Fn(ChunkProgress) + Sync,
    {
        if target.is_empty() {
            return Err(ScanError::EmptyTarget);
        }
        let config = &self.config;
        let evalue =
            background_evalue(self.index.len(), config.window_size, config.max_mismatches);
        if evalue >= config.significance_threshold {
            warn!(
                evalue,
                threshold = config.significance_threshold,
                "background E-value is above the threshold; no match can be accepted"
            );
        }
        if !config.lossless_seeding() {
            debug!(
                kmer_size = config.kmer_size,
                window_size = config.window_size,
                max_mismatches = config.max_mismatches,
                "window too short for lossless seeding at full mismatch budget"
            );
        }

        let reverse = config
            .scan_reverse_complement
            .then(|| reverse_complement(target));
        let plans = plan_chunks(target.len(), config);
        let chunks_total = plans.len();
        let accepted = AtomicUsize::new(0);
        let ceiling_hit = AtomicBool::new(false);

        let results: Vec<Option<ChunkResult>> = plans
            .into_par_iter()
            .map(|plan| {
                if cancel.is_cancelled() {
                    return None;
                }
                if ceiling_hit.load(Ordering::Acquire) {
                    return None;
                }
                let sequence = match plan.strand {
                    Strand::Forward => target,
                    Strand::Reverse => reverse.as_deref().unwrap_or(target),
                };
                let result = self.run_chunk(&plan, sequence, weighting);
                let total = accepted.fetch_add(result.matches.len(), Ordering::AcqRel)
                    + result.matches.len();
                if config.max_matches.is_some_and(|ceiling| total >= ceiling) {
                    ceiling_hit.store(true, Ordering::Release);
                }
                debug!(
                    chunk = plan.index,
                    strand = ?plan.strand,
                    matches = result.matches.len(),
                    "chunk finished"
                );
                on_chunk(ChunkProgress {
                    chunk_index: plan.index,
                    strand: plan.strand,
                    windows: plan.windows.clone(),
                    matches: result.matches.len(),
                });
                Some(result)
            })
            .collect();

        let mut matches = Vec::new();
        let mut density = DensityProfile::new(target.len());
        let mut chunks_completed = 0usize;
        for result in results.into_iter().flatten() {
            chunks_completed += 1;
            density.merge(&result.density);
            matches.extend(result.matches);
        }
        sort_matches(&mut matches);

        let complete = chunks_completed == chunks_total;
        let stop_reason = if complete {
            None
        } else if cancel.is_cancelled() {
            Some(StopReason::Cancelled)
        } else {
            Some(StopReason::MatchCeiling)
        };
        if complete {
            info!(matches = matches.len(), chunks = chunks_total, "scan complete");
        } else {
            warn!(
                matches = matches.len(),
                chunks_completed,
                chunks_total,
                reason = ?stop_reason,
                "scan stopped early; returning partial result"
            );
        }

        Ok(ScanOutcome {
            matches,
            density,
            target_len: target.len(),
            window_size: config.window_size,
            chunks_total,
            chunks_completed,
            complete,
            stop_reason,
        })
    }

    fn run_chunk(
        &self,
        plan: &ChunkPlan,
        sequence: &[u8],
        weighting: DensityWeighting,
    ) -> ChunkResult {
        let config = &self.config;
        let mut matches = Vec::new();
        let mut search = WindowSearch::new(self.index, sequence, plan.strand, config);
        search.scan_windows(plan.windows.clone(), &mut matches);

        if plan.strand == Strand::Reverse {
            for hit in &mut matches {
                hit.position = mirror_hit(sequence.len(), hit.position, hit.length);
            }
        }

        let span = density_span(&matches, sequence.len(), config.window_size);
        let mut density = DensityProfile::local(span.start, span.len());
        for hit in &matches {
            density.record(hit, config.window_size, weighting);
        }
        ChunkResult { matches, density }
    }
}

/// Forward-strand start of a hit of `length` bases that begins at `rc_start`
/// on the reverse complement.
pub(crate) fn mirror_hit(len: usize, rc_start: usize, length: usize) -> usize {
    len - rc_start - length
}

/// Forward-coordinate span the density of `matches` lands in, or an empty
/// span when the chunk accepted nothing.
fn density_span(matches: &[Match], len: usize, window_size: usize) -> Range<usize> {
    let start = matches.iter().map(|m| m.position).min();
    let end = matches.iter().map(|m| m.position + window_size).max();
    match (start, end) {
        (Some(start), Some(end)) => start..end.min(len),
        _ => 0..0,
    }
}

/// Contiguous runs of `chunk_windows` windows per strand, forward first.
fn plan_chunks(len: usize, config: &ScanConfig) -> Vec<ChunkPlan> {
    let windows = window_count(len, config.window_size, config.step_size);
    let mut strands = vec![Strand::Forward];
    if config.scan_reverse_complement {
        strands.push(Strand::Reverse);
    }
    let mut plans = Vec::new();
    for strand in strands {
        let mut start = 0usize;
        while start < windows {
            let end = (start + config.chunk_windows).min(windows);
            plans.push(ChunkPlan {
                index: plans.len(),
                strand,
                windows: start..end,
            });
            start = end;
        }
    }
    plans
}
