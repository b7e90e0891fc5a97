use tracing::{info, instrument};

use crate::config::AnalysisConfig;
use crate::error::ScanError;
use crate::spacer::annotation::{Annotation, label_regions};
use crate::spacer::chunks::{CancellationToken, ChunkProgress, GenomeScanner};
use crate::spacer::index::FragmentIndex;
use crate::spacer::landscape::{Landscape, LandscapeAggregator};

/// Scans `target` against `index` and aggregates the hits into a landscape.
///
/// A pure function of its inputs: nothing is cached between calls.
pub fn analyze(
    target: &[u8],
    index: &FragmentIndex,
    config: &AnalysisConfig,
) -> Result<Landscape, ScanError> {
    analyze_with(target, index, config, &[], &CancellationToken::new(), |_| {})
}

#[instrument(skip_all, fields(target_len = target.len(), fragments = index.len()))]
pub fn analyze_with<F>(
    target: &[u8],
    index: &FragmentIndex,
    config: &AnalysisConfig,
    annotations: &[Annotation],
    cancel: &CancellationToken,
    on_chunk: F,
) -> Result<Landscape, ScanError>
where
    F: Fn(ChunkProgress) + Sync,
{
    config.validate()?;
    let scanner = GenomeScanner::new(index, config.scan.clone())?;
    let aggregator = LandscapeAggregator::new(config.landscape.clone())?;

    let outcome = scanner.scan_with(target, aggregator.weighting(), cancel, on_chunk)?;
    let mut landscape = aggregator.from_scan(outcome);
    label_regions(&mut landscape, target, annotations);

    info!(
        matches = landscape.matches.len(),
        hotspots = landscape.hotspots.len(),
        vulnerable = landscape.vulnerable_regions.len(),
        complete = landscape.complete,
        "analysis finished"
    );
    Ok(landscape)
}
