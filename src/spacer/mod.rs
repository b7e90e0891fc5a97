pub mod analysis;
pub mod annotation;
pub mod chunks;
pub mod data;
pub mod density;
pub mod export;
pub mod index;
pub mod landscape;
pub mod loaders;
pub mod matcher;
pub mod motif;
pub mod search;
#[cfg(test)]
mod tests;

pub use analysis::{analyze, analyze_with};
pub use annotation::{Annotation, label_regions};
pub use chunks::{CancellationToken, ChunkProgress, GenomeScanner, ScanOutcome, StopReason};
pub use data::{
    Candidate, Fragment, FragmentId, FragmentRecord, Match, Strand, SystemType, gc_fraction,
    reverse_complement,
};
pub use density::{DensityProfile, DensityWeighting, MAX_MATCH_WEIGHT};
pub use export::{
    ExportError, render_bedgraph, render_hotspots_csv, render_matches_csv, render_summary_json,
    render_vulnerable_csv, write_parquet_matches,
};
pub use index::{BuildReport, FragmentIndex, IndexBuild, SkipReason, SkippedFragment};
pub use landscape::{
    Hotspot, Landscape, LandscapeAggregator, LandscapeStats, SourceDistribution, VulnerableRegion,
};
pub use loaders::{
    BedRecord, InputMode, LoadError, TargetSequence, load_annotations_bed, load_fragments_csv,
    load_fragments_fasta, load_targets_from_path, load_targets_reader,
};
pub use matcher::BoundedMatcher;
pub use motif::{MotifCall, MotifRule, MotifSide, MotifValidator};
pub use search::{background_evalue, window_count};
