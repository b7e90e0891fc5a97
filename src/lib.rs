pub mod config;
pub mod error;
pub mod spacer;

pub use config::{AnalysisConfig, LandscapeConfig, ScanConfig};
pub use error::{ConfigError, ScanError};
pub use spacer::{
    CancellationToken, FragmentIndex, FragmentRecord, GenomeScanner, Landscape,
    LandscapeAggregator, Match, Strand, SystemType, analyze, analyze_with,
};
