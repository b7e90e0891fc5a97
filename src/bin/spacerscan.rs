use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spacer_landscape::config::AnalysisConfig;
use spacer_landscape::spacer::{
    self, Annotation, CancellationToken, FragmentIndex, FragmentRecord, InputMode, TargetSequence,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Mmap,
    Stream,
}

impl From<ModeArg> for InputMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Mmap => InputMode::Mmap,
            ModeArg::Stream => InputMode::Stream,
        }
    }
}

/// Scan a target genome for approximate CRISPR spacer matches and report the
/// resulting targeting landscape.
#[derive(Debug, Parser)]
#[command(name = "spacerscan", version)]
struct Cli {
    /// Spacer table: CSV (`sequence,source_label,system_type`) or FASTA/FASTQ.
    #[arg(long)]
    fragments: PathBuf,

    /// Target FASTA; every record is scanned independently.
    #[arg(long)]
    target: PathBuf,

    #[arg(long)]
    output_dir: PathBuf,

    /// JSON file with `scan` and `landscape` sections; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// BED file of gene annotations used to label regions.
    #[arg(long)]
    annotations: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModeArg::Mmap)]
    mode: ModeArg,

    #[arg(long)]
    kmer_size: Option<usize>,

    #[arg(long)]
    max_mismatches: Option<usize>,

    #[arg(long)]
    window_size: Option<usize>,

    #[arg(long)]
    step_size: Option<usize>,

    #[arg(long)]
    significance: Option<f64>,

    #[arg(long)]
    max_matches: Option<usize>,

    /// Also scan the reverse-complement strand.
    #[arg(long)]
    both_strands: bool,

    /// Weight density by inverse significance instead of counting matches.
    #[arg(long)]
    weighted: bool,

    /// Also write matches as Parquet next to the CSV.
    #[arg(long)]
    parquet: bool,

    /// Worker threads (defaults to the number of CPUs).
    #[arg(long)]
    threads: Option<usize>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let threads = cli.threads.unwrap_or_else(num_cpus::get).max(1);
    if let Err(err) = ThreadPoolBuilder::new().num_threads(threads).build_global() {
        warn!(%err, "global thread pool already initialized");
    }

    let config = resolve_config(&cli)?;
    config.validate().context("invalid analysis configuration")?;

    let records = load_fragments(&cli.fragments)?;
    let build = FragmentIndex::build(&records, config.scan.kmer_size)
        .with_context(|| format!("failed to index {:?}", cli.fragments))?;
    if !build.report.is_complete() {
        warn!(
            skipped = build.report.skipped_count(),
            indexed = build.report.indexed,
            "some fragments were not indexed"
        );
    }
    let index = build.index;

    let annotations = match &cli.annotations {
        Some(path) => {
            let file = fs::File::open(path).with_context(|| format!("failed to open {path:?}"))?;
            spacer::load_annotations_bed(BufReader::new(file))
                .with_context(|| format!("failed to read {path:?}"))?
        }
        None => Vec::new(),
    };

    let targets = spacer::load_targets_from_path(&cli.target, cli.mode.into())
        .with_context(|| format!("failed to read {:?}", cli.target))?;
    if targets.is_empty() {
        bail!("no sequences found in {:?}", cli.target);
    }

    fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("failed to create {:?}", cli.output_dir))?;
    let mut name_counts: HashMap<String, usize> = HashMap::new();
    for target in &targets {
        let stem = next_output_stem(target.name(), &mut name_counts);
        let target_annotations: Vec<Annotation> = annotations
            .iter()
            .filter(|record| record.chrom == target.name())
            .map(|record| record.annotation.clone())
            .collect();
        process_target(&cli, &config, &index, target, &target_annotations, &stem)?;
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw =
                fs::read_to_string(path).with_context(|| format!("failed to read {path:?}"))?;
            AnalysisConfig::from_json_str(&raw)
                .with_context(|| format!("failed to parse {path:?}"))?
        }
        None => AnalysisConfig::default(),
    };
    let scan = &mut config.scan;
    if let Some(value) = cli.kmer_size {
        scan.kmer_size = value;
    }
    if let Some(value) = cli.max_mismatches {
        scan.max_mismatches = value;
    }
    if let Some(value) = cli.window_size {
        scan.window_size = value;
    }
    if let Some(value) = cli.step_size {
        scan.step_size = value;
    }
    if let Some(value) = cli.significance {
        scan.significance_threshold = value;
    }
    if cli.max_matches.is_some() {
        scan.max_matches = cli.max_matches;
    }
    if cli.both_strands {
        scan.scan_reverse_complement = true;
    }
    if cli.weighted {
        config.landscape.weight_by_significance = true;
    }
    Ok(config)
}

fn load_fragments(path: &Path) -> Result<Vec<FragmentRecord>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    let records = if is_csv {
        let file = fs::File::open(path).with_context(|| format!("failed to open {path:?}"))?;
        spacer::load_fragments_csv(BufReader::new(file))
    } else {
        spacer::load_fragments_fasta(path)
    }
    .with_context(|| format!("failed to read fragments from {path:?}"))?;
    info!(records = records.len(), "fragments loaded");
    Ok(records)
}

fn process_target(
    cli: &Cli,
    config: &AnalysisConfig,
    index: &FragmentIndex,
    target: &TargetSequence,
    annotations: &[Annotation],
    stem: &str,
) -> Result<()> {
    let landscape = spacer::analyze_with(
        target.bytes(),
        index,
        config,
        annotations,
        &CancellationToken::new(),
        |_| {},
    )
    .with_context(|| format!("failed to scan {}", target.name()))?;

    let dir = &cli.output_dir;
    write_file(
        &dir.join(format!("{stem}.matches.csv")),
        spacer::render_matches_csv(&landscape.matches),
    )?;
    write_file(
        &dir.join(format!("{stem}.density.bedgraph")),
        spacer::render_bedgraph(&landscape.density, target.name()),
    )?;
    write_file(
        &dir.join(format!("{stem}.hotspots.csv")),
        spacer::render_hotspots_csv(&landscape.hotspots),
    )?;
    write_file(
        &dir.join(format!("{stem}.vulnerable.csv")),
        spacer::render_vulnerable_csv(&landscape.vulnerable_regions),
    )?;
    write_file(
        &dir.join(format!("{stem}.summary.json")),
        spacer::render_summary_json(&landscape, target.name())?,
    )?;
    if cli.parquet {
        let path = dir.join(format!("{stem}.matches.parquet"));
        let file = fs::File::create(&path).with_context(|| format!("failed to create {path:?}"))?;
        spacer::write_parquet_matches(&landscape.matches, file)
            .with_context(|| format!("failed to write {path:?}"))?;
    }
    info!(
        target = target.name(),
        matches = landscape.matches.len(),
        hotspots = landscape.hotspots.len(),
        "outputs written"
    );
    Ok(())
}

fn write_file(path: &Path, contents: String) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {path:?}"))
}

fn next_output_stem(name: &str, counts: &mut HashMap<String, usize>) -> String {
    let sanitized = sanitize_name(name);
    let entry = counts.entry(sanitized.clone()).or_insert(0);
    let stem = if *entry == 0 {
        sanitized
    } else {
        format!("{sanitized}_{entry}")
    };
    *entry += 1;
    stem
}

fn sanitize_name(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "target".to_string()
    } else {
        sanitized
    }
}
