use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use memchr::memchr2;
use memmap2::MmapOptions;
use serde::Deserialize;
use thiserror::Error;

use crate::spacer::annotation::Annotation;
use crate::spacer::data::{FragmentRecord, SystemType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Mmap,
    Stream,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("fasta error: {0}")]
    Fasta(#[from] needletail::errors::ParseError),
    #[error("record {record}: {message}")]
    InvalidRecord { record: usize, message: String },
}

/// One FASTA record of the target, bytes kept exactly as read (minus line breaks).
#[derive(Clone, Debug)]
pub struct TargetSequence {
    pub(crate) name: String,
    pub(crate) sequence: Arc<Vec<u8>>,
}

impl TargetSequence {
    pub fn new(name: impl Into<String>, sequence: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            sequence: Arc::new(sequence),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.sequence)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.sequence
    }
}

pub fn load_targets_from_path(path: &Path, mode: InputMode) -> Result<Vec<TargetSequence>, LoadError> {
    let targets = match mode {
        InputMode::Mmap => load_targets_mmap(path)?,
        InputMode::Stream => {
            let file = File::open(path)?;
            load_targets_reader(BufReader::with_capacity(1 << 20, file))?
        }
    };
    Ok(targets)
}

pub fn load_targets_reader<R: BufRead>(mut reader: R) -> io::Result<Vec<TargetSequence>> {
    let mut targets = Vec::new();
    let mut current_name: Option<String> = None;
    let mut sequence: Vec<u8> = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line.starts_with('>') {
            finalize_target(&mut current_name, &mut sequence, &mut targets);
            current_name = Some(parse_record_name(&line, targets.len() + 1));
            continue;
        }
        sequence.extend(line.bytes().filter(|b| !b.is_ascii_whitespace()));
    }
    if current_name.is_none() && !sequence.is_empty() {
        current_name = Some(format!("sequence_{}", targets.len() + 1));
    }
    finalize_target(&mut current_name, &mut sequence, &mut targets);
    Ok(targets)
}

fn load_targets_mmap(path: &Path) -> io::Result<Vec<TargetSequence>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }
    let mmap = unsafe { MmapOptions::new().map(&file)? };
    let data = &mmap[..];
    let mut targets = Vec::new();
    let mut sequence = Vec::with_capacity(data.len());
    let mut current_name: Option<String> = None;
    let mut cursor = 0usize;
    while cursor < data.len() {
        let line_end = memchr2(b'\n', b'\r', &data[cursor..])
            .map(|offset| cursor + offset)
            .unwrap_or(data.len());
        let line = &data[cursor..line_end];
        if let Some(header) = line.strip_prefix(b">") {
            finalize_target(&mut current_name, &mut sequence, &mut targets);
            let header = String::from_utf8_lossy(header);
            current_name = Some(parse_record_name(&header, targets.len() + 1));
        } else {
            sequence.extend(line.iter().copied().filter(|b| !b.is_ascii_whitespace()));
        }
        cursor = line_end + 1;
    }
    if current_name.is_none() && !sequence.is_empty() {
        current_name = Some(format!("sequence_{}", targets.len() + 1));
    }
    finalize_target(&mut current_name, &mut sequence, &mut targets);
    Ok(targets)
}

fn finalize_target(
    current_name: &mut Option<String>,
    sequence: &mut Vec<u8>,
    targets: &mut Vec<TargetSequence>,
) {
    if let Some(name) = current_name.take()
        && !sequence.is_empty()
    {
        targets.push(TargetSequence {
            name,
            sequence: Arc::new(std::mem::take(sequence)),
        });
    }
}

pub(crate) fn parse_record_name(line: &str, index: usize) -> String {
    let header = line.trim_start_matches('>');
    header
        .split_whitespace()
        .next()
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("sequence_{index}"))
}

#[derive(Debug, Deserialize)]
struct FragmentRow {
    sequence: String,
    source_label: String,
    #[serde(default)]
    system_type: String,
}

/// Reads `sequence,source_label[,system_type]` rows with a header line.
pub fn load_fragments_csv<R: io::Read>(reader: R) -> Result<Vec<FragmentRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();
    for (record, row) in csv_reader.deserialize::<FragmentRow>().enumerate() {
        let row = row?;
        let system_type = row
            .system_type
            .parse::<SystemType>()
            .map_err(|message| LoadError::InvalidRecord { record, message })?;
        records.push(FragmentRecord::new(row.sequence, row.source_label, system_type));
    }
    Ok(records)
}

/// Reads spacers from FASTA/FASTQ (optionally gzipped). The header is
/// `>id source label|system type`; without a description the id doubles as
/// the source label.
pub fn load_fragments_fasta(path: &Path) -> Result<Vec<FragmentRecord>, LoadError> {
    let mut reader = needletail::parse_fastx_file(path)?;
    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record = record?;
        let header = String::from_utf8_lossy(record.id()).into_owned();
        let (source_label, system_type) = parse_fragment_header(&header)
            .map_err(|message| LoadError::InvalidRecord {
                record: records.len(),
                message,
            })?;
        let sequence = String::from_utf8_lossy(&record.seq()).into_owned();
        records.push(FragmentRecord::new(sequence, source_label, system_type));
    }
    Ok(records)
}

pub(crate) fn parse_fragment_header(header: &str) -> Result<(String, SystemType), String> {
    let mut parts = header.trim().splitn(2, char::is_whitespace);
    let id = parts.next().unwrap_or("").to_string();
    let description = parts.next().map(str::trim).unwrap_or("");
    if description.is_empty() {
        return Ok((id, SystemType::Unspecified));
    }
    match description.rsplit_once('|') {
        Some((label, system)) => Ok((label.trim().to_string(), system.parse()?)),
        None => Ok((description.to_string(), SystemType::Unspecified)),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BedRecord {
    pub chrom: String,
    pub annotation: Annotation,
}

/// Minimal BED reader: `chrom start end [name ...]`, `#`/`track` lines skipped.
pub fn load_annotations_bed<R: io::Read>(reader: R) -> Result<Vec<BedRecord>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader);
    let mut records = Vec::new();
    for (record, row) in csv_reader.records().enumerate() {
        let row = row?;
        if row.get(0).is_some_and(|c| c.starts_with("track") || c.starts_with("browser")) {
            continue;
        }
        let field = |i: usize| {
            row.get(i).ok_or_else(|| LoadError::InvalidRecord {
                record,
                message: format!("missing BED column {}", i + 1),
            })
        };
        let parse = |i: usize| -> Result<usize, LoadError> {
            field(i)?.trim().parse().map_err(|_| LoadError::InvalidRecord {
                record,
                message: format!("BED column {} is not a coordinate", i + 1),
            })
        };
        let chrom = field(0)?.to_string();
        let start = parse(1)?;
        let end = parse(2)?;
        let name = row
            .get(3)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{chrom}:{start}-{end}"));
        records.push(BedRecord {
            chrom,
            annotation: Annotation::new(name, start, end),
        });
    }
    Ok(records)
}
