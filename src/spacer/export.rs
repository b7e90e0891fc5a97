use std::io::Write;
use std::sync::Arc;

use arrow_array::{ArrayRef, Float64Array, RecordBatch, StringArray, UInt32Array, UInt64Array};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::errors::ParquetError;
use serde::Serialize;
use thiserror::Error;

use crate::spacer::chunks::StopReason;
use crate::spacer::data::Match;
use crate::spacer::density::DensityProfile;
use crate::spacer::landscape::{
    Hotspot, Landscape, LandscapeStats, SourceDistribution, VulnerableRegion,
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn render_matches_csv(matches: &[Match]) -> String {
    let mut out = String::from(
        "position,end,strand,fragment_id,source_label,mismatch_count,motif_score,significance\n",
    );
    for hit in matches {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{:e}\n",
            hit.position,
            hit.position + hit.length,
            hit.strand.symbol(),
            hit.fragment_id,
            escape_csv_field(&hit.source_label),
            hit.mismatch_count,
            hit.motif_score,
            hit.significance
        ));
    }
    out
}

/// Run-length encoded bedGraph of the non-zero density, one line per run of
/// equal values.
pub fn render_bedgraph(density: &DensityProfile, chrom: &str) -> String {
    let mut out = format!("track type=bedGraph name=\"{chrom} spacer density\"\n");
    let values = density.values();
    let offset = density.offset();
    let mut start = 0usize;
    while start < values.len() {
        let value = values[start];
        let mut end = start + 1;
        while end < values.len() && values[end] == value {
            end += 1;
        }
        if value != 0.0 {
            out.push_str(&format!("{chrom}\t{}\t{}\t{value}\n", offset + start, offset + end));
        }
        start = end;
    }
    out
}

pub fn render_hotspots_csv(hotspots: &[Hotspot]) -> String {
    let mut out =
        String::from(
            "start,end,length,score,prominence,peak_position,mean_density,gc_content,annotations\n",
        );
    for hotspot in hotspots {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{}\n",
            hotspot.start,
            hotspot.end,
            hotspot.len(),
            hotspot.score,
            hotspot.prominence,
            hotspot.peak_position,
            hotspot.mean_density,
            render_gc(hotspot.gc_content),
            escape_csv_field(&hotspot.annotations.join(";"))
        ));
    }
    out
}

pub fn render_vulnerable_csv(regions: &[VulnerableRegion]) -> String {
    let mut out = String::from("start,end,length,score,gc_content,annotations\n");
    for region in regions {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            region.start,
            region.end,
            region.len(),
            region.score,
            render_gc(region.gc_content),
            escape_csv_field(&region.annotations.join(";"))
        ));
    }
    out
}

fn render_gc(gc: Option<f64>) -> String {
    gc.map(|value| format!("{value:.4}")).unwrap_or_default()
}

fn escape_csv_field(value: &str) -> String {
    if !value.contains([',', '"', '\n']) {
        return value.to_string();
    }
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[derive(Debug, Serialize)]
struct SummaryView<'a> {
    target: &'a str,
    target_len: usize,
    complete: bool,
    stop_reason: Option<&'static str>,
    stats: &'a LandscapeStats,
    source_distribution: &'a SourceDistribution,
    source_fractions: std::collections::BTreeMap<String, f64>,
    hotspots: &'a [Hotspot],
    vulnerable_regions: &'a [VulnerableRegion],
}

fn stop_reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Cancelled => "cancelled",
        StopReason::MatchCeiling => "match_ceiling",
    }
}

/// Pretty-printed JSON summary of a landscape; per-match rows are left to the
/// CSV/Parquet writers.
pub fn render_summary_json(landscape: &Landscape, target: &str) -> Result<String, ExportError> {
    let view = SummaryView {
        target,
        target_len: landscape.density.len(),
        complete: landscape.complete,
        stop_reason: landscape.stop_reason.map(stop_reason_label),
        stats: &landscape.stats,
        source_distribution: &landscape.source_distribution,
        source_fractions: landscape.source_distribution.fractions(),
        hotspots: &landscape.hotspots,
        vulnerable_regions: &landscape.vulnerable_regions,
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

pub fn write_parquet_matches<W: Write + Send>(
    matches: &[Match],
    writer: W,
) -> Result<(), ExportError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("position", DataType::UInt64, false),
        Field::new("end", DataType::UInt64, false),
        Field::new("strand", DataType::Utf8, false),
        Field::new("fragment_id", DataType::UInt32, false),
        Field::new("source_label", DataType::Utf8, false),
        Field::new("mismatch_count", DataType::UInt32, false),
        Field::new("motif_score", DataType::Float64, false),
        Field::new("significance", DataType::Float64, false),
    ]));

    let positions: Vec<u64> = matches.iter().map(|m| m.position as u64).collect();
    let ends: Vec<u64> = matches.iter().map(|m| (m.position + m.length) as u64).collect();
    let strands: Vec<String> = matches.iter().map(|m| m.strand.symbol().to_string()).collect();
    let fragment_ids: Vec<u32> = matches.iter().map(|m| m.fragment_id).collect();
    let labels: Vec<&str> = matches.iter().map(|m| m.source_label.as_ref()).collect();
    let mismatches: Vec<u32> = matches.iter().map(|m| m.mismatch_count as u32).collect();
    let motif_scores: Vec<f64> = matches.iter().map(|m| m.motif_score).collect();
    let significances: Vec<f64> = matches.iter().map(|m| m.significance).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(positions)),
        Arc::new(UInt64Array::from(ends)),
        Arc::new(StringArray::from(strands)),
        Arc::new(UInt32Array::from(fragment_ids)),
        Arc::new(StringArray::from(labels)),
        Arc::new(UInt32Array::from(mismatches)),
        Arc::new(Float64Array::from(motif_scores)),
        Arc::new(Float64Array::from(significances)),
    ];

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let mut arrow_writer = ArrowWriter::try_new(writer, schema, None)?;
    arrow_writer.write(&batch)?;
    arrow_writer.close()?;
    Ok(())
}
