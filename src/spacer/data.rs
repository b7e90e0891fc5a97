use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub type FragmentId = u32;

/// CRISPR system family of the array a spacer was harvested from.
/// Decides which recognition motif must flank a protospacer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemType {
    TypeI,
    TypeII,
    TypeIII,
    TypeV,
    #[default]
    Unspecified,
}

impl FromStr for SystemType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace(['_', ' '], "-");
        let family = normalized.strip_prefix("TYPE-").unwrap_or(&normalized);
        let family = family.split('-').next().unwrap_or("");
        match family {
            "" | "UNKNOWN" | "UNSPECIFIED" => Ok(SystemType::Unspecified),
            "I" | "CAS3" => Ok(SystemType::TypeI),
            "II" | "CAS9" => Ok(SystemType::TypeII),
            "III" | "CAS10" => Ok(SystemType::TypeIII),
            "V" | "CAS12" | "CAS12A" => Ok(SystemType::TypeV),
            _ => Err(format!("unknown CRISPR system type '{value}'")),
        }
    }
}

impl fmt::Display for SystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SystemType::TypeI => "I",
            SystemType::TypeII => "II",
            SystemType::TypeIII => "III",
            SystemType::TypeV => "V",
            SystemType::Unspecified => "unspecified",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn symbol(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

/// A fragment record as handed over by whatever loaded the collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentRecord {
    pub sequence: String,
    pub source_label: String,
    pub system_type: SystemType,
}

impl FragmentRecord {
    pub fn new(
        sequence: impl Into<String>,
        source_label: impl Into<String>,
        system_type: SystemType,
    ) -> Self {
        Self {
            sequence: sequence.into(),
            source_label: source_label.into(),
            system_type,
        }
    }
}

/// An indexed spacer. Immutable once the index is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    pub(crate) id: FragmentId,
    pub(crate) sequence: Box<[u8]>,
    pub(crate) source_label: Arc<str>,
    pub(crate) system_type: SystemType,
}

impl Fragment {
    pub fn id(&self) -> FragmentId {
        self.id
    }

    /// Uppercase A/C/G/T bytes.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn system_type(&self) -> SystemType {
        self.system_type
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub fragment_id: FragmentId,
    pub position: usize,
    pub kmer_hit_count: usize,
}

/// A verified, motif-flanked, significant hit. `position` is always on forward
/// coordinates, also for reverse-strand hits, and `position..position + length`
/// is the target stretch the fragment was verified against.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub fragment_id: FragmentId,
    pub position: usize,
    pub length: usize,
    pub strand: Strand,
    pub mismatch_count: usize,
    pub motif_score: f64,
    pub significance: f64,
    pub source_label: Arc<str>,
}

pub(crate) fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        (a.position, a.strand, a.fragment_id).cmp(&(b.position, b.strand, b.fragment_id))
    });
}

/// Explicit ambiguous base; allowed in targets, never matches anything.
pub const AMBIGUOUS_BASE: u8 = b'N';

#[inline(always)]
pub fn encode_base(byte: u8) -> Option<u8> {
    match byte {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline(always)]
pub fn is_canonical(byte: u8) -> bool {
    encode_base(byte).is_some()
}

/// Two target/fragment bytes agree only if both are canonical and equal.
#[inline(always)]
pub(crate) fn bases_match(a: u8, b: u8) -> bool {
    match (encode_base(a), encode_base(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// IUPAC-aware complement. Bytes outside the IUPAC alphabet are returned
/// unchanged so they stay non-matching after reversal.
pub fn complement(byte: u8) -> u8 {
    match byte {
        b'A' => b'T',
        b'T' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'a' => b't',
        b't' => b'a',
        b'g' => b'c',
        b'c' => b'g',
        b'R' => b'Y',
        b'Y' => b'R',
        b'r' => b'y',
        b'y' => b'r',
        b'K' => b'M',
        b'M' => b'K',
        b'k' => b'm',
        b'm' => b'k',
        b'B' => b'V',
        b'V' => b'B',
        b'b' => b'v',
        b'v' => b'b',
        b'D' => b'H',
        b'H' => b'D',
        b'd' => b'h',
        b'h' => b'd',
        other => other,
    }
}

pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&b| complement(b)).collect()
}

/// GC fraction over unambiguous bases only; `None` when there are none.
pub fn gc_fraction(sequence: &[u8]) -> Option<f64> {
    let mut gc = 0usize;
    let mut total = 0usize;
    for &byte in sequence {
        match encode_base(byte) {
            Some(1) | Some(2) => {
                gc += 1;
                total += 1;
            }
            Some(_) => total += 1,
            None => {}
        }
    }
    (total > 0).then(|| gc as f64 / total as f64)
}
