use std::sync::Arc;

use ahash::AHashMap;
use tracing::{debug, info, warn};

use crate::config::validate_kmer_size;
use crate::error::{ConfigError, ScanError};
use crate::spacer::data::{Fragment, FragmentId, FragmentRecord, encode_base};

pub type KmerCode = u32;

/// Why a record did not make it into the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    TooShort { length: usize },
    InvalidBase { position: usize, byte: u8 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedFragment {
    pub record_index: usize,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedFragment>,
    pub distinct_kmers: usize,
}

impl BuildReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug)]
pub struct IndexBuild {
    pub index: FragmentIndex,
    pub report: BuildReport,
}

/// k-mer -> fragment-id inverted index. Read-only after [`FragmentIndex::build`],
/// so one instance can back any number of concurrent scans by shared reference.
#[derive(Debug)]
pub struct FragmentIndex {
    kmer_size: usize,
    postings: AHashMap<KmerCode, Vec<FragmentId>>,
    fragments: Vec<Fragment>,
}

impl FragmentIndex {
    pub fn build(records: &[FragmentRecord], kmer_size: usize) -> Result<IndexBuild, ScanError> {
        validate_kmer_size(kmer_size)?;
        if records.is_empty() {
            return Err(ConfigError::EmptyFragmentCollection.into());
        }

        let mut fragments: Vec<Fragment> = Vec::new();
        fragments.try_reserve_exact(records.len())?;
        let mut postings: AHashMap<KmerCode, Vec<FragmentId>> = AHashMap::new();
        postings.try_reserve(records.len())?;
        let mut report = BuildReport::default();
        let mut codes: Vec<KmerCode> = Vec::new();

        for (record_index, record) in records.iter().enumerate() {
            let sequence = match normalize_fragment(record.sequence.as_bytes(), kmer_size) {
                Ok(sequence) => sequence,
                Err(reason) => {
                    debug!(record_index, ?reason, "skipping fragment");
                    report.skipped.push(SkippedFragment {
                        record_index,
                        reason,
                    });
                    continue;
                }
            };
            let id = fragments.len() as FragmentId;

            codes.clear();
            codes.extend(KmerCodes::new(&sequence, kmer_size).map(|(_, code)| code));
            codes.sort_unstable();
            codes.dedup();
            for &code in &codes {
                postings.entry(code).or_default().push(id);
            }

            fragments.push(Fragment {
                id,
                sequence,
                source_label: Arc::from(record.source_label.as_str()),
                system_type: record.system_type,
            });
        }

        if fragments.is_empty() {
            return Err(ScanError::NoIndexableFragments {
                skipped: report.skipped_count(),
            });
        }

        report.indexed = fragments.len();
        report.distinct_kmers = postings.len();
        if !report.is_complete() {
            warn!(
                skipped = report.skipped_count(),
                "some fragments could not be indexed"
            );
        }
        info!(
            fragments = report.indexed,
            distinct_kmers = report.distinct_kmers,
            kmer_size,
            "fragment index built"
        );

        Ok(IndexBuild {
            index: FragmentIndex {
                kmer_size,
                postings,
                fragments,
            },
            report,
        })
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Number of indexed fragments; the database size used for significance.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id as usize)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Ids of fragments containing `kmer`, ascending and deduplicated.
    /// Empty for k-mers of the wrong length or with non-ACGT bytes.
    pub fn query(&self, kmer: &[u8]) -> &[FragmentId] {
        if kmer.len() != self.kmer_size {
            return &[];
        }
        match encode_kmer(kmer) {
            Some(code) => self.query_code(code),
            None => &[],
        }
    }

    pub fn query_code(&self, code: KmerCode) -> &[FragmentId] {
        self.postings.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn normalize_fragment(raw: &[u8], kmer_size: usize) -> Result<Box<[u8]>, SkipReason> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Err(SkipReason::Empty);
    }
    if let Some(position) = trimmed.iter().position(|&b| encode_base(b).is_none()) {
        return Err(SkipReason::InvalidBase {
            position,
            byte: trimmed[position],
        });
    }
    if trimmed.len() < kmer_size {
        return Err(SkipReason::TooShort {
            length: trimmed.len(),
        });
    }
    Ok(trimmed.to_ascii_uppercase().into_boxed_slice())
}

pub(crate) fn encode_kmer(kmer: &[u8]) -> Option<KmerCode> {
    kmer.iter()
        .try_fold(0 as KmerCode, |code, &b| Some((code << 2) | encode_base(b)? as KmerCode))
}

/// Rolling 2-bit encoder over every k-mer of `data` that consists of canonical
/// bases only. Yields `(offset, code)`; k-mers touching any other byte are
/// skipped, which makes them unseedable.
pub(crate) struct KmerCodes<'a> {
    data: &'a [u8],
    kmer_size: usize,
    mask: KmerCode,
    cursor: usize,
    valid_run: usize,
    code: KmerCode,
}

impl<'a> KmerCodes<'a> {
    pub(crate) fn new(data: &'a [u8], kmer_size: usize) -> Self {
        Self {
            data,
            kmer_size,
            mask: ((1u64 << (2 * kmer_size)) - 1) as KmerCode,
            cursor: 0,
            valid_run: 0,
            code: 0,
        }
    }
}

impl Iterator for KmerCodes<'_> {
    type Item = (usize, KmerCode);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.data.len() {
            let byte = self.data[self.cursor];
            self.cursor += 1;
            match encode_base(byte) {
                Some(bits) => {
                    self.code = ((self.code << 2) | bits as KmerCode) & self.mask;
                    self.valid_run += 1;
                    if self.valid_run >= self.kmer_size {
                        return Some((self.cursor - self.kmer_size, self.code));
                    }
                }
                None => {
                    self.valid_run = 0;
                    self.code = 0;
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spacer::data::SystemType;

    fn record(sequence: &str, label: &str) -> FragmentRecord {
        FragmentRecord::new(sequence, label, SystemType::Unspecified)
    }

    #[test]
    fn kmer_codes_skip_ambiguous_bases() {
        let offsets: Vec<_> = KmerCodes::new(b"ACGTNACGTA", 4).map(|(o, _)| o).collect();
        assert_eq!(offsets, vec![0, 5, 6]);
        let codes: Vec<_> = KmerCodes::new(b"ACGTacgt", 4).map(|(_, c)| c).collect();
        assert_eq!(codes[0], codes[4]);
        assert_eq!(Some(codes[0]), encode_kmer(b"ACGT"));
    }

    #[test]
    fn build_indexes_every_kmer_once_per_fragment() {
        let records = vec![record("AAAAAAAAAAAA", "phage"), record("CCCCCCCCAAAAAAAA", "phage")];
        let build = FragmentIndex::build(&records, 8).unwrap();
        assert_eq!(build.report.indexed, 2);
        assert!(build.report.is_complete());
        assert_eq!(build.index.query(b"AAAAAAAA"), &[0, 1]);
        assert_eq!(build.index.query(b"CCCCCCCC"), &[1]);
        assert_eq!(build.index.query(b"GGGGGGGG"), &[] as &[FragmentId]);
        assert_eq!(build.index.query(b"AAAANAAA"), &[] as &[FragmentId]);
    }

    #[test]
    fn unreadable_fragments_are_skipped_and_counted() {
        let records = vec![
            record("ACGTACGTACGTAC", "a"),
            record("ACGTXCGTACGTAC", "b"),
            record("ACG", "c"),
            record("   ", "d"),
        ];
        let build = FragmentIndex::build(&records, 8).unwrap();
        assert_eq!(build.report.indexed, 1);
        assert_eq!(build.report.skipped_count(), 3);
        assert_eq!(
            build.report.skipped[0],
            SkippedFragment {
                record_index: 1,
                reason: SkipReason::InvalidBase {
                    position: 4,
                    byte: b'X'
                }
            }
        );
        assert_eq!(build.report.skipped[1].reason, SkipReason::TooShort { length: 3 });
        assert_eq!(build.report.skipped[2].reason, SkipReason::Empty);
        assert_eq!(build.index.fragment(0).unwrap().source_label(), "a");
    }

    #[test]
    fn build_rejects_bad_configuration() {
        assert!(matches!(
            FragmentIndex::build(&[], 11),
            Err(ScanError::Config(ConfigError::EmptyFragmentCollection))
        ));
        assert!(matches!(
            FragmentIndex::build(&[record("ACGTACGTACGTACGT", "x")], 15),
            Err(ScanError::Config(ConfigError::KmerSizeOutOfRange { value: 15, .. }))
        ));
        assert!(matches!(
            FragmentIndex::build(&[record("NNNNNNNNNNNN", "x")], 8),
            Err(ScanError::NoIndexableFragments { skipped: 1 })
        ));
    }
}
