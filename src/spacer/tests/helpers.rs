use crate::config::ScanConfig;
use crate::spacer::data::{FragmentRecord, SystemType};
use crate::spacer::index::FragmentIndex;

/// Deterministic pseudo-random ACGT, so fixtures stay stable across runs.
pub(super) fn random_dna(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"ACGT"[(state >> 33) as usize % 4]
        })
        .collect()
}

pub(super) fn index_of(sequences: &[&str], kmer_size: usize) -> FragmentIndex {
    let records: Vec<_> = sequences
        .iter()
        .enumerate()
        .map(|(i, seq)| FragmentRecord::new(*seq, format!("src{i}"), SystemType::Unspecified))
        .collect();
    FragmentIndex::build(&records, kmer_size).unwrap().index
}

pub(super) fn scan_config(kmer_size: usize, max_mismatches: usize) -> ScanConfig {
    ScanConfig {
        kmer_size,
        max_mismatches,
        window_size: 20,
        step_size: 10,
        ..ScanConfig::default()
    }
}

/// Target of `len` random bases with `insert` copied in at `position`.
pub(super) fn target_with(seed: u64, len: usize, inserts: &[(usize, &[u8])]) -> Vec<u8> {
    let mut target = random_dna(seed, len);
    for &(position, insert) in inserts {
        target[position..position + insert.len()].copy_from_slice(insert);
    }
    target
}
