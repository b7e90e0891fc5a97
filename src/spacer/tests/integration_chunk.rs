use crate::config::ScanConfig;
use crate::spacer::chunks::{CancellationToken, GenomeScanner, StopReason};
use crate::spacer::data::{FragmentRecord, Strand, SystemType, reverse_complement};
use crate::spacer::density::DensityWeighting;
use crate::spacer::index::FragmentIndex;

use super::helpers::{index_of, random_dna, scan_config, target_with};

fn mutate(sequence: &[u8], positions: &[usize]) -> Vec<u8> {
    let mut mutated = sequence.to_vec();
    for &p in positions {
        mutated[p] = if mutated[p] == b'A' { b'C' } else { b'A' };
    }
    mutated
}

#[test]
fn chunk_size_does_not_change_results() {
    let fragments: Vec<Vec<u8>> = (1..=3).map(|seed| random_dna(seed, 20)).collect();
    let names: Vec<String> = fragments
        .iter()
        .map(|f| String::from_utf8(f.clone()).unwrap())
        .collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let index = index_of(&refs, 10);
    let variant = mutate(&fragments[1], &[2, 17]);
    let target = target_with(
        9,
        2000,
        &[
            (100, fragments[0].as_slice()),
            (730, variant.as_slice()),
            (1500, fragments[2].as_slice()),
        ],
    );

    let run = |chunk_windows: usize| {
        let config = ScanConfig {
            chunk_windows,
            ..scan_config(10, 2)
        };
        GenomeScanner::new(&index, config).unwrap().scan(&target).unwrap()
    };

    let reference = run(10_000);
    assert_eq!(reference.chunks_total, 1);
    let positions: Vec<_> = reference.matches.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![100, 730, 1500]);
    assert_eq!(reference.matches[1].mismatch_count, 2);

    for chunk_windows in [1, 7, 64] {
        let chunked = run(chunk_windows);
        assert!(chunked.complete);
        assert!(chunked.chunks_total > 1);
        assert_eq!(chunked.matches, reference.matches);
        assert_eq!(chunked.density, reference.density);
    }
}

#[test]
fn reverse_strand_hits_report_forward_coordinates() {
    let fragment = random_dna(4, 20);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 8);
    let target = target_with(5, 300, &[(100, reverse_complement(&fragment).as_slice())]);
    let config = ScanConfig {
        scan_reverse_complement: true,
        chunk_windows: 5,
        ..scan_config(8, 2)
    };

    let outcome = GenomeScanner::new(&index, config).unwrap().scan(&target).unwrap();
    assert_eq!(outcome.matches.len(), 1);
    let hit = &outcome.matches[0];
    assert_eq!(hit.strand, Strand::Reverse);
    assert_eq!(hit.position, 100);
    assert_eq!(hit.mismatch_count, 0);
    assert_eq!(outcome.density.get(99), 0.0);
    assert_eq!(outcome.density.get(100), 1.0);
    assert_eq!(outcome.density.get(119), 1.0);
    assert_eq!(outcome.density.get(120), 0.0);
}

#[test]
fn forward_only_scan_ignores_reverse_copies() {
    let fragment = random_dna(4, 20);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 8);
    let target = target_with(5, 300, &[(100, reverse_complement(&fragment).as_slice())]);
    let outcome = GenomeScanner::new(&index, scan_config(8, 2))
        .unwrap()
        .scan(&target)
        .unwrap();
    assert!(outcome.matches.is_empty());
    assert!(outcome.complete);
}

#[test]
fn match_ceiling_stops_scheduling_further_chunks() {
    let fragment = random_dna(11, 20);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 8);
    let copies = [0, 500, 1000].map(|position| (position, fragment.as_slice()));
    let target = target_with(12, 1500, &copies);
    let config = ScanConfig {
        chunk_windows: 10,
        max_matches: Some(1),
        ..scan_config(8, 2)
    };
    let scanner = GenomeScanner::new(&index, config).unwrap();

    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let outcome = pool.install(|| scanner.scan(&target)).unwrap();
    assert!(!outcome.complete);
    assert_eq!(outcome.stop_reason, Some(StopReason::MatchCeiling));
    assert_eq!(outcome.chunks_completed, 1);
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].position, 0);
}

#[test]
fn cancelled_before_start_yields_empty_partial_result() {
    let fragment = random_dna(11, 20);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 8);
    let target = target_with(12, 500, &[(0, fragment.as_slice())]);
    let scanner = GenomeScanner::new(&index, scan_config(8, 2)).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = scanner
        .scan_with(&target, DensityWeighting::Unweighted, &token, |_| {})
        .unwrap();
    assert!(!outcome.complete);
    assert_eq!(outcome.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(outcome.chunks_completed, 0);
    assert!(outcome.matches.is_empty());
    assert_eq!(outcome.density.max(), 0.0);
}

#[test]
fn ambiguous_target_bases_count_as_mismatches() {
    let fragment = random_dna(21, 20);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 8);
    let mut masked = fragment.clone();
    masked[9] = b'N';
    let target = target_with(22, 200, &[(50, masked.as_slice())]);

    let outcome = GenomeScanner::new(&index, scan_config(8, 2))
        .unwrap()
        .scan(&target)
        .unwrap();
    assert_eq!(outcome.matches.len(), 1);
    assert_eq!(outcome.matches[0].mismatch_count, 1);
}

#[test]
fn type_ii_hits_require_a_downstream_pam() {
    let fragment = random_dna(31, 20);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let records = vec![FragmentRecord::new(spacer, "phage", SystemType::TypeII)];
    let index = FragmentIndex::build(&records, 8).unwrap().index;
    let target = target_with(
        32,
        400,
        &[
            (100, fragment.as_slice()),
            (120, &b"AGG"[..]),
            (200, fragment.as_slice()),
            (220, &b"ACC"[..]),
            (300, fragment.as_slice()),
            (320, &b"TGC"[..]),
        ],
    );

    let outcome = GenomeScanner::new(&index, scan_config(8, 2))
        .unwrap()
        .scan(&target)
        .unwrap();
    let calls: Vec<_> = outcome
        .matches
        .iter()
        .map(|m| (m.position, m.motif_score))
        .collect();
    assert_eq!(calls, vec![(100, 1.0), (300, 0.5)]);
}

#[test]
fn scanner_rejects_index_with_other_kmer_size() {
    let index = index_of(&["ACGTACGTTGCAACGTTGCA"], 8);
    let err = GenomeScanner::new(&index, scan_config(9, 2)).unwrap_err();
    assert_eq!(
        err,
        crate::error::ConfigError::IndexKmerMismatch {
            index: 8,
            config: 9
        }
    );
}

#[test]
fn default_step_finds_hits_off_the_window_grid() {
    let fragment = random_dna(41, 32);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 11);
    let copies = [55, 123, 201, 366].map(|position| (position, fragment.as_slice()));
    let target = target_with(42, 400, &copies);

    let outcome = GenomeScanner::new(&index, ScanConfig::default())
        .unwrap()
        .scan(&target)
        .unwrap();
    let positions: Vec<_> = outcome.matches.iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![55, 123, 201, 366]);
    assert!(outcome.matches.iter().all(|m| m.length == 32));
}

#[test]
fn fragments_shorter_than_the_window_are_found() {
    let fragment = random_dna(51, 32);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 8);
    let variant = mutate(&fragment, &[13]);
    let target = target_with(52, 400, &[(50, variant.as_slice())]);
    let config = ScanConfig {
        kmer_size: 8,
        max_mismatches: 1,
        window_size: 40,
        ..ScanConfig::default()
    };

    let outcome = GenomeScanner::new(&index, config).unwrap().scan(&target).unwrap();
    let hits: Vec<_> = outcome
        .matches
        .iter()
        .map(|m| (m.position, m.length, m.mismatch_count))
        .collect();
    assert_eq!(hits, vec![(50, 32, 1)]);
}

#[test]
fn short_reverse_hits_are_mirrored_by_their_own_length() {
    let fragment = random_dna(61, 32);
    let spacer = String::from_utf8(fragment.clone()).unwrap();
    let index = index_of(&[spacer.as_str()], 11);
    let target = target_with(62, 400, &[(100, reverse_complement(&fragment).as_slice())]);
    let config = ScanConfig {
        scan_reverse_complement: true,
        chunk_windows: 3,
        ..ScanConfig::default()
    };

    let outcome = GenomeScanner::new(&index, config).unwrap().scan(&target).unwrap();
    assert_eq!(outcome.matches.len(), 1);
    let hit = &outcome.matches[0];
    assert_eq!((hit.position, hit.strand, hit.length), (100, Strand::Reverse, 32));
    assert_eq!(outcome.density.get(99), 0.0);
    assert_eq!(outcome.density.get(100), 1.0);
    assert_eq!(outcome.density.get(139), 1.0);
    assert_eq!(outcome.density.get(140), 0.0);
}
