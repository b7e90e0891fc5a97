use proptest::prelude::*;
use proptest::sample::subsequence;

use spacer_landscape::config::ScanConfig;
use spacer_landscape::spacer::{
    BoundedMatcher, FragmentIndex, FragmentRecord, GenomeScanner, Strand, SystemType,
    reverse_complement,
};

fn dna(len: impl Into<proptest::collection::SizeRange>) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop::sample::select(b"ACGT".to_vec()), len)
}

/// Replaces the base at each position with a different canonical base.
fn substitute(sequence: &[u8], positions: &[usize], shifts: &[u8]) -> Vec<u8> {
    let mut mutated = sequence.to_vec();
    for (&position, &shift) in positions.iter().zip(shifts) {
        let code = b"ACGT".iter().position(|&b| b == mutated[position]).unwrap_or(0);
        mutated[position] = b"ACGT"[(code + shift as usize) % 4];
    }
    mutated
}

fn single_fragment_index(sequence: &[u8], kmer_size: usize) -> FragmentIndex {
    let record = FragmentRecord::new(
        String::from_utf8(sequence.to_vec()).unwrap(),
        "synthetic",
        SystemType::Unspecified,
    );
    FragmentIndex::build(&[record], kmer_size).unwrap().index
}

/// A fragment of `len` bases plus `m` distinct substitution sites and shifts.
fn fragment_with_edits(
    len: std::ops::RangeInclusive<usize>,
    max_edits: usize,
) -> impl Strategy<Value = (Vec<u8>, Vec<usize>, Vec<u8>)> {
    (dna(len), 0..=max_edits).prop_flat_map(|(fragment, m)| {
        let sites = subsequence((0..fragment.len()).collect::<Vec<_>>(), m);
        let shifts = proptest::collection::vec(1u8..=3, m);
        (Just(fragment), sites, shifts)
    })
}

/// Unbanded Levenshtein distance over canonical bases.
fn full_edit_distance(a: &[u8], b: &[u8]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, &x) in a.iter().enumerate() {
        let mut curr = vec![i + 1; b.len() + 1];
        for (j, &y) in b.iter().enumerate() {
            curr[j + 1] = (prev[j] + usize::from(x != y))
                .min(prev[j + 1] + 1)
                .min(curr[j] + 1);
        }
        prev = curr;
    }
    prev[b.len()]
}

proptest! {
    #[test]
    fn fragment_matches_itself_with_zero_mismatches(fragment in dna(20..=40)) {
        let index = single_fragment_index(&fragment, 8);
        let config = ScanConfig {
            kmer_size: 8,
            max_mismatches: 2,
            window_size: fragment.len(),
            step_size: fragment.len(),
            ..ScanConfig::default()
        };
        let outcome = GenomeScanner::new(&index, config).unwrap().scan(&fragment).unwrap();
        prop_assert_eq!(outcome.matches.len(), 1);
        prop_assert_eq!(outcome.matches[0].position, 0);
        prop_assert_eq!(outcome.matches[0].mismatch_count, 0);
    }

    #[test]
    fn exact_substitution_count_is_reported(
        (fragment, sites, shifts) in fragment_with_edits(20..=40, 5)
    ) {
        let m = sites.len();
        let window = substitute(&fragment, &sites, &shifts);
        let matcher = BoundedMatcher;
        prop_assert_eq!(matcher.match_bounded(&fragment, &window, m), Some(m));
        prop_assert_eq!(matcher.match_bounded(&fragment, &window, 5), Some(m));
        if m > 0 {
            prop_assert_eq!(matcher.match_bounded(&fragment, &window, m - 1), None);
        }
    }

    #[test]
    fn seeding_never_loses_an_injected_match(
        kmer_size in prop::sample::select(vec![8usize, 10, 12]),
        m in 0usize..=3,
        seed in dna(400),
        shifts in proptest::collection::vec(1u8..=3, 3),
        site_picks in proptest::collection::vec(any::<prop::sample::Index>(), 3),
    ) {
        // (m + 1) * k + m bases always leave an untouched k-mer
        let window_size = 4 * kmer_size + 3;
        let fragment = &seed[..window_size];
        let mut sites: Vec<usize> = site_picks[..m]
            .iter()
            .map(|pick| pick.index(window_size))
            .collect();
        sites.sort_unstable();
        sites.dedup();
        let variant = substitute(fragment, &sites, &shifts);

        let index = single_fragment_index(fragment, kmer_size);
        let config = ScanConfig {
            kmer_size,
            max_mismatches: 3,
            window_size,
            step_size: 1,
            ..ScanConfig::default()
        };
        prop_assert!(config.lossless_seeding());
        let position = 150;
        let mut target = seed[window_size..].to_vec();
        target[position..position + window_size].copy_from_slice(&variant);

        let outcome = GenomeScanner::new(&index, config).unwrap().scan(&target).unwrap();
        let found = outcome
            .matches
            .iter()
            .find(|hit| hit.position == position)
            .map(|hit| hit.mismatch_count);
        prop_assert_eq!(found, Some(sites.len()));
    }

    #[test]
    fn any_position_step_and_length_is_recovered(
        (fragment, sites, shifts) in fragment_with_edits(26..=60, 2),
        window_size in 30usize..=50,
        step_pick in any::<prop::sample::Index>(),
        position_pick in any::<prop::sample::Index>(),
        background in dna(300),
        reverse in any::<bool>(),
    ) {
        // k = 8 with at most two edits keeps an untouched k-mer in 26 bases
        let step_size = step_pick.index(window_size) + 1;
        let position = position_pick.index(background.len() - fragment.len() + 1);
        let variant = substitute(&fragment, &sites, &shifts);
        let insert = if reverse { reverse_complement(&variant) } else { variant };
        let mut target = background;
        target[position..position + insert.len()].copy_from_slice(&insert);

        let index = single_fragment_index(&fragment, 8);
        let config = ScanConfig {
            kmer_size: 8,
            max_mismatches: 2,
            window_size,
            step_size,
            chunk_windows: 7,
            scan_reverse_complement: true,
            ..ScanConfig::default()
        };
        let strand = if reverse { Strand::Reverse } else { Strand::Forward };
        let outcome = GenomeScanner::new(&index, config).unwrap().scan(&target).unwrap();
        let found = outcome
            .matches
            .iter()
            .find(|hit| hit.position == position && hit.strand == strand)
            .map(|hit| (hit.length, hit.mismatch_count));
        prop_assert_eq!(found, Some((fragment.len(), sites.len())));
    }

    #[test]
    fn banded_distance_matches_full_alignment(
        a in dna(0..=24),
        b in dna(0..=24),
        budget in 0usize..=5,
    ) {
        // equal lengths take the Hamming path
        prop_assume!(a.len() != b.len());
        let full = full_edit_distance(&a, &b);
        let expected = (full <= budget).then_some(full);
        prop_assert_eq!(BoundedMatcher.match_bounded(&a, &b, budget), expected);
    }
}
