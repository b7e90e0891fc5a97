use crate::spacer::data::bases_match;

/// Bounded approximate matching between a fragment and a target window.
/// Non-canonical window bytes (including `N`) never match any fragment base.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoundedMatcher;

impl BoundedMatcher {
    /// Edit distance between `fragment` and `window` if it is `<= max_mismatches`.
    ///
    /// Equal lengths take the Hamming path; otherwise a banded dynamic program
    /// of width `2 * max_mismatches + 1` runs with early rejection as soon as a
    /// whole row exceeds the budget.
    pub fn match_bounded(
        &self,
        fragment: &[u8],
        window: &[u8],
        max_mismatches: usize,
    ) -> Option<usize> {
        if fragment.len() == window.len() {
            hamming_bounded(fragment, window, max_mismatches)
        } else {
            banded_edit_distance(fragment, window, max_mismatches)
        }
    }
}

pub(crate) fn hamming_bounded(a: &[u8], b: &[u8], max_mismatches: usize) -> Option<usize> {
    debug_assert_eq!(a.len(), b.len());
    let mut mismatches = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        if !bases_match(x, y) {
            mismatches += 1;
            if mismatches > max_mismatches {
                return None;
            }
        }
    }
    Some(mismatches)
}

/// Rows hold only the `2 * max_edits + 1` band cells; cell `(i, j)` lives at
/// `j + max_edits - i`, so time is O(n * max_edits) and memory O(max_edits).
pub(crate) fn banded_edit_distance(a: &[u8], b: &[u8], max_edits: usize) -> Option<usize> {
    let (n, m) = (a.len(), b.len());
    if n.abs_diff(m) > max_edits {
        return None;
    }
    let band = max_edits;
    let width = 2 * band + 1;
    let over = max_edits + 1;
    let mut prev = vec![over; width];
    let mut curr = vec![over; width];
    for j in 0..=band.min(m) {
        prev[j + band] = j;
    }

    for i in 1..=n {
        let mut row_min = over;
        for d in 0..width {
            let j = match (i + d).checked_sub(band) {
                Some(j) if j <= m => j,
                _ => {
                    curr[d] = over;
                    continue;
                }
            };
            let cost = if j == 0 {
                i
            } else {
                let substitution = prev[d] + usize::from(!bases_match(a[i - 1], b[j - 1]));
                let deletion = prev.get(d + 1).map_or(over, |&v| v + 1);
                let insertion = if d > 0 { curr[d - 1] + 1 } else { over };
                substitution.min(deletion).min(insertion)
            };
            curr[d] = cost.min(over);
            row_min = row_min.min(curr[d]);
        }
        if row_min > max_edits {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[m + band - n];
    (distance <= max_edits).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_match_is_exact() {
        let fragment = b"ATCGATCGATCGATCGATCG";
        for budget in 0..=5 {
            assert_eq!(BoundedMatcher.match_bounded(fragment, fragment, budget), Some(0));
        }
    }

    #[test]
    fn hamming_counts_substitutions_and_rejects_overflow() {
        let fragment = b"ACGTACGTACGTACGTACGT";
        let two_off = b"ACGTTCGTACGTACGAACGT";
        assert_eq!(BoundedMatcher.match_bounded(fragment, two_off, 3), Some(2));
        assert_eq!(BoundedMatcher.match_bounded(fragment, two_off, 2), Some(2));
        assert_eq!(BoundedMatcher.match_bounded(fragment, two_off, 1), None);
    }

    #[test]
    fn ambiguous_window_bases_always_count() {
        assert_eq!(BoundedMatcher.match_bounded(b"ACGT", b"ACNT", 1), Some(1));
        assert_eq!(BoundedMatcher.match_bounded(b"ACGT", b"acgt", 0), Some(0));
        assert_eq!(BoundedMatcher.match_bounded(b"ACGT", b"AC-T", 0), None);
    }

    #[test]
    fn banded_handles_indels() {
        // one deletion from the window
        assert_eq!(
            BoundedMatcher.match_bounded(b"ACGTACGTAC", b"ACGTCGTAC", 2),
            Some(1)
        );
        // one insertion in the window plus a substitution
        assert_eq!(
            BoundedMatcher.match_bounded(b"ACGTACGTAC", b"ACGTTACGTAA", 2),
            Some(2)
        );
        assert_eq!(
            BoundedMatcher.match_bounded(b"ACGTACGTAC", b"ACGTTACGTAA", 1),
            None
        );
    }

    #[test]
    fn length_gap_beyond_budget_is_rejected() {
        assert_eq!(BoundedMatcher.match_bounded(b"ACGTACGT", b"ACGT", 3), None);
        assert_eq!(BoundedMatcher.match_bounded(b"ACGTACGT", b"ACGTA", 3), Some(3));
    }

    #[test]
    fn banded_agrees_with_hamming_free_cases() {
        // equal content with a trailing extra base is one insertion
        assert_eq!(banded_edit_distance(b"GGGGCCCC", b"GGGGCCCCA", 1), Some(1));
        assert_eq!(banded_edit_distance(b"", b"AC", 2), Some(2));
        assert_eq!(banded_edit_distance(b"AC", b"", 2), Some(2));
    }

    #[test]
    fn long_inputs_with_an_indel_and_a_substitution() {
        let fragment = b"ACGTTGCAAGCTTCGATCCGATAGGCTAACGTACGTTGCAAGCT".repeat(20);
        let mut window = fragment.clone();
        window.remove(100);
        // window[599] now pairs with fragment[600]
        window[599] = if fragment[600] == b'A' { b'C' } else { b'A' };
        assert_eq!(banded_edit_distance(&fragment, &window, 3), Some(2));
        assert_eq!(banded_edit_distance(&fragment, &window, 1), None);
    }
}
