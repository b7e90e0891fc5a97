use crate::spacer::data::{SystemType, encode_base};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotifSide {
    /// Immediately 5' of the protospacer.
    Upstream,
    /// Immediately 3' of the protospacer.
    Downstream,
}

#[derive(Clone, Copy, Debug)]
pub struct MotifRule {
    pub side: MotifSide,
    /// Alternative IUPAC consensus patterns; the best-scoring one wins.
    pub patterns: &'static [&'static [u8]],
}

const TYPE_I: MotifRule = MotifRule {
    side: MotifSide::Upstream,
    patterns: &[b"AAG", b"ATG", b"AGG", b"GAG"],
};

const TYPE_II: MotifRule = MotifRule {
    side: MotifSide::Downstream,
    patterns: &[b"NGG"],
};

const TYPE_V: MotifRule = MotifRule {
    side: MotifSide::Upstream,
    patterns: &[b"TTTV"],
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotifCall {
    pub valid: bool,
    pub score: f64,
}

impl MotifCall {
    const ABSENT: MotifCall = MotifCall {
        valid: false,
        score: 0.0,
    };
    const NOT_REQUIRED: MotifCall = MotifCall {
        valid: true,
        score: 1.0,
    };
}

/// Scores the PAM flanking a protospacer. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotifValidator;

impl MotifValidator {
    pub fn rule(system_type: SystemType) -> Option<MotifRule> {
        match system_type {
            SystemType::TypeI => Some(TYPE_I),
            SystemType::TypeII => Some(TYPE_II),
            SystemType::TypeV => Some(TYPE_V),
            SystemType::TypeIII | SystemType::Unspecified => None,
        }
    }

    /// Scores the flank of the protospacer `target[position..position + length]`.
    /// 1.0 for an exact consensus hit, 0.5 for one mismatch, 0.0 otherwise or
    /// when the flank would run off the target.
    pub fn validate(
        &self,
        target: &[u8],
        position: usize,
        length: usize,
        system_type: SystemType,
    ) -> MotifCall {
        let Some(rule) = Self::rule(system_type) else {
            return MotifCall::NOT_REQUIRED;
        };
        let mut best = MotifCall::ABSENT;
        for pattern in rule.patterns {
            let Some(flank) = flank_slice(target, position, length, pattern.len(), rule.side) else {
                continue;
            };
            let score = score_pattern(pattern, flank);
            if score > best.score {
                best = MotifCall {
                    valid: true,
                    score,
                };
            }
        }
        best
    }
}

fn flank_slice(
    target: &[u8],
    position: usize,
    length: usize,
    width: usize,
    side: MotifSide,
) -> Option<&[u8]> {
    let (start, end) = match side {
        MotifSide::Upstream => (position.checked_sub(width)?, position),
        MotifSide::Downstream => {
            let start = position.checked_add(length)?;
            (start, start.checked_add(width)?)
        }
    };
    target.get(start..end)
}

fn score_pattern(pattern: &[u8], flank: &[u8]) -> f64 {
    let mismatches = pattern
        .iter()
        .zip(flank)
        .filter(|&(&code, &base)| !iupac_accepts(code, base))
        .count();
    match mismatches {
        0 => 1.0,
        1 => 0.5,
        _ => 0.0,
    }
}

/// Whether the degenerate IUPAC `code` admits `base`. Non-canonical target
/// bytes are only admitted by `N`.
fn iupac_accepts(code: u8, base: u8) -> bool {
    if code == b'N' {
        return true;
    }
    let Some(bits) = encode_base(base) else {
        return false;
    };
    // A=0 C=1 G=2 T=3
    let allowed: &[u8] = match code {
        b'A' => &[0],
        b'C' => &[1],
        b'G' => &[2],
        b'T' => &[3],
        b'R' => &[0, 2],
        b'Y' => &[1, 3],
        b'S' => &[1, 2],
        b'W' => &[0, 3],
        b'K' => &[2, 3],
        b'M' => &[0, 1],
        b'B' => &[1, 2, 3],
        b'D' => &[0, 2, 3],
        b'H' => &[0, 1, 3],
        b'V' => &[0, 1, 2],
        _ => &[],
    };
    allowed.contains(&bits)
}
