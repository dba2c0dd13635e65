//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that `observed_code == rotate_code_u64(dict_code, n, rotation)`.
    ///
    /// Each step is a quarter turn clockwise on screen.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Matcher for a fixed dictionary.
///
/// Brute-force search over all ids and rotations; with 50 ids that is
/// 200 popcounts per candidate.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher for the given dictionary and Hamming threshold.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let bits = dict.bit_count();
        assert!(
            bits <= 64,
            "marker_size {} implies {} bits > 64 (unsupported)",
            dict.marker_size,
            bits
        );

        let n = dict.marker_size;
        let rotated = dict
            .codes
            .iter()
            .map(|&base| {
                [
                    base,
                    rotate_code_u64(base, n, 1),
                    rotate_code_u64(base, n, 2),
                    rotate_code_u64(base, n, 3),
                ]
            })
            .collect();

        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    /// Dictionary used by this matcher.
    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    /// Maximum Hamming distance allowed for matches.
    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Find the best match within `max_hamming`.
    ///
    /// Ties on distance go to the lowest id, then the lowest rotation.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.is_some_and(|prev| prev.hamming <= h) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                });
                if h == 0 {
                    return best;
                }
            }
        }

        best
    }
}

/// Rotate a code stored in row-major bits (`idx = y * n + x`) by `rot`
/// quarter turns clockwise.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= ((code >> (sy * n + sx)) & 1) << (y * n + x);
        }
    }
    out
}
