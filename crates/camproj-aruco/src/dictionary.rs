//! Dictionary metadata and packed marker codes.

/// A fixed ArUco-style dictionary.
///
/// Immutable and `Copy`: build it once (usually from [`crate::builtins`]) and
/// hand it to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dictionary {
    /// Human-readable name (for logging and health reports).
    pub name: &'static str,
    /// Marker side length (number of inner bits per side).
    pub marker_size: usize,
    /// Maximum number of bit errors the dictionary can correct.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, encoding the inner `marker_size × marker_size` bits.
    ///
    /// Bit `y * marker_size + x` holds cell `(x, y)`, least significant bit
    /// first, with **white = 1** (the OpenCV convention).
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Code of marker `id`, if it exists.
    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Whether cell `(x, y)` of marker code `code` is white.
    #[inline]
    pub fn is_white(&self, code: u64, x: usize, y: usize) -> bool {
        (code >> (y * self.marker_size + x)) & 1 == 1
    }
}
