//! Built-in dictionaries compiled into the binary.

#![allow(clippy::unreadable_literal)]

use crate::Dictionary;

/// OpenCV `DICT_4X4_50` codes, row-major, least significant bit first, white = 1.
#[rustfmt::skip]
const DICT_4X4_50_CODES: [u64; 50] = [
    0x4cad, 0x59f0, 0xb4cc, 0x6299, 0x792a, 0xb39e, 0x7479, 0x4f23,
    0x5b7f, 0x6af3, 0x899f, 0xe588, 0xed70, 0xf054, 0x8d24, 0x7c64,
    0xa662, 0x0066, 0x7a36, 0xf56e, 0xd161, 0xd40d, 0xab33, 0x41bb,
    0xe27f, 0x8e29, 0x2735, 0x2aa5, 0xc484, 0xf62c, 0xa822, 0x4dea,
    0xf379, 0xd30f, 0x7510, 0x9490, 0xae18, 0xff20, 0x6fb0, 0x5a38,
    0x18e8, 0x1454, 0x314c, 0x4d1c, 0x1724, 0xd774, 0xfcb4, 0x26d2,
    0x740a, 0xc80a,
];

/// ArUco 4×4 dictionary with 50 markers, correcting up to one bit error.
pub const DICT_4X4_50: Dictionary = Dictionary {
    name: "DICT_4X4_50",
    marker_size: 4,
    max_correction_bits: 1,
    codes: &DICT_4X4_50_CODES,
};

/// Names accepted by [`builtin_dictionary`].
pub const BUILTIN_DICTIONARY_NAMES: &[&str] = &["DICT_4X4_50"];

/// Look up a built-in dictionary by its OpenCV name.
pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {
    match name {
        "DICT_4X4_50" => Some(DICT_4X4_50),
        _ => None,
    }
}
