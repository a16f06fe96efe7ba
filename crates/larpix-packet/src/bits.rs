//! Conversion between unsigned integers and fixed-length bit sequences.
//!
//! A window is addressed by bit index within a packet's buffer. Whether the
//! value's most-significant bit lands on the first or the last bit of the
//! window is chosen by [`Endian`]:
//!
//! ```text
//! value = 0b1101, width 4
//!   Endian::Big    -> [1, 1, 0, 1]
//!   Endian::Little -> [1, 0, 1, 1]
//! ```
//!
//! Values wider than the window are truncated to their low-order bits, the
//! same way a hardware register drops what does not fit.

use std::ops::Range;

use bitvec::prelude::*;

/// Bit order of a numeric value inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Most-significant bit first (v1 ASICs).
    Big,
    /// Least-significant bit first (v2 ASICs, PACMAN).
    Little,
}

/// Half-open bit range `[start, stop)` inside a packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitWindow {
    pub start: usize,
    pub stop: usize,
}

impl BitWindow {
    pub const fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Single-bit window.
    pub const fn bit(index: usize) -> Self {
        Self {
            start: index,
            stop: index + 1,
        }
    }

    pub const fn width(&self) -> usize {
        self.stop - self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.stop
    }
}

/// Encode `value` into a new `bit_width`-long bit sequence.
pub fn from_uint(value: u64, bit_width: usize, endian: Endian) -> BitVec<u8, Msb0> {
    let mut bits = bitvec![u8, Msb0; 0; bit_width];
    store_uint(&mut bits, value, endian);
    bits
}

/// Decode a bit sequence into an unsigned integer.
///
/// Sequences longer than 64 bits keep only their 64 low-order bits.
pub fn to_uint<T: BitStore, O: BitOrder>(bits: &BitSlice<T, O>, endian: Endian) -> u64 {
    let len = bits.len();
    (0..len).fold(0u64, |acc, i| {
        let index = match endian {
            Endian::Big => i,
            Endian::Little => len - 1 - i,
        };
        (acc << 1) | u64::from(bits[index])
    })
}

/// Overwrite every bit of `bits` with `value`, truncating to the slice width.
pub fn store_uint<T: BitStore, O: BitOrder>(bits: &mut BitSlice<T, O>, value: u64, endian: Endian) {
    let len = bits.len();
    for i in 0..len {
        let bit = i < 64 && (value >> i) & 1 == 1;
        let index = match endian {
            Endian::Big => len - 1 - i,
            Endian::Little => i,
        };
        bits.set(index, bit);
    }
}

/// Read the window `window` of `bits` as an unsigned integer.
pub fn read_window<T: BitStore, O: BitOrder>(
    bits: &BitSlice<T, O>,
    window: BitWindow,
    endian: Endian,
) -> u64 {
    to_uint(&bits[window.range()], endian)
}

/// Write `value` into the window `window` of `bits`; bits outside are untouched.
pub fn write_window<T: BitStore, O: BitOrder>(
    bits: &mut BitSlice<T, O>,
    window: BitWindow,
    value: u64,
    endian: Endian,
) {
    store_uint(&mut bits[window.range()], value, endian);
}

/// Render bits as a `0`/`1` string in buffer order.
pub fn to_bit_string<T: BitStore, O: BitOrder>(bits: &BitSlice<T, O>) -> String {
    (0..bits.len())
        .map(|i| if bits[i] { '1' } else { '0' })
        .collect()
}

/// Parse a `0`/`1` string of exactly `len` characters.
pub fn parse_bit_string(text: &str, len: usize) -> Option<BitVec<u8, Msb0>> {
    if text.len() != len {
        return None;
    }
    let mut bits = BitVec::<u8, Msb0>::with_capacity(len);
    for c in text.chars() {
        match c {
            '0' => bits.push(false),
            '1' => bits.push(true),
            _ => return None,
        }
    }
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_uint_big_places_msb_first() {
        let bits = from_uint(0b1101, 4, Endian::Big);
        assert_eq!(to_bit_string(bits.as_bitslice()), "1101");
    }

    #[test]
    fn from_uint_little_places_lsb_first() {
        let bits = from_uint(0b1101, 4, Endian::Little);
        assert_eq!(to_bit_string(bits.as_bitslice()), "1011");
    }

    #[test]
    fn to_uint_inverts_from_uint() {
        for endian in [Endian::Big, Endian::Little] {
            for value in [0u64, 1, 42, 1000, (1 << 31) - 1] {
                let bits = from_uint(value, 31, endian);
                assert_eq!(to_uint(bits.as_bitslice(), endian), value);
            }
        }
    }

    #[test]
    fn overflow_truncates_to_low_bits() {
        let bits = from_uint(0x1FF, 8, Endian::Big);
        assert_eq!(to_uint(bits.as_bitslice(), Endian::Big), 0xFF);

        let bits = from_uint(0b10110, 3, Endian::Little);
        assert_eq!(to_uint(bits.as_bitslice(), Endian::Little), 0b110);
    }

    #[test]
    fn full_width_u64_roundtrip() {
        let bits = from_uint(u64::MAX - 5, 64, Endian::Little);
        assert_eq!(to_uint(bits.as_bitslice(), Endian::Little), u64::MAX - 5);
    }

    #[test]
    fn window_write_leaves_neighbours_untouched() {
        let mut bits = bitvec![u8, Lsb0; 1; 16];
        write_window(bits.as_mut_bitslice(), BitWindow::new(4, 8), 0, Endian::Little);
        assert_eq!(to_bit_string(bits.as_bitslice()), "1111000011111111");

        write_window(bits.as_mut_bitslice(), BitWindow::new(4, 8), 0b0101, Endian::Big);
        assert_eq!(read_window(bits.as_bitslice(), BitWindow::new(4, 8), Endian::Big), 0b0101);
        assert_eq!(to_bit_string(bits.as_bitslice()), "1111010111111111");
    }

    #[test]
    fn single_bit_window() {
        let mut bits = bitvec![u8, Msb0; 0; 8];
        write_window(bits.as_mut_bitslice(), BitWindow::bit(3), 1, Endian::Big);
        assert!(bits[3]);
        assert_eq!(bits.count_ones(), 1);
        assert_eq!(BitWindow::bit(3).width(), 1);
    }

    #[test]
    fn bit_string_parse_rejects_bad_input() {
        assert!(parse_bit_string("0102", 4).is_none());
        assert!(parse_bit_string("010", 4).is_none());
        let bits = parse_bit_string("0110", 4).unwrap();
        assert_eq!(to_uint(bits.as_bitslice(), Endian::Big), 6);
    }
}
