#![forbid(unsafe_code)]
//! Bit packing, varint and cursor utilities shared by the cache and schema codecs.

pub mod bits {
    //! Packs several sub-word fields ("slots") into one fixed-size byte block.
    //!
    //! A slot is either a boolean (width 1, packed at any bit) or an integer
    //! field of 2..=40 bits that starts on a byte boundary. The all-ones
    //! pattern of a slot means "unset" and reads back as `-1`.

    use crate::error::{ConsistencyError, Result};

    /// Largest block a layout may describe, in bytes.
    pub const MAX_BLOCK_BYTES: usize = 11;
    /// Largest block a layout may describe, in bits.
    pub const MAX_BLOCK_BITS: usize = MAX_BLOCK_BYTES * 8;
    /// Widest integer slot.
    pub const MAX_SLOT_BITS: u8 = 40;

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    struct Slot {
        byte: usize,
        bit: u8,
        bits: u8,
        mask: u64,
    }

    impl Slot {
        fn span(&self) -> usize {
            (self.bit as usize + self.bits as usize).div_ceil(8)
        }
    }

    /// Precomputed offsets and masks for an ordered list of slot widths.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub struct SlotLayout {
        slots: Vec<Slot>,
        block_bytes: usize,
    }

    impl SlotLayout {
        /// Computes the layout for `widths`, in slot order.
        ///
        /// # Errors
        ///
        /// Returns [`ConsistencyError::InvalidLayout`] for a zero or too wide
        /// slot, a multi-bit slot not starting at a byte boundary, or a total
        /// width above [`MAX_BLOCK_BITS`].
        pub fn new(widths: &[u8]) -> Result<Self> {
            let mut slots = Vec::with_capacity(widths.len());
            let mut offset = 0usize;
            for (index, &bits) in widths.iter().enumerate() {
                if bits == 0 || bits > MAX_SLOT_BITS {
                    return Err(ConsistencyError::InvalidLayout(format!(
                        "slot {index} has width {bits}, expected 1..={MAX_SLOT_BITS}"
                    )));
                }
                if bits > 1 && offset % 8 != 0 {
                    return Err(ConsistencyError::InvalidLayout(format!(
                        "slot {index} ({bits} bits) starts at bit {offset}, not a byte boundary"
                    )));
                }
                let end = offset + bits as usize;
                if end > MAX_BLOCK_BITS {
                    return Err(ConsistencyError::InvalidLayout(format!(
                        "layout needs {end} bits, budget is {MAX_BLOCK_BITS}"
                    )));
                }
                slots.push(Slot {
                    byte: offset / 8,
                    bit: (offset % 8) as u8,
                    bits,
                    mask: (1u64 << bits) - 1,
                });
                offset = end;
            }
            Ok(Self {
                slots,
                block_bytes: offset.div_ceil(8),
            })
        }

        /// Bytes needed to hold one block.
        pub fn block_bytes(&self) -> usize {
            self.block_bytes
        }

        /// Number of slots in the layout.
        pub fn len(&self) -> usize {
            self.slots.len()
        }

        /// Whether the layout has no slots.
        pub fn is_empty(&self) -> bool {
            self.slots.is_empty()
        }

        /// Value mask of `slot`; the largest storable value is `mask - 1`.
        pub fn mask(&self, slot: usize) -> u64 {
            self.slot(slot).mask
        }

        /// Reads `slot` from `block`.
        ///
        /// Booleans read `-1` when set and `0` otherwise. Integers read their
        /// value, or `-1` when every bit of the slot is set.
        pub fn get(&self, block: &[u8], slot: usize) -> i64 {
            let slot = self.slot(slot);
            let raw = read_word(block, slot) >> slot.bit & slot.mask;
            if raw == slot.mask {
                -1
            } else {
                raw as i64
            }
        }

        /// Convenience for boolean slots.
        pub fn get_bool(&self, block: &[u8], slot: usize) -> bool {
            self.get(block, slot) == -1
        }

        /// Writes `value` into `slot` without touching the other bits of the block.
        ///
        /// `-1` (or the slot mask itself) stores the unset sentinel.
        ///
        /// # Panics
        ///
        /// Panics when `slot` is out of range or `value` is outside `[-1, mask]`.
        pub fn set(&self, block: &mut [u8], slot: usize, value: i64) {
            let slot = *self.slot(slot);
            let raw = if value == -1 {
                slot.mask
            } else {
                assert!(
                    value >= 0 && (value as u64) <= slot.mask,
                    "value {value} out of range for {}-bit slot",
                    slot.bits
                );
                value as u64
            };
            let shifted_mask = slot.mask << slot.bit;
            let word = read_word(block, &slot) & !shifted_mask | (raw << slot.bit);
            write_word(block, &slot, word);
        }

        /// Convenience for boolean slots.
        pub fn set_bool(&self, block: &mut [u8], slot: usize, value: bool) {
            self.set(block, slot, if value { -1 } else { 0 });
        }

        /// Resets every slot of `block` to the unset sentinel.
        pub fn clear(&self, block: &mut [u8]) {
            block[..self.block_bytes].fill(0xFF);
        }

        fn slot(&self, slot: usize) -> &Slot {
            self.slots.get(slot).unwrap_or_else(|| {
                panic!(
                    "slot index {slot} out of range for layout with {} slots",
                    self.slots.len()
                )
            })
        }
    }

    fn read_word(block: &[u8], slot: &Slot) -> u64 {
        let mut word = 0u64;
        for (i, byte) in block[slot.byte..slot.byte + slot.span()].iter().enumerate() {
            word |= (*byte as u64) << (8 * i);
        }
        word
    }

    fn write_word(block: &mut [u8], slot: &Slot, word: u64) {
        for (i, byte) in block[slot.byte..slot.byte + slot.span()]
            .iter_mut()
            .enumerate()
        {
            *byte = (word >> (8 * i)) as u8;
        }
    }
}

pub mod var {
    //! Unsigned varints and ZigZag signed integers.

    /// Encodes a u64 as an unsigned varint.
    pub fn encode_u64(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            } else {
                out.push(byte | 0x80);
            }
        }
    }

    /// Decodes a u64 varint, advancing `off`. Returns `None` when the input
    /// is truncated or longer than ten bytes.
    pub fn decode_u64(src: &[u8], off: &mut usize) -> Option<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for i in 0..10 {
            let byte = *src.get(*off)?;
            *off += 1;
            let payload = (byte & 0x7f) as u64;
            if i == 9 && payload > 1 {
                return None;
            }
            result |= payload << shift;
            if byte & 0x80 == 0 {
                return Some(result);
            }
            shift += 7;
        }
        None
    }

    /// Encodes an i64 as a ZigZag-encoded varint.
    pub fn encode_i64(v: i64, out: &mut Vec<u8>) {
        let zigzag = ((v << 1) ^ (v >> 63)) as u64;
        encode_u64(zigzag, out);
    }

    /// Decodes a ZigZag-encoded i64 varint, advancing `off`.
    pub fn decode_i64(src: &[u8], off: &mut usize) -> Option<i64> {
        let zigzag = decode_u64(src, off)?;
        Some(((zigzag >> 1) as i64) ^ (-((zigzag & 1) as i64)))
    }
}

pub mod buf {
    //! A slice-backed cursor that reports truncation instead of panicking.

    use core::fmt;

    use super::var;

    /// A cursor for reading bytes from a slice with offset tracking.
    pub struct Cursor<'a> {
        buf: &'a [u8],
        off: usize,
    }

    impl<'a> Cursor<'a> {
        /// Creates a new cursor starting at offset 0.
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf, off: 0 }
        }

        /// Takes the next `n` bytes, or `None` if fewer remain.
        pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
            let end = self.off.checked_add(n)?;
            let slice = self.buf.get(self.off..end)?;
            self.off = end;
            Some(slice)
        }

        /// Reads one byte.
        pub fn u8(&mut self) -> Option<u8> {
            self.take(1).map(|b| b[0])
        }

        /// Reads an unsigned varint.
        pub fn var_u64(&mut self) -> Option<u64> {
            var::decode_u64(self.buf, &mut self.off)
        }

        /// Reads a ZigZag varint.
        pub fn var_i64(&mut self) -> Option<i64> {
            var::decode_i64(self.buf, &mut self.off)
        }

        /// Returns the number of bytes remaining in the buffer.
        pub fn remaining(&self) -> usize {
            self.buf.len().saturating_sub(self.off)
        }
    }

    impl<'a> fmt::Debug for Cursor<'a> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Cursor")
                .field("off", &self.off)
                .field("remaining", &self.remaining())
                .finish()
        }
    }
}
