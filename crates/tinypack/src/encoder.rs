//! The write-side session and the primitive wire encoding rules.
//!
//! An [`Encoder`] owns the output buffer plus the boolean packing cursor for
//! one logical encoding call. All primitive `emit_*` methods append to the
//! buffer; none of them can fail. Fallibility only enters the picture at the
//! [`Encode`](crate::Encode) layer, where user-supplied serialization hooks
//! may report errors.
//!
//! # Wire rules
//!
//! - Booleans are packed eight to a control byte, least-significant bit
//!   first. The control byte is allocated lazily when the first boolean of a
//!   group of eight is written, and is shared across the whole top-level
//!   call rather than scoped to any one field.
//! - `u16`/`u32`/`u64`/`u128` use base-128 varints in little-endian group
//!   order. Every continuation byte carries seven payload bits and the high
//!   continuation bit; the final group of a maximum-width value stores its
//!   remaining bits uncompressed, bounding the encoded size at 3, 5, 9 and
//!   19 bytes respectively.
//! - Signed integers are zigzag-mapped to unsigned first, so small
//!   magnitudes of either sign stay short.
//! - `u8`/`i8` are written as one raw byte with no framing.
//! - Floats have their byte order reversed before varint encoding: "round"
//!   values whose low mantissa bytes are zero become small integers and
//!   compress well.
//! - Strings and length prefixes use a `u32` varint count.

use std::mem;

use crate::Encode;

/// Zigzag-maps a signed 16-bit integer to unsigned.
#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_i16(v: i16) -> u16 {
    ((v << 1) ^ (v >> 15)) as u16
}

/// Zigzag-maps a signed 32-bit integer to unsigned.
#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_i32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// Zigzag-maps a signed 64-bit integer to unsigned.
#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_i64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Zigzag-maps a signed 128-bit integer to unsigned.
#[inline]
#[allow(clippy::cast_sign_loss)]
const fn zigzag_i128(v: i128) -> u128 {
    ((v << 1) ^ (v >> 127)) as u128
}

/// The write-side session: a growable output buffer plus the per-call
/// boolean cursor.
///
/// An encoder can be reused across many calls; [`Encoder::encode`] resets
/// the boolean cursor at the start of every top-level call and
/// [`Encoder::finish`] hands the accumulated bytes back to the caller.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
    /// Index in `buf` of the control byte the next boolean is packed into.
    bool_pos: usize,
    /// Bit mask for the next boolean; `0` means a fresh control byte is
    /// needed.
    bool_bit: u8,
}

impl Encoder {
    /// Creates an encoder with an empty output buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::append_to(Vec::new())
    }

    /// Creates an encoder that appends to `buf` at its current length.
    ///
    /// The bytes already in `buf` are returned untouched by
    /// [`Encoder::finish`], ahead of everything encoded through this
    /// session.
    #[must_use]
    pub fn append_to(buf: Vec<u8>) -> Self {
        Self { buf, bool_pos: 0, bool_bit: 0 }
    }

    /// Encodes one value (or tuple of values) as a top-level call.
    ///
    /// The boolean cursor is reset on entry, so boolean packing groups never
    /// leak from one call into the next.
    ///
    /// # Errors
    ///
    /// Returns an error if a user-supplied serialization hook fails.
    pub fn encode<T: Encode + ?Sized>(&mut self, value: &T) -> std::io::Result<()> {
        self.bool_pos = 0;
        self.bool_bit = 0;
        value.encode(self)
    }

    /// Returns the accumulated bytes and resets the session.
    #[must_use]
    pub fn finish(&mut self) -> Vec<u8> {
        self.bool_pos = 0;
        self.bool_bit = 0;
        mem::take(&mut self.buf)
    }

    /// Number of bytes written so far, including any pre-existing prefix
    /// supplied to [`Encoder::append_to`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if no bytes have been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Emits one boolean into the shared packing byte.
    pub fn emit_bool(&mut self, v: bool) {
        if self.bool_bit == 0 {
            self.bool_pos = self.buf.len();
            self.buf.push(0);
            self.bool_bit = 1;
        }
        if v {
            self.buf[self.bool_pos] |= self.bool_bit;
        }
        self.bool_bit <<= 1;
    }

    /// Emits a single raw byte.
    pub fn emit_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Emits a 16-bit unsigned varint (at most 3 bytes).
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_u16(&mut self, mut v: u16) {
        for _ in 0..2 {
            if v < 0x80 {
                self.buf.push(v as u8);
                return;
            }
            self.buf.push(v as u8 | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    /// Emits a 32-bit unsigned varint (at most 5 bytes).
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_u32(&mut self, mut v: u32) {
        for _ in 0..4 {
            if v < 0x80 {
                self.buf.push(v as u8);
                return;
            }
            self.buf.push(v as u8 | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    /// Emits a 64-bit unsigned varint (at most 9 bytes).
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_u64(&mut self, mut v: u64) {
        for _ in 0..8 {
            if v < 0x80 {
                self.buf.push(v as u8);
                return;
            }
            self.buf.push(v as u8 | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    /// Emits a 128-bit unsigned varint (at most 19 bytes).
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_u128(&mut self, mut v: u128) {
        for _ in 0..18 {
            if v < 0x80 {
                self.buf.push(v as u8);
                return;
            }
            self.buf.push(v as u8 | 0x80);
            v >>= 7;
        }
        self.buf.push(v as u8);
    }

    /// Emits a platform-sized unsigned integer as its 64-bit form.
    pub fn emit_usize(&mut self, v: usize) {
        self.emit_u64(v as u64);
    }

    /// Emits a single raw signed byte.
    #[allow(clippy::cast_sign_loss)]
    pub fn emit_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    /// Emits a zigzag-mapped 16-bit signed varint.
    pub fn emit_i16(&mut self, v: i16) {
        self.emit_u16(zigzag_i16(v));
    }

    /// Emits a zigzag-mapped 32-bit signed varint.
    pub fn emit_i32(&mut self, v: i32) {
        self.emit_u32(zigzag_i32(v));
    }

    /// Emits a zigzag-mapped 64-bit signed varint.
    pub fn emit_i64(&mut self, v: i64) {
        self.emit_u64(zigzag_i64(v));
    }

    /// Emits a zigzag-mapped 128-bit signed varint.
    pub fn emit_i128(&mut self, v: i128) {
        self.emit_u128(zigzag_i128(v));
    }

    /// Emits a platform-sized signed integer as its 64-bit form.
    pub fn emit_isize(&mut self, v: isize) {
        self.emit_i64(v as i64);
    }

    /// Emits a 32-bit float: the bit pattern is byte-reversed, then written
    /// as an unsigned varint.
    pub fn emit_f32(&mut self, v: f32) {
        self.emit_u32(v.to_bits().swap_bytes());
    }

    /// Emits a 64-bit float: the bit pattern is byte-reversed, then written
    /// as an unsigned varint.
    pub fn emit_f64(&mut self, v: f64) {
        self.emit_u64(v.to_bits().swap_bytes());
    }

    /// Emits a length or element-count prefix.
    ///
    /// Counts travel as 32-bit varints; lengths above `u32::MAX` are not
    /// representable in the format.
    #[allow(clippy::cast_possible_truncation)]
    pub fn emit_len(&mut self, len: usize) {
        debug_assert!(len <= u32::MAX as usize, "length exceeds wire format limit");
        self.emit_u32(len as u32);
    }

    /// Emits a length-prefixed UTF-8 string.
    pub fn emit_str(&mut self, v: &str) {
        self.emit_len(v.len());
        self.emit_raw_bytes(v.as_bytes());
    }

    /// Appends raw bytes with no framing.
    pub fn emit_raw_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Hands the output buffer to `f`, which must return it extended with
    /// its own bytes.
    ///
    /// This is the entry point for self-serializing types that own their
    /// byte layout (see [`crate::custom::ByteCodec`]). The callback must
    /// only append; existing bytes back the boolean cursor and must not
    /// move.
    pub fn append_with(&mut self, f: impl FnOnce(Vec<u8>) -> Vec<u8>) {
        let buf = mem::take(&mut self.buf);
        self.buf = f(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(f: impl FnOnce(&mut Encoder)) -> Vec<u8> {
        let mut encoder = Encoder::new();
        f(&mut encoder);
        encoder.finish()
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(bytes_of(|e| e.emit_u64(0)).len(), 1);
        assert_eq!(bytes_of(|e| e.emit_u64(127)).len(), 1);
        assert_eq!(bytes_of(|e| e.emit_u64(128)).len(), 2);
        assert_eq!(bytes_of(|e| e.emit_u64(16383)).len(), 2);
        assert_eq!(bytes_of(|e| e.emit_u64(16384)).len(), 3);
        assert_eq!(bytes_of(|e| e.emit_u64(1 << 56)).len(), 9);
        assert_eq!(bytes_of(|e| e.emit_u64(u64::MAX)).len(), 9);
    }

    #[test]
    fn varint_small_values_are_identity() {
        assert_eq!(bytes_of(|e| e.emit_u64(0)), [0]);
        assert_eq!(bytes_of(|e| e.emit_u64(1)), [1]);
        assert_eq!(bytes_of(|e| e.emit_u64(127)), [127]);
        assert_eq!(bytes_of(|e| e.emit_u64(128)), [0x80, 0x01]);
    }

    #[test]
    fn varint_width_bounds() {
        assert_eq!(bytes_of(|e| e.emit_u16(u16::MAX)).len(), 3);
        assert_eq!(bytes_of(|e| e.emit_u32(u32::MAX)).len(), 5);
        assert_eq!(bytes_of(|e| e.emit_u128(u128::MAX)).len(), 19);
    }

    #[test]
    fn zigzag_mapping() {
        assert_eq!(bytes_of(|e| e.emit_i64(0)), [0]);
        assert_eq!(bytes_of(|e| e.emit_i64(-1)), [1]);
        assert_eq!(bytes_of(|e| e.emit_i64(1)), [2]);
        assert_eq!(bytes_of(|e| e.emit_i64(-2)), [3]);
        assert_eq!(bytes_of(|e| e.emit_i64(2)), [4]);
    }

    #[test]
    fn nine_bools_use_two_control_bytes() {
        let values = [true, false, true, false, true, false, true, false, true];
        let bytes = bytes_of(|e| {
            for v in values {
                e.emit_bool(v);
            }
        });
        assert_eq!(bytes, [0b0101_0101, 0b0000_0001]);
    }

    #[test]
    fn bools_share_control_byte_across_other_fields() {
        let bytes = bytes_of(|e| {
            e.emit_bool(true);
            e.emit_u8(7);
            e.emit_bool(true);
        });
        // Both booleans land in the control byte allocated before the 7.
        assert_eq!(bytes, [0b0000_0011, 7]);
    }

    #[test]
    fn round_floats_compress() {
        assert_eq!(bytes_of(|e| e.emit_f64(0.0)).len(), 1);
        assert_eq!(bytes_of(|e| e.emit_f64(1.0)).len(), 3);
        assert_eq!(bytes_of(|e| e.emit_f32(1.0)).len(), 3);
    }

    #[test]
    fn append_to_preserves_prefix() {
        let mut encoder = Encoder::append_to(vec![0xAA, 0xBB]);
        encoder.emit_u8(0xCC);
        assert_eq!(encoder.finish(), [0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn encode_resets_bool_cursor_between_calls() {
        let mut encoder = Encoder::new();
        encoder.encode(&true).unwrap();
        encoder.encode(&true).unwrap();
        // Two top-level calls never share a control byte.
        assert_eq!(encoder.finish(), [1, 1]);
    }
}
