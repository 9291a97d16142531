//! Compact, schema-free binary serialization with per-type compiled codecs.
//!
//! `tinypack` turns values into a dense, non-self-describing byte encoding
//! and back, without an external schema or IDL step. Instead of inspecting
//! types at run time on every call, each type's codec is compiled exactly
//! once, as its [`Encode`]/[`Decode`] implementation, and reused for the
//! lifetime of the process. Run-time dispatch only remains where it is
//! unavoidable: polymorphic slots, whose concrete type is recovered through
//! a process-wide name [`register::Registry`].
//!
//! # Format highlights
//!
//! - Booleans (including every presence marker) are bit-packed eight per
//!   control byte, shared across the whole call.
//! - Integers use base-128 varints with a zigzag mapping for signed values,
//!   so small magnitudes stay small on the wire.
//! - Floats are byte-reversed before varint encoding, which makes "round"
//!   values compress to a few bytes.
//! - Strings, sequences and maps are length-prefixed; records and tuples
//!   are raw field concatenations with no framing at all.
//!
//! The format carries no version tags or type descriptors: both endpoints
//! must use identical types in identical order. It is a serialization
//! format, not an interchange format for independently evolving schemas.
//!
//! # Example
//!
//! ```ignore
//! use tinypack::{marshal, unmarshal, Decode, Encode};
//!
//! #[derive(Encode, Decode, Default, PartialEq, Debug)]
//! struct Player {
//!     name: String,
//!     score: u64,
//!     friends: Vec<String>,
//! }
//!
//! let player = Player {
//!     name: "ada".to_string(),
//!     score: 4200,
//!     friends: vec!["grace".to_string()],
//! };
//!
//! let bytes = marshal(&player)?;
//! let mut decoded = Player::default();
//! let consumed = unmarshal(&bytes, &mut decoded)?;
//! assert_eq!(consumed, bytes.len());
//! assert_eq!(decoded, player);
//! # std::io::Result::Ok(())
//! ```
//!
//! Multiple values encode as a tuple, and decode back in the same order:
//!
//! ```ignore
//! let bytes = marshal(&(1u8, "two".to_string()))?;
//! let mut dest = (0u8, String::new());
//! unmarshal(&bytes, &mut dest)?;
//! # std::io::Result::Ok(())
//! ```
//!
//! # Decoding contract
//!
//! Decoding writes into caller-supplied destinations and reuses their
//! storage where the shape allows (see [`Decode::decode_in_place`]). The
//! byte buffer is trusted to match the destination types: a mismatched or
//! truncated buffer produces garbage values or a panic, not a recoverable
//! error, because the format deliberately carries nothing that would make
//! the mismatch detectable.
//!
//! Cyclic values (for example an `Rc` loop) are unsupported: encoding one
//! recurses until resources are exhausted. Self-referential *types*, such
//! as a record containing an `Option<Box<Self>>`, are fine.

// Allow the derive macros to reference this crate as `tinypack` internally.
extern crate self as tinypack;

pub mod custom;
pub mod decode;
pub mod decoder;
pub mod encode;
pub mod encoder;
pub mod register;

pub use custom::{BinaryMarshal, ByteCodec, LegacyCodec};
pub use decode::Decode;
pub use decoder::Decoder;
pub use encode::Encode;
pub use encoder::Encoder;
pub use register::{register, register_as, type_name, Dynamic, Registry, TypeName};
// Re-export the derive macros.
pub use tinypack_derive::{Decode, Encode, TypeName};

use std::io;

/// Encodes a value (or a tuple of values, traversed in order) to a fresh
/// byte buffer.
///
/// # Errors
///
/// Returns an error if a user-supplied serialization hook fails.
pub fn marshal<T: Encode + ?Sized>(value: &T) -> io::Result<Vec<u8>> {
    let mut encoder = Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.finish())
}

/// Encodes a value, appending to `buf` at its current length, and returns
/// the extended buffer.
///
/// # Errors
///
/// Returns an error if a user-supplied serialization hook fails.
pub fn marshal_into<T: Encode + ?Sized>(buf: Vec<u8>, value: &T) -> io::Result<Vec<u8>> {
    let mut encoder = Encoder::append_to(buf);
    encoder.encode(value)?;
    Ok(encoder.finish())
}

/// Decodes `buf` into the destination (or tuple of destinations, filled in
/// order) and returns the number of bytes consumed.
///
/// Destinations are written in place, reusing existing storage where
/// possible; see [`Decode::decode_in_place`].
///
/// # Errors
///
/// Returns an error on invalid data or a failing user hook.
///
/// # Panics
///
/// Panics if `buf` is shorter than what the destination types expect; the
/// format cannot detect truncation.
pub fn unmarshal<T: Decode>(buf: &[u8], dest: &mut T) -> io::Result<usize> {
    let mut decoder = Decoder::new(buf);
    decoder.decode(dest)?;
    Ok(decoder.consumed())
}
