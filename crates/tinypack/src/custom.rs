//! Self-serialization contracts that bypass structural traversal.
//!
//! A type that owns its byte layout can expose one of three contracts, and
//! [`delegate_serialization!`](crate::delegate_serialization) will generate
//! [`Encode`](crate::Encode), [`Decode`](crate::Decode) and
//! [`TypeName`](crate::TypeName) implementations that delegate to it. The
//! contracts are checked at compile time in fixed priority order, stopping
//! at the first match:
//!
//! 1. [`ByteCodec`], the bespoke contract: the type appends its own bytes
//!    and consumes its own prefix, with no framing added.
//! 2. [`BinaryMarshal`]: a marshal/unmarshal pair producing an opaque
//!    blob, written with a length prefix.
//! 3. [`LegacyCodec`]: an older encode/decode convention with the same
//!    length-prefixed blob shape.
//!
//! Whichever contract is selected fully replaces structural traversal for
//! the type: nothing looks inside it, and nested fields are whatever bytes
//! the contract produced. A failing contract method during an actual call
//! is surfaced to the caller as an error and never retried.
//!
//! The priority selection uses method-resolution tiering: the probe value
//! below offers the same method at three receiver depths, and the compiler
//! picks the shallowest one whose bound is satisfied. A type implementing
//! several contracts therefore deterministically serializes through the
//! highest-priority one.

use std::{io, marker::PhantomData};

use crate::{Decoder, Encoder};

/// The bespoke self-serialization contract (highest priority).
///
/// `encode_append` receives the output buffer, appends this value's bytes,
/// and returns the extended buffer; it must not modify the bytes already
/// present. `decode_prefix` consumes a prefix of `buf` and returns how many
/// bytes it used.
pub trait ByteCodec {
    /// Appends this value's serialized bytes to `buf` and returns it.
    fn encode_append(&self, buf: Vec<u8>) -> Vec<u8>;

    /// Decodes this value from a prefix of `buf`, returning the number of
    /// bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix cannot be decoded.
    fn decode_prefix(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// The generic binary marshal contract (second priority).
///
/// The produced blob is written to the wire with a length prefix, and the
/// exact blob is handed back on decode.
pub trait BinaryMarshal {
    /// Serializes this value to an opaque byte blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be marshaled.
    fn marshal_binary(&self) -> io::Result<Vec<u8>>;

    /// Reconstructs this value from a blob produced by
    /// [`BinaryMarshal::marshal_binary`].
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is invalid.
    fn unmarshal_binary(&mut self, data: &[u8]) -> io::Result<()>;
}

/// The legacy encode/decode convention (lowest priority).
///
/// Same length-prefixed blob shape as [`BinaryMarshal`]; kept as a separate
/// contract so types written against the older convention keep working
/// without an adapter.
pub trait LegacyCodec {
    /// Serializes this value to an opaque byte blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn legacy_encode(&self) -> io::Result<Vec<u8>>;

    /// Reconstructs this value from a blob produced by
    /// [`LegacyCodec::legacy_encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the blob is invalid.
    fn legacy_decode(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Zero-sized probe that [`delegate_serialization!`] dispatches through.
///
/// Method resolution tries `Select<T>`, then `&Select<T>`, then
/// `&mut Select<T>`, which is exactly the contract priority order.
pub struct Select<T: ?Sized>(pub PhantomData<T>);

/// Tier 1: encode through [`ByteCodec`].
pub trait EncodeViaBytes<T: ?Sized> {
    /// Appends `value`'s bytes to the encoder.
    ///
    /// # Errors
    ///
    /// Propagates contract failures.
    fn run_encode(self, value: &T, encoder: &mut Encoder) -> io::Result<()>;
}

impl<T: ByteCodec + ?Sized> EncodeViaBytes<T> for Select<T> {
    fn run_encode(self, value: &T, encoder: &mut Encoder) -> io::Result<()> {
        encoder.append_with(|buf| value.encode_append(buf));
        Ok(())
    }
}

/// Tier 2: encode through [`BinaryMarshal`].
pub trait EncodeViaMarshal<T: ?Sized> {
    /// Appends `value`'s length-prefixed blob to the encoder.
    ///
    /// # Errors
    ///
    /// Propagates contract failures.
    fn run_encode(self, value: &T, encoder: &mut Encoder) -> io::Result<()>;
}

impl<T: BinaryMarshal + ?Sized> EncodeViaMarshal<T> for &Select<T> {
    fn run_encode(self, value: &T, encoder: &mut Encoder) -> io::Result<()> {
        let blob = value.marshal_binary()?;
        encoder.emit_len(blob.len());
        encoder.emit_raw_bytes(&blob);
        Ok(())
    }
}

/// Tier 3: encode through [`LegacyCodec`].
pub trait EncodeViaLegacy<T: ?Sized> {
    /// Appends `value`'s length-prefixed blob to the encoder.
    ///
    /// # Errors
    ///
    /// Propagates contract failures.
    fn run_encode(self, value: &T, encoder: &mut Encoder) -> io::Result<()>;
}

impl<T: LegacyCodec + ?Sized> EncodeViaLegacy<T> for &mut Select<T> {
    fn run_encode(self, value: &T, encoder: &mut Encoder) -> io::Result<()> {
        let blob = value.legacy_encode()?;
        encoder.emit_len(blob.len());
        encoder.emit_raw_bytes(&blob);
        Ok(())
    }
}

/// Tier 1: decode through [`ByteCodec`].
pub trait DecodeViaBytes<T: ?Sized> {
    /// Decodes a prefix of the remaining input into `dest`.
    ///
    /// # Errors
    ///
    /// Propagates contract failures.
    fn run_decode(self, dest: &mut T, decoder: &mut Decoder<'_>) -> io::Result<()>;
}

impl<T: ByteCodec + ?Sized> DecodeViaBytes<T> for Select<T> {
    fn run_decode(self, dest: &mut T, decoder: &mut Decoder<'_>) -> io::Result<()> {
        let used = dest.decode_prefix(decoder.remaining())?;
        decoder.advance(used);
        Ok(())
    }
}

/// Tier 2: decode through [`BinaryMarshal`].
pub trait DecodeViaMarshal<T: ?Sized> {
    /// Decodes a length-prefixed blob into `dest`.
    ///
    /// # Errors
    ///
    /// Propagates contract failures.
    fn run_decode(self, dest: &mut T, decoder: &mut Decoder<'_>) -> io::Result<()>;
}

impl<T: BinaryMarshal + ?Sized> DecodeViaMarshal<T> for &Select<T> {
    fn run_decode(self, dest: &mut T, decoder: &mut Decoder<'_>) -> io::Result<()> {
        let len = decoder.read_len();
        let data = decoder.read_raw_bytes(len);
        dest.unmarshal_binary(data)
    }
}

/// Tier 3: decode through [`LegacyCodec`].
pub trait DecodeViaLegacy<T: ?Sized> {
    /// Decodes a length-prefixed blob into `dest`.
    ///
    /// # Errors
    ///
    /// Propagates contract failures.
    fn run_decode(self, dest: &mut T, decoder: &mut Decoder<'_>) -> io::Result<()>;
}

impl<T: LegacyCodec + ?Sized> DecodeViaLegacy<T> for &mut Select<T> {
    fn run_decode(self, dest: &mut T, decoder: &mut Decoder<'_>) -> io::Result<()> {
        let len = decoder.read_len();
        let data = decoder.read_raw_bytes(len);
        dest.legacy_decode(data)
    }
}

/// Generates `Encode`, `Decode` and `TypeName` implementations for a type
/// that exposes one of the self-serialization contracts.
///
/// The contract is selected at compile time, in priority order:
/// [`ByteCodec`], then [`BinaryMarshal`], then [`LegacyCodec`]. Decoding
/// constructs the destination with `Default` before filling it, so the type
/// must also implement `Default`.
///
/// ```ignore
/// struct Blob(Vec<u8>);
///
/// impl tinypack::BinaryMarshal for Blob {
///     fn marshal_binary(&self) -> std::io::Result<Vec<u8>> {
///         Ok(self.0.clone())
///     }
///     fn unmarshal_binary(&mut self, data: &[u8]) -> std::io::Result<()> {
///         self.0 = data.to_vec();
///         Ok(())
///     }
/// }
///
/// tinypack::delegate_serialization!(Blob);
/// ```
#[macro_export]
macro_rules! delegate_serialization {
    ($ty:ident) => {
        impl $crate::Encode for $ty {
            fn encode(
                &self,
                encoder: &mut $crate::Encoder,
            ) -> ::std::io::Result<()> {
                #[allow(unused_imports)]
                use $crate::custom::{
                    EncodeViaBytes as _, EncodeViaLegacy as _,
                    EncodeViaMarshal as _,
                };
                $crate::custom::Select::<Self>(::core::marker::PhantomData)
                    .run_encode(self, encoder)
            }
        }

        impl $crate::Decode for $ty {
            fn decode(
                decoder: &mut $crate::Decoder<'_>,
            ) -> ::std::io::Result<Self> {
                let mut value = <$ty as ::core::default::Default>::default();
                $crate::Decode::decode_in_place(&mut value, decoder)?;
                ::std::io::Result::Ok(value)
            }

            fn decode_in_place(
                &mut self,
                decoder: &mut $crate::Decoder<'_>,
            ) -> ::std::io::Result<()> {
                #[allow(unused_imports)]
                use $crate::custom::{
                    DecodeViaBytes as _, DecodeViaLegacy as _,
                    DecodeViaMarshal as _,
                };
                $crate::custom::Select::<Self>(::core::marker::PhantomData)
                    .run_decode(self, decoder)
            }
        }

        impl $crate::TypeName for $ty {
            fn append_name(out: &mut ::std::string::String) {
                out.push_str(::core::module_path!());
                out.push_str("::");
                out.push_str(::core::stringify!($ty));
            }
        }
    };
}
