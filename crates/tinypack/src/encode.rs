//! The [`Encode`] trait and its implementations for built-in types.
//!
//! Every implementation of [`Encode`] is one compiled write engine: it is
//! specialized to exactly one type, built once by the compiler, and reused
//! for the lifetime of the process. Composite implementations delegate to
//! the engines of their component types, so a value traversal bottoms out in
//! the primitive rules of [`Encoder`].

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hash::BuildHasher,
    io,
    marker::PhantomData,
    num::Wrapping,
    rc::Rc,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use num_complex::Complex;

use crate::Encoder;

/// A trait for types that can be written to the wire format.
///
/// Implementations are normally produced by `#[derive(Encode)]` for record
/// and enum types, or by
/// [`delegate_serialization!`](crate::delegate_serialization) for types that
/// carry their own serialization. Manual implementations compose the
/// engines of their parts:
///
/// ```ignore
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Encode for Point {
///     fn encode(&self, encoder: &mut Encoder) -> std::io::Result<()> {
///         self.x.encode(encoder)?;
///         self.y.encode(encoder)?;
///         Ok(())
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be encoded",
    note = "derive `tinypack::Encode` for record and enum types, or use \
            `delegate_serialization!` for self-serializing types",
    note = "function pointers, raw pointers and synchronization primitives \
            are intentionally not encodable"
)]
pub trait Encode {
    /// Appends this value's wire representation to the encoder.
    ///
    /// # Errors
    ///
    /// Returns an error if a user-supplied serialization hook fails.
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()>;
}

// =============================================================================
// Implementations for primitive types
// =============================================================================

macro_rules! impl_encode_primitive {
    ($($ty:ty => $emit:ident),+ $(,)?) => {$(
        impl Encode for $ty {
            fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
                encoder.$emit(*self);
                Ok(())
            }
        }
    )+};
}

impl_encode_primitive!(
    bool => emit_bool,
    u8 => emit_u8,
    u16 => emit_u16,
    u32 => emit_u32,
    u64 => emit_u64,
    u128 => emit_u128,
    usize => emit_usize,
    i8 => emit_i8,
    i16 => emit_i16,
    i32 => emit_i32,
    i64 => emit_i64,
    i128 => emit_i128,
    isize => emit_isize,
    f32 => emit_f32,
    f64 => emit_f64,
);

impl Encode for char {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_u32(*self as u32);
        Ok(())
    }
}

impl Encode for str {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_str(self);
        Ok(())
    }
}

impl Encode for String {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_str(self);
        Ok(())
    }
}

impl Encode for () {
    fn encode(&self, _encoder: &mut Encoder) -> io::Result<()> {
        Ok(())
    }
}

impl<T: ?Sized> Encode for PhantomData<T> {
    fn encode(&self, _encoder: &mut Encoder) -> io::Result<()> {
        Ok(())
    }
}

/// Complex components are written as raw bit patterns; the byte-reversal
/// transform used for plain floats is not applied to them.
impl Encode for Complex<f32> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        let bits = u64::from(self.re.to_bits()) | u64::from(self.im.to_bits()) << 32;
        encoder.emit_u64(bits);
        Ok(())
    }
}

/// Complex components are written as raw bit patterns; the byte-reversal
/// transform used for plain floats is not applied to them.
impl Encode for Complex<f64> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_u64(self.re.to_bits());
        encoder.emit_u64(self.im.to_bits());
        Ok(())
    }
}

/// Timestamps travel as nanoseconds since the Unix epoch, the signed
/// nanosecond count bit-cast to unsigned.
impl Encode for SystemTime {
    #[allow(clippy::cast_sign_loss)]
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        let out_of_range =
            || io::Error::new(io::ErrorKind::InvalidData, "timestamp out of range");
        let nanos = match self.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_nanos()).map_err(|_| out_of_range())?,
            Err(e) => i64::try_from(e.duration().as_nanos())
                .map_err(|_| out_of_range())?
                .checked_neg()
                .ok_or_else(out_of_range)?,
        };
        encoder.emit_u64(nanos as u64);
        Ok(())
    }
}

impl Encode for Duration {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_u64(self.as_secs());
        encoder.emit_u32(self.subsec_nanos());
        Ok(())
    }
}

// =============================================================================
// Implementations for references and smart pointers
// =============================================================================

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for &mut T {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for Rc<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ?Sized> Encode for Arc<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        (**self).encode(encoder)
    }
}

impl<T: Encode + ToOwned + ?Sized> Encode for Cow<'_, T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        (**self).encode(encoder)
    }
}

// =============================================================================
// Implementations for Option and Result
// =============================================================================

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        match self {
            Some(v) => {
                encoder.emit_bool(true);
                v.encode(encoder)
            }
            None => {
                encoder.emit_bool(false);
                Ok(())
            }
        }
    }
}

impl<T: Encode, E: Encode> Encode for Result<T, E> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        match self {
            Ok(v) => {
                encoder.emit_bool(true);
                v.encode(encoder)
            }
            Err(e) => {
                encoder.emit_bool(false);
                e.encode(encoder)
            }
        }
    }
}

// =============================================================================
// Implementations for sequences and collections
// =============================================================================

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        for item in self {
            item.encode(encoder)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_bool(true);
        encoder.emit_len(self.len());
        for item in self {
            item.encode(encoder)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        self.as_slice().encode(encoder)
    }
}

impl<K: Encode, V: Encode, S: BuildHasher> Encode for HashMap<K, V, S> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_bool(true);
        encoder.emit_len(self.len());
        for (key, value) in self {
            key.encode(encoder)?;
            value.encode(encoder)?;
        }
        Ok(())
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_bool(true);
        encoder.emit_len(self.len());
        for (key, value) in self {
            key.encode(encoder)?;
            value.encode(encoder)?;
        }
        Ok(())
    }
}

impl<T: Encode, S: BuildHasher> Encode for HashSet<T, S> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_bool(true);
        encoder.emit_len(self.len());
        for item in self {
            item.encode(encoder)?;
        }
        Ok(())
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        encoder.emit_bool(true);
        encoder.emit_len(self.len());
        for item in self {
            item.encode(encoder)?;
        }
        Ok(())
    }
}

// =============================================================================
// Implementations for tuples
// =============================================================================

macro_rules! impl_encode_tuple {
    ($($name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
                let ($($name,)+) = self;
                $(
                    $name.encode(encoder)?;
                )+
                Ok(())
            }
        }
    };
}

impl_encode_tuple!(A);
impl_encode_tuple!(A, B);
impl_encode_tuple!(A, B, C);
impl_encode_tuple!(A, B, C, D);
impl_encode_tuple!(A, B, C, D, E);
impl_encode_tuple!(A, B, C, D, E, F);
impl_encode_tuple!(A, B, C, D, E, F, G);
impl_encode_tuple!(A, B, C, D, E, F, G, H);
impl_encode_tuple!(A, B, C, D, E, F, G, H, I);
impl_encode_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_encode_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_encode_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

// =============================================================================
// Implementations for wrapper types
// =============================================================================

impl<T: Encode> Encode for Wrapping<T> {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        self.0.encode(encoder)
    }
}

macro_rules! impl_encode_nonzero {
    ($($ty:ty),+ $(,)?) => {$(
        impl Encode for $ty {
            fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
                self.get().encode(encoder)
            }
        }
    )+};
}

impl_encode_nonzero!(
    std::num::NonZeroU8,
    std::num::NonZeroU16,
    std::num::NonZeroU32,
    std::num::NonZeroU64,
    std::num::NonZeroU128,
    std::num::NonZeroUsize,
    std::num::NonZeroI8,
    std::num::NonZeroI16,
    std::num::NonZeroI32,
    std::num::NonZeroI64,
    std::num::NonZeroI128,
    std::num::NonZeroIsize,
);
