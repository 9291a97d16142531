//! The [`Decode`] trait and its implementations for built-in types.
//!
//! Decoding comes in two forms. [`Decode::decode`] constructs a fresh value
//! from the wire bytes. [`Decode::decode_in_place`] writes into an existing
//! destination and is the form the session entry points use: it carries the
//! storage-reuse contracts of the format, where decoding into an already
//! populated destination reuses its allocations instead of replacing them.
//!
//! The reuse contracts, per shape:
//!
//! - `Option<T>`: an absent marker clears the slot; a present marker decodes
//!   into the existing payload when there is one and allocates only when the
//!   slot is empty.
//! - `Vec<T>`: an absent marker leaves an empty vector; otherwise existing
//!   elements are decoded into in place and only the tail beyond the current
//!   length is newly constructed. Backing capacity is reused when
//!   sufficient; growth reserves exactly the decoded count.
//! - Maps and sets are cleared and refilled entry by entry; each decoded
//!   key/value is moved into the collection, so entries never alias.
//! - `String` reuses its buffer via clear-and-append.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    hash::{BuildHasher, Hash},
    io,
    marker::PhantomData,
    num::Wrapping,
    rc::Rc,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use num_complex::Complex;

use crate::Decoder;

/// A trait for types that can be read back from the wire format.
///
/// Implementations are normally produced by `#[derive(Decode)]` or
/// [`delegate_serialization!`](crate::delegate_serialization); the derive
/// also generates a fieldwise [`Decode::decode_in_place`] for record types
/// so that storage reuse propagates through nested destinations.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be decoded",
    note = "derive `tinypack::Decode` for record and enum types, or use \
            `delegate_serialization!` for self-serializing types"
)]
pub trait Decode: Sized {
    /// Constructs a value from the decoder's input.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid data or a failing user hook.
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self>;

    /// Decodes into an existing destination, reusing its storage where the
    /// shape allows it.
    ///
    /// The default implementation replaces the destination wholesale;
    /// containers override it with their reuse rules.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid data or a failing user hook.
    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        *self = Self::decode(decoder)?;
        Ok(())
    }
}

// =============================================================================
// Implementations for primitive types
// =============================================================================

macro_rules! impl_decode_primitive {
    ($($ty:ty => $read:ident),+ $(,)?) => {$(
        impl Decode for $ty {
            fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
                Ok(decoder.$read())
            }
        }
    )+};
}

impl_decode_primitive!(
    bool => read_bool,
    u8 => read_u8,
    u16 => read_u16,
    u32 => read_u32,
    u64 => read_u64,
    u128 => read_u128,
    usize => read_usize,
    i8 => read_i8,
    i16 => read_i16,
    i32 => read_i32,
    i64 => read_i64,
    i128 => read_i128,
    isize => read_isize,
    f32 => read_f32,
    f64 => read_f64,
);

impl Decode for char {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let code = decoder.read_u32();
        char::from_u32(code).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid Unicode scalar value: {code}"),
            )
        })
    }
}

impl Decode for String {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut s = String::new();
        s.decode_in_place(decoder)?;
        Ok(s)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        let len = decoder.read_len();
        let bytes = decoder.read_raw_bytes(len);
        let s = std::str::from_utf8(bytes).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {e}"))
        })?;
        self.clear();
        self.push_str(s);
        Ok(())
    }
}

impl Decode for () {
    fn decode(_decoder: &mut Decoder<'_>) -> io::Result<Self> {
        Ok(())
    }
}

impl<T: ?Sized> Decode for PhantomData<T> {
    fn decode(_decoder: &mut Decoder<'_>) -> io::Result<Self> {
        Ok(PhantomData)
    }
}

impl Decode for Complex<f32> {
    #[allow(clippy::cast_possible_truncation)]
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let bits = decoder.read_u64();
        Ok(Complex::new(
            f32::from_bits(bits as u32),
            f32::from_bits((bits >> 32) as u32),
        ))
    }
}

impl Decode for Complex<f64> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let re = f64::from_bits(decoder.read_u64());
        let im = f64::from_bits(decoder.read_u64());
        Ok(Complex::new(re, im))
    }
}

impl Decode for SystemTime {
    #[allow(clippy::cast_possible_wrap)]
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let nanos = decoder.read_u64() as i64;
        let t = if nanos >= 0 {
            UNIX_EPOCH + Duration::from_nanos(nanos.unsigned_abs())
        } else {
            UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
        };
        Ok(t)
    }
}

impl Decode for Duration {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let secs = decoder.read_u64();
        let nanos = decoder.read_u32();
        if nanos >= 1_000_000_000 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid subsecond nanoseconds: {nanos}"),
            ));
        }
        Ok(Duration::new(secs, nanos))
    }
}

// =============================================================================
// Implementations for smart pointers
// =============================================================================

impl<T: Decode> Decode for Box<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        Ok(Box::new(T::decode(decoder)?))
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        (**self).decode_in_place(decoder)
    }
}

impl<T: Decode> Decode for Rc<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        Ok(Rc::new(T::decode(decoder)?))
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        match Rc::get_mut(self) {
            Some(v) => v.decode_in_place(decoder),
            None => {
                *self = Rc::new(T::decode(decoder)?);
                Ok(())
            }
        }
    }
}

impl<T: Decode> Decode for Arc<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        Ok(Arc::new(T::decode(decoder)?))
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        match Arc::get_mut(self) {
            Some(v) => v.decode_in_place(decoder),
            None => {
                *self = Arc::new(T::decode(decoder)?);
                Ok(())
            }
        }
    }
}

// =============================================================================
// Implementations for Option and Result
// =============================================================================

impl<T: Decode> Decode for Option<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        if decoder.read_bool() {
            Ok(Some(T::decode(decoder)?))
        } else {
            Ok(None)
        }
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        if decoder.read_bool() {
            match self {
                Some(v) => v.decode_in_place(decoder),
                None => {
                    *self = Some(T::decode(decoder)?);
                    Ok(())
                }
            }
        } else {
            *self = None;
            Ok(())
        }
    }
}

impl<T: Decode, E: Decode> Decode for Result<T, E> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        if decoder.read_bool() {
            Ok(Ok(T::decode(decoder)?))
        } else {
            Ok(Err(E::decode(decoder)?))
        }
    }
}

// =============================================================================
// Implementations for sequences and collections
// =============================================================================

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode(decoder)?);
        }
        match items.try_into() {
            Ok(array) => Ok(array),
            Err(_) => unreachable!("array length is fixed at compile time"),
        }
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        for slot in self.iter_mut() {
            slot.decode_in_place(decoder)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut v = Vec::new();
        v.decode_in_place(decoder)?;
        Ok(v)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        if !decoder.read_bool() {
            self.clear();
            return Ok(());
        }
        let count = decoder.read_len();
        self.truncate(count);
        for slot in self.iter_mut() {
            slot.decode_in_place(decoder)?;
        }
        self.reserve_exact(count - self.len());
        while self.len() < count {
            self.push(T::decode(decoder)?);
        }
        Ok(())
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Decode + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut m = Self::default();
        m.decode_in_place(decoder)?;
        Ok(m)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        self.clear();
        if !decoder.read_bool() {
            return Ok(());
        }
        let count = decoder.read_len();
        self.reserve(count);
        for _ in 0..count {
            let key = K::decode(decoder)?;
            let value = V::decode(decoder)?;
            self.insert(key, value);
        }
        Ok(())
    }
}

impl<K: Decode + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut m = Self::new();
        m.decode_in_place(decoder)?;
        Ok(m)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        self.clear();
        if !decoder.read_bool() {
            return Ok(());
        }
        let count = decoder.read_len();
        for _ in 0..count {
            let key = K::decode(decoder)?;
            let value = V::decode(decoder)?;
            self.insert(key, value);
        }
        Ok(())
    }
}

impl<T, S> Decode for HashSet<T, S>
where
    T: Decode + Eq + Hash,
    S: BuildHasher + Default,
{
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut s = Self::default();
        s.decode_in_place(decoder)?;
        Ok(s)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        self.clear();
        if !decoder.read_bool() {
            return Ok(());
        }
        let count = decoder.read_len();
        self.reserve(count);
        for _ in 0..count {
            self.insert(T::decode(decoder)?);
        }
        Ok(())
    }
}

impl<T: Decode + Ord> Decode for BTreeSet<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let mut s = Self::new();
        s.decode_in_place(decoder)?;
        Ok(s)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        self.clear();
        if !decoder.read_bool() {
            return Ok(());
        }
        let count = decoder.read_len();
        for _ in 0..count {
            self.insert(T::decode(decoder)?);
        }
        Ok(())
    }
}

// =============================================================================
// Implementations for tuples
// =============================================================================

macro_rules! impl_decode_tuple {
    ($($name:ident),+) => {
        impl<$($name: Decode),+> Decode for ($($name,)+) {
            fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
                Ok(($($name::decode(decoder)?,)+))
            }

            #[allow(non_snake_case)]
            fn decode_in_place(
                &mut self,
                decoder: &mut Decoder<'_>,
            ) -> io::Result<()> {
                let ($($name,)+) = self;
                $(
                    $name.decode_in_place(decoder)?;
                )+
                Ok(())
            }
        }
    };
}

impl_decode_tuple!(A);
impl_decode_tuple!(A, B);
impl_decode_tuple!(A, B, C);
impl_decode_tuple!(A, B, C, D);
impl_decode_tuple!(A, B, C, D, E);
impl_decode_tuple!(A, B, C, D, E, F);
impl_decode_tuple!(A, B, C, D, E, F, G);
impl_decode_tuple!(A, B, C, D, E, F, G, H);
impl_decode_tuple!(A, B, C, D, E, F, G, H, I);
impl_decode_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_decode_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_decode_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

// =============================================================================
// Implementations for wrapper types
// =============================================================================

impl<T: Decode> Decode for Wrapping<T> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        Ok(Wrapping(T::decode(decoder)?))
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        self.0.decode_in_place(decoder)
    }
}

macro_rules! impl_decode_nonzero {
    ($($ty:ty => $inner:ty),+ $(,)?) => {$(
        impl Decode for $ty {
            fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
                let value = <$inner>::decode(decoder)?;
                <$ty>::new(value).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        "zero value for non-zero integer type",
                    )
                })
            }
        }
    )+};
}

impl_decode_nonzero!(
    std::num::NonZeroU8 => u8,
    std::num::NonZeroU16 => u16,
    std::num::NonZeroU32 => u32,
    std::num::NonZeroU64 => u64,
    std::num::NonZeroU128 => u128,
    std::num::NonZeroUsize => usize,
    std::num::NonZeroI8 => i8,
    std::num::NonZeroI16 => i16,
    std::num::NonZeroI32 => i32,
    std::num::NonZeroI64 => i64,
    std::num::NonZeroI128 => i128,
    std::num::NonZeroIsize => isize,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{marshal, unmarshal};

    fn roundtrip<T>(value: &T)
    where
        T: crate::Encode + Decode + PartialEq + std::fmt::Debug,
    {
        let bytes = marshal(value).unwrap();
        let mut decoder = Decoder::new(&bytes);
        let decoded: T = decoder.decode_value().unwrap();
        assert_eq!(&decoded, value);
        assert_eq!(decoder.consumed(), bytes.len());
    }

    #[test]
    fn primitive_roundtrips() {
        roundtrip(&true);
        roundtrip(&0xABu8);
        roundtrip(&-1i8);
        roundtrip(&u16::MAX);
        roundtrip(&i16::MIN);
        roundtrip(&0xDEAD_BEEFu32);
        roundtrip(&-123_456_789i32);
        roundtrip(&u64::MAX);
        roundtrip(&i64::MIN);
        roundtrip(&(1u128 << 100));
        roundtrip(&(-1i128 << 100));
        roundtrip(&usize::MAX);
        roundtrip(&isize::MIN);
        roundtrip(&3.5f32);
        roundtrip(&std::f64::consts::PI);
        roundtrip(&'é');
        roundtrip(&'\u{1F980}');
        roundtrip(&());
    }

    #[test]
    fn string_roundtrips() {
        roundtrip(&String::new());
        roundtrip(&"Hello, World!".to_string());
        roundtrip(&"snowman: ☃, crab: 🦀".to_string());
    }

    #[test]
    fn container_roundtrips() {
        roundtrip(&Vec::<u32>::new());
        roundtrip(&vec![1u32, 2, 3]);
        roundtrip(&vec![vec![1i64, -2], vec![], vec![3]]);
        roundtrip(&Some(42u8));
        roundtrip(&None::<String>);
        roundtrip(&Some(Box::new("boxed".to_string())));
        roundtrip(&[1u16, 2, 3]);
        roundtrip(&(7u8, "x".to_string(), vec![true, false]));
        roundtrip(&Ok::<u32, String>(5));
        roundtrip(&Err::<u32, String>("nope".to_string()));

        let mut map = HashMap::new();
        map.insert("one".to_string(), 1u64);
        map.insert("two".to_string(), 2u64);
        roundtrip(&map);

        let mut tree = BTreeMap::new();
        tree.insert(3u8, vec![1u8]);
        tree.insert(1u8, vec![]);
        roundtrip(&tree);

        let set: std::collections::BTreeSet<i32> = [-5, 0, 5].into();
        roundtrip(&set);
    }

    #[test]
    fn special_type_roundtrips() {
        roundtrip(&Duration::new(5, 123_456_789));
        roundtrip(&(UNIX_EPOCH + Duration::from_nanos(1_234_567_890)));
        roundtrip(&(UNIX_EPOCH - Duration::from_secs(86_400)));
        roundtrip(&Complex::new(1.5f32, -2.5f32));
        roundtrip(&Complex::new(std::f64::consts::E, 0.0f64));
        roundtrip(&Wrapping(250u8));
        roundtrip(&std::num::NonZeroU32::new(7).unwrap());
        roundtrip(&std::num::NonZeroI64::new(-7).unwrap());
        roundtrip(&Rc::new(9u32));
        roundtrip(&Arc::new("shared".to_string()));
    }

    #[test]
    fn vec_decode_reuses_capacity_and_elements() {
        let bytes = marshal(&vec![10u32, 20, 30]).unwrap();
        let mut dest: Vec<u32> = Vec::with_capacity(16);
        dest.extend_from_slice(&[1, 2, 3, 4, 5]);
        let consumed = unmarshal(&bytes, &mut dest).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(dest, [10, 20, 30]);
        assert_eq!(dest.capacity(), 16);
    }

    #[test]
    fn option_decode_reuses_existing_allocation() {
        let bytes = marshal(&Some(7u64)).unwrap();
        let mut dest = Some(Box::new(0u64));
        let before = std::ptr::addr_of!(**dest.as_ref().unwrap());
        unmarshal(&bytes, &mut dest).unwrap();
        let after = std::ptr::addr_of!(**dest.as_ref().unwrap());
        assert_eq!(**dest.as_ref().unwrap(), 7);
        assert_eq!(before, after, "existing box should be decoded into");
    }

    #[test]
    fn absent_clears_nonempty_destination() {
        let bytes = marshal(&None::<u32>).unwrap();
        let mut dest = Some(5u32);
        unmarshal(&bytes, &mut dest).unwrap();
        assert_eq!(dest, None);
    }

    #[test]
    fn string_decode_reuses_buffer() {
        let bytes = marshal(&"hi".to_string()).unwrap();
        let mut dest = String::with_capacity(64);
        dest.push_str("previous contents");
        unmarshal(&bytes, &mut dest).unwrap();
        assert_eq!(dest, "hi");
        assert_eq!(dest.capacity(), 64);
    }

    #[test]
    fn invalid_utf8_is_a_data_error() {
        let mut encoder = crate::Encoder::new();
        encoder.emit_len(2);
        encoder.emit_raw_bytes(&[0xFF, 0xFE]);
        let bytes = encoder.finish();
        let mut dest = String::new();
        let err = unmarshal(&bytes, &mut dest).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn invalid_char_is_a_data_error() {
        let mut encoder = crate::Encoder::new();
        encoder.emit_u32(0xD800);
        let bytes = encoder.finish();
        let mut decoder = Decoder::new(&bytes);
        let err = decoder.decode_value::<char>().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn nonzero_zero_is_a_data_error() {
        let bytes = marshal(&0u32).unwrap();
        let mut decoder = Decoder::new(&bytes);
        let err = decoder.decode_value::<std::num::NonZeroU32>().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
