//! Canonical type names, the process-wide type registry, and polymorphic
//! values.
//!
//! Most of the wire format is non-self-describing: bytes can only be decoded
//! by the type that produced them. The one exception is a polymorphic slot:
//! a [`Box<dyn Dynamic>`], usually behind an `Option`, whose payload is
//! preceded by the concrete type's canonical name. The [`Registry`] is the
//! bidirectional name table that makes those names resolvable again at
//! decode time.
//!
//! # Canonical names
//!
//! [`TypeName`] derives a deterministic, purely structural name for every
//! serializable type: primitives use their keywords, composites reconstruct
//! their shape (`Vec<…>`, `Option<…>`, `[…; N]`, tuples), and derived types
//! use their `module_path!()`-qualified identifier. Identical shapes always
//! produce identical names and distinct shapes never collide, so the derived
//! name doubles as a registry key. Callers who want shorter wire names can
//! pre-register an explicit alias with [`register_as`] before the first
//! polymorphic encode of the type.
//!
//! # Registry lifecycle
//!
//! The registry is an explicit service: [`Registry::new`] builds an isolated
//! instance (used by tests), while the polymorphic codec path goes through
//! the shared [`Registry::global`] instance. Entries are append-only and
//! live for the process; registering a duplicate name or type panics.
//! Auto-registration, triggered by the first encode of a concrete type
//! behind a polymorphic slot, is idempotent and safe under concurrent
//! first use.

use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    io,
    rc::Rc,
    sync::{Arc, LazyLock},
    time::{Duration, SystemTime},
};

use fxhash::FxHashMap;
use num_complex::Complex;
use parking_lot::RwLock;

use crate::{Decode, Decoder, Encode, Encoder};

/// A deterministic, structurally derived name for a serializable type.
///
/// Derive this with `#[derive(TypeName)]` for your own types; the derived
/// name is `module_path::TypeName`, with generic arguments rendered
/// structurally (`module::Pair<u32, String>`).
pub trait TypeName {
    /// Appends this type's canonical name to `out`.
    fn append_name(out: &mut String);

    /// Returns this type's canonical name.
    #[must_use]
    fn type_name() -> String {
        let mut out = String::new();
        Self::append_name(&mut out);
        out
    }
}

macro_rules! impl_type_name {
    ($($ty:ty => $name:literal),+ $(,)?) => {$(
        impl TypeName for $ty {
            fn append_name(out: &mut String) {
                out.push_str($name);
            }
        }
    )+};
}

impl_type_name!(
    bool => "bool",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    f32 => "f32",
    f64 => "f64",
    char => "char",
    String => "String",
    () => "()",
    Duration => "Duration",
    SystemTime => "SystemTime",
    Complex<f32> => "Complex<f32>",
    Complex<f64> => "Complex<f64>",
);

macro_rules! impl_type_name_wrapper {
    ($($outer:ident),+ $(,)?) => {$(
        impl<T: TypeName> TypeName for $outer<T> {
            fn append_name(out: &mut String) {
                out.push_str(stringify!($outer));
                out.push('<');
                T::append_name(out);
                out.push('>');
            }
        }
    )+};
}

impl_type_name_wrapper!(Option, Vec, Box, Rc, Arc, HashSet, BTreeSet);

impl<T: TypeName, const N: usize> TypeName for [T; N] {
    fn append_name(out: &mut String) {
        out.push('[');
        T::append_name(out);
        out.push_str("; ");
        out.push_str(&N.to_string());
        out.push(']');
    }
}

impl<K: TypeName, V: TypeName> TypeName for HashMap<K, V> {
    fn append_name(out: &mut String) {
        out.push_str("HashMap<");
        K::append_name(out);
        out.push_str(", ");
        V::append_name(out);
        out.push('>');
    }
}

impl<K: TypeName, V: TypeName> TypeName for BTreeMap<K, V> {
    fn append_name(out: &mut String) {
        out.push_str("BTreeMap<");
        K::append_name(out);
        out.push_str(", ");
        V::append_name(out);
        out.push('>');
    }
}

macro_rules! impl_type_name_tuple {
    ($first:ident $(, $rest:ident)*) => {
        impl<$first: TypeName $(, $rest: TypeName)*> TypeName
            for ($first, $($rest,)*)
        {
            fn append_name(out: &mut String) {
                out.push('(');
                $first::append_name(out);
                $(
                    out.push_str(", ");
                    $rest::append_name(out);
                )*
                out.push(')');
            }
        }
    };
}

impl_type_name_tuple!(A);
impl_type_name_tuple!(A, B);
impl_type_name_tuple!(A, B, C);
impl_type_name_tuple!(A, B, C, D);
impl_type_name_tuple!(A, B, C, D, E);
impl_type_name_tuple!(A, B, C, D, E, F);
impl_type_name_tuple!(A, B, C, D, E, F, G);
impl_type_name_tuple!(A, B, C, D, E, F, G, H);

/// Returns the canonical name derived for `T`, without registering it.
#[must_use]
pub fn type_name<T: TypeName>() -> String {
    T::type_name()
}

// =============================================================================
// Polymorphic values
// =============================================================================

/// Object trait for values held behind a polymorphic slot.
///
/// `Dynamic` is blanket-implemented for every type that is serializable,
/// default-constructible and thread-safe, so any such concrete value can be
/// stored as a `Box<dyn Dynamic>`. Encoding the slot writes the concrete
/// type's canonical (or explicitly registered) name before its payload;
/// decoding resolves the name through the registry and reconstructs the
/// concrete type.
///
/// Absence is modeled by wrapping the slot in `Option`, whose presence
/// marker precedes the name.
pub trait Dynamic: Any + Send + Sync {
    /// Encodes the concrete value's payload.
    fn encode_dyn(&self, encoder: &mut Encoder) -> io::Result<()>;

    /// Decodes the payload into the concrete value in place.
    fn decode_dyn(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()>;

    /// Upcasts to [`Any`] for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast to [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;

    #[doc(hidden)]
    fn register_derived(&self, registry: &Registry) -> Arc<str>;
}

impl<T> Dynamic for T
where
    T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
{
    fn encode_dyn(&self, encoder: &mut Encoder) -> io::Result<()> {
        Encode::encode(self, encoder)
    }

    fn decode_dyn(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        Decode::decode_in_place(self, decoder)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn register_derived(&self, registry: &Registry) -> Arc<str> {
        registry.get_or_insert::<T>(T::type_name().into())
    }
}

/// The erased decode engine stored per registered type.
#[derive(Clone, Copy)]
struct DynEngine {
    type_id: TypeId,
    construct: fn() -> Box<dyn Dynamic>,
}

fn construct<T>() -> Box<dyn Dynamic>
where
    T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
{
    Box::new(T::default())
}

#[derive(Default)]
struct Tables {
    /// Encode direction: concrete type to registered name.
    names: FxHashMap<TypeId, Arc<str>>,
    /// Decode direction: registered name to erased engine.
    engines: FxHashMap<Arc<str>, DynEngine>,
}

/// The bidirectional name ↔ type table backing polymorphic decode.
///
/// The two directions are kept under one lock so the mapping stays strictly
/// bijective. A cache miss on the encode path escalates to the write lock,
/// double-checks, and inserts; concurrent first uses of the same type
/// produce exactly one entry.
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty, isolated registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tables: RwLock::new(Tables::default()) }
    }

    /// The process-wide registry used by the polymorphic codec path.
    #[must_use]
    pub fn global() -> &'static Registry {
        static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);
        &GLOBAL
    }

    /// Registers `T` under its derived canonical name and returns the name.
    ///
    /// # Panics
    ///
    /// Panics if `T` or its name is already registered.
    pub fn register<T>(&self) -> String
    where
        T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
    {
        let name = T::type_name();
        self.insert::<T>(name.as_str().into());
        name
    }

    /// Registers `T` under an explicit name.
    ///
    /// Useful as a shorter wire alias; must happen before the type is first
    /// encoded behind a polymorphic slot, otherwise auto-registration will
    /// have claimed the derived name.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty, or if `T` or `name` is already
    /// registered.
    pub fn register_as<T>(&self, name: &str)
    where
        T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
    {
        assert!(!name.is_empty(), "attempt to register an empty type name");
        self.insert::<T>(name.into());
    }

    fn insert<T>(&self, name: Arc<str>)
    where
        T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
    {
        let mut tables = self.tables.write();
        assert!(
            !tables.names.contains_key(&TypeId::of::<T>()),
            "type `{}` is already registered",
            T::type_name(),
        );
        assert!(
            !tables.engines.contains_key(&name),
            "type name `{name}` is already registered",
        );
        tracing::debug!(name = %name, "registered type");
        tables.names.insert(TypeId::of::<T>(), Arc::clone(&name));
        tables.engines.insert(
            name,
            DynEngine { type_id: TypeId::of::<T>(), construct: construct::<T> },
        );
    }

    /// Get-or-insert used by auto-registration: returns the already
    /// registered name when present, claims the derived name otherwise.
    fn get_or_insert<T>(&self, name: Arc<str>) -> Arc<str>
    where
        T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
    {
        let mut tables = self.tables.write();
        if let Some(existing) = tables.names.get(&TypeId::of::<T>()) {
            return Arc::clone(existing);
        }
        assert!(
            !tables.engines.contains_key(&name),
            "type name `{name}` is already registered",
        );
        tracing::debug!(name = %name, "auto-registered type");
        tables.names.insert(TypeId::of::<T>(), Arc::clone(&name));
        tables.engines.insert(
            Arc::clone(&name),
            DynEngine { type_id: TypeId::of::<T>(), construct: construct::<T> },
        );
        name
    }

    /// Resolves the wire name for a concrete value, auto-registering it
    /// under its derived name on first use.
    fn name_for(&self, value: &dyn Dynamic) -> Arc<str> {
        if let Some(name) = self.tables.read().names.get(&value.as_any().type_id()) {
            return Arc::clone(name);
        }
        value.register_derived(self)
    }

    /// Returns the registered name of `T`, if any.
    #[must_use]
    pub fn name_of<T: Any>(&self) -> Option<String> {
        self.tables
            .read()
            .names
            .get(&TypeId::of::<T>())
            .map(|name| name.to_string())
    }

    fn engine(&self, name: &str) -> Option<DynEngine> {
        self.tables.read().engines.get(name).copied()
    }
}

/// Registers `T` in the global registry under its derived canonical name.
///
/// # Panics
///
/// Panics if `T` or its name is already registered.
pub fn register<T>() -> String
where
    T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
{
    Registry::global().register::<T>()
}

/// Registers `T` in the global registry under an explicit name.
///
/// # Panics
///
/// Panics if the name is empty, or if `T` or `name` is already registered.
pub fn register_as<T>(name: &str)
where
    T: Encode + Decode + TypeName + Default + Send + Sync + 'static,
{
    Registry::global().register_as::<T>(name);
}

// =============================================================================
// Wire codec for polymorphic slots
// =============================================================================

impl Encode for dyn Dynamic {
    fn encode(&self, encoder: &mut Encoder) -> io::Result<()> {
        let name = Registry::global().name_for(self);
        encoder.emit_str(&name);
        self.encode_dyn(encoder)
    }
}

fn read_engine(decoder: &mut Decoder<'_>) -> io::Result<DynEngine> {
    let len = decoder.read_len();
    let bytes = decoder.read_raw_bytes(len);
    let name = std::str::from_utf8(bytes).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("invalid UTF-8: {e}"))
    })?;
    Registry::global().engine(name).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown type name `{name}`; register the concrete type before decoding"),
        )
    })
}

impl Decode for Box<dyn Dynamic> {
    fn decode(decoder: &mut Decoder<'_>) -> io::Result<Self> {
        let engine = read_engine(decoder)?;
        let mut value = (engine.construct)();
        value.decode_dyn(decoder)?;
        Ok(value)
    }

    fn decode_in_place(&mut self, decoder: &mut Decoder<'_>) -> io::Result<()> {
        let engine = read_engine(decoder)?;
        if self.as_any().type_id() == engine.type_id {
            (**self).decode_dyn(decoder)
        } else {
            let mut value = (engine.construct)();
            value.decode_dyn(decoder)?;
            *self = value;
            Ok(())
        }
    }
}
