// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static per-type facts.
//!
//! [`TypeTraits`] answers the questions the rest of the crate asks about a type
//! before touching a value of it: is it a leaf, can it be null, is it a
//! collection, how is it constructed. Every [`Typed`] type produces one from
//! [`Typed::type_traits`].

use core::any::TypeId;
use core::fmt;

use smallvec::SmallVec;

use crate::reflect::{Reflect, Typed};

bitflags::bitflags! {
    /// Classification bits carried by a [`TypeTraits`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u32 {
        /// Assignment copies the value (structs, primitives, enums, owned collections).
        const VALUE_TYPE = 1 << 0;
        /// Built-in numeric, `bool` or `char`.
        const PRIMITIVE = 1 << 1;
        /// `String`.
        const STRING = 1 << 2;
        /// Enumeration with a numeric representation.
        const ENUM = 1 << 3;
        /// Enumeration whose values combine as bit flags.
        const FLAGS_ENUM = 1 << 4;
        /// `Option<T>`; the underlying type is available from [`TypeTraits::underlying`].
        const NULLABLE = 1 << 5;
        /// Interface type: only ever seen as the declared type of a slot.
        const INTERFACE = 1 << 6;
        /// Abstract type: only ever seen as the declared type of a slot.
        const ABSTRACT = 1 << 7;
        /// Fixed-length array.
        const ARRAY = 1 << 8;
        /// Multi-dimensional array; always a leaf.
        const MULTI_DIM_ARRAY = 1 << 9;
        /// Raw pointer-like handle; always a leaf.
        const POINTER = 1 << 10;
        /// Ordered, index-addressable collection (lists and arrays).
        const LIST = 1 << 11;
        /// Keyed collection (dictionaries and sets).
        const KEYED = 1 << 12;
        /// Generic type definition that has not been closed over its parameters.
        const GENERIC_DEFINITION = 1 << 13;
        /// Polymorphic slot whose runtime value may be any assignable type.
        const INDIRECT = 1 << 14;
    }
}

/// Numeric representation code of primitives and enum underlying types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
    /// `bool`.
    Bool,
    /// `char`.
    Char,
    /// `i8`.
    I8,
    /// `u8`.
    U8,
    /// `i16`.
    I16,
    /// `u16`.
    U16,
    /// `i32`.
    I32,
    /// `u32`.
    U32,
    /// `i64`.
    I64,
    /// `u64`.
    U64,
    /// `isize`.
    Isize,
    /// `usize`.
    Usize,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
    /// `String`.
    String,
}

impl TypeCode {
    /// Returns `true` for integer and floating-point codes.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool | Self::Char | Self::String)
    }

    /// Returns `true` for `f32` and `f64`.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Narrows `value` to the width of this code, wrapping like an `as` cast.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "narrowing is the point")]
    pub fn narrow(self, value: i64) -> i64 {
        match self {
            Self::I8 => i64::from(value as i8),
            Self::U8 => i64::from(value as u8),
            Self::I16 => i64::from(value as i16),
            Self::U16 => i64::from(value as u16),
            Self::I32 => i64::from(value as i32),
            Self::U32 => i64::from(value as u32),
            Self::Bool => i64::from(value != 0),
            _ => value,
        }
    }
}

/// Erased enum operations, produced from [`EnumValue`].
#[derive(Clone, Copy)]
pub struct EnumOps {
    pub(crate) to_repr: fn(&dyn Reflect) -> Option<i64>,
    pub(crate) from_repr: fn(i64) -> Option<Box<dyn Reflect>>,
    pub(crate) from_name: fn(&str) -> Option<Box<dyn Reflect>>,
}

impl fmt::Debug for EnumOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumOps").finish_non_exhaustive()
    }
}

/// An enumeration that can take part in conversions.
///
/// Plain enums map discriminants; `bitflags` types map bits with
/// `from_bits_retain` and set [`EnumValue::FLAGS`].
pub trait EnumValue: Typed + Copy + Default {
    /// Underlying numeric code.
    const CODE: TypeCode;
    /// `true` for flag sets.
    const FLAGS: bool = false;

    /// Numeric representation of `self`.
    fn to_repr(self) -> i64;

    /// Value for a numeric representation, if one exists.
    fn from_repr(repr: i64) -> Option<Self>;

    /// Value for a declared name, if one exists.
    fn from_name(name: &str) -> Option<Self>;
}

fn enum_to_repr<E: EnumValue>(value: &dyn Reflect) -> Option<i64> {
    value.downcast_ref::<E>().map(|value| value.to_repr())
}

fn enum_from_repr<E: EnumValue>(repr: i64) -> Option<Box<dyn Reflect>> {
    E::from_repr(repr).map(|value| Box::new(value) as Box<dyn Reflect>)
}

fn enum_from_name<E: EnumValue>(name: &str) -> Option<Box<dyn Reflect>> {
    E::from_name(name).map(|value| Box::new(value) as Box<dyn Reflect>)
}

/// Boxes `T::default()`; the usual constructor for [`TypeTraits::with_constructor`].
#[must_use]
pub fn construct_default<T: Typed + Default>() -> Box<dyn Reflect> {
    Box::new(T::default())
}

/// Static facts about one concrete type.
///
/// Built with the constructors below and refined with the `with_*` builders.
///
/// ```rust
/// use understory_properties::{TypeTraits, Typed};
///
/// let traits = <Option<i32>>::type_traits();
/// assert!(traits.is_nullable());
/// assert!(traits.can_be_null());
/// assert!(traits.underlying().is_some_and(|inner| inner.is_primitive()));
/// assert!(!String::type_traits().is_container_type());
/// ```
#[derive(Clone)]
pub struct TypeTraits {
    id: TypeId,
    name: &'static str,
    flags: TypeFlags,
    code: Option<TypeCode>,
    underlying: Option<fn() -> Self>,
    element: Option<fn() -> Self>,
    key: Option<fn() -> Self>,
    constructor: Option<fn() -> Box<dyn Reflect>>,
    enum_ops: Option<EnumOps>,
    bases: SmallVec<[TypeId; 2]>,
}

impl TypeTraits {
    /// Traits for `T` with the given flags and nothing else.
    #[must_use]
    pub fn new<T: ?Sized + 'static>(flags: TypeFlags) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
            flags,
            code: None,
            underlying: None,
            element: None,
            key: None,
            constructor: None,
            enum_ops: None,
            bases: SmallVec::new(),
        }
    }

    /// A default-constructible value type, the shape of most container structs.
    #[must_use]
    pub fn value<T: Typed + Default>() -> Self {
        Self::new::<T>(TypeFlags::VALUE_TYPE).with_constructor(construct_default::<T>)
    }

    /// An abstract type, used as the declared type of polymorphic slots.
    #[must_use]
    pub fn abstract_type<T: ?Sized + 'static>() -> Self {
        Self::new::<T>(TypeFlags::ABSTRACT)
    }

    /// An interface type, used as the declared type of polymorphic slots.
    #[must_use]
    pub fn interface<T: ?Sized + 'static>() -> Self {
        Self::new::<T>(TypeFlags::INTERFACE)
    }

    /// An enumeration described by [`EnumValue`].
    #[must_use]
    pub fn enumeration<E: EnumValue>() -> Self {
        let mut flags = TypeFlags::VALUE_TYPE | TypeFlags::ENUM;
        if E::FLAGS {
            flags |= TypeFlags::FLAGS_ENUM;
        }
        let mut traits = Self::new::<E>(flags)
            .with_code(E::CODE)
            .with_constructor(construct_default::<E>);
        traits.enum_ops = Some(EnumOps {
            to_repr: enum_to_repr::<E>,
            from_repr: enum_from_repr::<E>,
            from_name: enum_from_name::<E>,
        });
        traits
    }

    /// Adds flags.
    #[must_use]
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Sets the numeric code.
    #[must_use]
    pub fn with_code(mut self, code: TypeCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the underlying type of a nullable or polymorphic slot.
    #[must_use]
    pub fn with_underlying(mut self, underlying: fn() -> Self) -> Self {
        self.underlying = Some(underlying);
        self
    }

    /// Sets the element type of a collection.
    #[must_use]
    pub fn with_element(mut self, element: fn() -> Self) -> Self {
        self.element = Some(element);
        self
    }

    /// Sets the key type of a keyed collection.
    #[must_use]
    pub fn with_key(mut self, key: fn() -> Self) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets the parameterless constructor.
    #[must_use]
    pub fn with_constructor(mut self, constructor: fn() -> Box<dyn Reflect>) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Declares that values of this type may be stored where `A` is expected.
    ///
    /// Everything `A` implements is inherited, so chains only need the
    /// nearest ancestor.
    #[must_use]
    pub fn implements<A: Typed>(mut self) -> Self {
        let base = A::type_traits();
        self.bases.push(base.id);
        for id in base.bases {
            if !self.bases.contains(&id) {
                self.bases.push(id);
            }
        }
        self
    }

    /// The [`TypeId`].
    #[must_use]
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name used in messages and type identifiers.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short form of [`TypeTraits::name`] without the module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let generic = self.name.find('<').unwrap_or(self.name.len());
        let head = &self.name[..generic];
        match head.rfind("::") {
            Some(split) => &self.name[split + 2..],
            None => self.name,
        }
    }

    /// Classification flags.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    /// Numeric code for primitives and enums.
    #[must_use]
    #[inline]
    pub fn code(&self) -> Option<TypeCode> {
        self.code
    }

    /// Returns `true` if this is `T`.
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Assignment copies the value.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.flags.contains(TypeFlags::VALUE_TYPE)
    }

    /// Built-in numeric, `bool` or `char`.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.flags.contains(TypeFlags::PRIMITIVE)
    }

    /// `String`.
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.flags.contains(TypeFlags::STRING)
    }

    /// Enumeration.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.flags.contains(TypeFlags::ENUM)
    }

    /// Flags enumeration.
    #[must_use]
    pub fn is_flags_enum(&self) -> bool {
        self.flags.contains(TypeFlags::FLAGS_ENUM)
    }

    /// `Option<T>`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.flags.contains(TypeFlags::NULLABLE)
    }

    /// Interface type.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::INTERFACE)
    }

    /// Abstract type.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    /// Fixed-length array.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.flags.contains(TypeFlags::ARRAY)
    }

    /// Multi-dimensional array.
    #[must_use]
    pub fn is_multi_dimensional_array(&self) -> bool {
        self.flags.contains(TypeFlags::MULTI_DIM_ARRAY)
    }

    /// Pointer-like handle.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        self.flags.contains(TypeFlags::POINTER)
    }

    /// Index-addressable collection.
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.flags.contains(TypeFlags::LIST)
    }

    /// Keyed collection.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.flags.contains(TypeFlags::KEYED)
    }

    /// Polymorphic slot.
    #[must_use]
    pub fn is_indirect(&self) -> bool {
        self.flags.contains(TypeFlags::INDIRECT)
    }

    /// Generic type definition.
    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        self.flags.contains(TypeFlags::GENERIC_DEFINITION)
    }

    /// A value of this type may be null.
    #[must_use]
    pub fn can_be_null(&self) -> bool {
        !self.is_value_type() || self.is_nullable()
    }

    /// Not a primitive, pointer, enum or string.
    #[must_use]
    pub fn is_container_type(&self) -> bool {
        !self.flags.intersects(
            TypeFlags::PRIMITIVE | TypeFlags::POINTER | TypeFlags::ENUM | TypeFlags::STRING,
        )
    }

    /// Underlying type of a nullable or polymorphic slot.
    #[must_use]
    pub fn underlying(&self) -> Option<Self> {
        self.underlying.map(|underlying| underlying())
    }

    /// This type, or its underlying type when it is nullable.
    #[must_use]
    pub fn through_nullable(&self) -> Self {
        if self.is_nullable() {
            if let Some(underlying) = self.underlying() {
                return underlying;
            }
        }
        self.clone()
    }

    /// Element type of a collection.
    #[must_use]
    pub fn element(&self) -> Option<Self> {
        self.element.map(|element| element())
    }

    /// Key type of a keyed collection.
    #[must_use]
    pub fn key(&self) -> Option<Self> {
        self.key.map(|key| key())
    }

    /// Parameterless constructor.
    #[must_use]
    pub fn constructor(&self) -> Option<fn() -> Box<dyn Reflect>> {
        self.constructor
    }

    /// Enum operations.
    #[must_use]
    pub fn enum_ops(&self) -> Option<&EnumOps> {
        self.enum_ops.as_ref()
    }

    /// Types this one was declared to implement.
    #[must_use]
    pub fn bases(&self) -> &[TypeId] {
        &self.bases
    }

    /// Values of this type may be stored where `target` is expected.
    #[must_use]
    pub fn is_assignable_to(&self, target: &Self) -> bool {
        self.id == target.id || self.bases.contains(&target.id)
    }
}

impl PartialEq for TypeTraits {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTraits {}

impl fmt::Debug for TypeTraits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeTraits")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}
