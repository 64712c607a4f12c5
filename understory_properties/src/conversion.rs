// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value conversion between types.
//!
//! Path writes and reads, and the construct/transfer walker, convert values to
//! the declared type of the property they touch. [`ConversionRegistry::convert`]
//! tries, in order:
//!
//! 1. a converter registered for exactly this source and destination;
//! 2. a plain copy when both types are the same;
//! 3. unwrapping a non-null `Option<T>` into `T` (any other conversion out of an
//!    `Option` fails);
//! 4. looking through a [`Dyn`](crate::Dyn) slot at the value it holds;
//! 5. converting to `T` and wrapping, when the destination is `Option<T>`, or
//!    storing an assignable value when the destination is a `Dyn` slot;
//! 6. enum rules: names and numbers convert to an enum through its
//!    [`EnumValue`](crate::EnumValue) impl, narrowed to its numeric code first;
//!    enums convert out through their numeric representation.
//!
//! Everything else is "no conversion", reported as `None`.

use core::any::TypeId;
use core::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;

use crate::reflect::{Reflect, Typed};
use crate::traits::{EnumOps, TypeTraits};

type Converter = Arc<dyn Fn(&dyn Reflect) -> Option<Box<dyn Reflect>> + Send + Sync>;

struct Registered {
    source: TypeTraits,
    convert: Converter,
}

/// Converters keyed by source and destination type.
///
/// ```rust
/// use understory_properties::ConversionRegistry;
///
/// let conversions = ConversionRegistry::with_primitives();
/// assert_eq!(conversions.try_convert::<f64, i32>(&3.9), Some(3));
/// assert_eq!(conversions.try_convert::<String, i32>(&"12.7".into()), Some(12));
/// assert_eq!(conversions.try_convert::<i32, Option<f32>>(&2), Some(Some(2.0)));
/// assert_eq!(conversions.try_convert::<Option<i32>, i32>(&None), None);
/// ```
#[derive(Default)]
pub struct ConversionRegistry {
    converters: RwLock<HashMap<(TypeId, TypeId), Registered>>,
}

impl ConversionRegistry {
    /// A registry with no converters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the primitive conversion table.
    ///
    /// Numbers convert to each other like unchecked casts: floats truncate
    /// toward zero, and integers wrap to the width of the destination, so
    /// `300.0` becomes `44_u8`. Strings parse as the destination type, then as
    /// `f64` narrowed the same way, and fall back to the default value.
    #[must_use]
    pub fn with_primitives() -> Self {
        let registry = Self::new();
        register_primitives(&registry);
        registry
    }

    /// Registers `convert` for `S → D`, replacing any previous converter.
    pub fn register<S: Typed, D: Typed>(&self, convert: impl Fn(&S) -> D + Send + Sync + 'static) {
        self.register_fallible::<S, D>(move |value| Some(convert(value)));
    }

    /// Registers a converter for `S → D` that may refuse some values.
    pub fn register_fallible<S: Typed, D: Typed>(
        &self,
        convert: impl Fn(&S) -> Option<D> + Send + Sync + 'static,
    ) {
        let convert: Converter = Arc::new(move |value: &dyn Reflect| -> Option<Box<dyn Reflect>> {
            let value = value.downcast_ref::<S>()?;
            convert(value).map(|converted| Box::new(converted) as Box<dyn Reflect>)
        });
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (TypeId::of::<S>(), TypeId::of::<D>()),
                Registered {
                    source: S::type_traits(),
                    convert,
                },
            );
    }

    /// Removes the converter for `S → D`, returning whether one existed.
    pub fn unregister<S: Typed, D: Typed>(&self) -> bool {
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(TypeId::of::<S>(), TypeId::of::<D>()))
            .is_some()
    }

    /// Number of registered converters.
    #[must_use]
    pub fn converter_count(&self) -> usize {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Source types with a registered converter to `destination`.
    #[must_use]
    pub fn types_converting_to(&self, destination: &TypeTraits) -> Vec<TypeTraits> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|((_, to), _)| *to == destination.id())
            .map(|(_, registered)| registered.source.clone())
            .collect()
    }

    fn converter(&self, source: TypeId, destination: TypeId) -> Option<Converter> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(source, destination))
            .map(|registered| registered.convert.clone())
    }

    /// Converts `value` to a `D`.
    #[must_use]
    pub fn try_convert<S: Typed, D: Typed>(&self, value: &S) -> Option<D> {
        let converted = self.convert(value, &D::type_traits())?;
        converted.downcast::<D>().ok().map(|value| *value)
    }

    /// Converts an erased value to the type described by `destination`.
    #[must_use]
    pub fn convert(
        &self,
        value: &dyn Reflect,
        destination: &TypeTraits,
    ) -> Option<Box<dyn Reflect>> {
        let source = value.runtime_traits();
        if let Some(convert) = self.converter(source.id(), destination.id()) {
            return convert(value);
        }
        if source.id() == destination.id() {
            return Some(value.clone_boxed());
        }
        if source.is_nullable() {
            let inner = value.indirect()?.value()?;
            return (inner.value_type_id() == destination.id()).then(|| inner.clone_boxed());
        }
        if source.is_indirect() {
            return self.convert(value.indirect()?.value()?, destination);
        }
        if destination.is_nullable() {
            let inner = self.convert(value, &destination.underlying()?)?;
            return wrap(destination, inner);
        }
        if destination.is_indirect() {
            return wrap(destination, value.clone_boxed());
        }
        if let Some(ops) = destination.enum_ops() {
            return self.to_enum(value, &source, destination, ops);
        }
        if let Some(ops) = source.enum_ops() {
            let repr = (ops.to_repr)(value)?;
            return self.convert(&repr, destination);
        }
        tracing::trace!(
            from = source.name(),
            to = destination.name(),
            "no conversion"
        );
        None
    }

    fn to_enum(
        &self,
        value: &dyn Reflect,
        source: &TypeTraits,
        destination: &TypeTraits,
        ops: &EnumOps,
    ) -> Option<Box<dyn Reflect>> {
        let repr = if let Some(text) = value.downcast_ref::<String>() {
            let text = text.trim();
            if let Some(named) = (ops.from_name)(text) {
                return Some(named);
            }
            text.parse::<i64>().ok()?
        } else if let Some(source_ops) = source.enum_ops() {
            (source_ops.to_repr)(value)?
        } else if let Some(&repr) = value.downcast_ref::<i64>() {
            repr
        } else {
            *self
                .convert(value, &i64::type_traits())?
                .downcast::<i64>()
                .ok()?
        };
        let repr = destination.code().map_or(repr, |code| code.narrow(repr));
        (ops.from_repr)(repr)
    }
}

/// Text form of a map or set key, as used in key path segments.
pub(crate) fn key_text(conversions: &ConversionRegistry, key: &dyn Reflect) -> String {
    if let Some(text) = key.downcast_ref::<String>() {
        return text.clone();
    }
    conversions
        .convert(key, &String::type_traits())
        .and_then(|text| text.downcast::<String>().ok())
        .map_or_else(|| format!("{key:?}"), |text| *text)
}

/// Builds an empty slot of type `destination` and stores `inner` in it.
fn wrap(destination: &TypeTraits, inner: Box<dyn Reflect>) -> Option<Box<dyn Reflect>> {
    let mut slot = destination.constructor()?();
    slot.indirect_mut()?.set_value(inner).ok()?;
    Some(slot)
}

impl fmt::Debug for ConversionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRegistry")
            .field("converters", &self.converter_count())
            .finish()
    }
}

/// Narrowing from `f64` with unchecked-cast semantics.
trait Narrow {
    fn narrow(value: f64) -> Self;
}

macro_rules! narrow {
    (int [$($int:ty),*]) => {$(
        impl Narrow for $int {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "wrapping to the destination width is the point"
            )]
            fn narrow(value: f64) -> Self {
                // Truncate toward zero, then keep the low bits.
                value as i128 as $int
            }
        }
    )*};
    (float [$($float:ty),*]) => {$(
        impl Narrow for $float {
            #[allow(
                trivial_numeric_casts,
                clippy::unnecessary_cast,
                clippy::cast_possible_truncation,
                reason = "covers f32 and f64 alike"
            )]
            fn narrow(value: f64) -> Self {
                value as $float
            }
        }
    )*};
}

narrow!(int [i8, u8, i16, u16, i32, u32, i64, u64, isize, usize]);
narrow!(float [f32, f64]);

macro_rules! casts {
    ($registry:ident, [$($from:ty),*], $to:tt) => {
        $(casts!(@one $registry, $from, $to);)*
    };
    (@one $registry:ident, $from:ty, [$($to:ty),*]) => {
        $($registry.register::<$from, $to>(|value| *value as $to);)*
    };
}

macro_rules! narrowing {
    ($registry:ident, [$($from:ty),*], $to:tt) => {
        $(narrowing!(@one $registry, $from, $to);)*
    };
    (@one $registry:ident, $from:ty, [$($to:ty),*]) => {
        $($registry.register::<$from, $to>(|value| <$to>::narrow(f64::from(*value)));)*
    };
}

macro_rules! integers {
    ($registry:ident, [$($int:ty),*]) => {$(
        $registry.register::<$int, bool>(|value| *value != 0);
        $registry.register::<bool, $int>(|value| <$int>::from(*value));
        $registry.register::<$int, char>(|value| char::from_u32(*value as u32).unwrap_or_default());
        $registry.register::<char, $int>(|value| u32::from(*value) as $int);
    )*};
}

macro_rules! floats {
    ($registry:ident, [$($float:ident),*]) => {$(
        $registry.register::<$float, bool>(|value| value.abs() > $float::EPSILON);
        $registry.register::<bool, $float>(|value| <$float>::from(*value));
    )*};
}

macro_rules! text {
    ($registry:ident, [$($ty:ty),*]) => {$(
        $registry.register::<$ty, String>(ToString::to_string);
        $registry.register::<String, $ty>(|text| {
            let text = text.trim();
            text.parse::<$ty>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(<$ty>::narrow))
                .unwrap_or_default()
        });
    )*};
}

#[allow(
    trivial_numeric_casts,
    clippy::unnecessary_cast,
    clippy::cast_possible_truncation,
    clippy::useless_conversion,
    reason = "the table casts between every pair of numeric types, the same type included"
)]
fn register_primitives(registry: &ConversionRegistry) {
    casts!(
        registry,
        [i8, u8, i16, u16, i32, u32, i64, u64, isize, usize],
        [i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64]
    );
    narrowing!(
        registry,
        [f32, f64],
        [i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64]
    );
    integers!(registry, [i8, u8, i16, u16, i32, u32, i64, u64, isize, usize]);
    floats!(registry, [f32, f64]);
    text!(registry, [i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, f32, f64]);

    registry.register::<bool, String>(ToString::to_string);
    registry.register::<String, bool>(|text| {
        let text = text.trim();
        if text.eq_ignore_ascii_case("true") {
            true
        } else if text.eq_ignore_ascii_case("false") {
            false
        } else {
            text.parse::<f64>().is_ok_and(|value| value != 0.0)
        }
    });
    registry.register::<char, String>(ToString::to_string);
    registry.register::<String, char>(|text| text.chars().next().unwrap_or('\0'));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{EnumValue, TypeCode};
    use crate::{Dyn, TypeDescriptor};

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    enum Mode {
        #[default]
        Off,
        On,
    }

    impl Typed for Mode {
        fn type_traits() -> TypeTraits {
            TypeTraits::enumeration::<Self>()
        }
    }

    impl EnumValue for Mode {
        const CODE: TypeCode = TypeCode::U8;

        fn to_repr(self) -> i64 {
            match self {
                Self::Off => 0,
                Self::On => 1,
            }
        }

        fn from_repr(repr: i64) -> Option<Self> {
            match repr {
                0 => Some(Self::Off),
                1 => Some(Self::On),
                _ => None,
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            match name {
                "Off" => Some(Self::Off),
                "On" => Some(Self::On),
                _ => None,
            }
        }
    }

    #[derive(Clone, Default)]
    struct Shape;

    impl Typed for Shape {
        fn type_traits() -> TypeTraits {
            TypeTraits::abstract_type::<Self>()
        }
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Square {
        side: f32,
    }

    impl Typed for Square {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>().implements::<Shape>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(TypeDescriptor::<Self>::new().field("Side", |s| &s.side, |s| &mut s.side))
        }
    }

    #[test]
    fn numbers_truncate() {
        let conversions = ConversionRegistry::with_primitives();
        assert_eq!(conversions.try_convert::<f64, i32>(&-2.7), Some(-2));
        assert_eq!(conversions.try_convert::<i32, u8>(&300), Some(44));
        assert_eq!(conversions.try_convert::<f64, u8>(&300.0), Some(44));
        assert_eq!(conversions.try_convert::<f32, i8>(&-129.9), Some(127));
        assert_eq!(conversions.try_convert::<f64, i32>(&3.0e9), Some(-1_294_967_296));
        assert_eq!(conversions.try_convert::<f64, f32>(&0.5), Some(0.5));
        assert_eq!(conversions.try_convert::<u8, f32>(&7), Some(7.0));
        assert_eq!(conversions.try_convert::<f32, bool>(&0.0), Some(false));
        assert_eq!(conversions.try_convert::<i16, bool>(&-1), Some(true));
        assert_eq!(conversions.try_convert::<bool, f64>(&true), Some(1.0));
        assert_eq!(conversions.try_convert::<char, u32>(&'A'), Some(65));
        assert_eq!(conversions.try_convert::<u8, char>(&66), Some('B'));
    }

    #[test]
    fn strings_parse_with_fallbacks() {
        let conversions = ConversionRegistry::with_primitives();
        assert_eq!(conversions.try_convert::<String, u16>(&" 42 ".into()), Some(42));
        assert_eq!(conversions.try_convert::<String, i32>(&"12.7".into()), Some(12));
        assert_eq!(conversions.try_convert::<String, u8>(&"300.5".into()), Some(44));
        assert_eq!(conversions.try_convert::<String, i32>(&"lol".into()), Some(0));
        assert_eq!(conversions.try_convert::<String, bool>(&"TRUE".into()), Some(true));
        assert_eq!(conversions.try_convert::<String, bool>(&"2".into()), Some(true));
        assert_eq!(conversions.try_convert::<String, char>(&String::new()), Some('\0'));
        assert_eq!(
            conversions.try_convert::<f64, String>(&1.5),
            Some(String::from("1.5"))
        );
    }

    #[test]
    fn nullable_rules() {
        let conversions = ConversionRegistry::with_primitives();
        assert_eq!(conversions.try_convert::<Option<i32>, Option<i32>>(&None), Some(None));
        assert_eq!(conversions.try_convert::<Option<i32>, i32>(&Some(4)), Some(4));
        assert_eq!(conversions.try_convert::<Option<i32>, i32>(&None), None);
        assert_eq!(conversions.try_convert::<i32, Option<i32>>(&5), Some(Some(5)));
        assert_eq!(conversions.try_convert::<i32, Option<f64>>(&5), Some(Some(5.0)));
        assert_eq!(conversions.try_convert::<Option<i32>, Option<f64>>(&Some(1)), None);
        assert_eq!(conversions.try_convert::<Option<i32>, f64>(&Some(1)), None);
    }

    #[test]
    fn enums_convert_by_name_and_number() {
        let conversions = ConversionRegistry::with_primitives();
        assert_eq!(conversions.try_convert::<String, Mode>(&"On".into()), Some(Mode::On));
        assert_eq!(conversions.try_convert::<String, Mode>(&"1".into()), Some(Mode::On));
        assert_eq!(conversions.try_convert::<String, Mode>(&"Dim".into()), None);
        assert_eq!(conversions.try_convert::<i32, Mode>(&1), Some(Mode::On));
        assert_eq!(conversions.try_convert::<i32, Mode>(&7), None);
        assert_eq!(conversions.try_convert::<i32, Mode>(&257), Some(Mode::On));
        assert_eq!(conversions.try_convert::<Mode, i32>(&Mode::On), Some(1));
    }

    #[test]
    fn slots_accept_assignable_values() {
        let conversions = ConversionRegistry::new();
        let slot = conversions
            .try_convert::<Square, Dyn<Shape>>(&Square { side: 2.0 })
            .unwrap();
        assert_eq!(slot.downcast_ref::<Square>(), Some(&Square { side: 2.0 }));
        let back = conversions.try_convert::<Dyn<Shape>, Square>(&slot);
        assert_eq!(back, Some(Square { side: 2.0 }));
        assert!(conversions.try_convert::<i32, Dyn<Shape>>(&1).is_none());
    }

    #[test]
    fn registered_converters_win_and_can_be_removed() {
        let conversions = ConversionRegistry::new();
        assert_eq!(conversions.try_convert::<i32, String>(&1), None);
        conversions.register::<i32, String>(|value| format!("#{value}"));
        assert_eq!(
            conversions.try_convert::<i32, String>(&1),
            Some(String::from("#1"))
        );
        assert_eq!(conversions.converter_count(), 1);
        let sources = conversions.types_converting_to(&String::type_traits());
        assert!(sources[0].is::<i32>());
        assert!(conversions.unregister::<i32, String>());
        assert_eq!(conversions.converter_count(), 0);
    }
}
