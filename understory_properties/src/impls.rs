// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Typed`] for primitives, strings and the standard containers, plus the
//! [`Dyn`] polymorphic slot and the [`MultiArray`] leaf.

use core::any::TypeId;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;

use crate::reflect::{IndirectAccess, KeyedAccess, ListAccess, Reflect, Typed};
use crate::traits::{TypeCode, TypeFlags, TypeTraits, construct_default};

macro_rules! primitive {
    ($($ty:ty => $code:ident),* $(,)?) => {$(
        impl Typed for $ty {
            fn type_traits() -> TypeTraits {
                TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::PRIMITIVE)
                    .with_code(TypeCode::$code)
                    .with_constructor(construct_default::<Self>)
            }
        }
    )*};
}

primitive! {
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    isize => Isize,
    usize => Usize,
    f32 => F32,
    f64 => F64,
}

impl Typed for String {
    fn type_traits() -> TypeTraits {
        TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::STRING)
            .with_code(TypeCode::String)
            .with_constructor(construct_default::<Self>)
    }
}

impl<T: Typed> Typed for Option<T> {
    fn type_traits() -> TypeTraits {
        let mut flags = TypeFlags::NULLABLE;
        if T::type_traits().is_value_type() {
            flags |= TypeFlags::VALUE_TYPE;
        }
        TypeTraits::new::<Self>(flags)
            .with_underlying(T::type_traits)
            .with_constructor(construct_default::<Self>)
    }

    fn as_indirect(&self) -> Option<&dyn IndirectAccess> {
        Some(self)
    }

    fn as_indirect_mut(&mut self) -> Option<&mut dyn IndirectAccess> {
        Some(self)
    }
}

impl<T: Typed> IndirectAccess for Option<T> {
    fn value(&self) -> Option<&dyn Reflect> {
        self.as_ref().map(|value| value as &dyn Reflect)
    }

    fn value_mut(&mut self) -> Option<&mut dyn Reflect> {
        self.as_mut().map(|value| value as &mut dyn Reflect)
    }

    fn declared_traits(&self) -> TypeTraits {
        T::type_traits()
    }

    fn set_null(&mut self) {
        *self = None;
    }

    fn set_value(&mut self, value: Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>> {
        *self = Some(*value.downcast::<T>()?);
        Ok(())
    }

    fn accepts(&self, traits: &TypeTraits) -> bool {
        traits.id() == TypeId::of::<T>()
    }
}

impl<T: Typed + Default> Typed for Vec<T> {
    fn type_traits() -> TypeTraits {
        TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::LIST)
            .with_element(T::type_traits)
            .with_constructor(construct_default::<Self>)
    }

    fn as_list(&self) -> Option<&dyn ListAccess> {
        Some(self)
    }

    fn as_list_mut(&mut self) -> Option<&mut dyn ListAccess> {
        Some(self)
    }
}

impl<T: Typed + Default> ListAccess for Vec<T> {
    fn count(&self) -> usize {
        self.len()
    }

    fn set_count(&mut self, count: usize) {
        self.resize_with(count, T::default);
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|value| value as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.get_mut(index).map(|value| value as &mut dyn Reflect)
    }

    fn element_traits(&self) -> TypeTraits {
        T::type_traits()
    }
}

/// Boxed slices play the part of fixed-size arrays: resizing reallocates.
impl<T: Typed + Default> Typed for Box<[T]> {
    fn type_traits() -> TypeTraits {
        TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::ARRAY | TypeFlags::LIST)
            .with_element(T::type_traits)
            .with_constructor(construct_default::<Self>)
    }

    fn as_list(&self) -> Option<&dyn ListAccess> {
        Some(self)
    }

    fn as_list_mut(&mut self) -> Option<&mut dyn ListAccess> {
        Some(self)
    }
}

impl<T: Typed + Default> ListAccess for Box<[T]> {
    fn count(&self) -> usize {
        self.len()
    }

    fn set_count(&mut self, count: usize) {
        if count == self.len() {
            return;
        }
        let mut elements = core::mem::take(self).into_vec();
        elements.resize_with(count, T::default);
        *self = elements.into_boxed_slice();
    }

    fn clear(&mut self) {
        *self = Box::default();
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        self.get(index).map(|value| value as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.get_mut(index).map(|value| value as &mut dyn Reflect)
    }

    fn element_traits(&self) -> TypeTraits {
        T::type_traits()
    }
}

/// Row-major array with any number of dimensions.
///
/// Multi-dimensional arrays are always leaves: they are never visited element
/// by element and cannot be the root of a visit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiArray<T> {
    lengths: SmallVec<[usize; 2]>,
    data: Vec<T>,
}

impl<T: Default> MultiArray<T> {
    /// Creates an array with the given dimension lengths, filled with defaults.
    #[must_use]
    pub fn new(lengths: &[usize]) -> Self {
        let len = lengths.iter().product();
        let mut data = Vec::with_capacity(len);
        data.resize_with(len, T::default);
        Self {
            lengths: SmallVec::from_slice(lengths),
            data,
        }
    }
}

impl<T> MultiArray<T> {
    /// Dimension lengths.
    #[must_use]
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Number of dimensions.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.lengths.len()
    }

    /// Total number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if any dimension is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Elements in row-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    fn offset(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.lengths.len() {
            return None;
        }
        let mut offset = 0;
        for (&index, &length) in indices.iter().zip(&self.lengths) {
            if index >= length {
                return None;
            }
            offset = offset * length + index;
        }
        Some(offset)
    }

    /// Element at `indices`, one index per dimension.
    #[must_use]
    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        self.offset(indices).map(|offset| &self.data[offset])
    }

    /// Mutable element at `indices`.
    pub fn get_mut(&mut self, indices: &[usize]) -> Option<&mut T> {
        self.offset(indices).map(|offset| &mut self.data[offset])
    }
}

impl<T: Typed + Default> Typed for MultiArray<T> {
    fn type_traits() -> TypeTraits {
        TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::MULTI_DIM_ARRAY)
            .with_element(T::type_traits)
            .with_constructor(construct_default::<Self>)
    }
}

macro_rules! keyed_map {
    ($map:ident<K, V $(, $hasher:ident)?> where K: $($key_bound:path),+) => {
        impl<K, V $(, $hasher)?> Typed for $map<K, V $(, $hasher)?>
        where
            K: Typed $(+ $key_bound)+,
            V: Typed,
            $($hasher: BuildHasher + Default + Clone + 'static,)?
        {
            fn type_traits() -> TypeTraits {
                TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::KEYED)
                    .with_key(K::type_traits)
                    .with_element(V::type_traits)
                    .with_constructor(construct_default::<Self>)
            }

            fn as_keyed(&self) -> Option<&dyn KeyedAccess> {
                Some(self)
            }

            fn as_keyed_mut(&mut self) -> Option<&mut dyn KeyedAccess> {
                Some(self)
            }
        }

        impl<K, V $(, $hasher)?> KeyedAccess for $map<K, V $(, $hasher)?>
        where
            K: Typed $(+ $key_bound)+,
            V: Typed,
            $($hasher: BuildHasher + Default + Clone + 'static,)?
        {
            fn count(&self) -> usize {
                self.len()
            }

            fn clear(&mut self) {
                $map::clear(self);
            }

            fn keys(&self) -> Vec<Box<dyn Reflect>> {
                $map::keys(self)
                    .map(|key| Box::new(key.clone()) as Box<dyn Reflect>)
                    .collect()
            }

            fn key_traits(&self) -> TypeTraits {
                K::type_traits()
            }

            fn value_traits(&self) -> TypeTraits {
                V::type_traits()
            }

            fn get(&self, key: &dyn Reflect) -> Option<&dyn Reflect> {
                let key = key.downcast_ref::<K>()?;
                $map::get(self, key).map(|value| value as &dyn Reflect)
            }

            fn get_mut(&mut self, key: &dyn Reflect) -> Option<&mut dyn Reflect> {
                let key = key.downcast_ref::<K>()?;
                $map::get_mut(self, key).map(|value| value as &mut dyn Reflect)
            }

            fn insert(&mut self, key: Box<dyn Reflect>, value: Option<Box<dyn Reflect>>) -> bool {
                let (Ok(key), Some(Ok(value))) =
                    (key.downcast::<K>(), value.map(|value| value.downcast::<V>()))
                else {
                    return false;
                };
                $map::insert(self, *key, *value);
                true
            }

            fn remove(&mut self, key: &dyn Reflect) -> bool {
                key.downcast_ref::<K>()
                    .is_some_and(|key| $map::remove(self, key).is_some())
            }

            fn is_set(&self) -> bool {
                false
            }
        }
    };
}

macro_rules! keyed_set {
    ($set:ident<T $(, $hasher:ident)?> where T: $($bound:path),+) => {
        impl<T $(, $hasher)?> Typed for $set<T $(, $hasher)?>
        where
            T: Typed $(+ $bound)+,
            $($hasher: BuildHasher + Default + Clone + 'static,)?
        {
            fn type_traits() -> TypeTraits {
                TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE | TypeFlags::KEYED)
                    .with_key(T::type_traits)
                    .with_element(T::type_traits)
                    .with_constructor(construct_default::<Self>)
            }

            fn as_keyed(&self) -> Option<&dyn KeyedAccess> {
                Some(self)
            }

            fn as_keyed_mut(&mut self) -> Option<&mut dyn KeyedAccess> {
                Some(self)
            }
        }

        impl<T $(, $hasher)?> KeyedAccess for $set<T $(, $hasher)?>
        where
            T: Typed $(+ $bound)+,
            $($hasher: BuildHasher + Default + Clone + 'static,)?
        {
            fn count(&self) -> usize {
                self.len()
            }

            fn clear(&mut self) {
                $set::clear(self);
            }

            fn keys(&self) -> Vec<Box<dyn Reflect>> {
                self.iter()
                    .map(|key| Box::new(key.clone()) as Box<dyn Reflect>)
                    .collect()
            }

            fn key_traits(&self) -> TypeTraits {
                T::type_traits()
            }

            fn value_traits(&self) -> TypeTraits {
                T::type_traits()
            }

            fn get(&self, key: &dyn Reflect) -> Option<&dyn Reflect> {
                let key = key.downcast_ref::<T>()?;
                $set::get(self, key).map(|value| value as &dyn Reflect)
            }

            fn get_mut(&mut self, _key: &dyn Reflect) -> Option<&mut dyn Reflect> {
                None
            }

            fn insert(&mut self, key: Box<dyn Reflect>, _value: Option<Box<dyn Reflect>>) -> bool {
                match key.downcast::<T>() {
                    Ok(key) => {
                        $set::insert(self, *key);
                        true
                    }
                    Err(_) => false,
                }
            }

            fn remove(&mut self, key: &dyn Reflect) -> bool {
                key.downcast_ref::<T>()
                    .is_some_and(|key| $set::remove(self, key))
            }

            fn is_set(&self) -> bool {
                true
            }
        }
    };
}

type StdHashMap<K, V, S> = std::collections::HashMap<K, V, S>;
type StdHashSet<T, S> = std::collections::HashSet<T, S>;
type HashbrownMap<K, V, S> = hashbrown::HashMap<K, V, S>;
type HashbrownSet<T, S> = hashbrown::HashSet<T, S>;

keyed_map!(StdHashMap<K, V, S> where K: Eq, Hash);
keyed_map!(HashbrownMap<K, V, S> where K: Eq, Hash);
keyed_map!(BTreeMap<K, V> where K: Ord);
keyed_set!(StdHashSet<T, S> where T: Eq, Hash);
keyed_set!(HashbrownSet<T, S> where T: Eq, Hash);
keyed_set!(BTreeSet<T> where T: Ord);

/// A nullable slot whose value may be of any type assignable to `A`.
///
/// `A` is normally an abstract or interface marker type (see
/// [`TypeTraits::abstract_type`]); concrete types opt in with
/// [`TypeTraits::implements`]. Visitors and paths look through the slot to the
/// runtime value, and construct/transfer use the runtime type to decide whether
/// the held instance can be kept.
///
/// ```rust
/// use understory_properties::{Dyn, TypeTraits, Typed};
///
/// #[derive(Clone, Default)]
/// struct Shape;
///
/// impl Typed for Shape {
///     fn type_traits() -> TypeTraits {
///         TypeTraits::abstract_type::<Self>()
///     }
/// }
///
/// #[derive(Clone, Default)]
/// struct Circle {
///     radius: f32,
/// }
///
/// impl Typed for Circle {
///     fn type_traits() -> TypeTraits {
///         TypeTraits::value::<Self>().implements::<Shape>()
///     }
/// }
///
/// let mut slot = Dyn::<Shape>::null();
/// assert!(slot.is_null());
/// slot.set(Box::new(Circle { radius: 2.0 })).unwrap();
/// assert_eq!(slot.downcast_ref::<Circle>().map(|c| c.radius), Some(2.0));
/// assert!(slot.set(Box::new(3_i32)).is_err());
/// ```
pub struct Dyn<A> {
    value: Option<Box<dyn Reflect>>,
    marker: PhantomData<fn() -> A>,
}

impl<A: Typed> Dyn<A> {
    /// An empty slot.
    #[must_use]
    pub fn null() -> Self {
        Self {
            value: None,
            marker: PhantomData,
        }
    }

    /// A slot holding `value`.
    ///
    /// `T` is expected to be assignable to `A`; this is checked in debug builds.
    #[must_use]
    pub fn new<T: Typed>(value: T) -> Self {
        debug_assert!(
            T::type_traits().is_assignable_to(&A::type_traits()),
            "`{}` is not assignable to `{}`",
            core::any::type_name::<T>(),
            core::any::type_name::<A>(),
        );
        Self {
            value: Some(Box::new(value)),
            marker: PhantomData,
        }
    }

    /// Replaces the held value, handing it back if its type is not assignable to `A`.
    pub fn set(&mut self, value: Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>> {
        if !value.runtime_traits().is_assignable_to(&A::type_traits()) {
            return Err(value);
        }
        self.value = Some(value);
        Ok(())
    }

    /// The held value.
    #[must_use]
    pub fn get(&self) -> Option<&dyn Reflect> {
        self.value.as_deref()
    }

    /// The held value, mutably.
    pub fn get_mut(&mut self) -> Option<&mut dyn Reflect> {
        self.value.as_deref_mut()
    }

    /// Borrows the held value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Typed>(&self) -> Option<&T> {
        self.get()?.downcast_ref::<T>()
    }

    /// Mutably borrows the held value as `T`.
    pub fn downcast_mut<T: Typed>(&mut self) -> Option<&mut T> {
        self.get_mut()?.downcast_mut::<T>()
    }

    /// Returns `true` if the slot is empty.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Empties the slot, returning what it held.
    pub fn take(&mut self) -> Option<Box<dyn Reflect>> {
        self.value.take()
    }
}

impl<A> Clone for Dyn<A> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            marker: PhantomData,
        }
    }
}

impl<A> Default for Dyn<A> {
    fn default() -> Self {
        Self {
            value: None,
            marker: PhantomData,
        }
    }
}

impl<A> fmt::Debug for Dyn<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dyn")
            .field("declared", &core::any::type_name::<A>())
            .field("value", &self.value)
            .finish()
    }
}

impl<A: Typed> Typed for Dyn<A> {
    fn type_traits() -> TypeTraits {
        TypeTraits::new::<Self>(TypeFlags::INDIRECT)
            .with_underlying(A::type_traits)
            .with_constructor(construct_default::<Self>)
    }

    fn as_indirect(&self) -> Option<&dyn IndirectAccess> {
        Some(self)
    }

    fn as_indirect_mut(&mut self) -> Option<&mut dyn IndirectAccess> {
        Some(self)
    }
}

impl<A: Typed> IndirectAccess for Dyn<A> {
    fn value(&self) -> Option<&dyn Reflect> {
        self.get()
    }

    fn value_mut(&mut self) -> Option<&mut dyn Reflect> {
        self.get_mut()
    }

    fn declared_traits(&self) -> TypeTraits {
        A::type_traits()
    }

    fn set_null(&mut self) {
        self.value = None;
    }

    fn set_value(&mut self, value: Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>> {
        self.set(value)
    }

    fn accepts(&self, traits: &TypeTraits) -> bool {
        traits.is_assignable_to(&A::type_traits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Clone, Default)]
    struct Animal;

    impl Typed for Animal {
        fn type_traits() -> TypeTraits {
            TypeTraits::interface::<Self>()
        }
    }

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Dog {
        name: String,
    }

    impl Typed for Dog {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>().implements::<Animal>()
        }
    }

    #[test]
    fn list_set_count_grows_and_truncates() {
        let mut list = vec![1_i32, 2, 3];
        let access: &mut dyn ListAccess = &mut list;
        access.set_count(5);
        assert_eq!(access.count(), 5);
        access.set_count(1);
        assert_eq!(list, [1]);
    }

    #[test]
    fn boxed_slice_resizes_by_reallocating() {
        let mut array: Box<[u8]> = Box::new([1, 2]);
        ListAccess::set_count(&mut array, 4);
        assert_eq!(&*array, &[1, 2, 0, 0]);
        assert!(<Box<[u8]>>::type_traits().is_array());
    }

    #[test]
    fn multi_array_is_row_major() {
        let mut grid = MultiArray::<i32>::new(&[2, 3]);
        *grid.get_mut(&[1, 2]).unwrap() = 9;
        assert_eq!(grid.as_slice()[5], 9);
        assert_eq!(grid.get(&[2, 0]), None);
        assert_eq!(grid.get(&[0]), None);
        assert!(<MultiArray<i32>>::type_traits().is_multi_dimensional_array());
    }

    #[test]
    fn map_access_round_trips_entries() {
        let mut map = HashMap::<String, i32>::new();
        let access: &mut dyn KeyedAccess = &mut map;
        assert!(access.insert(Box::new(String::from("a")), Some(Box::new(1_i32))));
        assert!(!access.insert(Box::new(1_u8), Some(Box::new(1_i32))));
        assert!(!access.insert(Box::new(String::from("b")), None));
        let key = String::from("a");
        *access.get_mut(&key).unwrap().downcast_mut::<i32>().unwrap() = 5;
        assert_eq!(access.count(), 1);
        assert!(access.remove(&key));
        assert!(map.is_empty());
    }

    #[test]
    fn set_elements_are_read_only_in_place() {
        let mut set = BTreeSet::from([1_i32, 2]);
        let access: &mut dyn KeyedAccess = &mut set;
        assert!(access.is_set());
        assert!(access.get(&1_i32).is_some());
        assert!(access.get_mut(&1_i32).is_none());
        assert_eq!(access.keys().len(), 2);
    }

    #[test]
    fn dyn_slot_checks_assignability() {
        let mut slot = Dyn::<Animal>::null();
        assert!(slot.set(Box::new(1_i32)).is_err());
        assert!(slot.is_null());
        slot.set(Box::new(Dog {
            name: "Rex".into(),
        }))
        .unwrap();
        let copy = slot.clone();
        assert_eq!(copy.downcast_ref::<Dog>().map(|d| d.name.as_str()), Some("Rex"));
        assert!(slot.take().is_some());
        assert!(slot.is_null());
    }

    #[test]
    fn option_accepts_only_its_underlying_type() {
        let mut slot: Option<i32> = None;
        let access: &mut dyn IndirectAccess = &mut slot;
        assert!(access.accepts(&i32::type_traits()));
        assert!(!access.accepts(&i64::type_traits()));
        assert!(access.set_value(Box::new(1_i64)).is_err());
        access.set_value(Box::new(4_i32)).unwrap();
        assert_eq!(slot, Some(4));
    }
}
