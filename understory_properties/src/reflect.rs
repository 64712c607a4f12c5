// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The erased value model.
//!
//! [`Typed`] is implemented once per concrete type and carries everything
//! static: [`TypeTraits`], an optional member description, and the shape
//! accessors for collections and nullable slots. [`Reflect`] is the object-safe
//! view of a `Typed` value that the visitor, the path walker and the
//! construct/transfer walker operate on. Every `Typed` type is `Reflect`
//! through a blanket impl.

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use crate::bag::ErasedBag;
use crate::describe::TypeDescriptor;
use crate::error::Error;
use crate::store::PropertyBagStore;
use crate::traits::TypeTraits;

/// A concrete type that can take part in introspection.
///
/// Only [`Typed::type_traits`] is required. Container types also override
/// [`Typed::describe`] to list their members; collection and nullable types
/// override the matching shape accessor.
///
/// ```rust
/// use understory_properties::{TypeDescriptor, TypeTraits, Typed};
///
/// #[derive(Clone, Default)]
/// struct Size {
///     width: f32,
///     height: f32,
/// }
///
/// impl Typed for Size {
///     fn type_traits() -> TypeTraits {
///         TypeTraits::value::<Self>()
///     }
///
///     fn describe() -> Option<TypeDescriptor<Self>> {
///         Some(
///             TypeDescriptor::<Self>::new()
///                 .field("width", |s| &s.width, |s| &mut s.width)
///                 .field("height", |s| &s.height, |s| &mut s.height),
///         )
///     }
/// }
/// ```
pub trait Typed: Any + Clone {
    /// Static facts about this type.
    fn type_traits() -> TypeTraits;

    /// Members for reflection-based bag synthesis.
    fn describe() -> Option<TypeDescriptor<Self>> {
        None
    }

    /// Index-addressable view, for lists and arrays.
    fn as_list(&self) -> Option<&dyn ListAccess> {
        None
    }

    /// Mutable index-addressable view.
    fn as_list_mut(&mut self) -> Option<&mut dyn ListAccess> {
        None
    }

    /// Keyed view, for maps and sets.
    fn as_keyed(&self) -> Option<&dyn KeyedAccess> {
        None
    }

    /// Mutable keyed view.
    fn as_keyed_mut(&mut self) -> Option<&mut dyn KeyedAccess> {
        None
    }

    /// Slot view, for nullable and polymorphic values.
    fn as_indirect(&self) -> Option<&dyn IndirectAccess> {
        None
    }

    /// Mutable slot view.
    fn as_indirect_mut(&mut self) -> Option<&mut dyn IndirectAccess> {
        None
    }
}

/// Object-safe view of a [`Typed`] value.
pub trait Reflect: Any + 'static {
    /// Traits of the runtime type.
    fn runtime_traits(&self) -> TypeTraits;

    /// [`TypeId`] of the runtime type.
    fn value_type_id(&self) -> TypeId;

    /// Upcast to [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast to [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Owned upcast to [`Any`].
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Clones into a new box.
    fn clone_boxed(&self) -> Box<dyn Reflect>;

    /// Replaces `self` with `value` when the runtime types match.
    ///
    /// On mismatch the value is handed back untouched.
    fn assign(&mut self, value: Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>>;

    /// See [`Typed::as_list`].
    fn list(&self) -> Option<&dyn ListAccess>;

    /// See [`Typed::as_list_mut`].
    fn list_mut(&mut self) -> Option<&mut dyn ListAccess>;

    /// See [`Typed::as_keyed`].
    fn keyed(&self) -> Option<&dyn KeyedAccess>;

    /// See [`Typed::as_keyed_mut`].
    fn keyed_mut(&mut self) -> Option<&mut dyn KeyedAccess>;

    /// See [`Typed::as_indirect`].
    fn indirect(&self) -> Option<&dyn IndirectAccess>;

    /// See [`Typed::as_indirect_mut`].
    fn indirect_mut(&mut self) -> Option<&mut dyn IndirectAccess>;

    /// Looks up (or synthesizes) the property bag of the runtime type.
    fn resolve_bag(&self, store: &PropertyBagStore) -> Result<Option<Arc<dyn ErasedBag>>, Error>;
}

impl<T: Typed> Reflect for T {
    fn runtime_traits(&self) -> TypeTraits {
        T::type_traits()
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_boxed(&self) -> Box<dyn Reflect> {
        Box::new(self.clone())
    }

    fn assign(&mut self, value: Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>> {
        *self = *value.downcast::<T>()?;
        Ok(())
    }

    fn list(&self) -> Option<&dyn ListAccess> {
        self.as_list()
    }

    fn list_mut(&mut self) -> Option<&mut dyn ListAccess> {
        self.as_list_mut()
    }

    fn keyed(&self) -> Option<&dyn KeyedAccess> {
        self.as_keyed()
    }

    fn keyed_mut(&mut self) -> Option<&mut dyn KeyedAccess> {
        self.as_keyed_mut()
    }

    fn indirect(&self) -> Option<&dyn IndirectAccess> {
        self.as_indirect()
    }

    fn indirect_mut(&mut self) -> Option<&mut dyn IndirectAccess> {
        self.as_indirect_mut()
    }

    fn resolve_bag(&self, store: &PropertyBagStore) -> Result<Option<Arc<dyn ErasedBag>>, Error> {
        store.resolve::<T>()
    }
}

impl dyn Reflect {
    /// Returns `true` if the runtime type is `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value_type_id() == TypeId::of::<T>()
    }

    /// Borrows as `T` when the runtime type matches.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrows as `T` when the runtime type matches.
    #[must_use]
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Unboxes as `T`, handing the box back on mismatch.
    pub fn downcast<T: Any>(self: Box<Self>) -> Result<Box<T>, Box<Self>> {
        if !self.is::<T>() {
            return Err(self);
        }
        match self.into_any().downcast::<T>() {
            Ok(value) => Ok(value),
            Err(_) => unreachable!("runtime type was checked above"),
        }
    }

    /// Follows non-null slots down to the value they hold.
    #[must_use]
    pub fn resolved(&self) -> &Self {
        let mut value = self;
        while let Some(inner) = value.indirect().and_then(IndirectAccess::value) {
            value = inner;
        }
        value
    }

    /// Mutable form of [`resolved`](Self::resolved).
    pub fn resolved_mut(&mut self) -> &mut Self {
        if self.indirect().and_then(IndirectAccess::value).is_none() {
            return self;
        }
        match self.indirect_mut().and_then(IndirectAccess::value_mut) {
            Some(inner) => inner.resolved_mut(),
            None => unreachable!("slot reported a value through its shared view"),
        }
    }

    /// Returns `true` for a slot that holds nothing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.indirect().is_some_and(|slot| slot.value().is_none())
    }
}

impl Clone for Box<dyn Reflect> {
    fn clone(&self) -> Self {
        (**self).clone_boxed()
    }
}

impl fmt::Debug for dyn Reflect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reflect")
            .field(&self.runtime_traits().name())
            .finish()
    }
}

/// Index-addressable collection.
pub trait ListAccess {
    /// Number of elements.
    fn count(&self) -> usize;

    /// Grows with default elements or truncates.
    fn set_count(&mut self, count: usize);

    /// Removes every element.
    fn clear(&mut self);

    /// Borrows element `index`.
    fn element(&self, index: usize) -> Option<&dyn Reflect>;

    /// Mutably borrows element `index`.
    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    /// Declared element type.
    fn element_traits(&self) -> TypeTraits;
}

/// Keyed collection: a map, or a set whose keys are also its values.
pub trait KeyedAccess {
    /// Number of entries.
    fn count(&self) -> usize;

    /// Removes every entry.
    fn clear(&mut self);

    /// Snapshot of the keys in iteration order.
    fn keys(&self) -> Vec<Box<dyn Reflect>>;

    /// Declared key type.
    fn key_traits(&self) -> TypeTraits;

    /// Declared value type; the key type for sets.
    fn value_traits(&self) -> TypeTraits;

    /// Borrows the value stored under `key`; sets return the element itself.
    fn get(&self, key: &dyn Reflect) -> Option<&dyn Reflect>;

    /// Mutably borrows the value stored under `key`.
    ///
    /// Always `None` for sets, whose elements cannot be edited in place.
    fn get_mut(&mut self, key: &dyn Reflect) -> Option<&mut dyn Reflect>;

    /// Inserts or replaces an entry.
    ///
    /// Maps require a value; sets ignore it. Returns `false` if either part has
    /// the wrong runtime type.
    fn insert(&mut self, key: Box<dyn Reflect>, value: Option<Box<dyn Reflect>>) -> bool;

    /// Removes an entry, returning whether it existed.
    fn remove(&mut self, key: &dyn Reflect) -> bool;

    /// `true` for sets.
    fn is_set(&self) -> bool;
}

/// A slot that may be empty: `Option<T>` or [`Dyn`](crate::Dyn).
pub trait IndirectAccess {
    /// The held value.
    fn value(&self) -> Option<&dyn Reflect>;

    /// The held value, mutably.
    fn value_mut(&mut self) -> Option<&mut dyn Reflect>;

    /// Type the slot was declared with.
    fn declared_traits(&self) -> TypeTraits;

    /// Empties the slot.
    fn set_null(&mut self);

    /// Stores `value` if the slot [`accepts`](Self::accepts) its type.
    fn set_value(&mut self, value: Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>>;

    /// Whether values of type `traits` can be stored.
    fn accepts(&self, traits: &TypeTraits) -> bool;
}
