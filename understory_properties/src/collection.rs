// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape-specific wrappers around container properties.
//!
//! Bags store every property as an [`AnyProperty`], classified once when the
//! bag is built. Collection variants add count and element access on top of the
//! scalar surface.

use core::fmt;

use crate::error::Error;
use crate::property::{CollectionElementProperty, ContainerProperty, ElementPosition, PropertyKind};
use crate::reflect::{KeyedAccess, Reflect};

/// A property of `C`, classified by the shape of its value.
pub enum AnyProperty<C> {
    /// A single value.
    Scalar(Box<dyn ContainerProperty<C>>),
    /// A list or array.
    Collection(CollectionProperty<C>),
    /// A map or set.
    KeyedCollection(KeyedCollectionProperty<C>),
}

impl<C: 'static> AnyProperty<C> {
    /// Classifies `property` by its declared value type.
    #[must_use]
    pub fn new(property: Box<dyn ContainerProperty<C>>) -> Self {
        match property.kind() {
            PropertyKind::Scalar => Self::Scalar(property),
            PropertyKind::Collection => Self::Collection(CollectionProperty { inner: property }),
            PropertyKind::KeyedCollection => {
                Self::KeyedCollection(KeyedCollectionProperty { inner: property })
            }
        }
    }

    /// The erased property, whatever its shape.
    #[must_use]
    pub fn property(&self) -> &dyn ContainerProperty<C> {
        match self {
            Self::Scalar(property) => &**property,
            Self::Collection(collection) => &*collection.inner,
            Self::KeyedCollection(keyed) => &*keyed.inner,
        }
    }

    /// Unwraps into the erased property.
    #[must_use]
    pub fn into_property(self) -> Box<dyn ContainerProperty<C>> {
        match self {
            Self::Scalar(property) => property,
            Self::Collection(collection) => collection.inner,
            Self::KeyedCollection(keyed) => keyed.inner,
        }
    }

    /// Shape of the value.
    #[must_use]
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Scalar(_) => PropertyKind::Scalar,
            Self::Collection(_) => PropertyKind::Collection,
            Self::KeyedCollection(_) => PropertyKind::KeyedCollection,
        }
    }

    /// The collection view, for list and array properties.
    #[must_use]
    pub fn as_collection(&self) -> Option<&CollectionProperty<C>> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// The keyed view, for map and set properties.
    #[must_use]
    pub fn as_keyed(&self) -> Option<&KeyedCollectionProperty<C>> {
        match self {
            Self::KeyedCollection(keyed) => Some(keyed),
            _ => None,
        }
    }
}

impl<C> fmt::Debug for AnyProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, name) = match self {
            Self::Scalar(property) => ("Scalar", property.name()),
            Self::Collection(collection) => ("Collection", collection.inner.name()),
            Self::KeyedCollection(keyed) => ("KeyedCollection", keyed.inner.name()),
        };
        f.debug_tuple(kind).field(&name).finish()
    }
}

/// A list or array property.
///
/// A null `Option<Vec<_>>` has a count of zero; resizing it allocates.
pub struct CollectionProperty<C> {
    inner: Box<dyn ContainerProperty<C>>,
}

impl<C: 'static> CollectionProperty<C> {
    /// The erased property.
    #[must_use]
    pub fn property(&self) -> &dyn ContainerProperty<C> {
        &*self.inner
    }

    /// Number of elements.
    pub fn get_count(&self, container: &C) -> Result<usize, Error> {
        let mut count = 0;
        self.inner.read_value(container, &mut |value| {
            count = value.resolved().list().map_or(0, |list| list.count());
            Ok(())
        })?;
        Ok(count)
    }

    /// Grows with default elements or truncates from the end.
    ///
    /// Returns whether the container changed.
    pub fn set_count(&self, container: &mut C, count: usize) -> Result<bool, Error> {
        self.inner.visit_value(container, &mut |value| {
            let Some(list) = materialize(value).list_mut() else {
                return Ok(false);
            };
            if list.count() == count {
                return Ok(false);
            }
            list.set_count(count);
            Ok(true)
        })
    }

    /// Removes every element.
    pub fn clear(&self, container: &mut C) -> Result<bool, Error> {
        self.inner.visit_value(container, &mut |value| {
            match value.resolved_mut().list_mut() {
                Some(list) if list.count() > 0 => {
                    list.clear();
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    /// Lends element `index` and a property describing it to `f`.
    ///
    /// Returns `None` when the index is out of range or the collection is null.
    pub fn get_element_at<R>(
        &self,
        container: &mut C,
        index: usize,
        f: impl FnOnce(&CollectionElementProperty, &mut dyn Reflect) -> R,
    ) -> Result<Option<R>, Error> {
        let read_only = self.inner.is_read_only();
        let mut f = Some(f);
        let mut result = None;
        self.inner.visit_value(container, &mut |value| {
            let Some(list) = value.resolved_mut().list_mut() else {
                return Ok(false);
            };
            let traits = list.element_traits();
            let (Some(element), Some(f)) = (list.element_mut(index), f.take()) else {
                return Ok(false);
            };
            let property =
                CollectionElementProperty::new(ElementPosition::Index(index), traits, read_only);
            result = Some(f(&property, element));
            Ok(true)
        })?;
        Ok(result)
    }
}

impl<C> fmt::Debug for CollectionProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionProperty")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

/// A map or set property.
pub struct KeyedCollectionProperty<C> {
    inner: Box<dyn ContainerProperty<C>>,
}

impl<C: 'static> KeyedCollectionProperty<C> {
    /// The erased property.
    #[must_use]
    pub fn property(&self) -> &dyn ContainerProperty<C> {
        &*self.inner
    }

    /// Number of entries.
    pub fn get_count(&self, container: &C) -> Result<usize, Error> {
        let mut count = 0;
        self.inner.read_value(container, &mut |value| {
            count = value.resolved().keyed().map_or(0, |keyed| keyed.count());
            Ok(())
        })?;
        Ok(count)
    }

    /// Snapshot of the keys.
    pub fn keys(&self, container: &C) -> Result<Vec<Box<dyn Reflect>>, Error> {
        let mut keys = Vec::new();
        self.inner.read_value(container, &mut |value| {
            if let Some(keyed) = value.resolved().keyed() {
                keys = keyed.keys();
            }
            Ok(())
        })?;
        Ok(keys)
    }

    /// Removes every entry.
    pub fn clear(&self, container: &mut C) -> Result<bool, Error> {
        self.inner.visit_value(container, &mut |value| {
            match value.resolved_mut().keyed_mut() {
                Some(keyed) if keyed.count() > 0 => {
                    keyed.clear();
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    /// Lends the value stored under `key` to `f`.
    ///
    /// Set elements are not editable in place, so `f` receives a copy that is
    /// re-inserted afterwards. `name` is the text form of the key used for the
    /// element property.
    pub fn get_element<R>(
        &self,
        container: &mut C,
        key: &dyn Reflect,
        name: &str,
        f: impl FnOnce(&CollectionElementProperty, &mut dyn Reflect) -> R,
    ) -> Result<Option<R>, Error> {
        let read_only = self.inner.is_read_only();
        let mut f = Some(f);
        let mut result = None;
        self.inner.visit_value(container, &mut |value| {
            let Some(keyed) = value.resolved_mut().keyed_mut() else {
                return Ok(false);
            };
            let Some(f) = f.take() else {
                return Ok(false);
            };
            let property = CollectionElementProperty::new(
                ElementPosition::Key(name.into()),
                keyed.value_traits(),
                read_only,
            );
            if keyed.is_set() {
                let Some(mut element) = keyed.get(key).map(Reflect::clone_boxed) else {
                    return Ok(false);
                };
                result = Some(f(&property, &mut *element));
                keyed.remove(key);
                keyed.insert(element, None);
                return Ok(true);
            }
            let Some(element) = keyed.get_mut(key) else {
                return Ok(false);
            };
            result = Some(f(&property, element));
            Ok(true)
        })?;
        Ok(result)
    }
}

impl<C> fmt::Debug for KeyedCollectionProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCollectionProperty")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

/// Follows slots to the collection, filling an empty `Option` with a default first.
pub(crate) fn materialize(value: &mut dyn Reflect) -> &mut dyn Reflect {
    if value.is_null() {
        if let Some(slot) = value.indirect_mut() {
            let declared = slot.declared_traits();
            if let Some(constructor) = declared.constructor() {
                let stored = slot.set_value(constructor());
                debug_assert!(stored.is_ok(), "a slot accepts its declared type");
            }
        }
    }
    value.resolved_mut()
}

/// Swaps set element `old` for its edited copy.
///
/// Returns `false` when the edited element equals another entry, so the two
/// collapsed into one.
pub(crate) fn replace_set_element(
    keyed: &mut dyn KeyedAccess,
    old: &dyn Reflect,
    element: Box<dyn Reflect>,
) -> bool {
    keyed.remove(old);
    let collides = keyed.get(&*element).is_some();
    let inserted = keyed.insert(element, None);
    debug_assert!(inserted, "an edited set element keeps its type");
    !collides
}
