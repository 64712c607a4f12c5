// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property bags: the ordered property list of one container type.

use core::any::Any;
use core::fmt;

use hashbrown::HashMap;

use crate::collection::AnyProperty;
use crate::error::Error;
use crate::path::PropertyPath;
use crate::property::{ContainerProperty, PropertyInfo};
use crate::reflect::{Reflect, Typed};
use crate::traits::TypeTraits;

/// How a bag came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BagSource {
    /// Built by hand and registered with the store.
    Registered,
    /// Synthesized from [`Typed::describe`].
    Reflected,
}

/// The properties of container type `C`, in declaration order.
///
/// Names are unique. Bags are immutable once built and are shared through the
/// [`PropertyBagStore`](crate::PropertyBagStore).
///
/// ```rust
/// use understory_properties::{Property, PropertyBag, TypeTraits, Typed};
///
/// #[derive(Clone, Default)]
/// struct Point {
///     x: f32,
///     y: f32,
/// }
///
/// impl Typed for Point {
///     fn type_traits() -> TypeTraits {
///         TypeTraits::value::<Self>()
///     }
/// }
///
/// let bag = PropertyBag::<Point>::builder()
///     .with(Property::field("x", |p: &Point| &p.x, |p| &mut p.x))
///     .with(Property::field("y", |p: &Point| &p.y, |p| &mut p.y))
///     .build()
///     .unwrap();
/// assert_eq!(bag.len(), 2);
/// assert!(bag.get("y").is_some());
///
/// let duplicate = PropertyBag::<Point>::builder()
///     .with(Property::field("x", |p: &Point| &p.x, |p| &mut p.x))
///     .with(Property::field("x", |p: &Point| &p.y, |p| &mut p.y))
///     .build();
/// assert!(duplicate.is_err());
/// ```
pub struct PropertyBag<C> {
    traits: TypeTraits,
    properties: Vec<AnyProperty<C>>,
    by_name: HashMap<String, usize>,
    source: BagSource,
}

impl<C: Typed> PropertyBag<C> {
    /// Starts a hand-written bag.
    #[must_use]
    pub fn builder() -> PropertyBagBuilder<C> {
        PropertyBagBuilder {
            properties: Vec::new(),
        }
    }

    pub(crate) fn from_properties(
        properties: Vec<AnyProperty<C>>,
        source: BagSource,
    ) -> Result<Self, Error> {
        let traits = C::type_traits();
        let mut by_name = HashMap::with_capacity(properties.len());
        for (index, property) in properties.iter().enumerate() {
            let name = property.property().name();
            if by_name.insert(name.to_owned(), index).is_some() {
                return Err(Error::DuplicateProperty {
                    container: traits.name(),
                    name: name.to_owned(),
                });
            }
        }
        Ok(Self {
            traits,
            properties,
            by_name,
            source,
        })
    }

    /// Properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[AnyProperty<C>] {
        &self.properties
    }

    /// Property named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AnyProperty<C>> {
        self.by_name.get(name).map(|&index| &self.properties[index])
    }

    /// Position of the property named `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if the bag has no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// How the bag was created.
    #[must_use]
    pub fn source(&self) -> BagSource {
        self.source
    }

    /// Traits of the container type.
    #[must_use]
    pub fn container_traits(&self) -> &TypeTraits {
        &self.traits
    }

    fn at(&self, index: usize) -> Result<&dyn ContainerProperty<C>, Error> {
        self.properties
            .get(index)
            .map(AnyProperty::property)
            .ok_or_else(|| Error::PropertyNotFound {
                path: PropertyPath::new(),
                name: format!("#{index}"),
            })
    }

    fn container<'c>(&self, container: &'c dyn Reflect) -> Result<&'c C, Error> {
        container.downcast_ref::<C>().ok_or(Error::TypeMismatch {
            expected: self.traits.name(),
            found: container.runtime_traits().name(),
        })
    }

    fn container_mut<'c>(&self, container: &'c mut dyn Reflect) -> Result<&'c mut C, Error> {
        let found = container.runtime_traits().name();
        container.downcast_mut::<C>().ok_or(Error::TypeMismatch {
            expected: self.traits.name(),
            found,
        })
    }
}

impl<C> fmt::Debug for PropertyBag<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBag")
            .field("container", &self.traits.name())
            .field("source", &self.source)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// Collects properties for a hand-written [`PropertyBag`].
pub struct PropertyBagBuilder<C> {
    properties: Vec<AnyProperty<C>>,
}

impl<C: Typed> PropertyBagBuilder<C> {
    /// Appends a property.
    #[must_use]
    pub fn with(self, property: impl ContainerProperty<C> + 'static) -> Self {
        self.with_boxed(Box::new(property))
    }

    /// Appends an already boxed property.
    #[must_use]
    pub fn with_boxed(mut self, property: Box<dyn ContainerProperty<C>>) -> Self {
        self.properties.push(AnyProperty::new(property));
        self
    }

    /// Finishes the bag, failing if two properties share a name.
    pub fn build(self) -> Result<PropertyBag<C>, Error> {
        PropertyBag::from_properties(self.properties, BagSource::Registered)
    }
}

impl<C> fmt::Debug for PropertyBagBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBagBuilder")
            .field("properties", &self.properties)
            .finish()
    }
}

/// A [`PropertyBag`] with its container type erased.
///
/// Containers are passed as `&dyn Reflect`; a container of the wrong type is
/// reported as [`Error::TypeMismatch`].
pub trait ErasedBag: Any + Send + Sync {
    /// Traits of the container type.
    fn container_traits(&self) -> &TypeTraits;

    /// How the bag was created.
    fn source(&self) -> BagSource;

    /// Number of properties.
    fn len(&self) -> usize;

    /// Returns `true` if the bag has no properties.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata of property `index`.
    fn info(&self, index: usize) -> Option<&dyn PropertyInfo>;

    /// Position of the property named `name`.
    fn index_of(&self, name: &str) -> Option<usize>;

    /// Lends the value of property `index` to `f`.
    fn read_value(
        &self,
        container: &dyn Reflect,
        index: usize,
        f: &mut dyn FnMut(&dyn Reflect) -> Result<(), Error>,
    ) -> Result<(), Error>;

    /// Lends the value of property `index` to `f` for modification.
    ///
    /// See [`ContainerProperty::visit_value`].
    fn visit_value(
        &self,
        container: &mut dyn Reflect,
        index: usize,
        f: &mut dyn FnMut(&mut dyn Reflect) -> Result<bool, Error>,
    ) -> Result<bool, Error>;

    /// Boxes a copy of the value of property `index`.
    fn get_value(&self, container: &dyn Reflect, index: usize) -> Result<Box<dyn Reflect>, Error>;

    /// Stores `value` into property `index`.
    ///
    /// The value is handed back if it has the wrong type, the property is
    /// read-only, or `container` is not of the bag's type.
    fn set_value(
        &self,
        container: &mut dyn Reflect,
        index: usize,
        value: Box<dyn Reflect>,
    ) -> Result<(), Box<dyn Reflect>>;

    /// Upcast used by `downcast_ref`.
    fn as_any(&self) -> &dyn Any;
}

impl<C: Typed> ErasedBag for PropertyBag<C> {
    fn container_traits(&self) -> &TypeTraits {
        &self.traits
    }

    fn source(&self) -> BagSource {
        self.source
    }

    fn len(&self) -> usize {
        self.properties.len()
    }

    fn info(&self, index: usize) -> Option<&dyn PropertyInfo> {
        self.properties
            .get(index)
            .map(|property| property.property() as &dyn PropertyInfo)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        Self::index_of(self, name)
    }

    fn read_value(
        &self,
        container: &dyn Reflect,
        index: usize,
        f: &mut dyn FnMut(&dyn Reflect) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.at(index)?.read_value(self.container(container)?, f)
    }

    fn visit_value(
        &self,
        container: &mut dyn Reflect,
        index: usize,
        f: &mut dyn FnMut(&mut dyn Reflect) -> Result<bool, Error>,
    ) -> Result<bool, Error> {
        self.at(index)?.visit_value(self.container_mut(container)?, f)
    }

    fn get_value(&self, container: &dyn Reflect, index: usize) -> Result<Box<dyn Reflect>, Error> {
        Ok(self.at(index)?.get_value(self.container(container)?))
    }

    fn set_value(
        &self,
        container: &mut dyn Reflect,
        index: usize,
        value: Box<dyn Reflect>,
    ) -> Result<(), Box<dyn Reflect>> {
        let (Ok(property), Some(container)) = (self.at(index), container.downcast_mut::<C>())
        else {
            return Err(value);
        };
        property.set_value(container, value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn ErasedBag {
    /// Metadata of every property, in order.
    pub fn properties(&self) -> impl Iterator<Item = &dyn PropertyInfo> + '_ {
        (0..self.len()).filter_map(|index| self.info(index))
    }

    /// Metadata of the property named `name`.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&dyn PropertyInfo> {
        self.index_of(name).and_then(|index| self.info(index))
    }

    /// The typed bag, if the container type is `C`.
    #[must_use]
    pub fn downcast_ref<C: Typed>(&self) -> Option<&PropertyBag<C>> {
        self.as_any().downcast_ref::<PropertyBag<C>>()
    }
}

impl fmt::Debug for dyn ErasedBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedBag")
            .field("container", &self.container_traits().name())
            .field("source", &self.source())
            .field("len", &self.len())
            .finish()
    }
}
