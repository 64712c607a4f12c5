// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Properties: typed accessors from a container to one of its members.
//!
//! A property is bound to exactly one container type `C` and one member. The
//! statically typed [`Property<C, V>`] borrows fields directly or goes through
//! getter/setter closures; [`ReflectedProperty<C>`] erases the value type and
//! boxes on every access. Both expose the object-safe [`ContainerProperty<C>`]
//! surface that bags and the visitor engine work with.

use core::fmt;
use std::sync::Arc;

use crate::attributes::{PropertyAttributeCollection, ReadOnly};
use crate::error::Error;
use crate::reflect::{Reflect, Typed};
use crate::traits::TypeTraits;

/// Which shape of member a property exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// A single value, container or leaf.
    Scalar,
    /// A list or array.
    Collection,
    /// A map or set.
    KeyedCollection,
}

impl PropertyKind {
    /// Classifies a value type, looking through `Option`.
    #[must_use]
    pub fn of(traits: &TypeTraits) -> Self {
        let traits = traits.through_nullable();
        if traits.is_list() {
            Self::Collection
        } else if traits.is_keyed() {
            Self::KeyedCollection
        } else {
            Self::Scalar
        }
    }
}

/// Metadata shared by every property, independent of the container type.
pub trait PropertyInfo: Send + Sync {
    /// Name, unique within the owning bag.
    fn name(&self) -> &str;

    /// Writes through this property are refused.
    fn is_read_only(&self) -> bool;

    /// Attached metadata.
    fn attributes(&self) -> &PropertyAttributeCollection;

    /// Declared value type.
    fn value_traits(&self) -> &TypeTraits;

    /// The value itself has (or may have) members to visit.
    fn is_container(&self) -> bool {
        let traits = self.value_traits();
        traits.is_container_type() && !traits.is_multi_dimensional_array()
    }

    /// Scalar, collection or keyed collection.
    fn kind(&self) -> PropertyKind {
        PropertyKind::of(self.value_traits())
    }
}

impl fmt::Debug for dyn PropertyInfo + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name())
            .field("value_type", &self.value_traits().name())
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

/// Erased access to one member of `C`.
pub trait ContainerProperty<C>: PropertyInfo {
    /// Boxes a copy of the current value.
    fn get_value(&self, container: &C) -> Box<dyn Reflect>;

    /// Stores `value`, handing it back if it has the wrong type or the property is read-only.
    fn set_value(&self, container: &mut C, value: Box<dyn Reflect>)
    -> Result<(), Box<dyn Reflect>>;

    /// Lends the current value to `f` without copying when possible.
    fn read_value(
        &self,
        container: &C,
        f: &mut dyn FnMut(&dyn Reflect) -> Result<(), Error>,
    ) -> Result<(), Error>;

    /// Lends the current value to `f` for modification.
    ///
    /// `f` reports whether it changed the value. Field properties lend the
    /// member in place; accessor properties lend a temporary that is written
    /// back when `f` reports a change. Read-only properties lend a temporary
    /// that is always discarded. Returns whether the container changed.
    fn visit_value(
        &self,
        container: &mut C,
        f: &mut dyn FnMut(&mut dyn Reflect) -> Result<bool, Error>,
    ) -> Result<bool, Error>;
}

type FieldRef<C, V> = Box<dyn Fn(&C) -> &V + Send + Sync>;
type FieldMut<C, V> = Box<dyn Fn(&mut C) -> &mut V + Send + Sync>;
type Getter<C, V> = Box<dyn Fn(&C) -> V + Send + Sync>;
type Setter<C, V> = Box<dyn Fn(&mut C, V) + Send + Sync>;

enum Access<C, V> {
    Field { get: FieldRef<C, V>, get_mut: FieldMut<C, V> },
    Accessor { get: Getter<C, V>, set: Option<Setter<C, V>> },
}

/// A statically typed property of `C` with value type `V`.
///
/// ```rust
/// use understory_properties::{ContainerProperty, Property, PropertyInfo};
///
/// #[derive(Clone, Default)]
/// struct Counter {
///     value: i32,
/// }
///
/// let value = Property::field("Value", |c: &Counter| &c.value, |c| &mut c.value);
/// let doubled = Property::read_only_accessor("Doubled", |c: &Counter| c.value * 2);
///
/// let mut counter = Counter { value: 4 };
/// assert!(value.set(&mut counter, 5).is_ok());
/// assert_eq!(doubled.get(&counter), 10);
/// assert!(doubled.is_read_only());
/// assert!(doubled.set_value(&mut counter, Box::new(1_i32)).is_err());
/// ```
pub struct Property<C, V> {
    name: String,
    attributes: PropertyAttributeCollection,
    read_only: bool,
    traits: TypeTraits,
    access: Access<C, V>,
}

impl<C: 'static, V: Typed> Property<C, V> {
    /// A property that borrows a field of `C`.
    #[must_use]
    pub fn field(
        name: impl Into<String>,
        get: impl Fn(&C) -> &V + Send + Sync + 'static,
        get_mut: impl Fn(&mut C) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        Self::with_access(
            name.into(),
            false,
            Access::Field {
                get: Box::new(get),
                get_mut: Box::new(get_mut),
            },
        )
    }

    /// A property computed by a getter and stored by a setter.
    #[must_use]
    pub fn accessor(
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
        set: impl Fn(&mut C, V) + Send + Sync + 'static,
    ) -> Self {
        Self::with_access(
            name.into(),
            false,
            Access::Accessor {
                get: Box::new(get),
                set: Some(Box::new(set)),
            },
        )
    }

    /// A property with a getter only.
    #[must_use]
    pub fn read_only_accessor(
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
    ) -> Self {
        Self::with_access(
            name.into(),
            true,
            Access::Accessor {
                get: Box::new(get),
                set: None,
            },
        )
    }

    fn with_access(name: String, read_only: bool, access: Access<C, V>) -> Self {
        Self {
            name,
            attributes: PropertyAttributeCollection::new(),
            read_only,
            traits: V::type_traits(),
            access,
        }
    }

    /// Attaches an attribute.
    #[must_use]
    pub fn with_attribute<A: core::any::Any + Send + Sync>(mut self, attribute: A) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attaches every attribute of `attributes`.
    #[must_use]
    pub fn with_attributes(mut self, attributes: &PropertyAttributeCollection) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Marks the property read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// A copy of the current value.
    pub fn get(&self, container: &C) -> V {
        match &self.access {
            Access::Field { get, .. } => get(container).clone(),
            Access::Accessor { get, .. } => get(container),
        }
    }

    /// Borrows the current value; only field properties can lend.
    pub fn get_ref<'c>(&self, container: &'c C) -> Option<&'c V> {
        match &self.access {
            Access::Field { get, .. } => Some(get(container)),
            Access::Accessor { .. } => None,
        }
    }

    /// Stores `value`, handing it back if the property is read-only.
    pub fn set(&self, container: &mut C, value: V) -> Result<(), V> {
        if self.is_read_only() {
            return Err(value);
        }
        match &self.access {
            Access::Field { get_mut, .. } => *get_mut(container) = value,
            Access::Accessor { set: Some(set), .. } => set(container, value),
            Access::Accessor { set: None, .. } => return Err(value),
        }
        Ok(())
    }
}

impl<C, V> PropertyInfo for Property<C, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only || self.attributes.has::<ReadOnly>()
    }

    fn attributes(&self) -> &PropertyAttributeCollection {
        &self.attributes
    }

    fn value_traits(&self) -> &TypeTraits {
        &self.traits
    }
}

impl<C: 'static, V: Typed> ContainerProperty<C> for Property<C, V> {
    fn get_value(&self, container: &C) -> Box<dyn Reflect> {
        Box::new(self.get(container))
    }

    fn set_value(
        &self,
        container: &mut C,
        value: Box<dyn Reflect>,
    ) -> Result<(), Box<dyn Reflect>> {
        if self.is_read_only() {
            return Err(value);
        }
        let value = value.downcast::<V>()?;
        self.set(container, *value)
            .map_err(|value| Box::new(value) as Box<dyn Reflect>)
    }

    fn read_value(
        &self,
        container: &C,
        f: &mut dyn FnMut(&dyn Reflect) -> Result<(), Error>,
    ) -> Result<(), Error> {
        match &self.access {
            Access::Field { get, .. } => f(get(container)),
            Access::Accessor { get, .. } => f(&get(container)),
        }
    }

    fn visit_value(
        &self,
        container: &mut C,
        f: &mut dyn FnMut(&mut dyn Reflect) -> Result<bool, Error>,
    ) -> Result<bool, Error> {
        if self.is_read_only() {
            let mut scratch = self.get(container);
            f(&mut scratch)?;
            return Ok(false);
        }
        match &self.access {
            Access::Field { get_mut, .. } => f(get_mut(container)),
            Access::Accessor { get, set } => {
                let mut value = get(container);
                let changed = f(&mut value)?;
                match set {
                    Some(set) if changed => {
                        set(container, value);
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }
}

impl<C, V> fmt::Debug for Property<C, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value_type", &self.traits.name())
            .field("read_only", &self.is_read_only())
            .field(
                "access",
                &match self.access {
                    Access::Field { .. } => "field",
                    Access::Accessor { .. } => "accessor",
                },
            )
            .finish_non_exhaustive()
    }
}

type ErasedGetter<C> = Box<dyn Fn(&C) -> Box<dyn Reflect> + Send + Sync>;
type ErasedSetter<C> =
    Box<dyn Fn(&mut C, Box<dyn Reflect>) -> Result<(), Box<dyn Reflect>> + Send + Sync>;

/// A property whose value type is only known at runtime.
///
/// Every read boxes a fresh copy and every write goes through a downcast.
/// Reflection-based bag synthesis uses this for accessor members.
pub struct ReflectedProperty<C> {
    name: String,
    attributes: PropertyAttributeCollection,
    read_only: bool,
    traits: TypeTraits,
    get: ErasedGetter<C>,
    set: Option<ErasedSetter<C>>,
}

impl<C: 'static> ReflectedProperty<C> {
    /// Erases a getter and setter for a member of type `V`.
    #[must_use]
    pub fn new<V: Typed>(
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
        set: impl Fn(&mut C, V) + Send + Sync + 'static,
    ) -> Self {
        let set: ErasedSetter<C> = Box::new(
            move |container: &mut C, value: Box<dyn Reflect>| -> Result<(), Box<dyn Reflect>> {
                set(container, *value.downcast::<V>()?);
                Ok(())
            },
        );
        Self::erase(name.into(), get, Some(set))
    }

    /// Erases a getter for a member of type `V`; the property is read-only.
    #[must_use]
    pub fn getter_only<V: Typed>(
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
    ) -> Self {
        Self::erase(name.into(), get, None)
    }

    fn erase<V: Typed>(
        name: String,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
        set: Option<ErasedSetter<C>>,
    ) -> Self {
        Self {
            name,
            attributes: PropertyAttributeCollection::new(),
            read_only: set.is_none(),
            traits: V::type_traits(),
            get: Box::new(move |container: &C| -> Box<dyn Reflect> { Box::new(get(container)) }),
            set,
        }
    }

    /// Attaches every attribute of `attributes`.
    #[must_use]
    pub fn with_attributes(mut self, attributes: &PropertyAttributeCollection) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Marks the property read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl<C> PropertyInfo for ReflectedProperty<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only || self.attributes.has::<ReadOnly>()
    }

    fn attributes(&self) -> &PropertyAttributeCollection {
        &self.attributes
    }

    fn value_traits(&self) -> &TypeTraits {
        &self.traits
    }
}

impl<C: 'static> ContainerProperty<C> for ReflectedProperty<C> {
    fn get_value(&self, container: &C) -> Box<dyn Reflect> {
        (self.get)(container)
    }

    fn set_value(
        &self,
        container: &mut C,
        value: Box<dyn Reflect>,
    ) -> Result<(), Box<dyn Reflect>> {
        match &self.set {
            Some(set) if !self.is_read_only() => set(container, value),
            _ => Err(value),
        }
    }

    fn read_value(
        &self,
        container: &C,
        f: &mut dyn FnMut(&dyn Reflect) -> Result<(), Error>,
    ) -> Result<(), Error> {
        f(&*(self.get)(container))
    }

    fn visit_value(
        &self,
        container: &mut C,
        f: &mut dyn FnMut(&mut dyn Reflect) -> Result<bool, Error>,
    ) -> Result<bool, Error> {
        let mut value = (self.get)(container);
        let changed = f(&mut *value)?;
        if !changed || self.is_read_only() {
            return Ok(false);
        }
        Ok(self.set_value(container, value).is_ok())
    }
}

impl<C> fmt::Debug for ReflectedProperty<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectedProperty")
            .field("name", &self.name)
            .field("value_type", &self.traits.name())
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

type BaseRef<C, B> = Arc<dyn Fn(&C) -> &B + Send + Sync>;
type BaseMut<C, B> = Arc<dyn Fn(&mut C) -> &mut B + Send + Sync>;

/// A property of an embedded base `B`, seen as a property of the outer `C`.
///
/// Rust has no inheritance; types that compose a base struct expose its
/// members this way.
pub struct Projected<C, B> {
    inner: Box<dyn ContainerProperty<B>>,
    get: BaseRef<C, B>,
    get_mut: BaseMut<C, B>,
}

impl<C: 'static, B: 'static> Projected<C, B> {
    /// Wraps `inner` behind the base accessors.
    #[must_use]
    pub fn new(
        inner: Box<dyn ContainerProperty<B>>,
        get: BaseRef<C, B>,
        get_mut: BaseMut<C, B>,
    ) -> Self {
        Self {
            inner,
            get,
            get_mut,
        }
    }
}

impl<C, B> PropertyInfo for Projected<C, B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn attributes(&self) -> &PropertyAttributeCollection {
        self.inner.attributes()
    }

    fn value_traits(&self) -> &TypeTraits {
        self.inner.value_traits()
    }
}

impl<C: 'static, B: 'static> ContainerProperty<C> for Projected<C, B> {
    fn get_value(&self, container: &C) -> Box<dyn Reflect> {
        self.inner.get_value((self.get)(container))
    }

    fn set_value(
        &self,
        container: &mut C,
        value: Box<dyn Reflect>,
    ) -> Result<(), Box<dyn Reflect>> {
        self.inner.set_value((self.get_mut)(container), value)
    }

    fn read_value(
        &self,
        container: &C,
        f: &mut dyn FnMut(&dyn Reflect) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.inner.read_value((self.get)(container), f)
    }

    fn visit_value(
        &self,
        container: &mut C,
        f: &mut dyn FnMut(&mut dyn Reflect) -> Result<bool, Error>,
    ) -> Result<bool, Error> {
        self.inner.visit_value((self.get_mut)(container), f)
    }
}

impl<C, B> fmt::Debug for Projected<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projected")
            .field("name", &self.inner.name())
            .field("base", &core::any::type_name::<B>())
            .finish_non_exhaustive()
    }
}

/// Where an element sits inside its collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementPosition {
    /// List or array index.
    Index(usize),
    /// Text form of a map or set key.
    Key(String),
}

/// A short-lived property describing one element of a collection.
///
/// Handed to visitors while an element is being visited; it does not outlive
/// that call.
#[derive(Debug)]
pub struct CollectionElementProperty {
    name: String,
    position: ElementPosition,
    traits: TypeTraits,
    read_only: bool,
    attributes: PropertyAttributeCollection,
}

impl CollectionElementProperty {
    pub(crate) fn new(position: ElementPosition, traits: TypeTraits, read_only: bool) -> Self {
        let name = match &position {
            ElementPosition::Index(index) => format!("[{index}]"),
            ElementPosition::Key(key) => format!("[\"{key}\"]"),
        };
        Self {
            name,
            position,
            traits,
            read_only,
            attributes: PropertyAttributeCollection::new(),
        }
    }

    /// Element position.
    #[must_use]
    pub fn position(&self) -> &ElementPosition {
        &self.position
    }

    /// List index, for indexed collections.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.position {
            ElementPosition::Index(index) => Some(index),
            ElementPosition::Key(_) => None,
        }
    }

    /// Key text, for keyed collections.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match &self.position {
            ElementPosition::Key(key) => Some(key),
            ElementPosition::Index(_) => None,
        }
    }
}

impl PropertyInfo for CollectionElementProperty {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn attributes(&self) -> &PropertyAttributeCollection {
        &self.attributes
    }

    fn value_traits(&self) -> &TypeTraits {
        &self.traits
    }
}
