// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`PropertyContainer`]: the entry point for visiting, path access and
//! structural copies.

use core::fmt;
use std::sync::{Arc, OnceLock};

use crate::bag::ErasedBag;
use crate::construct::{ConstructOptions, Copier};
use crate::construction::TypeConstruction;
use crate::conversion::ConversionRegistry;
use crate::error::Error;
use crate::path::PropertyPath;
use crate::reflect::{Reflect, Typed};
use crate::store::PropertyBagStore;
use crate::visitor::{self, PropertyVisitor};
use crate::walk::Walker;

/// Operations over containers, backed by a bag store and a conversion registry.
///
/// Most programs use the process-wide [`global`](Self::global) instance.
/// Tests and tools that need isolated registrations create their own with
/// [`new`](Self::new) or [`with_registries`](Self::with_registries). Cloning is
/// cheap and shares the registries.
#[derive(Clone)]
pub struct PropertyContainer {
    store: Arc<PropertyBagStore>,
    conversions: Arc<ConversionRegistry>,
}

impl PropertyContainer {
    /// Fresh registries, with the primitive conversions installed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registries(
            Arc::new(PropertyBagStore::new()),
            Arc::new(ConversionRegistry::with_primitives()),
        )
    }

    /// Operates on the given registries.
    #[must_use]
    pub fn with_registries(store: Arc<PropertyBagStore>, conversions: Arc<ConversionRegistry>) -> Self {
        Self { store, conversions }
    }

    /// The process-wide instance, created on first use.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<PropertyContainer> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// The bag store.
    #[must_use]
    pub fn store(&self) -> &PropertyBagStore {
        &self.store
    }

    /// The conversion registry.
    #[must_use]
    pub fn conversions(&self) -> &ConversionRegistry {
        &self.conversions
    }

    /// The construction registry used by the store.
    #[must_use]
    pub fn construction(&self) -> &TypeConstruction {
        self.store.construction()
    }

    fn walker(&self) -> Walker<'_> {
        Walker::new(&self.store, &self.conversions)
    }

    /// The bag of `C`, or `None` if `C` is visited as a leaf.
    pub fn bag_of<C: Typed>(&self) -> Result<Option<Arc<dyn ErasedBag>>, Error> {
        self.store.resolve::<C>()
    }

    /// The bag of the runtime type of `container`.
    pub fn bag_for(&self, container: &dyn Reflect) -> Result<Option<Arc<dyn ErasedBag>>, Error> {
        container.resolved().resolve_bag(&self.store)
    }

    /// Runs `visitor` over every property of `container`.
    ///
    /// Returns whether the visit modified anything.
    pub fn accept<V, C>(&self, visitor: &mut V, container: &mut C) -> Result<bool, Error>
    where
        V: PropertyVisitor,
        C: Typed,
    {
        self.visit(visitor, container)
    }

    /// Erased form of [`accept`](Self::accept).
    pub fn visit(
        &self,
        visitor: &mut dyn PropertyVisitor,
        container: &mut dyn Reflect,
    ) -> Result<bool, Error> {
        visitor::accept(&self.store, &self.conversions, visitor, container)
    }

    /// Reads the value at `path`, converted to `T`.
    ///
    /// ```rust
    /// use understory_properties::{PropertyContainer, PropertyPath, TypeDescriptor, TypeTraits, Typed};
    ///
    /// #[derive(Clone, Default)]
    /// struct Track {
    ///     samples: Vec<f32>,
    /// }
    ///
    /// impl Typed for Track {
    ///     fn type_traits() -> TypeTraits {
    ///         TypeTraits::value::<Self>()
    ///     }
    ///
    ///     fn describe() -> Option<TypeDescriptor<Self>> {
    ///         Some(TypeDescriptor::<Self>::new().field("Samples", |t| &t.samples, |t| &mut t.samples))
    ///     }
    /// }
    ///
    /// let container = PropertyContainer::new();
    /// let mut track = Track { samples: vec![0.5, 0.25] };
    /// let path = PropertyPath::parse("Samples[1]").unwrap();
    /// assert_eq!(container.get_value_at_path::<f64>(&track, &path).unwrap(), 0.25);
    ///
    /// container.set_value_at_path(&mut track, &path, 2_i32).unwrap();
    /// assert_eq!(track.samples, [0.5, 2.0]);
    /// ```
    pub fn get_value_at_path<T: Typed>(&self, container: &dyn Reflect, path: &PropertyPath) -> Result<T, Error> {
        self.walker().get_value(container, path)
    }

    /// [`get_value_at_path`](Self::get_value_at_path), with failures as `None`.
    #[must_use]
    pub fn try_get_value_at_path<T: Typed>(&self, container: &dyn Reflect, path: &PropertyPath) -> Option<T> {
        self.get_value_at_path(container, path).ok()
    }

    /// Writes `value` at `path`, converted to the type found there.
    pub fn set_value_at_path<V: Typed>(
        &self,
        container: &mut dyn Reflect,
        path: &PropertyPath,
        value: V,
    ) -> Result<(), Error> {
        self.walker().set_value(container, path, &value)
    }

    /// [`set_value_at_path`](Self::set_value_at_path), returning whether it succeeded.
    pub fn try_set_value_at_path<V: Typed>(
        &self,
        container: &mut dyn Reflect,
        path: &PropertyPath,
        value: V,
    ) -> bool {
        self.set_value_at_path(container, path, value).is_ok()
    }

    /// Resizes the list at `path`, allocating an empty `Option` list first.
    pub fn set_count_at_path(
        &self,
        container: &mut dyn Reflect,
        path: &PropertyPath,
        count: usize,
    ) -> Result<(), Error> {
        self.walker().set_count(container, path, count)
    }

    /// [`set_count_at_path`](Self::set_count_at_path), returning whether it succeeded.
    pub fn try_set_count_at_path(&self, container: &mut dyn Reflect, path: &PropertyPath, count: usize) -> bool {
        self.set_count_at_path(container, path, count).is_ok()
    }

    /// Returns `true` if every part of `path` resolves in `container`.
    #[must_use]
    pub fn is_path_valid(&self, container: &dyn Reflect, path: &PropertyPath) -> bool {
        self.walker().is_valid(container, path)
    }

    /// Reads the top-level property `name`, converted to `T`.
    pub fn get_value<T: Typed>(&self, container: &dyn Reflect, name: &str) -> Result<T, Error> {
        self.get_value_at_path(container, &PropertyPath::from_name(name))
    }

    /// [`get_value`](Self::get_value), with failures as `None`.
    #[must_use]
    pub fn try_get_value<T: Typed>(&self, container: &dyn Reflect, name: &str) -> Option<T> {
        self.get_value(container, name).ok()
    }

    /// Writes the top-level property `name`.
    pub fn set_value<V: Typed>(&self, container: &mut dyn Reflect, name: &str, value: V) -> Result<(), Error> {
        self.set_value_at_path(container, &PropertyPath::from_name(name), value)
    }

    /// Copies `src` into `dst`, instantiating whatever `dst` lacks.
    ///
    /// Properties are matched by name; see [`ConstructOptions`] for choosing
    /// the instantiated type.
    pub fn construct(&self, dst: &mut dyn Reflect, src: &dyn Reflect) -> Result<(), Error> {
        self.construct_with_options(dst, src, &ConstructOptions::default())
    }

    /// [`construct`](Self::construct) with options.
    pub fn construct_with_options(
        &self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        options: &ConstructOptions,
    ) -> Result<(), Error> {
        Copier::construct(&self.store, &self.conversions, options).copy(dst, src)
    }

    /// Constructs the value at `path` in `dst` from the value at `path` in `src`.
    pub fn construct_at_path(
        &self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        path: &PropertyPath,
        options: &ConstructOptions,
    ) -> Result<(), Error> {
        Copier::construct(&self.store, &self.conversions, options).copy_at_path(dst, src, path)
    }

    /// Copies whatever matches from `src` into `dst`.
    ///
    /// Unlike [`construct`](Self::construct), a nested property that cannot be
    /// copied is logged and skipped.
    pub fn transfer(&self, dst: &mut dyn Reflect, src: &dyn Reflect) -> Result<(), Error> {
        Copier::transfer(&self.store, &self.conversions).copy(dst, src)
    }

    /// Transfers the value at `path` in `src` to the value at `path` in `dst`.
    pub fn transfer_at_path(
        &self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        path: &PropertyPath,
    ) -> Result<(), Error> {
        Copier::transfer(&self.store, &self.conversions).copy_at_path(dst, src, path)
    }
}

impl Default for PropertyContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyContainer")
            .field("store", &self.store)
            .field("conversions", &self.conversions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::TypeDescriptor;
    use crate::traits::TypeTraits;

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Counter {
        count: u32,
        label: String,
    }

    impl Typed for Counter {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("Count", |c| &c.count, |c| &mut c.count)
                    .field("Label", |c| &c.label, |c| &mut c.label),
            )
        }
    }

    #[test]
    fn top_level_access_by_name() {
        let container = PropertyContainer::new();
        let mut counter = Counter::default();
        container.set_value(&mut counter, "Count", String::from("12")).unwrap();
        assert_eq!(counter.count, 12);
        assert_eq!(container.get_value::<String>(&counter, "Count").unwrap(), "12");
        assert_eq!(container.try_get_value::<u32>(&counter, "Missing"), None);
        assert!(!container.try_set_value_at_path(&mut counter, &PropertyPath::from_name("Nope"), 1_u8));
    }

    #[test]
    fn bags_resolve_for_erased_values() {
        let container = PropertyContainer::new();
        let counter = Counter::default();
        let bag = container.bag_for(&counter).unwrap().unwrap();
        assert_eq!(bag.len(), 2);
        assert!(container.bag_of::<u32>().unwrap().is_none());
        assert!(container.store().exists::<Counter>());
    }

    #[test]
    fn global_instance_is_shared() {
        let first: *const PropertyContainer = PropertyContainer::global();
        let second: *const PropertyContainer = PropertyContainer::global();
        assert_eq!(first, second);
        assert!(PropertyContainer::global().conversions().converter_count() > 0);
    }
}
