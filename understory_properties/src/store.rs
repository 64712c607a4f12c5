// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The type → property bag registry.

use core::any::TypeId;
use core::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::bag::{BagSource, ErasedBag, PropertyBag};
use crate::construction::TypeConstruction;
use crate::describe::synthesize;
use crate::error::{Error, SynthesisFailure};
use crate::reflect::Typed;
use crate::traits::TypeTraits;

/// Maps container types to their property bags.
///
/// Bags are registered ahead of time with [`register`](Self::register) or
/// synthesized from [`Typed::describe`] the first time a type is resolved.
/// Either way they are cached for the lifetime of the store.
///
/// Resolution of a type `C` proceeds as follows:
///
/// 1. generic type definitions are an error;
/// 2. leaf types (primitives, strings, enums) have no bag;
/// 3. a bag registered for exactly `C` wins;
/// 4. abstract and interface types pick the most specific registered bag
///    whose container type is assignable to `C`;
/// 5. collections, slots and arrays have no bag of their own;
/// 6. anything else is synthesized; types without a description have no bag.
///
/// Synthesis runs outside the lock. When two threads race to synthesize the
/// same type, the first insert is kept and both receive it.
pub struct PropertyBagStore {
    bags: RwLock<HashMap<TypeId, Arc<dyn ErasedBag>>>,
    types: RwLock<HashMap<TypeId, TypeTraits>>,
    construction: Arc<TypeConstruction>,
}

impl PropertyBagStore {
    /// An empty store with its own construction registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_construction(Arc::new(TypeConstruction::new()))
    }

    /// An empty store that consults `construction` when synthesizing.
    #[must_use]
    pub fn with_construction(construction: Arc<TypeConstruction>) -> Self {
        Self {
            bags: RwLock::default(),
            types: RwLock::default(),
            construction,
        }
    }

    /// The construction registry used to decide whether a type can be synthesized.
    #[must_use]
    pub fn construction(&self) -> &Arc<TypeConstruction> {
        &self.construction
    }

    /// Registers a hand-written bag, failing if one was already registered for `C`.
    ///
    /// A bag previously synthesized for `C` is replaced.
    pub fn register<C: Typed>(&self, bag: PropertyBag<C>) -> Result<(), Error> {
        let traits = C::type_traits();
        match self.write_bags().entry(traits.id()) {
            Entry::Occupied(mut slot) if slot.get().source() == BagSource::Reflected => {
                slot.insert(Arc::new(bag));
            }
            Entry::Occupied(_) => {
                return Err(Error::DuplicateBag {
                    type_name: traits.name(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(bag));
            }
        }
        tracing::debug!(container = traits.name(), "registered property bag");
        self.remember(traits);
        Ok(())
    }

    /// Registers a hand-written bag, replacing any existing one for `C`.
    pub fn register_or_replace<C: Typed>(&self, bag: PropertyBag<C>) {
        let traits = C::type_traits();
        let replaced = self
            .write_bags()
            .insert(traits.id(), Arc::new(bag))
            .is_some();
        tracing::debug!(container = traits.name(), replaced, "registered property bag");
        self.remember(traits);
    }

    /// Makes `T` known to [`find_type_by_name`](Self::find_type_by_name)
    /// without giving it a bag.
    pub fn register_type<T: Typed>(&self) {
        self.remember(T::type_traits());
    }

    /// Returns the bag for `C`, synthesizing it if needed.
    ///
    /// `Ok(None)` means `C` is visited as a leaf.
    pub fn resolve<C: Typed>(&self) -> Result<Option<Arc<dyn ErasedBag>>, Error> {
        let traits = C::type_traits();
        if traits.is_generic_definition() {
            return Err(Error::OpenGeneric {
                type_name: traits.name(),
            });
        }
        if !traits.is_container_type() {
            return Ok(None);
        }
        if let Some(bag) = self.read_bags().get(&traits.id()) {
            return Ok(Some(bag.clone()));
        }
        if traits.is_abstract() || traits.is_interface() {
            return self.resolve_polymorphic(&traits);
        }
        if has_no_bag_of_its_own(&traits) {
            return Ok(None);
        }

        let bag: Arc<dyn ErasedBag> = match synthesize::<C>(&self.construction) {
            Ok(bag) => Arc::new(bag),
            Err(Error::Synthesis {
                reason: SynthesisFailure::Undescribed,
                ..
            }) => {
                tracing::trace!(container = traits.name(), "no description, visiting as a leaf");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };
        let bag = self
            .write_bags()
            .entry(traits.id())
            .or_insert(bag)
            .clone();
        self.remember(traits);
        Ok(Some(bag))
    }

    /// Like [`resolve`](Self::resolve), but a missing bag is an error.
    pub fn bag<C: Typed>(&self) -> Result<Arc<dyn ErasedBag>, Error> {
        self.resolve::<C>()?.ok_or(Error::MissingBag {
            type_name: core::any::type_name::<C>(),
        })
    }

    /// Returns `true` if [`resolve`](Self::resolve) would return a bag, without
    /// synthesizing one.
    #[must_use]
    pub fn exists<C: Typed>(&self) -> bool {
        let traits = C::type_traits();
        if traits.is_generic_definition() || !traits.is_container_type() {
            return false;
        }
        if self.exists_traits(&traits) {
            return true;
        }
        if traits.is_abstract() || traits.is_interface() || has_no_bag_of_its_own(&traits) {
            return false;
        }
        C::describe().is_some()
            && (traits.constructor().is_some()
                || self.construction.has_explicit_construction_method(&traits))
    }

    /// Returns `true` if a bag for the type is already cached, or a registered
    /// bag is assignable to it.
    #[must_use]
    pub fn exists_traits(&self, traits: &TypeTraits) -> bool {
        matches!(self.resolve_traits(traits), Ok(Some(_)))
    }

    /// Looks up a cached bag by runtime traits; never synthesizes.
    pub fn resolve_traits(&self, traits: &TypeTraits) -> Result<Option<Arc<dyn ErasedBag>>, Error> {
        if let Some(bag) = self.read_bags().get(&traits.id()) {
            return Ok(Some(bag.clone()));
        }
        if traits.is_abstract() || traits.is_interface() {
            return self.resolve_polymorphic(traits);
        }
        Ok(None)
    }

    fn resolve_polymorphic(
        &self,
        traits: &TypeTraits,
    ) -> Result<Option<Arc<dyn ErasedBag>>, Error> {
        let candidates: Vec<Arc<dyn ErasedBag>> = self
            .read_bags()
            .values()
            .filter(|bag| bag.container_traits().is_assignable_to(traits))
            .cloned()
            .collect();
        let most_specific: Vec<&Arc<dyn ErasedBag>> = candidates
            .iter()
            .filter(|bag| {
                candidates.iter().all(|other| {
                    bag.container_traits()
                        .is_assignable_to(other.container_traits())
                })
            })
            .collect();
        match (candidates.len(), most_specific.as_slice()) {
            (0, _) => Ok(None),
            (_, [bag]) => Ok(Some(Arc::clone(bag))),
            _ => Err(Error::AmbiguousBag {
                requested: traits.name(),
                candidates: candidates
                    .iter()
                    .map(|bag| bag.container_traits().name())
                    .collect(),
            }),
        }
    }

    /// Traits of every type with a bag or an explicit registration.
    #[must_use]
    pub fn registered_types(&self) -> Vec<TypeTraits> {
        self.read_types().values().cloned().collect()
    }

    /// Finds a known type by its full name, or by its short name when that is unique.
    #[must_use]
    pub fn find_type_by_name(&self, name: &str) -> Option<TypeTraits> {
        let types = self.read_types();
        if let Some(traits) = types.values().find(|traits| traits.name() == name) {
            return Some(traits.clone());
        }
        let mut short = types.values().filter(|traits| traits.short_name() == name);
        match (short.next(), short.next()) {
            (Some(traits), None) => Some(traits.clone()),
            _ => None,
        }
    }

    /// Number of cached bags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_bags().len()
    }

    /// Returns `true` if no bags are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_bags().is_empty()
    }

    fn remember(&self, traits: TypeTraits) {
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(traits.id())
            .or_insert(traits);
    }

    fn read_bags(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TypeId, Arc<dyn ErasedBag>>> {
        self.bags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_bags(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TypeId, Arc<dyn ErasedBag>>> {
        self.bags.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_types(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TypeId, TypeTraits>> {
        self.types.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn has_no_bag_of_its_own(traits: &TypeTraits) -> bool {
    traits.is_list()
        || traits.is_keyed()
        || traits.is_nullable()
        || traits.is_indirect()
        || traits.is_array()
        || traits.is_multi_dimensional_array()
}

impl Default for PropertyBagStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyBagStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBagStore")
            .field("bags", &self.len())
            .field("construction", &self.construction)
            .finish_non_exhaustive()
    }
}
