// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instantiating values by type.
//!
//! Types normally construct through the parameterless constructor recorded in
//! their [`TypeTraits`]. A [`TypeConstruction`] registry lets callers override
//! that per type, or supply a way to build types that have none.

use core::any::TypeId;
use core::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use hashbrown::HashMap;

use crate::error::{ConstructionFailure, Error};
use crate::reflect::{Reflect, Typed};
use crate::traits::TypeTraits;

type Factory = Arc<dyn Fn() -> Box<dyn Reflect> + Send + Sync>;

/// Per-type construction overrides.
///
/// ```rust
/// use understory_properties::{TypeConstruction, TypeFlags, TypeTraits, Typed};
///
/// #[derive(Clone)]
/// struct Handle(u32);
///
/// impl Typed for Handle {
///     fn type_traits() -> TypeTraits {
///         TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE)
///     }
/// }
///
/// let construction = TypeConstruction::new();
/// assert!(!construction.can_be_instantiated(&Handle::type_traits()));
///
/// construction.set_explicit_construction_method(|| Handle(7));
/// let handle: Handle = construction.instantiate_typed().unwrap();
/// assert_eq!(handle.0, 7);
/// ```
#[derive(Default)]
pub struct TypeConstruction {
    factories: RwLock<HashMap<TypeId, Factory>>,
}

impl TypeConstruction {
    /// A registry with no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `method` whenever a `T` must be built.
    pub fn set_explicit_construction_method<T: Typed>(
        &self,
        method: impl Fn() -> T + Send + Sync + 'static,
    ) {
        let factory: Factory = Arc::new(move || -> Box<dyn Reflect> { Box::new(method()) });
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), factory);
    }

    /// Removes the override for `T`, returning whether one existed.
    pub fn unset_explicit_construction_method<T: Typed>(&self) -> bool {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&TypeId::of::<T>())
            .is_some()
    }

    /// Returns `true` if an override exists for the type.
    #[must_use]
    pub fn has_explicit_construction_method(&self, traits: &TypeTraits) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&traits.id())
    }

    fn factory(&self, traits: &TypeTraits) -> Option<Factory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&traits.id())
            .cloned()
    }

    /// Returns `true` if [`instantiate`](Self::instantiate) would succeed.
    #[must_use]
    pub fn can_be_instantiated(&self, traits: &TypeTraits) -> bool {
        if self.has_explicit_construction_method(traits) {
            return true;
        }
        !traits.is_abstract()
            && !traits.is_interface()
            && !traits.is_generic_definition()
            && traits.constructor().is_some()
    }

    /// Returns `true` if `traits` can be built directly, or if any of
    /// `candidates` is a buildable type assignable to it.
    #[must_use]
    pub fn can_be_instantiated_from_derived(
        &self,
        traits: &TypeTraits,
        candidates: &[TypeTraits],
    ) -> bool {
        self.can_be_instantiated(traits)
            || candidates.iter().any(|candidate| {
                candidate.is_assignable_to(traits) && self.can_be_instantiated(candidate)
            })
    }

    /// Builds a value of the given type.
    pub fn instantiate(&self, traits: &TypeTraits) -> Result<Box<dyn Reflect>, Error> {
        if let Some(factory) = self.factory(traits) {
            return Ok(factory());
        }
        let fail = |reason| {
            tracing::debug!(type_name = traits.name(), ?reason, "instantiation refused");
            Err(Error::Construction {
                type_name: traits.name(),
                reason,
            })
        };
        if traits.is_abstract() {
            return fail(ConstructionFailure::Abstract);
        }
        if traits.is_interface() {
            return fail(ConstructionFailure::Interface);
        }
        if traits.is_generic_definition() {
            return fail(ConstructionFailure::GenericDefinition);
        }
        match traits.constructor() {
            Some(constructor) => Ok(constructor()),
            None => fail(ConstructionFailure::NoConstructor),
        }
    }

    /// Builds a `T`.
    pub fn instantiate_typed<T: Typed>(&self) -> Result<T, Error> {
        let traits = T::type_traits();
        let value = self.instantiate(&traits)?;
        let found = value.runtime_traits().name();
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::TypeMismatch {
                expected: traits.name(),
                found,
            })
    }

    /// Builds a `T`, or `None` if it cannot be instantiated.
    #[must_use]
    pub fn try_instantiate_typed<T: Typed>(&self) -> Option<T> {
        self.instantiate_typed().ok()
    }
}

impl fmt::Debug for TypeConstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overrides = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("TypeConstruction")
            .field("overrides", &overrides)
            .finish()
    }
}
