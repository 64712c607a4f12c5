// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute metadata attached to properties.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// Forces a non-public member into a reflected bag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Include;

/// Hides a property from visitation.
///
/// The property stays in its bag and remains reachable by path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hide;

/// Marks a property as read-only regardless of how it is accessed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadOnly;

/// An ordered, typed collection of attribute values.
///
/// Attributes are arbitrary `Send + Sync` values; lookups are by type.
///
/// ```rust
/// use understory_properties::{Hide, PropertyAttributeCollection};
///
/// #[derive(Debug)]
/// struct Tooltip(&'static str);
///
/// let attributes = PropertyAttributeCollection::new()
///     .with(Hide)
///     .with(Tooltip("first"))
///     .with(Tooltip("second"));
/// assert!(attributes.has::<Hide>());
/// assert_eq!(attributes.get::<Tooltip>().map(|t| t.0), Some("first"));
/// assert_eq!(attributes.get_all::<Tooltip>().count(), 2);
/// ```
#[derive(Clone, Default)]
pub struct PropertyAttributeCollection {
    entries: SmallVec<[Arc<dyn Any + Send + Sync>; 2]>,
}

impl PropertyAttributeCollection {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with<A: Any + Send + Sync>(mut self, attribute: A) -> Self {
        self.push(attribute);
        self
    }

    /// Appends an attribute.
    pub fn push<A: Any + Send + Sync>(&mut self, attribute: A) {
        self.entries.push(Arc::new(attribute));
    }

    /// Appends every attribute of `other`.
    pub fn extend(&mut self, other: &Self) {
        self.entries.extend(other.entries.iter().cloned());
    }

    /// Returns `true` if an attribute of type `A` is present.
    #[must_use]
    pub fn has<A: Any>(&self) -> bool {
        self.entries.iter().any(|entry| entry.is::<A>())
    }

    /// First attribute of type `A`.
    #[must_use]
    pub fn get<A: Any>(&self) -> Option<&A> {
        self.get_all::<A>().next()
    }

    /// Every attribute of type `A`, in insertion order.
    pub fn get_all<A: Any>(&self) -> impl Iterator<Item = &A> + '_ {
        self.entries
            .iter()
            .filter_map(|entry| entry.downcast_ref::<A>())
    }

    /// Every attribute, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(dyn Any + Send + Sync)> + '_ {
        self.entries.iter().map(|entry| &**entry)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for PropertyAttributeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAttributeCollection")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
