// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visitor adapters: per-visitor overrides keyed by value type.

use core::any::TypeId;
use core::fmt;
use core::marker::PhantomData;
use std::rc::Rc;

use crate::change::ChangeTracker;
use crate::error::Error;
use crate::path::PropertyPath;
use crate::property::PropertyInfo;
use crate::reflect::{Reflect, Typed};
use crate::visitor::Engine;

/// What an adapter or visitor hook did with a property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VisitStatus {
    /// Not handled; later adapters and the default handling run.
    #[default]
    Unhandled,
    /// Handled, with the default handling already taken care of.
    Handled,
    /// Handled instead of the default handling.
    Override,
}

impl VisitStatus {
    /// `true` unless [`Unhandled`](Self::Unhandled).
    #[must_use]
    pub fn is_handled(self) -> bool {
        self != Self::Unhandled
    }
}

/// Intercepts visitation of every property whose value has type `V`.
pub trait Adapter<V: Typed>: 'static {
    /// Visits `value`; see [`VisitStatus`].
    fn visit(&self, cx: &mut AdapterContext<'_, '_>, value: &mut V) -> VisitStatus;
}

/// An [`Adapter`] backed by a closure.
pub struct FnAdapter<F>(
    /// The closure.
    pub F,
);

impl<V, F> Adapter<V> for FnAdapter<F>
where
    V: Typed,
    F: Fn(&mut AdapterContext<'_, '_>, &mut V) -> VisitStatus + 'static,
{
    fn visit(&self, cx: &mut AdapterContext<'_, '_>, value: &mut V) -> VisitStatus {
        (self.0)(cx, value)
    }
}

impl<F> fmt::Debug for FnAdapter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnAdapter").finish_non_exhaustive()
    }
}

pub(crate) trait ErasedAdapter {
    fn value_type(&self) -> TypeId;

    fn visit_erased(&self, cx: &mut AdapterContext<'_, '_>, value: &mut dyn Reflect) -> VisitStatus;
}

struct TypedAdapter<V, A> {
    adapter: A,
    marker: PhantomData<fn(&mut V)>,
}

impl<V: Typed, A: Adapter<V>> ErasedAdapter for TypedAdapter<V, A> {
    fn value_type(&self) -> TypeId {
        TypeId::of::<V>()
    }

    fn visit_erased(&self, cx: &mut AdapterContext<'_, '_>, value: &mut dyn Reflect) -> VisitStatus {
        match value.downcast_mut::<V>() {
            Some(value) => self.adapter.visit(cx, value),
            None => VisitStatus::Unhandled,
        }
    }
}

/// The adapters of one visitor, consulted in registration order.
///
/// An adapter for `Option<T>` or `Dyn<A>` sees the slot itself, filled or
/// not; an adapter for the held type sees the value inside a filled slot.
///
/// Cloning is cheap; clones share the adapters.
#[derive(Clone, Default)]
pub struct Adapters {
    entries: Vec<Rc<dyn ErasedAdapter>>,
}

impl Adapters {
    /// No adapters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an adapter for values of type `V`.
    pub fn add<V: Typed>(&mut self, adapter: impl Adapter<V>) {
        self.entries.push(Rc::new(TypedAdapter {
            adapter,
            marker: PhantomData,
        }));
    }

    /// Appends a closure adapter for values of type `V`.
    pub fn add_fn<V: Typed>(
        &mut self,
        visit: impl Fn(&mut AdapterContext<'_, '_>, &mut V) -> VisitStatus + 'static,
    ) {
        self.add::<V>(FnAdapter(visit));
    }

    /// Number of adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no adapters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<Rc<dyn ErasedAdapter>> {
        self.entries.get(index).cloned()
    }
}

impl fmt::Debug for Adapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapters")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// State handed to an [`Adapter`].
pub struct AdapterContext<'a, 'e> {
    engine: &'a mut Engine<'e>,
    property: &'a dyn PropertyInfo,
    next: usize,
    tracker: ChangeTracker,
    error: Option<Error>,
}

impl<'a, 'e> AdapterContext<'a, 'e> {
    pub(crate) fn new(engine: &'a mut Engine<'e>, property: &'a dyn PropertyInfo, next: usize) -> Self {
        Self {
            engine,
            property,
            next,
            tracker: ChangeTracker::new(),
            error: None,
        }
    }

    /// The property being visited.
    #[must_use]
    pub fn property(&self) -> &dyn PropertyInfo {
        self.property
    }

    /// Path of the property from the visitation root.
    #[must_use]
    pub fn path(&self) -> &PropertyPath {
        self.engine.path()
    }

    /// Records that the adapter modified the value.
    pub fn mark_changed(&mut self) {
        self.tracker.mark_changed();
    }

    /// Runs the remaining adapters and then the default handling on `value`.
    ///
    /// Returns [`VisitStatus::Handled`], so an adapter can end with
    /// `cx.continue_visitation(value)`. A failure is reported by the visit
    /// that invoked the adapter.
    pub fn continue_visitation(&mut self, value: &mut dyn Reflect) -> VisitStatus {
        match self.engine.run_adapters(self.next, self.property, value) {
            Ok(changed) => self.tracker.merge(changed),
            Err(error) => self.error = Some(error),
        }
        VisitStatus::Handled
    }

    pub(crate) fn finish(self) -> (bool, Option<Error>) {
        (self.tracker.is_changed(), self.error)
    }
}

impl fmt::Debug for AdapterContext<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterContext")
            .field("property", &self.property.name())
            .field("path", self.engine.path())
            .field("changed", &self.tracker.is_changed())
            .finish_non_exhaustive()
    }
}
