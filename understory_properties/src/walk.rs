// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Walking a [`PropertyPath`] into a container.
//!
//! A name part looks the property up in the bag of the current value; index and
//! key parts select an element of the current list or keyed collection. Slots
//! (`Option`, [`Dyn`](crate::Dyn)) are looked through between parts, and an
//! empty slot before the last part stops the walk with [`Error::NullValue`].
//!
//! Writes go through each property's `visit_value`, so accessor properties on
//! the way down get their modified temporaries written back, and a read-only
//! property anywhere on the way makes the terminal read-only.

use std::sync::Arc;

use crate::bag::ErasedBag;
use crate::collection::{materialize, replace_set_element};
use crate::conversion::{ConversionRegistry, key_text};
use crate::error::Error;
use crate::path::{PathPart, PropertyPath};
use crate::reflect::{Reflect, Typed};
use crate::store::PropertyBagStore;
use crate::traits::TypeTraits;

type ReadFn<'f> = dyn FnMut(&dyn Reflect) -> Result<(), Error> + 'f;
type WriteFn<'f> = dyn FnMut(&mut dyn Reflect, bool) -> Result<bool, Error> + 'f;

#[derive(Clone, Copy)]
pub(crate) struct Walker<'w> {
    store: &'w PropertyBagStore,
    conversions: &'w ConversionRegistry,
}

impl<'w> Walker<'w> {
    pub(crate) fn new(store: &'w PropertyBagStore, conversions: &'w ConversionRegistry) -> Self {
        Self { store, conversions }
    }

    /// Lends the value at `path` to `f`.
    pub(crate) fn read(
        self,
        root: &dyn Reflect,
        path: &PropertyPath,
        f: &mut ReadFn<'_>,
    ) -> Result<(), Error> {
        self.read_at(root, path, 0, f)
    }

    /// Lends the value at `path` to `f` for modification, along with whether a
    /// read-only property was crossed. `f` reports whether it changed the value.
    pub(crate) fn write(
        self,
        root: &mut dyn Reflect,
        path: &PropertyPath,
        f: &mut WriteFn<'_>,
    ) -> Result<bool, Error> {
        self.write_at(root, path, 0, false, f)
    }

    fn read_at(
        self,
        value: &dyn Reflect,
        path: &PropertyPath,
        depth: usize,
        f: &mut ReadFn<'_>,
    ) -> Result<(), Error> {
        let Some(part) = path.get(depth) else {
            return f(value);
        };
        let value = value.resolved();
        if value.is_null() {
            return Err(Error::NullValue {
                path: path.truncated(depth),
            });
        }
        tracing::trace!(%path, depth, "reading path part");
        match part {
            PathPart::Name(name) => {
                let (bag, index) = self.property(value, path, depth, name)?;
                bag.read_value(value, index, &mut |inner| self.read_at(inner, path, depth + 1, f))
            }
            PathPart::Index(index) => {
                let list = value.list().ok_or_else(|| Error::NotACollection {
                    path: path.truncated(depth),
                    type_name: value.runtime_traits().name(),
                })?;
                let element = list.element(*index).ok_or_else(|| Error::IndexOutOfRange {
                    path: path.truncated(depth + 1),
                    index: *index,
                    count: list.count(),
                })?;
                self.read_at(element, path, depth + 1, f)
            }
            PathPart::Key(text) => {
                let keyed = value.keyed().ok_or_else(|| Error::NotKeyed {
                    path: path.truncated(depth),
                    type_name: value.runtime_traits().name(),
                })?;
                let not_found = || Error::KeyNotFound {
                    path: path.truncated(depth + 1),
                    key: text.clone(),
                };
                let key = self
                    .key(text, &keyed.key_traits())
                    .ok_or_else(not_found)?;
                let element = keyed.get(&*key).ok_or_else(not_found)?;
                self.read_at(element, path, depth + 1, f)
            }
        }
    }

    fn write_at(
        self,
        value: &mut dyn Reflect,
        path: &PropertyPath,
        depth: usize,
        read_only: bool,
        f: &mut WriteFn<'_>,
    ) -> Result<bool, Error> {
        let Some(part) = path.get(depth) else {
            return f(value, read_only);
        };
        let value = value.resolved_mut();
        if value.is_null() {
            return Err(Error::NullValue {
                path: path.truncated(depth),
            });
        }
        tracing::trace!(%path, depth, "writing path part");
        match part {
            PathPart::Name(name) => {
                let (bag, index) = self.property(value, path, depth, name)?;
                let read_only = read_only || bag.info(index).is_some_and(|info| info.is_read_only());
                bag.visit_value(value, index, &mut |inner| {
                    self.write_at(inner, path, depth + 1, read_only, f)
                })
            }
            PathPart::Index(index) => {
                let type_name = value.runtime_traits().name();
                let list = value.list_mut().ok_or_else(|| Error::NotACollection {
                    path: path.truncated(depth),
                    type_name,
                })?;
                let count = list.count();
                let element = list.element_mut(*index).ok_or_else(|| Error::IndexOutOfRange {
                    path: path.truncated(depth + 1),
                    index: *index,
                    count,
                })?;
                self.write_at(element, path, depth + 1, read_only, f)
            }
            PathPart::Key(text) => {
                let type_name = value.runtime_traits().name();
                let keyed = value.keyed_mut().ok_or_else(|| Error::NotKeyed {
                    path: path.truncated(depth),
                    type_name,
                })?;
                let not_found = || Error::KeyNotFound {
                    path: path.truncated(depth + 1),
                    key: text.clone(),
                };
                let key = self
                    .key(text, &keyed.key_traits())
                    .ok_or_else(not_found)?;
                if !keyed.is_set() {
                    let element = keyed.get_mut(&*key).ok_or_else(not_found)?;
                    return self.write_at(element, path, depth + 1, read_only, f);
                }
                let mut element = keyed.get(&*key).ok_or_else(not_found)?.clone_boxed();
                if !self.write_at(&mut *element, path, depth + 1, read_only, f)? {
                    return Ok(false);
                }
                if !replace_set_element(keyed, &*key, element) {
                    tracing::warn!(%path, "edited set element merged with an existing one");
                }
                Ok(true)
            }
        }
    }

    fn property(
        self,
        value: &dyn Reflect,
        path: &PropertyPath,
        depth: usize,
        name: &str,
    ) -> Result<(Arc<dyn ErasedBag>, usize), Error> {
        let bag = value
            .resolve_bag(self.store)?
            .ok_or_else(|| Error::NotAContainer {
                path: path.truncated(depth),
                type_name: value.runtime_traits().name(),
            })?;
        let index = bag.index_of(name).ok_or_else(|| Error::PropertyNotFound {
            path: path.truncated(depth + 1),
            name: name.to_owned(),
        })?;
        Ok((bag, index))
    }

    /// Converts key text to the key type; the key must print back as the same text.
    fn key(self, text: &str, key_traits: &TypeTraits) -> Option<Box<dyn Reflect>> {
        let key = self.conversions.convert(&text.to_owned(), key_traits)?;
        (key_text(self.conversions, &*key) == text).then_some(key)
    }

    /// Reads the value at `path` converted to `T`.
    pub(crate) fn get_value<T: Typed>(self, root: &dyn Reflect, path: &PropertyPath) -> Result<T, Error> {
        let mut result = None;
        self.read(root, path, &mut |value| {
            result = self
                .conversions
                .convert(value, &T::type_traits())
                .and_then(|converted| converted.downcast::<T>().ok());
            Ok(())
        })?;
        result.map(|value| *value).ok_or_else(|| Error::CannotGetValue {
            type_name: core::any::type_name::<T>(),
            path: path.clone(),
        })
    }

    /// Writes `value`, converted to the declared type at `path`.
    pub(crate) fn set_value(
        self,
        root: &mut dyn Reflect,
        path: &PropertyPath,
        value: &dyn Reflect,
    ) -> Result<(), Error> {
        self.write(root, path, &mut |slot, read_only| {
            if read_only {
                return Err(Error::ReadOnly { path: path.clone() });
            }
            if assign_converted(self.conversions, slot, value) {
                Ok(true)
            } else {
                Err(Error::CannotSetValue {
                    type_name: value.runtime_traits().name(),
                    path: path.clone(),
                })
            }
        })?;
        Ok(())
    }

    /// Resizes the list at `path`, allocating it first if it is an empty `Option`.
    pub(crate) fn set_count(
        self,
        root: &mut dyn Reflect,
        path: &PropertyPath,
        count: usize,
    ) -> Result<(), Error> {
        self.write(root, path, &mut |slot, read_only| {
            if read_only {
                return Err(Error::ReadOnly { path: path.clone() });
            }
            let type_name = slot.runtime_traits().name();
            let list = materialize(slot)
                .list_mut()
                .ok_or_else(|| Error::NotACollection {
                    path: path.clone(),
                    type_name,
                })?;
            if list.count() == count {
                return Ok(false);
            }
            list.set_count(count);
            Ok(true)
        })?;
        Ok(())
    }

    /// Returns `true` if every part of `path` resolves.
    pub(crate) fn is_valid(self, root: &dyn Reflect, path: &PropertyPath) -> bool {
        self.read(root, path, &mut |_| Ok(())).is_ok()
    }
}

/// Converts `value` to the runtime type of `slot` and stores it there.
pub(crate) fn assign_converted(
    conversions: &ConversionRegistry,
    slot: &mut dyn Reflect,
    value: &dyn Reflect,
) -> bool {
    let target = slot.runtime_traits();
    conversions
        .convert(value, &target)
        .is_some_and(|converted| slot.assign(converted).is_ok())
}
