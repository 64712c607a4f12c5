// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural copies between containers: construct and transfer.
//!
//! Both walk the source and write into the destination, matching properties by
//! name. Lists are resized to the source count and copied element by element,
//! keyed collections are rebuilt entry by entry, and leaves are converted to
//! the destination's type. A property that is missing from the destination,
//! read-only there, or of an incompatible shape is skipped.
//!
//! A slot (`Option`, [`Dyn`](crate::Dyn)) that already holds an instance of the
//! source's runtime type is kept and filled in. Otherwise, if the slot accepts
//! that type, it receives a fresh instance first. A null source empties the
//! destination slot.
//!
//! Construct reports every failure. Transfer logs a failing member and moves
//! on to the next one.

use crate::conversion::{ConversionRegistry, key_text};
use crate::error::{ConstructionFailure, Error};
use crate::path::PropertyPath;
use crate::reflect::{KeyedAccess, ListAccess, Reflect};
use crate::store::PropertyBagStore;
use crate::traits::TypeTraits;
use crate::walk::{Walker, assign_converted};

/// Options for [`PropertyContainer::construct_with_options`](crate::PropertyContainer::construct_with_options).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstructOptions {
    /// Name of a `String` property that, when a source container has it,
    /// names the concrete type to instantiate for that container.
    ///
    /// The name is looked up with
    /// [`PropertyBagStore::find_type_by_name`]; an unknown name fails with
    /// [`Error::UnknownType`].
    pub type_identifier_key: Option<String>,
}

impl ConstructOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`type_identifier_key`](Self::type_identifier_key).
    #[must_use]
    pub fn with_type_identifier_key(mut self, key: impl Into<String>) -> Self {
        self.type_identifier_key = Some(key.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Policy {
    Strict,
    Lenient,
}

#[derive(Clone, Copy)]
pub(crate) struct Copier<'c> {
    store: &'c PropertyBagStore,
    conversions: &'c ConversionRegistry,
    type_identifier_key: Option<&'c str>,
    policy: Policy,
}

impl<'c> Copier<'c> {
    pub(crate) fn construct(
        store: &'c PropertyBagStore,
        conversions: &'c ConversionRegistry,
        options: &'c ConstructOptions,
    ) -> Self {
        Self {
            store,
            conversions,
            type_identifier_key: options.type_identifier_key.as_deref(),
            policy: Policy::Strict,
        }
    }

    pub(crate) fn transfer(store: &'c PropertyBagStore, conversions: &'c ConversionRegistry) -> Self {
        Self {
            store,
            conversions,
            type_identifier_key: None,
            policy: Policy::Lenient,
        }
    }

    /// Copies `src` into `dst`. Failures at the root are always reported.
    pub(crate) fn copy(self, dst: &mut dyn Reflect, src: &dyn Reflect) -> Result<(), Error> {
        self.copy_slot(dst, src, &mut PropertyPath::new())
    }

    /// Copies the value at `path` in `src` into the value at `path` in `dst`.
    pub(crate) fn copy_at_path(
        self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        path: &PropertyPath,
    ) -> Result<(), Error> {
        let walker = Walker::new(self.store, self.conversions);
        walker.read(src, path, &mut |from| {
            walker.write(dst, path, &mut |to, read_only| {
                if read_only {
                    return Err(Error::ReadOnly { path: path.clone() });
                }
                self.copy_slot(to, from, &mut path.clone())?;
                Ok(true)
            })?;
            Ok(())
        })
    }

    fn copy_slot(
        self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        path: &mut PropertyPath,
    ) -> Result<(), Error> {
        if src.is_null() {
            match dst.indirect_mut() {
                Some(slot) => slot.set_null(),
                None => tracing::trace!(%path, "null source for a non-nullable destination skipped"),
            }
            return Ok(());
        }
        let source = src.resolved();
        let identified = self.identified_type(source)?;
        if identified.is_none() && !self.is_structured(source)? {
            if !assign_converted(self.conversions, dst, source) {
                tracing::trace!(
                    %path,
                    from = source.runtime_traits().name(),
                    to = dst.runtime_traits().name(),
                    "incompatible value skipped"
                );
            }
            return Ok(());
        }
        let target = identified.unwrap_or_else(|| source.runtime_traits());
        match self.prepare(dst, &target)? {
            Some(destination) => self.copy_contents(destination, source, path),
            None => {
                tracing::trace!(%path, target = target.name(), "empty slot cannot hold the source type");
                Ok(())
            }
        }
    }

    /// Runs `copy_slot` for a nested member, applying the failure policy.
    fn copy_member(
        self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        path: &mut PropertyPath,
    ) -> Result<(), Error> {
        let result = self.copy_slot(dst, src, path);
        self.settle(result, path).map(|_| ())
    }

    fn settle<T>(self, result: Result<T, Error>, path: &PropertyPath) -> Result<Option<T>, Error> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) if self.policy == Policy::Lenient => {
                tracing::warn!(%path, %error, "transfer skipped a property");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn is_structured(self, source: &dyn Reflect) -> Result<bool, Error> {
        Ok(source.list().is_some()
            || source.keyed().is_some()
            || source.resolve_bag(self.store)?.is_some())
    }

    /// The type named by the source's type identifier property, if it has one.
    fn identified_type(self, source: &dyn Reflect) -> Result<Option<TypeTraits>, Error> {
        let Some(key) = self.type_identifier_key else {
            return Ok(None);
        };
        let Some(bag) = source.resolve_bag(self.store)? else {
            return Ok(None);
        };
        let Some(index) = bag.index_of(key) else {
            return Ok(None);
        };
        let value = bag.get_value(source, index)?;
        let Some(name) = value.downcast_ref::<String>() else {
            return Ok(None);
        };
        tracing::debug!(key, name = name.as_str(), "resolving type identifier");
        self.store
            .find_type_by_name(name)
            .map(Some)
            .ok_or_else(|| Error::UnknownType { name: name.clone() })
    }

    /// Makes `dst` hold something the source can be copied into.
    ///
    /// `None` means the destination is an empty slot that cannot hold `target`.
    fn prepare<'d>(
        self,
        dst: &'d mut dyn Reflect,
        target: &TypeTraits,
    ) -> Result<Option<&'d mut dyn Reflect>, Error> {
        if dst.indirect().is_none() {
            return Ok(Some(dst));
        }
        let accepts = dst.indirect().is_some_and(|slot| slot.accepts(target));
        let holds_target = {
            let current = dst.resolved();
            !current.is_null() && current.value_type_id() == target.id()
        };
        if !holds_target && accepts {
            let instance = self.store.construction().instantiate(target)?;
            if let Some(slot) = dst.indirect_mut() {
                slot.set_value(instance).map_err(|_| Error::Construction {
                    type_name: target.name(),
                    reason: ConstructionFailure::NotAssignable,
                })?;
            }
        } else if dst.is_null() {
            return Ok(None);
        }
        Ok(Some(dst.resolved_mut()))
    }

    fn copy_contents(
        self,
        dst: &mut dyn Reflect,
        src: &dyn Reflect,
        path: &mut PropertyPath,
    ) -> Result<(), Error> {
        if let (true, Some(source)) = (dst.list().is_some(), src.list()) {
            return self.copy_list(dst, source, path);
        }
        if let (true, Some(source)) = (dst.keyed().is_some(), src.keyed()) {
            return self.copy_keyed(dst, source, path);
        }
        if let (Some(dst_bag), Some(src_bag)) =
            (dst.resolve_bag(self.store)?, src.resolve_bag(self.store)?)
        {
            for index in 0..src_bag.len() {
                let Some(name) = src_bag.info(index).map(|info| info.name()) else {
                    continue;
                };
                let Some(target) = dst_bag.index_of(name) else {
                    tracing::trace!(%path, name, "no matching destination property");
                    continue;
                };
                if dst_bag.info(target).is_some_and(|info| info.is_read_only()) {
                    tracing::trace!(%path, name, "read-only destination property skipped");
                    continue;
                }
                path.push_name(name);
                let result = src_bag.read_value(src, index, &mut |from| {
                    dst_bag.visit_value(dst, target, &mut |to| {
                        self.copy_member(to, from, path)?;
                        Ok(true)
                    })?;
                    Ok(())
                });
                path.pop();
                result?;
            }
            return Ok(());
        }
        if !assign_converted(self.conversions, dst, src) {
            tracing::trace!(%path, "incompatible value skipped");
        }
        Ok(())
    }

    fn copy_list(
        self,
        dst: &mut dyn Reflect,
        source: &dyn ListAccess,
        path: &mut PropertyPath,
    ) -> Result<(), Error> {
        let Some(list) = dst.list_mut() else {
            return Ok(());
        };
        list.set_count(source.count());
        for index in 0..source.count() {
            let (Some(from), Some(to)) = (source.element(index), list.element_mut(index)) else {
                break;
            };
            let pushed = !path.is_empty() && path.push_index(index).is_ok();
            let result = self.copy_member(to, from, path);
            if pushed {
                path.pop();
            }
            result?;
        }
        Ok(())
    }

    fn copy_keyed(
        self,
        dst: &mut dyn Reflect,
        source: &dyn KeyedAccess,
        path: &mut PropertyPath,
    ) -> Result<(), Error> {
        let Some(keyed) = dst.keyed_mut() else {
            return Ok(());
        };
        let key_traits = keyed.key_traits();
        let value_traits = keyed.value_traits();
        keyed.clear();
        for key in source.keys() {
            let Some(converted) = self.conversions.convert(&*key, &key_traits) else {
                tracing::trace!(%path, key = ?key, "key of an incompatible type skipped");
                continue;
            };
            if keyed.is_set() {
                if !keyed.insert(converted, None) {
                    tracing::trace!(%path, "set element of an incompatible type skipped");
                }
                continue;
            }
            let Some(from) = source.get(&*key) else {
                continue;
            };
            let pushed = !path.is_empty() && path.push_key(key_text(self.conversions, &*key)).is_ok();
            let result = self.entry_value(&value_traits, from, path);
            if pushed {
                path.pop();
            }
            if let Some(value) = result? {
                if !keyed.insert(converted, Some(value)) {
                    tracing::trace!(%path, "entry of an incompatible type skipped");
                }
            }
        }
        Ok(())
    }

    fn entry_value(
        self,
        traits: &TypeTraits,
        from: &dyn Reflect,
        path: &mut PropertyPath,
    ) -> Result<Option<Box<dyn Reflect>>, Error> {
        match self.store.construction().instantiate(traits) {
            Ok(mut value) => {
                self.copy_member(&mut *value, from, path)?;
                Ok(Some(value))
            }
            Err(error) => match self.conversions.convert(from, traits) {
                Some(value) => Ok(Some(value)),
                None => self.settle(Err(error), path),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use super::*;
    use crate::describe::TypeDescriptor;
    use crate::impls::Dyn;
    use crate::reflect::Typed;
    use crate::traits::TypeFlags;

    #[derive(Clone, Default)]
    struct Base;

    impl Typed for Base {
        fn type_traits() -> TypeTraits {
            TypeTraits::abstract_type::<Self>()
        }
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    struct DerivedA {
        base_int: i32,
        a: i32,
        untracked: u32,
    }

    impl Typed for DerivedA {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>().implements::<Base>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("BaseIntValue", |d| &d.base_int, |d| &mut d.base_int)
                    .field("A", |d| &d.a, |d| &mut d.a),
            )
        }
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    struct DerivedB {
        base_int: i32,
        b: f32,
    }

    impl Typed for DerivedB {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>().implements::<Base>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("BaseIntValue", |d| &d.base_int, |d| &mut d.base_int)
                    .field("B", |d| &d.b, |d| &mut d.b),
            )
        }
    }

    #[derive(Clone)]
    struct Stubborn {
        value: i32,
    }

    impl Typed for Stubborn {
        fn type_traits() -> TypeTraits {
            TypeTraits::new::<Self>(TypeFlags::VALUE_TYPE).implements::<Base>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(TypeDescriptor::<Self>::new().field("Value", |s| &s.value, |s| &mut s.value))
        }
    }

    #[derive(Clone, Default, Debug)]
    struct Holder {
        container: Dyn<Base>,
    }

    impl Typed for Holder {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(TypeDescriptor::<Self>::new().field(
                "Container",
                |h| &h.container,
                |h| &mut h.container,
            ))
        }
    }

    #[derive(Clone, Default, Debug)]
    struct Tagged {
        kind: String,
        a: i32,
    }

    impl Typed for Tagged {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("Kind", |t| &t.kind, |t| &mut t.kind)
                    .field("A", |t| &t.a, |t| &mut t.a),
            )
        }
    }

    #[derive(Clone, Default, Debug)]
    struct TaggedHolder {
        container: Tagged,
    }

    impl Typed for TaggedHolder {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(TypeDescriptor::<Self>::new().field(
                "Container",
                |h| &h.container,
                |h| &mut h.container,
            ))
        }
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Source {
        int: i32,
        float: f32,
        name: String,
        ints: Vec<i32>,
        scores: HashMap<String, i32>,
        only_here: bool,
    }

    impl Typed for Source {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("Int", |s| &s.int, |s| &mut s.int)
                    .field("Float", |s| &s.float, |s| &mut s.float)
                    .field("Name", |s| &s.name, |s| &mut s.name)
                    .field("Ints", |s| &s.ints, |s| &mut s.ints)
                    .field("Scores", |s| &s.scores, |s| &mut s.scores)
                    .field("OnlyHere", |s| &s.only_here, |s| &mut s.only_here),
            )
        }
    }

    #[derive(Clone, Default, Debug, PartialEq)]
    struct Destination {
        int: i64,
        float: f64,
        name: String,
        ints: Vec<i64>,
        scores: BTreeMap<String, i64>,
        only_there: u8,
    }

    impl Typed for Destination {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("Int", |d| &d.int, |d| &mut d.int)
                    .field("Float", |d| &d.float, |d| &mut d.float)
                    .field("Name", |d| &d.name, |d| &mut d.name)
                    .field("Ints", |d| &d.ints, |d| &mut d.ints)
                    .field("Scores", |d| &d.scores, |d| &mut d.scores)
                    .field("OnlyThere", |d| &d.only_there, |d| &mut d.only_there),
            )
        }
    }

    fn registries() -> (PropertyBagStore, ConversionRegistry) {
        (PropertyBagStore::new(), ConversionRegistry::with_primitives())
    }

    fn holder(value: Option<Box<dyn Reflect>>) -> Holder {
        let mut container = Dyn::null();
        if let Some(value) = value {
            container.set(value).unwrap();
        }
        Holder { container }
    }

    #[test]
    fn construct_keeps_an_instance_of_the_source_type() {
        let (store, conversions) = registries();
        let options = ConstructOptions::new();
        let src = holder(Some(Box::new(DerivedA {
            base_int: 1,
            a: 5,
            untracked: 0,
        })));
        let mut dst = holder(Some(Box::new(DerivedA {
            untracked: 9,
            ..DerivedA::default()
        })));
        Copier::construct(&store, &conversions, &options)
            .copy(&mut dst, &src)
            .unwrap();
        let kept = dst.container.downcast_ref::<DerivedA>().unwrap();
        assert_eq!((kept.base_int, kept.a, kept.untracked), (1, 5, 9));
    }

    #[test]
    fn construct_replaces_other_types_and_fills_empty_slots() {
        let (store, conversions) = registries();
        let options = ConstructOptions::new();
        let copier = Copier::construct(&store, &conversions, &options);
        let src = holder(Some(Box::new(DerivedA {
            base_int: 1,
            a: 5,
            untracked: 3,
        })));

        let mut dst = holder(Some(Box::new(DerivedB::default())));
        copier.copy(&mut dst, &src).unwrap();
        let built = dst.container.downcast_ref::<DerivedA>().unwrap();
        assert_eq!((built.a, built.untracked), (5, 0));

        let mut dst = holder(None);
        copier.copy(&mut dst, &src).unwrap();
        assert_eq!(dst.container.downcast_ref::<DerivedA>().map(|d| d.a), Some(5));

        copier.copy(&mut dst, &holder(None)).unwrap();
        assert!(dst.container.is_null());
    }

    #[derive(Clone, Default, Debug)]
    struct Arrays {
        ints: Option<Box<[i32]>>,
    }

    impl Typed for Arrays {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(TypeDescriptor::<Self>::new().field("IntArray", |a| &a.ints, |a| &mut a.ints))
        }
    }

    #[test]
    fn construct_allocates_and_nulls_arrays() {
        let (store, conversions) = registries();
        let options = ConstructOptions::new();
        let copier = Copier::construct(&store, &conversions, &options);
        let src = Arrays {
            ints: Some(vec![1, 2, 3, 4, 5].into_boxed_slice()),
        };
        let mut dst = Arrays::default();
        copier.copy(&mut dst, &src).unwrap();
        assert_eq!(dst.ints.as_deref(), Some(&[1, 2, 3, 4, 5][..]));

        copier.copy(&mut dst, &Arrays::default()).unwrap();
        assert!(dst.ints.is_none());
    }

    #[test]
    fn type_identifier_picks_the_instantiated_type() {
        let (store, conversions) = registries();
        store.register_type::<DerivedA>();
        let options = ConstructOptions::new().with_type_identifier_key("Kind");
        let copier = Copier::construct(&store, &conversions, &options);

        let src = TaggedHolder {
            container: Tagged {
                kind: "DerivedA".into(),
                a: 4,
            },
        };
        let mut dst = holder(None);
        copier.copy(&mut dst, &src).unwrap();
        assert_eq!(dst.container.downcast_ref::<DerivedA>().map(|d| d.a), Some(4));

        let src = TaggedHolder {
            container: Tagged {
                kind: "unknown type".into(),
                a: 4,
            },
        };
        let mut dst = holder(None);
        let error = copier.copy(&mut dst, &src).unwrap_err();
        assert!(matches!(error, Error::UnknownType { name } if name == "unknown type"));
    }

    #[test]
    fn transfer_matches_members_by_name() {
        let (store, conversions) = registries();
        let src = Source {
            int: 7,
            float: 1.5,
            name: "seven".into(),
            ints: vec![1, 2, 3],
            scores: HashMap::from([(String::from("ada"), 3)]),
            only_here: true,
        };
        let mut dst = Destination {
            scores: BTreeMap::from([(String::from("stale"), 1)]),
            only_there: 4,
            ..Destination::default()
        };
        Copier::transfer(&store, &conversions).copy(&mut dst, &src).unwrap();
        assert_eq!(dst.int, 7);
        assert_eq!(dst.float, 1.5);
        assert_eq!(dst.name, "seven");
        assert_eq!(dst.ints, [1, 2, 3]);
        assert_eq!(dst.scores, BTreeMap::from([(String::from("ada"), 3)]));
        assert_eq!(dst.only_there, 4);
    }

    #[test]
    fn transfer_skips_what_construct_reports() {
        let (store, conversions) = registries();
        let src = holder(Some(Box::new(Stubborn { value: 2 })));

        let mut dst = holder(None);
        Copier::transfer(&store, &conversions).copy(&mut dst, &src).unwrap();
        assert!(dst.container.is_null());

        let options = ConstructOptions::new();
        let mut dst = holder(None);
        assert!(
            Copier::construct(&store, &conversions, &options)
                .copy(&mut dst, &src)
                .is_err()
        );
    }

    #[test]
    fn copies_at_a_path() {
        let (store, conversions) = registries();
        let src = Source {
            ints: vec![4, 5],
            ..Source::default()
        };
        let mut dst = Destination::default();
        let path = PropertyPath::from_name("Ints");
        Copier::transfer(&store, &conversions)
            .copy_at_path(&mut dst, &src, &path)
            .unwrap();
        assert_eq!(dst.ints, [4, 5]);
        assert_eq!(dst.name, "");
    }
}
