// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visitation: walking every property of a container, recursively.
//!
//! For each property of a container, in bag order, the engine:
//!
//! 1. skips it if it carries [`Hide`] or the visitor [excludes](PropertyVisitor::is_excluded) it;
//! 2. offers the value to each of the visitor's [`Adapters`] registered for
//!    its runtime type, stopping at the first that handles it;
//! 3. calls [`PropertyVisitor::visit_property`], or
//!    [`PropertyVisitor::visit_collection`] for list and keyed properties,
//!    stopping if the hook handles it;
//! 4. otherwise applies the default handling: null values are reported with
//!    [`PropertyVisitor::visit_null`], collections are walked element by element
//!    (each element going through the same steps), containers are recursed into,
//!    and anything else is a leaf passed to [`PropertyVisitor::visit_leaf`].
//!
//! Every step reports whether it modified the value. The flag is returned up
//! through each level so that accessor properties write their temporaries back
//! and the caller learns whether anything under the root changed.

use core::fmt;

use crate::adapter::{AdapterContext, Adapters, VisitStatus};
use crate::attributes::{Hide, PropertyAttributeCollection};
use crate::bag::ErasedBag;
use crate::change::ChangeTracker;
use crate::collection::replace_set_element;
use crate::conversion::{ConversionRegistry, key_text};
use crate::error::Error;
use crate::path::PropertyPath;
use crate::property::{CollectionElementProperty, ElementPosition, PropertyInfo, PropertyKind};
use crate::reflect::Reflect;
use crate::store::PropertyBagStore;
use crate::traits::TypeTraits;

/// Callbacks invoked while a container is visited.
///
/// Every hook has a default, so a visitor overrides only what it needs.
///
/// ```rust
/// use understory_properties::{
///     PropertyContainer, PropertyVisitor, Reflect, TypeDescriptor, TypeTraits, Typed,
///     VisitContext,
/// };
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
///
///     fn describe() -> Option<TypeDescriptor<Self>> {
///         Some(
///             TypeDescriptor::<Self>::new()
///                 .field("x", |p| &p.x, |p| &mut p.x)
///                 .field("y", |p| &p.y, |p| &mut p.y),
///         )
///     }
/// }
///
/// struct Scale(f32);
///
/// impl PropertyVisitor for Scale {
///     fn visit_leaf(&mut self, cx: &mut VisitContext<'_>, value: &mut dyn Reflect) {
///         if let Some(value) = value.downcast_mut::<f32>() {
///             *value *= self.0;
///             cx.mark_changed();
///         }
///     }
/// }
///
/// let container = PropertyContainer::new();
/// let mut point = Point { x: 1.0, y: 2.0 };
/// assert!(container.accept(&mut Scale(3.0), &mut point).unwrap());
/// assert_eq!((point.x, point.y), (3.0, 6.0));
/// ```
pub trait PropertyVisitor {
    /// Adapters consulted before the hooks below.
    fn adapters(&self) -> Option<&Adapters> {
        None
    }

    /// Skips a property, and everything under it, when `true`.
    fn is_excluded(&self, _property: &dyn PropertyInfo, _path: &PropertyPath) -> bool {
        false
    }

    /// Called for every scalar property that no adapter handled.
    ///
    /// Returning [`VisitStatus::Unhandled`] lets the default handling run.
    fn visit_property(&mut self, _cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) -> VisitStatus {
        VisitStatus::Unhandled
    }

    /// Called for every list or keyed property that no adapter handled,
    /// including null ones. Defaults to [`visit_property`](Self::visit_property).
    fn visit_collection(&mut self, cx: &mut VisitContext<'_>, value: &mut dyn Reflect) -> VisitStatus {
        self.visit_property(cx, value)
    }

    /// Called for values with no members and no elements.
    fn visit_leaf(&mut self, _cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) {}

    /// Called for empty `Option` and [`Dyn`](crate::Dyn) values.
    fn visit_null(&mut self, _cx: &mut VisitContext<'_>) {}
}

/// The property a visitor hook is called for.
pub struct VisitContext<'a> {
    property: &'a dyn PropertyInfo,
    path: &'a PropertyPath,
    tracker: ChangeTracker,
}

impl<'a> VisitContext<'a> {
    fn new(property: &'a dyn PropertyInfo, path: &'a PropertyPath) -> Self {
        Self {
            property,
            path,
            tracker: ChangeTracker::new(),
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
        self.path
    }

    /// Records that the hook modified the value.
    pub fn mark_changed(&mut self) {
        self.tracker.mark_changed();
    }

    /// Returns `true` once the hook recorded a change.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.tracker.is_changed()
    }
}

impl fmt::Debug for VisitContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitContext")
            .field("property", &self.property.name())
            .field("path", self.path)
            .field("changed", &self.tracker.is_changed())
            .finish()
    }
}

/// Stands in for a root collection, which has no owning property.
struct RootProperty {
    traits: TypeTraits,
    attributes: PropertyAttributeCollection,
}

impl PropertyInfo for RootProperty {
    fn name(&self) -> &str {
        ""
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn attributes(&self) -> &PropertyAttributeCollection {
        &self.attributes
    }

    fn value_traits(&self) -> &TypeTraits {
        &self.traits
    }
}

pub(crate) struct Engine<'e> {
    store: &'e PropertyBagStore,
    conversions: &'e ConversionRegistry,
    visitor: &'e mut dyn PropertyVisitor,
    adapters: Adapters,
    path: PropertyPath,
}

impl<'e> Engine<'e> {
    fn new(
        store: &'e PropertyBagStore,
        conversions: &'e ConversionRegistry,
        visitor: &'e mut dyn PropertyVisitor,
    ) -> Self {
        let adapters = visitor.adapters().cloned().unwrap_or_default();
        Self {
            store,
            conversions,
            visitor,
            adapters,
            path: PropertyPath::new(),
        }
    }

    pub(crate) fn path(&self) -> &PropertyPath {
        &self.path
    }

    fn visit_root(&mut self, root: &mut dyn Reflect) -> Result<bool, Error> {
        let root = root.resolved_mut();
        if let Some(bag) = root.resolve_bag(self.store)? {
            return self.visit_container(&*bag, root);
        }
        if root.list().is_some() || root.keyed().is_some() {
            let property = RootProperty {
                traits: root.runtime_traits(),
                attributes: PropertyAttributeCollection::new(),
            };
            return self.dispatch(&property, root);
        }
        Err(Error::NotAContainer {
            path: PropertyPath::new(),
            type_name: root.runtime_traits().name(),
        })
    }

    fn visit_container(
        &mut self,
        bag: &dyn ErasedBag,
        container: &mut dyn Reflect,
    ) -> Result<bool, Error> {
        let mut changed = false;
        for index in 0..bag.len() {
            let Some(property) = bag.info(index) else {
                continue;
            };
            if property.attributes().has::<Hide>() {
                continue;
            }
            self.path.push_name(property.name());
            if self.visitor.is_excluded(property, &self.path) {
                self.path.pop();
                continue;
            }
            let result = bag.visit_value(container, index, &mut |value| {
                self.dispatch(property, value)
            });
            self.path.pop();
            changed |= result?;
        }
        Ok(changed)
    }

    fn dispatch(&mut self, property: &dyn PropertyInfo, value: &mut dyn Reflect) -> Result<bool, Error> {
        self.run_adapters(0, property, value)
    }

    pub(crate) fn run_adapters(
        &mut self,
        start: usize,
        property: &dyn PropertyInfo,
        value: &mut dyn Reflect,
    ) -> Result<bool, Error> {
        let mut changed = false;
        for next in start..self.adapters.len() {
            let Some(adapter) = self.adapters.get(next) else {
                break;
            };
            // A slot matches by its own type first, then by what it holds.
            let target: &mut dyn Reflect = if adapter.value_type() == value.value_type_id() {
                &mut *value
            } else if adapter.value_type() == value.resolved().value_type_id() {
                value.resolved_mut()
            } else {
                continue;
            };
            let mut cx = AdapterContext::new(self, property, next + 1);
            let status = adapter.visit_erased(&mut cx, target);
            let (adapter_changed, error) = cx.finish();
            changed |= adapter_changed;
            if let Some(error) = error {
                return Err(error);
            }
            if status.is_handled() {
                return Ok(changed);
            }
        }
        Ok(self.visit_default(property, value.resolved_mut())? || changed)
    }

    fn visit_default(
        &mut self,
        property: &dyn PropertyInfo,
        value: &mut dyn Reflect,
    ) -> Result<bool, Error> {
        let mut cx = VisitContext::new(property, &self.path);
        let status = if property.kind() == PropertyKind::Scalar {
            self.visitor.visit_property(&mut cx, value)
        } else {
            self.visitor.visit_collection(&mut cx, value)
        };
        let mut changed = cx.is_changed();
        if status.is_handled() {
            return Ok(changed);
        }

        if value.is_null() {
            let mut cx = VisitContext::new(property, &self.path);
            self.visitor.visit_null(&mut cx);
            return Ok(changed || cx.is_changed());
        }
        if value.list().is_some() {
            changed |= self.visit_list(property, value)?;
        } else if value.keyed().is_some() {
            changed |= self.visit_keyed(property, value)?;
        } else if let Some(bag) = value.resolve_bag(self.store)? {
            changed |= self.visit_container(&*bag, value)?;
        } else {
            let mut cx = VisitContext::new(property, &self.path);
            self.visitor.visit_leaf(&mut cx, value);
            changed |= cx.is_changed();
        }
        Ok(changed)
    }

    fn visit_list(&mut self, owner: &dyn PropertyInfo, value: &mut dyn Reflect) -> Result<bool, Error> {
        let Some(list) = value.list() else {
            return Ok(false);
        };
        let count = list.count();
        let traits = list.element_traits();
        let mut changed = false;
        for index in 0..count {
            let Some(element) = value.list_mut().and_then(|list| list.element_mut(index)) else {
                break;
            };
            let property = CollectionElementProperty::new(
                ElementPosition::Index(index),
                traits.clone(),
                owner.is_read_only(),
            );
            let pushed = !self.path.is_empty() && self.path.push_index(index).is_ok();
            let result = self.dispatch(&property, element);
            if pushed {
                self.path.pop();
            }
            changed |= result?;
        }
        Ok(changed)
    }

    fn visit_keyed(&mut self, owner: &dyn PropertyInfo, value: &mut dyn Reflect) -> Result<bool, Error> {
        let Some(keyed) = value.keyed() else {
            return Ok(false);
        };
        let keys = keyed.keys();
        let is_set = keyed.is_set();
        let traits = keyed.value_traits();
        let mut changed = false;
        for key in keys {
            let text = key_text(self.conversions, &*key);
            let property = CollectionElementProperty::new(
                ElementPosition::Key(text.clone()),
                traits.clone(),
                owner.is_read_only(),
            );
            let pushed = !self.path.is_empty() && self.path.push_key(text).is_ok();
            let result = if is_set {
                self.visit_set_element(&property, value, key)
            } else {
                match value.keyed_mut().and_then(|keyed| keyed.get_mut(&*key)) {
                    Some(element) => self.dispatch(&property, element),
                    None => Ok(false),
                }
            };
            if pushed {
                self.path.pop();
            }
            changed |= result?;
        }
        Ok(changed)
    }

    /// Set elements are visited as a copy and re-inserted when changed.
    fn visit_set_element(
        &mut self,
        property: &dyn PropertyInfo,
        value: &mut dyn Reflect,
        key: Box<dyn Reflect>,
    ) -> Result<bool, Error> {
        let Some(mut element) = value
            .keyed()
            .and_then(|keyed| keyed.get(&*key))
            .map(Reflect::clone_boxed)
        else {
            return Ok(false);
        };
        if !self.dispatch(property, &mut *element)? {
            return Ok(false);
        }
        if let Some(keyed) = value.keyed_mut() {
            if !replace_set_element(keyed, &*key, element) {
                tracing::warn!(path = %self.path, "visited set element merged with an existing one");
            }
        }
        Ok(true)
    }
}

/// Visits every property under `root`, returning whether anything changed.
pub(crate) fn accept(
    store: &PropertyBagStore,
    conversions: &ConversionRegistry,
    visitor: &mut dyn PropertyVisitor,
    root: &mut dyn Reflect,
) -> Result<bool, Error> {
    Engine::new(store, conversions, visitor).visit_root(root)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::attributes::Hide;
    use crate::describe::{MemberInfo, TypeDescriptor};
    use crate::reflect::Typed;
    use crate::Dyn;

    #[derive(Clone, Default)]
    struct Stats {
        hp: i32,
        speed: f32,
    }

    impl Typed for Stats {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("Hp", |s| &s.hp, |s| &mut s.hp)
                    .field("Speed", |s| &s.speed, |s| &mut s.speed),
            )
        }
    }

    #[derive(Clone, Default)]
    struct Unit {
        name: String,
        stats: Stats,
        loot: Vec<i32>,
        spare: Option<Vec<i32>>,
        notes: BTreeMap<String, i32>,
        hidden: i32,
        pet: Dyn<Stats>,
    }

    impl Typed for Unit {
        fn type_traits() -> TypeTraits {
            TypeTraits::value::<Self>()
        }

        fn describe() -> Option<TypeDescriptor<Self>> {
            Some(
                TypeDescriptor::<Self>::new()
                    .field("Name", |u| &u.name, |u| &mut u.name)
                    .field("Stats", |u| &u.stats, |u| &mut u.stats)
                    .field("Loot", |u| &u.loot, |u| &mut u.loot)
                    .field("Spare", |u| &u.spare, |u| &mut u.spare)
                    .field("Notes", |u| &u.notes, |u| &mut u.notes)
                    .member(
                        MemberInfo::field("Hidden", |u: &Self| &u.hidden, |u| &mut u.hidden)
                            .with_attribute(Hide),
                    )
                    .field("Pet", |u| &u.pet, |u| &mut u.pet),
            )
        }
    }

    fn unit() -> Unit {
        Unit {
            name: "scout".into(),
            stats: Stats { hp: 10, speed: 1.5 },
            loot: vec![1, 2],
            spare: None,
            notes: BTreeMap::from([(String::from("a"), 1)]),
            hidden: 0,
            pet: Dyn::null(),
        }
    }

    #[derive(Default)]
    struct Recorder {
        leaves: Vec<String>,
        nulls: Vec<String>,
        collections: Vec<String>,
        adapters: Option<Adapters>,
    }

    impl PropertyVisitor for Recorder {
        fn adapters(&self) -> Option<&Adapters> {
            self.adapters.as_ref()
        }

        fn visit_collection(&mut self, cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) -> VisitStatus {
            self.collections.push(cx.path().to_string());
            VisitStatus::Unhandled
        }

        fn visit_leaf(&mut self, cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) {
            self.leaves.push(cx.path().to_string());
        }

        fn visit_null(&mut self, cx: &mut VisitContext<'_>) {
            self.nulls.push(cx.path().to_string());
        }
    }

    fn visit(visitor: &mut dyn PropertyVisitor, root: &mut dyn Reflect) -> Result<bool, Error> {
        accept(
            &PropertyBagStore::new(),
            &ConversionRegistry::with_primitives(),
            visitor,
            root,
        )
    }

    #[test]
    fn walks_every_visible_property_in_order() {
        let mut recorder = Recorder::default();
        let changed = visit(&mut recorder, &mut unit()).unwrap();
        assert!(!changed);
        assert_eq!(
            recorder.leaves,
            ["Name", "Stats.Hp", "Stats.Speed", "Loot[0]", "Loot[1]", "Notes[\"a\"]"]
        );
        assert_eq!(recorder.nulls, ["Spare", "Pet"]);
        assert_eq!(recorder.collections, ["Loot", "Spare", "Notes"]);
    }

    #[test]
    fn override_adapter_skips_default_handling() {
        let mut adapters = Adapters::new();
        adapters.add_fn::<i32>(|_, _| VisitStatus::Override);
        let mut recorder = Recorder {
            adapters: Some(adapters),
            ..Recorder::default()
        };
        visit(&mut recorder, &mut unit()).unwrap();
        assert_eq!(recorder.leaves, ["Name", "Stats.Speed"]);
    }

    #[test]
    fn continue_visitation_runs_the_rest() {
        let mut adapters = Adapters::new();
        adapters.add_fn::<i32>(|cx, value| {
            *value += 1;
            cx.mark_changed();
            cx.continue_visitation(value)
        });
        adapters.add_fn::<i32>(|_, _| VisitStatus::Unhandled);
        let mut recorder = Recorder {
            adapters: Some(adapters),
            ..Recorder::default()
        };
        let mut unit = unit();
        assert!(visit(&mut recorder, &mut unit).unwrap());
        assert_eq!(unit.stats.hp, 11);
        assert_eq!(unit.loot, [2, 3]);
        assert_eq!(unit.notes["a"], 2);
        assert_eq!(unit.hidden, 0);
        assert!(recorder.leaves.contains(&String::from("Stats.Hp")));
    }

    #[test]
    fn excluded_properties_are_not_probed() {
        struct SkipStats(usize);

        impl PropertyVisitor for SkipStats {
            fn is_excluded(&self, property: &dyn PropertyInfo, _path: &PropertyPath) -> bool {
                property.name() == "Stats"
            }

            fn visit_leaf(&mut self, _cx: &mut VisitContext<'_>, value: &mut dyn Reflect) {
                if value.is::<i32>() || value.is::<f32>() {
                    self.0 += 1;
                }
            }
        }

        let mut visitor = SkipStats(0);
        visit(&mut visitor, &mut unit()).unwrap();
        assert_eq!(visitor.0, 3);
    }

    #[test]
    fn polymorphic_slots_are_followed() {
        let mut unit = unit();
        unit.pet = Dyn::new(Stats { hp: 3, speed: 0.0 });
        let mut recorder = Recorder::default();
        visit(&mut recorder, &mut unit).unwrap();
        assert_eq!(recorder.nulls, ["Spare"]);
        assert!(recorder.leaves.contains(&String::from("Pet.Hp")));
    }

    #[test]
    fn root_collections_and_leaves() {
        let mut recorder = Recorder::default();
        let mut list = vec![unit(), unit()];
        visit(&mut recorder, &mut list).unwrap();
        assert_eq!(recorder.collections, ["", "Loot", "Spare", "Notes", "Loot", "Spare", "Notes"]);
        assert!(matches!(
            visit(&mut recorder, &mut 5_i32),
            Err(Error::NotAContainer { .. })
        ));
    }
}
