// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Member descriptions and reflection-based bag synthesis.
//!
//! A type without a registered bag can still be visited if its [`Typed`] impl
//! returns a [`TypeDescriptor`] from [`Typed::describe`]. The descriptor lists
//! every member, including non-public ones, together with its visibility and
//! attributes; synthesis then applies the inclusion rules:
//!
//! - public members are included, everything else needs an [`Include`] attribute;
//! - members of embedded bases come first, in base order;
//! - a member that [shadows](MemberInfo::shadowing) an inherited one replaces it in
//!   place before inclusion is decided, so a hidden shadow hides the inherited
//!   member too;
//! - two included members with the same name are an [`Error::DuplicateProperty`];
//! - a member with a [`ReadOnly`] attribute, or without a setter, is read-only.
//!
//! Field members become direct [`Property`] accessors. Accessor members become
//! [`ReflectedProperty`] values that box on every access.

use core::fmt;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::attributes::{Include, PropertyAttributeCollection, ReadOnly};
use crate::bag::{BagSource, PropertyBag};
use crate::collection::AnyProperty;
use crate::construction::TypeConstruction;
use crate::error::{Error, SynthesisFailure};
use crate::property::{ContainerProperty, Projected, Property, ReflectedProperty};
use crate::reflect::Typed;

/// Declared visibility of a member.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Visible everywhere; included by default.
    #[default]
    Public,
    /// Crate-visible; needs [`Include`].
    Internal,
    /// Type-private; needs [`Include`].
    Private,
}

/// How a member is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A field borrowed in place.
    Field,
    /// A getter, with or without a setter.
    Accessor,
}

type Build<C> =
    Box<dyn FnOnce(String, PropertyAttributeCollection, bool) -> Box<dyn ContainerProperty<C>>>;

/// One member of a container type, not yet turned into a property.
pub struct MemberInfo<C> {
    name: String,
    visibility: Visibility,
    kind: MemberKind,
    shadows: bool,
    writable: bool,
    attributes: PropertyAttributeCollection,
    build: Build<C>,
}

impl<C: 'static> MemberInfo<C> {
    /// A public field.
    #[must_use]
    pub fn field<V: Typed>(
        name: impl Into<String>,
        get: impl Fn(&C) -> &V + Send + Sync + 'static,
        get_mut: impl Fn(&mut C) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            name.into(),
            MemberKind::Field,
            true,
            Box::new(
                move |name: String,
                      attributes: PropertyAttributeCollection,
                      read_only: bool|
                      -> Box<dyn ContainerProperty<C>> {
                    let property = Property::field(name, get, get_mut).with_attributes(&attributes);
                    Box::new(if read_only {
                        property.read_only()
                    } else {
                        property
                    })
                },
            ),
        )
    }

    /// A public accessor with a getter and a setter.
    #[must_use]
    pub fn accessor<V: Typed>(
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
        set: impl Fn(&mut C, V) + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            name.into(),
            MemberKind::Accessor,
            true,
            Box::new(
                move |name: String,
                      attributes: PropertyAttributeCollection,
                      read_only: bool|
                      -> Box<dyn ContainerProperty<C>> {
                    let property = ReflectedProperty::new(name, get, set).with_attributes(&attributes);
                    Box::new(if read_only {
                        property.read_only()
                    } else {
                        property
                    })
                },
            ),
        )
    }

    /// A public accessor with a getter only.
    #[must_use]
    pub fn getter<V: Typed>(
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            name.into(),
            MemberKind::Accessor,
            false,
            Box::new(
                move |name: String,
                      attributes: PropertyAttributeCollection,
                      _: bool|
                      -> Box<dyn ContainerProperty<C>> {
                    Box::new(ReflectedProperty::getter_only(name, get).with_attributes(&attributes))
                },
            ),
        )
    }

    fn new(name: String, kind: MemberKind, writable: bool, build: Build<C>) -> Self {
        Self {
            name,
            visibility: Visibility::Public,
            kind,
            shadows: false,
            writable,
            attributes: PropertyAttributeCollection::new(),
            build,
        }
    }

    /// Marks the member private.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Marks the member crate-visible.
    #[must_use]
    pub fn internal(mut self) -> Self {
        self.visibility = Visibility::Internal;
        self
    }

    /// Attaches an attribute.
    #[must_use]
    pub fn with_attribute<A: core::any::Any + Send + Sync>(mut self, attribute: A) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Declares that this member hides an inherited member of the same name.
    #[must_use]
    pub fn shadowing(mut self) -> Self {
        self.shadows = true;
        self
    }

    /// Member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Field or accessor.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Attached attributes.
    #[must_use]
    pub fn attributes(&self) -> &PropertyAttributeCollection {
        &self.attributes
    }

    /// Whether synthesis turns this member into a property.
    #[must_use]
    pub fn is_included(&self) -> bool {
        self.visibility == Visibility::Public || self.attributes.has::<Include>()
    }

    fn into_property(self) -> Box<dyn ContainerProperty<C>> {
        let read_only = !self.writable || self.attributes.has::<ReadOnly>();
        (self.build)(self.name, self.attributes, read_only)
    }

    fn project<O: 'static>(
        self,
        get: Arc<dyn Fn(&O) -> &C + Send + Sync>,
        get_mut: Arc<dyn Fn(&mut O) -> &mut C + Send + Sync>,
    ) -> MemberInfo<O> {
        let build = self.build;
        MemberInfo {
            name: self.name,
            visibility: self.visibility,
            kind: self.kind,
            shadows: self.shadows,
            writable: self.writable,
            attributes: self.attributes,
            build: Box::new(
                move |name: String,
                      attributes: PropertyAttributeCollection,
                      read_only: bool|
                      -> Box<dyn ContainerProperty<O>> {
                    Box::new(Projected::new(build(name, attributes, read_only), get, get_mut))
                },
            ),
        }
    }
}

impl<C> fmt::Debug for MemberInfo<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("kind", &self.kind)
            .field("shadows", &self.shadows)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}

type BaseMembers<C> = Box<dyn FnOnce() -> Vec<MemberInfo<C>>>;

/// The members of a container type, as returned from [`Typed::describe`].
///
/// Members are listed in declaration order. Embedded bases registered with
/// [`base`](Self::base) contribute their own members ahead of these.
pub struct TypeDescriptor<C> {
    bases: Vec<BaseMembers<C>>,
    members: Vec<MemberInfo<C>>,
}

impl<C: Typed> TypeDescriptor<C> {
    /// An empty description.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bases: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Adds a member.
    #[must_use]
    pub fn member(mut self, member: MemberInfo<C>) -> Self {
        self.members.push(member);
        self
    }

    /// Adds a public field.
    #[must_use]
    pub fn field<V: Typed>(
        self,
        name: impl Into<String>,
        get: impl Fn(&C) -> &V + Send + Sync + 'static,
        get_mut: impl Fn(&mut C) -> &mut V + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberInfo::field(name, get, get_mut))
    }

    /// Adds a public accessor.
    #[must_use]
    pub fn accessor<V: Typed>(
        self,
        name: impl Into<String>,
        get: impl Fn(&C) -> V + Send + Sync + 'static,
        set: impl Fn(&mut C, V) + Send + Sync + 'static,
    ) -> Self {
        self.member(MemberInfo::accessor(name, get, set))
    }

    /// Inherits the members of an embedded `B`, reached through `get` and `get_mut`.
    #[must_use]
    pub fn base<B: Typed>(
        mut self,
        get: impl Fn(&C) -> &B + Send + Sync + 'static,
        get_mut: impl Fn(&mut C) -> &mut B + Send + Sync + 'static,
    ) -> Self {
        let get: Arc<dyn Fn(&C) -> &B + Send + Sync> = Arc::new(get);
        let get_mut: Arc<dyn Fn(&mut C) -> &mut B + Send + Sync> = Arc::new(get_mut);
        self.bases.push(Box::new(move || {
            B::describe()
                .map(TypeDescriptor::linearize)
                .unwrap_or_default()
                .into_iter()
                .map(|member| member.project(get.clone(), get_mut.clone()))
                .collect()
        }));
        self
    }

    /// Number of members declared directly on this type.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no members are declared directly on this type.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Base members first, then this type's own.
    fn linearize(self) -> Vec<MemberInfo<C>> {
        let mut members = Vec::new();
        for base in self.bases {
            members.extend(base());
        }
        members.extend(self.members);
        members
    }
}

impl<C: Typed> Default for TypeDescriptor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for TypeDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("bases", &self.bases.len())
            .field("members", &self.members)
            .finish()
    }
}

/// Builds a bag for `C` from its [`TypeDescriptor`].
pub(crate) fn synthesize<C: Typed>(construction: &TypeConstruction) -> Result<PropertyBag<C>, Error> {
    let traits = C::type_traits();
    let fail = |reason| Error::Synthesis {
        type_name: traits.name(),
        reason,
    };
    if traits.is_generic_definition() {
        return Err(Error::OpenGeneric {
            type_name: traits.name(),
        });
    }
    if traits.is_abstract() {
        return Err(fail(SynthesisFailure::Abstract));
    }
    if traits.is_interface() {
        return Err(fail(SynthesisFailure::Interface));
    }
    if traits.is_multi_dimensional_array() {
        return Err(fail(SynthesisFailure::MultiDimensionalArray));
    }
    let descriptor = C::describe().ok_or_else(|| fail(SynthesisFailure::Undescribed))?;
    if traits.constructor().is_none() && !construction.has_explicit_construction_method(&traits) {
        return Err(fail(SynthesisFailure::NotConstructible));
    }

    // Shadowing applies to every member, included or not.
    let mut effective: Vec<MemberInfo<C>> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for member in descriptor.linearize() {
        match positions.get(member.name()) {
            Some(&position) if member.shadows => effective[position] = member,
            _ => {
                positions.insert(member.name.clone(), effective.len());
                effective.push(member);
            }
        }
    }

    let mut names: HashSet<String> = HashSet::new();
    let mut included: Vec<MemberInfo<C>> = Vec::new();
    for member in effective.into_iter().filter(MemberInfo::is_included) {
        if !names.insert(member.name.clone()) {
            return Err(Error::DuplicateProperty {
                container: traits.name(),
                name: member.name,
            });
        }
        included.push(member);
    }

    tracing::debug!(
        container = traits.name(),
        properties = included.len(),
        "synthesized property bag"
    );
    let properties = included
        .into_iter()
        .map(|member| AnyProperty::new(member.into_property()))
        .collect();
    PropertyBag::from_properties(properties, BagSource::Reflected)
}
