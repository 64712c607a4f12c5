// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Properties: property bags, visitors and paths for nested values.
//!
//! This crate lets tools such as inspectors, binders and copy utilities work
//! on values whose types they were never compiled against. Every container
//! type is described by a property bag; a visitor walks the bags recursively;
//! a path addresses a single value anywhere in the graph.
//!
//! ## Core Concepts
//!
//! ### Types and values
//!
//! [`Typed`] is implemented per type and returns its [`TypeTraits`]: the flags
//! that say whether it is a primitive, an enum, a list, a keyed collection, a
//! nullable slot, or an abstract type. Container types also return a
//! [`TypeDescriptor`] listing their members. [`Reflect`] is the object-safe
//! view of any `Typed` value.
//!
//! ### Property bags
//!
//! A [`PropertyBag`] holds the [`Property`] accessors of one container type.
//! Bags are registered with a [`PropertyBagStore`] or synthesized on first use
//! from the type's descriptor. Bags for abstract types resolve to their most
//! specific registered implementation.
//!
//! ### Visitation
//!
//! A [`PropertyVisitor`] sees every property under a root. Per-type
//! [`Adapters`] can take over or wrap the default handling of any value.
//!
//! ### Paths
//!
//! A [`PropertyPath`] such as `Items[2].Name` or `Scores["ada"]` addresses one
//! value. [`PropertyContainer`] reads, writes and resizes at a path,
//! converting through the [`ConversionRegistry`] as needed.
//!
//! ### Construct and transfer
//!
//! [`PropertyContainer::construct`] and [`PropertyContainer::transfer`] copy
//! between containers by property name, even across different types.
//!
//! ## Quick Start
//!
//! ```rust
//! use understory_properties::{
//!     PropertyContainer, PropertyPath, PropertyVisitor, Reflect, TypeDescriptor, TypeTraits,
//!     Typed, VisitContext,
//! };
//!
//! #[derive(Clone, Default)]
//! struct Item {
//!     name: String,
//!     weight: f32,
//! }
//!
//! impl Typed for Item {
//!     fn type_traits() -> TypeTraits {
//!         TypeTraits::value::<Self>()
//!     }
//!
//!     fn describe() -> Option<TypeDescriptor<Self>> {
//!         Some(
//!             TypeDescriptor::<Self>::new()
//!                 .field("Name", |i| &i.name, |i| &mut i.name)
//!                 .field("Weight", |i| &i.weight, |i| &mut i.weight),
//!         )
//!     }
//! }
//!
//! #[derive(Clone, Default)]
//! struct Inventory {
//!     items: Vec<Item>,
//! }
//!
//! impl Typed for Inventory {
//!     fn type_traits() -> TypeTraits {
//!         TypeTraits::value::<Self>()
//!     }
//!
//!     fn describe() -> Option<TypeDescriptor<Self>> {
//!         Some(TypeDescriptor::<Self>::new().field("Items", |i| &i.items, |i| &mut i.items))
//!     }
//! }
//!
//! let container = PropertyContainer::new();
//! let mut inventory = Inventory {
//!     items: vec![Item { name: "rope".into(), weight: 1.5 }],
//! };
//!
//! // Path access converts to and from the stored type.
//! let weight = PropertyPath::parse("Items[0].Weight").unwrap();
//! assert_eq!(container.get_value_at_path::<String>(&inventory, &weight).unwrap(), "1.5");
//! container.set_value_at_path(&mut inventory, &weight, 2_i32).unwrap();
//! assert_eq!(inventory.items[0].weight, 2.0);
//!
//! // Grow the list, then fill in the new element.
//! let items = PropertyPath::parse("Items").unwrap();
//! container.set_count_at_path(&mut inventory, &items, 2).unwrap();
//! let name = PropertyPath::parse("Items[1].Name").unwrap();
//! container.set_value_at_path(&mut inventory, &name, String::from("lamp")).unwrap();
//!
//! // Visit every leaf and record its path.
//! #[derive(Default)]
//! struct Paths(Vec<String>);
//!
//! impl PropertyVisitor for Paths {
//!     fn visit_leaf(&mut self, cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) {
//!         self.0.push(cx.path().to_string());
//!     }
//! }
//!
//! let mut paths = Paths::default();
//! container.accept(&mut paths, &mut inventory).unwrap();
//! assert_eq!(
//!     paths.0,
//!     ["Items[0].Name", "Items[0].Weight", "Items[1].Name", "Items[1].Weight"]
//! );
//! ```
//!
//! ## Logging
//!
//! The crate reports through `tracing`: registrations and synthesis at
//! `debug`, path walking and conversion misses at `trace`, skipped transfer
//! members at `warn`, and pool misuse at `error`. No subscriber is installed.

mod adapter;
mod attributes;
mod bag;
mod change;
mod collection;
mod construct;
mod construction;
mod container;
mod conversion;
mod describe;
mod error;
mod impls;
mod path;
mod pool;
mod property;
mod reflect;
mod store;
mod traits;
mod visitor;
mod walk;

pub use adapter::{Adapter, AdapterContext, Adapters, FnAdapter, VisitStatus};
pub use attributes::{Hide, Include, PropertyAttributeCollection, ReadOnly};
pub use bag::{BagSource, ErasedBag, PropertyBag, PropertyBagBuilder};
pub use change::ChangeTracker;
pub use collection::{AnyProperty, CollectionProperty, KeyedCollectionProperty};
pub use construct::ConstructOptions;
pub use construction::TypeConstruction;
pub use container::PropertyContainer;
pub use conversion::ConversionRegistry;
pub use describe::{MemberInfo, MemberKind, TypeDescriptor, Visibility};
pub use error::{ConstructionFailure, Error, PoolError, SynthesisFailure};
pub use impls::{Dyn, MultiArray};
pub use path::{PathParseError, PathPart, PropertyPath};
pub use pool::Pool;
pub use property::{
    CollectionElementProperty, ContainerProperty, ElementPosition, Projected, Property,
    PropertyInfo, PropertyKind, ReflectedProperty,
};
pub use reflect::{IndirectAccess, KeyedAccess, ListAccess, Reflect, Typed};
pub use store::PropertyBagStore;
pub use traits::{EnumOps, EnumValue, TypeCode, TypeFlags, TypeTraits, construct_default};
pub use visitor::{PropertyVisitor, VisitContext};
