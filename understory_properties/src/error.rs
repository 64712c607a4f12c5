// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types shared by every operation in the crate.

use thiserror::Error;

use crate::path::{PathParseError, PropertyPath};

/// Failure raised by registration, synthesis, path access, or construction.
///
/// Variants are grouped the way callers usually react to them:
///
/// - **Configuration** errors ([`Error::DuplicateProperty`], [`Error::DuplicateBag`],
///   [`Error::OpenGeneric`], [`Error::AmbiguousBag`], [`Error::Synthesis`]) point at a
///   programming mistake and are raised at registration or first resolution.
/// - **Path** errors carry the [`PropertyPath`] prefix at which the walk failed.
/// - **Construction** errors name the type that could not be instantiated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Two properties of one bag share a name.
    #[error("property `{name}` is declared more than once on `{container}`")]
    DuplicateProperty {
        /// Container type whose bag was being built.
        container: &'static str,
        /// The repeated name.
        name: String,
    },
    /// A bag is already registered for the type.
    #[error("a property bag is already registered for `{type_name}`")]
    DuplicateBag {
        /// Container type.
        type_name: &'static str,
    },
    /// Generic type definitions never have bags.
    #[error("`{type_name}` is a generic type definition and cannot have a property bag")]
    OpenGeneric {
        /// The generic definition.
        type_name: &'static str,
    },
    /// Polymorphic resolution found several equally specific bags.
    #[error("`{requested}` matches several registered property bags: {candidates:?}")]
    AmbiguousBag {
        /// Abstract or interface type that was requested.
        requested: &'static str,
        /// Concrete candidates that tied.
        candidates: Vec<&'static str>,
    },
    /// A reflected bag could not be built.
    #[error("cannot build a property bag for `{type_name}`: {reason}")]
    Synthesis {
        /// Container type.
        type_name: &'static str,
        /// What prevented synthesis.
        reason: SynthesisFailure,
    },
    /// A bag was required but none exists.
    #[error("no property bag exists for `{type_name}`")]
    MissingBag {
        /// Type that has no bag.
        type_name: &'static str,
    },
    /// An erased value did not have the expected concrete type.
    #[error("expected a value of type `{expected}`, found `{found}`")]
    TypeMismatch {
        /// Type the operation required.
        expected: &'static str,
        /// Runtime type that was supplied.
        found: &'static str,
    },
    /// A path string or programmatic path edit was malformed.
    #[error(transparent)]
    Parse(#[from] PathParseError),
    /// A name segment did not match any property.
    #[error("property `{name}` not found at `{path}`")]
    PropertyNotFound {
        /// Path up to and including the failing segment.
        path: PropertyPath,
        /// The name that was looked up.
        name: String,
    },
    /// An index segment was past the end of a collection.
    #[error("index {index} is out of range for a collection of {count} at `{path}`")]
    IndexOutOfRange {
        /// Path up to and including the failing segment.
        path: PropertyPath,
        /// Requested index.
        index: usize,
        /// Element count at the time of access.
        count: usize,
    },
    /// A key segment did not match any entry.
    #[error("key `{key}` not found at `{path}`")]
    KeyNotFound {
        /// Path up to and including the failing segment.
        path: PropertyPath,
        /// Key text from the path.
        key: String,
    },
    /// The walk reached an empty nullable value before the last segment.
    #[error("value at `{path}` is null")]
    NullValue {
        /// Path of the null value.
        path: PropertyPath,
    },
    /// A name segment was applied to a value without a bag.
    #[error("value of type `{type_name}` at `{path}` is not a container")]
    NotAContainer {
        /// Path of the value.
        path: PropertyPath,
        /// Runtime type of the value.
        type_name: &'static str,
    },
    /// An index segment or count change was applied to a value that is not indexable.
    #[error("value of type `{type_name}` at `{path}` is not an indexed collection")]
    NotACollection {
        /// Path of the value.
        path: PropertyPath,
        /// Runtime type of the value.
        type_name: &'static str,
    },
    /// A key segment was applied to a value that is not a keyed collection.
    #[error("value of type `{type_name}` at `{path}` is not a keyed collection")]
    NotKeyed {
        /// Path of the value.
        path: PropertyPath,
        /// Runtime type of the value.
        type_name: &'static str,
    },
    /// A write went through a read-only property.
    #[error("property at `{path}` is read-only")]
    ReadOnly {
        /// Path of the property.
        path: PropertyPath,
    },
    /// The value at the end of a path could not be converted to the requested type.
    #[error("could not get value of type `{type_name}` at `{path}`")]
    CannotGetValue {
        /// Requested type.
        type_name: &'static str,
        /// Path that was read.
        path: PropertyPath,
    },
    /// The supplied value could not be converted to the property's type.
    #[error("could not set value of type `{type_name}` at `{path}`")]
    CannotSetValue {
        /// Supplied type.
        type_name: &'static str,
        /// Path that was written.
        path: PropertyPath,
    },
    /// A type could not be instantiated.
    #[error("cannot instantiate `{type_name}`: {reason}")]
    Construction {
        /// Type that was requested.
        type_name: &'static str,
        /// Why it failed.
        reason: ConstructionFailure,
    },
    /// A type identifier did not name any known type.
    #[error("no registered type is named `{name}`")]
    UnknownType {
        /// The identifier that was looked up.
        name: String,
    },
}

/// Why reflection-based bag synthesis refused a type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SynthesisFailure {
    /// Abstract types have no instances to describe.
    #[error("abstract types cannot be containers")]
    Abstract,
    /// Interfaces have no instances to describe.
    #[error("interfaces cannot be containers")]
    Interface,
    /// No default constructor and no registered factory.
    #[error("it has neither a parameterless constructor nor a registered factory")]
    NotConstructible,
    /// Multi-dimensional arrays are leaves.
    #[error("multi-dimensional arrays cannot be containers")]
    MultiDimensionalArray,
    /// The type provides no member description.
    #[error("the type does not describe its members")]
    Undescribed,
}

/// Why [`TypeConstruction`](crate::TypeConstruction) refused to build a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConstructionFailure {
    /// The type is abstract.
    #[error("the type is abstract")]
    Abstract,
    /// The type is an interface.
    #[error("the type is an interface")]
    Interface,
    /// The type is a generic definition.
    #[error("the type is a generic type definition")]
    GenericDefinition,
    /// Neither a parameterless constructor nor a factory is available.
    #[error("no parameterless constructor or explicit construction method is available")]
    NoConstructor,
    /// The instance does not fit the slot it was built for.
    #[error("the instance is not assignable to the destination")]
    NotAssignable,
}

/// An object was released to a [`Pool`](crate::Pool) that already holds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("object of type `{type_name}` is already pooled")]
pub struct PoolError {
    /// Type of the pooled object.
    pub type_name: &'static str,
}
