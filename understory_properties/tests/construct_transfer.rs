// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construct and transfer between containers.

use bitflags::bitflags;
use understory_properties::{
    ConstructOptions, Dyn, EnumValue, Error, PropertyContainer, PropertyPath, TypeCode,
    TypeDescriptor, TypeTraits, Typed,
};

#[derive(Clone, Default)]
struct Animal;

impl Typed for Animal {
    fn type_traits() -> TypeTraits {
        TypeTraits::abstract_type::<Self>()
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Dog {
    name: String,
    good: bool,
}

impl Typed for Dog {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>().implements::<Animal>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Name", |d| &d.name, |d| &mut d.name)
                .field("Good", |d| &d.good, |d| &mut d.good),
        )
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Cat {
    name: String,
    lives: u8,
}

impl Typed for Cat {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>().implements::<Animal>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Name", |c| &c.name, |c| &mut c.name)
                .field("Lives", |c| &c.lives, |c| &mut c.lives),
        )
    }
}

#[derive(Clone, Default, Debug)]
struct Home {
    pet: Dyn<Animal>,
    pets: Vec<Dyn<Animal>>,
}

impl Typed for Home {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Pet", |h| &h.pet, |h| &mut h.pet)
                .field("Pets", |h| &h.pets, |h| &mut h.pets),
        )
    }
}

#[derive(Clone, Default, Debug)]
struct Record {
    kind: String,
    name: String,
}

impl Typed for Record {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("$type", |r| &r.kind, |r| &mut r.kind)
                .field("Name", |r| &r.name, |r| &mut r.name),
        )
    }
}

#[derive(Clone, Default, Debug)]
struct RecordHome {
    pet: Record,
}

impl Typed for RecordHome {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(TypeDescriptor::<Self>::new().field("Pet", |h| &h.pet, |h| &mut h.pet))
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Access: u8 {
        const READ = 1;
        const WRITE = 2;
    }
}

impl Default for Access {
    fn default() -> Self {
        Self::empty()
    }
}

impl EnumValue for Access {
    const CODE: TypeCode = TypeCode::U8;
    const FLAGS: bool = true;

    fn to_repr(self) -> i64 {
        i64::from(self.bits())
    }

    fn from_repr(repr: i64) -> Option<Self> {
        u8::try_from(repr).ok().map(Self::from_bits_retain)
    }

    fn from_name(name: &str) -> Option<Self> {
        bitflags::parser::from_str(name).ok()
    }
}

impl Typed for Access {
    fn type_traits() -> TypeTraits {
        TypeTraits::enumeration::<Self>()
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Primitives {
    int: i32,
    float: f32,
    access: Access,
    label: String,
}

impl Typed for Primitives {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Int", |p| &p.int, |p| &mut p.int)
                .field("Float", |p| &p.float, |p| &mut p.float)
                .field("Access", |p| &p.access, |p| &mut p.access)
                .field("Label", |p| &p.label, |p| &mut p.label),
        )
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct WidePrimitives {
    int: i64,
    float: f64,
    access: Access,
    extra: bool,
}

impl Typed for WidePrimitives {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Int", |p| &p.int, |p| &mut p.int)
                .field("Float", |p| &p.float, |p| &mut p.float)
                .field("Access", |p| &p.access, |p| &mut p.access)
                .field("Extra", |p| &p.extra, |p| &mut p.extra),
        )
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct Outer {
    inner: Option<Primitives>,
}

impl Typed for Outer {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(TypeDescriptor::<Self>::new().field("Inner", |o| &o.inner, |o| &mut o.inner))
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
struct WideOuter {
    inner: Option<WidePrimitives>,
}

impl Typed for WideOuter {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(TypeDescriptor::<Self>::new().field("Inner", |o| &o.inner, |o| &mut o.inner))
    }
}

fn primitives() -> Primitives {
    Primitives {
        int: 42,
        float: 0.5,
        access: Access::READ | Access::WRITE,
        label: "answer".into(),
    }
}

#[test]
fn construct_replaces_a_different_derived_type() {
    let container = PropertyContainer::new();
    let src = Home {
        pet: Dyn::new(Dog {
            name: "Rex".into(),
            good: true,
        }),
        pets: Vec::new(),
    };
    let mut dst = Home {
        pet: Dyn::new(Cat::default()),
        pets: Vec::new(),
    };
    container.construct(&mut dst, &src).unwrap();
    assert_eq!(
        dst.pet.downcast_ref::<Dog>(),
        Some(&Dog {
            name: "Rex".into(),
            good: true,
        })
    );
}

#[test]
fn construct_builds_list_elements_of_their_runtime_types() {
    let container = PropertyContainer::new();
    let src = Home {
        pet: Dyn::null(),
        pets: vec![
            Dyn::new(Cat {
                name: "Tom".into(),
                lives: 9,
            }),
            Dyn::null(),
            Dyn::new(Dog::default()),
        ],
    };
    let mut dst = Home {
        pet: Dyn::new(Dog::default()),
        pets: Vec::new(),
    };
    container.construct(&mut dst, &src).unwrap();
    assert!(dst.pet.is_null());
    assert_eq!(dst.pets.len(), 3);
    assert_eq!(dst.pets[0].downcast_ref::<Cat>().map(|c| c.lives), Some(9));
    assert!(dst.pets[1].is_null());
    assert!(dst.pets[2].downcast_ref::<Dog>().is_some());
}

#[test]
fn construct_uses_the_type_identifier() {
    let container = PropertyContainer::new();
    container.store().register_type::<Dog>();
    let options = ConstructOptions::new().with_type_identifier_key("$type");

    let src = RecordHome {
        pet: Record {
            kind: "Dog".into(),
            name: "Fido".into(),
        },
    };
    let mut dst = Home::default();
    container.construct_with_options(&mut dst, &src, &options).unwrap();
    assert_eq!(dst.pet.downcast_ref::<Dog>().map(|d| d.name.as_str()), Some("Fido"));

    let src = RecordHome {
        pet: Record {
            kind: "unknown type".into(),
            name: String::new(),
        },
    };
    let mut dst = Home::default();
    let error = container
        .construct_with_options(&mut dst, &src, &options)
        .unwrap_err();
    assert!(matches!(error, Error::UnknownType { .. }));
}

#[test]
fn transfer_copies_primitives_between_types() {
    let container = PropertyContainer::new();
    let src = primitives();
    let mut dst = WidePrimitives {
        extra: true,
        ..WidePrimitives::default()
    };
    container.transfer(&mut dst, &src).unwrap();
    assert_eq!(
        dst,
        WidePrimitives {
            int: 42,
            float: 0.5,
            access: Access::READ | Access::WRITE,
            extra: true,
        }
    );
}

#[test]
fn transfer_assigns_and_clears_slots() {
    let container = PropertyContainer::new();
    let src = Outer {
        inner: Some(primitives()),
    };
    let mut dst = Outer::default();
    container.transfer(&mut dst, &src).unwrap();
    assert_eq!(dst, src);

    container.transfer(&mut dst, &Outer::default()).unwrap();
    assert_eq!(dst.inner, None);
}

#[test]
fn transfer_leaves_incompatible_empty_slots_alone() {
    let container = PropertyContainer::new();
    let src = Outer {
        inner: Some(primitives()),
    };

    let mut dst = WideOuter::default();
    container.transfer(&mut dst, &src).unwrap();
    assert_eq!(dst.inner, None);

    let mut dst = WideOuter {
        inner: Some(WidePrimitives::default()),
    };
    container.transfer(&mut dst, &src).unwrap();
    assert_eq!(dst.inner.map(|inner| inner.int), Some(42));
}

#[test]
fn transfer_at_a_path() {
    let container = PropertyContainer::new();
    let src = Home {
        pet: Dyn::new(Dog {
            name: "Rex".into(),
            good: true,
        }),
        pets: Vec::new(),
    };
    let mut dst = Home {
        pet: Dyn::new(Dog::default()),
        pets: vec![Dyn::null()],
    };
    let path = PropertyPath::parse("Pet.Name").unwrap();
    container.transfer_at_path(&mut dst, &src, &path).unwrap();
    let dog = dst.pet.downcast_ref::<Dog>().unwrap();
    assert_eq!((dog.name.as_str(), dog.good), ("Rex", false));
    assert_eq!(dst.pets.len(), 1);

    let missing = PropertyPath::parse("Pet.Lives").unwrap();
    assert!(container.transfer_at_path(&mut dst, &src, &missing).is_err());
}
