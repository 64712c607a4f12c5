// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visitor dispatch through `PropertyContainer`.

use std::collections::HashMap;

use understory_properties::{
    Adapters, Hide, MemberInfo, Property, PropertyBag, PropertyContainer, PropertyPath,
    PropertyVisitor, Reflect, TypeDescriptor, TypeTraits, Typed, VisitContext, VisitStatus,
};

#[derive(Clone, Default, Debug, PartialEq)]
struct Node {
    value: i32,
    children: Vec<Node>,
}

impl Typed for Node {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Value", |n| &n.value, |n| &mut n.value)
                .field("Children", |n| &n.children, |n| &mut n.children),
        )
    }
}

fn tree() -> Node {
    Node {
        value: 1,
        children: vec![
            Node {
                value: 2,
                children: vec![Node {
                    value: 4,
                    children: Vec::new(),
                }],
            },
            Node {
                value: 3,
                children: Vec::new(),
            },
        ],
    }
}

#[derive(Default)]
struct Sum {
    total: i64,
    paths: Vec<String>,
}

impl PropertyVisitor for Sum {
    fn visit_leaf(&mut self, cx: &mut VisitContext<'_>, value: &mut dyn Reflect) {
        if let Some(value) = value.downcast_ref::<i32>() {
            self.total += i64::from(*value);
            self.paths.push(cx.path().to_string());
        }
    }
}

#[test]
fn recursive_structures_are_visited_depth_first() {
    let container = PropertyContainer::new();
    let mut sum = Sum::default();
    let changed = container.accept(&mut sum, &mut tree()).unwrap();
    assert!(!changed);
    assert_eq!(sum.total, 10);
    assert_eq!(
        sum.paths,
        [
            "Value",
            "Children[0].Value",
            "Children[0].Children[0].Value",
            "Children[1].Value",
        ]
    );
}

struct Doubler {
    adapters: Adapters,
}

impl PropertyVisitor for Doubler {
    fn adapters(&self) -> Option<&Adapters> {
        Some(&self.adapters)
    }
}

#[test]
fn adapters_override_and_modify() {
    let mut adapters = Adapters::new();
    adapters.add_fn::<i32>(|cx, value| {
        *value *= 2;
        cx.mark_changed();
        VisitStatus::Override
    });
    let container = PropertyContainer::new();
    let mut node = tree();
    assert!(container.accept(&mut Doubler { adapters }, &mut node).unwrap());
    assert_eq!(node.value, 2);
    assert_eq!(node.children[0].children[0].value, 8);
    assert_eq!(node.children[1].value, 6);
}

#[test]
fn adapters_can_override_whole_containers() {
    let mut adapters = Adapters::new();
    adapters.add_fn::<Vec<Node>>(|_, children| {
        children.clear();
        VisitStatus::Override
    });
    let container = PropertyContainer::new();
    let mut node = tree();
    container.accept(&mut Doubler { adapters }, &mut node).unwrap();
    assert!(node.children.is_empty());
    assert_eq!(node.value, 1);
}

#[derive(Clone, Default)]
struct Settings {
    tags: Option<Vec<String>>,
    secret: String,
    volume: f32,
}

impl Typed for Settings {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(
            TypeDescriptor::<Self>::new()
                .field("Tags", |s| &s.tags, |s| &mut s.tags)
                .member(
                    MemberInfo::field("Secret", |s: &Self| &s.secret, |s| &mut s.secret)
                        .with_attribute(Hide),
                )
                .field("Volume", |s| &s.volume, |s| &mut s.volume),
        )
    }
}

#[derive(Default)]
struct Collections {
    seen: Vec<(String, bool)>,
    nulls: usize,
    leaves: Vec<String>,
}

impl PropertyVisitor for Collections {
    fn visit_collection(&mut self, cx: &mut VisitContext<'_>, value: &mut dyn Reflect) -> VisitStatus {
        self.seen.push((cx.path().to_string(), value.is_null()));
        VisitStatus::Unhandled
    }

    fn visit_leaf(&mut self, cx: &mut VisitContext<'_>, _value: &mut dyn Reflect) {
        self.leaves.push(cx.path().to_string());
    }

    fn visit_null(&mut self, _cx: &mut VisitContext<'_>) {
        self.nulls += 1;
    }
}

#[test]
fn null_collections_reach_visit_collection() {
    let container = PropertyContainer::new();
    let mut visitor = Collections::default();
    container.accept(&mut visitor, &mut Settings::default()).unwrap();
    assert_eq!(visitor.seen, [(String::from("Tags"), true)]);
    assert_eq!(visitor.nulls, 1);
    assert_eq!(visitor.leaves, ["Volume"]);
}

#[test]
fn registered_bags_take_precedence() {
    let container = PropertyContainer::new();
    let bag = PropertyBag::<Settings>::builder()
        .with(Property::field("Volume", |s: &Settings| &s.volume, |s| &mut s.volume))
        .build()
        .unwrap();
    container.store().register(bag).unwrap();

    let mut visitor = Collections::default();
    container.accept(&mut visitor, &mut Settings::default()).unwrap();
    assert!(visitor.seen.is_empty());
    assert_eq!(visitor.leaves, ["Volume"]);
}

#[test]
fn erased_roots_visit_the_same_way() {
    let container = PropertyContainer::new();
    let mut sum = Sum::default();
    let mut root: Box<dyn Reflect> = Box::new(tree());
    container.visit(&mut sum, &mut *root).unwrap();
    assert_eq!(sum.total, 10);
}

#[derive(Clone, Default)]
struct Scores {
    by_name: HashMap<String, i32>,
}

impl Typed for Scores {
    fn type_traits() -> TypeTraits {
        TypeTraits::value::<Self>()
    }

    fn describe() -> Option<TypeDescriptor<Self>> {
        Some(TypeDescriptor::<Self>::new().field("ByName", |s| &s.by_name, |s| &mut s.by_name))
    }
}

#[test]
fn visited_key_paths_parse_back() {
    let container = PropertyContainer::new();
    let mut scores = Scores {
        by_name: HashMap::from([(String::from("say \"hi\"]"), 7)]),
    };
    let mut sum = Sum::default();
    container.accept(&mut sum, &mut scores).unwrap();
    assert_eq!(sum.paths, [r#"ByName["say \"hi\"]"]"#]);

    let path = PropertyPath::parse(&sum.paths[0]).unwrap();
    assert_eq!(container.get_value_at_path::<i32>(&scores, &path).unwrap(), 7);
}

#[test]
fn slot_adapters_see_filled_slots() {
    let mut adapters = Adapters::new();
    adapters.add_fn::<Option<Vec<String>>>(|cx, tags| {
        if tags.is_some() {
            *tags = None;
            cx.mark_changed();
            return VisitStatus::Override;
        }
        VisitStatus::Unhandled
    });
    let container = PropertyContainer::new();
    let mut settings = Settings {
        tags: Some(vec!["a".into()]),
        ..Settings::default()
    };
    assert!(container.accept(&mut Doubler { adapters }, &mut settings).unwrap());
    assert_eq!(settings.tags, None);
}

#[test]
fn held_value_adapters_see_inside_slots() {
    let mut adapters = Adapters::new();
    adapters.add_fn::<Vec<String>>(|cx, tags| {
        tags.push("seen".into());
        cx.mark_changed();
        VisitStatus::Override
    });
    let container = PropertyContainer::new();
    let mut settings = Settings {
        tags: Some(Vec::new()),
        ..Settings::default()
    };
    assert!(container.accept(&mut Doubler { adapters }, &mut settings).unwrap());
    assert_eq!(settings.tags, Some(vec![String::from("seen")]));
}
