//! Generated schema trees for property tests.

use proptest::prelude::*;

use super::action::{max_length, max_value, min_length, min_value};
use super::{
    array, bigint, boolean, date, enum_, file, intersect, literal, nullable, nullish, number,
    object, optional, string, tuple, union, Schema,
};

/// Leaves whose raw form input is text.
pub fn text_leaf() -> impl Strategy<Value = Schema> {
    prop_oneof![
        Just(string()),
        (0usize..10, 10usize..20)
            .prop_map(|(min, max)| string().with_pipe([min_length(min), max_length(max)])),
        Just(number()),
        (-100i32..100).prop_map(|n| {
            let n = f64::from(n);
            number().with_pipe([min_value(n), max_value(n + 10.0)])
        }),
        Just(boolean()),
        Just(date()),
        Just(bigint()),
        prop::collection::vec("[a-z|.-]{1,4}", 1..4).prop_map(enum_),
        "[a-z]{1,5}".prop_map(literal),
    ]
}

pub fn leaf() -> impl Strategy<Value = Schema> {
    prop_oneof![4 => text_leaf(), 1 => Just(file())]
}

pub fn schema_tree() -> impl Strategy<Value = Schema> {
    leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(array),
            prop::collection::vec(inner.clone(), 1..4).prop_map(tuple),
            prop::collection::vec(("[a-z]{1,6}", inner.clone()), 1..4).prop_map(object),
            inner.clone().prop_map(optional),
            inner.clone().prop_map(nullable),
            inner.clone().prop_map(nullish),
            prop::collection::vec(inner.clone(), 2..4).prop_map(union),
            prop::collection::vec(inner, 1..3).prop_map(intersect),
        ]
    })
}

/// An object of generated fields, the shape a form schema has at its root.
pub fn form_schema() -> impl Strategy<Value = Schema> {
    prop::collection::vec(("[a-z]{1,6}", schema_tree()), 1..5).prop_map(object)
}
