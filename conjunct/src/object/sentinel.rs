//! Rules for the built-in full and empty objects, shared by every family.
//!
//! Each helper returns `None` when neither side is a sentinel, leaving the question
//! to the family.

use super::AbstractObject;
use crate::composer::QueryContext;

/// The two built-in objects every family has.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Sentinel {
    Full,
    Empty,
}

pub(crate) fn may_equal<O: AbstractObject>(a: &O, b: &O) -> Option<bool> {
    match (a.sentinel(), b.sentinel()) {
        (Some(Sentinel::Empty), _) | (_, Some(Sentinel::Empty)) => Some(false),
        (Some(Sentinel::Full), _) | (_, Some(Sentinel::Full)) => Some(true),
        _ => None,
    }
}

/// A sentinel on either side never must-equals anything: full denotes many entities
/// and empty denotes none.
pub(crate) fn must_equal<O: AbstractObject>(a: &O, b: &O) -> Option<bool> {
    if a.sentinel().is_some() || b.sentinel().is_some() {
        Some(false)
    } else {
        None
    }
}

pub(crate) fn equal_set<O: AbstractObject>(a: &O, b: &O, q: QueryContext<'_>) -> Option<bool> {
    match (a.sentinel(), b.sentinel()) {
        (Some(Sentinel::Full), _) => Some(b.is_full(q)),
        (_, Some(Sentinel::Full)) => Some(a.is_full(q)),
        (Some(Sentinel::Empty), _) => Some(b.is_empty(q)),
        (_, Some(Sentinel::Empty)) => Some(a.is_empty(q)),
        _ => None,
    }
}

pub(crate) fn sub_set<O: AbstractObject>(a: &O, b: &O, q: QueryContext<'_>) -> Option<bool> {
    match (a.sentinel(), b.sentinel()) {
        (Some(Sentinel::Empty), _) | (_, Some(Sentinel::Full)) => Some(true),
        (Some(Sentinel::Full), _) => Some(b.is_full(q)),
        (_, Some(Sentinel::Empty)) => Some(a.is_empty(q)),
        _ => None,
    }
}

pub(crate) fn meet_update<O: AbstractObject>(
    a: &mut O,
    b: &O,
    q: QueryContext<'_>,
) -> Option<bool> {
    match (a.sentinel(), b.sentinel()) {
        (Some(Sentinel::Empty), _) | (_, Some(Sentinel::Full)) => Some(false),
        (Some(Sentinel::Full), _) => {
            let modified = !b.is_full(q);
            *a = b.clone();
            Some(modified)
        }
        (_, Some(Sentinel::Empty)) => {
            *a = O::empty();
            Some(true)
        }
        _ => None,
    }
}
