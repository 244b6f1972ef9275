//! Union and intersection combinators over abstract objects.
//!
//! A [`Combined`] object aggregates the answers of several analyses (or of one
//! analysis along several edges). In union mode it denotes the union of what its
//! children denote, in intersect mode their intersection. Pairwise operations between
//! two combinators compare children position by position; an operation between a
//! combinator and a plain object compares the plain object against every child.

use super::AbstractObject;
use crate::composer::QueryContext;
use crate::error::{CompositionError, fatal};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::rc::Rc;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombinationMode {
    #[default]
    Union,
    Intersect,
}

impl CombinationMode {
    pub fn is_union(&self) -> bool {
        matches!(self, CombinationMode::Union)
    }
}

impl Display for CombinationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CombinationMode::Union => write!(f, "Union"),
            CombinationMode::Intersect => write!(f, "Intersect"),
        }
    }
}

/// `hit` as soon as one answer equals `hit`, `!hit` when none does.
fn settle<I: IntoIterator<Item = bool>>(answers: I, hit: bool) -> bool {
    if answers.into_iter().any(|answer| answer == hit) {
        hit
    } else {
        !hit
    }
}

/// An ordered list of objects of one family, read as their union or intersection.
///
/// Children are shared; [`meet_update`](Combined::meet_update) copies a child only
/// when some other owner still holds it.
#[derive(Debug, Clone)]
pub struct Combined<O> {
    mode: CombinationMode,
    children: Vec<Rc<O>>,
}

impl<O> Combined<O> {
    pub fn new(mode: CombinationMode, children: Vec<Rc<O>>) -> Self {
        Self { mode, children }
    }

    pub fn union(children: Vec<Rc<O>>) -> Self {
        Self::new(CombinationMode::Union, children)
    }

    pub fn intersect(children: Vec<Rc<O>>) -> Self {
        Self::new(CombinationMode::Intersect, children)
    }

    pub fn singleton(mode: CombinationMode, child: Rc<O>) -> Self {
        Self::new(mode, vec![child])
    }

    pub fn add(&mut self, child: Rc<O>) {
        self.children.push(child);
    }

    pub fn mode(&self) -> CombinationMode {
        self.mode
    }

    pub fn is_union(&self) -> bool {
        self.mode.is_union()
    }

    pub fn children(&self) -> &[Rc<O>] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

impl<O: AbstractObject> Combined<O> {
    #[track_caller]
    fn require_same_arity(&self, that: &Self, operation: &'static str) {
        if self.children.len() != that.children.len() {
            fatal(CompositionError::MismatchedArity {
                operation,
                left: self.children.len(),
                right: that.children.len(),
            })
        }
    }

    fn pairs<'a>(&'a self, that: &'a Self) -> impl Iterator<Item = (&'a Rc<O>, &'a Rc<O>)> {
        self.children.iter().zip(that.children.iter())
    }

    /// The syntactic base shared by every child, if they all have the same one.
    pub fn common_base(&self) -> Option<conjunct_ir::TermId> {
        self.children
            .iter()
            .map(|c| c.syntactic_base())
            .all_equal_value()
            .ok()
            .flatten()
    }

    /// Pairwise may-equality. Combinators of different sizes cannot be paired, so a
    /// union conservatively answers `true` and an intersection `false`.
    pub fn may_equal(&self, that: &Self, q: QueryContext<'_>) -> bool {
        let union = self.is_union();
        if self.children.len() != that.children.len() {
            return union;
        }
        settle(self.pairs(that).map(|(a, b)| a.may_equal(b, q)), union)
    }

    pub fn must_equal(&self, that: &Self, q: QueryContext<'_>) -> bool {
        if self.children.len() != that.children.len() {
            return false;
        }
        settle(self.pairs(that).map(|(a, b)| a.must_equal(b, q)), !self.is_union())
    }

    /// Pairwise set equality: every child must denote the same set as its counterpart.
    #[track_caller]
    pub fn equal_set(&self, that: &Self, q: QueryContext<'_>) -> bool {
        self.require_same_arity(that, "equal_set");
        self.pairs(that).all(|(a, b)| a.equal_set(b, q))
    }

    #[track_caller]
    pub fn sub_set(&self, that: &Self, q: QueryContext<'_>) -> bool {
        self.require_same_arity(that, "sub_set");
        settle(self.pairs(that).map(|(a, b)| a.sub_set(b, q)), self.is_union())
    }

    /// Meet every child with its counterpart. Returns whether any child changed.
    #[track_caller]
    pub fn meet_update(&mut self, that: &Self, q: QueryContext<'_>) -> bool {
        self.require_same_arity(that, "meet_update");
        let mut modified = false;
        for (mine, theirs) in self.children.iter_mut().zip(that.children.iter()) {
            modified |= Rc::make_mut(mine).meet_update(theirs, q);
        }
        modified
    }

    pub fn is_full(&self, q: QueryContext<'_>) -> bool {
        settle(self.children.iter().map(|c| c.is_full(q)), self.is_union())
    }

    pub fn is_empty(&self, q: QueryContext<'_>) -> bool {
        settle(self.children.iter().map(|c| c.is_empty(q)), !self.is_union())
    }

    pub fn is_live(&self, q: QueryContext<'_>) -> bool {
        settle(self.children.iter().map(|c| c.is_live(q)), self.is_union())
    }

    pub fn may_equal_each(&self, other: &O, q: QueryContext<'_>) -> bool {
        settle(self.children.iter().map(|c| c.may_equal(other, q)), self.is_union())
    }

    pub fn must_equal_each(&self, other: &O, q: QueryContext<'_>) -> bool {
        settle(
            self.children.iter().map(|c| c.must_equal(other, q)),
            !self.is_union(),
        )
    }

    pub fn equal_set_each(&self, other: &O, q: QueryContext<'_>) -> bool {
        self.children.iter().all(|c| c.equal_set(other, q))
    }

    /// Whether this combinator denotes a subset of `other`.
    pub fn sub_set_of(&self, other: &O, q: QueryContext<'_>) -> bool {
        settle(self.children.iter().map(|c| c.sub_set(other, q)), self.is_union())
    }

    /// Whether `other` denotes a subset of this combinator.
    pub fn super_set_of(&self, other: &O, q: QueryContext<'_>) -> bool {
        settle(self.children.iter().map(|c| other.sub_set(c, q)), self.is_union())
    }

    pub fn meet_each(&mut self, other: &O, q: QueryContext<'_>) -> bool {
        let mut modified = false;
        for child in self.children.iter_mut() {
            modified |= Rc::make_mut(child).meet_update(other, q);
        }
        modified
    }

    /// `object` met with each child, keeping this combinator's mode.
    pub fn met_with(&self, object: &O, q: QueryContext<'_>) -> Combined<O> {
        let children = self
            .children
            .iter()
            .map(|c| {
                let mut met = object.clone();
                met.meet_update(c, q);
                Rc::new(met)
            })
            .collect();
        Combined::new(self.mode, children)
    }
}

impl<O: Display> Display for Combined<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.mode, self.children.iter().join(", "))
    }
}
