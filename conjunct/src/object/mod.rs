//! The abstract-object hierarchy.
//!
//! Every answer an analysis gives to a query is an abstract object: a set of concrete
//! runtime entities observable at one partial-execution edge. Objects come in four
//! families ([`ValueObject`], [`CodeLocObject`], [`MemRegionObject`],
//! [`MemLocObject`]). Each family is an enum whose built-in variants (full, empty,
//! combined, function-result) are handled here, and whose `Analysis` variant carries an
//! analysis-defined object behind a trait object.
//!
//! [`AnyObject`] erases the family. Its operations first check that both sides belong
//! to the same family, then settle function-result sentinels, and finally hand the
//! question to the composer named in the [`QueryContext`], which by default asks the
//! typed [`AbstractObject`] implementation.

pub mod code_loc;
pub mod combined;
pub mod mem_loc;
pub mod region;
mod sentinel;
pub mod value;

pub use code_loc::{CodeLoc, CodeLocObject, CodeLocObjectPtr, CombinedCodeLocObject};
pub use combined::{CombinationMode, Combined};
pub use mem_loc::{CombinedMemLocObject, MemLoc, MemLocObject, MemLocObjectPtr};
pub use region::{CombinedMemRegionObject, MemRegionObject, MemRegionObjectPtr, RegionLattice};
pub use sentinel::Sentinel;
pub use value::{CombinedValueObject, ValueLattice, ValueObject, ValueObjectPtr};

use crate::composer::QueryContext;
use crate::error::{CompositionError, fatal};
use conjunct_ir::TermId;
use std::any::Any;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// The family an abstract object belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Value,
    CodeLoc,
    MemRegion,
    MemLoc,
}

/// Access to [`Any`] through a trait object, so analyses can recover their own object
/// type from a peer.
///
/// Call it on the trait object itself (`(**boxed).as_any()`), not on a `Box`, or the
/// `Box` is what gets downcast.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The operations every family of abstract object supports.
///
/// These are the object's own answers. Clients normally go through [`AnyObject`] or a
/// composer so that the routing in the module documentation applies.
pub trait AbstractObject: Clone + Debug + Display + Sized + 'static {
    const KIND: ObjectKind;

    /// The object denoting every concrete entity of this family.
    fn full() -> Self;

    /// The object denoting no concrete entity.
    fn empty() -> Self;

    fn sentinel(&self) -> Option<Sentinel>;

    fn as_combined(&self) -> Option<&Combined<Self>>;

    fn from_combined(combined: Combined<Self>) -> Self;

    fn into_any(this: Rc<Self>) -> AnyObject;

    fn from_any(object: &AnyObject) -> Option<Rc<Self>>;

    /// The program term this object was built from, when it was built directly from one.
    fn syntactic_base(&self) -> Option<TermId>;

    fn may_equal(&self, other: &Self, q: QueryContext<'_>) -> bool;

    fn must_equal(&self, other: &Self, q: QueryContext<'_>) -> bool;

    /// Whether both objects denote the same set of concrete entities.
    fn equal_set(&self, other: &Self, q: QueryContext<'_>) -> bool;

    /// Whether `self` denotes a subset of what `other` denotes.
    fn sub_set(&self, other: &Self, q: QueryContext<'_>) -> bool;

    /// Narrow `self` to what both objects denote. Returns whether `self` changed.
    fn meet_update(&mut self, other: &Self, q: QueryContext<'_>) -> bool;

    fn is_full(&self, q: QueryContext<'_>) -> bool;

    fn is_empty(&self, q: QueryContext<'_>) -> bool;

    fn is_live(&self, q: QueryContext<'_>) -> bool;
}

/// Expand `$body` once per family when `$a` and `$b` hold objects of the same family,
/// binding the typed pointers to `$x` and `$y`; otherwise evaluate `$otherwise`.
macro_rules! match_pair {
    ($a:expr, $b:expr, |$x:ident, $y:ident| $body:expr, $otherwise:expr) => {
        match ($a, $b) {
            ($crate::object::AnyObject::Value($x), $crate::object::AnyObject::Value($y)) => $body,
            ($crate::object::AnyObject::CodeLoc($x), $crate::object::AnyObject::CodeLoc($y)) => {
                $body
            }
            (
                $crate::object::AnyObject::MemRegion($x),
                $crate::object::AnyObject::MemRegion($y),
            ) => $body,
            ($crate::object::AnyObject::MemLoc($x), $crate::object::AnyObject::MemLoc($y)) => $body,
            _ => $otherwise,
        }
    };
}

/// Expand `$body` for whichever family `$a` holds, binding the typed pointer to `$x`.
macro_rules! match_family {
    ($a:expr, |$x:ident| $body:expr) => {
        match $a {
            $crate::object::AnyObject::Value($x) => $body,
            $crate::object::AnyObject::CodeLoc($x) => $body,
            $crate::object::AnyObject::MemRegion($x) => $body,
            $crate::object::AnyObject::MemLoc($x) => $body,
        }
    };
}

pub(crate) use {match_family, match_pair};

/// A shared handle to an abstract object of any family.
#[derive(Debug, Clone)]
pub enum AnyObject {
    Value(ValueObjectPtr),
    CodeLoc(CodeLocObjectPtr),
    MemRegion(MemRegionObjectPtr),
    MemLoc(MemLocObjectPtr),
}

impl AnyObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            AnyObject::Value(_) => ObjectKind::Value,
            AnyObject::CodeLoc(_) => ObjectKind::CodeLoc,
            AnyObject::MemRegion(_) => ObjectKind::MemRegion,
            AnyObject::MemLoc(_) => ObjectKind::MemLoc,
        }
    }

    pub fn syntactic_base(&self) -> Option<TermId> {
        match_family!(self, |x| x.syntactic_base())
    }

    /// The typed object, if this handle holds family `F`.
    pub fn downcast<F: AbstractObject>(&self) -> Option<Rc<F>> {
        F::from_any(self)
    }

    /// The typed object. Holding another family is a wiring error.
    #[track_caller]
    pub fn expect<F: AbstractObject>(&self) -> Rc<F> {
        match F::from_any(self) {
            Some(object) => object,
            None => fatal(CompositionError::VariantMismatch {
                expected: F::KIND,
                found: self.kind(),
            }),
        }
    }

    /// Must-equality without consulting any analysis: two objects built directly
    /// from the same program term denote the same entity.
    ///
    /// `false` only means the shortcut does not apply.
    pub fn must_equal_expr(&self, other: &AnyObject) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        match (self.syntactic_base(), other.syntactic_base()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Identity comparison of function-result sentinels, which are disjoint from
    /// every other region.
    fn func_result_relation(&self, other: &AnyObject, q: QueryContext<'_>) -> Option<bool> {
        match (self, other) {
            (AnyObject::MemRegion(a), AnyObject::MemRegion(b)) => {
                region::func_result_relation(a, b, q)
            }
            (AnyObject::MemLoc(a), AnyObject::MemLoc(b)) => {
                mem_loc::func_result_relation(a, b, q)
            }
            _ => None,
        }
    }

    pub fn may_equal(&self, other: &AnyObject, q: QueryContext<'_>) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        if let Some(answer) = self.func_result_relation(other, q) {
            return answer;
        }
        q.composer.may_equal(self, other, q)
    }

    pub fn must_equal(&self, other: &AnyObject, q: QueryContext<'_>) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        if self.must_equal_expr(other) && !self.is_empty(q) && !other.is_empty(q) {
            return true;
        }
        if let Some(answer) = self.func_result_relation(other, q) {
            return answer;
        }
        q.composer.must_equal(self, other, q)
    }

    pub fn equal_set(&self, other: &AnyObject, q: QueryContext<'_>) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        if let Some(answer) = self.func_result_relation(other, q) {
            return answer;
        }
        q.composer.equal_set(self, other, q)
    }

    pub fn sub_set(&self, other: &AnyObject, q: QueryContext<'_>) -> bool {
        if self.kind() != other.kind() {
            return false;
        }
        if let Some(answer) = self.func_result_relation(other, q) {
            return answer;
        }
        q.composer.sub_set(self, other, q)
    }

    /// Meet `other` into `self`. Objects of different families cannot be met.
    pub fn meet_update(&mut self, other: &AnyObject, q: QueryContext<'_>) -> bool {
        if self.kind() != other.kind() {
            fatal(CompositionError::VariantMismatch {
                expected: self.kind(),
                found: other.kind(),
            })
        }
        q.composer.meet_update(self, other, q)
    }

    pub fn is_full(&self, q: QueryContext<'_>) -> bool {
        q.composer.is_full(self, q)
    }

    pub fn is_empty(&self, q: QueryContext<'_>) -> bool {
        q.composer.is_empty(self, q)
    }

    pub fn is_live(&self, q: QueryContext<'_>) -> bool {
        q.composer.is_live(self, q)
    }
}

impl Display for AnyObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match_family!(self, |x| write!(f, "{x}"))
    }
}

impl From<ValueObjectPtr> for AnyObject {
    fn from(value: ValueObjectPtr) -> Self {
        AnyObject::Value(value)
    }
}

impl From<CodeLocObjectPtr> for AnyObject {
    fn from(value: CodeLocObjectPtr) -> Self {
        AnyObject::CodeLoc(value)
    }
}

impl From<MemRegionObjectPtr> for AnyObject {
    fn from(value: MemRegionObjectPtr) -> Self {
        AnyObject::MemRegion(value)
    }
}

impl From<MemLocObjectPtr> for AnyObject {
    fn from(value: MemLocObjectPtr) -> Self {
        AnyObject::MemLoc(value)
    }
}
