use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A literal value written in the program text.
///
/// Analyses that know an expression evaluates to a fixed value report it as a
/// [`Literal`], so literals from different analyses need to be comparable even
/// when the analyses chose different integer widths for the same constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Null,
}

impl Literal {
    /// Structural equality across literal kinds.
    ///
    /// Signed and unsigned integers compare by numeric value. Floats compare by
    /// bit pattern, so `NaN` is structurally equal to itself and `0.0` differs
    /// from `-0.0`. Every other pair of differing kinds is unequal.
    pub fn structurally_equal(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Bool(a), Literal::Bool(b)) => a == b,
            (Literal::Int(a), Literal::Int(b)) => a == b,
            (Literal::UInt(a), Literal::UInt(b)) => a == b,
            (Literal::Int(a), Literal::UInt(b)) | (Literal::UInt(b), Literal::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            (Literal::Char(a), Literal::Char(b)) => a == b,
            (Literal::Str(a), Literal::Str(b)) => a == b,
            (Literal::Null, Literal::Null) => true,
            _ => false,
        }
    }

    /// Truth value of the literal when used as a condition.
    ///
    /// Strings have no truth value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            Literal::Int(i) => Some(*i != 0),
            Literal::UInt(u) => Some(*u != 0),
            Literal::Float(f) => Some(*f != 0.0),
            Literal::Char(c) => Some(*c != '\0'),
            Literal::Null => Some(false),
            Literal::Str(_) => None,
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::UInt(u) => write!(f, "{u}u"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Char(c) => write!(f, "{c:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<u64> for Literal {
    fn from(value: u64) -> Self {
        Literal::UInt(value)
    }
}
