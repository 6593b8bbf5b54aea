//! Engine variables and literals.
//!
//! These are the numeric literals stored in clauses, watchers and the trail of an engine snapshot.
//! Named literals of formulas are part of [`FormulaNode`](crate::FormulaNode) instead.
use std::convert::TryFrom;
use std::{fmt, ops};

/// The backing type used to represent literals and variables.
pub type LitIdx = u32;

/// An engine variable.
///
/// Internally variables are 0-based indices. Persisted literals use the signed 1-based DIMACS
/// convention, so `0` never denotes a literal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var {
    index: LitIdx,
}

impl Var {
    /// Creates a variable from a 0-based index.
    ///
    /// The index may not represent a variable past `Var::max_var()`.
    #[inline]
    pub fn from_index(index: usize) -> Var {
        debug_assert!(index <= Var::max_var().index());
        Var {
            index: index as LitIdx,
        }
    }

    /// Creates a variable from a 0-based index, returning `None` for indices past `max_var`.
    pub fn try_from_index(index: usize) -> Option<Var> {
        if index <= Var::max_var().index() {
            Some(Var::from_index(index))
        } else {
            None
        }
    }

    /// Creates a variable from a positive 1-based index.
    #[inline]
    pub fn from_dimacs(number: isize) -> Var {
        debug_assert!(number > 0);
        Var::from_index((number - 1) as usize)
    }

    /// The 1-based index of this variable.
    #[inline]
    pub fn to_dimacs(self) -> isize {
        (self.index + 1) as isize
    }

    /// The 0-based index of this variable.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// The variable with the largest supported index.
    ///
    /// This leaves room for the sign bit of a [`Lit`] and for sentinel values.
    pub const fn max_var() -> Var {
        Var {
            index: LitIdx::max_value() >> 4,
        }
    }

    /// Creates a literal of this variable, positive when `polarity` is `true`.
    #[inline]
    pub fn lit(self, polarity: bool) -> Lit {
        Lit::from_var(self, polarity)
    }

    #[inline]
    pub fn positive(self) -> Lit {
        Lit::from_var(self, true)
    }

    #[inline]
    pub fn negative(self) -> Lit {
        Lit::from_var(self, false)
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An engine literal, i.e. a variable or its negation.
///
/// The internal `code` is twice the variable index for positive literals and one more for negative
/// literals. Watch lists are indexed by this code.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Lit {
    code: LitIdx,
}

impl Lit {
    #[inline]
    pub fn from_var(var: Var, polarity: bool) -> Lit {
        Lit {
            code: (var.index << 1) | (!polarity as LitIdx),
        }
    }

    #[inline]
    pub fn positive(var: Var) -> Lit {
        Lit::from_var(var, true)
    }

    #[inline]
    pub fn negative(var: Var) -> Lit {
        Lit::from_var(var, false)
    }

    #[inline]
    pub fn from_index(index: usize, polarity: bool) -> Lit {
        Lit::from_var(Var::from_index(index), polarity)
    }

    /// Create a literal with the given internal code.
    #[inline]
    pub fn from_code(code: usize) -> Lit {
        debug_assert!(code <= Var::max_var().index() * 2 + 1);
        Lit {
            code: code as LitIdx,
        }
    }

    /// Creates a literal from a non-zero signed 1-based integer.
    #[inline]
    pub fn from_dimacs(number: isize) -> Lit {
        Lit::from_var(Var::from_dimacs(number.abs()), number > 0)
    }

    /// Checked variant of [`from_dimacs`](Lit::from_dimacs) for untrusted input.
    ///
    /// Returns `None` for `0` and for variables past `Var::max_var()`.
    pub fn try_from_dimacs(number: i64) -> Option<Lit> {
        if number == 0 {
            return None;
        }
        let index = usize::try_from(number.checked_abs()? - 1).ok()?;
        Var::try_from_index(index).map(|var| var.lit(number > 0))
    }

    /// Signed 1-based integer representation, inverse of `from_dimacs`.
    #[inline]
    pub fn to_dimacs(self) -> isize {
        let number = self.var().to_dimacs();
        if self.is_negative() {
            -number
        } else {
            number
        }
    }

    /// 0-based index of the literal's variable.
    #[inline]
    pub fn index(self) -> usize {
        (self.code >> 1) as usize
    }

    #[inline]
    pub fn var(self) -> Var {
        Var {
            index: self.code >> 1,
        }
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        (self.code & 1) != 0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        !self.is_negative()
    }

    /// The internal encoding.
    #[inline]
    pub fn code(self) -> usize {
        self.code as usize
    }
}

impl ops::Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit {
            code: self.code ^ 1,
        }
    }
}

impl From<Var> for Lit {
    #[inline]
    fn from(var: Var) -> Lit {
        Lit::positive(var)
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;
    use proptest::{prelude::*, *};

    pub fn var(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Var> {
        index.prop_map(Var::from_index)
    }

    pub fn lit(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Lit> {
        (var(index), bool::ANY).prop_map(|(var, polarity)| var.lit(polarity))
    }
}
