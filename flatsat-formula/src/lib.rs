//! Formula data types shared by the flatsat crates.
//!
//! This contains the immutable formula DAG built by a [`FormulaFactory`] and the numeric engine
//! literals used inside solver snapshots.

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! lit {
    ($x:expr) => {
        $crate::lit::Lit::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! var {
    ($x:expr) => {
        $crate::lit::Var::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! lits {
    ( $( $x:expr ),* ) => { vec![ $( $crate::lit!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { $crate::lits! [ $( $ x),* ] };
}

pub mod factory;
pub mod formula;
pub mod lit;

#[cfg(any(test, feature = "internal-testing"))]
pub mod test;

pub use factory::FormulaFactory;
pub use formula::{BinaryOp, Comparator, Formula, FormulaNode, NaryOp, PbConstraint, PbLiteral};
pub use lit::{Lit, Var};
