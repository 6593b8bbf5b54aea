//! Flatsat persists formula DAGs and the state of a CDCL engine.
//!
//! Both are graphs with shared nodes. Formulas share sub-formulas and the clauses of an engine are
//! referenced from clause lists, watch lists, variable reasons and the proof trace. Flatsat numbers
//! the nodes of such a graph so that every node is written exactly once and every reference becomes
//! an integer. Restoring resolves all references in one pass over the table without recursion.
//!
//! The entry points are:
//!
//! * [`graph::serialize`] and [`graph::deserialize`] for formulas,
//! * [`proposition::serialize_propositions`] for formulas with descriptions or payloads,
//! * [`pool::serialize_snapshot`] and [`pool::deserialize_snapshot`] for engine state,
//! * [`container`] for reading and writing any of these as (compressed) files.
//!
//! User defined payloads are decoded with an explicitly passed [`PayloadRegistry`].

pub mod config;
pub mod container;
pub mod error;
pub mod graph;
pub mod ident;
pub mod payload;
pub mod pool;
pub mod proposition;
pub mod snapshot;


pub use flatsat_formula::{Formula, FormulaFactory, Lit, Var};

pub use config::{SolverConfig, SolverConfigUpdate};
pub use container::{Container, ContainerKind};
pub use error::SerialError;
pub use graph::ExpressionGraph;
pub use payload::{Payload, PayloadRecord, PayloadRegistry, PayloadTag};
pub use proposition::{ExtendedProposition, Proposition, StandardProposition};
pub use snapshot::EngineSnapshot;
