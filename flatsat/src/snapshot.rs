//! In-memory state of a CDCL engine that can be persisted.
//!
//! An [`EngineSnapshot`] owns all clauses in a [`ClauseArena`]. The clause and learnt lists, the
//! watch lists, variable reasons and the proof trace refer to clauses by [`ClauseRef`], so a clause
//! is shared by all structures referencing it.
use std::collections::BTreeMap;

use flatsat_formula::{Lit, Var};

use crate::config::SolverConfig;
use crate::payload::Payload;

pub mod clause;
pub mod heap;
pub mod queue;

pub use clause::{Clause, ClauseArena, ClauseRef, Watcher};
pub use heap::VarHeap;
pub use queue::BoundedQueue;

/// Assignment and search data of a variable.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Variable {
    /// Current value, `None` if unassigned.
    pub assignment: Option<bool>,
    pub level: i32,
    /// Clause that implied the current value, `None` for decisions and unassigned variables.
    pub reason: Option<ClauseRef>,
    pub activity: f64,
    /// Saved phase.
    pub polarity: bool,
    /// Whether the variable may be used as decision.
    pub decision: bool,
}

/// Assigned literals in assignment order.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Trail {
    pub lits: Vec<Lit>,
    /// Trail length at the start of each decision level.
    pub trail_lim: Vec<usize>,
    /// Start of the not yet propagated part of the trail.
    pub queue_head: usize,
}

impl Trail {
    pub fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }
}

/// Result of the last computation as seen by the solver front end.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct WrapperState {
    pub result: Option<bool>,
    pub last_computation_with_assumptions: bool,
}

/// Stack of saved states for incremental solving.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct IncrementalState {
    /// Ids of the states that can be restored.
    pub valid_states: Vec<u32>,
    pub next_state_id: u32,
}

/// Assumptions of the last or current solve call.
#[derive(Debug, Default)]
pub struct Assumptions {
    pub lits: Vec<Lit>,
    /// Subset of the assumptions responsible for unsatisfiability.
    pub conflict: Vec<Lit>,
    /// Propositions the assumptions were derived from.
    pub propositions: Vec<Box<dyn Payload>>,
}

/// Scalars and scratch vectors of the search.
#[derive(Clone, PartialEq, Debug)]
pub struct SearchState {
    /// `false` once the formula is known to be unsatisfiable.
    pub ok: bool,
    pub in_sat_call: bool,
    pub canceled_by_handler: bool,
    pub analyze_bt_level: i32,
    pub cla_inc: f64,
    pub var_inc: f64,
    pub var_decay: f64,
    pub clauses_literals: i64,
    pub learnts_literals: i64,
    pub unit_clauses: Vec<Lit>,
    pub model: Vec<bool>,
    pub seen: Vec<bool>,
    pub selection_order: Vec<Lit>,
    pub selection_order_idx: usize,
    pub perm_diff: Vec<i32>,
    pub last_decision_level: Vec<Lit>,
    /// Moving average of learned clause glue.
    pub lbd_queue: BoundedQueue,
    /// Moving average of trail sizes at conflicts.
    pub trail_queue: BoundedQueue,
    pub myflag: i32,
    pub analyze_lbd: i64,
    pub nb_clauses_before_reduce: i32,
    pub conflicts: i64,
    pub conflicts_restarts: i64,
    pub sum_lbd: f64,
    pub cur_restart: i32,
}

impl SearchState {
    pub fn new(config: &SolverConfig) -> SearchState {
        SearchState {
            ok: true,
            in_sat_call: false,
            canceled_by_handler: false,
            analyze_bt_level: 0,
            cla_inc: 1.0,
            var_inc: config.var_inc,
            var_decay: config.var_decay,
            clauses_literals: 0,
            learnts_literals: 0,
            unit_clauses: vec![],
            model: vec![],
            seen: vec![],
            selection_order: vec![],
            selection_order_idx: 0,
            perm_diff: vec![],
            last_decision_level: vec![],
            lbd_queue: BoundedQueue::new(config.size_lbd_queue.max(1) as usize),
            trail_queue: BoundedQueue::new(config.size_trail_queue.max(1) as usize),
            myflag: 0,
            analyze_lbd: 0,
            nb_clauses_before_reduce: config.first_reduce_db,
            conflicts: 0,
            conflicts_restarts: 0,
            sum_lbd: 0.0,
            cur_restart: 1,
        }
    }
}

/// An input clause of the proof trace.
#[derive(Debug)]
pub struct ProofEntry {
    pub clause: Vec<Lit>,
    /// Proposition the clause was generated from.
    pub payload: Option<Box<dyn Payload>>,
}

/// Data recorded when proof generation is enabled.
#[derive(Debug, Default)]
pub struct ProofTrace {
    pub original_clauses: Vec<ProofEntry>,
    /// Learned and deleted clauses in DIMACS numbering, deletions start with `-1`.
    pub pg_proof: Vec<Vec<i64>>,
}

/// State of a running backbone computation.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct BackboneState {
    pub computing: bool,
    /// Literals still to be tested.
    pub candidates: Vec<Lit>,
    pub assumptions: Vec<Lit>,
    /// Backbone status per variable, `None` for variables that are not part of the backbone.
    pub map: BTreeMap<Var, Option<bool>>,
}

/// Complete persistable engine state.
#[derive(Debug)]
pub struct EngineSnapshot {
    pub config: SolverConfig,
    pub wrapper: WrapperState,
    /// Variables by name.
    pub names: BTreeMap<String, Var>,
    pub incremental: IncrementalState,
    pub arena: ClauseArena,
    /// Original clauses.
    pub clauses: Vec<ClauseRef>,
    /// Learned clauses.
    pub learnts: Vec<ClauseRef>,
    /// Watch lists of long clauses indexed by literal code.
    pub watches: Vec<Vec<Watcher>>,
    /// Watch lists of binary clauses indexed by literal code.
    pub binary_watches: Vec<Vec<Watcher>>,
    pub vars: Vec<Variable>,
    pub order_heap: VarHeap,
    pub trail: Trail,
    pub assumptions: Assumptions,
    pub search: SearchState,
    pub proof: Option<ProofTrace>,
    pub backbone: Option<BackboneState>,
}

impl EngineSnapshot {
    /// An engine without variables or clauses.
    pub fn new(config: SolverConfig) -> EngineSnapshot {
        let search = SearchState::new(&config);
        let proof = if config.proof_generation {
            Some(ProofTrace::default())
        } else {
            None
        };
        EngineSnapshot {
            config,
            wrapper: WrapperState::default(),
            names: BTreeMap::new(),
            incremental: IncrementalState::default(),
            arena: ClauseArena::new(),
            clauses: vec![],
            learnts: vec![],
            watches: vec![],
            binary_watches: vec![],
            vars: vec![],
            order_heap: VarHeap::new(),
            trail: Trail::default(),
            assumptions: Assumptions::default(),
            search,
            proof,
            backbone: None,
        }
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Adds a new unassigned variable, optionally registering a name for it.
    pub fn new_var(&mut self, name: Option<&str>) -> Var {
        let var = Var::from_index(self.vars.len());
        self.vars.push(Variable {
            level: -1,
            polarity: self.config.initial_phase,
            decision: true,
            ..Variable::default()
        });
        for _ in 0..2 {
            self.watches.push(vec![]);
            self.binary_watches.push(vec![]);
        }
        self.search.seen.push(false);
        self.search.perm_diff.push(0);
        self.order_heap.insert(var, &self.vars);
        if let Some(name) = name {
            self.names.insert(name.to_string(), var);
        }
        var
    }

    /// Adds a clause of at least two literals and watches its first two literals.
    ///
    /// All variables of the clause must exist.
    pub fn add_clause(&mut self, clause: Clause) -> ClauseRef {
        assert!(clause.len() >= 2, "watched clauses need two literals");
        let (first, second) = (clause.lits[0], clause.lits[1]);
        let binary = clause.len() == 2;
        let learnt = clause.is_learnt;
        let len = clause.len() as i64;

        let cref = self.arena.add(clause);

        let watches = if binary {
            &mut self.binary_watches
        } else {
            &mut self.watches
        };
        watches[(!first).code()].push(Watcher {
            clause: cref,
            blocker: second,
        });
        watches[(!second).code()].push(Watcher {
            clause: cref,
            blocker: first,
        });

        if learnt {
            self.learnts.push(cref);
            self.search.learnts_literals += len;
        } else {
            self.clauses.push(cref);
            self.search.clauses_literals += len;
        }
        cref
    }

    /// Opens a new decision level.
    pub fn new_decision_level(&mut self) {
        self.trail.trail_lim.push(self.trail.lits.len());
    }

    /// Assigns a literal on the current decision level.
    pub fn assign(&mut self, lit: Lit, reason: Option<ClauseRef>) {
        let level = self.trail.decision_level() as i32;
        let variable = &mut self.vars[lit.index()];
        variable.assignment = Some(lit.is_positive());
        variable.level = level;
        variable.reason = reason;
        self.trail.lits.push(lit);
    }

    /// The value of a literal under the current assignment.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.vars[lit.index()]
            .assignment
            .map(|value| value == lit.is_positive())
    }
}
