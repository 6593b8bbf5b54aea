//! Flattening of the clause pool and everything referencing it.
//!
//! Clauses are referenced from the clause lists, the watch lists and the variable reasons. When
//! serializing, the clauses list and then the learnts list are enumerated, assigning each clause a
//! dense [`ClauseId`]. All references are then written as ids. Restoring first materializes all
//! clauses and afterwards resolves every id with a table lookup.
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use log::{debug, warn};
use rustc_hash::FxHashMap;

use flatsat_formula::{FormulaFactory, Lit, Var};
use flatsat_internal_codec::{
    read_bool, read_bools, read_f64, read_i32, read_i64, read_i64s, read_seq, read_string,
    read_u32, read_u64, read_usize, write_bool, write_bools, write_f64, write_i32, write_i64,
    write_i64s, write_seq, write_str, write_u32, write_u64, write_usize, CodecError,
};

use crate::config::{read_config, write_config, SolverConfig};
use crate::error::SerialError;
use crate::payload::{read_payload_record, write_payload_record, PayloadRecord, PayloadRegistry};
use crate::snapshot::{
    Assumptions, BackboneState, BoundedQueue, Clause, ClauseArena, ClauseRef, EngineSnapshot,
    IncrementalState, ProofEntry, ProofTrace, SearchState, Trail, VarHeap, Variable, Watcher,
    WrapperState,
};

/// Position of a clause in the serialized pool.
pub type ClauseId = usize;

/// Persisted value of an absent clause reference.
pub const NO_CLAUSE: i64 = -1;

/// Watch list entry with the clause replaced by its id.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct WatcherRecord {
    pub clause: i64,
    pub blocker: Lit,
}

/// Variable with the reason replaced by its id or [`NO_CLAUSE`].
#[derive(Clone, PartialEq, Debug)]
pub struct VariableRecord {
    pub assignment: Option<bool>,
    pub level: i32,
    pub reason: i64,
    pub activity: f64,
    pub polarity: bool,
    pub decision: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ProofEntryRecord {
    pub clause: Vec<Lit>,
    pub payload: Option<PayloadRecord>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SerializedProof {
    pub original_clauses: Vec<ProofEntryRecord>,
    pub pg_proof: Vec<Vec<i64>>,
}

/// An [`EngineSnapshot`] without any clause references.
#[derive(Clone, PartialEq, Debug)]
pub struct SerializedSnapshot {
    pub config: SolverConfig,
    pub wrapper: WrapperState,
    pub names: BTreeMap<String, Var>,
    pub incremental: IncrementalState,
    /// Original clauses followed by the learned clauses, indexed by [`ClauseId`].
    pub pool: Vec<Clause>,
    /// Number of original clauses at the start of `pool`.
    pub clause_count: usize,
    pub watches: Vec<Vec<WatcherRecord>>,
    pub binary_watches: Vec<Vec<WatcherRecord>>,
    pub vars: Vec<VariableRecord>,
    pub order_heap: VarHeap,
    pub trail: Trail,
    pub assumptions: Vec<Lit>,
    pub assumption_conflict: Vec<Lit>,
    pub assumption_propositions: Vec<PayloadRecord>,
    pub search: SearchState,
    pub proof: Option<SerializedProof>,
    pub backbone: Option<BackboneState>,
}

impl SerializedSnapshot {
    /// Zero for snapshots whose clause count exceeds the pool.
    pub fn learnt_count(&self) -> usize {
        self.pool.len().saturating_sub(self.clause_count)
    }
}

/// Maps clause references to ids.
///
/// A clause listed more than once keeps the id of its first occurrence.
struct ClauseIds {
    ids: FxHashMap<ClauseRef, ClauseId>,
}

impl ClauseIds {
    fn new(clauses: &[ClauseRef], learnts: &[ClauseRef]) -> ClauseIds {
        let mut ids = FxHashMap::default();
        for (id, &cref) in clauses.iter().chain(learnts.iter()).enumerate() {
            let first = *ids.entry(cref).or_insert(id);
            if first != id {
                warn!(
                    "clause {} is listed again as clause {}, the copies will be restored separately",
                    first, id
                );
            }
        }
        ClauseIds { ids }
    }

    fn id(&self, cref: ClauseRef, referrer: &'static str) -> Result<i64, SerialError> {
        self.ids
            .get(&cref)
            .map(|&id| id as i64)
            .ok_or(SerialError::UnpooledClause(referrer))
    }

    fn watch_lists(&self, lists: &[Vec<Watcher>]) -> Result<Vec<Vec<WatcherRecord>>, SerialError> {
        lists
            .iter()
            .map(|list| {
                list.iter()
                    .map(|watcher| {
                        Ok(WatcherRecord {
                            clause: self.id(watcher.clause, "watcher")?,
                            blocker: watcher.blocker,
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

/// Flattens an engine snapshot.
///
/// Fails with [`SerialError::UnpooledClause`] if a watcher or reason references a clause that is in
/// neither the clause nor the learnt list.
pub fn serialize_snapshot(engine: &EngineSnapshot) -> Result<SerializedSnapshot, SerialError> {
    // Phase 1: assign ids
    let ids = ClauseIds::new(&engine.clauses, &engine.learnts);

    // Phase 2: encode everything through the ids
    let pool = engine
        .clauses
        .iter()
        .chain(engine.learnts.iter())
        .map(|&cref| {
            engine
                .arena
                .get(cref)
                .cloned()
                .ok_or(SerialError::UnpooledClause("clause list"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let watches = ids.watch_lists(&engine.watches)?;
    let binary_watches = ids.watch_lists(&engine.binary_watches)?;

    let vars = engine
        .vars
        .iter()
        .map(|var| {
            Ok(VariableRecord {
                assignment: var.assignment,
                level: var.level,
                reason: match var.reason {
                    Some(cref) => ids.id(cref, "variable reason")?,
                    None => NO_CLAUSE,
                },
                activity: var.activity,
                polarity: var.polarity,
                decision: var.decision,
            })
        })
        .collect::<Result<Vec<_>, SerialError>>()?;

    let proof = engine.proof.as_ref().map(|proof| SerializedProof {
        original_clauses: proof
            .original_clauses
            .iter()
            .map(|entry| ProofEntryRecord {
                clause: entry.clause.clone(),
                payload: entry
                    .payload
                    .as_ref()
                    .map(|payload| PayloadRecord::from_payload(&**payload)),
            })
            .collect(),
        pg_proof: proof.pg_proof.clone(),
    });

    debug!(
        "Flattened {} clauses and {} learnts referenced by {} watchers",
        engine.clauses.len(),
        engine.learnts.len(),
        watches
            .iter()
            .chain(binary_watches.iter())
            .map(|list| list.len())
            .sum::<usize>()
    );

    Ok(SerializedSnapshot {
        config: engine.config.clone(),
        wrapper: engine.wrapper.clone(),
        names: engine.names.clone(),
        incremental: engine.incremental.clone(),
        pool,
        clause_count: engine.clauses.len(),
        watches,
        binary_watches,
        vars,
        order_heap: engine.order_heap.clone(),
        trail: engine.trail.clone(),
        assumptions: engine.assumptions.lits.clone(),
        assumption_conflict: engine.assumptions.conflict.clone(),
        assumption_propositions: engine
            .assumptions
            .propositions
            .iter()
            .map(|payload| PayloadRecord::from_payload(&**payload))
            .collect(),
        search: engine.search.clone(),
        proof,
        backbone: engine.backbone.clone(),
    })
}

/// Maps clause ids back to references of a freshly built arena.
struct ClauseRefs {
    refs: Vec<ClauseRef>,
}

impl ClauseRefs {
    fn resolve(&self, id: i64) -> Result<ClauseRef, SerialError> {
        if id >= 0 && (id as u64) < self.refs.len() as u64 {
            Ok(self.refs[id as usize])
        } else {
            Err(SerialError::DanglingClauseReference {
                id,
                pool_size: self.refs.len(),
            })
        }
    }

    fn resolve_optional(&self, id: i64) -> Result<Option<ClauseRef>, SerialError> {
        if id == NO_CLAUSE {
            Ok(None)
        } else {
            self.resolve(id).map(Some)
        }
    }

    fn watch_lists(&self, lists: &[Vec<WatcherRecord>]) -> Result<Vec<Vec<Watcher>>, SerialError> {
        lists
            .iter()
            .map(|list| {
                list.iter()
                    .map(|record| {
                        Ok(Watcher {
                            clause: self.resolve(record.clause)?,
                            blocker: record.blocker,
                        })
                    })
                    .collect()
            })
            .collect()
    }
}

/// Checks the parts that index into the variable table.
fn check_shape(serialized: &SerializedSnapshot) -> Result<(), SerialError> {
    let var_count = serialized.vars.len();
    let lit_count = var_count * 2;

    if serialized.clause_count > serialized.pool.len() {
        return Err(SerialError::malformed(format!(
            "{} original clauses in a pool of {} clauses",
            serialized.clause_count,
            serialized.pool.len()
        )));
    }
    if serialized.watches.len() != lit_count || serialized.binary_watches.len() != lit_count {
        return Err(SerialError::malformed(format!(
            "watch lists for {} and {} literals but {} variables",
            serialized.watches.len(),
            serialized.binary_watches.len(),
            var_count
        )));
    }

    let unknown_var = |lit: &Lit| lit.index() >= var_count;
    let watchers = serialized
        .watches
        .iter()
        .chain(serialized.binary_watches.iter())
        .flat_map(|list| list.iter().map(|watcher| &watcher.blocker));
    if serialized
        .pool
        .iter()
        .flat_map(|clause| clause.lits.iter())
        .chain(watchers)
        .chain(serialized.trail.lits.iter())
        .any(unknown_var)
    {
        return Err(SerialError::malformed(format!(
            "literal of a variable beyond the {} variables",
            var_count
        )));
    }

    if !serialized.order_heap.is_consistent(var_count) {
        return Err(SerialError::malformed("inconsistent order heap"));
    }

    let trail = &serialized.trail;
    if trail.queue_head > trail.lits.len() || trail.trail_lim.iter().any(|&lim| lim > trail.lits.len())
    {
        return Err(SerialError::malformed("trail positions beyond the trail"));
    }

    if !serialized.search.lbd_queue.is_consistent() || !serialized.search.trail_queue.is_consistent()
    {
        return Err(SerialError::malformed("inconsistent bounded queue"));
    }

    Ok(())
}

/// Restores an engine snapshot.
///
/// Payloads of the proof trace and the assumption propositions are decoded using `registry`.
pub fn deserialize_snapshot(
    serialized: &SerializedSnapshot,
    registry: &PayloadRegistry,
    factory: &mut FormulaFactory,
) -> Result<EngineSnapshot, SerialError> {
    check_shape(serialized)?;

    // Phase 1: materialize the pool
    let mut arena = ClauseArena::new();
    let refs = ClauseRefs {
        refs: serialized
            .pool
            .iter()
            .map(|clause| arena.add(clause.clone()))
            .collect(),
    };
    let clauses = refs.refs[..serialized.clause_count].to_vec();
    let learnts = refs.refs[serialized.clause_count..].to_vec();

    // Phase 2: resolve references
    let watches = refs.watch_lists(&serialized.watches)?;
    let binary_watches = refs.watch_lists(&serialized.binary_watches)?;

    let vars = serialized
        .vars
        .iter()
        .map(|record| {
            Ok(Variable {
                assignment: record.assignment,
                level: record.level,
                reason: refs.resolve_optional(record.reason)?,
                activity: record.activity,
                polarity: record.polarity,
                decision: record.decision,
            })
        })
        .collect::<Result<Vec<_>, SerialError>>()?;

    let proof = match &serialized.proof {
        Some(proof) => {
            let mut original_clauses = Vec::with_capacity(proof.original_clauses.len());
            for entry in &proof.original_clauses {
                let payload = match &entry.payload {
                    Some(record) => Some(registry.decode(record, factory)?),
                    None => None,
                };
                original_clauses.push(ProofEntry {
                    clause: entry.clause.clone(),
                    payload,
                });
            }
            Some(ProofTrace {
                original_clauses,
                pg_proof: proof.pg_proof.clone(),
            })
        }
        None => None,
    };

    let propositions = serialized
        .assumption_propositions
        .iter()
        .map(|record| registry.decode(record, factory))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Restored {} clauses and {} learnts for {} variables",
        clauses.len(),
        learnts.len(),
        vars.len()
    );

    Ok(EngineSnapshot {
        config: serialized.config.clone(),
        wrapper: serialized.wrapper.clone(),
        names: serialized.names.clone(),
        incremental: serialized.incremental.clone(),
        arena,
        clauses,
        learnts,
        watches,
        binary_watches,
        vars,
        order_heap: serialized.order_heap.clone(),
        trail: serialized.trail.clone(),
        assumptions: Assumptions {
            lits: serialized.assumptions.clone(),
            conflict: serialized.assumption_conflict.clone(),
            propositions,
        },
        search: serialized.search.clone(),
        proof,
        backbone: serialized.backbone.clone(),
    })
}

fn write_lit(target: &mut impl Write, lit: Lit) -> io::Result<()> {
    write_i64(target, lit.to_dimacs() as i64)
}

fn read_lit(source: &mut impl BufRead) -> Result<Lit, CodecError> {
    let number = read_i64(source)?;
    Lit::try_from_dimacs(number)
        .ok_or_else(|| CodecError::Invalid(format!("invalid literal {}", number)))
}

fn write_lits(target: &mut impl Write, lits: &[Lit]) -> io::Result<()> {
    write_seq(target, lits, |target, &lit| write_lit(target, lit))
}

fn read_lits(source: &mut impl BufRead) -> Result<Vec<Lit>, CodecError> {
    read_seq(source, |source| read_lit(source))
}

fn write_var(target: &mut impl Write, var: Var) -> io::Result<()> {
    write_usize(target, var.index())
}

fn read_var(source: &mut impl BufRead) -> Result<Var, CodecError> {
    let index = read_usize(source)?;
    Var::try_from_index(index)
        .ok_or_else(|| CodecError::Invalid(format!("invalid variable index {}", index)))
}

fn write_tristate(target: &mut impl Write, value: Option<bool>) -> io::Result<()> {
    write_u64(
        target,
        match value {
            Some(false) => 0,
            Some(true) => 1,
            None => 2,
        },
    )
}

fn read_tristate(source: &mut impl BufRead) -> Result<Option<bool>, CodecError> {
    match read_u64(source)? {
        0 => Ok(Some(false)),
        1 => Ok(Some(true)),
        2 => Ok(None),
        code => Err(CodecError::Invalid(format!("invalid tristate {}", code))),
    }
}

/// Writes `None` as `-1`.
fn write_optional_u32(target: &mut impl Write, value: Option<u32>) -> io::Result<()> {
    write_i64(target, value.map_or(-1, |value| value as i64))
}

fn read_optional_u32(source: &mut impl BufRead) -> Result<Option<u32>, CodecError> {
    match read_i64(source)? {
        -1 => Ok(None),
        value if value >= 0 && value <= u32::max_value() as i64 => Ok(Some(value as u32)),
        _ => Err(CodecError::IntegerOverflow { target: "u32" }),
    }
}

fn write_clause(target: &mut impl Write, clause: &Clause) -> io::Result<()> {
    write_lits(&mut *target, &clause.lits)?;
    write_bool(&mut *target, clause.is_learnt)?;
    write_optional_u32(&mut *target, clause.learnt_on_state)?;
    write_bool(&mut *target, clause.is_at_most)?;
    write_f64(&mut *target, clause.activity)?;
    write_u64(&mut *target, clause.lbd)?;
    write_bool(&mut *target, clause.seen)?;
    write_bool(&mut *target, clause.can_be_del)?;
    write_bool(&mut *target, clause.one_watched)?;
    let watchers = if clause.is_at_most {
        clause.at_most_watchers
    } else {
        None
    };
    write_optional_u32(&mut *target, watchers)
}

fn read_clause(source: &mut impl BufRead) -> Result<Clause, CodecError> {
    Ok(Clause {
        lits: read_lits(&mut *source)?,
        is_learnt: read_bool(&mut *source)?,
        learnt_on_state: read_optional_u32(&mut *source)?,
        is_at_most: read_bool(&mut *source)?,
        activity: read_f64(&mut *source)?,
        lbd: read_u64(&mut *source)?,
        seen: read_bool(&mut *source)?,
        can_be_del: read_bool(&mut *source)?,
        one_watched: read_bool(&mut *source)?,
        at_most_watchers: read_optional_u32(&mut *source)?,
    })
}

fn write_watch_lists(target: &mut impl Write, lists: &[Vec<WatcherRecord>]) -> io::Result<()> {
    write_seq(target, lists, |target, list| {
        write_seq(target, list, |target, watcher| {
            write_i64(&mut *target, watcher.clause)?;
            write_lit(&mut *target, watcher.blocker)
        })
    })
}

fn read_watch_lists(source: &mut impl BufRead) -> Result<Vec<Vec<WatcherRecord>>, CodecError> {
    read_seq(source, |source| {
        read_seq(source, |source| {
            Ok(WatcherRecord {
                clause: read_i64(&mut *source)?,
                blocker: read_lit(&mut *source)?,
            })
        })
    })
}

fn write_variable(target: &mut impl Write, var: &VariableRecord) -> io::Result<()> {
    write_tristate(&mut *target, var.assignment)?;
    write_i32(&mut *target, var.level)?;
    write_i64(&mut *target, var.reason)?;
    write_f64(&mut *target, var.activity)?;
    write_bool(&mut *target, var.polarity)?;
    write_bool(&mut *target, var.decision)
}

fn read_variable(source: &mut impl BufRead) -> Result<VariableRecord, CodecError> {
    Ok(VariableRecord {
        assignment: read_tristate(&mut *source)?,
        level: read_i32(&mut *source)?,
        reason: read_i64(&mut *source)?,
        activity: read_f64(&mut *source)?,
        polarity: read_bool(&mut *source)?,
        decision: read_bool(&mut *source)?,
    })
}

fn write_heap(target: &mut impl Write, heap: &VarHeap) -> io::Result<()> {
    write_seq(&mut *target, &heap.heap, |target, &var| write_var(target, var))?;
    write_seq(&mut *target, &heap.indices, |target, &pos| {
        write_i64(target, pos.map_or(-1, |pos| pos as i64))
    })
}

fn read_heap(source: &mut impl BufRead) -> Result<VarHeap, CodecError> {
    let heap = read_seq(&mut *source, |source| read_var(source))?;
    let indices = read_seq(&mut *source, |source| match read_i64(source)? {
        -1 => Ok(None),
        pos if pos >= 0 => Ok(Some(pos as usize)),
        pos => Err(CodecError::Invalid(format!("invalid heap position {}", pos))),
    })?;
    Ok(VarHeap { heap, indices })
}

fn write_queue(target: &mut impl Write, queue: &BoundedQueue) -> io::Result<()> {
    write_i64s(&mut *target, &queue.elems)?;
    write_usize(&mut *target, queue.first)?;
    write_usize(&mut *target, queue.last)?;
    write_i64(&mut *target, queue.sum_of_queue)?;
    write_usize(&mut *target, queue.max_size)?;
    write_usize(&mut *target, queue.queue_size)
}

fn read_queue(source: &mut impl BufRead) -> Result<BoundedQueue, CodecError> {
    Ok(BoundedQueue {
        elems: read_i64s(&mut *source)?,
        first: read_usize(&mut *source)?,
        last: read_usize(&mut *source)?,
        sum_of_queue: read_i64(&mut *source)?,
        max_size: read_usize(&mut *source)?,
        queue_size: read_usize(&mut *source)?,
    })
}

fn write_search(target: &mut impl Write, search: &SearchState) -> io::Result<()> {
    write_bool(&mut *target, search.ok)?;
    write_bool(&mut *target, search.in_sat_call)?;
    write_bool(&mut *target, search.canceled_by_handler)?;
    write_i32(&mut *target, search.analyze_bt_level)?;
    write_f64(&mut *target, search.cla_inc)?;
    write_f64(&mut *target, search.var_inc)?;
    write_f64(&mut *target, search.var_decay)?;
    write_i64(&mut *target, search.clauses_literals)?;
    write_i64(&mut *target, search.learnts_literals)?;
    write_lits(&mut *target, &search.unit_clauses)?;
    write_bools(&mut *target, &search.model)?;
    write_bools(&mut *target, &search.seen)?;
    write_lits(&mut *target, &search.selection_order)?;
    write_usize(&mut *target, search.selection_order_idx)?;
    write_seq(&mut *target, &search.perm_diff, |target, &value| {
        write_i32(target, value)
    })?;
    write_lits(&mut *target, &search.last_decision_level)?;
    write_queue(&mut *target, &search.lbd_queue)?;
    write_queue(&mut *target, &search.trail_queue)?;
    write_i32(&mut *target, search.myflag)?;
    write_i64(&mut *target, search.analyze_lbd)?;
    write_i32(&mut *target, search.nb_clauses_before_reduce)?;
    write_i64(&mut *target, search.conflicts)?;
    write_i64(&mut *target, search.conflicts_restarts)?;
    write_f64(&mut *target, search.sum_lbd)?;
    write_i32(&mut *target, search.cur_restart)
}

fn read_search(source: &mut impl BufRead) -> Result<SearchState, CodecError> {
    Ok(SearchState {
        ok: read_bool(&mut *source)?,
        in_sat_call: read_bool(&mut *source)?,
        canceled_by_handler: read_bool(&mut *source)?,
        analyze_bt_level: read_i32(&mut *source)?,
        cla_inc: read_f64(&mut *source)?,
        var_inc: read_f64(&mut *source)?,
        var_decay: read_f64(&mut *source)?,
        clauses_literals: read_i64(&mut *source)?,
        learnts_literals: read_i64(&mut *source)?,
        unit_clauses: read_lits(&mut *source)?,
        model: read_bools(&mut *source)?,
        seen: read_bools(&mut *source)?,
        selection_order: read_lits(&mut *source)?,
        selection_order_idx: read_usize(&mut *source)?,
        perm_diff: read_seq(&mut *source, |source| read_i32(source))?,
        last_decision_level: read_lits(&mut *source)?,
        lbd_queue: read_queue(&mut *source)?,
        trail_queue: read_queue(&mut *source)?,
        myflag: read_i32(&mut *source)?,
        analyze_lbd: read_i64(&mut *source)?,
        nb_clauses_before_reduce: read_i32(&mut *source)?,
        conflicts: read_i64(&mut *source)?,
        conflicts_restarts: read_i64(&mut *source)?,
        sum_lbd: read_f64(&mut *source)?,
        cur_restart: read_i32(&mut *source)?,
    })
}

fn write_proof(target: &mut impl Write, proof: &SerializedProof) -> io::Result<()> {
    write_seq(&mut *target, &proof.original_clauses, |target, entry| {
        write_lits(&mut *target, &entry.clause)?;
        match &entry.payload {
            Some(record) => {
                write_bool(&mut *target, true)?;
                write_payload_record(&mut *target, record)
            }
            None => write_bool(&mut *target, false),
        }
    })?;
    write_seq(&mut *target, &proof.pg_proof, |target, step| {
        write_i64s(target, step)
    })
}

fn read_proof(source: &mut impl BufRead) -> Result<SerializedProof, CodecError> {
    let original_clauses = read_seq(&mut *source, |source| {
        let clause = read_lits(&mut *source)?;
        let payload = if read_bool(&mut *source)? {
            Some(read_payload_record(&mut *source)?)
        } else {
            None
        };
        Ok(ProofEntryRecord { clause, payload })
    })?;
    let pg_proof = read_seq(&mut *source, |source| read_i64s(source))?;
    Ok(SerializedProof {
        original_clauses,
        pg_proof,
    })
}

fn write_backbone(target: &mut impl Write, backbone: &BackboneState) -> io::Result<()> {
    write_bool(&mut *target, backbone.computing)?;
    write_lits(&mut *target, &backbone.candidates)?;
    write_lits(&mut *target, &backbone.assumptions)?;
    let entries: Vec<_> = backbone.map.iter().collect();
    write_seq(&mut *target, &entries, |target, &(&var, &value)| {
        write_var(&mut *target, var)?;
        write_tristate(&mut *target, value)
    })
}

fn read_backbone(source: &mut impl BufRead) -> Result<BackboneState, CodecError> {
    Ok(BackboneState {
        computing: read_bool(&mut *source)?,
        candidates: read_lits(&mut *source)?,
        assumptions: read_lits(&mut *source)?,
        map: read_seq(&mut *source, |source| {
            Ok((read_var(&mut *source)?, read_tristate(&mut *source)?))
        })?
        .into_iter()
        .collect(),
    })
}

/// Writes a flattened snapshot.
pub fn write_snapshot(target: &mut impl Write, snapshot: &SerializedSnapshot) -> io::Result<()> {
    write_config(&mut *target, &snapshot.config)?;

    write_tristate(&mut *target, snapshot.wrapper.result)?;
    write_bool(&mut *target, snapshot.wrapper.last_computation_with_assumptions)?;

    let names: Vec<_> = snapshot.names.iter().collect();
    write_seq(&mut *target, &names, |target, &(name, &var)| {
        write_str(&mut *target, name)?;
        write_var(&mut *target, var)
    })?;

    write_seq(&mut *target, &snapshot.incremental.valid_states, |target, &id| {
        write_u32(target, id)
    })?;
    write_u32(&mut *target, snapshot.incremental.next_state_id)?;

    write_usize(&mut *target, snapshot.clause_count)?;
    write_seq(&mut *target, &snapshot.pool, |target, clause| {
        write_clause(target, clause)
    })?;

    write_watch_lists(&mut *target, &snapshot.watches)?;
    write_watch_lists(&mut *target, &snapshot.binary_watches)?;
    write_seq(&mut *target, &snapshot.vars, |target, var| {
        write_variable(target, var)
    })?;
    write_heap(&mut *target, &snapshot.order_heap)?;

    write_lits(&mut *target, &snapshot.trail.lits)?;
    write_seq(&mut *target, &snapshot.trail.trail_lim, |target, &lim| {
        write_usize(target, lim)
    })?;
    write_usize(&mut *target, snapshot.trail.queue_head)?;

    write_lits(&mut *target, &snapshot.assumptions)?;
    write_lits(&mut *target, &snapshot.assumption_conflict)?;
    write_seq(
        &mut *target,
        &snapshot.assumption_propositions,
        |target, record| write_payload_record(target, record),
    )?;

    write_search(&mut *target, &snapshot.search)?;

    match &snapshot.proof {
        Some(proof) => {
            write_bool(&mut *target, true)?;
            write_proof(&mut *target, proof)?;
        }
        None => write_bool(&mut *target, false)?,
    }

    match &snapshot.backbone {
        Some(backbone) => {
            write_bool(&mut *target, true)?;
            write_backbone(&mut *target, backbone)
        }
        None => write_bool(&mut *target, false),
    }
}

/// Reads a snapshot written by [`write_snapshot`].
///
/// Clause references are only checked by [`deserialize_snapshot`].
pub fn read_snapshot(source: &mut impl BufRead) -> Result<SerializedSnapshot, CodecError> {
    let config = read_config(&mut *source)?;

    let wrapper = WrapperState {
        result: read_tristate(&mut *source)?,
        last_computation_with_assumptions: read_bool(&mut *source)?,
    };

    let names = read_seq(&mut *source, |source| {
        Ok((read_string(&mut *source)?, read_var(&mut *source)?))
    })?
    .into_iter()
    .collect();

    let incremental = IncrementalState {
        valid_states: read_seq(&mut *source, |source| read_u32(source))?,
        next_state_id: read_u32(&mut *source)?,
    };

    let clause_count = read_usize(&mut *source)?;
    let pool: Vec<Clause> = read_seq(&mut *source, |source| read_clause(source))?;
    if clause_count > pool.len() {
        return Err(CodecError::Invalid(format!(
            "clause count {} exceeds the pool of {} clauses",
            clause_count,
            pool.len()
        )));
    }

    let watches = read_watch_lists(&mut *source)?;
    let binary_watches = read_watch_lists(&mut *source)?;
    let vars = read_seq(&mut *source, |source| read_variable(source))?;
    let order_heap = read_heap(&mut *source)?;

    let trail = Trail {
        lits: read_lits(&mut *source)?,
        trail_lim: read_seq(&mut *source, |source| read_usize(source))?,
        queue_head: read_usize(&mut *source)?,
    };

    let assumptions = read_lits(&mut *source)?;
    let assumption_conflict = read_lits(&mut *source)?;
    let assumption_propositions = read_seq(&mut *source, |source| read_payload_record(source))?;

    let search = read_search(&mut *source)?;

    let proof = if read_bool(&mut *source)? {
        Some(read_proof(&mut *source)?)
    } else {
        None
    };

    let backbone = if read_bool(&mut *source)? {
        Some(read_backbone(&mut *source)?)
    } else {
        None
    };

    Ok(SerializedSnapshot {
        config,
        wrapper,
        names,
        incremental,
        pool,
        clause_count,
        watches,
        binary_watches,
        vars,
        order_heap,
        trail,
        assumptions,
        assumption_conflict,
        assumption_propositions,
        search,
        proof,
        backbone,
    })
}
