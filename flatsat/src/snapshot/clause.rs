//! Clause storage of an engine snapshot.
use std::ops::{Index, IndexMut};

use flatsat_formula::Lit;

/// Compact reference to a clause.
///
/// Used to reference clauses from the clause lists, watch lists and variable reasons. Two
/// references denote the same clause if they are equal.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClauseRef {
    index: u32,
}

impl ClauseRef {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

/// A clause together with the bookkeeping data of the engine.
#[derive(Clone, PartialEq, Debug)]
pub struct Clause {
    pub lits: Vec<Lit>,
    pub is_learnt: bool,
    /// Incremental state in which the clause was learned.
    pub learnt_on_state: Option<u32>,
    pub is_at_most: bool,
    pub activity: f64,
    /// Literal block distance (glue).
    pub lbd: u64,
    pub seen: bool,
    pub can_be_del: bool,
    pub one_watched: bool,
    /// Number of watched literals of an at-most constraint.
    ///
    /// Only present for at-most clauses and persisted as `-1` otherwise.
    pub at_most_watchers: Option<u32>,
}

impl Clause {
    /// A clause with default bookkeeping data.
    pub fn new(lits: &[Lit], is_learnt: bool) -> Clause {
        Clause {
            lits: lits.to_vec(),
            is_learnt,
            learnt_on_state: None,
            is_at_most: false,
            activity: 0.0,
            lbd: 0,
            seen: false,
            can_be_del: true,
            one_watched: false,
            at_most_watchers: None,
        }
    }

    /// An at-most constraint over `lits` with the given watcher count.
    pub fn at_most(lits: &[Lit], watchers: u32) -> Clause {
        Clause {
            is_at_most: true,
            at_most_watchers: Some(watchers),
            ..Clause::new(lits, false)
        }
    }

    pub fn len(&self) -> usize {
        self.lits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }
}

/// Owner of all clauses of a snapshot.
///
/// Clauses are only added, never removed, so every handed out [`ClauseRef`] stays valid. The
/// arena may also hold clauses that are referenced by neither the clause nor the learnt list, for
/// example clauses the engine deleted but did not collect yet.
#[derive(Clone, Default, Debug)]
pub struct ClauseArena {
    clauses: Vec<Clause>,
}

impl ClauseArena {
    pub fn new() -> ClauseArena {
        ClauseArena::default()
    }

    /// Adds a clause and returns a reference to it.
    pub fn add(&mut self, clause: Clause) -> ClauseRef {
        let index = self.clauses.len();
        assert!(
            index <= u32::max_value() as usize,
            "Exceeded the maximal number of clauses"
        );
        self.clauses.push(clause);
        ClauseRef {
            index: index as u32,
        }
    }

    pub fn get(&self, cref: ClauseRef) -> Option<&Clause> {
        self.clauses.get(cref.index())
    }

    pub fn get_mut(&mut self, cref: ClauseRef) -> Option<&mut Clause> {
        self.clauses.get_mut(cref.index())
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// All clauses with their references in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ClauseRef, &Clause)> {
        self.clauses.iter().enumerate().map(|(index, clause)| {
            (
                ClauseRef {
                    index: index as u32,
                },
                clause,
            )
        })
    }
}

impl Index<ClauseRef> for ClauseArena {
    type Output = Clause;

    fn index(&self, cref: ClauseRef) -> &Clause {
        &self.clauses[cref.index()]
    }
}

impl IndexMut<ClauseRef> for ClauseArena {
    fn index_mut(&mut self, cref: ClauseRef) -> &mut Clause {
        &mut self.clauses[cref.index()]
    }
}

/// Watch list entry.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Watcher {
    pub clause: ClauseRef,
    /// A literal of the clause, if true the clause need not be inspected.
    pub blocker: Lit,
}

#[cfg(test)]
mod tests {
    use super::*;

    use flatsat_formula::lits;

    #[test]
    fn references_stay_valid() {
        let mut arena = ClauseArena::new();
        let a = arena.add(Clause::new(&lits![1, 2, 3], false));
        let b = arena.add(Clause::at_most(&lits![-1, 4], 2));

        arena[a].activity = 2.5;

        assert_eq!(arena.len(), 2);
        assert_eq!(arena[a].activity, 2.5);
        assert_eq!(arena[b].at_most_watchers, Some(2));
        assert!(arena.get(b).unwrap().is_at_most);
        assert_eq!(
            arena.iter().map(|(cref, _)| cref).collect::<Vec<_>>(),
            vec![a, b]
        );
    }
}
