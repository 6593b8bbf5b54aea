//! Dense identifiers for the nodes of a DAG.
//!
//! Flattening a DAG into a table requires a numbering where every operand is numbered before the
//! nodes using it. The [`IdentityAssigner`] computes such a numbering for a batch of roots, visiting
//! each distinct node exactly once.
use std::hash::Hash;

use rustc_hash::FxHashMap;

use flatsat_formula::Formula;

/// Index of a node within one serialized table.
pub type NodeId = usize;

/// A node of a DAG that can be numbered by an [`IdentityAssigner`].
pub trait GraphNode: Clone {
    /// Key used to decide whether two handles denote the same node.
    type Identity: Hash + Eq;

    fn identity(&self) -> Self::Identity;

    /// The direct operand at `index`, `None` past the last operand.
    fn operand(&self, index: usize) -> Option<&Self>;
}

/// Formulas are identified by node address.
///
/// For formulas from a caching factory this coincides with structural identity. Formulas from a
/// non-caching factory are only shared where the same handle was reused.
impl GraphNode for Formula {
    type Identity = usize;

    fn identity(&self) -> usize {
        self.address()
    }

    fn operand(&self, index: usize) -> Option<&Formula> {
        Formula::operand(self, index)
    }
}

/// Assigns ids in dependency order.
///
/// Ids are handed out in the order nodes are first completed by a depth-first traversal, so the
/// operands of a node always have smaller ids than the node. The traversal uses an explicit stack,
/// so arbitrarily deep formulas are supported. Input must be acyclic.
pub struct IdentityAssigner<N: GraphNode> {
    ids: FxHashMap<N::Identity, NodeId>,
    order: Vec<N>,
}

impl<N: GraphNode> Default for IdentityAssigner<N> {
    fn default() -> IdentityAssigner<N> {
        IdentityAssigner {
            ids: FxHashMap::default(),
            order: vec![],
        }
    }
}

impl<N: GraphNode> IdentityAssigner<N> {
    pub fn new() -> IdentityAssigner<N> {
        IdentityAssigner::default()
    }

    /// Numbers all not yet numbered nodes reachable from `root` and returns the id of `root`.
    pub fn assign_root(&mut self, root: &N) -> NodeId {
        if let Some(&id) = self.ids.get(&root.identity()) {
            return id;
        }

        // Each entry is a node and the index of the next operand to visit.
        let mut stack: Vec<(N, usize)> = vec![(root.clone(), 0)];

        while let Some((node, cursor)) = stack.last_mut() {
            match node.operand(*cursor) {
                Some(operand) => {
                    *cursor += 1;
                    if !self.ids.contains_key(&operand.identity()) {
                        let operand = operand.clone();
                        stack.push((operand, 0));
                    }
                }
                None => {
                    if let Some((node, _)) = stack.pop() {
                        let identity = node.identity();
                        // A node reachable twice below the same parent may have been completed in
                        // the meantime.
                        if !self.ids.contains_key(&identity) {
                            self.ids.insert(identity, self.order.len());
                            self.order.push(node);
                        }
                    }
                }
            }
        }

        self.ids[&root.identity()]
    }

    /// Numbers all given roots and returns their ids.
    pub fn assign_roots<'a>(&mut self, roots: impl IntoIterator<Item = &'a N>) -> Vec<NodeId>
    where
        N: 'a,
    {
        roots.into_iter().map(|root| self.assign_root(root)).collect()
    }

    /// The id of an already numbered node.
    ///
    /// Panics if the node was not numbered.
    pub fn id(&self, node: &N) -> NodeId {
        self.ids[&node.identity()]
    }

    /// The id of a node, `None` if it was not numbered.
    pub fn id_of(&self, node: &N) -> Option<NodeId> {
        self.ids.get(&node.identity()).cloned()
    }

    /// All numbered nodes, indexed by id.
    pub fn order(&self) -> &[N] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Consumes the assigner returning the numbered nodes indexed by id.
    pub fn into_order(self) -> Vec<N> {
        self.order
    }
}

/// Numbers all nodes reachable from `roots`.
///
/// Returns the assigner, which maps nodes to ids and ids to nodes, and the ids of the roots.
pub fn assign<'a, N: GraphNode + 'a>(
    roots: impl IntoIterator<Item = &'a N>,
) -> (IdentityAssigner<N>, Vec<NodeId>) {
    let mut assigner = IdentityAssigner::new();
    let root_ids = assigner.assign_roots(roots);
    (assigner, root_ids)
}
