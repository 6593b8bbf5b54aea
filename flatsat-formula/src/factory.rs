//! Construction of formulas.
use rustc_hash::FxHashMap;

use crate::formula::{
    BinaryOp, Comparator, Formula, FormulaNode, NaryOp, PbConstraint, PbLiteral,
};

/// Shallow structure of a node, with operands identified by their address.
///
/// Operands are kept alive by the cached formula, so their addresses are never reused while the
/// key is in the cache.
#[derive(PartialEq, Eq, Hash)]
enum NodeKey {
    Const(bool),
    Literal(String, bool),
    Not(usize),
    Binary(BinaryOp, usize, usize),
    Nary(NaryOp, Vec<usize>),
    PseudoBoolean(Comparator, i64, Vec<PbLiteral>, Vec<i64>),
}

impl NodeKey {
    fn of(node: &FormulaNode) -> Option<NodeKey> {
        Some(match node {
            FormulaNode::Const(value) => NodeKey::Const(*value),
            FormulaNode::Literal { name, phase } => NodeKey::Literal(name.clone(), *phase),
            FormulaNode::Not(operand) => NodeKey::Not(operand.address()),
            FormulaNode::Binary { op, left, right } => {
                NodeKey::Binary(*op, left.address(), right.address())
            }
            FormulaNode::Nary { op, operands } => {
                NodeKey::Nary(*op, operands.iter().map(Formula::address).collect())
            }
            FormulaNode::PseudoBoolean(constraint) => NodeKey::PseudoBoolean(
                constraint.comparator(),
                constraint.rhs(),
                constraint.literals().to_vec(),
                constraint.coefficients().to_vec(),
            ),
            FormulaNode::Opaque { .. } => return None,
        })
    }
}

/// Builds formulas, optionally interning every node.
///
/// A caching factory returns the same node for structurally equal requests, so pointer identity
/// and structural equality coincide for everything it creates. A non-caching factory always
/// allocates fresh nodes.
pub struct FormulaFactory {
    cache: Option<FxHashMap<NodeKey, Formula>>,
}

impl Default for FormulaFactory {
    fn default() -> FormulaFactory {
        FormulaFactory::caching()
    }
}

impl FormulaFactory {
    pub fn caching() -> FormulaFactory {
        FormulaFactory {
            cache: Some(FxHashMap::default()),
        }
    }

    pub fn non_caching() -> FormulaFactory {
        FormulaFactory { cache: None }
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of interned nodes.
    pub fn cached_nodes(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.len())
    }

    /// Returns a formula for the given node, reusing an interned node when possible.
    pub fn node(&mut self, node: FormulaNode) -> Formula {
        let cache = match &mut self.cache {
            Some(cache) => cache,
            None => return Formula::from_node(node),
        };
        match NodeKey::of(&node) {
            Some(key) => cache
                .entry(key)
                .or_insert_with(|| Formula::from_node(node))
                .clone(),
            None => Formula::from_node(node),
        }
    }

    pub fn constant(&mut self, value: bool) -> Formula {
        self.node(FormulaNode::Const(value))
    }

    pub fn verum(&mut self) -> Formula {
        self.constant(true)
    }

    pub fn falsum(&mut self) -> Formula {
        self.constant(false)
    }

    pub fn literal(&mut self, name: impl Into<String>, phase: bool) -> Formula {
        self.node(FormulaNode::Literal {
            name: name.into(),
            phase,
        })
    }

    /// A positive literal.
    pub fn variable(&mut self, name: impl Into<String>) -> Formula {
        self.literal(name, true)
    }

    pub fn not(&mut self, operand: Formula) -> Formula {
        self.node(FormulaNode::Not(operand))
    }

    pub fn binary(&mut self, op: BinaryOp, left: Formula, right: Formula) -> Formula {
        self.node(FormulaNode::Binary { op, left, right })
    }

    pub fn implication(&mut self, left: Formula, right: Formula) -> Formula {
        self.binary(BinaryOp::Impl, left, right)
    }

    pub fn equivalence(&mut self, left: Formula, right: Formula) -> Formula {
        self.binary(BinaryOp::Equiv, left, right)
    }

    /// Operands are kept in the given order, including duplicates.
    pub fn nary(&mut self, op: NaryOp, operands: impl IntoIterator<Item = Formula>) -> Formula {
        self.node(FormulaNode::Nary {
            op,
            operands: operands.into_iter().collect(),
        })
    }

    pub fn and(&mut self, operands: impl IntoIterator<Item = Formula>) -> Formula {
        self.nary(NaryOp::And, operands)
    }

    pub fn or(&mut self, operands: impl IntoIterator<Item = Formula>) -> Formula {
        self.nary(NaryOp::Or, operands)
    }

    /// A pseudo-boolean constraint.
    ///
    /// Panics if `literals` and `coefficients` differ in length. Use
    /// [`pseudo_boolean`](FormulaFactory::pseudo_boolean) for checked construction.
    pub fn pbc(
        &mut self,
        comparator: Comparator,
        rhs: i64,
        literals: Vec<PbLiteral>,
        coefficients: Vec<i64>,
    ) -> Formula {
        match PbConstraint::new(comparator, rhs, literals, coefficients) {
            Some(constraint) => self.pseudo_boolean(constraint),
            None => panic!("pseudo-boolean constraint with mismatched literals and coefficients"),
        }
    }

    pub fn pseudo_boolean(&mut self, constraint: PbConstraint) -> Formula {
        self.node(FormulaNode::PseudoBoolean(constraint))
    }

    /// A leaf that is never interned.
    pub fn opaque(&mut self, description: impl Into<String>) -> Formula {
        Formula::from_node(FormulaNode::Opaque {
            description: description.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caching_interns_structurally_equal_nodes() {
        let mut f = FormulaFactory::caching();
        let x1 = f.variable("x");
        let x2 = f.variable("x");
        assert!(x1.ptr_eq(&x2));

        let y = f.literal("y", false);
        let and1 = f.and(vec![x1, y.clone()]);
        let and2 = f.and(vec![x2, y]);
        assert!(and1.ptr_eq(&and2));

        assert_eq!(f.cached_nodes(), 3);
    }

    #[test]
    fn operand_order_matters() {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let y = f.variable("y");
        let xy = f.or(vec![x.clone(), y.clone()]);
        let yx = f.or(vec![y, x]);
        assert!(!xy.ptr_eq(&yx));
        assert_ne!(xy, yx);
    }

    #[test]
    fn non_caching_keeps_instances_apart() {
        let mut f = FormulaFactory::non_caching();
        let x1 = f.variable("x");
        let x2 = f.variable("x");
        assert!(!x1.ptr_eq(&x2));
        assert_eq!(f.cached_nodes(), 0);
    }

    #[test]
    fn opaque_nodes_are_not_interned() {
        let mut f = FormulaFactory::caching();
        let p1 = f.opaque("p(x)");
        let p2 = f.opaque("p(x)");
        assert!(!p1.ptr_eq(&p2));
        assert_eq!(p1, p2);
    }

    #[test]
    fn pseudo_boolean_interning() {
        let mut f = FormulaFactory::caching();
        let lits = vec![PbLiteral::new("a", true), PbLiteral::new("b", false)];
        let c1 = f.pbc(Comparator::Le, 3, lits.clone(), vec![1, 2]);
        let c2 = f.pbc(Comparator::Le, 3, lits.clone(), vec![1, 2]);
        let c3 = f.pbc(Comparator::Lt, 3, lits, vec![1, 2]);
        assert!(c1.ptr_eq(&c2));
        assert!(!c1.ptr_eq(&c3));
    }

    #[test]
    #[should_panic]
    fn pbc_length_mismatch() {
        let mut f = FormulaFactory::caching();
        f.pbc(Comparator::Eq, 1, vec![PbLiteral::new("a", true)], vec![]);
    }
}
