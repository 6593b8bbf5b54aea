//! Immutable formula DAGs.
use std::{fmt, rc::Rc};

use rustc_hash::FxHashSet;

/// Operator of a [`FormulaNode::Binary`] node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    Impl,
    Equiv,
}

/// Operator of a [`FormulaNode::Nary`] node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum NaryOp {
    And,
    Or,
}

/// Comparator of a pseudo-boolean constraint.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Comparator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// A named literal inside a pseudo-boolean constraint.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PbLiteral {
    pub name: String,
    pub phase: bool,
}

impl PbLiteral {
    pub fn new(name: impl Into<String>, phase: bool) -> PbLiteral {
        PbLiteral {
            name: name.into(),
            phase,
        }
    }
}

impl fmt::Display for PbLiteral {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.phase {
            write!(f, "~")?;
        }
        write!(f, "{}", self.name)
    }
}

/// A pseudo-boolean constraint `sum(coefficients[i] * literals[i]) <comparator> rhs`.
///
/// `literals` and `coefficients` always have the same length.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PbConstraint {
    comparator: Comparator,
    rhs: i64,
    literals: Vec<PbLiteral>,
    coefficients: Vec<i64>,
}

impl PbConstraint {
    /// Returns `None` if the number of literals and coefficients differ.
    pub fn new(
        comparator: Comparator,
        rhs: i64,
        literals: Vec<PbLiteral>,
        coefficients: Vec<i64>,
    ) -> Option<PbConstraint> {
        if literals.len() != coefficients.len() {
            return None;
        }
        Some(PbConstraint {
            comparator,
            rhs,
            literals,
            coefficients,
        })
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn rhs(&self) -> i64 {
        self.rhs
    }

    pub fn literals(&self) -> &[PbLiteral] {
        &self.literals
    }

    pub fn coefficients(&self) -> &[i64] {
        &self.coefficients
    }

    /// Pairs of coefficient and literal.
    pub fn terms(&self) -> impl Iterator<Item = (i64, &PbLiteral)> {
        self.coefficients
            .iter()
            .cloned()
            .zip(self.literals.iter())
    }
}

/// The node of a formula DAG.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FormulaNode {
    Const(bool),
    Literal { name: String, phase: bool },
    Not(Formula),
    Binary {
        op: BinaryOp,
        left: Formula,
        right: Formula,
    },
    Nary {
        op: NaryOp,
        operands: Vec<Formula>,
    },
    PseudoBoolean(PbConstraint),
    /// A leaf the codecs cannot represent, e.g. a theory predicate.
    Opaque { description: String },
}

/// A shared handle to an immutable formula node.
///
/// Cloning a formula is cheap and keeps pointing at the same node. Equality is structural, with a
/// fast path for handles to the same node.
#[derive(Clone)]
pub struct Formula(Rc<FormulaNode>);

impl Formula {
    /// Wraps a node without any interning.
    ///
    /// Prefer [`FormulaFactory`](crate::FormulaFactory) for building formulas.
    pub fn from_node(node: FormulaNode) -> Formula {
        Formula(Rc::new(node))
    }

    pub fn node(&self) -> &FormulaNode {
        &self.0
    }

    /// Whether both handles refer to the same node.
    pub fn ptr_eq(&self, other: &Formula) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the node, stable for as long as any handle is alive.
    pub fn address(&self) -> usize {
        &*self.0 as *const FormulaNode as usize
    }

    /// The direct sub-formula at `index` or `None` when out of range.
    ///
    /// Pseudo-boolean constraints have no sub-formulas, their literals are stored inline.
    pub fn operand(&self, index: usize) -> Option<&Formula> {
        match self.node() {
            FormulaNode::Not(operand) if index == 0 => Some(operand),
            FormulaNode::Binary { left, right, .. } => match index {
                0 => Some(left),
                1 => Some(right),
                _ => None,
            },
            FormulaNode::Nary { operands, .. } => operands.get(index),
            _ => None,
        }
    }

    pub fn operand_count(&self) -> usize {
        match self.node() {
            FormulaNode::Not(_) => 1,
            FormulaNode::Binary { .. } => 2,
            FormulaNode::Nary { operands, .. } => operands.len(),
            _ => 0,
        }
    }

    /// Number of distinct nodes reachable from this formula.
    pub fn node_count(&self) -> usize {
        let mut seen = FxHashSet::default();
        let mut stack = vec![self];
        while let Some(formula) = stack.pop() {
            if seen.insert(formula.address()) {
                stack.extend((0..formula.operand_count()).filter_map(|i| formula.operand(i)));
            }
        }
        seen.len()
    }

    /// Compares everything except the operands.
    fn shallow_eq(&self, other: &Formula) -> bool {
        match (self.node(), other.node()) {
            (FormulaNode::Const(a), FormulaNode::Const(b)) => a == b,
            (
                FormulaNode::Literal { name, phase },
                FormulaNode::Literal {
                    name: other_name,
                    phase: other_phase,
                },
            ) => name == other_name && phase == other_phase,
            (FormulaNode::Not(_), FormulaNode::Not(_)) => true,
            (FormulaNode::Binary { op, .. }, FormulaNode::Binary { op: other_op, .. }) => {
                op == other_op
            }
            (
                FormulaNode::Nary { op, operands },
                FormulaNode::Nary {
                    op: other_op,
                    operands: other_operands,
                },
            ) => op == other_op && operands.len() == other_operands.len(),
            (FormulaNode::PseudoBoolean(a), FormulaNode::PseudoBoolean(b)) => a == b,
            (
                FormulaNode::Opaque { description },
                FormulaNode::Opaque {
                    description: other_description,
                },
            ) => description == other_description,
            _ => false,
        }
    }

    fn precedence(&self) -> u8 {
        match self.node() {
            FormulaNode::Binary {
                op: BinaryOp::Equiv,
                ..
            } => 1,
            FormulaNode::Binary {
                op: BinaryOp::Impl, ..
            } => 2,
            FormulaNode::Nary { op: NaryOp::Or, .. } => 3,
            FormulaNode::Nary {
                op: NaryOp::And, ..
            } => 4,
            FormulaNode::PseudoBoolean(_) => 5,
            FormulaNode::Not(_) => 6,
            _ => 7,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter, parent_precedence: u8) -> fmt::Result {
        if self.precedence() <= parent_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl PartialEq for Formula {
    /// Compares every pair of nodes at most once, so shared sub-formulas are not revisited.
    fn eq(&self, other: &Formula) -> bool {
        let mut checked = FxHashSet::default();
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.ptr_eq(b) || !checked.insert((a.address(), b.address())) {
                continue;
            }
            if !a.shallow_eq(b) {
                return false;
            }
            for index in 0..a.operand_count() {
                match (a.operand(index), b.operand(index)) {
                    (Some(a_operand), Some(b_operand)) => stack.push((a_operand, b_operand)),
                    _ => return false,
                }
            }
        }
        true
    }
}

impl Eq for Formula {}

impl Formula {
    /// Moves the operands out of a node that no other handle refers to.
    fn take_operands(&mut self, released: &mut Vec<Formula>) {
        if let Some(node) = Rc::get_mut(&mut self.0) {
            match std::mem::replace(node, FormulaNode::Const(false)) {
                FormulaNode::Not(operand) => released.push(operand),
                FormulaNode::Binary { left, right, .. } => {
                    released.push(left);
                    released.push(right);
                }
                FormulaNode::Nary { operands, .. } => released.extend(operands),
                _ => (),
            }
        }
    }
}

/// Releases long chains of uniquely owned nodes without recursing once per level.
impl Drop for Formula {
    fn drop(&mut self) {
        let mut released = vec![];
        self.take_operands(&mut released);
        while let Some(mut formula) = released.pop() {
            formula.take_operands(&mut released);
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let precedence = self.precedence();
        match self.node() {
            FormulaNode::Const(true) => write!(f, "$true"),
            FormulaNode::Const(false) => write!(f, "$false"),
            FormulaNode::Literal { name, phase } => {
                if !phase {
                    write!(f, "~")?;
                }
                write!(f, "{}", name)
            }
            FormulaNode::Not(operand) => {
                write!(f, "~")?;
                operand.fmt_operand(f, precedence - 1)
            }
            FormulaNode::Binary { op, left, right } => {
                let symbol = match op {
                    BinaryOp::Impl => "=>",
                    BinaryOp::Equiv => "<=>",
                };
                left.fmt_operand(f, precedence)?;
                write!(f, " {} ", symbol)?;
                right.fmt_operand(f, precedence)
            }
            FormulaNode::Nary { op, operands } => {
                let (symbol, empty) = match op {
                    NaryOp::And => ("&", "$true"),
                    NaryOp::Or => ("|", "$false"),
                };
                if operands.is_empty() {
                    return write!(f, "{}", empty);
                }
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", symbol)?;
                    }
                    operand.fmt_operand(f, precedence)?;
                }
                Ok(())
            }
            FormulaNode::PseudoBoolean(constraint) => {
                if constraint.literals().is_empty() {
                    write!(f, "0")?;
                }
                for (i, (coefficient, literal)) in constraint.terms().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    if coefficient == 1 {
                        write!(f, "{}", literal)?;
                    } else {
                        write!(f, "{}*{}", coefficient, literal)?;
                    }
                }
                write!(
                    f,
                    " {} {}",
                    constraint.comparator().symbol(),
                    constraint.rhs()
                )
            }
            FormulaNode::Opaque { description } => write!(f, "{}", description),
        }
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Formula({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::FormulaFactory;

    #[test]
    fn display_precedence() {
        let mut f = FormulaFactory::caching();
        let a = f.variable("a");
        let b = f.variable("b");
        let c = f.literal("c", false);

        let or = f.or(vec![a.clone(), b.clone()]);
        let and = f.and(vec![or.clone(), c.clone()]);
        assert_eq!(and.to_string(), "(a | b) & ~c");

        let not_and = f.not(and.clone());
        assert_eq!(not_and.to_string(), "~((a | b) & ~c)");

        let imp = f.implication(and, or.clone());
        assert_eq!(imp.to_string(), "(a | b) & ~c => a | b");

        let equiv = f.equivalence(imp, a);
        assert_eq!(equiv.to_string(), "(a | b) & ~c => a | b <=> a");

        let nested = f.implication(equiv, c);
        assert_eq!(nested.to_string(), "((a | b) & ~c => a | b <=> a) => ~c");

        let not_b = f.not(b);
        let not_not = f.not(not_b);
        assert_eq!(not_not.to_string(), "~~b");
    }

    #[test]
    fn display_pseudo_boolean() {
        let mut f = FormulaFactory::caching();
        let pbc = f.pbc(
            Comparator::Ge,
            4,
            vec![PbLiteral::new("a", true), PbLiteral::new("b", false)],
            vec![2, 1],
        );
        assert_eq!(pbc.to_string(), "2*a + ~b >= 4");

        let empty = f.pbc(Comparator::Eq, 0, vec![], vec![]);
        assert_eq!(empty.to_string(), "0 = 0");
    }

    #[test]
    fn structural_equality_across_factories() {
        let mut f = FormulaFactory::non_caching();
        let a1 = f.variable("a");
        let a2 = f.variable("a");
        assert!(!a1.ptr_eq(&a2));
        assert_eq!(a1, a2);

        let n1 = f.not(a1);
        let n2 = f.not(a2.clone());
        assert_eq!(n1, n2);
        assert_ne!(n1, a2);
    }

    #[test]
    fn deep_chains_drop_without_overflow() {
        let mut f = FormulaFactory::non_caching();
        let x = f.variable("x");
        let mut chain = x.clone();
        for i in 0..300_000 {
            chain = match i % 3 {
                0 => f.not(chain),
                1 => f.implication(x.clone(), chain),
                _ => f.or(vec![chain, x.clone()]),
            };
        }
        assert_eq!(chain.node_count(), 300_001);
        drop(chain);

        // the leaf shared with every level stays usable
        assert_eq!(x.to_string(), "x");
    }

    #[test]
    fn node_count_counts_shared_nodes_once() {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let y = f.variable("y");
        let a = f.and(vec![x.clone(), y]);
        let b = f.or(vec![x, a.clone()]);
        let top = f.and(vec![a, b]);
        assert_eq!(top.node_count(), 5);
    }

    #[test]
    fn operands() {
        let mut f = FormulaFactory::caching();
        let a = f.variable("a");
        let b = f.variable("b");
        let imp = f.implication(a.clone(), b.clone());
        assert_eq!(imp.operand_count(), 2);
        assert!(imp.operand(0).unwrap().ptr_eq(&a));
        assert!(imp.operand(1).unwrap().ptr_eq(&b));
        assert!(imp.operand(2).is_none());
        assert!(a.operand(0).is_none());
    }
}
