//! Flat encoding of formula DAGs.
//!
//! An [`ExpressionGraph`] is a table of shallowly encoded nodes indexed by [`NodeId`], where
//! operands are ids of earlier entries, plus the ids of the root formulas. Shared sub-formulas are
//! stored once. Restoring a graph resolves every operand with a table lookup in a single pass over
//! ascending ids.
use std::io::{self, BufRead, Write};

use log::{debug, warn};

use flatsat_formula::{
    BinaryOp, Comparator, Formula, FormulaFactory, FormulaNode, NaryOp, PbConstraint, PbLiteral,
};
use flatsat_internal_codec::{
    read_bool, read_i64, read_i64s, read_seq, read_string, read_u64, read_usize, write_bool,
    write_i64, write_i64s, write_seq, write_str, write_u64, write_usize, CodecError,
};

use crate::error::SerialError;
use crate::ident::{assign, NodeId};

flatsat_internal_codec::tag_codes!(
    0,
    TAG_CONST,
    TAG_LITERAL,
    TAG_NOT,
    TAG_IMPL,
    TAG_EQUIV,
    TAG_AND,
    TAG_OR,
    TAG_PBC,
    TAG_OPAQUE,
);

/// Prefix marking a negative literal inside an encoded pseudo-boolean constraint.
pub const NEGATION_MARKER: char = '~';

/// A formula node with operands replaced by ids.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EncodedNode {
    Const(bool),
    Literal {
        name: String,
        phase: bool,
    },
    Not(NodeId),
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Nary {
        op: NaryOp,
        operands: Vec<NodeId>,
    },
    /// Literals are encoded with [`encode_pb_literal`].
    PseudoBoolean {
        comparator: Comparator,
        rhs: i64,
        literals: Vec<String>,
        coefficients: Vec<i64>,
    },
    Opaque {
        description: String,
    },
}

impl EncodedNode {
    /// Name of the node kind used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            EncodedNode::Const(_) => "constant",
            EncodedNode::Literal { .. } => "literal",
            EncodedNode::Not(_) => "not",
            EncodedNode::Binary {
                op: BinaryOp::Impl, ..
            } => "implication",
            EncodedNode::Binary {
                op: BinaryOp::Equiv,
                ..
            } => "equivalence",
            EncodedNode::Nary { op: NaryOp::And, .. } => "and",
            EncodedNode::Nary { op: NaryOp::Or, .. } => "or",
            EncodedNode::PseudoBoolean { .. } => "pseudo-boolean constraint",
            EncodedNode::Opaque { .. } => "opaque",
        }
    }

    /// Ids of all operands.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            &EncodedNode::Not(operand) => vec![operand],
            &EncodedNode::Binary { left, right, .. } => vec![left, right],
            EncodedNode::Nary { operands, .. } => operands.clone(),
            _ => vec![],
        }
    }
}

/// Flattened formula DAG.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ExpressionGraph {
    /// Nodes indexed by id. Operands always refer to smaller ids.
    pub nodes: Vec<EncodedNode>,
    /// Ids of the serialized roots in the order they were given.
    pub roots: Vec<NodeId>,
}

impl ExpressionGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Encodes a pseudo-boolean literal as its name, prefixed by `~` if negative.
pub fn encode_pb_literal(literal: &PbLiteral) -> String {
    if literal.phase {
        if literal.name.starts_with(NEGATION_MARKER) {
            warn!(
                "positive literal '{}' will be restored as negative literal",
                literal.name
            );
        }
        literal.name.clone()
    } else {
        format!("{}{}", NEGATION_MARKER, literal.name)
    }
}

/// Inverse of [`encode_pb_literal`].
///
/// A leading `~` is always read as negation, so positive literals with such a name do not survive
/// a round trip.
pub fn decode_pb_literal(encoded: &str) -> PbLiteral {
    if encoded.starts_with(NEGATION_MARKER) {
        PbLiteral::new(&encoded[NEGATION_MARKER.len_utf8()..], false)
    } else {
        PbLiteral::new(encoded, true)
    }
}

/// Flattens all formulas reachable from `roots` into an [`ExpressionGraph`].
pub fn serialize(roots: &[Formula]) -> ExpressionGraph {
    let (assigner, root_ids) = assign(roots);

    let nodes: Vec<EncodedNode> = assigner
        .order()
        .iter()
        .map(|formula| match formula.node() {
            &FormulaNode::Const(value) => EncodedNode::Const(value),
            FormulaNode::Literal { name, phase } => EncodedNode::Literal {
                name: name.clone(),
                phase: *phase,
            },
            FormulaNode::Not(operand) => EncodedNode::Not(assigner.id(operand)),
            FormulaNode::Binary { op, left, right } => EncodedNode::Binary {
                op: *op,
                left: assigner.id(left),
                right: assigner.id(right),
            },
            FormulaNode::Nary { op, operands } => EncodedNode::Nary {
                op: *op,
                operands: operands.iter().map(|operand| assigner.id(operand)).collect(),
            },
            FormulaNode::PseudoBoolean(constraint) => EncodedNode::PseudoBoolean {
                comparator: constraint.comparator(),
                rhs: constraint.rhs(),
                literals: constraint.literals().iter().map(encode_pb_literal).collect(),
                coefficients: constraint.coefficients().to_vec(),
            },
            FormulaNode::Opaque { description } => EncodedNode::Opaque {
                description: description.clone(),
            },
        })
        .collect();

    debug!(
        "Flattened {} roots into {} nodes",
        root_ids.len(),
        nodes.len()
    );

    ExpressionGraph {
        nodes,
        roots: root_ids,
    }
}

/// Restores all roots of a graph.
pub fn deserialize(
    factory: &mut FormulaFactory,
    graph: &ExpressionGraph,
) -> Result<Vec<Formula>, SerialError> {
    deserialize_roots(factory, graph, &graph.roots)
}

/// Restores the given node ids of a graph.
///
/// All nodes of the table are materialized, so any opaque node fails the call, even if it is not
/// reachable from the requested ids.
pub fn deserialize_roots(
    factory: &mut FormulaFactory,
    graph: &ExpressionGraph,
    requested: &[NodeId],
) -> Result<Vec<Formula>, SerialError> {
    let mut formulas: Vec<Formula> = Vec::with_capacity(graph.nodes.len());

    for (id, node) in graph.nodes.iter().enumerate() {
        let operand = |operand: NodeId| -> Result<Formula, SerialError> {
            formulas.get(operand).cloned().ok_or_else(|| {
                SerialError::malformed(format!(
                    "node {} references node {} which is not an earlier node",
                    id, operand
                ))
            })
        };

        let formula = match node {
            &EncodedNode::Const(value) => factory.constant(value),
            EncodedNode::Literal { name, phase } => factory.literal(name.as_str(), *phase),
            &EncodedNode::Not(inner) => {
                let inner = operand(inner)?;
                factory.not(inner)
            }
            &EncodedNode::Binary { op, left, right } => {
                let left = operand(left)?;
                let right = operand(right)?;
                factory.binary(op, left, right)
            }
            EncodedNode::Nary { op, operands } => {
                let operands = operands
                    .iter()
                    .map(|&id| operand(id))
                    .collect::<Result<Vec<_>, _>>()?;
                factory.nary(*op, operands)
            }
            EncodedNode::PseudoBoolean {
                comparator,
                rhs,
                literals,
                coefficients,
            } => {
                let literals = literals.iter().map(|lit| decode_pb_literal(lit)).collect();
                let constraint =
                    PbConstraint::new(*comparator, *rhs, literals, coefficients.clone())
                        .ok_or_else(|| {
                            SerialError::malformed(format!(
                                "pseudo-boolean node {} has mismatched literals and coefficients",
                                id
                            ))
                        })?;
                factory.pseudo_boolean(constraint)
            }
            EncodedNode::Opaque { .. } => {
                return Err(SerialError::UnsupportedNodeKind {
                    id,
                    tag: node.kind(),
                })
            }
        };
        formulas.push(formula);
    }

    requested
        .iter()
        .map(|&id| {
            formulas.get(id).cloned().ok_or_else(|| {
                SerialError::malformed(format!(
                    "root {} outside of the node table of size {}",
                    id,
                    formulas.len()
                ))
            })
        })
        .collect()
}

fn binary_tag(op: BinaryOp) -> u64 {
    match op {
        BinaryOp::Impl => TAG_IMPL,
        BinaryOp::Equiv => TAG_EQUIV,
    }
}

fn nary_tag(op: NaryOp) -> u64 {
    match op {
        NaryOp::And => TAG_AND,
        NaryOp::Or => TAG_OR,
    }
}

fn comparator_code(comparator: Comparator) -> u64 {
    match comparator {
        Comparator::Eq => 0,
        Comparator::Lt => 1,
        Comparator::Le => 2,
        Comparator::Gt => 3,
        Comparator::Ge => 4,
    }
}

fn comparator_from_code(code: u64) -> Result<Comparator, CodecError> {
    Ok(match code {
        0 => Comparator::Eq,
        1 => Comparator::Lt,
        2 => Comparator::Le,
        3 => Comparator::Gt,
        4 => Comparator::Ge,
        _ => return Err(CodecError::Invalid(format!("unknown comparator {}", code))),
    })
}

fn write_node(target: &mut impl Write, node: &EncodedNode) -> io::Result<()> {
    match node {
        &EncodedNode::Const(value) => {
            write_u64(&mut *target, TAG_CONST)?;
            write_bool(&mut *target, value)?;
        }
        EncodedNode::Literal { name, phase } => {
            write_u64(&mut *target, TAG_LITERAL)?;
            write_str(&mut *target, name)?;
            write_bool(&mut *target, *phase)?;
        }
        &EncodedNode::Not(operand) => {
            write_u64(&mut *target, TAG_NOT)?;
            write_usize(&mut *target, operand)?;
        }
        &EncodedNode::Binary { op, left, right } => {
            write_u64(&mut *target, binary_tag(op))?;
            write_usize(&mut *target, left)?;
            write_usize(&mut *target, right)?;
        }
        EncodedNode::Nary { op, operands } => {
            write_u64(&mut *target, nary_tag(*op))?;
            write_seq(&mut *target, operands, |target, &id| write_usize(target, id))?;
        }
        EncodedNode::PseudoBoolean {
            comparator,
            rhs,
            literals,
            coefficients,
        } => {
            write_u64(&mut *target, TAG_PBC)?;
            write_u64(&mut *target, comparator_code(*comparator))?;
            write_i64(&mut *target, *rhs)?;
            write_seq(&mut *target, literals, |target, literal| {
                write_str(target, literal)
            })?;
            write_i64s(&mut *target, coefficients)?;
        }
        EncodedNode::Opaque { description } => {
            write_u64(&mut *target, TAG_OPAQUE)?;
            write_str(&mut *target, description)?;
        }
    }
    Ok(())
}

fn read_node(source: &mut impl BufRead) -> Result<EncodedNode, CodecError> {
    let tag = read_u64(&mut *source)?;
    Ok(match tag {
        TAG_CONST => EncodedNode::Const(read_bool(&mut *source)?),
        TAG_LITERAL => EncodedNode::Literal {
            name: read_string(&mut *source)?,
            phase: read_bool(&mut *source)?,
        },
        TAG_NOT => EncodedNode::Not(read_usize(&mut *source)?),
        TAG_IMPL | TAG_EQUIV => EncodedNode::Binary {
            op: if tag == TAG_IMPL {
                BinaryOp::Impl
            } else {
                BinaryOp::Equiv
            },
            left: read_usize(&mut *source)?,
            right: read_usize(&mut *source)?,
        },
        TAG_AND | TAG_OR => EncodedNode::Nary {
            op: if tag == TAG_AND {
                NaryOp::And
            } else {
                NaryOp::Or
            },
            operands: read_seq(&mut *source, |source| read_usize(source))?,
        },
        TAG_PBC => EncodedNode::PseudoBoolean {
            comparator: comparator_from_code(read_u64(&mut *source)?)?,
            rhs: read_i64(&mut *source)?,
            literals: read_seq(&mut *source, |source| read_string(source))?,
            coefficients: read_i64s(&mut *source)?,
        },
        TAG_OPAQUE => EncodedNode::Opaque {
            description: read_string(&mut *source)?,
        },
        _ => return Err(CodecError::Invalid(format!("unknown node tag {}", tag))),
    })
}

/// Writes an expression graph.
pub fn write_graph(target: &mut impl Write, graph: &ExpressionGraph) -> io::Result<()> {
    write_seq(&mut *target, &graph.nodes, |target, node| {
        write_node(target, node)
    })?;
    write_seq(&mut *target, &graph.roots, |target, &id| {
        write_usize(target, id)
    })
}

/// Reads an expression graph written by [`write_graph`].
///
/// This only checks the syntax, references are checked by [`deserialize`].
pub fn read_graph(source: &mut impl BufRead) -> Result<ExpressionGraph, CodecError> {
    let nodes = read_seq(&mut *source, |source| read_node(source))?;
    let roots = read_seq(&mut *source, |source| read_usize(source))?;
    Ok(ExpressionGraph { nodes, roots })
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use flatsat_formula::test::formula_recipe;

    #[test]
    fn shared_operand_is_stored_once() {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let y = f.variable("y");
        let z = f.variable("z");
        let a = f.and(vec![x.clone(), y]);
        let b = f.and(vec![x, z]);

        let graph = serialize(&[a.clone(), b.clone()]);

        assert_eq!(graph.len(), 5);
        assert_eq!(graph.roots, vec![2, 4]);
        assert_eq!(
            graph.nodes[2],
            EncodedNode::Nary {
                op: NaryOp::And,
                operands: vec![0, 1],
            }
        );

        let restored = deserialize(&mut f, &graph).unwrap();
        assert!(restored[0].ptr_eq(&a));
        assert!(restored[1].ptr_eq(&b));
    }

    #[test]
    fn pb_literal_encoding() {
        assert_eq!(encode_pb_literal(&PbLiteral::new("x", true)), "x");
        assert_eq!(encode_pb_literal(&PbLiteral::new("y", false)), "~y");
        assert_eq!(decode_pb_literal("x"), PbLiteral::new("x", true));
        assert_eq!(decode_pb_literal("~y"), PbLiteral::new("y", false));
    }

    #[test]
    fn negation_marker_in_positive_name_is_lossy() {
        let encoded = encode_pb_literal(&PbLiteral::new("~z", true));
        assert_eq!(decode_pb_literal(&encoded), PbLiteral::new("z", false));
    }

    #[test]
    fn pseudo_boolean_round_trip() {
        let mut f = FormulaFactory::caching();
        let pbc = f.pbc(
            Comparator::Ge,
            3,
            vec![PbLiteral::new("x", true), PbLiteral::new("y", false)],
            vec![2, -1],
        );

        let graph = serialize(&[pbc.clone()]);
        assert_eq!(
            graph.nodes[0],
            EncodedNode::PseudoBoolean {
                comparator: Comparator::Ge,
                rhs: 3,
                literals: vec!["x".to_string(), "~y".to_string()],
                coefficients: vec![2, -1],
            }
        );

        let restored = deserialize(&mut FormulaFactory::non_caching(), &graph).unwrap();
        assert_eq!(restored, vec![pbc]);
    }

    #[test]
    fn opaque_nodes_are_unsupported() {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let p = f.opaque("p(x)");
        let and = f.and(vec![x, p]);

        let graph = serialize(&[and]);
        assert_eq!(graph.nodes[1].kind(), "opaque");

        match deserialize(&mut f, &graph) {
            Err(SerialError::UnsupportedNodeKind { id: 1, tag: "opaque" }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn forward_reference_is_malformed() {
        let graph = ExpressionGraph {
            nodes: vec![
                EncodedNode::Not(1),
                EncodedNode::Literal {
                    name: "x".into(),
                    phase: true,
                },
            ],
            roots: vec![0],
        };

        match deserialize(&mut FormulaFactory::caching(), &graph) {
            Err(SerialError::MalformedContainer(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn root_outside_table_is_malformed() {
        let graph = ExpressionGraph {
            nodes: vec![EncodedNode::Const(true)],
            roots: vec![1],
        };

        match deserialize(&mut FormulaFactory::caching(), &graph) {
            Err(SerialError::MalformedContainer(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn requested_roots_may_be_inner_nodes() {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let not_x = f.not(x.clone());

        let graph = serialize(&[not_x]);
        let restored = deserialize_roots(&mut f, &graph, &[0]).unwrap();
        assert!(restored[0].ptr_eq(&x));
    }

    #[test]
    fn unknown_tag() {
        let mut buf = vec![];
        write_u64(&mut buf, 1).unwrap();
        write_u64(&mut buf, 99).unwrap();

        assert!(read_graph(&mut &buf[..]).is_err());
    }

    #[test]
    fn deep_chain_restores_without_recursion() {
        let mut graph = ExpressionGraph {
            nodes: vec![EncodedNode::Literal {
                name: "x".into(),
                phase: true,
            }],
            roots: vec![],
        };
        for id in 0..100_000 {
            graph.nodes.push(EncodedNode::Not(id));
        }
        graph.roots.push(100_000);

        let mut f = FormulaFactory::caching();
        let restored = deserialize(&mut f, &graph).unwrap();
        assert_eq!(restored.len(), 1);

        drop(f);
        drop(restored);
    }

    proptest! {
        #[test]
        fn round_trip(
            recipe in formula_recipe(1..8usize, 1..80usize, 1..6usize),
            caching in prop::bool::ANY,
        ) {
            let mut factory = if caching {
                FormulaFactory::caching()
            } else {
                FormulaFactory::non_caching()
            };
            let roots = recipe.build(&mut factory);

            let graph = serialize(&roots);

            for (id, node) in graph.nodes.iter().enumerate() {
                for operand in node.operands() {
                    prop_assert!(operand < id);
                }
            }

            let mut buf = vec![];
            write_graph(&mut buf, &graph)?;
            let read = read_graph(&mut &buf[..]).unwrap();
            prop_assert_eq!(&read, &graph);

            let restored = deserialize(&mut FormulaFactory::caching(), &read).unwrap();
            prop_assert_eq!(restored, roots);
        }
    }
}
