//! Formulas with attached descriptions or payloads.
use std::any::Any;
use std::io::{self, BufRead, Write};

use anyhow::{bail, Error};
use log::debug;

use flatsat_formula::{Formula, FormulaFactory};
use flatsat_internal_codec::{read_seq, read_string, write_seq, write_str, CodecError};

use crate::error::SerialError;
use crate::graph::{self, read_graph, write_graph, ExpressionGraph};
use crate::payload::{
    read_payload_record, write_payload_record, Payload, PayloadRecord, PayloadRegistry, PayloadTag,
};

/// Payload tag reserved for [`StandardProposition`].
pub const STANDARD_PROPOSITION_TAG: PayloadTag = 0;

/// A formula with a textual description.
#[derive(Clone, PartialEq, Debug)]
pub struct StandardProposition {
    pub description: String,
    pub formula: Formula,
}

impl StandardProposition {
    pub fn new(description: impl Into<String>, formula: Formula) -> StandardProposition {
        StandardProposition {
            description: description.into(),
            formula,
        }
    }
}

/// A formula with a user defined payload.
#[derive(Debug)]
pub struct ExtendedProposition {
    pub backpack: Box<dyn Payload>,
    pub formula: Formula,
}

impl PartialEq for ExtendedProposition {
    fn eq(&self, other: &Self) -> bool {
        *self.backpack == *other.backpack && self.formula == other.formula
    }
}

#[derive(PartialEq, Debug)]
pub enum Proposition {
    Standard(StandardProposition),
    Extended(ExtendedProposition),
}

impl Proposition {
    pub fn formula(&self) -> &Formula {
        match self {
            Proposition::Standard(proposition) => &proposition.formula,
            Proposition::Extended(proposition) => &proposition.formula,
        }
    }
}

impl From<StandardProposition> for Proposition {
    fn from(proposition: StandardProposition) -> Proposition {
        Proposition::Standard(proposition)
    }
}

impl From<ExtendedProposition> for Proposition {
    fn from(proposition: ExtendedProposition) -> Proposition {
        Proposition::Extended(proposition)
    }
}

/// Standard propositions can be attached wherever payloads are expected.
///
/// The encoding is a self-contained [`ExpressionGraph`] with a single root.
impl Payload for StandardProposition {
    fn tag(&self) -> PayloadTag {
        STANDARD_PROPOSITION_TAG
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![];
        write_str(&mut bytes, &self.description)
            .and_then(|_| write_graph(&mut bytes, &graph::serialize(&[self.formula.clone()])))
            .expect("writing to a Vec cannot fail");
        bytes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Decoder for payloads with [`STANDARD_PROPOSITION_TAG`].
pub fn decode_standard_proposition(
    bytes: &[u8],
    factory: &mut FormulaFactory,
) -> Result<StandardProposition, Error> {
    let mut source = bytes;
    let description = read_string(&mut source)?;
    let graph = read_graph(&mut source)?;
    if !source.is_empty() {
        bail!("{} trailing bytes after standard proposition", source.len());
    }
    let mut roots = graph::deserialize(factory, &graph)?;
    if roots.len() != 1 {
        bail!(
            "standard proposition with {} formulas instead of one",
            roots.len()
        );
    }
    Ok(StandardProposition {
        description,
        formula: roots.remove(0),
    })
}

/// Per proposition data apart from the formula.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PropositionRecord {
    Standard { description: String },
    Extended { backpack: PayloadRecord },
}

/// A list of propositions sharing one expression graph.
///
/// The formula of entry `i` is root `i` of the graph.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SerializedPropositions {
    pub graph: ExpressionGraph,
    pub entries: Vec<PropositionRecord>,
}

pub fn serialize_propositions(propositions: &[Proposition]) -> SerializedPropositions {
    let formulas: Vec<Formula> = propositions
        .iter()
        .map(|proposition| proposition.formula().clone())
        .collect();
    let graph = graph::serialize(&formulas);

    let entries = propositions
        .iter()
        .map(|proposition| match proposition {
            Proposition::Standard(proposition) => PropositionRecord::Standard {
                description: proposition.description.clone(),
            },
            Proposition::Extended(proposition) => PropositionRecord::Extended {
                backpack: PayloadRecord::from_payload(&*proposition.backpack),
            },
        })
        .collect();

    SerializedPropositions { graph, entries }
}

/// Restores propositions, decoding backpacks with the given registry.
pub fn deserialize_propositions(
    serialized: &SerializedPropositions,
    registry: &PayloadRegistry,
    factory: &mut FormulaFactory,
) -> Result<Vec<Proposition>, SerialError> {
    if serialized.graph.roots.len() != serialized.entries.len() {
        return Err(SerialError::malformed(format!(
            "{} propositions but {} formulas",
            serialized.entries.len(),
            serialized.graph.roots.len()
        )));
    }

    let formulas = graph::deserialize(factory, &serialized.graph)?;

    let mut propositions = Vec::with_capacity(formulas.len());
    for (entry, formula) in serialized.entries.iter().zip(formulas) {
        propositions.push(match entry {
            PropositionRecord::Standard { description } => {
                Proposition::Standard(StandardProposition {
                    description: description.clone(),
                    formula,
                })
            }
            PropositionRecord::Extended { backpack } => {
                Proposition::Extended(ExtendedProposition {
                    backpack: registry.decode(backpack, factory)?,
                    formula,
                })
            }
        });
    }

    debug!(
        "Restored {} propositions from {} nodes",
        propositions.len(),
        serialized.graph.len()
    );

    Ok(propositions)
}

flatsat_internal_codec::tag_codes!(0, RECORD_STANDARD, RECORD_EXTENDED,);

pub fn write_propositions(
    target: &mut impl Write,
    serialized: &SerializedPropositions,
) -> io::Result<()> {
    write_graph(&mut *target, &serialized.graph)?;
    write_seq(&mut *target, &serialized.entries, |target, entry| {
        match entry {
            PropositionRecord::Standard { description } => {
                flatsat_internal_codec::write_u64(&mut *target, RECORD_STANDARD)?;
                write_str(&mut *target, description)
            }
            PropositionRecord::Extended { backpack } => {
                flatsat_internal_codec::write_u64(&mut *target, RECORD_EXTENDED)?;
                write_payload_record(&mut *target, backpack)
            }
        }
    })
}

pub fn read_propositions(source: &mut impl BufRead) -> Result<SerializedPropositions, CodecError> {
    let graph = read_graph(&mut *source)?;
    let entries = read_seq(&mut *source, |source| {
        match flatsat_internal_codec::read_u64(&mut *source)? {
            RECORD_STANDARD => Ok(PropositionRecord::Standard {
                description: read_string(&mut *source)?,
            }),
            RECORD_EXTENDED => Ok(PropositionRecord::Extended {
                backpack: read_payload_record(&mut *source)?,
            }),
            code => Err(CodecError::Invalid(format!(
                "unknown proposition kind {}",
                code
            ))),
        }
    })?;
    Ok(SerializedPropositions { graph, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::payload::tests::{label_registry, Label, LABEL_TAG};

    fn sample(f: &mut FormulaFactory) -> Vec<Proposition> {
        let x = f.variable("x");
        let y = f.literal("y", false);
        let and = f.and(vec![x.clone(), y.clone()]);
        let or = f.or(vec![and.clone(), x]);
        vec![
            StandardProposition::new("first", and).into(),
            ExtendedProposition {
                backpack: Box::new(Label(3)),
                formula: or,
            }
            .into(),
            StandardProposition::new("", y).into(),
        ]
    }

    #[test]
    fn propositions_share_one_graph() {
        let mut f = FormulaFactory::caching();
        let propositions = sample(&mut f);

        let serialized = serialize_propositions(&propositions);
        assert_eq!(serialized.graph.len(), 4);
        assert_eq!(serialized.graph.roots, vec![2, 3, 1]);
        assert_eq!(
            serialized.entries[1],
            PropositionRecord::Extended {
                backpack: PayloadRecord {
                    tag: LABEL_TAG,
                    bytes: Label(3).to_bytes()
                }
            }
        );

        let mut buf = vec![];
        write_propositions(&mut buf, &serialized).unwrap();
        let read = read_propositions(&mut &buf[..]).unwrap();
        assert_eq!(read, serialized);

        let restored = deserialize_propositions(&read, &label_registry(), &mut f).unwrap();
        assert_eq!(restored, propositions);
    }

    #[test]
    fn extended_propositions_compare_backpack_and_formula() {
        let mut f = FormulaFactory::caching();
        let x = f.variable("x");
        let y = f.variable("y");
        let extended = |label, formula: &Formula| ExtendedProposition {
            backpack: Box::new(Label(label)),
            formula: formula.clone(),
        };

        assert_eq!(extended(1, &x), extended(1, &x));
        assert_ne!(extended(1, &x), extended(2, &x));
        assert_ne!(extended(1, &x), extended(1, &y));
        assert_ne!(
            Proposition::from(extended(1, &x)),
            Proposition::from(StandardProposition::new("", x.clone()))
        );
    }

    #[test]
    fn backpack_needs_registered_decoder() {
        let mut f = FormulaFactory::caching();
        let serialized = serialize_propositions(&sample(&mut f));

        match deserialize_propositions(&serialized, &PayloadRegistry::new(), &mut f) {
            Err(SerialError::UnregisteredPayloadType { tag: LABEL_TAG }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn root_count_mismatch() {
        let mut f = FormulaFactory::caching();
        let mut serialized = serialize_propositions(&sample(&mut f));
        serialized.entries.pop();

        match deserialize_propositions(&serialized, &label_registry(), &mut f) {
            Err(SerialError::MalformedContainer(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn standard_proposition_as_payload() {
        let mut f = FormulaFactory::caching();
        let a = f.variable("a");
        let b = f.variable("b");
        let imp = f.implication(a, b);
        let proposition = StandardProposition::new("rule 17", imp);

        let record = PayloadRecord::from_payload(&proposition);
        assert_eq!(record.tag, STANDARD_PROPOSITION_TAG);

        let registry = PayloadRegistry::with_standard_propositions();
        let mut g = FormulaFactory::non_caching();
        let payload = registry.decode(&record, &mut g).unwrap();
        assert_eq!(
            payload.downcast_ref::<StandardProposition>(),
            Some(&proposition)
        );
    }

    #[test]
    fn trailing_bytes_in_standard_proposition() {
        let mut f = FormulaFactory::caching();
        let proposition = StandardProposition::new("x", f.verum());
        let mut bytes = proposition.to_bytes();
        bytes.push(0);

        assert!(decode_standard_proposition(&bytes, &mut f).is_err());
    }
}
