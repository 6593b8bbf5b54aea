//! Container round trips through the public API, using files and user defined payloads.
use std::any::Any;
use std::convert::TryInto;

use anyhow::{bail, Error};
use proptest::prelude::*;

use flatsat::container::{read_file, write_file, Container};
use flatsat::snapshot::{Clause, ProofEntry};
use flatsat::{
    EngineSnapshot, ExtendedProposition, FormulaFactory, Payload, PayloadRegistry, PayloadTag,
    Proposition, SerialError, SolverConfig, StandardProposition,
};
use flatsat_formula::{lit, lits, test::formula_recipe};

/// A rule id with a priority, as an application might attach to its constraints.
#[derive(Clone, PartialEq, Debug)]
struct Rule {
    id: u32,
    priority: u8,
}

const RULE_TAG: PayloadTag = 1000;

impl Payload for Rule {
    fn tag(&self) -> PayloadTag {
        RULE_TAG
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.id.to_le_bytes().to_vec();
        bytes.push(self.priority);
        bytes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn decode_rule(bytes: &[u8], _: &mut FormulaFactory) -> Result<Rule, Error> {
    if bytes.len() != 5 {
        bail!("rule payload of {} bytes", bytes.len());
    }
    Ok(Rule {
        id: u32::from_le_bytes(bytes[..4].try_into()?),
        priority: bytes[4],
    })
}

fn registry() -> PayloadRegistry {
    let mut registry = PayloadRegistry::with_standard_propositions();
    registry.register(RULE_TAG, decode_rule);
    registry
}

#[test]
fn propositions_file() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut f = FormulaFactory::caching();
    let a = f.variable("a");
    let b = f.variable("b");
    let c = f.literal("c", false);
    let shared = f.or(vec![a.clone(), b.clone()]);
    let first = f.implication(shared.clone(), c.clone());
    let second = f.and(vec![shared, c]);

    let propositions: Vec<Proposition> = vec![
        StandardProposition::new("a or b implies not c", first).into(),
        ExtendedProposition {
            backpack: Box::new(Rule { id: 7, priority: 3 }),
            formula: second,
        }
        .into(),
    ];

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("propositions.fsat");
    write_file(&path, &Container::from_propositions(&propositions), false).unwrap();

    let mut g = FormulaFactory::caching();
    let restored = read_file(&path)
        .unwrap()
        .propositions(&registry(), &mut g)
        .unwrap();

    assert_eq!(restored, propositions);
    match &restored[1] {
        Proposition::Extended(proposition) => assert_eq!(
            proposition.backpack.downcast_ref::<Rule>(),
            Some(&Rule { id: 7, priority: 3 })
        ),
        other => panic!("unexpected proposition {:?}", other),
    }
}

#[test]
fn snapshot_with_standard_propositions_in_proof() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut f = FormulaFactory::caching();
    let x = f.variable("x");
    let y = f.variable("y");
    let rule = f.implication(x, y);

    let mut engine = EngineSnapshot::new(SolverConfig {
        proof_generation: true,
        ..SolverConfig::default()
    });
    engine.new_var(Some("x"));
    engine.new_var(Some("y"));
    engine.new_var(None);
    let clause = engine.add_clause(Clause::new(&lits![-1, 2], false));
    engine.add_clause(Clause::new(&lits![1, 2, 3], true));
    if let Some(proof) = &mut engine.proof {
        proof.original_clauses.push(ProofEntry {
            clause: lits![-1, 2],
            payload: Some(Box::new(StandardProposition::new("x => y", rule.clone()))),
        });
    }
    engine.new_decision_level();
    engine.assign(lit!(1), None);
    engine.assign(lit!(2), Some(clause));
    engine.wrapper.result = Some(true);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.fsat");
    write_file(&path, &Container::from_snapshot(&engine).unwrap(), true).unwrap();

    let container = read_file(&path).unwrap();

    match container.snapshot(&PayloadRegistry::new(), &mut f) {
        Err(SerialError::UnregisteredPayloadType { tag: 0 }) => (),
        other => panic!("unexpected result {:?}", other),
    }

    let restored = container.snapshot(&registry(), &mut f).unwrap();
    assert_eq!(restored.wrapper.result, Some(true));
    assert_eq!(restored.vars[1].reason, Some(restored.clauses[0]));
    assert_eq!(restored.learnts.len(), 1);

    let payload = restored.proof.as_ref().unwrap().original_clauses[0]
        .payload
        .as_ref()
        .unwrap();
    let proposition = payload.downcast_ref::<StandardProposition>().unwrap();
    assert_eq!(proposition.description, "x => y");
    // restored into the same caching factory
    assert!(proposition.formula.ptr_eq(&rule));
}

proptest! {
    #[test]
    fn formulas_via_compressed_stream(
        recipe in formula_recipe(1..6usize, 1..40usize, 1..4usize),
        compress in prop::bool::ANY,
    ) {
        let mut f = FormulaFactory::caching();
        let formulas = recipe.build(&mut f);

        let mut buf = vec![];
        flatsat::container::write_to_stream(&mut buf, &Container::from_formulas(&formulas), compress)
            .unwrap();
        let container = flatsat::container::read_from_stream(&buf[..]).unwrap();

        let mut g = FormulaFactory::non_caching();
        prop_assert_eq!(container.formulas(&mut g).unwrap(), formulas);
    }
}
