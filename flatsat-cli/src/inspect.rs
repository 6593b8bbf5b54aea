use std::collections::BTreeMap;

use anyhow::Error;
use clap::{App, ArgMatches, SubCommand};

use flatsat::container::Container;
use flatsat::graph::ExpressionGraph;
use flatsat::pool::{SerializedSnapshot, NO_CLAUSE};
use flatsat::proposition::{PropositionRecord, SerializedPropositions};
use flatsat::FormulaFactory;

use super::read_input;

pub fn inspect_args() -> App<'static, 'static> {
    SubCommand::with_name("inspect")
        .about("Print a summary of a container")
        .arg_from_usage("[INPUT] 'The container to inspect (stdin if omitted)'")
        .arg_from_usage("--roots 'Also print every root formula'")
}

pub fn inspect_main(matches: &ArgMatches) -> Result<i32, Error> {
    let container = read_input(matches.value_of("INPUT"))?;
    let print_roots = matches.is_present("roots");

    println!("kind: {}", container.kind().name());
    match &container {
        Container::Formulas(graph) => {
            print_graph(graph);
            if print_roots {
                print_formulas(&container)?;
            }
        }
        Container::Propositions(propositions) => {
            print_propositions(propositions);
            if print_roots {
                print_proposition_formulas(propositions)?;
            }
        }
        Container::Snapshot(snapshot) => print_snapshot(snapshot),
    }

    Ok(0)
}

fn print_graph(graph: &ExpressionGraph) {
    let mut by_kind = BTreeMap::new();
    for node in &graph.nodes {
        *by_kind.entry(node.kind()).or_insert(0usize) += 1;
    }

    println!("nodes: {}", graph.len());
    for (kind, count) in by_kind {
        println!("  {}: {}", kind, count);
    }
    println!("roots: {}", graph.roots.len());
}

fn print_formulas(container: &Container) -> Result<(), Error> {
    let mut factory = FormulaFactory::caching();
    for (index, formula) in container.formulas(&mut factory)?.iter().enumerate() {
        println!("[{}] {}", index, formula);
    }
    Ok(())
}

fn print_propositions(propositions: &SerializedPropositions) {
    let standard = propositions
        .entries
        .iter()
        .filter(|entry| match entry {
            PropositionRecord::Standard { .. } => true,
            PropositionRecord::Extended { .. } => false,
        })
        .count();

    println!("propositions: {}", propositions.entries.len());
    println!("  standard: {}", standard);
    println!("  extended: {}", propositions.entries.len() - standard);
    print_graph(&propositions.graph);
}

fn print_proposition_formulas(propositions: &SerializedPropositions) -> Result<(), Error> {
    let mut factory = FormulaFactory::caching();
    let formulas = flatsat::graph::deserialize(&mut factory, &propositions.graph)?;
    for (index, (entry, formula)) in propositions.entries.iter().zip(formulas).enumerate() {
        match entry {
            PropositionRecord::Standard { description } => {
                println!("[{}] {:?}: {}", index, description, formula)
            }
            PropositionRecord::Extended { backpack } => println!(
                "[{}] payload tag {} ({} bytes): {}",
                index,
                backpack.tag,
                backpack.bytes.len(),
                formula
            ),
        }
    }
    Ok(())
}

fn print_snapshot(snapshot: &SerializedSnapshot) {
    let watchers: usize = snapshot.watches.iter().map(|list| list.len()).sum();
    let binary_watchers: usize = snapshot.binary_watches.iter().map(|list| list.len()).sum();
    let reasons = snapshot
        .vars
        .iter()
        .filter(|var| var.reason != NO_CLAUSE)
        .count();

    let result = match snapshot.wrapper.result {
        Some(true) => "satisfiable",
        Some(false) => "unsatisfiable",
        None => "unknown",
    };

    println!("result: {}", result);
    println!(
        "variables: {} ({} named)",
        snapshot.vars.len(),
        snapshot.names.len()
    );
    println!("clauses: {}", snapshot.clause_count);
    println!("learnts: {}", snapshot.learnt_count());
    println!("watchers: {} long, {} binary", watchers, binary_watchers);
    println!(
        "trail: {} literals, decision level {}, {} with reason",
        snapshot.trail.lits.len(),
        snapshot.trail.decision_level(),
        reasons
    );
    println!("conflicts: {}", snapshot.search.conflicts);
    println!("assumptions: {}", snapshot.assumptions.len());
    if let Some(proof) = &snapshot.proof {
        println!(
            "proof: {} original clauses, {} steps",
            proof.original_clauses.len(),
            proof.pg_proof.len()
        );
    }
    if let Some(backbone) = &snapshot.backbone {
        println!(
            "backbone: {} candidates, {} decided variables",
            backbone.candidates.len(),
            backbone.map.len()
        );
    }
    println!("valid states: {:?}", snapshot.incremental.valid_states);
}
