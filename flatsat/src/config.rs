//! Engine configuration persisted with every snapshot.
use std::io::{self, BufRead, Write};

use serde::Deserialize;

use flatsat_internal_codec::{
    read_bool, read_f64, read_i32, read_u64, write_bool, write_f64, write_i32, write_u64,
    CodecError,
};
use flatsat_macros::{ConfigUpdate, DocDefault};

/// How formulas are turned into clauses when added to the engine.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CnfMethod {
    FactoryCnf,
    PgOnSolver,
    FullPgOnSolver,
}

impl Default for CnfMethod {
    fn default() -> CnfMethod {
        CnfMethod::PgOnSolver
    }
}

/// Minimization applied to learned clauses.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseMinimization {
    None,
    Basic,
    Deep,
}

impl Default for ClauseMinimization {
    fn default() -> ClauseMinimization {
        ClauseMinimization::Deep
    }
}

/// Configurable parameters of the engine.
#[derive(DocDefault, ConfigUpdate, Clone, PartialEq, Debug)]
pub struct SolverConfig {
    /// Record original clauses and their propositions for unsat core computation. (Default: false)
    pub proof_generation: bool,

    /// Use dedicated at-most clauses for cardinality constraints. (Default: false)
    pub use_at_most_clauses: bool,

    /// CNF transformation: factory_cnf, pg_on_solver or full_pg_on_solver.
    /// (Default: CnfMethod::PgOnSolver)
    pub cnf_method: CnfMethod,

    /// Learned clause minimization: none, basic or deep. (Default: ClauseMinimization::Deep)
    pub clause_minimization: ClauseMinimization,

    /// Initial phase of new variables. (Default: false)
    pub initial_phase: bool,

    /// Multiplicative decay of variable activities. (Default: 0.95)
    pub var_decay: f64,

    /// Initial variable activity increment. (Default: 1.0)
    pub var_inc: f64,

    /// Number of conflicts before the first restart. (Default: 100)
    pub restart_first: i32,

    /// Growth factor of the restart interval. (Default: 2.0)
    pub restart_inc: f64,

    /// Multiplicative decay of clause activities. (Default: 0.999)
    pub clause_decay: f64,

    /// Minimal LBD of learned clauses that are minimized with binary clauses. (Default: 6)
    pub lb_lbd_minimizing_clause: i32,

    /// LBD below which learned clauses are protected from the next reduction. (Default: 30)
    pub lb_lbd_frozen_clause: i32,

    /// Minimal size of learned clauses that are minimized with binary clauses. (Default: 30)
    pub lb_size_minimizing_clause: i32,

    /// Number of conflicts before the first clause database reduction. (Default: 2000)
    pub first_reduce_db: i32,

    /// Special increment of the reduction interval. (Default: 1000)
    pub special_inc_reduce_db: i32,

    /// Increment of the reduction interval. (Default: 300)
    pub inc_reduce_db: i32,

    /// Factor for the restart postponing heuristic. (Default: 0.8)
    pub factor_k: f64,

    /// Factor for the restart blocking heuristic. (Default: 1.4)
    pub factor_r: f64,

    /// Size of the moving average queue of learned clause LBDs. (Default: 50)
    pub size_lbd_queue: i32,

    /// Size of the moving average queue of trail sizes. (Default: 5000)
    pub size_trail_queue: i32,

    /// Reduce learned clauses by size instead of LBD. (Default: false)
    pub reduce_on_size: bool,

    /// Size limit used when reducing by size. (Default: 12)
    pub reduce_on_size_size: i32,

    /// Upper bound for the variable activity decay. (Default: 0.95)
    pub max_var_decay: f64,
}

fn cnf_method_code(method: CnfMethod) -> u64 {
    match method {
        CnfMethod::FactoryCnf => 0,
        CnfMethod::PgOnSolver => 1,
        CnfMethod::FullPgOnSolver => 2,
    }
}

fn clause_minimization_code(minimization: ClauseMinimization) -> u64 {
    match minimization {
        ClauseMinimization::None => 0,
        ClauseMinimization::Basic => 1,
        ClauseMinimization::Deep => 2,
    }
}

pub(crate) fn write_config(target: &mut impl Write, config: &SolverConfig) -> io::Result<()> {
    write_bool(&mut *target, config.proof_generation)?;
    write_bool(&mut *target, config.use_at_most_clauses)?;
    write_u64(&mut *target, cnf_method_code(config.cnf_method))?;
    write_u64(
        &mut *target,
        clause_minimization_code(config.clause_minimization),
    )?;
    write_bool(&mut *target, config.initial_phase)?;

    write_f64(&mut *target, config.var_decay)?;
    write_f64(&mut *target, config.var_inc)?;
    write_i32(&mut *target, config.restart_first)?;
    write_f64(&mut *target, config.restart_inc)?;
    write_f64(&mut *target, config.clause_decay)?;

    write_i32(&mut *target, config.lb_lbd_minimizing_clause)?;
    write_i32(&mut *target, config.lb_lbd_frozen_clause)?;
    write_i32(&mut *target, config.lb_size_minimizing_clause)?;
    write_i32(&mut *target, config.first_reduce_db)?;
    write_i32(&mut *target, config.special_inc_reduce_db)?;
    write_i32(&mut *target, config.inc_reduce_db)?;
    write_f64(&mut *target, config.factor_k)?;
    write_f64(&mut *target, config.factor_r)?;
    write_i32(&mut *target, config.size_lbd_queue)?;
    write_i32(&mut *target, config.size_trail_queue)?;
    write_bool(&mut *target, config.reduce_on_size)?;
    write_i32(&mut *target, config.reduce_on_size_size)?;
    write_f64(&mut *target, config.max_var_decay)?;
    Ok(())
}

pub(crate) fn read_config(source: &mut impl BufRead) -> Result<SolverConfig, CodecError> {
    let proof_generation = read_bool(&mut *source)?;
    let use_at_most_clauses = read_bool(&mut *source)?;
    let cnf_method = match read_u64(&mut *source)? {
        0 => CnfMethod::FactoryCnf,
        1 => CnfMethod::PgOnSolver,
        2 => CnfMethod::FullPgOnSolver,
        code => return Err(CodecError::Invalid(format!("unknown CNF method {}", code))),
    };
    let clause_minimization = match read_u64(&mut *source)? {
        0 => ClauseMinimization::None,
        1 => ClauseMinimization::Basic,
        2 => ClauseMinimization::Deep,
        code => {
            return Err(CodecError::Invalid(format!(
                "unknown clause minimization {}",
                code
            )))
        }
    };

    Ok(SolverConfig {
        proof_generation,
        use_at_most_clauses,
        cnf_method,
        clause_minimization,
        initial_phase: read_bool(&mut *source)?,

        var_decay: read_f64(&mut *source)?,
        var_inc: read_f64(&mut *source)?,
        restart_first: read_i32(&mut *source)?,
        restart_inc: read_f64(&mut *source)?,
        clause_decay: read_f64(&mut *source)?,

        lb_lbd_minimizing_clause: read_i32(&mut *source)?,
        lb_lbd_frozen_clause: read_i32(&mut *source)?,
        lb_size_minimizing_clause: read_i32(&mut *source)?,
        first_reduce_db: read_i32(&mut *source)?,
        special_inc_reduce_db: read_i32(&mut *source)?,
        inc_reduce_db: read_i32(&mut *source)?,
        factor_k: read_f64(&mut *source)?,
        factor_r: read_f64(&mut *source)?,
        size_lbd_queue: read_i32(&mut *source)?,
        size_trail_queue: read_i32(&mut *source)?,
        reduce_on_size: read_bool(&mut *source)?,
        reduce_on_size_size: read_i32(&mut *source)?,
        max_var_decay: read_f64(&mut *source)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_docs() {
        let config = SolverConfig::default();
        assert_eq!(config.cnf_method, CnfMethod::PgOnSolver);
        assert_eq!(config.clause_minimization, ClauseMinimization::Deep);
        assert_eq!(config.var_decay, 0.95);
        assert_eq!(config.restart_first, 100);
        assert_eq!(config.size_trail_queue, 5000);
        assert!(!config.proof_generation);
    }

    #[test]
    fn merge_and_apply_updates() {
        let mut update = SolverConfigUpdate::new();
        update.merge(toml::from_str("proof_generation = true\nrestart_first = 50").unwrap());
        update.merge(toml::from_str("restart_first = 70\ncnf_method = \"factory_cnf\"").unwrap());

        let mut config = SolverConfig::default();
        update.apply(&mut config);

        assert!(config.proof_generation);
        assert_eq!(config.restart_first, 70);
        assert_eq!(config.cnf_method, CnfMethod::FactoryCnf);
        assert_eq!(config.var_decay, 0.95);
    }

    #[test]
    fn unknown_options_are_rejected() {
        assert!(toml::from_str::<SolverConfigUpdate>("restart_frist = 70").is_err());
    }

    #[test]
    fn help_lists_options() {
        let help = SolverConfig::help();
        assert!(help.contains("restart_first: i32"));
        assert!(help.contains("(Default: 0.999)"));
    }

    #[test]
    fn codec_keeps_all_fields() {
        let mut config = SolverConfig::default();
        config.proof_generation = true;
        config.clause_minimization = ClauseMinimization::None;
        config.factor_r = 1.75;
        config.reduce_on_size_size = -3;

        let mut buf = vec![];
        write_config(&mut buf, &config).unwrap();
        let decoded = read_config(&mut &buf[..]).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn unknown_enum_code() {
        let mut buf = vec![];
        write_config(&mut buf, &SolverConfig::default()).unwrap();
        // third byte holds the CNF method
        buf[2] = 7;
        assert!(read_config(&mut &buf[..]).is_err());
    }
}
