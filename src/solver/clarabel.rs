//! Clarabel solver integration.
//!
//! This module provides the default [`ConeSolver`] backend, built on the
//! Clarabel interior-point solver. Cone programs have no quadratic term, so
//! Clarabel's `P` is always empty.

use clarabel::algebra::CscMatrix as ClarabelCsc;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use serde::{Deserialize, Serialize};

use super::stuffing::{ConeDims, ConeProgram};
use super::{ConeSolver, RawSolution, SolveStats, SolveStatus};
use crate::error::{CvxError, Result};

impl From<SolverStatus> for SolveStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            _ => SolveStatus::Unknown,
        }
    }
}

/// Solver settings.
///
/// Every field has a default, so partial configurations deserialize:
///
/// ```
/// let s: cvxcanon::solver::Settings = serde_json::from_str(r#"{"max_iter": 50}"#).unwrap();
/// assert_eq!(s.max_iter, 50);
/// assert!(!s.verbose);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Print solver output.
    pub verbose: bool,
    /// Maximum iterations.
    pub max_iter: u32,
    /// Time limit in seconds; `None` for no limit.
    pub time_limit: Option<f64>,
    /// Absolute duality gap tolerance.
    pub tol_gap_abs: f64,
    /// Relative duality gap tolerance.
    pub tol_gap_rel: f64,
    /// Feasibility tolerance.
    pub tol_feas: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            verbose: false,
            max_iter: 100,
            time_limit: None,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            tol_feas: 1e-8,
        }
    }
}

/// The Clarabel backend.
#[derive(Debug, Clone, Default)]
pub struct ClarabelSolver {
    pub settings: Settings,
}

impl ClarabelSolver {
    pub fn new(settings: Settings) -> Self {
        ClarabelSolver { settings }
    }
}

impl ConeSolver for ClarabelSolver {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, program: &ConeProgram) -> Result<RawSolution> {
        let n = program.num_vars();
        let p = ClarabelCsc::new(n, n, vec![0; n + 1], vec![], vec![]);
        let a = to_clarabel_csc(&program.a);
        let cones = to_clarabel_cones(&program.cone_dims);

        let settings = &self.settings;
        let clarabel_settings = DefaultSettingsBuilder::default()
            .verbose(settings.verbose)
            .max_iter(settings.max_iter)
            .time_limit(settings.time_limit.unwrap_or(f64::INFINITY))
            .tol_gap_abs(settings.tol_gap_abs)
            .tol_gap_rel(settings.tol_gap_rel)
            .tol_feas(settings.tol_feas)
            .build()
            .map_err(|e| CvxError::Solver(e.to_string()))?;

        let mut solver =
            DefaultSolver::new(&p, &program.c, &a, &program.b, &cones, clarabel_settings);
        solver.solve();

        Ok(RawSolution {
            status: solver.solution.status.into(),
            x: solver.solution.x.clone(),
            z: solver.solution.z.clone(),
            stats: SolveStats {
                iterations: solver.info.iterations,
                solve_time: solver.solution.solve_time,
            },
        })
    }
}

/// Convert nalgebra CSC to Clarabel CSC.
fn to_clarabel_csc(m: &nalgebra_sparse::CscMatrix<f64>) -> ClarabelCsc<f64> {
    ClarabelCsc::new(
        m.nrows(),
        m.ncols(),
        m.col_offsets().to_vec(),
        m.row_indices().to_vec(),
        m.values().to_vec(),
    )
}

/// Convert cone dimensions to Clarabel cones.
fn to_clarabel_cones(dims: &ConeDims) -> Vec<SupportedConeT<f64>> {
    let mut cones = Vec::new();

    if dims.zero > 0 {
        cones.push(SupportedConeT::ZeroConeT(dims.zero));
    }

    if dims.nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(dims.nonneg));
    }

    for &soc_dim in &dims.soc {
        cones.push(SupportedConeT::SecondOrderConeT(soc_dim));
    }

    for _ in 0..dims.exp {
        cones.push(SupportedConeT::ExponentialConeT());
    }

    for &alpha in &dims.power {
        cones.push(SupportedConeT::PowerConeT(alpha));
    }

    cones
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SolveStatus::from(SolverStatus::AlmostSolved), SolveStatus::Optimal);
        assert_eq!(
            SolveStatus::from(SolverStatus::AlmostPrimalInfeasible),
            SolveStatus::Infeasible
        );
        assert_eq!(SolveStatus::from(SolverStatus::DualInfeasible), SolveStatus::Unbounded);
        assert_eq!(SolveStatus::from(SolverStatus::MaxTime), SolveStatus::Unknown);
        assert_eq!(SolveStatus::from(SolverStatus::MaxIterations), SolveStatus::Unknown);
    }

    #[test]
    fn test_cone_list_order() {
        let dims = ConeDims {
            zero: 2,
            nonneg: 0,
            soc: vec![3],
            exp: 1,
            power: vec![0.5],
        };
        let cones = to_clarabel_cones(&dims);
        assert_eq!(cones.len(), 4);
        assert!(matches!(cones[0], SupportedConeT::ZeroConeT(2)));
        assert!(matches!(cones[3], SupportedConeT::PowerConeT(_)));
    }

    #[test]
    fn test_settings_round_trip() {
        let settings = Settings {
            max_iter: 250,
            time_limit: Some(1.5),
            ..Settings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
