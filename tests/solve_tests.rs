//! End-to-end solve tests for all atoms.
//!
//! Test cases are defined as data and run programmatically: each builds a
//! problem over its own graph and states the known optimal value.

use std::sync::Mutex;

use approx::assert_abs_diff_eq;
use cvxcanon::prelude::*;
use cvxcanon::solver::{ConeProgram, RawSolution, SolveStats};
use nalgebra::DMatrix;

/// Tolerance for comparing floating point results
const TOL: f64 = 1e-4;

/// A test case definition
struct TestCase {
    name: &'static str,
    /// Builds the problem and returns (problem, expected_value)
    build: fn() -> (Problem, f64),
}

/// All minimize test cases
fn minimize_test_cases() -> Vec<TestCase> {
    vec![
        // ========== Linear Programs ==========
        TestCase {
            name: "sum_nonneg_constraint",
            build: || {
                // minimize sum(x) s.t. x >= 1, x in R^5
                let mut g = ExprGraph::new();
                let x = g.variable(5);
                let one = g.constant(1.0);
                let obj = g.sum(x).unwrap();
                let prob = Problem::minimize(obj)
                    .subject_to([x.geq(one)])
                    .build(g)
                    .unwrap();
                (prob, 5.0)
            },
        },
        TestCase {
            name: "sum_equality_constraint",
            build: || {
                // minimize sum(x) s.t. x == 2, x in R^3
                let mut g = ExprGraph::new();
                let x = g.variable(3);
                let two = g.constant(2.0);
                let obj = g.sum(x).unwrap();
                let prob = Problem::minimize(obj)
                    .subject_to([x.equals(two)])
                    .build(g)
                    .unwrap();
                (prob, 6.0)
            },
        },
        TestCase {
            name: "sum_upper_bound",
            build: || {
                // minimize -sum(x) s.t. x <= 3, x in R^4
                let mut g = ExprGraph::new();
                let x = g.variable(4);
                let three = g.constant(3.0);
                let s = g.sum(x).unwrap();
                let obj = g.neg(s).unwrap();
                let prob = Problem::minimize(obj)
                    .subject_to([x.leq(three)])
                    .build(g)
                    .unwrap();
                (prob, -12.0)
            },
        },
        TestCase {
            name: "weighted_sum",
            build: || {
                // minimize 2x + 3y s.t. x >= 1, y >= 2
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let y = g.variable(());
                let two_x = g.scale(2.0, x).unwrap();
                let three_y = g.scale(3.0, y).unwrap();
                let obj = g.add(two_x, three_y).unwrap();
                let one = g.constant(1.0);
                let two = g.constant(2.0);
                let prob = Problem::minimize(obj)
                    .subject_to([x.geq(one), y.geq(two)])
                    .build(g)
                    .unwrap();
                (prob, 8.0)
            },
        },
        // ========== Piecewise linear ==========
        TestCase {
            name: "abs_upper_bound",
            build: || {
                // minimize |x| s.t. x <= -3
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.abs(x).unwrap();
                let bound = g.constant(-3.0);
                let prob = Problem::minimize(obj)
                    .constraint(x.leq(bound))
                    .build(g)
                    .unwrap();
                (prob, 3.0)
            },
        },
        TestCase {
            name: "pos_lower_bound",
            build: || {
                // minimize sum(pos(x)) s.t. x >= [1, -2]
                let mut g = ExprGraph::new();
                let x = g.variable(2);
                let p = g.pos(x).unwrap();
                let obj = g.sum(p).unwrap();
                let c = g.constant(vec![1.0, -2.0]);
                let prob = Problem::minimize(obj)
                    .constraint(x.geq(c))
                    .build(g)
                    .unwrap();
                (prob, 1.0)
            },
        },
        TestCase {
            name: "neg_part_upper_bound",
            build: || {
                // minimize sum(neg_part(x)) s.t. x <= -1, x in R^2
                let mut g = ExprGraph::new();
                let x = g.variable(2);
                let n = g.neg_part(x).unwrap();
                let obj = g.sum(n).unwrap();
                let bound = g.constant(-1.0);
                let prob = Problem::minimize(obj)
                    .constraint(x.leq(bound))
                    .build(g)
                    .unwrap();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "maximum_of_two",
            build: || {
                // minimize max(x, y) s.t. x + y == 4
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let y = g.variable(());
                let obj = g.maximum(&[x, y]).unwrap();
                let s = g.add(x, y).unwrap();
                let four = g.constant(4.0);
                let prob = Problem::minimize(obj)
                    .constraint(s.equals(four))
                    .build(g)
                    .unwrap();
                (prob, 2.0)
            },
        },
        // ========== Norms ==========
        TestCase {
            name: "norm1_shifted",
            build: || {
                // minimize ||x - c||_1 s.t. sum(x) == 0, c = [1, -2, 3]
                let mut g = ExprGraph::new();
                let x = g.variable(3);
                let c = g.constant(vec![1.0, -2.0, 3.0]);
                let r = g.sub(x, c).unwrap();
                let obj = g.norm1(r).unwrap();
                let s = g.sum(x).unwrap();
                let zero = g.constant(0.0);
                let prob = Problem::minimize(obj)
                    .constraint(s.equals(zero))
                    .build(g)
                    .unwrap();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "norm2_equality",
            build: || {
                // minimize ||x||_2 s.t. sum(x) == 5, x in R^5
                let mut g = ExprGraph::new();
                let x = g.variable(5);
                let obj = g.norm2(x).unwrap();
                let s = g.sum(x).unwrap();
                let five = g.constant(5.0);
                let prob = Problem::minimize(obj)
                    .constraint(s.equals(five))
                    .build(g)
                    .unwrap();
                (prob, 5.0_f64.sqrt())
            },
        },
        TestCase {
            name: "norm_inf_equality",
            build: || {
                // minimize ||x||_inf s.t. sum(x) == 6, x in R^3
                let mut g = ExprGraph::new();
                let x = g.variable(3);
                let obj = g.norm_inf(x).unwrap();
                let s = g.sum(x).unwrap();
                let six = g.constant(6.0);
                let prob = Problem::minimize(obj)
                    .constraint(s.equals(six))
                    .build(g)
                    .unwrap();
                (prob, 2.0)
            },
        },
        // ========== Quadratics ==========
        TestCase {
            name: "sum_squares_projection",
            build: || {
                // minimize ||x - c||^2 s.t. sum(x) == 0, c = [1, 2, 3]
                // x = c - 2, every residual is -2
                let mut g = ExprGraph::new();
                let x = g.variable(3);
                let c = g.constant(vec![1.0, 2.0, 3.0]);
                let r = g.sub(x, c).unwrap();
                let obj = g.sum_squares(r).unwrap();
                let s = g.sum(x).unwrap();
                let zero = g.constant(0.0);
                let prob = Problem::minimize(obj)
                    .constraint(s.equals(zero))
                    .build(g)
                    .unwrap();
                (prob, 12.0)
            },
        },
        TestCase {
            name: "quad_over_lin",
            build: || {
                // minimize x^2 / y s.t. x == 2, y <= 4
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let y = g.variable(());
                let obj = g.quad_over_lin(x, y).unwrap();
                let two = g.constant(2.0);
                let four = g.constant(4.0);
                let prob = Problem::minimize(obj)
                    .subject_to([x.equals(two), y.leq(four)])
                    .build(g)
                    .unwrap();
                (prob, 1.0)
            },
        },
        TestCase {
            name: "quad_form_psd",
            build: || {
                // minimize 2a^2 + b^2 s.t. a + b == 3: a = 1, b = 2
                let mut g = ExprGraph::new();
                let x = g.variable(2);
                let p = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]);
                let obj = g.quad_form(x, p).unwrap();
                let s = g.sum(x).unwrap();
                let three = g.constant(3.0);
                let prob = Problem::minimize(obj)
                    .constraint(s.equals(three))
                    .build(g)
                    .unwrap();
                (prob, 6.0)
            },
        },
        // ========== Exponential and power cones ==========
        TestCase {
            name: "exp_lower_bound",
            build: || {
                // minimize exp(x) s.t. x >= 0
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.exp(x).unwrap();
                let zero = g.constant(0.0);
                let prob = Problem::minimize(obj)
                    .constraint(x.geq(zero))
                    .build(g)
                    .unwrap();
                (prob, 1.0)
            },
        },
        TestCase {
            name: "square_lower_bound",
            build: || {
                // minimize x^2 s.t. x >= 3
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.square(x).unwrap();
                let three = g.constant(3.0);
                let prob = Problem::minimize(obj)
                    .constraint(x.geq(three))
                    .build(g)
                    .unwrap();
                (prob, 9.0)
            },
        },
        TestCase {
            name: "inverse_upper_bound",
            build: || {
                // minimize 1/x s.t. x <= 2
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.power(x, -1.0).unwrap();
                let two = g.constant(2.0);
                let prob = Problem::minimize(obj)
                    .constraint(x.leq(two))
                    .build(g)
                    .unwrap();
                (prob, 0.5)
            },
        },
    ]
}

/// All maximize test cases
fn maximize_test_cases() -> Vec<TestCase> {
    vec![
        TestCase {
            name: "log_upper_bound",
            build: || {
                // maximize log(x) s.t. x <= 2
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.log(x).unwrap();
                let two = g.constant(2.0);
                let prob = Problem::maximize(obj)
                    .constraint(x.leq(two))
                    .build(g)
                    .unwrap();
                (prob, 2.0_f64.ln())
            },
        },
        TestCase {
            name: "sqrt_upper_bound",
            build: || {
                // maximize sqrt(x) s.t. x <= 9
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.sqrt(x).unwrap();
                let nine = g.constant(9.0);
                let prob = Problem::maximize(obj)
                    .constraint(x.leq(nine))
                    .build(g)
                    .unwrap();
                (prob, 3.0)
            },
        },
        TestCase {
            name: "entropy_unconstrained",
            build: || {
                // maximize -x log x: x = 1/e
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let obj = g.entropy(x).unwrap();
                let prob = Problem::maximize(obj).build(g).unwrap();
                (prob, (-1.0_f64).exp())
            },
        },
        TestCase {
            name: "minimum_of_two",
            build: || {
                // maximize min(x, y) s.t. x + y == 4
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let y = g.variable(());
                let obj = g.minimum(&[x, y]).unwrap();
                let s = g.add(x, y).unwrap();
                let four = g.constant(4.0);
                let prob = Problem::maximize(obj)
                    .constraint(s.equals(four))
                    .build(g)
                    .unwrap();
                (prob, 2.0)
            },
        },
        TestCase {
            name: "quad_form_nsd",
            build: || {
                // maximize -(a^2 + b^2) s.t. a + b == 2
                let mut g = ExprGraph::new();
                let x = g.variable(2);
                let p = -DMatrix::<f64>::identity(2, 2);
                let obj = g.quad_form(x, p).unwrap();
                let s = g.sum(x).unwrap();
                let two = g.constant(2.0);
                let prob = Problem::maximize(obj)
                    .constraint(s.equals(two))
                    .build(g)
                    .unwrap();
                (prob, -2.0)
            },
        },
        TestCase {
            name: "exp_constraint",
            build: || {
                // maximize x s.t. exp(x) <= 5
                let mut g = ExprGraph::new();
                let x = g.variable(());
                let e = g.exp(x).unwrap();
                let five = g.constant(5.0);
                let prob = Problem::maximize(x)
                    .constraint(e.leq(five))
                    .build(g)
                    .unwrap();
                (prob, 5.0_f64.ln())
            },
        },
        TestCase {
            name: "linear_maximize",
            build: || {
                // maximize sum(x) s.t. x <= 3, x in R^2
                let mut g = ExprGraph::new();
                let x = g.variable(2);
                let obj = g.sum(x).unwrap();
                let three = g.constant(3.0);
                let prob = Problem::maximize(obj)
                    .constraint(x.leq(three))
                    .build(g)
                    .unwrap();
                (prob, 6.0)
            },
        },
    ]
}

fn infeasible_test_cases() -> Vec<(&'static str, Problem)> {
    let lp = {
        // x >= 1 and x <= 0
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let one = g.constant(1.0);
        let zero = g.constant(0.0);
        Problem::minimize(x)
            .subject_to([x.geq(one), x.leq(zero)])
            .build(g)
            .unwrap()
    };
    let socp = {
        // ||x||_2 <= -1
        let mut g = ExprGraph::new();
        let x = g.variable(3);
        let n = g.norm2(x).unwrap();
        let obj = g.sum(x).unwrap();
        let bound = g.constant(-1.0);
        Problem::minimize(obj)
            .constraint(n.leq(bound))
            .build(g)
            .unwrap()
    };
    vec![("contradictory_bounds", lp), ("negative_norm_bound", socp)]
}

fn unbounded_test_cases() -> Vec<(&'static str, Problem)> {
    let below = {
        // minimize sum(x) s.t. x <= 1
        let mut g = ExprGraph::new();
        let x = g.variable(3);
        let obj = g.sum(x).unwrap();
        let one = g.constant(1.0);
        Problem::minimize(obj)
            .constraint(x.leq(one))
            .build(g)
            .unwrap()
    };
    let above = {
        // maximize x s.t. x >= 0
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let zero = g.constant(0.0);
        Problem::maximize(x)
            .constraint(x.geq(zero))
            .build(g)
            .unwrap()
    };
    let free = {
        // no constraint rows at all
        let mut g = ExprGraph::new();
        let x = g.variable(2);
        let obj = g.sum(x).unwrap();
        Problem::minimize(obj).build(g).unwrap()
    };
    vec![
        ("lower_unbounded_lp", below),
        ("upper_unbounded_lp", above),
        ("no_constraints", free),
    ]
}

// ============================================================================
// Test runner
// ============================================================================

fn run_cases(cases: Vec<TestCase>) {
    for case in cases {
        let (prob, expected) = (case.build)();

        assert!(prob.is_dcp(), "Problem '{}' should be DCP", case.name);

        let result = prob.solve();
        assert!(result.is_ok(), "Problem '{}' should solve: {:?}", case.name, result.err());

        let solution = result.unwrap();
        assert_eq!(
            solution.status,
            SolveStatus::Optimal,
            "Problem '{}' should be optimal, got {:?}",
            case.name,
            solution.status
        );

        let value = solution.value.expect("should have value");
        let rel_err = (value - expected).abs() / (1.0 + expected.abs());
        assert!(
            rel_err < TOL,
            "Problem '{}': expected {}, got {} (rel_err={})",
            case.name,
            expected,
            value,
            rel_err
        );
    }
}

#[test]
fn test_minimize_atoms() {
    run_cases(minimize_test_cases());
}

#[test]
fn test_maximize_atoms() {
    run_cases(maximize_test_cases());
}

#[test]
fn test_infeasible() {
    for (name, prob) in infeasible_test_cases() {
        let solution = prob.solve().unwrap();
        assert_eq!(
            solution.status,
            SolveStatus::Infeasible,
            "Problem '{}' should be infeasible",
            name
        );
        assert!(solution.value.is_none());
    }
}

#[test]
fn test_unbounded() {
    for (name, prob) in unbounded_test_cases() {
        let solution = prob.solve().unwrap();
        assert_eq!(
            solution.status,
            SolveStatus::Unbounded,
            "Problem '{}' should be unbounded",
            name
        );
    }
}

// ============================================================================
// Solutions
// ============================================================================

#[test]
fn test_primal_values() {
    let mut g = ExprGraph::new();
    let x = g.variable(3);
    let obj = g.sum(x).unwrap();
    let lower = g.constant(vec![1.0, 2.0, 3.0]);
    let prob = Problem::minimize(obj)
        .constraint(x.geq(lower))
        .build(g)
        .unwrap();
    let solution = prob.solve().unwrap();

    let x_val = solution.vector(x).unwrap();
    assert_eq!(x_val.shape(), (3, 1));
    for (got, want) in x_val.iter().zip([1.0, 2.0, 3.0]) {
        assert_abs_diff_eq!(*got, want, epsilon = TOL);
    }
    // Only original variables are reported.
    assert_eq!(solution.primal.as_ref().map(|p| p.len()), Some(1));
}

#[test]
fn test_auxiliaries_are_not_reported() {
    let mut g = ExprGraph::new();
    let x = g.variable(2);
    let a = g.abs(x).unwrap();
    let obj = g.sum(a).unwrap();
    let one = g.constant(1.0);
    let s = g.sum(x).unwrap();
    let prob = Problem::minimize(obj)
        .constraint(s.equals(one))
        .build(g)
        .unwrap();
    let solution = prob.solve().unwrap();
    let primal = solution.primal.unwrap();
    assert_eq!(primal.keys().copied().collect::<Vec<_>>(), vec![x]);
}

#[test]
fn test_duals_of_active_and_inactive_constraints() {
    // minimize x s.t. x >= 1 (active), x <= 5 (inactive)
    let mut g = ExprGraph::new();
    let x = g.variable(());
    let one = g.constant(1.0);
    let five = g.constant(5.0);
    let prob = Problem::minimize(x)
        .subject_to([x.geq(one), x.leq(five)])
        .build(g)
        .unwrap();
    let solution = prob.solve().unwrap();

    let active = solution.constraint_dual(0).and_then(Array::as_scalar).unwrap();
    let inactive = solution.constraint_dual(1).and_then(Array::as_scalar).unwrap();
    assert_abs_diff_eq!(active, 1.0, epsilon = TOL);
    assert_abs_diff_eq!(inactive, 0.0, epsilon = TOL);
    assert_eq!(solution.duals().map(<[f64]>::len), Some(2));
}

#[test]
fn test_value_at_solution() {
    let mut g = ExprGraph::new();
    let x = g.variable(2);
    let p = ParameterBuilder::scalar().nonneg().value(1.0).build(&mut g).unwrap();
    let n = g.norm2(x).unwrap();
    let obj = g.mul(p, n).unwrap();
    let s = g.sum(x).unwrap();
    let two = g.constant(2.0);
    let mut prob = Problem::minimize(obj)
        .constraint(s.equals(two))
        .build(g)
        .unwrap();
    prob.set_parameter(p, 3.0).unwrap();

    let solution = prob.solve().unwrap();
    let value = solution.value.unwrap();
    assert_abs_diff_eq!(value, 3.0 * 2.0_f64.sqrt(), epsilon = TOL);
    // Uses the problem's parameter value, not the default.
    let at = prob.value_at(&solution, obj).unwrap();
    assert_abs_diff_eq!(at[(0, 0)], value, epsilon = TOL);
}

// ============================================================================
// Sign hints and parameters
// ============================================================================

#[test]
fn test_sign_hints_bound_variables() {
    let mut g = ExprGraph::new();
    let x = VariableBuilder::scalar().nonneg().build(&mut g);
    let prob = Problem::minimize(x).build(g).unwrap();
    let solution = prob.solve().unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(solution.value(x).unwrap(), 0.0, epsilon = TOL);

    let mut g = ExprGraph::new();
    let y = VariableBuilder::vector(2).nonpos().build(&mut g);
    let obj = g.sum(y).unwrap();
    let prob = Problem::maximize(obj).build(g).unwrap();
    let solution = prob.solve().unwrap();
    assert_abs_diff_eq!(solution.value.unwrap(), 0.0, epsilon = TOL);
}

#[test]
fn test_parameter_resolve_keeps_structure() {
    // minimize p * x s.t. x >= 1
    let mut g = ExprGraph::new();
    let x = g.variable(());
    let p = ParameterBuilder::scalar().nonneg().build(&mut g).unwrap();
    let obj = g.mul(p, x).unwrap();
    let one = g.constant(1.0);
    let mut prob = Problem::minimize(obj)
        .constraint(x.geq(one))
        .parameter(p, 2.0)
        .build(g)
        .unwrap();

    let first = prob.canonicalize().unwrap();
    assert_abs_diff_eq!(prob.solve().unwrap().value.unwrap(), 2.0, epsilon = TOL);

    prob.set_parameter(p, 5.0).unwrap();
    let second = prob.canonicalize().unwrap();
    assert_abs_diff_eq!(prob.solve().unwrap().value.unwrap(), 5.0, epsilon = TOL);

    assert_ne!(first.c, second.c);
    assert_eq!(first.cone_dims, second.cone_dims);
    assert_eq!(first.a.col_offsets(), second.a.col_offsets());
    assert_eq!(first.a.row_indices(), second.a.row_indices());
    assert_eq!(first.var_map, second.var_map);
}

#[test]
fn test_parameter_zeros_keep_sparsity_pattern() {
    // a' x <= 1 and (2a)' x >= -1 with a changing from [1, 2] to [1, 0].
    let mut g = ExprGraph::new();
    let x = VariableBuilder::vector(2).nonneg().build(&mut g);
    let a = g.parameter((1, 2));
    let ax = g.matmul(a, x).unwrap();
    let two = g.constant(2.0);
    let a2 = g.mul(two, a).unwrap();
    let a2x = g.matmul(a2, x).unwrap();
    let obj = g.sum(x).unwrap();
    let one = g.constant(1.0);
    let minus_one = g.constant(-1.0);
    let mut prob = Problem::minimize(obj)
        .subject_to([ax.leq(one), a2x.geq(minus_one)])
        .parameter(a, DMatrix::from_row_slice(1, 2, &[1.0, 2.0]))
        .build(g)
        .unwrap();

    let first = prob.canonicalize().unwrap();
    prob.set_parameter(a, DMatrix::from_row_slice(1, 2, &[1.0, 0.0]))
        .unwrap();
    let second = prob.canonicalize().unwrap();

    assert_eq!(first.a.nnz(), second.a.nnz());
    assert_eq!(first.a.col_offsets(), second.a.col_offsets());
    assert_eq!(first.a.row_indices(), second.a.row_indices());
    assert_ne!(first.a.values(), second.a.values());
    assert_eq!(prob.solve().unwrap().status, SolveStatus::Optimal);
}

#[test]
fn test_zero_times_unknown_subtree_solves() {
    // minimize x + 0 * (x * y) s.t. x >= 1
    let mut g = ExprGraph::new();
    let x = g.variable(());
    let y = g.variable(());
    let z = VariableBuilder::scalar().nonneg().build(&mut g);
    let xy = g.mul(x, y).unwrap();
    let zy = g.mul(z, y).unwrap();
    let zero = g.constant(0.0);
    let dead = g.mul(zero, xy).unwrap();
    let dead_z = g.mul(zero, zy).unwrap();
    let partial = g.add(x, dead).unwrap();
    let obj = g.add(partial, dead_z).unwrap();
    let one = g.constant(1.0);
    let prob = Problem::minimize(obj)
        .constraint(x.geq(one))
        .build(g)
        .unwrap();

    assert!(prob.is_dcp());
    let solution = prob.solve().unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(solution.value.unwrap(), 1.0, epsilon = TOL);
    assert_abs_diff_eq!(solution.value(x).unwrap(), 1.0, epsilon = TOL);
    // z only occurs under a folded product but keeps its sign hint.
    assert!(solution.value(z).unwrap() >= -TOL);
}

#[test]
fn test_canonicalization_is_deterministic() {
    let mut g = ExprGraph::new();
    let x = g.variable(3);
    let a = g.abs(x).unwrap();
    let n = g.norm2(a).unwrap();
    let e = g.exp(n).unwrap();
    let s = g.sum(x).unwrap();
    let one = g.constant(1.0);
    let prob = Problem::minimize(e)
        .constraint(s.equals(one))
        .build(g)
        .unwrap();

    assert_eq!(prob.canonicalize().unwrap(), prob.canonicalize().unwrap());
}

#[test]
fn test_not_dcp_is_refused() {
    let mut g = ExprGraph::new();
    let x = g.variable(3);
    let obj = g.norm2(x).unwrap();
    let prob = Problem::maximize(obj).build(g).unwrap();
    match prob.solve() {
        Err(CvxError::NotDcp(violations)) => assert_eq!(violations.len(), 1),
        other => panic!("expected NotDcp, got {:?}", other),
    }
}

#[test]
fn test_relaxed_solve_skips_dcp_gate() {
    // minimize |x| s.t. |x| >= 1 is not DCP; its relaxation shares the
    // epigraph of |x| and still attains 1.
    let mut g = ExprGraph::new();
    let x = g.variable(());
    let a = g.abs(x).unwrap();
    let one = g.constant(1.0);
    let prob = Problem::minimize(a)
        .constraint(a.geq(one))
        .build(g)
        .unwrap();

    assert!(matches!(prob.solve(), Err(CvxError::NotDcp(_))));
    let solution = prob.solve_relaxed().unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(solution.value.unwrap(), 1.0, epsilon = TOL);

    // Unknown curvature has no relaxation.
    let mut g = ExprGraph::new();
    let x = g.variable(());
    let y = g.variable(());
    let xy = g.mul(x, y).unwrap();
    let prob = Problem::minimize(xy).build(g).unwrap();
    assert!(matches!(
        prob.solve_relaxed(),
        Err(CvxError::Canonicalization(_))
    ));
}

// ============================================================================
// Backends and batches
// ============================================================================

#[test]
fn test_iteration_limit_is_unknown() {
    let mut g = ExprGraph::new();
    let x = g.variable(4);
    let obj = g.norm2(x).unwrap();
    let s = g.sum(x).unwrap();
    let one = g.constant(1.0);
    let prob = Problem::minimize(obj)
        .constraint(s.equals(one))
        .build(g)
        .unwrap();
    let settings = Settings {
        max_iter: 1,
        ..Settings::default()
    };
    let solution = prob.solve_with_settings(settings).unwrap();
    assert_eq!(solution.status, SolveStatus::Unknown);
    assert!(solution.primal.is_none());
}

/// Records the programs it is given and reports no progress.
#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<(usize, usize)>>,
}

impl ConeSolver for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn solve(&self, program: &ConeProgram) -> Result<RawSolution> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((program.num_vars(), program.num_rows()));
        }
        Ok(RawSolution {
            status: SolveStatus::Unknown,
            x: vec![0.0; program.num_vars()],
            z: vec![0.0; program.num_rows()],
            stats: SolveStats::default(),
        })
    }
}

#[test]
fn test_custom_backend() {
    let mut g = ExprGraph::new();
    let x = g.variable(2);
    let obj = g.norm2(x).unwrap();
    let prob = Problem::minimize(obj).build(g).unwrap();

    let backend = Recording::default();
    let solution = prob.solve_with(&backend).unwrap();
    assert_eq!(solution.status, SolveStatus::Unknown);
    // x plus the epigraph variable; one SOC of dimension 3.
    assert_eq!(backend.seen.lock().unwrap().as_slice(), &[(3, 3)]);
}

#[test]
fn test_solve_batch_preserves_order() {
    let problems: Vec<Problem> = (1..=4)
        .map(|k| {
            let mut g = ExprGraph::new();
            let x = g.variable(2);
            let obj = g.sum(x).unwrap();
            let lower = g.constant(k as f64);
            Problem::minimize(obj)
                .constraint(x.geq(lower))
                .build(g)
                .unwrap()
        })
        .collect();

    let results = solve_batch(&problems);
    assert_eq!(results.len(), 4);
    for (k, result) in (1..=4).zip(results) {
        let value = result.unwrap().value.unwrap();
        assert_abs_diff_eq!(value, 2.0 * k as f64, epsilon = TOL);
    }
}

#[test]
fn test_scalar_reference_scenarios() {
    let build = |bounds: &[(Relation, f64)]| {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let constraints: Vec<Constraint> = bounds
            .iter()
            .map(|&(relation, v)| {
                let c = g.constant(v);
                Constraint { lhs: x, relation, rhs: c }
            })
            .collect();
        let prob = Problem::minimize(x).subject_to(constraints).build(g).unwrap();
        (prob, x)
    };

    let (prob, x) = build(&[(Relation::Geq, 5.0)]);
    let solution = prob.solve().unwrap();
    assert_eq!(solution.status, SolveStatus::Optimal);
    assert_abs_diff_eq!(solution.value(x).unwrap(), 5.0, epsilon = TOL);
    assert_abs_diff_eq!(solution.value.unwrap(), 5.0, epsilon = TOL);

    let (prob, _) = build(&[(Relation::Geq, 5.0), (Relation::Leq, 1.0)]);
    assert_eq!(prob.solve().unwrap().status, SolveStatus::Infeasible);

    let (prob, _) = build(&[]);
    assert_eq!(prob.solve().unwrap().status, SolveStatus::Unbounded);
}
