//! LASSO (L1-Regularized Regression) Example
//!
//! minimize    ||Ax - b||_2^2 + lambda * ||x||_1
//!
//! `lambda` is a parameter, so the problem is built once and re-solved for
//! each regularization weight.

use cvxcanon::prelude::*;
use nalgebra::DMatrix;

fn main() -> Result<()> {
    println!("=== LASSO Regression ===\n");

    let mut g = ExprGraph::new();

    // Sparse regression problem: only 3 out of 10 coefficients are important
    #[rustfmt::skip]
    let a = g.constant(DMatrix::from_row_slice(6, 10, &[
        1.0, 0.5, 0.2, 0.8, 0.1, 0.3, 0.4, 0.6, 0.2, 0.1,
        0.8, 0.3, 0.1, 0.9, 0.2, 0.4, 0.3, 0.7, 0.1, 0.2,
        0.6, 0.4, 0.3, 0.7, 0.3, 0.2, 0.5, 0.5, 0.3, 0.3,
        0.9, 0.2, 0.4, 0.6, 0.1, 0.5, 0.2, 0.8, 0.4, 0.1,
        0.7, 0.6, 0.2, 0.5, 0.4, 0.1, 0.6, 0.4, 0.2, 0.4,
        0.5, 0.1, 0.5, 0.4, 0.2, 0.6, 0.1, 0.9, 0.1, 0.2,
    ]));

    // True model: y = 3*x1 + 2*x4 + 1*x8 (sparse!)
    let b = g.constant(vec![4.6, 4.9, 3.7, 4.7, 3.5, 3.2]);

    println!("Problem: Recover sparse coefficients (6 samples, 10 features)");
    println!("True model: y = 3*x1 + 2*x4 + 1*x8\n");

    let x = g.variable(10);
    let lambda = ParameterBuilder::scalar()
        .name("lambda")
        .nonneg()
        .build(&mut g)?;
    let fit = g.matmul(a, x)?;
    let residual = g.sub(fit, b)?;
    let loss = g.sum_squares(residual)?;
    let l1 = g.norm1(x)?;
    let penalty = g.mul(lambda, l1)?;
    let objective = g.add(loss, penalty)?;

    let mut problem = Problem::minimize(objective)
        .parameter(lambda, 0.0)
        .build(g)?;

    for weight in [0.0, 0.5, 1.0] {
        println!("--- lambda = {} ---\n", weight);
        problem.set_parameter(lambda, weight)?;
        let solution = problem.solve()?;
        let coefficients = solution.vector(x)?;
        println!("Coefficients:");
        for (i, val) in coefficients.iter().enumerate() {
            let marker = if weight > 0.0 && val.abs() > 0.1 { " <--" } else { "" };
            println!("  x{}: {:.6}{}", i + 1, val, marker);
        }
        if let Some(value) = solution.value {
            println!("  Objective: {:.6}\n", value);
        }
    }
    println!("Conclusion: LASSO identifies the sparse structure!");
    Ok(())
}
