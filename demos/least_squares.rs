//! Least Squares Regression Example
//!
//! minimize    ||Aw - b||_2^2
//!
//! solved once unconstrained and once with `w >= 0`.

use std::sync::Arc;

use cvxcanon::prelude::*;
use nalgebra::DMatrix;

fn main() -> Result<()> {
    println!("=== Least Squares Regression ===\n");

    let mut g = ExprGraph::new();

    // Fit a line y = w0 + w1*x to data
    #[rustfmt::skip]
    let a = g.constant(DMatrix::from_row_slice(5, 2, &[
        1.0, 1.0,
        1.0, 2.0,
        1.0, 3.0,
        1.0, 4.0,
        1.0, 5.0,
    ]));
    let b = g.constant(vec![3.1, 5.2, 6.8, 9.1, 10.9]);
    let w = g.variable(2);
    let fit = g.matmul(a, w)?;
    let residual = g.sub(fit, b)?;
    let loss = g.sum_squares(residual)?;
    let zero = g.constant(0.0);

    // Both problems share one graph.
    let g = Arc::new(g);

    println!("Fitting y = w0 + w1*x to 5 data points\n");
    println!("Solving unconstrained least squares...");
    let solution = Problem::minimize(loss).build(Arc::clone(&g))?.solve()?;
    report("Unconstrained", &solution, w)?;

    println!("\n--- Constrained Least Squares (w >= 0) ---\n");
    let solution = Problem::minimize(loss)
        .constraint(w.geq(zero))
        .build(g)?
        .solve()?;
    report("Constrained", &solution, w)?;
    Ok(())
}

fn report(label: &str, solution: &SolveResult, w: ExprId) -> Result<()> {
    println!("{} Results:", label);
    println!("  Status: {}", solution.status);
    if let Some(value) = solution.value {
        println!("  Optimal value: {:.6}", value);
    }
    let w_vals = solution.vector(w)?;
    println!("  w0 (intercept) = {:.6}", w_vals[0]);
    println!("  w1 (slope) = {:.6}", w_vals[1]);
    Ok(())
}
