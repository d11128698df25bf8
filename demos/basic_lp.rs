//! Basic Linear Programming Example
//!
//! maximize    c'x
//! subject to  Ax <= b, x >= 0

use cvxcanon::prelude::*;
use nalgebra::DMatrix;

fn main() -> Result<()> {
    println!("=== Basic Linear Program ===\n");

    println!("Problem: Maximize 3*x1 + 2*x2 + 5*x3");
    println!("Subject to:");
    println!("  2*x1 + x2 + 3*x3 <= 100");
    println!("  x1 + 2*x2 + x3 <= 80");
    println!("  x >= 0\n");

    let mut g = ExprGraph::new();
    let x = g.named_variable(3, "x");

    let c = g.constant(vec![3.0, 2.0, 5.0]);
    #[rustfmt::skip]
    let a = g.constant(DMatrix::from_row_slice(2, 3, &[
        2.0, 1.0, 3.0,
        1.0, 2.0, 1.0,
    ]));
    let b = g.constant(vec![100.0, 80.0]);
    let zero = g.constant(0.0);

    let profit = g.dot(c, x)?;
    let usage = g.matmul(a, x)?;

    println!("Solving...");
    let solution = Problem::maximize(profit)
        .subject_to([usage.leq(b), x.geq(zero)])
        .build(g)?
        .solve()?;

    println!("\nResults:");
    println!("  Status: {}", solution.status);
    if let Some(value) = solution.value {
        println!("  Optimal profit: {:.4}", value);
    }
    let x_val = solution.vector(x)?;
    for i in 0..3 {
        println!("  x{} = {:.4}", i + 1, x_val[i]);
    }
    println!("  Solver: {} iterations", solution.stats.iterations);
    Ok(())
}
