//! Portfolio Optimization Example
//!
//! minimize    x' Σ x                (minimize risk)
//! subject to  μ' x >= target        (minimum return)
//!             sum(x) = 1            (fully invested)
//!             x >= 0                (long-only)
//!
//! The efficient frontier is traced by re-solving with a new `target`.

use cvxcanon::prelude::*;
use nalgebra::DMatrix;

fn main() -> Result<()> {
    println!("=== Portfolio Optimization ===\n");

    let mut g = ExprGraph::new();

    // 4 assets with different risk/return profiles
    let mu = g.constant(vec![0.12, 0.10, 0.07, 0.05]);

    // Covariance matrix (risk)
    #[rustfmt::skip]
    let sigma = DMatrix::from_row_slice(4, 4, &[
         0.04,  0.01,  0.00, -0.01,
         0.01,  0.03,  0.00,  0.00,
         0.00,  0.00,  0.02,  0.00,
        -0.01,  0.00,  0.00,  0.01,
    ]);

    println!("Assets: A, B, C, D");
    println!("Expected returns: [12%, 10%, 7%, 5%]");
    println!("Target return: 9%\n");

    let x = VariableBuilder::vector(4).name("weights").nonneg().build(&mut g);
    let target = ParameterBuilder::scalar().name("target").build(&mut g)?;
    let risk = g.quad_form(x, sigma)?;
    let expected_return = g.dot(mu, x)?;
    let total = g.sum(x)?;
    let one = g.constant(1.0);

    let mut problem = Problem::minimize(risk)
        .subject_to([expected_return.geq(target), total.equals(one)])
        .parameter(target, 0.09)
        .build(g)?;

    let solution = problem.solve()?;
    println!("Optimal Portfolio:");
    let portfolio = solution.vector(x)?;
    for (asset, weight) in ["A", "B", "C", "D"].iter().zip(portfolio.iter()) {
        println!("  Asset {}: {:.2}%", asset, weight * 100.0);
    }

    if let Some(variance) = solution.value {
        let std_dev = variance.sqrt();
        println!("\nPortfolio Statistics:");
        println!("  Expected return: 9.00%");
        println!("  Risk (std dev): {:.2}%", std_dev * 100.0);
        println!("  Sharpe ratio: {:.4}", 0.09 / std_dev);
    }

    println!("\n--- Efficient Frontier ---\n");
    for level in [0.06, 0.08, 0.10, 0.12] {
        problem.set_parameter(target, level)?;
        let point = problem.solve()?;
        match point.value {
            Some(variance) => println!(
                "  Return: {:.1}%  ->  Risk: {:.2}%",
                level * 100.0,
                variance.sqrt() * 100.0
            ),
            None => println!("  Return: {:.1}%  ->  {}", level * 100.0, point.status),
        }
    }

    println!("\nHigher returns require accepting higher risk!");
    Ok(())
}
