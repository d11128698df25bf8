//! Graph implementations of the nonlinear atoms.
//!
//! Each function receives the already-lowered arguments of one atom node and
//! returns an affine expression equal to the atom at optimality, adding the
//! auxiliary variables and cone constraints that make it so. The epigraph
//! variable `t` of a convex atom is bounded below; the hypograph variable of
//! a concave atom is bounded above.

use nalgebra::DMatrix;

use super::affine::arg;
use super::canonicalizer::{CanonContext, ConeConstraint};
use super::lin_expr::LinExpr;
use crate::atoms::nonlinear::exponent;
use crate::atoms::AtomKind;
use crate::dcp::{PsdStatus, PSD_TOLERANCE};
use crate::error::CanonicalizationError;
use crate::expr::Shape;
use crate::sparse::dense_to_csc;

type Expanded = Result<LinExpr, CanonicalizationError>;

// ============================================================================
// Piecewise-linear atoms
// ============================================================================

/// `|x|`: t >= x, t >= -x.
pub fn expand_abs(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(shape.clone());
    ctx.nonneg(t.sub(x));
    ctx.nonneg(t.add(x));
    Ok(t)
}

/// `max(x, 0)`: t >= x, t >= 0.
pub fn expand_pos(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(shape.clone());
    ctx.nonneg(t.sub(x));
    ctx.nonneg(t.clone());
    Ok(t)
}

/// `max(-x, 0)`: t >= -x, t >= 0.
pub fn expand_neg_part(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(shape.clone());
    ctx.nonneg(t.add(x));
    ctx.nonneg(t.clone());
    Ok(t)
}

pub fn expand_maximum(ctx: &mut CanonContext<'_>, _: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let t = ctx.new_aux(shape.clone());
    for x in args {
        ctx.nonneg(t.sub(x));
    }
    Ok(t)
}

pub fn expand_minimum(ctx: &mut CanonContext<'_>, _: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let t = ctx.new_aux(shape.clone());
    for x in args {
        ctx.nonneg(x.sub(&t));
    }
    Ok(t)
}

// ============================================================================
// Norms
// ============================================================================

/// `sum(abs(x))`.
pub fn expand_norm1(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let abs = ctx.expand(&AtomKind::Abs, std::slice::from_ref(x), &x.shape)?;
    Ok(abs.sum())
}

/// `||x||_2 <= t` as `(t, x)` in the second-order cone.
pub fn expand_norm2(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(Shape::scalar());
    ctx.push(ConeConstraint::SOC {
        t: t.clone(),
        x: x.reshape(Shape::vector(x.size())),
    });
    Ok(t)
}

/// Scalar t with t >= x_i and t >= -x_i for every entry.
pub fn expand_norm_inf(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(Shape::scalar());
    ctx.nonneg(t.sub(x));
    ctx.nonneg(t.add(x));
    Ok(t)
}

// ============================================================================
// Quadratics
// ============================================================================

/// `sum(x^2) / y <= t` as `(t + y, [2x; t - y])` in the second-order cone.
///
/// The cone membership also forces `t + y >= 0`, which together with the
/// bound implies `y >= 0`.
pub fn expand_quad_over_lin(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let y = arg(kind, args, 1)?;
    let t = ctx.new_aux(Shape::scalar());
    ctx.push(ConeConstraint::SOC {
        t: t.add(y),
        x: LinExpr::concat(&[x.scale(2.0), t.sub(y)]),
    });
    Ok(t)
}

/// `quad_over_lin(x, 1)`.
pub fn expand_sum_squares(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    ctx.expand(
        &AtomKind::QuadOverLin,
        &[x.clone(), LinExpr::scalar(1.0)],
        &Shape::scalar(),
    )
}

/// `x' P x` through the eigendecomposition `P = V diag(l) V'`.
///
/// For PSD `P` this is `sum_squares(F x)` with `F = diag(sqrt(l)) V'`
/// restricted to non-negligible eigenvalues; NSD `P` is handled by negating.
pub fn expand_quad_form(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], _: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let AtomKind::QuadForm(data) = kind else {
        return Err(CanonicalizationError::new(kind.name(), "not a quadratic form"));
    };
    let flip = match data.psd() {
        PsdStatus::Psd => 1.0,
        PsdStatus::Nsd => -1.0,
        PsdStatus::Neither => {
            return Err(CanonicalizationError::new(
                kind.name(),
                "matrix is neither positive nor negative semidefinite",
            ))
        }
    };

    let eig = data.matrix().clone().symmetric_eigen();
    let scale = eig.eigenvalues.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    let kept: Vec<usize> = (0..eig.eigenvalues.len())
        .filter(|&i| flip * eig.eigenvalues[i] > PSD_TOLERANCE * scale)
        .collect();
    if kept.is_empty() {
        return Ok(LinExpr::zeros(Shape::scalar()));
    }

    let n = data.dim();
    let mut factor = DMatrix::zeros(kept.len(), n);
    for (row, &i) in kept.iter().enumerate() {
        let root = (flip * eig.eigenvalues[i]).sqrt();
        for j in 0..n {
            factor[(row, j)] = root * eig.eigenvectors[(j, i)];
        }
    }
    let fx = x.transform(&dense_to_csc(&factor), Shape::vector(kept.len()));
    let squares = ctx.expand(&AtomKind::SumSquares, &[fx], &Shape::scalar())?;
    Ok(squares.scale(flip))
}

// ============================================================================
// Exponential cone
// ============================================================================

/// `exp(x_i) <= t_i` as `(x_i, 1, t_i)` in the exponential cone.
pub fn expand_exp(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(shape.clone());
    for i in 0..x.size() {
        ctx.push(ConeConstraint::ExpCone {
            x: x.entry(i),
            y: LinExpr::scalar(1.0),
            z: t.entry(i),
        });
    }
    Ok(t)
}

/// `t_i <= log(x_i)` as `(t_i, 1, x_i)` in the exponential cone.
pub fn expand_log(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(shape.clone());
    for i in 0..x.size() {
        ctx.push(ConeConstraint::ExpCone {
            x: t.entry(i),
            y: LinExpr::scalar(1.0),
            z: x.entry(i),
        });
    }
    Ok(t)
}

/// `t_i <= -x_i log x_i` as `(t_i, x_i, 1)` in the exponential cone.
pub fn expand_entropy(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let t = ctx.new_aux(shape.clone());
    for i in 0..x.size() {
        ctx.push(ConeConstraint::ExpCone {
            x: t.entry(i),
            y: x.entry(i),
            z: LinExpr::scalar(1.0),
        });
    }
    Ok(t)
}

// ============================================================================
// Power cone
// ============================================================================

/// Elementwise `x^p`, one power cone per entry.
///
/// - `p > 1`: `(t_i, 1, x_i)` in `K_pow(1/p)`, so `t_i >= |x_i|^p`.
/// - `0 < p < 1`: `(x_i, 1, t_i)` in `K_pow(p)`, so `t_i <= x_i^p`.
/// - `p < 0`: `(t_i, x_i, 1)` in `K_pow(1/(1-p))`, so `t_i >= x_i^p`.
pub fn expand_power(ctx: &mut CanonContext<'_>, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> Expanded {
    let x = arg(kind, args, 0)?;
    let p = exponent(kind);
    if p == 1.0 {
        return Ok(x.clone());
    }
    let t = ctx.new_aux(shape.clone());
    let one = LinExpr::scalar(1.0);
    for i in 0..x.size() {
        let (xi, ti) = (x.entry(i), t.entry(i));
        let cone = if p > 1.0 {
            ConeConstraint::PowerCone {
                x: ti,
                y: one.clone(),
                z: xi,
                alpha: 1.0 / p,
            }
        } else if p > 0.0 {
            ConeConstraint::PowerCone {
                x: xi,
                y: one.clone(),
                z: ti,
                alpha: p,
            }
        } else {
            ConeConstraint::PowerCone {
                x: ti,
                y: xi,
                z: one.clone(),
                alpha: 1.0 / (1.0 - p),
            }
        };
        ctx.push(cone);
    }
    Ok(t)
}
