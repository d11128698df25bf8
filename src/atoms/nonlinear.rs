//! Nonlinear atoms.
//!
//! These atoms have a definite curvature (convex or concave) and are only
//! accepted when the DCP composition rules certify their arguments. None of
//! them is a solver primitive: each one is rewritten by its graph
//! implementation in [`crate::canon::graph_impl`].

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use super::registry::*;
use super::{AtomKind, QuadFormData};
use crate::canon::graph_impl::{
    expand_abs, expand_entropy, expand_exp, expand_log, expand_maximum, expand_minimum,
    expand_neg_part, expand_norm1, expand_norm2, expand_norm_inf, expand_pos, expand_power,
    expand_quad_form, expand_quad_over_lin, expand_sum_squares,
};
use crate::dcp::{Curvature, Monotonicity, PsdStatus, Sign};
use crate::error::{ConstructionError, CvxError, Result};
use crate::expr::{ExprGraph, ExprId, Inferred, Shape};

// ============================================================================
// Elementwise piecewise-linear atoms
// ============================================================================

pub static ABS: AtomSpec = AtomSpec {
    name: "abs",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: by_arg_sign,
    },
    sign: positive,
    eval: |_, args, _| map_first(args, f64::abs),
    lowering: Lowering::Graph(expand_abs),
};

pub static POS: AtomSpec = AtomSpec {
    name: "pos",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: nondecreasing,
    },
    sign: positive,
    eval: |_, args, _| map_first(args, |v| v.max(0.0)),
    lowering: Lowering::Graph(expand_pos),
};

pub static NEG_PART: AtomSpec = AtomSpec {
    name: "neg_part",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: nonincreasing,
    },
    sign: positive,
    eval: |_, args, _| map_first(args, |v| (-v).max(0.0)),
    lowering: Lowering::Graph(expand_neg_part),
};

pub static MAXIMUM: AtomSpec = AtomSpec {
    name: "maximum",
    arity: Arity::AtLeast(1),
    shape: |_, shapes| broadcast_shapes("maximum", shapes),
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: nondecreasing,
    },
    sign: maximum_sign,
    eval: |_, args, shape| fold_elementwise(args, shape, f64::max),
    lowering: Lowering::Graph(expand_maximum),
};

pub static MINIMUM: AtomSpec = AtomSpec {
    name: "minimum",
    arity: Arity::AtLeast(1),
    shape: |_, shapes| broadcast_shapes("minimum", shapes),
    curvature: CurvatureRule::Composition {
        intrinsic: concave,
        monotonicity: nondecreasing,
    },
    sign: |kind, args| {
        let negated: Vec<Inferred> = args
            .iter()
            .map(|a| Inferred {
                sign: a.sign.negate(),
                ..*a
            })
            .collect();
        maximum_sign(kind, &negated).negate()
    },
    eval: |_, args, shape| fold_elementwise(args, shape, f64::min),
    lowering: Lowering::Graph(expand_minimum),
};

// ============================================================================
// Norms and quadratics
// ============================================================================

pub static NORM1: AtomSpec = AtomSpec {
    name: "norm1",
    arity: Arity::Fixed(1),
    shape: scalar_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: by_arg_sign,
    },
    sign: positive,
    eval: |_, args, _| scalar(args.first().map_or(0.0, |m| m.iter().map(|v| v.abs()).sum())),
    lowering: Lowering::Graph(expand_norm1),
};

pub static NORM2: AtomSpec = AtomSpec {
    name: "norm2",
    arity: Arity::Fixed(1),
    shape: scalar_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: by_arg_sign,
    },
    sign: positive,
    eval: |_, args, _| scalar(args.first().map_or(0.0, |m| m.norm())),
    lowering: Lowering::Graph(expand_norm2),
};

pub static NORM_INF: AtomSpec = AtomSpec {
    name: "norm_inf",
    arity: Arity::Fixed(1),
    shape: scalar_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: by_arg_sign,
    },
    sign: positive,
    eval: |_, args, _| scalar(args.first().map_or(0.0, |m| m.amax())),
    lowering: Lowering::Graph(expand_norm_inf),
};

pub static SUM_SQUARES: AtomSpec = AtomSpec {
    name: "sum_squares",
    arity: Arity::Fixed(1),
    shape: scalar_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: by_arg_sign,
    },
    sign: positive,
    eval: |_, args, _| scalar(args.first().map_or(0.0, |m| m.norm_squared())),
    lowering: Lowering::Graph(expand_sum_squares),
};

pub static QUAD_FORM: AtomSpec = AtomSpec {
    name: "quad_form",
    arity: Arity::Fixed(1),
    shape: quad_form_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: |kind| match kind {
            AtomKind::QuadForm(data) => data.psd().curvature(),
            _ => Curvature::Unknown,
        },
        monotonicity: neither,
    },
    sign: |kind, _| match kind {
        AtomKind::QuadForm(data) => match data.psd() {
            PsdStatus::Psd => Sign::Positive,
            PsdStatus::Nsd => Sign::Negative,
            PsdStatus::Neither => Sign::Unknown,
        },
        _ => Sign::Unknown,
    },
    eval: eval_quad_form,
    lowering: Lowering::Graph(expand_quad_form),
};

pub static QUAD_OVER_LIN: AtomSpec = AtomSpec {
    name: "quad_over_lin",
    arity: Arity::Fixed(2),
    shape: quad_over_lin_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: |kind, i, args| {
            if i == 0 {
                by_arg_sign(kind, i, args)
            } else {
                Monotonicity::Nonincreasing
            }
        },
    },
    sign: positive,
    eval: |_, args, _| match args {
        [x, y] => scalar(x.norm_squared() / y[(0, 0)]),
        _ => scalar(0.0),
    },
    lowering: Lowering::Graph(expand_quad_over_lin),
};

// ============================================================================
// Exponential-cone atoms
// ============================================================================

pub static EXP: AtomSpec = AtomSpec {
    name: "exp",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: convex,
        monotonicity: nondecreasing,
    },
    sign: positive,
    eval: |_, args, _| map_first(args, f64::exp),
    lowering: Lowering::Graph(expand_exp),
};

pub static LOG: AtomSpec = AtomSpec {
    name: "log",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: concave,
        monotonicity: nondecreasing,
    },
    sign: unknown_sign,
    eval: |_, args, _| map_first(args, f64::ln),
    lowering: Lowering::Graph(expand_log),
};

pub static ENTROPY: AtomSpec = AtomSpec {
    name: "entropy",
    arity: Arity::Fixed(1),
    shape: same_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: concave,
        monotonicity: neither,
    },
    sign: unknown_sign,
    eval: |_, args, _| map_first(args, entropy_value),
    lowering: Lowering::Graph(expand_entropy),
};

// ============================================================================
// Powers
// ============================================================================

pub static POWER: AtomSpec = AtomSpec {
    name: "power",
    arity: Arity::Fixed(1),
    shape: power_shape,
    curvature: CurvatureRule::Composition {
        intrinsic: |kind| match exponent(kind) {
            p if p == 1.0 => Curvature::Affine,
            p if p > 0.0 && p < 1.0 => Curvature::Concave,
            _ => Curvature::Convex,
        },
        monotonicity: |kind, i, args| match exponent(kind) {
            p if p > 1.0 => by_arg_sign(kind, i, args),
            p if p > 0.0 => Monotonicity::Nondecreasing,
            _ => Monotonicity::Nonincreasing,
        },
    },
    sign: |kind, args| {
        if exponent(kind) == 1.0 {
            first_arg_sign(kind, args)
        } else {
            Sign::Positive
        }
    },
    eval: |kind, args, _| {
        let p = exponent(kind);
        if p > 1.0 {
            map_first(args, |v| v.abs().powf(p))
        } else {
            map_first(args, |v| v.powf(p))
        }
    },
    lowering: Lowering::Graph(expand_power),
};

/// Exponent of a power atom (1 for any other kind).
pub(crate) fn exponent(kind: &AtomKind) -> f64 {
    match kind {
        AtomKind::Power(p) => *p,
        _ => 1.0,
    }
}

fn scalar(v: f64) -> DMatrix<f64> {
    DMatrix::from_element(1, 1, v)
}

fn entropy_value(v: f64) -> f64 {
    if v > 0.0 {
        -v * v.ln()
    } else if v == 0.0 {
        0.0
    } else {
        f64::NEG_INFINITY
    }
}

fn fold_elementwise(
    args: &[&DMatrix<f64>],
    shape: &Shape,
    f: fn(f64, f64) -> f64,
) -> DMatrix<f64> {
    let mut values = args.iter().map(|m| broadcast_value(m, shape));
    let first = values
        .next()
        .unwrap_or_else(|| DMatrix::zeros(shape.rows(), shape.cols()));
    values.fold(first, |acc, m| acc.zip_map(&m, f))
}

/// Non-negative if any argument is; non-positive if all are.
fn maximum_sign(_: &AtomKind, args: &[Inferred]) -> Sign {
    if args.iter().all(|a| a.sign.is_zero()) {
        Sign::Zero
    } else if args.iter().any(|a| a.sign.is_nonneg()) {
        Sign::Positive
    } else if args.iter().all(|a| a.sign.is_nonpos()) {
        Sign::Negative
    } else {
        Sign::Unknown
    }
}

fn quad_form_shape(kind: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    let (AtomKind::QuadForm(data), Some(x)) = (kind, shapes.first()) else {
        return Ok(Shape::scalar());
    };
    if x.is_matrix() || x.size() != data.dim() {
        return Err(ConstructionError::ShapeMismatch {
            atom: "quad_form",
            expected: format!("a vector of length {}", data.dim()),
            got: x.to_string(),
        });
    }
    Ok(Shape::scalar())
}

fn quad_over_lin_shape(_: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    match shapes {
        [_, y] if !y.is_unit() => Err(ConstructionError::ShapeMismatch {
            atom: "quad_over_lin",
            expected: "a scalar denominator".into(),
            got: y.to_string(),
        }),
        _ => Ok(Shape::scalar()),
    }
}

fn power_shape(kind: &AtomKind, shapes: &[Shape]) -> std::result::Result<Shape, ConstructionError> {
    let p = exponent(kind);
    if p == 0.0 || !p.is_finite() {
        return Err(ConstructionError::InvalidArgument {
            atom: "power",
            reason: format!("exponent must be finite and non-zero, got {}", p),
        });
    }
    same_shape(kind, shapes)
}

fn eval_quad_form(kind: &AtomKind, args: &[&DMatrix<f64>], _: &Shape) -> DMatrix<f64> {
    match (kind, args.first()) {
        (AtomKind::QuadForm(data), Some(x)) => {
            let x = DVector::from_column_slice(x.as_slice());
            scalar(x.dot(&(data.matrix() * &x)))
        }
        _ => scalar(0.0),
    }
}

impl ExprGraph {
    /// Elementwise absolute value.
    ///
    /// Convex; non-negative; nondecreasing for `x >= 0`, nonincreasing for
    /// `x <= 0`.
    pub fn abs(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Abs, vec![x])
    }

    /// Elementwise `max(x, 0)`.
    pub fn pos(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Pos, vec![x])
    }

    /// Elementwise `max(-x, 0)`.
    pub fn neg_part(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::NegPart, vec![x])
    }

    /// Elementwise maximum of the arguments (convex, nondecreasing).
    pub fn maximum(&mut self, args: &[ExprId]) -> Result<ExprId> {
        self.add_atom(AtomKind::Maximum, args.to_vec())
    }

    /// Elementwise minimum of the arguments (concave, nondecreasing).
    pub fn minimum(&mut self, args: &[ExprId]) -> Result<ExprId> {
        self.add_atom(AtomKind::Minimum, args.to_vec())
    }

    /// L1 norm `sum(|x_i|)` of all entries.
    pub fn norm1(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Norm1, vec![x])
    }

    /// L2 norm of all entries (Frobenius norm for matrices).
    pub fn norm2(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Norm2, vec![x])
    }

    /// Largest absolute entry.
    pub fn norm_inf(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::NormInf, vec![x])
    }

    /// General p-norm.
    ///
    /// # Errors
    ///
    /// Returns an error if `p` is not 1, 2, or infinity.
    pub fn norm(&mut self, x: ExprId, p: f64) -> Result<ExprId> {
        if p == 1.0 {
            self.norm1(x)
        } else if p == 2.0 {
            self.norm2(x)
        } else if p == f64::INFINITY {
            self.norm_inf(x)
        } else {
            Err(CvxError::Construction(ConstructionError::InvalidArgument {
                atom: "norm",
                reason: format!("unsupported p = {} (use 1, 2 or infinity)", p),
            }))
        }
    }

    /// Sum of squared entries.
    pub fn sum_squares(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::SumSquares, vec![x])
    }

    /// Quadratic form `x' P x` for a constant symmetric `P`.
    ///
    /// Convex when `P` is positive semidefinite, concave when negative
    /// semidefinite, and rejected by the DCP check otherwise.
    pub fn quad_form(&mut self, x: ExprId, p: DMatrix<f64>) -> Result<ExprId> {
        let data = QuadFormData::new(p)?;
        self.add_atom(AtomKind::QuadForm(Arc::new(data)), vec![x])
    }

    /// `sum(x^2) / y` for a scalar `y`; implies `y > 0`.
    pub fn quad_over_lin(&mut self, x: ExprId, y: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::QuadOverLin, vec![x, y])
    }

    /// Elementwise exponential.
    pub fn exp(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Exp, vec![x])
    }

    /// Elementwise natural logarithm; implies `x > 0`.
    pub fn log(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Log, vec![x])
    }

    /// Elementwise entropy `-x log x`; implies `x >= 0`.
    pub fn entropy(&mut self, x: ExprId) -> Result<ExprId> {
        self.add_atom(AtomKind::Entropy, vec![x])
    }

    /// Elementwise power `x^p`.
    ///
    /// - `p > 1`: convex, evaluated as `|x|^p`.
    /// - `p = 1`: identity.
    /// - `0 < p < 1`: concave, implies `x >= 0`.
    /// - `p < 0`: convex and nonincreasing, implies `x > 0`.
    pub fn power(&mut self, x: ExprId, p: f64) -> Result<ExprId> {
        self.add_atom(AtomKind::Power(p), vec![x])
    }

    pub fn sqrt(&mut self, x: ExprId) -> Result<ExprId> {
        self.power(x, 0.5)
    }

    pub fn square(&mut self, x: ExprId) -> Result<ExprId> {
        self.power(x, 2.0)
    }
}
