//! Atom descriptors.
//!
//! Every [`AtomKind`] maps to one immutable, statically allocated
//! [`AtomSpec`]. The spec carries everything the rest of the crate needs to
//! know about an operator: how to check its arguments, how to infer its
//! curvature and sign, how to evaluate it, and how to lower it to a cone
//! program. Specs are plain data with function pointers, so the registry is
//! `Sync` and needs no initialization.

use nalgebra::DMatrix;

use super::AtomKind;
use crate::canon::{CanonContext, LinExpr};
use crate::dcp::{compose_argument, Curvature, Monotonicity, Sign};
use crate::error::{CanonicalizationError, ConstructionError};
use crate::expr::{fit_to_shape, Inferred, Shape};

/// Number of arguments an atom accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }

    pub fn check(self, atom: &'static str, got: usize) -> Result<(), ConstructionError> {
        if self.accepts(got) {
            return Ok(());
        }
        let expected = match self {
            Arity::Fixed(k) => k.to_string(),
            Arity::AtLeast(k) => format!("at least {}", k),
        };
        Err(ConstructionError::Arity {
            atom,
            expected,
            got,
        })
    }
}

/// Result shape from argument shapes, rejecting incompatible arguments.
pub type ShapeFn = fn(&AtomKind, &[Shape]) -> Result<Shape, ConstructionError>;
/// Curvature of the atom as a function of its arguments' values.
pub type IntrinsicFn = fn(&AtomKind) -> Curvature;
/// Monotonicity in argument `i`, possibly depending on argument signs.
pub type MonotonicityFn = fn(&AtomKind, usize, &[Inferred]) -> Monotonicity;
pub type SignFn = fn(&AtomKind, &[Inferred]) -> Sign;
/// Numeric value from argument values, with the dimensions of the result shape.
pub type EvalFn = fn(&AtomKind, &[&DMatrix<f64>], &Shape) -> DMatrix<f64>;
/// Direct lowering of an affine atom.
pub type AffineFn = fn(&AtomKind, &[LinExpr], &Shape) -> Result<LinExpr, CanonicalizationError>;
/// Epigraph/hypograph rewrite introducing auxiliary variables and cones.
pub type GraphImplFn =
    fn(&mut CanonContext<'_>, &AtomKind, &[LinExpr], &Shape) -> Result<LinExpr, CanonicalizationError>;

/// How an atom's curvature follows from its arguments.
#[derive(Clone, Copy)]
pub enum CurvatureRule {
    /// Intrinsic curvature combined with each argument through the chain rule.
    Composition {
        intrinsic: IntrinsicFn,
        monotonicity: MonotonicityFn,
    },
    /// Product with a constant: the other factor's curvature scaled by the
    /// constant's sign. Two non-constant factors are never certified.
    SignScaled,
}

/// How an atom is rewritten into cone-program form.
#[derive(Clone, Copy)]
pub enum Lowering {
    /// Solver-primitive: maps straight to coefficient matrices.
    Affine(AffineFn),
    /// Rewritten via its graph implementation.
    Graph(GraphImplFn),
    /// No rewrite known; canonicalizing it is an error.
    None,
}

/// Static description of an atom.
pub struct AtomSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub shape: ShapeFn,
    pub curvature: CurvatureRule,
    pub sign: SignFn,
    pub eval: EvalFn,
    pub lowering: Lowering,
}

impl AtomSpec {
    /// Whether the solver consumes this atom directly.
    pub fn is_primitive(&self) -> bool {
        matches!(self.lowering, Lowering::Affine(_))
    }

    /// Curvature and sign of an application with arguments `args`.
    pub fn infer(&self, kind: &AtomKind, args: &[Inferred]) -> Inferred {
        let sign = (self.sign)(kind, args);
        if args.iter().all(|a| a.curvature.is_constant()) {
            return Inferred {
                curvature: Curvature::Constant,
                sign,
            };
        }
        let curvature = match self.curvature {
            CurvatureRule::Composition {
                intrinsic,
                monotonicity,
            } => {
                let base = intrinsic(kind);
                args.iter().enumerate().fold(base, |acc, (i, arg)| {
                    acc + compose_argument(base, monotonicity(kind, i, args), arg.curvature)
                })
            }
            CurvatureRule::SignScaled => sign_scaled(args),
        };
        Inferred { curvature, sign }
    }
}

impl std::fmt::Debug for AtomSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("primitive", &self.is_primitive())
            .finish()
    }
}

fn sign_scaled(args: &[Inferred]) -> Curvature {
    match args {
        [a, b] if a.curvature.is_constant() => b.curvature.sign_mul(a.sign),
        [a, b] if b.curvature.is_constant() => a.curvature.sign_mul(b.sign),
        _ => Curvature::Unknown,
    }
}

// Shared rule fragments used by the atom tables.

pub(crate) fn affine(_: &AtomKind) -> Curvature {
    Curvature::Affine
}

pub(crate) fn convex(_: &AtomKind) -> Curvature {
    Curvature::Convex
}

pub(crate) fn concave(_: &AtomKind) -> Curvature {
    Curvature::Concave
}

pub(crate) fn nondecreasing(_: &AtomKind, _: usize, _: &[Inferred]) -> Monotonicity {
    Monotonicity::Nondecreasing
}

pub(crate) fn nonincreasing(_: &AtomKind, _: usize, _: &[Inferred]) -> Monotonicity {
    Monotonicity::Nonincreasing
}

pub(crate) fn neither(_: &AtomKind, _: usize, _: &[Inferred]) -> Monotonicity {
    Monotonicity::Neither
}

/// Nondecreasing on non-negative arguments, nonincreasing on non-positive.
pub(crate) fn by_arg_sign(_: &AtomKind, i: usize, args: &[Inferred]) -> Monotonicity {
    args.get(i)
        .map_or(Monotonicity::Neither, |a| Monotonicity::by_sign(a.sign))
}

pub(crate) fn positive(_: &AtomKind, _: &[Inferred]) -> Sign {
    Sign::Positive
}

pub(crate) fn unknown_sign(_: &AtomKind, _: &[Inferred]) -> Sign {
    Sign::Unknown
}

pub(crate) fn first_arg_sign(_: &AtomKind, args: &[Inferred]) -> Sign {
    args.first().map_or(Sign::Unknown, |a| a.sign)
}

pub(crate) fn same_shape(_: &AtomKind, shapes: &[Shape]) -> Result<Shape, ConstructionError> {
    Ok(shapes.first().cloned().unwrap_or_default())
}

pub(crate) fn scalar_shape(_: &AtomKind, _: &[Shape]) -> Result<Shape, ConstructionError> {
    Ok(Shape::scalar())
}

/// Common broadcast shape of all arguments.
pub(crate) fn broadcast_shapes(
    atom: &'static str,
    shapes: &[Shape],
) -> Result<Shape, ConstructionError> {
    let mut iter = shapes.iter();
    let first = iter.next().cloned().unwrap_or_default();
    iter.try_fold(first, |acc, s| {
        acc.broadcast(s).ok_or_else(|| ConstructionError::ShapeMismatch {
            atom,
            expected: acc.to_string(),
            got: s.to_string(),
        })
    })
}

/// Argument value broadcast to `shape`.
pub(crate) fn broadcast_value(value: &DMatrix<f64>, shape: &Shape) -> DMatrix<f64> {
    fit_to_shape(value, shape).unwrap_or_else(|| value.clone())
}

/// Apply `f` entrywise to the first argument.
pub(crate) fn map_first(args: &[&DMatrix<f64>], f: impl Fn(f64) -> f64) -> DMatrix<f64> {
    args.first()
        .map_or_else(|| DMatrix::zeros(1, 1), |m| m.map(f))
}
