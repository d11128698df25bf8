//! Canonicalization of DCP problems.
//!
//! Walks the expression graph bottom-up and rewrites every node into an
//! affine expression over original and auxiliary variables, collecting the
//! cone constraints that the graph implementations introduce. The result is
//! equivalent to the input problem: it has the same optimal value and the
//! same optimal values of the original variables.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::lin_expr::{LinExpr, VarKey};
use crate::atoms::{AtomKind, Lowering};
use crate::constraints::{Constraint, Relation};
use crate::dcp::Sign;
use crate::error::{CanonicalizationError, CvxError, Result};
use crate::expr::{Array, ExprGraph, ExprId, Node, Shape};

/// Cone constraint types for the canonicalized problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ConeConstraint {
    /// Zero cone: Ax + b = 0 (equality).
    Zero { a: LinExpr },
    /// Nonnegative cone: Ax + b >= 0.
    NonNeg { a: LinExpr },
    /// Second-order cone: ||x||_2 <= t.
    /// Represented as [t; x] in K_soc.
    SOC {
        /// The scalar t expression.
        t: LinExpr,
        /// The vector x expression.
        x: LinExpr,
    },
    /// Exponential cone: {(x, y, z) | y > 0, y*exp(x/y) <= z} plus its closure.
    /// Variable order is (x, y, z).
    ExpCone { x: LinExpr, y: LinExpr, z: LinExpr },
    /// Power cone: {(x, y, z) : x^α * y^(1-α) >= |z|, (x,y) >= 0} with α ∈ (0,1)
    /// Variable order is (x, y, z).
    PowerCone {
        x: LinExpr,
        y: LinExpr,
        z: LinExpr,
        /// The power α ∈ (0,1).
        alpha: f64,
    },
}

impl ConeConstraint {
    /// Number of rows this constraint occupies in the stuffed program.
    pub fn rows(&self) -> usize {
        match self {
            ConeConstraint::Zero { a } | ConeConstraint::NonNeg { a } => a.size(),
            ConeConstraint::SOC { t, x } => t.size() + x.size(),
            ConeConstraint::ExpCone { .. } | ConeConstraint::PowerCone { .. } => 3,
        }
    }

    /// The blocks written to consecutive rows, in cone order.
    pub fn parts(&self) -> Vec<&LinExpr> {
        match self {
            ConeConstraint::Zero { a } | ConeConstraint::NonNeg { a } => vec![a],
            ConeConstraint::SOC { t, x } => vec![t, x],
            ConeConstraint::ExpCone { x, y, z } | ConeConstraint::PowerCone { x, y, z, .. } => {
                vec![x, y, z]
            }
        }
    }

    /// Structural validity: scalar heads and triple members, non-empty
    /// bodies, and a power in `(0, 1)`.
    pub fn is_well_formed(&self) -> bool {
        match self {
            ConeConstraint::Zero { a } | ConeConstraint::NonNeg { a } => a.size() > 0,
            ConeConstraint::SOC { t, x } => t.size() == 1 && x.size() > 0,
            ConeConstraint::ExpCone { x, y, z } => [x, y, z].iter().all(|e| e.size() == 1),
            ConeConstraint::PowerCone { x, y, z, alpha } => {
                [x, y, z].iter().all(|e| e.size() == 1) && *alpha > 0.0 && *alpha < 1.0
            }
        }
    }
}

/// Output of canonicalizing a whole problem.
#[derive(Debug, Clone)]
pub struct CanonResult {
    /// Objective to minimize (already negated for maximization).
    pub objective: LinExpr,
    /// Whether the problem was a maximization.
    pub maximize: bool,
    /// Every cone constraint, auxiliary and user, in introduction order.
    pub constraints: Vec<ConeConstraint>,
    /// Position in `constraints` of each user constraint.
    pub user_constraints: Vec<usize>,
    /// Original variables, sorted by handle.
    pub variables: Vec<(ExprId, Shape)>,
    /// Shapes of the auxiliary variables, indexed by [`VarKey::Aux`].
    pub aux_shapes: Vec<Shape>,
}

/// State of one canonicalization pass.
///
/// Lowered nodes are memoized, so a subexpression shared by several parents
/// (or by the objective and a constraint) introduces its auxiliaries once.
pub struct CanonContext<'g> {
    graph: &'g ExprGraph,
    params: &'g HashMap<ExprId, Array>,
    memo: HashMap<ExprId, LinExpr>,
    constraints: Vec<ConeConstraint>,
    aux_shapes: Vec<Shape>,
}

impl<'g> CanonContext<'g> {
    /// Parameter values in `params` take precedence over graph defaults.
    pub fn new(graph: &'g ExprGraph, params: &'g HashMap<ExprId, Array>) -> Self {
        CanonContext {
            graph,
            params,
            memo: HashMap::new(),
            constraints: Vec::new(),
            aux_shapes: Vec::new(),
        }
    }

    /// Create a new auxiliary variable.
    pub fn new_aux(&mut self, shape: Shape) -> LinExpr {
        let key = VarKey::Aux(self.aux_shapes.len());
        self.aux_shapes.push(shape.clone());
        LinExpr::variable(key, shape)
    }

    pub fn push(&mut self, constraint: ConeConstraint) {
        self.constraints.push(constraint);
    }

    /// Add `a >= 0`.
    pub fn nonneg(&mut self, a: LinExpr) {
        self.push(ConeConstraint::NonNeg { a });
    }

    pub fn constraints(&self) -> &[ConeConstraint] {
        &self.constraints
    }

    pub fn aux_shapes(&self) -> &[Shape] {
        &self.aux_shapes
    }

    /// Lower one application of `kind` to already-lowered arguments.
    ///
    /// Graph implementations call this to expand other atoms in place.
    pub fn expand(&mut self, kind: &AtomKind, args: &[LinExpr], shape: &Shape) -> std::result::Result<LinExpr, CanonicalizationError> {
        let spec = kind.spec();
        match spec.lowering {
            Lowering::Affine(lower) => lower(kind, args, shape),
            Lowering::Graph(expand) => {
                trace!(atom = spec.name, shape = %shape, "expanding graph implementation");
                expand(self, kind, args, shape)
            }
            Lowering::None => Err(CanonicalizationError::new(
                spec.name,
                "no graph implementation registered",
            )),
        }
    }

    /// Lower `root` and everything below it.
    ///
    /// Atoms whose value is known without their arguments (zero sign or
    /// constant curvature) are folded before the walk descends, so their
    /// subtrees are never lowered.
    pub fn canonicalize(&mut self, root: ExprId) -> Result<LinExpr> {
        self.graph.infer(root)?;
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if self.memo.contains_key(&id) {
                continue;
            }
            if expanded {
                let lowered = self.lower_node(id)?;
                self.memo.insert(id, lowered);
                continue;
            }
            if let Some(folded) = self.fold(id)? {
                self.memo.insert(id, folded);
                continue;
            }
            stack.push((id, true));
            for &arg in self.graph.node_unchecked(id).args().iter().rev() {
                if !self.memo.contains_key(&arg) {
                    stack.push((arg, false));
                }
            }
        }
        self.memo.get(&root).cloned().ok_or_else(|| {
            CvxError::Canonicalization(
                CanonicalizationError::new(self.graph.node_unchecked(root).label(), "node was not lowered")
                    .at(root),
            )
        })
    }

    fn fold(&self, id: ExprId) -> Result<Option<LinExpr>> {
        let graph = self.graph;
        if !matches!(graph.node_unchecked(id), Node::Atom(_)) {
            return Ok(None);
        }
        let inferred = graph.infer(id)?;
        let shape = graph.shape_unchecked(id).clone();
        if inferred.sign == Sign::Zero {
            trace!(node = %id, "folded zero-sign subtree");
            return Ok(Some(LinExpr::zeros(shape)));
        }
        if !inferred.curvature.is_constant() {
            return Ok(None);
        }
        let value = graph.evaluate(id, self.params)?;
        let folded = LinExpr::constant(&value, shape);
        if graph.parameters(&[id])?.is_empty() {
            Ok(Some(folded))
        } else {
            Ok(Some(folded.into_parametric()))
        }
    }

    fn lower_node(&mut self, id: ExprId) -> Result<LinExpr> {
        let graph = self.graph;
        let shape = graph.shape_unchecked(id).clone();
        match graph.node_unchecked(id) {
            Node::Constant(c) => Ok(LinExpr::constant(&c.value.to_dense(), shape)),
            Node::Parameter(p) => {
                let value = self.params.get(&id).or(p.value.as_ref()).ok_or_else(|| {
                    CvxError::InvalidProblem(format!("parameter {} has no value", id))
                })?;
                Ok(LinExpr::constant(&value.to_dense(), shape).into_parametric())
            }
            Node::Variable(v) => {
                let x = LinExpr::variable(VarKey::Original(id), shape);
                match v.sign {
                    Sign::Positive => self.nonneg(x.clone()),
                    Sign::Negative => self.nonneg(x.neg()),
                    Sign::Zero => self.push(ConeConstraint::Zero { a: x.clone() }),
                    Sign::Unknown => {}
                }
                Ok(x)
            }
            Node::Atom(atom) => {
                let inferred = graph.infer(id)?;
                let name = atom.kind.name();
                if !inferred.curvature.is_dcp() {
                    return Err(CanonicalizationError::new(name, "curvature is UNKNOWN")
                        .at(id)
                        .into());
                }
                let args = atom
                    .args
                    .iter()
                    .map(|a| {
                        self.memo.get(a).cloned().ok_or_else(|| {
                            CanonicalizationError::new(name, format!("argument {} not lowered", a)).at(id)
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                self.expand(&atom.kind, &args, &shape)
                    .map_err(|e| e.at(id).into())
            }
        }
    }

    fn finish(self) -> (Vec<ConeConstraint>, Vec<Shape>) {
        (self.constraints, self.aux_shapes)
    }
}

/// Canonicalize an objective and its constraints in one shared pass.
///
/// The caller is responsible for the DCP check; a node with unknown
/// curvature is reported as a [`CanonicalizationError`].
pub fn canonicalize(
    graph: &ExprGraph,
    objective: ExprId,
    maximize: bool,
    constraints: &[Constraint],
    params: &HashMap<ExprId, Array>,
) -> Result<CanonResult> {
    let mut ctx = CanonContext::new(graph, params);

    let lowered = ctx.canonicalize(objective)?;
    let objective_expr = if maximize { lowered.neg() } else { lowered };

    let mut user_constraints = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        let lhs = ctx.canonicalize(constraint.lhs)?;
        let rhs = ctx.canonicalize(constraint.rhs)?;
        let cone = match constraint.relation {
            Relation::Eq => ConeConstraint::Zero { a: lhs.sub(&rhs) },
            Relation::Leq => ConeConstraint::NonNeg { a: rhs.sub(&lhs) },
            Relation::Geq => ConeConstraint::NonNeg { a: lhs.sub(&rhs) },
        };
        user_constraints.push(ctx.constraints().len());
        ctx.push(cone);
    }

    let mut roots = vec![objective];
    roots.extend(constraints.iter().flat_map(|c| [c.lhs, c.rhs]));
    let variables = graph
        .variables(&roots)?
        .into_iter()
        .map(|id| (id, graph.shape_unchecked(id).clone()))
        .collect::<Vec<_>>();
    // Variables that only occur under folded subtrees still carry their sign hints.
    for (id, _) in &variables {
        ctx.canonicalize(*id)?;
    }

    let (cones, aux_shapes) = ctx.finish();
    debug!(
        variables = variables.len(),
        aux_variables = aux_shapes.len(),
        cones = cones.len(),
        "canonicalized problem"
    );

    Ok(CanonResult {
        objective: objective_expr,
        maximize,
        constraints: cones,
        user_constraints,
        variables,
        aux_shapes,
    })
}
