//! Matrix stuffing: converts a canonicalized problem to cone-program form.
//!
//! This module builds the data (c, A, b) and the cone list consumed by a
//! [`ConeSolver`](super::ConeSolver), in the convention
//! `A x + s = b, s in K`. An affine constraint block `G x + h` in cone `K`
//! becomes rows `A = -G`, `b = h`.

use std::collections::BTreeMap;
use std::ops::Range;

use nalgebra_sparse::CscMatrix;

use crate::canon::{CanonResult, ConeConstraint, LinExpr, VarKey};
use crate::expr::{ExprId, Shape};
use crate::sparse::csc_from_triplets;

/// Cone dimensions, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConeDims {
    /// Number of zero cone (equality) rows.
    pub zero: usize,
    /// Number of nonnegative cone rows.
    pub nonneg: usize,
    /// Second-order cone dimensions (each entry is the cone dimension).
    pub soc: Vec<usize>,
    /// Number of exponential cones (each is 3D).
    pub exp: usize,
    /// Power cone alpha values (each cone is 3D with its own alpha).
    pub power: Vec<f64>,
}

impl ConeDims {
    /// Total number of constraint rows.
    pub fn total(&self) -> usize {
        self.zero + self.nonneg + self.soc.iter().sum::<usize>() + (self.exp * 3) + (self.power.len() * 3)
    }
}

/// Mapping from cone-program variables to column ranges.
///
/// Original variables come first, ordered by handle; auxiliaries follow in
/// introduction order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableMap {
    columns: BTreeMap<VarKey, (usize, Shape)>,
    originals: Vec<ExprId>,
    total_vars: usize,
}

impl VariableMap {
    pub fn new(variables: &[(ExprId, Shape)], aux_shapes: &[Shape]) -> Self {
        let mut columns = BTreeMap::new();
        let mut offset = 0;
        let keyed = variables
            .iter()
            .map(|(id, shape)| (VarKey::Original(*id), shape))
            .chain(aux_shapes.iter().enumerate().map(|(i, s)| (VarKey::Aux(i), s)));
        for (key, shape) in keyed {
            columns.insert(key, (offset, shape.clone()));
            offset += shape.size();
        }
        VariableMap {
            columns,
            originals: variables.iter().map(|(id, _)| *id).collect(),
            total_vars: offset,
        }
    }

    /// First column and shape of a variable.
    pub fn get(&self, key: VarKey) -> Option<(usize, &Shape)> {
        self.columns.get(&key).map(|(start, shape)| (*start, shape))
    }

    /// Column range of an original variable.
    pub fn columns_of(&self, var: ExprId) -> Option<Range<usize>> {
        self.get(VarKey::Original(var))
            .map(|(start, shape)| start..start + shape.size())
    }

    /// Original variables, in column order.
    pub fn originals(&self) -> &[ExprId] {
        &self.originals
    }

    /// Total number of columns.
    pub fn total(&self) -> usize {
        self.total_vars
    }
}

/// A cone program: minimize `c' x + offset` subject to `A x + s = b`,
/// `s` in the cones of `cone_dims` (in that row order).
#[derive(Debug, Clone, PartialEq)]
pub struct ConeProgram {
    pub c: Vec<f64>,
    pub offset: f64,
    pub a: CscMatrix<f64>,
    pub b: Vec<f64>,
    pub cone_dims: ConeDims,
    pub var_map: VariableMap,
    /// Rows of each user constraint, in constraint order.
    pub constraint_rows: Vec<Range<usize>>,
    /// The source problem was a maximization; `c` holds the negated objective.
    pub maximize: bool,
}

impl ConeProgram {
    pub fn num_vars(&self) -> usize {
        self.c.len()
    }

    pub fn num_rows(&self) -> usize {
        self.b.len()
    }
}

fn cone_rank(c: &ConeConstraint) -> usize {
    match c {
        ConeConstraint::Zero { .. } => 0,
        ConeConstraint::NonNeg { .. } => 1,
        ConeConstraint::SOC { .. } => 2,
        ConeConstraint::ExpCone { .. } => 3,
        ConeConstraint::PowerCone { .. } => 4,
    }
}

/// Assemble the cone program for a canonicalized problem.
pub fn stuff_problem(canon: &CanonResult) -> ConeProgram {
    let var_map = VariableMap::new(&canon.variables, &canon.aux_shapes);
    let n = var_map.total();

    // Objective.
    let mut c = vec![0.0; n];
    for (row_key, coeff) in &canon.objective.coeffs {
        if let Some((start, _)) = var_map.get(*row_key) {
            for (_, col, v) in coeff.triplet_iter() {
                c[start + col] += v;
            }
        }
    }
    let offset: f64 = canon.objective.constant.iter().sum();

    // Stable sort by cone kind keeps introduction order within each kind.
    let mut order: Vec<usize> = (0..canon.constraints.len()).collect();
    order.sort_by_key(|&i| cone_rank(&canon.constraints[i]));

    let mut cone_dims = ConeDims::default();
    let mut row_of = vec![0..0; canon.constraints.len()];
    let mut triplets = Vec::new();
    let mut b = Vec::new();
    for i in order {
        let cone = &canon.constraints[i];
        let start = b.len();
        for part in cone.parts() {
            stuff_linear_expr(part, &var_map, b.len(), &mut triplets, &mut b);
        }
        row_of[i] = start..b.len();
        match cone {
            ConeConstraint::Zero { a } => cone_dims.zero += a.size(),
            ConeConstraint::NonNeg { a } => cone_dims.nonneg += a.size(),
            ConeConstraint::SOC { .. } => cone_dims.soc.push(cone.rows()),
            ConeConstraint::ExpCone { .. } => cone_dims.exp += 1,
            ConeConstraint::PowerCone { alpha, .. } => cone_dims.power.push(*alpha),
        }
    }

    let a = csc_from_triplets(b.len(), n, triplets);
    let constraint_rows = canon
        .user_constraints
        .iter()
        .map(|&i| row_of[i].clone())
        .collect();

    ConeProgram {
        c,
        offset,
        a,
        b,
        cone_dims,
        var_map,
        constraint_rows,
        maximize: canon.maximize,
    }
}

/// Append the rows of `expr` as `A = -G`, `b = h`.
fn stuff_linear_expr(
    expr: &LinExpr,
    var_map: &VariableMap,
    row0: usize,
    triplets: &mut Vec<(usize, usize, f64)>,
    b: &mut Vec<f64>,
) {
    for (key, coeff) in &expr.coeffs {
        if let Some((start, _)) = var_map.get(*key) {
            triplets.extend(
                coeff
                    .triplet_iter()
                    .map(|(r, col, v)| (row0 + r, start + col, -v)),
            );
        }
    }
    b.extend(expr.constant.iter().copied());
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::canon::canonicalize;
    use crate::constraints::ConstraintExt;
    use crate::expr::ExprGraph;
    use crate::sparse::csc_to_dense;

    #[test]
    fn test_cones_are_ordered_by_kind() {
        let mut g = ExprGraph::new();
        let x = g.variable(2);
        let n = g.norm2(x).unwrap();
        let e = g.exp(n).unwrap();
        let s = g.sum(x).unwrap();
        let one = g.constant(1.0);
        let cons = [s.equals(one), x.geq(one)];
        let canon = canonicalize(&g, e, false, &cons, &HashMap::new()).unwrap();
        let program = stuff_problem(&canon);

        assert_eq!(program.cone_dims.zero, 1);
        assert_eq!(program.cone_dims.nonneg, 2);
        assert_eq!(program.cone_dims.soc, vec![3]);
        assert_eq!(program.cone_dims.exp, 1);
        assert_eq!(program.num_rows(), program.cone_dims.total());
        // x (2 columns), then t_norm and t_exp.
        assert_eq!(program.num_vars(), 4);
        assert_eq!(program.var_map.columns_of(x), Some(0..2));
        assert_eq!(program.constraint_rows, vec![0..1, 1..3]);
    }

    #[test]
    fn test_sign_convention() {
        // x >= 1 becomes -x + s = -1, s >= 0.
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let one = g.constant(1.0);
        let canon = canonicalize(&g, x, false, &[x.geq(one)], &HashMap::new()).unwrap();
        let program = stuff_problem(&canon);
        assert_eq!(program.c, vec![1.0]);
        assert_eq!(csc_to_dense(&program.a)[(0, 0)], -1.0);
        assert_eq!(program.b, vec![-1.0]);
    }

    #[test]
    fn test_same_problem_same_data() {
        let build = || {
            let mut g = ExprGraph::new();
            let x = g.variable(3);
            let a = g.abs(x).unwrap();
            let m = g.maximum(&[a, x]).unwrap();
            let obj = g.sum(m).unwrap();
            let canon = canonicalize(&g, obj, false, &[], &HashMap::new()).unwrap();
            stuff_problem(&canon)
        };
        let (p1, p2) = (build(), build());
        assert_eq!(p1.c, p2.c);
        assert_eq!(csc_to_dense(&p1.a), csc_to_dense(&p2.a));
        assert_eq!(p1.b, p2.b);
        assert_eq!(p1.cone_dims, p2.cone_dims);
    }
}
