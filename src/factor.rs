//! Definition of the factor module
//!
//! A `Factor` represents a relationship between some set of `Variable`s. Values are stored in a
//! dense table addressed in row-major order with respect to the scope: the *last* `Variable` of
//! the scope varies fastest. Every operation in this module relies on that convention.

use crate::util::{BucketeerError, Result};
use crate::variable::{Assignment, Variable};

use itertools::Itertools;
use ndarray::prelude as nd;
use ndarray::{Axis, IxDyn};

use std::collections::HashMap;
use std::rc::Rc;

/// Alias f64 ndarray::Array as Table
pub type Table = nd::ArrayD<f64>;

/// Allowed deviation from 1.0 for the columns of a conditional probability distribution
const CPD_TOLERANCE: f64 = 0.001;


/// The capability contract the bucket algorithms rely on: a scope and a way to look up a value
/// for a complete assignment to that scope.
///
/// `Factor` is the only point-valued implementation in this crate, but anything that can be
/// evaluated cell-by-cell (a set of extreme distributions, for example) can be combined through
/// `Factor::combine`.
pub trait Potential {

    /// The ordered scope of the `Potential`
    fn scope(&self) -> &[Variable];

    /// The value at the given index tuple. `index` is aligned with `scope()` and every entry is
    /// within the domain of the corresponding `Variable`.
    fn value_at(&self, index: &[usize]) -> f64;

    /// Retrieve the value for a complete assignment over the scope.
    ///
    /// # Errors
    /// * `BucketeerError::OutOfScope` if the assignment is missing a `Variable` of the scope or
    ///   assigns it a value outside its domain
    fn value(&self, assignment: &Assignment) -> Result<f64> {
        let index = project(self.scope(), assignment)?;
        Ok(self.value_at(&index))
    }

}

impl<'a, P: Potential + ?Sized> Potential for &'a P {

    fn scope(&self) -> &[Variable] {
        (**self).scope()
    }

    fn value_at(&self, index: &[usize]) -> f64 {
        (**self).value_at(index)
    }

}

impl<P: Potential + ?Sized> Potential for Rc<P> {

    fn scope(&self) -> &[Variable] {
        (**self).scope()
    }

    fn value_at(&self, index: &[usize]) -> f64 {
        (**self).value_at(index)
    }

}


#[derive(Clone, Debug, PartialEq)]
pub struct Factor {
    /// The scope of the `Factor`
    scope: Vec<Variable>,

    /// The values of the `Factor` table, one axis per scope entry
    table: Table,

    /// `true`, if the `Factor` is a conditional probability distribution of its first variable
    /// given the remaining ones
    cpd: bool
}


impl Factor {

    /// Create a new `Factor`
    ///
    /// # Args
    /// * `scope`: the `Variable`s of the `Factor`, in table axis order
    /// * `table`: the values; axis `i` must have the cardinality of `scope[i]`
    /// * `cpd`: whether the table is a distribution over `scope[0]` conditioned on the rest
    ///
    /// # Errors
    /// * `BucketeerError::General` if the scope is empty or the table does not match it
    /// * `BucketeerError::DuplicateVariable` if a `Variable` appears twice in the scope
    /// * `BucketeerError::NegativeProbability` if a CPD has a negative entry
    /// * `BucketeerError::NotACPD` if a CPD does not sum to one for every parent configuration
    pub fn new(scope: Vec<Variable>, table: Table, cpd: bool) -> Result<Self> {
        if scope.is_empty() {
            return Err(
                BucketeerError::General(
                    String::from("Invalid arguments. Scope may not be empty")
                )
            );
        } else if scope.len() != table.ndim() {
            return Err(
                BucketeerError::General(
                    String::from("Invalid arguments. Cardinality of scope must match number of table dimensions")
                )
            );
        }

        for (v, t) in scope.iter().map(|v| v.cardinality()).zip(table.shape().iter()) {
            if v != *t {
                return Err(
                    BucketeerError::General(
                        String::from("Invalid arguments. Dimensions do not match")
                    )
                );
            }
        }

        if let Some(dup) = scope.iter().duplicates().next() {
            return Err(BucketeerError::DuplicateVariable(dup.to_string()));
        }

        if table.iter().any(|v| v.is_nan()) {
            return Err(BucketeerError::General(String::from("Invalid arguments. Table contains NaN")));
        }

        if cpd {
            if table.iter().any(|&v| v < 0.0) {
                return Err(BucketeerError::NegativeProbability);
            }

            // every column (one per parent configuration) must be a distribution
            let columns = table.sum_axis(Axis(0));
            if columns.iter().any(|&s| (s - 1.0).abs() > CPD_TOLERANCE) {
                return Err(BucketeerError::NotACPD);
            }
        }

        Ok(Factor { scope, table, cpd })
    }


    /// Create a conditional probability distribution ```P(var | parents)```.
    ///
    /// The table has shape ```[|var|, |parents[0]|, ...]``` so that the scope of the resulting
    /// `Factor` is ```[var, parents...]```.
    pub fn cpd(var: Variable, parents: Vec<Variable>, table: Table) -> Result<Self> {
        let mut scope = Vec::with_capacity(parents.len() + 1);
        scope.push(var);
        scope.extend(parents);

        Factor::new(scope, table, true)
    }


    /// Create a (non-CPD) `Factor` from values listed in row-major order
    pub fn from_values(scope: Vec<Variable>, values: Vec<f64>) -> Result<Self> {
        let shape: Vec<usize> = scope.iter().map(|v| v.cardinality()).collect();
        let table = Table::from_shape_vec(IxDyn(&shape), values)?;
        Factor::new(scope, table, false)
    }


    /// Create a `Factor` of ones over the given scope
    pub fn ones(scope: Vec<Variable>) -> Result<Self> {
        let shape: Vec<usize> = scope.iter().map(|v| v.cardinality()).collect();
        Factor::new(scope, Table::ones(IxDyn(&shape)), false)
    }


    /// Create a `Factor` with an empty scope holding a single value.
    ///
    /// Scalar factors are produced when the last variable of a table is eliminated.
    pub fn scalar(value: f64) -> Self {
        Factor { scope: vec![], table: Table::from_elem(IxDyn(&[]), value), cpd: false }
    }


    /// Internal constructor for tables produced by the algebra, which are consistent by
    /// construction
    fn from_table(scope: Vec<Variable>, table: Table) -> Self {
        Factor { scope, table, cpd: false }
    }


    /// Retrieve the scope of the `Factor`
    pub fn scope(&self) -> &[Variable] {
        &self.scope
    }


    /// Retrieve the table of the `Factor`
    pub fn table(&self) -> &Table {
        &self.table
    }


    /// Check if the `Factor` is a Conditional Probability Distribution
    ///
    /// # Note
    /// Only `Factor`s constructed as CPDs carry this flag. Every operation of the algebra
    /// produces a plain potential.
    pub fn is_cpd(&self) -> bool {
        self.cpd
    }


    /// Check if the `Factor` has an empty scope
    pub fn is_scalar(&self) -> bool {
        self.scope.is_empty()
    }


    /// The single value of a scalar `Factor`
    pub fn scalar_value(&self) -> Option<f64> {
        if self.is_scalar() {
            self.table.iter().next().cloned()
        } else {
            None
        }
    }


    /// Check if `var` is in the scope of the `Factor`
    pub fn contains(&self, var: &Variable) -> bool {
        self.scope.contains(var)
    }


    /// The number of cells in the table
    pub fn len(&self) -> usize {
        self.table.len()
    }


    /// The values of the table in row-major order
    pub fn values(&self) -> impl Iterator<Item = &f64> {
        self.table.iter()
    }


    /// Sum of every value in the table
    pub fn sum(&self) -> f64 {
        self.table.sum()
    }


    /// The largest value in the table
    pub fn max(&self) -> f64 {
        self.table.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }


    /// Retrieve the value for a complete assignment over the scope of this `Factor`
    ///
    /// # Args
    /// * `assignment`: a full assignment to the scope of the `Factor`. The assignment's scope may
    ///   be a superset of the `Factor`s scope.
    ///
    /// # Errors
    /// * `BucketeerError::OutOfScope`, if assignment is not a complete assignment to the scope of
    ///   the `Factor`
    pub fn value(&self, assignment: &Assignment) -> Result<f64> {
        Potential::value(self, assignment)
    }


    /// Multiply every value of the `Factor` by `c`
    pub fn scale(&self, c: f64) -> Self {
        Factor::from_table(self.scope.clone(), &self.table * c)
    }


    /// Pointwise product of a set of potentials.
    ///
    /// The output scope is the union of the input scopes, taking each input's variables in order
    /// and keeping the first occurrence. Every cell of the output is visited by a mixed-radix
    /// counter; each input is evaluated at the projection of that counter onto its own scope.
    ///
    /// Defined in Koller & Friedman Section 4.2.1
    ///
    /// # Errors
    /// * `BucketeerError::General` if `potentials` is empty
    pub fn combine<P: Potential>(potentials: &[P]) -> Result<Factor> {
        if potentials.is_empty() {
            return Err(BucketeerError::General(String::from("cannot combine an empty set of factors")));
        }

        let scope: Vec<Variable> = potentials.iter()
                                             .flat_map(|p| p.scope().iter().cloned())
                                             .unique()
                                             .collect();

        let axis: HashMap<Variable, usize> = scope.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        // for each input, the output axis of each of its variables
        let projections: Vec<Vec<usize>> = potentials.iter()
                                                     .map(|p| p.scope().iter().map(|v| axis[v]).collect())
                                                     .collect();

        let shape: Vec<usize> = scope.iter().map(|v| v.cardinality()).collect();
        let total: usize = shape.iter().product();

        let mut values = Vec::with_capacity(total);
        let mut counter = vec![0; scope.len()];
        let mut projected: Vec<Vec<usize>> = projections.iter().map(|p| vec![0; p.len()]).collect();

        for _ in 0..total {
            let mut value = 1.0;
            for ((potential, positions), index) in potentials.iter().zip(&projections).zip(projected.iter_mut()) {
                for (slot, &pos) in index.iter_mut().zip(positions) {
                    *slot = counter[pos];
                }
                value *= potential.value_at(index);
            }

            values.push(value);
            increment(&mut counter, &shape);
        }

        let table = Table::from_shape_vec(IxDyn(&shape), values)?;
        Ok(Factor::from_table(scope, table))
    }


    /// Marginalize the `Factor` over the given `Variable`
    ///
    /// Defined in Koller & Friedman 9.3.1
    ///
    /// # Returns
    /// a `Factor` over the scope minus `var`, each cell holding the sum over the values of `var`.
    /// Eliminating the last variable yields a scalar `Factor`.
    ///
    /// # Errors
    /// * `BucketeerError::OutOfScope` if `var` is not in the scope
    pub fn sum_out(&self, var: Variable) -> Result<Factor> {
        let axis = self.axis_of(&var)?;
        let table = self.table.sum_axis(Axis(axis));
        let scope = self.scope.iter().filter(|&&v| v != var).cloned().collect();

        Ok(Factor::from_table(scope, table))
    }


    /// Sum out every variable of the scope except the ones in `keep`. The remaining variables
    /// keep their relative order.
    pub fn sum_out_all_except(&self, keep: &[Variable]) -> Result<Factor> {
        let mut result = self.clone();
        for var in self.scope.iter().filter(|v| ! keep.contains(v)) {
            result = result.sum_out(*var)?;
        }

        Ok(result)
    }


    /// Maximize the `Factor` over the given `Variable`.
    ///
    /// Defined in Koller & Friedman 13.2.1
    ///
    /// # Returns
    /// the max-marginal over the scope minus `var`, together with a `BackwardPointer` recording,
    /// for every cell of the max-marginal, the first value of `var` that attains the maximum.
    ///
    /// # Errors
    /// * `BucketeerError::OutOfScope` if `var` is not in the scope
    pub fn max_out(&self, var: Variable) -> Result<(Factor, BackwardPointer)> {
        let axis = Axis(self.axis_of(&var)?);

        let maxima = self.table.map_axis(axis, |lane| {
            lane.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        });

        let argmax = self.table.map_axis(axis, |lane| {
            let mut best = 0;
            for (i, &v) in lane.iter().enumerate() {
                if v > lane[best] {
                    best = i;
                }
            }
            best
        });

        let scope: Vec<Variable> = self.scope.iter().filter(|&&v| v != var).cloned().collect();
        let pointer = BackwardPointer { variable: var, scope: scope.clone(), table: argmax };

        Ok((Factor::from_table(scope, maxima), pointer))
    }


    /// Reduce the `Factor` over the given partial assignment
    ///
    /// Defined in Koller & Friedman 4.2.3
    ///
    /// # Args
    /// * `evidence`: a partial assignment; variables outside the scope are ignored
    ///
    /// # Returns
    /// the `Factor` with every assigned variable fixed to its value and removed from the scope,
    /// preserving the order of the remaining variables. `None` if every variable of the scope is
    /// assigned.
    ///
    /// # Errors
    /// * `BucketeerError::UnknownValue` if the evidence assigns a value outside a domain
    pub fn reduce(&self, evidence: &Assignment) -> Result<Option<Factor>> {
        let mut view = self.table.view();
        let mut scope = Vec::with_capacity(self.scope.len());

        // walk the axes from the back so the remaining axis numbers stay valid
        for (i, v) in self.scope.iter().enumerate().rev() {
            match evidence.get(v) {
                Some(&value) if value >= v.cardinality() => {
                    return Err(BucketeerError::UnknownValue {
                        variable: v.to_string(),
                        value: value.to_string()
                    });
                },
                Some(&value) => {
                    view = view.index_axis_move(Axis(i), value);
                },
                None => scope.push(*v)
            }
        }

        if scope.is_empty() {
            return Ok(None);
        } else if scope.len() == self.scope.len() {
            return Ok(Some(self.clone()));
        }

        scope.reverse();
        Ok(Some(Factor::from_table(scope, view.to_owned())))
    }


    /// Divide every value by the sum of the table
    ///
    /// # Errors
    /// * `BucketeerError::DegenerateDistribution` if the values sum to zero
    pub fn normalize(&self) -> Result<Factor> {
        let total = self.sum();
        if total == 0.0 || ! total.is_finite() {
            return Err(BucketeerError::DegenerateDistribution);
        }

        Ok(Factor::from_table(self.scope.clone(), &self.table / total))
    }


    /// `Factor` division. Calculates Psi(X, Y) = Phi1(X, Y) / Phi2(Y) where Phi1 = self and Phi2 =
    /// other.
    ///
    /// Defined in Koller & Friedman Section 10.3.1
    ///
    /// # Notes
    /// In the context of this operation, 0/0 is defined as 0. However, X/0, where X != 0, is still
    /// undefined.
    ///
    /// # Errors
    /// * `BucketeerError::InvalidScope` if other.scope() is not a subset of self.scope()
    /// * `BucketeerError::DivideByZero` if a divide by zero error is found
    pub fn divide(&self, other: &Factor) -> Result<Factor> {
        let positions = other.scope.iter()
                                   .map(|v| self.axis_of(v).map_err(|_| BucketeerError::InvalidScope))
                                   .collect::<Result<Vec<usize>>>()?;

        let shape: Vec<usize> = self.table.shape().to_vec();
        let mut counter = vec![0; shape.len()];
        let mut projected = vec![0; positions.len()];
        let mut values = Vec::with_capacity(self.len());

        for &numerator in self.table.iter() {
            for (slot, &pos) in projected.iter_mut().zip(&positions) {
                *slot = counter[pos];
            }

            let denominator = other.value_at(&projected);
            if denominator == 0.0 {
                if numerator == 0.0 {
                    values.push(0.0);
                } else {
                    return Err(BucketeerError::DivideByZero);
                }
            } else {
                values.push(numerator / denominator);
            }

            increment(&mut counter, &shape);
        }

        let table = Table::from_shape_vec(IxDyn(&shape), values)?;
        Ok(Factor::from_table(self.scope.clone(), table))
    }


    fn axis_of(&self, var: &Variable) -> Result<usize> {
        self.scope.iter().position(|v| v == var).ok_or(BucketeerError::OutOfScope)
    }

}

impl Potential for Factor {

    fn scope(&self) -> &[Variable] {
        &self.scope
    }

    fn value_at(&self, index: &[usize]) -> f64 {
        self.table[IxDyn(index)]
    }

}


/// Records, for every assignment of the remaining scope, which value of an eliminated variable
/// maximized the table it was eliminated from.
#[derive(Clone, Debug, PartialEq)]
pub struct BackwardPointer {
    /// The maximized `Variable`
    variable: Variable,

    /// The scope the pointer is indexed by
    scope: Vec<Variable>,

    /// The maximizing value of `variable` for each cell of the scope
    table: nd::ArrayD<usize>
}

impl BackwardPointer {

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn scope(&self) -> &[Variable] {
        &self.scope
    }

    /// The maximizing value of the pointer's variable, given values for its scope.
    ///
    /// A pointer with an empty scope holds one value and ignores the assignment.
    ///
    /// # Errors
    /// * `BucketeerError::OutOfScope` if the assignment does not cover the scope
    pub fn best(&self, assignment: &Assignment) -> Result<usize> {
        let index = project(&self.scope, assignment)?;
        Ok(self.table[IxDyn(&index)])
    }

}


/// Project an assignment onto an index tuple aligned with `scope`
fn project(scope: &[Variable], assignment: &Assignment) -> Result<Vec<usize>> {
    scope.iter()
         .map(|v| {
             assignment.get(v)
                       .cloned()
                       .filter(|&i| i < v.cardinality())
                       .ok_or(BucketeerError::OutOfScope)
         })
         .collect()
}


/// Advance a mixed-radix counter whose last digit varies fastest
fn increment(counter: &mut [usize], shape: &[usize]) {
    for (digit, &radix) in counter.iter_mut().zip(shape).rev() {
        *digit += 1;
        if *digit < radix {
            return;
        }
        *digit = 0;
    }
}


// Unit tests
#[cfg(test)]
mod tests {

    use super::*;
    use crate::variable::all_assignments;

    use approx::assert_abs_diff_eq;
    use itertools::iproduct;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn table_factor() {
        let vars = vec![ Variable::binary(0), Variable::new(1, 5), Variable::new(2, 3) ];
        let mut table = Table::ones(IxDyn(&[2, 5, 3]));
        table[[1, 1, 1].as_ref()] = 5.;

        // assert table holds correct values
        let f = Factor::new(vars.clone(), table, false).unwrap();

        for (x, y, z) in iproduct!(0..2, 0..5, 0..3) {
            let mut assn = Assignment::new();
            assn.set(&vars[0], x);
            assn.set(&vars[1], y);
            assn.set(&vars[2], z);

            let val = f.value(&assn).unwrap();
            if x == 1 && y == 1 && z == 1 {
                assert_eq!(5., val);
            } else {
                assert_eq!(1., val);
            }
        }

        assert!(! f.is_cpd());
        assert!(! f.is_scalar());
        assert_eq!(30, f.len());
    }

    #[test]
    fn table_factor_errs() {
        // empty scope
        let table = Table::ones(IxDyn(&[2, 5, 3]));
        match Factor::new(vec![], table, false) {
            Err(BucketeerError::General(_)) => (),
            _ => panic!("wrong error type")
        };

        // mismatched number of dimensions
        let vars = vec![ Variable::binary(0), Variable::binary(1) ];
        let table = Table::ones(IxDyn(&[2, 2, 2]));
        match Factor::new(vars.clone(), table, false) {
            Err(BucketeerError::General(_)) => (),
            _ => panic!("wrong error type")
        };

        // wrong cardinality
        let table = Table::ones(IxDyn(&[2, 3]));
        match Factor::new(vars.clone(), table, false) {
            Err(BucketeerError::General(_)) => (),
            _ => panic!("wrong error type")
        };

        // duplicate variable
        let table = Table::ones(IxDyn(&[2, 2]));
        match Factor::new(vec![vars[0], vars[0]], table, false) {
            Err(BucketeerError::DuplicateVariable(_)) => (),
            _ => panic!("wrong error type")
        };

        // not a cpd
        let table = Table::ones(IxDyn(&[2, 2]));
        match Factor::new(vars.clone(), table, true) {
            Err(BucketeerError::NotACPD) => (),
            _ => panic!("wrong error type")
        };

        // negative probability
        let table = array![[1.5, 0.5], [-0.5, 0.5]].into_dyn();
        match Factor::new(vars, table, true) {
            Err(BucketeerError::NegativeProbability) => (),
            _ => panic!("wrong error type")
        };
    }

    #[test]
    fn table_factor_cpd() {
        let a = Variable::binary(0);
        let b = Variable::new(1, 3);

        // each column (one per value of b) is a distribution over a
        let table = array![[0.5, 0.1, 1.0], [0.5, 0.9, 0.0]].into_dyn();
        let f = Factor::cpd(a, vec![b], table).expect("unexpected error");

        assert!(f.is_cpd());
        assert_eq!(&[a, b], f.scope());
    }

    #[test]
    fn value() {
        let vars = vec![ Variable::binary(0), Variable::binary(1) ];
        let f = Factor::from_values(vars.clone(), vec![0., 1., 2., 3.]).expect("Unexpected error");

        // verify behavior on precise assignment
        for (i, (x, y)) in iproduct!(0..2, 0..2).enumerate() {
            let mut assn = Assignment::new();
            assn.set(&vars[0], x);
            assn.set(&vars[1], y);

            assert_eq!(i as f64, f.value(&assn).expect("unexpected error"));
        }

        // verify behavior on full assignment with out of scope values
        let v3 = Variable::binary(2);
        for (i, (x, y)) in iproduct!(0..2, 0..2).enumerate() {
            let mut assn = Assignment::new();
            assn.set(&v3, 0);
            assn.set(&vars[1], y);
            assn.set(&vars[0], x);

            assert_eq!(i as f64, f.value(&assn).expect("unexpected error"));
        }

        // verify behavior on incomplete assignment
        let mut assn = Assignment::new();
        assn.set(&vars[0], 0);
        assn.set(&v3, 0);
        assert_eq!(Err(BucketeerError::OutOfScope), f.value(&assn));

        // and on a value outside the domain
        let mut assn = Assignment::new();
        assn.set(&vars[0], 0);
        assn.set(&vars[1], 2);
        assert_eq!(Err(BucketeerError::OutOfScope), f.value(&assn));
    }

    #[test]
    fn scalar() {
        let f = Factor::scalar(0.25);
        assert!(f.is_scalar());
        assert_eq!(Some(0.25), f.scalar_value());
        assert_eq!(Ok(0.25), f.value(&Assignment::new()));

        let g = Factor::ones(vec![Variable::binary(0)]).unwrap();
        assert_eq!(None, g.scalar_value());
    }

    #[test]
    /// Example taken from Koller & Friedman Figure 4.3
    fn combine() {
        let a = Variable::new(0, 3);
        let b = Variable::binary(1);
        let c = Variable::binary(2);

        let phi1 = Factor::from_values(vec![ a, b ], vec![ 0.5, 0.8, 0.1, 0., 0.3, 0.9 ])
                          .expect("Unexpected error");
        let phi2 = Factor::from_values(vec![ b, c ], vec![ 0.5, 0.7, 0.1, 0.2 ])
                          .expect("Unexpected error");

        let phi = Factor::combine(&[&phi1, &phi2]).expect("Unexpected error");
        assert_eq!(&[a, b, c], phi.scope());

        let expected = vec![ 0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18 ];
        for (val, exp) in phi.values().zip(expected) {
            assert_abs_diff_eq!(exp, *val, epsilon = 1e-12);
        }
    }

    #[test]
    fn combine_disjoint_and_scalar() {
        let a = Variable::binary(0);
        let b = Variable::binary(1);

        let phi1 = Factor::from_values(vec![a], vec![0.2, 0.8]).unwrap();
        let phi2 = Factor::from_values(vec![b], vec![0.5, 2.0]).unwrap();
        let half = Factor::scalar(0.5);

        let phi = Factor::combine(&[&phi1, &phi2, &half]).unwrap();
        assert_eq!(&[a, b], phi.scope());

        let expected = vec![0.05, 0.2, 0.2, 0.8];
        for (val, exp) in phi.values().zip(expected) {
            assert_abs_diff_eq!(exp, *val, epsilon = 1e-12);
        }

        let empty: Vec<Factor> = vec![];
        assert!(Factor::combine(&empty).is_err());
    }

    #[test]
    /// Example taken from Koller & Friedman Figure 9.7
    fn sum_out() {
        let a = Variable::new(0, 3);
        let b = Variable::binary(1);
        let c = Variable::binary(2);

        let phi = Factor::from_values(
            vec![a, b, c],
            vec![ 0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18 ]
        ).expect("Unexpected error");

        let marginalized = phi.sum_out(b).expect("Unexpected error");
        assert_eq!(&[a, c], marginalized.scope());

        let expected = array![[0.33, 0.51], [0.05, 0.07], [0.24, 0.39]];
        for (x, y) in iproduct!(0..3, 0..2) {
            let mut assn = Assignment::new();
            assn.set(&a, x);
            assn.set(&c, y);

            assert_abs_diff_eq!(expected[[x, y]], marginalized.value(&assn).unwrap(), epsilon = 1e-12);
        }

        // the total mass is unchanged
        assert_abs_diff_eq!(phi.sum(), marginalized.sum(), epsilon = 1e-12);

        // eliminating everything leaves a scalar
        let total = marginalized.sum_out(a).unwrap().sum_out(c).unwrap();
        assert_abs_diff_eq!(phi.sum(), total.scalar_value().unwrap(), epsilon = 1e-12);

        assert_eq!(Err(BucketeerError::OutOfScope), total.sum_out(a));
    }

    #[test]
    fn sum_out_row_sums() {
        let x = Variable::binary(0);
        let y = Variable::new(1, 3);

        let f = Factor::from_values(vec![x, y], vec![1., 2., 3., 4., 5., 6.]).unwrap();

        let rows = f.sum_out(y).unwrap();
        assert_eq!(&[x], rows.scope());
        assert_eq!(vec![6., 15.], rows.values().cloned().collect::<Vec<_>>());

        let cols = f.sum_out(x).unwrap();
        assert_eq!(vec![5., 7., 9.], cols.values().cloned().collect::<Vec<_>>());

        let kept = f.sum_out_all_except(&[y]).unwrap();
        assert_eq!(cols, kept);
    }

    #[test]
    fn max_out() {
        let x = Variable::binary(0);
        let y = Variable::new(1, 3);

        let f = Factor::from_values(vec![x, y], vec![0.1, 0.7, 0.2, 0.4, 0.4, 0.3]).unwrap();
        let (maxima, pointer) = f.max_out(y).unwrap();

        assert_eq!(&[x], maxima.scope());
        assert_eq!(vec![0.7, 0.4], maxima.values().cloned().collect::<Vec<_>>());
        assert_eq!(y, pointer.variable());
        assert_eq!(&[x], pointer.scope());

        // the pointer reproduces the maximizing value, taking the first one on ties
        for xv in 0..2 {
            let mut assn = Assignment::new();
            assn.set(&x, xv);
            let best = pointer.best(&assn).unwrap();

            assn.set(&y, best);
            assert_eq!(maxima.values().nth(xv).cloned().unwrap(), f.value(&assn).unwrap());
        }

        let mut assn = Assignment::new();
        assn.set(&x, 1);
        assert_eq!(0, pointer.best(&assn).unwrap());

        // eliminating the last variable leaves a one-value pointer
        let (top, last) = maxima.max_out(x).unwrap();
        assert_eq!(Some(0.7), top.scalar_value());
        assert_eq!(0, last.best(&Assignment::new()).unwrap());
    }

    #[test]
    /// Example take from Koller & Friedman Figure 4.5
    fn reduce_simple() {
        let a = Variable::new(0, 3);
        let b = Variable::binary(1);
        let c = Variable::binary(2);

        let phi = Factor::from_values(
            vec![a, b, c],
            vec![ 0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18 ]
        ).expect("Unexpected error");

        let mut assn = Assignment::new();
        assn.set(&c, 0);

        let expected = array![[0.25, 0.08], [0.05, 0.], [0.15, 0.09]];

        let reduced = phi.reduce(&assn).unwrap().unwrap();
        assert_eq!(&[a, b], reduced.scope());
        for (x, y) in iproduct!(0..3, 0..2) {
            let mut assn = Assignment::new();
            assn.set(&a, x);
            assn.set(&b, y);

            assert_eq!(expected[[x, y]], reduced.value(&assn).expect("unexpected error"));
        }
    }

    #[test]
    fn reduce_empty() {
        let a = Variable::binary(0);
        let b = Variable::binary(1);
        let c = Variable::binary(2);

        let phi = Factor::from_values(vec![a, b], vec![1., 0., 0., 1.]).expect("Unexpected error");

        let mut assn = Assignment::new();
        assn.set(&c, 1);

        let reduced = phi.reduce(&assn).unwrap().unwrap();
        assert_eq!(phi, reduced);
    }

    #[test]
    fn reduce_full() {
        let a = Variable::binary(0);
        let b = Variable::binary(1);
        let c = Variable::binary(2);

        let phi = Factor::from_values(vec![a, b], vec![1., 0., 0., 1.]).expect("Unexpected error");

        let mut assn = Assignment::new();
        assn.set(&a, 0);
        assn.set(&b, 0);
        assn.set(&c, 1);

        assert_eq!(None, phi.reduce(&assn).unwrap());
    }

    #[test]
    fn reduce_multiple() {
        let a = Variable::new(0, 3);
        let b = Variable::binary(1);
        let c = Variable::binary(2);

        let phi = Factor::from_values(
            vec![a, b, c],
            vec![ 0.25, 0.35, 0.08, 0.16, 0.05, 0.07, 0., 0., 0.15, 0.21, 0.09, 0.18 ]
        ).expect("Unexpected error");

        let mut assn = Assignment::new();
        assn.set(&c, 0);
        assn.set(&a, 2);

        let reduced = phi.reduce(&assn).unwrap().unwrap();
        assert_eq!(&[b], reduced.scope());
        assert_eq!(vec![0.15, 0.09], reduced.values().cloned().collect::<Vec<_>>());

        // values outside the domain are rejected
        let mut bad = Assignment::new();
        bad.set(&a, 3);
        assert!(phi.reduce(&bad).is_err());
    }

    #[test]
    fn normalize() {
        let a = Variable::binary(0);
        let f = Factor::from_values(vec![a], vec![1., 3.]).unwrap();

        let n = f.normalize().unwrap();
        assert_eq!(vec![0.25, 0.75], n.values().cloned().collect::<Vec<_>>());

        let z = Factor::from_values(vec![a], vec![0., 0.]).unwrap();
        assert_eq!(Err(BucketeerError::DegenerateDistribution), z.normalize());
    }

    #[test]
    /// Example taken from Koller & Friedman Figure 10.7
    fn divide() {
        let a = Variable::new(0, 3);
        let b = Variable::binary(1);

        let phi1 = Factor::new(vec![ a, b ], array![[ 0.5, 0.2 ], [ 0., 0. ], [ 0.3, 0.45 ]].into_dyn(), false)
                          .expect("Unexpected error");
        let phi2 = Factor::new(vec![ a ], array![ 0.8, 0., 0.6 ].into_dyn(), false)
                          .expect("Unexpected error");

        let phi = phi1.divide(&phi2).expect("Unexpected error");

        let expected = array![[0.625, 0.25], [0., 0.], [ 0.5, 0.75 ]];
        for (x, y) in iproduct!(0..3, 0..2) {
            let mut assn = Assignment::new();
            assn.set(&a, x);
            assn.set(&b, y);

            assert_abs_diff_eq!(expected[[x, y]], phi.value(&assn).unwrap(), epsilon = 1e-12);
        }
    }

    #[test]
    fn divide_errs() {
        let a = Variable::new(0, 3);
        let b = Variable::binary(1);

        let phi1 = Factor::new(vec![ a, b ], array![[ 0.5, 0.2 ], [ 0., 0. ], [ 0.3, 0.45 ]].into_dyn(), false)
                          .expect("Unexpected error");
        let phi2 = Factor::new(vec![ a ], array![ 0.8, 0., 0.6 ].into_dyn(), false)
                          .expect("Unexpected error");

        assert_eq!(Err(BucketeerError::InvalidScope), phi2.divide(&phi1));

        let zeros = Factor::new(vec![ a ], array![ 0., 0., 0. ].into_dyn(), false).unwrap();
        assert_eq!(Err(BucketeerError::DivideByZero), phi1.divide(&zeros));
    }

    fn assert_same_function(lhs: &Factor, rhs: &Factor, scope: &[Variable]) -> std::result::Result<(), TestCaseError> {
        for assn in all_assignments(scope) {
            let l = lhs.value(&assn).unwrap();
            let r = rhs.value(&assn).unwrap();
            prop_assert!((l - r).abs() < 1e-9, "{} != {}", l, r);
        }
        Ok(())
    }

    proptest! {

        #[test]
        fn combine_commutes(
            xs in prop::collection::vec(0.0f64..10.0, 6),
            ys in prop::collection::vec(0.0f64..10.0, 6)
        ) {
            let a = Variable::binary(0);
            let b = Variable::new(1, 3);
            let c = Variable::binary(2);

            let phi1 = Factor::from_values(vec![a, b], xs).unwrap();
            let phi2 = Factor::from_values(vec![b, c], ys).unwrap();

            let ab = Factor::combine(&[&phi1, &phi2]).unwrap();
            let ba = Factor::combine(&[&phi2, &phi1]).unwrap();

            prop_assert_eq!(&[a, b, c], ab.scope());
            prop_assert_eq!(&[b, c, a], ba.scope());
            assert_same_function(&ab, &ba, &[a, b, c])?;
        }

        #[test]
        fn combine_associates(
            xs in prop::collection::vec(0.0f64..10.0, 6),
            ys in prop::collection::vec(0.0f64..10.0, 6),
            zs in prop::collection::vec(0.0f64..10.0, 4)
        ) {
            let a = Variable::binary(0);
            let b = Variable::new(1, 3);
            let c = Variable::binary(2);

            let phi1 = Factor::from_values(vec![a, b], xs).unwrap();
            let phi2 = Factor::from_values(vec![b, c], ys).unwrap();
            let phi3 = Factor::from_values(vec![c, a], zs).unwrap();

            let nested = Factor::combine(&[phi1.clone(), Factor::combine(&[&phi2, &phi3]).unwrap()]).unwrap();
            let flat = Factor::combine(&[&phi1, &phi2, &phi3]).unwrap();

            assert_same_function(&nested, &flat, &[a, b, c])?;
        }

        #[test]
        fn sum_out_preserves_mass(xs in prop::collection::vec(0.0f64..10.0, 6)) {
            let x = Variable::binary(0);
            let y = Variable::new(1, 3);
            let f = Factor::from_values(vec![x, y], xs).unwrap();

            let total = f.sum_out(x).unwrap().sum();
            prop_assert!((total - f.sum()).abs() < 1e-9);
        }

        #[test]
        fn normalize_is_idempotent(xs in prop::collection::vec(0.01f64..10.0, 6)) {
            let x = Variable::binary(0);
            let y = Variable::new(1, 3);
            let f = Factor::from_values(vec![x, y], xs).unwrap();

            let once = f.normalize().unwrap();
            let twice = once.normalize().unwrap();

            prop_assert!((once.sum() - 1.0).abs() < 1e-9);
            assert_same_function(&once, &twice, &[x, y])?;
        }

        #[test]
        fn max_out_pointer_attains_max(xs in prop::collection::vec(0.0f64..10.0, 6)) {
            let x = Variable::binary(0);
            let y = Variable::new(1, 3);
            let f = Factor::from_values(vec![x, y], xs).unwrap();
            let (maxima, pointer) = f.max_out(y).unwrap();

            for xv in 0..2 {
                let mut assn = Assignment::new();
                assn.set(&x, xv);
                let best = maxima.value(&assn).unwrap();

                assn.set(&y, pointer.best(&assn).unwrap());
                prop_assert_eq!(best, f.value(&assn).unwrap());

                for yv in 0..3 {
                    assn.set(&y, yv);
                    prop_assert!(f.value(&assn).unwrap() <= best);
                }
            }
        }

    }
}
