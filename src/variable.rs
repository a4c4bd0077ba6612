//! Definition of the variable module
//!
//! A `Variable` represents a discrete random variable in a Bayesian network. The handle itself is
//! lightweight: it carries the stable index of the variable within its `DirectedModel` and the
//! size of its domain. Names, labels, and observation state are held by the model.

use indexmap::IndexMap;
use itertools::Itertools;

use std::fmt;
use std::iter;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    /// Position of the `Variable` within its model
    index: usize,

    /// Number of values in the domain of the `Variable`
    cardinality: usize
}

impl Variable {

    /// Construct a new `Variable` handle.
    ///
    /// Handles are normally produced by a `DirectedModelBuilder`; constructing one directly is
    /// useful when working with `Factor`s outside of a model.
    ///
    /// # Panics
    /// If `cardinality` is zero. A variable must have at least one value.
    pub fn new(index: usize, cardinality: usize) -> Variable {
        assert!(cardinality > 0, "a variable needs at least one value");
        Variable { index, cardinality }
    }

    /// Construct a new binary `Variable` handle
    pub fn binary(index: usize) -> Variable {
        Variable::new(index, 2)
    }

    /// The index of the `Variable` in its model
    pub fn index(&self) -> usize {
        self.index
    }

    /// The number of values the `Variable` can take on
    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

}

impl fmt::Display for Variable {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "X{}", self.index)
    }

}


/// A (possibly partial) assignment of domain indices to `Variable`s.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assignment {
    values: IndexMap<Variable, usize>
}

impl Assignment {

    /// Construct an empty `Assignment`
    pub fn new() -> Self {
        Assignment { values: IndexMap::new() }
    }

    /// Assign `value` to `var`, replacing any previous value
    pub fn set(&mut self, var: &Variable, value: usize) {
        self.values.insert(*var, value);
    }

    /// Get the value assigned to `var`, if any
    pub fn get(&self, var: &Variable) -> Option<&usize> {
        self.values.get(var)
    }

    /// Remove `var` from the `Assignment`, returning its value
    pub fn remove(&mut self, var: &Variable) -> Option<usize> {
        self.values.shift_remove(var)
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.values.contains_key(var)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the assigned `(Variable, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &usize)> {
        self.values.iter()
    }

    /// The assigned `Variable`s in insertion order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.values.keys()
    }

}

impl iter::FromIterator<(Variable, usize)> for Assignment {

    fn from_iter<I: IntoIterator<Item = (Variable, usize)>>(iter: I) -> Self {
        Assignment { values: iter.into_iter().collect() }
    }

}


/// Enumerate every complete `Assignment` to `scope`.
///
/// Assignments are produced in row-major order: the last `Variable` of the scope varies fastest.
/// An empty scope has exactly one (empty) assignment.
pub fn all_assignments(scope: &[Variable]) -> Box<dyn Iterator<Item = Assignment>> {
    if scope.is_empty() {
        return Box::new(iter::once(Assignment::new()));
    }

    let ranges: Vec<_> = scope.iter().map(|v| 0..v.cardinality()).collect();
    let scope = scope.to_vec();
    let assignments = ranges.into_iter()
                           .multi_cartesian_product()
                           .map(move |values| {
                               scope.iter().cloned().zip(values).collect()
                           });

    Box::new(assignments)
}
