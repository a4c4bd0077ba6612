//! Defines a `DirectedModel`, which is a Bayesian model that represents the factorization of
//! a probability distribution P, together with the evidence currently observed on it.

use crate::factor::Factor;
use crate::init::Initialization;
use crate::util::{BucketeerError, Result};
use crate::variable::{Assignment, Variable};

use bidir_map::BidirMap;
use indexmap::IndexMap;
use tracing::debug;

use std::collections::VecDeque;


/// Per-variable state that is not part of the factorization itself
#[derive(Clone, Debug)]
struct VariableNode {
    /// Ordered labels of the domain
    labels: Vec<String>,

    /// Explicit numeric value for each domain entry, if any
    numeric: Option<Vec<f64>>,

    /// Index of the observed value, if the variable is observed
    observed: Option<usize>,

    /// Participates in explanation (MPE) queries
    explanatory: bool,

    /// Internal variable that is never an objective and never reported
    transparent: bool
}


/// Represents a Bayesian Network - a Directed Probabilistic Graphical Model.
///
/// # Representation
/// The network is represented as a Directed Acyclic Graph (DAG). A traditional graph data
/// structure is not used for the simple representation of a `DirectedModel`; instead, the
/// Conditional Probability Distribution (CPD) of each `Variable` implicitly defines the edges of
/// the graph. `Variable`s are held in the order they were declared, and the `Variable` with index
/// ```i``` owns the ```i```th CPD.
///
/// # Evidence
/// Observations are stored on the model and are not copied into the CPDs. Every change to the
/// evidence or to the explanatory markers bumps `revision()`, which inference engines use to
/// discard stale results.
pub struct DirectedModel {

    /// The `Variable`s comprising the scope of the `DirectedModel` and their associated CPDs. Note
    /// that the `Factor` associated with a `Variable` ```X``` has scope ```[X, Pa(X)...]```, where
    /// ```Pa(X)``` are the parent's of ```X```. Therefore, in the DAG represented by this map,
    /// there are edges ```P -> X forall P in X.scope() where P != X```
    graph: IndexMap<Variable, Factor>,

    /// The user-defined names of each `Variable`. This is a two way lookup ```(`Variable`->Name)```
    /// and ```(Name->`Variable`)```
    names: BidirMap<Variable, String>,

    /// Domain labels and mutable state, indexed by `Variable::index()`
    nodes: Vec<VariableNode>,

    /// Optional utility over some subset of the `Variable`s
    utility: Option<Factor>,

    /// Incremented on every mutation of evidence or explanatory markers
    revision: u64

}

impl DirectedModel {

    /// Construct a `DirectedModel` from an already assembled network, as produced by a parser.
    ///
    /// # Args
    /// * `variables`: the name and ordered domain labels of each variable. The ```i```th entry is
    ///   the `Variable` with index ```i```.
    /// * `cpds`: one CPD per variable, aligned with `variables`. The first entry of each scope
    ///   must be the owning `Variable`.
    /// * `utility`: an optional utility `Factor`
    ///
    /// # Errors
    /// Any error `DirectedModelBuilder` reports, plus `BucketeerError::InvalidScope` if a CPD is
    /// not aligned with its variable.
    pub fn from_parts(
        variables: Vec<(String, Vec<String>)>,
        cpds: Vec<Factor>,
        utility: Option<Factor>
    ) -> Result<DirectedModel> {
        if variables.len() != cpds.len() {
            return Err(BucketeerError::General(
                format!("{} variables were declared but {} distributions given", variables.len(), cpds.len())
            ));
        }

        let mut builder = DirectedModelBuilder::new();
        let handles: Vec<Variable> = variables.iter()
                                              .map(|(name, labels)| {
                                                  let labels: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
                                                  builder.add_variable(name, &labels)
                                              })
                                              .collect();

        for (var, cpd) in handles.iter().zip(cpds) {
            if cpd.scope().first() != Some(var) {
                return Err(BucketeerError::InvalidScope);
            }

            let parents = cpd.scope()[1..].to_vec();
            builder.with_cpd(var, &parents, Initialization::Table(cpd));
        }

        if let Some(u) = utility {
            builder.with_utility_factor(u);
        }

        builder.build()
    }


    /// Lookup a `Variable` in the `DirectedModel` based on the name
    pub fn lookup_variable(&self, name: &str) -> Option<&Variable> {
        self.names.get_by_second(&String::from(name))
    }


    /// Resolve a name to its `Variable`
    ///
    /// # Errors
    /// * `BucketeerError::UnknownVariable` if no `Variable` has that name
    pub fn variable(&self, name: &str) -> Result<Variable> {
        self.lookup_variable(name)
            .cloned()
            .ok_or_else(|| BucketeerError::UnknownVariable(String::from(name)))
    }


    /// Lookup a `Variable`'s name in the `DirectedModel`.
    pub fn lookup_name(&self, var: &Variable) -> Option<&String> {
        self.names.get_by_first(var)
    }


    /// The name of a `Variable` of this model, or its default rendering for a foreign handle
    pub fn name(&self, var: &Variable) -> String {
        self.lookup_name(var).cloned().unwrap_or_else(|| var.to_string())
    }


    /// Get all `Variable`s in the model, in declaration order
    pub fn variables(&self) -> Vec<Variable> {
        self.graph.keys().cloned().collect()
    }


    /// Get the number of `Variable`s in the the `DirectedModel`
    pub fn num_variables(&self) -> usize {
        self.graph.len()
    }


    /// Check if `var` belongs to this model
    pub fn contains(&self, var: &Variable) -> bool {
        self.graph.contains_key(var)
    }


    /// Get the CPD for the given variable in this model.
    pub fn cpd(&self, v: &Variable) -> Option<&Factor> {
        self.graph.get(v)
    }


    /// Iterate over the CPDs in declaration order
    pub fn cpds(&self) -> impl Iterator<Item = &Factor> {
        self.graph.values()
    }


    /// The utility `Factor`, if the model has one
    pub fn utility(&self) -> Option<&Factor> {
        self.utility.as_ref()
    }


    /// The parents of `v`, in the order they appear in its CPD
    pub fn parents(&self, v: &Variable) -> Vec<Variable> {
        self.graph.get(v).map(|f| f.scope()[1..].to_vec()).unwrap_or_default()
    }


    /// The children of `v`, in declaration order
    pub fn children(&self, v: &Variable) -> Vec<Variable> {
        self.graph.iter()
                  .filter(|(_, f)| f.scope()[1..].contains(v))
                  .map(|(&c, _)| c)
                  .collect()
    }


    /// The ordered domain labels of `v`
    pub fn labels(&self, v: &Variable) -> &[String] {
        self.node(v).map(|n| n.labels.as_slice()).unwrap_or(&[])
    }


    /// Resolve a domain label of `v` to its index
    ///
    /// # Errors
    /// * `BucketeerError::UnknownValue` if `label` is not in the domain
    pub fn label_index(&self, v: &Variable, label: &str) -> Result<usize> {
        self.labels(v)
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| BucketeerError::UnknownValue { variable: self.name(v), value: String::from(label) })
    }


    /// The numeric value of each domain entry of `v`.
    ///
    /// Explicit values take precedence. Otherwise the labels are used if every one of them parses
    /// as a number, and the domain indices are used if not.
    pub fn numeric_values(&self, v: &Variable) -> Vec<f64> {
        let node = match self.node(v) {
            Some(node) => node,
            None => return vec![]
        };

        if let Some(ref values) = node.numeric {
            return values.clone();
        }

        let parsed: std::result::Result<Vec<f64>, _> = node.labels.iter().map(|l| l.trim().parse::<f64>()).collect();
        parsed.unwrap_or_else(|_| (0..node.labels.len()).map(|i| i as f64).collect())
    }


    /// Observe `name` at the value labelled `label`
    ///
    /// # Errors
    /// * `BucketeerError::UnknownVariable` or `BucketeerError::UnknownValue` if either does not
    ///   resolve
    pub fn observe(&mut self, name: &str, label: &str) -> Result<()> {
        let var = self.variable(name)?;
        let index = self.label_index(&var, label)?;
        self.observe_index(&var, index)
    }


    /// Observe `var` at the given domain index
    ///
    /// # Errors
    /// * `BucketeerError::UnknownVariable` if `var` is not in the model
    /// * `BucketeerError::UnknownValue` if `index` is outside the domain
    pub fn observe_index(&mut self, var: &Variable, index: usize) -> Result<()> {
        if index >= var.cardinality() {
            return Err(BucketeerError::UnknownValue { variable: self.name(var), value: index.to_string() });
        }

        let name = self.name(var);
        let node = self.node_mut(var)?;
        node.observed = Some(index);
        self.revision += 1;

        debug!(variable = %name, index, "observed");
        Ok(())
    }


    /// Remove the observation on `name`, if any
    pub fn clear_observation(&mut self, name: &str) -> Result<()> {
        let var = self.variable(name)?;
        let node = self.node_mut(&var)?;
        if node.observed.take().is_some() {
            self.revision += 1;
        }

        Ok(())
    }


    /// Remove every observation
    pub fn clear_evidence(&mut self) {
        for node in self.nodes.iter_mut() {
            node.observed = None;
        }
        self.revision += 1;
    }


    /// The observed index of `v`, if it is observed
    pub fn observed(&self, v: &Variable) -> Option<usize> {
        self.node(v).and_then(|n| n.observed)
    }


    pub fn is_observed(&self, v: &Variable) -> bool {
        self.observed(v).is_some()
    }


    /// The current evidence as a partial `Assignment`, in declaration order
    pub fn evidence(&self) -> Assignment {
        self.graph.keys()
                  .filter_map(|v| self.observed(v).map(|i| (*v, i)))
                  .collect()
    }


    /// Mark or unmark `name` as explanatory. Transparent variables cannot be explanatory.
    pub fn set_explanatory(&mut self, name: &str, explanatory: bool) -> Result<()> {
        let var = self.variable(name)?;
        let node = self.node_mut(&var)?;
        if node.transparent && explanatory {
            return Err(BucketeerError::General(format!("transparent variable `{}` cannot be explanatory", name)));
        }

        node.explanatory = explanatory;
        self.revision += 1;
        Ok(())
    }


    pub fn is_explanatory(&self, v: &Variable) -> bool {
        self.node(v).map(|n| n.explanatory).unwrap_or(false)
    }


    pub fn is_transparent(&self, v: &Variable) -> bool {
        self.node(v).map(|n| n.transparent).unwrap_or(false)
    }


    /// The `Variable`s currently marked explanatory, in declaration order
    pub fn explanatory_variables(&self) -> Vec<Variable> {
        self.graph.keys().filter(|v| self.is_explanatory(v)).cloned().collect()
    }


    /// The number of mutations of evidence or explanatory markers so far
    pub fn revision(&self) -> u64 {
        self.revision
    }


    /// Determine the probability of a full `Assignment` to the `Variable`s in the `DirectedModel`.
    ///
    /// Specifically, this computes ```P(zeta)```, where ```zeta``` is a full assignment, by the
    /// chain rule. Evidence is not taken into account.
    ///
    /// # Errors
    /// * `BucketeerError::OutOfScope` if the assignment is not complete
    pub fn probability(&self, assignment: &Assignment) -> Result<f64> {
        // for every variable in the graph
        self.graph.values()
                  // get the probability of the assignment
                  .map(|cpt| cpt.value(assignment))
                  // and multiply those probability by the chain rule
                  // but if there are any errors, just return the error
                  .fold(Ok(1.0), |acc, val| acc.and_then(|p| val.map(|v| p * v)))
    }


    fn node(&self, v: &Variable) -> Option<&VariableNode> {
        if self.graph.contains_key(v) {
            self.nodes.get(v.index())
        } else {
            None
        }
    }


    fn node_mut(&mut self, v: &Variable) -> Result<&mut VariableNode> {
        if ! self.graph.contains_key(v) {
            return Err(BucketeerError::UnknownVariable(v.to_string()));
        }

        self.nodes.get_mut(v.index()).ok_or_else(|| BucketeerError::UnknownVariable(v.to_string()))
    }

}


/// An implementation of the [builder pattern] for creating a `DirectedModel`.
///
/// `Variable`s are declared first, in any order, and receive their handles from `add_variable`.
/// CPDs may then reference any declared `Variable` as a parent; acyclicity is checked by `build`.
/// The first error encountered is kept and reported by `build`; later calls are ignored.
///
/// [builder pattern]: https://en.wikipedia.org/wiki/Builder_pattern
pub struct DirectedModelBuilder {

    /// The declared `Variable`s, by index
    handles: Vec<Variable>,

    /// The `Variable`s and their associated CPDs
    factors: IndexMap<Variable, Factor>,

    /// The names of each `Variable`
    names: BidirMap<Variable, String>,

    /// Labels and markers of each `Variable`
    nodes: Vec<VariableNode>,

    /// The utility `Factor`
    utility: Option<Factor>,

    /// The error state of the builder
    err: Option<BucketeerError>

}


impl DirectedModelBuilder {

    /// Construct a new `DirectedModelBuilder` representing an empty `DirectedModel`
    pub fn new() -> Self {
        DirectedModelBuilder {
            handles: Vec::new(),
            factors: IndexMap::new(),
            names: BidirMap::new(),
            nodes: Vec::new(),
            utility: None,
            err: None
        }
    }


    /// Declare a named `Variable` with the given ordered domain labels.
    ///
    /// # Returns
    /// the handle of the new `Variable`. A handle is returned even if the declaration is invalid;
    /// the error is then reported by `build`.
    pub fn add_variable(&mut self, name: &str, labels: &[&str]) -> Variable {
        let var = Variable::new(self.handles.len(), labels.len().max(1));
        self.handles.push(var);
        self.nodes.push(VariableNode {
            labels: labels.iter().map(|&l| String::from(l)).collect(),
            numeric: None,
            observed: None,
            explanatory: false,
            transparent: false
        });

        if self.err.is_some() {
            return var;
        }

        if labels.is_empty() {
            self.err = Some(BucketeerError::General(format!("variable `{}` has an empty domain", name)));
        } else if self.names.get_by_second(&String::from(name)).is_some() {
            self.err = Some(BucketeerError::DuplicateVariable(String::from(name)));
        } else {
            self.names.insert(var, String::from(name));
        }

        var
    }


    /// Attach the CPD of a declared `Variable`.
    ///
    /// # Args
    /// * `var`: the variable the CPD is over
    /// * `parents`: the parent variables, in the order of the CPD's axes. They must be declared.
    /// * `init`: the initialization mechanism for the CPD of `var` in the model.
    pub fn with_cpd(&mut self, var: &Variable, parents: &[Variable], init: Initialization) -> &mut Self {
        ///////////////////////////////////////////////////////////////////////
        // 1) if we are in an error state, do nothing
        if self.err.is_some() {
            return self;
        }

        ///////////////////////////////////////////////////////////////////////
        // 2) Check for error conditions
        if ! self.is_declared(var) {
            self.err = Some(BucketeerError::UnknownVariable(var.to_string()));
            return self;
        }

        if parents.iter().any(|v| ! self.is_declared(v)) {
            self.err = Some(BucketeerError::MissingParent);
            return self;
        }

        if self.factors.contains_key(var) {
            self.err = Some(BucketeerError::DuplicateVariable(self.name_of(var)));
            return self;
        }

        ///////////////////////////////////////////////////////////////////////
        // 3) Build the factor based on the initialization
        match init.build_cpd(*var, parents.to_vec()) {
            Ok(factor) => {
                self.factors.insert(*var, factor);
            },
            Err(e) => {
                self.err = Some(e);
            }
        }

        self
    }


    /// Assign explicit numeric values to the domain of `var`, used by expectation queries
    pub fn with_numeric_values(&mut self, var: &Variable, values: &[f64]) -> &mut Self {
        if self.err.is_some() {
            return self;
        }

        if ! self.is_declared(var) {
            self.err = Some(BucketeerError::UnknownVariable(var.to_string()));
        } else if values.len() != var.cardinality() {
            self.err = Some(BucketeerError::InvalidInitialization);
        } else {
            self.nodes[var.index()].numeric = Some(values.to_vec());
        }

        self
    }


    /// Mark `var` as explanatory
    pub fn with_explanatory(&mut self, var: &Variable) -> &mut Self {
        self.mark(var, |node| node.explanatory = true)
    }


    /// Mark `var` as transparent
    pub fn with_transparent(&mut self, var: &Variable) -> &mut Self {
        self.mark(var, |node| node.transparent = true)
    }


    /// Attach a utility over `scope`, given as row-major values
    pub fn with_utility(&mut self, scope: &[Variable], values: Vec<f64>) -> &mut Self {
        if self.err.is_some() {
            return self;
        }

        match Factor::from_values(scope.to_vec(), values) {
            Ok(f) => self.with_utility_factor(f),
            Err(e) => {
                self.err = Some(e);
                self
            }
        }
    }


    /// Attach an already constructed utility `Factor`
    pub fn with_utility_factor(&mut self, utility: Factor) -> &mut Self {
        if self.err.is_some() {
            return self;
        }

        if utility.scope().iter().any(|v| ! self.is_declared(v)) {
            self.err = Some(BucketeerError::InvalidScope);
        } else {
            self.utility = Some(utility);
        }

        self
    }


    /// Complete building the model.
    ///
    /// # Returns
    /// the `DirectedModel`, or an error if one was generated during the building process
    ///
    /// # Errors
    /// * the first error recorded by the builder
    /// * `BucketeerError::General` if a declared `Variable` has no CPD
    /// * `BucketeerError::CyclicNetwork` if the parent structure has a directed cycle
    ///
    /// # Postcondition
    /// This call consumes the `DirectedModelBuilder`
    pub fn build(self) -> Result<DirectedModel> {
        if let Some(e) = self.err {
            return Err(e);
        }

        if let Some(missing) = self.handles.iter().find(|v| ! self.factors.contains_key(*v)) {
            return Err(BucketeerError::General(format!("variable `{}` has no distribution", self.name_of(missing))));
        }

        // hold the CPDs in declaration order
        let mut graph = IndexMap::with_capacity(self.handles.len());
        let mut factors = self.factors;
        for v in self.handles.iter() {
            if let Some(f) = factors.swap_remove(v) {
                graph.insert(*v, f);
            }
        }

        check_acyclic(&graph, &self.names)?;

        debug!(variables = graph.len(), utility = self.utility.is_some(), "built directed model");

        Ok(DirectedModel {
            graph,
            names: self.names,
            nodes: self.nodes,
            utility: self.utility,
            revision: 0
        })
    }


    fn is_declared(&self, var: &Variable) -> bool {
        self.handles.get(var.index()) == Some(var)
    }


    fn name_of(&self, var: &Variable) -> String {
        self.names.get_by_first(var).cloned().unwrap_or_else(|| var.to_string())
    }


    fn mark<F: FnOnce(&mut VariableNode)>(&mut self, var: &Variable, f: F) -> &mut Self {
        if self.err.is_some() {
            return self;
        }

        if self.is_declared(var) {
            f(&mut self.nodes[var.index()]);
        } else {
            self.err = Some(BucketeerError::UnknownVariable(var.to_string()));
        }

        self
    }

}


/// Kahn's algorithm over the parent structure; fails on the first variable left on a cycle
fn check_acyclic(graph: &IndexMap<Variable, Factor>, names: &BidirMap<Variable, String>) -> Result<()> {
    let mut indegree: IndexMap<Variable, usize> = graph.iter()
                                                       .map(|(v, f)| (*v, f.scope().len() - 1))
                                                       .collect();

    let mut ready: VecDeque<Variable> = indegree.iter()
                                                .filter(|(_, &d)| d == 0)
                                                .map(|(&v, _)| v)
                                                .collect();
    let mut seen = 0;

    while let Some(v) = ready.pop_front() {
        seen += 1;
        for (child, f) in graph.iter() {
            if f.scope()[1..].contains(&v) {
                if let Some(d) = indegree.get_mut(child) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*child);
                    }
                }
            }
        }
    }

    if seen == graph.len() {
        return Ok(());
    }

    let stuck = indegree.iter().find(|(_, &d)| d > 0).map(|(v, _)| *v);
    let name = stuck.and_then(|v| names.get_by_first(&v).cloned()).unwrap_or_default();
    Err(BucketeerError::CyclicNetwork(name))
}
