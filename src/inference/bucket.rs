//! Buckets and the bucket tree.
//!
//! A `BucketTree` holds one `Bucket` per variable of an `Ordering`. Every distribution of the
//! network, reduced by the evidence, is placed in the first bucket (in elimination order) whose
//! variable it mentions. Reducing a bucket combines its factors and eliminates its variable; the
//! resulting separator is placed by the same rule into a later bucket, which becomes the parent of
//! the bucket. The buckets and these links form the tree.
//!
//! Buckets live in a vector and refer to their parent and children by position.

use super::explanation::MostProbableExplanation;
use super::interrupt::{Interrupt, Never};
use super::ordering::Ordering;
use super::trace::{BucketTrace, FactorTrace, TreeTrace};
use super::ExplanationStatus;
use crate::factor::{BackwardPointer, Factor};
use crate::model::DirectedModel;
use crate::util::{BucketeerError, Result};
use crate::variable::{Assignment, Variable};

use tracing::{debug, trace};

use std::collections::HashMap;
use std::rc::Rc;


/// Lifecycle of a `Bucket`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketStatus {
    /// Factors assigned, nothing computed yet
    Empty,

    /// The bucket variable has been eliminated
    Reduced,

    /// The bucket's cluster holds its posterior after the downward pass
    Distributed
}


/// Where a factor held by a `Bucket` comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactorOrigin {
    /// The distribution of an unobserved variable
    Distribution,

    /// The distribution of an observed variable, which only conditions its parents
    Likelihood,

    /// The utility of the model
    Utility,

    /// The separator of the bucket at the given position
    Separator(usize)
}


#[derive(Clone, Debug)]
struct Entry {
    factor: Rc<Factor>,
    origin: FactorOrigin
}


/// The factors that mention one variable when it is eliminated
#[derive(Clone, Debug)]
pub struct Bucket {
    /// The bucket variable
    variable: Variable,

    /// `true` if the bucket variable is maximized rather than summed out
    explanatory: bool,

    /// Assigned factors, including separators of children
    entries: Vec<Entry>,

    /// The message sent to the parent, if the bucket had one
    separator: Option<Rc<Factor>>,

    /// Combination of every factor of the bucket, after reduction; the normalized posterior over
    /// the same scope after distribution
    cluster: Option<Factor>,

    /// The maximizing values of the bucket variable, for explanatory buckets
    pointer: Option<BackwardPointer>,

    status: BucketStatus,

    /// Position of the bucket that received the separator
    parent: Option<usize>,

    /// Positions of the buckets whose separators were received
    children: Vec<usize>
}

impl Bucket {

    fn new(variable: Variable, explanatory: bool) -> Self {
        Bucket {
            variable,
            explanatory,
            entries: vec![],
            separator: None,
            cluster: None,
            pointer: None,
            status: BucketStatus::Empty,
            parent: None,
            children: vec![]
        }
    }

    pub fn variable(&self) -> Variable {
        self.variable
    }

    pub fn is_explanatory(&self) -> bool {
        self.explanatory
    }

    /// The factors held by the bucket, in insertion order
    pub fn factors(&self) -> impl Iterator<Item = &Factor> {
        self.entries.iter().map(|e| e.factor.as_ref())
    }

    /// Where each factor of the bucket comes from, aligned with `factors()`
    pub fn origins(&self) -> impl Iterator<Item = FactorOrigin> + '_ {
        self.entries.iter().map(|e| e.origin)
    }

    pub fn num_factors(&self) -> usize {
        self.entries.len()
    }

    pub fn separator(&self) -> Option<&Factor> {
        self.separator.as_ref().map(|s| s.as_ref())
    }

    pub fn cluster(&self) -> Option<&Factor> {
        self.cluster.as_ref()
    }

    pub fn backward_pointer(&self) -> Option<&BackwardPointer> {
        self.pointer.as_ref()
    }

    pub fn status(&self) -> BucketStatus {
        self.status
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

}


/// One elimination of the network along an `Ordering`
pub struct BucketTree {
    buckets: Vec<Bucket>,

    /// Position of each ordered `Variable`
    positions: HashMap<Variable, usize>,

    objective: Variable,

    status: ExplanationStatus,

    /// Keep the combination of every bucket, so the tree can be distributed
    produce_clusters: bool,

    /// Product of every value dropped from the elimination: fully reduced distributions and
    /// scalar separators
    constant: f64,

    /// The unnormalized result over the objective, once reduced
    result: Option<Factor>,

    /// The observed value of the objective, for a trivial ordering
    observed_objective: Option<usize>,

    evidence: Assignment,

    distributed: bool
}

impl BucketTree {

    /// Construct the tree for `ordering` and assign every distribution to its bucket.
    ///
    /// # Args
    /// * `model`: the network, with its current evidence
    /// * `ordering`: the elimination order
    /// * `produce_clusters`: keep bucket clusters so that `distribute` can run
    /// * `include_utility`: place the utility of the model as one more factor
    ///
    /// # Errors
    /// * `BucketeerError::MissingUtility` if the utility is requested but absent
    /// * `BucketeerError::InvalidTreeState` if a reduced distribution mentions a variable outside
    ///   of the ordering
    pub fn new(
        model: &DirectedModel,
        ordering: &Ordering,
        produce_clusters: bool,
        include_utility: bool
    ) -> Result<Self> {
        let status = ordering.status();
        let buckets = ordering.order()
                              .iter()
                              .map(|v| Bucket::new(*v, status.explains(model, v)))
                              .collect();
        let positions = ordering.order().iter().enumerate().map(|(i, v)| (*v, i)).collect();

        let mut tree = BucketTree {
            buckets,
            positions,
            objective: ordering.objective(),
            status,
            produce_clusters,
            constant: 1.0,
            result: None,
            observed_objective: None,
            evidence: model.evidence(),
            distributed: false
        };

        if ordering.is_trivial() {
            tree.observed_objective = model.observed(&tree.objective);
            return Ok(tree);
        }

        let utility = if include_utility {
            Some(model.utility().ok_or(BucketeerError::MissingUtility)?)
        } else {
            None
        };

        let distributions = ordering.order()
                                    .iter()
                                    .filter_map(|v| model.cpd(v).map(|f| (f, origin_of(model, v))));

        for (factor, origin) in distributions.chain(utility.map(|u| (u, FactorOrigin::Utility))) {
            match factor.reduce(&tree.evidence)? {
                None => tree.constant *= factor.value(&tree.evidence)?,
                // an observed variable kept only to condition its children; its own distribution
                // reaches outside a pruned order and does not depend on the objective
                Some(ref reduced) if origin == FactorOrigin::Likelihood && ! reduced.scope().iter().all(|v| tree.covers(v)) => {
                    trace!(scope = reduced.scope().len(), "skipped likelihood outside the order");
                },
                Some(reduced) => {
                    tree.place(Rc::new(reduced), origin)?;
                }
            }
        }

        debug!(
            buckets = tree.buckets.len(),
            objective = %model.name(&tree.objective),
            constant = tree.constant,
            "constructed bucket tree"
        );

        Ok(tree)
    }


    /// Put `factor` in the first bucket whose variable it mentions
    fn place(&mut self, factor: Rc<Factor>, origin: FactorOrigin) -> Result<usize> {
        let mut target: Option<usize> = None;
        for v in factor.scope() {
            let position = self.positions
                               .get(v)
                               .cloned()
                               .ok_or_else(|| BucketeerError::InvalidTreeState(format!("`{}` is not covered by the order", v)))?;
            target = Some(target.map_or(position, |t| t.min(position)));
        }

        let target = target.ok_or_else(|| BucketeerError::InvalidTreeState(String::from("cannot place a factor with an empty scope")))?;

        trace!(target, scope = factor.scope().len(), ?origin, "placed factor");
        self.buckets[target].entries.push(Entry { factor, origin });
        Ok(target)
    }


    /// Reduce every bucket in order.
    ///
    /// # Returns
    /// the unnormalized result over the objective. Its total is the probability of the evidence
    /// (or, with the utility placed, the utility weighted by that probability).
    pub fn reduce(&mut self) -> Result<&Factor> {
        self.reduce_with(&Never)
    }


    /// Reduce every bucket in order, asking `interrupt` before each one.
    ///
    /// Reducing an already reduced tree returns the stored result.
    ///
    /// # Errors
    /// * `BucketeerError::Interrupted` if the interrupt fired; the tree must then be discarded
    /// * any error of the factor algebra
    pub fn reduce_with(&mut self, interrupt: &dyn Interrupt) -> Result<&Factor> {
        if self.result.is_none() {
            self.run_reduction(interrupt)?;
        }

        self.result.as_ref().ok_or_else(|| BucketeerError::InvalidTreeState(String::from("reduction produced no result")))
    }


    fn run_reduction(&mut self, interrupt: &dyn Interrupt) -> Result<()> {
        if let Some(index) = self.observed_objective {
            let mut values = vec![0.0; self.objective.cardinality()];
            values[index] = 1.0;
            self.result = Some(Factor::from_values(vec![self.objective], values)?);
            for bucket in self.buckets.iter_mut() {
                bucket.status = BucketStatus::Reduced;
            }
            return Ok(());
        }

        let total = self.buckets.len();
        for i in 0..total {
            if interrupt.should_interrupt(i, total) {
                debug!(bucket = i, total, "reduction interrupted");
                return Err(BucketeerError::Interrupted { bucket: i, total });
            }

            self.reduce_bucket(i, i + 1 == total)?;
        }

        debug!(constant = self.constant, "reduced bucket tree");
        Ok(())
    }


    fn reduce_bucket(&mut self, i: usize, terminal: bool) -> Result<()> {
        let variable = self.buckets[i].variable;
        let explanatory = self.buckets[i].explanatory;

        ///////////////////////////////////////////////////////////////////////
        // 1) Combine everything the bucket holds
        let combined = if self.buckets[i].entries.is_empty() {
            None
        } else {
            let factors: Vec<&Rc<Factor>> = self.buckets[i].entries.iter().map(|e| &e.factor).collect();
            Some(Factor::combine(&factors)?)
        };

        let combined = match combined {
            Some(combined) => combined,
            None => {
                // only observed variables end up with nothing to eliminate
                self.buckets[i].status = BucketStatus::Reduced;
                if terminal {
                    self.result = Some(Factor::ones(vec![variable])?.scale(self.constant));
                }
                return Ok(());
            }
        };

        trace!(
            variable = %variable,
            factors = self.buckets[i].entries.len(),
            scope = combined.scope().len(),
            explanatory,
            "reducing bucket"
        );

        if self.produce_clusters {
            self.buckets[i].cluster = Some(combined.clone());
        }

        ///////////////////////////////////////////////////////////////////////
        // 2) The terminal bucket keeps its combination as the result
        if terminal {
            if explanatory {
                let (_, pointer) = combined.max_out(variable)?;
                self.buckets[i].pointer = Some(pointer);
            }

            self.result = Some(combined.scale(self.constant));
            self.buckets[i].status = BucketStatus::Reduced;
            return Ok(());
        }

        ///////////////////////////////////////////////////////////////////////
        // 3) Eliminate the bucket variable and pass the separator on
        let separator = if explanatory {
            let (separator, pointer) = combined.max_out(variable)?;
            self.buckets[i].pointer = Some(pointer);
            separator
        } else {
            combined.sum_out(variable)?
        };

        let separator = Rc::new(separator);
        if let Some(value) = separator.scalar_value() {
            self.constant *= value;
        } else {
            let target = self.place(Rc::clone(&separator), FactorOrigin::Separator(i))?;
            self.buckets[i].parent = Some(target);
            self.buckets[target].children.push(i);
        }

        self.buckets[i].separator = Some(separator);
        self.buckets[i].status = BucketStatus::Reduced;
        Ok(())
    }


    /// Walk the tree from the terminal bucket back to the first, turning every cluster into the
    /// posterior over its scope.
    ///
    /// Each bucket receives the posterior of its parent, marginalized onto its separator and
    /// divided by the separator it sent.
    ///
    /// # Errors
    /// * `BucketeerError::InvalidTreeState` unless the tree is reduced, has more than one bucket,
    ///   was built with clusters, and holds no backward pointers
    pub fn distribute(&mut self) -> Result<()> {
        if self.result.is_none() {
            return Err(BucketeerError::InvalidTreeState(String::from("the tree must be reduced before it is distributed")));
        } else if self.buckets.len() < 2 {
            return Err(BucketeerError::InvalidTreeState(String::from("a single bucket cannot be distributed")));
        } else if ! self.produce_clusters || self.observed_objective.is_some() {
            return Err(BucketeerError::InvalidTreeState(String::from("the tree was built without clusters")));
        } else if self.buckets.iter().any(|b| b.pointer.is_some()) {
            return Err(BucketeerError::InvalidTreeState(String::from("a maximized tree cannot be distributed")));
        }

        if self.distributed {
            return Ok(());
        }

        let last = self.buckets.len() - 1;
        let belief = match self.result {
            Some(ref result) => result.normalize()?,
            None => return Err(BucketeerError::InvalidTreeState(String::from("missing result")))
        };
        self.buckets[last].cluster = Some(belief);
        self.buckets[last].status = BucketStatus::Distributed;

        for i in (0..last).rev() {
            let belief = {
                let bucket = &self.buckets[i];
                match bucket.cluster {
                    None => None,
                    Some(ref own) => {
                        let belief = match (bucket.parent, bucket.separator.as_ref()) {
                            (Some(p), Some(separator)) => {
                                let parent = self.buckets[p]
                                                 .cluster
                                                 .as_ref()
                                                 .ok_or_else(|| BucketeerError::InvalidTreeState(String::from("parent has no cluster")))?;

                                let message = parent.sum_out_all_except(separator.scope())?.divide(separator)?;
                                Factor::combine(&[own, &message])?.normalize()?
                            },
                            // nothing flows back into an independent part of the network
                            _ => own.normalize()?
                        };
                        Some(belief)
                    }
                }
            };

            let bucket = &mut self.buckets[i];
            if belief.is_some() {
                bucket.cluster = belief;
            }
            bucket.status = BucketStatus::Distributed;
        }

        self.distributed = true;
        debug!(buckets = self.buckets.len(), "distributed bucket tree");
        Ok(())
    }


    /// The posterior of `var`, taken from the result for the objective and from the distributed
    /// clusters for every other covered variable
    ///
    /// # Errors
    /// * `BucketeerError::InvalidTreeState` if `var` is not covered, or is not the objective and
    ///   the tree has not been distributed
    pub fn marginal(&self, var: &Variable) -> Result<Factor> {
        if *var == self.objective {
            return self.normalized_result();
        }

        let position = self.position(var)
                           .ok_or_else(|| BucketeerError::InvalidTreeState(format!("`{}` is not covered by the tree", var)))?;

        if ! self.distributed {
            return Err(BucketeerError::InvalidTreeState(String::from("the tree has not been distributed")));
        }

        match self.buckets[position].cluster {
            Some(ref cluster) if cluster.contains(var) => cluster.sum_out_all_except(&[*var])?.normalize(),
            _ => Err(BucketeerError::InvalidTreeState(format!("no cluster mentions `{}`", var)))
        }
    }


    /// The result, normalized into the posterior of the objective
    pub fn normalized_result(&self) -> Result<Factor> {
        match self.result {
            Some(ref result) => result.normalize(),
            None => Err(BucketeerError::InvalidTreeState(String::from("the tree has not been reduced")))
        }
    }


    /// The total of the unnormalized result, once reduced
    pub fn total(&self) -> Option<f64> {
        self.result.as_ref().map(|r| r.sum())
    }


    /// Follow the backward pointers from the last bucket to the first.
    ///
    /// # Returns
    /// the maximizing value of every explained variable, the evidence for observed variables, and
    /// the probability of that assignment jointly with the evidence
    pub fn most_probable(&self, model: &DirectedModel) -> Result<MostProbableExplanation> {
        let result = self.result
                         .as_ref()
                         .ok_or_else(|| BucketeerError::InvalidTreeState(String::from("the tree has not been reduced")))?;

        let mut values: Vec<Option<usize>> = model.variables()
                                                  .iter()
                                                  .map(|v| if model.is_transparent(v) { None } else { model.observed(v) })
                                                  .collect();
        let mut assignment = self.evidence.clone();

        for bucket in self.buckets.iter().rev() {
            if let Some(ref pointer) = bucket.pointer {
                let best = pointer.best(&assignment)?;
                assignment.set(&bucket.variable, best);
                if let Some(slot) = values.get_mut(bucket.variable.index()) {
                    *slot = Some(best);
                }
            }
        }

        Ok(MostProbableExplanation::new(values, result.max()))
    }


    /// A structured description of the tree
    pub fn trace(&self, model: &DirectedModel) -> TreeTrace {
        let names = |positions: &[usize]| -> Vec<String> {
            positions.iter().map(|&p| model.name(&self.buckets[p].variable)).collect()
        };
        let scope = |f: &Factor| -> Vec<String> { f.scope().iter().map(|v| model.name(v)).collect() };

        let buckets = self.buckets
                          .iter()
                          .map(|b| BucketTrace {
                              variable: model.name(&b.variable),
                              status: b.status,
                              explanatory: b.explanatory,
                              factors: b.entries
                                        .iter()
                                        .map(|e| FactorTrace { origin: e.origin, scope: scope(e.factor.as_ref()) })
                                        .collect(),
                              separator: b.separator.as_ref().map(|s| scope(s.as_ref())),
                              cluster: b.cluster.as_ref().map(|c| scope(c)),
                              backward_pointer: b.pointer.is_some(),
                              parent: b.parent.map(|p| names(&[p]).remove(0)),
                              children: names(&b.children)
                          })
                          .collect();

        TreeTrace {
            status: self.status,
            objective: model.name(&self.objective),
            buckets,
            constant: self.constant,
            result: self.result.as_ref().map(|r| r.values().cloned().collect()),
            normalized: self.normalized_result().ok().map(|r| r.values().cloned().collect())
        }
    }


    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// The bucket of `var`, if it is covered
    pub fn bucket(&self, var: &Variable) -> Option<&Bucket> {
        self.position(var).map(|p| &self.buckets[p])
    }

    /// The position of the bucket of `var`
    pub fn position(&self, var: &Variable) -> Option<usize> {
        self.positions.get(var).cloned()
    }

    pub fn covers(&self, var: &Variable) -> bool {
        self.positions.contains_key(var)
    }

    pub fn objective(&self) -> Variable {
        self.objective
    }

    pub fn status(&self) -> ExplanationStatus {
        self.status
    }

    /// Product of every value dropped from the elimination so far
    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn is_reduced(&self) -> bool {
        self.result.is_some()
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

}


fn origin_of(model: &DirectedModel, v: &Variable) -> FactorOrigin {
    if model.is_observed(v) {
        FactorOrigin::Likelihood
    } else {
        FactorOrigin::Distribution
    }
}
