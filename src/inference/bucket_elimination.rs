//! Defines a `ConditionalInferenceEngine` and `MapInferenceEngine` that answers queries exactly by
//! bucket elimination.
//!
//! The engine owns its `DirectedModel`. Every query builds an `Ordering` and a `BucketTree` for
//! the current evidence. In clustering mode the trees are distributed and kept in a forest, and a
//! cache maps each variable to the tree whose clusters answer its marginal, so most marginal
//! queries after the first reuse an existing tree. Any change of evidence drops the forest.

use super::bucket::BucketTree;
use super::explanation::{Explanation, ExplanationMode, MostProbableExplanation};
use super::interrupt::{Interrupt, Never};
use super::ordering::{Candidates, Ordering, OrderingBuilder};
use super::trace::TreeTrace;
use super::{ConditionalInferenceEngine, ExplanationStatus, MapInferenceEngine};
use crate::factor::Factor;
use crate::graph::{bayes_ball, BayesBall, DSeparation};
use crate::model::DirectedModel;
use crate::util::{BucketeerError, Result};
use crate::variable::{Assignment, Variable};

use tracing::{debug, trace};

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;


/// Configuration of a `BucketEliminationEngine`
#[derive(Clone, Default)]
pub struct EngineOptions {
    /// Keep and distribute bucket trees so their clusters answer later marginal queries
    produce_clusters: bool,

    /// Elimination order supplied by the user, by variable name
    order: Option<Vec<String>>,

    /// Checked before every bucket of every reduction
    interrupt: Option<Rc<dyn Interrupt>>
}

impl EngineOptions {

    pub fn new() -> Self {
        EngineOptions::default()
    }

    pub fn produce_clusters(mut self, produce_clusters: bool) -> Self {
        self.produce_clusters = produce_clusters;
        self
    }

    /// Eliminate in the given order instead of the min-weight heuristic. The order must name
    /// every variable a query needs; names it does not need are skipped.
    pub fn order(mut self, order: Vec<String>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn interrupt<I: Interrupt + 'static>(mut self, interrupt: I) -> Self {
        self.interrupt = Some(Rc::new(interrupt));
        self
    }

    pub fn produces_clusters(&self) -> bool {
        self.produce_clusters
    }

    pub fn user_order(&self) -> Option<&[String]> {
        self.order.as_ref().map(|o| o.as_slice())
    }

}

impl fmt::Debug for EngineOptions {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EngineOptions")
         .field("produce_clusters", &self.produce_clusters)
         .field("order", &self.order)
         .field("interrupt", &self.interrupt.is_some())
         .finish()
    }

}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ActiveTree {
    Forest(usize),
    Scratch
}


pub struct BucketEliminationEngine {
    /// The network and its evidence
    model: DirectedModel,

    options: EngineOptions,

    /// The model revision the forest was built for
    revision: u64,

    /// Trees built for the current evidence whose marginals are cached. Without clustering only
    /// the latest one is kept.
    forest: Vec<BucketTree>,

    /// The latest tree built for a total or an explanation. Each such query replaces it.
    scratch: Option<BucketTree>,

    /// The tree built by the latest query
    active: Option<ActiveTree>,

    /// The tree answering the marginal of each variable
    cache: HashMap<Variable, usize>
}


impl BucketEliminationEngine {

    pub fn new(model: DirectedModel, options: EngineOptions) -> Self {
        let revision = model.revision();
        BucketEliminationEngine {
            model,
            options,
            revision,
            forest: vec![],
            scratch: None,
            active: None,
            cache: HashMap::new()
        }
    }

    pub fn model(&self) -> &DirectedModel {
        &self.model
    }

    /// Mutable access to the model. Changes of evidence made through it are detected by the next
    /// query.
    pub fn model_mut(&mut self) -> &mut DirectedModel {
        &mut self.model
    }

    /// Give the model back
    pub fn into_model(self) -> DirectedModel {
        self.model
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The number of trees currently kept, the scratch tree included
    pub fn forest_len(&self) -> usize {
        self.forest.len() + self.scratch.iter().count()
    }

    /// The tree built by the latest query, if it is still valid
    pub fn active_tree(&self) -> Option<&BucketTree> {
        if self.model.revision() != self.revision {
            return None;
        }

        match self.active? {
            ActiveTree::Forest(t) => self.forest.get(t),
            ActiveTree::Scratch => self.scratch.as_ref()
        }
    }

    /// A description of the tree built by the latest query
    pub fn trace(&self) -> Option<TreeTrace> {
        self.active_tree().map(|tree| tree.trace(&self.model))
    }


    ///////////////////////////////////////////////////////////////////////////
    // Evidence

    /// Observe `name` at the value labelled `label`
    pub fn observe(&mut self, name: &str, label: &str) -> Result<()> {
        self.model.observe(name, label)?;
        self.invalidate();
        Ok(())
    }

    /// Observe `var` at the value with index `index`
    pub fn observe_index(&mut self, var: &Variable, index: usize) -> Result<()> {
        self.model.observe_index(var, index)?;
        self.invalidate();
        Ok(())
    }

    pub fn clear_observation(&mut self, name: &str) -> Result<()> {
        self.model.clear_observation(name)?;
        self.invalidate();
        Ok(())
    }

    pub fn clear_evidence(&mut self) {
        self.model.clear_evidence();
        self.invalidate();
    }

    /// Mark or unmark `name` as explanatory
    pub fn set_explanatory(&mut self, name: &str, explanatory: bool) -> Result<()> {
        self.model.set_explanatory(name, explanatory)?;
        self.invalidate();
        Ok(())
    }

    /// Drop every tree
    pub fn invalidate(&mut self) {
        if self.forest_len() > 0 {
            debug!(trees = self.forest_len(), "invalidated bucket forest");
        }

        self.forest.clear();
        self.scratch = None;
        self.cache.clear();
        self.active = None;
        self.revision = self.model.revision();
    }

    fn sync(&mut self) {
        if self.model.revision() != self.revision {
            self.invalidate();
        }
    }


    ///////////////////////////////////////////////////////////////////////////
    // Queries

    /// The posterior distribution of `name` given the evidence, or of the default objective (the
    /// last variable that is not transparent) when no name is given
    ///
    /// # Errors
    /// * `BucketeerError::UnknownVariable` if the name does not resolve
    /// * `BucketeerError::DegenerateDistribution` if the evidence has probability zero
    /// * `BucketeerError::Interrupted` if the interrupt fired
    pub fn marginal(&mut self, name: Option<&str>) -> Result<Factor> {
        self.sync();
        let var = match name {
            Some(name) => Some(self.model.variable(name)?),
            None => None
        };

        self.posterior(var)
    }


    fn posterior(&mut self, var: Option<Variable>) -> Result<Factor> {
        if let Some(v) = var {
            if let Some(&t) = self.cache.get(&v) {
                trace!(variable = %self.model.name(&v), tree = t, "marginal cache hit");
                self.active = Some(ActiveTree::Forest(t));
                return self.forest[t].marginal(&v);
            }
        }

        let clusters = self.options.produce_clusters;
        let candidates = if clusters { Candidates::All } else { Candidates::Affecting };
        let ordering = self.ordering(var, ExplanationStatus::Ignore, candidates)?;
        trace!(objective = %self.model.name(&ordering.objective()), "marginal cache miss");

        let mut tree = BucketTree::new(&self.model, &ordering, clusters, false)?;
        self.run(&mut tree)?;
        let posterior = tree.normalized_result()?;

        if ! ordering.is_trivial() {
            if clusters && tree.len() > 1 {
                tree.distribute()?;
            }
            self.remember(tree);
        }

        Ok(posterior)
    }


    /// The expected value of the numeric values of `name` raised to `moment`, under its posterior
    ///
    /// # Returns
    /// ```sum_x value(x)^moment P(x | e)```
    pub fn expectation(&mut self, name: &str, moment: i32) -> Result<f64> {
        self.sync();
        let var = self.model.variable(name)?;
        let posterior = self.posterior(Some(var))?;

        let powered: Vec<f64> = self.model.numeric_values(&var).iter().map(|x| x.powi(moment)).collect();
        let numeric = Factor::from_values(vec![var], powered)?;

        Ok(Factor::combine(&[&numeric, &posterior])?.sum())
    }


    /// The expected utility ```E[U | e]``` of the utility factor of the model
    ///
    /// # Errors
    /// * `BucketeerError::MissingUtility` if the model has none
    /// * `BucketeerError::DegenerateDistribution` if the evidence has probability zero
    pub fn expected_utility(&mut self) -> Result<f64> {
        self.sync();
        let evidence = self.model.evidence();
        let utility = self.model.utility().ok_or(BucketeerError::MissingUtility)?;

        if self.all_observed() {
            return utility.value(&evidence);
        }

        let objective = self.summation_objective()?;
        let weighted = self.total(objective, true)?;
        let probability = self.total(objective, false)?;

        if probability == 0.0 {
            return Err(BucketeerError::DegenerateDistribution);
        }

        debug!(weighted, probability, "expected utility");
        Ok(weighted / probability)
    }


    /// The probability ```P(e)``` of the evidence
    pub fn evidence_probability(&mut self) -> Result<f64> {
        self.sync();
        if self.all_observed() {
            return self.model.probability(&self.model.evidence());
        }

        let objective = self.summation_objective()?;
        self.total(objective, false)
    }


    /// The most probable values of the explained variables given the evidence.
    ///
    /// In `ExplanationMode::Marked`, a model without unobserved explanatory variables has nothing
    /// to maximize, and the posterior of the default objective is returned instead.
    pub fn explanation(&mut self, mode: ExplanationMode) -> Result<Explanation> {
        self.sync();
        let status = mode.status();
        let explained = self.model.variables().into_iter().rev().find(|v| status.explains(&self.model, v));

        let objective = match (explained, mode) {
            (Some(v), _) => v,
            (None, ExplanationMode::Marked) => {
                debug!("no explanatory variable; answering the marginal instead");
                return Ok(Explanation::Posterior(self.posterior(None)?));
            },
            (None, ExplanationMode::Full) => {
                let values = self.model
                                 .variables()
                                 .iter()
                                 .map(|v| if self.model.is_transparent(v) { None } else { self.model.observed(v) })
                                 .collect();
                let probability = self.evidence_probability()?;
                return Ok(Explanation::MostProbable(MostProbableExplanation::new(values, probability)));
            }
        };

        let ordering = self.ordering(Some(objective), status, Candidates::All)?;
        let mut tree = BucketTree::new(&self.model, &ordering, false, false)?;
        self.run(&mut tree)?;

        let mpe = tree.most_probable(&self.model)?;
        debug!(probability = mpe.probability(), "most probable explanation");

        self.keep_scratch(tree);
        Ok(Explanation::MostProbable(mpe))
    }


    ///////////////////////////////////////////////////////////////////////////
    // Independence

    /// Check if `x` and `y` are d-separated given the named conditioning set. The evidence of the
    /// model is not consulted.
    pub fn d_separated(&self, x: &str, y: &str, given: &[&str]) -> Result<bool> {
        let x = self.model.variable(x)?;
        let y = self.model.variable(y)?;
        let given = self.resolve(given)?;

        Ok(bayes_ball(&self.model, &[x], &given).d_separated(&y))
    }

    /// Run Bayes-Ball for the named query and conditioning sets
    pub fn bayes_ball(&self, query: &[&str], given: &[&str]) -> Result<BayesBall> {
        let query = self.resolve(query)?;
        let given = self.resolve(given)?;

        Ok(bayes_ball(&self.model, &query, &given))
    }

    /// The names of the unobserved variables d-connected to `name` given the evidence
    pub fn all_connected(&self, name: &str) -> Result<Vec<String>> {
        let var = self.model.variable(name)?;
        let connected = DSeparation::new(&self.model).all_connected(&var);
        Ok(connected.iter().map(|v| self.model.name(v)).collect())
    }

    /// The names of the variables whose distributions affect the posterior of `name` given the
    /// evidence
    pub fn all_affecting(&self, name: &str) -> Result<Vec<String>> {
        let var = self.model.variable(name)?;
        let affecting = DSeparation::new(&self.model).all_affecting(&var);
        Ok(affecting.iter().map(|v| self.model.name(v)).collect())
    }


    ///////////////////////////////////////////////////////////////////////////
    // Helpers

    fn resolve(&self, names: &[&str]) -> Result<Vec<Variable>> {
        names.iter().map(|n| self.model.variable(n)).collect()
    }

    fn ordering(
        &self,
        objective: Option<Variable>,
        status: ExplanationStatus,
        candidates: Candidates
    ) -> Result<Ordering> {
        OrderingBuilder::new(&self.model)
                        .objective(objective)
                        .status(status)
                        .user_order(self.options.order.clone())
                        .candidates(candidates)
                        .build()
    }

    /// Reduce `tree`, honouring the configured interrupt
    fn run(&self, tree: &mut BucketTree) -> Result<()> {
        let never = Never;
        let interrupt: &dyn Interrupt = match self.options.interrupt {
            Some(ref interrupt) => &**interrupt,
            None => &never
        };

        tree.reduce_with(interrupt)?;
        Ok(())
    }

    /// The total of a tree over every variable, eliminating towards `objective`
    fn total(&mut self, objective: Variable, utility: bool) -> Result<f64> {
        let ordering = OrderingBuilder::new(&self.model)
                                      .objective(Some(objective))
                                      .user_order(self.options.order.clone())
                                      .candidates(Candidates::All)
                                      .with_utility(utility)
                                      .summation(true)
                                      .build()?;
        let mut tree = BucketTree::new(&self.model, &ordering, false, utility)?;
        self.run(&mut tree)?;

        let total = tree.total().ok_or_else(|| BucketeerError::InvalidTreeState(String::from("reduction produced no result")))?;
        self.keep_scratch(tree);
        Ok(total)
    }

    fn all_observed(&self) -> bool {
        self.model.variables().iter().all(|v| self.model.is_observed(v))
    }

    /// The variable a summation ends on: the last unobserved variable that is not transparent, or
    /// the last transparent one when every unobserved variable is
    fn summation_objective(&self) -> Result<Variable> {
        let free: Vec<Variable> = self.model.variables().into_iter().filter(|v| ! self.model.is_observed(v)).collect();

        free.iter()
            .rev()
            .find(|v| ! self.model.is_transparent(v))
            .or_else(|| free.last())
            .cloned()
            .ok_or_else(|| BucketeerError::General(String::from("every variable is observed")))
    }

    /// Keep `tree` in the forest as the active tree and register its marginals in the cache
    fn remember(&mut self, tree: BucketTree) {
        if ! self.options.produce_clusters {
            self.forest.clear();
            self.scratch = None;
            self.cache.clear();
        }

        let t = self.forest.len();
        self.cache.entry(tree.objective()).or_insert(t);

        if tree.is_distributed() {
            for bucket in tree.buckets() {
                let v = bucket.variable();
                let answers = bucket.cluster().map_or(false, |c| c.contains(&v));
                if answers && ! self.model.is_observed(&v) {
                    self.cache.entry(v).or_insert(t);
                }
            }
        }

        trace!(tree = t, cached = self.cache.len(), "kept bucket tree");
        self.forest.push(tree);
        self.active = Some(ActiveTree::Forest(t));
    }

    /// Keep `tree` as the active tree in place of the previous scratch tree. Its marginals are
    /// never looked up.
    fn keep_scratch(&mut self, tree: BucketTree) {
        if ! self.options.produce_clusters {
            self.forest.clear();
            self.cache.clear();
        }

        trace!(trees = self.forest.len(), "replaced scratch bucket tree");
        self.scratch = Some(tree);
        self.active = Some(ActiveTree::Scratch);
    }

}


impl ConditionalInferenceEngine for BucketEliminationEngine {

    fn infer(&mut self, variable: &Variable) -> Result<Factor> {
        if ! self.model.contains(variable) {
            return Err(BucketeerError::UnknownVariable(variable.to_string()));
        }

        self.sync();
        self.posterior(Some(*variable))
    }

}


impl MapInferenceEngine for BucketEliminationEngine {

    fn infer_map(&mut self) -> Result<Assignment> {
        match self.explanation(ExplanationMode::Full)? {
            Explanation::MostProbable(mpe) => Ok(mpe.assignment(&self.model)),
            Explanation::Posterior(_) => Err(BucketeerError::General(String::from("a full explanation produced no assignment")))
        }
    }

}
