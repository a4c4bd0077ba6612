//! The elimination order of a bucket tree.
//!
//! An order is either supplied by the user and validated, or produced by a greedy min-weight
//! heuristic over the moral graph of the variables that matter for the query.

use super::ExplanationStatus;
use crate::graph::{moralize, Adjacency, DSeparation};
use crate::model::DirectedModel;
use crate::util::{BucketeerError, Result};
use crate::variable::Variable;

use indexmap::IndexSet;
use itertools::Itertools;
use tracing::{debug, trace};


/// Which variables an order has to cover
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Candidates {
    /// Only the variables whose distributions affect the objective, plus the observed variables
    /// their distributions condition on. Applies to plain marginal queries only.
    Affecting,

    /// Every variable of the model
    All
}


/// An elimination order: observed variables first, then the unobserved variables in the order
/// they are eliminated, with the objective last among its phase.
#[derive(Clone, Debug, PartialEq)]
pub struct Ordering {
    order: Vec<Variable>,
    objective: Variable,
    status: ExplanationStatus,
    trivial: bool
}

impl Ordering {

    /// The `Variable`s in elimination order
    pub fn order(&self) -> &[Variable] {
        &self.order
    }

    /// The query variable
    pub fn objective(&self) -> Variable {
        self.objective
    }

    pub fn status(&self) -> ExplanationStatus {
        self.status
    }

    /// `true` if the objective is observed and the order holds only the objective
    pub fn is_trivial(&self) -> bool {
        self.trivial
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The names of the ordered `Variable`s
    pub fn names(&self, model: &DirectedModel) -> Vec<String> {
        self.order.iter().map(|v| model.name(v)).collect()
    }

}


/// Configures and computes an `Ordering` for one query
pub struct OrderingBuilder<'a> {
    model: &'a DirectedModel,
    objective: Option<Variable>,
    status: ExplanationStatus,
    user_order: Option<Vec<String>>,
    candidates: Candidates,
    utility: bool,
    summation: bool
}

impl<'a> OrderingBuilder<'a> {

    /// An ordering for a plain marginal query over the default objective
    pub fn new(model: &'a DirectedModel) -> Self {
        OrderingBuilder {
            model,
            objective: None,
            status: ExplanationStatus::Ignore,
            user_order: None,
            candidates: Candidates::Affecting,
            utility: false,
            summation: false
        }
    }

    /// Set the query variable. `None` selects the default objective.
    pub fn objective(mut self, objective: Option<Variable>) -> Self {
        self.objective = objective;
        self
    }

    pub fn status(mut self, status: ExplanationStatus) -> Self {
        self.status = status;
        self
    }

    /// Use the given variable names instead of the heuristic
    pub fn user_order(mut self, order: Option<Vec<String>>) -> Self {
        self.user_order = order;
        self
    }

    pub fn candidates(mut self, candidates: Candidates) -> Self {
        self.candidates = candidates;
        self
    }

    /// Include the utility `Factor` in the elimination. This forces every variable to be covered.
    pub fn with_utility(mut self, utility: bool) -> Self {
        self.utility = utility;
        self
    }

    /// Only the total of the result is wanted, so a transparent objective is accepted
    pub fn summation(mut self, summation: bool) -> Self {
        self.summation = summation;
        self
    }

    /// Compute the `Ordering`
    ///
    /// # Errors
    /// * `BucketeerError::General` if the model has no variables
    /// * `BucketeerError::InvalidOrder` if the objective is foreign to the model, or transparent
    ///   outside a summation,
    ///   or a user order repeats or misses a variable
    /// * `BucketeerError::UnknownVariable` if a user order names an unknown variable
    pub fn build(self) -> Result<Ordering> {
        let model = self.model;
        let status = self.status;

        ///////////////////////////////////////////////////////////////////////
        // 1) Settle the objective
        let objective = match self.objective {
            Some(v) => v,
            None => default_objective(model, status)?
        };

        if ! model.contains(&objective) {
            return Err(BucketeerError::InvalidOrder(format!("`{}` is not part of the model", objective)));
        } else if model.is_transparent(&objective) && ! self.summation {
            return Err(BucketeerError::InvalidOrder(format!("transparent variable `{}` cannot be an objective", model.name(&objective))));
        }

        if model.is_observed(&objective) {
            debug!(objective = %model.name(&objective), "objective is observed; trivial order");
            return Ok(Ordering { order: vec![objective], objective, status, trivial: true });
        }

        ///////////////////////////////////////////////////////////////////////
        // 2) Restrict the variables to cover
        let everything = self.utility || status != ExplanationStatus::Ignore || self.candidates == Candidates::All;
        let covered = if everything {
            model.variables()
        } else {
            affecting_closure(model, &objective)
        };

        let observed: Vec<Variable> = covered.iter().filter(|v| model.is_observed(v)).cloned().collect();
        let free: Vec<Variable> = covered.iter().filter(|v| ! model.is_observed(v)).cloned().collect();

        trace!(covered = covered.len(), observed = observed.len(), "ordering candidates");

        ///////////////////////////////////////////////////////////////////////
        // 3) Order the unobserved variables
        let eliminated = match self.user_order {
            Some(ref names) => user_sequence(model, names, &free, &objective, status)?,
            None => heuristic_sequence(model, &covered, &free, &objective, status, self.utility)
        };

        let mut order = observed;
        order.extend(eliminated);

        debug!(
            objective = %model.name(&objective),
            ?status,
            order = %order.iter().map(|v| model.name(v)).join(" "),
            "elimination order"
        );

        Ok(Ordering { order, objective, status, trivial: false })
    }

}


/// The default objective of a query: the last unobserved explained variable in explanation
/// modes, and otherwise the last variable that is not transparent
fn default_objective(model: &DirectedModel, status: ExplanationStatus) -> Result<Variable> {
    let vars = model.variables();

    if status != ExplanationStatus::Ignore {
        if let Some(v) = vars.iter().rev().find(|v| status.explains(model, v)) {
            return Ok(*v);
        }
    }

    vars.iter()
        .rev()
        .find(|v| ! model.is_transparent(v))
        .cloned()
        .ok_or_else(|| BucketeerError::General(String::from("the model has no variable to query")))
}


/// The affecting variables of `objective`, together with the observed parents of those variables,
/// in declaration order
fn affecting_closure(model: &DirectedModel, objective: &Variable) -> Vec<Variable> {
    let affecting: IndexSet<Variable> = DSeparation::new(model).all_affecting(objective).into_iter().collect();

    model.variables()
         .into_iter()
         .filter(|v| {
             affecting.contains(v) ||
                 (model.is_observed(v) && model.children(v).iter().any(|c| affecting.contains(c)))
         })
         .collect()
}


/// Split `vars` into the variables eliminated in the first (summation) phase and those eliminated
/// in the second (explanation) phase, the objective excluded
fn phases(
    model: &DirectedModel,
    vars: &[Variable],
    objective: &Variable,
    status: ExplanationStatus
) -> (Vec<Variable>, Vec<Variable>) {
    vars.iter()
        .filter(|v| *v != objective)
        .cloned()
        .partition(|v| ! status.explains(model, v))
}


/// Validate a user order and rearrange it into phases
fn user_sequence(
    model: &DirectedModel,
    names: &[String],
    free: &[Variable],
    objective: &Variable,
    status: ExplanationStatus
) -> Result<Vec<Variable>> {
    let mut given: IndexSet<Variable> = IndexSet::new();
    for name in names {
        let v = model.variable(name)?;
        if ! given.insert(v) {
            return Err(BucketeerError::InvalidOrder(format!("`{}` appears more than once", name)));
        }
    }

    if let Some(missing) = free.iter().find(|v| ! model.is_transparent(v) && ! given.contains(*v)) {
        return Err(BucketeerError::InvalidOrder(format!("`{}` is missing", model.name(missing))));
    }

    // transparent variables go first, the rest keeps the user's relative order
    let mut sequence: Vec<Variable> = free.iter().filter(|v| model.is_transparent(v) && *v != objective).cloned().collect();
    let user: Vec<Variable> = given.into_iter()
                                   .filter(|v| free.contains(v) && ! model.is_transparent(v))
                                   .collect();

    let (first, second) = phases(model, &user, objective, status);
    sequence.extend(first);
    if ! status.explains(model, objective) {
        sequence.push(*objective);
    }
    sequence.extend(second);
    if status.explains(model, objective) {
        sequence.push(*objective);
    }

    Ok(sequence)
}


/// Greedy min-weight elimination over the moral graph, in two phases
fn heuristic_sequence(
    model: &DirectedModel,
    covered: &[Variable],
    free: &[Variable],
    objective: &Variable,
    status: ExplanationStatus,
    utility: bool
) -> Vec<Variable> {
    let mut graph = moralize(model, covered, utility);
    let (first, second) = phases(model, free, objective, status);
    let objective_last = status.explains(model, objective);

    let mut sequence = Vec::with_capacity(free.len());

    eliminate_all(&mut graph, first, &mut sequence);
    if ! objective_last {
        eliminate(&mut graph, objective);
        sequence.push(*objective);
    }

    eliminate_all(&mut graph, second, &mut sequence);
    if objective_last {
        eliminate(&mut graph, objective);
        sequence.push(*objective);
    }

    sequence
}


/// Repeatedly pick the lightest of `pending`, ties going to the earliest
fn eliminate_all(graph: &mut Adjacency, mut pending: Vec<Variable>, sequence: &mut Vec<Variable>) {
    while ! pending.is_empty() {
        let mut best = 0;
        let mut best_weight = u64::max_value();

        for (i, v) in pending.iter().enumerate() {
            let w = weight(graph, v);
            if w < best_weight {
                best = i;
                best_weight = w;
            }
        }

        let v = pending.remove(best);
        trace!(variable = %v, weight = best_weight, "eliminate");

        eliminate(graph, &v);
        sequence.push(v);
    }
}


/// Product of the cardinalities of the current neighbors of `v`
fn weight(graph: &Adjacency, v: &Variable) -> u64 {
    graph.get(v)
         .map(|neighbors| {
             neighbors.iter().fold(1u64, |w, n| w.saturating_mul(n.cardinality() as u64))
         })
         .unwrap_or(1)
}


/// Remove `v` from the graph and connect its neighbors to each other
fn eliminate(graph: &mut Adjacency, v: &Variable) {
    let neighbors = match graph.shift_remove(v) {
        Some(neighbors) => neighbors,
        None => return
    };

    for n in neighbors.iter() {
        if let Some(adjacent) = graph.get_mut(n) {
            adjacent.shift_remove(v);
            adjacent.extend(neighbors.iter().filter(|m| *m != n).cloned());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Initialization;
    use crate::model::DirectedModelBuilder;
    use crate::testing;

    use proptest::prelude::*;

    /// The properties every heuristic order has to satisfy
    fn check_order(model: &DirectedModel, ordering: &Ordering) {
        let order = ordering.order();
        let unique: IndexSet<Variable> = order.iter().cloned().collect();
        assert_eq!(unique.len(), order.len(), "repeated variable in {:?}", order);

        // observed variables come first
        let first_free = order.iter().position(|v| ! model.is_observed(v)).unwrap_or(order.len());
        assert!(order[first_free..].iter().all(|v| ! model.is_observed(v)));

        // explained variables come last, with the objective closing its phase
        let status = ordering.status();
        let free = &order[first_free..];
        let first_explained = free.iter().position(|v| status.explains(model, v)).unwrap_or(free.len());
        assert!(free[first_explained..].iter().all(|v| status.explains(model, v)));

        let objective = ordering.objective();
        if status.explains(model, &objective) {
            assert_eq!(Some(&objective), free.last());
        } else {
            assert_eq!(Some(&objective), free[..first_explained].last());
        }
    }

    #[test]
    fn sprinkler_default() {
        let model = testing::sprinkler();
        let vars = model.variables();

        let ordering = OrderingBuilder::new(&model).build().unwrap();
        assert_eq!(vars[2], ordering.objective());
        assert_eq!(3, ordering.len());
        assert_eq!(Some(&vars[2]), ordering.order().last());
        assert!(! ordering.is_trivial());
        check_order(&model, &ordering);
    }

    #[test]
    fn observed_first() {
        let mut model = testing::sprinkler();
        model.observe("grass", "true").unwrap();
        let rain = model.variable("rain").unwrap();
        let grass = model.variable("grass").unwrap();

        let ordering = OrderingBuilder::new(&model).objective(Some(rain)).build().unwrap();
        assert_eq!(grass, ordering.order()[0]);
        assert_eq!(Some(&rain), ordering.order().last());
        check_order(&model, &ordering);
    }

    #[test]
    fn observed_objective() {
        let mut model = testing::sprinkler();
        model.observe("grass", "true").unwrap();
        let grass = model.variable("grass").unwrap();

        let ordering = OrderingBuilder::new(&model).objective(Some(grass)).build().unwrap();
        assert!(ordering.is_trivial());
        assert_eq!(&[grass], ordering.order());
    }

    #[test]
    /// Only the ancestry of the objective is needed without evidence
    fn pruned() {
        let model = testing::chain();
        let vars = model.variables();

        let ordering = OrderingBuilder::new(&model).objective(Some(vars[1])).build().unwrap();
        assert_eq!(&[vars[0], vars[1]], ordering.order());

        let ordering = OrderingBuilder::new(&model)
                                      .objective(Some(vars[1]))
                                      .candidates(Candidates::All)
                                      .build()
                                      .unwrap();
        assert_eq!(4, ordering.len());
        check_order(&model, &ordering);
    }

    #[test]
    /// An observed parent of an affecting variable stays in the order
    fn pruned_keeps_conditioning() {
        let mut model = testing::chain();
        model.observe("b", "1").unwrap();
        let vars = model.variables();

        let ordering = OrderingBuilder::new(&model).objective(Some(vars[3])).build().unwrap();
        assert_eq!(&[vars[1], vars[2], vars[3]], ordering.order());
    }

    #[test]
    fn explanation_phases() {
        let mut model = testing::student();
        model.set_explanatory("D", true).unwrap();
        model.set_explanatory("I", true).unwrap();
        model.observe("L", "1").unwrap();

        let d = model.variable("D").unwrap();
        let i = model.variable("I").unwrap();

        let ordering = OrderingBuilder::new(&model).status(ExplanationStatus::Explanation).build().unwrap();
        assert_eq!(i, ordering.objective());
        assert_eq!(5, ordering.len());

        let tail: Vec<Variable> = ordering.order()[3..].to_vec();
        assert_eq!(vec![d, i], tail);
        check_order(&model, &ordering);

        // in full explanation mode every unobserved variable is explained
        let ordering = OrderingBuilder::new(&model).status(ExplanationStatus::FullExplanation).build().unwrap();
        check_order(&model, &ordering);
        assert_eq!(model.variable("S").unwrap(), ordering.objective());
    }

    #[test]
    /// A star of binary leaves around a four-valued hub
    fn min_weight() {
        let mut b = DirectedModelBuilder::new();
        let leaves: Vec<Variable> = (0..3).map(|i| b.add_variable(&format!("leaf{}", i), &["x", "y"])).collect();
        let hub = b.add_variable("hub", &["a", "b", "c", "d"]);
        let top = b.add_variable("top", &["x", "y"]);

        b.with_cpd(&hub, &[], Initialization::Uniform)
         .with_cpd(&top, &[], Initialization::Uniform);
        for l in leaves.iter() {
            b.with_cpd(l, &[hub], Initialization::Seeded(l.index() as u64));
        }
        let model = b.build().unwrap();

        let ordering = OrderingBuilder::new(&model)
                                      .objective(Some(top))
                                      .candidates(Candidates::All)
                                      .build()
                                      .unwrap();

        // a leaf weighs |hub| = 4 and the hub weighs 2 per remaining leaf: the hub ties with the
        // second leaf and loses to the earlier declaration, then wins against the third
        assert_eq!(&[leaves[0], leaves[1], hub, leaves[2], top], ordering.order());
    }

    #[test]
    fn user_order() {
        let mut model = testing::sprinkler();
        model.observe("grass", "true").unwrap();
        let vars = model.variables();
        let (rain, sprinkler, grass) = (vars[0], vars[1], vars[2]);

        let names = vec![String::from("rain"), String::from("grass"), String::from("sprinkler")];
        let ordering = OrderingBuilder::new(&model)
                                      .objective(Some(rain))
                                      .user_order(Some(names))
                                      .build()
                                      .unwrap();
        assert_eq!(&[grass, sprinkler, rain], ordering.order());

        let unknown = vec![String::from("rain"), String::from("hail"), String::from("sprinkler")];
        assert_eq!(
            Err(BucketeerError::UnknownVariable(String::from("hail"))),
            OrderingBuilder::new(&model).objective(Some(rain)).user_order(Some(unknown)).build()
        );

        let repeated = vec![String::from("rain"), String::from("rain"), String::from("sprinkler")];
        match OrderingBuilder::new(&model).objective(Some(rain)).user_order(Some(repeated)).build() {
            Err(BucketeerError::InvalidOrder(_)) => (),
            other => panic!("unexpected {:?}", other)
        }

        let missing = vec![String::from("rain")];
        match OrderingBuilder::new(&model).objective(Some(rain)).user_order(Some(missing)).build() {
            Err(BucketeerError::InvalidOrder(_)) => (),
            other => panic!("unexpected {:?}", other)
        }
    }

    #[test]
    fn user_order_transparent() {
        let mut b = DirectedModelBuilder::new();
        let x = b.add_variable("x", &["0", "1"]);
        let hidden = b.add_variable("hidden", &["0", "1"]);
        let y = b.add_variable("y", &["0", "1"]);
        b.with_cpd(&x, &[], Initialization::Uniform)
         .with_cpd(&hidden, &[x], Initialization::Seeded(1))
         .with_cpd(&y, &[hidden], Initialization::Seeded(2))
         .with_transparent(&hidden);
        let model = b.build().unwrap();

        let names = vec![String::from("y"), String::from("hidden"), String::from("x")];
        let ordering = OrderingBuilder::new(&model)
                                      .objective(Some(y))
                                      .user_order(Some(names))
                                      .build()
                                      .unwrap();
        assert_eq!(&[hidden, x, y], ordering.order());

        match OrderingBuilder::new(&model).objective(Some(hidden)).build() {
            Err(BucketeerError::InvalidOrder(_)) => (),
            other => panic!("unexpected {:?}", other)
        }
    }

    #[test]
    /// A summation may end on a transparent variable, which is then ordered once
    fn summation_transparent() {
        let mut b = DirectedModelBuilder::new();
        let hidden = b.add_variable("hidden", &["0", "1"]);
        let x = b.add_variable("x", &["0", "1"]);
        b.with_cpd(&hidden, &[], Initialization::Uniform)
         .with_cpd(&x, &[hidden], Initialization::Seeded(3))
         .with_transparent(&hidden);
        let mut model = b.build().unwrap();
        model.observe("x", "0").unwrap();

        let ordering = OrderingBuilder::new(&model)
                                      .objective(Some(hidden))
                                      .candidates(Candidates::All)
                                      .summation(true)
                                      .build()
                                      .unwrap();
        assert_eq!(&[x, hidden], ordering.order());

        let names = vec![String::from("x")];
        let ordering = OrderingBuilder::new(&model)
                                      .objective(Some(hidden))
                                      .candidates(Candidates::All)
                                      .user_order(Some(names))
                                      .summation(true)
                                      .build()
                                      .unwrap();
        assert_eq!(&[x, hidden], ordering.order());
    }

    /// A random DAG over `n` variables; variable `i` may have any of the earlier ones as parents
    fn random_model(n: usize, edges: &[bool], cards: &[usize], seed: u64) -> DirectedModel {
        let mut b = DirectedModelBuilder::new();
        let labels = ["a", "b", "c"];
        let vars: Vec<Variable> = (0..n).map(|i| b.add_variable(&format!("v{}", i), &labels[..cards[i]])).collect();

        let mut k = 0;
        for i in 0..n {
            let mut parents = vec![];
            for j in 0..i {
                if edges[k] {
                    parents.push(vars[j]);
                }
                k += 1;
            }
            b.with_cpd(&vars[i], &parents, Initialization::Seeded(seed + i as u64));
        }

        b.build().unwrap()
    }

    proptest! {

        #[test]
        fn heuristic_orders_are_valid(
            edges in prop::collection::vec(any::<bool>(), 15),
            cards in prop::collection::vec(1usize..4, 6),
            observed in prop::collection::vec(any::<bool>(), 6),
            explained in prop::collection::vec(any::<bool>(), 6),
            full in any::<bool>(),
            seed in 0u64..1000
        ) {
            let mut model = random_model(6, &edges, &cards, seed);
            for (i, v) in model.variables().into_iter().enumerate() {
                if observed[i] && i != 5 {
                    model.observe_index(&v, 0).unwrap();
                }
                if explained[i] {
                    model.set_explanatory(&format!("v{}", i), true).unwrap();
                }
            }

            for status in [ExplanationStatus::Ignore, ExplanationStatus::Explanation, ExplanationStatus::FullExplanation].iter() {
                let candidates = if full { Candidates::All } else { Candidates::Affecting };
                let ordering = OrderingBuilder::new(&model)
                                              .status(*status)
                                              .candidates(candidates)
                                              .build()
                                              .unwrap();
                if ! ordering.is_trivial() {
                    check_order(&model, &ordering);
                }
            }
        }

    }
}
