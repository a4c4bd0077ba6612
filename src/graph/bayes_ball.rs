//! The Bayes-Ball algorithm of Shachter (1998), "Bayes-Ball: The Rational Pastime".
//!
//! A ball is bounced from each query node. Unobserved nodes pass a ball arriving from a child to
//! their parents and children; observed nodes bounce a ball arriving from a parent back to the
//! parents. The marks left behind identify the irrelevant nodes and the requisite ones.

use crate::model::DirectedModel;
use crate::variable::Variable;

use indexmap::IndexSet;
use tracing::trace;

use std::collections::{HashMap, VecDeque};


/// The marks left by a run of `bayes_ball`
#[derive(Clone, Debug)]
pub struct BayesBall {
    /// Every `Variable` of the model, in declaration order
    variables: Vec<Variable>,

    /// The conditioning set
    given: IndexSet<Variable>,

    /// Nodes whose parents were scheduled
    top: IndexSet<Variable>,

    /// Nodes whose children were scheduled
    bottom: IndexSet<Variable>,

    /// Nodes that received a ball
    visited: IndexSet<Variable>
}


/// Pending visits of one node, merged while the node waits in the schedule
#[derive(Clone, Copy, Debug, Default)]
struct Visit {
    from_child: bool,
    from_parent: bool
}


/// Run Bayes-Ball for the query set `query` given the conditioning set `given`.
///
/// The conditioning set is taken as is; the evidence stored on the model is not consulted.
pub fn bayes_ball(model: &DirectedModel, query: &[Variable], given: &[Variable]) -> BayesBall {
    let given: IndexSet<Variable> = given.iter().cloned().collect();

    let mut top = IndexSet::new();
    let mut bottom = IndexSet::new();
    let mut visited = IndexSet::new();

    let mut schedule: VecDeque<Variable> = VecDeque::new();
    let mut pending: HashMap<Variable, Visit> = HashMap::new();

    // every query node starts as if visited from one of its children
    for j in query.iter().filter(|j| model.contains(j)) {
        schedule_visit(&mut schedule, &mut pending, *j, true);
    }

    while let Some(v) = schedule.pop_front() {
        let visit = pending.remove(&v).unwrap_or_default();
        visited.insert(v);

        let observed = given.contains(&v);

        if visit.from_child && ! observed {
            if top.insert(v) {
                for p in model.parents(&v) {
                    schedule_visit(&mut schedule, &mut pending, p, true);
                }
            }
            if bottom.insert(v) {
                for c in model.children(&v) {
                    schedule_visit(&mut schedule, &mut pending, c, false);
                }
            }
        }

        if visit.from_parent {
            if observed {
                if top.insert(v) {
                    for p in model.parents(&v) {
                        schedule_visit(&mut schedule, &mut pending, p, true);
                    }
                }
            } else if bottom.insert(v) {
                for c in model.children(&v) {
                    schedule_visit(&mut schedule, &mut pending, c, false);
                }
            }
        }
    }

    trace!(visited = visited.len(), top = top.len(), bottom = bottom.len(), "bayes ball");

    BayesBall { variables: model.variables(), given, top, bottom, visited }
}


fn schedule_visit(
    schedule: &mut VecDeque<Variable>,
    pending: &mut HashMap<Variable, Visit>,
    v: Variable,
    from_child: bool
) {
    let visit = pending.entry(v).or_insert_with(|| {
        schedule.push_back(v);
        Visit::default()
    });

    if from_child {
        visit.from_child = true;
    } else {
        visit.from_parent = true;
    }
}


impl BayesBall {

    /// Nodes that are d-separated from the query given the conditioning set: neither observed
    /// nor marked on the bottom
    pub fn irrelevant(&self) -> Vec<Variable> {
        self.variables.iter()
                      .filter(|v| ! self.bottom.contains(*v) && ! self.given.contains(*v))
                      .cloned()
                      .collect()
    }


    /// Nodes whose CPDs are needed to answer the query: marked on the top. A node marked on both
    /// the top and the bottom is requisite too, as in Shachter's Bayes-Ball.
    pub fn requisite_probability(&self) -> Vec<Variable> {
        self.variables.iter().filter(|v| self.top.contains(*v)).cloned().collect()
    }


    /// Observed nodes whose values are needed to answer the query: visited members of the
    /// conditioning set. A visited observed node may carry no mark at all and is still requisite.
    pub fn requisite_observation(&self) -> Vec<Variable> {
        self.variables.iter()
                      .filter(|v| self.given.contains(*v) && self.visited.contains(*v))
                      .cloned()
                      .collect()
    }


    /// Check if `y` is d-separated from the query given the conditioning set
    pub fn d_separated(&self, y: &Variable) -> bool {
        self.given.contains(y) || ! self.bottom.contains(y)
    }

}
