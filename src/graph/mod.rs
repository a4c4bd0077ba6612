//! Graph algorithms over the structure of a `DirectedModel`: moralization for elimination
//! ordering, and two d-separation procedures.

use crate::model::DirectedModel;
use crate::variable::Variable;

use indexmap::{IndexMap, IndexSet};

mod bayes_ball;
mod dseparation;

pub use self::bayes_ball::{bayes_ball, BayesBall};
pub use self::dseparation::{DSeparation, Reachability};


/// An undirected graph as an adjacency list, in insertion order
pub type Adjacency = IndexMap<Variable, IndexSet<Variable>>;


/// Build the moral graph of the part of `model` relevant to an elimination.
///
/// # Args
/// * `model`: the network
/// * `covered`: the `Variable`s whose CPDs take part in the elimination
/// * `include_utility`: whether the utility `Factor` takes part as well
///
/// # Returns
/// an adjacency list over the *unobserved* covered `Variable`s. Two of them are neighbors if they
/// co-occur in the scope of a participating `Factor` once observed variables are removed. This
/// connects each child to its parents and the parents to each other.
pub fn moralize(model: &DirectedModel, covered: &[Variable], include_utility: bool) -> Adjacency {
    let mut adjacency: Adjacency = covered.iter()
                                          .filter(|v| ! model.is_observed(v))
                                          .map(|&v| (v, IndexSet::new()))
                                          .collect();

    let utility = if include_utility { model.utility() } else { None };
    let scopes = covered.iter()
                        .filter_map(|v| model.cpd(v))
                        .chain(utility)
                        .map(|f| f.scope());

    for scope in scopes {
        let family: Vec<Variable> = scope.iter().filter(|v| adjacency.contains_key(*v)).cloned().collect();
        for (i, a) in family.iter().enumerate() {
            for b in family[i + 1..].iter() {
                adjacency[a].insert(*b);
                adjacency[b].insert(*a);
            }
        }
    }

    adjacency
}
