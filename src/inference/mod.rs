//! Defines the interface to inference engines, and the bucket elimination engine implementing it

use crate::factor::Factor;
use crate::model::DirectedModel;
use crate::util::Result;
use crate::variable::{Assignment, Variable};

mod bucket;
mod bucket_elimination;
mod explanation;
mod interrupt;
mod ordering;
mod trace;

pub use self::bucket::{Bucket, BucketStatus, BucketTree, FactorOrigin};
pub use self::bucket_elimination::{BucketEliminationEngine, EngineOptions};
pub use self::explanation::{Explanation, ExplanationMode, MostProbableExplanation};
pub use self::interrupt::{Deadline, Interrupt, Never};
pub use self::ordering::{Candidates, Ordering, OrderingBuilder};
pub use self::trace::{BucketTrace, FactorTrace, TreeTrace};


/// Whether a query sums out every variable or maximizes some of them
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExplanationStatus {
    /// Every variable is summed out; the query asks for a marginal
    Ignore,

    /// Variables marked explanatory are maximized
    Explanation,

    /// Every unobserved variable is maximized
    FullExplanation
}

impl ExplanationStatus {

    /// Check if `v` is maximized under this status. Observed and transparent variables never are.
    pub fn explains(&self, model: &DirectedModel, v: &Variable) -> bool {
        if model.is_observed(v) || model.is_transparent(v) {
            return false;
        }

        match *self {
            ExplanationStatus::Ignore => false,
            ExplanationStatus::Explanation => model.is_explanatory(v),
            ExplanationStatus::FullExplanation => true
        }
    }

}


/// A `ConditionalInferenceEngine` is capable of answering Conditional Probability Queries of the form:
///     ```P(Y | E = e)```
///
/// `ConditionalInferenceEngine`s are stateful and hold the evidence `e` themselves.
pub trait ConditionalInferenceEngine {

    /// Infer the posterior distribution ```P(variable | evidence)```
    fn infer(&mut self, variable: &Variable) -> Result<Factor>;

}


/// A `MapInferenceEngine` is capable of answering most probable explanation queries:
///     ```MPE(E = e) = argmax_x P(X = x, E = e)```
///
/// `MapInferenceEngine`s are stateful and hold the evidence `e` themselves.
pub trait MapInferenceEngine {

    /// Infer the most probable assignment to every unobserved variable given the evidence. The
    /// assignment includes the evidence.
    fn infer_map(&mut self) -> Result<Assignment>;

}
