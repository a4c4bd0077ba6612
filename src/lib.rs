//! Exact inference on discrete Bayesian networks by bucket elimination.
//!
//! A `DirectedModel` is built with a `DirectedModelBuilder` (or assembled from parsed parts with
//! `DirectedModel::from_parts`), and queried through a `BucketEliminationEngine`: posterior
//! marginals, expectations, the probability of the evidence, expected utility and most probable
//! explanations.

pub mod variable;
pub mod factor;
pub mod init;
pub mod model;
pub mod graph;
pub mod inference;
pub mod util;

#[cfg(test)]
mod testing;

pub use util::{Result, BucketeerError};
pub use variable::{all_assignments, Assignment, Variable};
pub use factor::{Factor, Potential};
pub use init::Initialization;
pub use model::{DirectedModel, DirectedModelBuilder};
pub use inference::{
    BucketEliminationEngine,
    ConditionalInferenceEngine,
    EngineOptions,
    Explanation,
    ExplanationMode,
    MapInferenceEngine
};
