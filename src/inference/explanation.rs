//! Results of explanation queries

use super::ExplanationStatus;
use crate::factor::Factor;
use crate::model::DirectedModel;
use crate::variable::{Assignment, Variable};

use std::fmt;


/// Which variables an explanation query maximizes over
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExplanationMode {
    /// Only the variables marked explanatory
    Marked,

    /// Every unobserved variable that is not transparent
    Full
}

impl ExplanationMode {

    pub fn status(&self) -> ExplanationStatus {
        match *self {
            ExplanationMode::Marked => ExplanationStatus::Explanation,
            ExplanationMode::Full => ExplanationStatus::FullExplanation
        }
    }

}


/// The maximizing assignment of an explanation query
#[derive(Clone, Debug, PartialEq)]
pub struct MostProbableExplanation {
    /// The value of each `Variable`, by index. Observed variables carry their evidence; variables
    /// that were summed out, or are transparent, carry `None`.
    values: Vec<Option<usize>>,

    /// ```P(x*, e)```: the joint probability of the maximizing assignment and the evidence, with
    /// every unexplained variable summed out
    probability: f64
}

impl MostProbableExplanation {

    pub(crate) fn new(values: Vec<Option<usize>>, probability: f64) -> Self {
        MostProbableExplanation { values, probability }
    }

    /// The value chosen for `v`, if it was explained or observed
    pub fn value(&self, v: &Variable) -> Option<usize> {
        self.values.get(v.index()).cloned().unwrap_or(None)
    }

    /// The values of every `Variable`, by index
    pub fn values(&self) -> &[Option<usize>] {
        &self.values
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// The resolved values as an `Assignment` over `model`'s variables
    pub fn assignment(&self, model: &DirectedModel) -> Assignment {
        model.variables()
             .into_iter()
             .filter_map(|v| self.value(&v).map(|i| (v, i)))
             .collect()
    }

    /// ```(name, label)``` of each resolved `Variable`, in declaration order
    pub fn labels(&self, model: &DirectedModel) -> Vec<(String, String)> {
        model.variables()
             .into_iter()
             .filter_map(|v| {
                 let i = self.value(&v)?;
                 let label = model.labels(&v).get(i).cloned().unwrap_or_else(|| i.to_string());
                 Some((model.name(&v), label))
             })
             .collect()
    }

}


/// The answer to an explanation query
#[derive(Clone, Debug, PartialEq)]
pub enum Explanation {
    /// The maximizing assignment of the explained variables
    MostProbable(MostProbableExplanation),

    /// Nothing was marked for explanation, so the posterior of the default objective is returned
    /// instead
    Posterior(Factor)
}

impl Explanation {

    pub fn most_probable(&self) -> Option<&MostProbableExplanation> {
        match *self {
            Explanation::MostProbable(ref mpe) => Some(mpe),
            Explanation::Posterior(_) => None
        }
    }

}

impl fmt::Display for MostProbableExplanation {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let resolved: Vec<String> = self.values.iter()
                                               .enumerate()
                                               .filter_map(|(i, v)| v.map(|x| format!("X{}={}", i, x)))
                                               .collect();
        write!(f, "[{}] with probability {:.6}", resolved.join(", "), self.probability)
    }

}
