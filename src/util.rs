//! Defines the `Error` type for the bucketeer library

use ndarray::ShapeError;
use thiserror::Error;

use std::result;

pub type Result<T> = result::Result<T, BucketeerError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BucketeerError {

    /// A variable name that could not be resolved against the model
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// A value label that could not be resolved against the domain of a variable
    #[error("unknown value `{value}` for variable `{variable}`")]
    UnknownValue { variable: String, value: String },

    /// An assignment did not cover the scope of the `Factor` it was evaluated against
    #[error("assignment is missing variables required by the factor scope")]
    OutOfScope,

    /// A distribution summed to zero and cannot be normalized. In practice this means the
    /// evidence is inconsistent with the model.
    #[error("distribution sums to zero; the evidence is inconsistent")]
    DegenerateDistribution,

    /// The parent structure of the model contains a directed cycle through the named variable
    #[error("network contains a directed cycle through `{0}`")]
    CyclicNetwork(String),

    /// Represents an error where a certain constraint on a scope was not satisfied
    #[error("provided scope did not satisfy constraints")]
    InvalidScope,

    /// Exactly what it sounds like
    #[error("encountered division by zero")]
    DivideByZero,

    /// Represents an error where there was a parent variable expected, but not found
    #[error("missing a parent from the model")]
    MissingParent,

    /// Represents a variable that was present multiple times in a situation where it should only
    /// have been present once
    #[error("variable `{0}` was encountered twice")]
    DuplicateVariable(String),

    /// Represents the situation when we expected a CPD but did not receive one
    #[error("requires a conditional probability distribution")]
    NotACPD,

    /// Represents an attempt to initialize a variable with an incompatible Initialization
    #[error("an invalid initialization was provided")]
    InvalidInitialization,

    /// Represents a situation in which there was a negative probability provided
    #[error("encountered a negative probability")]
    NegativeProbability,

    /// A user supplied elimination order could not be used
    #[error("invalid elimination order: {0}")]
    InvalidOrder(String),

    /// An operation on a `BucketTree` was attempted before its preconditions held
    #[error("bucket tree is not in a valid state: {0}")]
    InvalidTreeState(String),

    /// A utility query was made against a model without a utility factor
    #[error("the model has no utility factor")]
    MissingUtility,

    /// The reduction was stopped by an `Interrupt` before the given bucket was processed
    #[error("inference interrupted before bucket {bucket} of {total}")]
    Interrupted { bucket: usize, total: usize },

    /// A general error with the given description
    #[error("{0}")]
    General(String)

}

impl From<ShapeError> for BucketeerError {

    fn from(err: ShapeError) -> Self {
        BucketeerError::General(format!("table shape error: {}", err))
    }

}
