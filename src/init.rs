//! Module containing initialization routines for the conditional distributions of a model.

use crate::factor::{Factor, Table};
use crate::util::{BucketeerError, Result};
use crate::variable::Variable;

use ndarray::prelude as nd;
use ndarray::Axis;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Defines possible ways to initialize a `Variable`s CPD.
pub enum Initialization<'a> {
    /// A uniform distribution over all possibilities
    Uniform,

    /// Randomly initialize the weights of the CPD.
    Random,

    /// Randomly initialize the weights of the CPD from a seeded generator, so the same seed always
    /// yields the same table.
    Seeded(u64),

    /// Initialize the CPD as a Binomial distribution with parameter ```p```.
    /// Note that this `Initialization` is valid only to a `Variable` with no parents.
    Binomial(f64),

    /// Initialize the CPD as a Multinomial distribution with parameters ```p_0, p_1...```.
    /// Note that this `Initialization` is valid only to a `Variable` with no parents.
    Multinomial(&'a [f64]),

    /// User defined CPD
    Table(Factor)
}


impl<'a> Initialization<'a> {

    /// Construct a CPD, initialized based on ```self```
    ///
    /// # Args
    /// * `var`: the `Variable` the distribution is over
    /// * `parents`: the `Variable`s the distribution is conditioned on
    ///
    /// # Returns
    /// a CPD `Factor` with scope ```[var, parents...]```, in that order.
    ///
    /// # Errors
    /// * `BucketeerError::InvalidInitialization` if a binomial/multinomial does not fit `var`, or
    ///   a user table is not a CPD
    /// * `BucketeerError::InvalidScope` if a user table is not over ```[var, parents...]```
    pub fn build_cpd(self, var: Variable, parents: Vec<Variable>) -> Result<Factor> {
        ///////////////////////////////////////////////////////////////////////////////
        // Trivial cases

        // if this is a user defined factor, it just needs to be verified and returned
        if let Initialization::Table(f) = self {
            if ! f.is_cpd() {
                return Err(BucketeerError::InvalidInitialization);
            }

            let s = f.scope();
            if s.len() == parents.len() + 1 && s[0] == var && s[1..] == parents[..] {
                return Ok(f);
            } else {
                return Err(BucketeerError::InvalidScope);
            }
        }

        ///////////////////////////////////////////////////////////////////////////////
        // Check for errors
        if parents.is_empty() {

            match self {

                // A binomial distribution on a non-binary variable
                Initialization::Binomial(_) if var.cardinality() != 2 => {
                    return Err(BucketeerError::InvalidInitialization);
                },

                // A multinomial distribution with an incorrect number of parameters
                Initialization::Multinomial(ps) if ps.len() != var.cardinality() => {
                    return Err(BucketeerError::InvalidInitialization);
                },

                _ => ()
            }
        } else {
            match self {

                // A binomial/multinomial on a non-unit scope
                Initialization::Binomial(_) | Initialization::Multinomial(_) => {
                    return Err(BucketeerError::InvalidInitialization);
                },

                _ => ()
            }
        }

        ///////////////////////////////////////////////////////////////////////////////
        // now, build CPD
        let mut shape = vec![var.cardinality()];
        shape.extend(parents.iter().map(|v| v.cardinality()));

        let range = Uniform::new(1.0, 100.0);

        let tbl: Table = match self {
            Initialization::Uniform => {
                // normalizing constant is just the number of elements
                let val = 1. / (var.cardinality() as f64);
                nd::ArrayD::from_elem(shape, val)
            },
            Initialization::Random => {
                normalize_columns(nd::ArrayD::random(shape, range))
            },
            Initialization::Seeded(seed) => {
                let mut rng = StdRng::seed_from_u64(seed);
                normalize_columns(nd::ArrayD::random_using(shape, range, &mut rng))
            },
            Initialization::Binomial(p) => {
                nd::Array1::from(vec![p, 1.0 - p]).into_dyn()
            },
            Initialization::Multinomial(p) => {
                nd::Array1::from(p.to_vec()).into_dyn()
            },
            Initialization::Table(_) => unreachable!()
        };

        Factor::cpd(var, parents, tbl)
    }

}


/// Scale a table so that it sums to one along the axis of the owned variable
fn normalize_columns(tbl: Table) -> Table {
    let z = tbl.sum_axis(Axis(0));
    &tbl / &z
}
