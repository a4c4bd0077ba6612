//! Networks shared by the unit tests of several modules

use crate::factor::Factor;
use crate::init::Initialization;
use crate::model::{DirectedModel, DirectedModelBuilder};
use crate::variable::{all_assignments, Assignment, Variable};
use crate::util::Result;

use ndarray::array;


/// The classic sprinkler network: rain -> sprinkler, {rain, sprinkler} -> grass.
/// Every variable has the labels ```["true", "false"]```.
pub fn sprinkler() -> DirectedModel {
    let mut b = DirectedModelBuilder::new();
    let rain = b.add_variable("rain", &["true", "false"]);
    let sprinkler = b.add_variable("sprinkler", &["true", "false"]);
    let grass = b.add_variable("grass", &["true", "false"]);

    let cpd_s = Factor::cpd(sprinkler, vec![rain], array![[0.01, 0.4], [0.99, 0.6]].into_dyn()).unwrap();
    let cpd_g = Factor::cpd(
        grass,
        vec![sprinkler, rain],
        array![[[0.99, 0.9], [0.8, 0.0]],
               [[0.01, 0.1], [0.2, 1.0]]].into_dyn()
    ).unwrap();

    b.with_cpd(&rain, &[], Initialization::Binomial(0.2))
     .with_cpd(&sprinkler, &[rain], Initialization::Table(cpd_s))
     .with_cpd(&grass, &[sprinkler, rain], Initialization::Table(cpd_g));

    b.build().unwrap()
}


/// A chain of four binary variables a -> b -> c -> d
pub fn chain() -> DirectedModel {
    let mut b = DirectedModelBuilder::new();
    let vars: Vec<Variable> = ["a", "b", "c", "d"].iter().map(|n| b.add_variable(n, &["0", "1"])).collect();

    b.with_cpd(&vars[0], &[], Initialization::Binomial(0.3));

    let tables = [
        array![[0.9, 0.2], [0.1, 0.8]],
        array![[0.6, 0.25], [0.4, 0.75]],
        array![[0.3, 0.95], [0.7, 0.05]]
    ];

    for (i, t) in tables.iter().enumerate() {
        let cpd = Factor::cpd(vars[i + 1], vec![vars[i]], t.clone().into_dyn()).unwrap();
        b.with_cpd(&vars[i + 1], &[vars[i]], Initialization::Table(cpd));
    }

    b.build().unwrap()
}


/// The student network of Koller & Friedman (Figure 3.4, without the job/happy extension),
/// with the parameters of the webchurch exact-inference example 6d.
pub fn student() -> DirectedModel {
    let mut b = DirectedModelBuilder::new();
    let d = b.add_variable("D", &["0", "1"]);
    let i = b.add_variable("I", &["0", "1"]);
    let g = b.add_variable("G", &["0", "1"]);
    let s = b.add_variable("S", &["0", "1"]);
    let l = b.add_variable("L", &["0", "1"]);

    let cpd_g = Factor::cpd(
        g,
        vec![i, d],
        array![[[0.3, 0.05], [0.9, 0.5]],
               [[0.7, 0.95], [0.1, 0.5]]].into_dyn()
    ).unwrap();
    let cpd_s = Factor::cpd(s, vec![i], array![[0.95, 0.2], [0.05, 0.8]].into_dyn()).unwrap();
    let cpd_l = Factor::cpd(l, vec![g], array![[0.9, 0.4], [0.1, 0.6]].into_dyn()).unwrap();

    b.with_cpd(&d, &[], Initialization::Binomial(0.6))
     .with_cpd(&i, &[], Initialization::Binomial(0.7))
     .with_cpd(&g, &[i, d], Initialization::Table(cpd_g))
     .with_cpd(&s, &[i], Initialization::Table(cpd_s))
     .with_cpd(&l, &[g], Initialization::Table(cpd_l));

    b.build().unwrap()
}


/// Brute-force posterior of `query` under the model's evidence, by enumerating the full joint
pub fn enumerate_posterior(model: &DirectedModel, query: &Variable) -> Result<Vec<f64>> {
    let evidence = model.evidence();
    let mut totals = vec![0.0; query.cardinality()];

    for assn in all_assignments(&model.variables()) {
        if consistent(&assn, &evidence) {
            let q = *assn.get(query).unwrap();
            totals[q] += model.probability(&assn)?;
        }
    }

    let z: f64 = totals.iter().sum();
    Ok(totals.into_iter().map(|t| t / z).collect())
}


/// Brute-force probability of the model's evidence
pub fn enumerate_evidence(model: &DirectedModel) -> Result<f64> {
    let evidence = model.evidence();
    let mut total = 0.0;
    for assn in all_assignments(&model.variables()) {
        if consistent(&assn, &evidence) {
            total += model.probability(&assn)?;
        }
    }

    Ok(total)
}


pub fn consistent(assn: &Assignment, evidence: &Assignment) -> bool {
    evidence.iter().all(|(v, i)| assn.get(v) == Some(i))
}
