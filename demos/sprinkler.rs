//! Provides an example of how to use bucketeer to answer queries on the sprinkler network.

use bucketeer as b;
use ndarray::array;

fn main() -> b::Result<()> {
    /////////////////////////////////////////////////////
    // Step 1: Build Model
    let model = build_model()?;

    /////////////////////////////////////////////////////
    // Step 2: Build an inference engine and compile some evidence
    let options = b::EngineOptions::new().produce_clusters(true);
    let mut engine = b::BucketEliminationEngine::new(model, options);
    engine.observe("grass", "wet")?;

    /////////////////////////////////////////////////////
    // Step 3: Run conditional queries
    for name in &["rain", "sprinkler"] {
        let p = engine.marginal(Some(*name))?;
        for (label, value) in engine.model().labels(&p.scope()[0]).iter().zip(p.values()) {
            println!("P({} = {} | grass = wet) = {:.4}", name, label, value);
        }
    }
    println!("P(grass = wet) = {:.4}", engine.evidence_probability()?);

    if let Some(trace) = engine.trace() {
        println!("\n{}", trace);
    }

    /////////////////////////////////////////////////////
    // Step 4: Explain the evidence
    engine.set_explanatory("rain", true)?;
    engine.set_explanatory("sprinkler", true)?;

    if let b::Explanation::MostProbable(mpe) = engine.explanation(b::ExplanationMode::Marked)? {
        let labels: Vec<String> = mpe.labels(engine.model())
                                     .into_iter()
                                     .map(|(name, label)| format!("{} = {}", name, label))
                                     .collect();
        println!("most probable explanation: {} (p = {:.4})", labels.join(", "), mpe.probability());
    }

    Ok(())
}

fn build_model() -> b::Result<b::DirectedModel> {
    let mut builder = b::DirectedModelBuilder::new();
    let rain = builder.add_variable("rain", &["yes", "no"]);
    let sprinkler = builder.add_variable("sprinkler", &["on", "off"]);
    let grass = builder.add_variable("grass", &["wet", "dry"]);

    ///////////////////////////////////////////////////
    // CPTs for variables with parents
    let cpt_s = b::Factor::cpd(sprinkler, vec![rain], array![[0.01, 0.4], [0.99, 0.6]].into_dyn())?;
    let cpt_g = b::Factor::cpd(
        grass,
        vec![sprinkler, rain],
        array![
            [[0.99, 0.9], [0.8, 0.0]],
            [[0.01, 0.1], [0.2, 1.0]]
        ].into_dyn()
    )?;

    builder.with_cpd(&rain, &[], b::Initialization::Binomial(0.2))
           .with_cpd(&sprinkler, &[rain], b::Initialization::Table(cpt_s))
           .with_cpd(&grass, &[sprinkler, rain], b::Initialization::Table(cpt_g));

    builder.build()
}
