//! A readable description of a bucket tree, for debugging and reporting

use super::bucket::{BucketStatus, FactorOrigin};
use super::ExplanationStatus;

use itertools::Itertools;

use std::fmt;


/// One factor held by a bucket
#[derive(Clone, Debug, PartialEq)]
pub struct FactorTrace {
    pub origin: FactorOrigin,

    /// Names of the scope variables
    pub scope: Vec<String>
}


/// One bucket of a tree
#[derive(Clone, Debug, PartialEq)]
pub struct BucketTrace {
    pub variable: String,
    pub status: BucketStatus,
    pub explanatory: bool,
    pub factors: Vec<FactorTrace>,
    pub separator: Option<Vec<String>>,
    pub cluster: Option<Vec<String>>,
    pub backward_pointer: bool,
    pub parent: Option<String>,
    pub children: Vec<String>
}


/// A whole tree, with its result once reduced
#[derive(Clone, Debug, PartialEq)]
pub struct TreeTrace {
    pub status: ExplanationStatus,
    pub objective: String,
    pub buckets: Vec<BucketTrace>,
    pub constant: f64,

    /// Values of the unnormalized result
    pub result: Option<Vec<f64>>,

    /// Values of the normalized result
    pub normalized: Option<Vec<f64>>
}


fn braces(names: &[String]) -> String {
    format!("{{{}}}", names.join(", "))
}


impl fmt::Display for FactorTrace {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let origin = match self.origin {
            FactorOrigin::Distribution => String::from("cpd"),
            FactorOrigin::Likelihood => String::from("likelihood"),
            FactorOrigin::Utility => String::from("utility"),
            FactorOrigin::Separator(i) => format!("separator of #{}", i)
        };

        write!(f, "{} {}", origin, braces(&self.scope))
    }

}


impl fmt::Display for BucketTrace {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mode = if self.explanatory { "max" } else { "sum" };
        writeln!(f, "bucket {} [{:?}, {}]", self.variable, self.status, mode)?;

        for factor in &self.factors {
            writeln!(f, "    {}", factor)?;
        }

        if let Some(ref separator) = self.separator {
            writeln!(f, "    separator {}", braces(separator))?;
        }
        if let Some(ref cluster) = self.cluster {
            writeln!(f, "    cluster {}", braces(cluster))?;
        }
        if let Some(ref parent) = self.parent {
            writeln!(f, "    parent {}", parent)?;
        }
        if ! self.children.is_empty() {
            writeln!(f, "    children {}", braces(&self.children))?;
        }

        Ok(())
    }

}


impl fmt::Display for TreeTrace {

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "tree for {} ({:?}), constant {:.6}", self.objective, self.status, self.constant)?;

        for (i, bucket) in self.buckets.iter().enumerate() {
            write!(f, "#{} {}", i, bucket)?;
        }

        if let Some(ref result) = self.result {
            writeln!(f, "result [{}]", result.iter().map(|x| format!("{:.6}", x)).join(", "))?;
        }
        if let Some(ref normalized) = self.normalized {
            writeln!(f, "normalized [{}]", normalized.iter().map(|x| format!("{:.6}", x)).join(", "))?;
        }

        Ok(())
    }

}
