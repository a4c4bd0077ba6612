//! Stack-based reachability along active trails (Koller & Friedman Algorithm 3.1).

use crate::model::DirectedModel;
use crate::variable::Variable;

use tracing::trace;

use std::collections::HashSet;


/// What a reachability search reports
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reachability {
    /// The unobserved variables d-connected to the source given the evidence
    Connected,

    /// The variables whose distribution can change the posterior of the source given the
    /// evidence. Each variable receives an extra parent standing for its parameters; a variable is
    /// affecting if its parameter vertex is d-connected to the source.
    Affecting
}


/// Direction a vertex was entered from along a trail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Direction {
    /// Entered from a child, travelling towards the parents
    Up,

    /// Entered from a parent, travelling towards the children
    Down
}


/// D-separation queries against the current evidence of a `DirectedModel`
pub struct DSeparation<'a> {
    model: &'a DirectedModel,

    /// The model's `Variable`s by index
    variables: Vec<Variable>
}


impl<'a> DSeparation<'a> {

    pub fn new(model: &'a DirectedModel) -> Self {
        DSeparation { model, variables: model.variables() }
    }


    /// The unobserved `Variable`s d-connected to `x` given the evidence, `x` included
    pub fn all_connected(&self, x: &Variable) -> Vec<Variable> {
        self.reachable(x, Reachability::Connected)
    }


    /// The `Variable`s whose CPDs affect the posterior of `x` given the evidence
    pub fn all_affecting(&self, x: &Variable) -> Vec<Variable> {
        self.reachable(x, Reachability::Affecting)
    }


    /// Check if `x` and `y` are d-separated given the evidence
    pub fn d_separated(&self, x: &Variable, y: &Variable) -> bool {
        ! self.all_connected(x).contains(y)
    }


    /// Run the search from `x` in the given mode.
    ///
    /// Vertices ```0..n``` are the variables. In `Reachability::Affecting` mode vertex ```v + n```
    /// is the parameter vertex of variable ```v```, its only parent.
    ///
    /// # Returns
    /// the reported `Variable`s in declaration order. A variable foreign to the model yields an
    /// empty result.
    pub fn reachable(&self, x: &Variable, mode: Reachability) -> Vec<Variable> {
        let n = self.variables.len();
        if ! self.model.contains(x) {
            return vec![];
        }

        let size = match mode {
            Reachability::Connected => n,
            Reachability::Affecting => 2 * n
        };

        ///////////////////////////////////////////////////////////////////////
        // 1) Mark every vertex that is observed or has an observed descendant
        let mut ancestors = vec![false; size];
        let mut pending: Vec<usize> = (0..n).filter(|&v| self.observed(v)).collect();
        while let Some(v) = pending.pop() {
            if ancestors[v] {
                continue;
            }
            ancestors[v] = true;
            pending.extend(self.parents(v, mode));
        }

        ///////////////////////////////////////////////////////////////////////
        // 2) Traverse active trails from x
        let mut visited: HashSet<(usize, Direction)> = HashSet::new();
        let mut reached = vec![false; size];
        let mut stack = vec![(x.index(), Direction::Up), (x.index(), Direction::Down)];

        while let Some((v, direction)) = stack.pop() {
            if ! visited.insert((v, direction)) {
                continue;
            }

            let observed = self.observed(v);
            if ! observed {
                reached[v] = true;
            }

            match direction {
                Direction::Up if ! observed => {
                    stack.extend(self.parents(v, mode).into_iter().map(|p| (p, Direction::Up)));
                    stack.extend(self.children(v).into_iter().map(|c| (c, Direction::Down)));
                },
                Direction::Up => (),
                Direction::Down => {
                    if ! observed {
                        stack.extend(self.children(v).into_iter().map(|c| (c, Direction::Down)));
                    }
                    // v-structure activated by evidence at or below v
                    if ancestors[v] {
                        stack.extend(self.parents(v, mode).into_iter().map(|p| (p, Direction::Up)));
                    }
                }
            }
        }

        let result: Vec<Variable> = match mode {
            Reachability::Connected => {
                (0..n).filter(|&v| reached[v]).map(|v| self.variables[v]).collect()
            },
            Reachability::Affecting => {
                (0..n).filter(|&v| reached[v + n]).map(|v| self.variables[v]).collect()
            }
        };

        trace!(source = %x, ?mode, count = result.len(), "reachability");
        result
    }


    fn observed(&self, v: usize) -> bool {
        self.variables.get(v).map(|var| self.model.is_observed(var)).unwrap_or(false)
    }


    fn parents(&self, v: usize, mode: Reachability) -> Vec<usize> {
        let n = self.variables.len();
        if v >= n {
            return vec![];
        }

        let mut parents: Vec<usize> = self.model.parents(&self.variables[v]).iter().map(|p| p.index()).collect();
        if mode == Reachability::Affecting {
            parents.push(v + n);
        }

        parents
    }


    fn children(&self, v: usize) -> Vec<usize> {
        let n = self.variables.len();
        if v >= n {
            // a parameter vertex has its variable as only child
            return vec![v - n];
        }

        self.model.children(&self.variables[v]).iter().map(|c| c.index()).collect()
    }

}
