use log::debug;

use super::{CombinatorialSolver, SelectionProblem, Selector, UndersizedUniversePolicy};
use crate::error::Result;
use crate::estimates::MarketEstimates;
use crate::types::{RiskTolerance, Selection};

/// Reward/risk selection delegated to a [`CombinatorialSolver`].
#[derive(Clone, Debug)]
pub struct QuboSelector<S> {
    solver: S,
    policy: UndersizedUniversePolicy,
}

impl<S: CombinatorialSolver> QuboSelector<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            policy: UndersizedUniversePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UndersizedUniversePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }
}

impl<S: CombinatorialSolver> Selector for QuboSelector<S> {
    fn select(&self, estimates: &MarketEstimates, k: usize, risk: RiskTolerance) -> Result<Selection> {
        if let Some(trivial) = self.policy.resolve(estimates.symbols(), k)? {
            return Ok(trivial);
        }

        let problem = SelectionProblem::from_estimates(estimates, k, risk);
        let x = self.solver.solve(&problem)?;
        let selection = problem.decode(&x, estimates.symbols())?;
        debug!(
            "{} solver selected {:?} (objective {:.6})",
            self.solver.name(),
            selection.symbols(),
            problem.objective(&x)
        );
        Ok(selection)
    }

    fn name(&self) -> &'static str {
        "qubo"
    }
}
