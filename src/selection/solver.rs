//! Combinatorial solvers for [`SelectionProblem`].
//!
//! The engine only depends on the objective-in / 0-1-vector-out contract.
//! Two in-process backends are shipped so the optimizing strategy works
//! without an external service.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::SelectionProblem;
use crate::error::{Result, SelectionError};

/// Backend that solves a [`SelectionProblem`].
pub trait CombinatorialSolver: Send + Sync {
    /// Return one entry per variable; non-zero means selected.
    fn solve(&self, problem: &SelectionProblem) -> Result<Vec<u8>>;

    fn name(&self) -> &'static str;
}

impl<S: CombinatorialSolver + ?Sized> CombinatorialSolver for Box<S> {
    fn solve(&self, problem: &SelectionProblem) -> Result<Vec<u8>> {
        (**self).solve(problem)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

fn check(problem: &SelectionProblem) -> Result<()> {
    if problem.k == 0 {
        return Err(SelectionError::ZeroAssets.into());
    }
    if problem.k > problem.len() {
        return Err(SelectionError::UniverseTooSmall {
            universe: problem.len(),
            k: problem.k,
        }
        .into());
    }
    Ok(())
}

fn to_binary(n: usize, indices: &[usize]) -> Vec<u8> {
    let mut x = vec![0u8; n];
    for &i in indices {
        x[i] = 1;
    }
    x
}

// ---------------------------------------------------------------------------
// Exhaustive
// ---------------------------------------------------------------------------

/// Enumerates every `k`-subset. Exact, refuses problems above `max_combinations`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExhaustiveSolver {
    pub max_combinations: u64,
}

impl Default for ExhaustiveSolver {
    fn default() -> Self {
        Self {
            max_combinations: 2_000_000,
        }
    }
}

/// `C(n, k)`, `None` on overflow.
fn binomial(n: usize, k: usize) -> Option<u64> {
    let k = k.min(n - k);
    let mut acc: u64 = 1;
    for i in 0..k {
        acc = acc.checked_mul((n - i) as u64)? / (i as u64 + 1);
    }
    Some(acc)
}

impl CombinatorialSolver for ExhaustiveSolver {
    fn solve(&self, problem: &SelectionProblem) -> Result<Vec<u8>> {
        check(problem)?;
        let (n, k) = (problem.len(), problem.k);
        let count = binomial(n, k).unwrap_or(u64::MAX);
        if count > self.max_combinations {
            return Err(SelectionError::Solver(format!(
                "C({n}, {k}) = {count} exceeds the exhaustive limit of {}",
                self.max_combinations
            ))
            .into());
        }

        let mut combo: Vec<usize> = (0..k).collect();
        let mut best = combo.clone();
        let mut best_value = problem.subset_objective(&combo);

        loop {
            // Advance to the next combination in lexicographic order.
            let Some(pos) = (0..k).rev().find(|&i| combo[i] < n - k + i) else {
                break;
            };
            combo[pos] += 1;
            for i in pos + 1..k {
                combo[i] = combo[i - 1] + 1;
            }
            let value = problem.subset_objective(&combo);
            if value < best_value {
                best_value = value;
                best.clone_from(&combo);
            }
        }

        debug!("exhaustive solver: {count} subsets, best objective {best_value:.6}");
        Ok(to_binary(n, &best))
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}

// ---------------------------------------------------------------------------
// Local search
// ---------------------------------------------------------------------------

/// Greedy construction followed by best-improvement swaps, with seeded
/// random restarts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalSearchSolver {
    pub restarts: usize,
    pub max_passes: usize,
    pub seed: u64,
}

impl Default for LocalSearchSolver {
    fn default() -> Self {
        Self {
            restarts: 16,
            max_passes: 1_000,
            seed: 42,
        }
    }
}

/// Incremental state for swap moves: `coupling[x] = Σ_{t∈S} Q[x, t]`.
struct SwapState<'a> {
    problem: &'a SelectionProblem,
    in_set: Vec<bool>,
    coupling: Vec<f64>,
    value: f64,
}

impl<'a> SwapState<'a> {
    fn new(problem: &'a SelectionProblem, members: &[usize]) -> Self {
        let n = problem.len();
        let mut in_set = vec![false; n];
        let mut coupling = vec![0.0; n];
        for &t in members {
            in_set[t] = true;
            for (x, c) in coupling.iter_mut().enumerate() {
                *c += problem.quadratic[(x, t)];
            }
        }
        Self {
            problem,
            in_set,
            coupling,
            value: problem.subset_objective(members),
        }
    }

    /// Objective change of replacing `out` with `inn`.
    fn swap_delta(&self, out: usize, inn: usize) -> f64 {
        let q = &self.problem.quadratic;
        let l = &self.problem.linear;
        l[inn] - l[out] + q[(inn, inn)] + q[(out, out)] + 2.0 * self.coupling[inn]
            - 2.0 * q[(inn, out)]
            - 2.0 * self.coupling[out]
    }

    fn apply(&mut self, out: usize, inn: usize, delta: f64) {
        self.in_set[out] = false;
        self.in_set[inn] = true;
        for (x, c) in self.coupling.iter_mut().enumerate() {
            *c += self.problem.quadratic[(x, inn)] - self.problem.quadratic[(x, out)];
        }
        self.value += delta;
    }

    fn members(&self) -> Vec<usize> {
        (0..self.in_set.len()).filter(|&i| self.in_set[i]).collect()
    }
}

impl LocalSearchSolver {
    fn greedy(problem: &SelectionProblem) -> Vec<usize> {
        let n = problem.len();
        let mut chosen = Vec::with_capacity(problem.k);
        let mut in_set = vec![false; n];
        let mut coupling = vec![0.0; n];
        for _ in 0..problem.k {
            let next = (0..n)
                .filter(|&j| !in_set[j])
                .map(|j| (j, problem.linear[j] + problem.quadratic[(j, j)] + 2.0 * coupling[j]))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(j, _)| j);
            let Some(j) = next else { break };
            in_set[j] = true;
            chosen.push(j);
            for (x, c) in coupling.iter_mut().enumerate() {
                *c += problem.quadratic[(x, j)];
            }
        }
        chosen
    }

    fn improve(&self, state: &mut SwapState<'_>) {
        let n = state.in_set.len();
        for _ in 0..self.max_passes {
            let mut best: Option<(usize, usize, f64)> = None;
            for out in (0..n).filter(|&i| state.in_set[i]) {
                for inn in (0..n).filter(|&j| !state.in_set[j]) {
                    let d = state.swap_delta(out, inn);
                    if d < -1e-15 && best.is_none_or(|(_, _, bd)| d < bd) {
                        best = Some((out, inn, d));
                    }
                }
            }
            match best {
                Some((out, inn, d)) => state.apply(out, inn, d),
                None => return,
            }
        }
    }
}

impl CombinatorialSolver for LocalSearchSolver {
    fn solve(&self, problem: &SelectionProblem) -> Result<Vec<u8>> {
        check(problem)?;
        let (n, k) = (problem.len(), problem.k);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut state = SwapState::new(problem, &Self::greedy(problem));
        self.improve(&mut state);
        let mut best = state.members();
        let mut best_value = state.value;

        for _ in 0..self.restarts {
            let start = rand::seq::index::sample(&mut rng, n, k).into_vec();
            let mut state = SwapState::new(problem, &start);
            self.improve(&mut state);
            if state.value < best_value {
                best_value = state.value;
                best = state.members();
            }
        }

        debug!(
            "local search solver: {} restarts, best objective {best_value:.6}",
            self.restarts
        );
        Ok(to_binary(n, &best))
    }

    fn name(&self) -> &'static str {
        "local_search"
    }
}
