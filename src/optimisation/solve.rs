//! Solving a built problem with HiGHS.
use super::problem::{LinearExpr, Problem};
use crate::settings::Settings;
use highs::{HighsModelStatus, HighsStatus, RowProblem, Sense};
use log::{debug, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::time::Instant;

/// How a solve terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum SolveStatus {
    /// An optimal solution was found
    #[serde(rename = "optimal")]
    #[strum(serialize = "optimal")]
    Optimal,
    /// The time limit was reached with a feasible solution
    #[serde(rename = "timed-out")]
    #[strum(serialize = "timed-out")]
    TimedOut,
    /// The solver stopped without a usable solution (e.g. infeasibility, or the time limit
    /// was reached before any solution was found)
    #[serde(rename = "not optimal")]
    #[strum(serialize = "not optimal")]
    NotOptimal,
}

/// Options passed to the solver
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Maximum solve time in seconds
    pub time_limit: f64,
    /// Relative gap at which a MIP solution is accepted as optimal
    pub mip_rel_gap: f64,
    /// Whether the solver writes its log to the console
    pub output: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SolverOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            time_limit: settings.solver_time_limit,
            mip_rel_gap: settings.mip_rel_gap,
            output: settings.solver_output,
        }
    }
}

/// Indicates that HiGHS rejected the problem.
///
/// Users should not be able to trigger this error.
#[derive(Debug, Clone)]
pub struct IncoherentModel(pub HighsStatus);

impl fmt::Display for IncoherentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Incoherent model: {:?}", self.0)
    }
}

impl Error for IncoherentModel {}

/// Relative tolerance used when checking a time-limited incumbent
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// A solution found by the solver
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedProblem {
    /// The value of every column
    pub values: Vec<f64>,
    /// The value of the objective
    pub objective_value: f64,
    /// Wall-clock time spent in the solver
    pub solver_seconds: f64,
}

/// A problem for which no usable solution was found
#[derive(Debug, Clone, PartialEq)]
pub struct UnsolvedModel {
    /// The problem which was built
    pub problem: Problem,
    /// The objective which was to be minimised
    pub objective: LinearExpr,
    /// Why the solver stopped
    pub termination: HighsModelStatus,
    /// Wall-clock time spent in the solver
    pub solver_seconds: f64,
}

/// The outcome of a solve
#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    /// An optimal solution was found
    Optimal(SolvedProblem),
    /// The time limit was reached with a feasible, but possibly suboptimal, solution
    TimedOut(SolvedProblem),
    /// No usable solution was found
    NotOptimal(UnsolvedModel),
}

impl SolveOutcome {
    /// How the solve terminated
    pub fn status(&self) -> SolveStatus {
        match self {
            Self::Optimal(_) => SolveStatus::Optimal,
            Self::TimedOut(_) => SolveStatus::TimedOut,
            Self::NotOptimal(_) => SolveStatus::NotOptimal,
        }
    }

    /// The solution, if the solver found one
    pub fn solution(&self) -> Option<&SolvedProblem> {
        match self {
            Self::Optimal(solved) | Self::TimedOut(solved) => Some(solved),
            Self::NotOptimal(_) => None,
        }
    }

    /// Wall-clock time spent in the solver
    pub fn solver_seconds(&self) -> f64 {
        match self {
            Self::Optimal(solved) | Self::TimedOut(solved) => solved.solver_seconds,
            Self::NotOptimal(unsolved) => unsolved.solver_seconds,
        }
    }
}

/// Translate the problem for HiGHS.
///
/// Columns are added in index order, so HiGHS column `i` is [`super::Variable`] `i`.
fn to_highs(problem: &Problem, objective: &LinearExpr) -> RowProblem {
    let mut costs = vec![0.0; problem.num_cols()];
    for &(var, coeff) in objective.terms() {
        costs[var.index()] += coeff;
    }

    let mut highs_problem = RowProblem::default();
    let cols: Vec<_> = problem
        .columns()
        .iter()
        .zip(costs)
        .map(|(column, cost)| {
            if column.is_integer {
                highs_problem.add_integer_column(cost, column.lower..=column.upper)
            } else {
                highs_problem.add_column(cost, column.lower..=column.upper)
            }
        })
        .collect();

    for row in problem.rows() {
        highs_problem.add_row(
            row.lower..=row.upper,
            row.terms
                .iter()
                .map(|&(var, coeff)| (cols[var.index()], coeff)),
        );
    }

    highs_problem
}

/// Minimise `objective` subject to the constraints in `problem`.
///
/// A solve which finishes without an optimal solution is not an error. Reaching the time limit
/// with a feasible solution gives [`SolveOutcome::TimedOut`]; anything else gives
/// [`SolveOutcome::NotOptimal`] holding the problem, so that the caller can report it.
pub fn solve(
    problem: Problem,
    objective: LinearExpr,
    options: &SolverOptions,
) -> Result<SolveOutcome, IncoherentModel> {
    debug!(
        "Solving problem with {} columns ({} integer) and {} rows",
        problem.num_cols(),
        problem.num_integer_cols(),
        problem.num_rows()
    );

    let mut model = to_highs(&problem, &objective).optimise(Sense::Minimise);
    model.set_option("time_limit", options.time_limit);
    model.set_option("mip_rel_gap", options.mip_rel_gap);
    model.set_option("output_flag", options.output);
    model.set_option("log_to_console", options.output);

    let start = Instant::now();
    let solved = model.try_solve().map_err(IncoherentModel)?;
    let solver_seconds = start.elapsed().as_secs_f64();

    let termination = solved.status();
    let values = match termination {
        HighsModelStatus::Optimal | HighsModelStatus::ReachedTimeLimit => {
            solved.get_solution().columns().to_vec()
        }
        _ => Vec::new(),
    };

    Ok(classify(
        problem,
        objective,
        termination,
        values,
        solver_seconds,
    ))
}

/// Decide the outcome of a solve from the solver's status and the column values it returned.
///
/// When the time limit is reached, the values are only kept if they are a feasible incumbent.
fn classify(
    problem: Problem,
    objective: LinearExpr,
    termination: HighsModelStatus,
    values: Vec<f64>,
    solver_seconds: f64,
) -> SolveOutcome {
    match termination {
        HighsModelStatus::Optimal => {
            let objective_value = objective.value(&values);
            debug!("Optimal objective {objective_value} found in {solver_seconds:.2}s");
            SolveOutcome::Optimal(SolvedProblem {
                values,
                objective_value,
                solver_seconds,
            })
        }
        HighsModelStatus::ReachedTimeLimit
            if problem.is_feasible(&values, FEASIBILITY_TOLERANCE) =>
        {
            let objective_value = objective.value(&values);
            warn!(
                "Time limit reached after {solver_seconds:.2}s; using the best solution found \
                (objective {objective_value})"
            );
            SolveOutcome::TimedOut(SolvedProblem {
                values,
                objective_value,
                solver_seconds,
            })
        }
        _ => {
            warn!("Solver finished with status {termination:?} after {solver_seconds:.2}s");
            SolveOutcome::NotOptimal(UnsolvedModel {
                problem,
                objective,
                termination,
                solver_seconds,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_solve_small_problem() {
        // Minimise x + 2y subject to x + y >= 3, y >= 1
        let mut problem = Problem::default();
        let x = problem.add_column(0.0..);
        let y = problem.add_column(1.0..);
        problem.add_row(3.0.., [(x, 1.0), (y, 1.0)]);
        let objective: LinearExpr = [(x, 1.0), (y, 2.0)].into_iter().collect();

        let SolveOutcome::Optimal(solved) =
            solve(problem, objective, &SolverOptions::default()).unwrap()
        else {
            panic!("Expected optimal solution");
        };
        assert_approx_eq!(f64, x.value(&solved.values), 2.0, epsilon = 1e-6);
        assert_approx_eq!(f64, y.value(&solved.values), 1.0, epsilon = 1e-6);
        assert_approx_eq!(f64, solved.objective_value, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible_is_not_an_error() {
        let mut problem = Problem::default();
        let x = problem.add_column(0.0..=1.0);
        problem.add_row(2.0.., [(x, 1.0)]);
        let objective = LinearExpr::from(x);

        let outcome = solve(problem, objective, &SolverOptions::default()).unwrap();
        assert_eq!(outcome.status(), SolveStatus::NotOptimal);
        assert!(outcome.solution().is_none());
        assert!(matches!(outcome, SolveOutcome::NotOptimal(_)));
    }

    /// x + y >= 3 with binary y, minimising x + 2y
    fn small_mip() -> (Problem, LinearExpr) {
        let mut problem = Problem::default();
        let x = problem.add_column(0.0..);
        let y = problem.add_binary_column();
        problem.add_row(3.0.., [(x, 1.0), (y, 1.0)]);
        let objective = [(x, 1.0), (y, 2.0)].into_iter().collect();
        (problem, objective)
    }

    #[test]
    fn test_time_limit_with_incumbent_keeps_solution() {
        let (problem, objective) = small_mip();

        // Feasible but not optimal
        let outcome = classify(
            problem,
            objective,
            HighsModelStatus::ReachedTimeLimit,
            vec![2.0, 1.0],
            1.5,
        );
        assert_eq!(outcome.status(), SolveStatus::TimedOut);
        let solved = outcome.solution().unwrap();
        assert_eq!(solved.values, [2.0, 1.0]);
        assert_approx_eq!(f64, solved.objective_value, 4.0);
        assert_approx_eq!(f64, outcome.solver_seconds(), 1.5);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![0.0, 0.0])]
    #[case(vec![2.5, 0.5])]
    fn test_time_limit_without_incumbent_is_not_optimal(#[case] values: Vec<f64>) {
        let (problem, objective) = small_mip();

        let outcome = classify(
            problem,
            objective,
            HighsModelStatus::ReachedTimeLimit,
            values,
            1.5,
        );
        assert_eq!(outcome.status(), SolveStatus::NotOptimal);
        let SolveOutcome::NotOptimal(unsolved) = outcome else {
            panic!("Expected no solution");
        };
        assert_eq!(unsolved.termination, HighsModelStatus::ReachedTimeLimit);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(SolveStatus::Optimal.to_string(), "optimal");
        assert_eq!(SolveStatus::TimedOut.to_string(), "timed-out");
        assert_eq!(SolveStatus::NotOptimal.to_string(), "not optimal");
    }
}
