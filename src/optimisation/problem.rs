//! A solver-independent representation of a mixed-integer linear problem.
//!
//! Constraint-building code adds columns and rows to a [`Problem`] and accumulates costs in
//! [`LinearExpr`]s. Nothing here knows about HiGHS: the problem is only translated for the solver
//! in [`super::solve`].
use std::ops::{Add, AddAssign, Bound, Mul, Neg, RangeBounds, Sub, SubAssign};

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    /// The index of this variable's column in the problem
    pub fn index(self) -> usize {
        self.0
    }

    /// The value of this variable in a solution
    pub fn value(self, solution: &[f64]) -> f64 {
        solution[self.0]
    }
}

/// The bounds and integrality of a column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Lower bound (may be `-inf`)
    pub lower: f64,
    /// Upper bound (may be `inf`)
    pub upper: f64,
    /// Whether the column must take an integer value
    pub is_integer: bool,
}

/// A constraint of the form `lower <= a1*x1 + a2*x2 + ... <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Lower bound (may be `-inf`)
    pub lower: f64,
    /// Upper bound (may be `inf`)
    pub upper: f64,
    /// Coefficients for each variable. Each variable appears at most once.
    pub terms: Vec<(Variable, f64)>,
}

/// Convert a range into a pair of finite or infinite bounds
fn to_bounds<B: RangeBounds<f64>>(bounds: &B) -> (f64, f64) {
    let lower = match bounds.start_bound() {
        Bound::Included(&value) | Bound::Excluded(&value) => value,
        Bound::Unbounded => f64::NEG_INFINITY,
    };
    let upper = match bounds.end_bound() {
        Bound::Included(&value) | Bound::Excluded(&value) => value,
        Bound::Unbounded => f64::INFINITY,
    };

    (lower, upper)
}

/// Sum the coefficients of repeated variables and drop zero coefficients.
///
/// The solver rejects rows which reference the same column twice.
fn merge_terms(mut terms: Vec<(Variable, f64)>) -> Vec<(Variable, f64)> {
    terms.sort_unstable_by_key(|(var, _)| *var);

    let mut merged: Vec<(Variable, f64)> = Vec::with_capacity(terms.len());
    for (var, coeff) in terms {
        match merged.last_mut() {
            Some((last, total)) if *last == var => *total += coeff,
            _ => merged.push((var, coeff)),
        }
    }
    merged.retain(|(_, coeff)| *coeff != 0.0);

    merged
}

/// The columns and rows of an optimisation problem
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Problem {
    /// Add a continuous column with the given bounds
    pub fn add_column<B: RangeBounds<f64>>(&mut self, bounds: B) -> Variable {
        let (lower, upper) = to_bounds(&bounds);
        self.columns.push(Column {
            lower,
            upper,
            is_integer: false,
        });

        Variable(self.columns.len() - 1)
    }

    /// Add a binary (0 or 1) column
    pub fn add_binary_column(&mut self) -> Variable {
        self.columns.push(Column {
            lower: 0.0,
            upper: 1.0,
            is_integer: true,
        });

        Variable(self.columns.len() - 1)
    }

    /// Add `n` continuous columns with the same bounds
    pub fn add_columns<B: RangeBounds<f64> + Clone>(&mut self, n: usize, bounds: B) -> Vec<Variable> {
        (0..n).map(|_| self.add_column(bounds.clone())).collect()
    }

    /// Add `n` binary columns
    pub fn add_binary_columns(&mut self, n: usize) -> Vec<Variable> {
        (0..n).map(|_| self.add_binary_column()).collect()
    }

    /// Tighten the bounds of an existing column to a single value
    pub fn fix(&mut self, var: Variable, value: f64) {
        let column = &mut self.columns[var.0];
        column.lower = value;
        column.upper = value;
    }

    /// Replace the upper bound of an existing column
    pub fn set_upper_bound(&mut self, var: Variable, upper: f64) {
        self.columns[var.0].upper = upper;
    }

    /// Add a row constraining a weighted sum of variables
    pub fn add_row<B, I>(&mut self, bounds: B, terms: I)
    where
        B: RangeBounds<f64>,
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let (lower, upper) = to_bounds(&bounds);
        self.rows.push(Row {
            lower,
            upper,
            terms: merge_terms(terms.into_iter().collect()),
        });
    }

    /// Constrain a linear expression to lie within the given bounds.
    ///
    /// The expression's constant is moved to the bounds.
    pub fn add_constraint<B: RangeBounds<f64>>(&mut self, expr: &LinearExpr, bounds: B) {
        let (lower, upper) = to_bounds(&bounds);
        self.add_row(
            (lower - expr.constant)..=(upper - expr.constant),
            expr.terms.iter().copied(),
        );
    }

    /// The number of columns
    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// The number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The number of integer columns
    pub fn num_integer_cols(&self) -> usize {
        self.columns.iter().filter(|col| col.is_integer).count()
    }

    /// The problem's columns, in the order they were added
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The problem's rows, in the order they were added
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Whether `solution` satisfies every bound, row and integrality requirement.
    ///
    /// Each bound may be missed by `tolerance`, scaled up for bounds larger than one.
    pub fn is_feasible(&self, solution: &[f64], tolerance: f64) -> bool {
        let within = |value: f64, lower: f64, upper: f64| {
            value >= lower - tolerance * lower.abs().max(1.0)
                && value <= upper + tolerance * upper.abs().max(1.0)
        };

        solution.len() == self.columns.len()
            && self.columns.iter().zip(solution).all(|(column, &value)| {
                value.is_finite()
                    && within(value, column.lower, column.upper)
                    && (!column.is_integer || (value - value.round()).abs() <= tolerance)
            })
            && self.rows.iter().all(|row| {
                let activity = row
                    .terms
                    .iter()
                    .map(|&(var, coeff)| coeff * solution[var.0])
                    .sum::<f64>();
                within(activity, row.lower, row.upper)
            })
    }
}

/// A linear expression: a weighted sum of variables plus a constant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(Variable, f64)>,
    constant: f64,
}

impl LinearExpr {
    /// An expression containing only a constant
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Add `coeff * var` to the expression
    pub fn add_term(&mut self, var: Variable, coeff: f64) {
        self.terms.push((var, coeff));
    }

    /// Add a constant to the expression
    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// Add `scale * other` to the expression
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(var, coeff)| (var, coeff * scale)));
        self.constant += other.constant * scale;
    }

    /// The variable terms of the expression (a variable may appear more than once)
    pub fn terms(&self) -> &[(Variable, f64)] {
        &self.terms
    }

    /// The constant part of the expression
    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    /// Evaluate the expression for a solution
    pub fn value(&self, solution: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|&(var, coeff)| coeff * solution[var.0])
                .sum::<f64>()
    }
}

impl From<Variable> for LinearExpr {
    fn from(var: Variable) -> Self {
        Self {
            terms: vec![(var, 1.0)],
            constant: 0.0,
        }
    }
}

impl FromIterator<(Variable, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (Variable, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

impl AddAssign<&LinearExpr> for LinearExpr {
    fn add_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, 1.0);
    }
}

impl SubAssign<&LinearExpr> for LinearExpr {
    fn sub_assign(&mut self, rhs: &LinearExpr) {
        self.add_scaled(rhs, -1.0);
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += &rhs;
        self
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: LinearExpr) -> LinearExpr {
        self -= &rhs;
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, rhs: f64) -> LinearExpr {
        for (_, coeff) in &mut self.terms {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Mul<f64> for &LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.clone() * rhs
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

impl std::iter::Sum for LinearExpr {
    fn sum<I: Iterator<Item = LinearExpr>>(iter: I) -> Self {
        iter.fold(LinearExpr::default(), |acc, expr| acc + expr)
    }
}
