// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Weighted polynomial least-squares fitting.
//!
//! [`LeastSquaresSolver`] fits a polynomial of a requested degree to weighted
//! samples `(x, y, w)`. The design matrix is orthogonalized with Gram-Schmidt to
//! obtain a QR decomposition, and the coefficients are recovered by back
//! substitution. Degenerate inputs (too few samples, or samples that do not
//! span the polynomial basis) produce no fit rather than an error.
//!
//! ```
//! use understory_velocity::LeastSquaresSolver;
//!
//! let x = [0.0, 1.0, 2.0, 3.0];
//! let y = [1.0, 3.0, 5.0, 7.0];
//! let w = [1.0; 4];
//!
//! let fit = LeastSquaresSolver::new(&x, &y, &w).solve(1).unwrap();
//! assert!((fit.coefficients[0] - 1.0).abs() < 1e-9);
//! assert!((fit.coefficients[1] - 2.0).abs() < 1e-9);
//! assert!(fit.confidence > 0.999);
//! ```

use alloc::vec;
use alloc::vec::Vec;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// Norms and variances below this value are treated as zero.
pub const PRECISION_ERROR_TOLERANCE: f64 = 1e-10;

/// A polynomial fitted to a set of samples.
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialFit {
    /// Coefficients from the constant term upward; `degree + 1` entries.
    pub coefficients: Vec<f64>,
    /// Coefficient of determination (R²) of the fit, in `[0, 1]` for
    /// well-behaved data.
    pub confidence: f64,
}

impl PolynomialFit {
    /// Creates a zeroed fit of the given degree.
    #[must_use]
    pub fn new(degree: usize) -> Self {
        Self {
            coefficients: vec![0.0; degree + 1],
            confidence: 0.0,
        }
    }

    /// The degree of the polynomial.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluates the polynomial at `x`.
    #[must_use]
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, coefficient| acc * x + coefficient)
    }
}

/// Dense row-major matrix used for the decomposition.
struct Matrix {
    columns: usize,
    elements: Vec<f64>,
}

impl Matrix {
    fn new(rows: usize, columns: usize) -> Self {
        Self {
            columns,
            elements: vec![0.0; rows * columns],
        }
    }

    #[inline]
    fn get(&self, row: usize, column: usize) -> f64 {
        self.elements[row * self.columns + column]
    }

    #[inline]
    fn set(&mut self, row: usize, column: usize, value: f64) {
        self.elements[row * self.columns + column] = value;
    }

    fn row(&self, row: usize) -> &[f64] {
        let start = row * self.columns;
        &self.elements[start..start + self.columns]
    }

    fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.columns;
        &mut self.elements[start..start + self.columns]
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

/// Solves weighted polynomial least-squares problems over borrowed samples.
///
/// `x`, `y` and `w` must have the same length. Weights multiply both the
/// design matrix rows and the observations, so a weight of `0.0` removes a
/// sample from the fit.
#[derive(Clone, Copy, Debug)]
pub struct LeastSquaresSolver<'a> {
    x: &'a [f64],
    y: &'a [f64],
    w: &'a [f64],
}

impl<'a> LeastSquaresSolver<'a> {
    /// Creates a solver over the given samples.
    #[must_use]
    pub fn new(x: &'a [f64], y: &'a [f64], w: &'a [f64]) -> Self {
        debug_assert!(
            x.len() == y.len() && y.len() == w.len(),
            "x, y and w must have the same number of samples"
        );
        Self { x, y, w }
    }

    /// Number of samples the solver works over.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len().min(self.y.len()).min(self.w.len())
    }

    /// Returns `true` if there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fits a polynomial of the given degree.
    ///
    /// Returns `None` when `degree` exceeds the number of samples, or when the
    /// samples are linearly dependent in the polynomial basis (for example
    /// fewer distinct `x` values than `degree + 1`).
    #[must_use]
    pub fn solve(&self, degree: usize) -> Option<PolynomialFit> {
        let m = self.len();
        if degree > m {
            return None;
        }
        let n = degree + 1;
        let mut result = PolynomialFit::new(degree);

        // Transposed design matrix: row `i` holds `w * x^i`.
        let mut a = Matrix::new(n, m);
        for h in 0..m {
            a.set(0, h, self.w[h]);
            for i in 1..n {
                a.set(i, h, a.get(i - 1, h) * self.x[h]);
            }
        }

        // Gram-Schmidt: rows of `q` are orthonormal, `r` is upper triangular.
        let mut q = Matrix::new(n, m);
        let mut r = Matrix::new(n, n);
        for j in 0..n {
            q.row_mut(j).copy_from_slice(a.row(j));
            for i in 0..j {
                let projection = dot(q.row(j), q.row(i));
                for h in 0..m {
                    let value = q.get(j, h) - projection * q.get(i, h);
                    q.set(j, h, value);
                }
            }

            let norm = dot(q.row(j), q.row(j)).sqrt();
            if norm < PRECISION_ERROR_TOLERANCE {
                return None;
            }
            let inverse_norm = 1.0 / norm;
            for value in q.row_mut(j) {
                *value *= inverse_norm;
            }
            for i in 0..n {
                let value = if i < j { 0.0 } else { dot(q.row(j), a.row(i)) };
                r.set(j, i, value);
            }
        }

        // Back substitution of R·B = Qᵗ·W·Y, last coefficient first.
        let wy: Vec<f64> = (0..m).map(|h| self.y[h] * self.w[h]).collect();
        for i in (0..n).rev() {
            let mut coefficient = dot(q.row(i), &wy);
            for j in (i + 1..n).rev() {
                coefficient -= r.get(i, j) * result.coefficients[j];
            }
            result.coefficients[i] = coefficient / r.get(i, i);
        }

        let y_mean = self.y[..m].iter().sum::<f64>() / m as f64;
        let mut sum_squared_error = 0.0;
        let mut sum_squared_total = 0.0;
        for h in 0..m {
            let weight_squared = self.w[h] * self.w[h];
            let error = self.y[h] - result.evaluate(self.x[h]);
            sum_squared_error += weight_squared * error * error;
            let variance = self.y[h] - y_mean;
            sum_squared_total += weight_squared * variance * variance;
        }
        result.confidence = if sum_squared_total <= PRECISION_ERROR_TOLERANCE {
            1.0
        } else {
            1.0 - sum_squared_error / sum_squared_total
        };

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn fits_exact_quadratic() {
        let x = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let y: Vec<f64> = x.iter().map(|x| 3.0 - 2.0 * x + 0.5 * x * x).collect();
        let w = [1.0; 5];

        let fit = LeastSquaresSolver::new(&x, &y, &w).solve(2).unwrap();
        assert_eq!(fit.degree(), 2);
        assert!(approx(fit.coefficients[0], 3.0));
        assert!(approx(fit.coefficients[1], -2.0));
        assert!(approx(fit.coefficients[2], 0.5));
        assert!(approx(fit.confidence, 1.0));
    }

    #[test]
    fn degree_above_sample_count_has_no_fit() {
        let x = [0.0, 1.0];
        let y = [0.0, 1.0];
        let w = [1.0, 1.0];
        assert!(LeastSquaresSolver::new(&x, &y, &w).solve(3).is_none());
    }

    #[test]
    fn quadratic_over_two_samples_has_no_fit() {
        let x = [0.0, 1.0];
        let y = [0.0, 1.0];
        let w = [1.0, 1.0];
        assert!(LeastSquaresSolver::new(&x, &y, &w).solve(2).is_none());
    }

    #[test]
    fn repeated_x_is_degenerate() {
        let x = [5.0, 5.0, 5.0];
        let y = [1.0, 2.0, 3.0];
        let w = [1.0; 3];
        assert!(LeastSquaresSolver::new(&x, &y, &w).solve(1).is_none());
    }

    #[test]
    fn empty_input_has_no_fit() {
        let solver = LeastSquaresSolver::new(&[], &[], &[]);
        assert!(solver.is_empty());
        assert!(solver.solve(0).is_none());
    }

    #[test]
    fn constant_observations_report_full_confidence() {
        let x = [0.0, 1.0, 2.0];
        let y = [4.0, 4.0, 4.0];
        let w = [1.0; 3];
        let fit = LeastSquaresSolver::new(&x, &y, &w).solve(1).unwrap();
        assert!(approx(fit.coefficients[0], 4.0));
        assert!(approx(fit.coefficients[1], 0.0));
        assert_eq!(fit.confidence, 1.0);
    }

    #[test]
    fn noisy_data_lowers_confidence() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 3.0, 1.0, 4.0, 1.0, 5.0];
        let w = [1.0; 6];
        let fit = LeastSquaresSolver::new(&x, &y, &w).solve(1).unwrap();
        assert!(fit.confidence > 0.0);
        assert!(fit.confidence < 0.9);
    }

    #[test]
    fn zero_weight_ignores_outlier() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 1.0, 100.0, 3.0];
        let w = [1.0, 1.0, 0.0, 1.0];
        let fit = LeastSquaresSolver::new(&x, &y, &w).solve(1).unwrap();
        assert!(approx(fit.coefficients[1], 1.0));
        assert!(approx(fit.coefficients[0], 0.0));
    }

    #[test]
    fn evaluate_uses_horner_order() {
        let fit = PolynomialFit {
            coefficients: vec![1.0, 2.0, 3.0],
            confidence: 1.0,
        };
        assert!(approx(fit.evaluate(2.0), 1.0 + 4.0 + 12.0));
    }
}
