//! Natural cubic smoothing spline (Reinsch formulation).
//!
//! Minimizes `sum (y_i - f(x_i))^2 + lambda * integral f''(x)^2 dx` over
//! natural cubics with knots at the data points. Following Green &
//! Silverman, the interior second derivatives solve
//! `(R + lambda * Q'Q) g = Q'y` and the fitted knot values are
//! `f = y - lambda * Q g`.
//!
//! The public smoothing factor is a residual budget (the sum of squared
//! residuals the fit is allowed to spend, same convention as the curve
//! data it smooths): lambda is found by bisection so the residual meets the
//! budget, falling back to the smoothest fit when even that stays under it.
//! All arithmetic is f64; x is normalized to [0, 1] for conditioning.

use log::debug;

const LAMBDA_MIN: f64 = 1e-16;
const LAMBDA_MAX: f64 = 1e6;
const BISECTION_STEPS: usize = 64;

#[derive(Debug, Clone)]
pub struct SmoothingSpline {
    /// Normalized knot positions, strictly increasing in [0, 1].
    knots: Vec<f64>,
    /// Fitted values at the knots.
    values: Vec<f64>,
    /// Second derivatives at the knots (zero at both ends).
    second: Vec<f64>,
    x0: f64,
    scale: f64,
}

struct Fitted {
    values: Vec<f64>,
    second: Vec<f64>,
    residual: f64,
}

impl SmoothingSpline {
    /// Fits the spline to strictly increasing `xs` and matching `ys`.
    ///
    /// Callers must pass at least 4 distinct x values; fewer points cannot
    /// support a cubic fit and are rejected upstream as insufficient data.
    pub fn fit(xs: &[f64], ys: &[f64], budget: f64) -> Self {
        let n = xs.len();
        assert!(n >= 4, "smoothing spline needs at least 4 points, got {n}");
        assert_eq!(n, ys.len());

        let x0 = xs[0];
        let scale = xs[n - 1] - xs[0];
        let knots: Vec<f64> = xs.iter().map(|&x| (x - x0) / scale).collect();

        let budget = budget.max(0.0);
        let smoothest = solve_penalized(&knots, ys, LAMBDA_MAX);
        let fitted = if smoothest.residual <= budget {
            debug!("spline fit saturated at lambda {LAMBDA_MAX:e}");
            smoothest
        } else {
            let tight = solve_penalized(&knots, ys, LAMBDA_MIN);
            if tight.residual >= budget {
                tight
            } else {
                // residual grows monotonically with lambda: bisect in log
                // space for the largest lambda still inside the budget
                let mut lo = LAMBDA_MIN;
                let mut hi = LAMBDA_MAX;
                for _ in 0..BISECTION_STEPS {
                    let mid = (lo * hi).sqrt();
                    if solve_penalized(&knots, ys, mid).residual > budget {
                        hi = mid;
                    } else {
                        lo = mid;
                    }
                }
                let fitted = solve_penalized(&knots, ys, lo);
                debug!(
                    "spline fit at lambda {lo:e}, residual {:.4} of budget {budget:.4}",
                    fitted.residual
                );
                fitted
            }
        };

        Self {
            knots,
            values: fitted.values,
            second: fitted.second,
            x0,
            scale,
        }
    }

    /// Evaluates the fitted curve at `x` (in original units).
    pub fn evaluate(&self, x: f64) -> f64 {
        let t = (x - self.x0) / self.scale;
        let n = self.knots.len();
        let i = self.knots.partition_point(|&k| k <= t).clamp(1, n - 1) - 1;

        let h = self.knots[i + 1] - self.knots[i];
        let a = (self.knots[i + 1] - t) / h;
        let b = (t - self.knots[i]) / h;

        a * self.values[i]
            + b * self.values[i + 1]
            + ((a * a * a - a) * self.second[i] + (b * b * b - b) * self.second[i + 1]) * h * h
                / 6.0
    }
}

/// One penalized fit at a fixed lambda.
fn solve_penalized(t: &[f64], y: &[f64], lambda: f64) -> Fitted {
    let n = t.len();
    let m = n - 2;
    let h: Vec<f64> = t.windows(2).map(|w| w[1] - w[0]).collect();

    // Q is n x m; column j is supported on rows j..=j+2.
    let q = |i: usize, j: usize| -> f64 {
        if i == j {
            1.0 / h[j]
        } else if i == j + 1 {
            -(1.0 / h[j] + 1.0 / h[j + 1])
        } else if i == j + 2 {
            1.0 / h[j + 1]
        } else {
            0.0
        }
    };

    // A = R + lambda * Q'Q, b = Q'y
    let mut a = vec![vec![0.0; m]; m];
    let mut b = vec![0.0; m];
    for j in 0..m {
        for k in 0..m {
            let mut qtq = 0.0;
            if j.abs_diff(k) <= 2 {
                for i in j.min(k)..=(j.max(k) + 2) {
                    qtq += q(i, j) * q(i, k);
                }
            }
            let r = if j == k {
                (h[j] + h[j + 1]) / 3.0
            } else if j.abs_diff(k) == 1 {
                h[j.max(k)] / 6.0
            } else {
                0.0
            };
            a[j][k] = r + lambda * qtq;
        }
        b[j] = y[j] / h[j] - y[j + 1] * (1.0 / h[j] + 1.0 / h[j + 1]) + y[j + 2] / h[j + 1];
    }

    let gamma = solve_dense(a, b);

    let mut second = vec![0.0; n];
    second[1..=m].copy_from_slice(&gamma);

    let mut values = Vec::with_capacity(n);
    let mut residual = 0.0;
    for i in 0..n {
        let lo = i.saturating_sub(2);
        let hi = i.min(m.saturating_sub(1));
        let mut correction = 0.0;
        for (j, &g) in gamma.iter().enumerate().take(hi + 1).skip(lo) {
            correction += q(i, j) * g;
        }
        let fitted = y[i] - lambda * correction;
        residual += (y[i] - fitted) * (y[i] - fitted);
        values.push(fitted);
    }

    Fitted {
        values,
        second,
        residual,
    }
}

/// Gaussian elimination with partial pivoting. The systems here are tiny
/// (one row per interior knot) and symmetric positive definite.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in row + 1..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_points_are_reproduced_exactly() {
        // a straight line has zero curvature penalty, so any lambda keeps it
        let xs: Vec<f64> = (0..10).map(|i| 100.0 + 50.0 * i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 0.01 * x - 2.0).collect();
        let spline = SmoothingSpline::fit(&xs, &ys, 5.0);

        for i in 0..40 {
            let x = 100.0 + 450.0 * i as f64 / 39.0;
            let expected = 0.01 * x - 2.0;
            assert!(
                (spline.evaluate(x) - expected).abs() < 1e-8,
                "at {x}: {} vs {expected}",
                spline.evaluate(x)
            );
        }
    }

    #[test]
    fn zero_budget_interpolates() {
        let xs = [0.0, 1.0, 2.5, 4.0, 5.0, 7.0];
        let ys = [1.0, -0.5, 2.0, 0.0, 1.5, 1.0];
        let spline = SmoothingSpline::fit(&xs, &ys, 0.0);

        for (&x, &y) in xs.iter().zip(&ys) {
            assert!((spline.evaluate(x) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn residual_stays_inside_the_budget() {
        let xs: Vec<f64> = (0..12).map(|i| i as f64 * 10.0).collect();
        let ys: Vec<f64> = (0..12)
            .map(|i| (i as f64 * 0.9).sin() * 3.0 + i as f64 * 0.1)
            .collect();
        let budget = 5.0;
        let spline = SmoothingSpline::fit(&xs, &ys, budget);

        let residual: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(&x, &y)| (y - spline.evaluate(x)).powi(2))
            .sum();
        assert!(residual <= budget + 1e-6, "residual {residual}");
    }

    #[test]
    fn larger_budget_smooths_harder() {
        let xs: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let ys: Vec<f64> = (0..12).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();

        let tight = SmoothingSpline::fit(&xs, &ys, 0.01);
        let loose = SmoothingSpline::fit(&xs, &ys, 10.0);

        let wiggle = |s: &SmoothingSpline| -> f64 {
            (0..12).map(|i| s.evaluate(i as f64).abs()).sum()
        };
        assert!(wiggle(&loose) < wiggle(&tight));
    }
}
