//! Linear algebra utilities.
//!
//! Dense LU with partial pivoting, real least squares by Householder QR and
//! polynomial roots (Aberth-Ehrlich). The systems solved in
//! modal analysis are small (polynomial orders up to a few hundred), so
//! nothing here is blocked or parallel.

use ndarray::{s, Array1, Array2, ArrayView2};
use num_complex::Complex64;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    #[error("Matrix is singular (pivot {pivot:e} in column {column})")]
    Singular { column: usize, pivot: f64 },

    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    #[error("Root finding did not converge after {0} iterations")]
    NoConvergence(usize),
}

/// LU factorisation `P A = L U` of a square matrix
#[derive(Debug, Clone)]
pub struct Lu {
    lu: Array2<f64>,
    perm: Vec<usize>,
}

impl Lu {
    pub fn factor(a: ArrayView2<f64>) -> Result<Self, LinalgError> {
        let (n, m) = a.dim();
        if n != m {
            return Err(LinalgError::Dimension(format!("LU needs a square matrix, got {}x{}", n, m)));
        }
        let mut lu = a.to_owned();
        let mut perm: Vec<usize> = (0..n).collect();
        let scale = lu.iter().fold(0.0f64, |acc, v| acc.max(v.abs())).max(f64::MIN_POSITIVE);

        for k in 0..n {
            let (pivot_row, pivot) = (k..n)
                .map(|i| (i, lu[[i, k]]))
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
                .unwrap_or((k, 0.0));
            if !pivot.is_finite() || pivot.abs() <= scale * 1e-300 {
                return Err(LinalgError::Singular { column: k, pivot });
            }
            if pivot_row != k {
                for j in 0..n {
                    lu.swap([k, j], [pivot_row, j]);
                }
                perm.swap(k, pivot_row);
            }
            for i in k + 1..n {
                let factor = lu[[i, k]] / lu[[k, k]];
                lu[[i, k]] = factor;
                for j in k + 1..n {
                    lu[[i, j]] -= factor * lu[[k, j]];
                }
            }
        }
        Ok(Self { lu, perm })
    }

    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
        let n = self.perm.len();
        if b.len() != n {
            return Err(LinalgError::Dimension(format!(
                "right-hand side has {} rows, expected {}",
                b.len(),
                n
            )));
        }
        let mut x: Array1<f64> = self.perm.iter().map(|&p| b[p]).collect();
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[[i, j]] * x[j];
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                x[i] -= self.lu[[i, j]] * x[j];
            }
            x[i] /= self.lu[[i, i]];
        }
        Ok(x)
    }

    /// Solve for every column of `b`
    pub fn solve_matrix(&self, b: &Array2<f64>) -> Result<Array2<f64>, LinalgError> {
        let mut out = Array2::zeros(b.dim());
        for (j, col) in b.columns().into_iter().enumerate() {
            let x = self.solve(&col.to_owned())?;
            out.column_mut(j).assign(&x);
        }
        Ok(out)
    }
}

/// LU of a complex square matrix through its real embedding `[[Re, -Im], [Im, Re]]`
#[derive(Debug, Clone)]
pub struct ComplexLu {
    lu: Lu,
    n: usize,
}

impl ComplexLu {
    pub fn factor(a: &Array2<Complex64>) -> Result<Self, LinalgError> {
        let (n, m) = a.dim();
        if n != m {
            return Err(LinalgError::Dimension(format!("LU needs a square matrix, got {}x{}", n, m)));
        }
        let mut real = Array2::zeros((2 * n, 2 * n));
        for ((i, j), z) in a.indexed_iter() {
            real[[i, j]] = z.re;
            real[[i, j + n]] = -z.im;
            real[[i + n, j]] = z.im;
            real[[i + n, j + n]] = z.re;
        }
        Ok(Self {
            lu: Lu::factor(real.view())?,
            n,
        })
    }

    pub fn solve(&self, b: &[Complex64]) -> Result<Vec<Complex64>, LinalgError> {
        if b.len() != self.n {
            return Err(LinalgError::Dimension(format!(
                "right-hand side has {} rows, expected {}",
                b.len(),
                self.n
            )));
        }
        let rhs: Array1<f64> = b.iter().map(|z| z.re).chain(b.iter().map(|z| z.im)).collect();
        let x = self.lu.solve(&rhs)?;
        Ok((0..self.n).map(|i| Complex64::new(x[i], x[i + self.n])).collect())
    }
}

/// Solve `A x = b` for square `A`
pub fn solve(a: ArrayView2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
    Lu::factor(a)?.solve(b)
}

/// Least-squares solution of the overdetermined system `A x ≈ b`.
///
/// Householder QR on a column-scaled copy of `A`, so mixed-magnitude bases
/// (residues next to residual terms) stay solvable.
pub fn lstsq(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, LinalgError> {
    let (rows, cols) = a.dim();
    if rows != b.len() {
        return Err(LinalgError::Dimension(format!(
            "matrix has {} rows, right-hand side {}",
            rows,
            b.len()
        )));
    }
    if rows < cols {
        return Err(LinalgError::Dimension(format!(
            "underdetermined system {}x{}",
            rows, cols
        )));
    }
    let norms: Vec<f64> = a
        .columns()
        .into_iter()
        .map(|c| {
            let n = c.dot(&c).sqrt();
            if n > 0.0 { n } else { 1.0 }
        })
        .collect();
    let mut r = a.clone();
    for (j, mut col) in r.columns_mut().into_iter().enumerate() {
        col /= norms[j];
    }
    let mut qtb = b.clone();

    for k in 0..cols {
        let alpha = {
            let col = r.slice(s![k.., k]);
            let norm = col.dot(&col).sqrt();
            if r[[k, k]] > 0.0 { -norm } else { norm }
        };
        if alpha == 0.0 {
            return Err(LinalgError::Singular { column: k, pivot: 0.0 });
        }
        let mut v = r.slice(s![k.., k]).to_owned();
        v[0] -= alpha;
        let v_norm2 = v.dot(&v);
        if v_norm2 == 0.0 {
            continue;
        }
        for j in k..cols {
            let proj = 2.0 * v.dot(&r.slice(s![k.., j])) / v_norm2;
            r.slice_mut(s![k.., j]).scaled_add(-proj, &v);
        }
        let proj = 2.0 * v.dot(&qtb.slice(s![k..])) / v_norm2;
        qtb.slice_mut(s![k..]).scaled_add(-proj, &v);
    }

    let scale = r.diag().iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
    let mut y = Array1::zeros(cols);
    for i in (0..cols).rev() {
        let pivot = r[[i, i]];
        if !pivot.is_finite() || pivot.abs() <= scale * 1e-300 {
            return Err(LinalgError::Singular { column: i, pivot });
        }
        let tail: f64 = (i + 1..cols).map(|j| r[[i, j]] * y[j]).sum();
        y[i] = (qtb[i] - tail) / pivot;
    }
    Ok((0..cols).map(|j| y[j] / norms[j]).collect())
}

/// Roots of `c[0] + c[1] x + ... + c[n] x^n`.
pub fn poly_roots(coeffs: &[f64]) -> Result<Vec<Complex64>, LinalgError> {
    const MAX_ITER: usize = 1000;

    let degree = match coeffs.iter().rposition(|c| *c != 0.0) {
        Some(d) => d,
        None => return Err(LinalgError::Dimension("zero polynomial".to_string())),
    };
    if degree == 0 {
        return Ok(Vec::new());
    }
    let lead = coeffs[degree];
    let monic: Vec<Complex64> = coeffs[..=degree]
        .iter()
        .map(|c| Complex64::new(c / lead, 0.0))
        .collect();

    // Start on a circle whose radius is the geometric mean of root magnitudes
    let radius = monic[0].norm().powf(1.0 / degree as f64).max(1e-3);
    let mut roots: Vec<Complex64> = (0..degree)
        .map(|k| {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / degree as f64 + 0.4;
            Complex64::from_polar(radius, angle)
        })
        .collect();

    let mut max_step = f64::INFINITY;
    for _ in 0..MAX_ITER {
        max_step = 0.0;
        for k in 0..degree {
            let z = roots[k];
            let (p, dp) = horner_with_derivative(&monic, z);
            if p.norm() == 0.0 {
                continue;
            }
            let ratio = p / dp;
            let repulsion: Complex64 = roots
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .map(|(_, r)| {
                    let d = z - r;
                    if d.norm() > 0.0 { d.inv() } else { Complex64::new(0.0, 0.0) }
                })
                .sum();
            let step = ratio / (Complex64::new(1.0, 0.0) - ratio * repulsion);
            if step.is_finite() {
                roots[k] -= step;
                max_step = max_step.max(step.norm() / (1.0 + roots[k].norm()));
            }
        }
        if max_step < 1e-14 {
            return Ok(roots);
        }
    }
    // rounding keeps high-degree iterations jittering near the roots
    if max_step < 1e-8 {
        return Ok(roots);
    }
    Err(LinalgError::NoConvergence(MAX_ITER))
}

fn horner_with_derivative(monic: &[Complex64], z: Complex64) -> (Complex64, Complex64) {
    let mut p = Complex64::new(0.0, 0.0);
    let mut dp = Complex64::new(0.0, 0.0);
    for c in monic.iter().rev() {
        dp = dp * z + p;
        p = p * z + c;
    }
    (p, dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_with_pivoting() {
        let a = array![[0.0, 2.0], [3.0, 1.0]];
        let b = array![4.0, 5.0];
        let x = solve(a.view(), &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(
            Lu::factor(a.view()),
            Err(LinalgError::Singular { .. })
        ));
    }

    #[test]
    fn test_complex_solve() {
        let i = Complex64::new(0.0, 1.0);
        let one = Complex64::new(1.0, 0.0);
        let a = array![[one, i], [i * 2.0, one * 3.0]];
        let x = [Complex64::new(1.0, -1.0), Complex64::new(0.5, 2.0)];
        let b = [a[[0, 0]] * x[0] + a[[0, 1]] * x[1], a[[1, 0]] * x[0] + a[[1, 1]] * x[1]];

        let solved = ComplexLu::factor(&a).unwrap().solve(&b).unwrap();
        for (got, want) in solved.iter().zip(x.iter()) {
            assert!((got - want).norm() < 1e-12);
        }
    }

    #[test]
    fn test_lstsq_line_fit() {
        // y = 2 + 3x sampled exactly
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let a = Array2::from_shape_fn((5, 2), |(i, j)| if j == 0 { 1.0 } else { xs[i] });
        let b: Array1<f64> = xs.iter().map(|x| 2.0 + 3.0 * x).collect();
        let coef = lstsq(&a, &b).unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-9);
        assert!((coef[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_poly_roots_quadratic() {
        // x^2 + 2x + 5 = 0 -> -1 ± 2i
        let mut roots = poly_roots(&[5.0, 2.0, 1.0]).unwrap();
        roots.sort_by(|a, b| a.im.total_cmp(&b.im));
        assert!((roots[0] - Complex64::new(-1.0, -2.0)).norm() < 1e-10);
        assert!((roots[1] - Complex64::new(-1.0, 2.0)).norm() < 1e-10);
    }

    #[test]
    fn test_poly_roots_unit_circle() {
        // z^4 - 1
        let roots = poly_roots(&[-1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(roots.len(), 4);
        for r in roots {
            assert!((r.norm() - 1.0).abs() < 1e-10);
            assert!((r.powi(4) - Complex64::new(1.0, 0.0)).norm() < 1e-9);
        }
    }
}
