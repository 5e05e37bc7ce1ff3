//! Dense univariate polynomials over `f64`, just enough to solve the
//! fixed-point equations of cyclic grammar symbols.

use std::ops::{Add, Mul};

const BISECTION_STEPS: usize = 200;

/// Coefficients in ascending order of degree; `coeffs[i]` multiplies `x^i`.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn new(mut coeffs: Vec<f64>) -> Self {
        while coeffs.len() > 1 && coeffs.last() == Some(&0.0) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(0.0);
        }
        Self { coeffs }
    }

    pub fn constant(c: f64) -> Self {
        Self::new(vec![c])
    }

    /// The unknown itself, `x`.
    pub fn x() -> Self {
        Self::new(vec![0.0, 1.0])
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn is_constant(&self) -> bool {
        self.degree() == 0
    }

    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    pub fn derivative(&self) -> Self {
        let d = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| c * i as f64)
            .collect();
        Self::new(d)
    }

    /// Real roots in `[lo, hi]`, ascending, without duplicates.
    ///
    /// The interval is split at the roots of the derivative so that `self`
    /// is monotone on every piece; sign changes are bisected, and critical
    /// points where `self` vanishes are reported as (even-multiplicity) roots.
    pub fn real_roots(&self, lo: f64, hi: f64) -> Vec<f64> {
        let tol = 1e-12 * self.coeffs.iter().fold(1.0_f64, |m, c| m.max(c.abs()));
        if self.is_constant() {
            return Vec::new();
        }
        if self.degree() == 1 {
            let r = -self.coeffs[0] / self.coeffs[1];
            return if (lo..=hi).contains(&r) { vec![r] } else { Vec::new() };
        }

        let mut points = vec![lo];
        points.extend(self.derivative().real_roots(lo, hi));
        points.push(hi);

        let mut roots: Vec<f64> = Vec::new();
        let push = |r: f64, roots: &mut Vec<f64>| {
            if roots.last().map_or(true, |last| (r - last).abs() > 1e-9) {
                roots.push(r);
            }
        };
        for w in points.windows(2) {
            let (a, b) = (w[0], w[1]);
            let (fa, fb) = (self.eval(a), self.eval(b));
            if fa.abs() <= tol {
                push(a, &mut roots);
            } else if fb.abs() > tol && fa.signum() != fb.signum() {
                push(self.bisect(a, b, fa), &mut roots);
            }
        }
        if self.eval(hi).abs() <= tol {
            push(hi, &mut roots);
        }
        roots
    }

    fn bisect(&self, mut a: f64, mut b: f64, mut fa: f64) -> f64 {
        for _ in 0..BISECTION_STEPS {
            let m = 0.5 * (a + b);
            if m <= a || m >= b {
                break;
            }
            let fm = self.eval(m);
            if fm == 0.0 {
                return m;
            }
            if fm.signum() == fa.signum() {
                a = m;
                fa = fm;
            } else {
                b = m;
            }
        }
        0.5 * (a + b)
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let n = self.coeffs.len().max(rhs.coeffs.len());
        let c = (0..n)
            .map(|i| self.coeffs.get(i).unwrap_or(&0.0) + rhs.coeffs.get(i).unwrap_or(&0.0))
            .collect();
        Polynomial::new(c)
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut c = vec![0.0; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in rhs.coeffs.iter().enumerate() {
                c[i + j] += a * b;
            }
        }
        Polynomial::new(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn arithmetic_and_eval() {
        let p = Polynomial::new(vec![1.0, 2.0]); // 1 + 2x
        let q = &p * &p; // 1 + 4x + 4x^2
        assert_eq!(q.coeffs(), &[1.0, 4.0, 4.0]);
        assert_eq!((&q + &Polynomial::constant(-1.0)).coeffs(), &[0.0, 4.0, 4.0]);
        assert!(close(q.eval(0.5), 4.0));
        assert_eq!(q.derivative().coeffs(), &[4.0, 8.0]);
        assert_eq!(Polynomial::new(vec![3.0, 0.0, 0.0]).degree(), 0);
    }

    #[test]
    fn simple_roots_are_bisected() {
        // (x - 0.25)(x - 0.75) = x^2 - x + 0.1875
        let p = Polynomial::new(vec![0.1875, -1.0, 1.0]);
        let roots = p.real_roots(0.0, 1.0);
        assert_eq!(roots.len(), 2);
        assert!(close(roots[0], 0.25));
        assert!(close(roots[1], 0.75));
    }

    #[test]
    fn double_root_at_the_boundary() {
        // 0.5 x^2 - x + 0.5 = 0.5 (x - 1)^2
        let p = Polynomial::new(vec![0.5, -1.0, 0.5]);
        assert_eq!(p.real_roots(0.0, 1.0), vec![1.0]);
    }

    #[test]
    fn roots_outside_the_interval_are_ignored() {
        let p = Polynomial::new(vec![-4.0, 0.0, 1.0]); // roots at +-2
        assert!(p.real_roots(0.0, 1.0).is_empty());
        let cubic = &(&Polynomial::x() * &Polynomial::x()) * &Polynomial::new(vec![-0.5, 1.0]);
        assert_eq!(cubic.real_roots(0.1, 1.0).len(), 1);
    }
}
