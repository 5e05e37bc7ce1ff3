//! Production probabilities consistent with a universal prior.
//!
//! Every terminal gets a `bits`-bit prefix code, so its mass is `2^-bits`. A
//! nonterminal's mass is the sum over its productions of either the mass of
//! the redirect target (childless productions) or `2^-bits` times the product
//! of the children's masses. Symbols that reach themselves through the
//! production graph get their mass from the smallest positive fixed point of
//! the polynomial collected along the cycle.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{Error, Result};
use crate::grammar::{Cfg, Pcfg, Production, Symbol};
use crate::poly::Polynomial;

/// Fixed points at or below this are treated as zero.
const ROOT_EPS: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
    /// Gray node re-entered by a back edge: heads a cycle.
    Root,
}

/// A mass that may still be a polynomial in the unknown mass of a cycle root.
#[derive(Clone, Debug)]
struct Term<S> {
    root: Option<S>,
    poly: Polynomial,
}

impl<S: Symbol> Term<S> {
    fn known(m: f64) -> Self {
        Self {
            root: None,
            poly: Polynomial::constant(m),
        }
    }

    fn unknown(root: S) -> Self {
        Self {
            root: Some(root),
            poly: Polynomial::x(),
        }
    }

    fn value(&self) -> Option<f64> {
        match self.root {
            None => Some(self.poly.eval(0.0)),
            Some(_) => None,
        }
    }

    fn shared_root(&self, other: &Self, at: S) -> Result<Option<S>> {
        match (self.root, other.root) {
            (Some(a), Some(b)) if a != b => Err(Error::NestedCycle {
                symbol: at.name(),
                first: a.name(),
                second: b.name(),
            }),
            (a, b) => Ok(a.or(b)),
        }
    }

    fn add(&self, other: &Self, at: S) -> Result<Self> {
        Ok(Self {
            root: self.shared_root(other, at)?,
            poly: &self.poly + &other.poly,
        })
    }

    fn mul(&self, other: &Self, at: S) -> Result<Self> {
        Ok(Self {
            root: self.shared_root(other, at)?,
            poly: &self.poly * &other.poly,
        })
    }
}

/// Solomonoff masses of every symbol of a grammar.
#[derive(Clone, Debug)]
pub struct Masses<S> {
    bits: u32,
    unit: f64,
    masses: BTreeMap<S, f64>,
    fixed_points: BTreeMap<S, f64>,
}

impl<S: Symbol> Masses<S> {
    pub fn compute(cfg: &Cfg<S>) -> Result<Self> {
        let terminals = cfg.terminal_count();
        if terminals == 0 {
            return Err(Error::NoTerminals);
        }
        // floor(log2(terminals)) + 1
        let bits = usize::BITS - terminals.leading_zeros();
        let unit = 2f64.powi(-(bits as i32));

        let mut n = Normalizer {
            cfg,
            unit,
            colors: cfg.nonterminals().map(|s| (s, Color::White)).collect(),
            terms: BTreeMap::new(),
            fixed_points: BTreeMap::new(),
        };
        if cfg.is_nonterminal(cfg.start) {
            n.visit(cfg.start)?;
        }
        for s in cfg.nonterminals() {
            if n.colors[&s] == Color::White {
                n.visit(s)?;
            }
        }

        let mut masses = BTreeMap::new();
        for &s in S::all() {
            let m = if cfg.is_nonterminal(s) {
                n.terms[&s].value().ok_or(Error::NoFixedPoint(s.name()))?
            } else {
                unit
            };
            masses.insert(s, m);
        }
        Ok(Self {
            bits,
            unit,
            masses,
            fixed_points: n.fixed_points,
        })
    }

    /// Encoding bits allotted to each terminal choice.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn mass(&self, s: S) -> f64 {
        self.masses.get(&s).copied().unwrap_or(0.0)
    }

    /// Cycle roots and the fixed point chosen for each.
    pub fn fixed_points(&self) -> &BTreeMap<S, f64> {
        &self.fixed_points
    }

    /// The share of its parent's mass one production accounts for.
    pub fn production_mass(&self, p: &Production<S>) -> f64 {
        if p.is_childless() {
            self.mass(p.symbol)
        } else {
            p.children
                .iter()
                .fold(self.unit, |acc, c| acc * self.mass(*c))
        }
    }

    /// `production_mass / mass(parent)` for every production, in rule order.
    ///
    /// Cyclic parents are not renormalized: their weights sum to `P(N) / N`,
    /// which is 1 up to the residual of the fixed point.
    pub fn production_probs(&self, cfg: &Cfg<S>) -> BTreeMap<S, Vec<f64>> {
        cfg.nonterminals()
            .map(|s| {
                let parent = self.mass(s);
                let probs = cfg
                    .productions(s)
                    .iter()
                    .map(|p| self.production_mass(p) / parent)
                    .collect();
                (s, probs)
            })
            .collect()
    }
}

struct Normalizer<'g, S> {
    cfg: &'g Cfg<S>,
    unit: f64,
    colors: BTreeMap<S, Color>,
    terms: BTreeMap<S, Term<S>>,
    fixed_points: BTreeMap<S, f64>,
}

impl<S: Symbol> Normalizer<'_, S> {
    fn lookup(&mut self, target: S) -> Result<Term<S>> {
        if !self.cfg.is_nonterminal(target) {
            return Ok(Term::known(self.unit));
        }
        match self.colors[&target] {
            Color::White => {
                self.visit(target)?;
                Ok(self.terms[&target].clone())
            }
            Color::Gray | Color::Root => {
                self.colors.insert(target, Color::Root);
                Ok(Term::unknown(target))
            }
            Color::Black => Ok(self.terms[&target].clone()),
        }
    }

    fn visit(&mut self, s: S) -> Result<()> {
        self.colors.insert(s, Color::Gray);
        let cfg = self.cfg;
        let mut total = Term::known(0.0);
        for p in cfg.productions(s) {
            let term = if p.is_childless() {
                self.lookup(p.symbol)?
            } else {
                let mut term = Term::known(self.unit);
                for c in p.children.iter() {
                    let child = self.lookup(*c)?;
                    term = term.mul(&child, s)?;
                }
                term
            };
            total = total.add(&term, s)?;
        }

        if self.colors[&s] == Color::Root && total.root == Some(s) {
            let n = self.solve(s, &total.poly)?;
            self.terms.insert(s, Term::known(n));
            self.fill(s, n);
        } else {
            self.terms.insert(s, total);
        }
        self.colors.insert(s, Color::Black);
        Ok(())
    }

    /// Smallest root of `P(N) - N` in `(0, 1]`.
    fn solve(&mut self, s: S, p: &Polynomial) -> Result<f64> {
        let q = p + &Polynomial::new(vec![0.0, -1.0]);
        let n = q
            .real_roots(0.0, 1.0)
            .into_iter()
            .find(|r| *r > ROOT_EPS)
            .ok_or(Error::NoFixedPoint(s.name()))?;
        debug!(symbol = s.name(), fixed_point = n, degree = p.degree(), "solved cycle");
        self.fixed_points.insert(s, n);
        Ok(n)
    }

    /// Substitute the solved root into every mass below `root` still
    /// expressed in its unknown.
    fn fill(&mut self, root: S, n: f64) {
        let mut seen = BTreeSet::from([root]);
        let mut stack = vec![root];
        while let Some(s) = stack.pop() {
            if let Some(term) = self.terms.get_mut(&s) {
                if term.root == Some(root) {
                    *term = Term::known(term.poly.eval(n));
                }
            }
            for p in self.cfg.productions(s) {
                let next = std::iter::once(&p.symbol).chain(p.children.iter());
                for &c in next {
                    if self.cfg.is_nonterminal(c) && seen.insert(c) {
                        stack.push(c);
                    }
                }
            }
        }
    }
}

/// The grammar weighted by its Solomonoff production probabilities.
pub fn cfg_to_solomonoff_pcfg<S: Symbol>(cfg: &Cfg<S>) -> Result<Pcfg<S>> {
    let masses = Masses::compute(cfg)?;
    Pcfg::new(cfg.clone(), masses.production_probs(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithmetic::{Arithmetic, Sym};
    use crate::grammar::rule;
    use crate::grammar::tests::{tiny, Tiny};
    use crate::language::Language;
    use serde::{Deserialize, Serialize};

    macro_rules! symbols {
        ($name:ident { $($v:ident),* }) => {
            #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            enum $name { $($v),* }

            impl Symbol for $name {
                fn all() -> &'static [Self] {
                    &[$($name::$v),*]
                }

                fn name(&self) -> &'static str {
                    match self { $($name::$v => stringify!($v)),* }
                }
            }
        };
    }

    symbols!(Acyclic { A, B, C, X, Y, Z });
    symbols!(Pair { A, B, T });

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn conserves<S: Symbol>(cfg: &Cfg<S>, m: &Masses<S>) {
        for s in cfg.nonterminals() {
            let sum: f64 = cfg.productions(s).iter().map(|p| m.production_mass(p)).sum();
            assert!(close(sum, m.mass(s)), "{:?}: {} != {}", s, sum, m.mass(s));
        }
    }

    #[test]
    fn worked_example() {
        let g = tiny();
        let m = Masses::compute(&g).unwrap();
        assert_eq!(m.bits(), 1);
        assert_eq!(m.mass(Tiny::T), 0.5);
        assert!(close(m.mass(Tiny::S), 1.0));
        let probs = m.production_probs(&g);
        assert!(close(probs[&Tiny::S][0], 0.5));
        assert!(close(probs[&Tiny::S][1], 0.5));
    }

    #[test]
    fn acyclic_masses_are_sums_of_products() {
        use Acyclic::*;
        let g = Cfg::new(
            A,
            BTreeMap::from([
                (A, vec![rule(X, &[]), rule(B, &[]), rule(Y, &[B, C])]),
                (B, vec![rule(Z, &[]), rule(X, &[C])]),
                (C, vec![rule(Y, &[]), rule(Z, &[])]),
            ]),
        )
        .unwrap();
        let m = Masses::compute(&g).unwrap();
        // three terminals: two bits each
        assert_eq!(m.bits(), 2);
        assert!(close(m.mass(C), 0.5));
        assert!(close(m.mass(B), 0.375));
        assert!(close(m.mass(A), 0.25 + 0.375 + 0.25 * 0.375 * 0.5));
        assert!(m.fixed_points().is_empty());
        conserves(&g, &m);
        for probs in m.production_probs(&g).values() {
            assert!(close(probs.iter().sum(), 1.0));
        }
    }

    #[test]
    fn arithmetic_grammar_fixed_points() {
        let lang = Arithmetic::new().unwrap();
        let g = lang.cfg();
        let m = Masses::compute(g).unwrap();
        // 26 terminals need 5 bits
        assert_eq!(m.bits(), 5);
        let roots: Vec<Sym> = m.fixed_points().keys().copied().collect();
        assert_eq!(roots, vec![Sym::Exec, Sym::BoolExp, Sym::IntExp]);
        for (&s, &n) in m.fixed_points() {
            assert!(n > 0.0 && n <= 1.0);
            let p: f64 = g.productions(s).iter().map(|p| m.production_mass(p)).sum();
            assert!((p - n).abs() < 1e-9, "{:?}: N={} P(N)={}", s, n, p);
        }
        // 2N^2 - 32N + 5 = 0, smaller root
        let int_exp = (32.0 - (1024.0f64 - 40.0).sqrt()) / 4.0;
        assert!(close(m.mass(Sym::IntExp), int_exp));
        conserves(g, &m);
        for (s, probs) in m.production_probs(g) {
            let sum: f64 = probs.iter().sum();
            assert!(close(sum, 1.0), "{:?} sums to {}", s, sum);
        }
    }

    #[test]
    fn pcfg_carries_normalized_weights() {
        let pcfg = cfg_to_solomonoff_pcfg(&tiny()).unwrap();
        assert_eq!(pcfg.probs(Tiny::S).len(), 2);
        assert!(pcfg.probs(Tiny::T).is_empty());
    }

    #[test]
    fn no_fixed_point_is_fatal() {
        use Tiny::*;
        // N = 1 + N^2 / 2 has no real root
        let g = Cfg::new(
            S,
            BTreeMap::from([(S, vec![rule(T, &[]), rule(T, &[]), rule(T, &[S, S])])]),
        )
        .unwrap();
        assert_eq!(Masses::compute(&g).unwrap_err(), Error::NoFixedPoint("S"));
    }

    #[test]
    fn interleaved_cycles_are_reported() {
        use Pair::*;
        let g = Cfg::new(
            A,
            BTreeMap::from([
                (A, vec![rule(T, &[]), rule(T, &[B])]),
                (B, vec![rule(T, &[]), rule(T, &[A, B])]),
            ]),
        )
        .unwrap();
        assert!(matches!(
            Masses::compute(&g),
            Err(Error::NestedCycle { symbol: "B", .. })
        ));
    }

    #[test]
    fn unreachable_nonterminals_still_get_mass() {
        use Pair::*;
        let g = Cfg::new(
            A,
            BTreeMap::from([
                (A, vec![rule(T, &[])]),
                (B, vec![rule(T, &[]), rule(T, &[T])]),
            ]),
        )
        .unwrap();
        let m = Masses::compute(&g).unwrap();
        // one terminal: mass 1/2
        assert!(close(m.mass(B), 0.75));
    }
}
