use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, GrammarError, Result};

/// A grammar category drawn from a closed set known when the grammar is built.
pub trait Symbol:
    Copy + Eq + Ord + Hash + Debug + Serialize + DeserializeOwned + 'static
{
    /// Every symbol of the language, terminals and nonterminals alike.
    fn all() -> &'static [Self];

    fn name(&self) -> &'static str;
}

/// One alternative expansion: the symbol the AST node carries and the
/// symbols of its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Production<S> {
    pub symbol: S,
    pub children: Vec<S>,
}

impl<S> Production<S> {
    pub fn new(symbol: S, children: Vec<S>) -> Self {
        Self { symbol, children }
    }

    pub fn is_childless(&self) -> bool {
        self.children.is_empty()
    }
}

/// Shorthand for writing rule tables.
pub fn rule<S: Copy>(symbol: S, children: &[S]) -> Production<S> {
    Production::new(symbol, children.to_vec())
}

#[derive(Clone, Debug)]
pub struct Cfg<S> {
    pub start: S,
    rules: BTreeMap<S, Vec<Production<S>>>,
}

impl<S: Symbol> Cfg<S> {
    pub fn new(start: S, rules: BTreeMap<S, Vec<Production<S>>>) -> Result<Self> {
        for (lhs, productions) in rules.iter() {
            if productions.is_empty() {
                return Err(GrammarError::NoProductions(lhs.name()).into());
            }
            if productions
                .iter()
                .any(|p| p.is_childless() && p.symbol == *lhs)
            {
                return Err(GrammarError::SelfProduction(lhs.name()).into());
            }
            // nodes with children must be built on a terminal
            if let Some(p) = productions
                .iter()
                .find(|p| !p.is_childless() && rules.contains_key(&p.symbol))
            {
                return Err(GrammarError::NonterminalConstructor {
                    symbol: lhs.name(),
                    constructor: p.symbol.name(),
                }
                .into());
            }
        }
        Ok(Self { start, rules })
    }

    pub fn is_nonterminal(&self, s: S) -> bool {
        self.rules.contains_key(&s)
    }

    /// Productions of `s`, empty for terminals.
    pub fn productions(&self, s: S) -> &[Production<S>] {
        self.rules.get(&s).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = S> + '_ {
        self.rules.keys().copied()
    }

    pub fn terminal_count(&self) -> usize {
        S::all().len() - self.rules.len()
    }

    pub fn choose_rule<R: Rng + ?Sized>(&self, s: S, rng: &mut R) -> Option<&Production<S>> {
        self.productions(s).choose(rng)
    }
}

/// A grammar with one relative sampling weight per production.
#[derive(Clone, Debug)]
pub struct Pcfg<S> {
    pub cfg: Cfg<S>,
    probs: BTreeMap<S, Vec<f64>>,
    samplers: BTreeMap<S, WeightedIndex<f64>>,
}

impl<S: Symbol> Pcfg<S> {
    pub fn new(cfg: Cfg<S>, probs: BTreeMap<S, Vec<f64>>) -> Result<Self> {
        let mut samplers = BTreeMap::new();
        for lhs in cfg.nonterminals() {
            let weights = probs
                .get(&lhs)
                .ok_or(GrammarError::MissingWeights(lhs.name()))?;
            let expected = cfg.productions(lhs).len();
            if weights.len() != expected {
                return Err(GrammarError::WeightArity {
                    symbol: lhs.name(),
                    expected,
                    got: weights.len(),
                }
                .into());
            }
            let sampler =
                WeightedIndex::new(weights).map_err(|_| Error::InvalidWeights(lhs.name()))?;
            samplers.insert(lhs, sampler);
        }
        Ok(Self {
            cfg,
            probs,
            samplers,
        })
    }

    pub fn probs(&self, s: S) -> &[f64] {
        self.probs.get(&s).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Draw a production of `s` proportionally to its weight.
    pub fn sample_rule<R: Rng + ?Sized>(&self, s: S, rng: &mut R) -> Option<&Production<S>> {
        let sampler = self.samplers.get(&s)?;
        self.cfg.productions(s).get(sampler.sample(rng))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;

    /// `S -> T | T(S, S)`: one terminal, one self-recursive nonterminal.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub enum Tiny {
        S,
        T,
    }

    impl Symbol for Tiny {
        fn all() -> &'static [Self] {
            &[Tiny::S, Tiny::T]
        }

        fn name(&self) -> &'static str {
            match self {
                Tiny::S => "S",
                Tiny::T => "T",
            }
        }
    }

    pub fn tiny() -> Cfg<Tiny> {
        use Tiny::*;
        Cfg::new(S, BTreeMap::from([(S, vec![rule(T, &[]), rule(T, &[S, S])])])).unwrap()
    }

    #[test]
    fn terminals_are_symbols_without_rules() {
        let g = tiny();
        assert!(g.is_nonterminal(Tiny::S));
        assert!(!g.is_nonterminal(Tiny::T));
        assert_eq!(g.terminal_count(), 1);
        assert!(g.productions(Tiny::T).is_empty());
    }

    #[test]
    fn empty_nonterminal_is_rejected() {
        let g = Cfg::new(Tiny::S, BTreeMap::from([(Tiny::S, vec![])]));
        assert_eq!(
            g.unwrap_err(),
            Error::Grammar(GrammarError::NoProductions("S"))
        );
    }

    #[test]
    fn childless_self_alternative_is_rejected() {
        use Tiny::*;
        let g = Cfg::new(S, BTreeMap::from([(S, vec![rule(T, &[]), rule(S, &[])])]));
        assert_eq!(
            g.unwrap_err(),
            Error::Grammar(GrammarError::SelfProduction("S"))
        );
    }

    #[test]
    fn nonterminal_with_children_is_rejected() {
        use Tiny::*;
        let g = Cfg::new(S, BTreeMap::from([(S, vec![rule(T, &[]), rule(S, &[T, T])])]));
        assert_eq!(
            g.unwrap_err(),
            Error::Grammar(GrammarError::NonterminalConstructor {
                symbol: "S",
                constructor: "S"
            })
        );
    }

    #[test]
    fn weights_must_match_productions() {
        let short = Pcfg::new(tiny(), BTreeMap::from([(Tiny::S, vec![1.0])]));
        assert!(matches!(
            short,
            Err(Error::Grammar(GrammarError::WeightArity { expected: 2, got: 1, .. }))
        ));
        let missing = Pcfg::new(tiny(), BTreeMap::new());
        assert!(matches!(
            missing,
            Err(Error::Grammar(GrammarError::MissingWeights("S")))
        ));
        let zero = Pcfg::new(tiny(), BTreeMap::from([(Tiny::S, vec![0.0, 0.0])]));
        assert_eq!(zero.unwrap_err(), Error::InvalidWeights("S"));
    }
}
