use rand::Rng;

use crate::error::{Error, Result};
use crate::grammar::{Cfg, Pcfg, Symbol};
use crate::language::Language;
use crate::program::{Kind, Program};
use crate::tree::Block;

pub const DEFAULT_MAX_DEPTH: usize = 64;

pub trait BlockGenerator<S> {
    /// Derive a complete tree rooted at `s`, or fail with
    /// [`Error::DepthExceeded`] once the derivation nests too deeply.
    fn generate<R: Rng + ?Sized>(&self, s: S, rng: &mut R) -> Result<Block<S>>;
}

/// Plain randomized derivation. Productions are chosen uniformly; one with
/// `n` children is kept only if `n` fair coins all come up tails, so each
/// unit of growth halves the probability of a derivation.
pub struct RandomGenerator<'g, S> {
    cfg: &'g Cfg<S>,
    max_depth: usize,
}

impl<'g, S: Symbol> RandomGenerator<'g, S> {
    pub fn new(cfg: &'g Cfg<S>, max_depth: usize) -> Self {
        Self { cfg, max_depth }
    }

    fn derive<R: Rng + ?Sized>(&self, mut s: S, rng: &mut R, mut depth: usize) -> Result<Block<S>> {
        let mut children: &[S] = &[];
        while self.cfg.is_nonterminal(s) {
            if depth > self.max_depth {
                return Err(Error::DepthExceeded(self.max_depth));
            }
            let Some(p) = self.cfg.choose_rule(s, rng) else { break };
            let undo = p.children.iter().any(|_| rng.random_bool(0.5));
            if !undo {
                s = p.symbol;
                children = &p.children;
                depth += 1;
            }
        }
        let mut block = Block::leaf(s);
        for c in children {
            block.children.push(self.derive(*c, rng, depth + 1)?);
        }
        Ok(block)
    }
}

impl<S: Symbol> BlockGenerator<S> for RandomGenerator<'_, S> {
    fn generate<R: Rng + ?Sized>(&self, s: S, rng: &mut R) -> Result<Block<S>> {
        self.derive(s, rng, 0)
    }
}

/// Weighted derivation: productions drawn proportionally to the PCFG weights.
pub struct PcfgSampler<'g, S> {
    pcfg: &'g Pcfg<S>,
    max_depth: usize,
}

impl<'g, S: Symbol> PcfgSampler<'g, S> {
    pub fn new(pcfg: &'g Pcfg<S>, max_depth: usize) -> Self {
        Self { pcfg, max_depth }
    }

    fn derive<R: Rng + ?Sized>(&self, mut s: S, rng: &mut R, mut depth: usize) -> Result<Block<S>> {
        let mut children: &[S] = &[];
        while self.pcfg.cfg.is_nonterminal(s) {
            if depth > self.max_depth {
                return Err(Error::DepthExceeded(self.max_depth));
            }
            let Some(p) = self.pcfg.sample_rule(s, rng) else { break };
            s = p.symbol;
            children = &p.children;
            depth += 1;
        }
        let mut block = Block::leaf(s);
        for c in children {
            block.children.push(self.derive(*c, rng, depth + 1)?);
        }
        Ok(block)
    }
}

impl<S: Symbol> BlockGenerator<S> for PcfgSampler<'_, S> {
    fn generate<R: Rng + ?Sized>(&self, s: S, rng: &mut R) -> Result<Block<S>> {
        self.derive(s, rng, 0)
    }
}

/// `SEQ(body, assignments)`: a free-form body followed by one assignment to
/// every output slot, ints first. Output targets come pre-bound so the
/// binder leaves them in place.
pub fn function_block<L, G, R>(
    language: &L,
    program: &Program<L::Sym>,
    generator: &G,
    rng: &mut R,
) -> Result<Block<L::Sym>>
where
    L: Language,
    G: BlockGenerator<L::Sym>,
    R: Rng + ?Sized,
{
    let body = generator.generate(language.cfg().start, rng)?;
    let mut assignments: Option<Block<L::Sym>> = None;
    for kind in Kind::ALL {
        for &out in program.outs(kind) {
            let rhs = generator.generate(language.expression_symbol(kind), rng)?;
            let assign = language.assign(kind, out, rhs);
            assignments = Some(match assignments {
                None => assign,
                Some(prev) => language.sequence(prev, assign),
            });
        }
    }
    Ok(match assignments {
        Some(a) => language.sequence(body, a),
        None => body,
    })
}
