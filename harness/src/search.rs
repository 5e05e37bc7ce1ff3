use anyhow::Result;
use cfg_synth::{
    bind, cfg_to_solomonoff_pcfg, function_block, Block, BlockGenerator, Kind, Language, Pcfg,
    PcfgSampler, Program, RandomGenerator, Status, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::run::{run_for_time, time_limit, Worker};

/// How candidates are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Uniform productions with the coin-flip size penalty
    Random,
    /// Like `random`, followed by one assignment per output
    RandomFunction,
    /// Weighted by the Solomonoff prior over the grammar
    Solomonoff,
    /// Like `solomonoff`, followed by one assignment per output
    SolomonoffFunction,
}

impl Strategy {
    fn is_function(self) -> bool {
        matches!(self, Strategy::RandomFunction | Strategy::SolomonoffFunction)
    }
}

/// One input/output pair the synthesized program has to reproduce.
#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    pub inputs: Vec<(Kind, String, Value)>,
    pub outputs: Vec<(Kind, String, Value)>,
}

#[derive(Debug)]
pub enum Outcome<S> {
    /// A bound candidate satisfying every example, and the attempt it was found on.
    Found { block: Block<S>, attempts: usize },
    Exhausted { attempts: usize },
}

enum Proposer<S> {
    Plain,
    Weighted(Pcfg<S>),
}

/// Generate-and-test driver: proposes candidates from a language's grammar
/// and runs each one against the examples in a worker process.
pub struct Searcher<'l, L: Language> {
    language: &'l L,
    proposer: Proposer<L::Sym>,
    config: SearchConfig,
    worker: Worker,
    rng: StdRng,
}

impl<'l, L: Language> Searcher<'l, L> {
    pub fn new(language: &'l L, config: SearchConfig, worker: Worker) -> Result<Self> {
        time_limit(config.timeout)?;
        let proposer = match config.strategy {
            Strategy::Random | Strategy::RandomFunction => Proposer::Plain,
            Strategy::Solomonoff | Strategy::SolomonoffFunction => {
                Proposer::Weighted(cfg_to_solomonoff_pcfg(language.cfg())?)
            }
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            language,
            proposer,
            config,
            worker,
            rng,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Draw one unbound candidate.
    pub fn propose(&mut self, program: &Program<L::Sym>) -> cfg_synth::Result<Block<L::Sym>> {
        let function = self.config.strategy.is_function();
        let depth = self.config.max_depth;
        match &self.proposer {
            Proposer::Plain => {
                let gen = RandomGenerator::new(self.language.cfg(), depth);
                draw(self.language, program, &gen, function, &mut self.rng)
            }
            Proposer::Weighted(pcfg) => {
                let gen = PcfgSampler::new(pcfg, depth);
                draw(self.language, program, &gen, function, &mut self.rng)
            }
        }
    }

    /// Run `block` on every example, each from freshly wiped slots.
    pub fn check(
        &self,
        program: &mut Program<L::Sym>,
        block: &Block<L::Sym>,
        examples: &[Example],
    ) -> Result<bool> {
        program.block = Some(block.clone());
        for example in examples {
            program.wipe();
            for (kind, name, value) in &example.inputs {
                program.set_input(*kind, name, *value)?;
            }
            let status = run_for_time(
                program,
                &self.worker,
                self.config.timeout,
                self.config.max_depth,
            )?;
            if status != Status::Finished {
                return Ok(false);
            }
            for (kind, name, expected) in &example.outputs {
                if program.get_output(*kind, name)? != *expected {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub fn search(
        &mut self,
        program: &mut Program<L::Sym>,
        examples: &[Example],
    ) -> Result<Outcome<L::Sym>> {
        program.ensure_locals(Kind::Int, self.config.int_locals);
        program.ensure_locals(Kind::Bool, self.config.bool_locals);
        info!(
            attempts = self.config.attempts,
            strategy = ?self.config.strategy,
            examples = examples.len(),
            "starting search"
        );

        for attempt in 1..=self.config.attempts {
            let mut block = match self.propose(program) {
                Ok(block) => block,
                Err(e) if e.is_recoverable() => {
                    debug!(attempt, error = %e, "discarding candidate");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            bind(self.language, program, &mut block, &mut self.rng)?;
            debug!(attempt, candidate = %self.language.to_str(&block, program), "trying");
            if self.check(program, &block, examples)? {
                info!(attempt, "found a program satisfying every example");
                return Ok(Outcome::Found {
                    block,
                    attempts: attempt,
                });
            }
        }

        Ok(Outcome::Exhausted {
            attempts: self.config.attempts,
        })
    }
}

fn draw<L, G, R>(
    language: &L,
    program: &Program<L::Sym>,
    gen: &G,
    function: bool,
    rng: &mut R,
) -> cfg_synth::Result<Block<L::Sym>>
where
    L: Language,
    G: BlockGenerator<L::Sym>,
    R: Rng + ?Sized,
{
    if function {
        function_block(language, program, gen, rng)
    } else {
        gen.generate(language.cfg().start, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfg_synth::arithmetic::{Arithmetic, Sym};

    fn searcher(lang: &Arithmetic, strategy: Strategy) -> Searcher<'_, Arithmetic> {
        let config = SearchConfig {
            strategy,
            seed: Some(8),
            ..SearchConfig::default()
        };
        // never spawned by these tests
        Searcher::new(lang, config, Worker::new("false", Vec::<String>::new())).unwrap()
    }

    #[test]
    fn bad_timeouts_are_rejected_up_front() {
        let lang = Arithmetic::new().unwrap();
        for timeout in [0.0, -1.0, f64::NAN] {
            let config = SearchConfig {
                timeout,
                ..SearchConfig::default()
            };
            assert!(Searcher::new(&lang, config, Worker::new("false", Vec::<String>::new())).is_err());
        }
    }

    #[test]
    fn function_strategies_end_in_output_assignments() {
        let lang = Arithmetic::new().unwrap();
        let p = Program::new(&[(Kind::Int, "X")], &[(Kind::Int, "Y")]).unwrap();
        for strategy in [Strategy::RandomFunction, Strategy::SolomonoffFunction] {
            let mut s = searcher(&lang, strategy);
            let b = (0..100).find_map(|_| s.propose(&p).ok()).unwrap();
            assert_eq!(b.symbol, Sym::Seq);
            assert_eq!(b.children[1].symbol, Sym::Gets);
        }
    }

    #[test]
    fn seeded_searchers_repeat_themselves() {
        let lang = Arithmetic::new().unwrap();
        let p = Program::new(&[(Kind::Int, "X")], &[(Kind::Int, "Y")]).unwrap();
        let draws = |strategy| {
            let mut s = searcher(&lang, strategy);
            (0..20)
                .map(|_| s.propose(&p).map(|b| lang.to_str(&b, &p)).ok())
                .collect::<Vec<_>>()
        };
        assert_eq!(draws(Strategy::Solomonoff), draws(Strategy::Solomonoff));
        assert_eq!(draws(Strategy::Random), draws(Strategy::Random));
    }

    #[test]
    fn plain_strategies_start_from_the_grammar_root() {
        let lang = Arithmetic::new().unwrap();
        let p = Program::new(&[], &[(Kind::Int, "Y")]).unwrap();
        let mut s = searcher(&lang, Strategy::Random);
        let statements = [Sym::IfThenElse, Sym::Pass, Sym::While, Sym::Seq, Sym::Gets];
        for _ in 0..50 {
            if let Ok(b) = s.propose(&p) {
                assert!(statements.contains(&b.symbol), "{:?}", b.symbol);
            }
        }
    }
}
