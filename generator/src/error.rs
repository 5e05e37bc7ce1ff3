use thiserror::Error;

use crate::program::Kind;

/// Malformed production tables, reported when a `Cfg` is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("nonterminal {0} has no productions")]
    NoProductions(&'static str),

    #[error("nonterminal {0} lists itself as a childless alternative")]
    SelfProduction(&'static str),

    #[error("weights for {symbol}: expected {expected}, got {got}")]
    WeightArity {
        symbol: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("nonterminal {symbol} builds a node with children on nonterminal {constructor}")]
    NonterminalConstructor {
        symbol: &'static str,
        constructor: &'static str,
    },

    #[error("no weights given for nonterminal {0}")]
    MissingWeights(&'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("malformed grammar: {0}")]
    Grammar(#[from] GrammarError),

    #[error("grammar has no terminal symbols")]
    NoTerminals,

    #[error("cyclic symbol {0} has no fixed point in (0, 1]")]
    NoFixedPoint(&'static str),

    #[error("symbol {symbol} mixes the cycles rooted at {first} and {second}")]
    NestedCycle {
        symbol: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid sampling weights for {0}")]
    InvalidWeights(&'static str),

    #[error("variable symbol {0} has no option-resolution rule")]
    OptionlessVariable(&'static str),

    #[error("recursion depth exceeded {0}")]
    DepthExceeded(usize),

    #[error("symbol {0} cannot be evaluated as an expression")]
    Unevaluable(&'static str),

    #[error("slot {name} declared twice among {kind} slots")]
    DuplicateSlot { kind: Kind, name: String },

    #[error("no {kind} slot named {name}")]
    UnknownSlot { kind: Kind, name: String },

    #[error("expected {expected} {kind} output values, got {got}")]
    OutputArity { kind: Kind, expected: usize, got: usize },

    #[error("malformed tree: {0}")]
    MalformedTree(String),
}

impl Error {
    /// Depth exhaustion discards a single attempt; everything else is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::DepthExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
