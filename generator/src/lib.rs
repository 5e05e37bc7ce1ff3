mod names;
mod tree;
mod generator;
mod environment;
mod emit;
mod mutator;
mod poly;

pub mod arithmetic;
pub mod error;
pub mod grammar;
pub mod language;
pub mod program;
pub mod solomonoff;

pub use crate::emit::{Emit, Emitter};
pub use crate::environment::{Environment, Role};
pub use crate::error::{Error, GrammarError, Result};
pub use crate::generator::{function_block, BlockGenerator, PcfgSampler, RandomGenerator, DEFAULT_MAX_DEPTH};
pub use crate::grammar::{rule, Cfg, Pcfg, Production, Symbol};
pub use crate::language::Language;
pub use crate::mutator::{bind, Binder, Mutator};
pub use crate::names::{Name, NameTable};
pub use crate::poly::Polynomial;
pub use crate::program::{Image, Kind, PerKind, Program, Slot, SlotId, SlotRecord, Status, Value};
pub use crate::solomonoff::{cfg_to_solomonoff_pcfg, Masses};
pub use crate::tree::{Block, Node};
