use rand::Rng;

use crate::emit::{Emit, Emitter};
use crate::environment::Role;
use crate::error::Result;
use crate::grammar::{Cfg, Symbol};
use crate::program::{Kind, Program, SlotId};
use crate::tree::Block;

/// A toy language: its grammar, which symbols are variables and what they
/// range over, and how to run a bound tree.
pub trait Language {
    type Sym: Symbol;

    fn cfg(&self) -> &Cfg<Self::Sym>;

    /// Symbols whose nodes must be bound to a slot before running.
    fn variable_symbols(&self) -> &[Self::Sym];

    fn is_variable(&self, s: Self::Sym) -> bool {
        self.variable_symbols().contains(&s)
    }

    /// Kind and role of the slots a variable symbol may be bound to; `None`
    /// for symbols without an option-resolution rule.
    fn variable_role(&self, s: Self::Sym) -> Option<(Kind, Role)>;

    /// Execute `block` against the slots of `program`.
    fn interpret<R: Rng + ?Sized>(
        &self,
        block: &Block<Self::Sym>,
        program: &mut Program<Self::Sym>,
        rng: &mut R,
        max_depth: usize,
    ) -> Result<()>;

    /// Start symbol for expressions of `kind`.
    fn expression_symbol(&self, kind: Kind) -> Self::Sym;

    /// A statement storing `value` into `target`.
    fn assign(&self, kind: Kind, target: SlotId, value: Block<Self::Sym>) -> Block<Self::Sym>;

    fn sequence(&self, first: Block<Self::Sym>, second: Block<Self::Sym>) -> Block<Self::Sym>;

    /// Rendering override for one node; bound variables render as slot names.
    fn sugar(&self, block: &Block<Self::Sym>, program: &Program<Self::Sym>) -> Option<String> {
        match block.var {
            Some(id) if self.is_variable(block.symbol) => Some(program.name_of(id).to_string()),
            _ => None,
        }
    }

    fn to_str(&self, block: &Block<Self::Sym>, program: &Program<Self::Sym>) -> String {
        block.render(&|b| self.sugar(b, program))
    }

    /// Indented, one node per line.
    fn pretty(&self, block: &Block<Self::Sym>, program: &Program<Self::Sym>) -> String {
        let mut e = Emitter::new();
        block.emit(&mut e, &|b| self.sugar(b, program));
        e.finish()
    }
}
