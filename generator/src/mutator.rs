use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::grammar::Symbol;
use crate::language::Language;
use crate::program::Program;
use crate::tree::Block;

/// A Mutator is like a Generator except it operates in-place
pub trait Mutator<T, C> {
    fn mutate(&mut self, obj: &mut T, context: C) -> Result<()>;
}

/// Binds every unbound variable node to a slot drawn uniformly from the
/// slots its role allows. Nodes that already carry a slot are left alone.
pub struct Binder<'a, L, R: ?Sized> {
    language: &'a L,
    rng: &'a mut R,
}

impl<'a, L: Language, R: Rng + ?Sized> Binder<'a, L, R> {
    pub fn new(language: &'a L, rng: &'a mut R) -> Self {
        Self { language, rng }
    }
}

impl<L: Language, R: Rng + ?Sized> Mutator<Block<L::Sym>, &Program<L::Sym>> for Binder<'_, L, R> {
    fn mutate(&mut self, block: &mut Block<L::Sym>, program: &Program<L::Sym>) -> Result<()> {
        let env = Environment::new(program);
        let mut stack = vec![block];
        while let Some(b) = stack.pop() {
            if b.var.is_none() && self.language.is_variable(b.symbol) {
                let (kind, role) = self
                    .language
                    .variable_role(b.symbol)
                    .ok_or(Error::OptionlessVariable(b.symbol.name()))?;
                let slot = match env.options(kind, role).choose(&mut *self.rng) {
                    Some(id) => *id,
                    None => {
                        // Keeps ill-provisioned programs runnable.
                        debug!(symbol = b.symbol.name(), ?role, "no slot available, binding sentinel");
                        env.sentinel(kind)
                    }
                };
                b.var = Some(slot);
            }
            stack.extend(b.children.iter_mut());
        }
        Ok(())
    }
}

/// Bind `block` against `program` with a one-off binder.
pub fn bind<L: Language, R: Rng + ?Sized>(
    language: &L,
    program: &Program<L::Sym>,
    block: &mut Block<L::Sym>,
    rng: &mut R,
) -> Result<()> {
    Binder::new(language, rng).mutate(block, program)
}
