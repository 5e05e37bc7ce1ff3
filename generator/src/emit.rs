use crate::grammar::Symbol;
use crate::tree::Block;

pub struct Emitter {
    indent: usize,
    output: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::new(),
        }
    }

    pub fn emit_block(&mut self, s: &str) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(s);
    }

    pub fn enter_block(&mut self) {
        self.indent += 1
    }

    pub fn exit_block(&mut self) {
        self.indent -= 1
    }

    pub fn finish(self) -> String {
        self.output
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emit<S> {
    fn emit(&self, e: &mut Emitter, sugar: &dyn Fn(&Block<S>) -> Option<String>);
}

impl<S: Symbol> Emit<S> for Block<S> {
    fn emit(&self, e: &mut Emitter, sugar: &dyn Fn(&Block<S>) -> Option<String>) {
        match sugar(self) {
            Some(s) => e.emit_block(&s),
            None => e.emit_block(self.symbol.name()),
        }
        e.enter_block();
        for c in self.children.iter() {
            c.emit(e, sugar);
        }
        e.exit_block();
    }
}
