//! A small imperative language over ints and bools: conditionals, loops,
//! assignment, integer arithmetic and coin-flip primitives.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::environment::Role;
use crate::error::{Error, Result};
use crate::grammar::{rule, Cfg, Production, Symbol};
use crate::language::Language;
use crate::program::{Kind, Program, SlotId, Value};
use crate::tree::Block;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sym {
    Exec,

    IfThenElse,
    Pass,
    While,
    Seq,
    Gets,
    Assign,
    AssignInt,
    IntBinding,
    IntLval,
    AssignBool,
    BoolBinding,
    BoolLval,

    BoolExp,

    Comp,
    Less,
    Equal,

    BoolOp,
    And,
    Or,
    NegBool,

    BoolBasic,
    True,
    False,
    LocalBool,
    WindowBool,
    RandBool,

    IntExp,

    IntOp,
    Plus,
    Mult,

    IntBasic,
    One,
    NegOne,
    RandInt,
    LocalInt,
    WindowInt,
}

const ALL: [Sym; 37] = [
    Sym::Exec,
    Sym::IfThenElse,
    Sym::Pass,
    Sym::While,
    Sym::Seq,
    Sym::Gets,
    Sym::Assign,
    Sym::AssignInt,
    Sym::IntBinding,
    Sym::IntLval,
    Sym::AssignBool,
    Sym::BoolBinding,
    Sym::BoolLval,
    Sym::BoolExp,
    Sym::Comp,
    Sym::Less,
    Sym::Equal,
    Sym::BoolOp,
    Sym::And,
    Sym::Or,
    Sym::NegBool,
    Sym::BoolBasic,
    Sym::True,
    Sym::False,
    Sym::LocalBool,
    Sym::WindowBool,
    Sym::RandBool,
    Sym::IntExp,
    Sym::IntOp,
    Sym::Plus,
    Sym::Mult,
    Sym::IntBasic,
    Sym::One,
    Sym::NegOne,
    Sym::RandInt,
    Sym::LocalInt,
    Sym::WindowInt,
];

impl Symbol for Sym {
    fn all() -> &'static [Self] {
        &ALL
    }

    fn name(&self) -> &'static str {
        match self {
            Sym::Exec => "EXEC",
            Sym::IfThenElse => "IF_THEN_ELSE",
            Sym::Pass => "PASS",
            Sym::While => "WHILE",
            Sym::Seq => "SEQ",
            Sym::Gets => "GETS",
            Sym::Assign => "ASSIGN",
            Sym::AssignInt => "ASSIGN_INT",
            Sym::IntBinding => "INT_BINDING",
            Sym::IntLval => "INT_LVAL",
            Sym::AssignBool => "ASSIGN_BOOL",
            Sym::BoolBinding => "BOOL_BINDING",
            Sym::BoolLval => "BOOL_LVAL",
            Sym::BoolExp => "BOOL_EXP",
            Sym::Comp => "COMP",
            Sym::Less => "LESS",
            Sym::Equal => "EQUAL",
            Sym::BoolOp => "BOOL_OP",
            Sym::And => "AND",
            Sym::Or => "OR",
            Sym::NegBool => "NEG_BOOL",
            Sym::BoolBasic => "BOOL_BASIC",
            Sym::True => "TRUE",
            Sym::False => "FALSE",
            Sym::LocalBool => "LOCAL_BOOL",
            Sym::WindowBool => "WINDOW_BOOL",
            Sym::RandBool => "RAND_BOOL",
            Sym::IntExp => "INT_EXP",
            Sym::IntOp => "INT_OP",
            Sym::Plus => "PLUS",
            Sym::Mult => "MULT",
            Sym::IntBasic => "INT_BASIC",
            Sym::One => "ONE",
            Sym::NegOne => "NEG_ONE",
            Sym::RandInt => "RAND_INT",
            Sym::LocalInt => "LOCAL_INT",
            Sym::WindowInt => "WINDOW_INT",
        }
    }
}

const VARIABLE_SYMBOLS: [Sym; 6] = [
    Sym::LocalBool,
    Sym::LocalInt,
    Sym::WindowBool,
    Sym::WindowInt,
    Sym::BoolLval,
    Sym::IntLval,
];

fn rules() -> BTreeMap<Sym, Vec<Production<Sym>>> {
    use Sym::*;
    BTreeMap::from([
        (
            Exec,
            vec![
                rule(IfThenElse, &[BoolExp, Exec, Exec]),
                rule(Pass, &[]),
                rule(While, &[BoolExp, Exec]),
                rule(Seq, &[Exec, Exec]),
                rule(Gets, &[Assign]),
            ],
        ),
        (Assign, vec![rule(AssignInt, &[]), rule(AssignBool, &[])]),
        (AssignBool, vec![rule(BoolBinding, &[BoolLval, BoolExp])]),
        (AssignInt, vec![rule(IntBinding, &[IntLval, IntExp])]),
        (
            BoolExp,
            vec![rule(Comp, &[]), rule(BoolOp, &[]), rule(BoolBasic, &[])],
        ),
        (
            Comp,
            vec![rule(Less, &[IntExp, IntExp]), rule(Equal, &[IntExp, IntExp])],
        ),
        (
            BoolOp,
            vec![
                rule(And, &[BoolExp, BoolExp]),
                rule(Or, &[BoolExp, BoolExp]),
                rule(NegBool, &[BoolExp]),
            ],
        ),
        (
            BoolBasic,
            vec![
                rule(True, &[]),
                rule(False, &[]),
                rule(LocalBool, &[]),
                rule(WindowBool, &[]),
                rule(RandBool, &[]),
            ],
        ),
        (IntExp, vec![rule(IntOp, &[]), rule(IntBasic, &[])]),
        (
            IntOp,
            vec![rule(Plus, &[IntExp, IntExp]), rule(Mult, &[IntExp, IntExp])],
        ),
        (
            IntBasic,
            vec![
                rule(One, &[]),
                rule(NegOne, &[]),
                rule(RandInt, &[]),
                rule(LocalInt, &[]),
                rule(WindowInt, &[]),
            ],
        ),
    ])
}

pub struct Arithmetic {
    cfg: Cfg<Sym>,
}

impl Arithmetic {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cfg: Cfg::new(Sym::Exec, rules())?,
        })
    }
}

impl Language for Arithmetic {
    type Sym = Sym;

    fn cfg(&self) -> &Cfg<Sym> {
        &self.cfg
    }

    fn variable_symbols(&self) -> &[Sym] {
        &VARIABLE_SYMBOLS
    }

    fn variable_role(&self, s: Sym) -> Option<(Kind, Role)> {
        match s {
            Sym::LocalInt => Some((Kind::Int, Role::Local)),
            Sym::LocalBool => Some((Kind::Bool, Role::Local)),
            Sym::WindowInt => Some((Kind::Int, Role::Window)),
            Sym::WindowBool => Some((Kind::Bool, Role::Window)),
            Sym::IntLval => Some((Kind::Int, Role::Lvalue)),
            Sym::BoolLval => Some((Kind::Bool, Role::Lvalue)),
            _ => None,
        }
    }

    fn interpret<R: Rng + ?Sized>(
        &self,
        block: &Block<Sym>,
        program: &mut Program<Sym>,
        rng: &mut R,
        max_depth: usize,
    ) -> Result<()> {
        Machine {
            program,
            rng,
            max_depth,
        }
        .execute(block, 0)
    }

    fn expression_symbol(&self, kind: Kind) -> Sym {
        match kind {
            Kind::Int => Sym::IntExp,
            Kind::Bool => Sym::BoolExp,
        }
    }

    fn assign(&self, kind: Kind, target: SlotId, value: Block<Sym>) -> Block<Sym> {
        let (binding, lval) = match kind {
            Kind::Int => (Sym::IntBinding, Sym::IntLval),
            Kind::Bool => (Sym::BoolBinding, Sym::BoolLval),
        };
        Block::new(
            Sym::Gets,
            vec![Block::new(binding, vec![Block::bound(lval, target), value])],
        )
    }

    fn sequence(&self, first: Block<Sym>, second: Block<Sym>) -> Block<Sym> {
        Block::new(Sym::Seq, vec![first, second])
    }
}

/// Tree-walking evaluator over one program's slots.
struct Machine<'a, R: ?Sized> {
    program: &'a mut Program<Sym>,
    rng: &'a mut R,
    max_depth: usize,
}

fn child(b: &Block<Sym>, i: usize) -> Result<&Block<Sym>> {
    b.children.get(i).ok_or_else(|| {
        Error::MalformedTree(format!("{} is missing child {}", b.symbol.name(), i))
    })
}

impl<R: Rng + ?Sized> Machine<'_, R> {
    fn enter(&self, depth: usize) -> Result<usize> {
        if depth >= self.max_depth {
            Err(Error::DepthExceeded(self.max_depth))
        } else {
            Ok(depth + 1)
        }
    }

    fn slot_of(&self, b: &Block<Sym>) -> Result<SlotId> {
        b.var
            .ok_or_else(|| Error::MalformedTree(format!("unbound {}", b.symbol.name())))
    }

    fn execute(&mut self, b: &Block<Sym>, depth: usize) -> Result<()> {
        let depth = self.enter(depth)?;
        match b.symbol {
            Sym::Pass => {}
            Sym::Seq => {
                for c in b.children.iter() {
                    self.execute(c, depth)?;
                }
            }
            Sym::Gets => self.execute(child(b, 0)?, depth)?,
            Sym::IntBinding => {
                let target = self.slot_of(child(b, 0)?)?;
                let v = self.eval_int(child(b, 1)?, depth)?;
                self.program.slot_mut(target).set(Value::Int(v));
            }
            Sym::BoolBinding => {
                let target = self.slot_of(child(b, 0)?)?;
                let v = self.eval_bool(child(b, 1)?, depth)?;
                self.program.slot_mut(target).set(Value::Bool(v));
            }
            Sym::IfThenElse => {
                if self.eval_bool(child(b, 0)?, depth)? {
                    self.execute(child(b, 1)?, depth)?;
                } else {
                    self.execute(child(b, 2)?, depth)?;
                }
            }
            Sym::While => {
                while self.eval_bool(child(b, 0)?, depth)? {
                    self.execute(child(b, 1)?, depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn eval_int(&mut self, b: &Block<Sym>, depth: usize) -> Result<i64> {
        let depth = self.enter(depth)?;
        Ok(match b.symbol {
            Sym::Mult => {
                let l = self.eval_int(child(b, 0)?, depth)?;
                l.wrapping_mul(self.eval_int(child(b, 1)?, depth)?)
            }
            Sym::Plus => {
                let l = self.eval_int(child(b, 0)?, depth)?;
                l.wrapping_add(self.eval_int(child(b, 1)?, depth)?)
            }
            s if VARIABLE_SYMBOLS.contains(&s) => {
                self.program.slot(self.slot_of(b)?).get().as_int()
            }
            Sym::One => 1,
            Sym::NegOne => -1,
            Sym::RandInt => {
                let mut n: i64 = 0;
                while self.rng.random_bool(0.5) {
                    n = n.wrapping_add(1);
                }
                n
            }
            s => return Err(Error::Unevaluable(s.name())),
        })
    }

    fn eval_bool(&mut self, b: &Block<Sym>, depth: usize) -> Result<bool> {
        let depth = self.enter(depth)?;
        Ok(match b.symbol {
            Sym::Less => {
                self.eval_int(child(b, 0)?, depth)? < self.eval_int(child(b, 1)?, depth)?
            }
            Sym::Equal => {
                self.eval_int(child(b, 0)?, depth)? == self.eval_int(child(b, 1)?, depth)?
            }
            Sym::And => {
                self.eval_bool(child(b, 0)?, depth)? && self.eval_bool(child(b, 1)?, depth)?
            }
            Sym::Or => {
                self.eval_bool(child(b, 0)?, depth)? || self.eval_bool(child(b, 1)?, depth)?
            }
            Sym::NegBool => !self.eval_bool(child(b, 0)?, depth)?,
            Sym::True => true,
            Sym::False => false,
            s if VARIABLE_SYMBOLS.contains(&s) => {
                self.program.slot(self.slot_of(b)?).get().as_bool()
            }
            Sym::RandBool => self.rng.random_bool(0.5),
            s => return Err(Error::Unevaluable(s.name())),
        })
    }
}
