use std::fmt;
use std::ops::{Index, IndexMut};

use la_arena::{Arena, Idx, RawIdx};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::names::{Name, NameTable};
use crate::tree::{Block, Node};

/// The value kinds the toy language computes with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Int,
    Bool,
}

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Int, Kind::Bool];

    pub fn default_value(self) -> Value {
        match self {
            Kind::Int => Value::Int(0),
            Kind::Bool => Value::Bool(false),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Int => write!(f, "int"),
            Kind::Bool => write!(f, "bool"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Int(_) => Kind::Int,
            Value::Bool(_) => Kind::Bool,
        }
    }

    pub fn as_int(&self) -> i64 {
        match *self {
            Value::Int(i) => i,
            Value::Bool(b) => b as i64,
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Int(i) => i != 0,
            Value::Bool(b) => b,
        }
    }

    pub fn coerce(self, kind: Kind) -> Value {
        match kind {
            Kind::Int => Value::Int(self.as_int()),
            Kind::Bool => Value::Bool(self.as_bool()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One `T` per value kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerKind<T> {
    pub ints: T,
    pub bools: T,
}

impl<T> PerKind<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Kind, &T)> {
        [(Kind::Int, &self.ints), (Kind::Bool, &self.bools)].into_iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(Kind, &T) -> U) -> PerKind<U> {
        PerKind {
            ints: f(Kind::Int, &self.ints),
            bools: f(Kind::Bool, &self.bools),
        }
    }
}

impl<T> Index<Kind> for PerKind<T> {
    type Output = T;

    fn index(&self, kind: Kind) -> &T {
        match kind {
            Kind::Int => &self.ints,
            Kind::Bool => &self.bools,
        }
    }
}

impl<T> IndexMut<Kind> for PerKind<T> {
    fn index_mut(&mut self, kind: Kind) -> &mut T {
        match kind {
            Kind::Int => &mut self.ints,
            Kind::Bool => &mut self.bools,
        }
    }
}

/// A named, typed, mutable storage cell: a program input, output or local.
#[derive(Clone, Debug)]
pub struct Slot {
    kind: Kind,
    name: Name,
    value: Value,
}

impl Slot {
    fn new(kind: Kind, name: Name) -> Self {
        Self {
            kind,
            name,
            value: kind.default_value(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn get(&self) -> Value {
        self.value
    }

    /// Values of the other kind are coerced rather than rejected.
    pub fn set(&mut self, value: Value) {
        self.value = value.coerce(self.kind);
    }

    pub fn reset(&mut self) {
        self.value = self.kind.default_value();
    }
}

pub type SlotId = Idx<Slot>;

pub(crate) fn slot_index(id: SlotId) -> u32 {
    u32::from(id.into_raw())
}

pub(crate) fn slot_id(index: u32) -> SlotId {
    Idx::from_raw(RawIdx::from(index))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    Running,
    Stopped,
    Finished,
}

/// Inputs, outputs and locals of one synthesis session, plus the candidate
/// AST currently under test.
///
/// Input and output membership is fixed at construction; only values change.
/// Locals grow through [`Program::add_local`].
pub struct Program<S> {
    slots: Arena<Slot>,
    names: NameTable,
    ins: PerKind<Vec<SlotId>>,
    outs: PerKind<Vec<SlotId>>,
    locals: PerKind<Vec<SlotId>>,
    sentinels: PerKind<SlotId>,
    pub block: Option<Block<S>>,
    pub status: Status,
}

impl<S> Program<S> {
    pub fn new(inputs: &[(Kind, &str)], outputs: &[(Kind, &str)]) -> Result<Self> {
        let mut slots = Arena::new();
        let mut names = NameTable::new();
        let sentinels = PerKind {
            ints: slots.alloc(Slot::new(Kind::Int, names.to_name("NOINTS"))),
            bools: slots.alloc(Slot::new(Kind::Bool, names.to_name("NOBOOLS"))),
        };
        let mut p = Program {
            slots,
            names,
            ins: PerKind::default(),
            outs: PerKind::default(),
            locals: PerKind::default(),
            sentinels,
            block: None,
            status: Status::NotStarted,
        };
        for &(kind, name) in inputs {
            let id = p.alloc_unique(kind, name, true)?;
            p.ins[kind].push(id);
        }
        for &(kind, name) in outputs {
            let id = p.alloc_unique(kind, name, false)?;
            p.outs[kind].push(id);
        }
        Ok(p)
    }

    fn alloc_unique(&mut self, kind: Kind, name: &str, input: bool) -> Result<SlotId> {
        let collection = if input { &self.ins } else { &self.outs };
        if collection[kind].iter().any(|id| self.name_of(*id) == name) {
            return Err(Error::DuplicateSlot {
                kind,
                name: name.to_string(),
            });
        }
        let name = self.names.to_name(name);
        Ok(self.slots.alloc(Slot::new(kind, name)))
    }

    /// Add a fresh local (`Li<n>` for ints, `Lb<n>` for bools).
    pub fn add_local(&mut self, kind: Kind) -> SlotId {
        let prefix = match kind {
            Kind::Int => "Li",
            Kind::Bool => "Lb",
        };
        let name = self.names.fresh(prefix);
        let id = self.slots.alloc(Slot::new(kind, name));
        self.locals[kind].push(id);
        id
    }

    /// Grow the local pool of `kind` to at least `count` slots.
    pub fn ensure_locals(&mut self, kind: Kind, count: usize) {
        while self.locals[kind].len() < count {
            self.add_local(kind);
        }
    }

    pub fn ins(&self, kind: Kind) -> &[SlotId] {
        &self.ins[kind]
    }

    pub fn outs(&self, kind: Kind) -> &[SlotId] {
        &self.outs[kind]
    }

    pub fn locals(&self, kind: Kind) -> &[SlotId] {
        &self.locals[kind]
    }

    /// The "no slot available" cell used when a program under-provisions `kind`.
    pub fn no_slot(&self, kind: Kind) -> SlotId {
        self.sentinels[kind]
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        &mut self.slots[id]
    }

    pub fn name_of(&self, id: SlotId) -> &str {
        self.names.from_name(self.slots[id].name)
    }

    pub fn all_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.iter().map(|(id, _)| id)
    }

    /// Reset every slot, sentinels included, to its kind's default.
    pub fn wipe(&mut self) {
        for (_, slot) in self.slots.iter_mut() {
            slot.reset();
        }
    }

    fn find(&self, ids: &[SlotId], kind: Kind, name: &str) -> Result<SlotId> {
        ids.iter()
            .copied()
            .find(|id| self.name_of(*id) == name)
            .ok_or_else(|| Error::UnknownSlot {
                kind,
                name: name.to_string(),
            })
    }

    pub fn set_input(&mut self, kind: Kind, name: &str, value: Value) -> Result<()> {
        let id = self.find(&self.ins[kind], kind, name)?;
        self.slots[id].set(value);
        Ok(())
    }

    pub fn get_output(&self, kind: Kind, name: &str) -> Result<Value> {
        let id = self.find(&self.outs[kind], kind, name)?;
        Ok(self.slots[id].get())
    }

    pub fn output_values(&self) -> PerKind<Vec<Value>> {
        self.outs
            .map(|_, ids| ids.iter().map(|id| self.slots[*id].get()).collect())
    }

    /// Overwrite the outputs with values reported by a finished run. Nothing
    /// is written unless every kind has exactly one value per output.
    pub fn load_outputs(&mut self, values: &PerKind<Vec<Value>>) -> Result<()> {
        for kind in Kind::ALL {
            if values[kind].len() != self.outs[kind].len() {
                return Err(Error::OutputArity {
                    kind,
                    expected: self.outs[kind].len(),
                    got: values[kind].len(),
                });
            }
        }
        for kind in Kind::ALL {
            for (id, value) in self.outs[kind].iter().zip(values[kind].iter()) {
                self.slots[*id].set(*value);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub kind: Kind,
    pub name: String,
    pub value: Value,
}

/// Everything a worker needs to run a candidate: every slot in allocation
/// order, the role lists as slot indices, and the AST in pre-order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Image<S> {
    pub slots: Vec<SlotRecord>,
    pub ins: PerKind<Vec<u32>>,
    pub outs: PerKind<Vec<u32>>,
    pub locals: PerKind<Vec<u32>>,
    pub sentinels: PerKind<u32>,
    pub nodes: Vec<Node<S>>,
}

impl<S: Copy> Program<S> {
    pub fn image(&self) -> Image<S> {
        let indices = |ids: &Vec<SlotId>| ids.iter().map(|id| slot_index(*id)).collect();
        Image {
            slots: self
                .slots
                .iter()
                .map(|(id, slot)| SlotRecord {
                    kind: slot.kind,
                    name: self.name_of(id).to_string(),
                    value: slot.value,
                })
                .collect(),
            ins: self.ins.map(|_, ids| indices(ids)),
            outs: self.outs.map(|_, ids| indices(ids)),
            locals: self.locals.map(|_, ids| indices(ids)),
            sentinels: self.sentinels.map(|_, id| slot_index(*id)),
            nodes: self.block.as_ref().map(Block::flatten).unwrap_or_default(),
        }
    }

    pub fn from_image(image: Image<S>) -> Result<Self> {
        let mut slots = Arena::new();
        let mut names = NameTable::new();
        for record in &image.slots {
            let mut slot = Slot::new(record.kind, names.to_name(&record.name));
            slot.set(record.value);
            slots.alloc(slot);
        }
        let n = image.slots.len() as u32;
        let check = |index: u32| {
            if index < n {
                Ok(slot_id(index))
            } else {
                Err(Error::MalformedTree(format!("slot index {} out of range", index)))
            }
        };
        let ids = |v: &Vec<u32>| v.iter().map(|i| check(*i)).collect::<Result<Vec<_>>>();
        let block = if image.nodes.is_empty() {
            None
        } else {
            let block = Block::unflatten(&image.nodes)?;
            block.try_for_each(&mut |b| match b.var {
                Some(id) => check(slot_index(id)).map(|_| ()),
                None => Ok(()),
            })?;
            Some(block)
        };
        Ok(Program {
            ins: PerKind {
                ints: ids(&image.ins.ints)?,
                bools: ids(&image.ins.bools)?,
            },
            outs: PerKind {
                ints: ids(&image.outs.ints)?,
                bools: ids(&image.outs.bools)?,
            },
            locals: PerKind {
                ints: ids(&image.locals.ints)?,
                bools: ids(&image.locals.bools)?,
            },
            sentinels: PerKind {
                ints: check(image.sentinels.ints)?,
                bools: check(image.sentinels.bools)?,
            },
            slots,
            names,
            block,
            status: Status::NotStarted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xy() -> Program<()> {
        Program::new(&[(Kind::Int, "X")], &[(Kind::Int, "Y"), (Kind::Bool, "B")]).unwrap()
    }

    #[test]
    fn inputs_and_outputs_by_name() {
        let mut p = xy();
        p.set_input(Kind::Int, "X", Value::Int(3)).unwrap();
        assert_eq!(p.slot(p.ins(Kind::Int)[0]).get(), Value::Int(3));
        assert_eq!(p.get_output(Kind::Bool, "B").unwrap(), Value::Bool(false));
        assert!(matches!(
            p.set_input(Kind::Int, "Y", Value::Int(1)),
            Err(Error::UnknownSlot { .. })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let p = Program::<()>::new(&[(Kind::Int, "X"), (Kind::Int, "X")], &[]);
        assert!(matches!(p, Err(Error::DuplicateSlot { .. })));
        // same name in different collections is fine
        assert!(Program::<()>::new(&[(Kind::Int, "X")], &[(Kind::Int, "X")]).is_ok());
    }

    #[test]
    fn locals_grow_with_fresh_names() {
        let mut p = xy();
        p.ensure_locals(Kind::Int, 2);
        p.ensure_locals(Kind::Bool, 1);
        p.ensure_locals(Kind::Int, 1);
        let names: Vec<&str> = p.locals(Kind::Int).iter().map(|id| p.name_of(*id)).collect();
        assert_eq!(names, vec!["Li0", "Li1"]);
        assert_eq!(p.name_of(p.locals(Kind::Bool)[0]), "Lb0");
    }

    #[test]
    fn wipe_resets_every_slot() {
        let mut p = xy();
        let local = p.add_local(Kind::Int);
        p.slot_mut(local).set(Value::Int(5));
        p.set_input(Kind::Int, "X", Value::Int(7)).unwrap();
        let sentinel = p.no_slot(Kind::Bool);
        p.slot_mut(sentinel).set(Value::Bool(true));
        p.wipe();
        assert!(p.all_slots().all(|id| p.slot(id).get() == p.slot(id).kind().default_value()));
    }

    #[test]
    fn set_coerces_to_slot_kind() {
        let mut p = xy();
        let b = p.outs(Kind::Bool)[0];
        p.slot_mut(b).set(Value::Int(2));
        assert_eq!(p.slot(b).get(), Value::Bool(true));
    }

    #[test]
    fn load_outputs_checks_arity() {
        let mut p = xy();
        let ok = PerKind {
            ints: vec![Value::Int(9)],
            bools: vec![Value::Bool(true)],
        };
        p.load_outputs(&ok).unwrap();
        assert_eq!(p.output_values(), ok);
        let short = PerKind {
            ints: vec![],
            bools: vec![Value::Bool(true)],
        };
        assert!(p.load_outputs(&short).is_err());
    }

    #[test]
    fn rejected_outputs_leave_every_slot_untouched() {
        let mut p = xy();
        let missing_bool = PerKind {
            ints: vec![Value::Int(42)],
            bools: vec![],
        };
        assert_eq!(
            p.load_outputs(&missing_bool),
            Err(Error::OutputArity {
                kind: Kind::Bool,
                expected: 1,
                got: 0
            })
        );
        assert_eq!(p.get_output(Kind::Int, "Y").unwrap(), Value::Int(0));
        assert_eq!(p.get_output(Kind::Bool, "B").unwrap(), Value::Bool(false));
    }

    #[test]
    fn image_restores_slots_and_roles() {
        let mut p = xy();
        p.add_local(Kind::Bool);
        p.set_input(Kind::Int, "X", Value::Int(4)).unwrap();
        let q = Program::<()>::from_image(p.image()).unwrap();
        assert_eq!(q.name_of(q.locals(Kind::Bool)[0]), "Lb0");
        assert_eq!(q.slot(q.ins(Kind::Int)[0]).get(), Value::Int(4));
        assert_eq!(q.name_of(q.no_slot(Kind::Int)), "NOINTS");
        assert_eq!(q.outs(Kind::Bool).len(), 1);
    }
}
