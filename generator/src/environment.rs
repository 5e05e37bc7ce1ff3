use crate::program::{Kind, Program, SlotId};

/// Which slots a variable placeholder may stand for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Locals only.
    Local,
    /// Inputs and outputs.
    Window,
    /// Anything assignable: locals and outputs.
    Lvalue,
}

/// Read-only view of the slots a program exposes to the binder.
pub struct Environment<'p, S> {
    program: &'p Program<S>,
}

impl<'p, S> Environment<'p, S> {
    pub fn new(program: &'p Program<S>) -> Self {
        Self { program }
    }

    pub fn enumerate_locals(&self, kind: Kind) -> Vec<SlotId> {
        self.program.locals(kind).to_vec()
    }

    pub fn enumerate_windows(&self, kind: Kind) -> Vec<SlotId> {
        let p = self.program;
        p.ins(kind).iter().chain(p.outs(kind)).copied().collect()
    }

    pub fn enumerate_lvalues(&self, kind: Kind) -> Vec<SlotId> {
        let p = self.program;
        p.locals(kind).iter().chain(p.outs(kind)).copied().collect()
    }

    pub fn options(&self, kind: Kind, role: Role) -> Vec<SlotId> {
        match role {
            Role::Local => self.enumerate_locals(kind),
            Role::Window => self.enumerate_windows(kind),
            Role::Lvalue => self.enumerate_lvalues(kind),
        }
    }

    pub fn sentinel(&self, kind: Kind) -> SlotId {
        self.program.no_slot(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_select_collections() {
        let mut p = Program::<()>::new(&[(Kind::Int, "X")], &[(Kind::Int, "Y")]).unwrap();
        let li = p.add_local(Kind::Int);
        let x = p.ins(Kind::Int)[0];
        let y = p.outs(Kind::Int)[0];
        let env = Environment::new(&p);
        assert_eq!(env.options(Kind::Int, Role::Local), vec![li]);
        assert_eq!(env.options(Kind::Int, Role::Window), vec![x, y]);
        assert_eq!(env.options(Kind::Int, Role::Lvalue), vec![li, y]);
        assert!(env.options(Kind::Bool, Role::Window).is_empty());
        assert_eq!(p.name_of(env.sentinel(Kind::Bool)), "NOBOOLS");
    }
}
