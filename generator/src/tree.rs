use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grammar::Symbol;
use crate::program::{slot_id, slot_index, SlotId};

/// A node of a derived program: the grammar symbol, its children in
/// production order, and the slot bound to it if it is a variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block<S> {
    pub symbol: S,
    pub children: Vec<Block<S>>,
    pub var: Option<SlotId>,
}

impl<S> Block<S> {
    pub fn new(symbol: S, children: Vec<Block<S>>) -> Self {
        Self {
            symbol,
            children,
            var: None,
        }
    }

    pub fn leaf(symbol: S) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn bound(symbol: S, var: SlotId) -> Self {
        Self {
            symbol,
            children: Vec::new(),
            var: Some(var),
        }
    }

    /// Number of nodes in the tree.
    pub fn length(&self) -> usize {
        1 + self.children.iter().map(Block::length).sum::<usize>()
    }

    /// Pre-order visit that stops at the first error.
    pub fn try_for_each<E>(
        &self,
        f: &mut impl FnMut(&Block<S>) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        f(self)?;
        for c in self.children.iter() {
            c.try_for_each(f)?;
        }
        Ok(())
    }
}

impl<S: Symbol> Block<S> {
    /// Compact rendering, `SEQ(PASS,GETS(...),)`. `sugar` may replace the
    /// rendering of a node (variable nodes usually render as slot names).
    pub fn render(&self, sugar: &dyn Fn(&Block<S>) -> Option<String>) -> String {
        if let Some(s) = sugar(self) {
            return s;
        }
        let mut out = String::from(self.symbol.name());
        if !self.children.is_empty() {
            out.push('(');
            for c in self.children.iter() {
                out.push_str(&c.render(sugar));
                out.push(',');
            }
            out.push(')');
        }
        out
    }
}

/// A pre-order wire record; `arity` children follow the node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node<S> {
    pub symbol: S,
    pub arity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<u32>,
}

impl<S: Copy> Block<S> {
    /// Flatten without recursion so arbitrarily deep trees survive encoding.
    pub fn flatten(&self) -> Vec<Node<S>> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(b) = stack.pop() {
            nodes.push(Node {
                symbol: b.symbol,
                arity: b.children.len(),
                var: b.var.map(slot_index),
            });
            stack.extend(b.children.iter().rev());
        }
        nodes
    }

    pub fn unflatten(nodes: &[Node<S>]) -> Result<Block<S>> {
        // (block under construction, children still expected)
        let mut open: Vec<(Block<S>, usize)> = Vec::new();
        let mut done: Option<Block<S>> = None;
        for node in nodes {
            if done.is_some() {
                return Err(Error::MalformedTree("trailing nodes after root".into()));
            }
            let mut block = Block::new(node.symbol, Vec::with_capacity(node.arity));
            block.var = node.var.map(slot_id);
            open.push((block, node.arity));
            // close every block whose children are all present
            while matches!(open.last(), Some((_, 0))) {
                let Some((finished, _)) = open.pop() else { break };
                match open.last_mut() {
                    Some((parent, remaining)) => {
                        parent.children.push(finished);
                        *remaining -= 1;
                    }
                    None => done = Some(finished),
                }
            }
        }
        done.ok_or_else(|| Error::MalformedTree("truncated node list".into()))
    }
}
