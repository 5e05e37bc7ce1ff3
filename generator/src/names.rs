use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(usize);

/// Interned slot names, one table per `Program`.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    names: Vec<String>,
    string_to_name: HashMap<String, Name>,
    counters: HashMap<String, usize>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, s: String) -> Name {
        let i = self.names.len();
        self.string_to_name.insert(s.clone(), Name(i));
        self.names.push(s);
        Name(i)
    }

    pub fn to_name(&mut self, s: &str) -> Name {
        match self.lookup(s) {
            Some(n) => n,
            None => self.insert(String::from(s)),
        }
    }

    pub fn from_name(&self, name: Name) -> &str {
        &self.names[name.0]
    }

    pub fn lookup(&self, s: &str) -> Option<Name> {
        self.string_to_name.get(s).copied()
    }

    /// Allocate `<prefix><n>` with the smallest `n` for that prefix not yet
    /// handed out by this table.
    pub fn fresh(&mut self, prefix: &str) -> Name {
        loop {
            let counter = self.counters.entry(prefix.to_string()).or_insert(0);
            let candidate = format!("{}{}", prefix, counter);
            *counter += 1;
            if self.lookup(&candidate).is_none() {
                return self.insert(candidate);
            }
        }
    }
}
