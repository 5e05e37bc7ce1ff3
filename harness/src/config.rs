use anyhow::{anyhow, Context, Result};
use cfg_synth::{Kind, Program, Value, DEFAULT_MAX_DEPTH};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::run::time_limit;
use crate::search::{Example, Strategy};

/// Knobs of one search run. Every field may be omitted from the session file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Candidates to try before giving up
    pub attempts: usize,
    /// Seconds a single example run may take
    pub timeout: f64,
    pub int_locals: usize,
    pub bool_locals: usize,
    pub strategy: Strategy,
    /// Recursion budget shared by the samplers and the interpreter
    pub max_depth: usize,
    /// Fixed seed for reproducible candidate streams
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            attempts: 1000,
            timeout: 1.0,
            int_locals: 1,
            bool_locals: 1,
            strategy: Strategy::SolomonoffFunction,
            max_depth: DEFAULT_MAX_DEPTH,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    pub kind: Kind,
}

impl SlotSpec {
    fn pair(&self) -> (Kind, &str) {
        (self.kind, &self.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramSpec {
    #[serde(default)]
    pub inputs: Vec<SlotSpec>,
    #[serde(default)]
    pub outputs: Vec<SlotSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExampleSpec {
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Value>,
}

/// A synthesis session: the program signature, the examples it must
/// satisfy and how hard to look.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub search: SearchConfig,
    pub program: ProgramSpec,
    #[serde(default)]
    pub examples: Vec<ExampleSpec>,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        // check the path first so a missing file doesn't read as a parse error
        if !path.exists() {
            return Err(anyhow!("Session file {} doesn't exist.", path.display()));
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text).with_context(|| format!("Unable to parse {}.", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let session: Self = toml::from_str(text)?;
        time_limit(session.search.timeout)?;
        Ok(session)
    }

    /// A fresh program with the session's inputs and outputs.
    pub fn program<S>(&self) -> Result<Program<S>> {
        let ins: Vec<(Kind, &str)> = self.program.inputs.iter().map(SlotSpec::pair).collect();
        let outs: Vec<(Kind, &str)> = self.program.outputs.iter().map(SlotSpec::pair).collect();
        Ok(Program::new(&ins, &outs)?)
    }

    /// Examples with every name resolved against the program signature.
    pub fn examples(&self) -> Result<Vec<Example>> {
        let resolve = |specs: &[SlotSpec], values: &BTreeMap<String, Value>, what: &str| {
            values
                .iter()
                .map(|(name, value)| -> Result<(Kind, String, Value)> {
                    let spec = specs
                        .iter()
                        .find(|s| &s.name == name)
                        .ok_or_else(|| anyhow!("Example names unknown {} {:?}.", what, name))?;
                    if value.kind() != spec.kind {
                        return Err(anyhow!(
                            "Example gives {} {:?} a {} value, expected {}.",
                            what,
                            name,
                            value.kind(),
                            spec.kind
                        ));
                    }
                    Ok((spec.kind, name.clone(), *value))
                })
                .collect::<Result<Vec<_>>>()
        };
        self.examples
            .iter()
            .map(|e| -> Result<Example> {
                let example = Example {
                    inputs: resolve(&self.program.inputs, &e.inputs, "input")?,
                    outputs: resolve(&self.program.outputs, &e.outputs, "output")?,
                };
                if example.outputs.len() != self.program.outputs.len() {
                    return Err(anyhow!("Every example must give a value for every output."));
                }
                Ok(example)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"
[search]
attempts = 50
strategy = "random-function"
seed = 3

[program]
inputs = [{ name = "X", kind = "int" }]
outputs = [{ name = "Y", kind = "int" }, { name = "B", kind = "bool" }]

[[examples]]
inputs = { X = 3 }
outputs = { Y = 9, B = true }

[[examples]]
inputs = { X = 0 }
outputs = { Y = 0, B = false }
"#;

    #[test]
    fn parses_a_session() {
        let s = Session::from_toml(SQUARE).unwrap();
        assert_eq!(s.search.attempts, 50);
        assert_eq!(s.search.strategy, Strategy::RandomFunction);
        assert_eq!(s.search.seed, Some(3));
        // unspecified knobs keep their defaults
        assert_eq!(s.search.timeout, 1.0);
        assert_eq!(s.search.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(s.program.outputs[1].kind, Kind::Bool);

        let examples = s.examples().unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].inputs, vec![(Kind::Int, "X".to_string(), Value::Int(3))]);
        assert!(examples[0]
            .outputs
            .contains(&(Kind::Bool, "B".to_string(), Value::Bool(true))));

        let p = s.program::<()>().unwrap();
        assert_eq!(p.ins(Kind::Int).len(), 1);
        assert_eq!(p.outs(Kind::Bool).len(), 1);
    }

    #[test]
    fn search_section_is_optional() {
        let s = Session::from_toml("[program]\noutputs = [{ name = \"Y\", kind = \"int\" }]\n").unwrap();
        assert_eq!(s.search, SearchConfig::default());
        assert!(s.examples().unwrap().is_empty());
    }

    #[test]
    fn examples_must_match_the_signature() {
        let mut s = Session::from_toml(SQUARE).unwrap();
        s.examples[0].inputs.insert("Q".to_string(), Value::Int(1));
        assert!(s.examples().is_err());

        let mut s = Session::from_toml(SQUARE).unwrap();
        s.examples[1].outputs.insert("Y".to_string(), Value::Bool(true));
        assert!(s.examples().is_err());

        let mut s = Session::from_toml(SQUARE).unwrap();
        s.examples[1].outputs.remove("B");
        assert!(s.examples().is_err());
    }

    #[test]
    fn non_positive_timeouts_are_rejected() {
        let text = SQUARE.replace("seed = 3", "seed = 3\ntimeout = -1.0");
        assert!(Session::from_toml(&text).is_err());
        let text = SQUARE.replace("seed = 3", "seed = 3\ntimeout = 0.0");
        assert!(Session::from_toml(&text).is_err());
    }

    #[test]
    fn unknown_strategies_are_rejected() {
        let text = SQUARE.replace("random-function", "exhaustive");
        assert!(Session::from_toml(&text).is_err());
    }
}
