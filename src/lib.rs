#[macro_use]
extern crate failure_derive;

pub mod builtins;
pub mod env;
pub mod errors;
mod eval;
pub mod expand;
mod file;
pub mod function;
pub mod log;
pub mod objects;
pub mod parser;
pub mod patterns;
pub mod syntax;
pub mod values;

use failure::Error;

pub use crate::env::{ScopeId, Scopes};
pub use crate::errors::{is_mismatch, ParseError, RunError};
pub use crate::parser::{lex, read};
pub use crate::patterns::{Binding, Pattern};
pub use crate::syntax::Node;
pub use crate::values::Value;

/// how a multi-function treats an alternative that fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiFunctionPolicy {
    /// any error moves on to the next alternative
    CatchAll,
    /// only a rejected pattern moves on; errors from a body propagate
    PatternOnly,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// how deeply evaluation may nest before it fails
    pub max_depth: usize,
    pub multi_function: MultiFunctionPolicy,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_depth: 512,
            multi_function: MultiFunctionPolicy::CatchAll,
        }
    }
}

pub struct Interpreter {
    scopes: Scopes,
    config: Config,
    depth: usize,
}

impl Interpreter {
    /// create a new Interpreter with the builtins bound in its root frame
    pub fn new() -> Interpreter {
        Interpreter::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Interpreter {
        let mut scopes = Scopes::new();
        let root = scopes.root();
        builtins::install(&mut scopes, root);
        Interpreter {
            scopes,
            config,
            depth: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> ScopeId {
        self.scopes.root()
    }

    pub fn scopes(&self) -> &Scopes {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut Scopes {
        &mut self.scopes
    }

    /// evaluate a string of ish code in the root frame, returning the value
    /// of its last top-level form (nil when there is none)
    pub fn run(&mut self, code: &str) -> Result<Value, Error> {
        let root = self.root();
        self.run_in(code, root)
    }

    /// like `run`, in some other frame
    pub fn run_in(&mut self, code: &str, scope: ScopeId) -> Result<Value, Error> {
        let nodes = read(code)?;
        log::debug(format!("read {} top-level forms", nodes.len()));

        let mut result = Value::Nil;
        for node in &nodes {
            result = self.eval(node, scope)?;
        }
        Ok(result)
    }
}

impl Default for Interpreter {
    fn default() -> Interpreter {
        Interpreter::new()
    }
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_programs_give_nil() {
        assert_eq!(Value::Nil, Interpreter::new().run("").unwrap());
        assert_eq!(Value::Nil, Interpreter::new().run("; just a comment").unwrap());
    }

    #[test]
    fn state_persists_between_runs() {
        let mut interp = Interpreter::new();
        interp.run("(def x 41)").unwrap();
        assert_eq!(Value::Integer(42), interp.run("(add x 1)").unwrap());
    }

    #[test]
    fn runs_in_a_child_frame_stay_local() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let child = interp.scopes_mut().child(root);
        interp.run_in("(def y 1)", child).unwrap();
        assert!(interp.scopes().has(child, "y"));
        assert!(interp.run("y").is_err());
    }
}
// }}}
