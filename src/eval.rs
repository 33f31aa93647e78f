use failure::Error;

use crate::builtins::arguments;
use crate::env::ScopeId;
use crate::errors::RunError;
use crate::log;
use crate::patterns::{Binding, Pattern};
use crate::syntax::Node;
use crate::values::Value;
use crate::Interpreter;

impl Interpreter {
    /// evaluate a node in `scope`
    pub fn eval(&mut self, node: &Node, scope: ScopeId) -> Result<Value, Error> {
        let max_depth = self.config().max_depth;
        if self.depth >= max_depth {
            return Err(RunError::RecursionLimit(max_depth).into());
        }

        self.depth += 1;
        let result = self.eval_node(node, scope);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, node: &Node, scope: ScopeId) -> Result<Value, Error> {
        match node {
            Node::Nil => Ok(Value::Nil),
            Node::Numeric(n) => Ok(Value::Integer(*n)),
            Node::Symbol(symbol) => Ok(Value::Symbol(symbol.clone())),
            Node::Value(_, value) => Ok(value.clone()),
            Node::Identifier(name) => self.scopes().get(scope, name),

            // a literal spine: every car and the final cdr are evaluated
            Node::Pair(_) => {
                let (items, tail) = node.elements();
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, scope)?);
                }
                let tail = self.eval(tail, scope)?;
                Ok(values
                    .into_iter()
                    .rev()
                    .fold(tail, |cdr, car| Value::cons(car, cdr)))
            }

            Node::Form(cell) => {
                let callee = self.eval(&cell.car, scope)?;
                self.call(&callee, &cell.cdr, scope)
            }
        }
    }

    /// call `callee` with the unevaluated argument list `arg`, which belongs
    /// to the caller's `scope`
    pub fn call(&mut self, callee: &Value, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
        if log::debug_enabled() {
            log::debug(format!("calling {} with {}", callee, arg));
        }

        match callee {
            Value::Builtin(builtin) => builtin.call(self, arg, scope),

            Value::Curried(curried) => {
                let args = Node::quote_onto(&curried.args, Some(arg.clone()));
                self.call(&curried.function, &args, scope)
            }

            Value::Function(function) => function.invoke(self, arg, scope, None),
            Value::Method(_) => Err(RunError::UnboundMethod.into()),
            Value::BoundMethod(bound) => bound.method.invoke(self, arg, scope, Some(&bound.receiver)),
            Value::MultiFunction(multi) => multi.invoke(self, arg, scope),
            Value::Pattern(pattern) => self.call_pattern(pattern, arg, scope),

            // composition: (f:g x) is (f (g x))
            Value::Pair(cell) => {
                let inner = self.call(&cell.cdr, arg, scope)?;
                let args = Node::quote(&Value::list(vec![inner]));
                self.call(&cell.car, &args, scope)
            }

            other => Err(RunError::UncallableValue {
                name: other.to_string(),
                typename: other.get_type(),
            }.into()),
        }
    }

    /// a pattern called with one argument binds outwards from `scope`;
    /// called with none, it is matched against the missing value
    fn call_pattern(&mut self, pattern: &Pattern, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
        let target = match arg {
            Node::Nil => None,
            _ => {
                let args = arguments("pattern", arg, 1)?;
                Some(self.eval(args[0], scope)?)
            }
        };

        if pattern.matches(self, target.as_ref(), scope, Binding::Outward)? {
            Ok(Value::Bool(true))
        } else {
            Err(RunError::PatternMismatch.into())
        }
    }
}

// }}}
