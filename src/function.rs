use failure::Error;
use std::rc::Rc;

use crate::env::ScopeId;
use crate::errors::RunError;
use crate::log;
use crate::patterns::{Binding, Pattern};
use crate::syntax::Node;
use crate::values::Value;
use crate::{Interpreter, MultiFunctionPolicy};

/// a user-defined function: a pattern over the evaluated argument list,
/// a body, and the frame it closes over
#[derive(Debug)]
pub struct Function {
    pub pattern: Rc<Pattern>,
    pub body: Vec<Node>,
    pub scope: ScopeId,
}

/// a method together with the object it was read from
#[derive(Debug)]
pub struct BoundMethod {
    pub method: Rc<Function>,
    pub receiver: Value,
}

/// alternatives tried in order until one accepts the arguments
#[derive(Debug)]
pub struct MultiFunction {
    pub alternatives: Vec<Rc<Function>>,
}

/// a callable with some arguments already supplied
#[derive(Debug)]
pub struct Curried {
    pub function: Value,
    pub args: Value,
}

fn body_nodes(body: &Node) -> Result<Vec<Node>, Error> {
    let (items, tail) = body.elements();
    match tail {
        Node::Nil => Ok(items.into_iter().cloned().collect()),
        _ => Err(RunError::ProcError {
            name: "fn".to_owned(),
            msg: "a function body must be a proper list".to_owned(),
        }.into()),
    }
}

impl Function {
    /// `(fn pattern body...)`: the pattern is built now, in `scope`
    pub fn new(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Function, Error> {
        match arg.split() {
            Some((pattern, body)) => Function::from_parts(interp, pattern, body, scope),
            None => Err(RunError::ProcError {
                name: "fn".to_owned(),
                msg: "expected a pattern".to_owned(),
            }.into()),
        }
    }

    pub fn from_parts(
        interp: &mut Interpreter,
        pattern: &Node,
        body: &Node,
        scope: ScopeId,
    ) -> Result<Function, Error> {
        let function = Function {
            pattern: Rc::new(Pattern::build(interp, pattern, scope)?),
            body: body_nodes(body)?,
            scope,
        };
        interp.scopes_mut().capture(scope);
        Ok(function)
    }

    /// `#(head args...)`: the contents form a single body form over the
    /// default-arguments pattern
    pub fn shorthand(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Function {
        let body = match arg.split() {
            Some((head, rest)) => vec![Node::form(head.clone(), rest.clone())],
            None => Vec::new(),
        };
        interp.scopes_mut().capture(scope);
        Function {
            pattern: Rc::new(Pattern::DefaultArguments),
            body,
            scope,
        }
    }

    /// evaluate `arg` in the caller's `scope` and match it in a fresh frame
    /// below the closure; `None` when the pattern rejects it, in which case
    /// the frame is already released
    pub fn bind(
        &self,
        interp: &mut Interpreter,
        arg: &Node,
        scope: ScopeId,
        receiver: Option<&Value>,
    ) -> Result<Option<ScopeId>, Error> {
        let target = interp.eval(arg, scope)?;
        let frame = interp.scopes_mut().child(self.scope);
        if let Some(receiver) = receiver {
            interp.scopes_mut().set(frame, "this", receiver.clone());
        }
        match self.pattern.matches(interp, Some(&target), frame, Binding::Local) {
            Ok(true) => Ok(Some(frame)),
            Ok(false) => {
                interp.scopes_mut().release(frame);
                Ok(None)
            }
            Err(err) => {
                interp.scopes_mut().release(frame);
                Err(err)
            }
        }
    }

    /// run the body in a frame prepared by `bind`, then release the frame
    /// unless something in the body captured it
    pub fn run(&self, interp: &mut Interpreter, frame: ScopeId) -> Result<Value, Error> {
        let result = self.run_body(interp, frame);
        interp.scopes_mut().release(frame);
        result
    }

    /// `-` holds the value of the previous body form. an empty body gives void
    fn run_body(&self, interp: &mut Interpreter, frame: ScopeId) -> Result<Value, Error> {
        if !interp.scopes().has(frame, "-") {
            interp.scopes_mut().set(frame, "-", Value::Void);
        }
        let mut result = Value::Void;
        for node in &self.body {
            result = interp.eval(node, frame)?;
            interp.scopes_mut().set(frame, "-", result.clone());
        }
        Ok(result)
    }

    pub fn invoke(
        &self,
        interp: &mut Interpreter,
        arg: &Node,
        scope: ScopeId,
        receiver: Option<&Value>,
    ) -> Result<Value, Error> {
        match self.bind(interp, arg, scope, receiver)? {
            Some(frame) => self.run(interp, frame),
            None => Err(RunError::PatternMismatch.into()),
        }
    }
}

impl MultiFunction {
    pub fn invoke(&self, interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
        // evaluate once; every alternative sees the same arguments
        let args = Node::Value("_arg", interp.eval(arg, scope)?);

        match interp.config().multi_function {
            MultiFunctionPolicy::CatchAll => {
                for (i, alternative) in self.alternatives.iter().enumerate() {
                    match alternative.invoke(interp, &args, scope, None) {
                        Ok(value) => return Ok(value),
                        Err(err) => log::debug(format!("alternative {} failed: {}", i, err)),
                    }
                }
            }
            MultiFunctionPolicy::PatternOnly => {
                for alternative in &self.alternatives {
                    if let Some(frame) = alternative.bind(interp, &args, scope, None)? {
                        return alternative.run(interp, frame);
                    }
                }
            }
        }

        Err(RunError::NoPatternMatched.into())
    }
}

impl BoundMethod {
    pub fn new(method: Rc<Function>, receiver: Value) -> BoundMethod {
        BoundMethod { method, receiver }
    }
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::is_mismatch;
    use crate::parser::read;
    use crate::Config;

    fn node(code: &str) -> Node {
        read(code).unwrap().remove(0)
    }

    /// the argument spine `(fn ...)` would receive
    fn spine(code: &str) -> Node {
        Node::spine(read(code).unwrap(), Node::Nil)
    }

    #[test]
    fn functions_match_their_arguments() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let f = Function::new(&mut interp, &spine("[a b] (add a b)"), root).unwrap();

        let result = f.invoke(&mut interp, &node("[1 2]"), root, None).unwrap();
        assert_eq!(Value::Integer(3), result);

        let err = f.invoke(&mut interp, &node("[1]"), root, None).unwrap_err();
        assert!(is_mismatch(&err));
    }

    #[test]
    fn empty_bodies_return_void() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let f = Function::new(&mut interp, &spine("x"), root).unwrap();
        assert_eq!(Value::Void, f.invoke(&mut interp, &Node::Nil, root, None).unwrap());
    }

    #[test]
    fn hyphen_defaults_to_void() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let f = Function::new(&mut interp, &spine("[] -"), root).unwrap();
        assert_eq!(Value::Void, f.invoke(&mut interp, &Node::Nil, root, None).unwrap());
    }

    #[test]
    fn hyphen_follows_the_body() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let f = Function::new(&mut interp, &spine("[] 2 (add - 1) (add - -)"), root).unwrap();
        assert_eq!(Value::Integer(6), f.invoke(&mut interp, &Node::Nil, root, None).unwrap());
    }

    #[test]
    fn call_frames_are_released() {
        let mut interp = Interpreter::new();
        interp.run("(f = (fn [x] (add x 1))) (g = (mfn ([a b] a) ([a] a)))").unwrap();
        let live = interp.scopes().live();
        for _ in 0..1000 {
            interp.run("(f 1) (g 2) ((fn [y] y) 3) (match? (pattern [z]) [4])").unwrap();
            assert!(interp.run("(f nil)").is_err());
        }
        // the anonymous function literal captured the root, nothing else
        assert_eq!(live, interp.scopes().live());
    }

    #[test]
    fn captured_frames_survive_the_call() {
        let mut interp = Interpreter::new();
        interp.run("(make-adder = (fn [n] (fn [x] (add x n))))").unwrap();
        interp.run("(add5 = (make-adder 5)) (later = ((fn [v] (delay v)) 7))").unwrap();
        let live = interp.scopes().live();
        for _ in 0..100 {
            interp.run("(make-adder 1) ((fn [q] q) 1)").unwrap();
        }
        assert_eq!(Value::Integer(6), interp.run("(add5 1)").unwrap());
        assert_eq!(Value::Integer(7), interp.run("(force later)").unwrap());
        // each discarded adder keeps its own frame
        assert_eq!(live + 100, interp.scopes().live());
    }

    #[test]
    fn receivers_are_bound_to_this() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let f = Function::new(&mut interp, &spine("[] this"), root).unwrap();
        let receiver = Value::Integer(7);
        assert_eq!(receiver, f.invoke(&mut interp, &Node::Nil, root, Some(&receiver)).unwrap());
    }

    #[test]
    fn strict_multi_functions_propagate_body_errors() {
        let code = "(mfn ([x] (car x)) ([x] x))";

        let mut lenient = Interpreter::new();
        assert_eq!(Value::Integer(1), lenient.run(&format!("({} 1)", code)).unwrap());

        let mut strict = Interpreter::with_config(Config {
            multi_function: MultiFunctionPolicy::PatternOnly,
            ..Config::default()
        });
        assert!(strict.run(&format!("({} 1)", code)).is_err());
    }
}
// }}}
