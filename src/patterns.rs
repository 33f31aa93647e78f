use failure::Error;
use itertools::join;
use std::fmt;
use std::rc::Rc;

use crate::builtins::{arguments, Builtin};
use crate::env::ScopeId;
use crate::errors::RunError;
use crate::syntax::Node;
use crate::values::Value;
use crate::Interpreter;

/// the name a default-arguments pattern binds the whole argument list to
pub const ARGUMENTS: &str = "arguments";

/// A destructuring pattern. Matching either succeeds and binds names in
/// the frame it was given, or fails; a failed match may leave some
/// bindings behind.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// binds the target to a name
    Identifier(String),
    /// succeeds when the target equals the value
    Value(Value),
    /// destructures a chain of pairs: one pattern per car, then the
    /// pattern for what is left. The tail is never itself a `Cons`, so
    /// long list patterns stay flat
    Cons(Vec<Pattern>, Box<Pattern>),
    /// the base pattern must match and the predicate must return `true`
    Predicated(Box<Pattern>, Value),
    /// the base pattern, matched against the default when the target is
    /// missing or rejected
    Defaulted(Box<Pattern>, Value),
    /// both patterns must match the same target
    Aliased(Box<Pattern>, Box<Pattern>),
    /// binds `arguments`, `-1`, `-2`, ... and `-`
    DefaultArguments,
}

/// where a successful match puts its bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// in the frame being matched into
    Local,
    /// over the nearest enclosing binding, or at the root
    Outward,
}

impl Binding {
    fn bind(self, interp: &mut Interpreter, scope: ScopeId, name: &str, value: Value) {
        match self {
            Binding::Local => interp.scopes_mut().set(scope, name, value),
            Binding::Outward => {
                interp.scopes_mut().set_recursive(scope, name, value);
            }
        }
    }
}

impl Pattern {
    /// build a pattern out of a syntax node, evaluating whatever is not
    /// pattern syntax into a value pattern
    pub fn build(interp: &mut Interpreter, node: &Node, scope: ScopeId) -> Result<Pattern, Error> {
        match node {
            Node::Identifier(name) => Ok(Pattern::Identifier(name.to_string())),
            Node::Nil => Ok(Pattern::Value(Value::Nil)),
            Node::Value(_, Value::Pattern(p)) => Ok((**p).clone()),
            Node::Pair(_) => Pattern::build_list(interp, node, scope),
            Node::Form(cell) => {
                let head = interp.eval(&cell.car, scope)?;
                match head {
                    Value::Builtin(Builtin::Cons) => {
                        let args = arguments("cons", &cell.cdr, 2)?;
                        let car = Pattern::build(interp, args[0], scope)?;
                        let cdr = Pattern::build(interp, args[1], scope)?;
                        Ok(Pattern::chain(vec![car], cdr))
                    }
                    Value::Builtin(Builtin::List) => Pattern::build_list(interp, &cell.cdr, scope),
                    Value::Builtin(Builtin::Pattern) => Pattern::from_args(interp, &cell.cdr, scope),
                    Value::Builtin(Builtin::PatternWithPredicate) => Pattern::with_predicate(interp, &cell.cdr, scope),
                    Value::Builtin(Builtin::PatternWithDefault) => Pattern::with_default(interp, &cell.cdr, scope),
                    Value::Builtin(Builtin::PatternAlias) => Pattern::aliased(interp, &cell.cdr, scope),
                    head => Ok(Pattern::Value(interp.call(&head, &cell.cdr, scope)?)),
                }
            }
            _ => Ok(Pattern::Value(interp.eval(node, scope)?)),
        }
    }

    /// a list pattern: one cons pattern per element, ending in the pattern
    /// for the explicit cdr (or nil)
    fn build_list(interp: &mut Interpreter, spine: &Node, scope: ScopeId) -> Result<Pattern, Error> {
        let (items, tail) = spine.elements();
        if items.is_empty() {
            return match tail {
                Node::Nil => Ok(Pattern::Value(Value::Nil)),
                _ => Err(RunError::ProcError {
                    name: "list".to_owned(),
                    msg: "cannot have a cdr without a car".to_owned(),
                }.into()),
            };
        }

        let mut cars = Vec::with_capacity(items.len());
        for item in items {
            cars.push(Pattern::build(interp, item, scope)?);
        }
        let tail = Pattern::build(interp, tail, scope)?;
        Ok(Pattern::chain(cars, tail))
    }

    /// `cars` consed onto `tail`, merged into `tail` when it is a chain too
    pub fn chain(mut cars: Vec<Pattern>, tail: Pattern) -> Pattern {
        if cars.is_empty() {
            return tail;
        }
        match tail {
            Pattern::Cons(more, tail) => {
                cars.extend(more);
                Pattern::Cons(cars, tail)
            }
            tail => Pattern::Cons(cars, Box::new(tail)),
        }
    }

    /// `(pattern x)`; `(pattern)` is the nil pattern
    pub fn from_args(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Pattern, Error> {
        match arg {
            Node::Nil => Ok(Pattern::Value(Value::Nil)),
            _ => {
                let args = arguments("pattern", arg, 1)?;
                Pattern::build(interp, args[0], scope)
            }
        }
    }

    /// `(pattern-with-predicate base predicate)`, also `base::predicate`
    pub fn with_predicate(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Pattern, Error> {
        let args = arguments("pattern-with-predicate", arg, 2)?;
        let base = Pattern::build(interp, args[0], scope)?;
        if let Pattern::Defaulted(..) = base {
            return Err(RunError::ProcError {
                name: "pattern-with-predicate".to_owned(),
                msg: "cannot attach a predicate to a pattern with a default".to_owned(),
            }.into());
        }
        let predicate = interp.eval(args[1], scope)?;
        if !predicate.is_callable() {
            return Err(RunError::TypeError {
                name: "pattern-with-predicate".to_owned(),
                expected: "callable".to_owned(),
                got: predicate.get_type(),
            }.into());
        }
        Ok(Pattern::Predicated(Box::new(base), predicate))
    }

    /// `(pattern-with-default base default)`, also `base = default`
    pub fn with_default(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Pattern, Error> {
        let args = arguments("pattern-with-default", arg, 2)?;
        let base = Pattern::build(interp, args[0], scope)?;
        let default = interp.eval(args[1], scope)?;
        Ok(Pattern::Defaulted(Box::new(base), default))
    }

    /// `(pattern-alias a b)`, also `a/b`
    pub fn aliased(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Pattern, Error> {
        let args = arguments("pattern-alias", arg, 2)?;
        let first = Pattern::build(interp, args[0], scope)?;
        let second = Pattern::build(interp, args[1], scope)?;
        Ok(Pattern::Aliased(Box::new(first), Box::new(second)))
    }

    /// Match `target` against this pattern. `None` is the missing target: the
    /// car of an exhausted argument list. Only patterns that carry a default
    /// somewhere can succeed on it.
    pub fn matches(
        &self,
        interp: &mut Interpreter,
        target: Option<&Value>,
        scope: ScopeId,
        binding: Binding,
    ) -> Result<bool, Error> {
        match self {
            Pattern::Identifier(name) => match target {
                Some(value) => {
                    binding.bind(interp, scope, name, value.clone());
                    Ok(true)
                }
                None => Ok(false),
            },

            Pattern::Value(expected) => Ok(target.map_or(false, |value| value == expected)),

            Pattern::Cons(cars, tail) => {
                let mut rest = target.cloned();
                for car in cars {
                    rest = match rest {
                        Some(Value::Pair(cell)) => {
                            if !car.matches(interp, Some(&cell.car), scope, binding)? {
                                return Ok(false);
                            }
                            Some(cell.cdr.clone())
                        }
                        // an exhausted list: the car is missing, the rest is still nil
                        Some(Value::Nil) => {
                            if !car.matches(interp, None, scope, binding)? {
                                return Ok(false);
                            }
                            Some(Value::Nil)
                        }
                        None => {
                            if !car.matches(interp, None, scope, binding)? {
                                return Ok(false);
                            }
                            None
                        }
                        Some(_) => return Ok(false),
                    };
                }
                tail.matches(interp, rest.as_ref(), scope, binding)
            }

            Pattern::Predicated(base, predicate) => {
                let value = match target {
                    Some(value) => value,
                    None => return Ok(false),
                };
                if !base.matches(interp, target, scope, binding)? {
                    return Ok(false);
                }
                let arg = Node::quote(&Value::list(vec![value.clone()]));
                Ok(interp.call(predicate, &arg, scope)? == Value::Bool(true))
            }

            // the default also stands in for a target the base rejects
            Pattern::Defaulted(base, default) => {
                if target.is_some() && base.matches(interp, target, scope, binding)? {
                    return Ok(true);
                }
                base.matches(interp, Some(default), scope, binding)
            }

            Pattern::Aliased(first, second) => {
                Ok(first.matches(interp, target, scope, binding)?
                    && second.matches(interp, target, scope, binding)?)
            }

            Pattern::DefaultArguments => {
                let args = target.cloned().unwrap_or(Value::Nil);
                let (items, _) = args.elements();
                for (i, item) in items.iter().enumerate() {
                    binding.bind(interp, scope, &format!("-{}", i + 1), item.clone());
                }
                if let Some(first) = items.first() {
                    binding.bind(interp, scope, "-", first.clone());
                }
                binding.bind(interp, scope, ARGUMENTS, args);
                Ok(true)
            }
        }
    }
}

impl From<Pattern> for Value {
    fn from(pattern: Pattern) -> Value {
        Value::Pattern(Rc::new(pattern))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pattern::Identifier(name) => write!(f, "{}", name),
            Pattern::Value(value) => write!(f, "{:#}", value),
            Pattern::Cons(cars, tail) => write!(f, "({}:{})", join(cars, ":"), tail),
            Pattern::Predicated(base, predicate) => write!(f, "{}::{:#}", base, predicate),
            Pattern::Defaulted(base, default) => write!(f, "{} = {:#}", base, default),
            Pattern::Aliased(first, second) => write!(f, "{}/{}", first, second),
            Pattern::DefaultArguments => write!(f, "{}", ARGUMENTS),
        }
    }
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read;

    fn pattern(interp: &mut Interpreter, code: &str) -> Pattern {
        let root = interp.root();
        let node = read(code).unwrap().remove(0);
        Pattern::build(interp, &node, root).unwrap()
    }

    fn id(name: &str) -> Box<Pattern> {
        Box::new(Pattern::Identifier(name.to_owned()))
    }

    #[test]
    fn building_from_syntax() {
        let mut interp = Interpreter::new();
        assert_eq!(Pattern::Identifier("a".to_owned()), pattern(&mut interp, "a"));
        assert_eq!(Pattern::Value(Value::Integer(10)), pattern(&mut interp, "10"));
        assert_eq!(Pattern::Cons(vec![*id("a")], id("b")), pattern(&mut interp, "a:b"));
        assert_eq!(
            Pattern::Cons(vec![*id("a")], Box::new(Pattern::Value(Value::Nil))),
            pattern(&mut interp, "[a]")
        );
        assert_eq!(Pattern::Cons(vec![*id("a")], id("b")), pattern(&mut interp, "[a | b]"));
        assert_eq!(
            Pattern::Cons(vec![*id("a"), *id("b"), *id("c")], id("d")),
            pattern(&mut interp, "[a b | c:d]")
        );
        assert_eq!(pattern(&mut interp, "a:b:c"), pattern(&mut interp, "[a b | c]"));
        assert_eq!(Pattern::Value(Value::Nil), pattern(&mut interp, "[]"));
        assert_eq!(
            Pattern::Defaulted(id("a"), Value::Integer(10)),
            pattern(&mut interp, "a = 10")
        );
        assert_eq!(Pattern::Aliased(id("a"), id("b")), pattern(&mut interp, "a/b"));
        assert_eq!(
            Pattern::Predicated(id("a"), Value::Builtin(Builtin::Even)),
            pattern(&mut interp, "a::even?")
        );
    }

    #[test]
    fn other_forms_become_value_patterns() {
        let mut interp = Interpreter::new();
        assert_eq!(Pattern::Value(Value::Integer(5)), pattern(&mut interp, "(add 3 2)"));
    }

    #[test]
    fn predicates_cannot_wrap_defaults() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let node = read("(pattern-with-predicate a = 1 even?)").unwrap().remove(0);
        assert!(interp.eval(&node, root).is_err());
    }

    #[test]
    fn missing_targets_only_match_defaults() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let scope = interp.scopes_mut().child(root);

        assert!(!Pattern::Identifier("a".to_owned()).matches(&mut interp, None, scope, Binding::Local).unwrap());
        assert!(!Pattern::Value(Value::Nil).matches(&mut interp, None, scope, Binding::Local).unwrap());

        let defaulted = Pattern::Defaulted(id("a"), Value::Integer(3));
        assert!(defaulted.matches(&mut interp, None, scope, Binding::Local).unwrap());
        assert_eq!(Value::Integer(3), interp.scopes().get(scope, "a").unwrap());
    }

    #[test]
    fn default_arguments_bind_positions() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        let scope = interp.scopes_mut().child(root);
        let args = Value::list(vec![Value::Integer(1), Value::Integer(2)]);

        assert!(Pattern::DefaultArguments.matches(&mut interp, Some(&args), scope, Binding::Local).unwrap());
        assert_eq!(vec!["-", "-1", "-2", "arguments"], interp.scopes().identifiers(scope));
        assert_eq!(Value::Integer(1), interp.scopes().get(scope, "-").unwrap());
        assert_eq!(Value::Integer(2), interp.scopes().get(scope, "-2").unwrap());
        assert_eq!(args, interp.scopes().get(scope, "arguments").unwrap());
    }

    #[test]
    fn outward_binding_updates_enclosing_frames() {
        let mut interp = Interpreter::new();
        let root = interp.root();
        interp.scopes_mut().set(root, "x", Value::Integer(1));
        let scope = interp.scopes_mut().child(root);

        let p = Pattern::Identifier("x".to_owned());
        assert!(p.matches(&mut interp, Some(&Value::Integer(2)), scope, Binding::Outward).unwrap());
        assert_eq!(Value::Integer(2), interp.scopes().get(root, "x").unwrap());
        assert!(!interp.scopes().has(scope, "x"));
    }

    #[test]
    fn patterns_print_readably() {
        let p = Pattern::Cons(
            vec![Pattern::Defaulted(id("a"), Value::Integer(10))],
            Box::new(Pattern::Value(Value::Nil)),
        );
        assert_eq!("(a = 10:nil)", p.to_string());
        let p = Pattern::Cons(vec![*id("a"), *id("b")], id("c"));
        assert_eq!("(a:b:c)", p.to_string());
        assert_eq!("a/b", Pattern::Aliased(id("a"), id("b")).to_string());
    }

    #[test]
    fn long_list_patterns_match_without_recursing() {
        let mut interp = Interpreter::new();
        let names: Vec<String> = (0..50_000).map(|i| format!("a{}", i)).collect();
        let code = format!(
            "(match? (pattern [{}]) [{}])",
            names.join(" "),
            "1 ".repeat(names.len())
        );
        assert_eq!(Value::Bool(true), interp.run(&code).unwrap());

        let code = format!("(match? (pattern [{}]) [1 2])", names.join(" "));
        assert_eq!(Value::Bool(false), interp.run(&code).unwrap());
    }
}
// }}}
