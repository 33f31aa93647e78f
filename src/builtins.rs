use failure::Error;
use std::rc::Rc;

use crate::env::{ScopeId, Scopes};
use crate::errors::RunError;
use crate::function::{BoundMethod, Curried, Function, MultiFunction};
use crate::objects::{self, Dictionary, Object, Promise};
use crate::patterns::{Binding, Pattern};
use crate::syntax::Node;
use crate::values::Value;
use crate::Interpreter;

/// the primitives. every builtin receives its argument list unevaluated,
/// so each one decides what (and when) to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Print,
    Add,
    Id,
    List,
    Cons,
    Car,
    Cdr,
    Get,
    Set,
    Function,
    Method,
    MultiFunction,
    Bind,
    FunctionShorthand,
    Pattern,
    PatternWithPredicate,
    PatternWithDefault,
    PatternAlias,
    Match,
    Call,
    Apply,
    Curry,
    Even,
    Odd,
    Object,
    Extend,
    Dictionary,
    Array,
    Def,
    Redef,
    If,
    Eq,
    Delay,
    Force,
}

pub const BUILTINS: &[(&str, Builtin)] = &[
    ("print",                  Builtin::Print),
    ("add",                    Builtin::Add),
    ("id",                     Builtin::Id),
    ("list",                   Builtin::List),
    ("cons",                   Builtin::Cons),
    ("car",                    Builtin::Car),
    ("cdr",                    Builtin::Cdr),
    ("get",                    Builtin::Get),
    ("set",                    Builtin::Set),
    ("fn",                     Builtin::Function),
    ("function",               Builtin::Function),
    ("md",                     Builtin::Method),
    ("method",                 Builtin::Method),
    ("mfn",                    Builtin::MultiFunction),
    ("bind",                   Builtin::Bind),
    ("pattern",                Builtin::Pattern),
    ("pattern-with-predicate", Builtin::PatternWithPredicate),
    ("pattern-with-default",   Builtin::PatternWithDefault),
    ("pattern-alias",          Builtin::PatternAlias),
    ("match?",                 Builtin::Match),
    ("call",                   Builtin::Call),
    ("apply",                  Builtin::Apply),
    ("curry",                  Builtin::Curry),
    ("even?",                  Builtin::Even),
    ("odd?",                   Builtin::Odd),
    ("object",                 Builtin::Object),
    ("extend",                 Builtin::Extend),
    ("dictionary",             Builtin::Dictionary),
    ("array",                  Builtin::Array),
    ("def",                    Builtin::Def),
    ("redef",                  Builtin::Redef),
    ("if",                     Builtin::If),
    ("eq",                     Builtin::Eq),
    ("delay",                  Builtin::Delay),
    ("force",                  Builtin::Force),
];

fn constants() -> Vec<(&'static str, Value)> {
    vec![
        ("nil", Value::Nil),
        ("void", Value::Void),
        ("true", Value::Bool(true)),
        ("false", Value::Bool(false)),
    ]
}

/// bind every builtin and constant in `scope`
pub fn install(scopes: &mut Scopes, scope: ScopeId) {
    for (name, builtin) in BUILTINS {
        scopes.set(scope, name, Value::Builtin(*builtin));
    }
    for (name, value) in constants() {
        scopes.set(scope, name, value);
    }
}

// {{{ helpful macros
/// extract the inner Rust value from an ish value, or fail with a type error
/// when $value is not the Value variant $variant
macro_rules! extract {
    ($value: expr, $variant: ident, $proc: expr) => {{
        match $value {
            Value::$variant(x) => Ok(x),
            other => Err(RunError::TypeError {
                name: $proc.to_string(),
                expected: stringify!($variant).to_string(),
                got: other.get_type(),
            }),
        }
    }};
}

/// return a Err(RunError::ProcError)
macro_rules! procerr {
    ($name: expr, $msg: expr) => {
        Err(RunError::ProcError {
            name: $name.to_string(),
            msg: $msg.to_string(),
        }.into())
    };
}
// }}}

/// the elements of a proper argument list, which must hold `expected` of them
pub fn arguments<'n>(name: &str, arg: &'n Node, expected: usize) -> Result<Vec<&'n Node>, Error> {
    let (items, tail) = arg.elements();
    if *tail != Node::Nil {
        return procerr!(name, "expected a proper argument list");
    }
    if items.len() != expected {
        return Err(RunError::WrongNumArgs {
            name: name.to_owned(),
            expected,
            got: items.len(),
        }.into());
    }
    Ok(items)
}

/// evaluate each of exactly `expected` arguments
fn evaluated(
    interp: &mut Interpreter,
    name: &str,
    arg: &Node,
    expected: usize,
    scope: ScopeId,
) -> Result<Vec<Value>, Error> {
    let mut values = Vec::with_capacity(expected);
    for node in arguments(name, arg, expected)? {
        values.push(interp.eval(node, scope)?);
    }
    Ok(values)
}

fn single(interp: &mut Interpreter, name: &str, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = arguments(name, arg, 1)?;
    interp.eval(args[0], scope)
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print                => "print",
            Builtin::Add                  => "add",
            Builtin::Id                   => "id",
            Builtin::List                 => "list",
            Builtin::Cons                 => "cons",
            Builtin::Car                  => "car",
            Builtin::Cdr                  => "cdr",
            Builtin::Get                  => "get",
            Builtin::Set                  => "set",
            Builtin::Function             => "fn",
            Builtin::Method               => "md",
            Builtin::MultiFunction        => "mfn",
            Builtin::Bind                 => "bind",
            Builtin::FunctionShorthand    => "_sfn",
            Builtin::Pattern              => "pattern",
            Builtin::PatternWithPredicate => "pattern-with-predicate",
            Builtin::PatternWithDefault   => "pattern-with-default",
            Builtin::PatternAlias         => "pattern-alias",
            Builtin::Match                => "match?",
            Builtin::Call                 => "call",
            Builtin::Apply                => "apply",
            Builtin::Curry                => "curry",
            Builtin::Even                 => "even?",
            Builtin::Odd                  => "odd?",
            Builtin::Object               => "object",
            Builtin::Extend               => "extend",
            Builtin::Dictionary           => "dictionary",
            Builtin::Array                => "array",
            Builtin::Def                  => "def",
            Builtin::Redef                => "redef",
            Builtin::If                   => "if",
            Builtin::Eq                   => "eq",
            Builtin::Delay                => "delay",
            Builtin::Force                => "force",
        }
    }

    pub fn call(self, interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
        match self {
            Builtin::Print                => print(interp, arg, scope),
            Builtin::Add                  => add(interp, arg, scope),
            Builtin::Id                   => single(interp, "id", arg, scope),
            Builtin::List                 => list(interp, arg, scope),
            Builtin::Cons                 => cons(interp, arg, scope),
            Builtin::Car                  => car(interp, arg, scope),
            Builtin::Cdr                  => cdr(interp, arg, scope),
            Builtin::Get                  => get(interp, arg, scope),
            Builtin::Set                  => set(interp, arg, scope),
            Builtin::Function             => function(interp, arg, scope),
            Builtin::Method               => method(interp, arg, scope),
            Builtin::MultiFunction        => multi_function(interp, arg, scope),
            Builtin::Bind                 => bind(interp, arg, scope),
            Builtin::FunctionShorthand    => Ok(Value::Function(Rc::new(Function::shorthand(interp, arg, scope)))),
            Builtin::Pattern              => Ok(Pattern::from_args(interp, arg, scope)?.into()),
            Builtin::PatternWithPredicate => Ok(Pattern::with_predicate(interp, arg, scope)?.into()),
            Builtin::PatternWithDefault   => Ok(Pattern::with_default(interp, arg, scope)?.into()),
            Builtin::PatternAlias         => Ok(Pattern::aliased(interp, arg, scope)?.into()),
            Builtin::Match                => is_match(interp, arg, scope),
            Builtin::Call                 => call(interp, arg, scope),
            Builtin::Apply                => apply(interp, arg, scope),
            Builtin::Curry                => curry(interp, arg, scope),
            Builtin::Even                 => parity(interp, "even?", arg, scope, 0),
            Builtin::Odd                  => parity(interp, "odd?", arg, scope, 1),
            Builtin::Object               => object(interp, arg, scope),
            Builtin::Extend               => extend(interp, arg, scope),
            Builtin::Dictionary           => dictionary(interp, arg, scope),
            Builtin::Array                => Err(RunError::Unimplemented("array".to_owned()).into()),
            Builtin::Def                  => define(interp, arg, scope, false),
            Builtin::Redef                => define(interp, arg, scope, true),
            Builtin::If                   => if_else(interp, arg, scope),
            Builtin::Eq                   => eq(interp, arg, scope),
            Builtin::Delay                => delay(interp, arg, scope),
            Builtin::Force                => force(interp, arg, scope),
        }
    }
}

// {{{ essentials
/// print a value on its own line
/// usage: (print <expr>)
fn print(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let value = single(interp, "print", arg, scope)?;
    println!("{}", value);
    Ok(Value::Nil)
}

/// usage: (add <integer> <integer>)
fn add(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let mut args = evaluated(interp, "add", arg, 2, scope)?.into_iter();
    let a = extract!(args.next().unwrap_or(Value::Nil), Integer, "add")?;
    let b = extract!(args.next().unwrap_or(Value::Nil), Integer, "add")?;
    match a.checked_add(b) {
        Some(sum) => Ok(Value::Integer(sum)),
        None => Err(RunError::Overflow("add".to_owned()).into()),
    }
}

/// bind a name in the current frame
/// usage: (def <identifier> <expr>)
///        (redef <identifier> <expr>)   ; rebinds wherever the name lives
fn define(interp: &mut Interpreter, arg: &Node, scope: ScopeId, outward: bool) -> Result<Value, Error> {
    let name = if outward { "redef" } else { "def" };
    let args = arguments(name, arg, 2)?;
    let ident = match args[0] {
        Node::Identifier(ident) => ident.clone(),
        other => return procerr!(name, format!("cannot bind to {}", other)),
    };
    let value = interp.eval(args[1], scope)?;
    if outward {
        interp.scopes_mut().set_recursive(scope, &ident, value.clone());
    } else {
        interp.scopes_mut().set(scope, &ident, value.clone());
    }
    Ok(value)
}

/// usage: (if <bool> <then> <else>)
fn if_else(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = arguments("if", arg, 3)?;
    match interp.eval(args[0], scope)? {
        Value::Bool(true) => interp.eval(args[1], scope),
        Value::Bool(false) => interp.eval(args[2], scope),
        other => Err(RunError::TypeError {
            name: "if".to_owned(),
            expected: "Bool".to_owned(),
            got: other.get_type(),
        }.into()),
    }
}

/// usage: (eq <expr> <expr>)
fn eq(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = evaluated(interp, "eq", arg, 2, scope)?;
    Ok(Value::Bool(args[0] == args[1]))
}

fn parity(interp: &mut Interpreter, name: &str, arg: &Node, scope: ScopeId, remainder: i64) -> Result<Value, Error> {
    let n = extract!(single(interp, name, arg, scope)?, Integer, name)?;
    Ok(Value::Bool(n.rem_euclid(2) == remainder))
}
// }}}

// {{{ pairs
/// usage: (list <expr> ... | <expr>)
fn list(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    match arg {
        Node::Nil | Node::Pair(_) => interp.eval(arg, scope),
        _ => procerr!("list", "cannot have a cdr without a car"),
    }
}

/// usage: (cons <expr> <expr>)
fn cons(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let mut args = evaluated(interp, "cons", arg, 2, scope)?.into_iter();
    match (args.next(), args.next()) {
        (Some(car), Some(cdr)) => Ok(Value::cons(car, cdr)),
        _ => procerr!("cons", "expected two values"),
    }
}

/// usage: (car <pair>)
fn car(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let cell = extract!(single(interp, "car", arg, scope)?, Pair, "car")?;
    Ok(cell.car.clone())
}

/// the cdr of a pair, forcing it when it is a promise
/// usage: (cdr <pair>)
fn cdr(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let cell = extract!(single(interp, "cdr", arg, scope)?, Pair, "cdr")?;
    objects::force(interp, cell.cdr.clone())
}
// }}}

// {{{ objects
/// usage: (get <object> <key>)
fn get(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = arguments("get", arg, 2)?;
    let target = interp.eval(args[0], scope)?;
    objects::get(interp, &target, args[1], scope)
}

/// usage: (set <object> <key> <expr>)
fn set(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = arguments("set", arg, 3)?;
    let target = interp.eval(args[0], scope)?;
    objects::set(interp, &target, args[1], args[2], scope)
}

/// usage: (object <key>: <expr> ...)
fn object(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let object = Object::new(None);
    objects::build_object(interp, &object, arg, scope)?;
    Ok(Value::Object(object))
}

/// a new object whose missing slots are looked up in <prototype>
/// usage: (extend <prototype> <key>: <expr> ...)
fn extend(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let (proto, slots) = match arg.split() {
        Some(parts) => parts,
        None => return Err(RunError::WrongNumArgs {
            name: "extend".to_owned(),
            expected: 1,
            got: 0,
        }.into()),
    };
    let proto = extract!(interp.eval(proto, scope)?, Object, "extend")?;
    let object = Object::new(Some(proto));
    objects::build_object(interp, &object, slots, scope)?;
    Ok(Value::Object(object))
}

/// usage: (dictionary <key>: <expr> ...)
fn dictionary(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let dict = Dictionary::new();
    objects::build_dictionary(interp, &dict, arg, scope)?;
    Ok(Value::Dictionary(dict))
}
// }}}

// {{{ functions
/// usage: (fn <pattern> <body> ...)
fn function(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    Ok(Value::Function(Rc::new(Function::new(interp, arg, scope)?)))
}

/// a function that has to be bound to an object before it can be called
/// usage: (md <pattern> <body> ...)
fn method(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    Ok(Value::Method(Rc::new(Function::new(interp, arg, scope)?)))
}

/// usage: (mfn (<pattern> <body> ...) ...)
fn multi_function(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let (items, tail) = arg.elements();
    if *tail != Node::Nil {
        return procerr!("mfn", "expected a proper list of alternatives");
    }

    let mut alternatives = Vec::with_capacity(items.len());
    for item in items {
        match item.split() {
            Some((pattern, body)) => {
                alternatives.push(Rc::new(Function::from_parts(interp, pattern, body, scope)?))
            }
            None => return procerr!("mfn", format!("expected (<pattern> <body> ...), got {}", item)),
        }
    }
    Ok(Value::MultiFunction(Rc::new(MultiFunction { alternatives })))
}

/// usage: (bind <method> <receiver>)
fn bind(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let mut args = evaluated(interp, "bind", arg, 2, scope)?.into_iter();
    match (args.next(), args.next()) {
        (Some(Value::Method(method)), Some(receiver)) => {
            Ok(Value::BoundMethod(Rc::new(BoundMethod::new(method, receiver))))
        }
        (Some(Value::BoundMethod(_)), _) => Err(RunError::AlreadyBound.into()),
        (Some(other), _) => Err(RunError::TypeError {
            name: "bind".to_owned(),
            expected: "Method".to_owned(),
            got: other.get_type(),
        }.into()),
        _ => procerr!("bind", "expected a method and a receiver"),
    }
}

/// whether <target> matches <pattern>; bindings go to a throwaway frame
/// usage: (match? <pattern> <expr>)
fn is_match(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let mut args = evaluated(interp, "match?", arg, 2, scope)?.into_iter();
    let pattern = extract!(args.next().unwrap_or(Value::Nil), Pattern, "match?")?;
    let target = args.next().unwrap_or(Value::Nil);
    let frame = interp.scopes_mut().child(scope);
    let matched = pattern.matches(interp, Some(&target), frame, Binding::Local);
    interp.scopes_mut().release(frame);
    Ok(Value::Bool(matched?))
}

/// usage: (call <callable> <arg> ...)
fn call(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    match arg.split() {
        Some((callee, rest)) => {
            let callee = interp.eval(callee, scope)?;
            interp.call(&callee, rest, scope)
        }
        None => procerr!("call", "expected something to call"),
    }
}

/// usage: (apply <callable> <list>)
fn apply(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = evaluated(interp, "apply", arg, 2, scope)?;
    interp.call(&args[0], &Node::quote(&args[1]), scope)
}

/// the arguments are evaluated now, exactly once
/// usage: (curry <callable> <arg> ...)
fn curry(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    match arg.split() {
        Some((callee, rest)) => {
            let function = interp.eval(callee, scope)?;
            let args = interp.eval(rest, scope)?;
            Ok(Value::Curried(Rc::new(Curried { function, args })))
        }
        None => procerr!("curry", "expected something to curry"),
    }
}
// }}}

// {{{ promises
/// usage: (delay <expr>)
fn delay(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let args = arguments("delay", arg, 1)?;
    interp.scopes_mut().capture(scope);
    Ok(Value::Promise(Rc::new(Promise::new(args[0].clone(), scope))))
}

/// usage: (force <expr>)
fn force(interp: &mut Interpreter, arg: &Node, scope: ScopeId) -> Result<Value, Error> {
    let value = single(interp, "force", arg, scope)?;
    objects::force(interp, value)
}
// }}}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) -> Value {
        Interpreter::new().run(code).unwrap()
    }

    fn fails(code: &str) -> bool {
        Interpreter::new().run(code).is_err()
    }

    #[test]
    fn every_builtin_is_bound_under_its_name() {
        let interp = Interpreter::new();
        let root = interp.root();
        for (name, builtin) in BUILTINS {
            assert_eq!(Value::Builtin(*builtin), interp.scopes().get(root, name).unwrap());
        }
        assert_eq!("fn", Builtin::Function.name());
        assert_eq!("md", Builtin::Method.name());
    }

    #[test]
    fn adding() {
        assert_eq!(Value::Integer(5), run("(add 2 3)"));
        assert!(fails("(add 1)"));
        assert!(fails("(add 1 nil)"));
        assert!(fails("(add 9223372036854775807 1)"));
    }

    #[test]
    fn argument_counts_are_checked() {
        let err = Interpreter::new().run("(cons 1 2 3)").unwrap_err();
        assert_eq!("cons: expected 2 params, got 3 instead", err.to_string());
        assert!(fails("(id 1 | 2)"));
    }

    #[test]
    fn type_errors_name_the_builtin() {
        let err = Interpreter::new().run("(car 5)").unwrap_err();
        assert_eq!("car: expected a Pair, got a Integer instead", err.to_string());
    }

    #[test]
    fn pairs() {
        assert_eq!(Value::Integer(1), run("(car [1 2])"));
        assert_eq!(Value::list(vec![Value::Integer(2)]), run("(cdr [1 2])"));
        assert_eq!(Value::Nil, run("(list)"));
        assert_eq!(Value::cons(Value::Integer(1), Value::Integer(2)), run("(cons 1 2)"));
    }

    #[test]
    fn conditionals() {
        assert_eq!(Value::Integer(1), run("(if (eq 1 1) 1 2)"));
        assert_eq!(Value::Integer(2), run("(if (even? 3) 1 2)"));
        assert_eq!(Value::Bool(true), run("(odd? 3)"));
        assert!(fails("(if nil 1 2)"));
    }

    #[test]
    fn definitions() {
        assert_eq!(Value::Integer(2), run("(def x 1) (def x 2) x"));
        assert_eq!(Value::Integer(1), run("(def x 1) ((fn - (def x 2))) x"));
        assert_eq!(Value::Integer(2), run("(def x 1) ((fn - (redef x 2))) x"));
        assert!(fails("(def 1 2)"));
    }

    #[test]
    fn match_does_not_leak_bindings() {
        let mut interp = Interpreter::new();
        assert_eq!(Value::Bool(true), interp.run("(match? (pattern [a b]) [1 2])").unwrap());
        assert_eq!(Value::Bool(false), interp.run("(match? (pattern [a b]) [1])").unwrap());
        assert!(interp.run("a").is_err());
    }

    #[test]
    fn arrays_are_not_implemented() {
        let err = Interpreter::new().run("#[1 2]").unwrap_err();
        assert_eq!("array: not yet implemented", err.to_string());
    }
}
// }}}
