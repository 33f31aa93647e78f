use failure::Error;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::builtins::{arguments, Builtin};
use crate::env::ScopeId;
use crate::errors::RunError;
use crate::function::BoundMethod;
use crate::log;
use crate::syntax::Node;
use crate::values::Value;
use crate::Interpreter;

pub type ObjectRef = Rc<RefCell<Object>>;
pub type DictionaryRef = Rc<RefCell<Dictionary>>;

/// named slots, falling back to a prototype for slots it does not hold
#[derive(Debug, Default)]
pub struct Object {
    slots: BTreeMap<String, Value>,
    prototype: Option<ObjectRef>,
}

impl Object {
    pub fn new(prototype: Option<ObjectRef>) -> ObjectRef {
        Rc::new(RefCell::new(Object {
            slots: BTreeMap::new(),
            prototype,
        }))
    }

    /// look a slot up here, then along the prototype chain
    pub fn slot(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.slots.get(name) {
            return Some(value.clone());
        }
        let mut proto = self.prototype.clone();
        while let Some(object) = proto {
            let object = object.borrow();
            if let Some(value) = object.slots.get(name) {
                return Some(value.clone());
            }
            proto = object.prototype.clone();
        }
        None
    }

    pub fn set_slot(&mut self, name: &str, value: Value) {
        self.slots.insert(name.to_owned(), value);
    }

    /// the object's own slots, in name order
    pub fn slots(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.slots.iter()
    }

    pub fn prototype(&self) -> Option<&ObjectRef> {
        self.prototype.as_ref()
    }
}

/// entries keyed by arbitrary values, plus identifier-named attributes
#[derive(Debug, Default)]
pub struct Dictionary {
    entries: Vec<(Value, Value)>,
    attributes: BTreeMap<String, Value>,
}

impl Dictionary {
    pub fn new() -> DictionaryRef {
        Rc::new(RefCell::new(Dictionary::default()))
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_owned(), value);
    }

    /// entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

#[derive(Debug)]
enum PromiseState {
    Pending(Node, ScopeId),
    Forcing,
    Forced(Value),
}

/// a delayed computation, run at most once
#[derive(Debug)]
pub struct Promise {
    state: RefCell<PromiseState>,
}

impl Promise {
    pub fn new(node: Node, scope: ScopeId) -> Promise {
        Promise {
            state: RefCell::new(PromiseState::Pending(node, scope)),
        }
    }

    /// the result, if the promise has been forced
    pub fn value(&self) -> Option<Value> {
        match &*self.state.borrow() {
            PromiseState::Forced(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn force(&self, interp: &mut Interpreter) -> Result<Value, Error> {
        let pending = self.state.replace(PromiseState::Forcing);
        match pending {
            PromiseState::Forced(value) => {
                self.state.replace(PromiseState::Forced(value.clone()));
                Ok(value)
            }
            PromiseState::Forcing => Err(RunError::PromiseCycle.into()),
            PromiseState::Pending(node, scope) => {
                log::debug(format!("forcing promise of {}", node));
                match interp.eval(&node, scope) {
                    Ok(value) => {
                        self.state.replace(PromiseState::Forced(value.clone()));
                        Ok(value)
                    }
                    Err(err) => {
                        // leave it pending so it can be forced again
                        self.state.replace(PromiseState::Pending(node, scope));
                        Err(err)
                    }
                }
            }
        }
    }
}

/// force `value` if it is a promise
pub fn force(interp: &mut Interpreter, value: Value) -> Result<Value, Error> {
    match value {
        Value::Promise(p) => p.force(interp),
        value => Ok(value),
    }
}

/// a slot key: an identifier names itself, anything else is evaluated and
/// must give a symbol
fn slot_name(interp: &mut Interpreter, name: &str, key: &Node, scope: ScopeId) -> Result<String, Error> {
    match key {
        Node::Identifier(ident) => Ok(ident.to_string()),
        _ => match interp.eval(key, scope)? {
            Value::Symbol(symbol) => Ok(symbol.name().to_owned()),
            other => Err(RunError::TypeError {
                name: name.to_owned(),
                expected: "Symbol".to_owned(),
                got: other.get_type(),
            }.into()),
        },
    }
}

/// a method read out of a slot is bound to the value it was read from
fn bind_slot(value: Value, receiver: &Value) -> Value {
    match value {
        Value::Method(method) => Value::BoundMethod(Rc::new(BoundMethod::new(method, receiver.clone()))),
        value => value,
    }
}

fn missing<T>(what: String) -> Result<T, Error> {
    Err(RunError::ProcError {
        name: "get".to_owned(),
        msg: what,
    }.into())
}

/// `(get target key)`
pub fn get(interp: &mut Interpreter, target: &Value, key: &Node, scope: ScopeId) -> Result<Value, Error> {
    match target {
        Value::Object(object) => {
            let name = slot_name(interp, "get", key, scope)?;
            let slot = object.borrow().slot(&name);
            match slot {
                Some(value) => Ok(bind_slot(value, target)),
                None => missing(format!("object has no slot '{}'", name)),
            }
        }

        Value::Dictionary(dict) => match key {
            Node::Identifier(name) => {
                let attribute = dict.borrow().attribute(name);
                match attribute {
                    Some(value) => Ok(bind_slot(value, target)),
                    None => missing(format!("dictionary has no attribute '{}'", name)),
                }
            }
            _ => {
                let key = interp.eval(key, scope)?;
                let entry = dict.borrow().get(&key);
                match entry {
                    Some(value) => Ok(value),
                    None => missing(format!("dictionary has no entry for {}", key)),
                }
            }
        },

        Value::Pair(cell) => {
            let name = slot_name(interp, "get", key, scope)?;
            match name.as_str() {
                "car" => Ok(cell.car.clone()),
                "cdr" => force(interp, cell.cdr.clone()),
                "cdr-slot" => Ok(cell.cdr.clone()),
                _ => missing(format!("a pair has no slot '{}'", name)),
            }
        }

        other => Err(RunError::TypeError {
            name: "get".to_owned(),
            expected: "Object".to_owned(),
            got: other.get_type(),
        }.into()),
    }
}

/// `(set target key value)`; returns the value that was stored
pub fn set(
    interp: &mut Interpreter,
    target: &Value,
    key: &Node,
    value: &Node,
    scope: ScopeId,
) -> Result<Value, Error> {
    match target {
        Value::Object(object) => {
            let name = slot_name(interp, "set", key, scope)?;
            let value = interp.eval(value, scope)?;
            object.borrow_mut().set_slot(&name, value.clone());
            Ok(value)
        }

        Value::Dictionary(dict) => match key {
            Node::Identifier(name) => {
                let value = interp.eval(value, scope)?;
                dict.borrow_mut().set_attribute(name, value.clone());
                Ok(value)
            }
            _ => {
                let key = interp.eval(key, scope)?;
                let value = interp.eval(value, scope)?;
                dict.borrow_mut().insert(key, value.clone());
                Ok(value)
            }
        },

        other => Err(RunError::TypeError {
            name: "set".to_owned(),
            expected: "Object".to_owned(),
            got: other.get_type(),
        }.into()),
    }
}

/// fill `object` from the `key: value` forms of an object literal. a `get`
/// form (`a.b`) becomes a slot named after its key holding the looked-up
/// value, and a bare identifier a slot holding its own value
pub fn build_object(interp: &mut Interpreter, object: &ObjectRef, arg: &Node, scope: ScopeId) -> Result<(), Error> {
    let (items, tail) = arg.elements();
    if *tail != Node::Nil {
        return Err(RunError::ProcError {
            name: "object".to_owned(),
            msg: "slots must form a proper list".to_owned(),
        }.into());
    }

    for item in items {
        let cell = match item {
            Node::Form(cell) => cell,
            // `{foo}` is short for `{foo: foo}`
            Node::Identifier(name) => {
                let value = interp.eval(item, scope)?;
                object.borrow_mut().set_slot(name, value);
                continue;
            }
            other => {
                return Err(RunError::ProcError {
                    name: "object".to_owned(),
                    msg: format!("expected a `key: value` slot, got {}", other),
                }.into())
            }
        };

        let head = interp.eval(&cell.car, scope)?;
        match head {
            Value::Builtin(Builtin::Cons) => {
                let args = arguments("object", &cell.cdr, 2)?;
                let name = slot_name(interp, "object", args[0], scope)?;
                let value = interp.eval(args[1], scope)?;
                object.borrow_mut().set_slot(&name, value);
            }
            Value::Builtin(Builtin::Get) => {
                let args = arguments("object", &cell.cdr, 2)?;
                let name = slot_name(interp, "object", args[1], scope)?;
                let value = interp.call(&head, &cell.cdr, scope)?;
                object.borrow_mut().set_slot(&name, value);
            }
            other => {
                return Err(RunError::TypeError {
                    name: "object".to_owned(),
                    expected: "slot".to_owned(),
                    got: other.get_type(),
                }.into())
            }
        }
    }
    Ok(())
}

/// fill `dict` from a dictionary literal: every element evaluates to a
/// `key: value` pair
pub fn build_dictionary(interp: &mut Interpreter, dict: &DictionaryRef, arg: &Node, scope: ScopeId) -> Result<(), Error> {
    let (items, tail) = arg.elements();
    if *tail != Node::Nil {
        return Err(RunError::ProcError {
            name: "dictionary".to_owned(),
            msg: "entries must form a proper list".to_owned(),
        }.into());
    }

    for item in items {
        match interp.eval(item, scope)? {
            Value::Pair(cell) => dict.borrow_mut().insert(cell.car.clone(), cell.cdr.clone()),
            other => {
                return Err(RunError::TypeError {
                    name: "dictionary".to_owned(),
                    expected: "Pair".to_owned(),
                    got: other.get_type(),
                }.into())
            }
        }
    }
    Ok(())
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prototypes_supply_missing_slots() {
        let base = Object::new(None);
        base.borrow_mut().set_slot("a", Value::Integer(1));
        base.borrow_mut().set_slot("b", Value::Integer(2));

        let derived = Object::new(Some(base.clone()));
        derived.borrow_mut().set_slot("b", Value::Integer(20));

        assert_eq!(Some(Value::Integer(1)), derived.borrow().slot("a"));
        assert_eq!(Some(Value::Integer(20)), derived.borrow().slot("b"));
        assert_eq!(None, derived.borrow().slot("c"));
        assert_eq!(1, derived.borrow().slots().count());
        assert!(derived.borrow().prototype().is_some());
    }

    #[test]
    fn dictionaries_replace_equal_keys() {
        let dict = Dictionary::new();
        dict.borrow_mut().insert(Value::Integer(5), Value::Integer(10));
        dict.borrow_mut().insert(Value::symbol("x"), Value::Integer(1));
        dict.borrow_mut().insert(Value::Integer(5), Value::Integer(11));

        assert_eq!(Some(Value::Integer(11)), dict.borrow().get(&Value::Integer(5)));
        assert_eq!(2, dict.borrow().entries().count());
        assert_eq!(None, dict.borrow().attribute("x"));
    }

    #[test]
    fn promises_run_once() {
        let mut interp = Interpreter::new();
        interp.run("(count = 0) (bump = (fn - (count = (add count 1)) count))").unwrap();
        let root = interp.root();
        let node = crate::parser::read("(bump)").unwrap().remove(0);
        let promise = Promise::new(node, root);

        assert_eq!(None, promise.value());
        assert_eq!(Value::Integer(1), promise.force(&mut interp).unwrap());
        assert_eq!(Value::Integer(1), promise.force(&mut interp).unwrap());
        assert_eq!(Some(Value::Integer(1)), promise.value());
        assert_eq!(Value::Integer(1), interp.run("count").unwrap());
    }

    #[test]
    fn self_forcing_promises_fail() {
        let mut interp = Interpreter::new();
        let err = interp.run("(def p (delay (force p))) (force p)").unwrap_err();
        assert_eq!("promise forced while it was being forced", err.to_string());
    }

    #[test]
    fn objects_print_their_slots() {
        let mut interp = Interpreter::new();
        let value = interp.run("{b: 2, a: [1 2], c: {}}").unwrap();
        assert_eq!("{a: [1 2], b: 2, c: {...}}", value.to_string());
    }
}
// }}}
