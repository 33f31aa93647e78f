use itertools::join;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::builtins;
use crate::function;
use crate::objects;
use crate::patterns;

/// representation of ish's runtime values
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Void,
    Integer(i64),
    Bool(bool),
    Symbol(Symbol),
    Pair(Rc<Cons<Value>>),
    Builtin(builtins::Builtin),
    Curried(Rc<function::Curried>),
    Function(Rc<function::Function>),
    Method(Rc<function::Function>),
    BoundMethod(Rc<function::BoundMethod>),
    MultiFunction(Rc<function::MultiFunction>),
    Pattern(Rc<patterns::Pattern>),
    Object(objects::ObjectRef),
    Dictionary(objects::DictionaryRef),
    Promise(Rc<objects::Promise>),
}

use self::Value::*;

/// something a `Cons` can chain through its cdr
pub trait Spine: Sized {
    /// detach the next cell of the chain, leaving an empty value behind
    fn take_tail(&mut self) -> Option<Rc<Cons<Self>>>;
}

/// a two-slot cell, shared by runtime pairs and syntax-tree pairs/forms
#[derive(Debug, Clone)]
pub struct Cons<T: Spine> {
    pub car: T,
    pub cdr: T,
}

impl<T: Spine> Cons<T> {
    pub fn new(car: T, cdr: T) -> Rc<Cons<T>> {
        Rc::new(Cons { car, cdr })
    }
}

impl<T: Spine> Drop for Cons<T> {
    // unlink the chain cell by cell; a derived drop recurses once per cell
    fn drop(&mut self) {
        let mut next = self.cdr.take_tail();
        while let Some(cell) = next {
            next = match Rc::try_unwrap(cell) {
                Ok(mut cell) => cell.cdr.take_tail(),
                Err(_) => None,
            };
        }
    }
}

impl Spine for Value {
    fn take_tail(&mut self) -> Option<Rc<Cons<Value>>> {
        match self {
            Pair(_) => match mem::replace(self, Nil) {
                Pair(cell) => Some(cell),
                _ => None,
            },
            _ => None,
        }
    }
}

thread_local! {
    static SYMBOLS: RefCell<HashMap<String, Rc<str>>> = RefCell::new(HashMap::new());
}

/// an interned symbol; two symbols with the same name share their storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: &str) -> Symbol {
        SYMBOLS.with(|table| {
            let mut table = table.borrow_mut();
            if let Some(existing) = table.get(name) {
                return Symbol(existing.clone());
            }
            let interned: Rc<str> = Rc::from(name);
            table.insert(name.to_owned(), interned.clone());
            Symbol(interned)
        })
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Pair(Cons::new(car, cdr))
    }

    /// build a nil-terminated list out of `items`
    pub fn list<I>(items: I) -> Value
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Nil, |tail, item| Value::cons(item, tail))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    /// split a pair chain into its elements and its final cdr
    pub fn elements(&self) -> (Vec<Value>, Value) {
        let mut items = Vec::new();
        let mut current = self;
        while let Pair(cell) = current {
            items.push(cell.car.clone());
            current = &cell.cdr;
        }
        (items, current.clone())
    }

    pub fn is_callable(&self) -> bool {
        match self {
            Builtin(_) | Curried(_) | Function(_) | Method(_) | BoundMethod(_)
            | MultiFunction(_) | Pattern(_) | Pair(_) => true,
            _ => false,
        }
    }

    /// get the human-friendly type of a `Value`
    pub fn get_type(&self) -> String {
        match self {
            Nil           => "Nil",
            Void          => "Void",
            Integer(_)    => "Integer",
            Bool(_)       => "Bool",
            Value::Symbol(_) => "Symbol",
            Pair(_)       => "Pair",
            Builtin(_)    => "Builtin",
            Curried(_)    => "Curried",
            Function(_)   => "Function",
            Method(_)     => "Method",
            BoundMethod(_) => "BoundMethod",
            MultiFunction(_) => "MultiFunction",
            Pattern(_)    => "Pattern",
            Object(_)     => "Object",
            Dictionary(_) => "Dictionary",
            Promise(_)    => "Promise",
        }.to_owned()
    }
}

/// print a value; objects nested inside other values are abbreviated so that
/// self-referencing objects can still be printed
fn write_value(f: &mut fmt::Formatter, value: &Value, nested: bool) -> fmt::Result {
    match value {
        Nil         => write!(f, "nil"),
        Void        => write!(f, "void"),
        Integer(n)  => write!(f, "{}", n),
        Bool(true)  => write!(f, "true"),
        Bool(false) => write!(f, "false"),
        Value::Symbol(s) => write!(f, "{}", s),
        Pair(_) => {
            let (items, tail) = value.elements();
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write_value(f, item, true)?;
            }
            if let Nil = tail {
                write!(f, "]")
            } else {
                write!(f, " | ")?;
                write_value(f, &tail, true)?;
                write!(f, "]")
            }
        }
        Builtin(b)  => write!(f, "<builtin {}>", b.name()),
        Curried(c)  => write!(f, "<curried {}>", c.function),
        Function(_) => write!(f, "<function>"),
        Method(_)   => write!(f, "<method>"),
        BoundMethod(_) => write!(f, "<bound method>"),
        MultiFunction(m) => write!(f, "<multi-function of {}>", m.alternatives.len()),
        Pattern(p)  => write!(f, "<pattern {}>", p),
        Object(_) | Dictionary(_) if nested => write!(f, "{{...}}"),
        Object(obj) => {
            let obj = obj.borrow();
            write!(f, "{{{}}}", join(obj.slots().map(|(k, v)| format!("{}: {:#}", k, v)), ", "))
        }
        Dictionary(dict) => {
            let dict = dict.borrow();
            write!(f, "#{{{}}}", join(dict.entries().map(|(k, v)| format!("{:#}: {:#}", k, v)), ", "))
        }
        Promise(p) => match p.value() {
            Some(v) => write!(f, "<promise {:#}>", v),
            None    => write!(f, "<promise>"),
        },
    }
}

impl fmt::Display for Value {
    /// `{:#}` prints the value as an element of some enclosing value
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(f, self, f.alternate())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        let (mut a, mut b) = (self, other);
        loop {
            return match (a, b) {
                (Pair(x), Pair(y)) => {
                    if Rc::ptr_eq(x, y) {
                        true
                    } else if x.car != y.car {
                        false
                    } else {
                        // walk the cdr chain without recursing
                        a = &x.cdr;
                        b = &y.cdr;
                        continue;
                    }
                }
                (Nil, Nil) | (Void, Void) => true,
                (Integer(x), Integer(y)) => x == y,
                (Bool(x), Bool(y)) => x == y,
                (Value::Symbol(x), Value::Symbol(y)) => x == y,
                (Builtin(x), Builtin(y)) => x == y,
                (Pattern(x), Pattern(y)) => x == y,
                (Curried(x), Curried(y)) => Rc::ptr_eq(x, y),
                (Function(x), Function(y)) | (Method(x), Method(y)) => Rc::ptr_eq(x, y),
                (BoundMethod(x), BoundMethod(y)) => Rc::ptr_eq(x, y),
                (MultiFunction(x), MultiFunction(y)) => Rc::ptr_eq(x, y),
                (Object(x), Object(y)) => Rc::ptr_eq(x, y),
                (Dictionary(x), Dictionary(y)) => Rc::ptr_eq(x, y),
                (Promise(x), Promise(y)) => Rc::ptr_eq(x, y),
                _ => false, // values of different types are not equivalent
            };
        }
    }
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_compare_structurally() {
        let a = Value::list(vec![Integer(1), Integer(2), Integer(3)]);
        let b = Value::cons(Integer(1), Value::cons(Integer(2), Value::cons(Integer(3), Nil)));
        assert_eq!(a, b);
        assert_ne!(a, Value::list(vec![Integer(1), Integer(2)]));
        assert_ne!(Value::cons(Integer(1), Integer(2)), Value::cons(Integer(1), Nil));
    }

    #[test]
    fn nil_and_void_are_distinct() {
        assert_eq!(Nil, Nil);
        assert_ne!(Nil, Void);
        assert_ne!(Nil, Bool(false));
    }

    #[test]
    fn symbols_are_interned() {
        let a = Symbol::new("foo");
        let b = Symbol::new("foo");
        assert!(Rc::ptr_eq(&a.0, &b.0));
        assert_eq!(Value::symbol("foo"), Value::symbol("foo"));
        assert_ne!(Value::symbol("foo"), Value::symbol("bar"));
    }

    #[test]
    fn lists_print_with_brackets() {
        assert_eq!("[1 2 3]", Value::list(vec![Integer(1), Integer(2), Integer(3)]).to_string());
        assert_eq!("[1 | 2]", Value::cons(Integer(1), Integer(2)).to_string());
        assert_eq!("[1 [2] | #x]", Value::cons(Integer(1), Value::cons(Value::list(vec![Integer(2)]), Value::symbol("x"))).to_string());
        assert_eq!("nil", Nil.to_string());
        assert_eq!("void", Void.to_string());
    }

    #[test]
    fn long_lists_compare_without_recursing() {
        let a = Value::list((0..200_000).map(Integer).collect::<Vec<_>>());
        let b = Value::list((0..200_000).map(Integer).collect::<Vec<_>>());
        assert!(a == b);
    }

    #[test]
    fn long_lists_drop_without_recursing() {
        let list = Value::list((0..500_000).map(Integer).collect::<Vec<_>>());
        let shared = list.clone();
        drop(list);
        assert_eq!(500_000, shared.elements().0.len());
        drop(shared);
    }
}
// }}}
