use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::values::{Cons, Spine, Symbol, Value};

/// the syntax tree handed from the reader to the evaluator
#[derive(Debug, Clone)]
pub enum Node {
    /// the empty list, written `()` or implied at the end of every spine
    Nil,
    /// a literal spine cell: the argument list of a form, or a list literal
    Pair(Rc<Cons<Node>>),
    /// an application: the car is called with the unevaluated cdr
    Form(Rc<Cons<Node>>),
    Identifier(Rc<str>),
    Numeric(i64),
    Symbol(Symbol),
    /// a node that already carries its value; the label is only used for printing
    Value(&'static str, Value),
}

impl Node {
    pub fn pair(car: Node, cdr: Node) -> Node {
        Node::Pair(Cons::new(car, cdr))
    }

    pub fn form(car: Node, cdr: Node) -> Node {
        Node::Form(Cons::new(car, cdr))
    }

    pub fn ident(name: &str) -> Node {
        Node::Identifier(Rc::from(name))
    }

    /// `(head args...)`, a form over a nil-terminated argument spine
    pub fn call(head: Node, args: Vec<Node>) -> Node {
        Node::form(head, Node::spine(args, Node::Nil))
    }

    /// chain `items` into pair cells ending in `tail`
    pub fn spine(items: Vec<Node>, tail: Node) -> Node {
        items
            .into_iter()
            .rev()
            .fold(tail, |cdr, car| Node::pair(car, cdr))
    }

    /// re-feed an already evaluated argument list to a callable: the spine is
    /// rebuilt out of pair nodes so callables can walk it, and every element
    /// becomes a value node that evaluates to itself
    pub fn quote(args: &Value) -> Node {
        Node::quote_onto(args, None)
    }

    /// like `quote`, but a nil-terminated `args` continues into `rest`
    /// (still unevaluated) instead of ending
    pub fn quote_onto(args: &Value, rest: Option<Node>) -> Node {
        let (items, tail) = args.elements();
        let tail = match (tail, rest) {
            (Value::Nil, Some(rest)) => rest,
            (Value::Nil, None) => Node::Nil,
            (tail, _) => Node::Value("_arg", tail),
        };
        Node::spine(items.into_iter().map(|v| Node::Value("_arg", v)).collect(), tail)
    }

    /// the car and cdr of a pair or form node
    pub fn split(&self) -> Option<(&Node, &Node)> {
        match self {
            Node::Pair(cell) | Node::Form(cell) => Some((&cell.car, &cell.cdr)),
            _ => None,
        }
    }

    /// split an argument spine into its elements and its final cdr
    pub fn elements(&self) -> (Vec<&Node>, &Node) {
        let mut items = Vec::new();
        let mut current = self;
        while let Node::Pair(cell) = current {
            items.push(&cell.car);
            current = &cell.cdr;
        }
        (items, current)
    }
}

impl Spine for Node {
    fn take_tail(&mut self) -> Option<Rc<Cons<Node>>> {
        match self {
            Node::Pair(_) | Node::Form(_) => match mem::replace(self, Node::Nil) {
                Node::Pair(cell) | Node::Form(cell) => Some(cell),
                _ => None,
            },
            _ => None,
        }
    }
}

/// print the remainder of a form starting at `cell`, closing paren included
fn write_form_tail(f: &mut fmt::Formatter, cell: &Cons<Node>) -> fmt::Result {
    let mut cell = cell;
    loop {
        write!(f, "{}", cell.car)?;
        match &cell.cdr {
            Node::Nil => return write!(f, ")"),
            Node::Pair(next) => {
                write!(f, " ")?;
                cell = next;
            }
            rest => return write!(f, " | {})", rest),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Nil => write!(f, "()"),
            Node::Form(cell) => {
                write!(f, "(")?;
                write_form_tail(f, cell)
            }
            Node::Pair(_) => {
                write!(f, "[")?;
                let (items, tail) = self.elements();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                match tail {
                    Node::Nil => write!(f, "]"),
                    rest => write!(f, " | {}]", rest),
                }
            }
            Node::Identifier(name) => write!(f, "{}", name),
            Node::Numeric(n) => write!(f, "{}", n),
            Node::Symbol(s) => write!(f, "{}", s),
            Node::Value(label, _) => write!(f, "{}", label),
        }
    }
}

impl PartialEq for Node {
    /// value nodes compare by the value they carry, not by their label
    fn eq(&self, other: &Node) -> bool {
        let (mut a, mut b) = (self, other);
        loop {
            return match (a, b) {
                (Node::Pair(x), Node::Pair(y)) | (Node::Form(x), Node::Form(y)) => {
                    if x.car != y.car {
                        false
                    } else {
                        a = &x.cdr;
                        b = &y.cdr;
                        continue;
                    }
                }
                (Node::Nil, Node::Nil) => true,
                (Node::Identifier(x), Node::Identifier(y)) => x == y,
                (Node::Numeric(x), Node::Numeric(y)) => x == y,
                (Node::Symbol(x), Node::Symbol(y)) => x == y,
                (Node::Value(_, x), Node::Value(_, y)) => x == y,
                _ => false,
            };
        }
    }
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forms_print_like_source() {
        let node = Node::form(Node::ident("a"), Node::pair(Node::ident("b"), Node::Numeric(3)));
        assert_eq!("(a b | 3)", node.to_string());
        let node = Node::call(Node::ident("a"), vec![Node::call(Node::ident("b"), vec![])]);
        assert_eq!("(a (b))", node.to_string());
        let node = Node::form(Node::ident("a"), Node::call(Node::ident("b"), vec![]));
        assert_eq!("(a | (b))", node.to_string());
    }

    #[test]
    fn value_nodes_ignore_labels() {
        assert_eq!(Node::Value("x", Value::Integer(1)), Node::Value("y", Value::Integer(1)));
        assert_ne!(Node::Value("x", Value::Integer(1)), Node::Numeric(1));
    }

    #[test]
    fn quoting_keeps_the_spine_walkable() {
        let args = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
        let node = Node::quote(&args);
        let (items, tail) = node.elements();
        assert_eq!(2, items.len());
        assert_eq!(&Node::Nil, tail);

        let node = Node::quote_onto(&args, Some(Node::ident("more")));
        assert_eq!(&Node::ident("more"), node.elements().1);
    }

    #[test]
    fn long_spines_drop_without_recursing() {
        let items = (0..500_000).map(Node::Numeric).collect();
        let spine = Node::spine(items, Node::Nil);
        assert_eq!(500_000, spine.elements().0.len());
        drop(spine);
    }
}
// }}}
