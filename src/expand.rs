use failure::Error;

use crate::builtins::Builtin;
use crate::errors::ParseError;
use crate::syntax::Node;
use crate::values::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// an infix operator; `a op b` becomes `(builtin a b)`
#[derive(Debug)]
pub struct BinaryOperator {
    pub token: &'static str,
    pub label: &'static str,
    pub builtin: Builtin,
    pub precedence: u8,
    pub assoc: Assoc,
}

/// a prefix operator; `op x` becomes `(builtin prefix... x)`
#[derive(Debug)]
pub struct UnaryOperator {
    pub token: &'static str,
    pub label: &'static str,
    pub builtin: Builtin,
    pub prefix: &'static [&'static str],
}

pub const BINARY_OPERATORS: &[BinaryOperator] = &[
    BinaryOperator { token: ":",  label: "_cons",                   builtin: Builtin::Cons,                 precedence: 2, assoc: Assoc::Right },
    BinaryOperator { token: ".",  label: "_get",                    builtin: Builtin::Get,                  precedence: 1, assoc: Assoc::Left },
    BinaryOperator { token: "::", label: "_pattern-with-predicate", builtin: Builtin::PatternWithPredicate, precedence: 4, assoc: Assoc::Left },
    BinaryOperator { token: "=",  label: "_pattern-with-default",   builtin: Builtin::PatternWithDefault,   precedence: 4, assoc: Assoc::Left },
    BinaryOperator { token: "/",  label: "_pattern-alias",          builtin: Builtin::PatternAlias,         precedence: 3, assoc: Assoc::Left },
];

pub const UNARY_OPERATORS: &[UnaryOperator] = &[
    UnaryOperator { token: "~", label: "_id",  builtin: Builtin::Id,  prefix: &[] },
    UnaryOperator { token: "@", label: "_get", builtin: Builtin::Get, prefix: &["this"] },
];

pub fn binary_operator(token: &str) -> Option<&'static BinaryOperator> {
    BINARY_OPERATORS.iter().find(|op| op.token == token)
}

pub fn unary_operator(token: &str) -> Option<&'static UnaryOperator> {
    UNARY_OPERATORS.iter().find(|op| op.token == token)
}

impl BinaryOperator {
    pub fn head(&self) -> Node {
        Node::Value(self.label, Value::Builtin(self.builtin))
    }

    fn apply(&self, left: Node, right: Node) -> Node {
        Node::call(self.head(), vec![left, right])
    }

    /// whether `stacked` has to leave the operator stack before `self` is
    /// pushed. the scan runs right to left, hence the inverted comparison
    fn drains(&self, stacked: &BinaryOperator) -> bool {
        match self.assoc {
            Assoc::Left => stacked.precedence < self.precedence,
            Assoc::Right => stacked.precedence <= self.precedence,
        }
    }
}

impl UnaryOperator {
    pub fn head(&self) -> Node {
        Node::Value(self.label, Value::Builtin(self.builtin))
    }

    fn apply(&self, operand: Node) -> Node {
        let mut args: Vec<Node> = self.prefix.iter().map(|name| Node::ident(name)).collect();
        args.push(operand);
        Node::call(self.head(), args)
    }
}

/// one element of a bracket level before it is folded into a spine
#[derive(Debug, Clone)]
pub enum Item {
    Node(Node),
    Rest,
    Unary(&'static UnaryOperator),
    Binary(&'static BinaryOperator),
}

/// rewrite every unary operator and its operand into a call form
pub fn expand_unary_operators(items: Vec<Item>) -> Result<Vec<Item>, Error> {
    let mut output = Vec::with_capacity(items.len());
    let mut pending: Vec<&'static UnaryOperator> = Vec::new();

    for item in items {
        match item {
            Item::Unary(op) => pending.push(op),
            Item::Node(mut node) => {
                while let Some(op) = pending.pop() {
                    node = op.apply(node);
                }
                output.push(Item::Node(node));
            }
            other => {
                if let Some(op) = pending.last() {
                    return Err(ParseError::DanglingUnary(op.token.to_owned()).into());
                }
                output.push(other);
            }
        }
    }

    match pending.last() {
        Some(op) => Err(ParseError::DanglingUnary(op.token.to_owned()).into()),
        None => Ok(output),
    }
}

/// shunting-yard over the reversed items; juxtaposed operands flush the
/// operator stack, so application binds tighter than any operator
pub fn expand_binary_operators(items: Vec<Item>) -> Result<Vec<Item>, Error> {
    let mut queue: Vec<Item> = Vec::with_capacity(items.len());
    let mut stack: Vec<&'static BinaryOperator> = Vec::new();
    let mut last_was_operator = false;

    for item in items.into_iter().rev() {
        let is_operator = match item {
            Item::Binary(_) => true,
            _ => false,
        };
        if !is_operator && !last_was_operator {
            while let Some(op) = stack.pop() {
                queue.push(Item::Binary(op));
            }
        }

        match item {
            Item::Binary(op) => {
                while stack.last().map_or(false, |stacked| op.drains(stacked)) {
                    if let Some(stacked) = stack.pop() {
                        queue.push(Item::Binary(stacked));
                    }
                }
                stack.push(op);
            }
            other => queue.push(other),
        }
        last_was_operator = is_operator;
    }

    while let Some(op) = stack.pop() {
        queue.push(Item::Binary(op));
    }

    // the queue now reads as postfix from the front
    let mut results: Vec<Item> = Vec::with_capacity(queue.len());
    for item in queue {
        match item {
            Item::Binary(op) => {
                let left = results.pop();
                let right = results.pop();
                match (left, right) {
                    (Some(Item::Node(left)), Some(Item::Node(right))) => {
                        results.push(Item::Node(op.apply(left, right)))
                    }
                    (Some(Item::Rest), _) | (_, Some(Item::Rest)) => {
                        return Err(ParseError::MisplacedRest.into())
                    }
                    _ => return Err(ParseError::MissingOperand(op.token.to_owned()).into()),
                }
            }
            other => results.push(other),
        }
    }

    results.reverse();
    Ok(results)
}

pub fn expand(items: Vec<Item>) -> Result<Vec<Item>, Error> {
    expand_binary_operators(expand_unary_operators(items)?)
}

// {{{ tests
#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Item {
        Item::Node(Node::ident(name))
    }

    fn binary(token: &str) -> Item {
        Item::Binary(binary_operator(token).unwrap())
    }

    fn unary(token: &str) -> Item {
        Item::Unary(unary_operator(token).unwrap())
    }

    fn nodes(items: Vec<Item>) -> Vec<Node> {
        items
            .into_iter()
            .map(|item| match item {
                Item::Node(node) => node,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    fn special(token: &str, args: Vec<Node>) -> Node {
        Node::call(binary_operator(token).unwrap().head(), args)
    }

    #[test]
    fn unary_operators_take_the_next_node() {
        let id = unary_operator("~").unwrap().head();
        assert_eq!(
            vec![Node::ident("a"), Node::call(id.clone(), vec![Node::ident("b")])],
            nodes(expand_unary_operators(vec![ident("a"), unary("~"), ident("b")]).unwrap())
        );
        assert_eq!(
            vec![Node::ident("a"), Node::call(id.clone(), vec![Node::call(id, vec![Node::ident("b")])])],
            nodes(expand_unary_operators(vec![ident("a"), unary("~"), unary("~"), ident("b")]).unwrap())
        );
    }

    #[test]
    fn at_reads_a_slot_of_this() {
        let get = unary_operator("@").unwrap().head();
        assert_eq!(
            vec![Node::ident("a"), Node::call(get, vec![Node::ident("this"), Node::ident("b")])],
            nodes(expand_unary_operators(vec![ident("a"), unary("@"), ident("b")]).unwrap())
        );
    }

    #[test]
    fn unary_operator_needs_an_operand() {
        assert!(expand_unary_operators(vec![ident("a"), unary("~")]).is_err());
        assert!(expand_unary_operators(vec![unary("~"), Item::Rest, ident("a")]).is_err());
    }

    #[test]
    fn binary_operators_fold_into_calls() {
        assert_eq!(
            vec![special(":", vec![Node::ident("a"), Node::ident("b")])],
            nodes(expand_binary_operators(vec![ident("a"), binary(":"), ident("b")]).unwrap())
        );
        assert_eq!(
            vec![
                Node::ident("x"),
                special(":", vec![Node::ident("a"), Node::ident("b")]),
                Node::ident("y"),
            ],
            nodes(expand_binary_operators(vec![ident("x"), ident("a"), binary(":"), ident("b"), ident("y")]).unwrap())
        );
        assert_eq!(
            vec![special(":", vec![Node::ident("a"), special(":", vec![Node::ident("b"), Node::ident("c")])])],
            nodes(expand_binary_operators(vec![ident("a"), binary(":"), ident("b"), binary(":"), ident("c")]).unwrap())
        );
    }

    #[test]
    fn dot_chains_fold_to_the_left() {
        assert_eq!(
            vec![special(".", vec![special(".", vec![Node::ident("a"), Node::ident("b")]), Node::ident("c")])],
            nodes(expand_binary_operators(vec![ident("a"), binary("."), ident("b"), binary("."), ident("c")]).unwrap())
        );
    }

    #[test]
    fn missing_operands_are_rejected() {
        assert!(expand_binary_operators(vec![ident("a"), binary(":")]).is_err());
        assert!(expand_binary_operators(vec![binary(":"), ident("a")]).is_err());
        assert!(expand_binary_operators(vec![ident("a"), binary(":"), Item::Rest]).is_err());
    }

    #[test]
    fn rest_markers_pass_through() {
        let items = expand_binary_operators(vec![ident("a"), Item::Rest, ident("b"), binary(":"), ident("c")]).unwrap();
        assert_eq!(3, items.len());
        match &items[1] {
            Item::Rest => (),
            other => panic!("expected the rest marker, got {:?}", other),
        }
    }
}
// }}}
