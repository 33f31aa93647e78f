use failure::Error;

use crate::builtins::Builtin;
use crate::errors::ParseError;
use crate::expand::{binary_operator, expand, unary_operator, Item};
use crate::syntax::Node;
use crate::values::{Symbol, Value};

/// separates the car items of a form from its explicit cdr
pub const REST_MARKER: &str = "|";

/// how deep brackets may nest before the reader gives up
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BracketKind {
    /// `( )`: an application
    Form,
    /// `[ ]`: `(list ...)`
    List,
    /// `#[ ]`: `(array ...)`
    Array,
    /// `#( )`: `(_sfn ...)`, a function over default arguments
    Shorthand,
    /// `{ }`: `(object ...)`
    Object,
    /// `#{ }`: `(dictionary ...)`
    Dictionary,
}

struct Bracket {
    open: &'static str,
    close: &'static str,
    kind: BracketKind,
}

const BRACKETS: &[Bracket] = &[
    Bracket { open: "(",  close: ")", kind: BracketKind::Form },
    Bracket { open: "[",  close: "]", kind: BracketKind::List },
    Bracket { open: "#[", close: "]", kind: BracketKind::Array },
    Bracket { open: "#(", close: ")", kind: BracketKind::Shorthand },
    Bracket { open: "{",  close: "}", kind: BracketKind::Object },
    Bracket { open: "#{", close: "}", kind: BracketKind::Dictionary },
];

fn opener(token: &str) -> Option<&'static Bracket> {
    BRACKETS.iter().find(|b| b.open == token)
}

fn is_closer(token: &str) -> bool {
    BRACKETS.iter().any(|b| b.close == token)
}

impl BracketKind {
    fn head(self) -> Option<Node> {
        let (label, builtin) = match self {
            BracketKind::Form       => return None,
            BracketKind::List       => ("_list", Builtin::List),
            BracketKind::Array      => ("_array", Builtin::Array),
            BracketKind::Shorthand  => ("_sfn", Builtin::FunctionShorthand),
            BracketKind::Object     => ("_object", Builtin::Object),
            BracketKind::Dictionary => ("_dictionary", Builtin::Dictionary),
        };
        Some(Node::Value(label, Value::Builtin(builtin)))
    }

    /// turn the expanded contents of a bracket pair into a node. empty
    /// lists and shorthand functions read as nil; objects and arrays still
    /// call their builtin
    fn construct(self, items: Vec<Item>) -> Result<Node, Error> {
        match self {
            BracketKind::List | BracketKind::Shorthand if items.is_empty() => return Ok(Node::Nil),
            _ => {}
        }
        match self.head() {
            None => parse_forms(items, true),
            Some(head) => Ok(Node::form(head, parse_forms(items, false)?)),
        }
    }
}

// {{{ lexer
fn is_separator(c: char) -> bool {
    match c {
        ' ' | '\t' | '\n' | '\r' | ',' => true,
        _ => false,
    }
}

fn is_boundary(token: &str) -> bool {
    token == REST_MARKER
        || binary_operator(token).is_some()
        || unary_operator(token).is_some()
        || opener(token).is_some()
        || is_closer(token)
}

fn push_item(item: &mut String, tokens: &mut Vec<String>) {
    if !item.is_empty() {
        tokens.push(item.clone());
        item.clear();
    }
}

/// split source code into tokens. two-character boundaries win over
/// one-character ones, so `::` and `#(` stay whole
pub fn lex(code: &str) -> Vec<String> {
    let chars: Vec<char> = code.chars().collect();
    let mut tokens: Vec<String> = Vec::new();
    let mut item = String::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == ';' {
            push_item(&mut item, &mut tokens);
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if let Some(&next) = chars.get(i + 1) {
            let pair: String = [c, next].iter().collect();
            if is_boundary(&pair) {
                push_item(&mut item, &mut tokens);
                tokens.push(pair);
                i += 2;
                continue;
            }
        }

        if is_separator(c) {
            push_item(&mut item, &mut tokens);
        } else if is_boundary(c.encode_utf8(&mut [0; 4])) {
            push_item(&mut item, &mut tokens);
            tokens.push(c.to_string());
        } else {
            item.push(c);
        }
        i += 1;
    }

    push_item(&mut item, &mut tokens);
    tokens
}
// }}}

// {{{ reader
/// `#` followed by letters, digits and hyphens
fn is_symbol(token: &str) -> bool {
    token.len() > 1
        && token.starts_with('#')
        && token[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// parse one token that is not a bracket
fn parse_single_token(token: &str) -> Result<Item, Error> {
    if token.chars().all(|c| c.is_ascii_digit()) {
        return match token.parse::<i64>() {
            Ok(n) => Ok(Item::Node(Node::Numeric(n))),
            Err(_) => Err(ParseError::IntegerOutOfRange(token.to_owned()).into()),
        };
    }
    if token == REST_MARKER {
        return Ok(Item::Rest);
    }
    if let Some(op) = binary_operator(token) {
        return Ok(Item::Binary(op));
    }
    if let Some(op) = unary_operator(token) {
        return Ok(Item::Unary(op));
    }
    if is_symbol(token) {
        return Ok(Item::Node(Node::Symbol(Symbol::new(&token[1..]))));
    }
    Ok(Item::Node(Node::ident(token)))
}

/// the tokens between an opener (already consumed) and its matching closer
fn matched_span<'t>(tokens: &'t [String], bracket: &Bracket) -> Result<&'t [String], Error> {
    let mut depth = 1;
    for (i, token) in tokens.iter().enumerate() {
        if token.as_str() == bracket.close {
            depth -= 1;
            if depth == 0 {
                return Ok(&tokens[..i]);
            }
        } else if opener(token).map_or(false, |b| b.close == bracket.close) {
            depth += 1;
        }
    }
    Err(ParseError::Unbalanced(bracket.open.to_owned()).into())
}

fn parse_nested(tokens: &[String], depth: usize) -> Result<Vec<Item>, Error> {
    if depth > MAX_NESTING {
        return Err(ParseError::TooDeep(MAX_NESTING).into());
    }

    let mut items = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if let Some(bracket) = opener(token) {
            let inner = matched_span(&tokens[i + 1..], bracket)?;
            let contents = expand(parse_nested(inner, depth + 1)?)?;
            items.push(Item::Node(bracket.kind.construct(contents)?));
            i += inner.len() + 2;
        } else if is_closer(token) {
            return Err(ParseError::UnexpectedCloser(token.to_owned()).into());
        } else {
            items.push(parse_single_token(token)?);
            i += 1;
        }
    }
    Ok(items)
}

/// parse a token stream into (unexpanded) items
pub fn parse(tokens: &[String]) -> Result<Vec<Item>, Error> {
    parse_nested(tokens, 0)
}

/// fold the items of one bracket level into a spine. an explicit cdr after
/// `|` replaces the terminating nil; a form needs at least its head
pub fn parse_forms(items: Vec<Item>, is_form: bool) -> Result<Node, Error> {
    let mut cars: Vec<Node> = Vec::with_capacity(items.len());
    let mut cdr: Option<Node> = None;
    let mut seen_rest = false;

    for item in items {
        match item {
            Item::Rest => {
                if seen_rest {
                    return Err(ParseError::MultipleRests.into());
                }
                if cars.is_empty() {
                    return Err(ParseError::CdrWithoutCar.into());
                }
                seen_rest = true;
            }
            Item::Node(node) => {
                if !seen_rest {
                    cars.push(node);
                } else if cdr.is_none() {
                    cdr = Some(node);
                } else {
                    return Err(ParseError::MultipleRests.into());
                }
            }
            Item::Unary(op) => return Err(ParseError::DanglingUnary(op.token.to_owned()).into()),
            Item::Binary(op) => return Err(ParseError::MissingOperand(op.token.to_owned()).into()),
        }
    }

    let tail = match (seen_rest, cdr) {
        (true, None) => return Err(ParseError::NoCdrAfterRest.into()),
        (_, Some(cdr)) => cdr,
        (false, None) => Node::Nil,
    };

    if cars.is_empty() {
        return Ok(Node::Nil);
    }

    if is_form {
        let mut cars = cars.into_iter();
        match cars.next() {
            Some(head) => Ok(Node::form(head, Node::spine(cars.collect(), tail))),
            None => Ok(Node::Nil),
        }
    } else {
        Ok(Node::spine(cars, tail))
    }
}

/// read source code into its top-level nodes
pub fn read(code: &str) -> Result<Vec<Node>, Error> {
    expand(parse(&lex(code))?)?
        .into_iter()
        .map(|item| match item {
            Item::Node(node) => Ok(node),
            Item::Rest => Err(ParseError::MisplacedRest.into()),
            Item::Unary(op) => Err(ParseError::DanglingUnary(op.token.to_owned()).into()),
            Item::Binary(op) => Err(ParseError::MissingOperand(op.token.to_owned()).into()),
        })
        .collect()
}
// }}}

// }}}
