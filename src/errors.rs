use failure::Fail;

#[derive(Debug, Fail)]
pub enum ParseError {
    #[fail(display = "unbalanced tokens: '{}' is never closed", _0)]
    Unbalanced(String),

    #[fail(display = "encountered erroneous '{}'", _0)]
    UnexpectedCloser(String),

    #[fail(display = "cannot have a cdr without a car")]
    CdrWithoutCar,

    #[fail(display = "no cdr specified after explicit cdr")]
    NoCdrAfterRest,

    #[fail(display = "can only specify one cdr")]
    MultipleRests,

    #[fail(display = "unary operator '{}' must come before something", _0)]
    DanglingUnary(String),

    #[fail(display = "binary operator '{}' is missing an operand", _0)]
    MissingOperand(String),

    #[fail(display = "explicit cdr marker used outside of a form")]
    MisplacedRest,

    #[fail(display = "brackets nested deeper than {} levels", _0)]
    TooDeep(usize),

    #[fail(display = "integer literal '{}' is out of range", _0)]
    IntegerOutOfRange(String),
}

#[derive(Debug, Fail)]
pub enum RunError {
    #[fail(display = "identifier '{}' is not in scope", _0)]
    NotInScope(String),

    #[fail(display = "pattern did not match")]
    PatternMismatch,

    #[fail(display = "no pattern matched")]
    NoPatternMatched,

    #[fail(display = "cannot invoke unbound method")]
    UnboundMethod,

    #[fail(display = "you cannot rebind a method")]
    AlreadyBound,

    #[fail(display = "value `{}` (of type {}) is uncallable", name, typename)]
    UncallableValue { name: String, typename: String },

    #[fail(display = "{}: expected a {}, got a {} instead", name, expected, got)]
    TypeError {
        name: String,
        expected: String,
        got: String,
    },

    #[fail(display = "{}: expected {} params, got {} instead", name, expected, got)]
    WrongNumArgs {
        name: String,
        expected: usize,
        got: usize,
    },

    #[fail(display = "{}: {}", name, msg)]
    ProcError { name: String, msg: String },

    #[fail(display = "recursion limit exceeded (max depth {})", _0)]
    RecursionLimit(usize),

    #[fail(display = "{}: integer overflow", _0)]
    Overflow(String),

    #[fail(display = "{}: not yet implemented", _0)]
    Unimplemented(String),

    #[fail(display = "promise forced while it was being forced")]
    PromiseCycle,
}

/// true when `err` is a plain pattern mismatch (and not some other failure
/// raised while matching or running a body)
pub fn is_mismatch(err: &failure::Error) -> bool {
    match err.downcast_ref::<RunError>() {
        Some(RunError::PatternMismatch) => true,
        _ => false,
    }
}
