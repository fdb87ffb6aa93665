use crate::language::span::Span;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// An evaluation failure tied to the source position it was raised at.
/// The innermost position wins: errors keep the span of the node that
/// raised them, not of enclosing nodes.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub span: Span,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Clone, Debug, Error)]
pub enum ErrorKind {
    #[error("malformed number literal `{text}`")]
    MalformedNumber { text: String },
    #[error("undefined symbol `{name}`")]
    UndefinedSymbol { name: String },
    #[error("undefined type `{name}`")]
    UndefinedType { name: String },
    #[error("invalid operation '{name}'")]
    InvalidMember { name: String },
    #[error("no member named '{name}' for struct")]
    NoField { name: String },
    #[error("member '{name}' is not assignable")]
    NotAssignable { name: String },
    #[error("type {kind} does not support {op} operation")]
    UnsupportedOperation {
        kind: &'static str,
        op: &'static str,
    },
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("index must be a number")]
    IndexNotNumber,
    #[error("invalid slice index")]
    InvalidSliceRange,
    #[error("invalid type conversion")]
    InvalidTypeConversion,
    #[error("type {kind} cannot be used as a map key")]
    InvalidMapKey { kind: &'static str },
    #[error("unknown operator '{op}'")]
    UnknownOperator { op: String },
    #[error("type cannot be nil for {what}")]
    NilType { what: &'static str },
    #[error("invalid operation for chan")]
    InvalidChanOperation,
    #[error("failed to send to channel")]
    ChanSendFailed,
    #[error("channel construction failed: {message}")]
    ChanConstruction { message: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("type {kind} is not callable")]
    NotCallable { kind: &'static str },
    #[error("function `{name}` expected {expected} arguments but received {received}")]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("invalid assignment target")]
    InvalidAssignTarget,
    #[error("invalid operation for the value")]
    InvalidOperand,
    #[error("cannot dereference the value")]
    DerefNonPointer,
    #[error("expression nesting exceeds depth limit {limit}")]
    TooDeep { limit: usize },
}

impl ErrorKind {
    pub fn at(self, span: Span) -> RuntimeError {
        RuntimeError::new(self, span)
    }
}
