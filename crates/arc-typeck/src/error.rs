use arc_ast::Span;
use smol_str::SmolStr;

use crate::scope::{ScopeError, SymbolKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{}:{}] {}", .span.start, .span.end, .kind)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// The diagnostic text without its location prefix.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeErrorKind {
    #[error("type mismatch: expected {expected}, got {actual} in {reason}")]
    Mismatch {
        expected: String,
        actual: String,
        reason: String,
    },

    #[error("type mismatch: unit {expected} does not match {actual} in {reason}")]
    UnitMismatch {
        expected: String,
        actual: String,
        reason: String,
    },

    #[error("unknown type: {0}")]
    UnknownType(SmolStr),

    #[error("series must have primitive type, got {0}")]
    SeriesElement(String),

    #[error("unknown unit: {0}")]
    UnknownUnit(SmolStr),

    #[error("cannot convert {from} to {to}: incompatible dimensions")]
    IncompatibleUnits { from: SmolStr, to: SmolStr },

    #[error("{0}")]
    LiteralRange(String),

    #[error("invalid numeric literal '{0}'")]
    MalformedLiteral(SmolStr),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("cannot assign to {kind} '{name}'")]
    InvalidAssignment { name: SmolStr, kind: SymbolKind },

    #[error("function '{name}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        name: SmolStr,
        expected: usize,
        actual: usize,
    },

    #[error("'{0}' is not a function")]
    NotCallable(SmolStr),

    #[error("cannot index into {0}")]
    NotIndexable(String),

    #[error("'{0}' is not a channel")]
    NotAChannel(SmolStr),

    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String },

    #[error("config parameter '{param}' of '{function}' has no default")]
    MissingConfig { function: SmolStr, param: SmolStr },

    #[error("default value of '{0}' must be a literal")]
    NonLiteralDefault(SmolStr),

    #[error("function '{name}' must return a value of type {ty}")]
    MissingReturnValue { name: SmolStr, ty: String },

    #[error("function '{0}' does not return a value")]
    UnexpectedReturnValue(SmolStr),

    #[error("incompatible units in operands of '{op}': {left} and {right}")]
    IncompatibleOperandUnits {
        op: SmolStr,
        left: SmolStr,
        right: SmolStr,
    },

    #[error("exponent must be dimensionless, got unit {0}")]
    DimensionedExponent(SmolStr),

    #[error("exponent must be numeric, got {0}")]
    NonNumericExponent(String),

    #[error("base with unit {0} requires a literal integer exponent")]
    NonLiteralExponent(SmolStr),
}
