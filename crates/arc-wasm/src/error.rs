use arc_typeck::{ScopeError, TypeErrorKind};
use smol_str::SmolStr;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("cannot compile a program with {0} type error(s)")]
    TypeErrors(usize),

    #[error("no local allocated for '{0}'")]
    UnallocatedLocal(SmolStr),

    #[error("stateful variable '{0}' used outside of a task")]
    StatefulOutsideTask(SmolStr),

    #[error("unresolved symbol '{name}': {source}")]
    Unresolved { name: SmolStr, source: ScopeError },

    #[error("cannot convert {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("type {0} has no runtime representation")]
    UnsupportedType(String),

    #[error("invalid literal: {0}")]
    Literal(#[from] TypeErrorKind),

    #[error("host imports are disabled, but {0} needs the host runtime")]
    HostImportsDisabled(String),

    #[error("{0} require linear memory, which is disabled")]
    MemoryDisabled(String),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("in function '{name}': {source}")]
    Function {
        name: SmolStr,
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub(crate) fn unsupported(op: impl Into<String>) -> Self {
        CompileError::UnsupportedOperation(op.into())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("import '{module}.{name}' registered after local functions")]
    ImportAfterFunction { module: SmolStr, name: SmolStr },

    #[error("function index {0} was never declared")]
    UndeclaredFunction(u32),

    #[error("function '{0}' was declared without a body")]
    MissingBody(SmolStr),

    #[error("data segment requires linear memory")]
    DataWithoutMemory,
}
