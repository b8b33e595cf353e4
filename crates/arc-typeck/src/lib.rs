mod analyze;
mod check;
mod constraints;
mod error;
mod infer;
pub mod literal;
mod resolve;
mod scope;
mod types;
pub mod units;

pub use analyze::{analyze, Analysis};
pub use check::{
    assignment_compatible, check, check_assignment, compatible, is_narrowing,
    literal_assignment_compatible,
};
pub use constraints::{Constraint, ConstraintSystem};
pub use error::{TypeError, TypeErrorKind};
pub use infer::{builtin, castable, infer_expr, literal_var_name, Inference};
pub use literal::{parse_numeric, ParsedValue, Value};
pub use resolve::resolve_type_expr;
pub use scope::{Scope, ScopeError, ScopeId, ScopeTree, Symbol, SymbolKind};
pub use types::{equal, structural_match, FunctionType, Kind, Param, Type, VarConstraint};
pub use units::{Dimension, Unit};

#[cfg(test)]
mod tests;
