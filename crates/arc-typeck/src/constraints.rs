use arc_ast::Span;

use crate::types::Type;

/// An obligation that two types unify once variables are solved.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub left: Type,
    pub right: Type,
    pub source: Span,
    /// Human-readable trail, e.g. `"assignment (element types)"`.
    pub reason: String,
}

/// Append-only ledger of equality constraints, consumed by the solver.
#[derive(Clone, Debug, Default)]
pub struct ConstraintSystem {
    constraints: Vec<Constraint>,
}

impl ConstraintSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_equality(&mut self, left: Type, right: Type, source: Span, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::trace!(%left, %right, %reason, "equality constraint");
        self.constraints.push(Constraint {
            left,
            right,
            source,
            reason,
        });
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }
}
