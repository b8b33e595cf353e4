pub mod build;

use la_arena::{Arena, Idx};
use smol_str::SmolStr;

pub use build::ProgramBuilder;

// ── Spans ─────────────────────────────────────────────────────────

/// Byte range of a node in the source it was parsed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ── ID types ──────────────────────────────────────────────────────

pub type ExprId = Idx<Expr>;
pub type StmtId = Idx<Stmt>;
pub type TypeExprId = Idx<TypeExpr>;

// ── Program ───────────────────────────────────────────────────────

/// A parsed compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
    pub exprs: Arena<Expr>,
    pub stmts: Arena<Stmt>,
    pub type_exprs: Arena<TypeExpr>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.items.iter().map(|item| match item {
            Item::Function(f) => f,
        })
    }
}

// ── Top-level items ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Item {
    Function(FunctionDecl),
}

/// Name of the output that doubles as a function's return value.
pub const DEFAULT_OUTPUT: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Plain function, invoked and forgotten.
    Func,
    /// Invoked once per cycle by the host; may own stateful variables.
    Task,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: SmolStr,
    pub kind: FunctionKind,
    pub config: Vec<ParamDecl>,
    pub inputs: Vec<ParamDecl>,
    pub outputs: Vec<ParamDecl>,
    pub body: Block,
    pub span: Span,
}

impl FunctionDecl {
    /// The output returned directly, if this function has exactly one
    /// output and it carries the default name.
    pub fn return_output(&self) -> Option<&ParamDecl> {
        match self.outputs.as_slice() {
            [only] if only.name == DEFAULT_OUTPUT => Some(only),
            _ => None,
        }
    }

    /// True when outputs are written to memory rather than returned.
    pub fn has_named_outputs(&self) -> bool {
        !self.outputs.is_empty() && self.return_output().is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: SmolStr,
    pub ty: TypeExprId,
    pub default: Option<ExprId>,
    pub span: Span,
}

// ── Type expressions ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExprKind {
    /// `f32`, `i64 psi`
    Named { name: SmolStr, unit: Option<SmolStr> },
    /// `chan T`
    Chan(TypeExprId),
    /// `series T`
    Series(TypeExprId),
}

// ── Statements ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<StmtId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `name [type] := value`, or `name [type] $= value` when stateful.
    VarDecl {
        name: SmolStr,
        ty: Option<TypeExprId>,
        value: ExprId,
        stateful: bool,
    },
    /// `name = value`
    Assign { name: SmolStr, value: ExprId },
    If {
        condition: ExprId,
        body: Block,
        else_ifs: Vec<ElseIf>,
        else_body: Option<Block>,
    },
    Return(Option<ExprId>),
    /// `value -> channel`
    ChannelWrite { value: ExprId, channel: SmolStr },
    /// `name := channel`, or `name := <-channel` when blocking.
    ChannelRead {
        name: SmolStr,
        channel: SmolStr,
        blocking: bool,
    },
    Expr(ExprId),
}

#[derive(Debug, Clone)]
pub struct ElseIf {
    pub condition: ExprId,
    pub body: Block,
}

// ── Expressions ───────────────────────────────────────────────────
//
// One node type per precedence level, outermost first. Every level
// holds at least one operand of the next level down; a level with no
// trailing operands is transparent.

#[derive(Debug, Clone)]
pub struct Expr {
    pub root: LogicalOr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LogicalOr {
    pub first: LogicalAnd,
    pub rest: Vec<LogicalAnd>,
}

#[derive(Debug, Clone)]
pub struct LogicalAnd {
    pub first: Equality,
    pub rest: Vec<Equality>,
}

#[derive(Debug, Clone)]
pub struct Equality {
    pub first: Relational,
    pub rest: Vec<(EqualityOp, Relational)>,
}

#[derive(Debug, Clone)]
pub struct Relational {
    pub first: Additive,
    pub rest: Vec<(RelationalOp, Additive)>,
}

#[derive(Debug, Clone)]
pub struct Additive {
    pub first: Multiplicative,
    pub rest: Vec<(AdditiveOp, Multiplicative)>,
}

#[derive(Debug, Clone)]
pub struct Multiplicative {
    pub first: Power,
    pub rest: Vec<(MultiplicativeOp, Power)>,
}

/// `base ^ exponent`, right-associative.
#[derive(Debug, Clone)]
pub struct Power {
    pub base: Unary,
    pub exponent: Option<Box<Power>>,
}

#[derive(Debug, Clone)]
pub enum Unary {
    Neg(Box<Unary>),
    Not(Box<Unary>),
    Postfix(Postfix),
}

#[derive(Debug, Clone)]
pub struct Postfix {
    pub primary: Primary,
    pub suffixes: Vec<Suffix>,
}

#[derive(Debug, Clone)]
pub enum Suffix {
    Call(Vec<ExprId>),
    Index(ExprId),
    Slice {
        start: Option<ExprId>,
        end: Option<ExprId>,
    },
}

#[derive(Debug, Clone)]
pub enum Primary {
    Ident { name: SmolStr, span: Span },
    Literal(Literal),
    Paren(ExprId),
    /// `T(value)`
    Cast { ty: TypeExprId, value: ExprId },
    /// `[a, b, c]`
    Series { elems: Vec<ExprId>, span: Span },
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub kind: LiteralKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum LiteralKind {
    /// Numeric text as written, with an optional unit suffix (`5psi`).
    Number { text: SmolStr, unit: Option<SmolStr> },
    Str(String),
    Bool(bool),
}

impl LiteralKind {
    pub fn is_number(&self) -> bool {
        matches!(self, LiteralKind::Number { .. })
    }
}

/// Numeric literals are floats exactly when their text has a decimal
/// point or an exponent.
pub fn is_float_text(text: &str) -> bool {
    text.contains(['.', 'e', 'E'])
}

// ── Operators ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EqualityOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdditiveOp {
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiplicativeOp {
    Mul,
    Div,
    Mod,
}

/// Every binary operator, flattened across precedence levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }
}

impl From<EqualityOp> for BinaryOp {
    fn from(op: EqualityOp) -> Self {
        match op {
            EqualityOp::Eq => BinaryOp::Eq,
            EqualityOp::Ne => BinaryOp::Ne,
        }
    }
}

impl From<RelationalOp> for BinaryOp {
    fn from(op: RelationalOp) -> Self {
        match op {
            RelationalOp::Lt => BinaryOp::Lt,
            RelationalOp::Le => BinaryOp::Le,
            RelationalOp::Gt => BinaryOp::Gt,
            RelationalOp::Ge => BinaryOp::Ge,
        }
    }
}

impl From<AdditiveOp> for BinaryOp {
    fn from(op: AdditiveOp) -> Self {
        match op {
            AdditiveOp::Add => BinaryOp::Add,
            AdditiveOp::Sub => BinaryOp::Sub,
        }
    }
}

impl From<MultiplicativeOp> for BinaryOp {
    fn from(op: MultiplicativeOp) -> Self {
        match op {
            MultiplicativeOp::Mul => BinaryOp::Mul,
            MultiplicativeOp::Div => BinaryOp::Div,
            MultiplicativeOp::Mod => BinaryOp::Mod,
        }
    }
}

// ── Ladder lifting ────────────────────────────────────────────────
//
// Wrapping a lower level as a single-operand higher level.

impl From<Primary> for Postfix {
    fn from(primary: Primary) -> Self {
        Postfix {
            primary,
            suffixes: Vec::new(),
        }
    }
}

impl From<Postfix> for Unary {
    fn from(postfix: Postfix) -> Self {
        Unary::Postfix(postfix)
    }
}

impl From<Unary> for Power {
    fn from(base: Unary) -> Self {
        Power {
            base,
            exponent: None,
        }
    }
}

macro_rules! lift {
    ($($higher:ident <- $lower:ident),* $(,)?) => {
        $(
            impl From<$lower> for $higher {
                fn from(first: $lower) -> Self {
                    $higher {
                        first,
                        rest: Vec::new(),
                    }
                }
            }
        )*
    };
}

lift! {
    Multiplicative <- Power,
    Additive <- Multiplicative,
    Relational <- Additive,
    Equality <- Relational,
    LogicalAnd <- Equality,
    LogicalOr <- LogicalAnd,
}

impl LogicalOr {
    pub fn from_unary(unary: Unary) -> Self {
        let power = Power::from(unary);
        let mul = Multiplicative::from(power);
        let add = Additive::from(mul);
        let rel = Relational::from(add);
        let eq = Equality::from(rel);
        let and = LogicalAnd::from(eq);
        LogicalOr::from(and)
    }

    pub fn from_primary(primary: Primary) -> Self {
        Self::from_unary(Unary::Postfix(Postfix::from(primary)))
    }

    /// The unary node this chain reduces to, if no level above it
    /// carries an operator.
    pub fn as_unary(&self) -> Option<&Unary> {
        if !self.rest.is_empty() {
            return None;
        }
        self.first.as_unary()
    }
}

impl LogicalAnd {
    pub fn as_unary(&self) -> Option<&Unary> {
        if !self.rest.is_empty() {
            return None;
        }
        self.first.as_unary()
    }
}

impl Equality {
    pub fn as_unary(&self) -> Option<&Unary> {
        if !self.rest.is_empty() {
            return None;
        }
        self.first.as_unary()
    }
}

impl Relational {
    pub fn as_unary(&self) -> Option<&Unary> {
        if !self.rest.is_empty() {
            return None;
        }
        self.first.as_unary()
    }
}

impl Additive {
    pub fn as_unary(&self) -> Option<&Unary> {
        if !self.rest.is_empty() {
            return None;
        }
        self.first.as_unary()
    }
}

impl Multiplicative {
    pub fn as_unary(&self) -> Option<&Unary> {
        if !self.rest.is_empty() {
            return None;
        }
        self.first.as_unary()
    }
}

impl Power {
    pub fn as_unary(&self) -> Option<&Unary> {
        match self.exponent {
            Some(_) => None,
            None => Some(&self.base),
        }
    }
}

impl Unary {
    pub fn as_primary(&self) -> Option<&Primary> {
        match self {
            Unary::Postfix(p) if p.suffixes.is_empty() => Some(&p.primary),
            _ => None,
        }
    }
}

impl Program {
    /// The literal an expression consists of, looking through
    /// parentheses. The flag is set when the literal is negated.
    pub fn literal_of(&self, id: ExprId) -> Option<(&Literal, bool)> {
        let unary = self.exprs[id].root.as_unary()?;
        self.literal_of_unary(unary)
    }

    pub fn literal_of_unary<'a>(&'a self, unary: &'a Unary) -> Option<(&'a Literal, bool)> {
        match unary {
            Unary::Neg(inner) => {
                let (lit, negated) = self.literal_of_unary(inner)?;
                lit.kind.is_number().then_some((lit, !negated))
            }
            Unary::Not(_) => None,
            Unary::Postfix(_) => match unary.as_primary()? {
                Primary::Literal(lit) => Some((lit, false)),
                Primary::Paren(inner) => self.literal_of(*inner),
                _ => None,
            },
        }
    }
}
