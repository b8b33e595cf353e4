use smol_str::SmolStr;
use std::fmt;

use crate::literal::Value;
use crate::units::Unit;

// ── Kinds ────────────────────────────────────────────────────────

/// Primitive value kinds a scalar type can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
}

impl Kind {
    pub const NUMERIC: [Kind; 10] = [
        Kind::I8,
        Kind::I16,
        Kind::I32,
        Kind::I64,
        Kind::U8,
        Kind::U16,
        Kind::U32,
        Kind::U64,
        Kind::F32,
        Kind::F64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::I8 => "i8",
            Kind::I16 => "i16",
            Kind::I32 => "i32",
            Kind::I64 => "i64",
            Kind::U8 => "u8",
            Kind::U16 => "u16",
            Kind::U32 => "u32",
            Kind::U64 => "u64",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::String => "str",
        }
    }

    pub fn from_name(name: &str) -> Option<Kind> {
        Some(match name {
            "i8" => Kind::I8,
            "i16" => Kind::I16,
            "i32" => Kind::I32,
            "i64" => Kind::I64,
            "u8" => Kind::U8,
            "u16" => Kind::U16,
            "u32" => Kind::U32,
            "u64" => Kind::U64,
            "f32" => Kind::F32,
            "f64" => Kind::F64,
            "str" | "string" => Kind::String,
            _ => return None,
        })
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Kind::I8 | Kind::I16 | Kind::I32 | Kind::I64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Kind::U8 | Kind::U16 | Kind::U32 | Kind::U64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Kind::F32 | Kind::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits of a numeric kind; 0 for strings.
    pub fn bits(self) -> u32 {
        match self {
            Kind::I8 | Kind::U8 => 8,
            Kind::I16 | Kind::U16 => 16,
            Kind::I32 | Kind::U32 | Kind::F32 => 32,
            Kind::I64 | Kind::U64 | Kind::F64 => 64,
            Kind::String => 0,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Restriction carried by a type variable for the downstream solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarConstraint {
    IntegerConstant,
    FloatConstant,
}

impl fmt::Display for VarConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarConstraint::IntegerConstant => write!(f, "integer"),
            VarConstraint::FloatConstant => write!(f, "float"),
        }
    }
}

// ── Types ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: SmolStr,
    pub ty: Type,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<SmolStr>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionType {
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub config: Vec<Param>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// Already-reported failure; compatible with everything.
    Invalid,
    Scalar {
        kind: Kind,
        unit: Option<Unit>,
    },
    Chan(Box<Type>),
    Series(Box<Type>),
    /// Unresolved type, identified by the source position that created it.
    Variable {
        name: SmolStr,
        constraint: Option<VarConstraint>,
        unit: Option<Unit>,
    },
    Function(Box<FunctionType>),
}

impl Type {
    pub fn scalar(kind: Kind) -> Type {
        Type::Scalar { kind, unit: None }
    }

    pub fn i8() -> Type {
        Type::scalar(Kind::I8)
    }

    pub fn i16() -> Type {
        Type::scalar(Kind::I16)
    }

    pub fn i32() -> Type {
        Type::scalar(Kind::I32)
    }

    pub fn i64() -> Type {
        Type::scalar(Kind::I64)
    }

    pub fn u8() -> Type {
        Type::scalar(Kind::U8)
    }

    pub fn u16() -> Type {
        Type::scalar(Kind::U16)
    }

    pub fn u32() -> Type {
        Type::scalar(Kind::U32)
    }

    pub fn u64() -> Type {
        Type::scalar(Kind::U64)
    }

    pub fn f32() -> Type {
        Type::scalar(Kind::F32)
    }

    pub fn f64() -> Type {
        Type::scalar(Kind::F64)
    }

    pub fn string() -> Type {
        Type::scalar(Kind::String)
    }

    pub fn chan(elem: Type) -> Type {
        Type::Chan(Box::new(elem))
    }

    pub fn series(elem: Type) -> Type {
        Type::Series(Box::new(elem))
    }

    pub fn variable(name: impl Into<SmolStr>, constraint: Option<VarConstraint>) -> Type {
        Type::Variable {
            name: name.into(),
            constraint,
            unit: None,
        }
    }

    pub fn function(ty: FunctionType) -> Type {
        Type::Function(Box::new(ty))
    }

    /// Attaches a unit to a scalar or variable; other types are returned
    /// unchanged.
    pub fn with_unit(self, unit: Unit) -> Type {
        match self {
            Type::Scalar { kind, .. } => Type::Scalar {
                kind,
                unit: Some(unit),
            },
            Type::Variable {
                name, constraint, ..
            } => Type::Variable {
                name,
                constraint,
                unit: Some(unit),
            },
            other => other,
        }
    }

    /// The wrapped element of a channel or series, otherwise the type
    /// itself. Only one level is removed.
    pub fn unwrap_elem(&self) -> Type {
        match self {
            Type::Chan(elem) | Type::Series(elem) => (**elem).clone(),
            other => other.clone(),
        }
    }

    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Chan(elem) | Type::Series(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Type::Variable { .. })
    }

    pub fn is_chan(&self) -> bool {
        matches!(self, Type::Chan(_))
    }

    pub fn is_series(&self) -> bool {
        matches!(self, Type::Series(_))
    }

    pub fn is_wrapper(&self) -> bool {
        self.is_chan() || self.is_series()
    }

    pub fn kind(&self) -> Option<Kind> {
        match self {
            Type::Scalar { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Type::Scalar { unit, .. } | Type::Variable { unit, .. } => unit.as_ref(),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_some_and(Kind::is_numeric)
    }

    pub fn is_integer(&self) -> bool {
        self.kind().is_some_and(Kind::is_integer)
    }

    pub fn is_float(&self) -> bool {
        self.kind().is_some_and(Kind::is_float)
    }

    pub fn is_string(&self) -> bool {
        self.kind() == Some(Kind::String)
    }

    pub fn contains_variable(&self) -> bool {
        match self {
            Type::Variable { .. } => true,
            Type::Chan(elem) | Type::Series(elem) => elem.contains_variable(),
            _ => false,
        }
    }
}

/// Identical kind and identical unit, including absence of a unit.
pub fn equal(t1: &Type, t2: &Type) -> bool {
    t1 == t2
}

/// Same chan/series nesting at every level, ignoring what is wrapped.
/// A variable matches any shape, since the solver may bind it to one.
pub fn structural_match(t1: &Type, t2: &Type) -> bool {
    match (t1, t2) {
        (Type::Variable { .. }, _) | (_, Type::Variable { .. }) => true,
        (Type::Chan(a), Type::Chan(b)) | (Type::Series(a), Type::Series(b)) => {
            structural_match(a, b)
        }
        (Type::Chan(_) | Type::Series(_), _) | (_, Type::Chan(_) | Type::Series(_)) => false,
        _ => true,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Invalid => write!(f, "invalid"),
            Type::Scalar { kind, unit: None } => write!(f, "{}", kind),
            Type::Scalar {
                kind,
                unit: Some(unit),
            } => write!(f, "{} {}", kind, unit),
            Type::Chan(elem) => write!(f, "chan {}", elem),
            Type::Series(elem) => write!(f, "series {}", elem),
            Type::Variable {
                name,
                constraint,
                unit,
            } => {
                write!(f, "{}", name)?;
                if let Some(c) = constraint {
                    write!(f, ":{}", c)?;
                }
                if let Some(u) = unit {
                    write!(f, " {}", u)?;
                }
                Ok(())
            }
            Type::Function(func) => {
                write!(f, "func(")?;
                for (i, p) in func.inputs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", p.name, p.ty)?;
                }
                write!(f, ")")?;
                match func.outputs.as_slice() {
                    [] => Ok(()),
                    [only] => write!(f, " {}", only.ty),
                    many => {
                        write!(f, " (")?;
                        for (i, p) in many.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{} {}", p.name, p.ty)?;
                        }
                        write!(f, ")")
                    }
                }
            }
        }
    }
}
