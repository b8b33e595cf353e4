//! The host ABI: every function a compiled module may import from `env`.
//!
//! Typed imports are named `{family}_{op}_{suffix}`, where the suffix is a
//! [`PrimitiveType`]. These names are the contract a host runtime has to
//! implement, so they must stay stable.

use std::collections::HashMap;
use std::fmt;

use arc_ast::BinaryOp;
use arc_typeck::{Kind, Type};
use tracing::debug;
use wasm_encoder::ValType;

use crate::error::ModuleError;
use crate::module::{FuncType, ModuleBuilder};
use crate::types::kind_val_type;

pub const HOST_MODULE: &str = "env";

// ── Type suffixes ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
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
    Str,
}

impl PrimitiveType {
    pub const NUMERIC: [PrimitiveType; 10] = [
        PrimitiveType::I8,
        PrimitiveType::I16,
        PrimitiveType::I32,
        PrimitiveType::I64,
        PrimitiveType::U8,
        PrimitiveType::U16,
        PrimitiveType::U32,
        PrimitiveType::U64,
        PrimitiveType::F32,
        PrimitiveType::F64,
    ];

    /// Kinds a series can be negated over.
    pub const SIGNED: [PrimitiveType; 6] = [
        PrimitiveType::F64,
        PrimitiveType::F32,
        PrimitiveType::I64,
        PrimitiveType::I32,
        PrimitiveType::I16,
        PrimitiveType::I8,
    ];

    pub fn from_kind(kind: Kind) -> Self {
        match kind {
            Kind::I8 => PrimitiveType::I8,
            Kind::I16 => PrimitiveType::I16,
            Kind::I32 => PrimitiveType::I32,
            Kind::I64 => PrimitiveType::I64,
            Kind::U8 => PrimitiveType::U8,
            Kind::U16 => PrimitiveType::U16,
            Kind::U32 => PrimitiveType::U32,
            Kind::U64 => PrimitiveType::U64,
            Kind::F32 => PrimitiveType::F32,
            Kind::F64 => PrimitiveType::F64,
            Kind::String => PrimitiveType::Str,
        }
    }

    /// The suffix for a scalar type; `None` for anything else.
    pub fn of(ty: &Type) -> Option<Self> {
        ty.kind().map(Self::from_kind)
    }

    pub fn kind(self) -> Kind {
        match self {
            PrimitiveType::I8 => Kind::I8,
            PrimitiveType::I16 => Kind::I16,
            PrimitiveType::I32 => Kind::I32,
            PrimitiveType::I64 => Kind::I64,
            PrimitiveType::U8 => Kind::U8,
            PrimitiveType::U16 => Kind::U16,
            PrimitiveType::U32 => Kind::U32,
            PrimitiveType::U64 => Kind::U64,
            PrimitiveType::F32 => Kind::F32,
            PrimitiveType::F64 => Kind::F64,
            PrimitiveType::Str => Kind::String,
        }
    }

    pub fn suffix(self) -> &'static str {
        self.kind().name()
    }

    pub fn val_type(self) -> ValType {
        kind_val_type(self.kind())
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

// ── Operations ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub const ALL: [ArithOp; 5] = [ArithOp::Add, ArithOp::Mul, ArithOp::Sub, ArithOp::Div, ArithOp::Mod];

    /// Ops with a scalar-first variant (`rsub`, `rdiv`).
    pub const REVERSIBLE: [ArithOp; 2] = [ArithOp::Sub, ArithOp::Div];

    pub fn from_binary(op: BinaryOp) -> Option<Self> {
        Some(match op {
            BinaryOp::Add => ArithOp::Add,
            BinaryOp::Sub => ArithOp::Sub,
            BinaryOp::Mul => ArithOp::Mul,
            BinaryOp::Div => ArithOp::Div,
            BinaryOp::Mod => ArithOp::Mod,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
        }
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, ArithOp::Add | ArithOp::Mul)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Gt,
        CompareOp::Lt,
        CompareOp::Ge,
        CompareOp::Le,
        CompareOp::Eq,
        CompareOp::Ne,
    ];

    pub fn from_binary(op: BinaryOp) -> Option<Self> {
        Some(match op {
            BinaryOp::Gt => CompareOp::Gt,
            BinaryOp::Lt => CompareOp::Lt,
            BinaryOp::Ge => CompareOp::Ge,
            BinaryOp::Le => CompareOp::Le,
            BinaryOp::Eq => CompareOp::Eq,
            BinaryOp::Ne => CompareOp::Ne,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Gt => "gt",
            CompareOp::Lt => "lt",
            CompareOp::Ge => "ge",
            CompareOp::Le => "le",
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
        }
    }

    /// The operator that gives the same answer with operands swapped.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Le => CompareOp::Ge,
            other => other,
        }
    }
}

/// A family of imports registered once per primitive type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostOp {
    ChannelRead,
    ChannelBlockingRead,
    ChannelWrite,
    SeriesCreateEmpty,
    SeriesSetElement,
    SeriesIndex,
    /// `series op scalar`.
    SeriesElement(ArithOp),
    /// `scalar op series`, for the non-commutative ops.
    SeriesElementReverse(ArithOp),
    SeriesSeries(ArithOp),
    SeriesCompare(CompareOp),
    SeriesCompareScalar(CompareOp),
    SeriesNegate,
    StateLoad,
    StateStore,
    StateLoadSeries,
    StateStoreSeries,
    MathPow,
}

impl HostOp {
    fn prefix(self) -> String {
        match self {
            HostOp::ChannelRead => "channel_read".into(),
            HostOp::ChannelBlockingRead => "channel_blocking_read".into(),
            HostOp::ChannelWrite => "channel_write".into(),
            HostOp::SeriesCreateEmpty => "series_create_empty".into(),
            HostOp::SeriesSetElement => "series_set_element".into(),
            HostOp::SeriesIndex => "series_index".into(),
            HostOp::SeriesElement(op) => format!("series_element_{}", op.name()),
            HostOp::SeriesElementReverse(op) => format!("series_element_r{}", op.name()),
            HostOp::SeriesSeries(op) => format!("series_series_{}", op.name()),
            HostOp::SeriesCompare(op) => format!("series_compare_{}", op.name()),
            HostOp::SeriesCompareScalar(op) => format!("series_compare_{}_scalar", op.name()),
            HostOp::SeriesNegate => "series_negate".into(),
            HostOp::StateLoad => "state_load".into(),
            HostOp::StateStore => "state_store".into(),
            HostOp::StateLoadSeries => "state_load_series".into(),
            HostOp::StateStoreSeries => "state_store_series".into(),
            HostOp::MathPow => "math_pow".into(),
        }
    }

    pub fn import_name(self, ty: PrimitiveType) -> String {
        format!("{}_{}", self.prefix(), ty.suffix())
    }

    fn signature(self, ty: PrimitiveType) -> FuncType {
        use ValType::I32;
        let v = ty.val_type();
        match self {
            HostOp::ChannelRead | HostOp::ChannelBlockingRead => FuncType::new([I32], [v]),
            HostOp::ChannelWrite => FuncType::new([I32, v], []),
            HostOp::SeriesCreateEmpty | HostOp::SeriesNegate => FuncType::new([I32], [I32]),
            HostOp::SeriesSetElement => FuncType::new([I32, I32, v], [I32]),
            HostOp::SeriesIndex => FuncType::new([I32, I32], [v]),
            HostOp::SeriesElement(_) | HostOp::SeriesCompareScalar(_) => {
                FuncType::new([I32, v], [I32])
            }
            HostOp::SeriesElementReverse(_) => FuncType::new([v, I32], [I32]),
            HostOp::SeriesSeries(_) | HostOp::SeriesCompare(_) => FuncType::new([I32, I32], [I32]),
            HostOp::StateLoad => FuncType::new([I32, I32, v], [v]),
            HostOp::StateStore => FuncType::new([I32, I32, v], []),
            HostOp::StateLoadSeries => FuncType::new([I32, I32, I32], [I32]),
            HostOp::StateStoreSeries => FuncType::new([I32, I32, I32], []),
            HostOp::MathPow => FuncType::new([v, v], [v]),
        }
    }
}

/// Imports that exist once, independent of element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GenericOp {
    SeriesLen,
    SeriesSlice,
    SeriesNotU8,
    StringFromLiteral,
    StringConcat,
    StringEqual,
    StringLen,
    Now,
    Len,
    Panic,
}

impl GenericOp {
    pub fn name(self) -> &'static str {
        match self {
            GenericOp::SeriesLen => "series_len",
            GenericOp::SeriesSlice => "series_slice",
            GenericOp::SeriesNotU8 => "series_not_u8",
            GenericOp::StringFromLiteral => "string_from_literal",
            GenericOp::StringConcat => "string_concat",
            GenericOp::StringEqual => "string_equal",
            GenericOp::StringLen => "string_len",
            GenericOp::Now => "now",
            GenericOp::Len => "len",
            GenericOp::Panic => "panic",
        }
    }

    fn signature(self) -> FuncType {
        use ValType::{I32, I64};
        match self {
            GenericOp::SeriesLen | GenericOp::Len => FuncType::new([I32], [I64]),
            GenericOp::SeriesSlice => FuncType::new([I32, I32, I32], [I32]),
            GenericOp::SeriesNotU8 | GenericOp::StringLen => FuncType::new([I32], [I32]),
            GenericOp::StringFromLiteral | GenericOp::StringConcat | GenericOp::StringEqual => {
                FuncType::new([I32, I32], [I32])
            }
            GenericOp::Now => FuncType::new([], [I64]),
            GenericOp::Panic => FuncType::new([I32, I32], []),
        }
    }
}

// ── Registration ─────────────────────────────────────────────────

/// Call indices of every registered host import.
#[derive(Debug, Clone, Default)]
pub struct ImportIndex {
    typed: HashMap<(HostOp, PrimitiveType), u32>,
    generic: HashMap<GenericOp, u32>,
}

impl ImportIndex {
    /// Registers the complete host ABI. Must run before any local
    /// function is declared.
    pub fn register(module: &mut ModuleBuilder) -> Result<Self, ModuleError> {
        let mut index = ImportIndex::default();
        let string = PrimitiveType::Str;

        for ty in PrimitiveType::NUMERIC.into_iter().chain([string]) {
            for op in [HostOp::ChannelRead, HostOp::ChannelWrite, HostOp::ChannelBlockingRead] {
                index.add(module, op, ty)?;
            }
        }

        for ty in PrimitiveType::NUMERIC {
            for op in [HostOp::SeriesCreateEmpty, HostOp::SeriesSetElement, HostOp::SeriesIndex] {
                index.add(module, op, ty)?;
            }
            for op in ArithOp::ALL {
                index.add(module, HostOp::SeriesElement(op), ty)?;
            }
            for op in ArithOp::REVERSIBLE {
                index.add(module, HostOp::SeriesElementReverse(op), ty)?;
            }
            for op in ArithOp::ALL {
                index.add(module, HostOp::SeriesSeries(op), ty)?;
            }
            for op in CompareOp::ALL {
                index.add(module, HostOp::SeriesCompare(op), ty)?;
            }
            for op in CompareOp::ALL {
                index.add(module, HostOp::SeriesCompareScalar(op), ty)?;
            }
            index.add(module, HostOp::StateLoadSeries, ty)?;
            index.add(module, HostOp::StateStoreSeries, ty)?;
        }

        for ty in PrimitiveType::SIGNED {
            index.add(module, HostOp::SeriesNegate, ty)?;
        }
        index.add_generic(module, GenericOp::SeriesNotU8)?;

        for ty in PrimitiveType::NUMERIC.into_iter().chain([string]) {
            index.add(module, HostOp::StateLoad, ty)?;
            index.add(module, HostOp::StateStore, ty)?;
        }

        for op in [
            GenericOp::SeriesLen,
            GenericOp::SeriesSlice,
            GenericOp::StringFromLiteral,
            GenericOp::StringConcat,
            GenericOp::StringEqual,
            GenericOp::StringLen,
            GenericOp::Now,
            GenericOp::Len,
        ] {
            index.add_generic(module, op)?;
        }
        for ty in PrimitiveType::NUMERIC {
            index.add(module, HostOp::MathPow, ty)?;
        }
        index.add_generic(module, GenericOp::Panic)?;

        debug!(imports = index.len(), "registered host imports");
        Ok(index)
    }

    fn add(&mut self, module: &mut ModuleBuilder, op: HostOp, ty: PrimitiveType) -> Result<(), ModuleError> {
        let call = module.add_import(HOST_MODULE, &op.import_name(ty), op.signature(ty))?;
        self.typed.insert((op, ty), call);
        Ok(())
    }

    fn add_generic(&mut self, module: &mut ModuleBuilder, op: GenericOp) -> Result<(), ModuleError> {
        let call = module.add_import(HOST_MODULE, op.name(), op.signature())?;
        self.generic.insert(op, call);
        Ok(())
    }

    /// Call index of a typed import.
    ///
    /// # Panics
    ///
    /// If the combination was never registered. Callers that cannot rule
    /// that out use [`ImportIndex::try_get`].
    #[track_caller]
    pub fn get(&self, op: HostOp, ty: PrimitiveType) -> u32 {
        match self.typed.get(&(op, ty)) {
            Some(&call) => call,
            None => panic!("host import {} is not registered", op.import_name(ty)),
        }
    }

    pub fn try_get(&self, op: HostOp, ty: PrimitiveType) -> Option<u32> {
        self.typed.get(&(op, ty)).copied()
    }

    #[track_caller]
    pub fn generic(&self, op: GenericOp) -> u32 {
        match self.generic.get(&op) {
            Some(&call) => call,
            None => panic!("host import {} is not registered", op.name()),
        }
    }

    pub fn len(&self) -> usize {
        self.typed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.typed.is_empty() && self.generic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> (ModuleBuilder, ImportIndex) {
        let mut module = ModuleBuilder::new();
        let index = ImportIndex::register(&mut module).unwrap();
        (module, index)
    }

    fn name_at(module: &ModuleBuilder, call: u32) -> &str {
        &module.imports()[call as usize].name
    }

    #[test]
    fn import_names() {
        use PrimitiveType::*;
        assert_eq!(HostOp::ChannelRead.import_name(F32), "channel_read_f32");
        assert_eq!(HostOp::ChannelBlockingRead.import_name(Str), "channel_blocking_read_str");
        assert_eq!(HostOp::SeriesElementReverse(ArithOp::Sub).import_name(I64), "series_element_rsub_i64");
        assert_eq!(HostOp::SeriesSeries(ArithOp::Mod).import_name(U32), "series_series_mod_u32");
        assert_eq!(
            HostOp::SeriesCompareScalar(CompareOp::Ge).import_name(U8),
            "series_compare_ge_scalar_u8"
        );
        assert_eq!(HostOp::StateLoadSeries.import_name(F64), "state_load_series_f64");
        assert_eq!(HostOp::MathPow.import_name(U16), "math_pow_u16");
    }

    #[test]
    fn every_import_is_registered_once() {
        let (module, index) = registered();
        assert_eq!(index.len(), 371);
        assert_eq!(module.import_count() as usize, index.len());

        let mut names: Vec<&str> = module.imports().iter().map(|i| i.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), index.len());
        assert!(module.imports().iter().all(|i| i.module == HOST_MODULE));
    }

    #[test]
    fn indices_point_at_their_names() {
        let (module, index) = registered();
        let call = index.get(HostOp::StateStore, PrimitiveType::I64);
        assert_eq!(name_at(&module, call), "state_store_i64");
        let call = index.get(HostOp::SeriesNegate, PrimitiveType::I8);
        assert_eq!(name_at(&module, call), "series_negate_i8");
        assert_eq!(name_at(&module, index.generic(GenericOp::Now)), "now");
        assert_eq!(name_at(&module, index.generic(GenericOp::StringFromLiteral)), "string_from_literal");
    }

    #[test]
    fn signatures_use_the_element_value_type() {
        let (module, index) = registered();
        let call = index.get(HostOp::StateLoad, PrimitiveType::F32);
        let ty = &module.types()[module.imports()[call as usize].type_index as usize];
        assert_eq!(ty.params, [ValType::I32, ValType::I32, ValType::F32]);
        assert_eq!(ty.results, [ValType::F32]);

        let call = index.get(HostOp::SeriesElementReverse(ArithOp::Div), PrimitiveType::U64);
        let ty = &module.types()[module.imports()[call as usize].type_index as usize];
        assert_eq!(ty.params, [ValType::I64, ValType::I32]);
    }

    #[test]
    fn unsigned_series_cannot_be_negated() {
        let (_, index) = registered();
        assert_eq!(index.try_get(HostOp::SeriesNegate, PrimitiveType::U8), None);
        assert_eq!(index.try_get(HostOp::SeriesElementReverse(ArithOp::Add), PrimitiveType::I32), None);
    }

    #[test]
    #[should_panic(expected = "series_negate_u16")]
    fn unregistered_lookup_panics() {
        let (_, index) = registered();
        index.get(HostOp::SeriesNegate, PrimitiveType::U16);
    }

    #[test]
    fn registration_requires_no_local_functions() {
        let mut module = ModuleBuilder::new();
        module.declare_function("f", FuncType::new([], []), false);
        assert!(matches!(
            ImportIndex::register(&mut module),
            Err(ModuleError::ImportAfterFunction { .. })
        ));
    }

    #[test]
    fn registered_module_validates() {
        let (module, _) = registered();
        let bytes = module.finish().unwrap();
        wasmparser::Validator::new().validate_all(&bytes).unwrap();
    }

    #[test]
    fn compare_flip() {
        assert_eq!(CompareOp::Lt.flip(), CompareOp::Gt);
        assert_eq!(CompareOp::Ge.flip(), CompareOp::Le);
        assert_eq!(CompareOp::Eq.flip(), CompareOp::Eq);
    }
}
