pub mod bindings;
mod config;
mod convert;
pub mod encoder;
mod error;
mod expr;
pub mod module;
mod stmt;
mod types;

use std::collections::HashMap;

use arc_ast::{FunctionDecl, FunctionKind, Program, StmtKind};
use arc_typeck::{Analysis, FunctionType, ScopeError, ScopeId, Symbol, Type};
use smol_str::SmolStr;
use tracing::{debug, instrument, trace};
use wasm_encoder::ValType;

pub use bindings::{
    ArithOp, CompareOp, GenericOp, HostOp, ImportIndex, PrimitiveType, HOST_MODULE,
};
pub use config::CompilerConfig;
pub use encoder::Encoder;
pub use error::{CompileError, ModuleError};
pub use module::{FuncType, ModuleBuilder, MEMORY_EXPORT};
pub use types::{is_concrete, kind_val_type, val_type};

// ── Output ───────────────────────────────────────────────────────

/// Memory region a multi-output function writes to.
///
/// The first 8 bytes are a bitmask of outputs written during the current
/// invocation; output `i` lives at `base + 8 + 8 * i`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    pub base: u32,
    pub slots: Vec<(SmolStr, ValType)>,
}

impl OutputLayout {
    pub fn dirty_mask_address(&self) -> u32 {
        self.base
    }

    pub fn slot_address(&self, position: usize) -> u32 {
        self.base + 8 + 8 * position as u32
    }

    pub fn size(&self) -> u32 {
        8 + 8 * self.slots.len() as u32
    }
}

#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: SmolStr,
    /// Call index, counting imports.
    pub index: u32,
    pub kind: FunctionKind,
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
    /// Locals beyond the parameters.
    pub locals: Vec<ValType>,
    /// Instruction bytes, ending in `end`.
    pub body: Vec<u8>,
    pub outputs: Option<OutputLayout>,
}

#[derive(Debug)]
pub struct Output {
    pub wasm: Vec<u8>,
    pub functions: Vec<CompiledFunction>,
    pub imports: Option<ImportIndex>,
}

impl Output {
    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Compiles an analyzed program into a WebAssembly module.
///
/// The analysis must be free of errors. Each `task` gets the task id of
/// its position in the program, which keys its stateful variables.
#[instrument(level = "debug", skip_all)]
pub fn compile(
    program: &Program,
    analysis: &Analysis,
    config: &CompilerConfig,
) -> Result<Output, CompileError> {
    if !analysis.is_ok() {
        return Err(CompileError::TypeErrors(analysis.errors.len()));
    }
    Compiler::new(program, analysis, config).run()
}

// ── Compiler ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct Local {
    pub(crate) slot: u32,
    pub(crate) ty: Type,
}

/// Per-function compilation state.
#[derive(Debug)]
pub(crate) struct FunctionState {
    pub(crate) code: Encoder,
    pub(crate) scope: ScopeId,
    pub(crate) task: Option<u32>,
    pub(crate) return_type: Option<Type>,
    pub(crate) outputs: Option<OutputLayout>,
    locals: HashMap<SmolStr, Local>,
    slot_types: Vec<ValType>,
    param_count: usize,
}

impl FunctionState {
    fn new(scope: ScopeId) -> Self {
        Self {
            code: Encoder::new(),
            scope,
            task: None,
            return_type: None,
            outputs: None,
            locals: HashMap::new(),
            slot_types: Vec::new(),
            param_count: 0,
        }
    }

    fn add_param(&mut self, name: &SmolStr, ty: Type, vt: ValType) {
        let slot = self.alloc(vt);
        self.locals.insert(name.clone(), Local { slot, ty });
        self.param_count += 1;
    }

    /// Binds `name` to a local of type `vt`, reusing the slot of an
    /// earlier declaration with the same name and value type.
    pub(crate) fn declare(&mut self, name: &SmolStr, ty: Type, vt: ValType) -> u32 {
        if let Some(local) = self.locals.get_mut(name) {
            if self.slot_types[local.slot as usize] == vt {
                local.ty = ty;
                return local.slot;
            }
        }
        let slot = self.alloc(vt);
        self.locals.insert(name.clone(), Local { slot, ty });
        slot
    }

    /// A fresh unnamed local.
    pub(crate) fn alloc(&mut self, vt: ValType) -> u32 {
        self.slot_types.push(vt);
        self.slot_types.len() as u32 - 1
    }

    pub(crate) fn local(&self, name: &SmolStr) -> Result<&Local, CompileError> {
        self.locals
            .get(name)
            .ok_or_else(|| CompileError::UnallocatedLocal(name.clone()))
    }

    fn extra_locals(&self) -> Vec<ValType> {
        self.slot_types[self.param_count..].to_vec()
    }
}

pub(crate) struct Compiler<'a> {
    pub(crate) program: &'a Program,
    pub(crate) analysis: &'a Analysis,
    pub(crate) config: &'a CompilerConfig,
    pub(crate) module: ModuleBuilder,
    pub(crate) imports: Option<ImportIndex>,
    pub(crate) function_indices: HashMap<SmolStr, u32>,
    pub(crate) func: FunctionState,
}

struct Declared<'a> {
    decl: &'a FunctionDecl,
    sig: &'a FunctionType,
    index: u32,
    params: Vec<ValType>,
    results: Vec<ValType>,
    outputs: Option<OutputLayout>,
}

impl<'a> Compiler<'a> {
    fn new(program: &'a Program, analysis: &'a Analysis, config: &'a CompilerConfig) -> Self {
        Self {
            program,
            analysis,
            config,
            module: ModuleBuilder::new(),
            imports: None,
            function_indices: HashMap::new(),
            func: FunctionState::new(analysis.scopes.root()),
        }
    }

    fn run(mut self) -> Result<Output, CompileError> {
        if self.config.host_imports {
            self.imports = Some(ImportIndex::register(&mut self.module)?);
        }
        if self.config.memory {
            self.module.enable_memory(self.config.memory_pages);
        }

        let declared = self.declare_functions()?;
        let mut functions = Vec::with_capacity(declared.len());
        for (position, function) in declared.into_iter().enumerate() {
            let name = function.decl.name.clone();
            let compiled = self
                .function(position, function)
                .map_err(|source| CompileError::Function {
                    name,
                    source: Box::new(source),
                })?;
            self.module
                .define_function(compiled.index, compiled.locals.clone(), compiled.body.clone())?;
            functions.push(compiled);
        }

        let data = self.module.data_len();
        let outputs_start = functions
            .iter()
            .filter_map(|f| f.outputs.as_ref())
            .map(|layout| layout.base)
            .min();
        if let Some(base) = outputs_start.filter(|base| data > *base) {
            return Err(CompileError::unsupported(format!(
                "{} bytes of string data overlap output memory at {:#x}",
                data, base
            )));
        }

        let wasm = self.module.finish()?;
        debug!(functions = functions.len(), bytes = wasm.len(), "compiled program");
        Ok(Output {
            wasm,
            functions,
            imports: self.imports,
        })
    }

    /// Declares every function up front so bodies can call functions
    /// defined later in the program.
    fn declare_functions(&mut self) -> Result<Vec<Declared<'a>>, CompileError> {
        let (program, analysis) = (self.program, self.analysis);
        let mut next_output = self.config.output_memory_base;
        let mut declared = Vec::new();

        for decl in program.functions() {
            let sig = analysis
                .function(&decl.name)
                .ok_or_else(|| CompileError::Unresolved {
                    name: decl.name.clone(),
                    source: ScopeError::Undefined(decl.name.clone()),
                })?;
            let params = sig
                .config
                .iter()
                .chain(&sig.inputs)
                .map(|p| representable(&p.ty))
                .collect::<Result<Vec<_>, _>>()?;
            let results = match decl.return_output() {
                Some(_) => sig
                    .outputs
                    .iter()
                    .map(|p| representable(&p.ty))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            let outputs = if decl.has_named_outputs() {
                if !self.config.memory {
                    return Err(CompileError::MemoryDisabled(format!(
                        "the outputs of '{}'",
                        decl.name
                    )));
                }
                if sig.outputs.len() > 64 {
                    return Err(CompileError::unsupported(format!(
                        "'{}' has more outputs than the dirty mask can track",
                        decl.name
                    )));
                }
                let slots = sig
                    .outputs
                    .iter()
                    .map(|p| Ok((p.name.clone(), representable(&p.ty)?)))
                    .collect::<Result<Vec<_>, CompileError>>()?;
                let layout = OutputLayout {
                    base: next_output,
                    slots,
                };
                next_output += layout.size();
                Some(layout)
            } else {
                None
            };

            let ty = FuncType::new(params.clone(), results.clone());
            let index = self
                .module
                .declare_function(&decl.name, ty, self.config.export_functions);
            self.function_indices.insert(decl.name.clone(), index);
            declared.push(Declared {
                decl,
                sig,
                index,
                params,
                results,
                outputs,
            });
        }
        Ok(declared)
    }

    fn function(
        &mut self,
        position: usize,
        function: Declared<'a>,
    ) -> Result<CompiledFunction, CompileError> {
        let Declared {
            decl,
            sig,
            index,
            params,
            results,
            outputs,
        } = function;
        let scope = self
            .analysis
            .function_scopes
            .get(&decl.name)
            .copied()
            .ok_or_else(|| CompileError::Unresolved {
                name: decl.name.clone(),
                source: ScopeError::Undefined(decl.name.clone()),
            })?;

        self.func = FunctionState::new(scope);
        for (param, vt) in sig.config.iter().chain(&sig.inputs).zip(&params) {
            self.func.add_param(&param.name, param.ty.clone(), *vt);
        }
        if decl.kind == FunctionKind::Task {
            self.func.task = Some(position as u32);
        }
        if decl.return_output().is_some() {
            self.func.return_type = sig.outputs.first().map(|p| p.ty.clone());
        }
        if let Some(layout) = &outputs {
            self.func
                .code
                .i32_const(layout.dirty_mask_address() as i32)
                .i64_const(0)
                .store(ValType::I64, 0);
            self.func.outputs = Some(layout.clone());
        }

        self.block(&decl.body)?;

        let returns_last = decl
            .body
            .stmts
            .last()
            .is_some_and(|s| matches!(self.program.stmts[*s].kind, StmtKind::Return(_)));
        if !results.is_empty() && !returns_last {
            self.func.code.unreachable();
        }
        self.func.code.end();

        let root = self.analysis.scopes.root();
        let state = std::mem::replace(&mut self.func, FunctionState::new(root));
        let locals = state.extra_locals();
        trace!(
            function = %decl.name,
            index,
            locals = locals.len(),
            bytes = state.code.len(),
            "compiled function"
        );
        Ok(CompiledFunction {
            name: decl.name.clone(),
            index,
            kind: decl.kind,
            params,
            results,
            locals,
            body: state.code.into_bytes(),
            outputs,
        })
    }

    // ── Shared helpers ──────────────────────────────────────────

    pub(crate) fn resolve(&self, name: &SmolStr) -> Result<&'a Symbol, CompileError> {
        let analysis = self.analysis;
        analysis
            .scopes
            .resolve(self.func.scope, name)
            .map_err(|source| CompileError::Unresolved {
                name: name.clone(),
                source,
            })
    }

    fn host(&self, what: impl FnOnce() -> String) -> Result<&ImportIndex, CompileError> {
        self.imports
            .as_ref()
            .ok_or_else(|| CompileError::HostImportsDisabled(what()))
    }

    /// Call index of a typed host import, failing for combinations the
    /// host does not provide.
    pub(crate) fn import(&self, op: HostOp, ty: PrimitiveType) -> Result<u32, CompileError> {
        self.host(|| op.import_name(ty))?
            .try_get(op, ty)
            .ok_or_else(|| {
                CompileError::unsupported(format!("no host import {}", op.import_name(ty)))
            })
    }

    pub(crate) fn generic_import(&self, op: GenericOp) -> Result<u32, CompileError> {
        Ok(self.host(|| op.name().to_string())?.generic(op))
    }
}

pub(crate) fn representable(ty: &Type) -> Result<ValType, CompileError> {
    val_type(ty).ok_or_else(|| CompileError::UnsupportedType(ty.to_string()))
}

/// The host type suffix of a scalar.
pub(crate) fn primitive(ty: &Type) -> Result<PrimitiveType, CompileError> {
    PrimitiveType::of(ty).ok_or_else(|| CompileError::UnsupportedType(ty.to_string()))
}

/// The host type suffix of a series or channel element.
pub(crate) fn elem_primitive(ty: &Type) -> Result<PrimitiveType, CompileError> {
    match ty.elem() {
        Some(elem) => primitive(elem),
        None => Err(CompileError::UnsupportedType(ty.to_string())),
    }
}
