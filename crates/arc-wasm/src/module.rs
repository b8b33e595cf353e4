//! Module assembly.
//!
//! Imports always precede local functions in the function index space, so
//! a local function's call index is `import_count + position`. Sections
//! are emitted in the fixed order Type, Import, Function, Memory, Export,
//! Code, Data, and empty sections are left out.

use std::collections::HashMap;

use smol_str::SmolStr;
use tracing::debug;
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, MemorySection, MemoryType, Module, TypeSection, ValType,
};

use crate::error::ModuleError;

/// Name the linear memory is exported under.
pub const MEMORY_EXPORT: &str = "memory";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl FuncType {
    pub fn new(params: impl Into<Vec<ValType>>, results: impl Into<Vec<ValType>>) -> Self {
        Self {
            params: params.into(),
            results: results.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Import {
    pub module: SmolStr,
    pub name: SmolStr,
    pub type_index: u32,
}

#[derive(Debug, Clone)]
struct LocalFunction {
    name: SmolStr,
    type_index: u32,
    export: bool,
    body: Option<(Vec<ValType>, Vec<u8>)>,
}

#[derive(Debug, Default)]
pub struct ModuleBuilder {
    types: Vec<FuncType>,
    type_indices: HashMap<FuncType, u32>,
    imports: Vec<Import>,
    functions: Vec<LocalFunction>,
    memory_pages: Option<u64>,
    data: Vec<u8>,
    data_offsets: HashMap<Vec<u8>, u32>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a signature, returning the index of an identical one if it
    /// already exists.
    pub fn add_type(&mut self, ty: FuncType) -> u32 {
        if let Some(&index) = self.type_indices.get(&ty) {
            return index;
        }
        let index = self.types.len() as u32;
        self.types.push(ty.clone());
        self.type_indices.insert(ty, index);
        index
    }

    pub fn types(&self) -> &[FuncType] {
        &self.types
    }

    /// Registers a host function. Fails once any local function has been
    /// declared, since that would shift every local call index.
    pub fn add_import(
        &mut self,
        module: &str,
        name: &str,
        ty: FuncType,
    ) -> Result<u32, ModuleError> {
        if !self.functions.is_empty() {
            return Err(ModuleError::ImportAfterFunction {
                module: module.into(),
                name: name.into(),
            });
        }
        let type_index = self.add_type(ty);
        self.imports.push(Import {
            module: module.into(),
            name: name.into(),
            type_index,
        });
        Ok(self.imports.len() as u32 - 1)
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn import_count(&self) -> u32 {
        self.imports.len() as u32
    }

    /// Declares a local function and returns its call index. The body is
    /// supplied later through [`ModuleBuilder::define_function`], which lets
    /// bodies call functions declared after them.
    pub fn declare_function(&mut self, name: &str, ty: FuncType, export: bool) -> u32 {
        let type_index = self.add_type(ty);
        self.functions.push(LocalFunction {
            name: name.into(),
            type_index,
            export,
            body: None,
        });
        self.import_count() + self.functions.len() as u32 - 1
    }

    pub fn function_count(&self) -> u32 {
        self.functions.len() as u32
    }

    /// Supplies the extra locals and instruction bytes (including the
    /// final `end`) of a declared function.
    pub fn define_function(
        &mut self,
        index: u32,
        locals: Vec<ValType>,
        body: Vec<u8>,
    ) -> Result<(), ModuleError> {
        let position = index
            .checked_sub(self.import_count())
            .ok_or(ModuleError::UndeclaredFunction(index))?;
        let function = self
            .functions
            .get_mut(position as usize)
            .ok_or(ModuleError::UndeclaredFunction(index))?;
        function.body = Some((locals, body));
        Ok(())
    }

    pub fn enable_memory(&mut self, min_pages: u64) {
        self.memory_pages = Some(min_pages);
    }

    pub fn has_memory(&self) -> bool {
        self.memory_pages.is_some()
    }

    /// Places `bytes` in the data segment and returns their address.
    /// Identical byte strings share one copy.
    pub fn add_data(&mut self, bytes: &[u8]) -> u32 {
        if let Some(&offset) = self.data_offsets.get(bytes) {
            return offset;
        }
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        self.data_offsets.insert(bytes.to_vec(), offset);
        offset
    }

    pub fn data_len(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn finish(self) -> Result<Vec<u8>, ModuleError> {
        let mut module = Module::new();

        if !self.types.is_empty() {
            let mut types = TypeSection::new();
            for ty in &self.types {
                types
                    .ty()
                    .function(ty.params.iter().copied(), ty.results.iter().copied());
            }
            module.section(&types);
        }

        if !self.imports.is_empty() {
            let mut imports = ImportSection::new();
            for import in &self.imports {
                imports.import(
                    &import.module,
                    &import.name,
                    EntityType::Function(import.type_index),
                );
            }
            module.section(&imports);
        }

        if !self.functions.is_empty() {
            let mut functions = FunctionSection::new();
            for function in &self.functions {
                functions.function(function.type_index);
            }
            module.section(&functions);
        }

        if let Some(pages) = self.memory_pages {
            let mut memory = MemorySection::new();
            memory.memory(MemoryType {
                minimum: pages,
                maximum: None,
                memory64: false,
                shared: false,
                page_size_log2: None,
            });
            module.section(&memory);
        }

        let imported = self.import_count();
        let exported: Vec<(u32, &LocalFunction)> = self
            .functions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.export)
            .map(|(i, f)| (imported + i as u32, f))
            .collect();
        if self.memory_pages.is_some() || !exported.is_empty() {
            let mut exports = ExportSection::new();
            if self.memory_pages.is_some() {
                exports.export(MEMORY_EXPORT, ExportKind::Memory, 0);
            }
            for (index, function) in exported {
                exports.export(&function.name, ExportKind::Func, index);
            }
            module.section(&exports);
        }

        if !self.functions.is_empty() {
            let mut code = CodeSection::new();
            for function in &self.functions {
                let (locals, body) = function
                    .body
                    .as_ref()
                    .ok_or_else(|| ModuleError::MissingBody(function.name.clone()))?;
                let mut f = Function::new_with_locals_types(locals.iter().copied());
                f.raw(body.iter().copied());
                code.function(&f);
            }
            module.section(&code);
        }

        if !self.data.is_empty() {
            if self.memory_pages.is_none() {
                return Err(ModuleError::DataWithoutMemory);
            }
            let mut data = DataSection::new();
            data.active(0, &ConstExpr::i32_const(0), self.data.iter().copied());
            module.section(&data);
        }

        let bytes = module.finish();
        debug!(
            types = self.types.len(),
            imports = self.imports.len(),
            functions = self.functions.len(),
            bytes = bytes.len(),
            "assembled module"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;

    fn validate(bytes: &[u8]) {
        if let Err(e) = wasmparser::Validator::new().validate_all(bytes) {
            panic!("WASM validation failed: {} (offset: {:?})", e, e.offset());
        }
    }

    fn body(f: impl FnOnce(&mut Encoder)) -> Vec<u8> {
        let mut e = Encoder::new();
        f(&mut e);
        e.end();
        e.into_bytes()
    }

    #[test]
    fn empty_module_is_just_the_header() {
        let bytes = ModuleBuilder::new().finish().unwrap();
        assert_eq!(bytes, [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]);
        validate(&bytes);
    }

    #[test]
    fn identical_signatures_share_a_type() {
        let mut m = ModuleBuilder::new();
        let a = m.add_type(FuncType::new([ValType::I32], [ValType::F64]));
        let b = m.add_type(FuncType::new([ValType::I32], [ValType::F64]));
        let c = m.add_type(FuncType::new([ValType::I64], []));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(m.types().len(), 2);
    }

    #[test]
    fn locals_follow_imports() {
        let mut m = ModuleBuilder::new();
        for name in ["a", "b", "c"] {
            m.add_import("env", name, FuncType::new([], [])).unwrap();
        }
        let first = m.declare_function("f", FuncType::new([], []), true);
        let second = m.declare_function("g", FuncType::new([], []), true);
        assert_eq!(m.import_count(), 3);
        assert_eq!((first, second), (3, 4));

        m.define_function(first, Vec::new(), body(|e| { e.call(second); })).unwrap();
        m.define_function(second, Vec::new(), body(|e| { e.call(0); })).unwrap();
        validate(&m.finish().unwrap());
    }

    #[test]
    fn imports_after_functions_are_rejected() {
        let mut m = ModuleBuilder::new();
        m.declare_function("f", FuncType::new([], []), false);
        let err = m.add_import("env", "late", FuncType::new([], [])).unwrap_err();
        assert_eq!(err.to_string(), "import 'env.late' registered after local functions");
    }

    #[test]
    fn defining_unknown_index() {
        let mut m = ModuleBuilder::new();
        m.add_import("env", "now", FuncType::new([], [ValType::I64])).unwrap();
        assert!(matches!(
            m.define_function(0, Vec::new(), body(|_| {})),
            Err(ModuleError::UndeclaredFunction(0))
        ));
        assert!(matches!(
            m.define_function(5, Vec::new(), body(|_| {})),
            Err(ModuleError::UndeclaredFunction(5))
        ));
    }

    #[test]
    fn missing_body() {
        let mut m = ModuleBuilder::new();
        m.declare_function("f", FuncType::new([], []), false);
        assert!(matches!(m.finish(), Err(ModuleError::MissingBody(name)) if name == "f"));
    }

    #[test]
    fn memory_is_exported_with_functions() {
        let mut m = ModuleBuilder::new();
        m.enable_memory(1);
        let f = m.declare_function("add", FuncType::new([ValType::I32, ValType::I32], [ValType::I32]), true);
        let code = body(|e| {
            e.local_get(0).local_get(1).instruction(&wasm_encoder::Instruction::I32Add);
        });
        m.define_function(f, Vec::new(), code).unwrap();
        let hello = m.add_data(b"hello");
        let again = m.add_data(b"hello");
        let world = m.add_data(b"world");
        assert_eq!((hello, again, world), (0, 0, 5));

        let bytes = m.finish().unwrap();
        validate(&bytes);

        let exports: Vec<String> = wasmparser::Parser::new(0)
            .parse_all(&bytes)
            .filter_map(|payload| match payload.unwrap() {
                wasmparser::Payload::ExportSection(reader) => Some(
                    reader
                        .into_iter()
                        .map(|e| e.unwrap().name.to_string())
                        .collect::<Vec<_>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(exports, ["memory", "add"]);
    }

    #[test]
    fn data_requires_memory() {
        let mut m = ModuleBuilder::new();
        m.add_data(b"x");
        assert!(matches!(m.finish(), Err(ModuleError::DataWithoutMemory)));
    }

    #[test]
    fn locals_are_declared() {
        let mut m = ModuleBuilder::new();
        let f = m.declare_function("f", FuncType::new([], [ValType::F64]), false);
        let code = body(|e| {
            e.f64_const(1.5).local_set(0).local_get(0);
        });
        m.define_function(f, vec![ValType::F64, ValType::F64, ValType::I32], code).unwrap();
        validate(&m.finish().unwrap());
    }
}
