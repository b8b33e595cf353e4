/// Knobs for a single compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Declare and export a linear memory.
    pub memory: bool,
    /// Initial size of that memory, in 64 KiB pages.
    pub memory_pages: u64,
    /// Register the host ABI. Without it, channels, series, state and
    /// strings cannot be compiled.
    pub host_imports: bool,
    /// Export every local function under its own name.
    pub export_functions: bool,
    /// Address of the first multi-output region.
    pub output_memory_base: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            memory: true,
            memory_pages: 1,
            host_imports: true,
            export_functions: true,
            output_memory_base: 0x1000,
        }
    }
}

impl CompilerConfig {
    pub fn with_memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_memory_pages(mut self, pages: u64) -> Self {
        self.memory_pages = pages;
        self
    }

    pub fn with_host_imports(mut self, host_imports: bool) -> Self {
        self.host_imports = host_imports;
        self
    }

    pub fn with_export_functions(mut self, export: bool) -> Self {
        self.export_functions = export;
        self
    }

    pub fn with_output_memory_base(mut self, base: u32) -> Self {
        self.output_memory_base = base;
        self
    }
}
