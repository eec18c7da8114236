//! Handles the lowering of the typed Solidity AST into its Cairo-expressible
//! form.
//!
//! Solidity is designed around the EVM's execution model, which has several
//! notions (persistent keyed storage being the central one) that the Cairo
//! VM does not share. Lowering therefore involves two major approaches:
//!
//! 1. **Translation:** Where a construct has a direct Cairo equivalent, the
//!    passes rewrite the tree in place, canonicalising source-level
//!    conveniences (multi-name declarations, constant expressions) into the
//!    simpler shapes the printer expects.
//! 2. **Helpers:** Where the target has no equivalent for an operation, the
//!    passes instead emit a call to a generated Cairo function implementing
//!    that operation, and the [`crate::helpers`] registry memoises those
//!    functions per compilation.
//!
//! The compilation is single-threaded and synchronous: one mutable
//! [`unit::CompilationUnit`] is handed linearly through the pass pipeline,
//! and the first unrecoverable error aborts the run with its kind intact.

pub mod pass;
pub mod unit;

use stc_errors::transpile::Result;

use crate::compile::{
    pass::{PassManager, PassManagerReturnData},
    unit::CompilationUnit,
};

/// The compiler is responsible for processing the typed AST input to
/// generate a lowered AST and the Cairo helper preamble it references.
pub struct Compiler {
    /// The compilation unit holding the AST to be lowered.
    unit: CompilationUnit,

    /// The passes that this compiler is configured to run.
    passes: PassManager,
}

impl Compiler {
    /// Constructs a new compiler instance, wrapping the provided `unit`
    /// describing the AST to lower and the `passes` to run.
    fn new(unit: CompilationUnit, passes: PassManager) -> Self {
        Self { unit, passes }
    }

    /// Executes the compiler on the configured compilation unit.
    ///
    /// Note that this invokes a state transition that leaves the compiler
    /// in an invalid state, and hence it consumes the compiler to prevent
    /// API misuse.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the lowering process fails for
    ///   any reason.
    pub fn run(mut self) -> Result<CompilationResult> {
        let PassManagerReturnData { unit, data } = self.passes.run(self.unit)?;

        Ok(CompilationResult::new(unit, data))
    }
}

/// The result of lowering a typed AST.
#[derive(Debug)]
pub struct CompilationResult {
    /// The compilation unit in its fully-lowered state: the AST ready for
    /// the pretty-printer, and the helper registry backing it.
    pub unit: CompilationUnit,

    /// The final state of the pass data after the pipeline has executed.
    pub pass_results: pass::data::PassDataMap,
}

impl CompilationResult {
    /// Constructs a new compilation result wrapping the lowered `unit` and
    /// the final output of the compiler passes.
    #[must_use]
    pub fn new(unit: CompilationUnit, pass_results: pass::data::PassDataMap) -> Self {
        Self { unit, pass_results }
    }

    /// Renders the Cairo source preamble, the imports and generated helper
    /// functions that the lowered AST's helper calls reference.
    #[must_use]
    pub fn cairo_preamble(&self) -> String {
        self.unit.helpers.preamble()
    }
}

/// Allows for building a [`Compiler`] instance while retaining the defaults
/// for fields that do not need to be customized.
pub struct CompilerBuilder {
    /// The compilation unit holding the AST to be lowered.
    unit: CompilationUnit,

    /// The passes that this compiler is configured to run.
    passes: Option<PassManager>,
}

impl CompilerBuilder {
    /// Creates a new compiler builder wrapping the provided unit.
    ///
    /// The compiler's pass configuration will be left as default.
    #[must_use]
    pub fn new(unit: CompilationUnit) -> Self {
        let passes = None;
        Self { unit, passes }
    }

    /// Specifies the pass configuration for the compiler.
    #[must_use]
    pub fn with_passes(mut self, pass_manager: PassManager) -> Self {
        self.passes = Some(pass_manager);
        self
    }

    /// Builds a compiler from the specified configuration.
    #[must_use]
    pub fn build(self) -> Compiler {
        Compiler::new(self.unit, self.passes.unwrap_or_default())
    }
}
