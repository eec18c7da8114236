//! This module contains both the definition of the [`Pass`] type and the
//! [`PassManager`] object.
//!
//! Every pass should implement [`ConcretePass`], as this provides the full
//! set of features required of a pass. It is also expected that each pass
//! provide a type-specific constructor function called `new`.
//!
//! # Passes
//!
//! A pass is a self-contained unit of functionality that performs some
//! operation over the typed AST. They tend to fall into the following
//! categories:
//!
//! - **Analysis:** These examine the structure of the tree to infer
//!   information about it without changing its structure, such as the
//!   storage slot assigned to each state variable. The information produced
//!   by analysis passes can be invalidated by transformation passes.
//! - **Transformation:** Transformation passes use either information from
//!   analysis passes or structural information about the tree to rewrite it
//!   toward a form expressible in Cairo.
//!
//! # Invariant Checking
//!
//! Each pass establishes invariants that later passes rely on (for example,
//! after declaration splitting no statement binds more than one name). The
//! manager re-checks these cheap invariants after each pass runs, so that a
//! pass violating its own contract is caught at the point of violation
//! rather than as a confusing failure two passes later.

pub mod analysis;
pub mod data;
pub mod transform;

use std::{
    any::{Any, TypeId},
    fmt::Debug,
};

use stc_errors::transpile::{Error, Result};

use crate::compile::{
    pass::{
        analysis::storage_slots::AllocateStorageSlots,
        data::{ConcretePassData, PassDataMap, PassReturnData},
        transform::{
            fold_constants::FoldConstants,
            split_declarations::SplitVariableDeclarations,
            storage_access::RewriteStorageAccess,
        },
    },
    unit::CompilationUnit,
};

/// A pass is a self-contained unit of functionality that performs some
/// operation over the typed AST.
pub type Pass = Box<dyn PassOps>;

/// A handle that uniquely identifies the pass.
pub type PassKey = TypeId;

/// The operations that we expect one of our passes to have.
///
/// The implementation is designed to be used via dynamic dispatch, and hence
/// can provide the requisite operations however it is able.
///
/// # Self Bounds
///
/// The bounds on `Self` are required for the following reasons:
///
/// - [`Any`] gives every pass its [`PassKey`], which is what the data map
///   and the dependency validation identify passes by.
/// - [`Debug`] to provide representations to aid in debugging. It is
///   recommended to use the derive feature for this.
///
/// In addition, it is required but not enforced that implementors of this
/// trait also implement [`ConcretePass`].
pub trait PassOps
where
    Self: Any + Debug,
{
    /// Executes the pass on the provided `unit`, returning both the
    /// potentially-modified unit and any data returned by the pass.
    ///
    /// It takes a map of `pass_data` that allows the running pass to get at
    /// the data produced by the passes it depends on.
    ///
    /// # Errors
    ///
    /// - [`Error`] if pass execution fails for any reason.
    fn run(
        &mut self,
        unit: CompilationUnit,
        pass_data: &PassDataMap,
    ) -> Result<PassReturnData>;

    /// Checks that the invariants this pass establishes hold on the
    /// provided `unit`.
    ///
    /// The default implementation checks nothing. The manager calls this
    /// after the pass has run.
    ///
    /// # Errors
    ///
    /// - [`Error::AssertionFailure`] if an invariant does not hold, which
    ///   is a bug in the pass.
    fn check_invariants(&self, unit: &CompilationUnit) -> Result<()> {
        let _ = unit;
        Ok(())
    }

    /// Gets a slice containing the keys of the passes whose output this
    /// pass depends on.
    fn depends(&self) -> &[PassKey];

    /// Gets a slice containing the keys of the passes whose output this
    /// pass invalidates.
    fn invalidates(&self) -> &[PassKey];

    /// Returns a duplicate of this pass.
    fn dupe(&self) -> Pass;

    /// Gets a key that uniquely represents the pass.
    ///
    /// This **must** return the same value as [`ConcretePass::key`].
    fn key_dyn(&self) -> PassKey {
        self.type_id()
    }
}

/// Provides extra operations that can be called when operating on a
/// concrete instance of a specific pass, rather than on any instance of a
/// pass.
pub trait ConcretePass
where
    Self: Clone + Debug + PassOps,
{
    /// The type of data returned by the pass.
    type Data: ConcretePassData;

    /// Gets a key that uniquely represents the pass.
    ///
    /// This **must** return the same value as [`PassOps::key_dyn`].
    #[must_use]
    fn key() -> PassKey {
        TypeId::of::<Self>()
    }
}

/// The data returned when executing all passes via the pass manager.
#[derive(Debug)]
pub struct PassManagerReturnData {
    /// The newly-modified compilation unit.
    pub unit: CompilationUnit,

    /// A mapping from pass key to the data returned by the pass.
    pub data: PassDataMap,
}

impl PassManagerReturnData {
    /// Creates a new pass manager return data element wrapping the
    /// transformed `unit` and the result `data` from all the passes.
    #[must_use]
    pub fn new(unit: CompilationUnit, data: PassDataMap) -> Self {
        Self { unit, data }
    }
}

/// A manager for passes within the transpiler.
///
/// The manager runs its passes in the order given, after validating that
/// the order satisfies every pass's declared dependencies. This keeps the
/// canonical pipeline ordering honest without the need for costly manual
/// review every time a pass is added.
pub struct PassManager {
    pass_ordering: Vec<Pass>,
}

impl PassManager {
    /// Creates a new pass manager wrapping the provided passes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPassOrdering`] if the provided `passes` sequence
    ///   does not satisfy the passes' dependencies.
    pub fn new(passes: Vec<Pass>) -> Result<Self> {
        let pass_ordering = Self::generate_pass_ordering(passes)?;
        Ok(Self { pass_ordering })
    }

    /// Executes the pass ordering on the provided `unit`.
    ///
    /// The pipeline is total in the sense that it either runs every pass to
    /// completion or aborts on the first error, surfacing that error's kind
    /// to the caller unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error`] if any pass fails, or any pass's invariants do not hold
    ///   after it has run.
    pub fn run(&mut self, mut unit: CompilationUnit) -> Result<PassManagerReturnData> {
        let mut pass_data_map = PassDataMap::new();

        for pass in &mut self.pass_ordering {
            let PassReturnData {
                unit: new_unit,
                data,
            } = pass.run(unit, &pass_data_map)?;
            pass.check_invariants(&new_unit)?;
            pass_data_map.put_dyn(pass, data);

            unit = new_unit;
        }

        let result = PassManagerReturnData::new(unit, pass_data_map);
        Ok(result)
    }

    /// Gets the current pass ordering.
    ///
    /// This method is always guaranteed to return a valid pass ordering
    /// that respects the requirements of the passes.
    #[must_use]
    pub fn passes(&self) -> &[Pass] {
        &self.pass_ordering
    }

    /// Validates that the provided `passes` sequence satisfies every
    /// pass's declared dependencies, returning it unchanged if so.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPassOrdering`] if some pass depends on a pass that
    ///   does not run before it.
    pub fn generate_pass_ordering(passes: Vec<Pass>) -> Result<Vec<Pass>> {
        let mut seen: Vec<PassKey> = Vec::with_capacity(passes.len());
        for pass in &passes {
            if pass.depends().iter().any(|dep| !seen.contains(dep)) {
                Err(Error::InvalidPassOrdering(format!(
                    "{pass:?} depends on a pass that does not run before it"
                )))?;
            }
            seen.push(pass.key_dyn());
        }
        Ok(passes)
    }
}

impl Default for PassManager {
    /// Returns a pass manager with the canonical pipeline associated with
    /// it.
    ///
    /// # Default Passes
    ///
    /// The canonical pipeline, in execution order:
    ///
    /// 1. [`FoldConstants`]: literal constant folding, so later passes see
    ///    folded slot and value expressions.
    /// 2. [`SplitVariableDeclarations`]: canonicalises multi-name
    ///    declaration statements.
    /// 3. [`AllocateStorageSlots`]: assigns storage slots to state
    ///    variables.
    /// 4. [`RewriteStorageAccess`]: lowers state-variable reads and writes
    ///    into helper calls using the allocation.
    fn default() -> Self {
        let passes: Vec<Pass> = vec![
            FoldConstants::new_dyn(),
            SplitVariableDeclarations::new_dyn(),
            AllocateStorageSlots::new_dyn(),
            RewriteStorageAccess::new_dyn(),
        ];
        Self::new(passes).expect("Default pass ordering was invalid")
    }
}
