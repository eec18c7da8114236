//! This pass is responsible for assigning a storage slot to every state
//! variable of every contract in the compilation unit.
//!
//! The resulting [`StorageAllocation`] table is intended for downstream
//! usage during the storage-access rewrite, which consumes it as read-only
//! truth about where each state variable lives.
//!
//! Slots are assigned consecutively in declaration order. A variable whose
//! value representation needs two felt limbs (`Uint256`) takes two adjacent
//! cells. Mapping-typed variables take a single cell, and additionally have
//! a literal denoting that cell installed as their declaration's
//! initialiser: that literal is the *canonical base expression* that the
//! storage-access pass clones wherever the mapping is named, and that the
//! mapping helpers hash with the index to address individual cells.

use std::collections::HashMap;

use stc_ast::{
    node::{NodeId, NodeKind, NodeKindTag},
    types::TypeNode,
};
use stc_errors::transpile::{Error, Result};

use crate::{
    cairo::CairoType,
    compile::{
        pass::{
            data::{ConcretePassData, PassDataMap, PassDataOps, PassReturnData},
            ConcretePass,
            Pass,
            PassKey,
            PassOps,
        },
        unit::CompilationUnit,
    },
    helpers::HelperRegistry,
};

/// Assigns a storage slot to every state variable in the unit.
#[derive(Clone, Debug)]
pub struct AllocateStorageSlots {
    /// The passes that this pass depends upon the results of for its
    /// execution.
    depends: Vec<PassKey>,

    /// The passes that this pass invalidates the results of by executing.
    invalidates: Vec<PassKey>,
}

impl Default for AllocateStorageSlots {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructors that provide ways to create an instance of the
/// [`AllocateStorageSlots`] pass.
impl AllocateStorageSlots {
    /// Creates a new instance of the storage allocation pass.
    #[must_use]
    pub fn new() -> Self {
        // This pass depends on the results of no other passes.
        let depends = vec![];

        // Installing canonical base expressions mutates declarations but
        // does not change anything another pass has analysed.
        let invalidates = vec![];

        Self {
            depends,
            invalidates,
        }
    }

    /// Creates a new trait object of the storage allocation pass.
    #[must_use]
    pub fn new_dyn() -> Box<Self> {
        Box::new(Self::new())
    }
}

/// Functionality that the [`AllocateStorageSlots`] pass implements.
impl AllocateStorageSlots {
    /// Allocates slots for every state variable of the contract named by
    /// `contract`, recording them into `allocation`.
    ///
    /// # Errors
    ///
    /// - [`Error::AssertionFailure`] if a state variable carries no type.
    /// - [`Error::UnhandledType`] for state variables of types the
    ///   transpiler does not persist, user-defined types included.
    fn allocate_contract(
        unit: &mut CompilationUnit,
        contract: NodeId,
        allocation: &mut StorageAllocation,
    ) -> Result<()> {
        let mut next_slot = 0_usize;

        for member in unit.ast.children_of(contract) {
            let node = unit.ast.node(member);
            let NodeKind::VariableDeclaration(decl) = &node.kind else {
                continue;
            };
            if !decl.state_variable {
                continue;
            }
            let previous_value = decl.value;

            let ty = node.ty.clone().ok_or_else(|| {
                Error::AssertionFailure(format!(
                    "state variable {} carries no type",
                    unit.ast.describe(member)
                ))
            })?;

            let width = match ty.strip_pointer() {
                TypeNode::Mapping { .. } => {
                    Self::install_canonical_base(unit, member, previous_value, next_slot);
                    1
                }
                // User-defined types cover enums, whose storage layout we
                // do not lower. See the unsupported-construct policy.
                TypeNode::UserDefined { .. } => {
                    Err(Error::UnhandledType(ty.to_string()))?
                }
                other => CairoType::from_type_node(other)?.width_in_cells(),
            };

            allocation.assign(contract, member, next_slot);
            next_slot += width;
        }

        Ok(())
    }

    /// Installs a literal denoting `slot` as the initialiser of the mapping
    /// declaration named by `member`, dropping any previous initialiser.
    fn install_canonical_base(
        unit: &mut CompilationUnit,
        member: NodeId,
        previous_value: Option<NodeId>,
        slot: usize,
    ) {
        let literal = HelperRegistry::slot_literal(&mut unit.ast, slot);
        if let NodeKind::VariableDeclaration(decl) = &mut unit.ast.node_mut(member).kind {
            decl.value = Some(literal);
        }
        unit.ast.reindex_children(member);
        if let Some(old) = previous_value {
            unit.ast.drop_subtree(old);
        }
    }
}

impl PassOps for AllocateStorageSlots {
    fn run(
        &mut self,
        mut unit: CompilationUnit,
        _pass_data: &PassDataMap,
    ) -> Result<PassReturnData> {
        let mut allocation = StorageAllocation::new();

        let contracts: Vec<NodeId> = unit
            .ast
            .children_of(unit.root)
            .into_iter()
            .filter(|id| unit.ast.kind_tag(*id) == NodeKindTag::ContractDefinition)
            .collect();

        for contract in contracts {
            Self::allocate_contract(&mut unit, contract, &mut allocation)?;
        }

        Ok(PassReturnData::new(unit, Box::new(allocation)))
    }

    fn check_invariants(&self, unit: &CompilationUnit) -> Result<()> {
        // Every mapping-typed state variable must now carry its canonical
        // base expression.
        for (id, node) in unit.ast.iter() {
            let NodeKind::VariableDeclaration(decl) = &node.kind else {
                continue;
            };
            let is_mapping_state_var = decl.state_variable
                && node.ty.as_ref().is_some_and(TypeNode::is_mapping);
            if is_mapping_state_var && decl.value.is_none() {
                Err(Error::AssertionFailure(format!(
                    "mapping state variable {} has no canonical base expression",
                    unit.ast.describe(id)
                )))?;
            }
        }
        Ok(())
    }

    fn depends(&self) -> &[PassKey] {
        &self.depends
    }

    fn invalidates(&self) -> &[PassKey] {
        &self.invalidates
    }

    fn dupe(&self) -> Pass {
        Box::new(self.clone())
    }
}

impl ConcretePass for AllocateStorageSlots {
    type Data = StorageAllocation;
}

/// The storage allocation table: for each contract, the slot assigned to
/// each of its state variables.
#[derive(Clone, Debug, Default)]
pub struct StorageAllocation {
    /// The per-contract tables, keyed by contract definition id and then by
    /// state variable declaration id.
    slots: HashMap<NodeId, HashMap<NodeId, usize>>,
}

impl StorageAllocation {
    /// Creates a new, empty allocation table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the state variable `var` of `contract` lives at `slot`.
    fn assign(&mut self, contract: NodeId, var: NodeId, slot: usize) {
        self.slots.entry(contract).or_default().insert(var, slot);
    }

    /// Gets the slot assigned to the state variable `var` of `contract`,
    /// if one was assigned.
    #[must_use]
    pub fn slot_of(&self, contract: NodeId, var: NodeId) -> Option<usize> {
        self.slots.get(&contract)?.get(&var).copied()
    }
}

impl PassDataOps for StorageAllocation {}

impl ConcretePassData for StorageAllocation {
    type Pass = AllocateStorageSlots;
}
