//! This pass lowers every read and write of contract storage into a call of
//! a generated Cairo helper function.
//!
//! After it has run, no expression references a state variable directly:
//!
//! - Assignments into a state variable become `storageWrite_<T>(slot, value)`
//!   calls.
//! - Assignments through a mapping index become
//!   `writeMapping_<K>_<V>(base, index, value)` calls.
//! - Reads of a slot-allocated state variable become
//!   `storageRead_<T>(slot)` calls.
//! - Reads through a mapping index become `readMapping_<K>_<V>(base, index)`
//!   calls, and a mapping named outside an index expression is replaced by
//!   a clone of its canonical base expression, which the allocator installed
//!   as the declaration's initialiser.
//!
//! Slot operands are synthesised number literals carrying the slot value.
//! The pass consumes the [`StorageAllocation`] produced by the allocator;
//! a state variable without an allocation entry is a bug in the pipeline,
//! not in the input.

use stc_ast::{
    node::{NodeId, NodeKind, NodeKindTag},
    types::TypeNode,
    visit::AstMapper,
    AstContext,
};
use stc_errors::transpile::{Error, Result};

use crate::{
    compile::{
        pass::{
            analysis::storage_slots::{AllocateStorageSlots, StorageAllocation},
            data::{NoPassData, PassDataMap, PassReturnData},
            ConcretePass,
            Pass,
            PassKey,
            PassOps,
        },
        unit::CompilationUnit,
    },
    helpers::HelperRegistry,
};

/// Rewrites state-variable reads and writes into helper calls.
#[derive(Clone, Debug)]
pub struct RewriteStorageAccess {
    /// The passes that this pass depends upon the results of for its
    /// execution.
    depends: Vec<PassKey>,

    /// The passes that this pass invalidates the results of by executing.
    invalidates: Vec<PassKey>,
}

impl Default for RewriteStorageAccess {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructors that provide ways to create an instance of the
/// [`RewriteStorageAccess`] pass.
impl RewriteStorageAccess {
    /// Creates a new instance of the storage access rewriting pass.
    #[must_use]
    pub fn new() -> Self {
        // Slot operands come from the allocator's table.
        let depends = vec![AllocateStorageSlots::key()];

        // Rewriting accesses consumes the canonical base expressions but
        // leaves the allocation itself accurate.
        let invalidates = vec![];

        Self {
            depends,
            invalidates,
        }
    }

    /// Creates a new trait object of the storage access rewriting pass.
    #[must_use]
    pub fn new_dyn() -> Box<Self> {
        Box::new(Self::new())
    }
}

impl PassOps for RewriteStorageAccess {
    fn run(
        &mut self,
        unit: CompilationUnit,
        pass_data: &PassDataMap,
    ) -> Result<PassReturnData> {
        let allocation = pass_data
            .get::<AllocateStorageSlots>()
            .ok_or_else(|| {
                Error::AssertionFailure(
                    "storage access rewriting ran without a storage allocation".to_string(),
                )
            })?
            .clone();

        let CompilationUnit {
            mut ast,
            mut helpers,
            root,
        } = unit;

        let mut rewriter = StorageRewriter {
            allocation: &allocation,
            helpers:    &mut helpers,
        };
        rewriter.visit_node(&mut ast, root)?;

        let unit = CompilationUnit { ast, helpers, root };
        Ok(PassReturnData::new(unit, NoPassData::<Self>::new_dyn()))
    }

    fn check_invariants(&self, unit: &CompilationUnit) -> Result<()> {
        for (id, node) in unit.ast.iter() {
            match &node.kind {
                NodeKind::Identifier(_) => {
                    if StorageRewriter::state_var_target(&unit.ast, id).is_some() {
                        Err(Error::AssertionFailure(format!(
                            "state variable reference {} survived storage rewriting",
                            unit.ast.describe(id)
                        )))?;
                    }
                }
                NodeKind::IndexAccess(access) => {
                    let base_is_mapping = unit
                        .ast
                        .node(access.base)
                        .ty
                        .as_ref()
                        .is_some_and(TypeNode::is_mapping_pointer);
                    if base_is_mapping {
                        Err(Error::AssertionFailure(format!(
                            "mapping index access {} survived storage rewriting",
                            unit.ast.describe(id)
                        )))?;
                    }
                }
                _ => {}
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

impl ConcretePass for RewriteStorageAccess {
    type Data = NoPassData<Self>;
}

/// The mapper doing the actual rewriting, borrowing the allocation table
/// and the helper registry for the duration of one traversal.
struct StorageRewriter<'a> {
    /// The slot allocation produced by the allocator pass.
    allocation: &'a StorageAllocation,

    /// The helper registry of the compilation unit being rewritten.
    helpers: &'a mut HelperRegistry,
}

impl StorageRewriter<'_> {
    /// Resolves `id` to the state-variable declaration it references, if it
    /// is an identifier doing so.
    fn state_var_target(ctx: &AstContext, id: NodeId) -> Option<NodeId> {
        let NodeKind::Identifier(identifier) = &ctx.node(id).kind else {
            return None;
        };
        let decl = identifier.referenced_declaration?;
        if !ctx.contains(decl) {
            return None;
        }
        match &ctx.node(decl).kind {
            NodeKind::VariableDeclaration(declaration) if declaration.state_variable => {
                Some(decl)
            }
            _ => None,
        }
    }

    /// Looks up the slot allocated to the state variable `decl` within its
    /// containing contract.
    ///
    /// # Errors
    ///
    /// - [`Error::AssertionFailure`] if the declaration sits outside any
    ///   contract, or the allocator assigned it no slot. Both are pipeline
    ///   bugs.
    fn slot_of(&self, ctx: &AstContext, decl: NodeId) -> Result<usize> {
        let contract = ctx
            .closest_ancestor(decl, NodeKindTag::ContractDefinition)
            .ok_or_else(|| {
                Error::AssertionFailure(format!(
                    "state variable {} is declared outside any contract",
                    ctx.describe(decl)
                ))
            })?;
        self.allocation.slot_of(contract, decl).ok_or_else(|| {
            Error::AssertionFailure(format!(
                "no storage slot allocated for {}",
                ctx.describe(decl)
            ))
        })
    }

    /// Gets the declared type of `decl`.
    fn type_of(ctx: &AstContext, decl: NodeId) -> Result<TypeNode> {
        ctx.node(decl).ty.clone().ok_or_else(|| {
            Error::AssertionFailure(format!(
                "declaration {} carries no type",
                ctx.describe(decl)
            ))
        })
    }

    /// Rewrites an assignment into a slot-allocated state variable into a
    /// storage-write helper call, recursing into the value side only.
    fn rewrite_storage_write(
        &mut self,
        ctx: &mut AstContext,
        id: NodeId,
        decl: NodeId,
        rhs: NodeId,
    ) -> Result<()> {
        let ty = Self::type_of(ctx, decl)?;
        if ty.is_mapping() {
            return Err(Error::NotSupportedYet(format!(
                "assignment to whole mapping {}",
                ctx.describe(decl)
            )));
        }

        let slot = self.slot_of(ctx, decl)?;
        let call = self.helpers.storage_write(ctx, slot, &ty, rhs)?;
        ctx.replace_node(id, call)?;

        // The left-hand side is fully consumed; only the assigned value
        // can still contain storage reads.
        self.visit_node(ctx, rhs)
    }

    /// Rewrites an assignment through a mapping index into a mapping-write
    /// helper call, recursing into the replacement.
    fn rewrite_mapping_write(
        &mut self,
        ctx: &mut AstContext,
        id: NodeId,
        lhs: NodeId,
        rhs: NodeId,
    ) -> Result<()> {
        let NodeKind::IndexAccess(access) = ctx.node(lhs).kind.clone() else {
            return Err(Error::AssertionFailure(format!(
                "mapping write through non-index expression {}",
                ctx.describe(lhs)
            )));
        };
        let index = access.index.ok_or_else(|| {
            Error::AssertionFailure(format!(
                "mapping write {} has no index expression",
                ctx.describe(lhs)
            ))
        })?;

        let base_ty = Self::type_of(ctx, access.base)?;
        let TypeNode::Mapping { key, value } = base_ty.strip_pointer().clone() else {
            return Err(Error::NotSupportedYet(format!(
                "indexed write into {base_ty}"
            )));
        };

        let call = self
            .helpers
            .write_mapping(ctx, access.base, index, &key, &value, rhs)?;
        ctx.replace_node(id, call)?;

        // The base, the index, and the value may all still reference
        // storage themselves.
        self.visit_node(ctx, call)
    }
}

impl AstMapper for StorageRewriter<'_> {
    fn visit_assignment(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        let NodeKind::Assignment(assign) = ctx.node(id).kind.clone() else {
            return Ok(());
        };

        if let Some(decl) = Self::state_var_target(ctx, assign.lhs) {
            if assign.operator != "=" {
                return Err(Error::NotSupportedYet(format!(
                    "compound assignment `{}` to state variable {}",
                    assign.operator,
                    ctx.describe(assign.lhs)
                )));
            }
            return self.rewrite_storage_write(ctx, id, decl, assign.rhs);
        }

        if ctx.kind_tag(assign.lhs) == NodeKindTag::IndexAccess {
            let base = match &ctx.node(assign.lhs).kind {
                NodeKind::IndexAccess(access) => access.base,
                _ => unreachable!("kind tag was IndexAccess"),
            };
            let base_is_mapping = ctx
                .node(base)
                .ty
                .as_ref()
                .is_some_and(TypeNode::is_mapping_pointer);
            if base_is_mapping {
                if assign.operator != "=" {
                    return Err(Error::NotSupportedYet(format!(
                        "compound assignment `{}` through mapping index {}",
                        assign.operator,
                        ctx.describe(assign.lhs)
                    )));
                }
                return self.rewrite_mapping_write(ctx, id, assign.lhs, assign.rhs);
            }
            return Err(Error::NotSupportedYet(format!(
                "indexed write through {}",
                ctx.describe(assign.lhs)
            )));
        }

        self.common_visit(ctx, id)
    }

    fn visit_identifier(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        let Some(decl) = Self::state_var_target(ctx, id) else {
            return Ok(());
        };

        let ty = Self::type_of(ctx, decl)?;
        if ty.is_mapping() {
            // A mapping has no readable value; the name stands for its
            // canonical base expression.
            let base = match &ctx.node(decl).kind {
                NodeKind::VariableDeclaration(declaration) => {
                    declaration.value.ok_or_else(|| {
                        Error::AssertionFailure(format!(
                            "mapping state variable {} has no canonical base expression",
                            ctx.describe(decl)
                        ))
                    })?
                }
                _ => {
                    return Err(Error::AssertionFailure(format!(
                        "state variable target {} is not a declaration",
                        ctx.describe(decl)
                    )))
                }
            };
            let clone = ctx.clone_subtree(base);
            ctx.replace_node(id, clone)?;
            return Ok(());
        }

        let slot = self.slot_of(ctx, decl)?;
        let call = self.helpers.storage_read(ctx, slot, &ty)?;
        ctx.replace_node(id, call)?;
        Ok(())
    }

    fn visit_index_access(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        let NodeKind::IndexAccess(access) = ctx.node(id).kind.clone() else {
            return Ok(());
        };

        let Some(index) = access.index else {
            return Err(Error::WillNotSupport(format!(
                "index access {} without an index expression",
                ctx.describe(id)
            )));
        };

        let base_ty = Self::type_of(ctx, access.base)?;
        let TypeNode::Mapping { key, value } = base_ty.strip_pointer().clone() else {
            return Err(Error::NotSupportedYet(format!(
                "index access into {base_ty}"
            )));
        };

        let call = self
            .helpers
            .read_mapping(ctx, access.base, index, &key, &value)?;
        ctx.replace_node(id, call)?;

        // The base and the index may themselves reference storage.
        self.visit_node(ctx, call)
    }
}

#[cfg(test)]
mod test {
    use stc_ast::{
        node::{
            Assignment,
            Block,
            ContractDefinition,
            ExpressionStatement,
            FunctionDefinition,
            Identifier,
            IndexAccess,
            Literal,
            LiteralKind,
            Mutability,
            Node,
            NodeId,
            NodeKind,
            NodeKindTag,
            SourceUnit,
            VariableDeclaration,
        },
        types::{DataLocation, TypeNode},
        AstContext,
    };
    use stc_errors::transpile::Error;

    use crate::compile::{
        pass::{
            analysis::storage_slots::AllocateStorageSlots,
            data::PassDataMap,
            transform::storage_access::RewriteStorageAccess,
            Pass,
            PassManager,
            PassOps,
        },
        unit::CompilationUnit,
    };

    struct ContractBuilder {
        ctx: AstContext,
        members: Vec<NodeId>,
        statements: Vec<NodeId>,
    }

    impl ContractBuilder {
        fn new() -> Self {
            Self {
                ctx:        AstContext::new(),
                members:    Vec::new(),
                statements: Vec::new(),
            }
        }

        fn state_var(&mut self, name: &str, ty: TypeNode) -> NodeId {
            let decl = self.ctx.insert(Node::typed(
                NodeKind::VariableDeclaration(VariableDeclaration {
                    name: name.to_string(),
                    type_name: None,
                    state_variable: true,
                    mutability: Mutability::Mutable,
                    location: DataLocation::Default,
                    value: None,
                }),
                ty,
            ));
            self.members.push(decl);
            decl
        }

        fn reference(&mut self, name: &str, decl: NodeId) -> NodeId {
            let ty = self.ctx.node(decl).ty.clone().unwrap();
            self.ctx.insert(Node::typed(
                NodeKind::Identifier(Identifier {
                    name: name.to_string(),
                    referenced_declaration: Some(decl),
                }),
                ty,
            ))
        }

        fn number(&mut self, value: &str) -> NodeId {
            self.ctx.insert(Node::typed(
                NodeKind::Literal(Literal {
                    kind:      LiteralKind::Number,
                    value:     value.to_string(),
                    hex_value: String::new(),
                }),
                TypeNode::Builtin(format!("int_const {value}")),
            ))
        }

        fn assign(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
            let assign = self.ctx.insert(Node::new(NodeKind::Assignment(Assignment {
                operator: "=".to_string(),
                lhs,
                rhs,
            })));
            let stmt = self.ctx.insert(Node::new(NodeKind::ExpressionStatement(
                ExpressionStatement { expression: assign },
            )));
            self.statements.push(stmt);
            assign
        }

        fn finish(mut self) -> CompilationUnit {
            let body = self.ctx.insert(Node::new(NodeKind::Block(Block {
                statements: self.statements,
            })));
            let function = self.ctx.insert(Node::new(NodeKind::FunctionDefinition(
                FunctionDefinition {
                    name: "run".to_string(),
                    parameters: vec![],
                    returns: vec![],
                    body: Some(body),
                },
            )));
            self.members.push(function);
            let contract = self.ctx.insert(Node::new(NodeKind::ContractDefinition(
                ContractDefinition {
                    name:    "C".to_string(),
                    members: self.members,
                },
            )));
            let root = self.ctx.insert(Node::new(NodeKind::SourceUnit(SourceUnit {
                members: vec![contract],
            })));
            CompilationUnit::new(self.ctx, root)
        }
    }

    fn storage_pipeline() -> PassManager {
        let passes: Vec<Pass> = vec![
            AllocateStorageSlots::new_dyn(),
            RewriteStorageAccess::new_dyn(),
        ];
        PassManager::new(passes).unwrap()
    }

    /// Finds the single call statement in the rewritten unit and returns
    /// the callee name with the argument ids.
    fn first_call(unit: &CompilationUnit) -> (String, Vec<NodeId>) {
        for (_, node) in unit.ast.iter() {
            if let NodeKind::FunctionCall(call) = &node.kind {
                let NodeKind::Identifier(callee) = &unit.ast.node(call.callee).kind else {
                    continue;
                };
                if !callee.name.starts_with("__warp") {
                    return (callee.name.clone(), call.arguments.clone());
                }
            }
        }
        panic!("no helper call in rewritten unit");
    }

    #[test]
    fn state_variable_writes_become_helper_calls() {
        let mut builder = ContractBuilder::new();
        // Six single-cell state variables, then `x`, so `x` sits at slot 7
        // only if widths accumulate; keep it simple: seven narrow ones.
        for i in 0..7 {
            builder.state_var(&format!("pad{i}"), TypeNode::uint(8));
        }
        let x = builder.state_var("x", TypeNode::uint(8));
        let lhs = builder.reference("x", x);
        let rhs = builder.number("5");
        builder.assign(lhs, rhs);
        let unit = builder.finish();

        let result = storage_pipeline().run(unit).unwrap();
        let (name, arguments) = first_call(&result.unit);
        assert_eq!(name, "storageWrite_felt");
        assert_eq!(arguments.len(), 2);

        // The first operand is the slot literal for slot seven.
        let NodeKind::Literal(slot) = &result.unit.ast.node(arguments[0]).kind else {
            panic!("slot operand is not a literal");
        };
        assert_eq!(slot.value, "7");
        assert_eq!(slot.hex_value, "7");
        assert_eq!(arguments[1], rhs);
        assert!(result.unit.helpers.contains_helper("storageWrite_felt"));
    }

    #[test]
    fn state_variable_reads_become_helper_calls() {
        let mut builder = ContractBuilder::new();
        let x = builder.state_var("x", TypeNode::uint(8));
        let y = builder.state_var("y", TypeNode::uint(8));
        // y = x;
        let lhs = builder.reference("y", y);
        let rhs = builder.reference("x", x);
        builder.assign(lhs, rhs);
        let unit = builder.finish();

        let result = storage_pipeline().run(unit).unwrap();

        // The write wraps a read of slot zero.
        let ast = &result.unit.ast;
        let read = ast
            .iter()
            .find_map(|(id, node)| match &node.kind {
                NodeKind::FunctionCall(call) => {
                    let NodeKind::Identifier(callee) = &ast.node(call.callee).kind else {
                        return None;
                    };
                    (callee.name == "storageRead_felt").then_some(id)
                }
                _ => None,
            })
            .expect("read was not rewritten");
        assert_eq!(ast.node(read).ty, Some(TypeNode::uint(8)));
        assert!(result.unit.helpers.contains_helper("storageRead_felt"));
        assert!(result.unit.helpers.contains_helper("storageWrite_felt"));
    }

    #[test]
    fn mapping_writes_become_helper_calls() {
        let mut builder = ContractBuilder::new();
        let mapping_ty = TypeNode::make_mapping(TypeNode::uint(256), TypeNode::uint(256));
        let m = builder.state_var("m", mapping_ty.clone());

        // m[k] = v, with the identifier typed as a storage pointer the way
        // the front-end types mapping uses in expressions.
        let base = builder.ctx.insert(Node::typed(
            NodeKind::Identifier(Identifier {
                name: "m".to_string(),
                referenced_declaration: Some(m),
            }),
            TypeNode::make_pointer(mapping_ty, DataLocation::Storage),
        ));
        let key = builder.number("9");
        let lhs = builder.ctx.insert(Node::typed(
            NodeKind::IndexAccess(IndexAccess {
                base,
                index: Some(key),
            }),
            TypeNode::uint(256),
        ));
        let rhs = builder.number("1");
        builder.assign(lhs, rhs);
        let unit = builder.finish();

        let result = storage_pipeline().run(unit).unwrap();
        let (name, arguments) = first_call(&result.unit);
        assert_eq!(name, "writeMapping_uint256_uint256");
        assert_eq!(arguments.len(), 3);

        // The mapping base identifier collapsed to the canonical base
        // literal for the mapping's slot.
        let ast = &result.unit.ast;
        let NodeKind::Literal(base_literal) = &ast.node(arguments[0]).kind else {
            panic!("mapping base is not the canonical literal");
        };
        assert_eq!(base_literal.value, "0");
        assert_eq!(arguments[1], key);
        assert_eq!(arguments[2], rhs);
        assert!(result.unit.helpers.contains_helper("storageWrite_Uint256"));
    }

    #[test]
    fn rewriting_is_idempotent() {
        let mut builder = ContractBuilder::new();
        let x = builder.state_var("x", TypeNode::uint(8));
        let lhs = builder.reference("x", x);
        let rhs = builder.number("5");
        builder.assign(lhs, rhs);
        let unit = builder.finish();

        let mut manager = storage_pipeline();
        let result = manager.run(unit).unwrap();
        let before = result.unit.ast.len();

        // Running the rewrite again finds nothing left to rewrite.
        let mut rerun = RewriteStorageAccess::new();
        let rerun_result = rerun.run(result.unit, &result.data).unwrap();
        assert_eq!(rerun_result.unit.ast.len(), before);
        assert_eq!(rerun_result.unit.helpers.helper_count(), 1);
    }

    #[test]
    fn compound_assignment_to_storage_is_not_supported_yet() {
        let mut builder = ContractBuilder::new();
        let x = builder.state_var("x", TypeNode::uint(8));
        let lhs = builder.reference("x", x);
        let rhs = builder.number("5");
        let assign = builder.assign(lhs, rhs);
        if let NodeKind::Assignment(op) = &mut builder.ctx.node_mut(assign).kind {
            op.operator = "+=".to_string();
        }
        let unit = builder.finish();

        let result = storage_pipeline().run(unit);
        assert!(matches!(result, Err(Error::NotSupportedYet(_))));
    }

    #[test]
    fn compound_assignment_through_a_mapping_index_is_not_supported_yet() {
        let mut builder = ContractBuilder::new();
        let mapping_ty = TypeNode::make_mapping(TypeNode::uint(256), TypeNode::uint(256));
        let m = builder.state_var("m", mapping_ty.clone());

        // m[k] += v must not silently drop the addition.
        let base = builder.ctx.insert(Node::typed(
            NodeKind::Identifier(Identifier {
                name: "m".to_string(),
                referenced_declaration: Some(m),
            }),
            TypeNode::make_pointer(mapping_ty, DataLocation::Storage),
        ));
        let key = builder.number("9");
        let lhs = builder.ctx.insert(Node::typed(
            NodeKind::IndexAccess(IndexAccess {
                base,
                index: Some(key),
            }),
            TypeNode::uint(256),
        ));
        let rhs = builder.number("1");
        let assign = builder.assign(lhs, rhs);
        if let NodeKind::Assignment(op) = &mut builder.ctx.node_mut(assign).kind {
            op.operator = "+=".to_string();
        }
        let unit = builder.finish();

        let result = storage_pipeline().run(unit);
        assert!(matches!(result, Err(Error::NotSupportedYet(_))));
    }

    #[test]
    fn index_access_without_an_index_is_rejected() {
        let mut builder = ContractBuilder::new();
        let mapping_ty = TypeNode::make_mapping(TypeNode::uint(256), TypeNode::uint(256));
        let m = builder.state_var("m", mapping_ty.clone());
        let base = builder.ctx.insert(Node::typed(
            NodeKind::Identifier(Identifier {
                name: "m".to_string(),
                referenced_declaration: Some(m),
            }),
            TypeNode::make_pointer(mapping_ty, DataLocation::Storage),
        ));
        let bare = builder.ctx.insert(Node::typed(
            NodeKind::IndexAccess(IndexAccess { base, index: None }),
            TypeNode::uint(256),
        ));
        let stmt = builder.ctx.insert(Node::new(NodeKind::ExpressionStatement(
            ExpressionStatement { expression: bare },
        )));
        builder.statements.push(stmt);
        let unit = builder.finish();

        let result = storage_pipeline().run(unit);
        assert!(matches!(result, Err(Error::WillNotSupport(_))));
    }

    #[test]
    fn missing_allocation_is_an_assertion_failure() {
        let mut builder = ContractBuilder::new();
        let x = builder.state_var("x", TypeNode::uint(8));
        let lhs = builder.reference("x", x);
        let rhs = builder.number("5");
        builder.assign(lhs, rhs);
        let unit = builder.finish();

        // Run the rewrite without the allocator's table.
        let mut pass = RewriteStorageAccess::new();
        let result = pass.run(unit, &PassDataMap::new());
        assert!(matches!(result, Err(Error::AssertionFailure(_))));
    }

    #[test]
    fn rewritten_units_pass_the_invariant_check() {
        let mut builder = ContractBuilder::new();
        let x = builder.state_var("x", TypeNode::uint(8));
        let y = builder.state_var("y", TypeNode::uint(8));
        let lhs = builder.reference("y", y);
        let rhs = builder.reference("x", x);
        builder.assign(lhs, rhs);
        let unit = builder.finish();

        let result = storage_pipeline().run(unit).unwrap();
        // No identifier in the lowered tree references a state variable.
        for (id, node) in result.unit.ast.iter() {
            if matches!(node.kind.tag(), NodeKindTag::Identifier) {
                assert!(
                    super::StorageRewriter::state_var_target(&result.unit.ast, id).is_none()
                );
            }
        }
    }
}
