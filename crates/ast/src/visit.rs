//! The mapper framework that every rewriting pass is built on.
//!
//! A pass implements [`AstMapper`] and overrides the `visit_*` methods for
//! the kinds it rewrites. Dispatch is a single match on the node's kind tag;
//! every unoverridden method falls through to [`AstMapper::common_visit`],
//! which recurses into each child in order. A pass short-circuits recursion
//! simply by not calling `common_visit` from an overridden method.
//!
//! Mappers are stateless across compilations; any counters they carry (for
//! generated names and the like) are instance-local.

use stc_errors::transpile::Result;

use crate::{
    context::AstContext,
    node::{NodeId, NodeKindTag},
};

/// The uniform visitation contract over the typed AST.
///
/// All methods take the context mutably: a visit is allowed to rewrite the
/// tree under the node it was dispatched on, including replacing that node
/// itself. The traversal helpers tolerate nodes dropped by such rewrites.
pub trait AstMapper {
    /// Dispatches `id` to the most specific handler for its kind.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the dispatched handler fails.
    fn visit_node(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        match ctx.kind_tag(id) {
            NodeKindTag::Assignment => self.visit_assignment(ctx, id),
            NodeKindTag::BinaryOperation => self.visit_binary_operation(ctx, id),
            NodeKindTag::Block => self.visit_block(ctx, id),
            NodeKindTag::ContractDefinition => self.visit_contract_definition(ctx, id),
            NodeKindTag::ElementaryTypeName => self.visit_elementary_type_name(ctx, id),
            NodeKindTag::ExpressionStatement => self.visit_expression_statement(ctx, id),
            NodeKindTag::FunctionCall => self.visit_function_call(ctx, id),
            NodeKindTag::FunctionDefinition => self.visit_function_definition(ctx, id),
            NodeKindTag::Identifier => self.visit_identifier(ctx, id),
            NodeKindTag::IndexAccess => self.visit_index_access(ctx, id),
            NodeKindTag::Literal => self.visit_literal(ctx, id),
            NodeKindTag::Mapping => self.visit_mapping(ctx, id),
            NodeKindTag::SourceUnit => self.visit_source_unit(ctx, id),
            NodeKindTag::TupleExpression => self.visit_tuple_expression(ctx, id),
            NodeKindTag::UnaryOperation => self.visit_unary_operation(ctx, id),
            NodeKindTag::UncheckedBlock => self.visit_unchecked_block(ctx, id),
            NodeKindTag::VariableDeclaration => self.visit_variable_declaration(ctx, id),
            NodeKindTag::VariableDeclarationStatement => {
                self.visit_variable_declaration_statement(ctx, id)
            }
        }
    }

    /// The default handler: recurses into every child of `id` in order.
    ///
    /// Children dropped by the visitation of an earlier sibling are skipped
    /// rather than visited dangling.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if visiting any child fails.
    fn common_visit(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        for child in ctx.children_of(id) {
            if ctx.contains(child) {
                self.visit_node(ctx, child)?;
            }
        }
        Ok(())
    }

    /// Visits an `Assignment` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_assignment(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `BinaryOperation` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_binary_operation(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `Block` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_block(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `ContractDefinition` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_contract_definition(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits an `ElementaryTypeName` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_elementary_type_name(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits an `ExpressionStatement` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_expression_statement(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `FunctionCall` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_function_call(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `FunctionDefinition` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_function_definition(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits an `Identifier` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_identifier(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits an `IndexAccess` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_index_access(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `Literal` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_literal(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `Mapping` type-name node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_mapping(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `SourceUnit` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_source_unit(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `TupleExpression` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_tuple_expression(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `UnaryOperation` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_unary_operation(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits an `UncheckedBlock` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_unchecked_block(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `VariableDeclaration` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_variable_declaration(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.common_visit(ctx, id)
    }

    /// Visits a `VariableDeclarationStatement` node.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error`] if the visitation fails.
    fn visit_variable_declaration_statement(
        &mut self,
        ctx: &mut AstContext,
        id: NodeId,
    ) -> Result<()> {
        self.common_visit(ctx, id)
    }
}
