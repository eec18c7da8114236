//! This pass canonicalises multi-name variable declaration statements into
//! sequences of single-name statements.
//!
//! Two initialiser shapes are split:
//!
//! - **Tuple-returning calls** stay atomic (the call must execute exactly
//!   once), but any slot whose declared type disagrees with the call's
//!   corresponding return type is replaced in the receiving tuple by a
//!   synthesised constant temporary of the return type, followed by a
//!   statement rebinding the original declaration to that temporary. The
//!   tuple still receives every return value in the one call, so evaluation
//!   semantics are preserved.
//! - **Tuple expressions** split componentwise: discarded components with
//!   no expression disappear, discarded components with an expression keep
//!   their side effects in a bare expression statement, and bound components
//!   become single-name declaration statements. The front-end guarantees
//!   equal arity on both sides.
//!
//! Split statements are inserted immediately after their origin inside the
//! enclosing block, and nested blocks are processed before their parents so
//! a single linear rewrite of each statement list suffices.

use stc_ast::{
    node::{
        ExpressionStatement,
        Identifier,
        Mutability,
        Node,
        NodeId,
        NodeKind,
        VariableDeclaration,
        VariableDeclarationStatement,
    },
    types::{DataLocation, TypeNode},
    visit::AstMapper,
    AstContext,
};
use stc_errors::transpile::{Error, Result};

use crate::{
    compile::{
        pass::{
            data::{NoPassData, PassDataMap, PassReturnData},
            ConcretePass,
            Pass,
            PassKey,
            PassOps,
        },
        unit::CompilationUnit,
    },
    names::NameGenerator,
};

/// Canonicalises multi-name declaration statements into single-name
/// statements.
#[derive(Clone, Debug)]
pub struct SplitVariableDeclarations {
    /// The passes that this pass depends upon the results of for its
    /// execution.
    depends: Vec<PassKey>,

    /// The passes that this pass invalidates the results of by executing.
    invalidates: Vec<PassKey>,

    /// The generator for the names of synthesised temporaries.
    names: NameGenerator,
}

impl Default for SplitVariableDeclarations {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructors that provide ways to create an instance of the
/// [`SplitVariableDeclarations`] pass.
impl SplitVariableDeclarations {
    /// Creates a new instance of the declaration splitting pass.
    #[must_use]
    pub fn new() -> Self {
        let depends = vec![];
        let invalidates = vec![];
        let names = NameGenerator::new();
        Self {
            depends,
            invalidates,
            names,
        }
    }

    /// Creates a new trait object of the declaration splitting pass.
    #[must_use]
    pub fn new_dyn() -> Box<Self> {
        Box::new(Self::new())
    }
}

/// Functionality that the [`SplitVariableDeclarations`] pass implements.
impl SplitVariableDeclarations {
    /// Returns `true` iff the statement at `id` binds more than one
    /// assignment slot and hence needs splitting.
    fn needs_split(ctx: &AstContext, id: NodeId) -> bool {
        matches!(
            &ctx.node(id).kind,
            NodeKind::VariableDeclarationStatement(vds) if vds.declarations.len() > 1
        )
    }

    /// Rewrites the statement list of the block at `id`, splitting every
    /// multi-name declaration statement in place.
    fn rewrite_block(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        // Nested blocks first, so this block's own list is rewritten last.
        self.common_visit(ctx, id)?;

        let statements = ctx.children_of(id);
        let mut rewritten: Vec<NodeId> = Vec::with_capacity(statements.len());
        let mut changed = false;

        for stmt in statements {
            if !Self::needs_split(ctx, stmt) {
                rewritten.push(stmt);
                continue;
            }

            let pieces = self.split_statement(ctx, stmt)?;
            if pieces.len() == 1 && pieces[0] == stmt {
                rewritten.push(stmt);
                continue;
            }

            ctx.drop_subtree(stmt);
            rewritten.extend(pieces);
            changed = true;
        }

        if changed {
            match &mut ctx.node_mut(id).kind {
                NodeKind::Block(block) => block.statements = rewritten,
                NodeKind::UncheckedBlock(block) => block.statements = rewritten,
                _ => {}
            }
            ctx.reindex_children(id);
        }
        Ok(())
    }

    /// Splits the multi-name declaration statement at `stmt`, returning the
    /// statements that replace it. Returning `[stmt]` itself means the
    /// statement is already canonical and must be kept.
    fn split_statement(&mut self, ctx: &mut AstContext, stmt: NodeId) -> Result<Vec<NodeId>> {
        let NodeKind::VariableDeclarationStatement(vds) = ctx.node(stmt).kind.clone() else {
            return Err(Error::AssertionFailure(format!(
                "attempted to split non-declaration statement {}",
                ctx.describe(stmt)
            )));
        };

        let Some(init) = vds.initial_value else {
            return Err(Error::TranspileFailed(format!(
                "multi-variable declaration {} has no initialiser",
                ctx.describe(stmt)
            )));
        };

        let init_node = ctx.node(init);
        match (&init_node.kind, &init_node.ty) {
            (NodeKind::FunctionCall(_), Some(TypeNode::Tuple(elements))) => {
                let elements = elements.clone();
                self.split_tuple_call(ctx, stmt, &vds, init, &elements)
            }
            (NodeKind::TupleExpression(tuple), _) => {
                let components = tuple.components.clone();
                Self::split_tuple_expression(ctx, stmt, &vds, &components)
            }
            _ => Err(Error::TranspileFailed(format!(
                "cannot split declaration statement with initialiser {}",
                ctx.describe(init)
            ))),
        }
    }

    /// Splits a declaration statement whose initialiser is a call returning
    /// a tuple, synthesising temporaries for type-mismatched slots.
    fn split_tuple_call(
        &mut self,
        ctx: &mut AstContext,
        stmt: NodeId,
        vds: &VariableDeclarationStatement,
        init: NodeId,
        elements: &[TypeNode],
    ) -> Result<Vec<NodeId>> {
        if elements.len() != vds.declarations.len() {
            Err(Error::AssertionFailure(format!(
                "call {} returns {} values into {} declaration slots",
                ctx.describe(init),
                elements.len(),
                vds.declarations.len()
            )))?;
        }

        let mut tuple_decls = vds.declarations.clone();
        let mut follow_ups: Vec<NodeId> = Vec::new();

        for (index, slot) in vds.declarations.iter().enumerate() {
            let Some(decl) = *slot else {
                continue;
            };
            let declared = ctx.node(decl).ty.clone().ok_or_else(|| {
                Error::AssertionFailure(format!(
                    "declaration {} carries no type",
                    ctx.describe(decl)
                ))
            })?;
            if declared.to_string() == elements[index].to_string() {
                continue;
            }

            // The declared type disagrees with what the call returns, so
            // the tuple receives a temporary of the return type and the
            // original declaration is rebound afterwards.
            let temp_name = self.names.next("td");
            let temp = ctx.insert(Node::typed(
                NodeKind::VariableDeclaration(VariableDeclaration {
                    name: temp_name.clone(),
                    type_name: None,
                    state_variable: false,
                    mutability: Mutability::Constant,
                    location: DataLocation::Default,
                    value: None,
                }),
                elements[index].clone(),
            ));
            tuple_decls[index] = Some(temp);

            let reference = ctx.insert(Node::typed(
                NodeKind::Identifier(Identifier {
                    name: temp_name,
                    referenced_declaration: Some(temp),
                }),
                elements[index].clone(),
            ));
            follow_ups.push(ctx.insert(Node::new(
                NodeKind::VariableDeclarationStatement(VariableDeclarationStatement {
                    declarations:  vec![Some(decl)],
                    initial_value: Some(reference),
                }),
            )));
        }

        if follow_ups.is_empty() {
            return Ok(vec![stmt]);
        }

        let original = ctx.node(stmt);
        let mut head = Node::new(NodeKind::VariableDeclarationStatement(
            VariableDeclarationStatement {
                declarations:  tuple_decls,
                initial_value: Some(init),
            },
        ));
        head.src = original.src.clone();
        head.documentation = original.documentation.clone();
        head.raw = original.raw.clone();
        let head = ctx.insert(head);

        let mut result = vec![head];
        result.extend(follow_ups);
        Ok(result)
    }

    /// Splits a declaration statement whose initialiser is a tuple
    /// expression into one statement per component.
    fn split_tuple_expression(
        ctx: &mut AstContext,
        stmt: NodeId,
        vds: &VariableDeclarationStatement,
        components: &[Option<NodeId>],
    ) -> Result<Vec<NodeId>> {
        if components.len() != vds.declarations.len() {
            Err(Error::AssertionFailure(format!(
                "tuple initialiser of {} has {} components for {} declaration slots",
                ctx.describe(stmt),
                components.len(),
                vds.declarations.len()
            )))?;
        }

        let mut result: Vec<NodeId> = Vec::new();
        for (slot, component) in vds.declarations.iter().zip(components) {
            match (slot, component) {
                // Nothing bound, nothing evaluated: the slot disappears.
                (None, None) => {}
                // Nothing bound, but the component must still be evaluated
                // for its side effects.
                (None, Some(expression)) => {
                    result.push(ctx.insert(Node::new(NodeKind::ExpressionStatement(
                        ExpressionStatement {
                            expression: *expression,
                        },
                    ))));
                }
                (Some(decl), component) => {
                    result.push(ctx.insert(Node::new(
                        NodeKind::VariableDeclarationStatement(VariableDeclarationStatement {
                            declarations:  vec![Some(*decl)],
                            initial_value: *component,
                        }),
                    )));
                }
            }
        }

        // Source annotations stay with the first statement only.
        if let Some(first) = result.first().copied() {
            let documentation = ctx.node(stmt).documentation.clone();
            let raw = ctx.node(stmt).raw.clone();
            let first_node = ctx.node_mut(first);
            first_node.documentation = documentation;
            first_node.raw = raw;
        }

        Ok(result)
    }
}

impl AstMapper for SplitVariableDeclarations {
    fn visit_block(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.rewrite_block(ctx, id)
    }

    fn visit_unchecked_block(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        self.rewrite_block(ctx, id)
    }
}

impl PassOps for SplitVariableDeclarations {
    fn run(
        &mut self,
        mut unit: CompilationUnit,
        _pass_data: &PassDataMap,
    ) -> Result<PassReturnData> {
        let root = unit.root;
        self.visit_node(&mut unit.ast, root)?;
        Ok(PassReturnData::new(unit, NoPassData::<Self>::new_dyn()))
    }

    fn check_invariants(&self, unit: &CompilationUnit) -> Result<()> {
        // Every declaration statement inside a block now binds exactly one
        // name, except the atomic tuple-returning-call form.
        for (id, node) in unit.ast.iter() {
            let statements = match &node.kind {
                NodeKind::Block(block) => &block.statements,
                NodeKind::UncheckedBlock(block) => &block.statements,
                _ => continue,
            };
            for stmt in statements {
                let NodeKind::VariableDeclarationStatement(vds) =
                    &unit.ast.node(*stmt).kind
                else {
                    continue;
                };
                if vds.declarations.len() <= 1 {
                    continue;
                }
                let is_tuple_call = vds.initial_value.is_some_and(|init| {
                    matches!(
                        (&unit.ast.node(init).kind, &unit.ast.node(init).ty),
                        (NodeKind::FunctionCall(_), Some(TypeNode::Tuple(_)))
                    )
                });
                if !is_tuple_call {
                    Err(Error::AssertionFailure(format!(
                        "multi-name declaration statement {} survived splitting in {}",
                        unit.ast.describe(*stmt),
                        unit.ast.describe(id)
                    )))?;
                }
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

impl ConcretePass for SplitVariableDeclarations {
    type Data = NoPassData<Self>;
}

#[cfg(test)]
mod test {
    use stc_ast::{
        node::{
            Block,
            FunctionCall,
            Identifier,
            Literal,
            LiteralKind,
            Mutability,
            Node,
            NodeId,
            NodeKind,
            NodeKindTag,
            TupleExpression,
            VariableDeclaration,
            VariableDeclarationStatement,
        },
        types::{DataLocation, TypeNode},
        visit::AstMapper,
        AstContext,
    };

    use crate::compile::pass::transform::split_declarations::SplitVariableDeclarations;

    fn local_decl(ctx: &mut AstContext, name: &str, ty: TypeNode) -> NodeId {
        ctx.insert(Node::typed(
            NodeKind::VariableDeclaration(VariableDeclaration {
                name: name.to_string(),
                type_name: None,
                state_variable: false,
                mutability: Mutability::Mutable,
                location: DataLocation::Default,
                value: None,
            }),
            ty,
        ))
    }

    fn number(ctx: &mut AstContext, value: &str) -> NodeId {
        ctx.insert(Node::new(NodeKind::Literal(Literal {
            kind:      LiteralKind::Number,
            value:     value.to_string(),
            hex_value: String::new(),
        })))
    }

    fn block_of(ctx: &mut AstContext, statements: Vec<NodeId>) -> NodeId {
        ctx.insert(Node::new(NodeKind::Block(Block { statements })))
    }

    /// Builds `(int8 a, uint256 b) = f();` where `f` returns
    /// `(uint8, uint256)`, so slot zero's types disagree.
    fn mismatched_call_statement(ctx: &mut AstContext) -> (NodeId, NodeId, NodeId) {
        let a = local_decl(ctx, "a", TypeNode::int(8));
        let b = local_decl(ctx, "b", TypeNode::uint(256));
        let callee = ctx.insert(Node::new(NodeKind::Identifier(Identifier {
            name: "f".to_string(),
            referenced_declaration: None,
        })));
        let call = ctx.insert(Node::typed(
            NodeKind::FunctionCall(FunctionCall {
                callee,
                arguments: vec![],
            }),
            TypeNode::Tuple(vec![TypeNode::uint(8), TypeNode::uint(256)]),
        ));
        let stmt = ctx.insert(Node::new(NodeKind::VariableDeclarationStatement(
            VariableDeclarationStatement {
                declarations:  vec![Some(a), Some(b)],
                initial_value: Some(call),
            },
        )));
        (stmt, a, b)
    }

    #[test]
    fn single_declarations_are_untouched() {
        let mut ctx = AstContext::new();
        let decl = local_decl(&mut ctx, "x", TypeNode::uint(8));
        let init = number(&mut ctx, "1");
        let stmt = ctx.insert(Node::new(NodeKind::VariableDeclarationStatement(
            VariableDeclarationStatement {
                declarations:  vec![Some(decl)],
                initial_value: Some(init),
            },
        )));
        let block = block_of(&mut ctx, vec![stmt]);

        let mut pass = SplitVariableDeclarations::new();
        pass.visit_block(&mut ctx, block).unwrap();
        assert_eq!(ctx.children_of(block), vec![stmt]);
    }

    #[test]
    fn tuple_call_with_mismatched_types_gets_temporaries() {
        let mut ctx = AstContext::new();
        let (stmt, a, b) = mismatched_call_statement(&mut ctx);
        let block = block_of(&mut ctx, vec![stmt]);

        let mut pass = SplitVariableDeclarations::new();
        pass.visit_block(&mut ctx, block).unwrap();

        let statements = ctx.children_of(block);
        assert_eq!(statements.len(), 2);
        assert!(!ctx.contains(stmt));

        // The head statement still receives the call into a tuple, with a
        // temporary in the mismatched slot and `b` kept in place.
        let NodeKind::VariableDeclarationStatement(head) = &ctx.node(statements[0]).kind
        else {
            panic!("head is not a declaration statement");
        };
        assert_eq!(head.declarations.len(), 2);
        let temp = head.declarations[0].unwrap();
        assert_ne!(temp, a);
        assert_eq!(head.declarations[1], Some(b));
        let NodeKind::VariableDeclaration(temp_decl) = &ctx.node(temp).kind else {
            panic!("slot does not hold a declaration");
        };
        assert_eq!(temp_decl.name, "__warp_td_0");
        assert_eq!(temp_decl.mutability, Mutability::Constant);
        assert_eq!(ctx.node(temp).ty, Some(TypeNode::uint(8)));

        // The follow-up rebinds `a` to the temporary.
        let NodeKind::VariableDeclarationStatement(rebind) = &ctx.node(statements[1]).kind
        else {
            panic!("follow-up is not a declaration statement");
        };
        assert_eq!(rebind.declarations, vec![Some(a)]);
        let reference = rebind.initial_value.unwrap();
        let NodeKind::Identifier(ident) = &ctx.node(reference).kind else {
            panic!("rebind initialiser is not an identifier");
        };
        assert_eq!(ident.name, "__warp_td_0");
        assert_eq!(ident.referenced_declaration, Some(temp));
    }

    #[test]
    fn matching_tuple_call_stays_atomic() {
        let mut ctx = AstContext::new();
        let a = local_decl(&mut ctx, "a", TypeNode::uint(8));
        let b = local_decl(&mut ctx, "b", TypeNode::uint(256));
        let callee = ctx.insert(Node::new(NodeKind::Identifier(Identifier {
            name: "f".to_string(),
            referenced_declaration: None,
        })));
        let call = ctx.insert(Node::typed(
            NodeKind::FunctionCall(FunctionCall {
                callee,
                arguments: vec![],
            }),
            TypeNode::Tuple(vec![TypeNode::uint(8), TypeNode::uint(256)]),
        ));
        let stmt = ctx.insert(Node::new(NodeKind::VariableDeclarationStatement(
            VariableDeclarationStatement {
                declarations:  vec![Some(a), Some(b)],
                initial_value: Some(call),
            },
        )));
        let block = block_of(&mut ctx, vec![stmt]);

        let mut pass = SplitVariableDeclarations::new();
        pass.visit_block(&mut ctx, block).unwrap();
        assert_eq!(ctx.children_of(block), vec![stmt]);
    }

    #[test]
    fn tuple_expressions_split_componentwise() {
        let mut ctx = AstContext::new();
        // (uint8 x, , ) = (1, f(), ): binds x, keeps f() for effect, and
        // drops the doubly-empty slot.
        let x = local_decl(&mut ctx, "x", TypeNode::uint(8));
        let one = number(&mut ctx, "1");
        let callee = ctx.insert(Node::new(NodeKind::Identifier(Identifier {
            name: "f".to_string(),
            referenced_declaration: None,
        })));
        let effect = ctx.insert(Node::new(NodeKind::FunctionCall(FunctionCall {
            callee,
            arguments: vec![],
        })));
        let tuple = ctx.insert(Node::new(NodeKind::TupleExpression(TupleExpression {
            components: vec![Some(one), Some(effect), None],
        })));
        let mut stmt_node = Node::new(NodeKind::VariableDeclarationStatement(
            VariableDeclarationStatement {
                declarations:  vec![Some(x), None, None],
                initial_value: Some(tuple),
            },
        ));
        stmt_node.documentation = Some("doc".to_string());
        let stmt = ctx.insert(stmt_node);
        let block = block_of(&mut ctx, vec![stmt]);

        let mut pass = SplitVariableDeclarations::new();
        pass.visit_block(&mut ctx, block).unwrap();

        let statements = ctx.children_of(block);
        assert_eq!(statements.len(), 2);
        assert!(!ctx.contains(stmt));
        assert!(!ctx.contains(tuple));

        let NodeKind::VariableDeclarationStatement(bound) = &ctx.node(statements[0]).kind
        else {
            panic!("first statement is not a declaration");
        };
        assert_eq!(bound.declarations, vec![Some(x)]);
        assert_eq!(bound.initial_value, Some(one));

        assert_eq!(ctx.kind_tag(statements[1]), NodeKindTag::ExpressionStatement);
        assert_eq!(ctx.children_of(statements[1]), vec![effect]);

        // Annotations attach to the first emitted statement only.
        assert_eq!(
            ctx.node(statements[0]).documentation.as_deref(),
            Some("doc")
        );
        assert_eq!(ctx.node(statements[1]).documentation, None);
    }

    #[test]
    fn unknown_multi_declaration_shapes_are_rejected() {
        let mut ctx = AstContext::new();
        let a = local_decl(&mut ctx, "a", TypeNode::uint(8));
        let b = local_decl(&mut ctx, "b", TypeNode::uint(8));
        let init = number(&mut ctx, "1");
        let stmt = ctx.insert(Node::new(NodeKind::VariableDeclarationStatement(
            VariableDeclarationStatement {
                declarations:  vec![Some(a), Some(b)],
                initial_value: Some(init),
            },
        )));
        let block = block_of(&mut ctx, vec![stmt]);

        let mut pass = SplitVariableDeclarations::new();
        assert!(pass.visit_block(&mut ctx, block).is_err());
    }

    #[test]
    fn nested_blocks_are_rewritten_before_their_parents() {
        let mut ctx = AstContext::new();
        let (inner_stmt, ..) = mismatched_call_statement(&mut ctx);
        let inner = block_of(&mut ctx, vec![inner_stmt]);
        let (outer_stmt, ..) = mismatched_call_statement(&mut ctx);
        let outer = block_of(&mut ctx, vec![outer_stmt, inner]);

        let mut pass = SplitVariableDeclarations::new();
        pass.visit_block(&mut ctx, outer).unwrap();

        // Both levels got split, and each block holds its own pieces.
        assert_eq!(ctx.children_of(inner).len(), 2);
        let outer_children = ctx.children_of(outer);
        assert_eq!(outer_children.len(), 3);
        assert_eq!(outer_children[2], inner);
    }
}
