//! The node variants of the typed AST.
//!
//! Every node is owned by an [`crate::context::AstContext`] and refers to its
//! children by [`NodeId`]. The kind set is closed: the front-end only emits
//! these variants, and a pass encountering a construct it cannot lower
//! reports an error rather than inventing new kinds.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::types::{DataLocation, TypeNode};

/// The type for the integer-based identities of AST nodes.
///
/// Ids are monotonic within one context and opaque across contexts. The id
/// `0` is reserved and never names a live node.
pub type NodeId = usize;

/// A single node of the typed AST.
///
/// The kind-independent attributes live here; everything kind-specific,
/// including the child references, lives in [`NodeKind`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Node {
    /// The source span this node was parsed from, in the front-end's
    /// `offset:length:file` form, or empty for synthesised nodes.
    pub src: String,

    /// The type of the value this node evaluates to, where one applies.
    ///
    /// The front-end is authoritative here; passes read these annotations
    /// and never re-infer them.
    pub ty: Option<TypeNode>,

    /// Documentation attached to the node in the source, if any.
    pub documentation: Option<String>,

    /// The raw source excerpt carried alongside the node, if any.
    pub raw: Option<String>,

    /// The kind-specific payload, including all child references.
    pub kind: NodeKind,
}

impl Node {
    /// Creates a new synthesised node of the provided `kind` with no source
    /// span and no type annotation.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            src: String::new(),
            ty: None,
            documentation: None,
            raw: None,
            kind,
        }
    }

    /// Creates a new synthesised node of the provided `kind` carrying the
    /// provided type annotation.
    #[must_use]
    pub fn typed(kind: NodeKind, ty: TypeNode) -> Self {
        let mut node = Self::new(kind);
        node.ty = Some(ty);
        node
    }
}

/// The closed set of node kinds.
///
/// Each variant wraps a payload struct holding that kind's child references
/// (always by id) and scalar attributes.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum NodeKind {
    Assignment(Assignment),
    BinaryOperation(BinaryOperation),
    Block(Block),
    ContractDefinition(ContractDefinition),
    ElementaryTypeName(ElementaryTypeName),
    ExpressionStatement(ExpressionStatement),
    FunctionCall(FunctionCall),
    FunctionDefinition(FunctionDefinition),
    Identifier(Identifier),
    IndexAccess(IndexAccess),
    Literal(Literal),
    Mapping(MappingTypeName),
    SourceUnit(SourceUnit),
    TupleExpression(TupleExpression),
    UnaryOperation(UnaryOperation),
    UncheckedBlock(UncheckedBlock),
    VariableDeclaration(VariableDeclaration),
    VariableDeclarationStatement(VariableDeclarationStatement),
}

/// A fieldless mirror of [`NodeKind`] used for dispatch and ancestor
/// queries.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum NodeKindTag {
    Assignment,
    BinaryOperation,
    Block,
    ContractDefinition,
    ElementaryTypeName,
    ExpressionStatement,
    FunctionCall,
    FunctionDefinition,
    Identifier,
    IndexAccess,
    Literal,
    Mapping,
    SourceUnit,
    TupleExpression,
    UnaryOperation,
    UncheckedBlock,
    VariableDeclaration,
    VariableDeclarationStatement,
}

/// An assignment of a right-hand-side value into a left-hand-side location.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Assignment {
    /// The assignment operator as written, e.g. `=` or `+=`.
    pub operator: String,

    /// The location being assigned into.
    pub lhs: NodeId,

    /// The value being assigned.
    pub rhs: NodeId,
}

/// A binary operation over two sub-expressions.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BinaryOperation {
    /// The operator as written, e.g. `+` or `**`.
    pub operator: String,

    /// The left operand.
    pub lhs: NodeId,

    /// The right operand.
    pub rhs: NodeId,
}

/// A brace-delimited sequence of statements.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Block {
    /// The ordered statements of the block.
    pub statements: Vec<NodeId>,
}

/// A contract definition and its members.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ContractDefinition {
    /// The declared name of the contract.
    pub name: String,

    /// The member declarations in source order, including state variables
    /// and function definitions.
    pub members: Vec<NodeId>,
}

/// A reference to an elementary type by name, in type-name position.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ElementaryTypeName {
    /// The type name as written, e.g. `uint256`.
    pub name: String,
}

/// A statement that evaluates an expression for its effects.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ExpressionStatement {
    /// The expression being evaluated.
    pub expression: NodeId,
}

/// A call of a callee expression with positional arguments.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FunctionCall {
    /// The expression being called.
    pub callee: NodeId,

    /// The arguments, in positional order.
    pub arguments: Vec<NodeId>,
}

/// A function definition and its body.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FunctionDefinition {
    /// The declared name of the function.
    pub name: String,

    /// The parameter declarations, in positional order.
    pub parameters: Vec<NodeId>,

    /// The return-value declarations, in positional order.
    pub returns: Vec<NodeId>,

    /// The body block, absent for unimplemented functions.
    pub body: Option<NodeId>,
}

/// A use of a name in expression position.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Identifier {
    /// The name as written.
    pub name: String,

    /// The declaration this name resolves to, where the front-end resolved
    /// one.
    pub referenced_declaration: Option<NodeId>,
}

/// An indexing expression `base[index]`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IndexAccess {
    /// The expression being indexed.
    pub base: NodeId,

    /// The index expression. The front-end permits its absence in
    /// type-expression positions; the transpiler does not lower such uses.
    pub index: Option<NodeId>,
}

/// The syntactic category of a literal token.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum LiteralKind {
    /// A numeric literal, decimal, scientific, or hexadecimal.
    Number,

    /// A `true` or `false` literal.
    Bool,

    /// A string literal.
    String,
}

/// A literal token in expression position.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Literal {
    /// The syntactic category of the literal.
    pub kind: LiteralKind,

    /// The literal as written, digit separators included.
    pub value: String,

    /// The hexadecimal rendering of the literal's value, without a `0x`
    /// prefix.
    pub hex_value: String,
}

/// A mapping type in type-name position.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MappingTypeName {
    /// The key type-name node.
    pub key_type: NodeId,

    /// The value type-name node.
    pub value_type: NodeId,
}

/// The root of one source file's AST.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SourceUnit {
    /// The top-level definitions in source order.
    pub members: Vec<NodeId>,
}

/// A parenthesised tuple of expressions, possibly with empty slots on the
/// left-hand side of destructuring assignments.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TupleExpression {
    /// The tuple components in positional order, [`None`] for empty slots.
    pub components: Vec<Option<NodeId>>,
}

/// A unary operation over a sub-expression.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UnaryOperation {
    /// The operator as written, e.g. `-` or `!`.
    pub operator: String,

    /// The operand.
    pub operand: NodeId,
}

/// A block whose arithmetic is exempt from checked-overflow semantics.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UncheckedBlock {
    /// The ordered statements of the block.
    pub statements: Vec<NodeId>,
}

/// The mutability of a declared variable.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Mutability {
    /// An ordinary mutable variable.
    #[default]
    Mutable,

    /// A variable assigned once during construction.
    Immutable,

    /// A compile-time constant.
    Constant,
}

/// A variable declaration, either a contract member or a local binding.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VariableDeclaration {
    /// The declared name.
    pub name: String,

    /// The type-name node of the declared type, where one was written.
    pub type_name: Option<NodeId>,

    /// Whether this declaration is persisted in contract storage.
    pub state_variable: bool,

    /// The declared mutability.
    pub mutability: Mutability,

    /// The declared data location.
    pub location: DataLocation,

    /// The initialiser expression, where one was written. For mapping-typed
    /// state variables the storage allocator installs the canonical base
    /// expression here.
    pub value: Option<NodeId>,
}

/// A statement declaring one or more variables, optionally with an
/// initialiser.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct VariableDeclarationStatement {
    /// One slot per assignment position, [`None`] where the position is
    /// discarded.
    pub declarations: Vec<Option<NodeId>>,

    /// The initialiser expression, if any.
    pub initial_value: Option<NodeId>,
}

/// Operations over the kind payload that the context and the visitor
/// framework rely on. They are mechanical per-kind matches, kept here so
/// that adding a kind forces every site to be revisited.
impl NodeKind {
    /// Gets the fieldless tag corresponding to this kind.
    #[must_use]
    pub fn tag(&self) -> NodeKindTag {
        match self {
            NodeKind::Assignment(_) => NodeKindTag::Assignment,
            NodeKind::BinaryOperation(_) => NodeKindTag::BinaryOperation,
            NodeKind::Block(_) => NodeKindTag::Block,
            NodeKind::ContractDefinition(_) => NodeKindTag::ContractDefinition,
            NodeKind::ElementaryTypeName(_) => NodeKindTag::ElementaryTypeName,
            NodeKind::ExpressionStatement(_) => NodeKindTag::ExpressionStatement,
            NodeKind::FunctionCall(_) => NodeKindTag::FunctionCall,
            NodeKind::FunctionDefinition(_) => NodeKindTag::FunctionDefinition,
            NodeKind::Identifier(_) => NodeKindTag::Identifier,
            NodeKind::IndexAccess(_) => NodeKindTag::IndexAccess,
            NodeKind::Literal(_) => NodeKindTag::Literal,
            NodeKind::Mapping(_) => NodeKindTag::Mapping,
            NodeKind::SourceUnit(_) => NodeKindTag::SourceUnit,
            NodeKind::TupleExpression(_) => NodeKindTag::TupleExpression,
            NodeKind::UnaryOperation(_) => NodeKindTag::UnaryOperation,
            NodeKind::UncheckedBlock(_) => NodeKindTag::UncheckedBlock,
            NodeKind::VariableDeclaration(_) => NodeKindTag::VariableDeclaration,
            NodeKind::VariableDeclarationStatement(_) => {
                NodeKindTag::VariableDeclarationStatement
            }
        }
    }

    /// Collects the ids of this node's children in source order.
    #[must_use]
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Assignment(Assignment { lhs, rhs, .. })
            | NodeKind::BinaryOperation(BinaryOperation { lhs, rhs, .. }) => vec![*lhs, *rhs],
            NodeKind::Block(Block { statements })
            | NodeKind::UncheckedBlock(UncheckedBlock { statements }) => statements.clone(),
            NodeKind::ContractDefinition(ContractDefinition { members, .. })
            | NodeKind::SourceUnit(SourceUnit { members }) => members.clone(),
            NodeKind::ElementaryTypeName(_)
            | NodeKind::Identifier(_)
            | NodeKind::Literal(_) => vec![],
            NodeKind::ExpressionStatement(ExpressionStatement { expression }) => {
                vec![*expression]
            }
            NodeKind::FunctionCall(FunctionCall { callee, arguments }) => {
                let mut ids = vec![*callee];
                ids.extend(arguments);
                ids
            }
            NodeKind::FunctionDefinition(FunctionDefinition {
                parameters,
                returns,
                body,
                ..
            }) => {
                let mut ids = parameters.clone();
                ids.extend(returns);
                ids.extend(body);
                ids
            }
            NodeKind::IndexAccess(IndexAccess { base, index }) => {
                let mut ids = vec![*base];
                ids.extend(index);
                ids
            }
            NodeKind::Mapping(MappingTypeName {
                key_type,
                value_type,
            }) => vec![*key_type, *value_type],
            NodeKind::TupleExpression(TupleExpression { components }) => {
                components.iter().flatten().copied().collect()
            }
            NodeKind::UnaryOperation(UnaryOperation { operand, .. }) => vec![*operand],
            NodeKind::VariableDeclaration(VariableDeclaration {
                type_name, value, ..
            }) => type_name.iter().chain(value.iter()).copied().collect(),
            NodeKind::VariableDeclarationStatement(VariableDeclarationStatement {
                declarations,
                initial_value,
            }) => declarations
                .iter()
                .flatten()
                .chain(initial_value.iter())
                .copied()
                .collect(),
        }
    }

    /// Rewrites every child reference equal to `old` to name `new` instead,
    /// returning `true` iff at least one reference was rewritten.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> bool {
        let replace_id = |id: &mut NodeId| {
            let hit = *id == old;
            if hit {
                *id = new;
            }
            hit
        };
        let replace_in_vec = |ids: &mut Vec<NodeId>| {
            let mut hit = false;
            for id in ids {
                hit |= replace_id(id);
            }
            hit
        };
        let replace_in_opt = |id: &mut Option<NodeId>| {
            id.as_mut().is_some_and(|inner| {
                let hit = *inner == old;
                if hit {
                    *inner = new;
                }
                hit
            })
        };

        match self {
            NodeKind::Assignment(Assignment { lhs, rhs, .. })
            | NodeKind::BinaryOperation(BinaryOperation { lhs, rhs, .. }) => {
                replace_id(lhs) | replace_id(rhs)
            }
            NodeKind::Block(Block { statements })
            | NodeKind::UncheckedBlock(UncheckedBlock { statements }) => {
                replace_in_vec(statements)
            }
            NodeKind::ContractDefinition(ContractDefinition { members, .. })
            | NodeKind::SourceUnit(SourceUnit { members }) => replace_in_vec(members),
            NodeKind::ElementaryTypeName(_)
            | NodeKind::Identifier(_)
            | NodeKind::Literal(_) => false,
            NodeKind::ExpressionStatement(ExpressionStatement { expression }) => {
                replace_id(expression)
            }
            NodeKind::FunctionCall(FunctionCall { callee, arguments }) => {
                replace_id(callee) | replace_in_vec(arguments)
            }
            NodeKind::FunctionDefinition(FunctionDefinition {
                parameters,
                returns,
                body,
                ..
            }) => replace_in_vec(parameters) | replace_in_vec(returns) | replace_in_opt(body),
            NodeKind::IndexAccess(IndexAccess { base, index }) => {
                replace_id(base) | replace_in_opt(index)
            }
            NodeKind::Mapping(MappingTypeName {
                key_type,
                value_type,
            }) => replace_id(key_type) | replace_id(value_type),
            NodeKind::TupleExpression(TupleExpression { components }) => {
                let mut hit = false;
                for component in components {
                    hit |= replace_in_opt(component);
                }
                hit
            }
            NodeKind::UnaryOperation(UnaryOperation { operand, .. }) => replace_id(operand),
            NodeKind::VariableDeclaration(VariableDeclaration {
                type_name, value, ..
            }) => replace_in_opt(type_name) | replace_in_opt(value),
            NodeKind::VariableDeclarationStatement(VariableDeclarationStatement {
                declarations,
                initial_value,
            }) => {
                let mut hit = false;
                for declaration in declarations {
                    hit |= replace_in_opt(declaration);
                }
                hit | replace_in_opt(initial_value)
            }
        }
    }

    /// Gets the human-readable name of this kind for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Assignment(_) => "Assignment",
            NodeKind::BinaryOperation(_) => "BinaryOperation",
            NodeKind::Block(_) => "Block",
            NodeKind::ContractDefinition(_) => "ContractDefinition",
            NodeKind::ElementaryTypeName(_) => "ElementaryTypeName",
            NodeKind::ExpressionStatement(_) => "ExpressionStatement",
            NodeKind::FunctionCall(_) => "FunctionCall",
            NodeKind::FunctionDefinition(_) => "FunctionDefinition",
            NodeKind::Identifier(_) => "Identifier",
            NodeKind::IndexAccess(_) => "IndexAccess",
            NodeKind::Literal(_) => "Literal",
            NodeKind::Mapping(_) => "Mapping",
            NodeKind::SourceUnit(_) => "SourceUnit",
            NodeKind::TupleExpression(_) => "TupleExpression",
            NodeKind::UnaryOperation(_) => "UnaryOperation",
            NodeKind::UncheckedBlock(_) => "UncheckedBlock",
            NodeKind::VariableDeclaration(_) => "VariableDeclaration",
            NodeKind::VariableDeclarationStatement(_) => "VariableDeclarationStatement",
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind.name())?;
        if !self.src.is_empty() {
            write!(f, " at {}", self.src)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::node::{Assignment, Node, NodeKind, NodeKindTag, TupleExpression};

    #[test]
    fn children_follow_source_order() {
        let kind = NodeKind::Assignment(Assignment {
            operator: "=".to_string(),
            lhs:      4,
            rhs:      7,
        });
        assert_eq!(kind.children(), vec![4, 7]);
        assert_eq!(kind.tag(), NodeKindTag::Assignment);
    }

    #[test]
    fn tuple_children_skip_empty_slots() {
        let kind = NodeKind::TupleExpression(TupleExpression {
            components: vec![Some(3), None, Some(9)],
        });
        assert_eq!(kind.children(), vec![3, 9]);
    }

    #[test]
    fn replace_child_rewrites_references() {
        let mut kind = NodeKind::Assignment(Assignment {
            operator: "=".to_string(),
            lhs:      4,
            rhs:      7,
        });
        assert!(kind.replace_child(7, 11));
        assert_eq!(kind.children(), vec![4, 11]);
        assert!(!kind.replace_child(7, 12));
    }

    #[test]
    fn display_includes_kind_and_span() {
        let mut node = Node::new(NodeKind::TupleExpression(TupleExpression {
            components: vec![],
        }));
        assert_eq!(node.to_string(), "TupleExpression");
        node.src = "12:3:0".to_string();
        assert_eq!(node.to_string(), "TupleExpression at 12:3:0");
    }
}
