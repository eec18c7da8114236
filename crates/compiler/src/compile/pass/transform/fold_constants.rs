//! This pass folds constant literal expressions, evaluating them over exact
//! rationals with the source language's compile-time semantics.
//!
//! Solidity evaluates constant numeric expressions without overflow or
//! rounding (`1.5e2` and `0.5 * 300` are both just `150`), so the folder works
//! over [`RationalLiteral`] values and only materialises a result when it is
//! an exact integer (or a boolean, for comparisons). Subtrees involving
//! anything non-constant are left intact, as are exact-rational results that
//! no integer context has forced yet.
//!
//! Division by zero inside a constant expression is a compile-time error
//! and aborts the pipeline.

use num_bigint::BigInt;
use stc_ast::{
    node::{Literal, LiteralKind, Node, NodeId, NodeKind},
    types::TypeNode,
    visit::AstMapper,
    AstContext,
};
use stc_errors::transpile::Result;

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
    rational::RationalLiteral,
};

/// Folds constant literal expressions into single literal nodes.
#[derive(Clone, Debug)]
pub struct FoldConstants {
    /// The passes that this pass depends upon the results of for its
    /// execution.
    depends: Vec<PassKey>,

    /// The passes that this pass invalidates the results of by executing.
    invalidates: Vec<PassKey>,
}

impl Default for FoldConstants {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructors that provide ways to create an instance of the
/// [`FoldConstants`] pass.
impl FoldConstants {
    /// Creates a new instance of the constant folding pass.
    #[must_use]
    pub fn new() -> Self {
        let depends = vec![];
        let invalidates = vec![];
        Self {
            depends,
            invalidates,
        }
    }

    /// Creates a new trait object of the constant folding pass.
    #[must_use]
    pub fn new_dyn() -> Box<Self> {
        Box::new(Self::new())
    }
}

/// Functionality that the [`FoldConstants`] pass implements.
impl FoldConstants {
    /// Evaluates the expression rooted at `id` over exact rationals,
    /// returning [`None`] for anything non-constant.
    ///
    /// # Errors
    ///
    /// - [`stc_errors::transpile::Error::DivisionByZero`] for division or
    ///   modulo by a constant zero.
    /// - [`stc_errors::transpile::Error::TranspileFailed`] for a
    ///   non-integer constant exponent.
    fn try_eval(ctx: &AstContext, id: NodeId) -> Result<Option<RationalLiteral>> {
        match &ctx.node(id).kind {
            NodeKind::Literal(literal) if literal.kind == LiteralKind::Number => {
                RationalLiteral::parse(&literal.value).map(Some)
            }
            NodeKind::UnaryOperation(unary) if unary.operator == "-" => {
                Ok(Self::try_eval(ctx, unary.operand)?.map(|value| value.negate()))
            }
            NodeKind::BinaryOperation(binary) => {
                let (Some(lhs), Some(rhs)) = (
                    Self::try_eval(ctx, binary.lhs)?,
                    Self::try_eval(ctx, binary.rhs)?,
                ) else {
                    return Ok(None);
                };

                let result = match binary.operator.as_str() {
                    "+" => lhs.add(&rhs),
                    "-" => lhs.subtract(&rhs),
                    "*" => lhs.multiply(&rhs),
                    "/" => lhs.divide_by(&rhs)?,
                    "%" => lhs.rem(&rhs)?,
                    "**" => lhs.exp(&rhs)?,
                    _ => return Ok(None),
                };
                Ok(Some(result))
            }
            _ => Ok(None),
        }
    }

    /// Evaluates a constant comparison, returning [`None`] when either side
    /// is non-constant or the operator is not a comparison.
    fn try_compare(ctx: &AstContext, id: NodeId) -> Result<Option<bool>> {
        let NodeKind::BinaryOperation(binary) = &ctx.node(id).kind else {
            return Ok(None);
        };
        if !matches!(binary.operator.as_str(), "==" | "!=" | ">" | "<" | ">=" | "<=") {
            return Ok(None);
        }

        let (Some(lhs), Some(rhs)) = (
            Self::try_eval(ctx, binary.lhs)?,
            Self::try_eval(ctx, binary.rhs)?,
        ) else {
            return Ok(None);
        };

        let outcome = match binary.operator.as_str() {
            "==" => lhs.equal_value_of(&rhs),
            "!=" => !lhs.equal_value_of(&rhs),
            ">" => lhs.greater_than(&rhs),
            "<" => rhs.greater_than(&lhs),
            ">=" => !rhs.greater_than(&lhs),
            "<=" => !lhs.greater_than(&rhs),
            _ => return Ok(None),
        };
        Ok(Some(outcome))
    }

    /// Replaces the expression at `id` with a number literal denoting
    /// `value`.
    fn fold_to_integer(ctx: &mut AstContext, id: NodeId, value: &BigInt) -> Result<()> {
        let literal = ctx.insert(Node::typed(
            NodeKind::Literal(Literal {
                kind:      LiteralKind::Number,
                value:     value.to_string(),
                hex_value: value.magnitude().to_str_radix(16),
            }),
            TypeNode::Builtin(format!("int_const {value}")),
        ));
        ctx.replace_node(id, literal)
    }

    /// Replaces the expression at `id` with a boolean literal denoting
    /// `value`.
    fn fold_to_bool(ctx: &mut AstContext, id: NodeId, value: bool) -> Result<()> {
        let literal = ctx.insert(Node::typed(
            NodeKind::Literal(Literal {
                kind:      LiteralKind::Bool,
                value:     value.to_string(),
                hex_value: String::new(),
            }),
            TypeNode::Bool,
        ));
        ctx.replace_node(id, literal)
    }
}

impl AstMapper for FoldConstants {
    fn visit_binary_operation(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        if let Some(outcome) = Self::try_compare(ctx, id)? {
            return Self::fold_to_bool(ctx, id, outcome);
        }

        if let Some(value) = Self::try_eval(ctx, id)? {
            if let Some(integer) = value.to_integer() {
                return Self::fold_to_integer(ctx, id, &integer);
            }
        }

        // Not foldable at this level; constant subtrees may still fold.
        self.common_visit(ctx, id)
    }

    fn visit_unary_operation(&mut self, ctx: &mut AstContext, id: NodeId) -> Result<()> {
        if let Some(value) = Self::try_eval(ctx, id)? {
            if let Some(integer) = value.to_integer() {
                return Self::fold_to_integer(ctx, id, &integer);
            }
        }

        self.common_visit(ctx, id)
    }
}

impl PassOps for FoldConstants {
    fn run(
        &mut self,
        mut unit: CompilationUnit,
        _pass_data: &PassDataMap,
    ) -> Result<PassReturnData> {
        let root = unit.root;
        self.visit_node(&mut unit.ast, root)?;
        Ok(PassReturnData::new(unit, NoPassData::<Self>::new_dyn()))
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

impl ConcretePass for FoldConstants {
    type Data = NoPassData<Self>;
}

#[cfg(test)]
mod test {
    use stc_ast::{
        node::{
            BinaryOperation,
            Block,
            ExpressionStatement,
            Identifier,
            Literal,
            LiteralKind,
            Node,
            NodeKind,
            UnaryOperation,
        },
        AstContext,
    };
    use stc_ast::visit::AstMapper;
    use stc_errors::transpile::Error;

    use crate::compile::pass::transform::fold_constants::FoldConstants;

    fn number(ctx: &mut AstContext, value: &str) -> usize {
        ctx.insert(Node::new(NodeKind::Literal(Literal {
            kind:      LiteralKind::Number,
            value:     value.to_string(),
            hex_value: String::new(),
        })))
    }

    fn binary(ctx: &mut AstContext, op: &str, lhs: usize, rhs: usize) -> usize {
        ctx.insert(Node::new(NodeKind::BinaryOperation(BinaryOperation {
            operator: op.to_string(),
            lhs,
            rhs,
        })))
    }

    /// Wraps `expr` in a statement in a block so that replacement has a
    /// parent to splice under, returning the statement id.
    fn in_statement(ctx: &mut AstContext, expr: usize) -> usize {
        let stmt = ctx.insert(Node::new(NodeKind::ExpressionStatement(
            ExpressionStatement { expression: expr },
        )));
        ctx.insert(Node::new(NodeKind::Block(Block {
            statements: vec![stmt],
        })));
        stmt
    }

    fn folded_value(ctx: &AstContext, stmt: usize) -> String {
        let expr = ctx.children_of(stmt)[0];
        let NodeKind::Literal(literal) = &ctx.node(expr).kind else {
            panic!("expression did not fold to a literal");
        };
        literal.value.clone()
    }

    #[test]
    fn folds_rational_intermediates_to_integers() {
        let mut ctx = AstContext::new();
        // 1.5e2 * 2 == 300, via an exact rational intermediate.
        let lhs = number(&mut ctx, "1.5e2");
        let rhs = number(&mut ctx, "2");
        let product = binary(&mut ctx, "*", lhs, rhs);
        let stmt = in_statement(&mut ctx, product);

        let mut pass = FoldConstants::new();
        pass.visit_binary_operation(&mut ctx, product).unwrap();
        assert_eq!(folded_value(&ctx, stmt), "300");
    }

    #[test]
    fn folds_nested_constants_under_non_constant_parents() {
        let mut ctx = AstContext::new();
        // x + (0.5 * 4): the sum cannot fold, the product can.
        let x = ctx.insert(Node::new(NodeKind::Identifier(Identifier {
            name: "x".to_string(),
            referenced_declaration: None,
        })));
        let half = number(&mut ctx, "0.5");
        let four = number(&mut ctx, "4");
        let product = binary(&mut ctx, "*", half, four);
        let sum = binary(&mut ctx, "+", x, product);
        in_statement(&mut ctx, sum);

        let mut pass = FoldConstants::new();
        pass.visit_binary_operation(&mut ctx, sum).unwrap();

        let children = ctx.children_of(sum);
        assert_eq!(children[0], x);
        let NodeKind::Literal(literal) = &ctx.node(children[1]).kind else {
            panic!("product did not fold");
        };
        assert_eq!(literal.value, "2");
    }

    #[test]
    fn non_integer_results_are_left_intact() {
        let mut ctx = AstContext::new();
        let lhs = number(&mut ctx, "1");
        let rhs = number(&mut ctx, "3");
        let quotient = binary(&mut ctx, "/", lhs, rhs);
        in_statement(&mut ctx, quotient);

        let mut pass = FoldConstants::new();
        pass.visit_binary_operation(&mut ctx, quotient).unwrap();
        assert!(matches!(
            ctx.node(quotient).kind,
            NodeKind::BinaryOperation(_)
        ));
    }

    #[test]
    fn folds_comparisons_to_booleans() {
        let mut ctx = AstContext::new();
        // 1/2 == 0.5 is true at compile time.
        let one = number(&mut ctx, "1");
        let two = number(&mut ctx, "2");
        let half = binary(&mut ctx, "/", one, two);
        let half_decimal = number(&mut ctx, "0.5");
        let cmp = binary(&mut ctx, "==", half, half_decimal);
        let stmt = in_statement(&mut ctx, cmp);

        let mut pass = FoldConstants::new();
        pass.visit_binary_operation(&mut ctx, cmp).unwrap();
        assert_eq!(folded_value(&ctx, stmt), "true");
    }

    #[test]
    fn folds_negation() {
        let mut ctx = AstContext::new();
        let five = number(&mut ctx, "5");
        let negated = ctx.insert(Node::new(NodeKind::UnaryOperation(UnaryOperation {
            operator: "-".to_string(),
            operand:  five,
        })));
        let stmt = in_statement(&mut ctx, negated);

        let mut pass = FoldConstants::new();
        pass.visit_unary_operation(&mut ctx, negated).unwrap();
        assert_eq!(folded_value(&ctx, stmt), "-5");
    }

    #[test]
    fn constant_division_by_zero_is_a_compile_time_error() {
        let mut ctx = AstContext::new();
        let one = number(&mut ctx, "1");
        let zero = number(&mut ctx, "0");
        let quotient = binary(&mut ctx, "/", one, zero);
        in_statement(&mut ctx, quotient);

        let mut pass = FoldConstants::new();
        let result = pass.visit_binary_operation(&mut ctx, quotient);
        assert_eq!(result.unwrap_err(), Error::DivisionByZero);
    }
}
