use crate::frontend::lexer::Span;

use super::{SourceFile, intern::InternedSymbol};

#[derive(Debug)]
pub struct Module<'source> {
    pub source_file: &'source SourceFile,
    pub imports: Vec<Import>,
    pub function_definitions: Vec<FunctionDefinition>,
}

/// `import math`
///
/// Imports carry no binding power of their own (every module named on
/// the command line is compiled and linked); they are checked against
/// the set of compiled modules so a stale import is caught early.
#[derive(Debug)]
pub struct Import {
    pub span: Span,
    pub name: Identifier,
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub span: Span,
    pub name: Identifier,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: TypeAnnotation,
    pub body: Block,
}

#[derive(Debug)]
pub struct FunctionParameter {
    pub span: Span,
    pub name: Identifier,
    pub ty: TypeAnnotation,
}

#[derive(Debug)]
pub struct TypeAnnotation {
    pub span: Span,
    pub kind: TypeAnnotationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAnnotationKind {
    Int,
    Bool,
    Nil,
}

#[derive(Debug, Clone, Copy)]
pub struct Identifier {
    pub span: Span,
    pub symbol: InternedSymbol,
}

#[derive(Debug)]
pub struct Block {
    pub span: Span,
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub struct Statement {
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug)]
pub enum StatementKind {
    // x: int = 1
    Declaration {
        name: Identifier,
        ty: TypeAnnotation,
        value: Box<Expression>,
    },
    // x = 1
    Assignment {
        name: Identifier,
        value: Box<Expression>,
    },
    // print(x)
    Print(Box<Expression>),
    // if/elif arms with an optional trailing else
    If {
        arms: Vec<IfArm>,
        alternative: Option<Block>,
    },
    While {
        condition: Box<Expression>,
        body: Block,
    },
    Return(Option<Box<Expression>>),
    // Bare call in statement position
    Expression(Box<Expression>),
}

#[derive(Debug)]
pub struct IfArm {
    pub span: Span,
    pub condition: Expression,
    pub block: Block,
}

#[derive(Debug)]
pub struct Expression {
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    Literal(Box<Literal>),
    Variable(Identifier),
    Grouping(Box<Expression>),
    FunctionCall {
        target: Identifier,
        arguments: Vec<Expression>,
    },
    Binary {
        lhs: Box<Expression>,
        operator: BinaryOperator,
        rhs: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
}

#[derive(Debug)]
pub struct BinaryOperator {
    pub span: Span,
    pub kind: BinaryOperatorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperatorKind {
    Add,                  // +
    Subtract,             // -
    Multiply,             // *
    Divide,               // /
    Equals,               // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=
    LogicalAnd,           // and
    LogicalOr,            // or
}

#[derive(Debug)]
pub struct UnaryOperator {
    pub span: Span,
    pub kind: UnaryOperatorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperatorKind {
    Negate, // -
}

#[derive(Debug)]
pub struct Literal {
    pub span: Span,
    pub kind: LiteralKind,
    pub symbol: InternedSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Boolean, // true
    Integer, // 1
}
