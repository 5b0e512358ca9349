use super::intern::InternedSymbol;
use crate::frontend::{
    SourceFile,
    ast::{
        BinaryOperator, BinaryOperatorKind, Block, Expression, ExpressionKind, FunctionDefinition,
        FunctionParameter, Identifier, IfArm, Import, Literal, LiteralKind, Module, Statement,
        StatementKind, TypeAnnotation, TypeAnnotationKind, UnaryOperator, UnaryOperatorKind,
    },
    lexer::{Keyword, Lexer, Span, Token, TokenKind},
};

#[derive(Debug)]
pub struct Parser<'source> {
    lexer: Lexer<'source>,
}

impl<'source> Parser<'source> {
    pub fn parse_module(source_file: &'source SourceFile) -> Module<'source> {
        let mut parser = Self {
            lexer: Lexer::new(source_file),
        };

        let mut module = Module {
            source_file,
            imports: Vec::new(),
            function_definitions: Vec::new(),
        };

        while !parser.lexer.is_eof() && parser.lexer.peek().is_some() {
            parser.parse_module_item(&mut module);
        }

        module
    }

    fn report_fatal_error(&self, offending_span: Span, message: &str) -> ! {
        eprintln!(
            "{} ({}:{}:{})",
            message,
            self.lexer.source().origin,
            self.lexer.source().row_for_position(offending_span.start),
            self.lexer
                .source()
                .column_for_position(offending_span.start)
        );
        self.lexer.source().highlight_span(offending_span);
        std::process::exit(1);
    }

    fn report_unexpected_eof(&self, expecting: &str) -> ! {
        eprintln!(
            "Expected {} but reached end of file ({}:{}:{})",
            expecting,
            self.lexer.source().origin,
            self.lexer.source().row_for_position(self.lexer.position()),
            self.lexer
                .source()
                .column_for_position(self.lexer.position())
        );
        std::process::exit(1);
    }

    fn expect_peek(&mut self, expecting: &str) -> Token {
        let Some(token) = self.lexer.peek() else {
            self.report_unexpected_eof(expecting)
        };

        token
    }

    fn expect_next(&mut self, expecting: &str) -> Token {
        let Some(token) = self.lexer.next() else {
            self.report_unexpected_eof(expecting)
        };

        token
    }

    fn expect_next_to_be(&mut self, kind: TokenKind) -> Token {
        let token = self.expect_next(&format!("{kind:?}"));

        if token.kind != kind {
            self.report_fatal_error(
                token.span,
                &format!(
                    "Expected {:?} but found {:?} ({})",
                    kind,
                    token.kind,
                    self.lexer.source().value_of_span(token.span)
                ),
            )
        }

        token
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Token {
        self.expect_next_to_be(TokenKind::Keyword(keyword))
    }

    fn parse_module_item(&mut self, module: &mut Module<'source>) {
        let Some(peeked) = self.lexer.peek() else {
            self.report_unexpected_eof("import or function definition")
        };

        match peeked.kind {
            TokenKind::Keyword(Keyword::Import) => {
                let import = self.parse_import();
                module.imports.push(import);
            }
            TokenKind::Identifier => {
                let function = self.parse_function_definition();
                module.function_definitions.push(function);
            }
            _ => self.report_fatal_error(
                peeked.span,
                &format!(
                    "Expected import or function definition in module but found: {} ({:?})",
                    self.lexer.source().value_of_span(peeked.span),
                    peeked.kind
                ),
            ),
        }
    }

    /// import math
    fn parse_import(&mut self) -> Import {
        let import_keyword = self.expect_keyword(Keyword::Import);
        let name = self.parse_identifier();

        Import {
            span: Span::new(import_keyword.span.start, name.span.end),
            name,
        }
    }

    /// name: (param: ty) -> return_type {}
    fn parse_function_definition(&mut self) -> FunctionDefinition {
        let name = self.parse_identifier();
        self.expect_next_to_be(TokenKind::Colon);

        let parameters = self.parse_function_parameter_list();

        self.expect_next_to_be(TokenKind::Arrow);
        let return_type = self.parse_type_annotation();

        let body = self.parse_block();

        FunctionDefinition {
            span: Span::new(name.span.start, body.span.end),
            name,
            parameters,
            return_type,
            body,
        }
    }

    // main
    fn parse_identifier(&mut self) -> Identifier {
        let token = self.expect_next_to_be(TokenKind::Identifier);

        Identifier {
            span: token.span,
            symbol: InternedSymbol::new(self.lexer.source().value_of_span(token.span)),
        }
    }

    // (a: int, b: bool)
    fn parse_function_parameter_list(&mut self) -> Vec<FunctionParameter> {
        let mut parameters = Vec::new();

        self.expect_next_to_be(TokenKind::OpenParen);

        // If the next token is not a closing paren, try parsing function
        // parameters
        if self.expect_peek("function parameter or closing paren").kind != TokenKind::CloseParen {
            // If a close paren was not found then there MUST be at least one
            // parameter
            parameters.push(self.parse_function_parameter());

            // While the next token is a comma try and parse more parameters
            while self
                .lexer
                .peek()
                .is_some_and(|t| t.kind == TokenKind::Comma)
            {
                self.expect_next_to_be(TokenKind::Comma);
                parameters.push(self.parse_function_parameter());
            }
        }

        self.expect_next_to_be(TokenKind::CloseParen);

        parameters
    }

    // a: int
    fn parse_function_parameter(&mut self) -> FunctionParameter {
        let name = self.parse_identifier();
        self.expect_next_to_be(TokenKind::Colon);
        let ty = self.parse_type_annotation();

        FunctionParameter {
            span: Span::new(name.span.start, ty.span.end),
            name,
            ty,
        }
    }

    // int | bool | nil
    fn parse_type_annotation(&mut self) -> TypeAnnotation {
        let token = self.expect_next("type");

        let kind = match token.kind {
            TokenKind::Keyword(Keyword::Int) => TypeAnnotationKind::Int,
            TokenKind::Keyword(Keyword::Bool) => TypeAnnotationKind::Bool,
            TokenKind::Keyword(Keyword::Nil) => TypeAnnotationKind::Nil,
            _ => self.report_fatal_error(
                token.span,
                &format!(
                    "Expected type but found {:?} ({})",
                    token.kind,
                    self.lexer.source().value_of_span(token.span)
                ),
            ),
        };

        TypeAnnotation {
            span: token.span,
            kind,
        }
    }

    // "{" ( statement )* "}"
    fn parse_block(&mut self) -> Block {
        let mut statements = Vec::new();

        let open_brace = self.expect_next_to_be(TokenKind::OpenBrace);

        while self.expect_peek("statement or closing brace").kind != TokenKind::CloseBrace {
            statements.push(self.parse_statement());
        }

        let close_brace = self.expect_next_to_be(TokenKind::CloseBrace);

        Block {
            span: Span::new(open_brace.span.start, close_brace.span.end),
            statements,
        }
    }

    fn parse_statement(&mut self) -> Statement {
        let peeked = self.expect_peek("statement");

        match peeked.kind {
            TokenKind::Keyword(Keyword::Print) => self.parse_print_statement(),
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Identifier => {
                // An identifier opens a declaration (`x: int = e`), an
                // assignment (`x = e`), or a bare call (`f(e)`); one token
                // of lookahead past the name disambiguates
                match self.lexer.peek_nth(1).map(|t| t.kind) {
                    Some(TokenKind::Colon) => self.parse_declaration_statement(),
                    Some(TokenKind::Equals) => self.parse_assignment_statement(),
                    _ => {
                        let expression = self.parse_expression();

                        Statement {
                            span: expression.span,
                            kind: StatementKind::Expression(Box::new(expression)),
                        }
                    }
                }
            }
            _ => self.report_fatal_error(
                peeked.span,
                &format!(
                    "Expected statement but found {:?} ({})",
                    peeked.kind,
                    self.lexer.source().value_of_span(peeked.span)
                ),
            ),
        }
    }

    /// print(expression)
    fn parse_print_statement(&mut self) -> Statement {
        let print_keyword = self.expect_keyword(Keyword::Print);

        self.expect_next_to_be(TokenKind::OpenParen);
        let expression = self.parse_expression();
        let close_paren = self.expect_next_to_be(TokenKind::CloseParen);

        Statement {
            span: Span::new(print_keyword.span.start, close_paren.span.end),
            kind: StatementKind::Print(Box::new(expression)),
        }
    }

    /// "if" expression BLOCK ( "elif" expression BLOCK )* ( "else" BLOCK )?
    fn parse_if_statement(&mut self) -> Statement {
        let if_keyword = self.expect_keyword(Keyword::If);

        let mut arms = Vec::new();
        arms.push(self.parse_if_arm(if_keyword.span));

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword(Keyword::Elif))
        {
            let elif_keyword = self.expect_keyword(Keyword::Elif);
            arms.push(self.parse_if_arm(elif_keyword.span));
        }

        let alternative = self
            .lexer
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword(Keyword::Else))
            .then(|| {
                self.expect_keyword(Keyword::Else);
                self.parse_block()
            });

        let end = alternative
            .as_ref()
            .map(|block| block.span.end)
            .unwrap_or_else(|| arms.last().unwrap().span.end);

        Statement {
            span: Span::new(if_keyword.span.start, end),
            kind: StatementKind::If { arms, alternative },
        }
    }

    fn parse_if_arm(&mut self, keyword_span: Span) -> IfArm {
        let condition = self.parse_expression();
        let block = self.parse_block();

        IfArm {
            span: Span::new(keyword_span.start, block.span.end),
            condition,
            block,
        }
    }

    /// "while" expression BLOCK
    fn parse_while_statement(&mut self) -> Statement {
        let while_keyword = self.expect_keyword(Keyword::While);
        let condition = self.parse_expression();
        let body = self.parse_block();

        Statement {
            span: Span::new(while_keyword.span.start, body.span.end),
            kind: StatementKind::While {
                condition: Box::new(condition),
                body,
            },
        }
    }

    /// "return" ( expression )?
    ///
    /// There are no statement terminators, so a bare return is only
    /// recognized when the closing brace of its block follows directly.
    fn parse_return_statement(&mut self) -> Statement {
        let return_keyword = self.expect_keyword(Keyword::Return);

        let peeked = self.expect_peek("expression or closing brace");

        let expression =
            (peeked.kind != TokenKind::CloseBrace).then(|| self.parse_expression());

        Statement {
            span: Span::new(
                return_keyword.span.start,
                expression
                    .as_ref()
                    .map(|e| e.span.end)
                    .unwrap_or(return_keyword.span.end),
            ),
            kind: StatementKind::Return(expression.map(Box::new)),
        }
    }

    /// name: ty = expression
    fn parse_declaration_statement(&mut self) -> Statement {
        let name = self.parse_identifier();
        self.expect_next_to_be(TokenKind::Colon);
        let ty = self.parse_type_annotation();
        self.expect_next_to_be(TokenKind::Equals);
        let value = self.parse_expression();

        Statement {
            span: Span::new(name.span.start, value.span.end),
            kind: StatementKind::Declaration {
                name,
                ty,
                value: Box::new(value),
            },
        }
    }

    /// name = expression
    fn parse_assignment_statement(&mut self) -> Statement {
        let name = self.parse_identifier();
        self.expect_next_to_be(TokenKind::Equals);
        let value = self.parse_expression();

        Statement {
            span: Span::new(name.span.start, value.span.end),
            kind: StatementKind::Assignment {
                name,
                value: Box::new(value),
            },
        }
    }

    /// expression     -> logical_or
    /// logical_or     -> logical_and ( "or" logical_and )*
    /// logical_and    -> comparison ( "and" comparison )*
    /// comparison     -> term ( ( "!=" | "==" | "<" | "<=" | ">" | ">=" ) term )*
    /// term           -> factor ( ( "-" | "+" ) factor )*
    /// factor         -> unary ( ( "/" | "*" ) unary )*
    /// unary          -> "-" unary
    ///                   | call
    /// call           -> IDENTIFIER "(" ( expression ( "," expression )* )? ")"
    ///                   | atom
    /// atom           -> IDENTIFIER | INTEGER | BOOL
    ///                   | "(" expression ")"
    fn parse_expression(&mut self) -> Expression {
        self.parse_logical_or_expression()
    }

    fn parse_logical_or_expression(&mut self) -> Expression {
        let mut expression = self.parse_logical_and_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword(Keyword::Or))
        {
            let operator = self.expect_keyword(Keyword::Or);
            let rhs = self.parse_logical_and_expression();

            expression = Expression {
                span: Span::new(expression.span.start, rhs.span.end),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator: BinaryOperator {
                        span: operator.span,
                        kind: BinaryOperatorKind::LogicalOr,
                    },
                    rhs: Box::new(rhs),
                },
            }
        }

        expression
    }

    fn parse_logical_and_expression(&mut self) -> Expression {
        let mut expression = self.parse_comparison_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Keyword(Keyword::And))
        {
            let operator = self.expect_keyword(Keyword::And);
            let rhs = self.parse_comparison_expression();

            expression = Expression {
                span: Span::new(expression.span.start, rhs.span.end),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator: BinaryOperator {
                        span: operator.span,
                        kind: BinaryOperatorKind::LogicalAnd,
                    },
                    rhs: Box::new(rhs),
                },
            }
        }

        expression
    }

    fn parse_comparison_expression(&mut self) -> Expression {
        let mut expression = self.parse_term_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_comparison_operator())
        {
            let operator = self.parse_comparison_operator();
            let rhs = self.parse_term_expression();

            expression = Expression {
                span: Span::new(expression.span.start, rhs.span.end),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator,
                    rhs: Box::new(rhs),
                },
            }
        }

        expression
    }

    fn parse_comparison_operator(&mut self) -> BinaryOperator {
        let operator = self.expect_next("comparison operator");

        BinaryOperator {
            span: operator.span,
            kind: match operator.kind {
                TokenKind::NotEquals => BinaryOperatorKind::NotEquals,
                TokenKind::DoubleEquals => BinaryOperatorKind::Equals,
                TokenKind::LessThan => BinaryOperatorKind::LessThan,
                TokenKind::LessThanOrEqualTo => BinaryOperatorKind::LessThanOrEqualTo,
                TokenKind::GreaterThan => BinaryOperatorKind::GreaterThan,
                TokenKind::GreaterThanOrEqualTo => BinaryOperatorKind::GreaterThanOrEqualTo,
                _ => unreachable!(),
            },
        }
    }

    fn parse_term_expression(&mut self) -> Expression {
        let mut expression = self.parse_factor_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_term_operator())
        {
            let operator = self.parse_term_operator();
            let rhs = self.parse_factor_expression();

            expression = Expression {
                span: Span::new(expression.span.start, rhs.span.end),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator,
                    rhs: Box::new(rhs),
                },
            }
        }

        expression
    }

    fn parse_term_operator(&mut self) -> BinaryOperator {
        let operator = self.expect_next("term operator");

        BinaryOperator {
            span: operator.span,
            kind: match operator.kind {
                TokenKind::Plus => BinaryOperatorKind::Add,
                TokenKind::Minus => BinaryOperatorKind::Subtract,
                _ => unreachable!(),
            },
        }
    }

    fn parse_factor_expression(&mut self) -> Expression {
        let mut expression = self.parse_unary_expression();

        while self
            .lexer
            .peek()
            .is_some_and(|t| t.kind.is_factor_operator())
        {
            let operator = self.parse_factor_operator();
            let rhs = self.parse_unary_expression();

            expression = Expression {
                span: Span::new(expression.span.start, rhs.span.end),
                kind: ExpressionKind::Binary {
                    lhs: Box::new(expression),
                    operator,
                    rhs: Box::new(rhs),
                },
            }
        }

        expression
    }

    fn parse_factor_operator(&mut self) -> BinaryOperator {
        let operator = self.expect_next("factor operator");

        BinaryOperator {
            span: operator.span,
            kind: match operator.kind {
                TokenKind::Asterisk => BinaryOperatorKind::Multiply,
                TokenKind::Divide => BinaryOperatorKind::Divide,
                _ => unreachable!(),
            },
        }
    }

    fn parse_unary_expression(&mut self) -> Expression {
        if self.expect_peek("expression").kind == TokenKind::Minus {
            let operator = self.expect_next_to_be(TokenKind::Minus);
            let operand = self.parse_unary_expression();

            return Expression {
                span: Span::new(operator.span.start, operand.span.end),
                kind: ExpressionKind::Unary {
                    operator: UnaryOperator {
                        span: operator.span,
                        kind: UnaryOperatorKind::Negate,
                    },
                    operand: Box::new(operand),
                },
            };
        }

        self.parse_call_expression()
    }

    fn parse_call_expression(&mut self) -> Expression {
        if self.expect_peek("expression").kind == TokenKind::Identifier
            && self
                .lexer
                .peek_nth(1)
                .is_some_and(|t| t.kind == TokenKind::OpenParen)
        {
            let target = self.parse_identifier();
            let (arguments, close_span) = self.parse_call_arguments();

            return Expression {
                span: Span::new(target.span.start, close_span.end),
                kind: ExpressionKind::FunctionCall { target, arguments },
            };
        }

        self.parse_atomic_expression()
    }

    fn parse_call_arguments(&mut self) -> (Vec<Expression>, Span) {
        let mut arguments = Vec::new();

        self.expect_next_to_be(TokenKind::OpenParen);

        // If the next token is not a closing paren, try parsing call
        // arguments
        if self.expect_peek("call argument or closing paren").kind != TokenKind::CloseParen {
            // If a close paren was not found then there MUST be at least one
            // argument
            arguments.push(self.parse_expression());

            // While the next token is a comma try and parse more arguments
            while self
                .lexer
                .peek()
                .is_some_and(|t| t.kind == TokenKind::Comma)
            {
                self.expect_next_to_be(TokenKind::Comma);
                arguments.push(self.parse_expression());
            }
        }

        let close_paren = self.expect_next_to_be(TokenKind::CloseParen);

        (arguments, close_paren.span)
    }

    fn parse_atomic_expression(&mut self) -> Expression {
        let peeked = self.expect_peek("identifier, open paren, or literal expression");

        if peeked.kind == TokenKind::Identifier {
            let identifier = self.parse_identifier();

            return Expression {
                span: identifier.span,
                kind: ExpressionKind::Variable(identifier),
            };
        }

        if peeked.kind == TokenKind::OpenParen {
            return self.parse_grouping_expression();
        }

        // Assume it's a literal (no other valid options)
        let literal = self.parse_literal();

        Expression {
            span: literal.span,
            kind: ExpressionKind::Literal(Box::new(literal)),
        }
    }

    fn parse_grouping_expression(&mut self) -> Expression {
        let open_paren = self.expect_next_to_be(TokenKind::OpenParen);
        let expression = self.parse_expression();
        let close_paren = self.expect_next_to_be(TokenKind::CloseParen);

        Expression {
            span: Span::new(open_paren.span.start, close_paren.span.end),
            kind: ExpressionKind::Grouping(Box::new(expression)),
        }
    }

    fn parse_literal(&mut self) -> Literal {
        let token = self.expect_next("literal expression");

        let kind = match token.kind {
            TokenKind::IntegerLiteral => LiteralKind::Integer,
            TokenKind::BooleanLiteral => LiteralKind::Boolean,
            _ => self.report_fatal_error(
                token.span,
                &format!(
                    "Expected literal expression but found {:?} ({})",
                    token.kind,
                    self.lexer.source().value_of_span(token.span)
                ),
            ),
        };

        Literal {
            span: token.span,
            kind,
            symbol: InternedSymbol::new(self.lexer.source().value_of_span(token.span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::SourceFileOrigin;

    fn parse(contents: &str) -> Module<'static> {
        let source = Box::leak(Box::new(SourceFile {
            contents: contents.to_string(),
            origin: SourceFileOrigin::Memory,
        }));

        Parser::parse_module(source)
    }

    #[test]
    fn parses_a_function_definition() {
        let module = parse("add: (a: int, b: int) -> int { return a + b }");

        assert_eq!(module.function_definitions.len(), 1);

        let function = &module.function_definitions[0];
        assert_eq!(function.name.symbol.value(), "add");
        assert_eq!(function.parameters.len(), 2);
        assert_eq!(function.return_type.kind, TypeAnnotationKind::Int);
        assert_eq!(function.body.statements.len(), 1);
    }

    #[test]
    fn factors_bind_tighter_than_terms() {
        let module = parse("main: () -> int { return 1 + 2 * 3 }");

        let StatementKind::Return(Some(expression)) =
            &module.function_definitions[0].body.statements[0].kind
        else {
            panic!("expected return statement");
        };

        let ExpressionKind::Binary { operator, rhs, .. } = &expression.kind else {
            panic!("expected binary expression");
        };

        assert_eq!(operator.kind, BinaryOperatorKind::Add);
        assert!(matches!(rhs.kind, ExpressionKind::Binary { ref operator, .. }
            if operator.kind == BinaryOperatorKind::Multiply));
    }

    #[test]
    fn elif_chains_collect_into_arms() {
        let module = parse(
            "main: () -> nil {
                if a == 1 {
                } elif a == 2 {
                } elif a == 3 {
                } else {
                }
            }",
        );

        let StatementKind::If { arms, alternative } =
            &module.function_definitions[0].body.statements[0].kind
        else {
            panic!("expected if statement");
        };

        assert_eq!(arms.len(), 3);
        assert!(alternative.is_some());
    }

    #[test]
    fn imports_are_collected() {
        let module = parse("import math\nmain: () -> int { return add(1, 2) }");

        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].name.symbol.value(), "math");
    }

    #[test]
    fn declaration_assignment_and_call_statements_disambiguate() {
        let module = parse(
            "main: () -> nil {
                x: int = 1
                x = 2
                report(x)
            }",
        );

        let statements = &module.function_definitions[0].body.statements;
        assert!(matches!(
            statements[0].kind,
            StatementKind::Declaration { .. }
        ));
        assert!(matches!(
            statements[1].kind,
            StatementKind::Assignment { .. }
        ));
        assert!(matches!(statements[2].kind, StatementKind::Expression(_)));
    }
}
