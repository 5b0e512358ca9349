//! Assembly text to statement list.
//!
//! One statement per instruction: a label definition (`name:` at the
//! start of a line) or a mnemonic with up to two operands, the count
//! fixed by the mnemonic. Immediate positions accept full constant
//! expressions with the usual `* /` over `+ -` precedence and unary
//! minus, evaluated at parse time by the encoder. Comments run from `;`
//! to end of line.

use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::EnumString;

use crate::diagnostics::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Register {
    Eax,
    Ecx,
    Edx,
    Ebx,
    Esp,
    Ebp,
    Esi,
    Edi,
}

impl Register {
    /// Encoding index used in ModRM reg/rm fields and `+rd` opcodes.
    pub fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
    Mov,
    Push,
    Pop,
    Add,
    Sub,
    Imul,
    Idiv,
    Div,
    Neg,
    Inc,
    Dec,
    Xor,
    Cmp,
    Test,
    Cdq,
    Call,
    Ret,
    Jmp,
    Je,
    Jnz,
    Jg,
    Int,
    Org,
}

impl Mnemonic {
    fn operand_count(self) -> usize {
        match self {
            Self::Mov | Self::Add | Self::Sub | Self::Imul | Self::Xor | Self::Cmp | Self::Test => {
                2
            }
            Self::Push
            | Self::Pop
            | Self::Idiv
            | Self::Div
            | Self::Neg
            | Self::Inc
            | Self::Dec
            | Self::Call
            | Self::Jmp
            | Self::Je
            | Self::Jnz
            | Self::Jg
            | Self::Int
            | Self::Org => 1,
            Self::Cdq | Self::Ret => 0,
        }
    }
}

/// A constant expression in an immediate position, evaluated before
/// encoding. Wrapping arithmetic matches the 32-bit target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Immediate(i32),
    Negate(Box<Expr>),
    Binary {
        op: ExprOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Expr {
    pub fn eval(&self) -> i32 {
        match self {
            Self::Immediate(value) => *value,
            Self::Negate(inner) => inner.eval().wrapping_neg(),
            Self::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (lhs.eval(), rhs.eval());
                match op {
                    ExprOp::Add => lhs.wrapping_add(rhs),
                    ExprOp::Subtract => lhs.wrapping_sub(rhs),
                    ExprOp::Multiply => lhs.wrapping_mul(rhs),
                    ExprOp::Divide => lhs.checked_div(rhs).unwrap_or(0),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Expr(Expr),
    Label(String),
    /// `[base]` or `[base + disp]` / `[base - disp]`.
    Memory {
        base: Register,
        displacement: Option<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    LabelDef(String),
    Instruction {
        mnemonic: Mnemonic,
        left: Option<Operand>,
        right: Option<Operand>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Number(i32),
    Comma,
    Colon,
    OpenBracket,
    CloseBracket,
    Plus,
    Minus,
    Star,
    Slash,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

static PUNCTUATION: Lazy<Vec<(char, TokenKind)>> = Lazy::new(|| {
    vec![
        (',', TokenKind::Comma),
        (':', TokenKind::Colon),
        ('[', TokenKind::OpenBracket),
        (']', TokenKind::CloseBracket),
        ('+', TokenKind::Plus),
        ('-', TokenKind::Minus),
        ('*', TokenKind::Star),
        ('/', TokenKind::Slash),
    ]
});

fn scan(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut tokens = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = line.split(';').next().unwrap_or("");
        let mut chars = line.char_indices().peekable();

        while let Some(&(start, c)) = chars.peek() {
            if c.is_ascii_whitespace() {
                chars.next();
                continue;
            }

            if c.is_ascii_alphabetic() || c == '_' || c == '.' {
                let mut end = start;
                while let Some(&(position, c)) = chars.peek() {
                    if !(c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                        break;
                    }
                    end = position + c.len_utf8();
                    chars.next();
                }

                tokens.push(Token {
                    kind: TokenKind::Word(line[start..end].to_string()),
                    line: line_number,
                });
                continue;
            }

            if c.is_ascii_digit() {
                let mut end = start;
                while let Some(&(position, c)) = chars.peek() {
                    if !(c.is_ascii_alphanumeric()) {
                        break;
                    }
                    end = position + c.len_utf8();
                    chars.next();
                }

                let text = &line[start..end];
                let parsed = if let Some(hex) = text.strip_prefix("0x") {
                    u32::from_str_radix(hex, 16).map(|value| value as i32)
                } else {
                    text.parse::<i32>()
                };

                match parsed {
                    Ok(value) => tokens.push(Token {
                        kind: TokenKind::Number(value),
                        line: line_number,
                    }),
                    Err(_) => diagnostics.report(
                        line_number,
                        format!("`{text}` is not a valid number"),
                    ),
                }
                continue;
            }

            match PUNCTUATION.iter().find(|(p, _)| *p == c) {
                Some((_, kind)) => {
                    tokens.push(Token {
                        kind: kind.clone(),
                        line: line_number,
                    });
                    chars.next();
                }
                None => {
                    diagnostics.report(
                        line_number,
                        format!("unexpected character `{c}`"),
                    );
                    chars.next();
                }
            }
        }
    }

    tokens
}

pub struct Parser<'diag> {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: &'diag mut Diagnostics,
}

impl<'diag> Parser<'diag> {
    /// Parses a whole assembly listing. Malformed statements are
    /// reported and skipped so one pass surfaces every parse problem.
    pub fn parse(source: &str, diagnostics: &mut Diagnostics) -> Vec<Statement> {
        let tokens = scan(source, diagnostics);

        let mut parser = Parser {
            tokens,
            current: 0,
            diagnostics,
        };

        let mut statements = Vec::new();
        while !parser.at_end() {
            let reported = parser.diagnostics.error_count();
            match parser.parse_statement() {
                Some(statement) => statements.push(statement),
                None => {
                    // A statement can also die by running out of tokens,
                    // which none of the inner parsers report themselves.
                    if parser.diagnostics.error_count() == reported {
                        let line = parser.current_line();
                        parser.diagnostics.report(line, "incomplete instruction");
                    }
                    parser.skip_to_next_line();
                }
            }
        }

        statements
    }

    fn at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).cloned();
        self.current += 1;
        token
    }

    fn current_line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|token| token.line)
            .unwrap_or(1)
    }

    fn skip_to_next_line(&mut self) {
        let line = self.current_line();
        while let Some(token) = self.peek() {
            if token.line != line {
                break;
            }
            self.current += 1;
        }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        let line = self.current_line();

        // `name:` defines a label
        if let (Some(TokenKind::Word(_)), Some(TokenKind::Colon)) = (
            self.peek().map(|t| &t.kind),
            self.peek_second().map(|t| &t.kind),
        ) {
            let Some(Token {
                kind: TokenKind::Word(name),
                ..
            }) = self.advance()
            else {
                unreachable!()
            };
            self.advance(); // colon

            return Some(Statement {
                line,
                kind: StatementKind::LabelDef(name),
            });
        }

        let token = self.advance()?;
        let TokenKind::Word(word) = &token.kind else {
            self.diagnostics.report(
                line,
                "expected a mnemonic or label definition",
            );
            return None;
        };

        let Ok(mnemonic) = Mnemonic::from_str(word) else {
            self.diagnostics.report(
                line,
                format!("unknown mnemonic `{word}`"),
            );
            return None;
        };

        let (mut left, mut right) = (None, None);

        if mnemonic.operand_count() >= 1 {
            left = Some(self.parse_operand()?);
        }

        if mnemonic.operand_count() == 2 {
            if !matches!(self.advance()?.kind, TokenKind::Comma) {
                self.diagnostics.report(
                    line,
                    format!("`{mnemonic}` expects two comma-separated operands"),
                );
                return None;
            }
            right = Some(self.parse_operand()?);
        }

        Some(Statement {
            line,
            kind: StatementKind::Instruction {
                mnemonic,
                left,
                right,
            },
        })
    }

    fn parse_operand(&mut self) -> Option<Operand> {
        let line = self.current_line();

        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Word(word)) => {
                if let Ok(register) = Register::from_str(word) {
                    self.advance();
                    return Some(Operand::Register(register));
                }

                let name = word.clone();
                self.advance();
                Some(Operand::Label(name))
            }
            Some(TokenKind::OpenBracket) => {
                self.advance();
                self.parse_memory(line)
            }
            _ => self.parse_expr().map(Operand::Expr),
        }
    }

    fn parse_memory(&mut self, line: usize) -> Option<Operand> {
        let base = match self.advance()?.kind {
            TokenKind::Word(word) => match Register::from_str(&word) {
                Ok(register) => register,
                Err(_) => {
                    self.diagnostics.report(
                        line,
                        "memory operands need a register base",
                    );
                    return None;
                }
            },
            _ => {
                self.diagnostics.report(
                    line,
                    "memory operands need a register base",
                );
                return None;
            }
        };

        let displacement = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::CloseBracket) => None,
            Some(TokenKind::Plus) => {
                self.advance();
                Some(self.parse_expr()?)
            }
            // `[ebp - 4]` keeps the sign inside the expression
            Some(TokenKind::Minus) => Some(self.parse_expr()?),
            _ => {
                self.diagnostics.report(
                    line,
                    "expected `]`, `+`, or `-` in memory operand",
                );
                return None;
            }
        };

        match self.advance()?.kind {
            TokenKind::CloseBracket => Some(Operand::Memory { base, displacement }),
            _ => {
                self.diagnostics
                    .report(line, "unterminated memory operand");
                None
            }
        }
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        let mut left = self.parse_factor()?;

        while let Some(op) = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Plus) => Some(ExprOp::Add),
            Some(TokenKind::Minus) => Some(ExprOp::Subtract),
            _ => None,
        } {
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }

        Some(left)
    }

    fn parse_factor(&mut self) -> Option<Expr> {
        let mut left = self.parse_unary()?;

        while let Some(op) = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Star) => Some(ExprOp::Multiply),
            Some(TokenKind::Slash) => Some(ExprOp::Divide),
            _ => None,
        } {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                lhs: Box::new(left),
                rhs: Box::new(right),
            };
        }

        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Minus)) {
            self.advance();
            return Some(Expr::Negate(Box::new(self.parse_unary()?)));
        }

        let line = self.current_line();
        match self.advance()?.kind {
            TokenKind::Number(value) => Some(Expr::Immediate(value)),
            _ => {
                self.diagnostics
                    .report(line, "expected a number");
                None
            }
        }
    }
}
