//! Expression parser — token stream to AST by precedence climbing.
//!
//! The ladder runs low to high: pipe, comma, assignment, `or`, `and`,
//! equality, comparison, alternative, additive, multiplicative, unary,
//! postfix, primary. Every level is left-associative. Postfix access
//! desugars into pipes (`e.f` is `e | .f`, `e[i]` is `e | .[i]`), so the
//! evaluator only ever sees the primitive navigation nodes.

use crate::ast::{AssignOp, BinaryOp, Expr, ObjectKey, Query, UnaryOp};
use crate::error::{Error, Result};
use crate::lexer::{Lexer, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    /// Lex and parse a complete query expression.
    pub fn parse_query(query: &str) -> Result<Query> {
        let tokens = Lexer::new(query).tokenize()?;
        Parser::new(tokens).parse()
    }

    /// Parse a full expression and require `Eof` to follow.
    pub fn parse(mut self) -> Result<Query> {
        let root = self.parse_pipe()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected("end of input"));
        }
        Ok(Query { root })
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<()> {
        if self.matches(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            message: format!(
                "{} at position {}",
                message.into(),
                self.current().position
            ),
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        self.error(format!(
            "Expected {}, found {:?}",
            expected,
            self.current().kind
        ))
    }

    // ------------------------------------------------------------------
    // Precedence ladder
    // ------------------------------------------------------------------

    fn parse_pipe(&mut self) -> Result<Expr> {
        let mut left = self.parse_comma()?;
        while self.matches(&TokenKind::Pipe) {
            let right = self.parse_comma()?;
            left = Expr::Pipe(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comma(&mut self) -> Result<Expr> {
        let mut left = self.parse_assignment()?;
        while self.matches(&TokenKind::Comma) {
            let right = self.parse_assignment()?;
            left = Expr::Comma(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// An array element or object-literal value: pipes bind, commas
    /// separate the enclosing construct's elements.
    fn parse_element(&mut self) -> Result<Expr> {
        let mut left = self.parse_assignment()?;
        while self.matches(&TokenKind::Pipe) {
            let right = self.parse_assignment()?;
            left = Expr::Pipe(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let left = self.parse_or()?;
        let op = match self.current().kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::UpdateAssign => AssignOp::Update,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::SlashAssign => AssignOp::Div,
            TokenKind::AltAssign => AssignOp::Alt,
            _ => return Ok(left),
        };
        self.advance();
        let value = self.parse_or()?;
        Ok(Expr::Assignment {
            op,
            target: Box::new(left),
            value: Box::new(value),
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.matches(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.matches(&TokenKind::And) {
            let right = self.parse_equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_alternative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_alternative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_alternative(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        while self.matches(&TokenKind::Alt) {
            let right = self.parse_additive()?;
            left = binary(BinaryOp::Alt, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.matches(&TokenKind::Not) {
            // Bare `not` (as in `.a | not`) applies to the current input.
            let operand = if self.starts_expression() {
                self.parse_unary()?
            } else {
                Expr::Identity
            };
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.matches(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    /// Whether the current token can begin a primary expression.
    fn starts_expression(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Dot
                | TokenKind::DotDot
                | TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Ident(_)
                | TokenKind::Format(_)
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::If
                | TokenKind::Try
                | TokenKind::Minus
                | TokenKind::Not
        )
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    // `e.f` desugars to `e | .f`; bare `e.` is an error.
                    self.advance();
                    let name = self.expect_field_name()?;
                    let optional = self.matches(&TokenKind::Question);
                    expr = Expr::Pipe(Box::new(expr), Box::new(Expr::Field { name, optional }));
                }
                TokenKind::LBracket => {
                    let access = self.parse_bracket_access()?;
                    expr = Expr::Pipe(Box::new(expr), Box::new(access));
                }
                TokenKind::Question => {
                    // `?` after a field was consumed with the field itself;
                    // here it suppresses errors from any other postfix form.
                    self.advance();
                    expr = Expr::Try {
                        body: Box::new(expr),
                        catch: None,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn expect_field_name(&mut self) -> Result<String> {
        match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("field name after '.'")),
        }
    }

    /// `[` already current: `[]` iterator, `[n]` index, `[a:b]` / `[a:]` slice.
    /// Bounds must be integer literals.
    fn parse_bracket_access(&mut self) -> Result<Expr> {
        self.expect(&TokenKind::LBracket, "'['")?;

        if self.matches(&TokenKind::RBracket) {
            return Ok(Expr::Iterator);
        }

        let first = self.expect_integer()?;

        if self.matches(&TokenKind::Colon) {
            let end = if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(self.expect_integer()?)
            };
            self.expect(&TokenKind::RBracket, "']' after slice")?;
            return Ok(Expr::Slice { start: first, end });
        }

        self.expect(&TokenKind::RBracket, "']' after index")?;
        Ok(Expr::Index(first))
    }

    fn expect_integer(&mut self) -> Result<i64> {
        match self.current().kind {
            TokenKind::Number(n) if n.fract() == 0.0 => {
                self.advance();
                Ok(n as i64)
            }
            _ => Err(self.unexpected("integer literal")),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.current().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::String(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Dot => {
                self.advance();
                if let TokenKind::Ident(name) = &self.current().kind {
                    let name = name.clone();
                    self.advance();
                    let optional = self.matches(&TokenKind::Question);
                    return Ok(Expr::Field { name, optional });
                }
                if self.check(&TokenKind::LBracket) {
                    return self.parse_bracket_access();
                }
                Ok(Expr::Identity)
            }
            TokenKind::DotDot => {
                self.advance();
                Ok(Expr::RecursiveDescent)
            }
            TokenKind::Ident(name) => {
                self.advance();
                self.parse_function_call(name)
            }
            TokenKind::Format(name) => {
                self.advance();
                Ok(Expr::Format(name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_pipe()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_array_literal()
            }
            TokenKind::LBrace => {
                self.advance();
                self.parse_object_literal()
            }
            TokenKind::If => {
                self.advance();
                self.parse_if()
            }
            TokenKind::Try => {
                self.advance();
                self.parse_try()
            }
            TokenKind::Reduce => Err(self.error("'reduce' expressions are not supported")),
            TokenKind::Foreach => Err(self.error("'foreach' expressions are not supported")),
            TokenKind::Def => Err(self.error("'def' function definitions are not supported")),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `name(arg1; arg2; …)` — separator is `;`. A bare name is a
    /// zero-argument call.
    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        let mut args = Vec::new();
        if self.matches(&TokenKind::LParen) {
            loop {
                args.push(self.parse_pipe()?);
                if !self.matches(&TokenKind::Semicolon) {
                    break;
                }
            }
            self.expect(&TokenKind::RParen, "')' after function arguments")?;
        }
        Ok(Expr::FunctionCall { name, args })
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let mut elements = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                elements.push(self.parse_element()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket, "']' after array literal")?;
        Ok(Expr::ArrayLiteral(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        let mut fields = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = match self.current().kind.clone() {
                    TokenKind::Ident(name) => {
                        self.advance();
                        ObjectKey::Literal(name)
                    }
                    TokenKind::String(s) => {
                        self.advance();
                        ObjectKey::Literal(s)
                    }
                    TokenKind::LParen => {
                        // Computed key form: parsed, recorded as a marker,
                        // never evaluated.
                        self.advance();
                        let _ = self.parse_pipe()?;
                        self.expect(&TokenKind::RParen, "')' after computed key")?;
                        ObjectKey::Computed
                    }
                    _ => return Err(self.unexpected("object key")),
                };
                self.expect(&TokenKind::Colon, "':' after object key")?;
                let value = self.parse_element()?;
                fields.push((key, value));
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "'}' after object literal")?;
        Ok(Expr::ObjectLiteral(fields))
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let cond = self.parse_pipe()?;
        self.expect(&TokenKind::Then, "'then' after if condition")?;
        let then_branch = self.parse_pipe()?;

        let mut elif_branches = Vec::new();
        while self.matches(&TokenKind::Elif) {
            let elif_cond = self.parse_pipe()?;
            self.expect(&TokenKind::Then, "'then' after elif condition")?;
            let elif_body = self.parse_pipe()?;
            elif_branches.push((elif_cond, elif_body));
        }

        let else_branch = if self.matches(&TokenKind::Else) {
            Some(Box::new(self.parse_pipe()?))
        } else {
            None
        };

        self.expect(&TokenKind::End, "'end' to close if expression")?;
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            elif_branches,
            else_branch,
        })
    }

    fn parse_try(&mut self) -> Result<Expr> {
        let body = self.parse_postfix()?;
        let catch = if self.matches(&TokenKind::Catch) {
            Some(Box::new(self.parse_postfix()?))
        } else {
            None
        };
        Ok(Expr::Try {
            body: Box::new(body),
            catch,
        })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
