//! Recursive-descent parser producing a line-annotated AST.

use thiserror::Error;

use super::lexer::{LexError, Lexer, Token, TokenKind};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected {found} on line {line}, expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        line: i64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Nil,
    True,
    False,
    Number(f64),
    Str(String),
    /// The main chunk's `...`.
    Varargs,
    Name(String),
    Call {
        name: String,
        args: Vec<Expr>,
        line: i64,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        line: i64,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: i64,
    },
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local {
        name: String,
        value: Expr,
        line: i64,
    },
    Assign {
        name: String,
        value: Expr,
        line: i64,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        line: i64,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
        line: i64,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        line: i64,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: i64,
    },
    Return {
        value: Option<Expr>,
        line: i64,
    },
}

impl Stmt {
    /// Source line the statement starts on.
    pub fn line(&self) -> i64 {
        match self {
            Stmt::Local { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::Call { line, .. }
            | Stmt::Function { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::Return { line, .. } => *line,
        }
    }
}

/// Parse a whole chunk.
pub fn parse(source: &str) -> Result<Vec<Stmt>, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let body = parser.block()?;
    parser.expect(&TokenKind::Eof, "end of chunk")?;
    Ok(body)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize() always appends Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if &self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::Unexpected {
            found: token.kind.describe(),
            expected: expected.to_string(),
            line: token.line,
        }
    }

    fn expect_name(&mut self, expected: &str) -> Result<(String, i64), ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Name(name) => {
                let line = self.advance().line;
                Ok((name, line))
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Statements until `end`, `else` or end of chunk; the terminator is not
    /// consumed.
    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::End | TokenKind::Else | TokenKind::Eof => return Ok(body),
                _ => body.push(self.statement()?),
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Local => {
                let line = self.advance().line;
                let (name, _) = self.expect_name("a name after 'local'")?;
                self.expect(&TokenKind::Assign, "'=' in local declaration")?;
                let value = self.expression()?;
                Ok(Stmt::Local { name, value, line })
            }
            TokenKind::Function => {
                let line = self.advance().line;
                let (name, _) = self.expect_name("a function name")?;
                self.expect(&TokenKind::LParen, "'(' after function name")?;
                let mut params = Vec::new();
                if !self.eat(&TokenKind::RParen) {
                    loop {
                        let (param, _) = self.expect_name("a parameter name")?;
                        params.push(param);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen, "')' after parameters")?;
                }
                let body = self.block()?;
                self.expect(&TokenKind::End, "'end' closing the function")?;
                Ok(Stmt::Function {
                    name,
                    params,
                    body,
                    line,
                })
            }
            TokenKind::If => {
                let line = self.advance().line;
                let cond = self.expression()?;
                self.expect(&TokenKind::Then, "'then' after the condition")?;
                let then_body = self.block()?;
                let else_body = if self.eat(&TokenKind::Else) {
                    self.block()?
                } else {
                    Vec::new()
                };
                self.expect(&TokenKind::End, "'end' closing the if")?;
                Ok(Stmt::If {
                    cond,
                    then_body,
                    else_body,
                    line,
                })
            }
            TokenKind::While => {
                let line = self.advance().line;
                let cond = self.expression()?;
                self.expect(&TokenKind::Do, "'do' after the condition")?;
                let body = self.block()?;
                self.expect(&TokenKind::End, "'end' closing the while")?;
                Ok(Stmt::While { cond, body, line })
            }
            TokenKind::Return => {
                let line = self.advance().line;
                let value = match self.peek().kind {
                    TokenKind::End | TokenKind::Else | TokenKind::Eof => None,
                    _ => Some(self.expression()?),
                };
                Ok(Stmt::Return { value, line })
            }
            TokenKind::Name(name) => {
                let line = self.advance().line;
                if self.eat(&TokenKind::Assign) {
                    let value = self.expression()?;
                    Ok(Stmt::Assign { name, value, line })
                } else if self.peek().kind == TokenKind::LParen {
                    let args = self.call_arguments()?;
                    Ok(Stmt::Call { name, args, line })
                } else {
                    Err(self.unexpected("'=' or '(' after the name"))
                }
            }
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn call_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' closing the arguments")?;
        Ok(args)
    }

    // Precedence, loosest first: or, and, comparison, .., + -, * / %, unary.

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.peek().kind == TokenKind::Or {
            let line = self.advance().line;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.cmp_expr()?;
        while self.peek().kind == TokenKind::And {
            let line = self.advance().line;
            let rhs = self.cmp_expr()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.concat_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => return Ok(lhs),
            };
            let line = self.advance().line;
            let rhs = self.concat_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
    }

    fn concat_expr(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.add_expr()?;
        if self.peek().kind == TokenKind::Concat {
            let line = self.advance().line;
            // Right-associative.
            let rhs = self.concat_expr()?;
            return Ok(Expr::Binary {
                op: BinOp::Concat,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            });
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let line = self.advance().line;
            let rhs = self.mul_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            let line = self.advance().line;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Not => UnOp::Not,
            _ => return self.primary(),
        };
        let line = self.advance().line;
        let operand = self.unary_expr()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            line,
        })
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil)
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::True)
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::False)
            }
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number(value))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str(value))
            }
            TokenKind::Ellipsis => {
                self.advance();
                Ok(Expr::Varargs)
            }
            TokenKind::Name(name) => {
                let line = self.advance().line;
                if self.peek().kind == TokenKind::LParen {
                    let args = self.call_arguments()?;
                    Ok(Expr::Call { name, args, line })
                } else {
                    Ok(Expr::Name(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')' closing the group")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }
}
