//! Recursive-descent parser for Asteria.
//!
//! Statements follow the C-like surface grammar; expressions use precedence
//! climbing. The parser performs no name resolution — undeclared
//! identifiers are the bind pass's business — and produces the plain trees
//! in [`crate::ast`].

use crate::ast::{Block, BreakTarget, Expr, Stmt, StmtKind, SwitchClause};
use crate::ast::{BinaryOp, UnaryOp};
use crate::token::{tokenize, Token, TokenKind, KEYWORDS};
use asteria_core::{Error, Result, Span};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Tokenize a source buffer. `start_line` numbers the first line.
    pub fn new(source: &[u8], start_line: u32) -> Result<Self> {
        Ok(Parser {
            tokens: tokenize(source, start_line)?,
            pos: 0,
        })
    }

    /// Parse the whole buffer as a statement sequence.
    pub fn parse(mut self) -> Result<Block> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        Ok(Block::new(stmts))
    }

    // ----- token plumbing -------------------------------------------------

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn span_here(&self) -> Span {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(t) => t.span,
            None => Span::new(1, 1),
        }
    }

    fn bump(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn check_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Punct(q), .. }) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.check_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<Span> {
        let span = self.span_here();
        if self.eat_punct(p) {
            Ok(span)
        } else {
            Err(Error::parse(format!("expected '{}'", p), span))
        }
    }

    fn check_word(&self, w: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Word(x), .. }) if x == w)
    }

    fn eat_word(&mut self, w: &str) -> bool {
        if self.check_word(w) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, w: &str) -> Result<Span> {
        let span = self.span_here();
        if self.eat_word(w) {
            Ok(span)
        } else {
            Err(Error::parse(format!("expected '{}'", w), span))
        }
    }

    /// An identifier that is not a reserved word.
    fn expect_ident(&mut self) -> Result<(String, Span)> {
        let span = self.span_here();
        match self.peek() {
            Some(Token { kind: TokenKind::Word(w), .. }) if !KEYWORDS.contains(&w.as_str()) => {
                let name = w.clone();
                self.pos += 1;
                Ok((name, span))
            }
            _ => Err(Error::parse("expected an identifier", span)),
        }
    }

    // ----- statements -----------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt> {
        let span = self.span_here();

        if self.check_word("var") || self.check_word("const") {
            return self.parse_var_decl();
        }
        if self.check_word("func") {
            // `func name(...)` is a declaration; an anonymous `func (...)`
            // belongs to the expression grammar.
            if let Some(Token { kind: TokenKind::Word(w), .. }) = self.tokens.get(self.pos + 1) {
                if !KEYWORDS.contains(&w.as_str()) {
                    return self.parse_function_decl();
                }
            }
        }
        if self.eat_word("if") {
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            let then_branch = self.parse_statement_as_block()?;
            let else_branch = if self.eat_word("else") {
                Some(self.parse_statement_as_block()?)
            } else {
                None
            };
            return Ok(Stmt {
                kind: StmtKind::If { cond, then_branch, else_branch },
                span,
            });
        }
        if self.eat_word("switch") {
            return self.parse_switch(span);
        }
        if self.eat_word("while") {
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            let body = self.parse_statement_as_block()?;
            return Ok(Stmt {
                kind: StmtKind::While { cond, body, is_do_while: false },
                span,
            });
        }
        if self.eat_word("do") {
            let body = self.parse_statement_as_block()?;
            self.expect_word("while")?;
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            self.expect_punct(";")?;
            return Ok(Stmt {
                kind: StmtKind::While { cond, body, is_do_while: true },
                span,
            });
        }
        if self.eat_word("for") {
            return self.parse_for(span);
        }
        if self.eat_word("try") {
            let body = self.parse_statement_as_block()?;
            self.expect_word("catch")?;
            self.expect_punct("(")?;
            let (exception_name, _) = self.expect_ident()?;
            self.expect_punct(")")?;
            let catch_block = self.parse_statement_as_block()?;
            return Ok(Stmt {
                kind: StmtKind::Try { body, exception_name, catch_block },
                span,
            });
        }
        if self.eat_word("throw") {
            let expr = self.parse_expr()?;
            self.expect_punct(";")?;
            return Ok(Stmt { kind: StmtKind::Throw { expr }, span });
        }
        if self.eat_word("return") {
            let expr = if self.check_punct(";") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(";")?;
            return Ok(Stmt { kind: StmtKind::Return { expr }, span });
        }
        if self.eat_word("break") {
            let target = if self.eat_word("switch") {
                BreakTarget::Switch
            } else if self.eat_word("while") {
                BreakTarget::While
            } else if self.eat_word("for") {
                BreakTarget::For
            } else {
                BreakTarget::Unspecified
            };
            self.expect_punct(";")?;
            return Ok(Stmt { kind: StmtKind::Break { target }, span });
        }
        if self.eat_word("continue") {
            let target = if self.eat_word("while") {
                BreakTarget::While
            } else if self.eat_word("for") {
                BreakTarget::For
            } else {
                BreakTarget::Unspecified
            };
            self.expect_punct(";")?;
            return Ok(Stmt { kind: StmtKind::Continue { target }, span });
        }
        if self.check_punct("{") {
            let body = self.parse_block()?;
            return Ok(Stmt { kind: StmtKind::Block { body }, span });
        }
        if self.eat_punct(";") {
            // Null statement.
            return Ok(Stmt {
                kind: StmtKind::Block { body: Block::default() },
                span,
            });
        }

        let expr = self.parse_expr()?;
        self.expect_punct(";")?;
        Ok(Stmt { kind: StmtKind::Expression { expr }, span })
    }

    fn parse_var_decl(&mut self) -> Result<Stmt> {
        let span = self.span_here();
        let immutable = if self.eat_word("const") {
            true
        } else {
            self.expect_word("var")?;
            false
        };
        let (name, _) = self.expect_ident()?;
        let init = if self.eat_punct("=") {
            Some(self.parse_expr()?)
        } else if immutable {
            return Err(Error::parse("a 'const' declaration requires an initializer", span));
        } else {
            None
        };
        self.expect_punct(";")?;
        Ok(Stmt {
            kind: StmtKind::VarDecl { name, immutable, init },
            span,
        })
    }

    fn parse_function_decl(&mut self) -> Result<Stmt> {
        let span = self.expect_word("func")?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::FunctionDecl { name, params, body },
            span,
        })
    }

    /// `( name, name, ... )`; the variadic marker may only close the list.
    fn parse_params(&mut self) -> Result<Vec<String>> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.check_punct(")") {
            loop {
                if self.eat_punct("...") {
                    params.push("...".to_string());
                    break;
                }
                let (name, span) = self.expect_ident()?;
                if params.contains(&name) {
                    return Err(Error::parse(format!("duplicate parameter '{}'", name), span));
                }
                params.push(name);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        Ok(params)
    }

    fn parse_switch(&mut self, span: Span) -> Result<Stmt> {
        self.expect_punct("(")?;
        let subject = self.parse_expr()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;

        let mut clauses: Vec<SwitchClause> = Vec::new();
        let mut seen_default = false;
        while !self.eat_punct("}") {
            let clause_span = self.span_here();
            let label = if self.eat_word("case") {
                let label = self.parse_expr()?;
                self.expect_punct(":")?;
                Some(label)
            } else if self.eat_word("default") {
                if seen_default {
                    return Err(Error::parse("duplicate 'default' clause", clause_span));
                }
                seen_default = true;
                self.expect_punct(":")?;
                None
            } else {
                return Err(Error::parse("expected 'case', 'default' or '}'", clause_span));
            };

            let mut body = Vec::new();
            while !(self.check_punct("}") || self.check_word("case") || self.check_word("default"))
            {
                if self.is_at_end() {
                    return Err(Error::parse("unterminated 'switch' body", clause_span));
                }
                body.push(self.parse_statement()?);
            }
            clauses.push(SwitchClause { label, body: Block::new(body) });
        }
        Ok(Stmt {
            kind: StmtKind::Switch { subject, clauses },
            span,
        })
    }

    fn parse_for(&mut self, span: Span) -> Result<Stmt> {
        if self.eat_word("each") {
            self.expect_punct("(")?;
            let (key_name, _) = self.expect_ident()?;
            self.expect_punct(",")?;
            let (value_name, _) = self.expect_ident()?;
            self.expect_punct(":")?;
            let subject = self.parse_expr()?;
            self.expect_punct(")")?;
            let body = self.parse_statement_as_block()?;
            return Ok(Stmt {
                kind: StmtKind::ForEach { key_name, value_name, subject, body },
                span,
            });
        }

        self.expect_punct("(")?;
        let init = if self.eat_punct(";") {
            None
        } else if self.check_word("var") || self.check_word("const") {
            // The declaration consumes its own terminating ';'.
            Some(Box::new(self.parse_var_decl()?))
        } else {
            let init_span = self.span_here();
            let expr = self.parse_expr()?;
            self.expect_punct(";")?;
            Some(Box::new(Stmt {
                kind: StmtKind::Expression { expr },
                span: init_span,
            }))
        };
        let cond = if self.check_punct(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(";")?;
        let step = if self.check_punct(")") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_punct(")")?;
        let body = self.parse_statement_as_block()?;
        Ok(Stmt {
            kind: StmtKind::For { init, cond, step, body },
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.eat_punct("}") {
            if self.is_at_end() {
                return Err(Error::parse("unterminated block", self.span_here()));
            }
            stmts.push(self.parse_statement()?);
        }
        Ok(Block::new(stmts))
    }

    /// A statement in body position. A brace block stays a block; any other
    /// statement becomes a one-statement block so it opens its own scope.
    fn parse_statement_as_block(&mut self) -> Result<Block> {
        if self.check_punct("{") {
            return self.parse_block();
        }
        let stmt = self.parse_statement()?;
        Ok(Block::new(vec![stmt]))
    }

    // ----- expressions ----------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let lhs = self.parse_ternary()?;
        let op = if self.eat_punct("=") {
            None
        } else if self.eat_punct("+=") {
            Some(BinaryOp::Add)
        } else if self.eat_punct("-=") {
            Some(BinaryOp::Sub)
        } else if self.eat_punct("*=") {
            Some(BinaryOp::Mul)
        } else if self.eat_punct("/=") {
            Some(BinaryOp::Div)
        } else if self.eat_punct("%=") {
            Some(BinaryOp::Rem)
        } else {
            return Ok(lhs);
        };
        let rhs = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let cond = self.parse_coalesce()?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then_branch = self.parse_expr()?;
        self.expect_punct(":")?;
        let else_branch = self.parse_ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_coalesce(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_logical_or()?;
        while self.eat_punct("??") {
            let rhs = self.parse_logical_or()?;
            lhs = Expr::Coalesce {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_logical_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_logical_and()?;
        while self.eat_punct("||") {
            let rhs = self.parse_logical_and()?;
            lhs = Expr::LogicalOr {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bit_or()?;
        while self.eat_punct("&&") {
            let rhs = self.parse_bit_or()?;
            lhs = Expr::LogicalAnd {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bit_xor()?;
        while self.eat_punct("|") {
            let rhs = self.parse_bit_xor()?;
            lhs = Expr::Binary {
                op: BinaryOp::OrBitwise,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bit_and()?;
        while self.eat_punct("^") {
            let rhs = self.parse_bit_and()?;
            lhs = Expr::Binary {
                op: BinaryOp::XorBitwise,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat_punct("&") {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::AndBitwise,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = if self.eat_punct("==") {
                BinaryOp::Eq
            } else if self.eat_punct("!=") {
                BinaryOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = if self.eat_punct("<=") {
                BinaryOp::Le
            } else if self.eat_punct(">=") {
                BinaryOp::Ge
            } else if self.eat_punct("<") {
                BinaryOp::Lt
            } else if self.eat_punct(">") {
                BinaryOp::Gt
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = if self.eat_punct("+") {
                BinaryOp::Add
            } else if self.eat_punct("-") {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.eat_punct("*") {
                BinaryOp::Mul
            } else if self.eat_punct("/") {
                BinaryOp::Div
            } else if self.eat_punct("%") {
                BinaryOp::Rem
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = if self.eat_punct("+") {
            UnaryOp::Pos
        } else if self.eat_punct("-") {
            UnaryOp::Neg
        } else if self.eat_punct("!") {
            UnaryOp::NotLogical
        } else if self.eat_punct("~") {
            UnaryOp::NotBitwise
        } else if self.eat_punct("++") {
            UnaryOp::PrefixInc
        } else if self.eat_punct("--") {
            UnaryOp::PrefixDec
        } else {
            return self.parse_postfix();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check_punct("(") {
                let span = self.span_here();
                self.bump();
                let mut args = Vec::new();
                if !self.check_punct(")") {
                    loop {
                        args.push(self.parse_expr()?);
                        if !self.eat_punct(",") {
                            break;
                        }
                    }
                }
                self.expect_punct(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Subscript {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_punct(".") {
                let (key, _) = self.expect_ident()?;
                expr = Expr::Member {
                    base: Box::new(expr),
                    key,
                };
            } else if self.eat_punct("++") {
                expr = Expr::Unary {
                    op: UnaryOp::PostfixInc,
                    operand: Box::new(expr),
                };
            } else if self.eat_punct("--") {
                expr = Expr::Unary {
                    op: UnaryOp::PostfixDec,
                    operand: Box::new(expr),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.span_here();
        match self.peek().cloned() {
            Some(Token { kind: TokenKind::Integer(v), .. }) => {
                self.bump();
                Ok(Expr::Integer(v))
            }
            Some(Token { kind: TokenKind::Real(v), .. }) => {
                self.bump();
                Ok(Expr::Real(v))
            }
            Some(Token { kind: TokenKind::Str(bytes), .. }) => {
                self.bump();
                Ok(Expr::Str(bytes))
            }
            Some(Token { kind: TokenKind::Word(w), .. }) => match w.as_str() {
                "null" => {
                    self.bump();
                    Ok(Expr::Null)
                }
                "true" => {
                    self.bump();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.bump();
                    Ok(Expr::Bool(false))
                }
                "nan" => {
                    self.bump();
                    Ok(Expr::Real(f64::NAN))
                }
                "infinity" => {
                    self.bump();
                    Ok(Expr::Real(f64::INFINITY))
                }
                "func" => {
                    self.bump();
                    let params = self.parse_params()?;
                    let body = self.parse_block()?;
                    Ok(Expr::Func { params, body, span })
                }
                other if KEYWORDS.contains(&other) => {
                    Err(Error::parse(format!("unexpected keyword '{}'", other), span))
                }
                _ => {
                    self.bump();
                    Ok(Expr::Ident(w, span))
                }
            },
            Some(Token { kind: TokenKind::Punct("("), .. }) => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Some(Token { kind: TokenKind::Punct("["), .. }) => {
                self.bump();
                let mut elements = Vec::new();
                while !self.check_punct("]") {
                    elements.push(self.parse_expr()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::Array(elements))
            }
            Some(Token { kind: TokenKind::Punct("{"), .. }) => {
                self.bump();
                self.parse_object_literal()
            }
            _ => Err(Error::parse("expected an expression", span)),
        }
    }

    /// Members take the form `key : value` or `key = value`, separated by
    /// `,` or `;`. Keys are identifiers or string literals. A duplicate key
    /// keeps the last value, like repeated object writes would.
    fn parse_object_literal(&mut self) -> Result<Expr> {
        let mut members = Vec::new();
        while !self.check_punct("}") {
            let span = self.span_here();
            let key = match self.peek().cloned() {
                Some(Token { kind: TokenKind::Word(w), .. }) if !KEYWORDS.contains(&w.as_str()) => {
                    self.bump();
                    w
                }
                Some(Token { kind: TokenKind::Str(bytes), .. }) => {
                    self.bump();
                    String::from_utf8_lossy(&bytes).into_owned()
                }
                _ => return Err(Error::parse("expected an object key", span)),
            };
            if !(self.eat_punct(":") || self.eat_punct("=")) {
                return Err(Error::parse("expected ':' or '=' after object key", span));
            }
            let value = self.parse_expr()?;
            members.push((key, value));
            if !(self.eat_punct(",") || self.eat_punct(";")) {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Block {
        Parser::new(src.as_bytes(), 1).unwrap().parse().unwrap()
    }

    fn parse_err(src: &str) -> Error {
        match Parser::new(src.as_bytes(), 1) {
            Ok(p) => p.parse().unwrap_err(),
            Err(e) => e,
        }
    }

    #[test]
    fn test_var_decl() {
        let block = parse("var a = 1; const b = 2;");
        assert_eq!(block.stmts.len(), 2);
        match &block.stmts[0].kind {
            StmtKind::VarDecl { name, immutable, init } => {
                assert_eq!(name, "a");
                assert!(!immutable);
                assert_eq!(init, &Some(Expr::Integer(1)));
            }
            other => panic!("expected VarDecl, got {:?}", other),
        }
        match &block.stmts[1].kind {
            StmtKind::VarDecl { immutable, .. } => assert!(immutable),
            other => panic!("expected VarDecl, got {:?}", other),
        }
    }

    #[test]
    fn test_const_requires_initializer() {
        let err = parse_err("const a;");
        assert!(err.message().contains("initializer"));
    }

    #[test]
    fn test_function_decl_with_variadic() {
        let block = parse("func f(a, ...) { return a; }");
        match &block.stmts[0].kind {
            StmtKind::FunctionDecl { name, params, body } => {
                assert_eq!(name, "f");
                assert_eq!(params, &vec!["a".to_string(), "...".to_string()]);
                assert_eq!(body.stmts.len(), 1);
            }
            other => panic!("expected FunctionDecl, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let block = parse("1 + 2 * 3;");
        match &block.stmts[0].kind {
            StmtKind::Expression { expr: Expr::Binary { op: BinaryOp::Add, rhs, .. } } => {
                assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let block = parse("a = b = 1;");
        match &block.stmts[0].kind {
            StmtKind::Expression { expr: Expr::Assign { rhs, .. } } => {
                assert!(matches!(**rhs, Expr::Assign { .. }));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_postfix_chain() {
        let block = parse("a.b[0](1, 2);");
        match &block.stmts[0].kind {
            StmtKind::Expression { expr: Expr::Call { callee, args, .. } } => {
                assert_eq!(args.len(), 2);
                assert!(matches!(**callee, Expr::Subscript { .. }));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_ternary_and_logical() {
        let block = parse("x = !c ? a && b : d ?? e;");
        match &block.stmts[0].kind {
            StmtKind::Expression { expr: Expr::Assign { rhs, .. } } => {
                assert!(matches!(**rhs, Expr::Ternary { .. }));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_switch_clauses_keep_order() {
        let block = parse(
            "switch (x) { case 1: a(); case 2: b(); break; default: c(); case 3: d(); }",
        );
        match &block.stmts[0].kind {
            StmtKind::Switch { clauses, .. } => {
                assert_eq!(clauses.len(), 4);
                assert!(clauses[0].label.is_some());
                assert!(clauses[2].label.is_none());
                assert!(clauses[3].label.is_some());
            }
            other => panic!("expected Switch, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_default_rejected() {
        let err = parse_err("switch (x) { default: ; default: ; }");
        assert!(err.message().contains("default"));
    }

    #[test]
    fn test_for_each() {
        let block = parse("for each (k, v : obj) { use(k, v); }");
        match &block.stmts[0].kind {
            StmtKind::ForEach { key_name, value_name, .. } => {
                assert_eq!(key_name, "k");
                assert_eq!(value_name, "v");
            }
            other => panic!("expected ForEach, got {:?}", other),
        }
    }

    #[test]
    fn test_for_three_clause() {
        let block = parse("for (var i = 0; i < 10; ++i) { f(i); }");
        match &block.stmts[0].kind {
            StmtKind::For { init, cond, step, .. } => {
                assert!(init.is_some());
                assert!(cond.is_some());
                assert!(step.is_some());
            }
            other => panic!("expected For, got {:?}", other),
        }
    }

    #[test]
    fn test_object_literal_both_separators() {
        let block = parse("x = { a: 1, b = 2; \"c d\": 3 };");
        match &block.stmts[0].kind {
            StmtKind::Expression { expr: Expr::Assign { rhs, .. } } => match &**rhs {
                Expr::Object(members) => {
                    let keys: Vec<_> = members.iter().map(|(k, _)| k.as_str()).collect();
                    assert_eq!(keys, vec!["a", "b", "c d"]);
                }
                other => panic!("expected Object, got {:?}", other),
            },
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_break_targets() {
        let block = parse("while (1) { break while; }");
        match &block.stmts[0].kind {
            StmtKind::While { body, .. } => match &body.stmts[0].kind {
                StmtKind::Break { target } => assert_eq!(*target, BreakTarget::While),
                other => panic!("expected Break, got {:?}", other),
            },
            other => panic!("expected While, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon_is_a_parse_error() {
        let err = parse_err("var a = 1");
        assert_eq!(err.kind(), asteria_core::ErrorKind::Parse);
    }

    #[test]
    fn test_anonymous_function_expression() {
        let block = parse("var f = func (x) { return x; };");
        match &block.stmts[0].kind {
            StmtKind::VarDecl { init: Some(Expr::Func { params, .. }), .. } => {
                assert_eq!(params, &vec!["x".to_string()]);
            }
            other => panic!("expected Func initializer, got {:?}", other),
        }
    }
}
