//! Parser: recursive-descent expression/statement grammar over a scanned
//! token stream, with no implicit semicolons (`spec.md` §4.4).

use crate::scan::{Span, Token, TokenKind};
use crate::TranspileError;

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// A compound-assignment operator (`spec.md`: `+=` etc. are common in
/// membrane-update code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Int(i64),
    /// Floating literal; `true` if it carried the `f` suffix.
    Float(f64, bool),
    /// String literal.
    Str(String),
    /// A bare identifier reference.
    Ident(String, Span),
    /// Unary negation or logical not.
    Unary(UnaryOp, Box<Expr>),
    /// Binary operator application.
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Ternary conditional `cond ? a : b`.
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Function call with positional arguments.
    Call(String, Vec<Expr>, Span),
}

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `target OP= expr;`
    Assign(String, AssignOp, Expr, Span),
    /// A bare expression statement (typically a function call for side
    /// effects, e.g. `addToPostDelay(g, 1);`).
    Expr(Expr),
    /// `if (cond) { ... } else { ... }`; `else_body` is empty when absent.
    If(Expr, Vec<Stmt>, Vec<Stmt>),
}

/// Parse a full fragment's token stream (as produced by [`crate::scan`])
/// into a sequence of statements.
pub fn parse(tokens: &[Token], context: &str) -> Result<Vec<Stmt>, TranspileError> {
    let mut parser = Parser { tokens, pos: 0, context };
    let mut stmts = Vec::new();
    while !parser.at_eof() {
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    context: &'a str,
}

impl<'a> Parser<'a> {
    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn span(&self) -> Span {
        self.peek().span
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), TranspileError> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            self.advance();
            Ok(())
        } else {
            Err(TranspileError::parse(
                self.context,
                self.span(),
                format!("expected {what}, found {:?}", self.peek_kind()),
            ))
        }
    }

    fn statement(&mut self) -> Result<Stmt, TranspileError> {
        if matches!(self.peek_kind(), TokenKind::Ident(name) if name == "if") {
            return self.if_statement();
        }
        if let TokenKind::Ident(name) = self.peek_kind().clone() {
            if let Some(op) = self.peek_assign_op() {
                let span = self.span();
                self.advance(); // ident
                self.advance(); // assign op
                let rhs = self.expr()?;
                self.expect(&TokenKind::Semicolon, "';'")?;
                return Ok(Stmt::Assign(name, op, rhs, span));
            }
        }
        let expr = self.expr()?;
        self.expect(&TokenKind::Semicolon, "';'")?;
        Ok(Stmt::Expr(expr))
    }

    /// Looks one token ahead (past the identifier already at `self.pos`)
    /// for an assignment operator, without consuming anything.
    fn peek_assign_op(&self) -> Option<AssignOp> {
        let next = self.tokens.get(self.pos + 1)?;
        match &next.kind {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            _ => None,
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, TranspileError> {
        self.advance(); // 'if'
        self.expect(&TokenKind::LParen, "'('")?;
        let cond = self.expr()?;
        self.expect(&TokenKind::RParen, "')'")?;
        let then_body = self.block()?;
        let else_body = if matches!(self.peek_kind(), TokenKind::Ident(name) if name == "else") {
            self.advance();
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If(cond, then_body, else_body))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, TranspileError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::RBrace) {
            stmts.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn expr(&mut self) -> Result<Expr, TranspileError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, TranspileError> {
        let cond = self.logical_or()?;
        if matches!(self.peek_kind(), TokenKind::Question) {
            self.advance();
            let then_val = self.expr()?;
            self.expect(&TokenKind::Colon, "':'")?;
            let else_val = self.expr()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then_val), Box::new(else_val)));
        }
        Ok(cond)
    }

    fn logical_or(&mut self) -> Result<Expr, TranspileError> {
        let mut lhs = self.logical_and()?;
        while matches!(self.peek_kind(), TokenKind::OrOr) {
            self.advance();
            let rhs = self.logical_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr, TranspileError> {
        let mut lhs = self.equality()?;
        while matches!(self.peek_kind(), TokenKind::AndAnd) {
            self.advance();
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, TranspileError> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Expr, TranspileError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, TranspileError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, TranspileError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, TranspileError> {
        match self.peek_kind() {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)))
            }
            TokenKind::Not => {
                self.advance();
                Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, TranspileError> {
        let span = self.span();
        match self.peek_kind().clone() {
            TokenKind::IntLiteral(v) => {
                self.advance();
                Ok(Expr::Int(v))
            }
            TokenKind::FloatLiteral(v, suffixed) => {
                self.advance();
                Ok(Expr::Float(v, suffixed))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if matches!(self.peek_kind(), TokenKind::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if !matches!(self.peek_kind(), TokenKind::RParen) {
                        args.push(self.expr()?);
                        while matches!(self.peek_kind(), TokenKind::Comma) {
                            self.advance();
                            args.push(self.expr()?);
                        }
                    }
                    self.expect(&TokenKind::RParen, "')'")?;
                    Ok(Expr::Call(name, args, span))
                } else {
                    Ok(Expr::Ident(name, span))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(TranspileError::parse(
                self.context,
                span,
                format!("unexpected token {other:?}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan;

    fn parse_src(src: &str) -> Vec<Stmt> {
        let toks = scan(src, "test").unwrap();
        parse(&toks, "test").unwrap()
    }

    #[test]
    fn parses_compound_assignment() {
        let stmts = parse_src("V += (Isyn - V) / tau_m;");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Assign(_, AssignOp::Add, _, _)));
    }

    #[test]
    fn parses_call_with_positional_args() {
        let stmts = parse_src("addToPostDelay(g, 1);");
        match &stmts[0] {
            Stmt::Expr(Expr::Call(name, args, _)) => {
                assert_eq!(name, "addToPostDelay");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_if_else_with_blocks() {
        let stmts = parse_src("if (V > 30.0) { V = c; } else { spike = false; }");
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::If(_, then_body, else_body) => {
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn requires_explicit_semicolons() {
        let toks = scan("V = 0 spike = true;", "test").unwrap();
        assert!(parse(&toks, "test").is_err());
    }

    #[test]
    fn ternary_binds_looser_than_comparison() {
        let stmts = parse_src("x = a > b ? a : b;");
        match &stmts[0] {
            Stmt::Assign(_, _, Expr::Ternary(cond, _, _), _) => {
                assert!(matches!(**cond, Expr::Binary(BinOp::Gt, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
