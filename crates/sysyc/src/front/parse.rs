//! Recursive-descent parser for SysY.
//!
//! The grammar is the usual C-subset shape with the precedence chain
//! LOr < LAnd < Eq < Rel < Add < Mul < Unary < Primary. The dangling-else
//! ambiguity is resolved greedily: an `else` always binds to the nearest
//! unmatched `if`.

use super::ast::*;
use super::lex::{tokenize, SpannedToken, Token};
use anyhow::{bail, Result};

/// Parse a complete SysY source string into a [`CompUnit`].
pub fn parse(source: &str) -> Result<CompUnit> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_comp_unit()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn advance(&mut self) -> Result<Token> {
        match self.tokens.get(self.pos) {
            Some(t) => {
                self.pos += 1;
                Ok(t.token.clone())
            }
            None => bail!("unexpected end of input"),
        }
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    /// Consume the next token if it matches.
    fn accept(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.accept(token) {
            Ok(())
        } else {
            match self.tokens.get(self.pos) {
                Some(t) => bail!(
                    "expected {} but found {} at {}:{}",
                    token,
                    t.token,
                    t.line,
                    t.column
                ),
                None => bail!("expected {} but reached end of input", token),
            }
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance()? {
            Token::Ident(name) => Ok(name),
            other => bail!("expected identifier but found {}", other),
        }
    }

    fn parse_comp_unit(&mut self) -> Result<CompUnit> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            // `const …` is always a declaration. `int`/`void` followed by an
            // identifier and `(` starts a function definition.
            let is_func = matches!(self.peek(), Some(Token::Int) | Some(Token::Void))
                && matches!(self.peek_at(1), Some(Token::Ident(_)))
                && self.peek_at(2) == Some(&Token::LParen);
            if is_func {
                items.push(GlobalItem::Func(self.parse_func_def()?));
            } else {
                items.push(GlobalItem::Decl(self.parse_decl()?));
            }
        }
        Ok(CompUnit { items })
    }

    fn parse_func_def(&mut self) -> Result<FuncDef> {
        let ret = match self.advance()? {
            Token::Int => FuncType::Int,
            Token::Void => FuncType::Void,
            other => bail!("expected 'int' or 'void' but found {}", other),
        };
        let ident = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.parse_func_param()?);
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let body = self.parse_block()?;
        Ok(FuncDef {
            ret,
            ident,
            params,
            body,
        })
    }

    fn parse_func_param(&mut self) -> Result<FuncParam> {
        self.expect(&Token::Int)?;
        let ident = self.expect_ident()?;
        let dims = if self.accept(&Token::LBracket) {
            // First dimension is always empty in a parameter.
            self.expect(&Token::RBracket)?;
            let mut dims = Vec::new();
            while self.accept(&Token::LBracket) {
                dims.push(self.parse_exp()?);
                self.expect(&Token::RBracket)?;
            }
            Some(dims)
        } else {
            None
        };
        Ok(FuncParam { ident, dims })
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(&Token::LBrace)?;
        let mut items = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.peek().is_none() {
                bail!("unterminated block: expected '}}'");
            }
            if matches!(self.peek(), Some(Token::Const) | Some(Token::Int)) {
                items.push(BlockItem::Decl(self.parse_decl()?));
            } else {
                items.push(BlockItem::Stmt(self.parse_stmt()?));
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(Block { items })
    }

    fn parse_decl(&mut self) -> Result<Decl> {
        if self.accept(&Token::Const) {
            self.expect(&Token::Int)?;
            let mut defs = Vec::new();
            loop {
                defs.push(self.parse_const_def()?);
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Semi)?;
            Ok(Decl::Const(ConstDecl { defs }))
        } else {
            self.expect(&Token::Int)?;
            let mut defs = Vec::new();
            loop {
                defs.push(self.parse_var_def()?);
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Semi)?;
            Ok(Decl::Var(VarDecl { defs }))
        }
    }

    fn parse_dims(&mut self) -> Result<Vec<Exp>> {
        let mut dims = Vec::new();
        while self.accept(&Token::LBracket) {
            dims.push(self.parse_exp()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(dims)
    }

    fn parse_const_def(&mut self) -> Result<ConstDef> {
        let ident = self.expect_ident()?;
        let dims = self.parse_dims()?;
        self.expect(&Token::Assign)?;
        let init = self.parse_init_val()?;
        Ok(ConstDef { ident, dims, init })
    }

    fn parse_var_def(&mut self) -> Result<VarDef> {
        let ident = self.expect_ident()?;
        let dims = self.parse_dims()?;
        let init = if self.accept(&Token::Assign) {
            Some(self.parse_init_val()?)
        } else {
            None
        };
        Ok(VarDef { ident, dims, init })
    }

    fn parse_init_val(&mut self) -> Result<InitVal> {
        if self.accept(&Token::LBrace) {
            let mut elems = Vec::new();
            if !self.check(&Token::RBrace) {
                loop {
                    elems.push(self.parse_init_val()?);
                    if !self.accept(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::RBrace)?;
            Ok(InitVal::List(elems))
        } else {
            Ok(InitVal::Exp(self.parse_exp()?))
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Return) => {
                self.advance()?;
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.parse_exp()?)
                };
                self.expect(&Token::Semi)?;
                Ok(Stmt::Return(value))
            }
            Some(Token::If) => {
                self.advance()?;
                self.expect(&Token::LParen)?;
                let cond = self.parse_exp()?;
                self.expect(&Token::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.accept(&Token::Else) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            Some(Token::While) => {
                self.advance()?;
                self.expect(&Token::LParen)?;
                let cond = self.parse_exp()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body })
            }
            Some(Token::Break) => {
                self.advance()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Break)
            }
            Some(Token::Continue) => {
                self.advance()?;
                self.expect(&Token::Semi)?;
                Ok(Stmt::Continue)
            }
            Some(Token::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Semi) => {
                self.advance()?;
                Ok(Stmt::Exp(None))
            }
            _ => self.parse_assign_or_exp_stmt(),
        }
    }

    /// Distinguish `lval = exp;` from an expression statement. An assignment
    /// starts with an identifier followed by indices and `=`; everything else
    /// is an expression. We try the assignment shape first and backtrack.
    fn parse_assign_or_exp_stmt(&mut self) -> Result<Stmt> {
        if matches!(self.peek(), Some(Token::Ident(_))) {
            let saved = self.pos;
            if let Ok(lval) = self.parse_lval() {
                if self.accept(&Token::Assign) {
                    let value = self.parse_exp()?;
                    self.expect(&Token::Semi)?;
                    return Ok(Stmt::Assign(lval, value));
                }
            }
            self.pos = saved;
        }
        let exp = self.parse_exp()?;
        self.expect(&Token::Semi)?;
        Ok(Stmt::Exp(Some(exp)))
    }

    fn parse_lval(&mut self) -> Result<LVal> {
        let ident = self.expect_ident()?;
        let mut indices = Vec::new();
        while self.accept(&Token::LBracket) {
            indices.push(self.parse_exp()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(LVal { ident, indices })
    }

    fn parse_exp(&mut self) -> Result<Exp> {
        self.parse_lor()
    }

    fn parse_lor(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_land()?;
        while self.accept(&Token::OrOr) {
            let rhs = self.parse_land()?;
            lhs = Exp::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_land(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_eq()?;
        while self.accept(&Token::AndAnd) {
            let rhs = self.parse_eq()?;
            lhs = Exp::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_rel()?;
        loop {
            let op = if self.accept(&Token::EqEq) {
                BinaryOp::Eq
            } else if self.accept(&Token::Ne) {
                BinaryOp::Ne
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_rel()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_rel(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = if self.accept(&Token::Lt) {
                BinaryOp::Lt
            } else if self.accept(&Token::Gt) {
                BinaryOp::Gt
            } else if self.accept(&Token::Le) {
                BinaryOp::Le
            } else if self.accept(&Token::Ge) {
                BinaryOp::Ge
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_add()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_add(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if self.accept(&Token::Plus) {
                BinaryOp::Add
            } else if self.accept(&Token::Minus) {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_mul()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self) -> Result<Exp> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.accept(&Token::Star) {
                BinaryOp::Mul
            } else if self.accept(&Token::Slash) {
                BinaryOp::Div
            } else if self.accept(&Token::Percent) {
                BinaryOp::Mod
            } else {
                return Ok(lhs);
            };
            let rhs = self.parse_unary()?;
            lhs = Exp::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Exp> {
        let op = if self.accept(&Token::Plus) {
            UnaryOp::Plus
        } else if self.accept(&Token::Minus) {
            UnaryOp::Neg
        } else if self.accept(&Token::Not) {
            UnaryOp::Not
        } else {
            return self.parse_primary();
        };
        let operand = self.parse_unary()?;
        Ok(Exp::Unary(op, Box::new(operand)))
    }

    fn parse_primary(&mut self) -> Result<Exp> {
        match self.peek() {
            Some(Token::LParen) => {
                self.advance()?;
                let exp = self.parse_exp()?;
                self.expect(&Token::RParen)?;
                Ok(exp)
            }
            Some(Token::IntConst(_)) => match self.advance()? {
                Token::IntConst(n) => Ok(Exp::Number(n)),
                _ => unreachable!(),
            },
            Some(Token::Ident(_)) => {
                if self.peek_at(1) == Some(&Token::LParen) {
                    let callee = self.expect_ident()?;
                    self.expect(&Token::LParen)?;
                    let mut args = Vec::new();
                    if !self.check(&Token::RParen) {
                        loop {
                            args.push(self.parse_exp()?);
                            if !self.accept(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Exp::Call(callee, args))
                } else {
                    Ok(Exp::LVal(self.parse_lval()?))
                }
            }
            Some(other) => bail!("expected expression but found {}", other),
            None => bail!("expected expression but reached end of input"),
        }
    }
}
