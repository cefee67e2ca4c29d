//! `function { ... }` declarations.
//!
//! Bodies are parsed with a small precedence-climbing parser into an
//! `ast::Expr` and compiled once. Parameters are bound as `ParamSlot`
//! entries in a table of their own, so they shadow reserved words such as
//! `x` while the body is read.

use serde::Serialize;

use crate::error::Result;
use crate::function::ast::{BinOp, Builtin, Expr, UnaryOp};
use crate::function::FunctionHandle;
use crate::keywords::Keyword;
use crate::spline::SplineHandle;
use crate::symbols::{impl_declarable, SymbolEntry, SymbolKind};
use crate::token::Token;

use super::stream::Tok;
use super::Parser;

/// Binding of a parameter name inside a function body.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSlot {
    pub index: usize,
}

impl_declarable!(ParamSlot => Parameter);

const UNARY_PRECEDENCE: u8 = 6;

fn binary_op(token: &Token) -> Option<BinOp> {
    Some(match token {
        Token::Pipe => BinOp::Or,
        Token::Ampersand => BinOp::And,
        Token::Less => BinOp::Lt,
        Token::LessEqual => BinOp::Le,
        Token::Equal | Token::EqualEqual => BinOp::Eq,
        Token::NotEqual => BinOp::Ne,
        Token::GreaterEqual => BinOp::Ge,
        Token::Greater => BinOp::Gt,
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        Token::Star => BinOp::Mul,
        Token::Slash => BinOp::Div,
        Token::Caret => BinOp::Pow,
        _ => return None,
    })
}

/// Slot of a named component after `.` in a call result.
fn component_index(name: &str) -> Option<usize> {
    match name {
        "x" | "u" | "red" => Some(0),
        "y" | "v" | "green" => Some(1),
        "z" | "blue" => Some(2),
        "t" | "filter" => Some(3),
        "transmit" => Some(4),
        _ => None,
    }
}

impl Parser {
    /// After the `function` keyword: `[ ( p, ... ) ] { body }`.
    pub(crate) fn parse_function(&mut self) -> Result<FunctionHandle> {
        let params = if self.accept(&Token::LParen)? {
            let mut names = Vec::new();
            if !self.accept(&Token::RParen)? {
                loop {
                    names.push(self.raw_word("parameter name")?);
                    if self.accept(&Token::RParen)? {
                        break;
                    }
                    self.expect(&Token::Comma)?;
                }
            }
            names
        } else {
            ["x", "y", "z"].iter().map(|s| s.to_string()).collect()
        };

        // parameters are bound before the first body token is classified
        self.expect(&Token::LBrace)?;
        self.symbols.push_table().map_err(|e| self.located(e))?;
        for (index, name) in params.iter().enumerate() {
            self.symbols.local_mut().add_symbol(name, Box::new(ParamSlot { index }));
        }
        let la = match self.get() {
            Ok(la) => la,
            Err(e) => {
                self.symbols.pop_table();
                return Err(e);
            }
        };
        let function = match la.tok.keyword() {
            Some(Keyword::Spline) => {
                self.symbols.pop_table();
                FunctionHandle::from_spline(SplineHandle::new(self.parse_spline()?))
            }
            Some(Keyword::Pigment) => {
                self.symbols.pop_table();
                FunctionHandle::from_pigment(self.parse_pigment()?)
            }
            _ => {
                self.unget(la);
                let body = self.parse_fn_expr(0);
                self.symbols.pop_table();
                FunctionHandle::from_expr(params, &body?)
            }
        };
        self.expect(&Token::RBrace)?;
        log::debug!("compiled {function:?}");
        Ok(function)
    }

    /// Precedence climbing over binary operators, with `?:` at the
    /// outermost level.
    fn parse_fn_expr(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_fn_unary()?;
        loop {
            let la = self.get()?;
            let op = match &la.tok {
                Tok::Raw(t) => binary_op(t),
                _ => None,
            };
            let Some(op) = op.filter(|op| op.precedence() >= min_prec) else {
                self.unget(la);
                break;
            };
            let next = if op.is_right_assoc() {
                op.precedence()
            } else {
                op.precedence() + 1
            };
            let right = self.parse_fn_expr(next)?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        if min_prec == 0 && self.accept(&Token::Question)? {
            let if_true = self.parse_fn_expr(0)?;
            self.expect(&Token::Colon)?;
            let if_false = self.parse_fn_expr(0)?;
            left = Expr::Ternary {
                condition: Box::new(left),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            };
        }
        Ok(left)
    }

    fn parse_fn_unary(&mut self) -> Result<Expr> {
        let la = self.get()?;
        let op = match la.tok {
            Tok::Raw(Token::Minus) => UnaryOp::Neg,
            Tok::Raw(Token::Bang) => UnaryOp::Not,
            Tok::Raw(Token::Plus) => return self.parse_fn_unary(),
            _ => {
                self.unget(la);
                return self.parse_fn_primary();
            }
        };
        let operand = self.parse_fn_expr(UNARY_PRECEDENCE)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_fn_primary(&mut self) -> Result<Expr> {
        let la = self.get()?;
        match &la.tok {
            Tok::Raw(Token::Float(v)) => Ok(Expr::Number(*v)),
            Tok::Raw(Token::LParen) => {
                let inner = self.parse_fn_expr(0)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Tok::Keyword(k) => {
                let k = *k;
                match Builtin::from_keyword(k) {
                    Some(func) => self.parse_fn_builtin(k, func),
                    // constants and anything else that folds at parse time
                    None if k.is_float_function() => Ok(Expr::Number(self.float_builtin(k)?)),
                    None => Err(self.unexpected("float function or parameter", &la)),
                }
            }
            Tok::Ident(entry) => {
                let entry = entry.clone();
                match entry.kind() {
                    SymbolKind::Parameter => {
                        let slot = entry
                            .with(|p: &ParamSlot| p.index)
                            .ok_or_else(|| self.error("Function parameter has no slot."))?;
                        Ok(Expr::Param(slot))
                    }
                    SymbolKind::Float => {
                        let value = entry
                            .express()
                            .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))?;
                        Ok(Expr::Number(value.first()))
                    }
                    SymbolKind::Function | SymbolKind::VectorFunction => self.parse_fn_call(&entry),
                    _ => Err(self.unexpected("float function or parameter", &la)),
                }
            }
            _ => Err(self.unexpected("float function or parameter", &la)),
        }
    }

    fn parse_fn_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.accept(&Token::RParen)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_fn_expr(0)?);
            if self.accept(&Token::RParen)? {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn parse_fn_builtin(&mut self, k: Keyword, func: Builtin) -> Result<Expr> {
        let args = self.parse_fn_args()?;
        let (min, max) = func.arity();
        if args.len() < min || args.len() > max {
            return Err(self.error(&format!(
                "Wrong number of parameters for {}: {} given.",
                k.as_str(),
                args.len()
            )));
        }
        Ok(Expr::Builtin { func, args })
    }

    /// `F(args)` or `V(args).component` inside a body.
    fn parse_fn_call(&mut self, entry: &SymbolEntry) -> Result<Expr> {
        let function = match entry.with(|f: &FunctionHandle| f.acquire()) {
            Some(claim) => claim.map_err(|e| self.located(e))?,
            None => {
                return Err(self.error(
                    "Illegal attempt to evaluate a function being currently declared; did you miss a closing brace?",
                ))
            }
        };
        let args = self.parse_fn_args()?;
        if args.len() != function.param_count() {
            return Err(self.error(&format!(
                "Function '{}' expects {} parameters, {} given.",
                entry.name(),
                function.param_count(),
                args.len()
            )));
        }

        let mut component = 0;
        if function.is_vector() && self.accept(&Token::Dot)? {
            let name = self.raw_word("component name")?;
            component = component_index(&name)
                .filter(|&c| c < function.return_size())
                .ok_or_else(|| self.error(&format!("Bad component '{name}' for vector function.")))?;
        }
        Ok(Expr::Call {
            function,
            args,
            component,
        })
    }
}
