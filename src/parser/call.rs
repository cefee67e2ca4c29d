//! Calls from expressions into declared functions and splines.
//!
//! The callee is claimed before its argument list is parsed. An argument
//! can leave a macro body or include file and pop the table that owns the
//! callee, so the claim keeps it alive until the call returns. Claims are
//! plain handles and are released when they go out of scope, on error
//! paths included.

use crate::error::Result;
use crate::express::{Arity, Express};
use crate::function::{FunctionContext, FunctionHandle};
use crate::spline::SplineHandle;
use crate::symbols::SymbolEntry;
use crate::token::Token;

use super::spline::spline_kind;
use super::Parser;

impl Parser {
    fn claim_function(&self, entry: &SymbolEntry) -> Result<FunctionHandle> {
        match entry.with(|f: &FunctionHandle| f.acquire()) {
            Some(claim) => claim.map_err(|e| self.located(e)),
            None => Err(self.error(
                "Illegal attempt to evaluate a function being currently declared; did you miss a closing brace?",
            )),
        }
    }

    /// `( a, b, ... )` with exactly `count` floats. Every argument is read
    /// before any VM slot is written, since an argument may itself call
    /// a function.
    fn parse_call_args(&mut self, count: usize) -> Result<Vec<f64>> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::with_capacity(count);
        for i in 0..count {
            if i > 0 {
                self.expect(&Token::Comma)?;
            }
            args.push(self.parse_float()?);
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn invoke(&mut self, function: &FunctionHandle, args: &[f64]) -> Result<f64> {
        let base = FunctionContext::param_base(function);
        for (i, value) in args.iter().enumerate() {
            self.vm.set_local(base + i, *value);
        }
        log::trace!("calling {function:?} with {args:?}");
        self.vm.run(function).map_err(|e| self.located(e))
    }

    pub(crate) fn parse_function_call(&mut self, entry: &SymbolEntry) -> Result<f64> {
        let function = self.claim_function(entry)?;
        let args = self.parse_call_args(function.param_count())?;
        self.invoke(&function, &args)
    }

    /// Vector functions leave their results in slots `0..return_size`.
    pub(crate) fn parse_vector_function_call(&mut self, entry: &SymbolEntry) -> Result<Express> {
        let function = self.claim_function(entry)?;
        let args = self.parse_call_args(function.param_count())?;
        self.invoke(&function, &args)?;
        let n = function.return_size();
        let arity = Arity::from_terms(n)
            .ok_or_else(|| self.error(&format!("Vector function returns {n} values; 1 to 5 expected.")))?;
        let values: Vec<f64> = (0..n).map(|slot| self.vm.get_local(slot)).collect();
        Ok(Express::from_slice(arity, &values))
    }

    /// `S(t)` or `S(t, kind)`. With a kind, a temporary copy of the spline
    /// is evaluated under that rule and dropped.
    pub(crate) fn parse_spline_call(&mut self, entry: &SymbolEntry) -> Result<Express> {
        let spline: SplineHandle = match entry.with(|s: &SplineHandle| s.acquire()) {
            Some(claim) => claim.map_err(|e| self.located(e))?,
            None => return Err(self.error(&format!("Identifier '{}' has no value.", entry.name()))),
        };
        self.expect(&Token::LParen)?;
        let t = self.parse_float()?;
        let kind = if self.accept(&Token::Comma)? {
            let la = self.get()?;
            match la.tok.keyword().and_then(spline_kind) {
                Some(kind) => Some(kind),
                None => {
                    return Err(self.unexpected(
                        "linear_spline, quadratic_spline, natural_spline, or cubic_spline",
                        &la,
                    ))
                }
            }
        } else {
            None
        };
        self.expect(&Token::RParen)?;

        Ok(match kind {
            Some(kind) => spline.spline().with_kind(kind).get(t),
            None => spline.spline().get(t),
        })
    }
}
