//! Stack machine that runs compiled function bodies.
//!
//! Callers talk to it through local slots: parameters go in with
//! `set_local`, `run` executes, and vector results come back out of slots
//! `0..return_size` via `get_local`. Vector functions take their
//! parameters from the slots just past their results.

use crate::error::{Result, SceneError};
use crate::express::ftrue;
use crate::pattern::{compute_pigment, LatticeNoise};
use crate::vector::Vector3;

use super::ast::UnaryOp;
use super::compile::Op;
use super::{FunctionBody, FunctionHandle};

/// Deepest chain of nested function calls.
pub const MAX_CALL_DEPTH: usize = 256;

#[derive(Debug, Default)]
pub struct FunctionContext {
    locals: Vec<f64>,
    stack: Vec<f64>,
}

impl FunctionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local(&mut self, slot: usize, value: f64) {
        if slot >= self.locals.len() {
            self.locals.resize(slot + 1, 0.0);
        }
        self.locals[slot] = value;
    }

    pub fn get_local(&self, slot: usize) -> f64 {
        self.locals.get(slot).copied().unwrap_or(0.0)
    }

    /// First local slot holding a parameter of `f`.
    pub fn param_base(f: &FunctionHandle) -> usize {
        if f.is_vector() {
            f.return_size()
        } else {
            0
        }
    }

    /// Run `f` on the parameters in the local slots. Returns the first
    /// result; vector results are also written to slots `0..return_size`.
    pub fn run(&mut self, f: &FunctionHandle) -> Result<f64> {
        let base = Self::param_base(f);
        let count = f.param_count();
        if self.locals.len() < base + count {
            self.locals.resize(base + count, 0.0);
        }
        let params = self.locals[base..base + count].to_vec();
        let results = self.evaluate(f, &params, 0)?;
        if f.is_vector() {
            for (slot, value) in results.iter().enumerate() {
                self.set_local(slot, *value);
            }
        }
        Ok(results.first().copied().unwrap_or(0.0))
    }

    /// Evaluate `f` directly on a parameter list.
    pub fn call(&mut self, f: &FunctionHandle, params: &[f64]) -> Result<Vec<f64>> {
        self.evaluate(f, params, 0)
    }

    fn evaluate(&mut self, f: &FunctionHandle, params: &[f64], depth: usize) -> Result<Vec<f64>> {
        if depth >= MAX_CALL_DEPTH {
            return Err(SceneError::internal("Function call nesting too deep."));
        }
        let param = |i: usize| params.get(i).copied().unwrap_or(0.0);
        match &f.code().body {
            FunctionBody::Code(ops) => Ok(vec![self.exec(ops, params, depth)?]),
            FunctionBody::Spline(spline) => {
                let value = spline.spline().get(param(0));
                let mut out = value.values().to_vec();
                out.resize(f.return_size(), 0.0);
                Ok(out)
            }
            FunctionBody::Pigment(pigment) => {
                let point = Vector3::new(param(0), param(1), param(2));
                let colour = compute_pigment(pigment, point, &LatticeNoise);
                Ok(colour.channels().to_vec())
            }
        }
    }

    fn pop(&mut self) -> f64 {
        self.stack.pop().unwrap_or(0.0)
    }

    fn exec(&mut self, ops: &[Op], params: &[f64], depth: usize) -> Result<f64> {
        let floor = self.stack.len();
        let mut pc = 0;
        while pc < ops.len() {
            match &ops[pc] {
                Op::Const(n) => self.stack.push(*n),
                Op::Param(slot) => self.stack.push(params.get(*slot).copied().unwrap_or(0.0)),
                Op::Unary(op) => {
                    let a = self.pop();
                    self.stack.push(match op {
                        UnaryOp::Neg => -a,
                        UnaryOp::Not => {
                            if ftrue(a) {
                                0.0
                            } else {
                                1.0
                            }
                        }
                    });
                }
                Op::Binary(op) => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(op.apply(a, b));
                }
                Op::Builtin { func, argc } => {
                    let args = self.stack.split_off(self.stack.len() - argc);
                    self.stack.push(func.apply(&args));
                }
                Op::Call {
                    function,
                    argc,
                    component,
                } => {
                    let args = self.stack.split_off(self.stack.len() - argc);
                    let results = self.evaluate(function, &args, depth + 1)?;
                    self.stack.push(results.get(*component).copied().unwrap_or(0.0));
                }
                Op::JumpIfFalse(target) => {
                    if !ftrue(self.pop()) {
                        pc = *target;
                        continue;
                    }
                }
                Op::Jump(target) => {
                    pc = *target;
                    continue;
                }
            }
            pc += 1;
        }
        let result = self.pop();
        self.stack.truncate(floor);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ast::{BinOp, Builtin, Expr};
    use crate::express::{Arity, Express};
    use crate::spline::{GenericSpline, SplineHandle, SplineKind};

    fn xyz() -> Vec<String> {
        vec!["x".into(), "y".into(), "z".into()]
    }

    fn bin(left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    #[test]
    fn runs_scalar_function_through_locals() {
        // x*x + y*y + z*z - 1
        let body = bin(
            bin(
                bin(bin(Expr::Param(0), BinOp::Mul, Expr::Param(0)), BinOp::Add, bin(Expr::Param(1), BinOp::Mul, Expr::Param(1))),
                BinOp::Add,
                bin(Expr::Param(2), BinOp::Mul, Expr::Param(2)),
            ),
            BinOp::Sub,
            Expr::Number(1.0),
        );
        let f = FunctionHandle::from_expr(xyz(), &body);
        let mut ctx = FunctionContext::new();
        ctx.set_local(0, 1.0);
        ctx.set_local(1, 2.0);
        ctx.set_local(2, 2.0);
        assert_eq!(ctx.run(&f).expect("run"), 8.0);
    }

    #[test]
    fn ternary_is_lazy_and_correct() {
        let body = Expr::Ternary {
            condition: Box::new(bin(Expr::Param(0), BinOp::Gt, Expr::Number(0.0))),
            if_true: Box::new(Expr::Builtin {
                func: Builtin::Sqrt,
                args: vec![Expr::Param(0)],
            }),
            if_false: Box::new(Expr::Number(-1.0)),
        };
        let f = FunctionHandle::from_expr(vec!["a".into()], &body);
        let mut ctx = FunctionContext::new();
        assert_eq!(ctx.call(&f, &[9.0]).expect("call"), vec![3.0]);
        assert_eq!(ctx.call(&f, &[-4.0]).expect("call"), vec![-1.0]);
    }

    #[test]
    fn vector_results_land_in_low_slots() {
        let mut spline = GenericSpline::new(SplineKind::Linear);
        spline.insert(0.0, &Express::vector(0.0, 0.0, 0.0));
        spline.insert(1.0, &Express::vector(2.0, 4.0, 6.0));
        spline.set_terms(Arity::Vector);
        let f = FunctionHandle::from_spline(SplineHandle::new(spline));

        let mut ctx = FunctionContext::new();
        ctx.set_local(FunctionContext::param_base(&f), 0.5);
        let first = ctx.run(&f).expect("run");
        assert_eq!(first, 1.0);
        assert_eq!(ctx.get_local(1), 2.0);
        assert_eq!(ctx.get_local(2), 3.0);
    }

    #[test]
    fn nested_calls_pick_components() {
        let mut spline = GenericSpline::new(SplineKind::Linear);
        spline.insert(0.0, &Express::uv(0.0, 10.0));
        spline.insert(1.0, &Express::uv(1.0, 20.0));
        let inner = FunctionHandle::from_spline(SplineHandle::new(spline));
        let outer = FunctionHandle::from_expr(
            vec!["t".into()],
            &Expr::Call {
                function: inner,
                args: vec![Expr::Param(0)],
                component: 1,
            },
        );
        let mut ctx = FunctionContext::new();
        assert_eq!(ctx.call(&outer, &[0.5]).expect("call"), vec![15.0]);
    }
}
