//! Lowering of function bodies to stack bytecode.

use super::ast::{BinOp, Builtin, Expr, UnaryOp};
use super::FunctionHandle;

#[derive(Debug, Clone)]
pub enum Op {
    Const(f64),
    Param(usize),
    Unary(UnaryOp),
    Binary(BinOp),
    Builtin { func: Builtin, argc: usize },
    Call {
        function: FunctionHandle,
        argc: usize,
        component: usize,
    },
    /// Pop; jump to the target when the value is false.
    JumpIfFalse(usize),
    Jump(usize),
}

/// Compile an expression tree. Constant sub-trees are folded.
pub fn compile(expr: &Expr) -> Vec<Op> {
    let mut code = Vec::new();
    emit(&fold(expr), &mut code);
    code
}

fn emit(expr: &Expr, code: &mut Vec<Op>) {
    match expr {
        Expr::Number(n) => code.push(Op::Const(*n)),
        Expr::Param(slot) => code.push(Op::Param(*slot)),
        Expr::Unary { op, operand } => {
            emit(operand, code);
            code.push(Op::Unary(*op));
        }
        Expr::BinaryOp { left, op, right } => {
            emit(left, code);
            emit(right, code);
            code.push(Op::Binary(*op));
        }
        Expr::Builtin { func, args } => {
            for arg in args {
                emit(arg, code);
            }
            code.push(Op::Builtin {
                func: *func,
                argc: args.len(),
            });
        }
        Expr::Call {
            function,
            args,
            component,
        } => {
            for arg in args {
                emit(arg, code);
            }
            code.push(Op::Call {
                function: function.clone(),
                argc: args.len(),
                component: *component,
            });
        }
        Expr::Ternary {
            condition,
            if_true,
            if_false,
        } => {
            emit(condition, code);
            let branch = code.len();
            code.push(Op::JumpIfFalse(0));
            emit(if_true, code);
            let skip = code.len();
            code.push(Op::Jump(0));
            let else_start = code.len();
            emit(if_false, code);
            let end = code.len();
            code[branch] = Op::JumpIfFalse(else_start);
            code[skip] = Op::Jump(end);
        }
    }
}

fn number(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number(n) => Some(*n),
        _ => None,
    }
}

fn fold(expr: &Expr) -> Expr {
    match expr {
        Expr::Unary { op, operand } => {
            let operand = fold(operand);
            match (op, number(&operand)) {
                (UnaryOp::Neg, Some(n)) => Expr::Number(-n),
                (UnaryOp::Not, Some(n)) => Expr::Number(if crate::express::ftrue(n) { 0.0 } else { 1.0 }),
                _ => Expr::Unary {
                    op: *op,
                    operand: Box::new(operand),
                },
            }
        }
        Expr::BinaryOp { left, op, right } => {
            let (left, right) = (fold(left), fold(right));
            match (number(&left), number(&right)) {
                (Some(a), Some(b)) => Expr::Number(op.apply(a, b)),
                _ => Expr::BinaryOp {
                    left: Box::new(left),
                    op: *op,
                    right: Box::new(right),
                },
            }
        }
        Expr::Builtin { func, args } => {
            let args: Vec<Expr> = args.iter().map(fold).collect();
            let values: Option<Vec<f64>> = args.iter().map(number).collect();
            match values {
                Some(values) => Expr::Number(func.apply(&values)),
                None => Expr::Builtin { func: *func, args },
            }
        }
        Expr::Call {
            function,
            args,
            component,
        } => Expr::Call {
            function: function.clone(),
            args: args.iter().map(fold).collect(),
            component: *component,
        },
        Expr::Ternary {
            condition,
            if_true,
            if_false,
        } => {
            let condition = fold(condition);
            match number(&condition) {
                Some(c) if crate::express::ftrue(c) => fold(if_true),
                Some(_) => fold(if_false),
                None => Expr::Ternary {
                    condition: Box::new(condition),
                    if_true: Box::new(fold(if_true)),
                    if_false: Box::new(fold(if_false)),
                },
            }
        }
        Expr::Number(_) | Expr::Param(_) => expr.clone(),
    }
}
