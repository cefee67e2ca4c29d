use crate::keywords::Keyword;

use super::FunctionHandle;

/// Body of a user-defined function, before lowering to bytecode.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal or inlined float identifier: `0.5`, `pi`, `Scale`
    Number(f64),
    /// Parameter slot: `x`, `y`, `z` or a named parameter
    Param(usize),
    /// Unary operator: `-x`, `!x`
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Binary operation: `x * x + y * y`
    BinaryOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// Built-in scalar function: `sin(x)`, `select(a, b, c)`
    Builtin { func: Builtin, args: Vec<Expr> },
    /// Call to another declared function, optionally picking one component
    /// of a vector result: `f(x, 0, z)`, `Spl(t).y`
    Call {
        function: FunctionHandle,
        args: Vec<Expr>,
        component: usize,
    },
    /// Lazily evaluated conditional: `x > 0 ? x : -x`
    Ternary {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,        // |
    And,       // &
    Lt,        // <
    Le,        // <=
    Eq,        // =
    Ne,        // !=
    Ge,        // >=
    Gt,        // >
    Add,       // +
    Sub,       // -
    Mul,       // *
    Div,       // /
    Pow,       // ^
}

impl BinOp {
    /// Precedence level (higher binds tighter). `^` sits above unary minus.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Lt | BinOp::Le | BinOp::Eq | BinOp::Ne | BinOp::Ge | BinOp::Gt => 3,
            BinOp::Add | BinOp::Sub => 4,
            BinOp::Mul | BinOp::Div => 5,
            BinOp::Pow => 7,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        self == BinOp::Pow
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        use crate::express::ftrue;
        let truth = |c: bool| if c { 1.0 } else { 0.0 };
        match self {
            BinOp::Or => truth(ftrue(a) || ftrue(b)),
            BinOp::And => truth(ftrue(a) && ftrue(b)),
            BinOp::Lt => truth(a < b),
            BinOp::Le => truth(a <= b),
            BinOp::Eq => truth(!ftrue(a - b)),
            BinOp::Ne => truth(ftrue(a - b)),
            BinOp::Ge => truth(a >= b),
            BinOp::Gt => truth(a > b),
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

/// Scalar built-ins callable from a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atan2,
    Atanh,
    Ceil,
    Cos,
    Cosh,
    Degrees,
    Div,
    Exp,
    Floor,
    Int,
    Ln,
    Log,
    Max,
    Min,
    Mod,
    Pow,
    Radians,
    Select,
    Sin,
    Sinh,
    Sqr,
    Sqrt,
    Tan,
    Tanh,
}

impl Builtin {
    pub fn from_keyword(k: Keyword) -> Option<Builtin> {
        Some(match k {
            Keyword::Abs => Builtin::Abs,
            Keyword::Acos => Builtin::Acos,
            Keyword::Acosh => Builtin::Acosh,
            Keyword::Asin => Builtin::Asin,
            Keyword::Asinh => Builtin::Asinh,
            Keyword::Atan => Builtin::Atan,
            Keyword::Atan2 => Builtin::Atan2,
            Keyword::Atanh => Builtin::Atanh,
            Keyword::Ceil => Builtin::Ceil,
            Keyword::Cos => Builtin::Cos,
            Keyword::Cosh => Builtin::Cosh,
            Keyword::Degrees => Builtin::Degrees,
            Keyword::Div => Builtin::Div,
            Keyword::Exp => Builtin::Exp,
            Keyword::Floor => Builtin::Floor,
            Keyword::Int => Builtin::Int,
            Keyword::Ln => Builtin::Ln,
            Keyword::Log => Builtin::Log,
            Keyword::Max => Builtin::Max,
            Keyword::Min => Builtin::Min,
            Keyword::Mod => Builtin::Mod,
            Keyword::Pow => Builtin::Pow,
            Keyword::Radians => Builtin::Radians,
            Keyword::Select => Builtin::Select,
            Keyword::Sin => Builtin::Sin,
            Keyword::Sinh => Builtin::Sinh,
            Keyword::Sqr => Builtin::Sqr,
            Keyword::Sqrt => Builtin::Sqrt,
            Keyword::Tan => Builtin::Tan,
            Keyword::Tanh => Builtin::Tanh,
            _ => return None,
        })
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Builtin::Atan2 | Builtin::Div | Builtin::Mod | Builtin::Pow => (2, 2),
            Builtin::Max | Builtin::Min => (2, usize::MAX),
            Builtin::Select => (3, 4),
            _ => (1, 1),
        }
    }

    /// Evaluate on already computed arguments. Argument counts have been
    /// checked when the body was parsed.
    pub fn apply(self, args: &[f64]) -> f64 {
        let a = args.first().copied().unwrap_or(0.0);
        let b = args.get(1).copied().unwrap_or(0.0);
        match self {
            Builtin::Abs => a.abs(),
            Builtin::Acos => a.acos(),
            Builtin::Acosh => a.acosh(),
            Builtin::Asin => a.asin(),
            Builtin::Asinh => a.asinh(),
            Builtin::Atan => a.atan(),
            Builtin::Atan2 => a.atan2(b),
            Builtin::Atanh => a.atanh(),
            Builtin::Ceil => a.ceil(),
            Builtin::Cos => a.cos(),
            Builtin::Cosh => a.cosh(),
            Builtin::Degrees => a.to_degrees(),
            Builtin::Div => (a / b).trunc(),
            Builtin::Exp => a.exp(),
            Builtin::Floor => a.floor(),
            Builtin::Int => a.trunc(),
            Builtin::Ln => a.ln(),
            Builtin::Log => a.log10(),
            Builtin::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Builtin::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Builtin::Mod => a % b,
            Builtin::Pow => a.powf(b),
            Builtin::Radians => a.to_radians(),
            Builtin::Select => select(args),
            Builtin::Sin => a.sin(),
            Builtin::Sinh => a.sinh(),
            Builtin::Sqr => a * a,
            Builtin::Sqrt => a.sqrt(),
            Builtin::Tan => a.tan(),
            Builtin::Tanh => a.tanh(),
        }
    }
}

/// `select(a, neg, pos)` or `select(a, neg, zero, pos)`.
pub fn select(args: &[f64]) -> f64 {
    let a = args.first().copied().unwrap_or(0.0);
    match args {
        [_, neg, zero, pos] => {
            if a < 0.0 {
                *neg
            } else if a == 0.0 {
                *zero
            } else {
                *pos
            }
        }
        [_, neg, pos] => {
            if a < 0.0 {
                *neg
            } else {
                *pos
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_binds_tightest_and_right() {
        assert!(BinOp::Pow.precedence() > BinOp::Mul.precedence());
        assert!(BinOp::Pow.is_right_assoc());
        assert!(!BinOp::Sub.is_right_assoc());
    }

    #[test]
    fn select_forms() {
        assert_eq!(select(&[-1.0, 10.0, 20.0]), 10.0);
        assert_eq!(select(&[0.0, 10.0, 20.0]), 20.0);
        assert_eq!(select(&[0.0, 10.0, 15.0, 20.0]), 15.0);
        assert_eq!(select(&[2.0, 10.0, 15.0, 20.0]), 20.0);
    }

    #[test]
    fn builtins_from_keywords() {
        assert_eq!(Builtin::from_keyword(Keyword::Sqrt), Some(Builtin::Sqrt));
        assert_eq!(Builtin::from_keyword(Keyword::Pigment), None);
        assert_eq!(Builtin::Max.apply(&[1.0, 4.0, 2.0]), 4.0);
        assert_eq!(Builtin::Div.apply(&[7.0, 2.0]), 3.0);
    }
}
