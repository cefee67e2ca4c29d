//! User-defined functions: `function { ... }` bodies compiled to stack
//! bytecode, plus spline- and pigment-backed vector functions.

pub mod ast;
pub mod compile;
pub mod vm;

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::error::{Result, SceneError};
use crate::material::Pigment;
use crate::spline::SplineHandle;
use crate::symbols::{Declarable, SymbolKind};

pub use self::compile::Op;
pub use self::vm::FunctionContext;

/// Largest number of live handles to one function.
pub const MAX_FUNCTION_REFERENCES: usize = u16::MAX as usize;

#[derive(Debug)]
pub enum FunctionBody {
    Code(Vec<Op>),
    Spline(SplineHandle),
    Pigment(Box<Pigment>),
}

#[derive(Debug)]
pub struct FunctionCode {
    pub params: Vec<String>,
    /// Number of result values; 1 for scalar functions.
    pub return_size: usize,
    pub body: FunctionBody,
}

/// Shared handle to an immutable compiled function.
#[derive(Clone)]
pub struct FunctionHandle(Rc<FunctionCode>);

impl FunctionHandle {
    pub fn new(code: FunctionCode) -> Self {
        Self(Rc::new(code))
    }

    pub fn from_expr(params: Vec<String>, body: &ast::Expr) -> Self {
        Self::new(FunctionCode {
            params,
            return_size: 1,
            body: FunctionBody::Code(compile::compile(body)),
        })
    }

    /// `function { spline {...} }`: parameter `t`, one result per knot term.
    pub fn from_spline(spline: SplineHandle) -> Self {
        let return_size = spline.spline().terms().terms();
        Self::new(FunctionCode {
            params: vec!["t".to_string()],
            return_size,
            body: FunctionBody::Spline(spline),
        })
    }

    /// `function { pigment {...} }`: parameters `x, y, z`, five results.
    pub fn from_pigment(pigment: Pigment) -> Self {
        Self::new(FunctionCode {
            params: ["x", "y", "z"].iter().map(|s| s.to_string()).collect(),
            return_size: 5,
            body: FunctionBody::Pigment(Box::new(pigment)),
        })
    }

    pub fn code(&self) -> &FunctionCode {
        &self.0
    }

    pub fn params(&self) -> &[String] {
        &self.0.params
    }

    pub fn param_count(&self) -> usize {
        self.0.params.len()
    }

    pub fn return_size(&self) -> usize {
        self.0.return_size
    }

    pub fn is_vector(&self) -> bool {
        !matches!(self.0.body, FunctionBody::Code(_))
    }

    /// Another handle to the same function, held for the duration of a call.
    pub fn acquire(&self) -> Result<FunctionHandle> {
        if Rc::strong_count(&self.0) >= MAX_FUNCTION_REFERENCES {
            return Err(SceneError::internal("Too many unresolved references to function"));
        }
        Ok(self.clone())
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &FunctionHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FunctionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function({}) -> {}", self.0.params.join(", "), self.0.return_size)
    }
}

impl Serialize for FunctionHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let body = match &self.0.body {
            FunctionBody::Code(ops) => format!("code ({} ops)", ops.len()),
            FunctionBody::Spline(s) => format!("spline ({})", s.spline().kind().keyword()),
            FunctionBody::Pigment(_) => "pigment".to_string(),
        };
        let mut s = serializer.serialize_struct("Function", 3)?;
        s.serialize_field("params", &self.0.params)?;
        s.serialize_field("return_size", &self.0.return_size)?;
        s.serialize_field("body", &body)?;
        s.end()
    }
}

impl Declarable for FunctionHandle {
    fn kind(&self) -> SymbolKind {
        if self.is_vector() {
            SymbolKind::VectorFunction
        } else {
            SymbolKind::Function
        }
    }

    /// Compiled functions are immutable and shared.
    fn duplicate(&self) -> Option<Box<dyn Declarable>> {
        Some(Box::new(self.clone()))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
