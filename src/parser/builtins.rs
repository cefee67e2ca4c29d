//! Float and vector built-in functions.
//!
//! Every arm reads its own parenthesised argument list. Float results are
//! broadcast by the caller to whatever arity the expression needs.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, SceneError};
use crate::express::ftrue;
use crate::function::ast::select;
use crate::keywords::Keyword;
use crate::material::Turbulence;
use crate::pattern::{dturbulence, LatticeNoise};
use crate::resolver;
use crate::symbols::ArrayValue;
use crate::token::Token;
use crate::vector::{Transform, Vector3};

use super::expr::truth;
use super::stream::Tok;
use super::Parser;

/// Days from 1970-01-01 to 2000-01-01, the epoch of `now` and `datetime`.
pub(crate) const Y2K_DAYS: f64 = 10957.0;

const SECONDS_PER_DAY: f64 = 86400.0;

impl Parser {
    pub(crate) fn float_builtin(&mut self, k: Keyword) -> Result<f64> {
        use Keyword::*;
        let value = match k {
            Abs => self.parse_float_param()?.abs(),
            Acos => {
                let v = self.parse_float_param()?;
                self.clamp_unit(v, "Domain error in acos.")?.acos()
            }
            Asin => {
                let v = self.parse_float_param()?;
                self.clamp_unit(v, "Domain error in asin.")?.asin()
            }
            Atan => self.parse_float_param()?.atan(),
            Atan2 => {
                let (a, b) = self.parse_float_param2()?;
                if !ftrue(a) && !ftrue(b) {
                    return Err(self.located(SceneError::domain("Domain error in atan2!")));
                }
                a.atan2(b)
            }
            Acosh => self.parse_float_param()?.acosh(),
            Asinh => self.parse_float_param()?.asinh(),
            Atanh => self.parse_float_param()?.atanh(),
            Cosh => self.parse_float_param()?.cosh(),
            Sinh => self.parse_float_param()?.sinh(),
            Tanh => self.parse_float_param()?.tanh(),
            Ceil => self.parse_float_param()?.ceil(),
            Floor => self.parse_float_param()?.floor(),
            Exp => self.parse_float_param()?.exp(),
            Cos => self.parse_float_param()?.cos(),
            Sin => self.parse_float_param()?.sin(),
            Tan => self.parse_float_param()?.tan(),
            Degrees => self.parse_float_param()?.to_degrees(),
            Radians => self.parse_float_param()?.to_radians(),
            Int => self.parse_float_param()?.trunc(),
            Sqr => {
                let v = self.parse_float_param()?;
                v * v
            }
            Sqrt => {
                let v = self.parse_float_param()?;
                if v < 0.0 {
                    return Err(self.domain(format!("sqrt of negative number {v:.6}")));
                }
                v.sqrt()
            }
            Ln => {
                let v = self.parse_float_param()?;
                if v <= 0.0 {
                    return Err(self.domain(format!("ln of negative number {v:.6}")));
                }
                v.ln()
            }
            Log => {
                let v = self.parse_float_param()?;
                if v <= 0.0 {
                    return Err(self.domain(format!("log of negative number {v:.6}")));
                }
                v.log10()
            }
            Div => {
                let (a, b) = self.parse_float_param2()?;
                (a / b).trunc()
            }
            Mod => {
                let (a, b) = self.parse_float_param2()?;
                a % b
            }
            Pow => {
                let (a, b) = self.parse_float_param2()?;
                if a == 0.0 && b == 0.0 {
                    return Err(self.located(SceneError::domain("Domain error.")));
                }
                a.powf(b)
            }
            BitwiseAnd => self.fold_float_list(|a, b| ((a as i64) & (b as i64)) as f64, true)?,
            BitwiseOr => self.fold_float_list(|a, b| ((a as i64) | (b as i64)) as f64, true)?,
            BitwiseXor => self.fold_float_list(|a, b| ((a as i64) ^ (b as i64)) as f64, true)?,
            Max => self.fold_float_list(f64::max, false)?,
            Min => self.fold_float_list(f64::min, false)?,
            Select => self.parse_select()?,
            Clock => self.options.clock,
            ClockOn => truth(self.options.clock_on),
            Version => self.version,
            Pi => std::f64::consts::PI,
            Tau => std::f64::consts::TAU,
            True | Yes | On => 1.0,
            False | No | Off => 0.0,
            Now => days_since_y2k(SystemTime::now()),
            Defined => truth(self.parse_defined_param()?),
            Seed => {
                let seed = self.parse_float_param()?.trunc() as i64;
                self.random.seed(seed) as f64
            }
            Rand => {
                let handle = self.parse_float_param()?.trunc();
                let next = if handle < 0.0 { None } else { self.random.next(handle as usize) };
                next.ok_or_else(|| self.error("Illegal random number generator."))?
            }
            Dimensions => {
                self.expect(&Token::LParen)?;
                let dims = self.parse_array_ident(|a| a.dimensions())?;
                self.expect(&Token::RParen)?;
                dims as f64
            }
            DimensionSize => {
                self.expect(&Token::LParen)?;
                let sizes = self.parse_array_ident(|a| a.sizes().to_vec())?;
                self.parse_comma()?;
                let n = self.parse_float()?.trunc() as i64 - 1;
                self.expect(&Token::RParen)?;
                usize::try_from(n)
                    .ok()
                    .and_then(|i| sizes.get(i).copied())
                    .map_or(0.0, |size| size as f64)
            }
            Vdot => {
                let (a, b) = self.parse_vector_param2()?;
                a.dot(b)
            }
            Vlength => self.parse_vector_param()?.length(),
            Strcmp => {
                self.expect(&Token::LParen)?;
                let a = self.parse_string()?;
                self.parse_comma()?;
                let b = self.parse_string()?;
                self.expect(&Token::RParen)?;
                match a.cmp(&b) {
                    std::cmp::Ordering::Less => -1.0,
                    std::cmp::Ordering::Equal => 0.0,
                    std::cmp::Ordering::Greater => 1.0,
                }
            }
            Strlen => self.parse_string_param()?.chars().count() as f64,
            Asc => self
                .parse_string_param()?
                .chars()
                .next()
                .map_or(0.0, |c| f64::from(u32::from(c))),
            Val => leading_float(&self.parse_string_param()?),
            FileExists => {
                let name = self.parse_string_param()?;
                truth(resolver::find_file(&name, &self.base_dir, &self.options.lib_dirs).is_some())
            }
            other => return Err(self.error(&format!("'{}' is not a float function.", other.as_str()))),
        };
        Ok(value)
    }

    pub(crate) fn vector_builtin(&mut self, k: Keyword) -> Result<Vector3> {
        let v = match k {
            Keyword::X => Vector3::new(1.0, 0.0, 0.0),
            Keyword::Y => Vector3::new(0.0, 1.0, 0.0),
            Keyword::Z => Vector3::new(0.0, 0.0, 1.0),
            Keyword::Vcross => {
                let (a, b) = self.parse_vector_param2()?;
                a.cross(b)
            }
            Keyword::Vnormalize => {
                let v = self.parse_vector_param()?;
                match v.try_normalize() {
                    Some(n) => n,
                    None => {
                        self.warning("Normalizing zero-length vector.")?;
                        Vector3::ZERO
                    }
                }
            }
            Keyword::Vrotate => {
                let (v, degrees) = self.parse_vector_param2()?;
                Transform::rotation(degrees).transform_point(v)
            }
            Keyword::VaxisRotate => {
                self.expect(&Token::LParen)?;
                let v = self.parse_vector()?;
                self.parse_comma()?;
                let axis = self.parse_vector()?;
                self.parse_comma()?;
                let degrees = self.parse_float()?;
                self.expect(&Token::RParen)?;
                Transform::axis_rotation(axis, degrees).transform_point(v)
            }
            Keyword::Vturbulence => {
                self.expect(&Token::LParen)?;
                let lambda = self.parse_float()?;
                self.parse_comma()?;
                let omega = self.parse_float()?;
                self.parse_comma()?;
                let octaves = self.parse_float()?.trunc().clamp(1.0, 10.0) as u32;
                self.parse_comma()?;
                let point = self.parse_vector()?;
                self.parse_comma()?;
                self.expect(&Token::RParen)?;
                let turb = Turbulence {
                    octaves,
                    omega,
                    lambda,
                    ..Turbulence::default()
                };
                dturbulence(&LatticeNoise, point, &turb)
            }
            Keyword::MinExtent | Keyword::MaxExtent | Keyword::Trace => {
                return Err(self.error("Object geometry is not available to this front end."));
            }
            other => return Err(self.error(&format!("'{}' is not a vector function.", other.as_str()))),
        };
        Ok(v)
    }

    /// `( Identifier )` for `defined`: whether the name, array element or
    /// dictionary member currently has a binding.
    pub(crate) fn parse_defined_param(&mut self) -> Result<bool> {
        self.expect(&Token::LParen)?;
        let la = self.probing(|p| p.declaring(false, |p| p.get()))?;
        let defined = match &la.tok {
            Tok::Undeclared(_) => false,
            Tok::Ident(_) | Tok::Keyword(_) => true,
            _ => return Err(self.unexpected("identifier", &la)),
        };
        self.expect(&Token::RParen)?;
        Ok(defined)
    }

    fn clamp_unit(&mut self, v: f64, msg: &str) -> Result<f64> {
        if !(-1.0..=1.0).contains(&v) {
            self.warning(msg)?;
            return Ok(v.clamp(-1.0, 1.0));
        }
        Ok(v)
    }

    fn domain(&self, msg: String) -> SceneError {
        self.located(SceneError::domain(&msg))
    }

    /// `( f [, f]... )` folded left to right.
    fn fold_float_list(&mut self, f: impl Fn(f64, f64) -> f64, integral: bool) -> Result<f64> {
        self.expect(&Token::LParen)?;
        let mut acc = self.parse_float()?;
        if integral {
            acc = acc.trunc();
        }
        while self.accept(&Token::Comma)? {
            let next = self.parse_float()?;
            acc = f(acc, next);
        }
        self.expect(&Token::RParen)?;
        Ok(acc)
    }

    /// `select(a, less, equal [, greater])`
    fn parse_select(&mut self) -> Result<f64> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::with_capacity(4);
        args.push(self.parse_float()?);
        self.parse_comma()?;
        args.push(self.parse_float()?);
        self.parse_comma()?;
        args.push(self.parse_float()?);
        if self.accept(&Token::Comma)? {
            args.push(self.parse_float()?);
        }
        self.expect(&Token::RParen)?;
        Ok(select(&args))
    }

    fn parse_array_ident<R>(&mut self, f: impl FnOnce(&ArrayValue) -> R) -> Result<R> {
        let la = self.get()?;
        let value = la.tok.entry().and_then(|entry| entry.with(f));
        value.ok_or_else(|| self.unexpected("array identifier", &la))
    }
}

pub(crate) fn days_since_y2k(now: SystemTime) -> f64 {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    secs / SECONDS_PER_DAY - Y2K_DAYS
}

/// The longest prefix of `s` that reads as a float, or 0.
fn leading_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();
    let int_digits = digits(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits(end + 1);
        end += 1 + frac_digits;
    }
    if int_digits + frac_digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}
