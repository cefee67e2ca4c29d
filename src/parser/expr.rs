//! Generic expressions.
//!
//! Every level returns an `Express` whose arity is the number of terms it
//! produced. Binary operators promote the narrower operand to the arity of
//! the wider one before combining them, so `1 + <1, 2, 3>` is `<2, 3, 4>`.
//! `hint` is the arity the caller wants; float-valued primaries are
//! broadcast to it as they are read.

use crate::colour::Colour;
use crate::error::Result;
use crate::express::{ftrue, Arity, Express};
use crate::keywords::Keyword;
use crate::symbols::SymbolKind;
use crate::token::Token;
use crate::vector::VectorExt;

use super::stream::Tok;
use super::Parser;

pub(crate) fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl Parser {
    /// `Logical ["?" Express ":" Express]`, promoted to at least `terms`.
    ///
    /// Both branches of a conditional are always parsed, so side effects in
    /// the branch not taken (such as `rand`) still happen.
    pub fn parse_express(&mut self, terms: Arity) -> Result<Express> {
        let value = self.parse_logical(Arity::Float)?;
        if !self.accept(&Token::Question)? {
            return Ok(value.promote(terms));
        }
        if value.arity() != Arity::Float {
            return Err(self.error("Conditional must evaluate to a float."));
        }
        let if_true = self.parse_express(terms)?;
        self.expect(&Token::Colon)?;
        let if_false = self.parse_express(terms)?;
        Ok(if value.is_true() { if_true } else { if_false })
    }

    fn parse_logical(&mut self, hint: Arity) -> Result<Express> {
        let mut left = self.parse_rel_term(hint)?;
        loop {
            let la = self.get()?;
            let op: fn(f64, f64) -> bool = match la.tok {
                Tok::Raw(Token::Ampersand) => |a, b| ftrue(a) && ftrue(b),
                Tok::Raw(Token::Pipe) => |a, b| ftrue(a) || ftrue(b),
                _ => {
                    self.unget(la);
                    return Ok(left);
                }
            };
            let right = self.parse_rel_term(hint)?;
            left = Express::zip_with(left, right, |a, b| truth(op(a, b)));
        }
    }

    /// Relational level. A string on the left switches to string
    /// comparison; otherwise comparisons are made per component.
    fn parse_rel_term(&mut self, hint: Arity) -> Result<Express> {
        self.checkpoint();
        match self.declaring(true, |p| p.try_parse_string()) {
            Ok(Some(s)) => {
                self.commit();
                return self.parse_string_comparison(&s);
            }
            Ok(None) => self.restore(),
            Err(e) => {
                self.commit();
                return Err(e);
            }
        }

        let mut left = self.parse_rel_factor(hint)?;
        loop {
            let la = self.get()?;
            let op: fn(f64, f64) -> bool = match la.tok {
                Tok::Raw(Token::Less) => |a, b| a < b,
                Tok::Raw(Token::LessEqual) => |a, b| a <= b || !ftrue(a - b),
                Tok::Raw(Token::Equal | Token::EqualEqual) => |a, b| !ftrue(a - b),
                Tok::Raw(Token::NotEqual) => |a, b| ftrue(a - b),
                Tok::Raw(Token::GreaterEqual) => |a, b| a >= b || !ftrue(a - b),
                Tok::Raw(Token::Greater) => |a, b| a > b,
                _ => {
                    self.unget(la);
                    return Ok(left);
                }
            };
            let right = self.parse_rel_factor(hint)?;
            left = Express::zip_with(left, right, |a, b| truth(op(a, b)));
        }
    }

    fn parse_string_comparison(&mut self, left: &str) -> Result<Express> {
        let la = self.get()?;
        let Tok::Raw(op) = &la.tok else {
            return Err(self.unexpected("string comparison operator", &la));
        };
        let op = op.clone();
        let right = self.parse_string()?;
        let ordering = left.cmp(right.as_str());
        let result = match op {
            Token::Less => ordering.is_lt(),
            Token::LessEqual => ordering.is_le(),
            Token::Equal | Token::EqualEqual => ordering.is_eq(),
            Token::NotEqual => ordering.is_ne(),
            Token::GreaterEqual => ordering.is_ge(),
            Token::Greater => ordering.is_gt(),
            _ => return Err(self.unexpected("string comparison operator", &la)),
        };
        Ok(Express::float(truth(result)))
    }

    /// `Term (("+" | "-") Term)*`
    pub(crate) fn parse_rel_factor(&mut self, hint: Arity) -> Result<Express> {
        let mut left = self.parse_term(hint)?;
        loop {
            let la = self.get()?;
            let subtract = match la.tok {
                Tok::Raw(Token::Plus) => false,
                Tok::Raw(Token::Minus) => true,
                _ => {
                    self.unget(la);
                    return Ok(left);
                }
            };
            let right = self.parse_term(hint)?;
            left = if subtract {
                Express::zip_with(left, right, |a, b| a - b)
            } else {
                Express::zip_with(left, right, |a, b| a + b)
            };
        }
    }

    /// `Factor (("*" | "/") Factor)*`. Division by exactly zero yields
    /// infinity and a warning.
    fn parse_term(&mut self, hint: Arity) -> Result<Express> {
        let mut left = self.parse_num_factor(hint)?;
        loop {
            let la = self.get()?;
            match la.tok {
                Tok::Raw(Token::Star) => {
                    let right = self.parse_num_factor(hint)?;
                    left = Express::zip_with(left, right, |a, b| a * b);
                }
                Tok::Raw(Token::Slash) => {
                    let right = self.parse_num_factor(hint)?;
                    let (a, b) = Express::unify(left, right);
                    let mut out = a;
                    for i in 0..out.terms() {
                        if b.get(i) == 0.0 {
                            self.warning("Divide by zero.")?;
                            out.set(i, f64::INFINITY);
                        } else {
                            out.set(i, a.get(i) / b.get(i));
                        }
                    }
                    left = out;
                }
                _ => {
                    self.unget(la);
                    return Ok(left);
                }
            }
        }
    }

    /// Primary followed by an optional `.component`.
    fn parse_num_factor(&mut self, hint: Arity) -> Result<Express> {
        let outer = self.ok_to_declare;
        let value = self.declaring(true, |p| p.parse_primary(hint, outer))?;

        let la = self.get()?;
        if !la.tok.is(&Token::Dot) {
            self.unget(la);
            return Ok(value);
        }

        let key = self.get()?;
        let index = match key.tok.keyword() {
            Some(Keyword::X) => 0,
            Some(Keyword::Y) => 1,
            Some(Keyword::Z) => 2,
            Some(k) if k.is_vector_function() => return Err(self.unexpected("x, y, or z", &key)),
            Some(Keyword::Red) => 0,
            Some(Keyword::Green) => 1,
            Some(Keyword::Blue) => 2,
            Some(Keyword::Filter) => 3,
            Some(Keyword::Transmit) => 4,
            Some(Keyword::Gray) => {
                let grey = Colour::from_express(&value.promote(Arity::Colour)).greyscale();
                return Ok(Express::float(grey));
            }
            Some(k) if k.is_colour_key() => {
                return Err(self.unexpected("red, green, blue, filter, transmit, gray or vector component", &key))
            }
            Some(Keyword::U) => 0,
            Some(Keyword::V) => 1,
            Some(Keyword::T) => 3,
            _ => return Err(self.unexpected("x, y, z, u, v, t or color component", &key)),
        };
        if index >= value.terms() {
            return Err(self.error("Bad operands for period operator."));
        }
        Ok(Express::float(value.get(index)))
    }

    fn parse_primary(&mut self, hint: Arity, outer: bool) -> Result<Express> {
        let la = self.get()?;
        match &la.tok {
            Tok::Raw(Token::Float(v)) => Ok(Express::float(*v).promote(hint)),
            Tok::Raw(Token::Plus) => self.parse_primary(hint, outer),
            Tok::Raw(Token::Minus) => {
                let v = self.declaring(outer, |p| p.parse_num_factor(hint))?;
                Ok(v.map(|x| -x))
            }
            Tok::Raw(Token::Bang) => {
                let v = self.declaring(outer, |p| p.parse_num_factor(hint))?;
                Ok(v.map(|x| truth(!ftrue(x))))
            }
            Tok::Raw(Token::LParen) => {
                let v = self.parse_express(hint)?;
                self.expect(&Token::RParen)?;
                Ok(v)
            }
            Tok::Raw(Token::Less) => self.parse_vector_literal(),
            Tok::Keyword(Keyword::T) => Ok(Express::vector4(0.0, 0.0, 0.0, 1.0)),
            Tok::Keyword(Keyword::U) => Ok(Express::uv(1.0, 0.0)),
            Tok::Keyword(Keyword::V) => Ok(Express::uv(0.0, 1.0)),
            Tok::Keyword(k) if k.is_float_function() => {
                let v = self.float_builtin(*k)?;
                Ok(Express::float(v).promote(hint))
            }
            Tok::Keyword(k) if k.is_vector_function() => Ok(self.vector_builtin(*k)?.to_express()),
            Tok::Ident(entry) => {
                let entry = entry.clone();
                match entry.kind() {
                    SymbolKind::Float => Ok(self.numeric_value(&entry)?.promote(hint)),
                    SymbolKind::Uv | SymbolKind::Vector | SymbolKind::Vector4 | SymbolKind::Colour => {
                        self.numeric_value(&entry)
                    }
                    SymbolKind::Function => {
                        let v = self.parse_function_call(&entry)?;
                        Ok(Express::float(v).promote(hint))
                    }
                    SymbolKind::VectorFunction => self.parse_vector_function_call(&entry),
                    SymbolKind::Spline => self.parse_spline_call(&entry),
                    _ => Err(self.unexpected("numeric expression", &la)),
                }
            }
            _ => Err(self.unexpected("numeric expression", &la)),
        }
    }

    fn numeric_value(&self, entry: &crate::symbols::SymbolEntry) -> Result<Express> {
        entry
            .express()
            .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))
    }

    /// `< a, b [, c [, d [, e]]] >`. Commas are optional.
    fn parse_vector_literal(&mut self) -> Result<Express> {
        let mut values = Vec::with_capacity(5);
        values.push(self.parse_float()?);
        self.parse_comma()?;
        values.push(self.parse_float()?);
        self.parse_comma()?;
        while values.len() < 5 && self.at_expression_start()? {
            values.push(self.parse_float()?);
            self.parse_comma()?;
        }
        self.expect(&Token::Greater)?;
        let arity = Arity::from_terms(values.len()).unwrap_or(Arity::Colour);
        Ok(Express::from_slice(arity, &values))
    }

    /// Whether the next token can begin a numeric expression.
    pub(crate) fn at_expression_start(&mut self) -> Result<bool> {
        let la = self.peek()?;
        Ok(starts_expression(&la.tok))
    }
}

pub(crate) fn starts_expression(tok: &Tok) -> bool {
    match tok {
        Tok::Raw(Token::Float(_) | Token::Plus | Token::Minus | Token::Bang | Token::LParen | Token::Less) => true,
        Tok::Keyword(k) => k.starts_expression(),
        Tok::Ident(entry) => matches!(
            entry.kind(),
            SymbolKind::Float
                | SymbolKind::Uv
                | SymbolKind::Vector
                | SymbolKind::Vector4
                | SymbolKind::Colour
                | SymbolKind::Function
                | SymbolKind::VectorFunction
                | SymbolKind::Spline
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParserOptions;

    fn eval(src: &str) -> Express {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        let v = p.parse_express(Arity::Float).expect("eval");
        p.expect_eof().expect("eof");
        v
    }

    fn eval_err(src: &str) -> String {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p.parse_express(Arity::Float).expect_err("should fail").message()
    }

    #[test]
    fn float_broadcasts_into_vector_sum() {
        assert_eq!(eval("1 + <1, 2, 3>"), Express::vector(2.0, 3.0, 4.0));
        assert_eq!(eval("<1, 2, 3> * 2"), Express::vector(2.0, 4.0, 6.0));
    }

    #[test]
    fn vector_pads_with_zero_into_colour() {
        let v = eval("<1, 2, 3> + <0, 0, 0, 0, 1>");
        assert_eq!(v.values(), &[1.0, 2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(eval("1 + 2 * 3"), Express::float(7.0));
        assert_eq!(eval("(1 + 2) * 3"), Express::float(9.0));
        assert_eq!(eval("10 - 4 - 3"), Express::float(3.0));
    }

    #[test]
    fn relational_is_per_component() {
        assert_eq!(eval("<1, 2> < <2, 1>"), Express::uv(1.0, 0.0));
        assert_eq!(eval("3 = 3"), Express::float(1.0));
        assert_eq!(eval("3 != 3"), Express::float(0.0));
    }

    #[test]
    fn near_equality_satisfies_bounds() {
        assert_eq!(eval("1.00000000001 <= 1.0"), Express::float(1.0));
        assert_eq!(eval("0.99999999999 >= 1.0"), Express::float(1.0));
        assert_eq!(eval("1.00000000001 < 1.0"), Express::float(0.0));
    }

    #[test]
    fn logical_operators() {
        assert_eq!(eval("1 & 0"), Express::float(0.0));
        assert_eq!(eval("1 | 0"), Express::float(1.0));
        assert_eq!(eval("!0"), Express::float(1.0));
        assert_eq!(eval("!-!1"), Express::float(1.0));
    }

    #[test]
    fn ternary_takes_branch_arity() {
        assert_eq!(eval("(1) ? <1, 2, 3> : 5"), Express::vector(1.0, 2.0, 3.0));
        assert_eq!(eval("0 ? 1 : 2"), Express::float(2.0));
    }

    #[test]
    fn ternary_condition_must_be_float() {
        assert_eq!(eval_err("<1, 2> ? 1 : 2"), "Conditional must evaluate to a float.");
    }

    #[test]
    fn divide_by_zero_is_a_warning() {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source("5 / 0").expect("lex");
        let v = p.parse_express(Arity::Float).expect("eval");
        assert_eq!(v.first(), f64::INFINITY);
        assert_eq!(p.warnings(), ["Divide by zero."]);

        let mut p = Parser::new(ParserOptions::default());
        p.push_source("0 / 0").expect("lex");
        assert_eq!(p.parse_express(Arity::Float).expect("eval").first(), f64::INFINITY);
    }

    #[test]
    fn components() {
        assert_eq!(eval("<1, 2, 3>.y"), Express::float(2.0));
        assert_eq!(eval("<1, 2, 3, 4, 5>.transmit"), Express::float(5.0));
        assert_eq!(eval("<1, 2, 3, 4>.t"), Express::float(4.0));
        assert_eq!(eval("<7, 8>.v"), Express::float(8.0));
        assert!((eval("<1, 1, 1>.gray").first() - 1.0).abs() < 1e-10);
        assert_eq!(eval_err("<1, 2>.z"), "Bad operands for period operator.");
    }

    #[test]
    fn constants() {
        assert_eq!(eval("x + y"), Express::vector(1.0, 1.0, 0.0));
        assert_eq!(eval("u"), Express::uv(1.0, 0.0));
        assert_eq!(eval("t"), Express::vector4(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn string_comparison() {
        assert_eq!(eval(r#""abc" < "abd""#), Express::float(1.0));
        assert_eq!(eval(r#""abc" = "abc""#), Express::float(1.0));
        assert_eq!(eval(r#"strlen("abc") + 1"#), Express::float(4.0));
    }

    #[test]
    fn undeclared_identifier() {
        assert_eq!(eval_err("Nope + 1"), "undeclared identifier 'Nope'");
    }

    #[test]
    fn vector_literal_needs_two_terms() {
        assert!(eval_err("<1>").contains("'>'"));
    }
}
