//! Typed entry points: the evaluator with a fixed target arity and a cap
//! on what the expression may produce.

use crate::colour::{srgb_to_working, Colour};
use crate::error::Result;
use crate::express::{Arity, Express, EPSILON};
use crate::keywords::Keyword;
use crate::symbols::SymbolKind;
use crate::token::Token;
use crate::vector::{Vector3, VectorExt};

use super::expr::starts_expression;
use super::stream::Tok;
use super::Parser;

const FILTER_IGNORED: &str = "Expected pure RGB color expression, unexpected filter component will have no effect.";
const TRANSMIT_IGNORED: &str = "Expected pure RGB color expression, unexpected transmit component will have no effect.";
const FT_IGNORED: &str =
    "Expected pure RGB color expression, unexpected filter and transmit components will have no effect.";

/// Arity requested by each colour constructor keyword.
fn constructor_arity(k: Keyword) -> Option<Arity> {
    match k {
        Keyword::Rgb | Keyword::Srgb => Some(Arity::Vector),
        Keyword::Rgbf | Keyword::Rgbt | Keyword::Srgbf | Keyword::Srgbt => Some(Arity::Vector4),
        Keyword::Rgbft | Keyword::Srgbft => Some(Arity::Colour),
        _ => None,
    }
}

impl Parser {
    // ── Scalars ────────────────────────────────────────────────────────

    pub fn parse_float(&mut self) -> Result<f64> {
        let value = self.parse_rel_factor(Arity::Float)?;
        if value.terms() > 1 {
            return Err(self.error("Float expected but vector or color expression found."));
        }
        Ok(value.first())
    }

    /// A float truncated toward zero. A fractional value is a warning.
    pub fn parse_int(&mut self, name: Option<&str>) -> Result<i64> {
        let raw = self.parse_float()?;
        let int = raw.trunc() as i64;
        if (raw - int as f64).abs() >= EPSILON {
            let msg = format!("Expected integer; rounding down fractional value {raw:.6} to {int}.");
            match name {
                Some(name) => self.warning(format!("{name}: {msg}"))?,
                None => self.warning(msg)?,
            }
        }
        Ok(int)
    }

    /// `( float )`
    pub fn parse_float_param(&mut self) -> Result<f64> {
        self.expect(&Token::LParen)?;
        let value = self.parse_express(Arity::Float)?;
        if value.terms() > 1 {
            return Err(self.error("Float expected but vector or color expression found."));
        }
        self.expect(&Token::RParen)?;
        Ok(value.first())
    }

    /// `( float [,] float )`
    pub fn parse_float_param2(&mut self) -> Result<(f64, f64)> {
        self.expect(&Token::LParen)?;
        let a = self.parse_float()?;
        self.parse_comma()?;
        let b = self.parse_float()?;
        self.expect(&Token::RParen)?;
        Ok((a, b))
    }

    /// A float if one follows, otherwise `default`.
    pub fn allow_float(&mut self, default: f64) -> Result<f64> {
        if self.at_expression_start()? {
            self.parse_float()
        } else {
            Ok(default)
        }
    }

    // ── Vectors ────────────────────────────────────────────────────────

    fn parse_capped(&mut self, cap: Arity, msg: &str) -> Result<Express> {
        let value = self.parse_rel_factor(cap)?;
        if value.arity() > cap {
            return Err(self.error(msg));
        }
        Ok(value.promote(cap))
    }

    pub fn parse_vector(&mut self) -> Result<Vector3> {
        let value = self.parse_capped(Arity::Vector, "Vector expected but color expression found.")?;
        Ok(Vector3::from_express(&value))
    }

    pub fn parse_vector4d(&mut self) -> Result<Express> {
        self.parse_capped(Arity::Vector4, "Vector expected but color expression found.")
    }

    pub fn parse_uv_vector(&mut self) -> Result<Express> {
        self.parse_capped(Arity::Uv, "UV_Vector expected but vector or color expression found.")
    }

    /// `( vector )`
    pub fn parse_vector_param(&mut self) -> Result<Vector3> {
        self.expect(&Token::LParen)?;
        let v = self.parse_vector()?;
        self.expect(&Token::RParen)?;
        Ok(v)
    }

    /// `( vector [,] vector )`
    pub fn parse_vector_param2(&mut self) -> Result<(Vector3, Vector3)> {
        self.expect(&Token::LParen)?;
        let a = self.parse_vector()?;
        self.parse_comma()?;
        let b = self.parse_vector()?;
        self.expect(&Token::RParen)?;
        Ok((a, b))
    }

    /// Scale factors. A zero component would collapse the transform, so
    /// it becomes 1 with a warning.
    pub fn parse_scale_vector(&mut self) -> Result<Vector3> {
        let mut v = self.parse_vector()?;
        for (axis, c) in [("X", &mut v.x), ("Y", &mut v.y), ("Z", &mut v.z)] {
            if *c == 0.0 {
                *c = 1.0;
                self.warning(format!("Illegal Value: Scale {axis} by 0.0. Changed to 1.0."))?;
            }
        }
        Ok(v)
    }

    // ── Colours ────────────────────────────────────────────────────────

    /// A colour in any of its forms: channel keywords (`red 1 green 0.5`),
    /// one constructor (`rgb <...>`, `srgbft <...>`), a colour identifier,
    /// or a bare expression promoted to five terms.
    ///
    /// With `expect_ft` false the caller only uses red, green and blue;
    /// nonzero filter or transmit values are kept but warned about.
    pub fn parse_colour(&mut self, expect_ft: bool) -> Result<Colour> {
        let mut colour = Colour::default();
        let mut started = false;
        self.accept_keyword(Keyword::Color)?;

        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(k) if k.is_colour_key() && *k != Keyword::Color => {
                    let k = *k;
                    match constructor_arity(k) {
                        Some(_) if started => {
                            self.unget(la);
                            break;
                        }
                        Some(arity) => self.parse_colour_constructor(k, arity, expect_ft, &mut colour)?,
                        None => self.parse_colour_channel(k, expect_ft, &mut colour)?,
                    }
                    started = true;
                }
                Tok::Ident(entry) if entry.kind() == SymbolKind::Colour => {
                    self.unget(la);
                    if started {
                        break;
                    }
                    let arity = if expect_ft { Arity::Colour } else { Arity::Vector };
                    let value = self.parse_express(arity)?;
                    colour.set_from(&value);
                    if !expect_ft && has_filter_or_transmit(&colour) {
                        self.warning(FT_IGNORED)?;
                    }
                    started = true;
                }
                tok if starts_expression(tok) => {
                    let saw_float = match tok {
                        Tok::Raw(Token::Float(_)) => true,
                        Tok::Keyword(k) => k.is_float_function(),
                        Tok::Ident(e) => matches!(e.kind(), SymbolKind::Float | SymbolKind::Function),
                        _ => false,
                    };
                    self.unget(la);
                    if started {
                        break;
                    }
                    self.parse_colour_expression(expect_ft, saw_float, &mut colour)?;
                    started = true;
                }
                _ => {
                    self.unget(la);
                    break;
                }
            }
        }
        Ok(colour)
    }

    fn parse_colour_channel(&mut self, k: Keyword, expect_ft: bool, colour: &mut Colour) -> Result<()> {
        match k {
            Keyword::Alpha | Keyword::Filter => {
                if k == Keyword::Alpha {
                    self.warning("Keyword ALPHA discontinued. Use FILTER instead.")?;
                }
                colour.filter = self.parse_float()?;
                if !expect_ft && colour.filter != 0.0 {
                    self.warning(FILTER_IGNORED)?;
                }
            }
            Keyword::Transmit => {
                colour.transmit = self.parse_float()?;
                if !expect_ft && colour.transmit != 0.0 {
                    self.warning(TRANSMIT_IGNORED)?;
                }
            }
            Keyword::Red => colour.red = self.parse_float()?,
            Keyword::Green => colour.green = self.parse_float()?,
            Keyword::Blue => colour.blue = self.parse_float()?,
            _ => {}
        }
        Ok(())
    }

    fn parse_colour_constructor(&mut self, k: Keyword, arity: Arity, expect_ft: bool, colour: &mut Colour) -> Result<()> {
        let srgb = matches!(k, Keyword::Srgb | Keyword::Srgbf | Keyword::Srgbt | Keyword::Srgbft);
        let gamma = match (srgb, self.assumed_gamma) {
            (true, None) => return Err(self.error("Cannot parse sRGB colors before assumed_gamma has been set.")),
            (true, Some(g)) => Some(g),
            (false, _) => None,
        };

        let value = self.parse_express(arity)?;
        if value.arity() != arity {
            self.warning(format!("Suspicious expression after {}.", k.as_str()))?;
        }
        colour.set_from(&value);

        if matches!(k, Keyword::Rgbt | Keyword::Srgbt) {
            colour.transmit = colour.filter;
            colour.filter = 0.0;
        }
        if let Some(gamma) = gamma {
            colour.red = srgb_to_working(colour.red, gamma);
            colour.green = srgb_to_working(colour.green, gamma);
            colour.blue = srgb_to_working(colour.blue, gamma);
        }

        if !expect_ft {
            match k {
                Keyword::Rgbf | Keyword::Srgbf if colour.filter != 0.0 => self.warning(FILTER_IGNORED)?,
                Keyword::Rgbt | Keyword::Srgbt if colour.transmit != 0.0 => self.warning(TRANSMIT_IGNORED)?,
                Keyword::Rgbft | Keyword::Srgbft if has_filter_or_transmit(colour) => self.warning(FT_IGNORED)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_colour_expression(&mut self, expect_ft: bool, saw_float: bool, colour: &mut Colour) -> Result<()> {
        let arity = if expect_ft { Arity::Colour } else { Arity::Vector };
        let value = self.parse_express(arity)?;
        let terms = value.terms();
        if expect_ft && terms != 5 {
            return Err(self.error("Color expression expected but float or vector expression found."));
        }
        if !expect_ft && !(3..=5).contains(&terms) {
            return Err(self.error("RGB color expression expected but float or vector expression found."));
        }
        colour.set_from(&value);
        if saw_float && terms == 5 && colour.filter != 0.0 && colour.transmit != 0.0 {
            self.warning("Float value promoted to full color vector where both filter and transmit >0.0.")?;
        }
        if !expect_ft && has_filter_or_transmit(colour) {
            self.warning(FT_IGNORED)?;
        }
        Ok(())
    }
}

/// Any nonzero filter or transmit, compared exactly.
fn has_filter_or_transmit(c: &Colour) -> bool {
    c.filter != 0.0 || c.transmit != 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParserOptions;

    fn parser(src: &str) -> Parser {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p
    }

    fn colour(src: &str) -> (Colour, Vec<String>) {
        let mut p = parser(src);
        let c = p.parse_colour(true).expect("colour");
        p.expect_eof().expect("eof");
        (c, p.take_warnings())
    }

    #[test]
    fn rgb_leaves_filter_and_transmit_zero() {
        let (c, warnings) = colour("rgb <0.2, 0.4, 0.6>");
        assert_eq!(c.channels(), [0.2, 0.4, 0.6, 0.0, 0.0]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn channel_keywords_accumulate() {
        let (c, _) = colour("color red 1 green 0.5");
        assert_eq!(c.channels(), [1.0, 0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rgbt_moves_fourth_term_to_transmit() {
        let (c, _) = colour("rgbt <1, 1, 1, 0.7>");
        assert_eq!(c.filter, 0.0);
        assert_eq!(c.transmit, 0.7);
    }

    #[test]
    fn channel_after_constructor_overrides() {
        let (c, _) = colour("rgb 1 filter 0.25");
        assert_eq!(c.channels(), [1.0, 1.0, 1.0, 0.25, 0.0]);
    }

    #[test]
    fn second_constructor_ends_the_colour() {
        let mut p = parser("rgb 1 rgb 0");
        let c = p.parse_colour(true).expect("first colour");
        assert_eq!(c.red, 1.0);
        assert!(p.get().expect("rgb").tok.is_keyword(Keyword::Rgb));
    }

    #[test]
    fn srgb_needs_assumed_gamma() {
        let mut p = parser("srgb <0.5, 0.5, 0.5>");
        let err = p.parse_colour(true).expect_err("no gamma");
        assert_eq!(err.message(), "Cannot parse sRGB colors before assumed_gamma has been set.");

        let mut p = Parser::new(ParserOptions {
            assumed_gamma: Some(1.0),
            ..ParserOptions::default()
        });
        p.push_source("srgb 1").expect("lex");
        let c = p.parse_colour(true).expect("srgb");
        assert!((c.red - 1.0).abs() < 1e-10);
    }

    #[test]
    fn promoted_float_warns_about_filter_and_transmit() {
        let (c, warnings) = colour("0.5");
        assert_eq!(c.channels(), [0.5; 5]);
        assert_eq!(
            warnings,
            ["Float value promoted to full color vector where both filter and transmit >0.0."]
        );
    }

    #[test]
    fn alpha_is_filter_with_a_warning() {
        let (c, warnings) = colour("color alpha 0.3");
        assert_eq!(c.filter, 0.3);
        assert_eq!(warnings, ["Keyword ALPHA discontinued. Use FILTER instead."]);
    }

    #[test]
    fn rgb_only_entry_point_warns_on_transmit() {
        let mut p = parser("rgbft <1, 1, 1, 0, 0.5>");
        p.parse_colour(false).expect("colour");
        assert_eq!(p.warnings(), [FT_IGNORED]);
    }

    #[test]
    fn suspicious_constructor_arity() {
        let (_, warnings) = colour("rgb <1, 2, 3, 4, 5>");
        assert_eq!(warnings, ["Suspicious expression after rgb."]);
    }

    #[test]
    fn colour_identifier() {
        let mut p = parser("#declare C = rgbf <1, 0, 0, 0.5>; C");
        let c = p.parse_colour(true).expect("colour id");
        assert_eq!(c.channels(), [1.0, 0.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn vector_rejects_extra_terms() {
        let mut p = parser("<1, 2, 3, 4>");
        let err = p.parse_vector().expect_err("4 terms");
        assert_eq!(err.message(), "Vector expected but color expression found.");
    }

    #[test]
    fn vector_promotes_float_and_uv() {
        assert_eq!(parser("2").parse_vector().expect("float"), Vector3::splat(2.0));
        assert_eq!(parser("<1, 2>").parse_vector().expect("uv"), Vector3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn uv_vector_cap() {
        let err = parser("<1, 2, 3>").parse_uv_vector().expect_err("3 terms");
        assert_eq!(err.message(), "UV_Vector expected but vector or color expression found.");
        assert_eq!(parser("1").parse_uv_vector().expect("float"), Express::uv(1.0, 1.0));
    }

    #[test]
    fn float_rejects_vectors() {
        let err = parser("<1, 2>").parse_float().expect_err("uv");
        assert_eq!(err.message(), "Float expected but vector or color expression found.");
    }

    #[test]
    fn int_truncates_with_warning() {
        let mut p = parser("3.5");
        assert_eq!(p.parse_int(Some("octaves")).expect("int"), 3);
        assert_eq!(
            p.warnings(),
            ["octaves: Expected integer; rounding down fractional value 3.500000 to 3."]
        );
        let mut p = parser("-2");
        assert_eq!(p.parse_int(None).expect("int"), -2);
        assert!(p.warnings().is_empty());
    }

    #[test]
    fn scale_zero_becomes_one() {
        let mut p = parser("<2, 0, 3>");
        assert_eq!(p.parse_scale_vector().expect("scale"), Vector3::new(2.0, 1.0, 3.0));
        assert_eq!(p.warnings(), ["Illegal Value: Scale Y by 0.0. Changed to 1.0."]);
    }

    #[test]
    fn params() {
        assert_eq!(parser("(1, 2)").parse_float_param2().expect("param2"), (1.0, 2.0));
        assert_eq!(parser("(4)").parse_float_param().expect("param"), 4.0);
        let (a, b) = parser("(x y)").parse_vector_param2().expect("vectors");
        assert_eq!((a, b), (Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0)));
        assert_eq!(parser("]").allow_float(1.0).expect("default"), 1.0);
    }
}
