//! `spline { ... }` blocks.

use crate::error::Result;
use crate::express::Arity;
use crate::keywords::Keyword;
use crate::spline::{GenericSpline, SplineHandle, SplineKind};
use crate::symbols::SymbolKind;
use crate::token::Token;

use super::stream::Tok;
use super::Parser;

pub(crate) fn spline_kind(k: Keyword) -> Option<SplineKind> {
    match k {
        Keyword::LinearSpline => Some(SplineKind::Linear),
        Keyword::QuadraticSpline => Some(SplineKind::Quadratic),
        Keyword::CubicSpline => Some(SplineKind::CatmullRom),
        Keyword::NaturalSpline => Some(SplineKind::Natural),
        _ => None,
    }
}

impl Parser {
    /// `{ [SplineId] [kind] t [,] value [,] ... }`. A kind keyword may
    /// appear between any two knots and applies to the whole spline.
    pub(crate) fn parse_spline(&mut self) -> Result<GenericSpline> {
        self.expect(&Token::LBrace)?;

        let mut spline = GenericSpline::new(SplineKind::Linear);
        let mut terms = Arity::Uv;
        let la = self.get()?;
        match &la.tok {
            Tok::Ident(entry) if entry.kind() == SymbolKind::Spline => {
                spline = entry
                    .with(|s: &SplineHandle| s.spline().clone())
                    .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))?;
                terms = spline.terms();
            }
            _ => self.unget(la),
        }

        loop {
            let la = self.get()?;
            if let Some(kind) = la.tok.keyword().and_then(spline_kind) {
                spline.set_kind(kind);
                continue;
            }
            if la.tok.is(&Token::RBrace) {
                break;
            }
            self.unget(la);

            let par = self.parse_float()?;
            self.parse_comma()?;
            let value = self.parse_express(Arity::Uv)?;
            if value.arity() > terms {
                terms = value.arity();
            }
            spline.insert(par, &value);
            self.parse_comma()?;
        }

        if spline.is_empty() {
            return Err(self.error("Spline must have at least one entry."));
        }
        spline.set_terms(terms);
        log::debug!("spline: {} knots, {} ({} terms)", spline.len(), spline.kind().keyword(), terms.terms());
        Ok(spline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::express::Express;
    use crate::options::ParserOptions;

    fn spline(src: &str) -> GenericSpline {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p.parse_spline().expect("spline")
    }

    #[test]
    fn knots_are_sorted_and_terms_widen() {
        let s = spline("{ 1, <1, 1> 0, <0, 0, 5> }");
        assert_eq!(s.len(), 2);
        assert_eq!(s.entries()[0].par, 0.0);
        assert_eq!(s.terms(), Arity::Vector);
        assert_eq!(s.get(1.0), Express::vector(1.0, 1.0, 0.0));
    }

    #[test]
    fn kind_keyword_anywhere() {
        let s = spline("{ 0, <0, 0> natural_spline 1, <1, 1> 2, <0, 0> }");
        assert_eq!(s.kind(), SplineKind::Natural);
    }

    #[test]
    fn copies_an_existing_spline() {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source("#declare S = spline { cubic_spline 0, <0, 0> 1, <1, 1> } { S 2, <2, 2> }")
            .expect("lex");
        let s = p.parse_spline().expect("spline");
        assert_eq!(s.len(), 3);
        assert_eq!(s.kind(), SplineKind::CatmullRom);
    }

    #[test]
    fn empty_spline_is_an_error() {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source("{ linear_spline }").expect("lex");
        let err = p.parse_spline().expect_err("empty");
        assert_eq!(err.message(), "Spline must have at least one entry.");
    }
}
