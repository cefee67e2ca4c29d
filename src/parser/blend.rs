//! Blend map blocks and unbracketed blend lists.
//!
//! One generic parser handles `pigment_map`, `normal_map`, `slope_map` and
//! `texture_map`; each payload type says how to read its own entries.
//! `color_map` has its own loop because it still accepts the two-colour
//! entries of very old scene files.

use crate::blend_map::{dedup_colour_entries, BlendData, BlendMap, BlendMapKind, BlendMapPtr};
use crate::colour::Colour;
use crate::error::Result;
use crate::express::{Arity, Express};
use crate::keywords::Keyword;
use crate::material::{Pigment, TNormal, Texture};
use crate::symbols::SymbolKind;
use crate::token::Token;

use super::expr::starts_expression;
use super::stream::Tok;
use super::Parser;

/// A blend map payload the parser knows how to read.
pub(crate) trait MapPayload: BlendData + Sized {
    /// The payload of a bracketed `[value, payload]` entry.
    fn parse_entry(p: &mut Parser) -> Result<Self>;

    /// The next item of an unbracketed list, if one starts here.
    fn parse_list_item(p: &mut Parser) -> Result<Option<Self>>;

    /// Filler for list slots the scene did not supply.
    fn list_default(index: usize, defaults: &BlendMap<Colour>) -> Self;
}

fn starts_colour(tok: &Tok) -> bool {
    match tok {
        Tok::Keyword(k) if k.is_colour_key() => true,
        Tok::Ident(entry) => entry.kind() == SymbolKind::Colour,
        _ => false,
    }
}

/// Tokens that open a float-first colour map entry: the legacy two-colour
/// form or a five-term expression. Vectors and colour identifiers do not.
fn starts_float(tok: &Tok) -> bool {
    match tok {
        Tok::Raw(Token::Float(_) | Token::Plus | Token::Minus | Token::Bang | Token::LParen) => true,
        Tok::Keyword(k) => k.is_float_function(),
        Tok::Ident(entry) => matches!(entry.kind(), SymbolKind::Float | SymbolKind::Function),
        _ => false,
    }
}

impl MapPayload for Colour {
    fn parse_entry(p: &mut Parser) -> Result<Self> {
        p.parse_colour(true)
    }

    fn parse_list_item(p: &mut Parser) -> Result<Option<Self>> {
        let la = p.peek()?;
        if !starts_colour(&la.tok) && !starts_expression(&la.tok) {
            return Ok(None);
        }
        let colour = p.parse_colour(true)?;
        p.parse_comma()?;
        Ok(Some(colour))
    }

    fn list_default(index: usize, defaults: &BlendMap<Colour>) -> Self {
        defaults.entries().get(index).map_or(Colour::BLACK, |e| e.data)
    }
}

impl MapPayload for Pigment {
    fn parse_entry(p: &mut Parser) -> Result<Self> {
        p.parse_pigment_body()
    }

    fn parse_list_item(p: &mut Parser) -> Result<Option<Self>> {
        if !p.accept_keyword(Keyword::Pigment)? {
            return Ok(None);
        }
        let pigment = p.parse_pigment()?;
        p.parse_comma()?;
        Ok(Some(pigment))
    }

    fn list_default(_: usize, _: &BlendMap<Colour>) -> Self {
        Pigment::default()
    }
}

impl MapPayload for TNormal {
    fn parse_entry(p: &mut Parser) -> Result<Self> {
        p.parse_normal_body()
    }

    fn parse_list_item(p: &mut Parser) -> Result<Option<Self>> {
        if !p.accept_keyword(Keyword::Normal)? {
            return Ok(None);
        }
        let normal = p.parse_normal()?;
        p.parse_comma()?;
        Ok(Some(normal))
    }

    fn list_default(_: usize, _: &BlendMap<Colour>) -> Self {
        TNormal::default()
    }
}

/// Slope entries are `<height, slope>`.
impl MapPayload for Express {
    fn parse_entry(p: &mut Parser) -> Result<Self> {
        p.parse_uv_vector()
    }

    fn parse_list_item(p: &mut Parser) -> Result<Option<Self>> {
        Err(p.error("Type not implemented yet."))
    }

    fn list_default(_: usize, _: &BlendMap<Colour>) -> Self {
        Express::zero(Arity::Uv)
    }
}

impl MapPayload for Texture {
    fn parse_entry(p: &mut Parser) -> Result<Self> {
        p.parse_texture_body()
    }

    fn parse_list_item(p: &mut Parser) -> Result<Option<Self>> {
        if !p.accept_keyword(Keyword::Texture)? {
            return Ok(None);
        }
        let texture = p.parse_texture()?;
        p.parse_comma()?;
        Ok(Some(texture))
    }

    fn list_default(_: usize, _: &BlendMap<Colour>) -> Self {
        Texture::default()
    }
}

fn is_map_kind(kind: SymbolKind) -> bool {
    matches!(
        kind,
        SymbolKind::ColourMap
            | SymbolKind::PigmentMap
            | SymbolKind::NormalMap
            | SymbolKind::SlopeMap
            | SymbolKind::TextureMap
    )
}

impl Parser {
    /// `{ MapId }` shares an existing map instead of parsing a new one.
    fn shared_map<T: BlendData>(&mut self) -> Result<Option<BlendMapPtr<T>>> {
        let la = self.get()?;
        let entry = match &la.tok {
            Tok::Ident(entry) if is_map_kind(entry.kind()) => entry.clone(),
            _ => {
                self.unget(la);
                return Ok(None);
            }
        };
        if entry.kind() != T::SYMBOL_KIND {
            return Err(self.error("Wrong identifier type"));
        }
        let map = entry
            .with(|m: &BlendMapPtr<T>| m.clone())
            .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))?;
        self.expect(&Token::RBrace)?;
        Ok(Some(map))
    }

    fn parse_map_setting<T: BlendData>(&mut self, k: Keyword, map: &mut BlendMap<T>) -> Result<()> {
        match k {
            Keyword::BlendMode => {
                let mode = self.parse_float()?;
                if !(0.0..=3.0).contains(&mode) {
                    return Err(self.error("blend_mode must be in the range 0 to 3"));
                }
                map.blend_mode = mode as u8;
            }
            _ => {
                if self.assumed_gamma.is_none() {
                    return Err(self.error("blend_gamma requires that assumed_gamma has been set."));
                }
                map.blend_gamma = self.parse_float()?;
            }
        }
        Ok(())
    }

    /// `{ [value, payload] ... }` or `{ MapId }`, after the map keyword.
    /// Entries of an `average` map may leave out their value.
    pub(crate) fn parse_blend_map<T: MapPayload>(&mut self, average: bool) -> Result<BlendMapPtr<T>> {
        self.expect(&Token::LBrace)?;
        if let Some(map) = self.shared_map::<T>()? {
            return Ok(map);
        }

        let settings = matches!(T::KIND, BlendMapKind::Colour | BlendMapKind::Pigment);
        let mut map = BlendMap::<T>::new();
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(k @ (Keyword::BlendMode | Keyword::BlendGamma)) if settings => {
                    self.parse_map_setting(*k, &mut map)?;
                }
                Tok::Raw(Token::LBracket) => {
                    let value = if average {
                        self.allow_float(1.0)?
                    } else {
                        self.parse_float()?
                    };
                    self.parse_comma()?;
                    let data = T::parse_entry(self)?;
                    self.expect(&Token::RBracket)?;
                    map.push(value, data);
                }
                Tok::Raw(Token::RBrace) => break,
                _ => return Err(self.unexpected("[ or }", &la)),
            }
        }

        if map.is_empty() {
            return Err(self.error("Must have at least one entry in map."));
        }
        log::trace!("{} with {} entries", T::KIND.name(), map.len());
        Ok(map.finish())
    }

    /// `color_map { ... }`. Besides `[value colour]`, an entry may hold two
    /// positions and two colours, `[v1 v2 color c1 color c2]`, which adds
    /// two entries. Adjacent identical entries are dropped afterwards.
    pub(crate) fn parse_colour_map(&mut self) -> Result<BlendMapPtr<Colour>> {
        self.expect(&Token::LBrace)?;
        if let Some(map) = self.shared_map::<Colour>()? {
            return Ok(map);
        }

        let mut map = BlendMap::<Colour>::new();
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(k @ (Keyword::BlendMode | Keyword::BlendGamma)) => {
                    self.parse_map_setting(*k, &mut map)?;
                }
                Tok::Raw(Token::LBracket) => {
                    self.parse_colour_map_entry(&mut map)?;
                    self.expect(&Token::RBracket)?;
                }
                Tok::Raw(Token::RBrace) => break,
                _ => return Err(self.unexpected("[ or }", &la)),
            }
        }

        if map.is_empty() {
            return Err(self.error("Must have at least one color in color map."));
        }
        let before = map.len();
        dedup_colour_entries(map.entries_mut());
        if map.len() != before {
            log::trace!("color_map: dropped {} repeated entries", before - map.len());
        }
        Ok(map.finish())
    }

    fn parse_colour_map_entry(&mut self, map: &mut BlendMap<Colour>) -> Result<()> {
        let value = self.parse_float()?;
        self.parse_comma()?;

        let la = self.peek()?;
        if starts_float(&la.tok) {
            let e = self.parse_express(Arity::Float)?;
            match e.terms() {
                1 => {
                    let value2 = e.first();
                    let first = self.parse_colour(true)?;
                    self.expect_keyword(Keyword::Color)?;
                    let second = self.parse_colour(true)?;
                    map.push(value, first);
                    map.push(value2, second);
                }
                5 => map.push(value, Colour::from_express(&e)),
                _ => return Err(self.error("Illegal expression syntax in color_map.")),
            }
        } else if starts_colour(&la.tok) {
            let colour = self.parse_colour(true)?;
            map.push(value, colour);
        } else {
            let la = self.get()?;
            return Err(self.unexpected("color", &la));
        }
        Ok(())
    }

    /// Up to `count` unbracketed items at values `0, 1, ...`. Missing
    /// items are filled from `defaults`. A normal list with no items at
    /// all yields no map.
    pub(crate) fn parse_blend_list<T: MapPayload>(
        &mut self,
        count: usize,
        defaults: &BlendMap<Colour>,
    ) -> Result<Option<BlendMapPtr<T>>> {
        let mut map = BlendMap::<T>::new();
        while map.len() < count {
            match T::parse_list_item(self)? {
                Some(item) => map.push(map.len() as f64, item),
                None => break,
            }
        }
        if map.is_empty() && T::KIND == BlendMapKind::Normal {
            return Ok(None);
        }
        for i in map.len()..count {
            map.push(i as f64, T::list_default(i, defaults));
        }
        Ok(Some(map.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend_map::{default_map, DefaultMap};
    use crate::options::ParserOptions;

    fn parser(src: &str) -> Parser {
        let mut p = Parser::new(ParserOptions::default());
        p.push_source(src).expect("lex");
        p
    }

    fn colour_map(src: &str) -> BlendMapPtr<Colour> {
        parser(src).parse_colour_map().expect("color_map")
    }

    #[test]
    fn bracketed_colour_entries() {
        let map = colour_map("{ [0 color rgb <1, 0, 0>] [0.5, rgbt <0, 1, 0, 0.5>] [1 (<0, 0, 1, 0, 0>)] }");
        assert_eq!(map.len(), 3);
        assert_eq!(map.entries()[1].data.transmit, 0.5);
        assert_eq!(map.entries()[2].data, Colour::rgb(0.0, 0.0, 1.0));
        assert_eq!(map.users(), 1);
    }

    #[test]
    fn two_colour_entries() {
        let map = colour_map("{ [0.0 0.5 color rgb 1 color rgb 0] }");
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries()[0].value, 0.0);
        assert_eq!(map.entries()[0].data, Colour::WHITE);
        assert_eq!(map.entries()[1].value, 0.5);
        assert_eq!(map.entries()[1].data, Colour::BLACK);
    }

    #[test]
    fn repeated_entries_collapse() {
        let entry = "[0.5 color rgb <1, 0, 0>]";
        let map = colour_map(&format!("{{ {entry} {entry} {entry} {entry} [0.5 color rgb <0, 0, 1>] }}"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries()[0].data.red, 1.0);
        assert_eq!(map.entries()[1].data.blue, 1.0);
    }

    #[test]
    fn three_term_entry_is_rejected() {
        let err = parser("{ [0 (<1, 0, 0>)] }").parse_colour_map().expect_err("vector");
        assert_eq!(err.message(), "Illegal expression syntax in color_map.");
    }

    #[test]
    fn vectors_are_not_colours() {
        let err = parser("{ [0 <1, 0, 0, 0, 0>] }").parse_colour_map().expect_err("literal");
        assert!(matches!(err.kind, crate::error::ErrorKind::UnexpectedToken { ref expected, .. } if expected == "color"));

        let mut p = parser("#declare V = <1, 0, 0>; { [0 V] }");
        let err = p.parse_colour_map().expect_err("vector identifier");
        assert!(matches!(err.kind, crate::error::ErrorKind::UnexpectedToken { ref expected, .. } if expected == "color"));
    }

    #[test]
    fn colour_identifiers_take_channel_modifiers() {
        let mut p = parser("#declare R = rgb <1, 0, 0>; { [0 R filter 0.5] [1 R] }");
        let map = p.parse_colour_map().expect("colour identifier entries");
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries()[0].data.red, 1.0);
        assert_eq!(map.entries()[0].data.filter, 0.5);
        assert_eq!(map.entries()[1].data.filter, 0.0);
    }

    #[test]
    fn float_identifiers_open_two_colour_entries() {
        let mut p = parser("#declare Edge = 0.5; { [0 Edge color rgb 1 color rgb 0] }");
        let map = p.parse_colour_map().expect("two-colour entry");
        assert_eq!(map.entries()[1].value, 0.5);
        assert_eq!(map.entries()[1].data, Colour::BLACK);
    }

    #[test]
    fn empty_maps() {
        let err = parser("{ }").parse_colour_map().expect_err("empty");
        assert_eq!(err.message(), "Must have at least one color in color map.");
        let err = parser("{ }").parse_blend_map::<Pigment>(false).expect_err("empty");
        assert_eq!(err.message(), "Must have at least one entry in map.");
    }

    #[test]
    fn identifiers_are_shared_not_copied() {
        let mut p = parser("#declare M = color_map { [0 rgb 0] [1 rgb 1] } { M }");
        let map = p.parse_colour_map().expect("shared");
        let declared = p.symbols().find("M").expect("M");
        let same = declared
            .with(|m: &BlendMapPtr<Colour>| m.ptr_eq(&map))
            .expect("colour map");
        assert!(same);
        assert_eq!(map.users(), 2);
    }

    #[test]
    fn wrong_map_kind() {
        let mut p = parser("#declare M = color_map { [0 rgb 0] } { M }");
        let err = p.parse_blend_map::<Pigment>(false).expect_err("kind");
        assert_eq!(err.message(), "Wrong identifier type");
    }

    #[test]
    fn blend_settings() {
        let map = colour_map("{ blend_mode 2 [0 rgb 0] }");
        assert_eq!(map.blend_mode, 2);

        let err = parser("{ blend_mode 4 [0 rgb 0] }").parse_colour_map().expect_err("range");
        assert_eq!(err.message(), "blend_mode must be in the range 0 to 3");

        let err = parser("{ blend_gamma 2 [0 rgb 0] }").parse_colour_map().expect_err("gamma");
        assert_eq!(err.message(), "blend_gamma requires that assumed_gamma has been set.");

        let mut p = parser("global_settings { assumed_gamma 1 }");
        p.parse_items().expect("settings");
        p.push_source("{ blend_gamma 2.2 [0 rgb 0] }").expect("lex");
        assert_eq!(p.parse_colour_map().expect("gamma").blend_gamma, 2.2);
    }

    #[test]
    fn pigment_map_entries() {
        let map = parser("{ [0 color rgb 1] [1 checker color rgb 0 color rgb 1] }")
            .parse_blend_map::<Pigment>(false)
            .expect("pigment_map");
        assert_eq!(map.len(), 2);
        assert_eq!(map.entries()[0].data.colour, Colour::WHITE);
        assert!(map.entries()[1].data.map.is_some());
    }

    #[test]
    fn average_entries_default_to_weight_one() {
        let map = parser("{ [color rgb 1] [3, color rgb 0] }")
            .parse_blend_map::<Pigment>(true)
            .expect("average map");
        assert_eq!(map.entries()[0].value, 1.0);
        assert_eq!(map.entries()[1].value, 3.0);
    }

    #[test]
    fn slope_map_entries() {
        let map = parser("{ [0 <0, 1>] [1 <1, 0>] }")
            .parse_blend_map::<Express>(false)
            .expect("slope_map");
        assert_eq!(map.entries()[0].data, Express::uv(0.0, 1.0));
    }

    #[test]
    fn colour_list_fills_from_defaults() {
        let defaults = default_map(DefaultMap::Hex);
        let map = parser("rgb 1")
            .parse_blend_list::<Colour>(3, &defaults)
            .expect("list")
            .expect("map");
        assert_eq!(map.len(), 3);
        assert_eq!(map.entries()[0].data, Colour::WHITE);
        assert_eq!(map.entries()[1].data, defaults.entries()[1].data);
        assert_eq!(map.entries()[2].value, 2.0);
    }

    #[test]
    fn empty_normal_list_is_no_map() {
        let defaults = default_map(DefaultMap::Check);
        let list = parser("}").parse_blend_list::<TNormal>(2, &defaults).expect("list");
        assert!(list.is_none());
        let list = parser("}").parse_blend_list::<Pigment>(2, &defaults).expect("list");
        assert_eq!(list.map(|m| m.len()), Some(2));
    }

    #[test]
    fn slope_lists_are_not_supported() {
        let defaults = default_map(DefaultMap::Gray);
        let err = parser("<0, 1>")
            .parse_blend_list::<Express>(2, &defaults)
            .expect_err("slope list");
        assert_eq!(err.message(), "Type not implemented yet.");
    }
}
