//! `pigment`, `normal`, `finish`, `texture` and `transform` blocks.
//!
//! The `*_body` readers stop at the first token they do not recognise and
//! leave it unread, so the same code reads both a braced block and the
//! unbraced payload of a blend map entry.

use crate::colour::Colour;
use crate::error::Result;
use crate::express::Arity;
use crate::keywords::Keyword;
use crate::material::{Finish, NormalMap, Pattern, PatternKind, Pigment, PigmentMap, TNormal, Texture, WaveType};
use crate::symbols::{Declarable, SymbolEntry, SymbolKind};
use crate::token::Token;
use crate::vector::{Transform, Vector3};

use super::stream::Tok;
use super::Parser;

const MAX_OCTAVES: i64 = 10;

impl Parser {
    fn copy_of<T: Declarable + Clone>(&self, entry: &SymbolEntry) -> Result<T> {
        entry
            .with(|value: &T| value.clone())
            .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))
    }

    /// A leading identifier of `kind` becomes the starting value.
    fn leading_copy<T: Declarable + Clone>(&mut self, kind: SymbolKind) -> Result<Option<T>> {
        let la = self.get()?;
        match &la.tok {
            Tok::Ident(entry) if entry.kind() == kind => {
                let entry = entry.clone();
                self.copy_of(&entry).map(Some)
            }
            _ => {
                self.unget(la);
                Ok(None)
            }
        }
    }

    // ── Transforms ─────────────────────────────────────────────────────

    /// A single transformation statement introduced by `k`, if `k` is one.
    pub(crate) fn parse_transform_item(&mut self, k: Keyword) -> Result<Option<Transform>> {
        Ok(Some(match k {
            Keyword::Translate => Transform::translation(self.parse_vector()?),
            Keyword::Rotate => Transform::rotation(self.parse_vector()?),
            Keyword::Scale => Transform::scaling(self.parse_scale_vector()?),
            Keyword::Matrix => self.parse_matrix()?,
            Keyword::Transform => self.parse_transform()?,
            _ => return Ok(None),
        }))
    }

    /// `< m00, m01, m02, ..., m30, m31, m32 >`
    fn parse_matrix(&mut self) -> Result<Transform> {
        self.expect(&Token::Less)?;
        let mut values = [0.0; 12];
        for (i, value) in values.iter_mut().enumerate() {
            if i > 0 {
                self.expect(&Token::Comma)?;
            }
            *value = self.parse_rel_factor(Arity::Float)?.first();
        }
        self.expect(&Token::Greater)?;
        Transform::from_matrix(&values).map_err(|e| self.located(e))
    }

    /// After `transform`: a transform identifier or `{ items }`. An
    /// `inverse` anywhere in the block inverts the whole block.
    pub(crate) fn parse_transform(&mut self) -> Result<Transform> {
        let la = self.get()?;
        match &la.tok {
            Tok::Ident(entry) if entry.kind() == SymbolKind::Transform => {
                let entry = entry.clone();
                return self.copy_of(&entry);
            }
            Tok::Raw(Token::LBrace) => {}
            _ => return Err(self.unexpected("{ or transform identifier", &la)),
        }

        let mut transform = Transform::identity();
        let mut inverse = false;
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Raw(Token::RBrace) => break,
                Tok::Keyword(Keyword::Inverse) => inverse = true,
                Tok::Ident(entry) if entry.kind() == SymbolKind::Transform => {
                    let entry = entry.clone();
                    let next: Transform = self.copy_of(&entry)?;
                    transform = transform.compose(&next);
                }
                Tok::Keyword(k) => match self.parse_transform_item(*k)? {
                    Some(next) => transform = transform.compose(&next),
                    None => return Err(self.unexpected("transformation", &la)),
                },
                _ => return Err(self.unexpected("transformation", &la)),
            }
        }
        Ok(if inverse { transform.inverted() } else { transform })
    }

    // ── Patterns ───────────────────────────────────────────────────────

    fn parse_pattern_kind(&mut self, k: Keyword) -> Result<Option<PatternKind>> {
        Ok(Some(match k {
            Keyword::Checker => PatternKind::Checker,
            Keyword::Hexagon => PatternKind::Hexagon,
            Keyword::Brick => PatternKind::Brick {
                size: Vector3::new(8.0, 3.0, 4.5),
                mortar: 0.5,
            },
            Keyword::Cubic => PatternKind::Cubic,
            Keyword::Gradient => PatternKind::Gradient {
                direction: self.parse_vector()?,
            },
            Keyword::Onion => PatternKind::Onion,
            Keyword::Radial => PatternKind::Radial,
            Keyword::Spherical => PatternKind::Spherical,
            Keyword::Boxed => PatternKind::Boxed,
            Keyword::Leopard => PatternKind::Leopard,
            Keyword::Wood => PatternKind::Wood,
            Keyword::Marble => PatternKind::Marble,
            Keyword::Agate => PatternKind::Agate { turb_scale: 1.0 },
            Keyword::Bozo => PatternKind::Bozo,
            Keyword::Spotted => PatternKind::Spotted,
            Keyword::Bumps => PatternKind::Bumps,
            Keyword::Function => PatternKind::Function {
                function: self.parse_function()?,
            },
            Keyword::Average => PatternKind::Average,
            Keyword::UvMapping => PatternKind::UvMapping,
            _ => return Ok(None),
        }))
    }

    /// Warps, wave shaping, per-pattern settings and transformations.
    /// Returns false if `k` is none of these.
    fn parse_pattern_modifier(&mut self, k: Keyword, pattern: &mut Pattern) -> Result<bool> {
        match k {
            Keyword::Turbulence => pattern.turbulence_mut().amount = self.parse_vector()?,
            Keyword::Octaves => {
                let mut octaves = self.parse_int(Some("octaves"))?;
                if !(1..=MAX_OCTAVES).contains(&octaves) {
                    octaves = octaves.clamp(1, MAX_OCTAVES);
                    self.warning(format!("octaves must be between 1 and {MAX_OCTAVES}; using {octaves}."))?;
                }
                pattern.turbulence_mut().octaves = octaves as u32;
            }
            Keyword::Omega => pattern.turbulence_mut().omega = self.parse_float()?,
            Keyword::Lambda => pattern.turbulence_mut().lambda = self.parse_float()?,
            Keyword::Frequency => pattern.frequency = self.parse_float()?,
            Keyword::Phase => pattern.phase = self.parse_float()?,
            Keyword::RampWave => pattern.wave = WaveType::Ramp,
            Keyword::SineWave => pattern.wave = WaveType::Sine,
            Keyword::TriangleWave => pattern.wave = WaveType::Triangle,
            Keyword::ScallopWave => pattern.wave = WaveType::Scallop,
            Keyword::CubicWave => pattern.wave = WaveType::Cubic,
            Keyword::PolyWave => {
                pattern.wave = WaveType::Poly;
                pattern.exponent = self.allow_float(1.0)?;
            }
            Keyword::BrickSize => match &mut pattern.kind {
                PatternKind::Brick { size, .. } => *size = self.parse_vector()?,
                _ => return Err(self.error("brick_size is only valid with the brick pattern.")),
            },
            Keyword::Mortar => match &mut pattern.kind {
                PatternKind::Brick { mortar, .. } => *mortar = self.parse_float()?,
                _ => return Err(self.error("mortar is only valid with the brick pattern.")),
            },
            Keyword::AgateTurb => match &mut pattern.kind {
                PatternKind::Agate { turb_scale } => *turb_scale = self.parse_float()?,
                _ => return Err(self.error("agate_turb is only valid with the agate pattern.")),
            },
            _ => match self.parse_transform_item(k)? {
                Some(t) => pattern.apply_transform(&t),
                None => return Ok(false),
            },
        }
        Ok(true)
    }

    // ── Pigments ───────────────────────────────────────────────────────

    /// After `pigment`: `{ body }`.
    pub(crate) fn parse_pigment(&mut self) -> Result<Pigment> {
        self.expect(&Token::LBrace)?;
        let pigment = self.parse_pigment_body()?;
        self.expect(&Token::RBrace)?;
        Ok(pigment)
    }

    pub(crate) fn parse_pigment_body(&mut self) -> Result<Pigment> {
        let mut pigment: Pigment = self.leading_copy(SymbolKind::Pigment)?.unwrap_or_default();
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(k) if k.is_colour_key() => {
                    self.unget(la);
                    pigment.colour = self.parse_colour(true)?;
                }
                Tok::Ident(entry) if entry.kind() == SymbolKind::Colour => {
                    self.unget(la);
                    pigment.colour = self.parse_colour(true)?;
                }
                Tok::Keyword(Keyword::ColorMap) => {
                    pigment.map = Some(PigmentMap::Colour(self.parse_colour_map()?));
                }
                Tok::Keyword(Keyword::PigmentMap) => {
                    let average = matches!(pigment.pattern.kind, PatternKind::Average);
                    pigment.map = Some(PigmentMap::Pigment(self.parse_blend_map(average)?));
                }
                Tok::Keyword(k) => {
                    let k = *k;
                    if let Some(kind) = self.parse_pattern_kind(k)? {
                        pigment.pattern.set_kind(kind);
                        if let Some(count) = pigment.pattern.kind.blend_list_len() {
                            self.parse_pigment_list(&mut pigment, count)?;
                        }
                    } else if !self.parse_pattern_modifier(k, &mut pigment.pattern)? {
                        self.unget(la);
                        break;
                    }
                }
                _ => {
                    self.unget(la);
                    break;
                }
            }
        }
        Ok(pigment)
    }

    /// Items after a pattern such as `checker`: pigments if the list
    /// starts with `pigment`, colours otherwise.
    fn parse_pigment_list(&mut self, pigment: &mut Pigment, count: usize) -> Result<()> {
        let defaults = pigment.pattern.kind.default_map();
        let la = self.peek()?;
        if la.tok.is_keyword(Keyword::Pigment) {
            if let Some(map) = self.parse_blend_list::<Pigment>(count, &defaults)? {
                pigment.map = Some(PigmentMap::Pigment(map));
            }
        } else if let Some(map) = self.parse_blend_list::<Colour>(count, &defaults)? {
            pigment.map = Some(PigmentMap::Colour(map));
        }
        Ok(())
    }

    // ── Normals ────────────────────────────────────────────────────────

    /// After `normal`: `{ body }`.
    pub(crate) fn parse_normal(&mut self) -> Result<TNormal> {
        self.expect(&Token::LBrace)?;
        let normal = self.parse_normal_body()?;
        self.expect(&Token::RBrace)?;
        Ok(normal)
    }

    pub(crate) fn parse_normal_body(&mut self) -> Result<TNormal> {
        let mut normal: TNormal = self.leading_copy(SymbolKind::Normal)?.unwrap_or_default();
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(Keyword::NormalMap) => {
                    let average = matches!(normal.pattern.kind, PatternKind::Average);
                    normal.map = Some(NormalMap::Normal(self.parse_blend_map(average)?));
                }
                Tok::Keyword(Keyword::SlopeMap) => {
                    normal.map = Some(NormalMap::Slope(self.parse_blend_map(false)?));
                }
                Tok::Keyword(Keyword::BumpSize) => normal.amount = self.parse_float()?,
                Tok::Keyword(Keyword::Accuracy) => normal.delta = self.parse_float()?,
                Tok::Keyword(k) => {
                    let k = *k;
                    if let Some(kind) = self.parse_pattern_kind(k)? {
                        normal.pattern.set_kind(kind);
                        if let Some(count) = normal.pattern.kind.blend_list_len() {
                            let defaults = normal.pattern.kind.default_map();
                            if let Some(map) = self.parse_blend_list::<TNormal>(count, &defaults)? {
                                normal.map = Some(NormalMap::Normal(map));
                            }
                        }
                        if self.at_expression_start()? {
                            normal.amount = self.parse_float()?;
                        }
                    } else if !self.parse_pattern_modifier(k, &mut normal.pattern)? {
                        self.unget(la);
                        break;
                    }
                }
                _ => {
                    self.unget(la);
                    break;
                }
            }
        }
        Ok(normal)
    }

    // ── Finishes ───────────────────────────────────────────────────────

    /// After `finish`: `{ [FinishId] items }`. Finish colours use only
    /// red, green and blue.
    pub(crate) fn parse_finish(&mut self) -> Result<Finish> {
        self.expect(&Token::LBrace)?;
        let mut finish: Finish = self.leading_copy(SymbolKind::Finish)?.unwrap_or_default();
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(Keyword::Ambient) => finish.ambient = self.parse_colour(false)?,
                Tok::Keyword(Keyword::Diffuse) => finish.diffuse = self.parse_float()?,
                Tok::Keyword(Keyword::Brilliance) => finish.brilliance = self.parse_float()?,
                Tok::Keyword(Keyword::Phong) => finish.phong = self.parse_float()?,
                Tok::Keyword(Keyword::PhongSize) => finish.phong_size = self.parse_float()?,
                Tok::Keyword(Keyword::Specular) => finish.specular = self.parse_float()?,
                Tok::Keyword(Keyword::Roughness) => {
                    let roughness = self.parse_float()?;
                    if roughness <= 0.0 {
                        return Err(self.error("Zero or negative roughness used."));
                    }
                    finish.roughness = roughness;
                }
                Tok::Keyword(Keyword::Metallic) => finish.metallic = self.allow_float(1.0)?,
                Tok::Keyword(Keyword::Reflection) => finish.reflection = self.parse_colour(false)?,
                Tok::Raw(Token::RBrace) => break,
                _ => return Err(self.unexpected("finish item", &la)),
            }
        }
        Ok(finish)
    }

    // ── Textures ───────────────────────────────────────────────────────

    /// After `texture`: `{ body }`.
    pub(crate) fn parse_texture(&mut self) -> Result<Texture> {
        self.expect(&Token::LBrace)?;
        let texture = self.parse_texture_body()?;
        self.expect(&Token::RBrace)?;
        Ok(texture)
    }

    pub(crate) fn parse_texture_body(&mut self) -> Result<Texture> {
        let mut texture: Texture = self.leading_copy(SymbolKind::Texture)?.unwrap_or_default();
        loop {
            let la = self.get()?;
            match &la.tok {
                Tok::Keyword(Keyword::Pigment) => texture.pigment = Some(self.parse_pigment()?),
                Tok::Keyword(Keyword::Normal) => texture.normal = Some(self.parse_normal()?),
                Tok::Keyword(Keyword::Finish) => texture.finish = Some(self.parse_finish()?),
                Tok::Keyword(Keyword::TextureMap) => {
                    let average = matches!(texture.pattern.kind, PatternKind::Average);
                    texture.map = Some(self.parse_blend_map(average)?);
                }
                Tok::Keyword(k) => {
                    let k = *k;
                    if let Some(t) = self.parse_transform_item(k)? {
                        transform_texture(&mut texture, &t);
                    } else if let Some(kind) = self.parse_pattern_kind(k)? {
                        texture.pattern.set_kind(kind);
                        if let Some(count) = texture.pattern.kind.blend_list_len() {
                            let defaults = texture.pattern.kind.default_map();
                            texture.map = self.parse_blend_list::<Texture>(count, &defaults)?;
                        }
                    } else if !self.parse_pattern_modifier(k, &mut texture.pattern)? {
                        self.unget(la);
                        break;
                    }
                }
                _ => {
                    self.unget(la);
                    break;
                }
            }
        }
        log::trace!(
            "texture: pigment {} normal {} finish {}",
            texture.pigment.is_some(),
            texture.normal.is_some(),
            texture.finish.is_some()
        );
        Ok(texture)
    }
}

/// A texture transform moves the texture pattern and the patterns of
/// the layers it already has.
fn transform_texture(texture: &mut Texture, t: &Transform) {
    texture.pattern.apply_transform(t);
    if let Some(pigment) = &mut texture.pigment {
        pigment.pattern.apply_transform(t);
    }
    if let Some(normal) = &mut texture.normal {
        normal.pattern.apply_transform(t);
    }
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

    fn pigment(src: &str) -> Pigment {
        parser(src).parse_pigment().expect("pigment")
    }

    fn colour_entries(pigment: &Pigment) -> Vec<(f64, Colour)> {
        match &pigment.map {
            Some(PigmentMap::Colour(map)) => map.entries().iter().map(|e| (e.value, e.data)).collect(),
            other => panic!("expected a colour map, got {other:?}"),
        }
    }

    #[test]
    fn plain_pigment() {
        let p = pigment("{ color rgbf <1, 0.5, 0, 0.25> }");
        assert!(p.pattern.is_plain());
        assert_eq!(p.colour, Colour::new(1.0, 0.5, 0.0, 0.25, 0.0));
        assert!(p.map.is_none());
    }

    #[test]
    fn checker_list_fills_from_default_map() {
        let p = pigment("{ checker color rgb 1 }");
        assert!(matches!(p.pattern.kind, PatternKind::Checker));
        let entries = colour_entries(&p);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (0.0, Colour::WHITE));
        assert_eq!(entries[1], (1.0, Colour::rgb(0.0, 1.0, 0.0)));
    }

    #[test]
    fn checker_with_pigment_items() {
        let p = pigment("{ checker pigment { color rgb 1 }, pigment { color rgb 0 } scale 2 }");
        match &p.map {
            Some(PigmentMap::Pigment(map)) => {
                assert_eq!(map.len(), 2);
                assert_eq!(map.entries()[1].data.colour, Colour::BLACK);
            }
            other => panic!("expected a pigment map, got {other:?}"),
        }
        let corner = p.pattern.transform.transform_point(Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(corner, Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn gradient_with_map_and_turbulence() {
        let p = pigment(
            "{ gradient <0, 1, 0> color_map { [0 rgb 0] [1 rgb 1] } \
             turbulence 0.5 octaves 3 lambda 3 frequency 2 sine_wave }",
        );
        match p.pattern.kind {
            PatternKind::Gradient { direction } => assert_eq!(direction, Vector3::new(0.0, 1.0, 0.0)),
            ref other => panic!("expected gradient, got {other:?}"),
        }
        let turb = p.pattern.turbulence.expect("turbulence");
        assert_eq!(turb.amount, Vector3::splat(0.5));
        assert_eq!(turb.octaves, 3);
        assert_eq!(turb.lambda, 3.0);
        assert_eq!(p.pattern.frequency, 2.0);
        assert_eq!(p.pattern.wave, WaveType::Sine);
        assert_eq!(colour_entries(&p).len(), 2);
    }

    #[test]
    fn octaves_are_clamped_with_a_warning() {
        let mut p = parser("{ bozo octaves 20 }");
        let pig = p.parse_pigment().expect("pigment");
        assert_eq!(pig.pattern.turbulence.expect("turbulence").octaves, 10);
        assert_eq!(p.warnings().len(), 1);
    }

    #[test]
    fn brick_settings() {
        let p = pigment("{ brick brick_size <1, 2, 3> mortar 0.1 }");
        match p.pattern.kind {
            PatternKind::Brick { size, mortar } => {
                assert_eq!(size, Vector3::new(1.0, 2.0, 3.0));
                assert_eq!(mortar, 0.1);
            }
            ref other => panic!("expected brick, got {other:?}"),
        }
        let err = parser("{ checker mortar 0.1 }").parse_pigment().expect_err("mortar");
        assert!(err.message().starts_with("mortar is only valid"));
    }

    #[test]
    fn poly_wave_exponent_is_optional() {
        assert_eq!(pigment("{ onion poly_wave }").pattern.exponent, 1.0);
        assert_eq!(pigment("{ onion poly_wave 3 }").pattern.exponent, 3.0);
    }

    #[test]
    fn pigment_identifier_is_copied() {
        let mut p = parser("#declare P = pigment { marble } { P phase 0.5 }");
        let pig = p.parse_pigment().expect("pigment");
        assert!(matches!(pig.pattern.kind, PatternKind::Marble));
        assert_eq!(pig.pattern.phase, 0.5);
        let original = p.symbols().find("P").expect("P");
        assert_eq!(original.with(|pig: &Pigment| pig.pattern.phase), Some(0.0));
    }

    #[test]
    fn function_pattern() {
        let p = pigment("{ function { x * 2 } }");
        match &p.pattern.kind {
            PatternKind::Function { function } => assert_eq!(function.param_count(), 3),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn normal_amount_and_lists() {
        let n = parser("{ bumps 0.8 accuracy 0.01 }").parse_normal().expect("normal");
        assert!(matches!(n.pattern.kind, PatternKind::Bumps));
        assert_eq!(n.amount, 0.8);
        assert_eq!(n.delta, 0.01);

        let n = parser("{ checker 0.3 }").parse_normal().expect("normal");
        assert!(n.map.is_none());
        assert_eq!(n.amount, 0.3);

        let n = parser("{ hexagon normal { bumps } }").parse_normal().expect("normal");
        match &n.map {
            Some(NormalMap::Normal(map)) => assert_eq!(map.len(), 3),
            other => panic!("expected a normal list, got {other:?}"),
        }
    }

    #[test]
    fn slope_map_normal() {
        let n = parser("{ gradient x slope_map { [0 <0, 1>] [1 <1, 0>] } }")
            .parse_normal()
            .expect("normal");
        assert!(matches!(n.map, Some(NormalMap::Slope(_))));
    }

    #[test]
    fn finish_items() {
        let mut p = parser("{ ambient 0.2 diffuse 0.7 phong 1 metallic reflection rgb <0.1, 0.2, 0.3> }");
        let f = p.parse_finish().expect("finish");
        assert_eq!(f.ambient, Colour::rgb(0.2, 0.2, 0.2));
        assert_eq!(f.diffuse, 0.7);
        assert_eq!(f.phong, 1.0);
        assert_eq!(f.metallic, 1.0);
        assert_eq!(f.reflection, Colour::rgb(0.1, 0.2, 0.3));

        let err = parser("{ roughness 0 }").parse_finish().expect_err("roughness");
        assert_eq!(err.message(), "Zero or negative roughness used.");
    }

    #[test]
    fn texture_layers_and_transform() {
        let mut p = parser("{ pigment { checker } finish { diffuse 0.9 } translate <1, 0, 0> }");
        let t = p.parse_texture().expect("texture");
        let pig = t.pigment.expect("pigment");
        let moved = pig.pattern.transform.transform_point(Vector3::ZERO);
        assert_eq!(moved, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(t.finish.expect("finish").diffuse, 0.9);
    }

    #[test]
    fn texture_list() {
        let t = parser("{ checker texture { pigment { color rgb 1 } } }")
            .parse_texture()
            .expect("texture");
        let map = t.map.expect("texture map");
        assert_eq!(map.len(), 2);
        assert!(map.entries()[0].data.pigment.is_some());
        assert!(map.entries()[1].data.pigment.is_none());
    }

    #[test]
    fn transform_blocks() {
        let mut p = parser("{ scale 2 translate <1, 0, 0> inverse }");
        let t = p.parse_transform().expect("transform");
        assert_eq!(t.transform_point(Vector3::new(3.0, 0.0, 0.0)), Vector3::new(1.0, 0.0, 0.0));

        let mut p = parser("{ matrix <1, 0, 0, 0, 1, 0, 0, 0, 1, 4, 5, 6> }");
        let t = p.parse_transform().expect("matrix");
        assert_eq!(t.transform_point(Vector3::ZERO), Vector3::new(4.0, 5.0, 6.0));

        let err = parser("{ matrix <0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0> }")
            .parse_transform()
            .expect_err("singular");
        assert_eq!(err.message(), "Singular matrix in MInvers.");
    }

    #[test]
    fn transform_identifiers_compose() {
        let mut p = parser("#declare T = transform { translate <0, 1, 0> } { T T }");
        let t = p.parse_transform().expect("transform");
        assert_eq!(t.transform_point(Vector3::ZERO), Vector3::new(0.0, 2.0, 0.0));
    }
}
