//! Pigments, normals, finishes and textures as produced by the parser, and
//! the pattern descriptions they share.

use serde::Serialize;

use crate::blend_map::{default_map, BlendData, BlendMapKind, BlendMapPtr, DefaultMap};
use crate::colour::Colour;
use crate::express::Express;
use crate::function::FunctionHandle;
use crate::symbols::{impl_declarable, SymbolKind};
use crate::vector::{Transform, Vector3};

// ── Patterns ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveType {
    Ramp,
    Sine,
    Triangle,
    Scallop,
    Cubic,
    Poly,
}

/// Classic turbulence warp parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Turbulence {
    pub amount: Vector3,
    pub octaves: u32,
    pub omega: f64,
    pub lambda: f64,
}

impl Default for Turbulence {
    fn default() -> Self {
        Self {
            amount: Vector3::ZERO,
            octaves: 6,
            omega: 0.5,
            lambda: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternKind {
    Plain,
    Checker,
    Hexagon,
    Brick { size: Vector3, mortar: f64 },
    Cubic,
    Gradient { direction: Vector3 },
    Onion,
    Radial,
    Spherical,
    Boxed,
    Leopard,
    Wood,
    Marble,
    Agate { turb_scale: f64 },
    Bozo,
    Spotted,
    Bumps,
    Function { function: FunctionHandle },
    Average,
    UvMapping,
}

impl PatternKind {
    /// Discrete patterns yield whole-number indices and skip wave shaping.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            PatternKind::Plain | PatternKind::Checker | PatternKind::Hexagon | PatternKind::Brick { .. } | PatternKind::Cubic
        )
    }

    /// Patterns that consume turbulence themselves instead of warping the
    /// evaluation point.
    pub fn handles_turbulence(&self) -> bool {
        matches!(self, PatternKind::Wood | PatternKind::Marble | PatternKind::Agate { .. })
    }

    /// Number of items a blend list for this pattern takes, if it has one.
    pub fn blend_list_len(&self) -> Option<usize> {
        match self {
            PatternKind::Checker | PatternKind::Brick { .. } => Some(2),
            PatternKind::Hexagon => Some(3),
            PatternKind::Cubic => Some(6),
            PatternKind::UvMapping => Some(1),
            _ => None,
        }
    }

    pub fn default_map(&self) -> BlendMapPtr<Colour> {
        let which = match self {
            PatternKind::Bozo | PatternKind::Spotted => DefaultMap::Bozo,
            PatternKind::Wood => DefaultMap::Wood,
            PatternKind::Agate { .. } => DefaultMap::Agate,
            PatternKind::Radial => DefaultMap::Radial,
            PatternKind::Marble => DefaultMap::Marble,
            PatternKind::Brick { .. } => DefaultMap::Brick,
            PatternKind::Hexagon => DefaultMap::Hex,
            PatternKind::Checker => DefaultMap::Check,
            PatternKind::Cubic => DefaultMap::Cubic,
            _ => DefaultMap::Gray,
        };
        default_map(which)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub transform: Transform,
    pub turbulence: Option<Turbulence>,
    pub frequency: f64,
    pub phase: f64,
    pub wave: WaveType,
    /// Exponent of `poly_wave`.
    pub exponent: f64,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new(PatternKind::Plain)
    }
}

impl Pattern {
    pub fn new(kind: PatternKind) -> Self {
        let wave = match kind {
            PatternKind::Wood => WaveType::Triangle,
            _ => WaveType::Ramp,
        };
        Self {
            kind,
            transform: Transform::identity(),
            turbulence: None,
            frequency: 1.0,
            phase: 0.0,
            wave,
            exponent: 1.0,
        }
    }

    /// Switch pattern kind, keeping modifiers already applied.
    pub fn set_kind(&mut self, kind: PatternKind) {
        if matches!(kind, PatternKind::Wood) {
            self.wave = WaveType::Triangle;
        }
        self.kind = kind;
    }

    pub fn is_plain(&self) -> bool {
        matches!(self.kind, PatternKind::Plain)
    }

    pub fn turbulence_mut(&mut self) -> &mut Turbulence {
        self.turbulence.get_or_insert_with(Turbulence::default)
    }

    pub fn apply_transform(&mut self, t: &Transform) {
        self.transform = self.transform.compose(t);
    }
}

// ── Pigments ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PigmentMap {
    Colour(BlendMapPtr<Colour>),
    Pigment(BlendMapPtr<Pigment>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Pigment {
    pub pattern: Pattern,
    /// Colour of a plain pigment.
    pub colour: Colour,
    pub map: Option<PigmentMap>,
}

impl Default for Pigment {
    fn default() -> Self {
        Self {
            pattern: Pattern::default(),
            colour: Colour::BLACK,
            map: None,
        }
    }
}

impl Pigment {
    pub fn plain(colour: Colour) -> Self {
        Self {
            colour,
            ..Self::default()
        }
    }
}

impl_declarable!(Pigment => Pigment);

impl BlendData for Pigment {
    const KIND: BlendMapKind = BlendMapKind::Pigment;
    const SYMBOL_KIND: SymbolKind = SymbolKind::PigmentMap;

    fn has_transparency(&self) -> bool {
        match &self.map {
            None => self.colour.is_transparent(),
            Some(PigmentMap::Colour(m)) => m.has_transparency(),
            Some(PigmentMap::Pigment(m)) => m.has_transparency(),
        }
    }
}

// ── Normals ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalMap {
    Normal(BlendMapPtr<TNormal>),
    Slope(BlendMapPtr<Express>),
}

#[derive(Debug, Clone, Serialize)]
pub struct TNormal {
    pub pattern: Pattern,
    pub amount: f64,
    /// Finite-difference step, set by `accuracy`.
    pub delta: f64,
    pub map: Option<NormalMap>,
}

impl Default for TNormal {
    fn default() -> Self {
        Self {
            pattern: Pattern::default(),
            amount: 0.5,
            delta: 0.02,
            map: None,
        }
    }
}

impl_declarable!(TNormal => Normal);

impl BlendData for TNormal {
    const KIND: BlendMapKind = BlendMapKind::Normal;
    const SYMBOL_KIND: SymbolKind = SymbolKind::NormalMap;

    fn has_transparency(&self) -> bool {
        false
    }
}

// ── Finishes ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finish {
    pub ambient: Colour,
    pub diffuse: f64,
    pub brilliance: f64,
    pub phong: f64,
    pub phong_size: f64,
    pub specular: f64,
    pub roughness: f64,
    pub metallic: f64,
    pub reflection: Colour,
}

impl Default for Finish {
    fn default() -> Self {
        Self {
            ambient: Colour::rgb(0.1, 0.1, 0.1),
            diffuse: 0.6,
            brilliance: 1.0,
            phong: 0.0,
            phong_size: 40.0,
            specular: 0.0,
            roughness: 0.05,
            metallic: 0.0,
            reflection: Colour::BLACK,
        }
    }
}

impl_declarable!(Finish => Finish);

// ── Textures ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct Texture {
    pub pattern: Pattern,
    pub pigment: Option<Pigment>,
    pub normal: Option<TNormal>,
    pub finish: Option<Finish>,
    pub map: Option<BlendMapPtr<Texture>>,
}

impl_declarable!(Texture => Texture);

impl BlendData for Texture {
    const KIND: BlendMapKind = BlendMapKind::Texture;
    const SYMBOL_KIND: SymbolKind = SymbolKind::TextureMap;

    fn has_transparency(&self) -> bool {
        if let Some(map) = &self.map {
            return map.has_transparency();
        }
        self.pigment.as_ref().is_some_and(|p| p.has_transparency())
    }
}
