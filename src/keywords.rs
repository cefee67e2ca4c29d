//! Reserved words of the scene language.
//!
//! The lexer hands every word to the parser as a plain identifier. The
//! parser looks it up here first and falls back to the symbol stack, so a
//! reserved word can never be shadowed by `#declare`.

macro_rules! keywords {
    ($($variant:ident => $text:literal $(| $alias:literal)*,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant,)*
        }

        impl Keyword {
            pub fn lookup(word: &str) -> Option<Keyword> {
                match word {
                    $($text $(| $alias)* => Some(Keyword::$variant),)*
                    _ => None,
                }
            }

            /// Canonical spelling, used in diagnostics.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text,)*
                }
            }
        }
    };
}

keywords! {
    // ── Float functions and constants ──────────────────────────────────
    Abs => "abs",
    Acos => "acos",
    Acosh => "acosh",
    Asc => "asc",
    Asin => "asin",
    Asinh => "asinh",
    Atan => "atan",
    Atan2 => "atan2",
    Atanh => "atanh",
    BitwiseAnd => "bitwise_and",
    BitwiseOr => "bitwise_or",
    BitwiseXor => "bitwise_xor",
    Ceil => "ceil",
    Clock => "clock",
    ClockOn => "clock_on",
    Cos => "cos",
    Cosh => "cosh",
    Defined => "defined",
    Degrees => "degrees",
    Dimensions => "dimensions",
    DimensionSize => "dimension_size",
    Div => "div",
    Exp => "exp",
    FileExists => "file_exists",
    Floor => "floor",
    Int => "int",
    Ln => "ln",
    Log => "log",
    Max => "max",
    Min => "min",
    Mod => "mod",
    Now => "now",
    Pi => "pi",
    Pow => "pow",
    Radians => "radians",
    Rand => "rand",
    Seed => "seed",
    Select => "select",
    Sin => "sin",
    Sinh => "sinh",
    Sqr => "sqr",
    Sqrt => "sqrt",
    Strcmp => "strcmp",
    Strlen => "strlen",
    Tan => "tan",
    Tanh => "tanh",
    Tau => "tau",
    Val => "val",
    Vdot => "vdot",
    Vlength => "vlength",
    Version => "version",
    True => "true",
    Yes => "yes",
    On => "on",
    False => "false",
    No => "no",
    Off => "off",

    // ── Vector functions and constants ─────────────────────────────────
    VaxisRotate => "vaxis_rotate",
    Vcross => "vcross",
    Vnormalize => "vnormalize",
    Vrotate => "vrotate",
    Vturbulence => "vturbulence",
    MinExtent => "min_extent",
    MaxExtent => "max_extent",
    Trace => "trace",
    X => "x",
    Y => "y",
    Z => "z",
    T => "t",
    U => "u",
    V => "v",

    // ── Colour ─────────────────────────────────────────────────────────
    Color => "color" | "colour",
    Red => "red",
    Green => "green",
    Blue => "blue",
    Filter => "filter",
    Transmit => "transmit",
    Alpha => "alpha",
    Gray => "gray" | "grey",
    Rgb => "rgb",
    Rgbf => "rgbf",
    Rgbt => "rgbt",
    Rgbft => "rgbft",
    Srgb => "srgb",
    Srgbf => "srgbf",
    Srgbt => "srgbt",
    Srgbft => "srgbft",

    // ── String functions ───────────────────────────────────────────────
    Str => "str",
    Vstr => "vstr",
    Concat => "concat",
    Chr => "chr",
    Substr => "substr",
    Strupr => "strupr",
    Strlwr => "strlwr",
    Datetime => "datetime",

    // ── Materials and maps ─────────────────────────────────────────────
    Pigment => "pigment",
    Normal => "normal",
    Finish => "finish",
    Texture => "texture",
    ColorMap => "color_map" | "colour_map",
    PigmentMap => "pigment_map",
    NormalMap => "normal_map",
    SlopeMap => "slope_map",
    TextureMap => "texture_map",
    BlendMode => "blend_mode",
    BlendGamma => "blend_gamma",
    Accuracy => "accuracy",
    BumpSize => "bump_size",

    // ── Patterns ───────────────────────────────────────────────────────
    Checker => "checker",
    Hexagon => "hexagon",
    Brick => "brick",
    BrickSize => "brick_size",
    Mortar => "mortar",
    Cubic => "cubic",
    Gradient => "gradient",
    Onion => "onion",
    Radial => "radial",
    Spherical => "spherical",
    Boxed => "boxed",
    Leopard => "leopard",
    Wood => "wood",
    Marble => "marble",
    Agate => "agate",
    AgateTurb => "agate_turb",
    Bozo => "bozo",
    Spotted => "spotted",
    Bumps => "bumps",
    Function => "function",
    Average => "average",
    UvMapping => "uv_mapping",

    // ── Pattern modifiers and transforms ───────────────────────────────
    Turbulence => "turbulence",
    Octaves => "octaves",
    Omega => "omega",
    Lambda => "lambda",
    Frequency => "frequency",
    Phase => "phase",
    RampWave => "ramp_wave",
    SineWave => "sine_wave",
    TriangleWave => "triangle_wave",
    ScallopWave => "scallop_wave",
    CubicWave => "cubic_wave",
    PolyWave => "poly_wave",
    Translate => "translate",
    Rotate => "rotate",
    Scale => "scale",
    Matrix => "matrix",
    Transform => "transform",
    Inverse => "inverse",

    // ── Finish ─────────────────────────────────────────────────────────
    Ambient => "ambient",
    Diffuse => "diffuse",
    Brilliance => "brilliance",
    Phong => "phong",
    PhongSize => "phong_size",
    Specular => "specular",
    Roughness => "roughness",
    Metallic => "metallic",
    Reflection => "reflection",

    // ── Splines ────────────────────────────────────────────────────────
    Spline => "spline",
    LinearSpline => "linear_spline",
    QuadraticSpline => "quadratic_spline",
    CubicSpline => "cubic_spline",
    NaturalSpline => "natural_spline",

    // ── Containers and scene-level blocks ──────────────────────────────
    Array => "array",
    Dictionary => "dictionary",
    GlobalSettings => "global_settings",
    AssumedGamma => "assumed_gamma",
}

impl Keyword {
    /// Built-ins that yield a single float.
    pub fn is_float_function(self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Abs | Acos
                | Acosh
                | Asc
                | Asin
                | Asinh
                | Atan
                | Atan2
                | Atanh
                | BitwiseAnd
                | BitwiseOr
                | BitwiseXor
                | Ceil
                | Clock
                | ClockOn
                | Cos
                | Cosh
                | Defined
                | Degrees
                | Dimensions
                | DimensionSize
                | Div
                | Exp
                | FileExists
                | Floor
                | Int
                | Ln
                | Log
                | Max
                | Min
                | Mod
                | Now
                | Pi
                | Pow
                | Radians
                | Rand
                | Seed
                | Select
                | Sin
                | Sinh
                | Sqr
                | Sqrt
                | Strcmp
                | Strlen
                | Tan
                | Tanh
                | Tau
                | Val
                | Vdot
                | Vlength
                | Version
                | True
                | Yes
                | On
                | False
                | No
                | Off
        )
    }

    /// Built-ins and constants that yield a 3D vector.
    pub fn is_vector_function(self) -> bool {
        use Keyword::*;
        matches!(
            self,
            VaxisRotate | Vcross | Vnormalize | Vrotate | Vturbulence | MinExtent | MaxExtent | Trace | X | Y | Z
        )
    }

    pub fn is_colour_key(self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Color | Red | Green | Blue | Filter | Transmit | Alpha | Rgb | Rgbf | Rgbt | Rgbft | Srgb | Srgbf | Srgbt | Srgbft
        )
    }

    pub fn is_string_function(self) -> bool {
        use Keyword::*;
        matches!(self, Str | Vstr | Concat | Chr | Substr | Strupr | Strlwr | Datetime)
    }

    /// Words that may start a numeric expression.
    pub fn starts_expression(self) -> bool {
        self.is_float_function() || self.is_vector_function() || matches!(self, Keyword::T | Keyword::U | Keyword::V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_one_keyword() {
        assert_eq!(Keyword::lookup("colour"), Some(Keyword::Color));
        assert_eq!(Keyword::lookup("color"), Some(Keyword::Color));
        assert_eq!(Keyword::lookup("grey"), Some(Keyword::Gray));
        assert_eq!(Keyword::lookup("colour_map"), Some(Keyword::ColorMap));
        assert_eq!(Keyword::ColorMap.as_str(), "color_map");
    }

    #[test]
    fn unknown_words_are_not_reserved() {
        assert_eq!(Keyword::lookup("Red"), None);
        assert_eq!(Keyword::lookup("my_pigment"), None);
    }

    #[test]
    fn categories() {
        assert!(Keyword::Sqrt.is_float_function());
        assert!(!Keyword::Sqrt.is_vector_function());
        assert!(Keyword::Vcross.is_vector_function());
        assert!(Keyword::Rgbft.is_colour_key());
        assert!(Keyword::Concat.is_string_function());
        assert!(Keyword::T.starts_expression());
        assert!(!Keyword::Pigment.starts_expression());
    }
}
