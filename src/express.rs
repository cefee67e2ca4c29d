//! Tagged numeric values produced by the expression evaluator, and the
//! promotion rules that reconcile values of different arity.

use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Differences below this are treated as zero by truthiness tests and by
/// the near-equality relational operators.
pub const EPSILON: f64 = 1.0e-10;

/// Scene-language truthiness: anything further than `EPSILON` from zero.
pub fn ftrue(value: f64) -> bool {
    value.abs() > EPSILON
}

/// How many slots of an `Express` carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    Float = 1,
    Uv = 2,
    Vector = 3,
    /// A homogeneous vector or an RGB colour with filter.
    Vector4 = 4,
    /// A full colour: red, green, blue, filter, transmit.
    Colour = 5,
}

impl Arity {
    pub fn terms(self) -> usize {
        self as usize
    }

    pub fn from_terms(terms: usize) -> Option<Arity> {
        match terms {
            1 => Some(Arity::Float),
            2 => Some(Arity::Uv),
            3 => Some(Arity::Vector),
            4 => Some(Arity::Vector4),
            5 => Some(Arity::Colour),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Arity::Float => "float",
            Arity::Uv => "uv vector",
            Arity::Vector => "vector",
            Arity::Vector4 => "4d vector",
            Arity::Colour => "color",
        }
    }
}

/// A float, vector or colour value with its arity carried alongside.
///
/// Slots at or beyond the arity are always zero; every constructor and
/// mutator maintains that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Express {
    arity: Arity,
    slots: [f64; 5],
}

impl Default for Express {
    fn default() -> Self {
        Express::float(0.0)
    }
}

impl Express {
    pub fn float(value: f64) -> Self {
        Self {
            arity: Arity::Float,
            slots: [value, 0.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn uv(u: f64, v: f64) -> Self {
        Self {
            arity: Arity::Uv,
            slots: [u, v, 0.0, 0.0, 0.0],
        }
    }

    pub fn vector(x: f64, y: f64, z: f64) -> Self {
        Self {
            arity: Arity::Vector,
            slots: [x, y, z, 0.0, 0.0],
        }
    }

    pub fn vector4(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self {
            arity: Arity::Vector4,
            slots: [x, y, z, w, 0.0],
        }
    }

    pub fn colour(red: f64, green: f64, blue: f64, filter: f64, transmit: f64) -> Self {
        Self {
            arity: Arity::Colour,
            slots: [red, green, blue, filter, transmit],
        }
    }

    /// Build from the leading `arity.terms()` values of `values`.
    pub fn from_slice(arity: Arity, values: &[f64]) -> Self {
        let mut slots = [0.0; 5];
        for (slot, value) in slots.iter_mut().zip(values).take(arity.terms()) {
            *slot = *value;
        }
        Self { arity, slots }
    }

    /// All-zero value of the given arity.
    pub fn zero(arity: Arity) -> Self {
        Self {
            arity,
            slots: [0.0; 5],
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn terms(&self) -> usize {
        self.arity.terms()
    }

    /// Value of slot `index`; zero beyond the arity.
    pub fn get(&self, index: usize) -> f64 {
        if index < self.terms() {
            self.slots[index]
        } else {
            0.0
        }
    }

    /// Write slot `index`. Writes beyond the arity are ignored.
    pub fn set(&mut self, index: usize, value: f64) {
        if index < self.terms() {
            self.slots[index] = value;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.slots[..self.terms()]
    }

    pub fn first(&self) -> f64 {
        self.slots[0]
    }

    /// Truthiness of the first slot.
    pub fn is_true(&self) -> bool {
        ftrue(self.slots[0])
    }

    /// Raise the arity to `to`. A single float is broadcast into every new
    /// slot; anything wider is zero-padded. Never narrows.
    pub fn promote(&self, to: Arity) -> Express {
        if to <= self.arity {
            return *self;
        }
        let mut out = *self;
        out.arity = to;
        if self.arity == Arity::Float {
            for slot in &mut out.slots[1..to.terms()] {
                *slot = self.slots[0];
            }
        }
        // wider sources are already zero past their arity
        out
    }

    /// Promote the narrower of two values to the arity of the wider.
    pub fn unify(a: Express, b: Express) -> (Express, Express) {
        let arity = a.arity.max(b.arity);
        (a.promote(arity), b.promote(arity))
    }

    /// Apply `f` to every meaningful slot.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Express {
        let mut out = *self;
        for slot in &mut out.slots[..self.terms()] {
            *slot = f(*slot);
        }
        out
    }

    /// Pairwise combination after unifying arities.
    pub fn zip_with(a: Express, b: Express, f: impl Fn(f64, f64) -> f64) -> Express {
        let (a, b) = Express::unify(a, b);
        let mut out = a;
        for i in 0..out.terms() {
            out.slots[i] = f(a.slots[i], b.slots[i]);
        }
        out
    }
}

/// A bare number for one term, `<a, b, ...>` otherwise.
impl fmt::Display for Express {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arity == Arity::Float {
            return write!(f, "{}", self.slots[0]);
        }
        write!(f, "<")?;
        for (i, value) in self.values().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ">")
    }
}

impl Serialize for Express {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.arity == Arity::Float {
            return serializer.serialize_f64(self.slots[0]);
        }
        let mut seq = serializer.serialize_seq(Some(self.terms()))?;
        for value in self.values() {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(Express::float(2.5).to_string(), "2.5");
        assert_eq!(Express::vector(1.0, 2.0, 3.5).to_string(), "<1, 2, 3.5>");
    }

    #[test]
    fn float_broadcasts_on_promotion() {
        let p = Express::float(2.5).promote(Arity::Colour);
        assert_eq!(p.arity(), Arity::Colour);
        assert_eq!(p.values(), &[2.5, 2.5, 2.5, 2.5, 2.5]);
    }

    #[test]
    fn wider_values_zero_pad() {
        let p = Express::vector(1.0, 2.0, 3.0).promote(Arity::Colour);
        assert_eq!(p.values(), &[1.0, 2.0, 3.0, 0.0, 0.0]);
        let p = Express::uv(4.0, 5.0).promote(Arity::Vector);
        assert_eq!(p.values(), &[4.0, 5.0, 0.0]);
    }

    #[test]
    fn promotion_never_narrows() {
        let v = Express::vector4(1.0, 2.0, 3.0, 4.0);
        assert_eq!(v.promote(Arity::Uv), v);
    }

    #[test]
    fn promotion_preserves_leading_slots() {
        let sources = [
            Express::float(7.0),
            Express::uv(1.0, -1.0),
            Express::vector(0.5, 0.25, 0.125),
            Express::vector4(9.0, 8.0, 7.0, 6.0),
        ];
        for src in sources {
            for terms in src.terms()..=5 {
                let to = Arity::from_terms(terms).expect("valid arity");
                let p = src.promote(to);
                assert_eq!(&p.values()[..src.terms()], src.values());
                for i in src.terms()..terms {
                    let expected = if src.terms() == 1 { src.first() } else { 0.0 };
                    assert_eq!(p.get(i), expected);
                }
            }
        }
    }

    #[test]
    fn zip_with_unifies_first() {
        let sum = Express::zip_with(Express::float(1.0), Express::vector(1.0, 2.0, 3.0), |a, b| a + b);
        assert_eq!(sum.values(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn set_beyond_arity_is_ignored() {
        let mut f = Express::float(1.0);
        f.set(3, 9.0);
        assert_eq!(f.get(3), 0.0);
    }

    #[test]
    fn serializes_by_arity() {
        let json = serde_json::to_string(&Express::float(0.5)).expect("serialize");
        assert_eq!(json, "0.5");
        let json = serde_json::to_string(&Express::uv(1.0, 2.0)).expect("serialize");
        assert_eq!(json, "[1.0,2.0]");
    }
}
