//! Blend maps: sorted lists of `(value, payload)` entries that a pattern
//! value indexes into.
//!
//! One generic container serves colour, pigment, normal, slope and texture
//! maps. Maps are immutable once parsed and are shared through
//! `BlendMapPtr`, which is either a counted heap handle or a reference to
//! one of the built-in default maps that is never freed.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::OnceLock;

use serde::ser::{Serialize, Serializer};

use crate::colour::Colour;
use crate::express::Express;
use crate::symbols::{Declarable, SymbolKind};

/// Which domain a map's payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMapKind {
    Colour,
    Pigment,
    Density,
    Normal,
    Slope,
    Texture,
}

impl BlendMapKind {
    pub fn name(self) -> &'static str {
        match self {
            BlendMapKind::Colour => "color_map",
            BlendMapKind::Pigment => "pigment_map",
            BlendMapKind::Density => "density_map",
            BlendMapKind::Normal => "normal_map",
            BlendMapKind::Slope => "slope_map",
            BlendMapKind::Texture => "texture_map",
        }
    }
}

/// A payload type that can live in a blend map.
pub trait BlendData: Clone + fmt::Debug + Serialize + 'static {
    const KIND: BlendMapKind;
    const SYMBOL_KIND: SymbolKind;

    /// Whether this entry lets light through.
    fn has_transparency(&self) -> bool;
}

impl BlendData for Colour {
    const KIND: BlendMapKind = BlendMapKind::Colour;
    const SYMBOL_KIND: SymbolKind = SymbolKind::ColourMap;

    fn has_transparency(&self) -> bool {
        self.is_transparent()
    }
}

/// Slope map entries are `<height, slope>` pairs.
impl BlendData for Express {
    const KIND: BlendMapKind = BlendMapKind::Slope;
    const SYMBOL_KIND: SymbolKind = SymbolKind::SlopeMap;

    fn has_transparency(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BlendMapEntry<T> {
    pub value: f64,
    pub data: T,
}

impl BlendMapEntry<Colour> {
    /// Structural equality over the raw bits of value and every channel.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits() && self.data.bitwise_eq(&other.data)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BlendMap<T> {
    kind: BlendMapKind,
    entries: Vec<BlendMapEntry<T>>,
    /// Colour-space blending mode, 0 to 3.
    pub blend_mode: u8,
    pub blend_gamma: f64,
    /// `OnceLock` rather than `OnceCell`: the built-in maps live in a
    /// `static`, which needs `Sync`.
    #[serde(skip)]
    transparency: OnceLock<bool>,
}

impl<T: BlendData> BlendMap<T> {
    pub fn new() -> Self {
        Self {
            kind: T::KIND,
            entries: Vec::new(),
            blend_mode: 0,
            blend_gamma: 2.5,
            transparency: OnceLock::new(),
        }
    }

    /// Pigment payloads also back density maps, so the tag can be narrowed.
    pub fn with_kind(kind: BlendMapKind) -> Self {
        Self {
            kind,
            ..Self::new()
        }
    }

    pub fn from_entries(entries: Vec<BlendMapEntry<T>>) -> Self {
        Self {
            entries,
            ..Self::new()
        }
    }

    pub fn kind(&self) -> BlendMapKind {
        self.kind
    }

    pub fn push(&mut self, value: f64, data: T) {
        self.entries.push(BlendMapEntry { value, data });
    }

    pub fn entries(&self) -> &[BlendMapEntry<T>] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<BlendMapEntry<T>> {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze the entry list and hand out the first shared handle.
    pub fn finish(mut self) -> BlendMapPtr<T> {
        self.entries.shrink_to_fit();
        BlendMapPtr::Shared(Rc::new(self))
    }

    /// Indices of the entries bracketing `value`, as `(prev, cur)`.
    ///
    /// At or past the last entry both are the last entry. Otherwise `cur`
    /// is the first entry not below `value`; an exact hit collapses `prev`
    /// onto `cur`.
    pub fn search(&self, value: f64) -> Option<(usize, usize)> {
        let last = self.entries.len().checked_sub(1)?;
        if value >= self.entries[last].value {
            return Some((last, last));
        }
        let mut prev = 0;
        let mut cur = 0;
        while value > self.entries[cur].value {
            prev = cur;
            cur += 1;
        }
        if value == self.entries[cur].value {
            prev = cur;
        }
        Some((prev, cur))
    }

    /// Interpolation weight of `cur` between the bracketing entries.
    pub fn weight(&self, value: f64, prev: usize, cur: usize) -> f64 {
        if prev == cur {
            return 1.0;
        }
        let (p, c) = (&self.entries[prev], &self.entries[cur]);
        (value - p.value) / (c.value - p.value)
    }

    /// Computed on first use and cached.
    pub fn has_transparency(&self) -> bool {
        *self
            .transparency
            .get_or_init(|| self.entries.iter().any(|e| e.data.has_transparency()))
    }
}

impl<T: BlendData> Default for BlendMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendMap<Colour> {
    /// Colour at `value`, linearly interpolated between bracketing entries.
    pub fn colour_at(&self, value: f64) -> Colour {
        let Some((prev, cur)) = self.search(value) else {
            return Colour::BLACK;
        };
        let c = &self.entries[cur].data;
        if prev == cur {
            return *c;
        }
        let p = &self.entries[prev].data;
        p.lerp(c, self.weight(value, prev, cur))
    }

    /// Value-weighted mean of the entry colours, for `average` pigments.
    pub fn weighted_average(&self) -> Colour {
        let total: f64 = self.entries.iter().map(|e| e.value).sum();
        if total == 0.0 {
            return Colour::BLACK;
        }
        self.entries
            .iter()
            .fold(Colour::BLACK, |acc, e| acc.add(&e.data.scale(e.value)))
            .scale(1.0 / total)
    }
}

/// Drop each entry that is bit-for-bit identical to the entry kept before it.
pub fn dedup_colour_entries(entries: &mut Vec<BlendMapEntry<Colour>>) {
    entries.dedup_by(|later, kept| later.bitwise_eq(kept));
}

// ── Shared handles ─────────────────────────────────────────────────────

/// A shared reference to an immutable blend map.
pub enum BlendMapPtr<T: 'static> {
    Shared(Rc<BlendMap<T>>),
    /// Built-in default map; never freed.
    Static(&'static BlendMap<T>),
}

impl<T: 'static> Clone for BlendMapPtr<T> {
    fn clone(&self) -> Self {
        match self {
            BlendMapPtr::Shared(rc) => BlendMapPtr::Shared(Rc::clone(rc)),
            BlendMapPtr::Static(r) => BlendMapPtr::Static(r),
        }
    }
}

impl<T: 'static> Deref for BlendMapPtr<T> {
    type Target = BlendMap<T>;

    fn deref(&self) -> &BlendMap<T> {
        match self {
            BlendMapPtr::Shared(rc) => rc,
            BlendMapPtr::Static(r) => r,
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for BlendMapPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlendMapPtr(users={}) ", self.users())?;
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: 'static> BlendMapPtr<T> {
    /// Number of live handles; `-1` for built-in maps.
    pub fn users(&self) -> i64 {
        match self {
            BlendMapPtr::Shared(rc) => Rc::strong_count(rc) as i64,
            BlendMapPtr::Static(_) => -1,
        }
    }

    /// Give up this handle. Returns `true` when it was the last one and the
    /// map has been freed.
    pub fn destroy(self) -> bool {
        match self {
            BlendMapPtr::Shared(rc) => Rc::try_unwrap(rc).is_ok(),
            BlendMapPtr::Static(_) => false,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(&**self as *const BlendMap<T>, &**other as *const BlendMap<T>)
    }
}

impl<T: Serialize + 'static> Serialize for BlendMapPtr<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (**self).serialize(serializer)
    }
}

impl<T: BlendData> Declarable for BlendMapPtr<T> {
    fn kind(&self) -> SymbolKind {
        T::SYMBOL_KIND
    }

    /// Maps are shared, not deep-copied.
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

// ── Built-in colour maps ───────────────────────────────────────────────

/// Default colour maps the patterns fall back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultMap {
    Gray,
    Bozo,
    Wood,
    Agate,
    Radial,
    Marble,
    Brick,
    Hex,
    Check,
    Cubic,
}

const RED: Colour = Colour::rgb(1.0, 0.0, 0.0);
const GREEN: Colour = Colour::rgb(0.0, 1.0, 0.0);
const BLUE: Colour = Colour::rgb(0.0, 0.0, 1.0);
const YELLOW: Colour = Colour::rgb(1.0, 1.0, 0.0);
const CYAN: Colour = Colour::rgb(0.0, 1.0, 1.0);
const MAGENTA: Colour = Colour::rgb(1.0, 0.0, 1.0);

const CUBIC_ENTRIES: [(f64, Colour); 6] = [
    (0.0, RED),
    (1.0, GREEN),
    (2.0, BLUE),
    (3.0, YELLOW),
    (4.0, CYAN),
    (5.0, MAGENTA),
];

fn entries_of(list: &[(f64, Colour)]) -> BlendMap<Colour> {
    BlendMap::from_entries(
        list.iter()
            .map(|&(value, data)| BlendMapEntry { value, data })
            .collect(),
    )
}

fn table(which: DefaultMap) -> Vec<(f64, Colour)> {
    match which {
        DefaultMap::Gray => vec![(0.0, Colour::BLACK), (1.0, Colour::WHITE)],
        DefaultMap::Bozo => vec![
            (0.4, Colour::WHITE),
            (0.4, GREEN),
            (0.6, GREEN),
            (0.6, BLUE),
            (0.8, BLUE),
            (0.8, RED),
        ],
        DefaultMap::Wood => vec![
            (0.6, Colour::rgb(0.666, 0.312, 0.2)),
            (0.6, Colour::rgb(0.4, 0.1333, 0.066)),
        ],
        DefaultMap::Agate => vec![
            (0.0, Colour::rgb(1.0, 1.0, 1.0)),
            (0.5, Colour::rgb(0.95, 0.75, 0.5)),
            (0.5, Colour::rgb(0.9, 0.7, 0.5)),
            (0.6, Colour::rgb(0.9, 0.7, 0.4)),
            (0.6, Colour::rgb(1.0, 0.7, 0.4)),
            (1.0, Colour::rgb(0.6, 0.3, 0.0)),
        ],
        DefaultMap::Radial => vec![
            (0.0, CYAN),
            (0.333, YELLOW),
            (0.666, MAGENTA),
            (1.0, CYAN),
        ],
        DefaultMap::Marble => vec![
            (0.0, Colour::rgb(0.9, 0.8, 0.8)),
            (0.9, Colour::rgb(0.9, 0.08, 0.08)),
            (0.9, Colour::BLACK),
        ],
        DefaultMap::Brick => vec![
            (0.0, Colour::rgb(0.5, 0.5, 0.5)),
            (1.0, Colour::rgb(0.6, 0.15, 0.15)),
        ],
        DefaultMap::Hex => vec![(0.0, BLUE), (1.0, GREEN), (2.0, RED)],
        DefaultMap::Check => vec![(0.0, BLUE), (1.0, GREEN)],
        DefaultMap::Cubic => CUBIC_ENTRIES.to_vec(),
    }
}

/// One of the built-in maps. Every call hands out the same static map.
pub fn default_map(which: DefaultMap) -> BlendMapPtr<Colour> {
    const COUNT: usize = 10;
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY: OnceLock<BlendMap<Colour>> = OnceLock::new();
    static MAPS: [OnceLock<BlendMap<Colour>>; COUNT] = [EMPTY; COUNT];
    let slot = &MAPS[which as usize];
    BlendMapPtr::Static(slot.get_or_init(|| entries_of(&table(which))))
}
