//! Symbol tables and the scope stack.
//!
//! Every declared identifier lives in a `SymbolEntry`. Entries are shared
//! through `Rc` so a macro parameter can alias a caller's variable, and they
//! carry an explicit reference count on top of that: table membership holds
//! one reference, every alias holds another, and the payload is destroyed
//! when the count reaches zero even if some `Rc` is still around.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{Result, SceneError};
use crate::express::{Arity, Express};

/// Number of hash buckets in one table.
pub const SYMBOL_TABLE_SIZE: usize = 257;

/// Largest reference count an entry may reach.
pub const MAX_ENTRY_REFERENCES: u16 = u16::MAX;

/// What an identifier was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Float,
    Uv,
    Vector,
    Vector4,
    Colour,
    String,
    Pigment,
    Normal,
    Finish,
    Texture,
    ColourMap,
    PigmentMap,
    NormalMap,
    SlopeMap,
    TextureMap,
    Spline,
    Function,
    VectorFunction,
    Transform,
    Array,
    Dictionary,
    Macro,
    /// A function parameter while its body is being parsed.
    Parameter,
}

impl SymbolKind {
    pub fn from_arity(arity: Arity) -> SymbolKind {
        match arity {
            Arity::Float => SymbolKind::Float,
            Arity::Uv => SymbolKind::Uv,
            Arity::Vector => SymbolKind::Vector,
            Arity::Vector4 => SymbolKind::Vector4,
            Arity::Colour => SymbolKind::Colour,
        }
    }

    pub fn arity(self) -> Option<Arity> {
        match self {
            SymbolKind::Float => Some(Arity::Float),
            SymbolKind::Uv => Some(Arity::Uv),
            SymbolKind::Vector => Some(Arity::Vector),
            SymbolKind::Vector4 => Some(Arity::Vector4),
            SymbolKind::Colour => Some(Arity::Colour),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.arity().is_some()
    }

    pub fn name(self) -> &'static str {
        match self {
            SymbolKind::Float => "float identifier",
            SymbolKind::Uv => "uv vector identifier",
            SymbolKind::Vector => "vector identifier",
            SymbolKind::Vector4 => "4d-vector identifier",
            SymbolKind::Colour => "color identifier",
            SymbolKind::String => "string identifier",
            SymbolKind::Pigment => "pigment identifier",
            SymbolKind::Normal => "normal identifier",
            SymbolKind::Finish => "finish identifier",
            SymbolKind::Texture => "texture identifier",
            SymbolKind::ColourMap => "color map identifier",
            SymbolKind::PigmentMap => "pigment map identifier",
            SymbolKind::NormalMap => "normal map identifier",
            SymbolKind::SlopeMap => "slope map identifier",
            SymbolKind::TextureMap => "texture map identifier",
            SymbolKind::Spline => "spline identifier",
            SymbolKind::Function => "function identifier",
            SymbolKind::VectorFunction => "vector function identifier",
            SymbolKind::Transform => "transform identifier",
            SymbolKind::Array => "array identifier",
            SymbolKind::Dictionary => "dictionary identifier",
            SymbolKind::Macro => "macro identifier",
            SymbolKind::Parameter => "function parameter",
        }
    }
}

/// A value that can be bound to an identifier.
///
/// Each payload type knows its own kind and how to deep-copy itself, so the
/// symbol table never switches on the kind to copy or destroy a value.
pub trait Declarable: Any + fmt::Debug {
    fn kind(&self) -> SymbolKind;

    /// Deep copy, or `None` for payloads that can never be duplicated.
    fn duplicate(&self) -> Option<Box<dyn Declarable>>;

    fn to_json(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Declarable {
    pub fn downcast_ref<T: Declarable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Declarable>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Implements `Declarable` for a `Clone + Serialize` payload of fixed kind.
macro_rules! impl_declarable {
    ($ty:ty => $kind:ident) => {
        impl $crate::symbols::Declarable for $ty {
            fn kind(&self) -> $crate::symbols::SymbolKind {
                $crate::symbols::SymbolKind::$kind
            }

            fn duplicate(&self) -> Option<Box<dyn $crate::symbols::Declarable>> {
                Some(Box::new(self.clone()))
            }

            fn to_json(&self) -> serde_json::Value {
                serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
    };
}
pub(crate) use impl_declarable;

impl_declarable!(String => String);

impl Declarable for Express {
    fn kind(&self) -> SymbolKind {
        SymbolKind::from_arity(self.arity())
    }

    fn duplicate(&self) -> Option<Box<dyn Declarable>> {
        Some(Box::new(*self))
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

// ── Entries ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SymbolEntry {
    name: String,
    kind: Cell<SymbolKind>,
    data: RefCell<Option<Box<dyn Declarable>>>,
    refs: Cell<u16>,
}

impl SymbolEntry {
    /// New entry holding `data`, with the single reference its table owns.
    pub fn new(name: &str, data: Box<dyn Declarable>) -> Rc<SymbolEntry> {
        Rc::new(SymbolEntry {
            name: name.to_string(),
            kind: Cell::new(data.kind()),
            data: RefCell::new(Some(data)),
            refs: Cell::new(1),
        })
    }

    /// Entry whose payload does not exist yet, such as a function whose
    /// body is still being parsed.
    pub fn placeholder(name: &str, kind: SymbolKind) -> Rc<SymbolEntry> {
        Rc::new(SymbolEntry {
            name: name.to_string(),
            kind: Cell::new(kind),
            data: RefCell::new(None),
            refs: Cell::new(1),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SymbolKind {
        self.kind.get()
    }

    pub fn ref_count(&self) -> u16 {
        self.refs.get()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_none()
    }

    pub fn data(&self) -> Ref<'_, Option<Box<dyn Declarable>>> {
        self.data.borrow()
    }

    /// Borrow the payload as `T`, if it is one.
    pub fn with<T: Declarable, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.data.borrow();
        let value = data.as_deref()?.downcast_ref::<T>()?;
        Some(f(value))
    }

    /// Mutably borrow the payload as `T`, for element and member stores.
    pub fn with_mut<T: Declarable, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.data.borrow_mut();
        let value = data.as_deref_mut()?.downcast_mut::<T>()?;
        Some(f(value))
    }

    /// Clone the payload out as `T`.
    pub fn get<T: Declarable + Clone>(&self) -> Option<T> {
        self.with(|v: &T| v.clone())
    }

    /// Numeric payloads as an `Express`.
    pub fn express(&self) -> Option<Express> {
        self.get::<Express>()
    }

    /// Replace the payload. The previous payload is dropped.
    pub fn set_data(&self, data: Box<dyn Declarable>) {
        self.kind.set(data.kind());
        *self.data.borrow_mut() = Some(data);
    }

    /// Deep copy of the payload, for assignments from this identifier.
    pub fn copy_value(&self) -> Option<Box<dyn Declarable>> {
        self.data.borrow().as_ref().and_then(|d| d.duplicate())
    }

    pub fn acquire(&self) -> Result<()> {
        let refs = self.refs.get();
        if refs >= MAX_ENTRY_REFERENCES {
            return Err(SceneError::internal("Too many unresolved references to symbol"));
        }
        self.refs.set(refs + 1);
        Ok(())
    }

    /// Drop one reference, destroying the payload when none remain.
    pub fn release(&self) -> Result<()> {
        let refs = self.refs.get();
        if refs == 0 {
            return Err(SceneError::internal(
                "Internal error: Symbol reference counter underflow",
            ));
        }
        self.refs.set(refs - 1);
        if refs == 1 {
            if let Ok(mut data) = self.data.try_borrow_mut() {
                data.take();
            }
        }
        Ok(())
    }

    /// Deep copy of the whole entry with a fresh reference count.
    ///
    /// # Panics
    /// If the payload cannot be duplicated (macros). The grammar never
    /// copies a table that holds one.
    pub fn duplicate(&self) -> Rc<SymbolEntry> {
        let data = match self.data.borrow().as_ref() {
            None => None,
            Some(d) => match d.duplicate() {
                Some(copy) => Some(copy),
                None => panic!("cannot copy identifier '{}' of kind {:?}", self.name, d.kind()),
            },
        };
        Rc::new(SymbolEntry {
            name: self.name.clone(),
            kind: Cell::new(self.kind.get()),
            data: RefCell::new(data),
            refs: Cell::new(1),
        })
    }

    fn to_json(&self) -> serde_json::Value {
        match self.data.borrow().as_ref() {
            Some(d) => serde_json::json!({ "kind": d.kind(), "value": d.to_json() }),
            None => serde_json::json!({ "kind": self.kind(), "value": null }),
        }
    }
}

// ── Tables ─────────────────────────────────────────────────────────────

/// A name bound to an entry. Aliases bind a second name to the same entry.
#[derive(Debug)]
pub struct Binding {
    pub name: String,
    pub entry: Rc<SymbolEntry>,
}

pub fn hash_name(name: &str) -> usize {
    let mut h: u32 = 0;
    for b in name.bytes() {
        h = (h << 1) ^ u32::from(b);
    }
    (h % SYMBOL_TABLE_SIZE as u32) as usize
}

#[derive(Debug)]
pub struct SymbolTable {
    buckets: Vec<Vec<Binding>>,
    len: usize,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            buckets: (0..SYMBOL_TABLE_SIZE).map(|_| Vec::new()).collect(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Always inserts, shadowing any same-name binding in this table.
    pub fn add_symbol(&mut self, name: &str, data: Box<dyn Declarable>) -> Rc<SymbolEntry> {
        let entry = SymbolEntry::new(name, data);
        self.bind(name, Rc::clone(&entry));
        entry
    }

    /// Bind `name` to an existing entry. The caller accounts for the
    /// reference this binding holds; the table releases it when dropped.
    pub fn bind(&mut self, name: &str, entry: Rc<SymbolEntry>) {
        self.buckets[hash_name(name)].insert(
            0,
            Binding {
                name: name.to_string(),
                entry,
            },
        );
        self.len += 1;
    }

    pub fn find(&self, name: &str) -> Option<Rc<SymbolEntry>> {
        self.buckets[hash_name(name)]
            .iter()
            .find(|b| b.name == name)
            .map(|b| Rc::clone(&b.entry))
    }

    /// Unlink and release the first binding of `name`.
    ///
    /// # Panics
    /// If `name` is not bound in this table.
    pub fn remove_symbol(&mut self, name: &str) {
        let bucket = &mut self.buckets[hash_name(name)];
        let Some(index) = bucket.iter().position(|b| b.name == name) else {
            panic!("attempt to remove undeclared identifier '{name}'");
        };
        let binding = bucket.remove(index);
        self.len -= 1;
        release_binding(&binding);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.buckets.iter().flatten()
    }

    /// Copy every entry's payload into a new, independent table.
    pub fn deep_copy(&self) -> SymbolTable {
        let mut copy = SymbolTable::new();
        for (i, bucket) in self.buckets.iter().enumerate() {
            copy.buckets[i] = bucket
                .iter()
                .map(|b| Binding {
                    name: b.name.clone(),
                    entry: b.entry.duplicate(),
                })
                .collect();
        }
        copy.len = self.len;
        copy
    }

    /// Names in sorted order, for stable output.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.iter().map(|b| b.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for name in self.names() {
            if let Some(entry) = self.find(name) {
                map.insert(name.to_string(), entry.to_json());
            }
        }
        serde_json::Value::Object(map)
    }
}

fn release_binding(binding: &Binding) {
    if let Err(e) = binding.entry.release() {
        log::error!("{e} ('{}')", binding.name);
    }
}

impl Drop for SymbolTable {
    fn drop(&mut self) {
        for binding in self.buckets.iter().flatten() {
            release_binding(binding);
        }
    }
}

/// Dictionaries are symbol tables bound as values.
impl Declarable for SymbolTable {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Dictionary
    }

    fn duplicate(&self) -> Option<Box<dyn Declarable>> {
        Some(Box::new(self.deep_copy()))
    }

    fn to_json(&self) -> serde_json::Value {
        SymbolTable::to_json(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── Scope stack ────────────────────────────────────────────────────────

/// Global table at index 0, nested local scopes above it.
#[derive(Debug)]
pub struct SymbolStack {
    tables: Vec<SymbolTable>,
    max_tables: usize,
}

impl SymbolStack {
    pub fn new(max_tables: usize) -> Self {
        Self {
            tables: vec![SymbolTable::new()],
            max_tables: max_tables.max(1),
        }
    }

    /// Number of tables, including the global one.
    pub fn depth(&self) -> usize {
        self.tables.len()
    }

    pub fn push_table(&mut self) -> Result<()> {
        if self.tables.len() >= self.max_tables {
            return Err(SceneError::parse("Too many nested symbol tables"));
        }
        self.tables.push(SymbolTable::new());
        log::trace!("pushed symbol table {}", self.tables.len() - 1);
        Ok(())
    }

    /// Destroy the innermost table. The global table is never popped.
    pub fn pop_table(&mut self) -> bool {
        if self.tables.len() <= 1 {
            return false;
        }
        self.tables.pop();
        log::trace!("popped symbol table {}", self.tables.len());
        true
    }

    /// Innermost binding of `name`.
    pub fn find(&self, name: &str) -> Option<Rc<SymbolEntry>> {
        self.find_with_index(name).map(|(_, e)| e)
    }

    pub fn find_with_index(&self, name: &str) -> Option<(usize, Rc<SymbolEntry>)> {
        self.tables
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, t)| t.find(name).map(|e| (i, e)))
    }

    pub fn table(&self, index: usize) -> &SymbolTable {
        &self.tables[index]
    }

    pub fn table_mut(&mut self, index: usize) -> &mut SymbolTable {
        &mut self.tables[index]
    }

    pub fn global(&self) -> &SymbolTable {
        &self.tables[0]
    }

    pub fn global_mut(&mut self) -> &mut SymbolTable {
        &mut self.tables[0]
    }

    pub fn local_index(&self) -> usize {
        self.tables.len() - 1
    }

    pub fn local_mut(&mut self) -> &mut SymbolTable {
        let i = self.local_index();
        &mut self.tables[i]
    }

    /// Replace any binding of `name` in table `index` with `data`.
    pub fn declare(&mut self, index: usize, name: &str, data: Box<dyn Declarable>) -> Rc<SymbolEntry> {
        let table = &mut self.tables[index];
        if table.find(name).is_some() {
            table.remove_symbol(name);
        }
        table.add_symbol(name, data)
    }
}

// ── Arrays ─────────────────────────────────────────────────────────────

/// A multi-dimensional array of identically-kinded elements.
#[derive(Debug)]
pub struct ArrayValue {
    sizes: Vec<usize>,
    kind: Option<SymbolKind>,
    elements: Vec<Option<Rc<SymbolEntry>>>,
}

/// Most elements one array may hold across all its dimensions.
pub const MAX_ARRAY_ELEMENTS: usize = 1 << 24;

impl ArrayValue {
    pub fn new(sizes: Vec<usize>) -> Result<Self> {
        let len = sizes
            .iter()
            .try_fold(1usize, |total, &size| total.checked_mul(size))
            .filter(|&len| len <= MAX_ARRAY_ELEMENTS)
            .ok_or_else(|| SceneError::parse("Illegal dimension in array."))?;
        Ok(Self {
            sizes,
            kind: None,
            elements: (0..len).map(|_| None).collect(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.sizes.len()
    }

    /// Size of dimension `dim` (0-based).
    pub fn size(&self, dim: usize) -> Option<usize> {
        self.sizes.get(dim).copied()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element_kind(&self) -> Option<SymbolKind> {
        self.kind
    }

    /// Row-major flat index of a full subscript.
    pub fn flat_index(&self, subscripts: &[i64]) -> Result<usize> {
        if subscripts.len() != self.sizes.len() {
            return Err(SceneError::parse("Array subscript out of range"));
        }
        let mut flat = 0usize;
        for (&i, &size) in subscripts.iter().zip(&self.sizes) {
            if i < 0 || i as usize >= size {
                return Err(SceneError::parse("Array subscript out of range"));
            }
            flat = flat * size + i as usize;
        }
        Ok(flat)
    }

    pub fn get(&self, flat: usize) -> Result<Rc<SymbolEntry>> {
        match self.elements.get(flat) {
            Some(Some(entry)) => Ok(Rc::clone(entry)),
            Some(None) => Err(SceneError::parse(
                "Attempt to access uninitialized array element.",
            )),
            None => Err(SceneError::parse("Array subscript out of range")),
        }
    }

    pub fn is_set(&self, flat: usize) -> bool {
        matches!(self.elements.get(flat), Some(Some(_)))
    }

    /// Store `data` at `flat`. The first store fixes the element kind;
    /// numeric values narrower than it are promoted.
    pub fn set(&mut self, flat: usize, data: Box<dyn Declarable>) -> Result<()> {
        if flat >= self.elements.len() {
            return Err(SceneError::parse("Array subscript out of range"));
        }
        let data = match self.kind {
            None => {
                self.kind = Some(data.kind());
                data
            }
            Some(kind) if kind == data.kind() => data,
            Some(kind) => match (kind.arity(), data.downcast_ref::<Express>()) {
                (Some(arity), Some(value)) if value.arity() < arity => {
                    Box::new(value.promote(arity)) as Box<dyn Declarable>
                }
                _ => return Err(SceneError::parse("Attempt to change array type.")),
            },
        };
        let entry = SymbolEntry::new("array element", data);
        if let Some(old) = self.elements[flat].replace(entry) {
            old.release()?;
        }
        Ok(())
    }
}

impl Drop for ArrayValue {
    fn drop(&mut self) {
        for entry in self.elements.iter().flatten() {
            if let Err(e) = entry.release() {
                log::error!("{e} (array element)");
            }
        }
    }
}

impl Declarable for ArrayValue {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Array
    }

    fn duplicate(&self) -> Option<Box<dyn Declarable>> {
        Some(Box::new(ArrayValue {
            sizes: self.sizes.clone(),
            kind: self.kind,
            elements: self
                .elements
                .iter()
                .map(|e| e.as_ref().map(|e| e.duplicate()))
                .collect(),
        }))
    }

    fn to_json(&self) -> serde_json::Value {
        let elements: Vec<serde_json::Value> = self
            .elements
            .iter()
            .map(|e| match e {
                Some(entry) => entry
                    .data()
                    .as_ref()
                    .map(|d| d.to_json())
                    .unwrap_or(serde_json::Value::Null),
                None => serde_json::Value::Null,
            })
            .collect();
        serde_json::json!({ "sizes": self.sizes, "elements": elements })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float(v: f64) -> Box<dyn Declarable> {
        Box::new(Express::float(v))
    }

    fn value_of(entry: &SymbolEntry) -> f64 {
        entry.express().expect("numeric entry").first()
    }

    #[test]
    fn hash_matches_shift_xor() {
        // "ab" -> (97 << 1) ^ 98 = 194 ^ 98 = 160
        assert_eq!(hash_name("a"), 97);
        assert_eq!(hash_name("ab"), 160);
        assert!(hash_name("a_rather_long_identifier_name") < SYMBOL_TABLE_SIZE);
    }

    #[test]
    fn add_shadows_within_one_table() {
        let mut t = SymbolTable::new();
        t.add_symbol("x", float(1.0));
        t.add_symbol("x", float(2.0));
        assert_eq!(t.len(), 2);
        assert_eq!(value_of(&t.find("x").expect("bound")), 2.0);
        t.remove_symbol("x");
        assert_eq!(value_of(&t.find("x").expect("bound")), 1.0);
    }

    #[test]
    #[should_panic(expected = "attempt to remove undeclared identifier")]
    fn removing_absent_symbol_panics() {
        let mut t = SymbolTable::new();
        t.remove_symbol("nope");
    }

    #[test]
    fn scope_shadowing() {
        let mut stack = SymbolStack::new(100);
        stack.global_mut().add_symbol("x", float(1.0));
        stack.push_table().expect("push");
        stack.local_mut().add_symbol("x", float(2.0));
        assert_eq!(value_of(&stack.find("x").expect("bound")), 2.0);
        assert!(stack.pop_table());
        assert_eq!(value_of(&stack.find("x").expect("bound")), 1.0);
    }

    #[test]
    fn global_table_is_never_popped() {
        let mut stack = SymbolStack::new(100);
        assert!(!stack.pop_table());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn nesting_limit() {
        let mut stack = SymbolStack::new(3);
        stack.push_table().expect("push 1");
        stack.push_table().expect("push 2");
        let err = stack.push_table().unwrap_err();
        assert_eq!(err.message(), "Too many nested symbol tables");
    }

    #[test]
    fn alias_survives_table_teardown() {
        let mut stack = SymbolStack::new(100);
        stack.push_table().expect("push");
        let entry = stack.local_mut().add_symbol("v", float(3.0));
        entry.acquire().expect("acquire");
        assert_eq!(entry.ref_count(), 2);
        stack.pop_table();
        assert_eq!(entry.ref_count(), 1);
        assert_eq!(value_of(&entry), 3.0);
        entry.release().expect("release");
        assert!(entry.is_empty());
    }

    #[test]
    fn release_underflow_is_an_error() {
        let entry = SymbolEntry::new("x", float(1.0));
        entry.release().expect("first release");
        let err = entry.release().unwrap_err();
        assert_eq!(err.message(), "Internal error: Symbol reference counter underflow");
    }

    #[test]
    fn acquire_overflow_is_an_error() {
        let entry = SymbolEntry::new("x", float(1.0));
        for _ in 1..MAX_ENTRY_REFERENCES {
            entry.acquire().expect("acquire");
        }
        let err = entry.acquire().unwrap_err();
        assert_eq!(err.message(), "Too many unresolved references to symbol");
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut t = SymbolTable::new();
        t.add_symbol("s", Box::new(String::from("abc")));
        let copy = t.deep_copy();
        let a = t.find("s").expect("bound");
        let b = copy.find("s").expect("bound");
        assert!(!Rc::ptr_eq(&a, &b));
        b.set_data(Box::new(String::from("changed")));
        assert_eq!(a.get::<String>().as_deref(), Some("abc"));
    }

    #[test]
    fn array_typing_and_bounds() {
        let mut a = ArrayValue::new(vec![2, 3]).expect("small array");
        assert_eq!(a.len(), 6);
        let i = a.flat_index(&[1, 2]).expect("in range");
        assert_eq!(i, 5);
        assert!(a.flat_index(&[2, 0]).is_err());
        assert_eq!(
            a.get(0).unwrap_err().message(),
            "Attempt to access uninitialized array element."
        );
        a.set(0, Box::new(Express::vector(1.0, 2.0, 3.0))).expect("set");
        // floats promote into a vector array
        a.set(1, float(4.0)).expect("promote");
        assert_eq!(a.get(1).expect("set").express().expect("numeric").values(), &[4.0, 4.0, 4.0]);
        let err = a.set(2, Box::new(String::from("s"))).unwrap_err();
        assert_eq!(err.message(), "Attempt to change array type.");
    }

    #[test]
    fn array_size_limits() {
        assert!(ArrayValue::new(vec![usize::MAX, 2]).is_err());
        assert!(ArrayValue::new(vec![MAX_ARRAY_ELEMENTS + 1]).is_err());
        assert_eq!(ArrayValue::new(vec![4, 4, 4]).expect("fits").len(), 64);
    }
}
