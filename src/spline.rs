//! Splines: parameter-sorted knots interpolated under one of four rules.

use std::any::Any;
use std::cell::OnceCell;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{Result, SceneError};
use crate::express::{Arity, Express};
use crate::symbols::{Declarable, SymbolKind};

/// Largest number of live handles to one spline.
pub const MAX_SPLINE_REFERENCES: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplineKind {
    Linear,
    Quadratic,
    /// `cubic_spline` in scene files.
    CatmullRom,
    Natural,
}

impl SplineKind {
    pub fn keyword(self) -> &'static str {
        match self {
            SplineKind::Linear => "linear_spline",
            SplineKind::Quadratic => "quadratic_spline",
            SplineKind::CatmullRom => "cubic_spline",
            SplineKind::Natural => "natural_spline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplineEntry {
    pub par: f64,
    pub vec: [f64; 5],
}

#[derive(Debug, Serialize)]
pub struct GenericSpline {
    kind: SplineKind,
    entries: Vec<SplineEntry>,
    terms: Arity,
    /// Second-derivative coefficients for natural splines.
    #[serde(skip)]
    coeffs: OnceCell<Vec<[f64; 5]>>,
}

impl Clone for GenericSpline {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            entries: self.entries.clone(),
            terms: self.terms,
            coeffs: OnceCell::new(),
        }
    }
}

impl GenericSpline {
    pub fn new(kind: SplineKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            terms: Arity::Uv,
            coeffs: OnceCell::new(),
        }
    }

    /// Copy of this spline interpolated under a different rule.
    pub fn with_kind(&self, kind: SplineKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> SplineKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: SplineKind) {
        self.kind = kind;
        self.coeffs = OnceCell::new();
    }

    pub fn terms(&self) -> Arity {
        self.terms
    }

    pub fn set_terms(&mut self, terms: Arity) {
        self.terms = terms;
    }

    pub fn entries(&self) -> &[SplineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first knot whose parameter is not below `t`: 0 at or
    /// before the first knot, `len()` at or after the last.
    pub fn findt(&self, t: f64) -> usize {
        let se = &self.entries;
        let n = se.len();
        if n == 0 || t <= se[0].par {
            return 0;
        }
        if t >= se[n - 1].par {
            return n;
        }
        let mut i = n / 2;
        if t > se[i].par {
            let mut upper = n - 1;
            while upper - i > 1 {
                let mid = i + (upper - i) / 2;
                if t > se[mid].par {
                    i = mid;
                } else {
                    upper = mid;
                }
            }
            upper
        } else {
            let mut lower = 0;
            while i - lower > 1 {
                let mid = lower + (i - lower) / 2;
                if t > se[mid].par {
                    lower = mid;
                } else {
                    i = mid;
                }
            }
            i
        }
    }

    /// Add a knot, replacing any knot at exactly the same parameter.
    pub fn insert(&mut self, par: f64, value: &Express) {
        self.coeffs = OnceCell::new();
        let mut vec = [0.0; 5];
        for (k, slot) in vec.iter_mut().enumerate() {
            *slot = value.get(k);
        }

        let mut i = self.findt(par);
        let n = self.entries.len();
        let replace = if n == 0 {
            false
        } else if i < n {
            self.entries[i].par == par
        } else if self.entries[i - 1].par == par {
            i -= 1;
            true
        } else {
            false
        };

        if replace {
            self.entries[i].vec = vec;
        } else {
            self.entries.insert(i, SplineEntry { par, vec });
        }
    }

    /// Value at parameter `p`, with the spline's arity.
    pub fn get(&self, p: f64) -> Express {
        let mut out = [0.0; 5];
        let n = self.entries.len();
        if n == 1 {
            out = self.entries[0].vec;
        } else if n > 1 {
            let i = self.findt(p);
            for (k, slot) in out.iter_mut().enumerate() {
                *slot = self.component(i, k, p);
            }
        }
        Express::from_slice(self.terms, &out)
    }

    fn component(&self, i: usize, k: usize, p: f64) -> f64 {
        let se = &self.entries;
        let n = se.len();
        match self.kind {
            SplineKind::Linear => {
                if i == 0 {
                    se[0].vec[k]
                } else if i >= n {
                    se[n - 1].vec[k]
                } else {
                    linear_interpolate(se, i - 1, k, p)
                }
            }
            SplineKind::Quadratic => {
                if i == 0 {
                    se[0].vec[k]
                } else if i >= n {
                    se[n - 1].vec[k]
                } else if n == 2 {
                    linear_interpolate(se, i - 1, k, p)
                } else if i > 1 {
                    quadratic_interpolate(se, i - 1, k, p)
                } else {
                    quadratic_interpolate(se, i, k, p)
                }
            }
            SplineKind::Natural => {
                if i == 0 {
                    se[0].vec[k]
                } else if i >= n {
                    se[n - 1].vec[k]
                } else {
                    let coeffs = self.coeffs.get_or_init(|| natural_coefficients(se));
                    natural_interpolate(se, coeffs, i - 1, k, p)
                }
            }
            SplineKind::CatmullRom => {
                if n == 2 {
                    (se[0].vec[k] + se[1].vec[k]) / 2.0
                } else if i < 2 {
                    se[1].vec[k]
                } else if i >= n - 1 {
                    se[n - 2].vec[k]
                } else {
                    catmull_rom_interpolate(se, i - 1, k, p)
                }
            }
        }
    }
}

fn linear_interpolate(se: &[SplineEntry], i: usize, k: usize, p: f64) -> f64 {
    let (p1, p2) = (se[i].par, se[i + 1].par);
    let (v1, v2) = (se[i].vec[k], se[i + 1].vec[k]);
    (p - p1) * (v2 - v1) / (p2 - p1) + v1
}

/// Parabola through knots `i-1`, `i` and `i+1`.
fn quadratic_interpolate(se: &[SplineEntry], i: usize, k: usize, p: f64) -> f64 {
    let (p1, p2, p3) = (se[i - 1].par, se[i].par, se[i + 1].par);
    let (v1, v2, v3) = (se[i - 1].vec[k], se[i].vec[k], se[i + 1].vec[k]);

    let n = (p2 - p1) * (p3 - p1) * (p3 - p2);
    let a = (-p2 * v1 + p3 * v1 + p1 * v2 - p3 * v2 - p1 * v3 + p2 * v3) / n;
    let b = (p2 * p2 * v1 - p3 * p3 * v1 - p1 * p1 * v2 + p3 * p3 * v2 + p1 * p1 * v3
        - p2 * p2 * v3)
        / n;
    let c = (-p2 * p2 * p3 * v1 + p2 * p3 * p3 * v1 + p1 * p1 * p3 * v2 - p1 * p3 * p3 * v2
        - p1 * p1 * p2 * v3
        + p1 * p2 * p2 * v3)
        / n;
    (a * p + b) * p + c
}

/// Second derivatives at each knot with zero curvature at both ends.
fn natural_coefficients(se: &[SplineEntry]) -> Vec<[f64; 5]> {
    let n = se.len();
    let mut coeffs = vec![[0.0; 5]; n];
    if n < 3 {
        return coeffs;
    }
    let mut h = vec![0.0; n];
    let mut b = vec![0.0; n];
    let mut u = vec![0.0; n];
    let mut v = vec![0.0; n];

    for k in 0..5 {
        for i in 0..=n - 2 {
            h[i] = se[i + 1].par - se[i].par;
            b[i] = (se[i + 1].vec[k] - se[i].vec[k]) / h[i];
        }
        u[1] = 2.0 * (h[0] + h[1]);
        v[1] = 6.0 * (b[1] - b[0]);
        for i in 2..=n - 2 {
            u[i] = 2.0 * (h[i] + h[i - 1]) - (h[i - 1] * h[i - 1]) / u[i - 1];
            v[i] = 6.0 * (b[i] - b[i - 1]) - (h[i - 1] * v[i - 1]) / u[i - 1];
        }
        coeffs[n - 1][k] = 0.0;
        for i in (1..=n - 2).rev() {
            coeffs[i][k] = (v[i] - h[i] * coeffs[i + 1][k]) / u[i];
        }
        coeffs[0][k] = 0.0;
    }
    coeffs
}

fn natural_interpolate(se: &[SplineEntry], c: &[[f64; 5]], i: usize, k: usize, p: f64) -> f64 {
    let h = se[i + 1].par - se[i].par;
    let d = p - se[i].par;
    let mut tmp = c[i][k] / 2.0 + (d * (c[i + 1][k] - c[i][k])) / (6.0 * h);
    tmp = -(h / 6.0) * (c[i + 1][k] + 2.0 * c[i][k]) + (se[i + 1].vec[k] - se[i].vec[k]) / h + d * tmp;
    se[i].vec[k] + d * tmp
}

/// Hermite segment between knots `i` and `i+1` with Catmull-Rom tangents.
fn catmull_rom_interpolate(se: &[SplineEntry], i: usize, k: usize, p: f64) -> f64 {
    let dt = se[i + 1].par - se[i].par;
    let u = (p - se[i].par) / dt;
    let slope = |a: usize, b: usize| (se[b].vec[k] - se[a].vec[k]) / (se[b].par - se[a].par);
    let dp0 = (slope(i - 1, i) + slope(i, i + 1)) / 2.0 * dt;
    let dp1 = (slope(i + 1, i + 2) + slope(i, i + 1)) / 2.0 * dt;

    let (u2, u3) = (u * u, u * u * u);
    se[i].vec[k] * (2.0 * u3 - 3.0 * u2 + 1.0)
        + se[i + 1].vec[k] * (3.0 * u2 - 2.0 * u3)
        + dp0 * (u3 - 2.0 * u2 + u)
        + dp1 * (u3 - u2)
}

// ── Handles ────────────────────────────────────────────────────────────

/// A shared, immutable spline as bound to an identifier.
#[derive(Debug, Clone)]
pub struct SplineHandle(Rc<GenericSpline>);

impl SplineHandle {
    pub fn new(spline: GenericSpline) -> Self {
        Self(Rc::new(spline))
    }

    /// Another handle to the same spline, for the duration of a call.
    pub fn acquire(&self) -> Result<SplineHandle> {
        if Rc::strong_count(&self.0) >= MAX_SPLINE_REFERENCES {
            return Err(SceneError::internal("Too many unresolved references to single spline"));
        }
        Ok(self.clone())
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn spline(&self) -> &GenericSpline {
        &self.0
    }

    pub fn ptr_eq(&self, other: &SplineHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Serialize for SplineHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl Declarable for SplineHandle {
    fn kind(&self) -> SymbolKind {
        SymbolKind::Spline
    }

    /// Assigning a spline copies its knots.
    fn duplicate(&self) -> Option<Box<dyn Declarable>> {
        Some(Box::new(SplineHandle::new((*self.0).clone())))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn spline(kind: SplineKind, knots: &[(f64, f64)]) -> GenericSpline {
        let mut s = GenericSpline::new(kind);
        s.set_terms(Arity::Float);
        for &(p, v) in knots {
            s.insert(p, &Express::float(v));
        }
        s
    }

    #[test]
    fn dumps_kind_and_arity() {
        let s = spline(SplineKind::CatmullRom, &[(0.0, 1.0), (1.0, 2.0)]);
        let json = serde_json::to_value(&s).expect("serialize");
        assert_eq!(json["kind"], "catmull_rom");
        assert_eq!(json["terms"], "float");
        assert_eq!(json["entries"].as_array().map(|e| e.len()), Some(2));
    }

    #[test]
    fn insert_keeps_order_and_replaces() {
        let s = spline(SplineKind::Linear, &[(1.0, 10.0), (0.0, 0.0), (2.0, 20.0), (1.0, 11.0), (2.0, 22.0)]);
        let pars: Vec<f64> = s.entries().iter().map(|e| e.par).collect();
        assert_eq!(pars, vec![0.0, 1.0, 2.0]);
        assert_eq!(s.entries()[1].vec[0], 11.0);
        assert_eq!(s.entries()[2].vec[0], 22.0);
    }

    #[test]
    fn findt_bounds() {
        let s = spline(SplineKind::Linear, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        assert_eq!(s.findt(-1.0), 0);
        assert_eq!(s.findt(0.0), 0);
        assert_eq!(s.findt(0.5), 1);
        assert_eq!(s.findt(1.0), 1);
        assert_eq!(s.findt(2.5), 3);
        assert_eq!(s.findt(3.0), 4);
    }

    #[test]
    fn linear_clamps_and_interpolates() {
        let s = spline(SplineKind::Linear, &[(0.0, 0.0), (1.0, 10.0)]);
        assert_eq!(s.get(-5.0).first(), 0.0);
        assert_eq!(s.get(5.0).first(), 10.0);
        assert!((s.get(0.25).first() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn quadratic_fits_a_parabola() {
        let s = spline(SplineKind::Quadratic, &[(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)]);
        assert!((s.get(1.5).first() - 2.25).abs() < 1e-10);
        assert!((s.get(0.5).first() - 0.25).abs() < 1e-10);
    }

    #[test]
    fn natural_reproduces_a_line() {
        let s = spline(SplineKind::Natural, &[(0.0, 0.0), (1.0, 2.0), (2.0, 4.0), (4.0, 8.0)]);
        assert!((s.get(3.0).first() - 6.0).abs() < 1e-10);
        assert!((s.get(0.5).first() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn catmull_rom_special_cases() {
        let two = spline(SplineKind::CatmullRom, &[(0.0, 2.0), (1.0, 4.0)]);
        assert_eq!(two.get(0.9).first(), 3.0);

        let s = spline(SplineKind::CatmullRom, &[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        // outside the second-to-penultimate range the inner knots are held
        assert_eq!(s.get(0.5).first(), 1.0);
        assert_eq!(s.get(2.5).first(), 2.0);
        assert!((s.get(1.5).first() - 1.5).abs() < 1e-10);
    }

    #[test]
    fn single_knot_is_constant() {
        let s = spline(SplineKind::Natural, &[(4.0, 7.0)]);
        assert_eq!(s.get(-100.0).first(), 7.0);
    }

    #[test]
    fn result_has_spline_arity() {
        let mut s = GenericSpline::new(SplineKind::Linear);
        s.set_terms(Arity::Vector);
        s.insert(0.0, &Express::vector(1.0, 2.0, 3.0));
        s.insert(1.0, &Express::vector(3.0, 2.0, 1.0));
        let v = s.get(0.5);
        assert_eq!(v.values(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn with_kind_leaves_original_alone() {
        let s = spline(SplineKind::Linear, &[(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)]);
        let q = s.with_kind(SplineKind::Quadratic);
        assert_eq!(s.kind(), SplineKind::Linear);
        assert!((q.get(0.5).first() - 0.25).abs() < 1e-10);
        assert!((s.get(0.5).first() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn handle_duplicate_is_deep() {
        let h = SplineHandle::new(spline(SplineKind::Linear, &[(0.0, 1.0)]));
        let copy = h.duplicate().expect("splines copy");
        let copy = copy.downcast_ref::<SplineHandle>().expect("spline");
        assert!(!copy.ptr_eq(&h));
        let claim = h.acquire().expect("claim");
        assert_eq!(h.ref_count(), 2);
        drop(claim);
        assert_eq!(h.ref_count(), 1);
    }
}
