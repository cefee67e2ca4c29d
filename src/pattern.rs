//! Pattern evaluation: the callbacks the shading side uses to turn a
//! parsed pigment or normal into a colour or a perturbed normal at a point.

use std::f64::consts::PI;

use crate::blend_map::BlendMap;
use crate::colour::Colour;
use crate::express::{Express, EPSILON};
use crate::function::FunctionContext;
use crate::material::{NormalMap, Pattern, PatternKind, Pigment, PigmentMap, TNormal, Turbulence, WaveType};
use crate::vector::Vector3;

/// Points are clamped to this range before a pattern sees them.
const COORDINATE_LIMIT: f64 = 1.0e17;

const HEX_X_FACTOR: f64 = 0.5;
const HEX_Z_FACTOR: f64 = 0.866025404;

/// Tetrahedral sample directions for slope-based normals.
const PYRAMID: [Vector3; 4] = [
    Vector3::new(0.942809041, -0.333333333, 0.0),
    Vector3::new(-0.471404521, -0.333333333, 0.816496581),
    Vector3::new(-0.471404521, -0.333333333, -0.816496581),
    Vector3::new(0.0, 1.0, 0.0),
];

// ── Noise ──────────────────────────────────────────────────────────────

/// Scalar and vector noise used by turbulence and noise-driven patterns.
pub trait NoiseSource {
    /// Noise in roughly `[0, 1]`.
    fn noise(&self, p: Vector3) -> f64;

    /// Vector noise, each component in roughly `[-1, 1]`.
    fn dnoise(&self, p: Vector3) -> Vector3;
}

/// Deterministic value noise on the integer lattice.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatticeNoise;

fn lattice_hash(x: i64, y: i64, z: i64) -> f64 {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ (z as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    h ^= h >> 29;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h ^= h >> 32;
    (h >> 11) as f64 / (1u64 << 53) as f64
}

fn smooth(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

impl NoiseSource for LatticeNoise {
    fn noise(&self, p: Vector3) -> f64 {
        let (fx, fy, fz) = (p.x.floor(), p.y.floor(), p.z.floor());
        let (ix, iy, iz) = (fx as i64, fy as i64, fz as i64);
        let (sx, sy, sz) = (smooth(p.x - fx), smooth(p.y - fy), smooth(p.z - fz));

        let corner = |dx: i64, dy: i64, dz: i64| lattice_hash(ix + dx, iy + dy, iz + dz);
        let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), sx);
        let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), sx);
        let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), sx);
        let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), sx);
        lerp(lerp(x00, x10, sy), lerp(x01, x11, sy), sz)
    }

    fn dnoise(&self, p: Vector3) -> Vector3 {
        let offset = |dx: f64, dy: f64, dz: f64| 2.0 * self.noise(p + Vector3::new(dx, dy, dz)) - 1.0;
        Vector3::new(offset(31.4, 0.0, 0.0), offset(0.0, 47.2, 0.0), offset(0.0, 0.0, 59.3))
    }
}

/// Fractal sum of `octaves` noise samples.
pub fn turbulence(noise: &dyn NoiseSource, p: Vector3, turb: &Turbulence) -> f64 {
    let mut value = noise.noise(p);
    let (mut l, mut o) = (turb.lambda, turb.omega);
    for i in 2..=turb.octaves {
        value += o * noise.noise(p * l);
        if i < turb.octaves {
            l *= turb.lambda;
            o *= turb.omega;
        }
    }
    value
}

/// Vector-valued counterpart of `turbulence`.
pub fn dturbulence(noise: &dyn NoiseSource, p: Vector3, turb: &Turbulence) -> Vector3 {
    let mut result = noise.dnoise(p);
    let (mut l, mut o) = (turb.lambda, turb.omega);
    for i in 2..=turb.octaves {
        result = result + noise.dnoise(p * l) * o;
        if i < turb.octaves {
            l *= turb.lambda;
            o *= turb.omega;
        }
    }
    result
}

// ── Wave shaping ───────────────────────────────────────────────────────

/// Quantised sine over one period of `value`.
pub fn cycloidal(value: f64) -> f64 {
    let tau = 2.0 * PI;
    if value >= 0.0 {
        (((value - value.floor()) * 50000.0).trunc() / 50000.0 * tau).sin()
    } else {
        -(((-(value + (-value).floor())) * 50000.0).trunc() / 50000.0 * tau).sin()
    }
}

pub fn triangle_wave(value: f64) -> f64 {
    let offset = if value >= 0.0 {
        value - value.floor()
    } else {
        value + 1.0 + value.abs().floor()
    };
    if offset >= 0.5 {
        2.0 * (1.0 - offset)
    } else {
        2.0 * offset
    }
}

fn shape_wave(pattern: &Pattern, raw: f64) -> f64 {
    let mut value = raw;
    if pattern.frequency != 0.0 {
        value = (value * pattern.frequency + pattern.phase) % 1.00001;
    }
    if value < 0.0 {
        value -= value.floor();
    }
    match pattern.wave {
        WaveType::Ramp => value,
        WaveType::Sine => (1.0 + cycloidal(value)) * 0.5,
        WaveType::Triangle => triangle_wave(value),
        WaveType::Scallop => cycloidal(value * 0.5).abs(),
        WaveType::Cubic => value * value * (-2.0 * value + 3.0),
        WaveType::Poly => value.powf(pattern.exponent),
    }
}

// ── Pattern evaluation ─────────────────────────────────────────────────

/// Map a world point into pattern space: undo the pattern transform, then
/// apply turbulence unless the pattern consumes it itself.
pub fn warp_point(pattern: &Pattern, point: Vector3, noise: &dyn NoiseSource) -> Vector3 {
    let mut p = pattern.transform.inverse_transform_point(point);
    if let Some(turb) = &pattern.turbulence {
        if !pattern.kind.handles_turbulence() {
            p += dturbulence(noise, p, turb) * turb.amount;
        }
    }
    p.clamp(Vector3::splat(-COORDINATE_LIMIT), Vector3::splat(COORDINATE_LIMIT))
}

/// Pattern value at a world point.
pub fn evaluate_pattern(pattern: &Pattern, point: Vector3, noise: &dyn NoiseSource) -> f64 {
    evaluate_warped(pattern, warp_point(pattern, point, noise), noise)
}

/// Pattern value at a point already in pattern space.
pub fn evaluate_warped(pattern: &Pattern, p: Vector3, noise: &dyn NoiseSource) -> f64 {
    let raw = raw_value(pattern, p, noise);
    if pattern.kind.is_discrete() {
        raw
    } else {
        shape_wave(pattern, raw)
    }
}

/// 1 minus `r` inside the unit range; densities outside it wrap.
fn clip_density(r: f64) -> f64 {
    if r < 0.0 {
        1.0
    } else if r > 1.0 {
        0.0
    } else {
        1.0 - r
    }
}

fn raw_value(pattern: &Pattern, p: Vector3, noise: &dyn NoiseSource) -> f64 {
    match &pattern.kind {
        PatternKind::Plain | PatternKind::Average | PatternKind::UvMapping => 0.0,
        PatternKind::Checker => checker(p),
        PatternKind::Hexagon => hexagon(p),
        PatternKind::Brick { size, mortar } => brick(p, *size, *mortar),
        PatternKind::Cubic => cubic(p),
        PatternKind::Gradient { direction } => {
            let r = p.dot(*direction);
            if r > 1.0 {
                r % 1.0
            } else {
                r
            }
        }
        PatternKind::Onion => p.length() % 1.0,
        PatternKind::Radial => {
            if p.x.abs() < 0.001 && p.z.abs() < 0.001 {
                0.25
            } else {
                0.25 + (p.x.atan2(p.z) + PI) / (2.0 * PI)
            }
        }
        PatternKind::Spherical => clip_density(p.length()),
        PatternKind::Boxed => clip_density(p.x.abs().max(p.y.abs()).max(p.z.abs())),
        PatternKind::Leopard => {
            let s = (p.x.sin() + p.y.sin() + p.z.sin()) / 3.0;
            s * s
        }
        PatternKind::Wood => {
            let (mut x, mut y) = (p.x, p.y);
            if let Some(turb) = &pattern.turbulence {
                let t = dturbulence(noise, p, turb);
                x += cycloidal((p.x + t.x) * turb.amount.x);
                y += cycloidal((p.y + t.y) * turb.amount.y);
            }
            (x * x + y * y).sqrt()
        }
        PatternKind::Marble => match &pattern.turbulence {
            Some(turb) => p.x + turb.amount.x * turbulence(noise, p, turb),
            None => p.x,
        },
        PatternKind::Agate { turb_scale } => {
            let turb = pattern.turbulence.unwrap_or_default();
            let t = turb_scale * turbulence(noise, p, &turb);
            let v = 0.5 * (cycloidal(1.3 * t + 1.1 * p.z) + 1.0);
            if v < 0.0 {
                0.0
            } else {
                v.min(1.0).powf(0.77)
            }
        }
        PatternKind::Bozo | PatternKind::Spotted | PatternKind::Bumps => noise.noise(p),
        PatternKind::Function { function } => {
            let mut ctx = FunctionContext::new();
            match ctx.call(function, &[p.x, p.y, p.z]) {
                Ok(values) => {
                    let v = values.first().copied().unwrap_or(0.0);
                    if v > 1.0 {
                        v % 1.0
                    } else {
                        v
                    }
                }
                Err(e) => {
                    log::warn!("function pattern: {e}");
                    0.0
                }
            }
        }
    }
}

fn checker(p: Vector3) -> f64 {
    let sum = (p.x + EPSILON).floor() + (p.y + EPSILON).floor() + (p.z + EPSILON).floor();
    if (sum as i64) & 1 == 1 {
        1.0
    } else {
        0.0
    }
}

fn cubic(p: Vector3) -> f64 {
    let (ax, ay, az) = (p.x.abs(), p.y.abs(), p.z.abs());
    if p.x >= 0.0 && p.x >= ay && p.x >= az {
        0.0
    } else if p.y >= 0.0 && p.y >= ax && p.y >= az {
        1.0
    } else if p.z >= 0.0 && p.z >= ax && p.z >= ay {
        2.0
    } else if p.x < 0.0 && p.x <= -ay && p.x <= -az {
        3.0
    } else if p.y < 0.0 && p.y <= -ax && p.y <= -az {
        4.0
    } else {
        5.0
    }
}

fn hexagon(p: Vector3) -> f64 {
    let x = p.x.abs();
    // keep negative z from mirroring across the x axis
    let z = if p.z < 0.0 { 5.196152424 - p.z.abs() } else { p.z };

    let mut xs = x / HEX_X_FACTOR;
    let mut zs = z / HEX_Z_FACTOR;
    xs -= (xs / 6.0).floor() * 6.0;
    zs -= (zs / 6.0).floor() * 6.0;

    let xm = (xs.floor() as i64).rem_euclid(6);
    let zm = (zs.floor() as i64).rem_euclid(6);

    let value = match xm {
        0 | 5 => match zm {
            0 | 5 => 0.0,
            1 | 2 => 1.0,
            _ => 2.0,
        },
        2 | 3 => match zm {
            0 | 1 => 2.0,
            2 | 3 => 0.0,
            _ => 1.0,
        },
        _ => {
            let mut xl = xs - xm as f64;
            let zl = zs - zm as f64;
            if (xm + zm) % 2 == 1 {
                xl = 1.0 - xl;
            }
            if xl == 0.0 {
                xl = 0.0001;
            }
            if zl / xl < 1.0 {
                match zm {
                    0 | 3 => 0.0,
                    2 | 5 => 1.0,
                    _ => 2.0,
                }
            } else {
                match zm {
                    0 | 3 => 2.0,
                    2 | 5 => 0.0,
                    _ => 1.0,
                }
            }
        }
    };
    value % 3.0
}

/// Fractional part as the brick formula takes it: truncate, then wrap
/// negatives into `[0, 1)`.
fn brick_frac(v: f64) -> f64 {
    let f = v - v.trunc();
    if f < 0.0 {
        f + 1.0
    } else {
        f
    }
}

fn brick(p: Vector3, size: Vector3, mortar: f64) -> f64 {
    let fudge = EPSILON + mortar;
    let (x, y, z) = (p.x + fudge, p.y + fudge, p.z + fudge);
    let (mw, mh, md) = (mortar / size.x, mortar / size.y, mortar / size.z);

    if brick_frac(y / size.y) <= mh {
        return 0.0;
    }
    let row = brick_frac((y / size.y) * 0.5);

    if brick_frac(x / size.x) <= mw && row <= 0.5 {
        return 0.0;
    }
    if brick_frac(x / size.x + 0.5) <= mw && row > 0.5 {
        return 0.0;
    }
    if brick_frac(z / size.z) <= md && row > 0.5 {
        return 0.0;
    }
    if brick_frac(z / size.z + 0.5) <= md && row <= 0.5 {
        return 0.0;
    }
    1.0
}

// ── Pigments ───────────────────────────────────────────────────────────

/// Colour of `pigment` at a world point.
pub fn compute_pigment(pigment: &Pigment, point: Vector3, noise: &dyn NoiseSource) -> Colour {
    let pattern = &pigment.pattern;
    match (&pattern.kind, &pigment.map) {
        (PatternKind::Plain, _) => pigment.colour,
        (PatternKind::UvMapping, Some(PigmentMap::Pigment(map))) => match map.entries().first() {
            Some(entry) => compute_pigment(&entry.data, Vector3::new(point.x, point.y, 0.0), noise),
            None => pigment.colour,
        },
        (PatternKind::Average, Some(PigmentMap::Colour(map))) => map.weighted_average(),
        (PatternKind::Average, Some(PigmentMap::Pigment(map))) => average_pigments(map, point, noise),
        (_, None) => pattern.kind.default_map().colour_at(evaluate_pattern(pattern, point, noise)),
        (_, Some(PigmentMap::Colour(map))) => map.colour_at(evaluate_pattern(pattern, point, noise)),
        (_, Some(PigmentMap::Pigment(map))) => {
            let value = evaluate_pattern(pattern, point, noise);
            let Some((prev, cur)) = map.search(value) else {
                return pigment.colour;
            };
            let c = compute_pigment(&map.entries()[cur].data, point, noise);
            if prev == cur {
                return c;
            }
            let p = compute_pigment(&map.entries()[prev].data, point, noise);
            p.lerp(&c, map.weight(value, prev, cur))
        }
    }
}

fn average_pigments(map: &BlendMap<Pigment>, point: Vector3, noise: &dyn NoiseSource) -> Colour {
    let total: f64 = map.entries().iter().map(|e| e.value).sum();
    if total == 0.0 {
        return Colour::BLACK;
    }
    map.entries()
        .iter()
        .fold(Colour::BLACK, |acc, e| acc.add(&compute_pigment(&e.data, point, noise).scale(e.value)))
        .scale(1.0 / total)
}

// ── Normals ────────────────────────────────────────────────────────────

fn hermite_cubic(t: f64, a: &Express, b: &Express) -> f64 {
    let (a0, a1, b0, b1) = (a.get(0), a.get(1), b.get(0), b.get(1));
    let tt = t * t;
    let ttt = tt * t;
    ttt * (a1 + b1 + 2.0 * (a0 - b0)) - tt * (2.0 * a1 + b1 + 3.0 * (a0 - b0)) + t * a1 + a0
}

/// Height through a slope map; the raw value when there is none.
pub fn slope_value(value: f64, map: Option<&BlendMap<Express>>) -> f64 {
    let Some(map) = map else {
        return value;
    };
    let Some((prev, cur)) = map.search(value) else {
        return value;
    };
    let entries = map.entries();
    if prev == cur {
        return entries[cur].data.get(0);
    }
    hermite_cubic(map.weight(value, prev, cur), &entries[prev].data, &entries[cur].data)
}

/// Perturb a surface normal by `tnormal` at a world point.
pub fn perturb_normal(normal: Vector3, tnormal: &TNormal, point: Vector3, noise: &dyn NoiseSource) -> Vector3 {
    let pattern = &tnormal.pattern;

    if let Some(NormalMap::Normal(map)) = &tnormal.map {
        match pattern.kind {
            PatternKind::UvMapping => {
                let Some(entry) = map.entries().first() else {
                    return normal;
                };
                let n = perturb_normal(normal, &entry.data, Vector3::new(point.x, point.y, 0.0), noise);
                return n.try_normalize().unwrap_or(n);
            }
            PatternKind::Average => {
                let total: f64 = map.entries().iter().map(|e| e.value).sum();
                if total == 0.0 {
                    return normal;
                }
                let sum = map.entries().iter().fold(Vector3::ZERO, |acc, e| {
                    acc + perturb_normal(normal, &e.data, point, noise) * e.value
                });
                let n = sum * (1.0 / total);
                return n.try_normalize().unwrap_or(n);
            }
            _ => {
                let value = evaluate_pattern(pattern, point, noise);
                let Some((prev, cur)) = map.search(value) else {
                    return normal;
                };
                let mut n = perturb_normal(normal, &map.entries()[cur].data, point, noise);
                if prev != cur {
                    let p = perturb_normal(normal, &map.entries()[prev].data, point, noise);
                    let w = map.weight(value, prev, cur);
                    n = p * (1.0 - w) + n * w;
                }
                return n.try_normalize().unwrap_or(n);
            }
        }
    }

    let to_pattern = pattern.transform.inverted();
    let mut n = to_pattern.transform_normal(normal);
    let tp = warp_point(pattern, point, noise);

    match pattern.kind {
        PatternKind::Bumps => {
            n = n + noise.dnoise(tp) * tnormal.amount;
        }
        _ => {
            let slopes = match &tnormal.map {
                Some(NormalMap::Slope(map)) => Some(&**map),
                _ => None,
            };
            let amount = tnormal.amount * -5.0 * (0.02 / tnormal.delta);
            for dir in PYRAMID {
                let sample = evaluate_warped(pattern, tp + dir * tnormal.delta, noise);
                n = n + dir * (slope_value(sample, slopes) * amount);
            }
        }
    }

    pattern.transform.transform_normal(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend_map::BlendMap;
    use crate::material::TNormal;
    use crate::vector::Transform;

    const NOISE: LatticeNoise = LatticeNoise;

    #[test]
    fn checker_alternates() {
        let p = Pattern::new(PatternKind::Checker);
        assert_eq!(evaluate_pattern(&p, Vector3::new(0.5, 0.5, 0.5), &NOISE), 0.0);
        assert_eq!(evaluate_pattern(&p, Vector3::new(1.5, 0.5, 0.5), &NOISE), 1.0);
        assert_eq!(evaluate_pattern(&p, Vector3::new(-0.5, 0.5, 0.5), &NOISE), 1.0);
    }

    #[test]
    fn cubic_picks_dominant_axis() {
        let p = Pattern::new(PatternKind::Cubic);
        assert_eq!(evaluate_pattern(&p, Vector3::new(2.0, 1.0, 0.0), &NOISE), 0.0);
        assert_eq!(evaluate_pattern(&p, Vector3::new(0.0, -3.0, 1.0), &NOISE), 4.0);
        assert_eq!(evaluate_pattern(&p, Vector3::new(0.0, 0.0, -1.0), &NOISE), 5.0);
    }

    #[test]
    fn hexagon_values_are_indices() {
        let p = Pattern::new(PatternKind::Hexagon);
        for i in 0..50 {
            let v = evaluate_pattern(&p, Vector3::new(i as f64 * 0.37, 0.0, i as f64 * 0.21), &NOISE);
            assert!(v == 0.0 || v == 1.0 || v == 2.0);
        }
    }

    #[test]
    fn gradient_ramps_with_transform() {
        let mut p = Pattern::new(PatternKind::Gradient {
            direction: Vector3::new(1.0, 0.0, 0.0),
        });
        assert!((evaluate_pattern(&p, Vector3::new(0.25, 0.0, 0.0), &NOISE) - 0.25).abs() < 1e-10);
        p.apply_transform(&Transform::scaling(Vector3::splat(2.0)));
        assert!((evaluate_pattern(&p, Vector3::new(0.5, 0.0, 0.0), &NOISE) - 0.25).abs() < 1e-10);
    }

    #[test]
    fn boxed_and_spherical_fall_off() {
        let b = Pattern::new(PatternKind::Boxed);
        assert_eq!(evaluate_pattern(&b, Vector3::ZERO, &NOISE), 1.0);
        assert_eq!(evaluate_pattern(&b, Vector3::new(2.0, 0.0, 0.0), &NOISE), 0.0);
        let s = Pattern::new(PatternKind::Spherical);
        assert!((evaluate_pattern(&s, Vector3::new(0.0, 0.5, 0.0), &NOISE) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn waves_shape_the_ramp() {
        let mut p = Pattern::new(PatternKind::Gradient {
            direction: Vector3::new(1.0, 0.0, 0.0),
        });
        p.wave = WaveType::Triangle;
        assert!((evaluate_pattern(&p, Vector3::new(0.75, 0.0, 0.0), &NOISE) - 0.5).abs() < 1e-9);
        p.wave = WaveType::Cubic;
        assert!((evaluate_pattern(&p, Vector3::new(0.5, 0.0, 0.0), &NOISE) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn triangle_and_cycloidal() {
        assert_eq!(triangle_wave(0.25), 0.5);
        assert_eq!(triangle_wave(0.75), 0.5);
        assert!(cycloidal(0.25) > 0.999);
        assert!(cycloidal(-0.25) < -0.999);
    }

    #[test]
    fn noise_is_bounded_and_repeatable() {
        for i in 0..200 {
            let p = Vector3::new(i as f64 * 0.173, i as f64 * -0.311, i as f64 * 0.057);
            let v = NOISE.noise(p);
            assert!((0.0..=1.0).contains(&v));
            assert_eq!(v, NOISE.noise(p));
        }
    }

    #[test]
    fn brick_has_mortar_lines() {
        let p = Pattern::new(PatternKind::Brick {
            size: Vector3::new(8.0, 3.0, 4.5),
            mortar: 0.5,
        });
        assert_eq!(evaluate_pattern(&p, Vector3::new(2.0, 2.8, 1.0), &NOISE), 0.0);
        assert_eq!(evaluate_pattern(&p, Vector3::new(2.0, 1.5, 1.0), &NOISE), 1.0);
    }

    #[test]
    fn pigment_uses_default_map_when_none_given() {
        let pigment = Pigment {
            pattern: Pattern::new(PatternKind::Checker),
            ..Pigment::default()
        };
        let c = compute_pigment(&pigment, Vector3::new(0.5, 0.5, 0.5), &NOISE);
        assert_eq!(c, Colour::rgb(0.0, 0.0, 1.0));
        let c = compute_pigment(&pigment, Vector3::new(1.5, 0.5, 0.5), &NOISE);
        assert_eq!(c, Colour::rgb(0.0, 1.0, 0.0));
    }

    #[test]
    fn plain_pigment_is_its_colour() {
        let pigment = Pigment::plain(Colour::rgb(0.2, 0.4, 0.6));
        assert_eq!(compute_pigment(&pigment, Vector3::new(9.0, 9.0, 9.0), &NOISE), pigment.colour);
    }

    #[test]
    fn pigment_map_blends_sub_pigments() {
        let mut map = BlendMap::new();
        map.push(0.0, Pigment::plain(Colour::BLACK));
        map.push(1.0, Pigment::plain(Colour::WHITE));
        let pigment = Pigment {
            pattern: Pattern::new(PatternKind::Gradient {
                direction: Vector3::new(1.0, 0.0, 0.0),
            }),
            map: Some(PigmentMap::Pigment(map.finish())),
            ..Pigment::default()
        };
        let c = compute_pigment(&pigment, Vector3::new(0.25, 0.0, 0.0), &NOISE);
        assert!((c.red - 0.25).abs() < 1e-9);
    }

    #[test]
    fn flat_pattern_leaves_normal_alone() {
        // a plain pattern is constant, so every slope sample cancels out
        let tnormal = TNormal::default();
        let n = perturb_normal(Vector3::new(0.0, 1.0, 0.0), &tnormal, Vector3::new(0.3, 0.2, 0.1), &NOISE);
        let sum = PYRAMID.iter().fold(Vector3::ZERO, |acc, d| acc + *d);
        assert!(sum.length() < 1e-8);
        assert!((n.y - 1.0).abs() < 1e-8);
    }

    #[test]
    fn bumps_move_the_normal() {
        let tnormal = TNormal {
            pattern: Pattern::new(PatternKind::Bumps),
            amount: 1.0,
            ..TNormal::default()
        };
        let n = perturb_normal(Vector3::new(0.0, 1.0, 0.0), &tnormal, Vector3::new(0.3, 0.2, 0.1), &NOISE);
        assert_ne!(n, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn slope_map_hermite_endpoints() {
        let mut map = BlendMap::new();
        map.push(0.0, Express::uv(0.0, 1.0));
        map.push(1.0, Express::uv(1.0, 0.0));
        assert_eq!(slope_value(0.0, Some(&map)), 0.0);
        assert!((slope_value(1.0, Some(&map)) - 1.0).abs() < 1e-12);
        assert_eq!(slope_value(0.3, None), 0.3);
    }
}
