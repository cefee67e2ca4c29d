use serde::Serialize;

use crate::express::{Express, EPSILON};

/// Red, green, blue, filter and transmit. Channels are unclamped until
/// something explicitly clips them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Colour {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub filter: f64,
    pub transmit: f64,
}

impl Colour {
    pub const BLACK: Colour = Colour::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Colour = Colour::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red,
            green,
            blue,
            filter: 0.0,
            transmit: 0.0,
        }
    }

    pub const fn new(red: f64, green: f64, blue: f64, filter: f64, transmit: f64) -> Self {
        Self {
            red,
            green,
            blue,
            filter,
            transmit,
        }
    }

    /// Channels from the leading terms of `e`; channels past its arity
    /// keep their current value.
    pub fn set_from(&mut self, e: &Express) {
        let mut channels = self.channels();
        for (i, v) in e.values().iter().enumerate() {
            channels[i] = *v;
        }
        *self = Colour::from_channels(channels);
    }

    pub fn from_express(e: &Express) -> Self {
        let mut c = Colour::default();
        c.set_from(e);
        c
    }

    pub fn from_channels(c: [f64; 5]) -> Self {
        Self::new(c[0], c[1], c[2], c[3], c[4])
    }

    pub fn channels(&self) -> [f64; 5] {
        [self.red, self.green, self.blue, self.filter, self.transmit]
    }

    pub fn to_express(&self) -> Express {
        Express::colour(self.red, self.green, self.blue, self.filter, self.transmit)
    }

    /// Luminance-weighted grey.
    pub fn greyscale(&self) -> f64 {
        self.red * 0.297 + self.green * 0.589 + self.blue * 0.114
    }

    pub fn clipped(&self) -> Colour {
        let c = self.channels().map(|v| v.clamp(0.0, 1.0));
        Colour::from_channels(c)
    }

    pub fn is_transparent(&self) -> bool {
        self.filter.abs() > EPSILON || self.transmit.abs() > EPSILON
    }

    pub fn add(&self, other: &Colour) -> Colour {
        let (a, b) = (self.channels(), other.channels());
        Colour::from_channels(std::array::from_fn(|i| a[i] + b[i]))
    }

    pub fn scale(&self, k: f64) -> Colour {
        Colour::from_channels(self.channels().map(|v| v * k))
    }

    /// `self + t * (other - self)`.
    pub fn lerp(&self, other: &Colour, t: f64) -> Colour {
        let (a, b) = (self.channels(), other.channels());
        Colour::from_channels(std::array::from_fn(|i| a[i] + t * (b[i] - a[i])))
    }

    /// Exact equality of the underlying bit patterns.
    pub fn bitwise_eq(&self, other: &Colour) -> bool {
        self.channels()
            .iter()
            .zip(other.channels().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

/// Decode one sRGB-encoded channel to linear light.
pub fn srgb_decode(x: f64) -> f64 {
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// Encode linear light with a plain power-law working gamma.
pub fn gamma_encode(x: f64, gamma: f64) -> f64 {
    if gamma == 1.0 {
        x
    } else {
        x.signum() * x.abs().powf(1.0 / gamma)
    }
}

/// sRGB value as seen under the scene's working gamma.
pub fn srgb_to_working(x: f64, gamma: f64) -> f64 {
    gamma_encode(srgb_decode(x), gamma)
}
