use palette::{FromColor, Hsv, Srgb};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound of device hue, in degrees.
pub const DEVICE_HUE_MAX: u16 = 360;

/// Upper bound of device saturation and value.
pub const DEVICE_SCALE_MAX: u16 = 1000;

const HEX_LEN: usize = 12;
const HEX_CHUNK: usize = 4;

/// Hue in degrees (0.0 - 360.0), saturation and value in 0.0 - 1.0. This is
/// what sliders and the colour sampler work with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NormalizedHsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl NormalizedHsv {
    pub fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    /// True when every component of `other` is strictly closer than
    /// `tolerance` to this one.
    pub fn within_tolerance(&self, other: &NormalizedHsv, tolerance: f32) -> bool {
        (self.h - other.h).abs() < tolerance
            && (self.s - other.s).abs() < tolerance
            && (self.v - other.v).abs() < tolerance
    }

    pub fn to_device(self) -> DeviceHsv {
        normalized_to_device(self.h, self.s, self.v)
    }

    pub fn to_srgb(self) -> Srgb<u8> {
        let hsv: Hsv = Hsv::new(self.h, self.s.clamp(0.0, 1.0), self.v.clamp(0.0, 1.0));
        let rgb: Srgb = Srgb::from_color(hsv);
        rgb.into_format()
    }
}

/// Device native colour: h 0 - 360, s and v 0 - 1000. Serializes as the
/// `colour_data_v2` object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct DeviceHsv {
    pub h: u16,
    pub s: u16,
    pub v: u16,
}

impl DeviceHsv {
    pub fn new(h: u16, s: u16, v: u16) -> Self {
        Self { h, s, v }
    }

    /// Packed `colour_data` form: four lowercase hex digits each for h, s, v.
    pub fn to_hex(&self) -> String {
        format!("{:04x}{:04x}{:04x}", self.h, self.s, self.v)
    }

    pub fn from_hex(hex: &str) -> Result<DeviceHsv> {
        let malformed = |reason| Error::MalformedColorEncoding {
            input: hex.to_string(),
            reason,
        };

        if hex.len() != HEX_LEN {
            return Err(malformed("expected exactly 12 hex digits"));
        }

        // from_str_radix accepts a leading sign, so check digits up front
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed("contains a non hex digit"));
        }

        let chunk = |i: usize| {
            let digits = &hex[i * HEX_CHUNK..(i + 1) * HEX_CHUNK];
            u16::from_str_radix(digits, 16).map_err(|_| malformed("chunk is not valid hex"))
        };

        Ok(DeviceHsv {
            h: chunk(0)?,
            s: chunk(1)?,
            v: chunk(2)?,
        })
    }

    pub fn to_normalized(&self) -> NormalizedHsv {
        NormalizedHsv {
            h: f32::from(self.h),
            s: f32::from(self.s) / f32::from(DEVICE_SCALE_MAX),
            v: f32::from(self.v) / f32::from(DEVICE_SCALE_MAX),
        }
    }

    pub fn is_in_range(&self) -> bool {
        self.h <= DEVICE_HUE_MAX && self.s <= DEVICE_SCALE_MAX && self.v <= DEVICE_SCALE_MAX
    }
}

fn round_into(value: f32, max: u16) -> u16 {
    // f32::round rounds half away from zero
    value.round().clamp(0.0, f32::from(max)) as u16
}

pub fn normalized_to_device(h: f32, s: f32, v: f32) -> DeviceHsv {
    DeviceHsv {
        h: round_into(h, DEVICE_HUE_MAX),
        s: round_into(s * f32::from(DEVICE_SCALE_MAX), DEVICE_SCALE_MAX),
        v: round_into(v * f32::from(DEVICE_SCALE_MAX), DEVICE_SCALE_MAX),
    }
}

/// Max/min channel HSV. Achromatic colours get hue 0.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> NormalizedHsv {
    let rgb: Srgb<f32> = Srgb::new(r, g, b).into_format();
    let hsv: Hsv = Hsv::from_color(rgb);

    let mut h = if r == g && g == b {
        0.0
    } else {
        hsv.hue.into_positive_degrees()
    };

    // Float noise just below zero wraps to 360.0
    if h >= 360.0 {
        h -= 360.0;
    }

    NormalizedHsv {
        h,
        s: hsv.saturation,
        v: hsv.value,
    }
}

/// Converts a sampled RGBA pixel. Failed reads stay `None` so callers treat a
/// colour read as optional rather than as an error.
pub fn rgba_pixel_to_hsv(pixel: Option<[u8; 4]>) -> Option<NormalizedHsv> {
    let [r, g, b, _a] = pixel?;
    Some(rgb_to_hsv(r, g, b))
}
