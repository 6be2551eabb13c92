use palette::{FromColor, Oklab, Oklch, Srgb};

use super::surface::Surface;
use crate::settings::GradientSettings;

// Kept low enough in chroma that every hue stays close to the sRGB gamut
const STOP_LIGHTNESS: f32 = 0.75;
const STOP_CHROMA: f32 = 0.13;

/// Horizontally scrolling, cyclic hue gradient.
///
/// Stops are spaced evenly in OKLCh hue rather than HSV hue, so equal arcs of
/// the surface look like equal steps in colour instead of bunching up around
/// green and stretching through blue.
#[derive(Clone, Debug)]
pub struct Gradient {
    settings: GradientSettings,
    phase: f32,
}

impl Gradient {
    pub fn new(settings: GradientSettings) -> Self {
        Self {
            settings,
            phase: 0.0,
        }
    }

    /// Scroll offset as a fraction of the surface width, in [0, 1).
    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn frame_rate(&self) -> u32 {
        self.settings.fps.max(1)
    }

    pub fn advance(&mut self) {
        self.phase = (self.phase + self.settings.speed).rem_euclid(1.0);
    }

    fn stops(&self) -> Vec<Oklab> {
        let count = self.settings.stops.max(1);

        (0..count)
            .map(|i| {
                let hue = 360.0 * i as f32 / count as f32;
                Oklab::from_color(Oklch::new(STOP_LIGHTNESS, STOP_CHROMA, hue))
            })
            .collect()
    }

    /// Box blur radius in pixels. Full smoothness blurs across half a stop in
    /// each direction.
    fn blur_radius(&self, width: usize) -> usize {
        let segment = width as f32 / self.settings.stops.max(1) as f32;
        (self.settings.smoothness.clamp(0.0, 1.0) * segment / 2.0).round() as usize
    }

    pub fn render(&self, surface: &mut Surface) {
        let width = surface.width();
        if width == 0 {
            return;
        }

        let stops = self.stops();
        let count = stops.len();

        let row: Vec<[f32; 3]> = (0..width)
            .map(|x| {
                let t = (x as f32 / width as f32 + self.phase).rem_euclid(1.0) * count as f32;
                let index = (t.floor() as usize) % count;
                let color = lerp(stops[index], stops[(index + 1) % count], t.fract());

                let rgb: Srgb = Srgb::from_color(color);
                [rgb.red, rgb.green, rgb.blue]
            })
            .collect();

        let row = box_blur(&row, self.blur_radius(width));

        let columns: Vec<[u8; 4]> = row
            .iter()
            .map(|&[r, g, b]| [to_u8(r), to_u8(g), to_u8(b), 255])
            .collect();

        surface.fill_columns(&columns);
    }
}

fn lerp(a: Oklab, b: Oklab, t: f32) -> Oklab {
    Oklab::new(
        a.l + (b.l - a.l) * t,
        a.a + (b.a - a.a) * t,
        a.b + (b.b - a.b) * t,
    )
}

fn to_u8(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Cyclic box blur; the gradient wraps so the edges blend into each other.
fn box_blur(row: &[[f32; 3]], radius: usize) -> Vec<[f32; 3]> {
    if radius == 0 || row.is_empty() {
        return row.to_vec();
    }

    let len = row.len();
    let window = (2 * radius + 1) as f32;

    (0..len)
        .map(|i| {
            let mut sum = [0.0; 3];
            for offset in 0..=2 * radius {
                let pixel = row[(i + len * (radius / len + 1) + offset - radius) % len];
                for (total, channel) in sum.iter_mut().zip(pixel) {
                    *total += channel;
                }
            }
            sum.map(|s| s / window)
        })
        .collect()
}
