//! Colour conversions used by the visualizations.

use image::Rgb;
use ndarray::{Array2, Zip};

use crate::pipeline::Frame;

/// Converts 8-bit HSV with hue in `[0, 180)` to RGB.
pub fn hsv_to_rgb(h: u8, s: u8, v: u8) -> Rgb<u8> {
    let s = s as f32 / 255.0;
    let v = v as f32 / 255.0;
    let (r, g, b) = if s == 0.0 {
        (v, v, v)
    } else {
        let mut h = h as f32 / 30.0;
        while h >= 6.0 {
            h -= 6.0;
        }
        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match sector as u8 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        }
    };
    let to_u8 = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

/// Angle as hue and min-max normalised magnitude as value, full saturation.
///
/// `angle` is in radians within `[0, 2π)`.
pub fn polar_to_rgb(magnitude: &Array2<f32>, angle: &Array2<f32>) -> Frame {
    let (rows, cols) = magnitude.dim();
    let (min, max) = magnitude
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &m| (lo.min(m), hi.max(m)));
    let range = max - min;
    let scale = if range > f32::EPSILON { 255.0 / range } else { 0.0 };

    let mut out = Frame::new(cols as u32, rows as u32);
    Zip::indexed(magnitude).and(angle).for_each(|(r, c), &m, &a| {
        let hue = ((89.5 / std::f32::consts::PI) * a).clamp(0.0, 179.0) as u8;
        let value = ((m - min) * scale).clamp(0.0, 255.0) as u8;
        out.put_pixel(c as u32, r as u32, hsv_to_rgb(hue, 255, value));
    });
    out
}
