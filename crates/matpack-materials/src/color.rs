//! Color math for tile content: sRGB transfer functions, the bake modifier
//! pipeline, and 8-bit fixed-point channel multiply.

use image::Rgba;
use matpack_scene::{Material, Shader};

use crate::rows::{Modifier, ModifierOp};

/// Opaque white, used for tiles without a bound texture.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Flat up-facing tangent-space normal `(0.5, 0.5, 1, 1)`.
pub const FLAT_NORMAL: Rgba<u8> = Rgba([128, 128, 255, 255]);

/// sRGB-encoded channel to linear.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear channel to sRGB-encoded.
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// `round(clamp(c, 0, 1) * 255)`.
pub fn unit_to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Quantizes a `[0, 1]` color to an 8-bit pixel.
pub fn color_to_pixel(color: [f32; 4]) -> Rgba<u8> {
    Rgba(color.map(unit_to_u8))
}

/// `(p * c + 127) / 255`: rounds to nearest, exact at both ends.
pub fn multiply_fixed(p: u8, c: u8) -> u8 {
    ((p as u32 * c as u32 + 127) / 255) as u8
}

/// Multiplies every channel of `pixel` by the quantized `color`.
pub fn multiply_pixel(pixel: Rgba<u8>, color: Rgba<u8>) -> Rgba<u8> {
    Rgba([
        multiply_fixed(pixel[0], color[0]),
        multiply_fixed(pixel[1], color[1]),
        multiply_fixed(pixel[2], color[2]),
        multiply_fixed(pixel[3], color[3]),
    ])
}

/// Evaluates `m = source * scale + bias` for `material`, clamped when requested.
/// Returns `None` when the source property is not a scalar on this material.
pub fn modifier_value(modifier: &Modifier, material: &Material, shader: &Shader) -> Option<f32> {
    let source = material.value(shader, &modifier.source)?.as_float()?;
    let m = source * modifier.scale + modifier.bias;
    Some(if modifier.clamp01 { m.clamp(0.0, 1.0) } else { m })
}

/// Runs `color` through the optional modifier and clamps the result to `[0, 1]`.
pub fn apply_modifier(
    color: [f32; 4],
    modifier: Option<&Modifier>,
    material: &Material,
    shader: &Shader,
) -> [f32; 4] {
    let mut out = color;
    if let Some(modifier) = modifier {
        match modifier_value(modifier, material, shader) {
            Some(m) => {
                let channels = if modifier.include_alpha { 4 } else { 3 };
                for c in out.iter_mut().take(channels) {
                    *c = match modifier.op {
                        ModifierOp::Multiply => *c * m,
                        ModifierOp::Add => *c + m,
                        ModifierOp::Subtract => *c - m,
                    };
                }
            }
            None => tracing::warn!(
                "Modifier source '{}' is not a scalar on material '{}'; modifier ignored",
                modifier.source,
                material.id
            ),
        }
    }
    out.map(|c| c.clamp(0.0, 1.0))
}
