//! Fixed-point conversions shared by geometry and animation codecs
//!
//! Codecs keep the raw integers and the per-fragment scale; these helpers
//! reconstruct floating-point values for consumers and invert the mapping
//! for values that already lie on the fragment's grid.

use glam::{Vec3, Vec4};

use crate::error::EncodeError;

// ============================================================================
// Vertex positions
// ============================================================================

/// Step size for a raw-scale exponent: `1 / 2^raw_scale`
pub fn vertex_scale(raw_scale: u16) -> f32 {
    2f32.powi(-i32::from(raw_scale))
}

/// `center + raw * scale`
pub fn dequantize_vertex(center: Vec3, raw: [i16; 3], raw_scale: u16) -> Vec3 {
    let scale = vertex_scale(raw_scale);
    center + Vec3::new(f32::from(raw[0]), f32::from(raw[1]), f32::from(raw[2])) * scale
}

/// Invert [`dequantize_vertex`] by rounding to the nearest grid point at the
/// fragment's existing scale
pub fn quantize_vertex(center: Vec3, position: Vec3, raw_scale: u16) -> Result<[i16; 3], EncodeError> {
    let steps = (position - center) / vertex_scale(raw_scale);
    Ok([
        to_i16("vertex.x", steps.x)?,
        to_i16("vertex.y", steps.y)?,
        to_i16("vertex.z", steps.z)?,
    ])
}

fn to_i16(field: &'static str, v: f32) -> Result<i16, EncodeError> {
    let rounded = v.round();
    if !(f32::from(i16::MIN)..=f32::from(i16::MAX)).contains(&rounded) {
        return Err(EncodeError::ValueOutOfRange {
            field,
            value: rounded as i64,
        });
    }
    Ok(rounded as i16)
}

// ============================================================================
// Texture coordinates and normals
// ============================================================================

/// Texture coordinate component: `raw / 256`
pub fn uv_from_raw(raw: i32) -> f32 {
    raw as f32 / 256.0
}

pub fn uv_to_raw(v: f32) -> i32 {
    (v * 256.0).round() as i32
}

/// Normal component: `raw / 128`
pub fn normal_from_raw(raw: i8) -> f32 {
    f32::from(raw) / 128.0
}

pub fn normal_to_raw(v: f32) -> i8 {
    (v * 128.0).round().clamp(-128.0, 127.0) as i8
}

// ============================================================================
// Track frames
// ============================================================================

/// Translation of one track frame: `shift / 256` when the denominator is
/// non-zero, otherwise zero
pub fn frame_translation(shift: [i16; 3], denominator: i16) -> Vec3 {
    if denominator == 0 {
        return Vec3::ZERO;
    }
    Vec3::new(f32::from(shift[0]), f32::from(shift[1]), f32::from(shift[2])) / 256.0
}

/// Scale of one track frame: `denominator / 256`
pub fn frame_scale(denominator: i16) -> f32 {
    f32::from(denominator) / 256.0
}

/// Rotation of one track frame as (x, y, z, w = denominator).
///
/// The quaternion is left unnormalised; normalising is up to the consumer.
pub fn frame_rotation(rotation: [i16; 3], denominator: i16) -> Vec4 {
    Vec4::new(
        f32::from(rotation[0]),
        f32::from(rotation[1]),
        f32::from(rotation[2]),
        f32::from(denominator),
    )
}
