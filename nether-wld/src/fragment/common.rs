//! Shapes shared by several fragment types

use std::borrow::Cow;
use std::fmt;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};

/// Serialize a bitflags word as its raw bits, keeping unnamed bits on the way back
macro_rules! flags_serde {
    ($($ty:ty),* $(,)?) => {
        $(
            impl serde::Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serde::Serialize::serialize(&self.bits(), serializer)
                }
            }

            impl<'de> serde::Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    let bits = <_ as serde::Deserialize>::deserialize(deserializer)?;
                    Ok(Self::from_bits_retain(bits))
                }
            }
        )*
    };
}
pub(crate) use flags_serde;

// ============================================================================
// Strings stored inside payloads
// ============================================================================

/// Raw bytes of an in-payload string, kept exactly as stored
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WldString(pub Vec<u8>);

impl WldString {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Text up to the first NUL, lossily decoded
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(self.0.len());
        String::from_utf8_lossy(&self.0[..end])
    }
}

impl From<&str> for WldString {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for WldString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Serialize for WldString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        String::from_utf8_lossy(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WldString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(String::deserialize(deserializer)?.into_bytes()))
    }
}

/// u32 length + plain bytes
pub(crate) fn read_prefixed_string(r: &mut FragmentReader<'_>) -> Result<WldString, ReadError> {
    let len = r.u32()?;
    let len = r.count(len, 1)?;
    Ok(WldString(r.bytes(len)?))
}

pub(crate) fn write_prefixed_string(
    w: &mut FragmentWriter,
    field: &'static str,
    s: &WldString,
) -> Result<(), EncodeError> {
    w.count_u32(field, s.len())?;
    w.bytes(s.as_bytes())
}

/// u32 length + XOR'd bytes + zero padding to 4
pub(crate) fn read_hashed_user_data(r: &mut FragmentReader<'_>) -> Result<WldString, ReadError> {
    let len = r.u32()?;
    let len = r.count(len, 1)?;
    let data = r.hashed_bytes(len)?;
    r.skip_padding(4);
    Ok(WldString(data))
}

pub(crate) fn write_hashed_user_data(
    w: &mut FragmentWriter,
    field: &'static str,
    s: &WldString,
) -> Result<(), EncodeError> {
    w.count_u32(field, s.len())?;
    w.hashed_bytes(s.as_bytes())?;
    w.pad_to(4)
}

// ============================================================================
// Render info blocks
// ============================================================================

bitflags::bitflags! {
    /// Optional members of a render info block
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderFlags: u32 {
        const HAS_PEN = 0x01;
        const HAS_BRIGHTNESS = 0x02;
        const HAS_SCALED_AMBIENT = 0x04;
        const HAS_SIMPLE_SPRITE = 0x08;
        const HAS_UV_INFO = 0x10;
        const HAS_UV_MAP = 0x20;
    }
}

flags_serde!(RenderFlags);

/// Texture projection: origin plus two axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UvInfo {
    pub origin: Vec3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
}

impl UvInfo {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            origin: r.vec3()?,
            u_axis: r.vec3()?,
            v_axis: r.vec3()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.vec3(self.origin)?;
        w.vec3(self.u_axis)?;
        w.vec3(self.v_axis)
    }
}

/// Element type of a render info UV map
pub trait UvMapEntry: Sized {
    const SIZE: usize;

    fn read_entry(r: &mut FragmentReader<'_>) -> Result<Self, ReadError>;

    fn write_entry(&self, w: &mut FragmentWriter) -> Result<(), EncodeError>;
}

impl UvMapEntry for Vec2 {
    const SIZE: usize = 8;

    fn read_entry(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        r.vec2()
    }

    fn write_entry(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.vec2(*self)
    }
}

impl UvMapEntry for UvInfo {
    const SIZE: usize = 36;

    fn read_entry(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Self::read(r)
    }

    fn write_entry(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        self.write(w)
    }
}

/// Width of the render flags word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlagWidth {
    U8,
    U32,
}

/// Render info whose members are each gated by a render flag bit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderInfo<M> {
    pub method: u32,
    pub flags: RenderFlags,
    pub pen: Option<u32>,
    pub brightness: Option<f32>,
    pub scaled_ambient: Option<f32>,
    pub simple_sprite: Option<u32>,
    pub uv_info: Option<UvInfo>,
    pub uv_map: Option<Vec<M>>,
}

impl<M: UvMapEntry> RenderInfo<M> {
    pub(crate) fn read(r: &mut FragmentReader<'_>, width: FlagWidth) -> Result<Self, ReadError> {
        let method = r.u32()?;
        let raw = match width {
            FlagWidth::U8 => u32::from(r.u8()?),
            FlagWidth::U32 => r.u32()?,
        };
        let flags = RenderFlags::from_bits_retain(raw);

        let pen = read_if(flags.contains(RenderFlags::HAS_PEN), r, |r| r.u32())?;
        let brightness = read_if(flags.contains(RenderFlags::HAS_BRIGHTNESS), r, |r| r.f32())?;
        let scaled_ambient = read_if(flags.contains(RenderFlags::HAS_SCALED_AMBIENT), r, |r| r.f32())?;
        let simple_sprite = read_if(flags.contains(RenderFlags::HAS_SIMPLE_SPRITE), r, |r| r.u32())?;
        let uv_info = read_if(flags.contains(RenderFlags::HAS_UV_INFO), r, UvInfo::read)?;
        let uv_map = read_if(flags.contains(RenderFlags::HAS_UV_MAP), r, |r| {
            let count = r.u32()?;
            let count = r.count(count, M::SIZE)?;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push(M::read_entry(r)?);
            }
            Ok(entries)
        })?;

        Ok(Self {
            method,
            flags,
            pen,
            brightness,
            scaled_ambient,
            simple_sprite,
            uv_info,
            uv_map,
        })
    }

    /// Flags with presence bits derived from the optional members
    pub fn encoded_flags(&self) -> RenderFlags {
        let mut flags = self.flags;
        flags.set(RenderFlags::HAS_PEN, self.pen.is_some());
        flags.set(RenderFlags::HAS_BRIGHTNESS, self.brightness.is_some());
        flags.set(RenderFlags::HAS_SCALED_AMBIENT, self.scaled_ambient.is_some());
        flags.set(RenderFlags::HAS_SIMPLE_SPRITE, self.simple_sprite.is_some());
        flags.set(RenderFlags::HAS_UV_INFO, self.uv_info.is_some());
        flags.set(RenderFlags::HAS_UV_MAP, self.uv_map.is_some());
        flags
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter, width: FlagWidth) -> Result<(), EncodeError> {
        w.u32(self.method)?;
        let flags = self.encoded_flags().bits();
        match width {
            FlagWidth::U8 => {
                let flags = u8::try_from(flags).map_err(|_| EncodeError::ValueOutOfRange {
                    field: "render_flags",
                    value: i64::from(flags),
                })?;
                w.u8(flags)?;
            }
            FlagWidth::U32 => w.u32(flags)?,
        }

        if let Some(pen) = self.pen {
            w.u32(pen)?;
        }
        if let Some(brightness) = self.brightness {
            w.f32(brightness)?;
        }
        if let Some(scaled_ambient) = self.scaled_ambient {
            w.f32(scaled_ambient)?;
        }
        if let Some(sprite) = self.simple_sprite {
            w.u32(sprite)?;
        }
        if let Some(uv_info) = &self.uv_info {
            uv_info.write(w)?;
        }
        if let Some(uv_map) = &self.uv_map {
            w.count_u32("uv_map", uv_map.len())?;
            for entry in uv_map {
                entry.write_entry(w)?;
            }
        }
        Ok(())
    }
}

/// Render info with every member always present (walls, particle sprites)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FullRenderInfo {
    pub method: u32,
    pub flags: u32,
    pub pen: u32,
    pub brightness: f32,
    pub scaled_ambient: f32,
    pub simple_sprite: u32,
    pub uv_info: UvInfo,
    pub uv_map: Vec<Vec2>,
}

impl FullRenderInfo {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let method = r.u32()?;
        let flags = r.u32()?;
        let pen = r.u32()?;
        let brightness = r.f32()?;
        let scaled_ambient = r.f32()?;
        let simple_sprite = r.u32()?;
        let uv_info = UvInfo::read(r)?;
        let count = r.u32()?;
        let count = r.count(count, 8)?;
        let mut uv_map = Vec::with_capacity(count);
        for _ in 0..count {
            uv_map.push(r.vec2()?);
        }
        Ok(Self {
            method,
            flags,
            pen,
            brightness,
            scaled_ambient,
            simple_sprite,
            uv_info,
            uv_map,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.u32(self.method)?;
        w.u32(self.flags)?;
        w.u32(self.pen)?;
        w.f32(self.brightness)?;
        w.f32(self.scaled_ambient)?;
        w.u32(self.simple_sprite)?;
        self.uv_info.write(w)?;
        w.count_u32("uv_map", self.uv_map.len())?;
        for uv in &self.uv_map {
            w.vec2(*uv)?;
        }
        Ok(())
    }
}

// ============================================================================
// Small fixed shapes
// ============================================================================

/// Instance-style fragment: name, one reference, flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RefFragment {
    pub name: Option<String>,
    /// Directory index of the definition (positive), or a name ref (negative)
    pub reference: i32,
    pub flags: u32,
}

impl RefFragment {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            reference: r.i32()?,
            flags: r.u32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.i32(self.reference)?;
        w.u32(self.flags)
    }
}

/// Name and flags only
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagsFragment {
    pub name: Option<String>,
    pub flags: u32,
}

impl FlagsFragment {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            flags: r.u32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)
    }
}

/// Read an optional block when `present` is set
pub(crate) fn read_if<'a, T>(
    present: bool,
    r: &mut FragmentReader<'a>,
    read: impl FnOnce(&mut FragmentReader<'a>) -> Result<T, ReadError>,
) -> Result<Option<T>, ReadError> {
    if present { read(r).map(Some) } else { Ok(None) }
}
