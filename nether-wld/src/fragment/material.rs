//! Bitmaps, simple sprites and materials (0x01, 0x03, 0x04, 0x26, 0x30, 0x31)

use serde::{Deserialize, Serialize};

use super::common::{WldString, flags_serde, read_if};
use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};

/// Palette file name (0x01)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DefaultPaletteFile {
    pub name: Option<String>,
    pub file_name: WldString,
}

impl DefaultPaletteFile {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let len = r.u16()?;
        let file_name = WldString(r.bytes(usize::from(len))?);
        Ok(Self { name, file_name })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.count_u16("file_name", self.file_name.len())?;
        w.bytes(self.file_name.as_bytes())
    }
}

/// Bitmap file names (0x03). Each name is XOR-protected and usually
/// NUL-terminated; the bytes are kept as stored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BmInfo {
    pub name: Option<String>,
    pub file_names: Vec<WldString>,
}

impl BmInfo {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        // Stored as count - 1
        let stored = r.i32()?;
        let count = u32::try_from(i64::from(stored) + 1)
            .map_err(|_| r.invariant(format!("bitmap count {stored} below -1")))?;
        let count = r.count(count, 2)?;
        let mut file_names = Vec::with_capacity(count);
        for _ in 0..count {
            let len = r.u16()?;
            file_names.push(WldString(r.hashed_bytes(usize::from(len))?));
        }
        r.skip_padding(4);
        Ok(Self { name, file_names })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        let stored = i32::try_from(self.file_names.len())
            .map_err(|_| EncodeError::ValueOutOfRange {
                field: "file_names",
                value: self.file_names.len() as i64,
            })?
            - 1;
        w.i32(stored)?;
        for file_name in &self.file_names {
            w.count_u16("file_name", file_name.len())?;
            w.hashed_bytes(file_name.as_bytes())?;
        }
        w.pad_to(4)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SimpleSpriteFlags: u32 {
        const SKIP_FRAMES = 0x08;
        const HAS_SLEEP = 0x10;
        const HAS_CURRENT_FRAME = 0x20;
    }
}

flags_serde!(SimpleSpriteFlags);

/// Animated texture: a list of bitmap refs (0x04)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimpleSpriteDef {
    pub name: Option<String>,
    pub flags: SimpleSpriteFlags,
    pub current_frame: Option<i32>,
    /// Present only when both 0x08 and 0x10 are set
    pub sleep: Option<u32>,
    pub bitmaps: Vec<u32>,
}

impl SimpleSpriteDef {
    const SLEEP_BITS: SimpleSpriteFlags =
        SimpleSpriteFlags::SKIP_FRAMES.union(SimpleSpriteFlags::HAS_SLEEP);

    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = SimpleSpriteFlags::from_bits_retain(r.u32()?);
        let count = r.u32()?;
        let current_frame = read_if(flags.contains(SimpleSpriteFlags::HAS_CURRENT_FRAME), r, |r| r.i32())?;
        let sleep = read_if(flags.contains(Self::SLEEP_BITS), r, |r| r.u32())?;
        let count = r.count(count, 4)?;
        let mut bitmaps = Vec::with_capacity(count);
        for _ in 0..count {
            bitmaps.push(r.u32()?);
        }
        Ok(Self {
            name,
            flags,
            current_frame,
            sleep,
            bitmaps,
        })
    }

    pub fn encoded_flags(&self) -> SimpleSpriteFlags {
        let mut flags = self.flags;
        flags.set(SimpleSpriteFlags::HAS_CURRENT_FRAME, self.current_frame.is_some());
        if self.sleep.is_some() {
            flags.insert(Self::SLEEP_BITS);
        } else if flags.contains(Self::SLEEP_BITS) {
            flags.remove(SimpleSpriteFlags::SKIP_FRAMES);
        }
        flags
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.encoded_flags().bits())?;
        w.count_u32("bitmaps", self.bitmaps.len())?;
        if let Some(frame) = self.current_frame {
            w.i32(frame)?;
        }
        if let Some(sleep) = self.sleep {
            w.u32(sleep)?;
        }
        for bitmap in &self.bitmaps {
            w.u32(*bitmap)?;
        }
        Ok(())
    }
}

/// Blit sprite definition (0x26)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlitSpriteDef {
    pub name: Option<String>,
    pub flags: u32,
    pub sprite: u32,
    pub unknown: i32,
}

impl BlitSpriteDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            flags: r.u32()?,
            sprite: r.u32()?,
            unknown: r.i32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.u32(self.sprite)?;
        w.i32(self.unknown)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const HAS_PAIR = 0x02;
    }
}

flags_serde!(MaterialFlags);

/// Extra value pair carried by some materials
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialPair {
    pub value: u32,
    pub factor: f32,
}

/// Material (0x30)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaterialDef {
    pub name: Option<String>,
    pub flags: MaterialFlags,
    pub render_method: u32,
    pub rgb_pen: u32,
    pub brightness: f32,
    pub scaled_ambient: f32,
    pub simple_sprite: u32,
    pub pair: Option<MaterialPair>,
}

impl MaterialDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = MaterialFlags::from_bits_retain(r.u32()?);
        let render_method = r.u32()?;
        let rgb_pen = r.u32()?;
        let brightness = r.f32()?;
        let scaled_ambient = r.f32()?;
        let simple_sprite = r.u32()?;
        let pair = read_if(flags.contains(MaterialFlags::HAS_PAIR), r, |r| {
            Ok(MaterialPair {
                value: r.u32()?,
                factor: r.f32()?,
            })
        })?;
        Ok(Self {
            name,
            flags,
            render_method,
            rgb_pen,
            brightness,
            scaled_ambient,
            simple_sprite,
            pair,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(MaterialFlags::HAS_PAIR, self.pair.is_some());

        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        w.u32(self.render_method)?;
        w.u32(self.rgb_pen)?;
        w.f32(self.brightness)?;
        w.f32(self.scaled_ambient)?;
        w.u32(self.simple_sprite)?;
        if let Some(pair) = self.pair {
            w.u32(pair.value)?;
            w.f32(pair.factor)?;
        }
        Ok(())
    }
}

/// Ordered material list referenced by meshes (0x31)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialPalette {
    pub name: Option<String>,
    pub flags: u32,
    pub materials: Vec<u32>,
}

impl MaterialPalette {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let count = r.u32()?;
        let count = r.count(count, 4)?;
        let mut materials = Vec::with_capacity(count);
        for _ in 0..count {
            materials.push(r.u32()?);
        }
        Ok(Self {
            name,
            flags,
            materials,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.count_u32("materials", self.materials.len())?;
        for material in &self.materials {
            w.u32(*material)?;
        }
        Ok(())
    }
}
