//! Light sources, their placements and vertex colour tracks

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::common::{flags_serde, read_if};
use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u32 {
        const HAS_CURRENT_FRAME = 0x01;
        const HAS_SLEEP = 0x02;
        const HAS_LEVELS = 0x04;
        const SKIP_FRAMES = 0x08;
        const HAS_COLORS = 0x10;
    }
}

flags_serde!(LightFlags);

/// Light source with per-frame levels and colours (0x1B)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightDef {
    pub name: Option<String>,
    pub flags: LightFlags,
    /// Written as-is only when neither list is present
    pub frame_count: u32,
    pub current_frame: Option<u32>,
    pub sleep: Option<u32>,
    pub levels: Option<Vec<f32>>,
    pub colors: Option<Vec<Vec3>>,
}

impl LightDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = LightFlags::from_bits_retain(r.u32()?);
        let frame_count = r.u32()?;
        let current_frame = read_if(flags.contains(LightFlags::HAS_CURRENT_FRAME), r, |r| r.u32())?;
        let sleep = read_if(flags.contains(LightFlags::HAS_SLEEP), r, |r| r.u32())?;
        let levels = read_if(flags.contains(LightFlags::HAS_LEVELS), r, |r| {
            let count = r.count(frame_count, 4)?;
            (0..count).map(|_| r.f32()).collect::<Result<Vec<_>, _>>()
        })?;
        let colors = read_if(flags.contains(LightFlags::HAS_COLORS), r, |r| {
            let count = r.count(frame_count, 12)?;
            (0..count).map(|_| r.vec3()).collect::<Result<Vec<_>, _>>()
        })?;
        Ok(Self {
            name,
            flags,
            frame_count,
            current_frame,
            sleep,
            levels,
            colors,
        })
    }

    /// Frame count implied by whichever lists are present
    fn encoded_frame_count(&self) -> Result<usize, EncodeError> {
        match (&self.levels, &self.colors) {
            (Some(levels), Some(colors)) if levels.len() != colors.len() => Err(EncodeError::CountMismatch {
                field: "colors",
                expected: levels.len(),
                actual: colors.len(),
            }),
            (Some(levels), _) => Ok(levels.len()),
            (None, Some(colors)) => Ok(colors.len()),
            (None, None) => Ok(self.frame_count as usize),
        }
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(LightFlags::HAS_CURRENT_FRAME, self.current_frame.is_some());
        flags.set(LightFlags::HAS_SLEEP, self.sleep.is_some());
        flags.set(LightFlags::HAS_LEVELS, self.levels.is_some());
        flags.set(LightFlags::HAS_COLORS, self.colors.is_some());

        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        w.count_u32("frame_count", self.encoded_frame_count()?)?;
        if let Some(frame) = self.current_frame {
            w.u32(frame)?;
        }
        if let Some(sleep) = self.sleep {
            w.u32(sleep)?;
        }
        for level in self.levels.iter().flatten() {
            w.f32(*level)?;
        }
        for color in self.colors.iter().flatten() {
            w.vec3(*color)?;
        }
        Ok(())
    }
}

/// Placed light (0x28)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointLight {
    pub name: Option<String>,
    pub light: i32,
    pub flags: u32,
    pub location: Vec3,
    pub radius: f32,
}

impl PointLight {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            light: r.i32()?,
            flags: r.u32()?,
            location: r.vec3()?,
            radius: r.f32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.i32(self.light)?;
        w.u32(self.flags)?;
        w.vec3(self.location)?;
        w.f32(self.radius)
    }
}

/// Light applied to a set of regions (0x2A)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmbientLight {
    pub name: Option<String>,
    pub light: i32,
    pub flags: u32,
    /// Region numbers, not directory indices
    pub regions: Vec<u32>,
}

impl AmbientLight {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let light = r.i32()?;
        let flags = r.u32()?;
        let count = r.u32()?;
        let count = r.count(count, 4)?;
        let regions = (0..count).map(|_| r.u32()).collect::<Result<_, _>>()?;
        Ok(Self {
            name,
            light,
            flags,
            regions,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.i32(self.light)?;
        w.u32(self.flags)?;
        w.count_u32("regions", self.regions.len())?;
        for region in &self.regions {
            w.u32(*region)?;
        }
        Ok(())
    }
}

/// Old-style light definition wrapping a point light (0x1E)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PointLightOldDef {
    pub name: Option<String>,
    pub point_light: i32,
}

impl PointLightOldDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            point_light: r.i32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.i32(self.point_light)
    }
}

/// Zone-wide ambient light, name only (0x35)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalAmbientLightDef {
    pub name: Option<String>,
}

impl GlobalAmbientLightDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self { name: r.name()? })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())
    }
}

/// Baked vertex colours (0x32)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DmRgbTrackDef {
    pub name: Option<String>,
    pub flags: u32,
    /// Three words with no confirmed meaning, usually 1, 200 and 0
    pub unknown: [u32; 3],
    pub colors: Vec<[u8; 4]>,
}

impl DmRgbTrackDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let count = r.u32()?;
        let unknown = [r.u32()?, r.u32()?, r.u32()?];
        let count = r.count(count, 4)?;
        let mut colors = Vec::with_capacity(count);
        for _ in 0..count {
            colors.push([r.u8()?, r.u8()?, r.u8()?, r.u8()?]);
        }
        Ok(Self {
            name,
            flags,
            unknown,
            colors,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.count_u32("colors", self.colors.len())?;
        for word in self.unknown {
            w.u32(word)?;
        }
        for color in &self.colors {
            w.bytes(color)?;
        }
        Ok(())
    }
}
