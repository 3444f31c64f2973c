//! Sprite definitions (0x06, 0x08, 0x0A, 0x0C)

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::common::{FlagWidth, FullRenderInfo, RenderInfo, UvInfo, flags_serde, read_if};
use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};

bitflags::bitflags! {
    /// Optional blocks of the sprite definitions. Bit 0x10 means a render
    /// info block for 2D sprites and a frame list for 4D sprites.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpriteFlags: u32 {
        const HAS_CENTER_OFFSET = 0x01;
        const HAS_BOUNDING_RADIUS = 0x02;
        const HAS_CURRENT_FRAME = 0x04;
        const HAS_SLEEP = 0x08;
        const HAS_RENDER_INFO = 0x10;
        const HAS_FRAMES = 0x10;
        const HAS_DEPTH_SCALE = 0x80;
    }
}

flags_serde!(SpriteFlags);

/// Billboard sprite (0x06)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sprite2DDef {
    pub name: Option<String>,
    pub flags: SpriteFlags,
    pub texture_count: u32,
    pub scale: Vec2,
    pub sphere: u32,
    pub depth_scale: Option<f32>,
    pub center_offset: Option<Vec3>,
    pub bounding_radius: Option<f32>,
    pub current_frame: Option<i32>,
    pub sleep: Option<u32>,
    /// One heading per pitch
    pub headings: Vec<u32>,
    pub render_info: Option<RenderInfo<Vec2>>,
}

impl Sprite2DDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = SpriteFlags::from_bits_retain(r.u32()?);
        let texture_count = r.u32()?;
        let pitch_count = r.u32()?;
        let scale = r.vec2()?;
        let sphere = r.u32()?;
        let depth_scale = read_if(flags.contains(SpriteFlags::HAS_DEPTH_SCALE), r, |r| r.f32())?;
        let center_offset = read_if(flags.contains(SpriteFlags::HAS_CENTER_OFFSET), r, |r| r.vec3())?;
        let bounding_radius = read_if(flags.contains(SpriteFlags::HAS_BOUNDING_RADIUS), r, |r| r.f32())?;
        let current_frame = read_if(flags.contains(SpriteFlags::HAS_CURRENT_FRAME), r, |r| r.i32())?;
        let sleep = read_if(flags.contains(SpriteFlags::HAS_SLEEP), r, |r| r.u32())?;

        let pitch_count = r.count(pitch_count, 4)?;
        let mut headings = Vec::with_capacity(pitch_count);
        for _ in 0..pitch_count {
            headings.push(r.u32()?);
        }
        let render_info = read_if(flags.contains(SpriteFlags::HAS_RENDER_INFO), r, |r| {
            RenderInfo::read(r, FlagWidth::U32)
        })?;

        Ok(Self {
            name,
            flags,
            texture_count,
            scale,
            sphere,
            depth_scale,
            center_offset,
            bounding_radius,
            current_frame,
            sleep,
            headings,
            render_info,
        })
    }

    pub fn encoded_flags(&self) -> SpriteFlags {
        let mut flags = self.flags;
        flags.set(SpriteFlags::HAS_DEPTH_SCALE, self.depth_scale.is_some());
        flags.set(SpriteFlags::HAS_CENTER_OFFSET, self.center_offset.is_some());
        flags.set(SpriteFlags::HAS_BOUNDING_RADIUS, self.bounding_radius.is_some());
        flags.set(SpriteFlags::HAS_CURRENT_FRAME, self.current_frame.is_some());
        flags.set(SpriteFlags::HAS_SLEEP, self.sleep.is_some());
        flags.set(SpriteFlags::HAS_RENDER_INFO, self.render_info.is_some());
        flags
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.encoded_flags().bits())?;
        w.u32(self.texture_count)?;
        w.count_u32("headings", self.headings.len())?;
        w.vec2(self.scale)?;
        w.u32(self.sphere)?;
        if let Some(depth_scale) = self.depth_scale {
            w.f32(depth_scale)?;
        }
        write_bounds(w, self.center_offset, self.bounding_radius)?;
        if let Some(frame) = self.current_frame {
            w.i32(frame)?;
        }
        if let Some(sleep) = self.sleep {
            w.u32(sleep)?;
        }
        for heading in &self.headings {
            w.u32(*heading)?;
        }
        if let Some(info) = &self.render_info {
            info.write(w, FlagWidth::U32)?;
        }
        Ok(())
    }
}

fn write_bounds(w: &mut FragmentWriter, center: Option<Vec3>, radius: Option<f32>) -> Result<(), EncodeError> {
    if let Some(center) = center {
        w.vec3(center)?;
    }
    if let Some(radius) = radius {
        w.f32(radius)?;
    }
    Ok(())
}

/// Node of a 3D sprite's BSP tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BspNode {
    pub front: u32,
    pub back: u32,
    pub vertex_indices: Vec<u32>,
    pub render_info: RenderInfo<UvInfo>,
}

/// BSP-partitioned 3D sprite (0x08)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sprite3DDef {
    pub name: Option<String>,
    pub flags: SpriteFlags,
    pub sphere_list: u32,
    pub center_offset: Option<Vec3>,
    pub bounding_radius: Option<f32>,
    pub vertices: Vec<Vec3>,
    pub nodes: Vec<BspNode>,
}

impl Sprite3DDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = SpriteFlags::from_bits_retain(r.u32()?);
        let vertex_count = r.u32()?;
        let node_count = r.u32()?;
        let sphere_list = r.u32()?;
        let center_offset = read_if(flags.contains(SpriteFlags::HAS_CENTER_OFFSET), r, |r| r.vec3())?;
        let bounding_radius = read_if(flags.contains(SpriteFlags::HAS_BOUNDING_RADIUS), r, |r| r.f32())?;

        let vertex_count = r.count(vertex_count, 12)?;
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            vertices.push(r.vec3()?);
        }

        let node_count = r.count(node_count, 17)?;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let index_count = r.u32()?;
            let front = r.u32()?;
            let back = r.u32()?;
            let index_count = r.count(index_count, 4)?;
            let mut vertex_indices = Vec::with_capacity(index_count);
            for _ in 0..index_count {
                vertex_indices.push(r.u32()?);
            }
            let render_info = RenderInfo::read(r, FlagWidth::U8)?;
            nodes.push(BspNode {
                front,
                back,
                vertex_indices,
                render_info,
            });
        }

        Ok(Self {
            name,
            flags,
            sphere_list,
            center_offset,
            bounding_radius,
            vertices,
            nodes,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(SpriteFlags::HAS_CENTER_OFFSET, self.center_offset.is_some());
        flags.set(SpriteFlags::HAS_BOUNDING_RADIUS, self.bounding_radius.is_some());

        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        w.count_u32("vertices", self.vertices.len())?;
        w.count_u32("nodes", self.nodes.len())?;
        w.u32(self.sphere_list)?;
        write_bounds(w, self.center_offset, self.bounding_radius)?;
        for v in &self.vertices {
            w.vec3(*v)?;
        }
        for node in &self.nodes {
            w.count_u32("vertex_indices", node.vertex_indices.len())?;
            w.u32(node.front)?;
            w.u32(node.back)?;
            for index in &node.vertex_indices {
                w.u32(*index)?;
            }
            node.render_info.write(w, FlagWidth::U8)?;
        }
        Ok(())
    }
}

/// Multi-frame sprite (0x0A)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sprite4DDef {
    pub name: Option<String>,
    pub flags: SpriteFlags,
    /// Written as-is only when `frames` is absent
    pub frame_count: u32,
    pub polygon: i32,
    pub center_offset: Option<Vec3>,
    pub bounding_radius: Option<f32>,
    pub current_frame: Option<u32>,
    pub sleep: Option<u32>,
    pub frames: Option<Vec<u32>>,
}

impl Sprite4DDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = SpriteFlags::from_bits_retain(r.u32()?);
        let frame_count = r.u32()?;
        let polygon = r.i32()?;
        let center_offset = read_if(flags.contains(SpriteFlags::HAS_CENTER_OFFSET), r, |r| r.vec3())?;
        let bounding_radius = read_if(flags.contains(SpriteFlags::HAS_BOUNDING_RADIUS), r, |r| r.f32())?;
        let current_frame = read_if(flags.contains(SpriteFlags::HAS_CURRENT_FRAME), r, |r| r.u32())?;
        let sleep = read_if(flags.contains(SpriteFlags::HAS_SLEEP), r, |r| r.u32())?;
        let frames = read_if(flags.contains(SpriteFlags::HAS_FRAMES), r, |r| {
            let count = r.count(frame_count, 4)?;
            (0..count).map(|_| r.u32()).collect::<Result<Vec<_>, _>>()
        })?;

        Ok(Self {
            name,
            flags,
            frame_count,
            polygon,
            center_offset,
            bounding_radius,
            current_frame,
            sleep,
            frames,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(SpriteFlags::HAS_CENTER_OFFSET, self.center_offset.is_some());
        flags.set(SpriteFlags::HAS_BOUNDING_RADIUS, self.bounding_radius.is_some());
        flags.set(SpriteFlags::HAS_CURRENT_FRAME, self.current_frame.is_some());
        flags.set(SpriteFlags::HAS_SLEEP, self.sleep.is_some());
        flags.set(SpriteFlags::HAS_FRAMES, self.frames.is_some());

        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        match &self.frames {
            Some(frames) => w.count_u32("frames", frames.len())?,
            None => w.u32(self.frame_count)?,
        }
        w.i32(self.polygon)?;
        write_bounds(w, self.center_offset, self.bounding_radius)?;
        if let Some(frame) = self.current_frame {
            w.u32(frame)?;
        }
        if let Some(sleep) = self.sleep {
            w.u32(sleep)?;
        }
        for frame in self.frames.iter().flatten() {
            w.u32(*frame)?;
        }
        Ok(())
    }
}

/// Point-cloud sprite (0x0C)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleSpriteDef {
    pub name: Option<String>,
    pub flags: SpriteFlags,
    pub unknown: u32,
    pub center_offset: Option<Vec3>,
    pub bounding_radius: Option<f32>,
    pub vertices: Vec<Vec3>,
    pub render_info: FullRenderInfo,
}

impl ParticleSpriteDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = SpriteFlags::from_bits_retain(r.u32()?);
        let vertex_count = r.u32()?;
        let unknown = r.u32()?;
        let center_offset = read_if(flags.contains(SpriteFlags::HAS_CENTER_OFFSET), r, |r| r.vec3())?;
        let bounding_radius = read_if(flags.contains(SpriteFlags::HAS_BOUNDING_RADIUS), r, |r| r.f32())?;
        let vertex_count = r.count(vertex_count, 12)?;
        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            vertices.push(r.vec3()?);
        }
        let render_info = FullRenderInfo::read(r)?;
        Ok(Self {
            name,
            flags,
            unknown,
            center_offset,
            bounding_radius,
            vertices,
            render_info,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(SpriteFlags::HAS_CENTER_OFFSET, self.center_offset.is_some());
        flags.set(SpriteFlags::HAS_BOUNDING_RADIUS, self.bounding_radius.is_some());

        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        w.count_u32("vertices", self.vertices.len())?;
        w.u32(self.unknown)?;
        write_bounds(w, self.center_offset, self.bounding_radius)?;
        for v in &self.vertices {
            w.vec3(*v)?;
        }
        self.render_info.write(w)
    }
}
