//! Skeletons (0x10) and their animation tracks (0x12, 0x13)
//!
//! # Skeleton layout
//! ```text
//! name i32, flags u32, bone_count u32, collision_volume u32
//! [0x001] center_offset [f32; 3]
//! [0x002] bounding_radius f32
//! bones: name i32, flags u32, track u32, sprite u32, child_count u32, children u32 × n
//! [0x200] skin_count u32, skins u32 × n, links u32 × n
//! ```
//!
//! # Track layout
//! ```text
//! name i32, flags u32 (= 8), frame_count u32
//! frames: rot_denom i16, rot [i16; 3], shift [i16; 3], shift_denom i16
//! ```

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{flags_serde, read_if};
use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};
use crate::quantize;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SkeletonFlags: u32 {
        const HAS_CENTER_OFFSET = 0x001;
        const HAS_BOUNDING_RADIUS = 0x002;
        const HAS_SKINS = 0x200;
    }
}

flags_serde!(SkeletonFlags);

/// One node of the bone tree
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bone {
    pub name: Option<String>,
    pub flags: u32,
    /// Track (0x13) driving this bone
    pub track: u32,
    /// Mesh, sprite or particle attached to this bone
    pub sprite: u32,
    /// Indices into the owning skeleton's bone list
    pub children: Vec<u32>,
}

/// Alternate skins: mesh refs paired with the bone each one updates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkinList {
    pub skins: Vec<u32>,
    pub links: Vec<u32>,
}

/// Skeleton definition (0x10)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HierarchicalSpriteDef {
    pub name: Option<String>,
    pub flags: SkeletonFlags,
    pub collision_volume: u32,
    pub center_offset: Option<Vec3>,
    pub bounding_radius: Option<f32>,
    pub bones: Vec<Bone>,
    pub skins: Option<SkinList>,
}

impl HierarchicalSpriteDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = SkeletonFlags::from_bits_retain(r.u32()?);
        let bone_count = r.u32()?;
        let collision_volume = r.u32()?;
        let center_offset = read_if(flags.contains(SkeletonFlags::HAS_CENTER_OFFSET), r, |r| r.vec3())?;
        let bounding_radius = read_if(flags.contains(SkeletonFlags::HAS_BOUNDING_RADIUS), r, |r| r.f32())?;

        let bone_count = r.count(bone_count, 20)?;
        let mut bones = Vec::with_capacity(bone_count);
        for _ in 0..bone_count {
            let name = r.name()?;
            let flags = r.u32()?;
            let track = r.u32()?;
            let sprite = r.u32()?;
            let child_count = r.u32()?;
            let child_count = r.count(child_count, 4)?;
            let mut children = Vec::with_capacity(child_count);
            for _ in 0..child_count {
                children.push(r.u32()?);
            }
            bones.push(Bone {
                name,
                flags,
                track,
                sprite,
                children,
            });
        }

        let skins = read_if(flags.contains(SkeletonFlags::HAS_SKINS), r, |r| {
            let count = r.u32()?;
            let count = r.count(count, 8)?;
            let mut skins = Vec::with_capacity(count);
            for _ in 0..count {
                skins.push(r.u32()?);
            }
            let mut links = Vec::with_capacity(count);
            for _ in 0..count {
                links.push(r.u32()?);
            }
            Ok(SkinList { skins, links })
        })?;

        Ok(Self {
            name,
            flags,
            collision_volume,
            center_offset,
            bounding_radius,
            bones,
            skins,
        })
    }

    pub fn encoded_flags(&self) -> SkeletonFlags {
        let mut flags = self.flags;
        flags.set(SkeletonFlags::HAS_CENTER_OFFSET, self.center_offset.is_some());
        flags.set(SkeletonFlags::HAS_BOUNDING_RADIUS, self.bounding_radius.is_some());
        flags.set(SkeletonFlags::HAS_SKINS, self.skins.is_some());
        flags
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.encoded_flags().bits())?;
        w.count_u32("bones", self.bones.len())?;
        w.u32(self.collision_volume)?;
        if let Some(center) = self.center_offset {
            w.vec3(center)?;
        }
        if let Some(radius) = self.bounding_radius {
            w.f32(radius)?;
        }

        for bone in &self.bones {
            w.name(bone.name.as_deref())?;
            w.u32(bone.flags)?;
            w.u32(bone.track)?;
            w.u32(bone.sprite)?;
            w.count_u32("children", bone.children.len())?;
            for child in &bone.children {
                w.u32(*child)?;
            }
        }

        if let Some(skins) = &self.skins {
            if skins.links.len() != skins.skins.len() {
                return Err(EncodeError::CountMismatch {
                    field: "skin_links",
                    expected: skins.skins.len(),
                    actual: skins.links.len(),
                });
            }
            w.count_u32("skins", skins.skins.len())?;
            for skin in &skins.skins {
                w.u32(*skin)?;
            }
            for link in &skins.links {
                w.u32(*link)?;
            }
        }
        Ok(())
    }

    /// Parent bone index of every bone, from the child lists
    pub fn parents(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.bones.len()];
        for (index, bone) in self.bones.iter().enumerate() {
            for &child in &bone.children {
                if let Some(slot) = parents.get_mut(child as usize) {
                    *slot = Some(index);
                }
            }
        }
        parents
    }

    /// Bones nobody lists as a child
    pub fn roots(&self) -> Vec<usize> {
        self.parents()
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.is_none().then_some(i))
            .collect()
    }

    /// Depth-first bone order starting at the roots, visiting each bone once
    pub fn walk(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.bones.len());
        let mut seen = vec![false; self.bones.len()];
        let mut stack: Vec<usize> = self.roots().into_iter().rev().collect();
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut seen[index], true) {
                continue;
            }
            order.push(index);
            for &child in self.bones[index].children.iter().rev() {
                let child = child as usize;
                if child < self.bones.len() && !seen[child] {
                    stack.push(child);
                }
            }
        }
        order
    }
}

/// Flags word every object-animation track carries
pub const TRACK_OBJECT_ANIMATION: u32 = 8;

/// One quantized key frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackFrame {
    pub rotation_denominator: i16,
    pub rotation: [i16; 3],
    pub shift: [i16; 3],
    pub shift_denominator: i16,
}

impl TrackFrame {
    pub fn translation(&self) -> Vec3 {
        quantize::frame_translation(self.shift, self.shift_denominator)
    }

    pub fn scale(&self) -> f32 {
        quantize::frame_scale(self.shift_denominator)
    }

    /// Unnormalised rotation quaternion
    pub fn rotation(&self) -> Vec4 {
        quantize::frame_rotation(self.rotation, self.rotation_denominator)
    }
}

/// Key frames of one bone (0x12)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackDef {
    pub name: Option<String>,
    pub frames: Vec<TrackFrame>,
}

impl TrackDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        if flags != TRACK_OBJECT_ANIMATION {
            return Err(r.invariant(format!(
                "track flags 0x{flags:X}, expected object animation marker 0x{TRACK_OBJECT_ANIMATION:X}"
            )));
        }
        let count = r.u32()?;
        let count = r.count(count, 16)?;
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(TrackFrame {
                rotation_denominator: r.i16()?,
                rotation: [r.i16()?, r.i16()?, r.i16()?],
                shift: [r.i16()?, r.i16()?, r.i16()?],
                shift_denominator: r.i16()?,
            });
        }
        Ok(Self { name, frames })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(TRACK_OBJECT_ANIMATION)?;
        w.count_u32("frames", self.frames.len())?;
        for frame in &self.frames {
            w.i16(frame.rotation_denominator)?;
            for c in frame.rotation {
                w.i16(c)?;
            }
            for c in frame.shift {
                w.i16(c)?;
            }
            w.i16(frame.shift_denominator)?;
        }
        Ok(())
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TrackFlags: u32 {
        const HAS_SLEEP = 0x01;
        const REVERSE = 0x02;
        const INTERPOLATE = 0x04;
    }
}

flags_serde!(TrackFlags);

/// Binds a track definition to a bone (0x13)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    pub track_def: i32,
    pub flags: TrackFlags,
    /// Milliseconds per frame
    pub sleep: Option<u32>,
}

impl Track {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let track_def = r.i32()?;
        let flags = TrackFlags::from_bits_retain(r.u32()?);
        let sleep = read_if(flags.contains(TrackFlags::HAS_SLEEP), r, |r| r.u32())?;
        Ok(Self {
            name,
            track_def,
            flags,
            sleep,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(TrackFlags::HAS_SLEEP, self.sleep.is_some());

        w.name(self.name.as_deref())?;
        w.i32(self.track_def)?;
        w.u32(flags.bits())?;
        if let Some(sleep) = self.sleep {
            w.u32(sleep)?;
        }
        Ok(())
    }
}
