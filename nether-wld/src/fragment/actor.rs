//! Actors, their bounding volumes and particle clouds

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{WldString, flags_serde, read_hashed_user_data, read_if, write_hashed_user_data};
use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActorFlags: u32 {
        const HAS_CURRENT_ACTION = 0x01;
        const HAS_LOCATION = 0x02;
        const HAS_BOUNDING_RADIUS = 0x04;
        const HAS_SCALE = 0x08;
        const HAS_SOUND = 0x10;
        const ACTIVE = 0x20;
        const SPRITE_VOLUME_ONLY = 0x80;
        const HAVE_VERTEX_COLORS = 0x100;
    }
}

flags_serde!(ActorFlags);

/// Placement block shared by actor definitions and instances
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub offset: Vec3,
    pub rotation: Vec3,
    pub unknown: u32,
}

impl Location {
    fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            offset: r.vec3()?,
            rotation: r.vec3()?,
            unknown: r.u32()?,
        })
    }

    fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.vec3(self.offset)?;
        w.vec3(self.rotation)?;
        w.u32(self.unknown)
    }
}

/// Level-of-detail distances for one action
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    pub unknown: u32,
    pub lods: Vec<f32>,
}

/// Actor definition (0x14)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActorDef {
    pub name: Option<String>,
    pub flags: ActorFlags,
    pub callback: Option<String>,
    pub bounds: i32,
    pub current_action: Option<u32>,
    pub location: Option<Location>,
    pub actions: Vec<Action>,
    /// Skeleton, mesh or sprite instances making up the actor
    pub sprites: Vec<u32>,
    pub user_data: WldString,
}

impl ActorDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = ActorFlags::from_bits_retain(r.u32()?);
        let callback = r.name()?;
        let action_count = r.u32()?;
        let sprite_count = r.u32()?;
        let bounds = r.i32()?;
        let current_action = read_if(flags.contains(ActorFlags::HAS_CURRENT_ACTION), r, |r| r.u32())?;
        let location = read_if(flags.contains(ActorFlags::HAS_LOCATION), r, Location::read)?;

        let action_count = r.count(action_count, 8)?;
        let mut actions = Vec::with_capacity(action_count);
        for _ in 0..action_count {
            let lod_count = r.u32()?;
            let unknown = r.u32()?;
            let lod_count = r.count(lod_count, 4)?;
            let lods = (0..lod_count).map(|_| r.f32()).collect::<Result<_, _>>()?;
            actions.push(Action { unknown, lods });
        }

        let sprite_count = r.count(sprite_count, 4)?;
        let sprites = (0..sprite_count).map(|_| r.u32()).collect::<Result<_, _>>()?;
        let user_data = read_hashed_user_data(r)?;

        Ok(Self {
            name,
            flags,
            callback,
            bounds,
            current_action,
            location,
            actions,
            sprites,
            user_data,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags;
        flags.set(ActorFlags::HAS_CURRENT_ACTION, self.current_action.is_some());
        flags.set(ActorFlags::HAS_LOCATION, self.location.is_some());

        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        w.name(self.callback.as_deref())?;
        w.count_u32("actions", self.actions.len())?;
        w.count_u32("sprites", self.sprites.len())?;
        w.i32(self.bounds)?;
        if let Some(action) = self.current_action {
            w.u32(action)?;
        }
        if let Some(location) = &self.location {
            location.write(w)?;
        }
        for action in &self.actions {
            w.count_u32("lods", action.lods.len())?;
            w.u32(action.unknown)?;
            for lod in &action.lods {
                w.f32(*lod)?;
            }
        }
        for sprite in &self.sprites {
            w.u32(*sprite)?;
        }
        write_hashed_user_data(w, "user_data", &self.user_data)
    }
}

/// Placed actor (0x15)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Actor {
    pub name: Option<String>,
    pub actor_def: i32,
    pub flags: ActorFlags,
    pub sphere: u32,
    pub current_action: Option<u32>,
    pub location: Option<Location>,
    pub bounding_radius: Option<f32>,
    pub scale: Option<f32>,
    /// Outer `None` when the block is absent; inner `None` for a zero name ref
    pub sound: Option<Option<String>>,
    pub user_data: i32,
}

impl Actor {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let actor_def = r.i32()?;
        let flags = ActorFlags::from_bits_retain(r.u32()?);
        let sphere = r.u32()?;
        let current_action = read_if(flags.contains(ActorFlags::HAS_CURRENT_ACTION), r, |r| r.u32())?;
        let location = read_if(flags.contains(ActorFlags::HAS_LOCATION), r, Location::read)?;
        let bounding_radius = read_if(flags.contains(ActorFlags::HAS_BOUNDING_RADIUS), r, |r| r.f32())?;
        let scale = read_if(flags.contains(ActorFlags::HAS_SCALE), r, |r| r.f32())?;
        let sound = read_if(flags.contains(ActorFlags::HAS_SOUND), r, |r| r.name())?;
        let user_data = r.i32()?;
        Ok(Self {
            name,
            actor_def,
            flags,
            sphere,
            current_action,
            location,
            bounding_radius,
            scale,
            sound,
            user_data,
        })
    }

    pub fn encoded_flags(&self) -> ActorFlags {
        let mut flags = self.flags;
        flags.set(ActorFlags::HAS_CURRENT_ACTION, self.current_action.is_some());
        flags.set(ActorFlags::HAS_LOCATION, self.location.is_some());
        flags.set(ActorFlags::HAS_BOUNDING_RADIUS, self.bounding_radius.is_some());
        flags.set(ActorFlags::HAS_SCALE, self.scale.is_some());
        flags.set(ActorFlags::HAS_SOUND, self.sound.is_some());
        flags
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.i32(self.actor_def)?;
        w.u32(self.encoded_flags().bits())?;
        w.u32(self.sphere)?;
        if let Some(action) = self.current_action {
            w.u32(action)?;
        }
        if let Some(location) = &self.location {
            location.write(w)?;
        }
        if let Some(radius) = self.bounding_radius {
            w.f32(radius)?;
        }
        if let Some(scale) = self.scale {
            w.f32(scale)?;
        }
        if let Some(sound) = &self.sound {
            w.name(sound.as_deref())?;
        }
        w.i32(self.user_data)
    }
}

/// Collision sphere (0x16)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sphere {
    pub name: Option<String>,
    pub radius: f32,
}

impl Sphere {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            radius: r.f32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.f32(self.radius)
    }
}

/// Face of a collision polyhedron
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PolyhedronFace {
    pub vertices: Vec<u32>,
}

/// Collision polyhedron (0x17)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolyhedronDef {
    pub name: Option<String>,
    pub flags: u32,
    pub bounding_radius: f32,
    pub scale_factor: f32,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<PolyhedronFace>,
}

impl PolyhedronDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let vertex_count = r.u32()?;
        let face_count = r.u32()?;
        let bounding_radius = r.f32()?;
        let scale_factor = r.f32()?;

        let vertex_count = r.count(vertex_count, 12)?;
        let vertices = (0..vertex_count).map(|_| r.vec3()).collect::<Result<_, _>>()?;

        let face_count = r.count(face_count, 4)?;
        let mut faces = Vec::with_capacity(face_count);
        for _ in 0..face_count {
            let count = r.u32()?;
            let count = r.count(count, 4)?;
            let vertices = (0..count).map(|_| r.u32()).collect::<Result<_, _>>()?;
            faces.push(PolyhedronFace { vertices });
        }

        Ok(Self {
            name,
            flags,
            bounding_radius,
            scale_factor,
            vertices,
            faces,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.count_u32("vertices", self.vertices.len())?;
        w.count_u32("faces", self.faces.len())?;
        w.f32(self.bounding_radius)?;
        w.f32(self.scale_factor)?;
        for v in &self.vertices {
            w.vec3(*v)?;
        }
        for face in &self.faces {
            w.count_u32("face_vertices", face.vertices.len())?;
            for v in &face.vertices {
                w.u32(*v)?;
            }
        }
        Ok(())
    }
}

/// Polyhedron placement (0x18)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyhedron {
    pub name: Option<String>,
    pub polyhedron_def: i32,
    pub flags: u32,
    pub scale_factor: f32,
}

impl Polyhedron {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        Ok(Self {
            name: r.name()?,
            polyhedron_def: r.i32()?,
            flags: r.u32()?,
            scale_factor: r.f32()?,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.i32(self.polyhedron_def)?;
        w.u32(self.flags)?;
        w.f32(self.scale_factor)
    }
}

/// Set of spheres as (x, y, z, radius) (0x19)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SphereListDef {
    pub name: Option<String>,
    pub flags: u32,
    pub radius: f32,
    pub scale: f32,
    pub spheres: Vec<Vec4>,
}

impl SphereListDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let count = r.u32()?;
        let radius = r.f32()?;
        let scale = r.f32()?;
        let count = r.count(count, 16)?;
        let spheres = (0..count).map(|_| r.vec4()).collect::<Result<_, _>>()?;
        Ok(Self {
            name,
            flags,
            radius,
            scale,
            spheres,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.count_u32("spheres", self.spheres.len())?;
        w.f32(self.radius)?;
        w.f32(self.scale)?;
        for sphere in &self.spheres {
            w.vec4(*sphere)?;
        }
        Ok(())
    }
}

/// Particle emitter settings (0x34)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleCloudDef {
    pub name: Option<String>,
    /// Settings words in stored order: two unknowns, movement, flags,
    /// simultaneous particles, then five unknowns
    pub settings: [u32; 10],
    pub spawn_radius: f32,
    pub spawn_angle: f32,
    pub spawn_lifespan: u32,
    pub spawn_velocity: f32,
    /// Stored as z, x, y
    pub spawn_normal: Vec3,
    pub spawn_rate: u32,
    pub spawn_scale: f32,
    pub color: [u8; 4],
    pub particle_sprite: u32,
}

impl ParticleCloudDef {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let mut settings = [0u32; 10];
        for s in &mut settings {
            *s = r.u32()?;
        }
        let spawn_radius = r.f32()?;
        let spawn_angle = r.f32()?;
        let spawn_lifespan = r.u32()?;
        let spawn_velocity = r.f32()?;
        let z = r.f32()?;
        let x = r.f32()?;
        let y = r.f32()?;
        let spawn_rate = r.u32()?;
        let spawn_scale = r.f32()?;
        let color = [r.u8()?, r.u8()?, r.u8()?, r.u8()?];
        let particle_sprite = r.u32()?;
        Ok(Self {
            name,
            settings,
            spawn_radius,
            spawn_angle,
            spawn_lifespan,
            spawn_velocity,
            spawn_normal: Vec3::new(x, y, z),
            spawn_rate,
            spawn_scale,
            color,
            particle_sprite,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        for s in self.settings {
            w.u32(s)?;
        }
        w.f32(self.spawn_radius)?;
        w.f32(self.spawn_angle)?;
        w.u32(self.spawn_lifespan)?;
        w.f32(self.spawn_velocity)?;
        w.f32(self.spawn_normal.z)?;
        w.f32(self.spawn_normal.x)?;
        w.f32(self.spawn_normal.y)?;
        w.u32(self.spawn_rate)?;
        w.f32(self.spawn_scale)?;
        w.bytes(&self.color)?;
        w.u32(self.particle_sprite)
    }
}
