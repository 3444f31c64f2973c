//! Zone partitioning: BSP tree (0x21), regions (0x22) and zones (0x29)
//!
//! # Region layout
//! ```text
//! name i32, flags u32, ambient_light i32
//! counts u32 × 8: region vertex, proximal, render vertex, wall,
//!                 obstacle, cutting obstacle, vis node, vis list
//! region_vertices [f32; 3], proximals [f32; 2], render_vertices [f32; 3]
//! walls:     flags u32, vertex_count u32, full render info, normal [f32; 4], vertices u32 × n
//! obstacles: flags u32, next_region i32, type i32, vertex_count u32, vertices u32 × n,
//!            [type -15] plane [f32; 4], [type 18] edge wall u32,
//!            [flag 0x04] user data (u32 len + bytes)
//! vis nodes: plane [f32; 4], vis_list_index u32, front u32, back u32
//! vis lists: range_count u16, ranges u8 (region flag 0x80) or u16 × n
//! [0x001] sphere [f32; 4]
//! [0x002] reverb_volume f32
//! [0x004] reverb_offset i32
//! user data (u32 len + bytes)
//! [0x100] mesh i32
//! zero padding to 4
//! ```

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::common::{
    FullRenderInfo, WldString, flags_serde, read_hashed_user_data, read_if, read_prefixed_string,
    write_hashed_user_data, write_prefixed_string,
};
use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};

/// Node of the zone-wide BSP tree
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldTreeNode {
    pub plane: Vec4,
    /// Region fragment for leaves, 0 for inner nodes
    pub region: i32,
    /// Node indices, 1-based within this tree
    pub front: i32,
    pub back: i32,
}

/// Zone-wide BSP tree (0x21)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldTree {
    pub name: Option<String>,
    pub nodes: Vec<WorldTreeNode>,
}

impl WorldTree {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let count = r.u32()?;
        let count = r.count(count, 28)?;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(WorldTreeNode {
                plane: r.vec4()?,
                region: r.i32()?,
                front: r.i32()?,
                back: r.i32()?,
            });
        }
        Ok(Self { name, nodes })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.count_u32("nodes", self.nodes.len())?;
        for node in &self.nodes {
            w.vec4(node.plane)?;
            w.i32(node.region)?;
            w.i32(node.front)?;
            w.i32(node.back)?;
        }
        Ok(())
    }

    /// Leaf holding `point`, walking from the root by plane side
    pub fn locate(&self, point: Vec3) -> Option<&WorldTreeNode> {
        let mut index = 0usize;
        for _ in 0..self.nodes.len() {
            let node = self.nodes.get(index)?;
            if node.front == 0 && node.back == 0 {
                return Some(node);
            }
            let side = node.plane.truncate().dot(point) + node.plane.w;
            let next = if side >= 0.0 { node.front } else { node.back };
            index = usize::try_from(next).ok()?.checked_sub(1)?;
        }
        None
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegionFlags: u32 {
        const HAS_SPHERE = 0x001;
        const HAS_REVERB_VOLUME = 0x002;
        const HAS_REVERB_OFFSET = 0x004;
        const REGION_FOG = 0x008;
        const ENABLE_GOURAUD2 = 0x010;
        const ENCODED_VISIBILITY = 0x020;
        const HAS_LEGACY_MESH = 0x040;
        /// Vis list ranges are one byte each
        const BYTE_VIS_RANGES = 0x080;
        const HAS_MESH = 0x100;
    }
}

flags_serde!(RegionFlags);

/// Wall polygon of a region
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Wall {
    pub flags: u32,
    pub render_info: FullRenderInfo,
    pub normal: Vec4,
    pub vertices: Vec<u32>,
}

/// Type-specific payload of an obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ObstacleShape {
    /// Type -15: edge polygon with its plane
    EdgePolygonNormal(Vec4),
    /// Type 18: edge wall index
    EdgeWall(u32),
    Other(i32),
}

impl ObstacleShape {
    const EDGE_POLYGON_NORMAL: i32 = -15;
    const EDGE_WALL: i32 = 18;

    pub fn type_id(&self) -> i32 {
        match self {
            Self::EdgePolygonNormal(_) => Self::EDGE_POLYGON_NORMAL,
            Self::EdgeWall(_) => Self::EDGE_WALL,
            Self::Other(t) => *t,
        }
    }
}

impl Default for ObstacleShape {
    fn default() -> Self {
        Self::Other(0)
    }
}

const OBSTACLE_HAS_USER_DATA: u32 = 0x04;

/// Collision edge between regions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Obstacle {
    pub flags: u32,
    pub next_region: i32,
    pub shape: ObstacleShape,
    pub vertices: Vec<u32>,
    pub user_data: Option<WldString>,
}

impl Obstacle {
    fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let flags = r.u32()?;
        let next_region = r.i32()?;
        let type_id = r.i32()?;
        let count = r.u32()?;
        let count = r.count(count, 4)?;
        let vertices = (0..count).map(|_| r.u32()).collect::<Result<_, _>>()?;
        let shape = match type_id {
            ObstacleShape::EDGE_POLYGON_NORMAL => ObstacleShape::EdgePolygonNormal(r.vec4()?),
            ObstacleShape::EDGE_WALL => ObstacleShape::EdgeWall(r.u32()?),
            other => ObstacleShape::Other(other),
        };
        let user_data = read_if(flags & OBSTACLE_HAS_USER_DATA != 0, r, read_prefixed_string)?;
        Ok(Self {
            flags,
            next_region,
            shape,
            vertices,
            user_data,
        })
    }

    fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let mut flags = self.flags & !OBSTACLE_HAS_USER_DATA;
        if self.user_data.is_some() {
            flags |= OBSTACLE_HAS_USER_DATA;
        }
        w.u32(flags)?;
        w.i32(self.next_region)?;
        w.i32(self.shape.type_id())?;
        w.count_u32("obstacle_vertices", self.vertices.len())?;
        for v in &self.vertices {
            w.u32(*v)?;
        }
        match self.shape {
            ObstacleShape::EdgePolygonNormal(plane) => w.vec4(plane)?,
            ObstacleShape::EdgeWall(wall) => w.u32(wall)?,
            ObstacleShape::Other(_) => {}
        }
        if let Some(data) = &self.user_data {
            write_prefixed_string(w, "obstacle_user_data", data)?;
        }
        Ok(())
    }
}

/// Node of a region's visibility tree
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisNode {
    pub plane: Vec4,
    pub vis_list: u32,
    pub front: u32,
    pub back: u32,
}

/// Run-length encoded set of visible regions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisList {
    pub ranges: Vec<u16>,
}

/// BSP leaf: geometry, collision and visibility of one region (0x22)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub name: Option<String>,
    pub flags: RegionFlags,
    pub ambient_light: i32,
    /// Kept as stored; no list follows it
    pub cutting_obstacle_count: u32,
    pub region_vertices: Vec<Vec3>,
    pub proximals: Vec<Vec2>,
    pub render_vertices: Vec<Vec3>,
    pub walls: Vec<Wall>,
    pub obstacles: Vec<Obstacle>,
    pub vis_nodes: Vec<VisNode>,
    pub vis_lists: Vec<VisList>,
    pub sphere: Option<Vec4>,
    pub reverb_volume: Option<f32>,
    pub reverb_offset: Option<i32>,
    pub user_data: WldString,
    pub mesh: Option<i32>,
}

impl Region {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = RegionFlags::from_bits_retain(r.u32()?);
        let ambient_light = r.i32()?;
        let region_vertex_count = r.u32()?;
        let proximal_count = r.u32()?;
        let render_vertex_count = r.u32()?;
        let wall_count = r.u32()?;
        let obstacle_count = r.u32()?;
        let cutting_obstacle_count = r.u32()?;
        let vis_node_count = r.u32()?;
        let vis_list_count = r.u32()?;

        let n = r.count(region_vertex_count, 12)?;
        let region_vertices = (0..n).map(|_| r.vec3()).collect::<Result<_, _>>()?;
        let n = r.count(proximal_count, 8)?;
        let proximals = (0..n).map(|_| r.vec2()).collect::<Result<_, _>>()?;
        let n = r.count(render_vertex_count, 12)?;
        let render_vertices = (0..n).map(|_| r.vec3()).collect::<Result<_, _>>()?;

        let n = r.count(wall_count, 88)?;
        let mut walls = Vec::with_capacity(n);
        for _ in 0..n {
            let wall_flags = r.u32()?;
            let vertex_count = r.u32()?;
            let render_info = FullRenderInfo::read(r)?;
            let normal = r.vec4()?;
            let vertex_count = r.count(vertex_count, 4)?;
            let vertices = (0..vertex_count).map(|_| r.u32()).collect::<Result<_, _>>()?;
            walls.push(Wall {
                flags: wall_flags,
                render_info,
                normal,
                vertices,
            });
        }

        let n = r.count(obstacle_count, 16)?;
        let obstacles = (0..n).map(|_| Obstacle::read(r)).collect::<Result<_, _>>()?;

        let n = r.count(vis_node_count, 28)?;
        let mut vis_nodes = Vec::with_capacity(n);
        for _ in 0..n {
            vis_nodes.push(VisNode {
                plane: r.vec4()?,
                vis_list: r.u32()?,
                front: r.u32()?,
                back: r.u32()?,
            });
        }

        let byte_ranges = flags.contains(RegionFlags::BYTE_VIS_RANGES);
        let n = r.count(vis_list_count, 2)?;
        let mut vis_lists = Vec::with_capacity(n);
        for _ in 0..n {
            let range_count = r.u16()?;
            let range_count = r.count(u32::from(range_count), if byte_ranges { 1 } else { 2 })?;
            let mut ranges = Vec::with_capacity(range_count);
            for _ in 0..range_count {
                let range = if byte_ranges { u16::from(r.u8()?) } else { r.u16()? };
                ranges.push(range);
            }
            vis_lists.push(VisList { ranges });
        }

        let sphere = read_if(flags.contains(RegionFlags::HAS_SPHERE), r, |r| r.vec4())?;
        let reverb_volume = read_if(flags.contains(RegionFlags::HAS_REVERB_VOLUME), r, |r| r.f32())?;
        let reverb_offset = read_if(flags.contains(RegionFlags::HAS_REVERB_OFFSET), r, |r| r.i32())?;
        let user_data = read_prefixed_string(r)?;
        let mesh = read_if(flags.contains(RegionFlags::HAS_MESH), r, |r| r.i32())?;
        r.skip_padding(4);

        Ok(Self {
            name,
            flags,
            ambient_light,
            cutting_obstacle_count,
            region_vertices,
            proximals,
            render_vertices,
            walls,
            obstacles,
            vis_nodes,
            vis_lists,
            sphere,
            reverb_volume,
            reverb_offset,
            user_data,
            mesh,
        })
    }

    pub fn encoded_flags(&self) -> RegionFlags {
        let mut flags = self.flags;
        flags.set(RegionFlags::HAS_SPHERE, self.sphere.is_some());
        flags.set(RegionFlags::HAS_REVERB_VOLUME, self.reverb_volume.is_some());
        flags.set(RegionFlags::HAS_REVERB_OFFSET, self.reverb_offset.is_some());
        flags.set(RegionFlags::HAS_MESH, self.mesh.is_some());
        flags
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        let flags = self.encoded_flags();
        w.name(self.name.as_deref())?;
        w.u32(flags.bits())?;
        w.i32(self.ambient_light)?;
        w.count_u32("region_vertices", self.region_vertices.len())?;
        w.count_u32("proximals", self.proximals.len())?;
        w.count_u32("render_vertices", self.render_vertices.len())?;
        w.count_u32("walls", self.walls.len())?;
        w.count_u32("obstacles", self.obstacles.len())?;
        w.u32(self.cutting_obstacle_count)?;
        w.count_u32("vis_nodes", self.vis_nodes.len())?;
        w.count_u32("vis_lists", self.vis_lists.len())?;

        for v in &self.region_vertices {
            w.vec3(*v)?;
        }
        for p in &self.proximals {
            w.vec2(*p)?;
        }
        for v in &self.render_vertices {
            w.vec3(*v)?;
        }
        for wall in &self.walls {
            w.u32(wall.flags)?;
            w.count_u32("wall_vertices", wall.vertices.len())?;
            wall.render_info.write(w)?;
            w.vec4(wall.normal)?;
            for v in &wall.vertices {
                w.u32(*v)?;
            }
        }
        for obstacle in &self.obstacles {
            obstacle.write(w)?;
        }
        for node in &self.vis_nodes {
            w.vec4(node.plane)?;
            w.u32(node.vis_list)?;
            w.u32(node.front)?;
            w.u32(node.back)?;
        }

        let byte_ranges = flags.contains(RegionFlags::BYTE_VIS_RANGES);
        for list in &self.vis_lists {
            w.count_u16("vis_ranges", list.ranges.len())?;
            for &range in &list.ranges {
                if byte_ranges {
                    let range = u8::try_from(range).map_err(|_| EncodeError::ValueOutOfRange {
                        field: "vis_ranges",
                        value: i64::from(range),
                    })?;
                    w.u8(range)?;
                } else {
                    w.u16(range)?;
                }
            }
        }

        if let Some(sphere) = self.sphere {
            w.vec4(sphere)?;
        }
        if let Some(volume) = self.reverb_volume {
            w.f32(volume)?;
        }
        if let Some(offset) = self.reverb_offset {
            w.i32(offset)?;
        }
        write_prefixed_string(w, "user_data", &self.user_data)?;
        if let Some(mesh) = self.mesh {
            w.i32(mesh)?;
        }
        w.pad_to(4)
    }
}

/// Named group of regions (0x29)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Zone {
    pub name: Option<String>,
    pub flags: u32,
    /// Region numbers, not directory indices
    pub regions: Vec<u32>,
    pub user_data: WldString,
}

impl Zone {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let count = r.u32()?;
        let count = r.count(count, 4)?;
        let regions = (0..count).map(|_| r.u32()).collect::<Result<_, _>>()?;
        let user_data = read_hashed_user_data(r)?;
        Ok(Self {
            name,
            flags,
            regions,
            user_data,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.count_u32("regions", self.regions.len())?;
        for region in &self.regions {
            w.u32(*region)?;
        }
        write_hashed_user_data(w, "user_data", &self.user_data)
    }
}
