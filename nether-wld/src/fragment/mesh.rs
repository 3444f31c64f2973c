//! Mesh geometry (0x36) and vertex animation (0x37)
//!
//! # Mesh layout
//! ```text
//! name i32, flags u32
//! material_palette u32, dm_track i32, polyhedron i32, fragment4 i32
//! center [f32; 3], params2 [u32; 3], bounding_radius f32
//! bbox_min [f32; 3], bbox_max [f32; 3]
//! counts u16 × 9: vertex, uv, normal, color, face, skin group,
//!                 face material group, vertex material group, mesh op
//! raw_scale u16
//! vertices [i16; 3]           (center + raw / 2^raw_scale)
//! uvs [i16; 2] old-world, [i32; 2] new-world (raw / 256)
//! normals [i8; 3]             (raw / 128)
//! colors [u8; 4]
//! faces (flags u16, [u16; 3])
//! skin groups (count i16, bone i16)
//! face material groups (count u16, material u16)
//! vertex material groups (count i16, material i16)
//! mesh ops (u16, u16 | f32, param u8, type u8)
//! zero padding to 4
//! ```

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::binary::{FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};
use crate::header::Dialect;
use crate::quantize;

/// Face flag: the face does not block movement
pub const FACE_NOT_SOLID: u16 = 0x10;

/// Mesh op type whose payload is a float offset rather than two indices
pub const MESH_OP_OFFSET: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshFace {
    pub flags: u16,
    pub indices: [u16; 3],
}

impl MeshFace {
    pub fn is_solid(&self) -> bool {
        self.flags & FACE_NOT_SOLID == 0
    }
}

/// Run-length group over vertices: `count` consecutive vertices share `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VertexGroup {
    pub count: i16,
    pub index: i16,
}

/// Run-length group over faces: `count` consecutive faces use `material`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FaceGroup {
    pub count: u16,
    pub material: u16,
}

/// One mesh op entry. The first four bytes are two indices, or an f32 offset
/// when `type_field` is [`MESH_OP_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshOp {
    pub index1: u16,
    pub index2: u16,
    pub param: u8,
    pub type_field: u8,
}

impl MeshOp {
    pub fn offset(&self) -> Option<f32> {
        if self.type_field != MESH_OP_OFFSET {
            return None;
        }
        let bits = u32::from(self.index1) | (u32::from(self.index2) << 16);
        Some(f32::from_bits(bits))
    }
}

/// Mesh geometry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DmSpriteDef2 {
    pub name: Option<String>,
    pub flags: u32,
    pub material_palette: u32,
    pub dm_track: i32,
    pub polyhedron: i32,
    pub fragment4: i32,
    pub center: Vec3,
    pub params2: [u32; 3],
    pub bounding_radius: f32,
    pub bbox_min: Vec3,
    pub bbox_max: Vec3,
    /// Exponent of the vertex grid: step = 1 / 2^raw_scale
    pub raw_scale: u16,
    pub vertices: Vec<[i16; 3]>,
    /// Raw texture coordinates, widened to i32 for both dialects
    pub uvs: Vec<[i32; 2]>,
    pub normals: Vec<[i8; 3]>,
    pub colors: Vec<[u8; 4]>,
    pub faces: Vec<MeshFace>,
    pub skin_groups: Vec<VertexGroup>,
    pub face_material_groups: Vec<FaceGroup>,
    pub vertex_material_groups: Vec<VertexGroup>,
    pub mesh_ops: Vec<MeshOp>,
}

impl DmSpriteDef2 {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let material_palette = r.u32()?;
        let dm_track = r.i32()?;
        let polyhedron = r.i32()?;
        let fragment4 = r.i32()?;
        let center = r.vec3()?;
        let params2 = [r.u32()?, r.u32()?, r.u32()?];
        let bounding_radius = r.f32()?;
        let bbox_min = r.vec3()?;
        let bbox_max = r.vec3()?;

        let vertex_count = r.u16()?;
        let uv_count = r.u16()?;
        let normal_count = r.u16()?;
        let color_count = r.u16()?;
        let face_count = r.u16()?;
        let skin_group_count = r.u16()?;
        let face_material_count = r.u16()?;
        let vertex_material_count = r.u16()?;
        let mesh_op_count = r.u16()?;
        let raw_scale = r.u16()?;

        let n = r.count(u32::from(vertex_count), 6)?;
        let mut vertices = Vec::with_capacity(n);
        for _ in 0..n {
            vertices.push([r.i16()?, r.i16()?, r.i16()?]);
        }

        let uv_size = match r.dialect() {
            Dialect::OldWorld => 4,
            Dialect::NewWorld => 8,
        };
        let n = r.count(u32::from(uv_count), uv_size)?;
        let mut uvs = Vec::with_capacity(n);
        for _ in 0..n {
            let uv = match r.dialect() {
                Dialect::OldWorld => [i32::from(r.i16()?), i32::from(r.i16()?)],
                Dialect::NewWorld => [r.i32()?, r.i32()?],
            };
            uvs.push(uv);
        }

        let n = r.count(u32::from(normal_count), 3)?;
        let mut normals = Vec::with_capacity(n);
        for _ in 0..n {
            normals.push([r.i8()?, r.i8()?, r.i8()?]);
        }

        let n = r.count(u32::from(color_count), 4)?;
        let mut colors = Vec::with_capacity(n);
        for _ in 0..n {
            colors.push([r.u8()?, r.u8()?, r.u8()?, r.u8()?]);
        }

        let n = r.count(u32::from(face_count), 8)?;
        let mut faces = Vec::with_capacity(n);
        for _ in 0..n {
            faces.push(MeshFace {
                flags: r.u16()?,
                indices: [r.u16()?, r.u16()?, r.u16()?],
            });
        }

        let skin_groups = read_vertex_groups(r, skin_group_count)?;

        let n = r.count(u32::from(face_material_count), 4)?;
        let mut face_material_groups = Vec::with_capacity(n);
        for _ in 0..n {
            face_material_groups.push(FaceGroup {
                count: r.u16()?,
                material: r.u16()?,
            });
        }

        let vertex_material_groups = read_vertex_groups(r, vertex_material_count)?;

        let n = r.count(u32::from(mesh_op_count), 6)?;
        let mut mesh_ops = Vec::with_capacity(n);
        for _ in 0..n {
            mesh_ops.push(MeshOp {
                index1: r.u16()?,
                index2: r.u16()?,
                param: r.u8()?,
                type_field: r.u8()?,
            });
        }

        r.skip_padding(4);

        let mesh = Self {
            name,
            flags,
            material_palette,
            dm_track,
            polyhedron,
            fragment4,
            center,
            params2,
            bounding_radius,
            bbox_min,
            bbox_max,
            raw_scale,
            vertices,
            uvs,
            normals,
            colors,
            faces,
            skin_groups,
            face_material_groups,
            vertex_material_groups,
            mesh_ops,
        };
        if r.warn_run_lengths() {
            mesh.warn_on_group_mismatch();
        }
        Ok(mesh)
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.u32(self.material_palette)?;
        w.i32(self.dm_track)?;
        w.i32(self.polyhedron)?;
        w.i32(self.fragment4)?;
        w.vec3(self.center)?;
        for p in self.params2 {
            w.u32(p)?;
        }
        w.f32(self.bounding_radius)?;
        w.vec3(self.bbox_min)?;
        w.vec3(self.bbox_max)?;

        w.count_u16("vertices", self.vertices.len())?;
        w.count_u16("uvs", self.uvs.len())?;
        w.count_u16("normals", self.normals.len())?;
        w.count_u16("colors", self.colors.len())?;
        w.count_u16("faces", self.faces.len())?;
        w.count_u16("skin_groups", self.skin_groups.len())?;
        w.count_u16("face_material_groups", self.face_material_groups.len())?;
        w.count_u16("vertex_material_groups", self.vertex_material_groups.len())?;
        w.count_u16("mesh_ops", self.mesh_ops.len())?;
        w.u16(self.raw_scale)?;

        for v in &self.vertices {
            for c in v {
                w.i16(*c)?;
            }
        }
        for uv in &self.uvs {
            for &c in uv {
                match w.dialect() {
                    Dialect::OldWorld => {
                        let c = i16::try_from(c).map_err(|_| EncodeError::ValueOutOfRange {
                            field: "uvs",
                            value: i64::from(c),
                        })?;
                        w.i16(c)?;
                    }
                    Dialect::NewWorld => w.i32(c)?,
                }
            }
        }
        for n in &self.normals {
            for c in n {
                w.i8(*c)?;
            }
        }
        for color in &self.colors {
            w.bytes(color)?;
        }
        for face in &self.faces {
            w.u16(face.flags)?;
            for i in face.indices {
                w.u16(i)?;
            }
        }
        for group in &self.skin_groups {
            w.i16(group.count)?;
            w.i16(group.index)?;
        }
        for group in &self.face_material_groups {
            w.u16(group.count)?;
            w.u16(group.material)?;
        }
        for group in &self.vertex_material_groups {
            w.i16(group.count)?;
            w.i16(group.index)?;
        }
        for op in &self.mesh_ops {
            w.u16(op.index1)?;
            w.u16(op.index2)?;
            w.u8(op.param)?;
            w.u8(op.type_field)?;
        }

        w.pad_to(4)
    }

    /// Step size of the vertex grid
    pub fn scale(&self) -> f32 {
        quantize::vertex_scale(self.raw_scale)
    }

    /// Reconstructed vertex positions
    pub fn positions(&self) -> Vec<Vec3> {
        self.vertices
            .iter()
            .map(|&raw| quantize::dequantize_vertex(self.center, raw, self.raw_scale))
            .collect()
    }

    /// Replace the vertices, quantizing at the existing center and scale
    pub fn set_positions(&mut self, positions: &[Vec3]) -> Result<(), EncodeError> {
        self.vertices = positions
            .iter()
            .map(|&p| quantize::quantize_vertex(self.center, p, self.raw_scale))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    pub fn uv(&self, index: usize) -> Option<Vec2> {
        self.uvs
            .get(index)
            .map(|uv| Vec2::new(quantize::uv_from_raw(uv[0]), quantize::uv_from_raw(uv[1])))
    }

    pub fn normal(&self, index: usize) -> Option<Vec3> {
        self.normals.get(index).map(|n| {
            Vec3::new(
                quantize::normal_from_raw(n[0]),
                quantize::normal_from_raw(n[1]),
                quantize::normal_from_raw(n[2]),
            )
        })
    }

    fn warn_on_group_mismatch(&self) {
        let checks = [
            ("skin_groups", group_total(&self.skin_groups), self.vertices.len()),
            (
                "face_material_groups",
                self.face_material_groups.iter().map(|g| i64::from(g.count)).sum(),
                self.faces.len(),
            ),
            (
                "vertex_material_groups",
                group_total(&self.vertex_material_groups),
                self.vertices.len(),
            ),
        ];
        for (field, total, expected) in checks {
            if total != 0 && total != expected as i64 {
                tracing::warn!(
                    "mesh {:?}: {} cover {} entries, parent list has {}",
                    self.name,
                    field,
                    total,
                    expected
                );
            }
        }
    }
}

fn read_vertex_groups(r: &mut FragmentReader<'_>, count: u16) -> Result<Vec<VertexGroup>, ReadError> {
    let n = r.count(u32::from(count), 4)?;
    let mut groups = Vec::with_capacity(n);
    for _ in 0..n {
        groups.push(VertexGroup {
            count: r.i16()?,
            index: r.i16()?,
        });
    }
    Ok(groups)
}

fn group_total(groups: &[VertexGroup]) -> i64 {
    groups.iter().map(|g| i64::from(g.count)).sum()
}

/// Per-frame vertex animation for a mesh
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DmTrackDef2 {
    pub name: Option<String>,
    pub flags: u32,
    /// Vertices per frame; every frame must hold exactly this many
    pub vertex_count: u16,
    pub sleep: u16,
    pub param2: u16,
    pub raw_scale: u16,
    pub frames: Vec<Vec<[i16; 3]>>,
    pub trailer: u16,
}

impl DmTrackDef2 {
    pub(crate) fn read(r: &mut FragmentReader<'_>) -> Result<Self, ReadError> {
        let name = r.name()?;
        let flags = r.u32()?;
        let vertex_count = r.u16()?;
        let frame_count = r.u16()?;
        let sleep = r.u16()?;
        let param2 = r.u16()?;
        let raw_scale = r.u16()?;

        let per_frame = usize::from(vertex_count);
        r.count(u32::from(frame_count) * u32::from(vertex_count), 6)?;
        let mut frames = Vec::with_capacity(usize::from(frame_count));
        for _ in 0..frame_count {
            let mut frame = Vec::with_capacity(per_frame);
            for _ in 0..per_frame {
                frame.push([r.i16()?, r.i16()?, r.i16()?]);
            }
            frames.push(frame);
        }
        let trailer = r.u16()?;

        Ok(Self {
            name,
            flags,
            vertex_count,
            sleep,
            param2,
            raw_scale,
            frames,
            trailer,
        })
    }

    pub(crate) fn write(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
        w.name(self.name.as_deref())?;
        w.u32(self.flags)?;
        w.u16(self.vertex_count)?;
        w.count_u16("frames", self.frames.len())?;
        w.u16(self.sleep)?;
        w.u16(self.param2)?;
        w.u16(self.raw_scale)?;
        for frame in &self.frames {
            if frame.len() != usize::from(self.vertex_count) {
                return Err(EncodeError::CountMismatch {
                    field: "frames",
                    expected: usize::from(self.vertex_count),
                    actual: frame.len(),
                });
            }
            for v in frame {
                for c in v {
                    w.i16(*c)?;
                }
            }
        }
        w.u16(self.trailer)
    }

    /// Vertex offsets of one frame, scaled by the track's grid
    pub fn frame_offsets(&self, frame: usize) -> Option<Vec<Vec3>> {
        self.frames.get(frame).map(|verts| {
            verts
                .iter()
                .map(|&raw| quantize::dequantize_vertex(Vec3::ZERO, raw, self.raw_scale))
                .collect()
        })
    }
}
