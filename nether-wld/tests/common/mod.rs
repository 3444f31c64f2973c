//! Container builders shared by the integration tests

#![allow(dead_code)]

use glam::{Vec3, Vec4};
use nether_wld::{
    BmInfo, NEW_WORLD_VERSION, WLD_MAGIC, hash_bytes, Bone, Dialect, DmSpriteDef2, FaceGroup, Fragment, HierarchicalSpriteDef, MaterialDef, MaterialPalette,
    MeshFace, RefFragment, Region, SimpleSpriteDef, Track, TrackDef, TrackFrame, VertexGroup, Wld, WldString,
    WorldTree, WorldTreeNode,
};

/// Little-endian byte builder for hand-assembled containers
#[derive(Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn bytes(mut self, v: &[u8]) -> Self {
        self.0.extend_from_slice(v);
        self
    }

    /// Bytes under the name-table XOR transform
    pub fn hashed(mut self, v: &[u8]) -> Self {
        let mut v = v.to_vec();
        hash_bytes(&mut v);
        self.0.extend_from_slice(&v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn zeros(mut self, n: usize) -> Self {
        self.0.resize(self.0.len() + n, 0);
        self
    }
}

/// Assemble a container from a plain name blob and (code, payload) entries
pub fn container(version: u32, names: &[u8], entries: &[(u32, &[u8])]) -> Vec<u8> {
    let mut bytes = Bytes::default()
        .bytes(&WLD_MAGIC)
        .u32(version)
        .u32(entries.len() as u32)
        .u32(0)
        .u32(0)
        .u32(names.len() as u32)
        .u32(0)
        .hashed(names);
    for (code, payload) in entries {
        bytes = bytes.u32(payload.len() as u32).u32(*code).bytes(payload);
    }
    bytes.0
}

/// Mesh with a single vertex at raw (0, 0, 0) around center (1, 1, 1),
/// ending in its two bytes of zero padding
pub fn minimal_mesh_payload() -> Vec<u8> {
    let payload = Bytes::default()
        // name, flags, material palette, dm track, polyhedron, fragment4
        .zeros(24)
        .f32(1.0)
        .f32(1.0)
        .f32(1.0)
        // params2, bounding radius, bbox min, bbox max
        .zeros(12 + 4 + 24)
        .u16(1)
        .zeros(8 * 2)
        // raw scale
        .u16(0)
        .i16(0)
        .i16(0)
        .i16(0)
        .zeros(2)
        .0;
    assert_eq!(payload.len(), 104);
    payload
}

/// New-world container, empty name table, one minimal mesh
pub fn minimal_mesh_container() -> Vec<u8> {
    container(NEW_WORLD_VERSION, &[], &[(0x36, &minimal_mesh_payload())])
}

/// A small zone: textures, a skinned model and a one-region world tree
pub fn sample_zone(dialect: Dialect) -> Wld {
    let mut wld = Wld::new(dialect);

    let bitmap = wld.push(Fragment::BmInfo(BmInfo {
        name: Some("GRASS_SPRITE".into()),
        file_names: vec![WldString::from("GRASS.BMP\0")],
    }));
    let sprite = wld.push(Fragment::SimpleSpriteDef(SimpleSpriteDef {
        name: Some("GRASS_SPRITE".into()),
        bitmaps: vec![bitmap],
        ..SimpleSpriteDef::default()
    }));
    let material = wld.push(Fragment::MaterialDef(MaterialDef {
        name: Some("GRASS_MDF".into()),
        render_method: 0x8000_0001,
        brightness: 0.75,
        simple_sprite: sprite,
        ..MaterialDef::default()
    }));
    let palette = wld.push(Fragment::MaterialPalette(MaterialPalette {
        name: Some("ZONE_MP".into()),
        flags: 0,
        materials: vec![material],
    }));
    let mesh = wld.push(Fragment::DmSpriteDef2(DmSpriteDef2 {
        name: Some("R1_DMSPRITEDEF".into()),
        material_palette: palette,
        center: Vec3::new(100.0, -20.0, 4.0),
        bounding_radius: 32.0,
        raw_scale: 4,
        vertices: vec![[0, 0, 0], [16, 0, 0], [0, 16, 0]],
        uvs: vec![[0, 0], [256, 0], [0, 256]],
        normals: vec![[0, 0, 127]; 3],
        faces: vec![MeshFace {
            flags: 0,
            indices: [0, 1, 2],
        }],
        skin_groups: vec![VertexGroup { count: 3, index: 0 }],
        face_material_groups: vec![FaceGroup { count: 1, material: 0 }],
        ..DmSpriteDef2::default()
    }));
    let mesh_ref = wld.push(Fragment::DmSprite(RefFragment {
        name: None,
        reference: mesh as i32,
        flags: 0,
    }));

    let track_def = wld.push(Fragment::TrackDef(TrackDef {
        name: Some("ROOT_TRACKDEF".into()),
        frames: vec![TrackFrame {
            rotation_denominator: 16384,
            rotation: [0, 0, 0],
            shift: [0, 0, 256],
            shift_denominator: 256,
        }],
    }));
    let track = wld.push(Fragment::Track(Track {
        name: Some("ROOT_TRACK".into()),
        track_def: track_def as i32,
        ..Track::default()
    }));
    wld.push(Fragment::HierarchicalSpriteDef(HierarchicalSpriteDef {
        name: Some("TOTEM_HS_DEF".into()),
        bounding_radius: Some(8.0),
        bones: vec![Bone {
            name: Some("ROOT_DAG".into()),
            flags: 0,
            track,
            sprite: mesh_ref,
            children: vec![],
        }],
        ..HierarchicalSpriteDef::default()
    }));

    let region = wld.push(Fragment::Region(Region {
        name: Some("R000001".into()),
        sphere: Some(Vec4::new(100.0, -20.0, 4.0, 32.0)),
        user_data: WldString::from(""),
        mesh: Some(mesh as i32),
        ..Region::default()
    }));
    wld.push(Fragment::WorldTree(WorldTree {
        name: None,
        nodes: vec![WorldTreeNode {
            plane: Vec4::ZERO,
            region: region as i32,
            front: 0,
            back: 0,
        }],
    }));

    wld
}
