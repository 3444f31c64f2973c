//! Fragment model and per-type codecs
//!
//! Every fragment is one directory entry: a payload whose layout is picked by
//! its type code. Typed payloads decode into one variant of [`Fragment`];
//! codes without a modelled layout, and payloads a typed decode does not
//! fully consume, travel as [`Fragment::Opaque`] and are written back
//! verbatim.
//!
//! Decoding resolves name refs to `Option<String>` against the container's
//! name table. Encoding writes placeholders that the container resolves in
//! directory order, so fragments can be edited, added or removed freely.

mod actor;
mod common;
mod light;
mod material;
mod mesh;
mod skeleton;
mod sprite;
mod world;


pub use actor::{
    Action, Actor, ActorDef, ActorFlags, Location, ParticleCloudDef, Polyhedron, PolyhedronDef, PolyhedronFace,
    Sphere, SphereListDef,
};
pub use common::{FlagsFragment, FullRenderInfo, RefFragment, RenderFlags, RenderInfo, UvInfo, UvMapEntry, WldString};
pub use light::{AmbientLight, DmRgbTrackDef, GlobalAmbientLightDef, LightDef, LightFlags, PointLight, PointLightOldDef};
pub use material::{
    BlitSpriteDef, BmInfo, DefaultPaletteFile, MaterialDef, MaterialFlags, MaterialPair, MaterialPalette,
    SimpleSpriteDef, SimpleSpriteFlags,
};
pub use mesh::{
    DmSpriteDef2, DmTrackDef2, FACE_NOT_SOLID, FaceGroup, MESH_OP_OFFSET, MeshFace, MeshOp, VertexGroup,
};
pub use skeleton::{
    Bone, HierarchicalSpriteDef, SkeletonFlags, SkinList, TRACK_OBJECT_ANIMATION, Track, TrackDef, TrackFlags,
    TrackFrame,
};
pub use sprite::{BspNode, ParticleSpriteDef, Sprite2DDef, Sprite3DDef, Sprite4DDef, SpriteFlags};
pub use world::{
    Obstacle, ObstacleShape, Region, RegionFlags, VisList, VisNode, Wall, WorldTree, WorldTreeNode, Zone,
};

use serde::{Deserialize, Serialize};

use crate::binary::{DecodeContext, EncodedPayload, FragmentReader, FragmentWriter};
use crate::error::{EncodeError, ReadError};
use crate::header::Dialect;
use crate::name_table::NameTable;
use crate::registry::{self, FragmentCode};

/// Payload kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueFragment {
    pub code: FragmentCode,
    pub bytes: Vec<u8>,
}

macro_rules! fragments {
    ($($(#[$meta:meta])* $variant:ident($ty:ty) = $code:ident,)*) => {
        /// One decoded directory entry
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum Fragment {
            $($(#[$meta])* $variant($ty),)*
            /// Unmodelled code, or a payload whose layout did not match
            Opaque(OpaqueFragment),
        }

        impl Fragment {
            pub fn code(&self) -> FragmentCode {
                match self {
                    $(Self::$variant(_) => FragmentCode::$code,)*
                    Self::Opaque(f) => f.code,
                }
            }

            /// Resolved name; `None` for unnamed and opaque fragments
            pub fn name(&self) -> Option<&str> {
                match self {
                    $(Self::$variant(f) => f.name.as_deref(),)*
                    Self::Opaque(_) => None,
                }
            }

            fn write_body(&self, w: &mut FragmentWriter) -> Result<(), EncodeError> {
                match self {
                    $(Self::$variant(f) => f.write(w),)*
                    Self::Opaque(f) => w.bytes(&f.bytes),
                }
            }
        }
    };
}

fragments! {
    DefaultPaletteFile(DefaultPaletteFile) = DEFAULT_PALETTE_FILE,
    BmInfo(BmInfo) = BM_INFO,
    SimpleSpriteDef(SimpleSpriteDef) = SIMPLE_SPRITE_DEF,
    SimpleSprite(RefFragment) = SIMPLE_SPRITE,
    Sprite2DDef(Sprite2DDef) = SPRITE_2D_DEF,
    Sprite2D(RefFragment) = SPRITE_2D,
    Sprite3DDef(Sprite3DDef) = SPRITE_3D_DEF,
    Sprite3D(RefFragment) = SPRITE_3D,
    Sprite4DDef(Sprite4DDef) = SPRITE_4D_DEF,
    Sprite4D(RefFragment) = SPRITE_4D,
    ParticleSpriteDef(ParticleSpriteDef) = PARTICLE_SPRITE_DEF,
    ParticleSprite(RefFragment) = PARTICLE_SPRITE,
    CompositeSpriteDef(FlagsFragment) = COMPOSITE_SPRITE_DEF,
    CompositeSprite(RefFragment) = COMPOSITE_SPRITE,
    /// Skeleton
    HierarchicalSpriteDef(HierarchicalSpriteDef) = HIERARCHICAL_SPRITE_DEF,
    HierarchicalSprite(RefFragment) = HIERARCHICAL_SPRITE,
    TrackDef(TrackDef) = TRACK_DEF,
    Track(Track) = TRACK,
    ActorDef(ActorDef) = ACTOR_DEF,
    Actor(Actor) = ACTOR,
    Sphere(Sphere) = SPHERE,
    PolyhedronDef(PolyhedronDef) = POLYHEDRON_DEF,
    Polyhedron(Polyhedron) = POLYHEDRON,
    SphereListDef(SphereListDef) = SPHERE_LIST_DEF,
    SphereList(RefFragment) = SPHERE_LIST,
    LightDef(LightDef) = LIGHT_DEF,
    Light(RefFragment) = LIGHT,
    PointLightOld(FlagsFragment) = POINT_LIGHT_OLD,
    PointLightOldDef(PointLightOldDef) = POINT_LIGHT_OLD_DEF,
    Sound(FlagsFragment) = SOUND,
    SoundDef(FlagsFragment) = SOUND_DEF,
    WorldTree(WorldTree) = WORLD_TREE,
    Region(Region) = REGION,
    BlitSpriteDef(BlitSpriteDef) = BLIT_SPRITE_DEF,
    BlitSprite(RefFragment) = BLIT_SPRITE,
    PointLight(PointLight) = POINT_LIGHT,
    Zone(Zone) = ZONE,
    AmbientLight(AmbientLight) = AMBIENT_LIGHT,
    DmSprite(RefFragment) = DM_SPRITE,
    DmTrack(RefFragment) = DM_TRACK,
    MaterialDef(MaterialDef) = MATERIAL_DEF,
    MaterialPalette(MaterialPalette) = MATERIAL_PALETTE,
    DmRgbTrackDef(DmRgbTrackDef) = DM_RGB_TRACK_DEF,
    DmRgbTrack(RefFragment) = DM_RGB_TRACK,
    ParticleCloudDef(ParticleCloudDef) = PARTICLE_CLOUD_DEF,
    GlobalAmbientLightDef(GlobalAmbientLightDef) = GLOBAL_AMBIENT_LIGHT_DEF,
    /// Mesh
    DmSpriteDef2(DmSpriteDef2) = DM_SPRITE_DEF_2,
    DmTrackDef2(DmTrackDef2) = DM_TRACK_DEF_2,
}

impl Fragment {
    /// Decode one payload with default settings
    pub fn decode(code: FragmentCode, bytes: &[u8], dialect: Dialect, names: &NameTable) -> Result<Self, ReadError> {
        let ctx = DecodeContext {
            dialect,
            names,
            warn_run_lengths: true,
        };
        decode_payload(code, bytes, 0, ctx, true).map(|(fragment, _)| fragment)
    }

    /// Encode one payload, interning its names into `names`
    pub fn encode(&self, dialect: Dialect, names: &mut NameTable) -> Result<Vec<u8>, EncodeError> {
        Ok(self.layout(dialect)?.resolve(names))
    }

    /// Lay out the payload with name refs left as patches
    pub fn layout(&self, dialect: Dialect) -> Result<EncodedPayload, EncodeError> {
        let mut w = FragmentWriter::new(dialect);
        self.write_body(&mut w)?;
        Ok(w.finish())
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// Wrap raw bytes without interpreting them
    pub fn opaque(code: FragmentCode, bytes: Vec<u8>) -> Self {
        Self::Opaque(OpaqueFragment { code, bytes })
    }
}

/// Decode a payload located at absolute offset `base`.
///
/// Returns the fragment and the name refs it was read with, in read order.
/// A typed decode that leaves bytes unread, or that met padding the writer
/// would not reproduce, either falls back to an opaque fragment or fails, per
/// `opaque_on_trailing_bytes`.
pub(crate) fn decode_payload(
    code: FragmentCode,
    bytes: &[u8],
    base: usize,
    ctx: DecodeContext<'_>,
    opaque_on_trailing_bytes: bool,
) -> Result<(Fragment, Vec<i32>), ReadError> {
    let Some(decode) = registry::entry(code).and_then(|e| e.decode) else {
        if registry::entry(code).is_none() {
            tracing::debug!("unknown fragment code 0x{:X} at offset {}, kept opaque", code.value(), base);
        }
        return Ok((Fragment::opaque(code, bytes.to_vec()), Vec::new()));
    };

    let mut r = FragmentReader::new(bytes, base, ctx);
    let fragment = decode(&mut r)?;
    let trailing = r.remaining();
    let problem = match r.irregular_padding() {
        Some(offset) => format!("irregular padding at offset {offset} in {code}"),
        None if trailing > 0 => format!("{trailing} trailing bytes after {code}"),
        None => return Ok((fragment, r.into_name_refs())),
    };
    if !opaque_on_trailing_bytes {
        return Err(r.invariant(problem));
    }
    tracing::warn!("{} at offset {}: {}, keeping payload opaque", code, base, problem);
    Ok((Fragment::opaque(code, bytes.to_vec()), Vec::new()))
}
