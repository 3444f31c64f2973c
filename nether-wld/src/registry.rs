//! Fragment type codes and the code → decoder table
//!
//! Codes 0x00..=0x37 are known. Codes whose layout is not modelled keep a
//! name but no decoder and travel as opaque bytes, the same as codes outside
//! the table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binary::FragmentReader;
use crate::error::ReadError;
use crate::fragment::*;

/// Four-byte fragment type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentCode(pub u32);

impl FragmentCode {
    pub const DEFAULT: Self = Self(0x00);
    pub const DEFAULT_PALETTE_FILE: Self = Self(0x01);
    pub const USER_DATA: Self = Self(0x02);
    pub const BM_INFO: Self = Self(0x03);
    pub const SIMPLE_SPRITE_DEF: Self = Self(0x04);
    pub const SIMPLE_SPRITE: Self = Self(0x05);
    pub const SPRITE_2D_DEF: Self = Self(0x06);
    pub const SPRITE_2D: Self = Self(0x07);
    pub const SPRITE_3D_DEF: Self = Self(0x08);
    pub const SPRITE_3D: Self = Self(0x09);
    pub const SPRITE_4D_DEF: Self = Self(0x0A);
    pub const SPRITE_4D: Self = Self(0x0B);
    pub const PARTICLE_SPRITE_DEF: Self = Self(0x0C);
    pub const PARTICLE_SPRITE: Self = Self(0x0D);
    pub const COMPOSITE_SPRITE_DEF: Self = Self(0x0E);
    pub const COMPOSITE_SPRITE: Self = Self(0x0F);
    pub const HIERARCHICAL_SPRITE_DEF: Self = Self(0x10);
    pub const HIERARCHICAL_SPRITE: Self = Self(0x11);
    pub const TRACK_DEF: Self = Self(0x12);
    pub const TRACK: Self = Self(0x13);
    pub const ACTOR_DEF: Self = Self(0x14);
    pub const ACTOR: Self = Self(0x15);
    pub const SPHERE: Self = Self(0x16);
    pub const POLYHEDRON_DEF: Self = Self(0x17);
    pub const POLYHEDRON: Self = Self(0x18);
    pub const SPHERE_LIST_DEF: Self = Self(0x19);
    pub const SPHERE_LIST: Self = Self(0x1A);
    pub const LIGHT_DEF: Self = Self(0x1B);
    pub const LIGHT: Self = Self(0x1C);
    pub const POINT_LIGHT_OLD: Self = Self(0x1D);
    pub const POINT_LIGHT_OLD_DEF: Self = Self(0x1E);
    pub const SOUND: Self = Self(0x1F);
    pub const SOUND_DEF: Self = Self(0x20);
    pub const WORLD_TREE: Self = Self(0x21);
    pub const REGION: Self = Self(0x22);
    pub const ACTIVE_GEO_REGION: Self = Self(0x23);
    pub const SKY_REGION: Self = Self(0x24);
    pub const DIRECTIONAL_LIGHT_OLD: Self = Self(0x25);
    pub const BLIT_SPRITE_DEF: Self = Self(0x26);
    pub const BLIT_SPRITE: Self = Self(0x27);
    pub const POINT_LIGHT: Self = Self(0x28);
    pub const ZONE: Self = Self(0x29);
    pub const AMBIENT_LIGHT: Self = Self(0x2A);
    pub const DIRECTIONAL_LIGHT: Self = Self(0x2B);
    pub const DM_SPRITE_DEF: Self = Self(0x2C);
    pub const DM_SPRITE: Self = Self(0x2D);
    pub const DM_TRACK_DEF: Self = Self(0x2E);
    pub const DM_TRACK: Self = Self(0x2F);
    pub const MATERIAL_DEF: Self = Self(0x30);
    pub const MATERIAL_PALETTE: Self = Self(0x31);
    pub const DM_RGB_TRACK_DEF: Self = Self(0x32);
    pub const DM_RGB_TRACK: Self = Self(0x33);
    pub const PARTICLE_CLOUD_DEF: Self = Self(0x34);
    pub const GLOBAL_AMBIENT_LIGHT_DEF: Self = Self(0x35);
    pub const DM_SPRITE_DEF_2: Self = Self(0x36);
    pub const DM_TRACK_DEF_2: Self = Self(0x37);

    pub fn value(self) -> u32 {
        self.0
    }

    /// Canonical type name, or "Unknown" outside the table
    pub fn name(self) -> &'static str {
        entry(self).map_or("Unknown", |e| e.name)
    }

    /// Whether this code has a typed decoder
    pub fn is_modelled(self) -> bool {
        entry(self).is_some_and(|e| e.decode.is_some())
    }
}

impl fmt::Display for FragmentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} {}", self.0, self.name())
    }
}

impl From<u32> for FragmentCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

pub(crate) type DecodeFn = for<'a, 'b> fn(&'a mut FragmentReader<'b>) -> Result<Fragment, ReadError>;

/// One row of the dispatch table
pub struct RegistryEntry {
    pub code: FragmentCode,
    pub name: &'static str,
    pub(crate) decode: Option<DecodeFn>,
}

macro_rules! opaque {
    ($code:ident, $name:literal) => {
        RegistryEntry {
            code: FragmentCode::$code,
            name: $name,
            decode: None,
        }
    };
}

macro_rules! typed {
    ($code:ident, $name:literal, $variant:ident($ty:ty)) => {
        RegistryEntry {
            code: FragmentCode::$code,
            name: $name,
            decode: {
                fn decode(r: &mut FragmentReader<'_>) -> Result<Fragment, ReadError> {
                    <$ty>::read(r).map(Fragment::$variant)
                }
                Some(decode as DecodeFn)
            },
        }
    };
}

/// Dispatch table indexed by code value
pub static REGISTRY: [RegistryEntry; 56] = [
    opaque!(DEFAULT, "Default"),
    typed!(DEFAULT_PALETTE_FILE, "DefaultPaletteFile", DefaultPaletteFile(DefaultPaletteFile)),
    opaque!(USER_DATA, "UserData"),
    typed!(BM_INFO, "BmInfo", BmInfo(BmInfo)),
    typed!(SIMPLE_SPRITE_DEF, "SimpleSpriteDef", SimpleSpriteDef(SimpleSpriteDef)),
    typed!(SIMPLE_SPRITE, "SimpleSprite", SimpleSprite(RefFragment)),
    typed!(SPRITE_2D_DEF, "Sprite2DDef", Sprite2DDef(Sprite2DDef)),
    typed!(SPRITE_2D, "Sprite2D", Sprite2D(RefFragment)),
    typed!(SPRITE_3D_DEF, "Sprite3DDef", Sprite3DDef(Sprite3DDef)),
    typed!(SPRITE_3D, "Sprite3D", Sprite3D(RefFragment)),
    typed!(SPRITE_4D_DEF, "Sprite4DDef", Sprite4DDef(Sprite4DDef)),
    typed!(SPRITE_4D, "Sprite4D", Sprite4D(RefFragment)),
    typed!(PARTICLE_SPRITE_DEF, "ParticleSpriteDef", ParticleSpriteDef(ParticleSpriteDef)),
    typed!(PARTICLE_SPRITE, "ParticleSprite", ParticleSprite(RefFragment)),
    typed!(COMPOSITE_SPRITE_DEF, "CompositeSpriteDef", CompositeSpriteDef(FlagsFragment)),
    typed!(COMPOSITE_SPRITE, "CompositeSprite", CompositeSprite(RefFragment)),
    typed!(HIERARCHICAL_SPRITE_DEF, "HierarchicalSpriteDef", HierarchicalSpriteDef(HierarchicalSpriteDef)),
    typed!(HIERARCHICAL_SPRITE, "HierarchicalSprite", HierarchicalSprite(RefFragment)),
    typed!(TRACK_DEF, "TrackDef", TrackDef(TrackDef)),
    typed!(TRACK, "Track", Track(Track)),
    typed!(ACTOR_DEF, "ActorDef", ActorDef(ActorDef)),
    typed!(ACTOR, "Actor", Actor(Actor)),
    typed!(SPHERE, "Sphere", Sphere(Sphere)),
    typed!(POLYHEDRON_DEF, "PolyhedronDef", PolyhedronDef(PolyhedronDef)),
    typed!(POLYHEDRON, "Polyhedron", Polyhedron(Polyhedron)),
    typed!(SPHERE_LIST_DEF, "SphereListDef", SphereListDef(SphereListDef)),
    typed!(SPHERE_LIST, "SphereList", SphereList(RefFragment)),
    typed!(LIGHT_DEF, "LightDef", LightDef(LightDef)),
    typed!(LIGHT, "Light", Light(RefFragment)),
    typed!(POINT_LIGHT_OLD, "PointLightOld", PointLightOld(FlagsFragment)),
    typed!(POINT_LIGHT_OLD_DEF, "PointLightOldDef", PointLightOldDef(PointLightOldDef)),
    typed!(SOUND, "Sound", Sound(FlagsFragment)),
    typed!(SOUND_DEF, "SoundDef", SoundDef(FlagsFragment)),
    typed!(WORLD_TREE, "WorldTree", WorldTree(WorldTree)),
    typed!(REGION, "Region", Region(Region)),
    opaque!(ACTIVE_GEO_REGION, "ActiveGeoRegion"),
    opaque!(SKY_REGION, "SkyRegion"),
    opaque!(DIRECTIONAL_LIGHT_OLD, "DirectionalLightOld"),
    typed!(BLIT_SPRITE_DEF, "BlitSpriteDef", BlitSpriteDef(BlitSpriteDef)),
    typed!(BLIT_SPRITE, "BlitSprite", BlitSprite(RefFragment)),
    typed!(POINT_LIGHT, "PointLight", PointLight(PointLight)),
    typed!(ZONE, "Zone", Zone(Zone)),
    typed!(AMBIENT_LIGHT, "AmbientLight", AmbientLight(AmbientLight)),
    opaque!(DIRECTIONAL_LIGHT, "DirectionalLight"),
    opaque!(DM_SPRITE_DEF, "DmSpriteDef"),
    typed!(DM_SPRITE, "DmSprite", DmSprite(RefFragment)),
    opaque!(DM_TRACK_DEF, "DmTrackDef"),
    typed!(DM_TRACK, "DmTrack", DmTrack(RefFragment)),
    typed!(MATERIAL_DEF, "MaterialDef", MaterialDef(MaterialDef)),
    typed!(MATERIAL_PALETTE, "MaterialPalette", MaterialPalette(MaterialPalette)),
    typed!(DM_RGB_TRACK_DEF, "DmRgbTrackDef", DmRgbTrackDef(DmRgbTrackDef)),
    typed!(DM_RGB_TRACK, "DmRgbTrack", DmRgbTrack(RefFragment)),
    typed!(PARTICLE_CLOUD_DEF, "ParticleCloudDef", ParticleCloudDef(ParticleCloudDef)),
    typed!(GLOBAL_AMBIENT_LIGHT_DEF, "GlobalAmbientLightDef", GlobalAmbientLightDef(GlobalAmbientLightDef)),
    typed!(DM_SPRITE_DEF_2, "DmSpriteDef2", DmSpriteDef2(DmSpriteDef2)),
    typed!(DM_TRACK_DEF_2, "DmTrackDef2", DmTrackDef2(DmTrackDef2)),
];

/// Table row for a code, if the code is known
pub fn entry(code: FragmentCode) -> Option<&'static RegistryEntry> {
    REGISTRY.get(code.0 as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_code() {
        for (i, entry) in REGISTRY.iter().enumerate() {
            assert_eq!(entry.code.value() as usize, i, "{}", entry.name);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(FragmentCode::HIERARCHICAL_SPRITE_DEF.name(), "HierarchicalSpriteDef");
        assert_eq!(FragmentCode::DM_SPRITE_DEF_2.name(), "DmSpriteDef2");
        assert_eq!(FragmentCode(0x99).name(), "Unknown");
        assert_eq!(FragmentCode::TRACK_DEF.to_string(), "0x12 TrackDef");
    }

    #[test]
    fn test_unmodelled_codes_have_no_decoder() {
        assert!(!FragmentCode::DEFAULT.is_modelled());
        assert!(!FragmentCode::DM_SPRITE_DEF.is_modelled());
        assert!(!FragmentCode(0x40).is_modelled());
        assert!(FragmentCode::DM_SPRITE_DEF_2.is_modelled());
        let typed = REGISTRY.iter().filter(|e| e.decode.is_some()).count();
        assert_eq!(typed, 48);
    }
}
