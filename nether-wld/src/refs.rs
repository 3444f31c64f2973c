//! Directory references held by each fragment type
//!
//! References are 1-based directory indices; 0 means absent. Fields that
//! hold a negative value are name refs standing in for a fragment and are
//! skipped. Name refs, bone indices of other tables and region numbers are
//! not directory references, with one exception: skeleton child lists are
//! reported as `bone_child` so graph consumers can rebuild the bone tree.
//! Those are 0-based, so a child index of 0 is kept.

use serde::Serialize;

use crate::fragment::Fragment;

/// One reference field of a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FragmentReference {
    pub field: &'static str,
    pub index: u32,
}

/// Field label of skeleton child lists; these hold bone indices
pub const BONE_CHILD: &str = "bone_child";

/// One directory-level reference: `source` names `target` through `field`.
/// Both indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub source: u32,
    pub field: &'static str,
    pub target: u32,
}

#[derive(Default)]
struct Collector {
    refs: Vec<FragmentReference>,
}

impl Collector {
    fn add(&mut self, field: &'static str, index: u32) {
        if index != 0 {
            self.refs.push(FragmentReference { field, index });
        }
    }

    fn add_signed(&mut self, field: &'static str, index: i32) {
        if let Ok(index) = u32::try_from(index) {
            self.add(field, index);
        }
    }

    fn add_all(&mut self, field: &'static str, indices: &[u32]) {
        for &index in indices {
            self.add(field, index);
        }
    }

    /// Bone indices are 0-based, so every entry is kept
    fn add_bones(&mut self, indices: &[u32]) {
        self.refs
            .extend(indices.iter().map(|&index| FragmentReference { field: BONE_CHILD, index }));
    }
}

impl Fragment {
    /// Every reference field, in layout order
    pub fn references(&self) -> Vec<FragmentReference> {
        let mut c = Collector::default();
        match self {
            Self::SimpleSprite(f)
            | Self::Sprite2D(f)
            | Self::Sprite3D(f)
            | Self::Sprite4D(f)
            | Self::ParticleSprite(f)
            | Self::CompositeSprite(f)
            | Self::HierarchicalSprite(f)
            | Self::SphereList(f)
            | Self::Light(f)
            | Self::BlitSprite(f)
            | Self::DmSprite(f)
            | Self::DmTrack(f)
            | Self::DmRgbTrack(f) => c.add_signed("reference", f.reference),
            Self::SimpleSpriteDef(f) => c.add_all("bitmap", &f.bitmaps),
            Self::Sprite2DDef(f) => {
                c.add("sphere", f.sphere);
                if let Some(info) = &f.render_info {
                    c.add("simple_sprite", info.simple_sprite.unwrap_or(0));
                }
            }
            Self::Sprite3DDef(f) => {
                c.add("sphere_list", f.sphere_list);
                for node in &f.nodes {
                    c.add("simple_sprite", node.render_info.simple_sprite.unwrap_or(0));
                }
            }
            Self::Sprite4DDef(f) => {
                c.add_signed("polygon", f.polygon);
                if let Some(frames) = &f.frames {
                    c.add_all("frame", frames);
                }
            }
            Self::ParticleSpriteDef(f) => c.add("simple_sprite", f.render_info.simple_sprite),
            Self::HierarchicalSpriteDef(f) => {
                c.add("collision_volume", f.collision_volume);
                for bone in &f.bones {
                    c.add("track", bone.track);
                    c.add("sprite", bone.sprite);
                    c.add_bones(&bone.children);
                }
                if let Some(skins) = &f.skins {
                    c.add_all("skin", &skins.skins);
                }
            }
            Self::Track(f) => c.add_signed("track_def", f.track_def),
            Self::ActorDef(f) => {
                c.add_signed("bounds", f.bounds);
                c.add_all("sprite", &f.sprites);
            }
            Self::Actor(f) => {
                c.add_signed("actor_def", f.actor_def);
                c.add("sphere", f.sphere);
            }
            Self::Polyhedron(f) => c.add_signed("polyhedron_def", f.polyhedron_def),
            Self::PointLightOldDef(f) => c.add_signed("point_light", f.point_light),
            Self::WorldTree(f) => {
                for node in &f.nodes {
                    c.add_signed("region", node.region);
                }
            }
            Self::Region(f) => {
                c.add_signed("ambient_light", f.ambient_light);
                for wall in &f.walls {
                    c.add("simple_sprite", wall.render_info.simple_sprite);
                }
                if let Some(mesh) = f.mesh {
                    c.add_signed("mesh", mesh);
                }
            }
            Self::BlitSpriteDef(f) => c.add("sprite", f.sprite),
            Self::PointLight(f) => c.add_signed("light", f.light),
            Self::AmbientLight(f) => c.add_signed("light", f.light),
            Self::MaterialDef(f) => c.add("simple_sprite", f.simple_sprite),
            Self::MaterialPalette(f) => c.add_all("material", &f.materials),
            Self::ParticleCloudDef(f) => c.add("particle_sprite", f.particle_sprite),
            Self::DmSpriteDef2(f) => {
                c.add("material_palette", f.material_palette);
                c.add_signed("dm_track", f.dm_track);
                c.add_signed("polyhedron", f.polyhedron);
                c.add_signed("fragment4", f.fragment4);
            }
            Self::DefaultPaletteFile(_)
            | Self::BmInfo(_)
            | Self::CompositeSpriteDef(_)
            | Self::TrackDef(_)
            | Self::Sphere(_)
            | Self::PolyhedronDef(_)
            | Self::SphereListDef(_)
            | Self::LightDef(_)
            | Self::PointLightOld(_)
            | Self::Sound(_)
            | Self::SoundDef(_)
            | Self::Zone(_)
            | Self::DmRgbTrackDef(_)
            | Self::GlobalAmbientLightDef(_)
            | Self::DmTrackDef2(_)
            | Self::Opaque(_) => {}
        }
        c.refs
    }

    /// Indices named by this fragment. `bone_child` entries are 0-based bone
    /// indices; everything else is a 1-based directory index.
    pub fn referenced_indices(&self) -> Vec<u32> {
        self.references().into_iter().map(|r| r.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Bone, HierarchicalSpriteDef, MaterialPalette, RefFragment};

    #[test]
    fn test_instance_skips_name_ref_targets() {
        let by_index = Fragment::DmSprite(RefFragment {
            name: None,
            reference: 4,
            flags: 0,
        });
        assert_eq!(by_index.referenced_indices(), vec![4]);

        let by_name = Fragment::DmSprite(RefFragment {
            name: None,
            reference: -12,
            flags: 0,
        });
        assert!(by_name.referenced_indices().is_empty());
    }

    #[test]
    fn test_zero_entries_are_absent() {
        let palette = Fragment::MaterialPalette(MaterialPalette {
            name: None,
            flags: 0,
            materials: vec![3, 0, 5],
        });
        assert_eq!(palette.referenced_indices(), vec![3, 5]);
    }

    #[test]
    fn test_skeleton_fields_are_labelled() {
        let skeleton = Fragment::HierarchicalSpriteDef(HierarchicalSpriteDef {
            bones: vec![Bone {
                name: Some("ROOT".into()),
                track: 2,
                sprite: 3,
                children: vec![1],
                ..Bone::default()
            }],
            ..HierarchicalSpriteDef::default()
        });
        let fields: Vec<_> = skeleton.references().iter().map(|r| r.field).collect();
        assert_eq!(fields, vec!["track", "sprite", "bone_child"]);
    }

    #[test]
    fn test_bone_child_zero_is_kept() {
        // Bone 1 is the root and lists bone 0 as a child
        let skeleton = HierarchicalSpriteDef {
            bones: vec![
                Bone::default(),
                Bone {
                    children: vec![0, 2],
                    ..Bone::default()
                },
                Bone::default(),
            ],
            ..HierarchicalSpriteDef::default()
        };
        assert_eq!(skeleton.parents(), vec![Some(1), None, Some(1)]);

        let children: Vec<_> = Fragment::HierarchicalSpriteDef(skeleton)
            .references()
            .into_iter()
            .filter(|r| r.field == BONE_CHILD)
            .map(|r| r.index)
            .collect();
        assert_eq!(children, vec![0, 2]);
    }
}
