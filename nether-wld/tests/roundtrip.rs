//! Whole-container decode/encode tests

mod common;

use common::{Bytes, container, minimal_mesh_container, minimal_mesh_payload, sample_zone};
use glam::Vec3;
use nether_wld::{
    DecodeOptions, Dialect, EncodeOptions, Fragment, FragmentCode, NEW_WORLD_VERSION, OLD_WORLD_VERSION,
    ReadError, WldError, decode, decode_with, encode, encode_with,
};

// =============================================================================
// Byte-exact round trips
// =============================================================================

#[test]
fn test_minimal_mesh_end_to_end() {
    let bytes = minimal_mesh_container();
    let wld = decode(&bytes).unwrap();

    assert_eq!(wld.dialect, Dialect::NewWorld);
    assert_eq!(wld.fragments.len(), 1);
    let Fragment::DmSpriteDef2(mesh) = &wld.fragments[0] else {
        panic!("expected a mesh, got {:?}", wld.fragments[0].code());
    };
    assert_eq!(mesh.raw_scale, 0);
    assert_eq!(mesh.positions(), vec![Vec3::ONE]);
    assert_eq!(wld.fragments[0].name(), None);

    assert_eq!(encode(&wld).unwrap(), bytes);
}

#[test]
fn test_sample_zone_roundtrip_both_dialects() {
    for dialect in [Dialect::OldWorld, Dialect::NewWorld] {
        let bytes = encode(&sample_zone(dialect)).unwrap();
        let wld = decode(&bytes).unwrap();
        assert_eq!(wld.dialect, dialect);
        assert_eq!(wld.opaque_count(), 0, "{dialect:?}: no fragment should fall back to opaque");
        let names: Vec<_> = wld.fragments.iter().map(|f| f.name()).collect();
        let expected = sample_zone(dialect);
        let expected: Vec<_> = expected.fragments.iter().map(|f| f.name()).collect();
        assert_eq!(names, expected);
        assert_eq!(encode(&wld).unwrap(), bytes);
    }
}

#[test]
fn test_reencode_is_structurally_stable() {
    let first = decode(&encode(&sample_zone(Dialect::NewWorld)).unwrap()).unwrap();
    let second = decode(&encode(&first).unwrap()).unwrap();
    assert_eq!(first.fragments, second.fragments);
    assert_eq!(first.reserved, second.reserved);
}

#[test]
fn test_reserved_header_words_survive() {
    let mut bytes = minimal_mesh_container();
    bytes[12..16].copy_from_slice(&7u32.to_le_bytes());
    bytes[16..20].copy_from_slice(&104u32.to_le_bytes());
    bytes[24..28].copy_from_slice(&3u32.to_le_bytes());

    let wld = decode(&bytes).unwrap();
    assert_eq!(wld.reserved.region_count, 7);
    assert_eq!(wld.reserved.max_fragment_size, 104);
    assert_eq!(wld.reserved.string_count, 3);
    assert_eq!(encode(&wld).unwrap(), bytes);
}

#[test]
fn test_parallel_matches_serial() {
    let wld = sample_zone(Dialect::NewWorld);
    let parallel = encode_with(&wld, &EncodeOptions::default()).unwrap();
    let serial = encode_with(&wld, &EncodeOptions::serial()).unwrap();
    assert_eq!(parallel, serial);

    let a = decode_with(&parallel, &DecodeOptions::default()).unwrap();
    let b = decode_with(&parallel, &DecodeOptions::serial()).unwrap();
    assert_eq!(a.fragments, b.fragments);
}

#[test]
fn test_dedup_shrinks_name_blob() {
    let wld = sample_zone(Dialect::NewWorld);
    let plain = encode_with(
        &wld,
        &EncodeOptions {
            preserve_name_table: false,
            ..EncodeOptions::default()
        },
    )
    .unwrap();
    let shared = encode_with(
        &wld,
        &EncodeOptions {
            dedup_names: true,
            preserve_name_table: false,
            ..EncodeOptions::default()
        },
    )
    .unwrap();

    // "GRASS_SPRITE" appears twice
    assert_eq!(plain.len() - shared.len(), "GRASS_SPRITE".len() + 1);
    let a = decode(&plain).unwrap();
    let b = decode(&shared).unwrap();
    assert_eq!(a.fragments, b.fragments);
}

// =============================================================================
// Hand-assembled containers
// =============================================================================

fn strict() -> DecodeOptions {
    DecodeOptions {
        opaque_on_trailing_bytes: false,
        ..DecodeOptions::default()
    }
}

/// Region with byte vis ranges, one one-entry vis list and empty user data;
/// 51 bytes before padding
fn region_payload(flags: u32) -> Vec<u8> {
    Bytes::default()
        .i32(0)
        .u32(flags)
        .i32(0)
        // vertex, proximal, render vertex, wall, obstacle, cutting obstacle, vis node counts
        .zeros(7 * 4)
        .u32(1)
        .u16(1)
        .u8(5)
        .u32(0)
        .0
}

/// Zone with no regions and three bytes of user data; 19 bytes before padding
fn zone_payload(flags: u32) -> Vec<u8> {
    Bytes::default().i32(0).u32(flags).u32(0).u32(3).hashed(b"ABC").0
}

/// BmInfo with one three-byte file name; 13 bytes before padding
fn bm_info_payload() -> Vec<u8> {
    Bytes::default().i32(0).i32(0).u16(3).hashed(b"AB\0").0
}

#[test]
fn test_unpadded_mesh_roundtrips() {
    let mut payload = minimal_mesh_payload();
    payload.truncate(102);
    let bytes = container(NEW_WORLD_VERSION, &[], &[(0x36, &payload)]);

    let wld = decode(&bytes).unwrap();
    assert!(wld.fragments[0].is_opaque());
    let out = encode(&wld).unwrap();
    assert_eq!(out.len(), bytes.len());
    assert_eq!(out, bytes);

    let err = decode_with(&bytes, &strict()).unwrap_err();
    assert!(err.is_invariant_violation());
    assert_eq!(err.fragment_index(), Some(1));
}

#[test]
fn test_unpadded_payloads_roundtrip() {
    let region = region_payload(0x80);
    let zone = zone_payload(0);
    let bm_info = bm_info_payload();
    assert_eq!((region.len(), zone.len(), bm_info.len()), (51, 19, 13));

    let bytes = container(
        OLD_WORLD_VERSION,
        &[],
        &[(0x22, &region), (0x29, &zone), (0x03, &bm_info)],
    );
    let wld = decode(&bytes).unwrap();
    assert_eq!(wld.opaque_count(), 3);
    assert_eq!(encode(&wld).unwrap(), bytes);
    assert!(decode_with(&bytes, &strict()).unwrap_err().is_invariant_violation());
}

#[test]
fn test_non_zero_padding_roundtrips() {
    let bm_info = Bytes::default().bytes(&bm_info_payload()).bytes(&[0, 0, 9]).0;
    let bytes = container(OLD_WORLD_VERSION, &[], &[(0x03, &bm_info)]);
    let wld = decode(&bytes).unwrap();
    assert!(wld.fragments[0].is_opaque());
    assert_eq!(encode(&wld).unwrap(), bytes);
}

#[test]
fn test_padded_payloads_decode_typed() {
    let region = Bytes::default().bytes(&region_payload(0x80)).zeros(1).0;
    let zone = Bytes::default().bytes(&zone_payload(0)).zeros(1).0;
    let bm_info = Bytes::default().bytes(&bm_info_payload()).zeros(3).0;

    let bytes = container(
        OLD_WORLD_VERSION,
        &[],
        &[(0x22, &region), (0x29, &zone), (0x03, &bm_info)],
    );
    let wld = decode_with(&bytes, &strict()).unwrap();
    assert_eq!(wld.opaque_count(), 0);
    assert_eq!(encode(&wld).unwrap(), bytes);
}

#[test]
fn test_duplicate_names_keep_their_offsets() {
    let sound = |name_ref: i32| Bytes::default().i32(name_ref).u32(0).0;
    let (later, earlier) = (sound(-3), sound(-1));
    let bytes = container(
        NEW_WORLD_VERSION,
        b"\0A\0A\0",
        &[(0x1F, &later), (0x1F, &earlier), (0x1F, &later)],
    );

    let wld = decode(&bytes).unwrap();
    assert_eq!(wld.opaque_count(), 0);
    assert!(wld.fragments.iter().all(|f| f.name() == Some("A")));
    assert_eq!(encode(&wld).unwrap(), bytes);

    let serial = EncodeOptions {
        parallel: false,
        ..EncodeOptions::default()
    };
    assert_eq!(encode_with(&wld, &serial).unwrap(), bytes);
}

#[test]
fn test_lossy_names_keep_their_offsets() {
    // Two different invalid byte strings decode to the same replacement text
    let sound = |name_ref: i32| Bytes::default().i32(name_ref).u32(0).0;
    let bytes = container(
        NEW_WORLD_VERSION,
        b"\0\xFF\0\xFE\0",
        &[(0x1F, &sound(-3)), (0x1F, &sound(-1))],
    );
    let wld = decode(&bytes).unwrap();
    assert_eq!(wld.fragments[0].name(), wld.fragments[1].name());
    assert_eq!(encode(&wld).unwrap(), bytes);
}

#[test]
fn test_duplicate_name_falls_back_after_rename() {
    let sound = |name_ref: i32| Bytes::default().i32(name_ref).u32(0).0;
    let bytes = container(NEW_WORLD_VERSION, b"\0A\0B\0", &[(0x1F, &sound(-3))]);
    let mut wld = decode(&bytes).unwrap();
    let Fragment::Sound(fragment) = &mut wld.fragments[0] else {
        panic!("expected a sound");
    };
    // The recorded ref now names a different string, so "A" is reused
    fragment.name = Some("A".into());

    let out = decode(&encode(&wld).unwrap()).unwrap();
    assert_eq!(out.fragments[0].name(), Some("A"));
    assert_eq!(out.names.blob_len(), 5);
}

#[test]
fn test_unnamed_flag_bits_roundtrip() {
    let region = Bytes::default().bytes(&region_payload(0x4000_0080)).zeros(1).0;
    let zone = Bytes::default().bytes(&zone_payload(0x8000_0003)).zeros(1).0;
    let mut mesh = minimal_mesh_payload();
    mesh[4..8].copy_from_slice(&0x0001_4003u32.to_le_bytes());

    let bytes = container(
        NEW_WORLD_VERSION,
        &[],
        &[(0x22, &region), (0x29, &zone), (0x36, &mesh)],
    );
    let wld = decode_with(&bytes, &strict()).unwrap();
    assert_eq!(wld.opaque_count(), 0);
    let Fragment::Region(region) = &wld.fragments[0] else {
        panic!("expected a region");
    };
    assert_eq!(region.flags.bits(), 0x4000_0080);
    assert_eq!(encode(&wld).unwrap(), bytes);
}

// =============================================================================
// Opaque passthrough
// =============================================================================

#[test]
fn test_unknown_code_passes_through() {
    let mut bytes = minimal_mesh_container();
    bytes[8..12].copy_from_slice(&2u32.to_le_bytes());
    let extra = Bytes::default().u32(6).u32(0x7F).u16(0xBEEF).u32(0x1234_5678).0;
    bytes.extend_from_slice(&extra);

    let wld = decode(&bytes).unwrap();
    assert_eq!(wld.fragments.len(), 2);
    assert!(wld.fragments[1].is_opaque());
    assert_eq!(wld.fragments[1].code(), FragmentCode(0x7F));
    assert_eq!(encode(&wld).unwrap(), bytes);
}

#[test]
fn test_mismatched_layout_stays_opaque_unless_strict() {
    let mut bytes = minimal_mesh_container();
    // Grow the mesh payload by four bytes it does not describe
    bytes[28..32].copy_from_slice(&108u32.to_le_bytes());
    bytes.extend_from_slice(&[1, 2, 3, 4]);

    let wld = decode(&bytes).unwrap();
    assert!(wld.fragments[0].is_opaque());
    assert_eq!(encode(&wld).unwrap(), bytes);

    let strict = DecodeOptions {
        opaque_on_trailing_bytes: false,
        ..DecodeOptions::default()
    };
    let err = decode_with(&bytes, &strict).unwrap_err();
    assert!(err.is_invariant_violation());
    assert_eq!(err.fragment_index(), Some(1));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_bad_magic_is_malformed() {
    let mut bytes = minimal_mesh_container();
    bytes[0] = 0xFF;
    assert!(matches!(decode(&bytes), Err(WldError::MalformedHeader { .. })));
}

#[test]
fn test_unknown_version_is_malformed() {
    let mut bytes = minimal_mesh_container();
    bytes[4..8].copy_from_slice(&0x0002_0000u32.to_le_bytes());
    let err = decode(&bytes).unwrap_err();
    assert!(err.to_string().contains("0x00020000"));
}

#[test]
fn test_truncated_fragment_carries_location() {
    let bytes = minimal_mesh_container();
    let cut = &bytes[..bytes.len() - 10];
    match decode(cut) {
        Err(WldError::Fragment {
            index,
            code,
            offset,
            source: ReadError::TruncatedBuffer { needed, .. },
        }) => {
            assert_eq!(index, 1);
            assert_eq!(code, FragmentCode::DM_SPRITE_DEF_2);
            assert_eq!(offset, 36);
            assert_eq!(needed, 104);
        }
        other => panic!("expected truncated fragment, got {other:?}"),
    }
}

#[test]
fn test_count_past_payload_is_truncation() {
    let mut bytes = minimal_mesh_container();
    // Vertex count 1 -> 200 inside an unchanged 104-byte payload
    let count_at = 36 + 76;
    bytes[count_at..count_at + 2].copy_from_slice(&200u16.to_le_bytes());
    let err = decode(&bytes).unwrap_err();
    assert_eq!(err.fragment_index(), Some(1));
    assert!(matches!(
        err,
        WldError::Fragment {
            source: ReadError::TruncatedBuffer { .. },
            ..
        }
    ));
}

#[test]
fn test_encode_error_names_fragment() {
    let mut wld = sample_zone(Dialect::OldWorld);
    let Some(Fragment::DmSpriteDef2(mesh)) = wld.fragments.get_mut(4) else {
        panic!("sample zone layout changed");
    };
    mesh.uvs[1] = [100_000, 0];
    match encode(&wld) {
        Err(WldError::Encode { index, code, .. }) => {
            assert_eq!(index, 5);
            assert_eq!(code, FragmentCode::DM_SPRITE_DEF_2);
        }
        other => panic!("expected encode error, got {other:?}"),
    }
}

// =============================================================================
// Reference graph
// =============================================================================

#[test]
fn test_sample_zone_has_no_dangling_edges() {
    let wld = decode(&encode(&sample_zone(Dialect::NewWorld)).unwrap()).unwrap();
    assert!(wld.dangling_edges().is_empty());

    let (index, _) = wld.find("TOTEM_HS_DEF").unwrap();
    let targets: Vec<_> = wld
        .edges()
        .into_iter()
        .filter(|e| e.source == index)
        .map(|e| (e.field, e.target))
        .collect();
    assert_eq!(targets, vec![("track", 8), ("sprite", 6)]);
}
