//! Command tests against containers written to a temp directory

use std::fs;
use std::path::PathBuf;

use nether_wld::{
    DecodeOptions, Dialect, EncodeOptions, FlagsFragment, Fragment, FragmentCode, MaterialPalette, RefFragment, Wld,
};
use tempfile::TempDir;
use wld_inspect::{InspectConfig, OutputFormat};

fn sample() -> Wld {
    let mut wld = Wld::new(Dialect::OldWorld);
    wld.push(Fragment::Sound(FlagsFragment {
        name: Some("WIND_LOOP".into()),
        flags: 0,
    }));
    let palette = wld.push(Fragment::MaterialPalette(MaterialPalette {
        name: Some("ZONE_MP".into()),
        flags: 0,
        materials: vec![1, 12],
    }));
    wld.push(Fragment::DmSprite(RefFragment {
        name: None,
        reference: palette as i32,
        flags: 0,
    }));
    wld.push(Fragment::opaque(FragmentCode(0x7E), vec![9, 9, 9]));
    wld
}

fn write_sample(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("zone.wld");
    fs::write(&path, nether_wld::encode(&sample()).unwrap()).unwrap();
    path
}

#[test]
fn test_info_counts_types() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);
    let (bytes, wld) = wld_inspect::load_wld(&path, &DecodeOptions::default()).unwrap();
    let info = wld_inspect::info(&wld, bytes.len());

    assert_eq!(info.dialect, Dialect::OldWorld);
    assert_eq!(info.fragment_count, 4);
    assert_eq!(info.opaque_count, 1);
    assert_eq!(info.name_count, 2);
    assert_eq!(info.by_type.get("0x1F Sound"), Some(&1));

    let text = wld_inspect::format_info(&info);
    assert!(text.contains("OldWorld"));
    assert!(text.contains("0x31 MaterialPalette"));
}

#[test]
fn test_list_filters_by_code() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);
    let (_, wld) = wld_inspect::load_wld(&path, &DecodeOptions::default()).unwrap();

    let all = wld_inspect::list(&wld, None).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].name.as_deref(), Some("WIND_LOOP"));
    assert_eq!(all[0].size, 8);
    assert_eq!(all[3].size, 3);

    let palettes = wld_inspect::list(&wld, Some(wld_inspect::parse_code("0x31").unwrap())).unwrap();
    assert_eq!(palettes.len(), 1);
    assert_eq!(palettes[0].index, 2);
    assert!(wld_inspect::format_list(&palettes).contains("ZONE_MP"));
}

#[test]
fn test_dump_is_json() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);
    let (_, wld) = wld_inspect::load_wld(&path, &DecodeOptions::default()).unwrap();
    let config = InspectConfig::default();

    let json = wld_inspect::dump(&wld, 2, &config).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["MaterialPalette"]["name"], "ZONE_MP");

    assert!(wld_inspect::dump(&wld, 0, &config).is_err());
    assert!(wld_inspect::dump(&wld, 5, &config).is_err());
}

#[test]
fn test_refs_flag_dangling() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);
    let (_, wld) = wld_inspect::load_wld(&path, &DecodeOptions::default()).unwrap();

    let lines = wld_inspect::refs(&wld);
    let dangling: Vec<_> = lines.iter().filter(|l| l.dangling).map(|l| l.edge.target).collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(dangling, vec![12]);
    assert!(wld_inspect::format_refs(&lines).contains("(dangling)"));
}

#[test]
fn test_verify_reports_identity_and_difference() {
    let dir = TempDir::new().unwrap();
    let path = write_sample(&dir);
    let (bytes, wld) = wld_inspect::load_wld(&path, &DecodeOptions::default()).unwrap();

    let report = wld_inspect::verify(&bytes, &wld, &EncodeOptions::default()).unwrap();
    assert!(report.identical);
    assert_eq!(report.first_difference, None);

    let mut edited = wld.clone();
    edited.fragments.pop();
    let report = wld_inspect::verify(&bytes, &edited, &EncodeOptions::default()).unwrap();
    assert!(!report.identical);
    // Fragment count in the header is the first byte to change
    assert_eq!(report.first_difference, Some(8));
}

#[test]
fn test_config_file_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inspect.toml");
    fs::write(
        &path,
        "[decode]\nparallel = false\n\n[output]\nformat = \"json\"\npretty = false\n",
    )
    .unwrap();

    let config = InspectConfig::load(Some(&path)).unwrap();
    assert!(!config.decode.parallel);
    assert_eq!(config.output.format, OutputFormat::Json);
    assert_eq!(config.to_json(&[1, 2]).unwrap(), "[1,2]");

    assert!(InspectConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
}
