//! WLD inspection commands
//!
//! Each command takes a decoded container and returns plain data, so the
//! binary only parses arguments and prints. Settings come from an optional
//! `wld-inspect.toml`:
//!
//! ```toml
//! [decode]
//! parallel = true
//! opaque_on_trailing_bytes = true
//!
//! [encode]
//! dedup_names = false
//!
//! [output]
//! format = "text"   # or "json"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nether_wld::{DecodeOptions, Dialect, Edge, EncodeOptions, FragmentCode, Reserved, Wld};
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "wld-inspect.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Indent JSON output (default: true)
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            pretty: default_pretty(),
        }
    }
}

/// Tool settings; every table is optional
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InspectConfig {
    #[serde(default)]
    pub decode: DecodeOptions,
    #[serde(default)]
    pub encode: EncodeOptions,
    #[serde(default)]
    pub output: OutputConfig,
}

impl InspectConfig {
    /// Load from an explicit path, or from [`DEFAULT_CONFIG_FILE`] if present.
    /// An explicit path must exist; the default file may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config =
            toml::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Serialize a report per the output settings
    pub fn to_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.output.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(json)
    }
}

/// Read and decode one container file
pub fn load_wld(path: &Path, options: &DecodeOptions) -> Result<(Vec<u8>, Wld)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let wld = nether_wld::decode_with(&bytes, options).with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok((bytes, wld))
}

/// Parse a type code written as hex (`0x36`, `36`) or as a type name
pub fn parse_code(text: &str) -> Result<FragmentCode> {
    let hex = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).unwrap_or(text);
    if let Ok(value) = u32::from_str_radix(hex, 16) {
        return Ok(FragmentCode(value));
    }
    nether_wld::REGISTRY
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(text))
        .map(|e| e.code)
        .with_context(|| format!("Unknown fragment type '{text}'"))
}

// =============================================================================
// info
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub dialect: Dialect,
    pub reserved: Reserved,
    pub file_size: usize,
    pub fragment_count: usize,
    pub opaque_count: usize,
    pub name_count: usize,
    pub trailing_bytes: usize,
    /// Fragment count per type, keyed by "0xNN Name"
    pub by_type: BTreeMap<String, usize>,
}

pub fn info(wld: &Wld, file_size: usize) -> Info {
    let mut counts: BTreeMap<FragmentCode, usize> = BTreeMap::new();
    for fragment in &wld.fragments {
        *counts.entry(fragment.code()).or_default() += 1;
    }
    Info {
        dialect: wld.dialect,
        reserved: wld.reserved,
        file_size,
        fragment_count: wld.fragments.len(),
        opaque_count: wld.opaque_count(),
        // The leading empty string is not a name
        name_count: wld.names.len().saturating_sub(1),
        trailing_bytes: wld.trailing.len(),
        by_type: counts.into_iter().map(|(code, n)| (code.to_string(), n)).collect(),
    }
}

pub fn format_info(info: &Info) -> String {
    let mut out = String::new();
    out.push_str(&format!("Dialect:     {:?}\n", info.dialect));
    out.push_str(&format!("File size:   {} bytes\n", info.file_size));
    out.push_str(&format!(
        "Fragments:   {} ({} opaque)\n",
        info.fragment_count, info.opaque_count
    ));
    out.push_str(&format!("Names:       {}\n", info.name_count));
    out.push_str(&format!(
        "Reserved:    regions={} max_fragment_size={} strings={}\n",
        info.reserved.region_count, info.reserved.max_fragment_size, info.reserved.string_count
    ));
    if info.trailing_bytes > 0 {
        out.push_str(&format!("Trailing:    {} bytes\n", info.trailing_bytes));
    }
    out.push_str("Types:\n");
    for (code, count) in &info.by_type {
        out.push_str(&format!("  {code:<32} {count:>6}\n"));
    }
    out
}

// =============================================================================
// list
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    /// 1-based directory index
    pub index: u32,
    pub code: FragmentCode,
    pub type_name: &'static str,
    pub name: Option<String>,
    /// Encoded payload size
    pub size: usize,
}

pub fn list(wld: &Wld, filter: Option<FragmentCode>) -> Result<Vec<ListEntry>> {
    let mut entries = Vec::new();
    for (i, fragment) in wld.fragments.iter().enumerate() {
        let code = fragment.code();
        if filter.is_some_and(|f| f != code) {
            continue;
        }
        // Name refs are fixed width, so the unresolved layout has the final size
        let size = fragment
            .layout(wld.dialect)
            .with_context(|| format!("Failed to lay out fragment {}", i + 1))?
            .bytes
            .len();
        entries.push(ListEntry {
            index: i as u32 + 1,
            code,
            type_name: code.name(),
            name: fragment.name().map(str::to_owned),
            size,
        });
    }
    Ok(entries)
}

pub fn format_list(entries: &[ListEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        out.push_str(&format!(
            "{:>6}  0x{:02X}  {:<24} {:>8}  {}\n",
            e.index,
            e.code.value(),
            e.type_name,
            e.size,
            e.name.as_deref().unwrap_or("-")
        ));
    }
    out
}

// =============================================================================
// dump
// =============================================================================

/// One fragment as JSON
pub fn dump(wld: &Wld, index: u32, config: &InspectConfig) -> Result<String> {
    let Some(fragment) = wld.fragment(index) else {
        bail!("No fragment {} (container has {})", index, wld.fragments.len());
    };
    config.to_json(fragment)
}

// =============================================================================
// refs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefLine {
    #[serde(flatten)]
    pub edge: Edge,
    pub dangling: bool,
}

pub fn refs(wld: &Wld) -> Vec<RefLine> {
    let count = wld.fragments.len() as u32;
    wld.edges()
        .into_iter()
        .map(|edge| RefLine {
            dangling: edge.target > count,
            edge,
        })
        .collect()
}

pub fn format_refs(lines: &[RefLine]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&format!(
            "{:>6} -> {:<6} {}{}\n",
            line.edge.source,
            line.edge.target,
            line.edge.field,
            if line.dangling { "  (dangling)" } else { "" }
        ));
    }
    out
}

// =============================================================================
// verify
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub fragment_count: usize,
    pub opaque_count: usize,
    pub identical: bool,
    pub input_size: usize,
    pub output_size: usize,
    /// First byte offset where the re-encoded output differs
    pub first_difference: Option<usize>,
}

/// Re-encode a decoded container and compare with the source bytes
pub fn verify(bytes: &[u8], wld: &Wld, options: &EncodeOptions) -> Result<VerifyReport> {
    let output = nether_wld::encode_with(wld, options)?;
    let first_difference = bytes
        .iter()
        .zip(&output)
        .position(|(a, b)| a != b)
        .or_else(|| (bytes.len() != output.len()).then(|| bytes.len().min(output.len())));
    Ok(VerifyReport {
        fragment_count: wld.fragments.len(),
        opaque_count: wld.opaque_count(),
        identical: first_difference.is_none(),
        input_size: bytes.len(),
        output_size: output.len(),
        first_difference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_forms() {
        assert_eq!(parse_code("0x36").unwrap(), FragmentCode::DM_SPRITE_DEF_2);
        assert_eq!(parse_code("10").unwrap(), FragmentCode::HIERARCHICAL_SPRITE_DEF);
        assert_eq!(parse_code("trackdef").unwrap(), FragmentCode::TRACK_DEF);
        assert!(parse_code("NotAType").is_err());
    }

    #[test]
    fn test_config_defaults_from_empty_toml() {
        let config: InspectConfig = toml::from_str("").unwrap();
        assert_eq!(config, InspectConfig::default());
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_config_partial_tables() {
        let config: InspectConfig = toml::from_str(
            r#"
            [decode]
            parallel = false

            [output]
            format = "json"
            "#,
        )
        .unwrap();
        assert!(!config.decode.parallel);
        assert!(config.decode.opaque_on_trailing_bytes);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.encode, EncodeOptions::default());
    }
}
