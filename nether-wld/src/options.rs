//! Decode and encode settings
//!
//! Both structs deserialize from partial TOML tables; missing keys take
//! their defaults.

use serde::{Deserialize, Serialize};

/// Container decode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Decode fragments on the rayon pool (default: true)
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Keep a payload opaque when a typed decode leaves bytes unread;
    /// when false the leftover bytes are an invariant violation (default: true)
    #[serde(default = "default_true")]
    pub opaque_on_trailing_bytes: bool,
    /// Warn when mesh run-length groups do not cover their parent list (default: true)
    #[serde(default = "default_true")]
    pub warn_on_run_length_mismatch: bool,
}

/// Container encode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Lay out fragments on the rayon pool (default: true)
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Share one name-table slot between identical names (default: false)
    #[serde(default)]
    pub dedup_names: bool,
    /// Start from the name table the container was decoded with, so
    /// unchanged names keep their source offsets (default: true)
    #[serde(default = "default_true")]
    pub preserve_name_table: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            parallel: default_true(),
            opaque_on_trailing_bytes: default_true(),
            warn_on_run_length_mismatch: default_true(),
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            parallel: default_true(),
            dedup_names: false,
            preserve_name_table: default_true(),
        }
    }
}

impl DecodeOptions {
    /// Single-threaded decode, for deterministic logs and debugging
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

impl EncodeOptions {
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let decode = DecodeOptions::default();
        assert!(decode.parallel);
        assert!(decode.opaque_on_trailing_bytes);
        assert!(decode.warn_on_run_length_mismatch);

        let encode = EncodeOptions::default();
        assert!(encode.parallel);
        assert!(!encode.dedup_names);
        assert!(encode.preserve_name_table);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let decode: DecodeOptions = toml::from_str("parallel = false").unwrap();
        assert_eq!(
            decode,
            DecodeOptions {
                parallel: false,
                ..DecodeOptions::default()
            }
        );

        let encode: EncodeOptions = toml::from_str("dedup_names = true").unwrap();
        assert!(encode.parallel);
        assert!(encode.dedup_names);
    }

    #[test]
    fn test_json_roundtrip() {
        let options = DecodeOptions::serial();
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(serde_json::from_str::<DecodeOptions>(&json).unwrap(), options);
    }
}
