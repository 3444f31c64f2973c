//! Container header and dialect selection
//!
//! # Layout
//! ```text
//! 0x00: magic [u8; 4]          - 02 3D 50 54
//! 0x04: version u32 LE         - 0x00015500 old-world, 0x1000C800 new-world
//! 0x08: fragment_count u32 LE
//! 0x0C: reserved1 u32 LE       - region count in shipped files
//! 0x10: reserved2 u32 LE       - largest fragment size in shipped files
//! 0x14: name_blob_len u32 LE
//! 0x18: reserved3 u32 LE       - string count in shipped files
//! 0x1C: name blob (name_blob_len bytes, XOR'd)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReadError, WldError};

/// Container magic
pub const WLD_MAGIC: [u8; 4] = [0x02, 0x3D, 0x50, 0x54];

/// Version word of old-world containers
pub const OLD_WORLD_VERSION: u32 = 0x0001_5500;

/// Version word of new-world containers
pub const NEW_WORLD_VERSION: u32 = 0x1000_C800;

/// Sub-format selected by the header version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Dialect {
    /// 16-bit texture coordinates
    OldWorld,
    /// 32-bit texture coordinates
    #[default]
    NewWorld,
}

impl Dialect {
    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            OLD_WORLD_VERSION => Some(Self::OldWorld),
            NEW_WORLD_VERSION => Some(Self::NewWorld),
            _ => None,
        }
    }

    pub fn version(self) -> u32 {
        match self {
            Self::OldWorld => OLD_WORLD_VERSION,
            Self::NewWorld => NEW_WORLD_VERSION,
        }
    }

    pub fn is_new_world(self) -> bool {
        self == Self::NewWorld
    }

    /// The other dialect, for callers retrying after an invariant violation
    pub fn other(self) -> Self {
        match self {
            Self::OldWorld => Self::NewWorld,
            Self::NewWorld => Self::OldWorld,
        }
    }
}

/// Header fields with no enforced meaning; written back verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reserved {
    pub region_count: u32,
    pub max_fragment_size: u32,
    pub string_count: u32,
}

/// Fixed-size container header (name blob excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub dialect: Dialect,
    pub fragment_count: u32,
    pub reserved: Reserved,
    pub name_blob_len: u32,
}

impl Header {
    pub const SIZE: usize = 28;

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&WLD_MAGIC);
        bytes[4..8].copy_from_slice(&self.dialect.version().to_le_bytes());
        bytes[8..12].copy_from_slice(&self.fragment_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.reserved.region_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.reserved.max_fragment_size.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.name_blob_len.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.reserved.string_count.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WldError> {
        if bytes.len() < Self::SIZE {
            // Check the magic first so a short non-WLD buffer reads as malformed
            if bytes.len() >= 4 && bytes[0..4] != WLD_MAGIC {
                return Err(bad_magic(&bytes[0..4]));
            }
            return Err(WldError::Container(ReadError::TruncatedBuffer {
                offset: 0,
                needed: Self::SIZE,
                remaining: bytes.len(),
            }));
        }
        if bytes[0..4] != WLD_MAGIC {
            return Err(bad_magic(&bytes[0..4]));
        }

        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let version = word(4);
        let dialect = Dialect::from_version(version).ok_or_else(|| WldError::MalformedHeader {
            reason: format!("unknown version 0x{version:08X}"),
        })?;

        Ok(Self {
            dialect,
            fragment_count: word(8),
            reserved: Reserved {
                region_count: word(12),
                max_fragment_size: word(16),
                string_count: word(24),
            },
            name_blob_len: word(20),
        })
    }
}

fn bad_magic(found: &[u8]) -> WldError {
    WldError::MalformedHeader {
        reason: format!("bad magic {found:02X?} (expected {WLD_MAGIC:02X?})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            dialect: Dialect::OldWorld,
            fragment_count: 12,
            reserved: Reserved {
                region_count: 3,
                max_fragment_size: 0xDEAD_BEEF,
                string_count: 40,
            },
            name_blob_len: 96,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), Header::SIZE);
        assert_eq!(&bytes[0..4], &WLD_MAGIC);
        assert_eq!(Header::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_version_selects_dialect() {
        assert_eq!(Dialect::from_version(0x0001_5500), Some(Dialect::OldWorld));
        assert_eq!(Dialect::from_version(0x1000_C800), Some(Dialect::NewWorld));
        assert_eq!(Dialect::from_version(0x1000_C801), None);
        assert_eq!(Dialect::OldWorld.other(), Dialect::NewWorld);
    }

    #[test]
    fn test_bad_magic_is_malformed() {
        let mut bytes = sample().to_bytes();
        bytes[0] = 0x03;
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(WldError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_unknown_version_is_malformed() {
        let mut bytes = sample().to_bytes();
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        let err = Header::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("0x00000007"));
    }

    #[test]
    fn test_short_header_is_truncated() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            Header::from_bytes(&bytes[..10]),
            Err(WldError::Container(ReadError::TruncatedBuffer { .. }))
        ));
    }
}
