//! Whole-container decode and encode
//!
//! ```text
//! header (28 bytes)
//! name blob (name_blob_len bytes, hashed)
//! directory: fragment_count x { size: u32, code: u32, payload: [u8; size] }
//! trailing bytes (kept verbatim)
//! ```
//!
//! Payloads are independent once the name table is known, so both
//! directions fan out across the rayon pool. Name interning on encode stays
//! sequential in directory order, which keeps output byte-identical to a
//! serial encode.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::binary::{DecodeContext, EncodedPayload};
use crate::error::{EncodeError, ReadError, Result, WldError};
use crate::fragment::{Fragment, decode_payload};
use crate::header::{Dialect, Header, Reserved};
use crate::name_table::NameTable;
use crate::options::{DecodeOptions, EncodeOptions};
use crate::refs::{BONE_CHILD, Edge};
use crate::registry::FragmentCode;

/// size + code
const ENTRY_HEADER_SIZE: usize = 8;

/// A decoded container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Wld {
    pub dialect: Dialect,
    pub reserved: Reserved,
    /// Directory order; fragment `i` has 1-based index `i + 1`
    pub fragments: Vec<Fragment>,
    /// Bytes after the last directory entry
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailing: Vec<u8>,
    /// Name table the container was decoded with
    #[serde(skip)]
    pub names: NameTable,
    /// Per fragment, the name refs it was decoded with in read order. With a
    /// preserved name table, encode reuses a ref when it still addresses the
    /// same string, so duplicate copies of a name keep their own offsets.
    #[serde(skip)]
    pub name_refs: Vec<Vec<i32>>,
}

/// One directory entry, located but not yet decoded
struct DirectoryEntry<'a> {
    index: usize,
    code: FragmentCode,
    /// Absolute payload offset
    offset: usize,
    payload: &'a [u8],
}

impl Wld {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            ..Self::default()
        }
    }

    /// Append a fragment and return its 1-based index
    pub fn push(&mut self, fragment: Fragment) -> u32 {
        self.fragments.push(fragment);
        self.fragments.len() as u32
    }

    /// Fragment at a 1-based directory index
    pub fn fragment(&self, index: u32) -> Option<&Fragment> {
        let slot = (index as usize).checked_sub(1)?;
        self.fragments.get(slot)
    }

    /// First fragment carrying `name`, with its 1-based index
    pub fn find(&self, name: &str) -> Option<(u32, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .find(|(_, f)| f.name() == Some(name))
            .map(|(i, f)| (i as u32 + 1, f))
    }

    /// Directory-level reference graph in directory order.
    ///
    /// Skeleton child lists are bone indices, not directory indices, and are
    /// left out.
    pub fn edges(&self) -> Vec<Edge> {
        self.fragments
            .iter()
            .enumerate()
            .flat_map(|(i, fragment)| {
                fragment
                    .references()
                    .into_iter()
                    .filter(|r| r.field != BONE_CHILD)
                    .map(move |r| Edge {
                        source: i as u32 + 1,
                        field: r.field,
                        target: r.index,
                    })
            })
            .collect()
    }

    /// Edges whose target is past the end of the directory
    pub fn dangling_edges(&self) -> Vec<Edge> {
        let count = self.fragments.len() as u32;
        self.edges().into_iter().filter(|e| e.target > count).collect()
    }

    /// Number of fragments kept opaque
    pub fn opaque_count(&self) -> usize {
        self.fragments.iter().filter(|f| f.is_opaque()).count()
    }
}

/// Decode a container with default options
pub fn decode(bytes: &[u8]) -> Result<Wld> {
    decode_with(bytes, &DecodeOptions::default())
}

/// Decode a container
pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<Wld> {
    let header = Header::from_bytes(bytes)?;

    let blob_start = Header::SIZE;
    let blob_len = header.name_blob_len as usize;
    let blob = bytes
        .get(blob_start..blob_start.saturating_add(blob_len))
        .ok_or(ReadError::TruncatedBuffer {
            offset: blob_start,
            needed: blob_len,
            remaining: bytes.len() - blob_start,
        })?;
    let names = NameTable::decode(blob);

    let (entries, end) = split_directory(bytes, blob_start + blob_len, header.fragment_count)?;

    let ctx = DecodeContext {
        dialect: header.dialect,
        names: &names,
        warn_run_lengths: options.warn_on_run_length_mismatch,
    };
    let decode_entry = |entry: &DirectoryEntry<'_>| {
        decode_payload(
            entry.code,
            entry.payload,
            entry.offset,
            ctx,
            options.opaque_on_trailing_bytes,
        )
        .map_err(|source| WldError::Fragment {
            index: entry.index,
            code: entry.code,
            offset: entry.offset,
            source,
        })
    };
    let decoded = if options.parallel {
        entries.par_iter().map(decode_entry).collect::<Result<Vec<_>>>()?
    } else {
        entries.iter().map(decode_entry).collect::<Result<Vec<_>>>()?
    };
    let (fragments, name_refs): (Vec<_>, Vec<_>) = decoded.into_iter().unzip();

    let trailing = bytes[end..].to_vec();
    if !trailing.is_empty() {
        tracing::debug!("{} trailing bytes after directory", trailing.len());
    }
    tracing::debug!(
        "decoded {:?} container: {} fragments, {} names",
        header.dialect,
        fragments.len(),
        names.len()
    );

    Ok(Wld {
        dialect: header.dialect,
        reserved: header.reserved,
        fragments,
        trailing,
        names,
        name_refs,
    })
}

/// Locate every directory entry without decoding payloads.
///
/// Returns the entries and the offset just past the last one.
fn split_directory(bytes: &[u8], start: usize, count: u32) -> Result<(Vec<DirectoryEntry<'_>>, usize)> {
    // Cap the reservation by what the buffer could possibly hold
    let capacity = (count as usize).min(bytes.len().saturating_sub(start) / ENTRY_HEADER_SIZE);
    let mut entries = Vec::with_capacity(capacity);
    let mut pos = start;

    for i in 0..count as usize {
        let Some(head) = bytes.get(pos..pos + ENTRY_HEADER_SIZE) else {
            return Err(WldError::Container(ReadError::TruncatedBuffer {
                offset: pos,
                needed: ENTRY_HEADER_SIZE,
                remaining: bytes.len().saturating_sub(pos),
            }));
        };
        let size = u32::from_le_bytes([head[0], head[1], head[2], head[3]]) as usize;
        let code = FragmentCode(u32::from_le_bytes([head[4], head[5], head[6], head[7]]));
        let offset = pos + ENTRY_HEADER_SIZE;

        let Some(payload) = bytes.get(offset..offset.saturating_add(size)) else {
            return Err(WldError::Fragment {
                index: i + 1,
                code,
                offset,
                source: ReadError::TruncatedBuffer {
                    offset,
                    needed: size,
                    remaining: bytes.len() - offset.min(bytes.len()),
                },
            });
        };

        entries.push(DirectoryEntry {
            index: i + 1,
            code,
            offset,
            payload,
        });
        pos = offset + size;
    }

    Ok((entries, pos))
}

/// Encode a container with default options
pub fn encode(wld: &Wld) -> Result<Vec<u8>> {
    encode_with(wld, &EncodeOptions::default())
}

/// Encode a container
pub fn encode_with(wld: &Wld, options: &EncodeOptions) -> Result<Vec<u8>> {
    let layout_entry = |(i, fragment): (usize, &Fragment)| {
        fragment.layout(wld.dialect).map_err(|source| WldError::Encode {
            index: i + 1,
            code: fragment.code(),
            source,
        })
    };
    let payloads: Vec<EncodedPayload> = if options.parallel {
        wld.fragments
            .par_iter()
            .enumerate()
            .map(layout_entry)
            .collect::<Result<Vec<_>>>()?
    } else {
        wld.fragments
            .iter()
            .enumerate()
            .map(layout_entry)
            .collect::<Result<Vec<_>>>()?
    };

    let preserve = options.preserve_name_table && !wld.names.is_empty();
    let mut names = if preserve {
        wld.names.clone().into_interner()
    } else if options.dedup_names {
        NameTable::with_dedup()
    } else {
        NameTable::default()
    };

    let mut directory = Vec::with_capacity(payloads.iter().map(|p| p.bytes.len() + ENTRY_HEADER_SIZE).sum());
    for (i, (payload, fragment)) in payloads.into_iter().zip(&wld.fragments).enumerate() {
        let hints: &[i32] = match wld.name_refs.get(i) {
            Some(hints) if preserve => hints.as_slice(),
            _ => &[],
        };
        let bytes = payload.resolve_with_hints(&mut names, hints);
        let size = u32::try_from(bytes.len()).map_err(|_| EncodeError::ValueOutOfRange {
            field: "fragment_size",
            value: bytes.len() as i64,
        })?;
        directory.extend_from_slice(&size.to_le_bytes());
        directory.extend_from_slice(&fragment.code().value().to_le_bytes());
        directory.extend_from_slice(&bytes);
    }

    let blob = names.to_blob();
    let header = Header {
        dialect: wld.dialect,
        fragment_count: u32::try_from(wld.fragments.len()).map_err(|_| EncodeError::ValueOutOfRange {
            field: "fragment_count",
            value: wld.fragments.len() as i64,
        })?,
        reserved: wld.reserved,
        name_blob_len: u32::try_from(blob.len()).map_err(|_| EncodeError::ValueOutOfRange {
            field: "name_blob_len",
            value: blob.len() as i64,
        })?,
    };

    let mut out = Vec::with_capacity(Header::SIZE + blob.len() + directory.len() + wld.trailing.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&blob);
    out.extend_from_slice(&directory);
    out.extend_from_slice(&wld.trailing);

    tracing::debug!(
        "encoded {:?} container: {} fragments, {} byte name blob, {} bytes total",
        wld.dialect,
        wld.fragments.len(),
        blob.len(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{FlagsFragment, MaterialPalette, RefFragment};
    use crate::header::WLD_MAGIC;

    fn sample() -> Wld {
        let mut wld = Wld::new(Dialect::NewWorld);
        wld.push(Fragment::Sound(FlagsFragment {
            name: Some("DOOR_OPEN".into()),
            flags: 0,
        }));
        wld.push(Fragment::MaterialPalette(MaterialPalette {
            name: Some("PAL".into()),
            flags: 0,
            materials: vec![1, 9],
        }));
        wld.push(Fragment::DmSprite(RefFragment {
            name: None,
            reference: 2,
            flags: 0,
        }));
        wld
    }

    #[test]
    fn test_empty_container_is_header_only() {
        let bytes = encode(&Wld::new(Dialect::OldWorld)).unwrap();
        assert_eq!(bytes.len(), Header::SIZE);
        assert_eq!(&bytes[0..4], &WLD_MAGIC);
        let wld = decode(&bytes).unwrap();
        assert_eq!(wld.dialect, Dialect::OldWorld);
        assert!(wld.fragments.is_empty());
    }

    #[test]
    fn test_fragment_lookup_is_one_based() {
        let wld = sample();
        assert!(wld.fragment(0).is_none());
        assert_eq!(wld.fragment(1).unwrap().name(), Some("DOOR_OPEN"));
        assert!(wld.fragment(4).is_none());
        assert_eq!(wld.find("PAL").map(|(i, _)| i), Some(2));
    }

    #[test]
    fn test_edges_and_dangling() {
        let wld = sample();
        let edges = wld.edges();
        assert_eq!(
            edges,
            vec![
                Edge { source: 2, field: "material", target: 1 },
                Edge { source: 2, field: "material", target: 9 },
                Edge { source: 3, field: "reference", target: 2 },
            ]
        );
        assert_eq!(wld.dangling_edges().len(), 1);
        assert_eq!(wld.dangling_edges()[0].target, 9);
    }

    #[test]
    fn test_reencode_is_stable() {
        let first = encode(&sample()).unwrap();
        let second = encode(&decode(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_trailing_bytes_survive() {
        let mut wld = sample();
        wld.trailing = vec![0xDE, 0xAD];
        let bytes = encode(&wld).unwrap();
        assert_eq!(&bytes[bytes.len() - 2..], &[0xDE, 0xAD]);
        assert_eq!(decode(&bytes).unwrap().trailing, vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_short_name_blob_is_truncated() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.truncate(Header::SIZE + 2);
        assert!(matches!(
            decode(&bytes),
            Err(WldError::Container(ReadError::TruncatedBuffer { offset: 28, .. }))
        ));
    }

    #[test]
    fn test_short_payload_reports_entry() {
        let bytes = encode(&sample()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        match decode(cut) {
            Err(WldError::Fragment { index, code, source, .. }) => {
                assert_eq!(index, 3);
                assert_eq!(code, FragmentCode::DM_SPRITE);
                assert!(matches!(source, ReadError::TruncatedBuffer { .. }));
            }
            other => panic!("expected fragment error, got {other:?}"),
        }
    }

    #[test]
    fn test_renamed_fragment_appends_to_preserved_table() {
        let bytes = encode(&sample()).unwrap();
        let mut wld = decode(&bytes).unwrap();
        let before = wld.names.blob_len();
        wld.fragments[0] = Fragment::Sound(FlagsFragment {
            name: Some("DOOR_CLOSE".into()),
            flags: 0,
        });
        let out = decode(&encode(&wld).unwrap()).unwrap();
        assert_eq!(out.fragments[0].name(), Some("DOOR_CLOSE"));
        assert_eq!(out.fragments[1].name(), Some("PAL"));
        assert_eq!(out.names.blob_len(), before + "DOOR_CLOSE".len() + 1);
    }
}
