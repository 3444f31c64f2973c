//! Interned name pool addressed by negated byte offsets
//!
//! The pool is stored on disk as a run of zero-terminated strings, XOR'd with
//! a fixed 8-byte key. Fragments refer to a string with a "name ref": the
//! negated byte offset of its first character. A name ref of 0 means no name.

use hashbrown::HashMap;

use crate::error::ReadError;

/// XOR key applied to the name blob and a few in-fragment strings
pub const HASH_KEY: [u8; 8] = [0x95, 0x3A, 0xC5, 0x2A, 0x95, 0x7A, 0x95, 0x6A];

/// Apply the XOR transform in place (key index restarts at 0 for each buffer)
pub fn hash_bytes(buf: &mut [u8]) {
    for (i, b) in buf.iter_mut().enumerate() {
        *b ^= HASH_KEY[i % HASH_KEY.len()];
    }
}

/// Undo the XOR transform in place. The transform is its own inverse.
pub fn unhash_bytes(buf: &mut [u8]) {
    hash_bytes(buf);
}

/// Offset-addressed string pool for one container
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    /// Plain (unhashed) blob contents
    blob: Vec<u8>,
    /// (offset, string) in ascending offset order
    entries: Vec<(usize, String)>,
    /// Present when interning should reuse identical strings
    dedup: Option<HashMap<String, i32>>,
}

impl NameTable {
    /// Empty table that shares one slot between identical strings
    pub fn with_dedup() -> Self {
        Self {
            dedup: Some(HashMap::new()),
            ..Self::default()
        }
    }

    /// Turn a decoded table into an encode-side table: names already present
    /// resolve to their first slot and new names are appended after the
    /// existing blob. Re-encoding unchanged fragments then reproduces the
    /// source blob exactly.
    pub fn into_interner(mut self) -> Self {
        let mut index = HashMap::with_capacity(self.entries.len());
        for (offset, name) in &self.entries {
            if *offset != 0 {
                index.entry(name.clone()).or_insert(-(*offset as i32));
            }
        }
        self.dedup = Some(index);
        self
    }

    /// Decode an on-disk (hashed) name blob
    pub fn decode(blob: &[u8]) -> Self {
        let mut plain = blob.to_vec();
        unhash_bytes(&mut plain);

        let mut entries = Vec::new();
        let mut start = 0;
        for (i, &b) in plain.iter().enumerate() {
            if b == 0 {
                entries.push((start, String::from_utf8_lossy(&plain[start..i]).into_owned()));
                start = i + 1;
            }
        }
        // Unterminated tail
        if start < plain.len() {
            entries.push((start, String::from_utf8_lossy(&plain[start..]).into_owned()));
        }

        Self {
            blob: plain,
            entries,
            dedup: None,
        }
    }

    /// Resolve a name ref. 0 is always the empty string.
    pub fn lookup(&self, name_ref: i32) -> Result<&str, ReadError> {
        if name_ref == 0 {
            return Ok("");
        }
        let offset = -i64::from(name_ref);
        let not_found = ReadError::NameRefNotFound { name_ref };
        let offset = usize::try_from(offset).map_err(|_| not_found.clone())?;
        self.entries
            .binary_search_by_key(&offset, |(o, _)| *o)
            .map(|i| self.entries[i].1.as_str())
            .map_err(|_| not_found)
    }

    /// Whether `name_ref` addresses exactly `name`. Never true for ref 0.
    pub fn holds(&self, name_ref: i32, name: &str) -> bool {
        name_ref != 0 && self.lookup(name_ref).is_ok_and(|s| s == name)
    }

    /// Append a name and return its name ref.
    ///
    /// The first intern into an empty table lays down the leading terminator,
    /// so offset 0 stays the empty string and an unused table encodes as an
    /// empty blob.
    pub fn intern(&mut self, name: &str) -> i32 {
        if self.blob.is_empty() {
            self.blob.push(0);
            self.entries.push((0, String::new()));
        }
        if let Some(&name_ref) = self.dedup.as_ref().and_then(|index| index.get(name)) {
            return name_ref;
        }

        if self.blob.last() != Some(&0) {
            self.blob.push(0);
        }
        let offset = self.blob.len();
        self.blob.extend_from_slice(name.as_bytes());
        self.blob.push(0);
        self.entries.push((offset, name.to_owned()));

        let name_ref = -(offset as i32);
        if let Some(index) = self.dedup.as_mut() {
            index.insert(name.to_owned(), name_ref);
        }
        name_ref
    }

    /// On-disk (hashed) blob
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = self.blob.clone();
        hash_bytes(&mut blob);
        blob
    }

    /// Byte length of the blob
    pub fn blob_len(&self) -> usize {
        self.blob.len()
    }

    /// Number of strings, including the leading empty one
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (name ref, string) pairs in blob order
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.entries
            .iter()
            .map(|(offset, name)| (-(*offset as i32), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_then_lookup() {
        let mut table = NameTable::default();
        let foo = table.intern("foo");
        assert_eq!(foo, -1);
        assert_eq!(table.lookup(foo).unwrap(), "foo");
    }

    #[test]
    fn test_zero_ref_is_empty_string() {
        let table = NameTable::default();
        assert_eq!(table.lookup(0).unwrap(), "");
        let table = NameTable::decode(&[]);
        assert_eq!(table.lookup(0).unwrap(), "");
    }

    #[test]
    fn test_offsets_accumulate_length_plus_terminator() {
        let mut table = NameTable::default();
        assert_eq!(table.intern("AB"), -1);
        assert_eq!(table.intern("CDE"), -4);
        assert_eq!(table.intern("F"), -8);
        assert_eq!(table.blob_len(), 10);
    }

    #[test]
    fn test_no_dedup_by_default() {
        let mut table = NameTable::default();
        let a = table.intern("SAME");
        let b = table.intern("SAME");
        assert_ne!(a, b);

        let mut table = NameTable::with_dedup();
        let a = table.intern("SAME");
        let b = table.intern("SAME");
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_offset_is_an_error() {
        let mut table = NameTable::default();
        table.intern("HELLO");
        // Offset 2 is inside "HELLO", not the start of a string
        assert_eq!(
            table.lookup(-2),
            Err(ReadError::NameRefNotFound { name_ref: -2 })
        );
        assert!(table.lookup(5).is_err());
        assert!(table.lookup(i32::MIN).is_err());
    }

    #[test]
    fn test_blob_roundtrip_through_hash() {
        let mut table = NameTable::default();
        table.intern("ZONE_DMSPRITEDEF");
        table.intern("HUM_HS_DEF");
        let blob = table.to_blob();
        assert_ne!(&blob[1..5], b"ZONE");

        let decoded = NameTable::decode(&blob);
        assert_eq!(decoded.lookup(-1).unwrap(), "ZONE_DMSPRITEDEF");
        assert_eq!(decoded.lookup(-18).unwrap(), "HUM_HS_DEF");
        assert_eq!(decoded.to_blob(), blob);
    }

    #[test]
    fn test_holds_distinguishes_duplicate_copies() {
        let mut blob = b"\0A\0A\0\xFF\0".to_vec();
        hash_bytes(&mut blob);
        let table = NameTable::decode(&blob);
        assert!(table.holds(-1, "A"));
        assert!(table.holds(-3, "A"));
        assert!(!table.holds(-3, "B"));
        assert!(!table.holds(-2, "A"));
        assert!(!table.holds(0, ""));
        // Invalid UTF-8 is compared by its lossy form
        assert!(table.holds(-5, "\u{FFFD}"));

        // The interner still maps a string to its first copy
        let mut interner = table.into_interner();
        assert_eq!(interner.intern("A"), -1);
    }

    #[test]
    fn test_hash_is_positional() {
        let mut buf = [0u8; 10];
        hash_bytes(&mut buf);
        assert_eq!(&buf[..8], &HASH_KEY);
        assert_eq!(&buf[8..], &HASH_KEY[..2]);
        unhash_bytes(&mut buf);
        assert_eq!(buf, [0u8; 10]);
    }
}
