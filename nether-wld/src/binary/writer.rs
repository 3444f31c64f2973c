//! Little-endian writer for one fragment payload
//!
//! Name refs are written as placeholders and recorded as patches. The
//! container resolves every patch against one name table in directory order,
//! which lets fragments be laid out independently (and in parallel).

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use glam::{Vec2, Vec3, Vec4};

use crate::error::EncodeError;
use crate::header::Dialect;
use crate::name_table::{NameTable, hash_bytes};

/// A name ref placeholder awaiting its final value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePatch {
    /// Byte position of the i32 placeholder in the payload
    pub position: usize,
    pub name: String,
}

/// A laid-out payload plus its pending name refs
#[derive(Debug, Clone, Default)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub patches: Vec<NamePatch>,
}

impl EncodedPayload {
    /// Intern every pending name in write order and fill in the refs
    pub fn resolve(self, names: &mut NameTable) -> Vec<u8> {
        self.resolve_with_hints(names, &[])
    }

    /// Like [`Self::resolve`], but patch `k` first tries `hints[k]`: when the
    /// table already holds the same string at that ref, the ref is reused as
    /// is. A table may hold one string at several offsets, so this is what
    /// keeps a decoded fragment pointing at the copy it was read with.
    pub fn resolve_with_hints(mut self, names: &mut NameTable, hints: &[i32]) -> Vec<u8> {
        for (k, patch) in self.patches.iter().enumerate() {
            let name_ref = match hints.get(k) {
                Some(&hint) if names.holds(hint, &patch.name) => hint,
                _ => names.intern(&patch.name),
            };
            self.bytes[patch.position..patch.position + 4].copy_from_slice(&name_ref.to_le_bytes());
        }
        self.bytes
    }
}

/// Writer for one fragment payload
pub struct FragmentWriter {
    buf: Vec<u8>,
    patches: Vec<NamePatch>,
    dialect: Dialect,
}

impl FragmentWriter {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            buf: Vec::new(),
            patches: Vec::new(),
            dialect,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn finish(self) -> EncodedPayload {
        EncodedPayload {
            bytes: self.buf,
            patches: self.patches,
        }
    }

    pub fn u8(&mut self, v: u8) -> Result<(), EncodeError> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    pub fn i8(&mut self, v: i8) -> Result<(), EncodeError> {
        self.buf.write_i8(v)?;
        Ok(())
    }

    pub fn u16(&mut self, v: u16) -> Result<(), EncodeError> {
        self.buf.write_u16::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn i16(&mut self, v: i16) -> Result<(), EncodeError> {
        self.buf.write_i16::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn u32(&mut self, v: u32) -> Result<(), EncodeError> {
        self.buf.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn i32(&mut self, v: i32) -> Result<(), EncodeError> {
        self.buf.write_i32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn f32(&mut self, v: f32) -> Result<(), EncodeError> {
        self.buf.write_f32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn vec2(&mut self, v: Vec2) -> Result<(), EncodeError> {
        self.f32(v.x)?;
        self.f32(v.y)
    }

    pub fn vec3(&mut self, v: Vec3) -> Result<(), EncodeError> {
        self.f32(v.x)?;
        self.f32(v.y)?;
        self.f32(v.z)
    }

    pub fn vec4(&mut self, v: Vec4) -> Result<(), EncodeError> {
        self.f32(v.x)?;
        self.f32(v.y)?;
        self.f32(v.z)?;
        self.f32(v.w)
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.buf.write_all(bytes)?;
        Ok(())
    }

    /// Bytes protected by the name-table XOR transform
    pub fn hashed_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let mut hashed = bytes.to_vec();
        hash_bytes(&mut hashed);
        self.bytes(&hashed)
    }

    /// List length as a u32 count field
    pub fn count_u32(&mut self, field: &'static str, len: usize) -> Result<(), EncodeError> {
        let count = u32::try_from(len).map_err(|_| EncodeError::ValueOutOfRange {
            field,
            value: len as i64,
        })?;
        self.u32(count)
    }

    /// List length as a u16 count field
    pub fn count_u16(&mut self, field: &'static str, len: usize) -> Result<(), EncodeError> {
        let count = u16::try_from(len).map_err(|_| EncodeError::ValueOutOfRange {
            field,
            value: len as i64,
        })?;
        self.u16(count)
    }

    /// Name ref placeholder; `None` writes 0
    pub fn name(&mut self, name: Option<&str>) -> Result<(), EncodeError> {
        if let Some(name) = name {
            self.patches.push(NamePatch {
                position: self.buf.len(),
                name: name.to_owned(),
            });
        }
        self.i32(0)
    }

    /// Zero padding up to the next `align` boundary of the payload
    pub fn pad_to(&mut self, align: usize) -> Result<(), EncodeError> {
        let pad = (align - self.buf.len() % align) % align;
        self.bytes(&[0u8; 8][..pad])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_patches_resolve_in_write_order() {
        let mut w = FragmentWriter::new(Dialect::NewWorld);
        w.name(Some("FIRST")).unwrap();
        w.u32(7).unwrap();
        w.name(None).unwrap();
        w.name(Some("SECOND")).unwrap();
        let payload = w.finish();
        assert_eq!(payload.patches.len(), 2);

        let mut names = NameTable::default();
        let bytes = payload.resolve(&mut names);
        assert_eq!(&bytes[0..4], &(-1i32).to_le_bytes());
        assert_eq!(&bytes[8..12], &0i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &(-7i32).to_le_bytes());
        assert_eq!(names.lookup(-7).unwrap(), "SECOND");
    }

    #[test]
    fn test_hints_pick_the_matching_copy() {
        let mut blob = b"\0A\0A\0".to_vec();
        crate::name_table::hash_bytes(&mut blob);
        let mut names = NameTable::decode(&blob).into_interner();

        let mut w = FragmentWriter::new(Dialect::NewWorld);
        w.name(Some("A")).unwrap();
        w.name(Some("A")).unwrap();
        w.name(Some("C")).unwrap();
        // Both copies of "A" stay addressable; the third hint is out of range
        let bytes = w.finish().resolve_with_hints(&mut names, &[-3, -1, -40]);

        assert_eq!(&bytes[0..4], &(-3i32).to_le_bytes());
        assert_eq!(&bytes[4..8], &(-1i32).to_le_bytes());
        assert_eq!(&bytes[8..12], &(-5i32).to_le_bytes());
        assert_eq!(names.lookup(-5).unwrap(), "C");
    }

    #[test]
    fn test_pad_to_four() {
        let mut w = FragmentWriter::new(Dialect::OldWorld);
        w.u16(1).unwrap();
        w.pad_to(4).unwrap();
        assert_eq!(w.position(), 4);
        w.pad_to(4).unwrap();
        assert_eq!(w.position(), 4);
    }

    #[test]
    fn test_count_out_of_range() {
        let mut w = FragmentWriter::new(Dialect::OldWorld);
        assert!(w.count_u16("vertices", 70_000).is_err());
        assert!(w.count_u16("vertices", 65_535).is_ok());
    }
}
