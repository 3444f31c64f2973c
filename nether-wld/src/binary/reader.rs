//! Bounds-checked little-endian reader over one payload slice
//!
//! Every fragment decode gets its own reader over an isolated slice, so a
//! failure in one fragment never disturbs another.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec2, Vec3, Vec4};

use crate::error::ReadError;
use crate::header::Dialect;
use crate::name_table::NameTable;
use crate::name_table::unhash_bytes;

/// Shared state every fragment decode may consult
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub dialect: Dialect,
    pub names: &'a NameTable,
    /// Emit a warning when run-length groups do not cover their parent list
    pub warn_run_lengths: bool,
}

/// Reader for one fragment payload
pub struct FragmentReader<'a> {
    cursor: Cursor<&'a [u8]>,
    /// Absolute offset of the slice start, for error reporting
    base: usize,
    ctx: DecodeContext<'a>,
    /// Every non-zero name ref resolved, in read order
    name_refs: Vec<i32>,
    /// Absolute offset of the first padding run that was missing or non-zero
    irregular_padding: Option<usize>,
}

macro_rules! read_primitive {
    ($($name:ident => $ty:ty, $size:expr, $read:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, ReadError> {
                self.ensure($size)?;
                self.cursor.$read::<LittleEndian>().map_err(|_| self.truncated($size))
            }
        )*
    };
}

impl<'a> FragmentReader<'a> {
    pub fn new(bytes: &'a [u8], base: usize, ctx: DecodeContext<'a>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            base,
            ctx,
            name_refs: Vec::new(),
            irregular_padding: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.ctx.dialect
    }

    pub fn warn_run_lengths(&self) -> bool {
        self.ctx.warn_run_lengths
    }

    /// Position within the payload
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Absolute position within the container
    pub fn offset(&self) -> usize {
        self.base + self.position()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    fn truncated(&self, needed: usize) -> ReadError {
        ReadError::TruncatedBuffer {
            offset: self.offset(),
            needed,
            remaining: self.remaining(),
        }
    }

    fn ensure(&self, needed: usize) -> Result<(), ReadError> {
        if needed > self.remaining() {
            return Err(self.truncated(needed));
        }
        Ok(())
    }

    /// Check that `count` elements of at least `min_size` bytes can still fit.
    ///
    /// Returns the count as `usize` so callers can size their lists without
    /// trusting a corrupt count for the allocation.
    pub fn count(&mut self, count: u32, min_size: usize) -> Result<usize, ReadError> {
        let count = count as usize;
        let needed = count.saturating_mul(min_size);
        self.ensure(needed)?;
        Ok(count)
    }

    /// Build an invariant violation located at the current position
    pub fn invariant(&self, message: impl Into<String>) -> ReadError {
        ReadError::InvariantViolation {
            offset: self.offset(),
            message: message.into(),
        }
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> {
        self.ensure(1)?;
        self.cursor.read_u8().map_err(|_| self.truncated(1))
    }

    pub fn i8(&mut self) -> Result<i8, ReadError> {
        self.ensure(1)?;
        self.cursor.read_i8().map_err(|_| self.truncated(1))
    }

    read_primitive! {
        u16 => u16, 2, read_u16;
        i16 => i16, 2, read_i16;
        u32 => u32, 4, read_u32;
        i32 => i32, 4, read_i32;
        f32 => f32, 4, read_f32;
    }

    pub fn vec2(&mut self) -> Result<Vec2, ReadError> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    pub fn vec3(&mut self) -> Result<Vec3, ReadError> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn vec4(&mut self) -> Result<Vec4, ReadError> {
        Ok(Vec4::new(self.f32()?, self.f32()?, self.f32()?, self.f32()?))
    }

    pub fn bytes(&mut self, len: usize) -> Result<Vec<u8>, ReadError> {
        self.ensure(len)?;
        let mut buf = vec![0u8; len];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.truncated(len))?;
        Ok(buf)
    }

    /// Bytes protected by the name-table XOR transform
    pub fn hashed_bytes(&mut self, len: usize) -> Result<Vec<u8>, ReadError> {
        let mut buf = self.bytes(len)?;
        unhash_bytes(&mut buf);
        Ok(buf)
    }

    /// Read a name ref and resolve it; 0 yields `None`
    pub fn name(&mut self) -> Result<Option<String>, ReadError> {
        let name_ref = self.i32()?;
        if name_ref == 0 {
            return Ok(None);
        }
        let name = self.ctx.names.lookup(name_ref)?.to_owned();
        self.name_refs.push(name_ref);
        Ok(Some(name))
    }

    /// Name refs resolved by this reader, in read order
    pub fn into_name_refs(self) -> Vec<i32> {
        self.name_refs
    }

    /// Step over padding up to the next `align` boundary of the payload.
    ///
    /// The writer always emits zero padding, so a run that is missing or
    /// non-zero is recorded in [`Self::irregular_padding`]; the payload can
    /// then not be rebuilt from the decoded fields. Present bytes are stepped
    /// over either way so later fields stay aligned.
    pub fn skip_padding(&mut self, align: usize) {
        let pad = (align - self.position() % align) % align;
        if pad == 0 {
            return;
        }
        let start = self.position();
        let present = pad <= self.remaining();
        let regular = present && self.cursor.get_ref()[start..start + pad].iter().all(|&b| b == 0);
        if !regular && self.irregular_padding.is_none() {
            self.irregular_padding = Some(self.base + start);
        }
        if present {
            self.cursor.set_position((start + pad) as u64);
        }
    }

    /// Absolute offset of the first missing or non-zero padding run
    pub fn irregular_padding(&self) -> Option<usize> {
        self.irregular_padding
    }
}
