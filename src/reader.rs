//! Zero-copy cursor over a caller-owned buffer.

use crate::context::Context;
use crate::date::WireDate;
use crate::error::Error;
use crate::guid::Guid;
use crate::view::{ByteView, StringView};

/// A bounds-checked cursor over `'buf`, tied to the [`Context`] it was
/// created from via `'ctx`.
///
/// Every read either advances the cursor and returns borrowed data, or
/// leaves the cursor untouched and returns an error — there is no partial
/// advance on failure. `'ctx` is only needed for [`Reader::read_string_copy`],
/// which arena-duplicates bytes so the caller can get a copy that outlives
/// the input buffer.
pub struct Reader<'ctx, 'buf> {
    ctx: &'ctx Context,
    buffer: &'buf [u8],
    pos: usize,
}

impl<'ctx, 'buf> Reader<'ctx, 'buf> {
    pub(crate) fn new(ctx: &'ctx Context, buffer: &'buf [u8]) -> Self {
        Self { ctx, buffer, pos: 0 }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn bytes_read(&self) -> usize {
        self.pos
    }

    /// Current cursor offset from the start of the buffer. Identical to
    /// [`Reader::bytes_read`]; both are reporters, neither can fail.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    fn take(&mut self, n: usize, ctx_name: &'static str) -> Result<&'buf [u8], Error> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or_else(|| Error::malformed(ctx_name))?;
        if end > self.buffer.len() {
            return Err(Error::malformed(ctx_name));
        }
        let slice = &self.buffer[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, ctx_name: &'static str) -> Result<[u8; N], Error> {
        let slice = self.take(N, ctx_name)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        Ok(arr)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1, "Reader::read_u8")?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.take_array("Reader::read_u16")?))
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take_array("Reader::read_u32")?))
    }

    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.take_array("Reader::read_u64")?))
    }

    pub fn read_i16(&mut self) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.take_array("Reader::read_i16")?))
    }

    pub fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.take_array("Reader::read_i32")?))
    }

    pub fn read_i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.take_array("Reader::read_i64")?))
    }

    pub fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_bits(u32::from_le_bytes(
            self.take_array("Reader::read_f32")?,
        )))
    }

    pub fn read_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_bits(u64::from_le_bytes(
            self.take_array("Reader::read_f64")?,
        )))
    }

    pub fn read_guid(&mut self) -> Result<Guid, Error> {
        let b = self.take(16, "Reader::read_guid")?;
        Ok(Guid {
            data1: u32::from_le_bytes(b[0..4].try_into().unwrap()),
            data2: u16::from_le_bytes(b[4..6].try_into().unwrap()),
            data3: u16::from_le_bytes(b[6..8].try_into().unwrap()),
            data4: b[8..16].try_into().unwrap(),
        })
    }

    pub fn read_date(&mut self) -> Result<WireDate, Error> {
        let raw = u64::from_le_bytes(self.take_array("Reader::read_date")?);
        Ok(WireDate::from_wire_ticks(raw))
    }

    /// Reads a `u32` length prefix and verifies that many bytes are actually
    /// reachable from the current position, without consuming them. This is
    /// the one bounds check that makes every variable-length read below safe
    /// to hand back as a bare borrowed view.
    fn read_length_prefix(&mut self, ctx_name: &'static str) -> Result<usize, Error> {
        let len = u32::from_le_bytes(self.take_array(ctx_name)?) as usize;
        let end = self
            .pos
            .checked_add(len)
            .ok_or_else(|| Error::malformed(ctx_name))?;
        if end > self.buffer.len() {
            return Err(Error::malformed(ctx_name));
        }
        Ok(len)
    }

    pub fn read_string_view(&mut self) -> Result<StringView<'buf>, Error> {
        let len = self.read_length_prefix("Reader::read_string_view")?;
        let bytes = self.take(len, "Reader::read_string_view")?;
        Ok(StringView::new(bytes))
    }

    pub fn read_byte_view(&mut self) -> Result<ByteView<'buf>, Error> {
        let len = self.read_length_prefix("Reader::read_byte_view")?;
        let bytes = self.take(len, "Reader::read_byte_view")?;
        Ok(ByteView::new(bytes))
    }

    /// As [`Reader::read_string_view`], but additionally arena-duplicates
    /// the bytes (NUL-terminated) and validates them as UTF-8, returning a
    /// copy that outlives the input buffer for as long as the context that
    /// made it is alive.
    pub fn read_string_copy(&mut self) -> Result<&'ctx str, Error> {
        let view = self.read_string_view()?;
        let ptr = self.ctx.strdup(view.as_bytes())?;
        // SAFETY: `strdup` just wrote exactly `view.len()` data bytes followed by a
        // NUL terminator into arena memory tied to `'ctx`; that allocation is valid
        // until the context is reset, which cannot happen while this borrow exists
        // because `reset` requires `&mut Context`.
        let bytes = unsafe { core::slice::from_raw_parts(ptr.as_ptr(), view.len()) };
        core::str::from_utf8(bytes).map_err(|_| Error::malformed("Reader::read_string_copy"))
    }

    /// Defensive no-op: moves the cursor to an absolute position if and only
    /// if it lies within the buffer, otherwise leaves it unchanged. Never
    /// fails — callers that need to know whether the seek landed should
    /// compare [`Reader::position`] before and after.
    pub fn seek(&mut self, pos: usize) {
        if pos <= self.buffer.len() {
            self.pos = pos;
        }
    }

    /// Defensive no-op: advances the cursor by `n` bytes if and only if that
    /// stays within the buffer.
    pub fn skip(&mut self, n: usize) {
        if let Some(end) = self.pos.checked_add(n) {
            if end <= self.buffer.len() {
                self.pos = end;
            }
        }
    }

    pub fn read_array_u8(&mut self) -> Result<&'buf [u8], Error> {
        let len = self.read_length_prefix("Reader::read_array_u8")?;
        self.take(len, "Reader::read_array_u8")
    }

    pub fn read_array_bool(&mut self) -> Result<Vec<bool>, Error> {
        let bytes = self.read_array_u8()?;
        Ok(bytes.iter().map(|&b| b != 0).collect())
    }
}

macro_rules! read_array_le {
    ($name:ident, $ty:ty) => {
        impl<'ctx, 'buf> Reader<'ctx, 'buf> {
            /// Reads a `u32` length prefix followed by that many
            /// little-endian elements, mirroring the matching
            /// `Writer` bulk-array fast path. On a little-endian host
            /// this is a single bounds-checked slice reinterpret; on a
            /// big-endian host each element is swapped individually.
            pub fn $name(&mut self) -> Result<Vec<$ty>, Error> {
                let count = self.read_length_prefix(concat!("Reader::", stringify!($name)))?;
                let elem_size = core::mem::size_of::<$ty>();
                let total = count
                    .checked_mul(elem_size)
                    .ok_or_else(|| Error::malformed(concat!("Reader::", stringify!($name))))?;
                let bytes = self.take(total, concat!("Reader::", stringify!($name)))?;
                let mut out = Vec::with_capacity(count);
                for chunk in bytes.chunks_exact(elem_size) {
                    let mut arr = [0u8; { core::mem::size_of::<$ty>() }];
                    arr.copy_from_slice(chunk);
                    out.push(<$ty>::from_le_bytes(arr));
                }
                Ok(out)
            }
        }
    };
}

read_array_le!(read_array_u16, u16);
read_array_le!(read_array_u32, u32);
read_array_le!(read_array_u64, u64);
read_array_le!(read_array_i16, i16);
read_array_le!(read_array_i32, i32);
read_array_le!(read_array_i64, i64);

impl<'ctx, 'buf> Reader<'ctx, 'buf> {
    pub fn read_array_f32(&mut self) -> Result<Vec<f32>, Error> {
        let count = self.read_length_prefix("Reader::read_array_f32")?;
        let total = count
            .checked_mul(4)
            .ok_or_else(|| Error::malformed("Reader::read_array_f32"))?;
        let bytes = self.take(total, "Reader::read_array_f32")?;
        let mut out = Vec::with_capacity(count);
        for chunk in bytes.chunks_exact(4) {
            let mut arr = [0u8; 4];
            arr.copy_from_slice(chunk);
            out.push(f32::from_bits(u32::from_le_bytes(arr)));
        }
        Ok(out)
    }

    pub fn read_array_f64(&mut self) -> Result<Vec<f64>, Error> {
        let count = self.read_length_prefix("Reader::read_array_f64")?;
        let total = count
            .checked_mul(8)
            .ok_or_else(|| Error::malformed("Reader::read_array_f64"))?;
        let bytes = self.take(total, "Reader::read_array_f64")?;
        let mut out = Vec::with_capacity(count);
        for chunk in bytes.chunks_exact(8) {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(chunk);
            out.push(f64::from_bits(u64::from_le_bytes(arr)));
        }
        Ok(out)
    }
}
