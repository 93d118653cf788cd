//! Growable, arena-backed append cursor.

use std::ptr::{self, NonNull};

use crate::context::Context;
use crate::date::WireDate;
use crate::error::Error;
use crate::guid::Guid;

/// An append-only cursor over an arena-backed buffer that grows on demand.
///
/// `Writer` is deliberately not `Send`/`Sync` (it holds a raw `NonNull<u8>`):
/// a writer is a single-threaded value, and concurrent use of one writer
/// from multiple threads is out of scope — the type system enforces that
/// here rather than leaving it to documentation alone.
pub struct Writer<'ctx> {
    ctx: &'ctx Context,
    buffer: NonNull<u8>,
    used: usize,
    capacity: usize,
}

impl<'ctx> Writer<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context, initial_capacity: usize) -> Result<Self, Error> {
        let buffer = ctx.alloc(initial_capacity)?;
        Ok(Self {
            ctx,
            buffer,
            used: 0,
            capacity: initial_capacity,
        })
    }

    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.used
    }

    /// Returns the bytes written so far. Borrows `self` immutably, so the
    /// borrow checker ties the returned slice's lifetime to this call —
    /// any subsequent write (which needs `&mut self`) cannot coexist with a
    /// live `get_buffer` borrow, which is exactly the "grow invalidates
    /// prior views" contract this type is built around.
    #[must_use]
    pub fn get_buffer(&self) -> &[u8] {
        // SAFETY: every byte in `0..self.used` was written by a previous call
        // through this writer; `self.buffer` is valid for at least `self.capacity`
        // bytes, and `self.used <= self.capacity` is an invariant maintained by
        // every method below.
        unsafe { core::slice::from_raw_parts(self.buffer.as_ptr(), self.used) }
    }

    fn grow(&mut self, required: usize) -> Result<(), Error> {
        let mut new_capacity = self.capacity.max(1);
        while new_capacity < required {
            new_capacity = new_capacity
                .checked_mul(2)
                .ok_or_else(|| Error::out_of_memory("Writer::grow"))?;
        }
        let new_buffer = self.ctx.alloc(new_capacity)?;
        // SAFETY: `new_buffer` is freshly reserved and non-aliased, with at least
        // `new_capacity >= self.used` bytes; `self.buffer` holds exactly `self.used`
        // previously written, readable bytes.
        unsafe {
            ptr::copy_nonoverlapping(self.buffer.as_ptr(), new_buffer.as_ptr(), self.used);
        }
        self.buffer = new_buffer;
        self.capacity = new_capacity;
        tracing::trace!(new_capacity, "writer buffer grown");
        Ok(())
    }

    fn ensure_capacity(&mut self, additional: usize) -> Result<(), Error> {
        let required = self
            .used
            .checked_add(additional)
            .ok_or_else(|| Error::out_of_memory("Writer::ensure_capacity"))?;
        if required > self.capacity {
            self.grow(required)?;
        }
        Ok(())
    }

    fn push_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        self.ensure_capacity(data.len())?;
        // SAFETY: `ensure_capacity` just guaranteed `self.capacity - self.used >=
        // data.len()`, and `self.buffer` is exclusively owned by this writer.
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.buffer.as_ptr().add(self.used), data.len());
        }
        self.used += data.len();
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<(), Error> {
        self.push_bytes(&[v])
    }

    pub fn write_bool(&mut self, v: bool) -> Result<(), Error> {
        self.write_u8(u8::from(v))
    }

    pub fn write_u16(&mut self, v: u16) -> Result<(), Error> {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<(), Error> {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<(), Error> {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn write_i16(&mut self, v: i16) -> Result<(), Error> {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<(), Error> {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<(), Error> {
        self.push_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<(), Error> {
        self.push_bytes(&v.to_bits().to_le_bytes())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<(), Error> {
        self.push_bytes(&v.to_bits().to_le_bytes())
    }

    pub fn write_guid(&mut self, g: &Guid) -> Result<(), Error> {
        self.push_bytes(&g.data1.to_le_bytes())?;
        self.push_bytes(&g.data2.to_le_bytes())?;
        self.push_bytes(&g.data3.to_le_bytes())?;
        self.push_bytes(&g.data4)
    }

    pub fn write_date(&mut self, d: WireDate) -> Result<(), Error> {
        self.push_bytes(&d.to_wire_ticks().to_le_bytes())
    }

    fn write_length_prefixed(&mut self, data: &[u8], ctx_name: &'static str) -> Result<(), Error> {
        let len: u32 = data
            .len()
            .try_into()
            .map_err(|_| Error::malformed(ctx_name))?;
        self.write_u32(len)?;
        self.push_bytes(data)
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), Error> {
        self.write_length_prefixed(s.as_bytes(), "Writer::write_string")
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write_length_prefixed(data, "Writer::write_bytes")
    }

    pub fn write_array_u8(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write_bytes(data)
    }

    pub fn write_array_bool(&mut self, data: &[bool]) -> Result<(), Error> {
        let len: u32 = data
            .len()
            .try_into()
            .map_err(|_| Error::malformed("Writer::write_array_bool"))?;
        self.write_u32(len)?;
        // SAFETY: `bool` is guaranteed to be represented as a single byte whose only
        // valid bit patterns are 0 and 1, so viewing `&[bool]` as `&[u8]` is sound and
        // already the wire-normalized encoding.
        let bytes = unsafe { core::slice::from_raw_parts(data.as_ptr().cast::<u8>(), data.len()) };
        self.push_bytes(bytes)
    }

    /// Reserves 4 bytes for a message length the caller doesn't know yet,
    /// returning the offset to back-patch with [`Writer::fill_message_length`].
    pub fn reserve_message_length(&mut self) -> Result<usize, Error> {
        let offset = self.used;
        self.write_u32(0)?;
        Ok(offset)
    }

    /// Overwrites the 4-byte placeholder at `offset` (previously returned by
    /// [`Writer::reserve_message_length`]) with `value`.
    pub fn fill_message_length(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        let end = offset
            .checked_add(4)
            .ok_or_else(|| Error::malformed("Writer::fill_message_length"))?;
        if end > self.used {
            return Err(Error::malformed("Writer::fill_message_length"));
        }
        let bytes = value.to_le_bytes();
        // SAFETY: `offset + 4 <= self.used <= self.capacity`, checked above, and
        // `self.buffer` is exclusively owned by this writer.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.buffer.as_ptr().add(offset), 4);
        }
        Ok(())
    }
}

macro_rules! write_array_le {
    ($name:ident, $ty:ty) => {
        impl<'ctx> Writer<'ctx> {
            pub fn $name(&mut self, data: &[$ty]) -> Result<(), Error> {
                let len: u32 = data
                    .len()
                    .try_into()
                    .map_err(|_| Error::malformed(concat!("Writer::", stringify!($name))))?;
                self.write_u32(len)?;
                #[cfg(target_endian = "little")]
                {
                    // SAFETY: `$ty` is a plain fixed-width numeric type with no padding
                    // and no invalid bit patterns, so viewing it as bytes is sound
                    // regardless of alignment; on a little-endian host this byte layout
                    // is exactly the wire layout.
                    let bytes = unsafe {
                        core::slice::from_raw_parts(
                            data.as_ptr().cast::<u8>(),
                            core::mem::size_of_val(data),
                        )
                    };
                    self.push_bytes(bytes)
                }
                #[cfg(target_endian = "big")]
                {
                    for &v in data {
                        self.push_bytes(&v.to_le_bytes())?;
                    }
                    Ok(())
                }
            }
        }
    };
}

write_array_le!(write_array_u16, u16);
write_array_le!(write_array_u32, u32);
write_array_le!(write_array_u64, u64);
write_array_le!(write_array_i16, i16);
write_array_le!(write_array_i32, i32);
write_array_le!(write_array_i64, i64);

impl<'ctx> Writer<'ctx> {
    pub fn write_array_f32(&mut self, data: &[f32]) -> Result<(), Error> {
        let len: u32 = data
            .len()
            .try_into()
            .map_err(|_| Error::malformed("Writer::write_array_f32"))?;
        self.write_u32(len)?;
        for &v in data {
            self.push_bytes(&v.to_bits().to_le_bytes())?;
        }
        Ok(())
    }

    pub fn write_array_f64(&mut self, data: &[f64]) -> Result<(), Error> {
        let len: u32 = data
            .len()
            .try_into()
            .map_err(|_| Error::malformed("Writer::write_array_f64"))?;
        self.write_u32(len)?;
        for &v in data {
            self.push_bytes(&v.to_bits().to_le_bytes())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::ContextOptions;

    #[test]
    fn primitives_round_trip_through_reader() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer().unwrap();
        w.write_u32(7).unwrap();
        w.write_bool(true).unwrap();
        w.write_string("hi").unwrap();
        let buf = w.get_buffer().to_vec();

        let mut r = ctx.get_reader(&buf);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_string_view().unwrap().as_str().unwrap(), "hi");
    }

    #[test]
    fn writer_grows_past_its_initial_capacity() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer_with_hint(4).unwrap();
        for i in 0..1000u32 {
            w.write_u32(i).unwrap();
        }
        assert_eq!(w.bytes_written(), 4000);
        let buf = w.get_buffer().to_vec();
        let mut r = ctx.get_reader(&buf);
        for i in 0..1000u32 {
            assert_eq!(r.read_u32().unwrap(), i);
        }
    }

    #[test]
    fn message_length_reserve_and_fill() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer().unwrap();
        let offset = w.reserve_message_length().unwrap();
        w.write_u32(0xAAAA_BBBB).unwrap();
        w.write_u32(0xCCCC_DDDD).unwrap();
        let payload_len = (w.bytes_written() - offset - 4) as u32;
        w.fill_message_length(offset, payload_len).unwrap();

        let buf = w.get_buffer().to_vec();
        let mut r = ctx.get_reader(&buf);
        assert_eq!(r.read_u32().unwrap(), payload_len);
        assert_eq!(r.read_u32().unwrap(), 0xAAAA_BBBB);
        assert_eq!(r.read_u32().unwrap(), 0xCCCC_DDDD);
    }

    #[test]
    fn bool_array_normalizes_without_a_conversion_loop() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer().unwrap();
        w.write_array_bool(&[true, false, true, true]).unwrap();
        let buf = w.get_buffer().to_vec();
        assert_eq!(&buf[4..], &[1u8, 0, 1, 1]);
    }

    #[test]
    fn numeric_array_round_trips() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer().unwrap();
        let values: Vec<u32> = (0..50).collect();
        w.write_array_u32(&values).unwrap();
        let buf = w.get_buffer().to_vec();

        let len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, values.len());
        let mut decoded = Vec::with_capacity(len);
        for chunk in buf[4..].chunks_exact(4) {
            decoded.push(u32::from_le_bytes(chunk.try_into().unwrap()));
        }
        assert_eq!(decoded, values);
    }

    #[test]
    fn float_specials_round_trip_through_reader() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer().unwrap();
        w.write_f32(f32::NAN).unwrap();
        w.write_f32(f32::INFINITY).unwrap();
        w.write_f32(f32::NEG_INFINITY).unwrap();
        w.write_f32(0.0f32).unwrap();
        w.write_f32(-0.0f32).unwrap();
        w.write_f64(f64::NAN).unwrap();
        w.write_f64(f64::INFINITY).unwrap();
        w.write_f64(f64::NEG_INFINITY).unwrap();
        w.write_f64(0.0f64).unwrap();
        w.write_f64(-0.0f64).unwrap();
        let buf = w.get_buffer().to_vec();

        let mut r = ctx.get_reader(&buf);
        assert!(r.read_f32().unwrap().is_nan());
        assert_eq!(r.read_f32().unwrap(), f32::INFINITY);
        assert_eq!(r.read_f32().unwrap(), f32::NEG_INFINITY);
        assert!(r.read_f32().unwrap().is_sign_positive());
        assert!(r.read_f32().unwrap().is_sign_negative());
        assert!(r.read_f64().unwrap().is_nan());
        assert_eq!(r.read_f64().unwrap(), f64::INFINITY);
        assert_eq!(r.read_f64().unwrap(), f64::NEG_INFINITY);
        assert!(r.read_f64().unwrap().is_sign_positive());
        assert!(r.read_f64().unwrap().is_sign_negative());
    }

    #[test]
    fn integer_extremes_round_trip_through_reader() {
        let ctx = Context::create(ContextOptions::default());
        let mut w = ctx.get_writer().unwrap();
        w.write_u8(u8::MIN).unwrap();
        w.write_u8(u8::MAX).unwrap();
        w.write_i16(i16::MIN).unwrap();
        w.write_i16(i16::MAX).unwrap();
        w.write_i32(i32::MIN).unwrap();
        w.write_i32(i32::MAX).unwrap();
        w.write_i64(i64::MIN).unwrap();
        w.write_i64(i64::MAX).unwrap();
        w.write_u16(u16::MAX).unwrap();
        w.write_u32(u32::MAX).unwrap();
        w.write_u64(u64::MAX).unwrap();
        let buf = w.get_buffer().to_vec();

        let mut r = ctx.get_reader(&buf);
        assert_eq!(r.read_u8().unwrap(), u8::MIN);
        assert_eq!(r.read_u8().unwrap(), u8::MAX);
        assert_eq!(r.read_i16().unwrap(), i16::MIN);
        assert_eq!(r.read_i16().unwrap(), i16::MAX);
        assert_eq!(r.read_i32().unwrap(), i32::MIN);
        assert_eq!(r.read_i32().unwrap(), i32::MAX);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
        assert_eq!(r.read_i64().unwrap(), i64::MAX);
        assert_eq!(r.read_u16().unwrap(), u16::MAX);
        assert_eq!(r.read_u32().unwrap(), u32::MAX);
        assert_eq!(r.read_u64().unwrap(), u64::MAX);
    }
}
