//! The per-decode/encode session handle: an arena plus the policy knobs for
//! readers and writers created from it.

use std::ptr::NonNull;

use crate::arena::{Arena, ArenaOptions};
use crate::error::Error;
use crate::reader::Reader;
use crate::writer::Writer;

/// Configuration for a [`Context`].
#[derive(Debug, Clone, Copy)]
pub struct ContextOptions {
    pub arena_options: ArenaOptions,
    /// Default initial capacity for writers created with [`Context::get_writer`].
    pub initial_writer_size: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            arena_options: ArenaOptions::default(),
            initial_writer_size: 256,
        }
    }
}

/// Owns one [`Arena`] and hands out [`Reader`]s and [`Writer`]s borrowed from
/// it.
///
/// A `Reader`/`Writer` obtained from a `Context` borrows it immutably for its
/// whole lifetime, so the borrow checker rejects any attempt to call
/// [`Context::reset`] (which needs `&mut self`) while one is still alive —
/// the Rust-native form of the "reset invalidates every outstanding borrow"
/// contract this runtime is built around.
pub struct Context {
    arena: Arena,
    options: ContextOptions,
}

impl Context {
    #[must_use]
    pub fn create(options: ContextOptions) -> Self {
        Self {
            arena: Arena::create(options.arena_options),
            options,
        }
    }

    /// Frees every allocation made through this context and zeroes its
    /// usage counters. Requires no outstanding `Reader`/`Writer` borrows.
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Equivalent to dropping the context; provided for parity with the
    /// runtime's external create/destroy/reset contract.
    pub fn destroy(self) {}

    pub fn alloc(&self, size: usize) -> Result<NonNull<u8>, Error> {
        self.arena.alloc(size)
    }

    pub fn strdup(&self, data: &[u8]) -> Result<NonNull<u8>, Error> {
        self.arena.strdup(data)
    }

    #[must_use]
    pub fn space_allocated(&self) -> usize {
        self.arena.total_allocated()
    }

    #[must_use]
    pub fn space_used(&self) -> usize {
        self.arena.total_used()
    }

    /// Builds a reader over a caller-owned buffer. The buffer is borrowed,
    /// never copied: a `&[u8]` can never be null in safe Rust, so unlike the
    /// arena-backed factories this never fails.
    pub fn get_reader<'ctx, 'buf>(&'ctx self, buffer: &'buf [u8]) -> Reader<'ctx, 'buf> {
        Reader::new(self, buffer)
    }

    /// Builds a writer with the context's configured default capacity.
    pub fn get_writer(&self) -> Result<Writer<'_>, Error> {
        self.get_writer_with_hint(self.options.initial_writer_size)
    }

    /// Builds a writer with at least `hint` bytes of initial capacity.
    pub fn get_writer_with_hint(&self, hint: usize) -> Result<Writer<'_>, Error> {
        let size = hint.max(1);
        Writer::new(self, size)
    }
}
