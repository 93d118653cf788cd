//! Thread-safe bump allocator backing every runtime allocation.
//!
//! The arena owns a chain of [`Block`]s. Allocation reserves a byte range
//! from the head block via compare-and-swap on that block's used-offset
//! counter; when the head block has no room, a new block is installed at
//! the head of the chain, itself via a compare-and-swap on the arena's head
//! pointer so that two threads racing to install a block never both win.
//! The loser's speculative block is freed immediately, never leaked.
//!
//! Blocks are immutable in capacity once created and are freed only in bulk,
//! by [`Arena::reset`] or on drop — never individually, and never while any
//! allocation from them might still be reachable by a caller that has not
//! yet reset the arena.

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use crate::error::Error;

/// Word-size alignment applied to every allocation request, matching the
/// natural alignment generated encoders/decoders expect for scalar fields.
const DEFAULT_ALIGNMENT: usize = core::mem::align_of::<usize>();

#[inline]
fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// A host allocator function, matching `(size, align) -> *mut u8`.
///
/// Implementations must behave like [`std::alloc::alloc`]: return null on
/// failure, never panic, and hand back memory valid for `size` bytes at
/// `align`.
pub type AllocFn = unsafe fn(usize, usize) -> *mut u8;

/// A host deallocator function, matching `(ptr, size, align)`.
///
/// Must be the matching free for a pointer obtained from an [`AllocFn`]
/// with the identical `(size, align)`.
pub type FreeFn = unsafe fn(*mut u8, usize, usize);

/// An injectable pair of host allocator functions.
///
/// Both may be left `None`, in which case the platform default
/// (`std::alloc`) is used. This is the runtime's only escape hatch for
/// hosts that need a custom allocator (e.g. a pooled or NUMA-aware one);
/// generated code never calls these directly.
#[derive(Debug, Clone, Copy)]
pub struct HostAlloc {
    pub alloc_fn: Option<AllocFn>,
    pub free_fn: Option<FreeFn>,
}

impl Default for HostAlloc {
    fn default() -> Self {
        Self {
            alloc_fn: None,
            free_fn: None,
        }
    }
}

fn default_alloc(size: usize, align: usize) -> *mut u8 {
    let Ok(layout) = Layout::from_size_align(size, align) else {
        return ptr::null_mut();
    };
    // SAFETY: `layout` has a non-zero size (callers never request 0) and a valid,
    // power-of-two alignment checked by `Layout::from_size_align`.
    unsafe { alloc::alloc(layout) }
}

fn default_free(ptr: *mut u8, size: usize, align: usize) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: `size`/`align` are the exact values used to allocate `ptr` via
    // `default_alloc`, which validated them with `Layout::from_size_align`.
    let layout = unsafe { Layout::from_size_align_unchecked(size, align) };
    // SAFETY: `ptr` was allocated by `default_alloc` with this exact layout and is
    // freed at most once (guaranteed by `Block::drop` running only once).
    unsafe { alloc::dealloc(ptr, layout) };
}

/// Configuration for an [`Arena`].
#[derive(Debug, Clone, Copy)]
pub struct ArenaOptions {
    /// Size of the first block, and the minimum size of every later block.
    pub initial_block_size: usize,
    /// Upper bound on both a single block's size and a single allocation's
    /// size. A request larger than this fails with [`crate::error::ErrorKind::OutOfMemory`].
    pub max_block_size: usize,
    /// Injectable host allocator; `HostAlloc::default()` uses `std::alloc`.
    pub host_alloc: HostAlloc,
}

impl Default for ArenaOptions {
    fn default() -> Self {
        Self {
            initial_block_size: 4 * 1024,
            max_block_size: 64 * 1024 * 1024,
            host_alloc: HostAlloc::default(),
        }
    }
}

/// One link in the arena's block chain.
///
/// `prev` is set once, before the block is ever published to
/// `Arena::head`, and is never mutated afterward — so reading it through a
/// shared reference is always sound once the block is reachable at all.
struct Block {
    prev: *mut Block,
    data: NonNull<u8>,
    capacity: usize,
    used: AtomicUsize,
    align: usize,
    host_alloc: HostAlloc,
}

// SAFETY: `Block`'s only interior-mutable field is `used`, an `AtomicUsize`; `data`
// points to plain bytes with no thread-local state, and `prev` is write-once before
// the block becomes reachable from any other thread.
unsafe impl Send for Block {}
// SAFETY: concurrent shared access to `Block` only ever mutates `used` via CAS; the
// byte range each successful CAS grants is disjoint from every other grant, so two
// threads never observe or write the same bytes without synchronization.
unsafe impl Sync for Block {}

impl Block {
    fn new(capacity: usize, align: usize, host_alloc: HostAlloc) -> Result<Box<Block>, Error> {
        let alloc_fn = host_alloc.alloc_fn.unwrap_or(default_alloc as AllocFn);
        // SAFETY: `alloc_fn` is either the validated platform default or a
        // caller-supplied function contracted (by `HostAlloc`'s documentation) to
        // behave like `std::alloc::alloc` for `(capacity, align)`.
        let raw = unsafe { alloc_fn(capacity, align) };
        let data = NonNull::new(raw).ok_or_else(|| Error::out_of_memory("Arena::alloc"))?;
        Ok(Box::new(Block {
            prev: ptr::null_mut(),
            data,
            capacity,
            used: AtomicUsize::new(0),
            align,
            host_alloc,
        }))
    }

    /// Attempts to reserve `size` bytes from this block's remaining capacity.
    ///
    /// Returns `None` if the block doesn't have enough room; the caller must
    /// then install a new block and retry there, never falling back to a
    /// stale block.
    fn try_reserve(&self, size: usize) -> Option<NonNull<u8>> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let new_used = current.checked_add(size)?;
            if new_used > self.capacity {
                return None;
            }
            match self.used.compare_exchange_weak(
                current,
                new_used,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                // SAFETY: the winning CAS grants this call exclusive ownership of the
                // byte range `[current, new_used)` within `data` — no other successful
                // reservation on this block can overlap it, since every reservation is
                // itself won by the same CAS loop against the same counter.
                Ok(_) => return NonNull::new(unsafe { self.data.as_ptr().add(current) }),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        let free_fn = self.host_alloc.free_fn.unwrap_or(default_free as FreeFn);
        // SAFETY: `data` was obtained from the matching `alloc_fn` with exactly this
        // `(capacity, align)`, and this is the only place a `Block` is freed (it runs
        // at most once, since `Drop::drop` is called at most once per value).
        unsafe { free_fn(self.data.as_ptr(), self.capacity, self.align) };
    }
}

/// A thread-safe bump allocator.
///
/// Multiple threads may call [`Arena::alloc`]/[`Arena::strdup`] concurrently
/// through shared references with no external synchronization; two
/// successful allocations never return overlapping ranges. [`Arena::reset`]
/// and dropping the arena both require exclusive (`&mut`) access and are
/// not safe to run concurrently with an in-flight `alloc` — that exclusion
/// is the caller's responsibility, exactly as with any other `&mut`
/// operation in Rust.
pub struct Arena {
    head: AtomicPtr<Block>,
    total_allocated: AtomicUsize,
    total_used: AtomicUsize,
    options: ArenaOptions,
}

// SAFETY: all shared mutation of `Arena` state goes through the atomics above; the
// block chain reachable from `head` is only ever freed under `&mut self`.
unsafe impl Send for Arena {}
// SAFETY: see `Block`'s `Sync` impl — `alloc` is safe to call concurrently from any
// number of threads holding only a shared reference.
unsafe impl Sync for Arena {}

impl Arena {
    #[must_use]
    pub fn create(options: ArenaOptions) -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            total_allocated: AtomicUsize::new(0),
            total_used: AtomicUsize::new(0),
            options,
        }
    }

    /// Total bytes obtained from the host allocator across all installed
    /// blocks since the last reset.
    #[must_use]
    pub fn total_allocated(&self) -> usize {
        self.total_allocated.load(Ordering::Relaxed)
    }

    /// Total bytes successfully reserved by callers since the last reset.
    /// Monotonically non-decreasing between resets (§8 "Arena monotonicity").
    #[must_use]
    pub fn total_used(&self) -> usize {
        self.total_used.load(Ordering::Relaxed)
    }

    /// Reserves `size` bytes, installing a new block if the current one has
    /// no room. Fails if `size` is zero, if the host allocator is exhausted,
    /// or if `size` (rounded up to [`DEFAULT_ALIGNMENT`]) exceeds
    /// `max_block_size`.
    pub fn alloc(&self, size: usize) -> Result<NonNull<u8>, Error> {
        if size == 0 {
            return Err(Error::out_of_memory("Arena::alloc"));
        }
        let aligned = align_up(size, DEFAULT_ALIGNMENT);
        if aligned > self.options.max_block_size {
            return Err(Error::out_of_memory("Arena::alloc"));
        }

        loop {
            let head = self.head.load(Ordering::Acquire);
            if !head.is_null() {
                // SAFETY: `head` was published by `install_block` via a successful CAS
                // and is never freed while reachable from `self.head` — blocks are only
                // freed by `reset`/`Drop`, which require `&mut self` and therefore cannot
                // run concurrently with this shared-reference reservation.
                let block = unsafe { &*head };
                if let Some(ptr) = block.try_reserve(aligned) {
                    self.total_used.fetch_add(aligned, Ordering::Relaxed);
                    return Ok(ptr);
                }
            }
            self.install_block(aligned)?;
        }
    }

    fn install_block(&self, min_size: usize) -> Result<(), Error> {
        let current_head = self.head.load(Ordering::Acquire);
        let size = min_size
            .max(self.options.initial_block_size)
            .min(self.options.max_block_size);

        let mut boxed = Block::new(size, DEFAULT_ALIGNMENT, self.options.host_alloc)?;
        boxed.prev = current_head;
        let new_head = Box::into_raw(boxed);

        match self
            .head
            .compare_exchange(current_head, new_head, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.total_allocated.fetch_add(size, Ordering::Relaxed);
                tracing::trace!(bytes = size, "installed new arena block");
                Ok(())
            }
            Err(_) => {
                // SAFETY: `new_head` was produced by `Box::into_raw` immediately above
                // and the CAS that would have published it lost, so no other thread can
                // have observed this pointer; we still hold the only handle to it.
                drop(unsafe { Box::from_raw(new_head) });
                Ok(())
            }
        }
    }

    /// Allocates `data.len() + 1` bytes, copies `data`, and writes a
    /// terminating zero — a null-terminated duplicate living in the arena.
    pub fn strdup(&self, data: &[u8]) -> Result<NonNull<u8>, Error> {
        let len = data.len();
        let ptr = self.alloc(len + 1)?;
        // SAFETY: `ptr` was just reserved by `alloc` for at least `len + 1` bytes and
        // is not aliased — reservation is exclusive to this call.
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), len);
            *ptr.as_ptr().add(len) = 0;
        }
        Ok(ptr)
    }

    /// Frees every block and zeroes every counter. Not safe to call
    /// concurrently with an in-flight `alloc` — enforced here by requiring
    /// `&mut self`, which the borrow checker guarantees is exclusive.
    pub fn reset(&mut self) {
        let mut current = *self.head.get_mut();
        *self.head.get_mut() = ptr::null_mut();
        while !current.is_null() {
            // SAFETY: `&mut self` guarantees no concurrent `alloc`/`reset`/`drop` is in
            // flight, so we have exclusive access to walk and free the whole chain.
            let boxed = unsafe { Box::from_raw(current) };
            current = boxed.prev;
            drop(boxed);
        }
        *self.total_allocated.get_mut() = 0;
        *self.total_used.get_mut() = 0;
    }

    /// Equivalent to dropping the arena; provided for parity with the
    /// runtime's external create/destroy/reset contract.
    pub fn destroy(self) {}
}

impl Drop for Arena {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn single_alloc_is_aligned_and_writable() {
        let arena = Arena::create(ArenaOptions::default());
        let ptr = arena.alloc(3).unwrap();
        // SAFETY: just reserved, 3 bytes rounded up to alignment are ours to write.
        unsafe {
            ptr.as_ptr().write(1);
            ptr.as_ptr().add(1).write(2);
            ptr.as_ptr().add(2).write(3);
        }
        assert_eq!(arena.total_used(), align_up(3, DEFAULT_ALIGNMENT));
    }

    #[test]
    fn zero_size_fails() {
        let arena = Arena::create(ArenaOptions::default());
        assert!(arena.alloc(0).unwrap_err().is_out_of_memory());
    }

    #[test]
    fn oversized_request_fails() {
        let opts = ArenaOptions {
            max_block_size: 64,
            ..ArenaOptions::default()
        };
        let arena = Arena::create(opts);
        assert!(arena.alloc(128).unwrap_err().is_out_of_memory());
    }

    #[test]
    fn many_small_allocs_span_multiple_blocks() {
        let opts = ArenaOptions {
            initial_block_size: 64,
            ..ArenaOptions::default()
        };
        let arena = Arena::create(opts);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let ptr = arena.alloc(16).unwrap();
            assert!(seen.insert(ptr.as_ptr() as usize), "overlapping allocation");
        }
        assert!(arena.total_allocated() >= arena.total_used());
    }

    #[test]
    fn reset_zeroes_counters_and_frees() {
        let mut arena = Arena::create(ArenaOptions::default());
        let _ = arena.alloc(64).unwrap();
        assert!(arena.total_used() > 0);
        arena.reset();
        assert_eq!(arena.total_used(), 0);
        assert_eq!(arena.total_allocated(), 0);
        // arena is usable again after reset
        let _ = arena.alloc(16).unwrap();
        assert!(arena.total_used() > 0);
    }

    #[test]
    fn strdup_null_terminates() {
        let arena = Arena::create(ArenaOptions::default());
        let ptr = arena.strdup(b"hi").unwrap();
        // SAFETY: strdup wrote 2 data bytes followed by a terminating zero.
        unsafe {
            assert_eq!(*ptr.as_ptr(), b'h');
            assert_eq!(*ptr.as_ptr().add(1), b'i');
            assert_eq!(*ptr.as_ptr().add(2), 0);
        }
    }

    /// Four threads each perform 1000 allocations of varying sizes plus a
    /// `strdup` every tenth iteration, all against one shared arena. Every
    /// returned range must be disjoint, and `total_used` must equal the sum
    /// of every requested size rounded up to alignment.
    #[test]
    fn concurrent_stress() {
        let arena = Arena::create(ArenaOptions::default());
        let ranges: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());
        let expected_used = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for i in 0..1000usize {
                        let size = 16 + (i % 1000);
                        let ptr = arena.alloc(size).unwrap();
                        let aligned = align_up(size, DEFAULT_ALIGNMENT);
                        expected_used.fetch_add(aligned, Ordering::Relaxed);
                        ranges
                            .lock()
                            .unwrap()
                            .push((ptr.as_ptr() as usize, aligned));

                        if i % 10 == 0 {
                            let s = arena.strdup(b"stress").unwrap();
                            expected_used.fetch_add(
                                align_up(b"stress".len() + 1, DEFAULT_ALIGNMENT),
                                Ordering::Relaxed,
                            );
                            ranges.lock().unwrap().push((
                                s.as_ptr() as usize,
                                align_up(b"stress".len() + 1, DEFAULT_ALIGNMENT),
                            ));
                        }
                    }
                });
            }
        });

        let mut ranges = ranges.into_inner().unwrap();
        ranges.sort_unstable_by_key(|&(start, _)| start);
        for pair in ranges.windows(2) {
            let (start_a, len_a) = pair[0];
            let (start_b, _) = pair[1];
            assert!(
                start_a + len_a <= start_b,
                "overlapping allocations: {:?}",
                pair
            );
        }

        assert_eq!(arena.total_used(), expected_used.load(Ordering::Relaxed));
    }
}
