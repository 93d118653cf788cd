#![warn(missing_docs)]

//! Runtime support for a compact, schema-driven binary wire format.
//!
//! This crate does not know anything about schemas, field tags, or message
//! versions — that is generated code's job. What it provides is the layer
//! underneath: a thread-safe bump [`arena`] allocator, a zero-copy
//! [`reader`] cursor over a caller-owned buffer, a growable arena-backed
//! [`writer`] cursor, and the primitive scalar/string/GUID/timestamp codecs
//! both sides agree on.
//!
//! # Layout
//!
//! - [`arena`] — the allocator. [`arena::Arena`] is safe to share across
//!   threads; [`arena::ArenaOptions`] configures block sizing and lets a
//!   caller inject a host allocator.
//! - [`context`] — [`context::Context`] bundles one arena with the policy
//!   knobs ([`context::ContextOptions`]) used by readers and writers it
//!   creates.
//! - [`reader`] — [`reader::Reader`] reads primitives, strings, byte runs,
//!   GUIDs, and timestamps out of a borrowed buffer with bounds checking on
//!   every read.
//! - [`writer`] — [`writer::Writer`] is the write-side counterpart, backed
//!   by arena memory that grows (by doubling) as needed.
//! - [`view`] — [`view::StringView`] and [`view::ByteView`], the non-owning
//!   borrowed types a reader hands back for variable-length fields.
//! - [`guid`] — [`guid::Guid`], a 16-byte identifier with the common
//!   `{u32, u16, u16, [u8; 8]}` wire layout.
//! - [`date`] — [`date::WireDate`], a 100ns-tick timestamp relative to the
//!   Unix epoch.
//! - [`error`] — the [`error::Error`]/[`error::ErrorKind`] taxonomy every
//!   fallible operation in this crate returns.
//!
//! # Error handling
//!
//! Every fallible method returns `Result<T, error::Error>`. There is no
//! panicking entry point for malformed input: a corrupt length prefix or an
//! exhausted arena surfaces as an `Err`, never a panic or an out-of-bounds
//! read. See [`error`] for the full taxonomy.
//!
//! # Concurrency
//!
//! [`arena::Arena`] and [`context::Context`] are safe to share across
//! threads (`alloc`/`strdup` take `&self`). [`reader::Reader`] and
//! [`writer::Writer`] are single-threaded values by design — `Writer` in
//! particular is intentionally not `Send`/`Sync`, so attempting to move one
//! across a thread boundary is a compile error rather than a documented
//! footgun.

pub mod arena;
pub mod context;
pub mod date;
pub mod error;
pub mod guid;
pub mod reader;
pub mod view;
pub mod writer;

pub use arena::{Arena, ArenaOptions, HostAlloc};
pub use context::{Context, ContextOptions};
pub use date::WireDate;
pub use error::{Error, ErrorKind, Result};
pub use guid::Guid;
pub use reader::Reader;
pub use view::{ByteView, StringView};
pub use writer::Writer;
