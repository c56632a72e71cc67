//! Native-side access bridge for a sandboxed embedded document renderer.
//!
//! The renderer runs inside a network-disabled, filesystem-less evaluation
//! context and can only receive data through injected results and callback
//! invocations. This crate is the native half of that arrangement:
//!
//! - [`file::DocumentFile`] serves `(offset, length)` byte windows of the
//!   document the renderer was launched with.
//! - [`archive`] serves named entries out of zip-format document containers,
//!   with a single-slot container cache keyed by container identity.
//! - [`base64::Base64Encoder`] is the streaming codec that makes binary
//!   payloads text-safe for transport.
//! - [`bridge::Bridge`] dispatches requests and delivers each result exactly
//!   once through a [`bridge::CompletionSink`]; the legacy named-callback
//!   script encoding is confined to [`bridge::script`].
//!
//! All I/O is synchronous and blocking on the thread servicing bridge
//! requests; the underlying resources are local storage only.
//!
//! # Example
//!
//! ```rust,no_run
//! use odf_bridge::archive::{ArchiveLimits, ArchiveReader, ContainerCache};
//! use odf_bridge::bridge::{BinaryMode, Bridge};
//! use odf_bridge::bridge::script::ScriptFragmentSink;
//! use odf_bridge::file::DocumentFile;
//!
//! # fn example() -> Result<(), odf_bridge::error::BridgeError> {
//! let document = DocumentFile::open("/documents/report.odt")?;
//! let archives = ArchiveReader::new(ContainerCache::new(ArchiveLimits::default()));
//! let sink = ScriptFragmentSink::new(|fragment| {
//!     // hand the fragment to the webview's evaluate-script entry point
//!     let _ = fragment;
//! });
//! let mut bridge = Bridge::new(document, archives, BinaryMode::Latin1, sink);
//!
//! let completion = bridge.mint_completion();
//! bridge.read_archive_entry_as_text(
//!     "file:///documents/report.odt",
//!     "content.xml",
//!     completion,
//! );
//! # Ok(())
//! # }
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod archive;
pub mod base64;
pub mod bridge;
pub mod error;
pub mod file;

pub use archive::{ArchiveEntry, ArchiveLimits, ArchiveReader, ContainerCache, ZipArchive};
pub use base64::Base64Encoder;
pub use bridge::{BinaryMode, Bridge, CompletionId, CompletionSink, ReadResult};
pub use error::BridgeError;
pub use file::DocumentFile;
