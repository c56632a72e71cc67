//! Request dispatch and result delivery toward the sandboxed renderer.
//!
//! The renderer cannot receive a synchronous return value for most call
//! shapes; instead every read request carries a completion identifier and the
//! native side delivers a [`ReadResult`] for that identifier once the I/O is
//! done. Inside this crate the channel is typed: the bridge hands
//! `(completion, result)` pairs to an injected [`CompletionSink`]. The legacy
//! encoding — injecting a script fragment that invokes the identifier with
//! `(error, payload)` — lives only in the [`script`] adapter.
//!
//! Delivery is exactly-once per request and happens before the dispatch call
//! returns; all failures are folded into an error-carrying result, never a
//! panic or a propagated error, so one bad request cannot take down the
//! dispatch loop.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::archive::ArchiveReader;
use crate::error::BridgeError;
use crate::file::DocumentFile;

/// How `read_range` payloads are encoded for transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BinaryMode {
    /// Legacy one-byte-per-character text (lossy outside Latin-1).
    #[default]
    Latin1,
    /// Base64 text via the stream codec.
    Base64,
}

/// Name identifying where an asynchronous result is delivered.
///
/// One-shot: the identifier is consumed by its delivery, and reusing one for
/// a second in-flight request leaves which response wins undefined.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompletionId(String);

impl CompletionId {
    /// Wrap a caller-supplied completion name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    /// The identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of one bridge read, delivered exactly once per request.
///
/// The standard `(error, result)` convention: `error` is `None` on success
/// and a human-readable message on failure, in which case the payload is
/// empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadResult {
    /// Failure message, or `None` on success.
    pub error: Option<String>,
    /// Payload text; encoding depends on which reader produced it.
    pub payload: String,
}

impl ReadResult {
    /// A successful result carrying `payload`.
    pub fn ok(payload: String) -> Self {
        Self {
            error: None,
            payload,
        }
    }

    /// A failed result; the payload is empty.
    pub fn err(message: String) -> Self {
        Self {
            error: Some(message),
            payload: String::new(),
        }
    }

    fn from_outcome(outcome: Result<String, BridgeError>) -> Self {
        match outcome {
            Ok(payload) => Self::ok(payload),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Receiver for completed requests.
///
/// Implementations deliver the result into the renderer's environment (see
/// [`script`]) or record it for tests.
pub trait CompletionSink {
    /// Deliver `result` for `completion`. Called exactly once per request.
    fn complete(&mut self, completion: &CompletionId, result: ReadResult);
}

impl<F: FnMut(&CompletionId, ReadResult)> CompletionSink for F {
    fn complete(&mut self, completion: &CompletionId, result: ReadResult) {
        self(completion, result)
    }
}

/// The bridge surface consumed by the embedded renderer.
///
/// Binds the document file the renderer was launched with, an archive reader
/// for container requests, and the sink results are delivered through. All
/// operations are synchronous, blocking calls on the thread servicing bridge
/// requests.
pub struct Bridge<S: CompletionSink> {
    document: DocumentFile,
    archives: ArchiveReader,
    mode: BinaryMode,
    sink: S,
    minted: AtomicU64,
}

impl<S: CompletionSink> Bridge<S> {
    /// Create a bridge over an open document.
    pub fn new(document: DocumentFile, archives: ArchiveReader, mode: BinaryMode, sink: S) -> Self {
        Self {
            document,
            archives,
            mode,
            sink,
            minted: AtomicU64::new(0),
        }
    }

    /// Byte length of the bound document. The one synchronous call shape.
    pub fn size(&self) -> u64 {
        self.document.size()
    }

    /// The archive reader (shared cache observability).
    pub fn archives(&self) -> &ArchiveReader {
        &self.archives
    }

    /// Mint a completion identifier for request shapes that carry none.
    pub fn mint_completion(&self) -> CompletionId {
        let n = self.minted.fetch_add(1, Ordering::Relaxed);
        CompletionId(format!("completion{}", n))
    }

    /// Read a byte window of the bound document; the payload encoding follows
    /// the bridge's [`BinaryMode`].
    pub fn read_range(&mut self, offset: u64, length: usize, completion: CompletionId) {
        let outcome = match self.mode {
            BinaryMode::Latin1 => self.document.read_range_as_text(offset, length),
            BinaryMode::Base64 => self.document.read_range_as_base64(offset, length),
        };
        self.deliver(completion, outcome);
    }

    /// Read a container entry as escaped, newline-stripped text.
    pub fn read_archive_entry_as_text(
        &mut self,
        container: &str,
        entry: &str,
        completion: CompletionId,
    ) {
        let outcome = self.archives.read_entry_as_text(container, entry);
        self.deliver(completion, outcome);
    }

    /// Read a container entry as a `data:` URI.
    pub fn read_archive_entry_as_data_uri(
        &mut self,
        container: &str,
        entry: &str,
        mime_type: Option<&str>,
        completion: CompletionId,
    ) {
        let outcome = self
            .archives
            .read_entry_as_data_uri(container, entry, mime_type);
        self.deliver(completion, outcome);
    }

    fn deliver(&mut self, completion: CompletionId, outcome: Result<String, BridgeError>) {
        self.sink
            .complete(&completion, ReadResult::from_outcome(outcome));
    }
}

/// The legacy named-callback script encoding.
///
/// The renderer's evaluation context exposes the completion identifier as a
/// global function; the native shell injects the fragment produced here to
/// invoke it with `(error, payload)`.
pub mod script {
    use super::{CompletionId, ReadResult};

    /// Render the invocation fragment for one completed request.
    ///
    /// Error messages are escaped for splicing into a quoted literal. The
    /// payload is spliced verbatim: text-mode entry payloads arrive
    /// pre-escaped from the archive reader and base64/data-URI payloads
    /// contain no quotes. Raw Latin-1 window payloads are only quote-safe to
    /// the extent the legacy contract ever was.
    pub fn render_invocation(completion: &CompletionId, result: &ReadResult) -> String {
        let mut out = String::with_capacity(result.payload.len() + 64);
        out.push_str("(function() {");
        out.push_str(completion.as_str());
        out.push('(');
        match &result.error {
            Some(message) => {
                out.push('"');
                for c in message.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            None => out.push_str("null"),
        }
        out.push_str(",\"");
        out.push_str(&result.payload);
        out.push_str("\");})();");
        out
    }

    /// A [`super::CompletionSink`] that renders each result as a script
    /// fragment and hands it to an injector (e.g. a webview's evaluate-script
    /// entry point).
    pub struct ScriptFragmentSink<F: FnMut(String)> {
        inject: F,
    }

    impl<F: FnMut(String)> ScriptFragmentSink<F> {
        /// Wrap a script injector.
        pub fn new(inject: F) -> Self {
            Self { inject }
        }
    }

    impl<F: FnMut(String)> super::CompletionSink for ScriptFragmentSink<F> {
        fn complete(&mut self, completion: &CompletionId, result: ReadResult) {
            (self.inject)(render_invocation(completion, &result));
        }
    }
}
