//! Error severity classification.

/// How a failure should be handled by the caller.
///
/// Every error surfaced by the engine maps to one of these two classes, so
/// callers can decide uniformly whether to retry, skip a frame, or abort.
/// The concrete error enums live in the crates that produce them; each
/// exposes a `severity()` method returning one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation can be retried or the frame skipped (e.g. a stale
    /// presentation surface during a resize).
    Recoverable,
    /// Environment or driver failure outside the program's control; the
    /// process should shut down.
    Fatal,
}
