/// Classification for retry policy.
///
/// Used by the backfill engine and the scheduler to decide what a failure
/// means for the rest of the work.
///
/// # Behavior Summary
///
/// | Class | Recorded as a gap? | Worth retrying later? |
/// |-------|-------------------|-----------------------|
/// | `Retryable` | Yes | Yes |
/// | `Never` | Yes | No |
/// | `Cancelled` | No (work was interrupted) | Yes, on the next run |
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RetryClass {
    /// Transport or upstream failure (timeout, refused connection, non-2xx,
    /// malformed payload).
    ///
    /// The engine never retries these itself beyond the single attempt per
    /// chunk. They end up in the failed-range manifest so the caller can
    /// re-request the exact sub-range.
    Retryable,

    /// Never retry - bad symbol, missing credential, unsupported operation.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// A stop signal interrupted the work. Nothing was written for the
    /// interrupted dataset.
    Cancelled,
}
