/// Classification for retry policy.
///
/// Used by callers to decide whether a failed price fetch is worth
/// repeating later or should be surfaced as terminal.
///
/// | Class | Retry later? | Counts as upstream outage? |
/// |-------|--------------|----------------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes | Yes |
/// | `NextProvider` | Yes, with another source | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad symbol, validation error, or terminal failure.
    Never,

    /// Transient failure such as rate limiting or a timeout.
    /// The same request may succeed after a delay.
    WithBackoff,

    /// This provider can't serve the request, another one might.
    NextProvider,
}

impl RetryClass {
    /// Whether the failure is transient for the provider that produced it.
    pub fn is_transient(&self) -> bool {
        matches!(self, RetryClass::WithBackoff)
    }
}
