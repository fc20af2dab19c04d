pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Carries the trimmed query to send.
    Dispatch(String),
    Reject,
}

/// Decides whether `raw` may reach the network. Length counts characters, not bytes.
pub fn check(raw: &str, min_chars: usize) -> GateDecision {
    let trimmed = raw.trim();
    if trimmed.chars().count() < min_chars.max(1) {
        return GateDecision::Reject;
    }
    GateDecision::Dispatch(trimmed.to_string())
}
