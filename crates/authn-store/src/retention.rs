//! Token retention: which session tokens survive a platform login.
//!
//! Kept free of any transaction machinery so the policy can be tested on
//! plain vectors. The store calls these inside its write transaction.

use chrono::{DateTime, Duration, Utc};

use crate::SessionToken;

/// Splits `tokens` into the `keep` most recently issued (returned first)
/// and the rest (returned second). Both halves are in issuance order,
/// oldest first.
///
/// Ties on `issued_at` are broken by token value so the result is
/// deterministic.
pub fn trim_to_newest(
    mut tokens: Vec<SessionToken>,
    keep: usize,
) -> (Vec<SessionToken>, Vec<SessionToken>) {
    tokens.sort_by(|a, b| {
        a.issued_at
            .cmp(&b.issued_at)
            .then_with(|| a.token.cmp(&b.token))
    });
    let cut = tokens.len().saturating_sub(keep);
    let kept = tokens.split_off(cut);
    (kept, tokens)
}

/// Issue time for a token minted at `now` next to `existing`.
///
/// Strictly later than every existing token, so issuance order stays total
/// even when several logins land within one clock tick or the clock steps
/// backwards.
pub fn next_issue_time(
    existing: &[SessionToken],
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match existing.iter().map(|t| t.issued_at).max() {
        Some(newest) if newest >= now => newest + Duration::microseconds(1),
        _ => now,
    }
}
