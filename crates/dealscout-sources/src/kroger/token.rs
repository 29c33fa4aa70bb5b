//! Cached client-credentials bearer token.

use std::time::Duration;

use tokio::time::Instant;

/// Tokens are treated as expired this long before the server says they are.
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub(crate) struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

impl CachedToken {
    pub(crate) fn new(access_token: String, expires_in: Duration, issued_at: Instant) -> Self {
        let lifetime = expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER);
        Self {
            access_token,
            refresh_at: issued_at + lifetime,
        }
    }

    pub(crate) fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }
}
