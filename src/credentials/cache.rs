//! Token reuse until near expiry.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::credentials::TokenSource;
use crate::error::Result;

/// Minimum lifetime a cached token must have left to be handed out.
pub const MIN_TOKEN_LIFETIME: Duration = Duration::from_secs(60);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Caches the token of an inner source.
pub struct TokenCache<S> {
    source: S,
    cached: Mutex<Option<CachedToken>>,
}

impl<S: TokenSource> TokenCache<S> {
    pub fn new(source: S) -> Self {
        Self { source, cached: Mutex::new(None) }
    }
}

#[async_trait]
impl<S: TokenSource> TokenSource for TokenCache<S> {
    async fn access_token(&self) -> Result<(String, Duration)> {
        // Held across the refresh so concurrent callers share one fetch.
        let mut cached = self.cached.lock().await;
        let now = Instant::now();

        if let Some(c) = cached.as_ref() {
            let remaining = c.expires_at.saturating_duration_since(now);
            if remaining >= MIN_TOKEN_LIFETIME {
                return Ok((c.token.clone(), remaining));
            }
        }

        let (token, ttl) = self.source.access_token().await?;
        tracing::debug!(ttl_secs = ttl.as_secs(), "Refreshed access token");
        *cached = Some(CachedToken { token: token.clone(), expires_at: now + ttl });
        Ok((token, ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
        ttl: Duration,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn access_token(&self) -> Result<(String, Duration)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((format!("token-{}", n), self.ttl))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reuses_until_sixty_seconds_left() {
        let cache = TokenCache::new(CountingSource { calls: AtomicU32::new(0), ttl: Duration::from_secs(120) });

        let (token, ttl) = cache.access_token().await.unwrap();
        assert_eq!((token.as_str(), ttl), ("token-1", Duration::from_secs(120)));

        tokio::time::advance(Duration::from_secs(59)).await;
        let (token, ttl) = cache.access_token().await.unwrap();
        assert_eq!(token, "token-1");
        assert_eq!(ttl, Duration::from_secs(61));

        tokio::time::advance(Duration::from_secs(2)).await;
        let (token, _) = cache.access_token().await.unwrap();
        assert_eq!(token, "token-2");
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn short_lived_tokens_are_never_cached() {
        let cache = TokenCache::new(CountingSource { calls: AtomicU32::new(0), ttl: Duration::from_secs(30) });
        cache.access_token().await.unwrap();
        cache.access_token().await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }
}
