//! Push-provider seam.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::messaging::error::MessagingResult;

/// The provider SDK boundary: mints and invalidates device tokens.
///
/// `Ok(None)` from [`mint_token`](PushGateway::mint_token) is the transient
/// "no token yet" condition and subject to the caller's bounded retry;
/// `Err` is a hard provider failure and is not retried.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn mint_token(
        &self,
        sender_id: &str,
        vapid_key: &str,
    ) -> MessagingResult<Option<String>>;

    async fn invalidate_token(&self, token: &str) -> MessagingResult<()>;
}

/// In-process gateway minting random opaque tokens. The default on native
/// targets, where no real push transport exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalGateway;

impl LocalGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushGateway for LocalGateway {
    async fn mint_token(
        &self,
        _sender_id: &str,
        _vapid_key: &str,
    ) -> MessagingResult<Option<String>> {
        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .map(char::from)
            .take(32)
            .collect();
        Ok(Some(token))
    }

    async fn invalidate_token(&self, _token: &str) -> MessagingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn local_gateway_mints_distinct_tokens() {
        let gateway = LocalGateway::new();
        let first = gateway.mint_token("sender", "key").await.unwrap().unwrap();
        let second = gateway.mint_token("sender", "key").await.unwrap().unwrap();
        assert_eq!(first.len(), 32);
        assert_ne!(first, second);
    }
}
