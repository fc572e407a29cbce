//! Device-token lifecycle.
//!
//! Acquisition is single-flight: concurrent callers share one in-flight
//! outcome instead of issuing parallel provider requests. The provider
//! returning no token is transient and retried a fixed number of times with
//! a fixed delay; exhaustion is a typed soft failure.
//!
//! Ordering invariants:
//! * the token record is persisted locally before the backend registration
//!   call, so a crash between the two leaves the recoverable "have token,
//!   not registered" state;
//! * on rotation, the new token is registered before the old one is
//!   deregistered, so there is no window with zero registered tokens;
//! * a `release` overlapping an in-flight `acquire` wins: once both settle
//!   the device is disabled and nothing stays registered with the backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::logger::Logger;
use crate::messaging::constants::{
    TOKEN_ACQUIRE_MAX_ATTEMPTS, TOKEN_ACQUIRE_RETRY_DELAY_MS, TOKEN_TTL_DAYS,
};
use crate::messaging::error::{
    acquire_superseded, token_acquire_exhausted, MessagingResult,
};
use crate::messaging::gateway::PushGateway;
use crate::messaging::rest::BackendClient;
use crate::messaging::token_store::{self, TokenRecord};
use crate::platform::runtime;
use crate::platform::web::KeyValueStorage;

/// Retry and expiry knobs, overridable in tests.
#[derive(Clone, Copy, Debug)]
pub struct TokenTiming {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub token_ttl: chrono::Duration,
}

impl Default for TokenTiming {
    fn default() -> Self {
        Self {
            max_attempts: TOKEN_ACQUIRE_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(TOKEN_ACQUIRE_RETRY_DELAY_MS),
            token_ttl: chrono::Duration::days(TOKEN_TTL_DAYS),
        }
    }
}

/// Result of a successful acquisition.
///
/// `backend_synced` is false when the token was minted and persisted but the
/// registration call failed; the token stays usable locally and registration
/// is retried on the next load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcquireOutcome {
    pub token: String,
    pub backend_synced: bool,
}

type FlightFuture = Shared<BoxFuture<'static, MessagingResult<AcquireOutcome>>>;

#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenManagerInner>,
}

struct TokenManagerInner {
    gateway: Arc<dyn PushGateway>,
    backend: Arc<BackendClient>,
    storage: Arc<dyn KeyValueStorage>,
    sender_id: String,
    vapid_key: String,
    timing: TokenTiming,
    flight: async_lock::Mutex<Option<FlightFuture>>,
    /// Bumped by every release; an acquire that observes a bump undoes
    /// itself (last-writer-wins).
    epoch: AtomicU64,
    logger: Logger,
}

impl TokenManager {
    pub fn new(
        gateway: Arc<dyn PushGateway>,
        backend: Arc<BackendClient>,
        storage: Arc<dyn KeyValueStorage>,
        sender_id: impl Into<String>,
        vapid_key: impl Into<String>,
        timing: TokenTiming,
    ) -> Self {
        Self {
            inner: Arc::new(TokenManagerInner {
                gateway,
                backend,
                storage,
                sender_id: sender_id.into(),
                vapid_key: vapid_key.into(),
                timing,
                flight: async_lock::Mutex::new(None),
                epoch: AtomicU64::new(0),
                logger: Logger::new("push-tokens"),
            }),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// The locally persisted record, if any. Possibly stale: another tab may
    /// have released it, so registration decisions re-validate.
    pub fn cached_token(&self) -> Option<TokenRecord> {
        token_store::read_token(self.inner.storage.as_ref(), &self.inner.logger)
    }

    /// Mints (or reuses) a token, persists it, and registers it with the
    /// backend. Concurrent calls share one outcome.
    pub async fn acquire(&self) -> MessagingResult<AcquireOutcome> {
        let flight = {
            let mut slot = self.inner.flight.lock().await;
            match slot.as_ref() {
                Some(flight) => flight.clone(),
                None => {
                    let inner = self.inner.clone();
                    let flight: FlightFuture =
                        TokenManagerInner::acquire_flow(inner, false).boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let result = flight.await;
        // Every completer clears the slot; late joiners get the memoized
        // record through the fast path instead.
        self.inner.flight.lock().await.take();
        result
    }

    /// Drops the local token and deregisters it from the backend. A missing
    /// token is success, and an acquire still in flight is superseded.
    pub async fn release(&self) -> MessagingResult<bool> {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        let record = token_store::read_token(self.inner.storage.as_ref(), &self.inner.logger);
        token_store::remove_token(self.inner.storage.as_ref());

        let Some(record) = record else {
            return Ok(false);
        };

        if let Err(err) = self.inner.gateway.invalidate_token(&record.token).await {
            self.inner
                .logger
                .warn(format!("provider token invalidation failed: {err}"));
        }
        self.inner.backend.remove_token(&record.token).await?;
        Ok(true)
    }

    /// Retries the backend registration of an already-persisted token.
    /// Returns false when there is nothing to do.
    pub async fn ensure_registered(&self) -> MessagingResult<bool> {
        let Some(mut record) =
            token_store::read_token(self.inner.storage.as_ref(), &self.inner.logger)
        else {
            return Ok(false);
        };
        if record.backend_synced {
            return Ok(false);
        }

        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        self.inner.backend.register_token(&record.token).await?;

        if self.inner.epoch.load(Ordering::SeqCst) != epoch {
            // A release raced the registration; undo it.
            self.inner.backend.remove_token(&record.token).await?;
            return Ok(false);
        }

        record.backend_synced = true;
        token_store::write_token(self.inner.storage.as_ref(), &record)?;
        Ok(true)
    }

    /// Provider-signalled rotation: mint a fresh token regardless of the
    /// cached record's age. Waits out any in-flight acquire first.
    pub async fn rotate(&self) -> MessagingResult<AcquireOutcome> {
        let pending = self.inner.flight.lock().await.clone();
        if let Some(flight) = pending {
            let _ = flight.await;
        }
        TokenManagerInner::acquire_flow(self.inner.clone(), true).await
    }
}

impl TokenManagerInner {
    async fn acquire_flow(
        inner: Arc<TokenManagerInner>,
        force_mint: bool,
    ) -> MessagingResult<AcquireOutcome> {
        let epoch = inner.epoch.load(Ordering::SeqCst);
        let now = Utc::now();

        let previous = token_store::read_token(inner.storage.as_ref(), &inner.logger);

        if !force_mint {
            if let Some(record) = previous
                .as_ref()
                .filter(|record| record.matches_sender(&inner.sender_id))
                .filter(|record| !record.is_expired(now, inner.timing.token_ttl))
            {
                if record.backend_synced {
                    return Ok(AcquireOutcome {
                        token: record.token.clone(),
                        backend_synced: true,
                    });
                }
                // Token is fine, only the registration is missing.
                let synced = Self::register_with_backend(&inner, &record.token).await;
                if synced {
                    let mut updated = record.clone();
                    updated.backend_synced = true;
                    token_store::write_token(inner.storage.as_ref(), &updated)?;
                }
                return Self::settle(inner.clone(), epoch, record.token.clone(), synced).await;
            }
        }

        let token = Self::mint_with_retry(&inner).await?;

        let mut record = TokenRecord::new(token.clone(), inner.sender_id.clone(), now);
        token_store::write_token(inner.storage.as_ref(), &record)?;

        let synced = Self::register_with_backend(&inner, &token).await;
        if synced {
            record.backend_synced = true;
            token_store::write_token(inner.storage.as_ref(), &record)?;
        }

        // Rotation: the replacement is registered before the old token is
        // deregistered, never the other way around.
        if let Some(old) = previous.filter(|old| old.token != token) {
            if let Err(err) = inner.backend.remove_token(&old.token).await {
                inner
                    .logger
                    .warn(format!("deregistration of rotated token failed: {err}"));
            }
            if let Err(err) = inner.gateway.invalidate_token(&old.token).await {
                inner
                    .logger
                    .warn(format!("invalidation of rotated token failed: {err}"));
            }
        }

        Self::settle(inner, epoch, token, synced).await
    }

    /// Applies last-writer-wins: when a release happened while this acquire
    /// was in flight, the freshly minted token is torn down again.
    async fn settle(
        inner: Arc<TokenManagerInner>,
        epoch: u64,
        token: String,
        synced: bool,
    ) -> MessagingResult<AcquireOutcome> {
        if inner.epoch.load(Ordering::SeqCst) == epoch {
            return Ok(AcquireOutcome {
                token,
                backend_synced: synced,
            });
        }

        inner
            .logger
            .info("acquire overlapped a release; rolling the new token back");
        token_store::remove_token(inner.storage.as_ref());
        if synced {
            if let Err(err) = inner.backend.remove_token(&token).await {
                inner
                    .logger
                    .warn(format!("rollback deregistration failed: {err}"));
            }
        }
        if let Err(err) = inner.gateway.invalidate_token(&token).await {
            inner
                .logger
                .warn(format!("rollback invalidation failed: {err}"));
        }
        Err(acquire_superseded())
    }

    async fn mint_with_retry(inner: &Arc<TokenManagerInner>) -> MessagingResult<String> {
        let attempts = inner.timing.max_attempts.max(1);
        for attempt in 1..=attempts {
            match inner
                .gateway
                .mint_token(&inner.sender_id, &inner.vapid_key)
                .await?
            {
                Some(token) => return Ok(token),
                None => {
                    inner.logger.debug(format!(
                        "provider returned no token (attempt {attempt}/{attempts})"
                    ));
                    if attempt < attempts {
                        runtime::sleep(inner.timing.retry_delay).await;
                    }
                }
            }
        }
        Err(token_acquire_exhausted(attempts))
    }

    async fn register_with_backend(inner: &Arc<TokenManagerInner>, token: &str) -> bool {
        match inner.backend.register_token(token).await {
            Ok(()) => true,
            Err(err) => {
                inner
                    .logger
                    .warn(format!("backend token registration failed: {err}"));
                false
            }
        }
    }
}
