//! Offloading seal/open work from async code
//!
//! Key derivation dominates the cost of both operations, so each call is
//! run on tokio's blocking pool. A semaphore caps how many derivations
//! run at once. Every job owns its envelope; nothing is shared between
//! jobs and no derived key outlives its call.

use crate::config::Config;
use crate::envelope::{Envelope, EnvelopeCipher};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;
use zeroize::Zeroizing;

/// Bounded pool for CPU-heavy envelope operations
#[derive(Debug, Clone)]
pub struct SealPool {
    cipher: EnvelopeCipher,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl SealPool {
    /// Create a pool running at most `max_concurrent` jobs at once
    pub fn new(cipher: EnvelopeCipher, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        SealPool {
            cipher,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Create a pool from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            EnvelopeCipher::new(&config.encryption),
            config.worker.max_concurrent,
        )
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of jobs that could start right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    async fn run<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(EnvelopeCipher) -> Result<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Internal("Seal pool closed".to_string()))?;

        // The permit lives as long as the blocking job, even if the caller
        // stops waiting for it
        let cipher = self.cipher;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(cipher)
        })
        .await
        .map_err(|e| Error::Internal(format!("Seal job failed: {}", e)))?
    }

    /// Seal `envelope` on the blocking pool and hand it back
    pub async fn encrypt<P>(
        &self,
        mut envelope: Envelope<P>,
        passphrase: impl AsRef<[u8]>,
    ) -> Result<Envelope<P>>
    where
        P: Serialize + Send + 'static,
    {
        let passphrase = Zeroizing::new(passphrase.as_ref().to_vec());
        let envelope_id = envelope.envelope_id();
        debug!(envelope_id = %envelope_id, "Queueing seal job");

        self.run(move |cipher| {
            cipher.seal(&mut envelope, passphrase.as_slice())?;
            Ok(envelope)
        })
        .await
    }

    /// Open `envelope` on the blocking pool, returning it with its payload
    pub async fn decrypt<P>(
        &self,
        envelope: Envelope<P>,
        passphrase: impl AsRef<[u8]>,
    ) -> Result<(Envelope<P>, P)>
    where
        P: DeserializeOwned + Send + 'static,
    {
        let passphrase = Zeroizing::new(passphrase.as_ref().to_vec());
        debug!(envelope_id = %envelope.envelope_id(), "Queueing open job");

        self.run(move |cipher| {
            let payload = cipher.decrypt(&envelope, passphrase.as_slice())?;
            Ok((envelope, payload))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Violation;
    use crate::routing::RouteSpec;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Job {
        event_type: String,
        index: usize,
    }

    fn envelope(index: usize) -> Envelope<Job> {
        Envelope::builder(Job {
            event_type: "core.task.dispatch".to_string(),
            index,
        })
        .source_node("node-a")
        .route(RouteSpec::direct("node://worker"))
        .build()
        .unwrap()
    }

    fn pool(max: usize) -> SealPool {
        SealPool::new(EnvelopeCipher::with_iterations(1_000), max)
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_offloaded() {
        let pool = pool(2);
        let sealed = pool.encrypt(envelope(7), "pw").await.unwrap();
        assert!(sealed.is_encrypted());

        let (returned, payload) = pool.decrypt(sealed, "pw").await.unwrap();
        assert!(returned.is_encrypted());
        assert_eq!(payload.index, 7);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let pool = pool(1);
        let sealed = pool.encrypt(envelope(1), "pw").await.unwrap();

        let err = pool.decrypt(sealed, "other").await.unwrap_err();
        assert_eq!(err.violation(), Some(Violation::AuthenticationFailed));
    }

    #[tokio::test]
    async fn test_many_envelopes_concurrently() {
        let pool = pool(3);
        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let sealed = pool.encrypt(envelope(i), format!("pw-{}", i)).await?;
                pool.decrypt(sealed, format!("pw-{}", i)).await
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let (_, payload) = handle.await.unwrap().unwrap();
            assert_eq!(payload.index, i);
        }
    }

    #[tokio::test]
    async fn test_abandoned_job_keeps_its_permit() {
        let pool = pool(1);
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let runner = pool.clone();
        let caller = tokio::spawn(async move {
            runner
                .run(move |_| {
                    let _ = started_tx.send(());
                    let _ = release_rx.recv();
                    Ok(())
                })
                .await
        });

        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();
        caller.abort();
        let _ = caller.await;

        // The job is still running, so the slot stays taken
        assert_eq!(pool.available(), 0);

        release_tx.send(()).unwrap();
        let reacquired = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            pool.permits.acquire(),
        )
        .await;
        assert!(matches!(reacquired, Ok(Ok(_))));
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        assert_eq!(pool(0).max_concurrent(), 1);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.encryption.kdf_iterations = 1_000;
        config.worker.max_concurrent = 4;

        let pool = SealPool::from_config(&config);
        assert_eq!(pool.max_concurrent(), 4);
        assert_eq!(pool.available(), 4);
    }
}
