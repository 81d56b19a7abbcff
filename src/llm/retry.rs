//! Bounded exponential back-off around any [`GenerationClient`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::provider::{FragmentStream, GenerationClient};
use super::types::ChatMessage;
use crate::core::config::RetrySettings;
use crate::core::errors::{RagError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            multiplier: Duration::from_secs(settings.multiplier_secs),
            min_delay: Duration::from_secs(settings.min_delay_secs),
            max_delay: Duration::from_secs(settings.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th failure (1-based):
    /// `multiplier * 2^(attempt - 1)` clamped to `[min_delay, max_delay]`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let raw = self.multiplier.saturating_mul(factor);
        raw.max(self.min_delay).min(self.max_delay.max(self.min_delay))
    }
}

pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: GenerationClient> RetryingClient<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.policy.max_attempts => {
                    tracing::warn!(
                        "{} via {} gave up after {} attempts: {}",
                        operation,
                        self.inner.name(),
                        attempt,
                        e
                    );
                    return Err(RagError::ProviderUnavailable(format!(
                        "{} failed after {} attempts: {}",
                        operation, attempt, e
                    )));
                }
                Err(e) => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "{} via {} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        self.inner.name(),
                        attempt,
                        self.policy.max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<C: GenerationClient> GenerationClient for RetryingClient<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str, system_message: Option<&str>) -> Result<String> {
        let inner = &self.inner;
        self.run("generate", move || inner.generate(prompt, system_message))
            .await
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: Option<f64>) -> Result<String> {
        let inner = &self.inner;
        self.run("chat", move || inner.chat(messages, temperature))
            .await
    }

    async fn generate_json(&self, prompt: &str, system_message: Option<&str>) -> Result<Value> {
        let inner = &self.inner;
        self.run("generate_json", move || inner.generate_json(prompt, system_message))
            .await
    }

    /// Only stream set-up is retried. Errors after the first fragment reach the consumer.
    async fn generate_streaming(
        &self,
        prompt: &str,
        system_message: Option<&str>,
    ) -> Result<FragmentStream> {
        let inner = &self.inner;
        self.run("generate_streaming", move || {
            inner.generate_streaming(prompt, system_message)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    struct FlakyClient {
        calls: Arc<AtomicUsize>,
        failures: usize,
        error: fn() -> RagError,
    }

    impl FlakyClient {
        fn new(failures: usize, error: fn() -> RagError) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    failures,
                    error,
                },
                calls,
            )
        }

        fn next(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl GenerationClient for FlakyClient {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Result<String> {
            self.next().map(|_| "answer".to_string())
        }

        async fn chat(&self, messages: &[ChatMessage], _temperature: Option<f64>) -> Result<String> {
            self.next().map(|_| format!("reply to {} messages", messages.len()))
        }

        async fn generate_streaming(&self, _prompt: &str, _system: Option<&str>) -> Result<FragmentStream> {
            self.next()?;
            let (tx, rx) = mpsc::channel(2);
            tx.send(Ok("frag".to_string())).await.unwrap();
            Ok(rx)
        }
    }

    fn transient() -> RagError {
        RagError::ProviderUnavailable("503".into())
    }

    #[test]
    fn delays_grow_exponentially_within_bounds() {
        let policy = RetryPolicy {
            max_attempts: 6,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        };

        let delays: Vec<u64> = (1..=6).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 2, 4, 8, 10, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let (flaky, calls) = FlakyClient::new(2, transient);
        let client = RetryingClient::new(flaky, RetryPolicy::default());

        let start = Instant::now();
        let answer = client.generate("q", None).await.unwrap();

        assert_eq!(answer, "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_as_provider_unavailable() {
        let (flaky, calls) = FlakyClient::new(10, transient);
        let client = RetryingClient::new(flaky, RetryPolicy::default());

        let err = client.generate("q", None).await.unwrap_err();

        assert!(matches!(err, RagError::ProviderUnavailable(ref m) if m.contains("after 3 attempts")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_and_quota_are_not_retried() {
        fn auth() -> RagError {
            RagError::Auth("bad key".into())
        }
        fn quota() -> RagError {
            RagError::QuotaExceeded("plan".into())
        }
        fn missing_model() -> RagError {
            RagError::NotFound("model".into())
        }

        for error in [auth as fn() -> RagError, quota, missing_model] {
            let (flaky, calls) = FlakyClient::new(10, error);
            let client = RetryingClient::new(flaky, RetryPolicy::default());

            let err = client.generate("q", None).await.unwrap_err();

            assert!(!err.is_retryable());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn chat_is_retried_like_generate() {
        let (flaky, calls) = FlakyClient::new(1, transient);
        let client = RetryingClient::new(flaky, RetryPolicy::default());
        let messages = [ChatMessage::user("hi"), ChatMessage::assistant("hello"), ChatMessage::user("again")];

        let reply = client.chat(&messages, Some(0.1)).await.unwrap();

        assert_eq!(reply, "reply to 3 messages");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_setup_is_retried() {
        let (flaky, calls) = FlakyClient::new(1, transient);
        let client = RetryingClient::new(flaky, RetryPolicy::default());

        let mut rx = client.generate_streaming("q", None).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), "frag");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
