use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::core::error::PackResult;

/// Retries an operation only while the catalog reports rate limiting,
/// sleeping a fixed window between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRetry {
    pub max_attempts: u32,
    pub wait: Duration,
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: Duration::from_secs(60),
        }
    }
}

impl RateLimitRetry {
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> PackResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PackResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() && attempt < max_attempts => {
                    attempt += 1;
                    warn!(
                        "Rate limited fetching {}, waiting {:?} before retry {}/{}",
                        what, self.wait, attempt, max_attempts
                    );
                    tokio::time::sleep(self.wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
