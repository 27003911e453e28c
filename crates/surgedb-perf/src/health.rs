//! Readiness probing of the service under test.

use crate::client::{join_url, HttpCaller};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pause between failed probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls `GET <base_url><health_path>` until it answers 200 or the budget runs out.
#[derive(Debug, Clone)]
pub struct HealthGate {
    url: String,
    timeout: Duration,
    poll_interval: Duration,
    probe_timeout: Duration,
}

impl HealthGate {
    #[must_use]
    pub fn new(base_url: &str, health_path: &str, timeout: Duration) -> Self {
        Self {
            url: join_url(base_url, health_path),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `true` as soon as a probe returns exactly 200, `false` once `timeout` has
    /// elapsed without one. Any other status or a transport error counts as
    /// not ready yet.
    pub async fn wait_ready(&self, caller: &dyn HttpCaller) -> bool {
        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0u32;

        while Instant::now() < deadline {
            attempts += 1;
            match caller.get(&self.url, self.probe_timeout).await {
                Ok(response) if response.status == 200 => {
                    info!("{} ready after {} probe(s)", self.url, attempts);
                    return true;
                }
                Ok(response) => {
                    debug!("probe {} -> {}", self.url, response.status);
                }
                Err(e) => {
                    debug!("probe {} failed: {}", self.url, e);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        warn!(
            "{} not ready within {:?} ({} probes)",
            self.url, self.timeout, attempts
        );
        false
    }
}
