//! Settings of the clients the API and the agent use to reach each other

use std::time::Duration;

/// Timeouts and retry policy of an [`AgentClient`](crate::AgentClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Whole-request limit; result uploads can be large
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Retries after the first attempt
    pub retry_count: u32,
    /// Pause before the first retry, doubled for each further one
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
            retry_count: 3,
            retry_delay: Duration::from_millis(500),
            user_agent: format!("clearance/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Fail fast without retrying
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry_count: 0,
            ..Self::default()
        }
    }

    pub fn with_retries(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_config_never_retries() {
        let fast = ClientConfig::fast();
        assert_eq!(fast.retry_count, 0);
        assert!(fast.timeout < ClientConfig::default().timeout);
        assert_eq!(fast.user_agent, ClientConfig::default().user_agent);
    }

    #[test]
    fn test_with_retries() {
        let config = ClientConfig::fast().with_retries(2, Duration::from_millis(5));
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(5));
    }
}
