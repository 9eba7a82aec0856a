//! Configuration for the synchronizer.

use replog_protocol::LogFilter;
use std::time::Duration;

/// Configuration for a [`Synchronizer`](crate::Synchronizer).
#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    /// Filter applied to the remote log on pull.
    pub filter: Option<LogFilter>,
    /// Skip passes while no filter is set.
    pub filter_is_required: bool,
    /// Skip passes while the connection carries no authorization token.
    pub authorization_is_required: bool,
    /// Idle time between two loop passes.
    pub loop_interval: Duration,
    /// Polling period of
    /// [`Synchronizer::wait_until_stopped`](crate::Synchronizer::wait_until_stopped) and
    /// [`Synchronizer::suspend`](crate::Synchronizer::suspend).
    pub poll_interval: Duration,
    /// Pause before each applied item.
    pub throttling: Option<Duration>,
    /// Timeout of every remote request.
    pub request_timeout: Duration,
}

impl SynchronizerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pull filter.
    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Requires a filter before passes run.
    pub fn with_filter_required(mut self, required: bool) -> Self {
        self.filter_is_required = required;
        self
    }

    /// Requires an authorization token before passes run.
    pub fn with_authorization_required(mut self, required: bool) -> Self {
        self.authorization_is_required = required;
        self
    }

    /// Sets the idle time between loop passes.
    pub fn with_loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    /// Sets the polling period of blocking waits.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Pauses before each applied item.
    pub fn with_throttling(mut self, delay: Duration) -> Self {
        self.throttling = Some(delay);
        self
    }

    /// Sets the remote request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            filter: None,
            filter_is_required: false,
            authorization_is_required: true,
            loop_interval: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
            throttling: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}
