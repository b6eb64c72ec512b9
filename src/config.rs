//! Configuration for fetching and caching bot lists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Default HTTP timeout for bot-list downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for [`crate::botlist::BotListCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Directory holding downloaded lists and their `.meta` files
    pub cache_dir: PathBuf,
    /// Re-download lists older than this; `None` keeps cached files forever
    pub max_age: Option<Duration>,
    /// HTTP timeout
    pub timeout: Duration,
    /// User-Agent header sent with downloads
    pub user_agent: String,
}

impl FetchConfig {
    /// Create a config caching into `cache_dir`.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Reject settings that would make every download fail.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user agent must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("."),
            max_age: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("denyblock/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
