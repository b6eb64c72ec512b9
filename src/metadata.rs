//! Sidecar metadata recording when a cached bot list was fetched.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::Result;

/// Contents of a `<list>.meta` file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FetchMetadata {
    #[serde(with = "system_time_serde")]
    pub last_updated: Option<SystemTime>,
    pub url: Option<String>,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        time.map(|t| t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs())
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl FetchMetadata {
    /// Metadata for a fetch of `url` happening now.
    pub fn fetched_now(url: impl Into<String>) -> Self {
        Self {
            last_updated: Some(SystemTime::now()),
            url: Some(url.into()),
        }
    }

    /// Load metadata from a file.
    ///
    /// Returns default metadata if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save metadata to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Whether a list fetched at `last_updated` is older than `max_age`.
    ///
    /// Unknown fetch times count as stale.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_updated {
            None => true,
            Some(last) => {
                let elapsed = SystemTime::now().duration_since(last).unwrap_or(Duration::MAX);
                elapsed >= max_age
            }
        }
    }
}
