//! Download-once cache for bot lists.

use once_cell::sync::OnceCell;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::{ListFormat, PrefixDocument, Source};
use crate::config::FetchConfig;
use crate::metadata::FetchMetadata;
use crate::{Error, Result};

/// Keeps bot lists in a local directory and downloads missing or stale ones.
///
/// A list is stale only when [`FetchConfig::max_age`] is set and its
/// `.meta` sidecar says it was fetched longer ago than that. Without a max
/// age, an existing file is always used as is.
///
/// # Example
///
/// ```ignore
/// use denyblock::botlist::{Bot, BotListCache};
/// use denyblock::FetchConfig;
///
/// let cache = BotListCache::new(FetchConfig::new("/tmp/denyblock"))?;
/// for source in Bot::Bing.sources() {
///     let doc = cache.load(source)?;
///     println!("{}: {} prefixes", source.file, doc.ipv4_prefixes().count());
/// }
/// ```
pub struct BotListCache {
    config: FetchConfig,
    /// Built on first download
    client: OnceCell<reqwest::blocking::Client>,
}

impl BotListCache {
    pub fn new(config: FetchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Path of the cached copy of `source`.
    pub fn path(&self, source: &Source) -> PathBuf {
        self.config.cache_dir.join(source.file)
    }

    fn meta_path(&self, source: &Source) -> PathBuf {
        self.config.cache_dir.join(format!("{}.meta", source.file))
    }

    fn temp_path(&self, source: &Source) -> PathBuf {
        self.config.cache_dir.join(format!("{}.tmp", source.file))
    }

    /// Whether the cached copy of `source` can be used without downloading.
    pub fn is_fresh(&self, source: &Source) -> bool {
        if !self.path(source).exists() {
            return false;
        }
        match self.config.max_age {
            None => true,
            Some(max_age) => match FetchMetadata::load(self.meta_path(source)) {
                Ok(meta) => !meta.is_stale(max_age),
                Err(e) => {
                    log::warn!("Unreadable metadata for {}, refetching: {}", source.file, e);
                    false
                }
            },
        }
    }

    /// Make sure a usable copy of `source` is cached and return its path.
    pub fn ensure(&self, source: &Source) -> Result<PathBuf> {
        let path = self.path(source);
        if self.is_fresh(source) {
            log::debug!("Using cached {:?}", path);
            return Ok(path);
        }
        self.download(source)?;
        Ok(path)
    }

    /// Load the prefix document for `source`, downloading it if needed.
    pub fn load(&self, source: &Source) -> Result<PrefixDocument> {
        let path = self.ensure(source)?;
        PrefixDocument::from_json(&fs::read_to_string(path)?)
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        self.client.get_or_try_init(|| {
            Ok(reqwest::blocking::Client::builder()
                .timeout(self.config.timeout)
                .user_agent(self.config.user_agent.as_str())
                .build()?)
        })
    }

    /// Fetch `source`, store it as prefix JSON and record the fetch time.
    fn download(&self, source: &Source) -> Result<()> {
        fs::create_dir_all(&self.config.cache_dir)?;

        log::info!("Downloading {}", source.url);
        let response = self.client()?.get(source.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                url: source.url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text()?;

        let json = match source.format {
            ListFormat::PrefixJson => {
                // Refuse to cache anything that would fail to load later
                PrefixDocument::from_json(&body)?;
                body
            }
            ListFormat::Markdown => PrefixDocument::from_markdown(&body).to_json()?,
        };

        let temp_path = self.temp_path(source);
        let mut temp_file = fs::File::create(&temp_path)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.sync_all()?;
        drop(temp_file);

        // Atomic rename
        fs::rename(&temp_path, self.path(source))?;
        FetchMetadata::fetched_now(source.url).save(self.meta_path(source))?;

        log::info!("Saved {} ({} bytes)", source.file, json.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::botlist::Bot;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    const BINGBOT: &str = r#"{"creationTime":"2024-01-01","prefixes":[{"ipv4Prefix":"157.55.39.0/24"}]}"#;

    fn bing() -> &'static Source {
        &Bot::Bing.sources()[0]
    }

    fn cache_in(dir: &Path, max_age: Option<Duration>) -> BotListCache {
        BotListCache::new(FetchConfig::new(dir).with_max_age(max_age)).unwrap()
    }

    #[test]
    fn test_cache_paths() {
        let cache = cache_in(Path::new("/cache/denyblock"), None);
        assert_eq!(cache.path(bing()), PathBuf::from("/cache/denyblock/bingbot.json"));
        assert_eq!(
            cache.meta_path(bing()),
            PathBuf::from("/cache/denyblock/bingbot.json.meta")
        );
        assert_eq!(
            cache.temp_path(bing()),
            PathBuf::from("/cache/denyblock/bingbot.json.tmp")
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = FetchConfig::default().with_timeout(Duration::ZERO);
        assert!(BotListCache::new(config).is_err());
    }

    #[test]
    fn test_missing_file_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path(), None);
        assert!(!cache.is_fresh(bing()));
    }

    #[test]
    fn test_load_from_cache_without_max_age() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bingbot.json"), BINGBOT).unwrap();

        let cache = cache_in(dir.path(), None);
        assert!(cache.is_fresh(bing()));
        let doc = cache.load(bing()).unwrap();
        assert_eq!(doc.ipv4_prefixes().collect::<Vec<_>>(), vec!["157.55.39.0/24"]);
    }

    #[test]
    fn test_max_age_uses_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bingbot.json"), BINGBOT).unwrap();
        let cache = cache_in(dir.path(), Some(Duration::from_secs(3600)));

        // No metadata: fetch time unknown
        assert!(!cache.is_fresh(bing()));

        FetchMetadata::fetched_now(bing().url)
            .save(cache.meta_path(bing()))
            .unwrap();
        assert!(cache.is_fresh(bing()));

        let old = FetchMetadata {
            last_updated: Some(SystemTime::now() - Duration::from_secs(7200)),
            url: None,
        };
        old.save(cache.meta_path(bing())).unwrap();
        assert!(!cache.is_fresh(bing()));
    }

    #[test]
    fn test_corrupt_cached_list() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bingbot.json"), "<html>").unwrap();
        let cache = cache_in(dir.path(), None);
        assert!(matches!(cache.load(bing()), Err(Error::Json(_))));
    }
}
