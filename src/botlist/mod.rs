//! Published crawler IP lists.
//!
//! Each [`Bot`] publishes one or more lists. Lists are downloaded once into
//! a cache directory by [`BotListCache`] and parsed into a
//! [`PrefixDocument`], whose IPv4 prefixes are then checked against a
//! [`crate::DenyIndex`].

mod cache;
mod format;

pub use cache::BotListCache;
pub use format::{PrefixDocument, PrefixEntry};

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// How a list is published upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    /// `{"prefixes": [{"ipv4Prefix": ...}]}` JSON
    PrefixJson,
    /// Markdown bullet list of addresses, converted to prefix JSON on download
    Markdown,
}

/// One published list and the file it is cached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    /// Cache file name; also the label used when reporting
    pub file: &'static str,
    pub url: &'static str,
    pub format: ListFormat,
}

const GOOGLE_SOURCES: &[Source] = &[
    Source {
        file: "googlebot.json",
        url: "https://developers.google.com/static/search/apis/ipranges/googlebot.json",
        format: ListFormat::PrefixJson,
    },
    Source {
        file: "special-crawlers.json",
        url: "https://developers.google.com/static/search/apis/ipranges/special-crawlers.json",
        format: ListFormat::PrefixJson,
    },
    Source {
        file: "user-triggered-fetchers.json",
        url: "https://developers.google.com/static/search/apis/ipranges/user-triggered-fetchers.json",
        format: ListFormat::PrefixJson,
    },
    Source {
        file: "user-triggered-fetchers-google.json",
        url: "https://developers.google.com/static/search/apis/ipranges/user-triggered-fetchers-google.json",
        format: ListFormat::PrefixJson,
    },
    Source {
        file: "goog.json",
        url: "https://www.gstatic.com/ipranges/goog.json",
        format: ListFormat::PrefixJson,
    },
];

const BING_SOURCES: &[Source] = &[Source {
    file: "bingbot.json",
    url: "https://www.bing.com/toolbox/bingbot.json",
    format: ListFormat::PrefixJson,
}];

// DuckDuckGo publishes no JSON list, only a help page
const DUCKDUCKGO_SOURCES: &[Source] = &[Source {
    file: "ddg.json",
    url: "https://raw.githubusercontent.com/duckduckgo/duckduckgo-help-pages/master/_docs/results/duckduckbot.md",
    format: ListFormat::Markdown,
}];

/// A crawler whose published IP ranges can be audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bot {
    Google,
    Bing,
    DuckDuckGo,
}

impl Bot {
    /// Parse the command-line keyword (`google`, `bing`, `ddg`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "google" => Some(Bot::Google),
            "bing" => Some(Bot::Bing),
            "ddg" => Some(Bot::DuckDuckGo),
            _ => None,
        }
    }

    /// The command-line keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bot::Google => "google",
            Bot::Bing => "bing",
            Bot::DuckDuckGo => "ddg",
        }
    }

    /// Lists published for this bot.
    pub fn sources(&self) -> &'static [Source] {
        match self {
            Bot::Google => GOOGLE_SOURCES,
            Bot::Bing => BING_SOURCES,
            Bot::DuckDuckGo => DUCKDUCKGO_SOURCES,
        }
    }
}

impl fmt::Display for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bot::parse(s).ok_or_else(|| Error::UnknownBot(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_keywords() {
        for bot in [Bot::Google, Bot::Bing, Bot::DuckDuckGo] {
            assert_eq!(Bot::parse(bot.as_str()), Some(bot));
            assert_eq!(bot.to_string().parse::<Bot>().unwrap(), bot);
        }
        assert!(matches!("yahoo".parse::<Bot>(), Err(Error::UnknownBot(s)) if s == "yahoo"));
        assert_eq!(Bot::parse("Google"), None);
        assert_eq!(Bot::parse("-"), None);
        assert_eq!(Bot::parse("66.249.66.1"), None);
    }

    #[test]
    fn test_bot_sources() {
        let google: Vec<&str> = Bot::Google.sources().iter().map(|s| s.file).collect();
        assert_eq!(
            google,
            vec![
                "googlebot.json",
                "special-crawlers.json",
                "user-triggered-fetchers.json",
                "user-triggered-fetchers-google.json",
                "goog.json",
            ]
        );
        assert_eq!(Bot::Bing.sources()[0].file, "bingbot.json");
        assert_eq!(Bot::DuckDuckGo.sources()[0].format, ListFormat::Markdown);
        for source in Bot::Google.sources() {
            assert!(source.url.ends_with(source.file));
        }
    }
}
