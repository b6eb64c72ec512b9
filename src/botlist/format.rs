//! Bot-list document formats.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Markdown bullet holding an IPv4 address, e.g. `- 20.191.45.212`.
static MARKDOWN_IP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-\s+(\d{1,3}(?:\.\d{1,3}){3})\b").expect("markdown IP pattern is valid")
});

/// A published list of crawler prefixes.
///
/// Google and Bing publish this shape directly; DuckDuckGo's Markdown page
/// is converted into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub prefixes: Vec<PrefixEntry>,
}

/// One entry of [`PrefixDocument::prefixes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_prefix: Option<String>,
}

impl PrefixDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Collect `- a.b.c.d` bullets from a Markdown page.
    pub fn from_markdown(markdown: &str) -> Self {
        let prefixes = markdown
            .lines()
            .filter_map(|line| MARKDOWN_IP.captures(line.trim()))
            .filter_map(|caps| caps.get(1))
            .map(|m| PrefixEntry {
                ipv4_prefix: Some(m.as_str().to_string()),
                ipv6_prefix: None,
            })
            .collect();
        Self {
            creation_time: None,
            prefixes,
        }
    }

    /// IPv4 prefixes in document order; IPv6 entries are skipped.
    pub fn ipv4_prefixes(&self) -> impl Iterator<Item = &str> {
        self.prefixes
            .iter()
            .filter_map(|entry| entry.ipv4_prefix.as_deref())
    }
}
