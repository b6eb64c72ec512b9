//! Deny rule index.
//!
//! [`DenyIndex`] is a fixed-depth trie: one level per octet position, each
//! level keyed by the [`Chunk`] of the rule at that position. Siblings may
//! carry different bit lengths (`10001` next to `11000000`), which is what
//! the partial-overlap query walks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

use crate::codec::{self, Chunk, ChunkKey};
use crate::{Error, Result};

/// `deny <cidr>;` anywhere on a line, lowercase keyword only.
static DENY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bdeny\s+([0-9.]+(?:/[0-9]+)?)\s*;").expect("deny pattern is valid")
});

/// Extract the CIDR text of a `deny` statement, ignoring `#` comments.
pub fn parse_deny_line(line: &str) -> Option<&str> {
    let line = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    DENY_PATTERN
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A trie node. Nodes at depth 4 hold the text of the rule that created them.
#[derive(Debug, Clone, Default)]
pub struct Node {
    children: BTreeMap<Chunk, Node>,
    rule: Option<String>,
}

impl Node {
    /// Child under `chunk`, if any.
    pub fn child(&self, chunk: &Chunk) -> Option<&Node> {
        self.children.get(chunk)
    }

    /// Child keys in ascending chunk order.
    pub fn keys(&self) -> impl Iterator<Item = &Chunk> {
        self.children.keys()
    }

    /// Rule text stored at a leaf.
    pub fn rule(&self) -> Option<&str> {
        self.rule.as_deref()
    }
}

/// Counters reported by the `index_*` methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Lines read
    pub lines: usize,
    /// Deny statements indexed
    pub indexed: usize,
    /// Deny statements skipped because their CIDR did not parse
    pub malformed: usize,
}

/// Index of denied CIDR ranges.
///
/// Built once from rule lines, then queried through the methods in
/// [`crate::query`]. There is no removal; use [`DenyIndex::reset`] to start
/// over.
#[derive(Debug, Clone, Default)]
pub struct DenyIndex {
    root: Node,
    rules: usize,
}

impl DenyIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every indexed rule.
    pub fn reset(&mut self) {
        self.root = Node::default();
        self.rules = 0;
    }

    /// Number of distinct chunk keys indexed.
    pub fn len(&self) -> usize {
        self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules == 0
    }

    /// Index a single CIDR.
    ///
    /// A rule with the same chunk key as an earlier one replaces its text.
    pub fn insert(&mut self, cidr: &str) -> Result<()> {
        let key = codec::chunk_key(cidr)?;
        self.insert_key(key, cidr.trim());
        Ok(())
    }

    fn insert_key(&mut self, key: ChunkKey, rule: &str) {
        let mut node = &mut self.root;
        for chunk in key.chunks() {
            node = node.children.entry(*chunk).or_default();
        }
        if node.rule.replace(rule.to_string()).is_none() {
            self.rules += 1;
        }
    }

    /// Index every `deny <cidr>;` line.
    ///
    /// Lines without a deny statement are ignored. Deny statements whose CIDR
    /// does not parse are skipped and counted in [`IndexStats::malformed`].
    pub fn index_lines<I, S>(&mut self, lines: I) -> IndexStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = IndexStats::default();
        for line in lines {
            self.index_line_lenient(line.as_ref(), &mut stats);
        }
        log_stats(&stats);
        stats
    }

    /// Like [`DenyIndex::index_lines`], but a malformed deny statement fails
    /// with [`Error::MalformedRuleLine`]. Rules before it stay indexed.
    pub fn index_strict<I, S>(&mut self, lines: I) -> Result<IndexStats>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = IndexStats::default();
        for line in lines {
            self.index_line(line.as_ref(), &mut stats)?;
        }
        log_stats(&stats);
        Ok(stats)
    }

    /// Index deny rules read from `reader`, e.g. an nginx include file.
    ///
    /// Bytes that are not valid UTF-8 are replaced before matching, so a
    /// stray Latin-1 comment does not stop indexing.
    pub fn index_reader<R: Read>(&mut self, reader: R, strict: bool) -> Result<IndexStats> {
        let mut reader = BufReader::new(reader);
        let mut stats = IndexStats::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(|c: char| c == '\n' || c == '\r');
            if strict {
                self.index_line(line, &mut stats)?;
            } else {
                self.index_line_lenient(line, &mut stats);
            }
        }
        log_stats(&stats);
        Ok(stats)
    }

    fn index_line_lenient(&mut self, line: &str, stats: &mut IndexStats) {
        if let Err(e) = self.index_line(line, stats) {
            log::debug!("Skipping {}", e);
            stats.malformed += 1;
        }
    }

    fn index_line(&mut self, line: &str, stats: &mut IndexStats) -> Result<()> {
        stats.lines += 1;

        let cidr = match parse_deny_line(line) {
            Some(cidr) => cidr,
            None => return Ok(()),
        };

        let key = codec::chunk_key(cidr).map_err(|_| Error::MalformedRuleLine {
            line: stats.lines,
            text: line.trim().to_string(),
        })?;
        self.insert_key(key, cidr);
        stats.indexed += 1;
        Ok(())
    }

    /// Node reached by following `path` from the root.
    pub fn lookup(&self, path: &[Chunk]) -> Option<&Node> {
        path.iter()
            .try_fold(&self.root, |node, chunk| node.child(chunk))
    }
}

fn log_stats(stats: &IndexStats) {
    log::debug!(
        "Indexed {} deny rules from {} lines ({} malformed)",
        stats.indexed,
        stats.lines,
        stats.malformed
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deny_line() {
        assert_eq!(parse_deny_line("deny 10.0.0.0/8;"), Some("10.0.0.0/8"));
        assert_eq!(parse_deny_line("  deny   1.2.3.4 ;  "), Some("1.2.3.4"));
        assert_eq!(
            parse_deny_line("location / { deny 66.249.64.0/19; }"),
            Some("66.249.64.0/19")
        );
        assert_eq!(parse_deny_line("deny 300.1.1.1/8;"), Some("300.1.1.1/8"));
    }

    #[test]
    fn test_parse_deny_line_ignores_other_lines() {
        for line in [
            "",
            "allow 10.0.0.0/8;",
            "deny all;",
            "deny 10.0.0.0/8",
            "DENY 10.0.0.0/8;",
            "# deny 10.0.0.0/8;",
            "allow all; # deny 10.0.0.0/8;",
            "nodeny 10.0.0.0/8;",
        ] {
            assert_eq!(parse_deny_line(line), None, "{:?}", line);
        }
    }

    #[test]
    fn test_index_builds_four_levels() {
        let mut index = DenyIndex::new();
        let stats = index.index_lines(["deny 208.81.136.0/21;"]);
        assert_eq!(stats.indexed, 1);
        assert_eq!(index.len(), 1);

        let key = codec::chunk_key("208.81.136.0/21").unwrap();
        let leaf = index.lookup(key.chunks()).unwrap();
        assert_eq!(leaf.rule(), Some("208.81.136.0/21"));

        let level2 = index.lookup(&key.chunks()[..2]).unwrap();
        assert_eq!(level2.rule(), None);
        assert_eq!(level2.keys().collect::<Vec<_>>(), vec![&key.get(2)]);
    }

    #[test]
    fn test_index_shares_common_prefixes() {
        let mut index = DenyIndex::new();
        index.index_lines([
            "deny 208.81.136.0/21;",
            "deny 208.81.192.0/24;",
            "deny 208.82.0.0/16;",
        ]);
        assert_eq!(index.len(), 3);

        let first = index.lookup(&[Chunk::Full(208)]).unwrap();
        assert_eq!(first.keys().count(), 2);
        let second = index.lookup(&[Chunk::Full(208), Chunk::Full(81)]).unwrap();
        let lens: Vec<u8> = second.keys().map(Chunk::len).collect();
        assert_eq!(lens, vec![8, 5]);
    }

    #[test]
    fn test_index_skips_unrelated_and_malformed_lines() {
        let mut index = DenyIndex::new();
        let stats = index.index_lines(vec![
            "# blocked crawlers".to_string(),
            "allow 127.0.0.1;".to_string(),
            "deny 300.1.1.1/8;".to_string(),
            "deny 1.2.3.4/40;".to_string(),
            "deny 10.0.0.0/8;".to_string(),
        ]);
        assert_eq!(
            stats,
            IndexStats {
                lines: 5,
                indexed: 1,
                malformed: 2
            }
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_index_strict_reports_line() {
        let mut index = DenyIndex::new();
        let err = index
            .index_strict(["deny 10.0.0.0/8;", "", "deny 10.0.0.256/32;"])
            .unwrap_err();
        match err {
            Error::MalformedRuleLine { line, text } => {
                assert_eq!(line, 3);
                assert_eq!(text, "deny 10.0.0.256/32;");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_index_reader() {
        let text = "deny 10.0.0.0/8;\n# comment\ndeny 192.168.0.0/16;\n";
        let mut index = DenyIndex::new();
        let stats = index.index_reader(text.as_bytes(), false).unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.indexed, 2);
    }

    #[test]
    fn test_index_reader_tolerates_invalid_utf8() {
        let text = b"deny 10.0.0.0/8;\r\n# bloqu\xE9\ndeny 192.168.0.0/16; # caf\xE9\n";

        let mut index = DenyIndex::new();
        let stats = index.index_reader(&text[..], false).unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.indexed, 2);
        assert_eq!(index.len(), 2);

        let mut index = DenyIndex::new();
        let stats = index.index_reader(&text[..], true).unwrap();
        assert_eq!(stats.indexed, 2);
        let key = codec::chunk_key("10.0.0.0/8").unwrap();
        assert_eq!(index.lookup(key.chunks()).and_then(Node::rule), Some("10.0.0.0/8"));
    }

    #[test]
    fn test_duplicate_key_overwrites_text() {
        let mut index = DenyIndex::new();
        index.index_lines(["deny 192.168.200.5/30;", "deny 192.168.200.6/30;"]);
        assert_eq!(index.len(), 1);

        let key = codec::chunk_key("192.168.200.4/30").unwrap();
        assert_eq!(
            index.lookup(key.chunks()).and_then(Node::rule),
            Some("192.168.200.6/30")
        );
    }

    #[test]
    fn test_insert_and_reset() {
        let mut index = DenyIndex::new();
        index.insert("10.0.0.0/8").unwrap();
        assert!(index.insert("10.0.0/8").is_err());
        assert!(!index.is_empty());

        index.reset();
        assert!(index.is_empty());
        assert!(index.lookup(&[Chunk::Full(10)]).is_none());
    }

    #[test]
    fn test_lookup_empty_path_is_root() {
        let index = DenyIndex::new();
        let root = index.lookup(&[]).unwrap();
        assert_eq!(root.keys().count(), 0);
    }
}
