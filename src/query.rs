//! Containment queries against a [`DenyIndex`].
//!
//! Three predicates, from cheapest to most involved:
//!
//! - [`DenyIndex::blocked_exactly`]: an identical rule exists.
//! - [`DenyIndex::blocked_in_superset`]: a broader, byte-aligned rule
//!   contains the query.
//! - [`DenyIndex::partially_blocked`]: a rule overlaps the query inside an
//!   octet, at a bit offset the byte-aligned checks cannot see.
//!
//! [`DenyIndex::check`] runs them in that order and reports the first hit.

use std::fmt;

use crate::codec::{ChunkKey, ToChunkKey, OCTETS};
use crate::index::{DenyIndex, Node};
use crate::Result;

/// Outcome of [`DenyIndex::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An identical rule; holds its text
    Exact(String),
    /// A broader byte-aligned rule; holds its text
    Superset(String),
    /// A representative overlapping range rebuilt from the index
    Partial(String),
    /// Nothing in the index covers the query
    Clear,
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, Verdict::Clear)
    }

    /// The rule (or representative range) behind the verdict.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Verdict::Exact(rule) | Verdict::Superset(rule) | Verdict::Partial(rule) => Some(rule),
            Verdict::Clear => None,
        }
    }
}

/// A verdict for one labelled CIDR, rendered as a report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Where the CIDR came from, e.g. `argument` or `googlebot.json`
    pub label: String,
    pub cidr: String,
    pub verdict: Verdict,
}

impl Finding {
    pub fn new(label: impl Into<String>, cidr: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            label: label.into(),
            cidr: cidr.into(),
            verdict,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Finding { label, cidr, .. } = self;
        match &self.verdict {
            Verdict::Exact(rule) => {
                write!(f, "{} CIDR {} blocked by deny rule for {}", label, cidr, rule)
            }
            Verdict::Superset(rule) => write!(
                f,
                "{} CIDR {} blocked by superset deny rules for {}",
                label, cidr, rule
            ),
            Verdict::Partial(rule) => write!(
                f,
                "{} CIDR {} partially blocked by deny rules such as {}",
                label, cidr, rule
            ),
            Verdict::Clear => write!(f, "{} CIDR {} not blocked", label, cidr),
        }
    }
}

impl DenyIndex {
    /// Text of the rule whose chunk key equals the query's.
    pub fn blocked_exactly<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Option<&str>> {
        let key = cidr.to_chunk_key()?;
        Ok(self.exact(&key))
    }

    fn exact(&self, key: &ChunkKey) -> Option<&str> {
        self.lookup(key.chunks()).and_then(Node::rule)
    }

    /// Text of a byte-aligned rule that contains the query.
    ///
    /// Wildcards the last one, two, then three octets of the query and
    /// returns the first rule found. Neither the unmodified key nor a
    /// whole-address-space `/0` rule is considered here.
    pub fn blocked_in_superset<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Option<&str>> {
        let key = cidr.to_chunk_key()?;
        Ok(self.superset(&key))
    }

    fn superset(&self, key: &ChunkKey) -> Option<&str> {
        (1..OCTETS)
            .rev()
            .find_map(|kept| self.exact(&key.truncated(kept)))
    }

    /// A range rebuilt from the index that overlaps the query below byte
    /// granularity.
    ///
    /// Scans octet positions 3, 2, 1, 0. At each position the node reached
    /// by the query's leading octets is inspected:
    ///
    /// - if the query has no bits at this position, any child of the node
    ///   overlaps, and the smallest child in chunk order is reported;
    /// - otherwise a child whose bits strictly extend the query's bits at
    ///   this position is a rule nested inside the query, and is reported.
    ///
    /// The result is the query's leading octets plus the matched child, with
    /// wildcards after it. Position 0 inspects the root, so rules whose first
    /// octet is itself partial are found too.
    pub fn partially_blocked<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Option<String>> {
        let key = cidr.to_chunk_key()?;
        self.partial(&key)
    }

    fn partial(&self, key: &ChunkKey) -> Result<Option<String>> {
        for position in (0..OCTETS).rev() {
            let node = match self.lookup(&key.chunks()[..position]) {
                Some(node) => node,
                None => continue,
            };

            let element = key.get(position);
            let mut keys = node.keys();
            let matched = if element.is_wildcard() {
                keys.next()
            } else {
                keys.find(|child| element.is_proper_prefix_of(child))
            };

            if let Some(child) = matched {
                let mut chunks = *key.truncated(position).chunks();
                chunks[position] = *child;
                return Ok(Some(ChunkKey::new(chunks)?.to_cidr()));
            }
        }
        Ok(None)
    }

    /// Run the exact, superset and partial checks in order.
    pub fn check<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Verdict> {
        let key = cidr.to_chunk_key()?;

        if let Some(rule) = self.exact(&key) {
            return Ok(Verdict::Exact(rule.to_string()));
        }
        if let Some(rule) = self.superset(&key) {
            return Ok(Verdict::Superset(rule.to_string()));
        }
        Ok(match self.partial(&key)? {
            Some(range) => Verdict::Partial(range),
            None => Verdict::Clear,
        })
    }
}
