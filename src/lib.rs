//! denyblock - audit nginx `deny` rules against published crawler ranges.
//!
//! This crate answers one question for an IPv4 CIDR: is it already covered
//! by an existing set of `deny <cidr>;` rules, and how?
//!
//! # Features
//!
//! - **Exact match**: an identical rule is already present
//! - **Superset match**: a broader, byte-aligned rule contains the range
//! - **Partial overlap**: a rule overlaps inside an octet at a different bit
//!   offset, which byte-aligned checks miss
//! - **Bot lists**: download and cache Google, Bing and DuckDuckGo crawler
//!   ranges to audit in bulk
//!
//! # Quick Start
//!
//! ```
//! use denyblock::{DenyIndex, Verdict};
//!
//! let mut index = DenyIndex::new();
//! index.index_lines(["deny 66.249.0.0/16;", "deny 208.81.136.0/21;"]);
//!
//! assert_eq!(
//!     index.blocked_in_superset("66.249.66.0/24")?,
//!     Some("66.249.0.0/16")
//! );
//! assert_eq!(
//!     index.check("208.81.0.0/16")?,
//!     Verdict::Partial("208.81.136.0/21".to_string())
//! );
//! # Ok::<(), denyblock::Error>(())
//! ```
//!
//! # How ranges are indexed
//!
//! A CIDR's bit prefix is cut into four octet-sized chunks. Chunks inside the
//! prefix hold all eight bits, the chunk where the prefix ends holds 1-7
//! bits, and the rest are wildcards. [`DenyIndex`] is a four-level trie over
//! those chunks; see [`codec`] for the encoding.
//!
//! IPv6 is not supported.

mod config;
mod error;
mod metadata;

pub mod botlist;
pub mod codec;
pub mod index;
pub mod query;
pub mod shared;

// Re-export core types
pub use codec::{chunk_key, decode, encode, Chunk, ChunkKey, Prefix, ToChunkKey};
pub use error::{Error, Result};
pub use index::{DenyIndex, IndexStats};
pub use query::{Finding, Verdict};
pub use shared::SharedDenyIndex;

// Re-export bot-list support
pub use botlist::{Bot, BotListCache, PrefixDocument};
pub use config::{FetchConfig, DEFAULT_TIMEOUT};
pub use metadata::FetchMetadata;
