//! Conversion between dotted-decimal CIDR text and chunked bit prefixes.
//!
//! A CIDR such as `208.81.136.0/21` is first reduced to its bit prefix (the
//! leading 21 bits of the address), then sliced into four octet-sized
//! [`Chunk`]s: `[Full(208), Full(81), Partial{len: 5, ..}, Wildcard]`. The
//! four chunks form a [`ChunkKey`], which is what the deny index is keyed by.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of octets in an IPv4 address, and the depth of a chunk key.
pub const OCTETS: usize = 4;

/// Maximum IPv4 prefix length.
pub const MAX_PREFIX_LEN: u8 = 32;

/// Mask selecting the leading `len` bits of a 32-bit address.
fn prefix_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (MAX_PREFIX_LEN - len)
    }
}

/// Mask selecting the leading `len` bits of an octet.
fn octet_mask(len: u8) -> u8 {
    if len == 0 {
        0
    } else {
        u8::MAX << (8 - len)
    }
}

/// Parse a decimal field made only of ASCII digits.
fn parse_decimal(field: &str) -> Option<u8> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// The leading `len` bits of an IPv4 address.
///
/// Bits past `len` are always zero, so two CIDRs that agree within their
/// declared prefix produce equal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    bits: u32,
    len: u8,
}

impl Prefix {
    /// Build a prefix from an address and a prefix length.
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self> {
        if len > MAX_PREFIX_LEN {
            return Err(Error::MalformedCidr(format!("{}/{}", addr, len)));
        }
        Ok(Self {
            bits: u32::from(addr) & prefix_mask(len),
            len,
        })
    }

    /// Number of specified bits (0-32).
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether no bits are specified (`/0`).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The prefix bits, left-aligned in a `u32`.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The network address of this prefix.
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.bits)
    }

    /// The chunk covering octet position `index` (0-3).
    pub fn chunk(&self, index: usize) -> Chunk {
        if index >= OCTETS {
            return Chunk::Wildcard;
        }
        let start = (index * 8) as u8;
        if self.len <= start {
            return Chunk::Wildcard;
        }
        let octet = self.network().octets()[index];
        Chunk::from_octet(octet, (self.len - start).min(8))
    }

    /// Slice this prefix into its four-chunk key.
    pub fn chunk_key(&self) -> ChunkKey {
        ChunkKey([self.chunk(0), self.chunk(1), self.chunk(2), self.chunk(3)])
    }

    /// Render as a string of `0`/`1` characters, `len` long.
    pub fn to_bit_string(&self) -> String {
        (0..self.len)
            .map(|i| {
                if self.bits & (1 << (31 - i)) != 0 {
                    '1'
                } else {
                    '0'
                }
            })
            .collect()
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        encode(s)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

/// One octet position of a chunk key.
///
/// Partial bits are stored left-aligned with the unspecified trailing bits
/// zeroed, so `Partial { len: 5, bits: 0b1000_1000 }` is the chunk `10001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chunk {
    /// All eight bits specified
    Full(u8),
    /// 1-7 leading bits specified
    Partial { len: u8, bits: u8 },
    /// No bits specified
    Wildcard,
}

impl Chunk {
    /// Build a chunk from the leading `len` bits of `octet`.
    ///
    /// `len` is clamped to 8; a zero length yields [`Chunk::Wildcard`].
    pub fn from_octet(octet: u8, len: u8) -> Self {
        match len.min(8) {
            0 => Chunk::Wildcard,
            8 => Chunk::Full(octet),
            len => Chunk::Partial {
                len,
                bits: octet & octet_mask(len),
            },
        }
    }

    /// Parse a bit string such as `"10001"`. `"*"` and `""` are wildcards.
    pub fn parse_bits(s: &str) -> Result<Self> {
        if s == "*" || s.is_empty() {
            return Ok(Chunk::Wildcard);
        }
        if s.len() > 8 {
            return Err(Error::MalformedChunk(s.to_string()));
        }
        let mut octet = 0u8;
        for (i, c) in s.chars().enumerate() {
            match c {
                '0' => {}
                '1' => octet |= 1 << (7 - i),
                _ => return Err(Error::MalformedChunk(s.to_string())),
            }
        }
        Ok(Self::from_octet(octet, s.len() as u8))
    }

    /// Number of specified bits (0-8).
    pub fn len(&self) -> u8 {
        match self {
            Chunk::Full(_) => 8,
            Chunk::Partial { len, .. } => *len,
            Chunk::Wildcard => 0,
        }
    }

    /// The octet value with unspecified bits padded with zeros.
    pub fn octet(&self) -> u8 {
        match self {
            Chunk::Full(octet) => *octet,
            Chunk::Partial { bits, .. } => *bits,
            Chunk::Wildcard => 0,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Chunk::Wildcard)
    }

    /// Whether `other` starts with all of this chunk's bits.
    ///
    /// Wildcards specify no bits and are never a prefix of anything.
    pub fn is_prefix_of(&self, other: &Chunk) -> bool {
        if self.is_wildcard() || other.is_wildcard() || self.len() > other.len() {
            return false;
        }
        other.octet() & octet_mask(self.len()) == self.octet()
    }

    /// Like [`Chunk::is_prefix_of`], but `other` must carry more bits.
    pub fn is_proper_prefix_of(&self, other: &Chunk) -> bool {
        self.len() < other.len() && self.is_prefix_of(other)
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            return f.write_str("*");
        }
        let octet = self.octet();
        for i in 0..self.len().min(8) {
            f.write_str(if octet & (1 << (7 - i)) != 0 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Four chunks forming one contiguous prefix.
///
/// Always holds zero or more [`Chunk::Full`], then at most one
/// [`Chunk::Partial`], then only [`Chunk::Wildcard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey([Chunk; OCTETS]);

impl ChunkKey {
    /// Validate four chunks as a contiguous prefix.
    ///
    /// A [`Chunk::Partial`] must carry 1-7 bits with nothing set past them.
    pub fn new(chunks: [Chunk; OCTETS]) -> Result<Self> {
        for chunk in &chunks {
            if let Chunk::Partial { len, bits } = *chunk {
                if !(1..8).contains(&len) || bits & !octet_mask(len) != 0 {
                    return Err(Error::MalformedChunk(format!("{:?}", chunk)));
                }
            }
        }

        let mut ended = false;
        for chunk in &chunks {
            if ended && !chunk.is_wildcard() {
                return Err(Error::InconsistentChunks(display_chunks(&chunks)));
            }
            if !matches!(chunk, Chunk::Full(_)) {
                ended = true;
            }
        }
        Ok(Self(chunks))
    }

    /// Build a key from up to four chunks; missing trailing chunks are wildcards.
    pub fn from_chunks(chunks: &[Chunk]) -> Result<Self> {
        if chunks.len() > OCTETS {
            return Err(Error::InconsistentChunks(display_chunks(chunks)));
        }
        let mut padded = [Chunk::Wildcard; OCTETS];
        padded[..chunks.len()].copy_from_slice(chunks);
        Self::new(padded)
    }

    /// Build a key from up to four raw bit strings such as `["11010000", "0101"]`.
    pub fn from_bit_strings<S: AsRef<str>>(chunks: &[S]) -> Result<Self> {
        let chunks = chunks
            .iter()
            .map(|s| Chunk::parse_bits(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::from_chunks(&chunks)
    }

    pub fn chunks(&self) -> &[Chunk; OCTETS] {
        &self.0
    }

    /// The chunk at octet position `index` (0-3).
    pub fn get(&self, index: usize) -> Chunk {
        self.0[index]
    }

    /// Total number of specified bits.
    pub fn prefix_len(&self) -> u8 {
        self.0.iter().map(Chunk::len).sum()
    }

    /// Copy of this key with every position from `index` on set to wildcard.
    pub fn truncated(&self, index: usize) -> Self {
        let mut chunks = self.0;
        for chunk in chunks.iter_mut().skip(index) {
            *chunk = Chunk::Wildcard;
        }
        Self(chunks)
    }

    /// The prefix these chunks describe.
    pub fn prefix(&self) -> Prefix {
        let octets = self.0.map(|c| c.octet());
        Prefix {
            bits: u32::from(Ipv4Addr::from(octets)),
            len: self.prefix_len(),
        }
    }

    /// Render as CIDR text; the `/n` suffix is omitted for a full 32-bit key.
    pub fn to_cidr(&self) -> String {
        let prefix = self.prefix();
        if prefix.len() == MAX_PREFIX_LEN {
            prefix.network().to_string()
        } else {
            format!("{}/{}", prefix.network(), prefix.len())
        }
    }
}

impl FromStr for ChunkKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        chunk_key(s)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cidr())
    }
}

fn display_chunks(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse `a.b.c.d[/n]` into its bit prefix.
///
/// The prefix length defaults to 32 when omitted.
pub fn encode(cidr: &str) -> Result<Prefix> {
    let cidr = cidr.trim();
    let malformed = || Error::MalformedCidr(cidr.to_string());

    let (base, len) = match cidr.split_once('/') {
        Some((base, len)) => (base, parse_decimal(len).ok_or_else(malformed)?),
        None => (cidr, MAX_PREFIX_LEN),
    };
    if len > MAX_PREFIX_LEN {
        return Err(malformed());
    }

    let fields: Vec<&str> = base.split('.').collect();
    if fields.len() != OCTETS {
        return Err(malformed());
    }
    let mut octets = [0u8; OCTETS];
    for (octet, field) in octets.iter_mut().zip(&fields) {
        *octet = parse_decimal(field).ok_or_else(malformed)?;
    }

    Prefix::new(Ipv4Addr::from(octets), len)
}

/// Render up to four chunks back into CIDR text.
///
/// Chunks that do not form one contiguous prefix are rejected.
pub fn decode(chunks: &[Chunk]) -> Result<String> {
    Ok(ChunkKey::from_chunks(chunks)?.to_cidr())
}

/// Parse CIDR text straight into its chunk key.
pub fn chunk_key(cidr: &str) -> Result<ChunkKey> {
    Ok(encode(cidr)?.chunk_key())
}

/// Query input that can be normalized into a [`ChunkKey`].
pub trait ToChunkKey {
    fn to_chunk_key(&self) -> Result<ChunkKey>;
}

impl ToChunkKey for str {
    fn to_chunk_key(&self) -> Result<ChunkKey> {
        chunk_key(self)
    }
}

impl ToChunkKey for String {
    fn to_chunk_key(&self) -> Result<ChunkKey> {
        chunk_key(self)
    }
}

impl ToChunkKey for Prefix {
    fn to_chunk_key(&self) -> Result<ChunkKey> {
        Ok(self.chunk_key())
    }
}

impl ToChunkKey for ChunkKey {
    fn to_chunk_key(&self) -> Result<ChunkKey> {
        Ok(*self)
    }
}

impl<T: ToChunkKey + ?Sized> ToChunkKey for &T {
    fn to_chunk_key(&self) -> Result<ChunkKey> {
        (**self).to_chunk_key()
    }
}
