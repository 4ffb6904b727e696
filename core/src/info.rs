//! # Information Tables
//!
//! Self-describing hardware tables produced by the platform: a fixed header
//! followed by fixed-size, type-tagged records. The record list ends at the
//! first record whose tag is [`SENTINEL_TAG`].
//!
//! Tables are decoded once into an [`InfoTable`] and are read-only from then
//! on. Lookups are linear scans in table order; the first match wins.

use alloc::vec::Vec;

/// Tag value that terminates a record sequence
pub const SENTINEL_TAG: u32 = 0xFF;

/// Result type for table operations
pub type InfoResult<T> = Result<T, InfoError>;

/// Table decoding and lifecycle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoError {
    /// No table bytes were supplied
    NullInput,
    /// The buffer ends inside the header or a record
    Truncated {
        /// Bytes required to continue decoding
        needed: usize,
        /// Bytes actually available
        available: usize,
    },
    /// The buffer ends before a sentinel record
    MissingSentinel,
    /// A required record kind is absent
    MissingRequired(&'static str),
    /// The registry already owns a table
    AlreadyCreated,
    /// The registry has no table
    NotCreated,
}

impl core::fmt::Display for InfoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NullInput => f.write_str("no table supplied"),
            Self::Truncated { needed, available } => {
                write!(f, "table truncated: need {} bytes, have {}", needed, available)
            }
            Self::MissingSentinel => f.write_str("table not terminated"),
            Self::MissingRequired(what) => write!(f, "required entry missing: {}", what),
            Self::AlreadyCreated => f.write_str("table already created"),
            Self::NotCreated => f.write_str("table not created"),
        }
    }
}

/// Fixed-layout table header
pub trait TableHeader: Copy {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;

    /// Append the encoding to `out`
    fn encode(&self, out: &mut Vec<u8>);
}

/// Fixed-layout, type-tagged table record
pub trait TableRecord: Copy {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn decode(bytes: &[u8]) -> Self;

    /// Append the encoding to `out`
    fn encode(&self, out: &mut Vec<u8>);

    /// Raw type tag
    fn tag(&self) -> u32;

    /// The terminating record
    fn sentinel() -> Self;
}

/// A decoded information table
#[derive(Debug, Clone)]
pub struct InfoTable<H, R> {
    header: H,
    records: Vec<R>,
}

impl<H: TableHeader, R: TableRecord> InfoTable<H, R> {
    /// Decode a table from its platform layout
    ///
    /// Decoding stops at the first sentinel; anything after it is ignored.
    pub fn from_bytes(bytes: &[u8]) -> InfoResult<Self> {
        if bytes.is_empty() {
            return Err(InfoError::NullInput);
        }
        if bytes.len() < H::SIZE {
            return Err(InfoError::Truncated { needed: H::SIZE, available: bytes.len() });
        }

        let header = H::decode(&bytes[..H::SIZE]);
        let mut records = Vec::new();
        let mut offset = H::SIZE;

        loop {
            let remaining = bytes.len() - offset;
            if remaining == 0 {
                return Err(InfoError::MissingSentinel);
            }
            // The tag alone is enough to recognize the terminator
            if remaining >= 4 && read_u32(bytes, offset) == SENTINEL_TAG {
                break;
            }
            if remaining < R::SIZE {
                return Err(InfoError::Truncated { needed: R::SIZE, available: remaining });
            }
            records.push(R::decode(&bytes[offset..offset + R::SIZE]));
            offset += R::SIZE;
        }

        Ok(Self { header, records })
    }

    /// Encode into the platform layout, sentinel included
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(H::SIZE + (self.records.len() + 1) * R::SIZE);
        self.header.encode(&mut out);
        for record in &self.records {
            record.encode(&mut out);
        }
        R::sentinel().encode(&mut out);
        out
    }

    /// Table header
    pub fn header(&self) -> &H {
        &self.header
    }

    /// Records before the sentinel, in table order
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// First record matching `pred`
    pub fn find(&self, pred: impl Fn(&R) -> bool) -> Option<&R> {
        self.records.iter().find(|r| pred(r))
    }

    /// First record carrying `tag`
    pub fn first_of(&self, tag: u32) -> Option<&R> {
        self.find(|r| r.tag() == tag)
    }

    /// All records carrying `tag`
    pub fn all_of(&self, tag: u32) -> impl Iterator<Item = &R> + '_ {
        self.records.iter().filter(move |r| r.tag() == tag)
    }
}

/// Builder for tables assembled in code (platform ports, tests)
#[derive(Debug)]
pub struct InfoTableBuilder<H, R> {
    header: H,
    records: Vec<R>,
}

impl<H: TableHeader, R: TableRecord> InfoTableBuilder<H, R> {
    /// Start from a header
    pub fn new(header: H) -> Self {
        Self { header, records: Vec::new() }
    }

    /// Append a record
    ///
    /// Sentinel-tagged records are dropped; the terminator is implicit.
    pub fn record(mut self, record: R) -> Self {
        if record.tag() != SENTINEL_TAG {
            self.records.push(record);
        }
        self
    }

    /// Finish the table
    pub fn build(self) -> InfoTable<H, R> {
        InfoTable { header: self.header, records: self.records }
    }
}

// =============================================================================
// Little-endian field helpers
// =============================================================================

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
