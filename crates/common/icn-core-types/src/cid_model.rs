use cid::{Cid as ExternalCid, Version};
use multihash::Multihash;
use sha2::{Digest, Sha256};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use thiserror::Error;

/// Multicodec code for raw blocks.
pub const RAW_CODEC: u64 = 0x55;

/// Multicodec code for sha2-256 digests.
pub const SHA2_256: u64 = 0x12;

/// Errors that can occur when working with CIDs
#[derive(Error, Debug)]
pub enum CidError {
    #[error("Failed to parse CID from bytes: {0}")]
    ParseError(String),
    #[error("Failed to parse CID from string: {0}")]
    FromStrError(String),
    #[error("Failed to build multihash: {0}")]
    Multihash(String),
}

/// A wrapper around the `cid::Cid` type to provide Serialize/Deserialize implementations.
///
/// The canonical binary form (`to_bytes` / `decode`) is what the provider queue
/// persists, so it must round-trip exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(ExternalCid);

impl Cid {
    /// Compute the CIDv1 of a raw block (sha2-256, raw codec).
    pub fn for_block(data: &[u8]) -> Result<Self, CidError> {
        let digest = Sha256::digest(data);
        let mh = Multihash::<64>::wrap(SHA2_256, &digest)
            .map_err(|e| CidError::Multihash(e.to_string()))?;
        let cid = ExternalCid::new(Version::V1, RAW_CODEC, mh)
            .map_err(|e| CidError::ParseError(e.to_string()))?;
        Ok(Cid(cid))
    }

    /// Parse a CID from its canonical binary encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, CidError> {
        Self::try_from(bytes)
    }

    /// Get the canonical binary encoding of this CID
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }
}

impl FromStr for Cid {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExternalCid::from_str(s)
            .map(Cid)
            .map_err(|e| CidError::FromStrError(e.to_string()))
    }
}

impl Deref for Cid {
    type Target = ExternalCid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// --- Conversions ---
impl From<ExternalCid> for Cid {
    fn from(cid: ExternalCid) -> Self {
        Cid(cid)
    }
}

impl From<Cid> for ExternalCid {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl TryFrom<&[u8]> for Cid {
    type Error = CidError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        ExternalCid::try_from(bytes)
            .map(Cid)
            .map_err(|e| CidError::ParseError(e.to_string()))
    }
}

// --- Serde Implementations ---
impl Serialize for Cid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        ExternalCid::try_from(bytes)
            .map(Cid)
            .map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
