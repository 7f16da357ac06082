//! Content identifiers for shares
//!
//! A seeded share is addressed by its 20-byte BitTorrent info-hash. Humans
//! never see the hex form: the hash is Base58-encoded into a short token that
//! sits in the last segment of a share link, and expanded back into a magnet
//! URI on the receiving side.

mod link;
mod magnet;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use link::{token_from_path, ShareLink, SHARE_PATH_PREFIX};
pub use magnet::{
    build_magnet_uri, build_magnet_uri_with_trackers, parse_info_hash_from_magnet, parse_magnet,
    METADATA_FILENAME, TRACKERS_V1,
};

/// Size of a BitTorrent v1 info-hash in bytes
pub const INFO_HASH_SIZE: usize = 20;
/// Length of an info-hash in hex characters
pub const INFO_HASH_HEX_LEN: usize = INFO_HASH_SIZE * 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("invalid info-hash: {0}")]
    InvalidInfoHash(String),
    #[error("invalid share token: {0}")]
    InvalidToken(String),
    #[error("invalid magnet uri: {0}")]
    InvalidMagnet(String),
}

/// 20-byte content identifier of a torrent's metadata
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; INFO_HASH_SIZE]);

impl InfoHash {
    /// Parse a 40-character hex info-hash (either case)
    pub fn from_hex(hex: &str) -> Result<Self, IdentifierError> {
        if hex.len() != INFO_HASH_HEX_LEN {
            return Err(IdentifierError::InvalidInfoHash(format!(
                "expected {} hex characters, got {}",
                INFO_HASH_HEX_LEN,
                hex.len()
            )));
        }
        let mut buff = [0u8; INFO_HASH_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|e| IdentifierError::InvalidInfoHash(e.to_string()))?;
        Ok(Self(buff))
    }

    /// Lowercase hex rendering, as used in magnet URIs
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; INFO_HASH_SIZE] {
        &self.0
    }

    /// Base58 token for this hash
    pub fn to_token(&self) -> ShortToken {
        ShortToken(bs58::encode(self.0).into_string())
    }
}

impl From<[u8; INFO_HASH_SIZE]> for InfoHash {
    fn from(bytes: [u8; INFO_HASH_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = IdentifierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        InfoHash::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Base58 (Bitcoin alphabet) rendering of an info-hash, safe for URL paths
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortToken(String);

impl ShortToken {
    /// Validate a token and decode it back into the info-hash it encodes
    pub fn parse(token: &str) -> Result<Self, IdentifierError> {
        let token = Self(token.to_string());
        token.info_hash()?;
        Ok(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn info_hash(&self) -> Result<InfoHash, IdentifierError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| IdentifierError::InvalidToken(e.to_string()))?;
        let bytes: [u8; INFO_HASH_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            IdentifierError::InvalidToken(format!(
                "decodes to {} bytes, expected {}",
                bytes.len(),
                INFO_HASH_SIZE
            ))
        })?;
        Ok(InfoHash(bytes))
    }
}

impl fmt::Display for ShortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ShortToken {
    type Err = IdentifierError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShortToken {
    type Error = IdentifierError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShortToken> for String {
    fn from(token: ShortToken) -> Self {
        token.0
    }
}

/// Shorten a 40-character hex info-hash into a Base58 token
pub fn shorten_info_hash(info_hash_hex: &str) -> Result<String, IdentifierError> {
    Ok(InfoHash::from_hex(info_hash_hex)?.to_token().0)
}

/// Expand a Base58 token back into a lowercase hex info-hash
///
/// # Errors
///
/// Returns [`IdentifierError::InvalidToken`] if the token contains characters
/// outside the Base58 alphabet or does not decode to exactly 20 bytes.
pub fn expand_token(token: &str) -> Result<String, IdentifierError> {
    Ok(ShortToken(token.to_string()).info_hash()?.to_hex())
}
