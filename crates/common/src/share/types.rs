use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ShareError;
use crate::crypto::Nonce;
use crate::identifier::{InfoHash, ShortToken};

pub type ShareId = Uuid;

/// Name of the content file every share seeds
pub const CONTENT_FILENAME: &str = "content.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Url,
    File,
}

impl fmt::Display for ShareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareKind::Url => f.write_str("url"),
            ShareKind::File => f.write_str("file"),
        }
    }
}

impl FromStr for ShareKind {
    type Err = ShareError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ShareKind::Url),
            "file" => Ok(ShareKind::File),
            other => Err(ShareError::InvalidShare(format!(
                "unknown share type: {}",
                other
            ))),
        }
    }
}

/// A share's metadata. This is exactly what gets serialized into the
///  seeded metadata file, so field names follow the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub id: ShareId,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: ShareKind,
    pub encrypted: bool,
    /// Present iff `encrypted`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_destruct: Option<bool>,
}

impl Share {
    /// Check the nonce/encrypted invariant
    pub fn validate(&self) -> Result<(), ShareError> {
        match (self.encrypted, self.nonce.is_some()) {
            (true, false) => Err(ShareError::InvalidShare(format!(
                "share {} is encrypted but has no nonce",
                self.id
            ))),
            (false, true) => Err(ShareError::InvalidShare(format!(
                "share {} has a nonce but is not encrypted",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn self_destructs(&self) -> bool {
        self.self_destruct.unwrap_or(false)
    }

    /// Serialized form seeded as the metadata file
    pub fn to_metadata(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_metadata(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// User input for a new share
#[derive(Debug, Clone)]
pub struct NewShare {
    pub name: String,
    pub description: String,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub kind: ShareKind,
    pub encrypt: bool,
    pub self_destruct: bool,
}

impl NewShare {
    pub fn new(name: impl Into<String>, kind: ShareKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            notes: None,
            expires_at: None,
            kind,
            encrypt: false,
            self_destruct: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn encrypted(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    pub fn self_destruct(mut self, self_destruct: bool) -> Self {
        self.self_destruct = self_destruct;
        self
    }
}

/// The raw or encrypted payload of a share
#[derive(Clone, PartialEq, Eq)]
pub struct ContentBlob {
    pub id: Uuid,
    pub share_id: ShareId,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ContentBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentBlob")
            .field("id", &self.id)
            .field("share_id", &self.share_id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// How a seeded share is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub share_id: ShareId,
    pub info_hash: InfoHash,
    pub short_token: ShortToken,
    pub magnet_uri: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn share() -> Share {
        Share {
            id: Uuid::nil(),
            name: "notes".to_string(),
            description: "meeting notes".to_string(),
            notes: None,
            expires_at: None,
            kind: ShareKind::File,
            encrypted: false,
            nonce: None,
            enabled: true,
            self_destruct: None,
        }
    }

    #[test]
    fn test_metadata_field_names() {
        let mut share = share();
        share.self_destruct = Some(true);
        share.expires_at = Some("2030-01-01T00:00:00Z".parse().unwrap());
        let json: serde_json::Value = serde_json::from_slice(&share.to_metadata().unwrap()).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["selfDestruct"], true);
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("nonce").is_none());
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_metadata_is_stable() {
        let share = share();
        let bytes = share.to_metadata().unwrap();
        let back = Share::from_metadata(&bytes).unwrap();
        assert_eq!(back, share);
        assert_eq!(back.to_metadata().unwrap(), bytes);
    }

    #[test]
    fn test_validate_nonce_invariant() {
        let mut share = share();
        assert!(share.validate().is_ok());

        share.encrypted = true;
        assert!(matches!(share.validate(), Err(ShareError::InvalidShare(_))));

        share.nonce = Some(Nonce::from([1u8; 24]));
        assert!(share.validate().is_ok());

        share.encrypted = false;
        assert!(matches!(share.validate(), Err(ShareError::InvalidShare(_))));
    }

    #[test]
    fn test_expiry() {
        let mut share = share();
        let now = Utc::now();
        assert!(!share.is_expired_at(now));
        share.expires_at = Some(now);
        assert!(share.is_expired_at(now));
        assert!(!share.is_expired_at(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_kind_round_trip() {
        assert_eq!("url".parse::<ShareKind>().unwrap(), ShareKind::Url);
        assert_eq!(ShareKind::File.to_string(), "file");
        assert!("folder".parse::<ShareKind>().is_err());
    }
}
