use std::sync::OnceLock;

use regex::Regex;

use super::{IdentifierError, InfoHash};

/// Name of the JSON metadata file every share seeds, also used as the
///  magnet display name
pub const METADATA_FILENAME: &str = "metadata.json";

/// Fallback trackers embedded in every magnet URI.
///  Versioned so that a future list never silently changes old links.
pub const TRACKERS_V1: &[&str] = &[
    "udp://tracker.leechers-paradise.org:6969",
    "udp://tracker.coppersurfer.tk:6969",
    "udp://tracker.opentrackr.org:1337",
    "udp://explodie.org:6969",
    "udp://tracker.empire-js.us:1337",
    "wss://tracker.btorrent.xyz",
    "wss://tracker.openwebtorrent.com",
    "wss://tracker.webtorrent.dev",
];

fn btih_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)xt=urn:btih:([0-9a-f]{40})(?:&|$)").expect("static regex is valid")
    })
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Build a magnet URI for `info_hash` using the default tracker list
pub fn build_magnet_uri(info_hash: &InfoHash) -> String {
    build_magnet_uri_with_trackers(info_hash, TRACKERS_V1)
}

/// Build a magnet URI with an explicit tracker list
pub fn build_magnet_uri_with_trackers<T: AsRef<str>>(info_hash: &InfoHash, trackers: &[T]) -> String {
    let mut uri = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        info_hash.to_hex(),
        encode_component(METADATA_FILENAME)
    );
    for tracker in trackers {
        uri.push_str("&tr=");
        uri.push_str(&encode_component(tracker.as_ref()));
    }
    uri
}

/// Extract the lowercase hex info-hash from a magnet URI.
///
/// Returns `None` rather than failing when no `xt=urn:btih:` is present.
pub fn parse_info_hash_from_magnet(uri: &str) -> Option<String> {
    btih_pattern()
        .captures(uri)
        .and_then(|captures| captures.get(1))
        .map(|hex| hex.as_str().to_lowercase())
}

/// Strict variant of [`parse_info_hash_from_magnet`]
pub fn parse_magnet(uri: &str) -> Result<InfoHash, IdentifierError> {
    let hex = parse_info_hash_from_magnet(uri)
        .ok_or_else(|| IdentifierError::InvalidMagnet("no btih found".to_string()))?;
    InfoHash::from_hex(&hex).map_err(|e| IdentifierError::InvalidMagnet(e.to_string()))
}
