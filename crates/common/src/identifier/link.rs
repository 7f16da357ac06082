use std::fmt;

use url::Url;

use super::{IdentifierError, InfoHash, ShortToken};

/// Path segment that precedes the token in a share link
pub const SHARE_PATH_PREFIX: &str = "s";

/// A distributable share link of the form `<origin>/s/<token>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    origin: Url,
    token: ShortToken,
}

impl ShareLink {
    pub fn new(origin: Url, token: ShortToken) -> Self {
        Self { origin, token }
    }

    pub fn for_info_hash(origin: Url, info_hash: &InfoHash) -> Self {
        Self::new(origin, info_hash.to_token())
    }

    /// Parse a full share link. The origin is everything before the trailing
    ///  `s/<token>`, base path included.
    pub fn parse(link: &str) -> Result<Self, IdentifierError> {
        let url = Url::parse(link).map_err(|e| IdentifierError::InvalidToken(e.to_string()))?;
        let mut segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
        let token = segments
            .pop()
            .ok_or_else(|| IdentifierError::InvalidToken("empty path".to_string()))
            .and_then(ShortToken::parse)?;
        if segments.last() == Some(&SHARE_PATH_PREFIX) {
            segments.pop();
        }
        let base = segments.join("/");

        let mut origin = url;
        origin.set_path(&base);
        origin.set_query(None);
        origin.set_fragment(None);
        Ok(Self { origin, token })
    }

    pub fn token(&self) -> &ShortToken {
        &self.token
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn info_hash(&self) -> Result<InfoHash, IdentifierError> {
        self.token.info_hash()
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.origin.as_str().trim_end_matches('/'),
            SHARE_PATH_PREFIX,
            self.token
        )
    }
}

/// Extract the token from the trailing segment of a link, path or bare token
pub fn token_from_path(path: &str) -> Result<ShortToken, IdentifierError> {
    let path = match Url::parse(path) {
        Ok(url) => url.path().to_string(),
        Err(_) => path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let segment = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .ok_or_else(|| IdentifierError::InvalidToken("empty path".to_string()))?;
    ShortToken::parse(segment)
}
