use std::{fmt, sync::Arc};

use anyhow::Result;

use crate::error::AggregationError;

/// Number of leading characters of a region identifier that name its country.
pub const COUNTRY_PREFIX_LEN: usize = 2;

/// Identifier of an administrative region, e.g. "DE11" for a NUTS-2 area.
/// Keeps the original text (with any leading zeros) behind a cheap clone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(Arc<str>);

impl RegionId {
    pub fn new(id: &str) -> Self { Self(Arc::from(id)) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }

    /// Returns the country code of this region, i.e. its fixed-length prefix.
    /// Identifiers shorter than the prefix are rejected instead of truncated.
    pub fn country_code(&self) -> Result<&str, AggregationError> {
        match self.0.char_indices().nth(COUNTRY_PREFIX_LEN) {
            Some((end, _)) => Ok(&self.0[..end]),
            None if self.0.chars().count() == COUNTRY_PREFIX_LEN => Ok(&self.0),
            None => Err(AggregationError::MalformedKey(vec![self.0.to_string()])),
        }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for RegionId {
    fn from(id: &str) -> Self { Self::new(id) }
}

/// Derive the country code of every id, collecting all malformed ids into one error.
pub fn country_codes<'a>(ids: impl IntoIterator<Item = &'a RegionId>) -> Result<Vec<String>> {
    let mut codes = Vec::new();
    let mut malformed = Vec::new();
    for id in ids {
        match id.country_code() {
            Ok(code) => codes.push(code.to_string()),
            Err(_) => malformed.push(id.as_str().to_string()),
        }
    }

    if !malformed.is_empty() {
        malformed.sort();
        malformed.dedup();
        return Err(AggregationError::MalformedKey(malformed).into());
    }
    Ok(codes)
}
