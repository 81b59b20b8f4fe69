use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PostitError, Result};

/// A page address reduced to origin + path. Query string and fragment are
/// dropped, so `/page?a=1` and `/page?a=2` share one registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageUrl(String);

impl PageUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| PostitError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let origin = url.origin();
        let prefix = if origin.is_tuple() {
            origin.ascii_serialization()
        } else {
            format!("{}://", url.scheme())
        };

        Ok(PageUrl(format!("{}{}", prefix, url.path())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host part of a stored URL, or the string itself when it does not parse.
pub fn hostname(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| raw.to_string())
}
