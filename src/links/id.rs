use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;

/// Store-assigned identifier of a saved link (a ULID string)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(String);

impl LinkId {
    #[inline]
    pub fn generate() -> LinkId {
        LinkId(rusty_ulid::generate_ulid_string())
    }
}

impl Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for LinkId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for LinkId {
    fn from(fr: &str) -> Self {
        LinkId(fr.to_string())
    }
}

impl From<String> for LinkId {
    fn from(fr: String) -> Self {
        LinkId(fr)
    }
}

impl From<LinkId> for String {
    fn from(fr: LinkId) -> Self {
        fr.0
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::generate()
    }
}
