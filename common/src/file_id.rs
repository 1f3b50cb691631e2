use anyhow::Result;
use displaydoc::Display;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Serialize};
use uuid::Uuid;

/// Regex that matches a canonical file identifier, without anchors.
pub const FILE_ID_REGEX_FRAGMENT: &str =
    "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

lazy_static! {
    /// Regex for a valid file identifier.
    static ref FILE_ID_REGEX: Regex = {
        Regex::new(&format!("^{}$", FILE_ID_REGEX_FRAGMENT)).unwrap()
    };
}

#[derive(Debug, Display)]
pub enum Error {
    /// Invalid file id "{id}": {reason}
    InvalidFileId { id: String, reason: &'static str },
}
impl std::error::Error for Error {}

/// A 128-bit file identifier rendered in the canonical 8-4-4-4-12 hex form.
///
/// The front server mints one for every upload; it is the opaque key under
/// which every chunk server stores its shard and under which the placement
/// is recorded in the allocation map.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
pub struct FileId(String);

impl FileId {
    /// Creates a file id from a string, validating its shape.
    pub fn new(id: String) -> Result<Self> {
        if !FILE_ID_REGEX.is_match(&id) {
            return Err(Error::InvalidFileId {
                id,
                reason: "not in canonical 8-4-4-4-12 hex form",
            }
            .into());
        }

        Ok(Self(id))
    }

    /// Mints a fresh random file id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FileId {
    /// Deserializes a potentially-invalid file id.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        use de::Error;
        String::deserialize(deserializer)
            .and_then(|s| Self::new(s).map_err(|e| Error::custom(e.to_string())))
    }
}
